//! Relay server - rooms of event-stream listeners fed by pushed requests
//!
//! Run with: cargo run --example relay_server
//!
//! Configuration comes from `RELAY_*` environment variables (or a `.env`
//! file), e.g. `RELAY_PORT=9000 RELAY_SECRET_KEY=s3cret`.
//!
//! Try it:
//!
//! ```text
//! curl -s -XPOST localhost:8080/api/v1/rooms -d '{"name":"demo"}' \
//!      -H 'content-type: application/json'
//! curl -N localhost:8080/api/v1/rooms/<id>/events
//! curl -XPOST 'localhost:8080/api/v1/rooms/<id>/push?x-api-secret=s3cret' -d '{"hi":1}'
//! ```

use sse_relay::{RelayConfig, RelayServer};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("sse_relay=info".parse()?)
                .add_directive("relay_server=debug".parse()?),
        )
        .init();

    let config = RelayConfig::load()?;
    let server = RelayServer::new(config);

    server
        .run_until(async {
            let _ = tokio::signal::ctrl_c().await;
        })
        .await?;

    Ok(())
}
