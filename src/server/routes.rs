//! HTTP routes
//!
//! ```text
//!   GET  /healthz
//!   GET  /api/v1/rooms                      list rooms
//!   POST /api/v1/rooms                      create room -> {id, link}
//!   GET  /api/v1/rooms/:room_id             stored events (page, size)
//!   GET  /api/v1/rooms/:room_id/events      event stream
//!   ANY  /api/v1/rooms/:room_id/push        relay request (x-api-secret)
//!   GET  /api/v1/stats                      hub statistics
//! ```

use std::sync::Arc;

use axum::body::{Body, Bytes};
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{any, get};
use axum::{middleware, Json, Router};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;

use crate::error::Error;
use crate::hub::{HubError, RoomId};
use crate::relay::{RelayReport, RelayService};
use crate::stats::HubStats;
use crate::store::{Event, EventPage, Pagination, RoomFilter, RoomInfo, StoreError};
use crate::transport::channel::DEFAULT_FRAME_BUFFER;
use crate::transport::ChannelTransport;

use super::auth::require_secret;
use super::rate_limit::{rate_limit, RateLimiter};

/// Shared state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub relay: Arc<RelayService>,
    /// Parent of every listener's cancellation token
    pub shutdown: CancellationToken,
    pub secret: Option<Arc<str>>,
    /// Per-client request limiter (None = unlimited)
    pub limiter: Option<Arc<RateLimiter>>,
}

impl AppState {
    pub fn new(
        relay: Arc<RelayService>,
        shutdown: CancellationToken,
        secret: Option<String>,
    ) -> Self {
        Self {
            relay,
            shutdown,
            secret: secret.map(Arc::from),
            limiter: None,
        }
    }

    /// Limit requests per client and endpoint
    pub fn with_rate_limiter(mut self, limiter: RateLimiter) -> Self {
        self.limiter = Some(Arc::new(limiter));
        self
    }
}

/// Build the application router
pub fn router(state: AppState) -> Router {
    let push = Router::new()
        .route("/api/v1/rooms/:room_id/push", any(push_event))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_secret));

    Router::new()
        .route("/healthz", get(health))
        .route("/api/v1/rooms", get(list_rooms).post(create_room))
        .route("/api/v1/rooms/:room_id", get(list_events))
        .route("/api/v1/rooms/:room_id/events", get(listen_events))
        .route("/api/v1/stats", get(stats))
        .merge(push)
        .layer(middleware::from_fn_with_state(state.clone(), rate_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Error returned by handlers
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Relay(Error),
}

impl From<Error> for ApiError {
    fn from(e: Error) -> Self {
        ApiError::Relay(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Relay(e) => match e {
                Error::Hub(HubError::RoomNotFound(_))
                | Error::Store(StoreError::RoomNotFound(_)) => StatusCode::NOT_FOUND,
                Error::Hub(HubError::ClientAlreadySubscribed { .. }) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
        };

        let message = match &self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::Relay(e) => {
                if status.is_server_error() {
                    tracing::error!(error = %e, "Request failed");
                }
                e.to_string()
            }
        };

        (status, Json(serde_json::json!({ "error": message }))).into_response()
    }
}

async fn health() -> &'static str {
    "OK"
}

#[derive(Debug, Deserialize)]
struct CreateRoomRequest {
    name: String,
    #[serde(default)]
    avatar: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateRoomResponse {
    pub id: RoomId,
    pub link: String,
}

async fn create_room(
    State(state): State<AppState>,
    payload: Result<Json<CreateRoomRequest>, JsonRejection>,
) -> Result<Json<CreateRoomResponse>, ApiError> {
    let Json(req) = payload.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let (room, link) = state.relay.create_room(&req.name, &req.avatar).await?;
    Ok(Json(CreateRoomResponse { id: room.id, link }))
}

async fn list_rooms(
    State(state): State<AppState>,
    Query(filter): Query<RoomFilter>,
) -> Result<Json<Vec<RoomInfo>>, ApiError> {
    Ok(Json(state.relay.list_rooms(&filter).await?))
}

async fn list_events(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    Query(page): Query<Pagination>,
) -> Result<Json<EventPage>, ApiError> {
    let room = RoomId::new(room_id);
    Ok(Json(state.relay.list_events(&room, page).await?))
}

/// Open an event stream for a new listener
///
/// The response body is the listener's stream. Dropping it (peer gone)
/// cancels the client; server shutdown ends it.
async fn listen_events(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
) -> Result<Response, ApiError> {
    let room = RoomId::new(room_id);
    let (transport, frames) = ChannelTransport::new(DEFAULT_FRAME_BUFFER);

    let client = state.relay.listen(&room, transport, &state.shutdown).await?;

    let headers = frames.headers();
    let frames = frames.cancel_on_drop(client.cancellation_token().clone());
    let mut response = Response::new(Body::from_stream(frames));

    for (name, value) in headers {
        if let Ok(name) = HeaderName::from_bytes(name.as_bytes()) {
            response
                .headers_mut()
                .insert(name, HeaderValue::from_static(value));
        }
    }

    Ok(response)
}

#[derive(Debug, Serialize)]
struct PushResponse {
    message: &'static str,
    #[serde(flatten)]
    report: RelayReport,
}

async fn push_event(
    State(state): State<AppState>,
    Path(room_id): Path<String>,
    method: Method,
    headers: HeaderMap,
    Query(params): Query<Vec<(String, String)>>,
    body: Bytes,
) -> Result<Json<PushResponse>, ApiError> {
    let room = RoomId::new(room_id);

    let mut event = Event::new(method.as_str());
    for (name, value) in headers.iter() {
        if let Ok(value) = value.to_str() {
            event = event.with_header(name.as_str(), value);
        }
    }
    for (name, value) in params {
        event = event.with_query(name, value);
    }
    event.body = Event::body_from_bytes(&body);

    let report = state.relay.relay(&room, event).await?;
    Ok(Json(PushResponse {
        message: "ok",
        report,
    }))
}

async fn stats(State(state): State<AppState>) -> Json<HubStats> {
    Json(state.relay.hub().stats().await)
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use axum::http::Request;
    use futures::StreamExt;
    use tower::ServiceExt;

    use super::*;
    use crate::hub::{Hub, HubConfig};

    fn app_with_secret(secret: Option<&str>) -> (Router, AppState) {
        let hub = Arc::new(Hub::with_config(
            HubConfig::default().heartbeat_interval(Duration::from_secs(60)),
        ));
        let relay = Arc::new(RelayService::in_memory(hub, 100));
        let state = AppState::new(relay, CancellationToken::new(), secret.map(String::from));
        (router(state.clone()), state)
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    async fn create(app: &Router, name: &str) -> CreateRoomResponse {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/rooms")
                    .header("content-type", "application/json")
                    .body(Body::from(format!(r#"{{"name":"{}","avatar":"x"}}"#, name)))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        serde_json::from_value(body_json(response).await).unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = app_with_secret(None);

        let response = app.oneshot(get("/healthz")).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_create_and_list_rooms() {
        let (app, _) = app_with_secret(None);

        let created = create(&app, "builds").await;
        assert_eq!(created.link, format!("/api/v1/rooms/{}/events", created.id));

        let response = app.oneshot(get("/api/v1/rooms")).await.unwrap();
        let rooms = body_json(response).await;
        assert_eq!(rooms[0]["id"], created.id.as_str());
        assert_eq!(rooms[0]["name"], "builds");
    }

    #[tokio::test]
    async fn test_create_room_rejects_bad_json() {
        let (app, _) = app_with_secret(None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/rooms")
                    .header("content-type", "application/json")
                    .body(Body::from("{not json"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stream_receives_pushed_event() {
        let (app, state) = app_with_secret(None);
        let room = create(&app, "hooks").await;

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/rooms/{}/events", room.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["content-type"], "text/event-stream");
        assert_eq!(response.headers()["cache-control"], "no-cache");
        assert_eq!(response.headers()["x-accel-buffering"], "no");

        let mut body = response.into_body().into_data_stream();
        let first = body.next().await.unwrap().unwrap();
        assert_eq!(&first[..], b": connected\n\n");

        let push = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/rooms/{}/push?source=ci", room.id))
                    .header("x-github-event", "push")
                    .body(Body::from(r#"{"ok":true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(push.status(), StatusCode::OK);
        let report = body_json(push).await;
        assert_eq!(report["message"], "ok");
        assert_eq!(report["delivered"], 1);

        let frame = tokio::time::timeout(Duration::from_secs(2), body.next())
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        let frame = String::from_utf8(frame.to_vec()).unwrap();
        assert!(frame.starts_with("event: message\nid: 1\ndata: "));
        assert!(frame.contains(r#""body":{"ok":true}"#));
        assert!(frame.contains("x-github-event"));

        // Dropping the body disconnects the listener
        drop(body);
        let room_id = room.id.clone();
        tokio::time::timeout(Duration::from_secs(2), async {
            while state.relay.hub().room_connections(&room_id).await > 0 {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_stream_unknown_room_is_404() {
        let (app, _) = app_with_secret(None);

        let response = app
            .oneshot(get("/api/v1/rooms/nonexistent-room/events"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_push_requires_secret() {
        let (app, _) = app_with_secret(Some("s3cret"));
        let room = create(&app, "guarded").await;

        let denied = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/rooms/{}/push?x-api-secret=wrong", room.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(denied.status(), StatusCode::UNAUTHORIZED);

        let missing = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri(format!("/api/v1/rooms/{}/push", room.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let allowed = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("PUT")
                    .uri(format!("/api/v1/rooms/{}/push?x-api-secret=s3cret&a=1", room.id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(allowed.status(), StatusCode::OK);

        // Secret is not persisted
        let history = app
            .oneshot(get(&format!("/api/v1/rooms/{}?page=1&size=5", room.id)))
            .await
            .unwrap();
        let page = body_json(history).await;
        assert_eq!(page["events"][0]["method"], "PUT");
        assert_eq!(page["events"][0]["query_params"]["a"][0], "1");
        assert!(page["events"][0]["query_params"].get("x-api-secret").is_none());
        assert_eq!(page["has_more"], false);
    }

    #[tokio::test]
    async fn test_push_to_unknown_room_is_404() {
        let (app, _) = app_with_secret(None);

        let response = app
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/api/v1/rooms/missing/push")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_history_pagination() {
        let (app, state) = app_with_secret(None);
        let room = create(&app, "paged").await;
        for _ in 0..3 {
            state.relay.relay(&room.id, Event::new("POST")).await.unwrap();
        }

        let response = app
            .clone()
            .oneshot(get(&format!("/api/v1/rooms/{}?page=1&size=2", room.id)))
            .await
            .unwrap();
        let page = body_json(response).await;
        assert_eq!(page["events"].as_array().unwrap().len(), 2);
        assert_eq!(page["events"][0]["id"], 3);
        assert_eq!(page["has_more"], true);

        let response = app
            .oneshot(get(&format!("/api/v1/rooms/{}?page=abc", room.id)))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_stats() {
        let (app, _) = app_with_secret(None);
        create(&app, "one").await;

        let response = app.oneshot(get("/api/v1/stats")).await.unwrap();
        let stats = body_json(response).await;

        assert_eq!(stats["rooms"], 1);
        assert_eq!(stats["connections"], 0);
    }

    #[tokio::test]
    async fn test_rate_limit_per_client_and_endpoint() {
        let (_, state) = app_with_secret(None);
        let app = router(state.with_rate_limiter(RateLimiter::new(2, Duration::from_secs(60))));

        let from = |ip: &str, uri: &str| {
            Request::builder()
                .uri(uri)
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..2 {
            let response = app.clone().oneshot(from("10.0.0.1", "/healthz")).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        let response = app.clone().oneshot(from("10.0.0.1", "/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        let body = body_json(response).await;
        assert_eq!(body["error"], "Rate limit exceeded");

        let response = app.clone().oneshot(from("10.0.0.2", "/healthz")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(from("10.0.0.1", "/api/v1/stats")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()["x-ratelimit-remaining"], "1");
    }
}
