//! Credential stripping for relayed requests

use crate::store::Event;

/// Headers never persisted or relayed (compared case-insensitively)
pub const SECRET_HEADERS: &[&str] = &[
    "Authorization",
    "Cookie",
    "Proxy-Authorization",
    "X-Api-Secret",
];

/// Query parameters never persisted or relayed
pub const SECRET_QUERY_PARAMS: &[&str] = &["x-api-secret"];

fn is_secret(name: &str, list: &[&str]) -> bool {
    list.iter().any(|s| s.eq_ignore_ascii_case(name))
}

/// Remove credentials from an event's headers and query parameters
pub fn sanitize(event: &mut Event) {
    event.headers.retain(|name, _| !is_secret(name, SECRET_HEADERS));
    event
        .query_params
        .retain(|name, _| !is_secret(name, SECRET_QUERY_PARAMS));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_secrets_case_insensitively() {
        let mut event = Event::new("POST")
            .with_header("authorization", "Bearer abc")
            .with_header("COOKIE", "session=1")
            .with_header("X-Api-Secret", "s3cret")
            .with_header("Content-Type", "application/json")
            .with_query("x-api-secret", "s3cret")
            .with_query("ref", "main");

        sanitize(&mut event);

        assert_eq!(event.headers.keys().collect::<Vec<_>>(), vec!["Content-Type"]);
        assert_eq!(event.query_params.keys().collect::<Vec<_>>(), vec!["ref"]);
    }
}
