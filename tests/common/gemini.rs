//! Mock Gemini endpoint built on wiremock

use serde_json::json;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Model name used by the test configuration
pub const MODEL: &str = "test-model";

/// Path the client posts to for [`MODEL`]
pub const ENDPOINT: &str = "/v1beta/models/test-model:generateContent";

/// Successful response carrying `text`
pub fn answer(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "parts": [{ "text": text }] } }]
    }))
}

/// Quota response as Gemini sends it
pub fn rate_limited() -> ResponseTemplate {
    ResponseTemplate::new(429).set_body_json(json!({
        "error": {
            "code": 429,
            "message": "Resource has been exhausted",
            "status": "RESOURCE_EXHAUSTED"
        }
    }))
}

/// Non-retryable API error
pub fn bad_request(message: &str) -> ResponseTemplate {
    ResponseTemplate::new(400).set_body_json(json!({
        "error": { "code": 400, "message": message, "status": "INVALID_ARGUMENT" }
    }))
}

/// Answer requests whose prompt contains `needle`
///
/// With `times`, the mock stops matching after that many requests so a later
/// mount for the same needle takes over.
pub async fn mock_row(
    server: &MockServer,
    needle: &str,
    response: ResponseTemplate,
    times: Option<u64>,
) {
    let mock = Mock::given(method("POST"))
        .and(path(ENDPOINT))
        .and(body_string_contains(needle))
        .respond_with(response);
    let mock = match times {
        Some(n) => mock.up_to_n_times(n),
        None => mock,
    };
    mock.mount(server).await;
}

/// API keys of every request the server received, in order
pub async fn used_keys(server: &MockServer) -> Vec<String> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .map(|r| {
            r.headers
                .get("x-goog-api-key")
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string()
        })
        .collect()
}
