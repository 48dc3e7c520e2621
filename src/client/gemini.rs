//! Google Gemini `generateContent` backend

use super::ClassificationClient;
use crate::config::ModelConfig;
use crate::error::{ClientError, Error, Result};
use crate::pool::Credential;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use url::Url;

/// Upstream status string Gemini uses for quota exhaustion
const RESOURCE_EXHAUSTED: &str = "RESOURCE_EXHAUSTED";

/// Gemini REST client
///
/// The API key travels with every request in the `x-goog-api-key` header, so
/// switching credentials needs no client rebuild.
#[derive(Clone, Debug)]
pub struct GeminiClient {
    http: reqwest::Client,
    endpoint: Url,
    model_name: String,
}

impl GeminiClient {
    /// Build a client for `config.model_name` at `config.api_base_url`
    pub fn new(config: &ModelConfig) -> Result<Self> {
        let mut base = config.api_base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base).map_err(|e| {
            Error::config(format!("invalid API base URL '{}': {}", base, e), "api_base_url")
        })?;
        let endpoint = base
            .join(&format!("v1beta/models/{}:generateContent", config.model_name))
            .map_err(|e| {
                Error::config(
                    format!("invalid model name '{}': {}", config.model_name, e),
                    "MODEL_NAME",
                )
            })?;

        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;

        Ok(Self {
            http,
            endpoint,
            model_name: config.model_name.clone(),
        })
    }

    /// Full `generateContent` URL
    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: [Content<'a>; 1],
}

#[derive(Serialize)]
struct Content<'a> {
    parts: [RequestPart<'a>; 1],
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<ResponseContent>,
}

#[derive(Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

impl GenerateResponse {
    fn into_text(self) -> std::result::Result<String, ClientError> {
        let text: String = self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if !text.trim().is_empty() {
            return Ok(text.trim().to_string());
        }

        match self.prompt_feedback.and_then(|f| f.block_reason) {
            Some(reason) => Err(ClientError::Other(format!("prompt blocked: {}", reason))),
            None => Err(ClientError::Other("response contained no text".to_string())),
        }
    }
}

/// Map a non-success HTTP answer to a [`ClientError`]
fn error_from_status(status: reqwest::StatusCode, body: &str) -> ClientError {
    let parsed = serde_json::from_str::<ErrorEnvelope>(body).ok();
    let (message, upstream_status) = match parsed {
        Some(env) => (env.error.message, env.error.status),
        None => (body.trim().to_string(), String::new()),
    };

    if status == reqwest::StatusCode::TOO_MANY_REQUESTS || upstream_status == RESOURCE_EXHAUSTED {
        return ClientError::RateLimited {
            message: format!("{} {}", status.as_u16(), message).trim().to_string(),
        };
    }

    if message.is_empty() {
        ClientError::Other(format!("HTTP {}", status.as_u16()))
    } else {
        ClientError::Other(format!("HTTP {}: {}", status.as_u16(), message))
    }
}

#[async_trait]
impl ClassificationClient for GeminiClient {
    async fn classify(
        &self,
        prompt: &str,
        credential: &Credential,
    ) -> std::result::Result<String, ClientError> {
        let request = GenerateRequest {
            contents: [Content {
                parts: [RequestPart { text: prompt }],
            }],
        };

        let response = self
            .http
            .post(self.endpoint.clone())
            .header("x-goog-api-key", credential.expose())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let err = error_from_status(status, &body);
            tracing::debug!(status = status.as_u16(), error = %err, "generateContent failed");
            return Err(err);
        }

        let body: GenerateResponse = response
            .json()
            .await
            .map_err(|e| ClientError::Other(format!("malformed response: {}", e)))?;
        body.into_text()
    }

    fn name(&self) -> &str {
        &self.model_name
    }
}
