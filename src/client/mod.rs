//! Classification backends
//!
//! A backend performs exactly one outbound call per [`ClassificationClient::classify`]
//! invocation. Retrying and credential rotation are the caller's concern
//! (see [`crate::processor`]), so implementations must not loop internally.

mod gemini;

pub use gemini::GeminiClient;

use crate::error::ClientError;
use crate::pool::Credential;
use async_trait::async_trait;

/// Trait for generative-model backends that turn a prompt into text
///
/// Implementations must report throttling as [`ClientError::RateLimited`] and
/// every other failure as [`ClientError::Other`].
///
/// # Examples
///
/// ```
/// use async_trait::async_trait;
/// use sheet_classifier::client::ClassificationClient;
/// use sheet_classifier::error::ClientError;
/// use sheet_classifier::pool::Credential;
///
/// struct Constant;
///
/// #[async_trait]
/// impl ClassificationClient for Constant {
///     async fn classify(
///         &self,
///         _prompt: &str,
///         _credential: &Credential,
///     ) -> Result<String, ClientError> {
///         Ok("ID=1".to_string())
///     }
/// }
/// ```
#[async_trait]
pub trait ClassificationClient: Send + Sync {
    /// Send `prompt` using `credential` and return the generated text
    async fn classify(&self, prompt: &str, credential: &Credential) -> Result<String, ClientError>;

    /// Short backend description for logs
    fn name(&self) -> &str {
        "custom"
    }
}
