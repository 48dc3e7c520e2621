//! Row processor: one data row in, one classification outcome out
//!
//! For each row the processor builds a prompt (template, row text, candidate
//! catalog), calls the backend under the rotation-aware retry policy, pulls
//! the ID out of the generated text and resolves it to a display name.

use crate::catalog::CandidateCatalog;
use crate::client::ClassificationClient;
use crate::config::RetryConfig;
use crate::pool::CredentialPool;
use crate::retry::{RetryOutcome, retry_with_rotation};
use std::sync::Arc;
use tracing::{debug, warn};

/// Marker the prompt asks the model to put before the chosen ID
pub const ID_MARKER: &str = "ID=";

/// Prefix of the name cell for rows that failed terminally
pub const ERROR_PREFIX: &str = "ERROR: ";

/// Outcome of classifying one row
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowOutcome {
    /// The model answered; `name` is the resolved candidate name or
    /// [`NOT_FOUND`](crate::catalog::NOT_FOUND)
    Success {
        /// Extracted ID
        id: String,
        /// Resolved display name
        name: String,
    },
    /// Non-retryable failure; recorded in the output so the batch can go on
    TerminalError {
        /// Backend error message
        message: String,
    },
    /// Every attempt was rate limited; the row stays pending for a later resume
    RetriesExhausted {
        /// Attempts made
        attempts: u32,
        /// Last rate-limit message
        last_error: String,
    },
}

impl RowOutcome {
    /// The `(id, name)` cells to write, or `None` when the row must stay untouched
    pub fn output_cells(&self) -> Option<(String, String)> {
        match self {
            RowOutcome::Success { id, name } => Some((id.clone(), name.clone())),
            RowOutcome::TerminalError { message } => {
                Some((String::new(), format!("{}{}", ERROR_PREFIX, message)))
            }
            RowOutcome::RetriesExhausted { .. } => None,
        }
    }
}

/// ID pulled out of a model response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedId {
    /// Cleaned ID text
    pub id: String,
    /// Whether the `ID=` marker was present; when absent, `id` is the whole response
    pub marker_found: bool,
}

/// Take the text after the last `ID=` (or the whole response), dropping line
/// breaks, semicolons and surrounding whitespace
pub fn extract_id(response: &str) -> ExtractedId {
    let response = response.trim();
    let (tail, marker_found) = match response.rfind(ID_MARKER) {
        Some(pos) => (&response[pos + ID_MARKER.len()..], true),
        None => (response, false),
    };

    ExtractedId {
        id: tail.trim().replace(['\n', '\r', ';'], "").trim().to_string(),
        marker_found,
    }
}

/// Assemble the full prompt for one row
pub fn build_prompt(template: &str, row_text: &str, catalog_text: &str) -> String {
    format!(
        "{}\n\nProblem description:\n{}\n\nCandidate list:\n{}\n",
        template.trim(),
        row_text,
        catalog_text
    )
}

/// Classifies single rows against a fixed catalog and prompt template
#[derive(Clone)]
pub struct RowProcessor {
    client: Arc<dyn ClassificationClient>,
    catalog: Arc<CandidateCatalog>,
    prompt_template: String,
    retry: RetryConfig,
}

impl RowProcessor {
    /// Create a processor bound to one backend, catalog and template
    pub fn new(
        client: Arc<dyn ClassificationClient>,
        catalog: Arc<CandidateCatalog>,
        prompt_template: impl Into<String>,
        retry: RetryConfig,
    ) -> Self {
        Self {
            client,
            catalog,
            prompt_template: prompt_template.into(),
            retry,
        }
    }

    /// The catalog used to resolve IDs
    pub fn catalog(&self) -> &CandidateCatalog {
        &self.catalog
    }

    /// Prompt that would be sent for `row_text`
    pub fn prompt_for(&self, row_text: &str) -> String {
        build_prompt(&self.prompt_template, row_text, self.catalog.text())
    }

    /// Classify one row
    ///
    /// Rate limits rotate `pool` (reported through `on_rotate`) and consume an
    /// attempt; any other failure is terminal for the row.
    pub async fn process<R>(
        &self,
        row_text: &str,
        pool: &mut CredentialPool,
        on_rotate: R,
    ) -> RowOutcome
    where
        R: FnMut(&CredentialPool, u32),
    {
        let prompt = self.prompt_for(row_text);
        let prompt = prompt.as_str();
        let client = self.client.as_ref();

        let outcome = retry_with_rotation(&self.retry, pool, on_rotate, |credential| async move {
            client.classify(prompt, &credential).await
        })
        .await;

        match outcome {
            RetryOutcome::Succeeded(text) => {
                let extracted = extract_id(&text);
                if !extracted.marker_found {
                    warn!(
                        response_len = text.len(),
                        "model response has no {} marker, using whole response as ID", ID_MARKER
                    );
                }
                let name = self.catalog.resolve(&extracted.id).display_name().to_string();
                debug!(id = %extracted.id, name = %name, "row classified");
                RowOutcome::Success {
                    id: extracted.id,
                    name,
                }
            }
            RetryOutcome::Failed(e) => RowOutcome::TerminalError {
                message: e.to_string(),
            },
            RetryOutcome::Exhausted {
                attempts,
                last_error,
            } => RowOutcome::RetriesExhausted {
                attempts,
                last_error: last_error.to_string(),
            },
        }
    }
}
