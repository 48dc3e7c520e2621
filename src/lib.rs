//! # sheet-classifier
//!
//! Classifies the rows of a data spreadsheet against a classification sheet
//! by asking a generative model to pick the best matching ID, then writes the
//! ID and the resolved name back into an output spreadsheet.
//!
//! ## Design
//!
//! - **Resumable** - the full result table is flushed at a fixed cadence; a
//!   killed run is continued with [`RunMode::Resume`]
//! - **Key rotation** - rate-limited requests move on to the next API key
//! - **Event-driven** - consumers subscribe to [`Event`]s instead of polling
//!
//! ## Quick Start
//!
//! ```no_run
//! use sheet_classifier::{
//!     ClassificationRunner, ColumnSelection, Config, CredentialPool, GeminiClient, RunConfig,
//!     RunMode,
//! };
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let client = Arc::new(GeminiClient::new(&config.model)?);
//!     let runner = ClassificationRunner::new(config, client);
//!
//!     let mut events = runner.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let run = RunConfig {
//!         classification_file: "classes.xlsx".into(),
//!         data_file: "tickets.xlsx".into(),
//!         output_dir: ".".into(),
//!         columns: ColumnSelection {
//!             klass_name_col: "Name".into(),
//!             klass_id_col: "ID".into(),
//!             klass_context_cols: vec!["Description".into()],
//!             data_text_cols: vec!["Subject".into(), "Body".into()],
//!             out_name_col: "Category".into(),
//!             out_id_col: "Category ID".into(),
//!         },
//!         mode: RunMode::Fresh,
//!         prompt_template: sheet_classifier::credentials::DEFAULT_PROMPT.into(),
//!     };
//!
//!     let pool = CredentialPool::new(["key-1", "key-2"])?;
//!     let (summary, _state) = runner.run(&run, pool).await?;
//!     println!("{} rows classified", summary.succeeded);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Candidate catalog built from the classification sheet
pub mod catalog;
/// Generative-model backends
pub mod client;
/// Configuration types
pub mod config;
/// API keys, model name and prompt from secrets or `config.txt`
pub mod credentials;
/// Error types
pub mod error;
/// Rotating API key pool
pub mod pool;
/// Single-row classification
pub mod processor;
/// Retry with key rotation
pub mod retry;
/// Resumable batch runner
pub mod runner;
/// Saved column selections
pub mod settings;
/// Spreadsheet persistence
pub mod store;
/// In-memory string table
pub mod table;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// Re-export commonly used types
pub use catalog::{Candidate, CandidateCatalog, NOT_FOUND};
pub use client::{ClassificationClient, GeminiClient};
pub use config::Config;
pub use error::{ClientError, Error, Result};
pub use pool::{Credential, CredentialPool};
pub use processor::{RowOutcome, RowProcessor};
pub use runner::{ClassificationRunner, RunConfig, RunState};
pub use settings::ColumnSelection;
pub use store::{ResultStore, XlsxStore};
pub use table::Table;
pub use types::{Event, OutputStatus, RunMode, RunSummary};

/// Run to completion unless the process is asked to stop first
///
/// Returns `None` when interrupted by Ctrl+C (or SIGTERM on Unix). Saves are
/// write-then-rename, so the output on disk is the last complete flush and the
/// run can be continued with [`RunMode::Resume`].
pub async fn run_until_signal(
    runner: &ClassificationRunner,
    run: &RunConfig,
    pool: CredentialPool,
) -> Result<Option<(RunSummary, RunState)>> {
    tokio::select! {
        result = runner.run(run, pool) => result.map(Some),
        signal = stop_requested() => {
            tracing::warn!(signal, "run interrupted, continue later in resume mode");
            Ok(None)
        }
    }
}

/// Resolves with the signal name; never resolves when nothing can be listened for
async fn stop_requested() -> &'static str {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                return tokio::select! {
                    _ = sigterm.recv() => "SIGTERM",
                    name = ctrl_c() => name,
                };
            }
            Err(e) => {
                tracing::warn!(error = %e, "SIGTERM not available, listening for Ctrl+C only");
            }
        }
    }
    ctrl_c().await
}

async fn ctrl_c() -> &'static str {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "cannot listen for Ctrl+C, the run can only end on its own");
        std::future::pending::<()>().await;
    }
    "SIGINT"
}
