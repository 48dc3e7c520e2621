//! Core types and events

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Whether a run starts over or continues a previous output
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunMode {
    /// Archive any existing output and classify every row
    #[default]
    Fresh,
    /// Classify only rows whose output ID is still empty
    Resume,
}

/// Event emitted during a classification run
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Run started; `pending` rows will be attempted out of `total_rows`
    RunStarted {
        /// Fresh or resume
        mode: RunMode,
        /// Rows in the work set
        pending: usize,
        /// Rows in the result table
        total_rows: usize,
    },

    /// A previous output was moved aside before a fresh run
    Archived {
        /// Where the previous output now lives
        path: PathBuf,
    },

    /// Switched to another API key after a rate limit
    KeyRotated {
        /// Zero-based position of the new key
        key_index: usize,
        /// Keys in the pool
        key_count: usize,
        /// Attempt that was rate limited (1-based)
        attempt: u32,
        /// Data row being classified
        row: usize,
    },

    /// Row classified
    RowClassified {
        /// Data row index
        row: usize,
        /// Extracted ID
        id: String,
        /// Resolved name
        name: String,
    },

    /// Row failed with a non-retryable error (recorded in the output)
    RowFailed {
        /// Data row index
        row: usize,
        /// Error message
        error: String,
    },

    /// Row left pending after exhausting its attempts
    RowDeferred {
        /// Data row index
        row: usize,
        /// Attempts made
        attempts: u32,
    },

    /// Result table flushed to disk
    Progress {
        /// Rows of the work set processed so far
        processed: usize,
        /// Rows in the work set
        total: usize,
        /// When the flush completed
        timestamp: DateTime<Local>,
    },

    /// Run finished
    Completed {
        /// Final counts
        summary: RunSummary,
    },
}

/// Counts and paths describing a finished run
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    /// Fresh or resume
    pub mode: RunMode,
    /// Rows attempted in this run
    pub processed: usize,
    /// Rows that received an ID (including unresolved ones)
    pub succeeded: usize,
    /// Rows recorded with an `ERROR:` marker
    pub failed: usize,
    /// Rows left pending for a later resume
    pub deferred: usize,
    /// Rows in the output table
    pub total_rows: usize,
    /// Output spreadsheet
    pub output_path: PathBuf,
    /// Previous output, if one was archived
    pub archived_path: Option<PathBuf>,
}

impl RunSummary {
    /// Whether another resume pass could make progress
    pub fn needs_resume(&self) -> bool {
        self.deferred > 0
    }
}

/// Progress of an existing output artifact
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct OutputStatus {
    /// Rows with an output ID
    pub done: usize,
    /// Rows in the artifact
    pub total: usize,
}

impl OutputStatus {
    /// Rows still waiting for an ID
    pub fn remaining(&self) -> usize {
        self.total.saturating_sub(self.done)
    }
}
