//! Spreadsheet fixtures and run helpers

use sheet_classifier::config::{ModelConfig, PersistenceConfig, RetryConfig};
use sheet_classifier::{
    ColumnSelection, Config, Event, ResultStore, RunConfig, RunMode, Table, XlsxStore,
};
use std::path::PathBuf;
use std::time::Duration;
use tempfile::TempDir;
use tokio::sync::broadcast;

/// Candidate classes used by every scenario
pub const CLASSES: &[(&str, &str, &str)] = &[
    ("1", "Billing", "invoices, refunds"),
    ("2", "Network", "wifi, vpn"),
    ("3", "Hardware", "printers, screens"),
];

/// Temporary directory holding both input sheets, plus the run description
pub struct Workspace {
    /// Keeps the directory alive for the test
    pub dir: TempDir,
    /// Run over the sheets in `dir`
    pub run: RunConfig,
}

impl Workspace {
    /// Files in the workspace directory whose name starts with `prefix`
    pub fn files_starting_with(&self, prefix: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = std::fs::read_dir(self.dir.path())
            .unwrap()
            .map(|e| e.unwrap().path())
            .filter(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with(prefix))
            })
            .collect();
        found.sort();
        found
    }
}

pub fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|v| v.to_string()).collect()
}

/// Write `classes.xlsx` and `tickets.xlsx` (columns Subject, Body) into a fresh tempdir
///
/// Each data row is `(subject, body)`.
pub async fn workspace(rows: &[(&str, &str)]) -> Workspace {
    let dir = tempfile::tempdir().unwrap();

    let classes = Table::new(
        strings(&["Code", "Label", "Examples"]),
        CLASSES
            .iter()
            .map(|(id, name, ctx)| strings(&[*id, *name, *ctx]))
            .collect(),
    );
    let data = Table::new(
        strings(&["Subject", "Body"]),
        rows.iter().map(|(s, b)| strings(&[*s, *b])).collect(),
    );

    let classification_file = dir.path().join("classes.xlsx");
    let data_file = dir.path().join("tickets.xlsx");
    XlsxStore.save(&classification_file, &classes).await.unwrap();
    XlsxStore.save(&data_file, &data).await.unwrap();

    let run = RunConfig {
        classification_file,
        data_file,
        output_dir: dir.path().to_path_buf(),
        columns: ColumnSelection {
            klass_name_col: "Label".into(),
            klass_id_col: "Code".into(),
            klass_context_cols: strings(&["Examples"]),
            data_text_cols: strings(&["Subject", "Body"]),
            out_name_col: "Category".into(),
            out_id_col: "Category ID".into(),
        },
        mode: RunMode::Fresh,
        prompt_template: "Choose the best class.\nID=<id>".into(),
    };

    Workspace { dir, run }
}

/// Configuration pointing at a mock server, with millisecond backoff
pub fn test_config(api_base_url: &str) -> Config {
    Config {
        model: ModelConfig {
            model_name: super::gemini::MODEL.into(),
            api_base_url: api_base_url.into(),
            request_timeout: Duration::from_secs(5),
        },
        retry: RetryConfig {
            max_attempts: 3,
            backoff: Duration::from_millis(1),
            jitter: false,
        },
        persistence: PersistenceConfig {
            flush_interval: 2,
            compact_interval: 100,
        },
    }
}

/// The output sheet as written to disk
pub async fn read_output(run: &RunConfig) -> Table {
    XlsxStore.load(&run.output_path().unwrap()).await.unwrap()
}

/// Drain every event already delivered to `rx`
pub fn drain(rx: &mut broadcast::Receiver<Event>) -> Vec<Event> {
    let mut events = Vec::new();
    while let Ok(event) = rx.try_recv() {
        events.push(event);
    }
    events
}
