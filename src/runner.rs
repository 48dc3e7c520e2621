//! Resumable batch runner
//!
//! Drives the [`RowProcessor`] over the rows of a data sheet in order,
//! flushing the whole result table to disk at a fixed cadence so an
//! interrupted run can be picked up again with [`RunMode::Resume`].

use crate::catalog::CandidateCatalog;
use crate::client::ClassificationClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::pool::CredentialPool;
use crate::processor::{RowOutcome, RowProcessor};
use crate::settings::ColumnSelection;
use crate::store::{ResultStore, XlsxStore};
use crate::table::Table;
use crate::types::{Event, OutputStatus, RunMode, RunSummary};
use crate::utils;
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

const DATA_SHEET: &str = "data sheet";

/// Everything a single run needs to know, passed once at start
#[derive(Clone, Debug)]
pub struct RunConfig {
    /// Spreadsheet holding the candidate classes
    pub classification_file: PathBuf,
    /// Spreadsheet whose rows get classified
    pub data_file: PathBuf,
    /// Directory receiving the output, archives and saved settings
    pub output_dir: PathBuf,
    /// Column choices for both sheets
    pub columns: ColumnSelection,
    /// Start over or continue
    pub mode: RunMode,
    /// Prompt template placed before each row's text
    pub prompt_template: String,
}

impl RunConfig {
    /// `<data stem>_out.xlsx` inside the output directory
    pub fn output_path(&self) -> Result<PathBuf> {
        utils::output_path(&self.data_file, &self.output_dir)
    }

    /// `<data stem>_config.txt` inside the output directory
    pub fn settings_path(&self) -> Result<PathBuf> {
        utils::settings_path(&self.data_file, &self.output_dir)
    }

    fn validate(&self) -> Result<()> {
        let c = &self.columns;
        for (value, key) in [
            (&c.klass_id_col, "klass_id_col"),
            (&c.klass_name_col, "klass_name_col"),
            (&c.out_id_col, "out_id_col"),
            (&c.out_name_col, "out_name_col"),
        ] {
            if value.trim().is_empty() {
                return Err(Error::config("column must be selected", key));
            }
        }
        if c.out_id_col.trim() == c.out_name_col.trim() {
            return Err(Error::config(
                "output ID and output name must be different columns",
                "out_name_col",
            ));
        }
        Ok(())
    }
}

/// Run state handed back to the caller when a run ends
#[derive(Debug)]
pub struct RunState {
    /// Row indices that were attempted, in order
    pub work_set: Vec<usize>,
    /// The result table as last written
    pub table: Table,
    /// Credential pool, cursor left where the run stopped
    pub pool: CredentialPool,
}

/// Classifies a data sheet row by row against a classification sheet
pub struct ClassificationRunner {
    config: Arc<Config>,
    client: Arc<dyn ClassificationClient>,
    store: Arc<dyn ResultStore>,
    event_tx: broadcast::Sender<Event>,
}

impl ClassificationRunner {
    /// Create a runner around a classification backend
    pub fn new(config: Config, client: Arc<dyn ClassificationClient>) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);
        Self {
            config: Arc::new(config),
            client,
            store: Arc::new(XlsxStore),
            event_tx,
        }
    }

    /// Use another storage backend for sheets and results (default: [`XlsxStore`])
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn ResultStore>) -> Self {
        self.store = store;
        self
    }

    /// Subscribe to run events
    ///
    /// Slow subscribers may miss events (`RecvError::Lagged`); the run never waits.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Current configuration
    pub fn config(&self) -> &Config {
        &self.config
    }

    fn emit(&self, event: Event) {
        // no receivers is fine
        self.event_tx.send(event).ok();
    }

    /// Progress of an existing output for `run`, or `None` when there is none
    ///
    /// Lets a caller choose between resuming and starting over.
    pub async fn status(&self, run: &RunConfig) -> Result<Option<OutputStatus>> {
        let Some(table) = self.store.load_if_exists(&run.output_path()?).await? else {
            return Ok(None);
        };
        let done = table
            .column_index(&run.columns.out_id_col)
            .map_or(0, |col| table.done_count(col));
        Ok(Some(OutputStatus {
            done,
            total: table.len(),
        }))
    }

    /// Execute one run
    ///
    /// Fails only before work begins (bad columns, unreadable inputs, output
    /// not writable). Row-level failures are recorded in the table and the run
    /// goes on.
    pub async fn run(
        &self,
        run: &RunConfig,
        mut pool: CredentialPool,
    ) -> Result<(RunSummary, RunState)> {
        run.validate()?;
        let columns = &run.columns;
        let output_path = run.output_path()?;

        let klass = self.store.load(&run.classification_file).await?;
        let catalog = CandidateCatalog::from_table(
            &klass,
            &columns.klass_id_col,
            &columns.klass_name_col,
            &columns.klass_context_cols,
        )?;
        drop(klass);
        if catalog.is_empty() {
            warn!(
                path = %run.classification_file.display(),
                "classification sheet has no candidates"
            );
        }

        let data = self.store.load(&run.data_file).await?;
        // checked before anything on disk is touched
        data.require_columns(&columns.data_text_cols, DATA_SHEET)?;
        let mut archived_path = None;

        let mut table = match run.mode {
            RunMode::Fresh => {
                match self.store.archive(&output_path, Local::now()).await {
                    Ok(Some(path)) => {
                        self.emit(Event::Archived { path: path.clone() });
                        archived_path = Some(path);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        warn!(
                            path = %output_path.display(),
                            error = %e,
                            "could not archive previous output, continuing"
                        );
                    }
                }
                data
            }
            RunMode::Resume => match self.store.load_if_exists(&output_path).await? {
                Some(output) => reconcile(output, &data),
                None => {
                    warn!(
                        path = %output_path.display(),
                        "no previous output to resume, starting from the data sheet"
                    );
                    data
                }
            },
        };

        let text_cols = table.require_columns(&columns.data_text_cols, DATA_SHEET)?;
        let id_col = table.ensure_column(&columns.out_id_col);
        let name_col = table.ensure_column(&columns.out_name_col);

        let work_set: Vec<usize> = match run.mode {
            RunMode::Fresh => (0..table.len()).collect(),
            RunMode::Resume => table.pending_rows(id_col),
        };

        match run.settings_path() {
            Ok(path) => {
                if let Err(e) = columns.save(&path).await {
                    warn!(path = %path.display(), error = %e, "could not save column selection");
                }
            }
            Err(e) => warn!(error = %e, "no settings path for data file"),
        }

        let total = work_set.len();
        info!(
            mode = ?run.mode,
            pending = total,
            total_rows = table.len(),
            candidates = catalog.len(),
            "classification run started"
        );
        self.emit(Event::RunStarted {
            mode: run.mode,
            pending: total,
            total_rows: table.len(),
        });

        let processor = RowProcessor::new(
            self.client.clone(),
            Arc::new(catalog),
            run.prompt_template.clone(),
            self.config.retry.clone(),
        );
        let flush_every = self.config.persistence.flush_interval.max(1);
        let compact_every = self.config.persistence.compact_interval;

        let mut summary = RunSummary {
            mode: run.mode,
            total_rows: table.len(),
            output_path: output_path.clone(),
            archived_path,
            ..Default::default()
        };

        if work_set.is_empty() {
            self.store.save(&output_path, &table).await?;
            self.emit_progress(0, 0);
        }

        for (i, &row) in work_set.iter().enumerate() {
            let processed = i + 1;
            let row_text = table.joined(row, &text_cols);
            let event_tx = &self.event_tx;

            let outcome = processor
                .process(&row_text, &mut pool, |pool, attempt| {
                    event_tx
                        .send(Event::KeyRotated {
                            key_index: pool.cursor(),
                            key_count: pool.len(),
                            attempt,
                            row,
                        })
                        .ok();
                })
                .await;

            if let Some((id, name)) = outcome.output_cells() {
                table.set_cell(row, id_col, id);
                table.set_cell(row, name_col, name);
            }

            match outcome {
                RowOutcome::Success { id, name } => {
                    summary.succeeded += 1;
                    debug!(row, id = %id, name = %name, "row done");
                    self.emit(Event::RowClassified { row, id, name });
                }
                RowOutcome::TerminalError { message } => {
                    summary.failed += 1;
                    warn!(row, error = %message, "row failed");
                    self.emit(Event::RowFailed { row, error: message });
                }
                RowOutcome::RetriesExhausted { attempts, last_error } => {
                    summary.deferred += 1;
                    warn!(row, attempts, error = %last_error, "row left for a later resume");
                    self.emit(Event::RowDeferred { row, attempts });
                }
            }
            summary.processed = processed;

            if processed % flush_every == 0 || processed == total {
                self.store.save(&output_path, &table).await?;
                info!(processed, total, "progress saved");
                self.emit_progress(processed, total);
            }

            if compact_every > 0 && processed % compact_every == 0 {
                table.shrink_to_fit();
            }
        }

        info!(
            processed = summary.processed,
            succeeded = summary.succeeded,
            failed = summary.failed,
            deferred = summary.deferred,
            output = %output_path.display(),
            "classification run finished"
        );
        self.emit(Event::Completed {
            summary: summary.clone(),
        });

        Ok((summary, RunState { work_set, table, pool }))
    }

    fn emit_progress(&self, processed: usize, total: usize) {
        self.emit(Event::Progress {
            processed,
            total,
            timestamp: Local::now(),
        });
    }
}

/// Bring a previous output in line with the current data sheet
///
/// Rows the output lacks at the end (e.g. trailing blank rows dropped by the
/// reader) are taken over from the data sheet.
fn reconcile(mut output: Table, data: &Table) -> Table {
    if output.len() < data.len() {
        let added = output.extend_from(data, output.len());
        warn!(
            added,
            "previous output was shorter than the data sheet, appended missing rows"
        );
    } else if output.len() > data.len() {
        warn!(
            output_rows = output.len(),
            data_rows = data.len(),
            "previous output has more rows than the data sheet, keeping the output as is"
        );
    }
    output
}
