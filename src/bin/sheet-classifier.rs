//! Command-line front end: classify a data sheet against a classification sheet

use clap::{Args, Parser};
use sheet_classifier::credentials::{LocalConfig, ResolvedCredentials, SecretStore};
use sheet_classifier::{
    ClassificationRunner, ColumnSelection, Config, CredentialPool, Event, GeminiClient,
    Result, ResultStore, RunConfig, RunMode, XlsxStore, run_until_signal, utils,
};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "sheet-classifier",
    version,
    about = "Classify spreadsheet rows with a generative model"
)]
struct Cli {
    /// Classification sheet (.xlsx) listing the candidate classes
    #[arg(long, short = 'k')]
    classes: PathBuf,

    /// Data sheet (.xlsx) whose rows are classified
    #[arg(long, short = 'd')]
    data: PathBuf,

    /// Directory for the output, archives and saved column selection
    #[arg(long, short = 'o', default_value = ".")]
    output_dir: PathBuf,

    /// Model, API keys and prompt (created with an example when missing)
    #[arg(long, default_value = "config.txt")]
    config: PathBuf,

    /// JSON file with runtime settings (retry, flush cadence, endpoint)
    #[arg(long)]
    settings: Option<PathBuf>,

    #[command(flatten)]
    columns: ColumnArgs,

    /// Continue an existing output, classifying only rows without an ID
    #[arg(long, conflicts_with = "fresh")]
    resume: bool,

    /// Archive any existing output and classify every row
    #[arg(long)]
    fresh: bool,

    /// Print the state of the existing output and exit
    #[arg(long)]
    status: bool,

    /// Attempts per row before it is left for a later resume
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Seconds to wait after a rate limit
    #[arg(long)]
    backoff_secs: Option<u64>,

    /// Save the output after this many rows
    #[arg(long)]
    flush_every: Option<usize>,

    /// Override the API base URL
    #[arg(long, env = "GEMINI_API_BASE")]
    api_base: Option<String>,
}

/// Column choices; anything left out is taken from the saved selection
#[derive(Args, Debug)]
struct ColumnArgs {
    /// Candidate ID column of the classification sheet
    #[arg(long)]
    klass_id_col: Option<String>,

    /// Candidate name column of the classification sheet
    #[arg(long)]
    klass_name_col: Option<String>,

    /// Context columns of the classification sheet (`;`-separated or repeated)
    #[arg(long, value_delimiter = ';')]
    klass_context_cols: Vec<String>,

    /// Text columns of the data sheet (`;`-separated or repeated)
    #[arg(long, value_delimiter = ';')]
    data_text_cols: Vec<String>,

    /// Data sheet column receiving the ID
    #[arg(long)]
    out_id_col: Option<String>,

    /// Data sheet column receiving the name
    #[arg(long)]
    out_name_col: Option<String>,
}

impl ColumnArgs {
    fn into_selection(self) -> ColumnSelection {
        ColumnSelection {
            klass_name_col: self.klass_name_col.unwrap_or_default(),
            klass_id_col: self.klass_id_col.unwrap_or_default(),
            klass_context_cols: self.klass_context_cols,
            data_text_cols: self.data_text_cols,
            out_name_col: self.out_name_col.unwrap_or_default(),
            out_id_col: self.out_id_col.unwrap_or_default(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    match run(Cli::parse()).await {
        Ok(code) => code,
        Err(e) => {
            error!(error = %e, "classification failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let mut config = match cli.settings.as_deref() {
        Some(path) => Config::from_json_file(path).await?,
        None => Config::default(),
    };
    if let Some(max_attempts) = cli.max_attempts {
        config.retry.max_attempts = max_attempts;
    }
    if let Some(secs) = cli.backoff_secs {
        config.retry.backoff = Duration::from_secs(secs);
    }
    if let Some(flush_every) = cli.flush_every {
        config.persistence.flush_interval = flush_every;
    }
    if let Some(api_base) = cli.api_base {
        config.model.api_base_url = api_base;
    }

    let local = LocalConfig::load_or_create(&cli.config).await?;
    let resolved = ResolvedCredentials::resolve(&SecretStore::from_env(), Some(&local));
    config.model.model_name = resolved.model_name.clone();

    let saved = ColumnSelection::load(&utils::settings_path(&cli.data, &cli.output_dir)?).await;
    let saved = drop_stale_columns(saved, &cli.classes, &cli.data).await;
    let columns = cli.columns.into_selection().or_saved(&saved);

    let mut run = RunConfig {
        classification_file: cli.classes,
        data_file: cli.data,
        output_dir: cli.output_dir,
        columns,
        mode: RunMode::Fresh,
        prompt_template: resolved.prompt_template.clone(),
    };

    let client = Arc::new(GeminiClient::new(&config.model)?);
    let runner = ClassificationRunner::new(config, client);
    let status = runner.status(&run).await?;

    if cli.status {
        match status {
            Some(s) => println!(
                "{}: {} of {} rows done, {} remaining",
                run.output_path()?.display(),
                s.done,
                s.total,
                s.remaining()
            ),
            None => println!("no output yet at {}", run.output_path()?.display()),
        }
        return Ok(ExitCode::SUCCESS);
    }

    run.mode = if cli.fresh {
        RunMode::Fresh
    } else if cli.resume || status.is_some_and(|s| s.remaining() > 0) {
        RunMode::Resume
    } else {
        RunMode::Fresh
    };
    if let Some(s) = status.filter(|_| run.mode == RunMode::Resume) {
        info!(done = s.done, total = s.total, "resuming previous output");
    }

    // fatal before any work when no key is configured
    let pool = CredentialPool::new(resolved.keys)?;
    info!(
        keys = pool.len(),
        source = ?resolved.key_source,
        model = %runner.config().model.model_name,
        "credentials loaded"
    );

    let printer = tokio::spawn(print_events(runner.subscribe()));
    let result = run_until_signal(&runner, &run, pool).await;
    drop(runner);
    printer.await.ok();

    match result? {
        Some((summary, _state)) => {
            println!(
                "done: {} classified, {} errors, {} left for resume -> {}",
                summary.succeeded,
                summary.failed,
                summary.deferred,
                summary.output_path.display()
            );
            if summary.needs_resume() {
                warn!(
                    deferred = summary.deferred,
                    "some rows are still pending, rerun with --resume"
                );
            }
            Ok(ExitCode::SUCCESS)
        }
        None => Ok(ExitCode::from(130)),
    }
}

/// Saved columns are only checked when both sheets can be read; otherwise the
/// run reports the unreadable sheet itself.
async fn drop_stale_columns(
    saved: ColumnSelection,
    classes: &Path,
    data: &Path,
) -> ColumnSelection {
    if saved == ColumnSelection::default() {
        return saved;
    }
    match (XlsxStore.load(classes).await, XlsxStore.load(data).await) {
        (Ok(klass), Ok(data)) => saved.retain_known(klass.headers(), data.headers()),
        _ => saved,
    }
}

async fn print_events(mut events: tokio::sync::broadcast::Receiver<Event>) {
    use tokio::sync::broadcast::error::RecvError;

    loop {
        match events.recv().await {
            Ok(Event::RunStarted { mode, pending, total_rows }) => {
                println!("{:?} run: {} of {} rows to classify", mode, pending, total_rows);
            }
            Ok(Event::Archived { path }) => {
                println!("previous output archived to {}", path.display());
            }
            Ok(Event::KeyRotated { key_index, key_count, row, .. }) => {
                println!(
                    "row {}: rate limited, switched to key {}/{}",
                    row + 1,
                    key_index + 1,
                    key_count
                );
            }
            Ok(Event::RowFailed { row, error }) => println!("row {}: ERROR {}", row + 1, error),
            Ok(Event::RowDeferred { row, attempts }) => {
                println!(
                    "row {}: still rate limited after {} attempts, left for resume",
                    row + 1,
                    attempts
                );
            }
            Ok(Event::Progress { processed, total, timestamp }) => {
                println!(
                    "[{}] {}/{} rows saved",
                    timestamp.format("%H:%M:%S"),
                    processed,
                    total
                );
            }
            Ok(Event::RowClassified { .. }) | Ok(Event::Completed { .. }) => {}
            Err(RecvError::Lagged(n)) => warn!(skipped = n, "event printer fell behind"),
            Err(RecvError::Closed) => break,
        }
    }
}
