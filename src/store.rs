//! Spreadsheet persistence for input sheets and the result table
//!
//! Reading goes through `calamine`, writing through `rust_xlsxwriter`. Both
//! are blocking, so the async entry points hand the work to
//! `spawn_blocking`.

use crate::error::{Error, Result};
use crate::table::Table;
use crate::utils::{archive_path, temp_sibling};
use async_trait::async_trait;
use calamine::{Data, ExcelDateTime, Reader, open_workbook_auto};
use chrono::{DateTime, Local};
use rust_xlsxwriter::{Format, Workbook};
use std::path::{Path, PathBuf};
use tokio::task::spawn_blocking;
use tracing::{debug, info, warn};

/// Most characters a single spreadsheet cell can hold
pub const MAX_CELL_CHARS: usize = 32_767;

/// How date cells are rendered as text
pub const DATETIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Where input sheets come from and where the result table goes
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Load the table stored at `path`
    async fn load(&self, path: &Path) -> Result<Table>;

    /// Load `path` if it exists
    async fn load_if_exists(&self, path: &Path) -> Result<Option<Table>>;

    /// Write the whole table to `path`
    async fn save(&self, path: &Path, table: &Table) -> Result<()>;

    /// Move an existing `path` aside under a name stamped with `now`
    ///
    /// Returns the new location, or `None` when there was nothing to move.
    async fn archive(&self, path: &Path, now: DateTime<Local>) -> Result<Option<PathBuf>>;
}

/// Reads and writes `.xlsx` tables
///
/// Only the first worksheet is used; its first row is the header.
#[derive(Debug, Clone, Copy, Default)]
pub struct XlsxStore;

#[async_trait]
impl ResultStore for XlsxStore {
    async fn load(&self, path: &Path) -> Result<Table> {
        let path = path.to_path_buf();
        run_blocking(move || read_table(&path)).await
    }

    async fn load_if_exists(&self, path: &Path) -> Result<Option<Table>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        self.load(path).await.map(Some)
    }

    /// The workbook is written to a hidden sibling first and renamed over
    /// `path`, so an interrupted save leaves the previous file intact. Cells
    /// longer than [`MAX_CELL_CHARS`] are cut to that length.
    async fn save(&self, path: &Path, table: &Table) -> Result<()> {
        let path = path.to_path_buf();
        let table = table.clone();
        run_blocking(move || write_table(&path, &table)).await
    }

    /// Never deletes anything.
    async fn archive(&self, path: &Path, now: DateTime<Local>) -> Result<Option<PathBuf>> {
        if !tokio::fs::try_exists(path).await? {
            return Ok(None);
        }
        let target = archive_path(path, now)?;
        tokio::fs::rename(path, &target).await?;
        info!(from = %path.display(), to = %target.display(), "archived previous output");
        Ok(Some(target))
    }
}

async fn run_blocking<T, F>(f: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    spawn_blocking(f)
        .await
        .map_err(|e| Error::Other(format!("spreadsheet task panicked: {}", e)))?
}

/// Render one cell the way it reads in the spreadsheet
fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Int(i) => i.to_string(),
        // Display drops the fractional part of integral floats ("7", not "7.0")
        Data::Float(f) => f.to_string(),
        Data::Bool(b) => String::from(if *b { "True" } else { "False" }),
        Data::DateTime(dt) => datetime_to_string(dt),
        Data::DateTimeIso(s) => s.replacen('T', " ", 1),
        Data::DurationIso(s) => s.clone(),
        other => other.to_string(),
    }
}

fn datetime_to_string(dt: &ExcelDateTime) -> String {
    if dt.is_duration() {
        if let Some(d) = dt.as_duration() {
            let secs = d.num_seconds();
            return format!("{}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60);
        }
    }
    dt.as_datetime()
        .map(|d| d.format(DATETIME_FORMAT).to_string())
        .unwrap_or_else(|| dt.as_f64().to_string())
}

/// `cell` cut to [`MAX_CELL_CHARS`] characters
fn fit_cell(cell: &str) -> &str {
    match cell.char_indices().nth(MAX_CELL_CHARS) {
        Some((end, _)) => &cell[..end],
        None => cell,
    }
}

fn read_table(path: &Path) -> Result<Table> {
    let mut workbook = open_workbook_auto(path).map_err(|e| Error::workbook(path, e))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| Error::workbook(path, "workbook has no worksheets"))?
        .map_err(|e| Error::workbook(path, e))?;

    let mut rows = range.rows();
    let headers: Vec<String> = rows
        .next()
        .map(|header| {
            header
                .iter()
                .enumerate()
                .map(|(idx, cell)| {
                    let name = cell_to_string(cell).trim().to_string();
                    if name.is_empty() {
                        format!("Unnamed: {}", idx)
                    } else {
                        name
                    }
                })
                .collect()
        })
        .unwrap_or_default();

    let data: Vec<Vec<String>> = rows
        .map(|row| row.iter().map(cell_to_string).collect())
        .collect();

    debug!(
        path = %path.display(),
        columns = headers.len(),
        rows = data.len(),
        "loaded worksheet"
    );

    Ok(Table::new(headers, data))
}

fn write_table(path: &Path, table: &Table) -> Result<()> {
    let tmp = temp_sibling(path);
    let mut workbook = Workbook::new();
    let worksheet = workbook.add_worksheet();
    let bold = Format::new().set_bold();

    let mut cut = 0usize;

    for (col, header) in table.headers().iter().enumerate() {
        worksheet
            .write_string_with_format(0, column_number(path, col)?, fit_cell(header), &bold)
            .map_err(|e| Error::workbook(path, e))?;
    }

    for (idx, row) in table.rows().iter().enumerate() {
        let row_num = u32::try_from(idx + 1).map_err(|_| {
            Error::workbook(path, format!("row {} exceeds sheet limits", idx + 1))
        })?;
        for (col, cell) in row.iter().enumerate() {
            if cell.is_empty() {
                continue;
            }
            let fitted = fit_cell(cell);
            if fitted.len() < cell.len() {
                cut += 1;
            }
            worksheet
                .write_string(row_num, column_number(path, col)?, fitted)
                .map_err(|e| Error::workbook(path, e))?;
        }
    }

    if cut > 0 {
        warn!(
            path = %path.display(),
            cells = cut,
            max_chars = MAX_CELL_CHARS,
            "cut overlong cells to the spreadsheet limit"
        );
    }

    workbook.save(&tmp).map_err(|e| Error::workbook(&tmp, e))?;
    std::fs::rename(&tmp, path)?;

    debug!(path = %path.display(), rows = table.len(), "saved worksheet");
    Ok(())
}

fn column_number(path: &Path, col: usize) -> Result<u16> {
    u16::try_from(col)
        .map_err(|_| Error::workbook(path, format!("column {} exceeds sheet limits", col)))
}
