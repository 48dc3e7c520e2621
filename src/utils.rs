//! Path helpers for derived artifacts
//!
//! Every artifact of a run is named after the data file's stem:
//! - `<stem>_out.xlsx` holds the results
//! - `<stem>_out_<yyMMdd-HHmm>.xlsx` holds archived results
//! - `<stem>_config.txt` holds the last column selection

use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};

/// Maximum number of suffixes tried when an archive name is taken
const MAX_RENAME_ATTEMPTS: u32 = 9999;

/// Compact, sortable timestamp used in archive names
pub const ARCHIVE_TIMESTAMP_FORMAT: &str = "%y%m%d-%H%M";

fn stem_of(data_file: &Path) -> Result<&str> {
    data_file
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| {
            Error::config(
                format!("cannot derive a file name from '{}'", data_file.display()),
                "data_file",
            )
        })
}

/// Output spreadsheet path for `data_file`, placed in `dir`
///
/// # Examples
///
/// ```
/// use sheet_classifier::utils::output_path;
/// use std::path::Path;
///
/// let out = output_path(Path::new("/in/tickets.xlsx"), Path::new("/work")).unwrap();
/// assert_eq!(out, Path::new("/work/tickets_out.xlsx"));
/// ```
pub fn output_path(data_file: &Path, dir: &Path) -> Result<PathBuf> {
    Ok(dir.join(format!("{}_out.xlsx", stem_of(data_file)?)))
}

/// Saved column-selection path for `data_file`, placed in `dir`
pub fn settings_path(data_file: &Path, dir: &Path) -> Result<PathBuf> {
    Ok(dir.join(format!("{}_config.txt", stem_of(data_file)?)))
}

/// Archive name for an existing output, stamped with `now`
///
/// When the stamped name is already taken (two restarts in the same minute),
/// ` (1)`, ` (2)`, ... is appended so an older archive is never overwritten.
pub fn archive_path(output: &Path, now: DateTime<Local>) -> Result<PathBuf> {
    let stem = stem_of(output)?;
    let parent = output.parent().unwrap_or_else(|| Path::new(""));
    let stamp = now.format(ARCHIVE_TIMESTAMP_FORMAT);

    let candidate = parent.join(format!("{}_{}.xlsx", stem, stamp));
    if !candidate.exists() {
        return Ok(candidate);
    }

    for i in 1..=MAX_RENAME_ATTEMPTS {
        let candidate = parent.join(format!("{}_{} ({}).xlsx", stem, stamp, i));
        if !candidate.exists() {
            return Ok(candidate);
        }
    }

    Err(Error::Other(format!(
        "could not find a free archive name for '{}' after {} attempts",
        output.display(),
        MAX_RENAME_ATTEMPTS
    )))
}

/// Sibling path used for write-then-rename saves
pub fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("output.xlsx");
    path.with_file_name(format!(".{}.partial.xlsx", name.trim_end_matches(".xlsx")))
}
