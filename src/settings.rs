//! Saved column selections (`<stem>_config.txt`)
//!
//! One `key=value` line per setting; list values are `;`-joined. Loading is
//! forgiving: a missing file yields defaults, an unreadable file yields
//! defaults plus a warning, and lines without `=` or with unknown keys are
//! skipped.

use crate::error::Result;
use std::path::Path;
use tracing::{info, warn};

const KLASS_NAME_COL: &str = "klass_name_col";
const KLASS_ID_COL: &str = "klass_id_col";
const KLASS_CONTEXT_COLS: &str = "klass_context_cols";
const DATA_TEXT_COLS: &str = "data_text_cols";
const OUT_NAME_COL: &str = "out_name_col";
const OUT_ID_COL: &str = "out_id_col";

/// Which columns a run reads and writes
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ColumnSelection {
    /// Classification sheet: candidate name column
    pub klass_name_col: String,
    /// Classification sheet: candidate ID column
    pub klass_id_col: String,
    /// Classification sheet: context columns shown to the model
    pub klass_context_cols: Vec<String>,
    /// Data sheet: columns whose text is classified
    pub data_text_cols: Vec<String>,
    /// Data sheet: column receiving the resolved name
    pub out_name_col: String,
    /// Data sheet: column receiving the ID
    pub out_id_col: String,
}

impl ColumnSelection {
    /// Parse `key=value` lines
    pub fn parse(content: &str) -> Self {
        let mut selection = Self::default();
        for line in content.lines() {
            let Some((key, value)) = line.trim().split_once('=') else {
                continue;
            };
            let value = value.trim();
            match key.trim() {
                KLASS_NAME_COL => selection.klass_name_col = value.to_string(),
                KLASS_ID_COL => selection.klass_id_col = value.to_string(),
                KLASS_CONTEXT_COLS => selection.klass_context_cols = split_list(value),
                DATA_TEXT_COLS => selection.data_text_cols = split_list(value),
                OUT_NAME_COL => selection.out_name_col = value.to_string(),
                OUT_ID_COL => selection.out_id_col = value.to_string(),
                _ => {}
            }
        }
        selection
    }

    /// Render as `key=value` lines
    pub fn render(&self) -> String {
        [
            (KLASS_NAME_COL, self.klass_name_col.clone()),
            (KLASS_ID_COL, self.klass_id_col.clone()),
            (KLASS_CONTEXT_COLS, self.klass_context_cols.join(";")),
            (DATA_TEXT_COLS, self.data_text_cols.join(";")),
            (OUT_NAME_COL, self.out_name_col.clone()),
            (OUT_ID_COL, self.out_id_col.clone()),
        ]
        .iter()
        .map(|(k, v)| format!("{}={}\n", k, v))
        .collect()
    }

    /// Load from `path`, falling back to defaults when missing or unreadable
    pub async fn load(path: &Path) -> Self {
        match tokio::fs::read_to_string(path).await {
            Ok(content) => {
                info!(path = %path.display(), "loaded previous column selection");
                Self::parse(&content)
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Self::default(),
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "could not read saved settings, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Write to `path`
    pub async fn save(&self, path: &Path) -> Result<()> {
        tokio::fs::write(path, self.render()).await?;
        info!(path = %path.display(), "saved column selection");
        Ok(())
    }

    /// Fill empty fields of `self` from `saved`
    ///
    /// Explicit choices win; saved values only pre-fill what was left unset.
    #[must_use]
    pub fn or_saved(mut self, saved: &ColumnSelection) -> Self {
        fn fill(field: &mut String, saved: &str) {
            if field.trim().is_empty() {
                *field = saved.to_string();
            }
        }
        fn fill_list(field: &mut Vec<String>, saved: &[String]) {
            if field.is_empty() {
                *field = saved.to_vec();
            }
        }

        fill(&mut self.klass_name_col, &saved.klass_name_col);
        fill(&mut self.klass_id_col, &saved.klass_id_col);
        fill_list(&mut self.klass_context_cols, &saved.klass_context_cols);
        fill_list(&mut self.data_text_cols, &saved.data_text_cols);
        fill(&mut self.out_name_col, &saved.out_name_col);
        fill(&mut self.out_id_col, &saved.out_id_col);
        self
    }

    /// Drop saved columns the sheets no longer have
    ///
    /// `klass_headers` and `data_headers` are the current header rows. The
    /// output columns are left alone since a run creates them when missing.
    #[must_use]
    pub fn retain_known(mut self, klass_headers: &[String], data_headers: &[String]) -> Self {
        fn keep(field: &mut String, headers: &[String], key: &str) {
            let name = field.trim();
            if !name.is_empty() && !headers.iter().any(|h| h.trim() == name) {
                warn!(key, column = name, "saved column no longer exists, dropping it");
                field.clear();
            }
        }
        fn keep_list(field: &mut Vec<String>, headers: &[String], key: &str) {
            field.retain(|name| {
                let known = headers.iter().any(|h| h.trim() == name.trim());
                if !known {
                    warn!(key, column = %name, "saved column no longer exists, dropping it");
                }
                known
            });
        }

        keep(&mut self.klass_name_col, klass_headers, KLASS_NAME_COL);
        keep(&mut self.klass_id_col, klass_headers, KLASS_ID_COL);
        keep_list(&mut self.klass_context_cols, klass_headers, KLASS_CONTEXT_COLS);
        keep_list(&mut self.data_text_cols, data_headers, DATA_TEXT_COLS);
        self
    }
}

fn split_list(value: &str) -> Vec<String> {
    value
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn selection() -> ColumnSelection {
        ColumnSelection {
            klass_name_col: "Name".into(),
            klass_id_col: "ID".into(),
            klass_context_cols: vec!["Hint".into(), "Examples".into()],
            data_text_cols: vec!["Subject".into(), "Body".into()],
            out_name_col: "Category".into(),
            out_id_col: "Category ID".into(),
        }
    }

    #[test]
    fn render_uses_key_value_lines() {
        let rendered = selection().render();
        assert!(rendered.contains("klass_context_cols=Hint;Examples\n"));
        assert!(rendered.contains("out_id_col=Category ID\n"));
        assert_eq!(rendered.lines().count(), 6);
    }

    #[test]
    fn parse_skips_malformed_and_unknown_lines() {
        let parsed = ColumnSelection::parse(
            "garbage line\nklass_id_col=Code\nunknown=1\ndata_text_cols=A;;B\n=\n",
        );
        assert_eq!(parsed.klass_id_col, "Code");
        assert_eq!(parsed.data_text_cols, vec!["A", "B"]);
        assert!(parsed.klass_name_col.is_empty());
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let parsed = ColumnSelection::parse("out_name_col=a=b\n");
        assert_eq!(parsed.out_name_col, "a=b");
    }

    #[tokio::test]
    async fn missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let loaded = ColumnSelection::load(&dir.path().join("none_config.txt")).await;
        assert_eq!(loaded, ColumnSelection::default());
    }

    #[tokio::test]
    async fn saved_selection_loads_back() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("tickets_config.txt");
        selection().save(&path).await.unwrap();
        assert_eq!(ColumnSelection::load(&path).await, selection());
    }

    #[test]
    fn explicit_values_win_over_saved() {
        let explicit = ColumnSelection {
            out_id_col: "Chosen".into(),
            ..Default::default()
        };
        let merged = explicit.or_saved(&selection());
        assert_eq!(merged.out_id_col, "Chosen");
        assert_eq!(merged.klass_name_col, "Name");
        assert_eq!(merged.data_text_cols, vec!["Subject", "Body"]);
    }

    #[test]
    fn stale_saved_columns_are_dropped() {
        let klass = vec!["ID".to_string(), "Hint".to_string()];
        let data = vec!["Body".to_string(), "Status".to_string()];

        let kept = selection().retain_known(&klass, &data);

        assert_eq!(kept.klass_id_col, "ID");
        assert!(kept.klass_name_col.is_empty());
        assert_eq!(kept.klass_context_cols, vec!["Hint"]);
        assert_eq!(kept.data_text_cols, vec!["Body"]);
        assert_eq!(kept.out_name_col, "Category");
        assert_eq!(kept.out_id_col, "Category ID");
    }
}
