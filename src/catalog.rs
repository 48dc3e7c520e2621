//! Candidate catalog: the classification options embedded in every prompt

use crate::error::Result;
use crate::table::Table;

/// Display name written for IDs that match no candidate
pub const NOT_FOUND: &str = "NOT FOUND";

/// One classification option
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    /// Identifier the model is asked to return
    pub id: String,
    /// Human-readable name written next to the ID
    pub name: String,
    /// Free-text context shown to the model
    pub context: String,
}

impl Candidate {
    /// Convenience constructor
    pub fn new(id: impl Into<String>, name: impl Into<String>, context: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            context: context.into(),
        }
    }
}

/// Outcome of looking an ID up in the catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution<'a> {
    /// A candidate with this ID exists; holds its name
    Found(&'a str),
    /// No candidate has this ID (an expected outcome, not an error)
    NotFound,
}

impl<'a> Resolution<'a> {
    /// The candidate name, or [`NOT_FOUND`]
    pub fn display_name(self) -> &'a str {
        match self {
            Resolution::Found(name) => name,
            Resolution::NotFound => NOT_FOUND,
        }
    }
}

/// Immutable set of candidates plus their prompt serialization
///
/// Built once per run; the text block is computed at construction time.
#[derive(Debug, Clone)]
pub struct CandidateCatalog {
    candidates: Vec<Candidate>,
    text: String,
}

impl CandidateCatalog {
    /// Build the catalog; serialization preserves input order
    ///
    /// Each candidate becomes one `ID | name | context` line.
    pub fn build(candidates: Vec<Candidate>) -> Self {
        let text = candidates
            .iter()
            .map(|c| format!("{} | {} | {}", c.id.trim(), c.name.trim(), c.context))
            .collect::<Vec<_>>()
            .join("\n");

        Self { candidates, text }
    }

    /// Build from the classification sheet using the selected columns
    pub fn from_table(
        table: &Table,
        id_column: &str,
        name_column: &str,
        context_columns: &[String],
    ) -> Result<Self> {
        const SHEET: &str = "classification sheet";
        let id_col = table.require_column(id_column, SHEET)?;
        let name_col = table.require_column(name_column, SHEET)?;
        let context_cols = table.require_columns(context_columns, SHEET)?;

        let candidates = (0..table.len())
            .map(|row| Candidate {
                id: table.cell(row, id_col).to_string(),
                name: table.cell(row, name_col).to_string(),
                context: table.joined(row, &context_cols),
            })
            .collect();

        Ok(Self::build(candidates))
    }

    /// Prompt-ready listing of every candidate
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Candidates in input order
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    /// Number of candidates
    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    /// Whether the catalog holds no candidates
    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Look up a candidate name by exact, trimmed ID; first match wins
    pub fn resolve(&self, id: &str) -> Resolution<'_> {
        let id = id.trim();
        self.candidates
            .iter()
            .find(|c| c.id.trim() == id)
            .map_or(Resolution::NotFound, |c| Resolution::Found(&c.name))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn billing_network() -> CandidateCatalog {
        CandidateCatalog::build(vec![
            Candidate::new("1", "Billing", ""),
            Candidate::new("2", "Network", ""),
        ])
    }

    #[test]
    fn text_is_one_pipe_delimited_line_per_candidate() {
        let catalog = CandidateCatalog::build(vec![
            Candidate::new("1", "Billing", "invoices refunds"),
            Candidate::new("2", "Network", ""),
        ]);
        assert_eq!(catalog.text(), "1 | Billing | invoices refunds\n2 | Network | ");
    }

    #[test]
    fn resolve_exact_trimmed_match() {
        let catalog = billing_network();
        assert_eq!(catalog.resolve(" 2 "), Resolution::Found("Network"));
        assert_eq!(catalog.resolve("2").display_name(), "Network");
    }

    #[test]
    fn resolve_unknown_id_returns_sentinel() {
        let catalog = billing_network();
        assert_eq!(catalog.resolve("42"), Resolution::NotFound);
        assert_eq!(catalog.resolve("").display_name(), NOT_FOUND);
        assert_eq!(catalog.resolve("Billing"), Resolution::NotFound);
    }

    #[test]
    fn duplicate_ids_resolve_to_first() {
        let catalog = CandidateCatalog::build(vec![
            Candidate::new("5", "First", ""),
            Candidate::new("5", "Second", ""),
        ]);
        assert_eq!(catalog.resolve("5"), Resolution::Found("First"));
    }

    #[test]
    fn from_table_joins_context_columns() {
        let table = Table::new(
            vec!["Code".into(), "Title".into(), "Hint".into(), "More".into()],
            vec![
                vec!["10".into(), "Hardware".into(), "printers".into(), "scanners".into()],
                vec!["20".into(), "Access".into(), "".into(), "passwords".into()],
            ],
        );
        let catalog =
            CandidateCatalog::from_table(&table, "Code", "Title", &["Hint".into(), "More".into()])
                .unwrap();

        assert_eq!(catalog.len(), 2);
        assert_eq!(
            catalog.text(),
            "10 | Hardware | printers scanners\n20 | Access |  passwords"
        );
    }

    #[test]
    fn from_table_rejects_unknown_column() {
        let table = Table::new(vec!["Code".into()], vec![]);
        let err = CandidateCatalog::from_table(&table, "Code", "Title", &[]).unwrap_err();
        assert!(err.to_string().contains("Title"));
    }
}
