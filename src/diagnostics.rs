// src/diagnostics.rs
//! Non-fatal findings collected while extracting one document. They are
//! written next to the document's outputs for operator review.

use serde::Serialize;

use crate::extractors::table::{ParsedTable, Provenance};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Diagnostic {
    /// A configured rule located nothing in this document.
    UnmatchedRegion { rule: String },
    /// A rule's regions were found but one of its data entries never matched.
    UnmatchedData { rule: String, data: String },
    /// Two sources claimed the same table number; the first one seen is kept
    /// and missing fields are filled from the other.
    DuplicateTable {
        number: u32,
        kept: Provenance,
        other: Provenance,
        other_table: Box<ParsedTable>,
    },
    /// A table was found (usually caption only) but had no rows.
    TableContentUnavailable { table_id: String, number: Option<u32> },
    /// A table's cell grid hit its size limits and trailing cells were dropped.
    TableTruncated { table_id: String, number: Option<u32> },
    /// The text mentions a table number that no source provides.
    TableReferenceUnresolved { number: u32, section: String },
    /// Several long-forms were seen for one short-form.
    AbbreviationConflict {
        short_form: String,
        chosen: String,
        rejected: Vec<String>,
        reason: String,
    },
}

impl Diagnostic {
    pub fn kind(&self) -> &'static str {
        match self {
            Diagnostic::UnmatchedRegion { .. } => "unmatched-region",
            Diagnostic::UnmatchedData { .. } => "unmatched-data",
            Diagnostic::DuplicateTable { .. } => "duplicate-table",
            Diagnostic::TableContentUnavailable { .. } => "table-content-unavailable",
            Diagnostic::TableTruncated { .. } => "table-truncated",
            Diagnostic::TableReferenceUnresolved { .. } => "table-reference-unresolved",
            Diagnostic::AbbreviationConflict { .. } => "abbreviation-conflict",
        }
    }
}
