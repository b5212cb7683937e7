// src/extractors/mod.rs
pub mod abbreviation;
pub mod heading;
pub mod locator;
pub mod pattern;
pub mod section;
pub mod table;

// Re-export key extraction types for convenience
pub use abbreviation::{AbbreviationEntry, AbbreviationExtractor, AbbreviationResult};
pub use locator::{find, locate, Region};
pub use pattern::{matches, matches_any};
pub use section::{Reference, Section, SectionExtractor};
pub use table::{merge_tables, ParsedTable, Provenance, Table, TableExtractor, TableGrid};
