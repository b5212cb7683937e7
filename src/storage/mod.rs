// src/storage/mod.rs
pub mod bioc;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::assembler::StructuredDocument;
use crate::diagnostics::Diagnostic;
use crate::utils::error::StorageError;

#[derive(Debug, Serialize)]
struct DiagnosticsReport<'a> {
    document: &'a str,
    date: &'a str,
    unresolved_abbreviations: usize,
    counts: BTreeMap<&'static str, usize>,
    diagnostics: &'a [Diagnostic],
}

pub struct StorageManager {
    base_dir: PathBuf,
}

impl StorageManager {
    /// Creates a new StorageManager with the specified base directory
    pub fn new<P: AsRef<Path>>(base_dir: P) -> Result<Self, StorageError> {
        let base_path = base_dir.as_ref().to_path_buf();

        if !base_path.exists() {
            fs::create_dir_all(&base_path).map_err(StorageError::IoError)?;
        }

        Ok(Self { base_dir: base_path })
    }

    fn write_json<T: Serialize>(&self, filename: &str, value: &T) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(filename);
        let content = serde_json::to_string_pretty(value)
            .map_err(|e| StorageError::SerializationError(e.to_string()))?;
        fs::write(&file_path, content).map_err(StorageError::IoError)?;
        tracing::debug!("Wrote {}", file_path.display());
        Ok(file_path)
    }

    /// Writes every output for one document. `date` is a `YYYYMMDD` stamp
    /// chosen by the caller so repeated runs can produce identical files.
    pub fn save_document(&self, doc: &StructuredDocument, date: &str) -> Result<Vec<PathBuf>, StorageError> {
        let mut written = vec![self.write_json(&format!("{}_bioc.json", doc.id), &bioc::main_text(doc, date))?];

        if !doc.tables.is_empty() {
            written.push(self.write_json(&format!("{}_tables.json", doc.id), &bioc::tables(doc, date))?);
        }

        written.push(self.write_json(
            &format!("{}_abbreviations.json", doc.id),
            &bioc::abbreviations(doc, date),
        )?);

        let mut counts: BTreeMap<&'static str, usize> = BTreeMap::new();
        for diagnostic in &doc.diagnostics {
            *counts.entry(diagnostic.kind()).or_default() += 1;
        }
        let report = DiagnosticsReport {
            document: &doc.id,
            date,
            unresolved_abbreviations: doc.abbreviations.unresolved,
            counts,
            diagnostics: &doc.diagnostics,
        };
        written.push(self.write_json(&format!("{}_diagnostics.json", doc.id), &report)?);

        tracing::info!("Saved {} output files for {}", written.len(), doc.id);
        Ok(written)
    }

    /// Records why a document group failed (debug mode).
    pub fn save_failure(&self, id: &str, error: &str) -> Result<PathBuf, StorageError> {
        let file_path = self.base_dir.join(format!("{}_failure.txt", id));
        fs::write(&file_path, format!("Failed to extract {}: {}\n", id, error)).map_err(StorageError::IoError)?;
        tracing::info!("Saved failure info to {}", file_path.display());
        Ok(file_path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assembler::{DocumentAssembler, DocumentInput};
    use crate::config::Config;
    use crate::document::html::parse_html;

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("article_extractor_{}_{}", name, std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        dir
    }

    #[test]
    fn test_save_document_writes_outputs() {
        let config = Config::from_json_str(
            r#"{"sections": {"defined-by": [{"tag": "section"}], "data": {"headers": [{"tag": "h2"}]}}}"#,
        )
        .expect("config");
        let tree = parse_html("<section><h2>Results</h2><p>The body mass index (BMI) rose.</p></section>");
        let doc = DocumentAssembler::new(&config)
            .assemble(&DocumentInput::new("PMC9", "PMC9.html", tree))
            .expect("assembled");

        let dir = scratch_dir("storage");
        let storage = StorageManager::new(&dir).expect("storage dir");
        let written = storage.save_document(&doc, "20240101").expect("saved");

        let names: Vec<String> = written
            .iter()
            .filter_map(|p| p.file_name().map(|n| n.to_string_lossy().into_owned()))
            .collect();
        // no tables, so no tables file
        assert_eq!(names, vec!["PMC9_bioc.json", "PMC9_abbreviations.json", "PMC9_diagnostics.json"]);

        let bioc: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written[0]).expect("read")).expect("json");
        assert_eq!(bioc["date"], "20240101");
        let passages = bioc["documents"][0]["passages"].as_array().expect("passages");
        assert_eq!(passages[1]["infons"]["section_title_1"], "Results");
        assert_eq!(passages[1]["infons"]["iao_id_1"], "IAO:0000318");

        let abbreviations: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(&written[1]).expect("read")).expect("json");
        assert_eq!(abbreviations["documents"][0]["passages"][0]["text_long_1"], "body mass index");

        let _ = fs::remove_dir_all(&dir);
    }

    #[test]
    fn test_diagnostics_report_counts_by_kind() {
        let config = Config::from_json_str(
            r#"{"sections": {"defined-by": [{"tag": "section"}], "data": {"headers": [{"tag": "h2"}]}},
                "tables": {"defined-by": [{"tag": "div", "attrs": {"class": "table-wrap"}}],
                           "data": {"caption": [{"tag": "p"}]}}}"#,
        )
        .expect("config");
        let tree = parse_html(
            r#"<section><h2>Results</h2><p>Body.</p></section>
               <div class="table-wrap"><p>Table 1. Online only</p></div>
               <div class="table-wrap"><p>Table 2. Online only</p></div>"#,
        );
        let doc = DocumentAssembler::new(&config)
            .assemble(&DocumentInput::new("PMC10", "PMC10.html", tree))
            .expect("assembled");

        let dir = scratch_dir("report");
        let storage = StorageManager::new(&dir).expect("storage dir");
        let written = storage.save_document(&doc, "20240101").expect("saved");
        let report_path = written.last().expect("diagnostics file");
        let report: serde_json::Value =
            serde_json::from_str(&fs::read_to_string(report_path).expect("read")).expect("json");

        assert_eq!(report["counts"]["table-content-unavailable"], 2);
        // counts are keyed by the same kind tag each diagnostic serializes with
        let diagnostics = report["diagnostics"].as_array().expect("diagnostics");
        for diagnostic in diagnostics {
            let kind = diagnostic["kind"].as_str().expect("kind tag");
            assert!(report["counts"][kind].as_u64().unwrap_or(0) > 0, "missing count for {}", kind);
        }
        let total: u64 = report["counts"]
            .as_object()
            .expect("counts")
            .values()
            .filter_map(|v| v.as_u64())
            .sum();
        assert_eq!(total as usize, diagnostics.len());

        let _ = fs::remove_dir_all(&dir);
    }
}
