// src/storage/bioc.rs
//! BioC-style JSON layouts for the three per-document outputs.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::assembler::StructuredDocument;
use crate::extractors::section::Section;
use crate::extractors::table::{Cell, Table};
use crate::utils::text::char_len;

pub const SOURCE: &str = "article_extractor";

type Infons = BTreeMap<String, String>;

#[derive(Debug, Serialize)]
pub struct Collection<D> {
    pub source: String,
    pub date: String,
    pub key: String,
    pub infons: Infons,
    pub documents: Vec<D>,
}

impl<D> Collection<D> {
    fn new(kind: &str, date: &str, documents: Vec<D>) -> Self {
        Self {
            source: format!("{} ({})", SOURCE, kind),
            date: date.to_string(),
            key: format!("{}_{}.key", SOURCE, kind),
            infons: Infons::new(),
            documents,
        }
    }
}

// --- Main text ---

#[derive(Debug, Serialize)]
pub struct Document {
    pub id: String,
    pub inputfile: String,
    pub infons: Infons,
    pub passages: Vec<Passage>,
    pub annotations: Vec<serde_json::Value>,
    pub relations: Vec<serde_json::Value>,
}

#[derive(Debug, Serialize)]
pub struct Passage {
    pub offset: usize,
    pub infons: Infons,
    pub text: String,
    pub sentences: Vec<serde_json::Value>,
    pub annotations: Vec<serde_json::Value>,
    pub relations: Vec<serde_json::Value>,
}

impl Passage {
    fn new(offset: usize, infons: Infons, text: String) -> Self {
        Self {
            offset,
            infons,
            text,
            sentences: Vec::new(),
            annotations: Vec::new(),
            relations: Vec::new(),
        }
    }
}

/// IAO term for a section type. Types without a known term keep an empty id.
fn iao_term(kind: &str) -> (String, &'static str) {
    let (name, id) = match kind {
        "document part" => ("document part", "IAO:0000314"),
        "abstract" => ("abstract section", "IAO:0000315"),
        "introduction" => ("introduction section", "IAO:0000316"),
        "methods" => ("methods section", "IAO:0000317"),
        "results" => ("results section", "IAO:0000318"),
        "discussion" => ("discussion section", "IAO:0000319"),
        "references" => ("references section", "IAO:0000320"),
        "supplementary" => ("supplementary material section", "IAO:0000326"),
        "keywords" => ("keywords section", "IAO:0000630"),
        other => return (format!("{} section", other), ""),
    };
    (name.to_string(), id)
}

fn typed_infons(headings: &[String], types: &[String]) -> Infons {
    let mut infons = Infons::new();
    for (i, heading) in headings.iter().enumerate() {
        infons.insert(format!("section_title_{}", i + 1), heading.clone());
    }
    for (i, kind) in types.iter().enumerate() {
        let (name, id) = iao_term(kind);
        infons.insert(format!("iao_name_{}", i + 1), name);
        infons.insert(format!("iao_id_{}", i + 1), id.to_string());
    }
    infons
}

fn push_section(section: &Section, headings: &mut Vec<String>, passages: &mut Vec<Passage>, offset: &mut usize) {
    headings.push(section.heading.clone());
    for paragraph in &section.paragraphs {
        passages.push(Passage::new(*offset, typed_infons(headings, &section.types), paragraph.clone()));
        *offset += char_len(paragraph);
    }
    for reference in &section.references {
        let mut infons = typed_infons(headings, &section.types);
        for (field, value) in &reference.fields {
            infons.insert(field.clone(), value.clone());
        }
        passages.push(Passage::new(*offset, infons, reference.text.clone()));
        *offset += char_len(&reference.text);
    }
    for sub in &section.subsections {
        push_section(sub, headings, passages, offset);
    }
    headings.pop();
}

pub fn main_text(doc: &StructuredDocument, date: &str) -> Collection<Document> {
    let mut passages = Vec::new();
    let mut offset = 0;

    let mut title_infons = Infons::new();
    title_infons.insert("iao_name_1".to_string(), "document title".to_string());
    title_infons.insert("iao_id_1".to_string(), "IAO:0000305".to_string());
    passages.push(Passage::new(offset, title_infons, doc.title.clone()));
    offset += char_len(&doc.title);

    if !doc.keywords.is_empty() {
        let text = doc.keywords.join("; ");
        let infons = typed_infons(&["Keywords".to_string()], &["keywords".to_string()]);
        passages.push(Passage::new(offset, infons, text.clone()));
        offset += char_len(&text);
    }

    let mut headings = Vec::new();
    for section in &doc.sections {
        push_section(section, &mut headings, &mut passages, &mut offset);
    }

    let document = Document {
        id: doc.id.clone(),
        inputfile: doc.source_file.clone(),
        infons: Infons::new(),
        passages,
        annotations: Vec::new(),
        relations: Vec::new(),
    };
    Collection::new("bioc", date, vec![document])
}

// --- Tables ---

#[derive(Debug, Serialize)]
pub struct TableDocument {
    pub inputfile: String,
    pub id: String,
    pub infons: Infons,
    pub passages: Vec<TablePassage>,
}

#[derive(Debug, Serialize)]
pub struct TablePassage {
    pub offset: usize,
    pub infons: Infons,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column_headings: Option<Vec<Cell>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_section: Option<Vec<DataSection>>,
}

#[derive(Debug, Serialize)]
pub struct DataSection {
    pub table_section_title_1: String,
    pub data_rows: Vec<Vec<Cell>>,
}

fn table_infons(title: &str, iao_name: &str, iao_id: &str) -> Infons {
    let mut infons = Infons::new();
    infons.insert("section_title_1".to_string(), title.to_string());
    infons.insert("iao_name_1".to_string(), iao_name.to_string());
    infons.insert("iao_id_1".to_string(), iao_id.to_string());
    infons
}

fn table_document(table: &Table) -> TableDocument {
    let mut passages = Vec::new();
    let mut offset = 0;
    let text_passage = |offset: usize, kind: &str, iao_name: &str, iao_id: &str, text: &str| TablePassage {
        offset,
        infons: table_infons(kind, iao_name, iao_id),
        text: Some(text.to_string()),
        column_headings: None,
        data_section: None,
    };

    passages.push(text_passage(offset, "table_title", "document title", "IAO:0000305", &table.title));
    offset += char_len(&table.title);
    if !table.caption.is_empty() {
        passages.push(text_passage(offset, "table_caption", "caption", "IAO:0000304", &table.caption));
        offset += char_len(&table.caption);
    }

    if table.content_available {
        let content_offset = offset;
        let data_section = table
            .sections
            .iter()
            .map(|section| DataSection {
                table_section_title_1: section.title.clone(),
                data_rows: section.rows.clone(),
            })
            .collect();
        offset += table
            .sections
            .iter()
            .flat_map(|s| s.rows.iter().flatten())
            .map(|cell| char_len(&cell.cell_text))
            .sum::<usize>();
        passages.push(TablePassage {
            offset: content_offset,
            infons: table_infons("table_content", "table", "IAO:0000306"),
            text: None,
            column_headings: Some(table.column_headings.clone()),
            data_section: Some(data_section),
        });
    }

    if !table.footer.is_empty() {
        passages.push(text_passage(offset, "table_footer", "caption", "IAO:0000304", &table.footer));
    }

    TableDocument {
        inputfile: table.provenance.first().map(|p| p.file.clone()).unwrap_or_default(),
        id: table.id.clone(),
        infons: Infons::new(),
        passages,
    }
}

pub fn tables(doc: &StructuredDocument, date: &str) -> Collection<TableDocument> {
    Collection::new("tables", date, doc.tables.iter().map(table_document).collect())
}

// --- Abbreviations ---

#[derive(Debug, Serialize)]
pub struct AbbreviationDocument {
    pub id: String,
    pub inputfile: String,
    pub passages: Vec<Infons>,
}

pub fn abbreviations(doc: &StructuredDocument, date: &str) -> Collection<AbbreviationDocument> {
    let passages = doc
        .abbreviations
        .entries
        .iter()
        .map(|entry| {
            let mut passage = Infons::new();
            passage.insert("text_short".to_string(), entry.short_form.clone());
            passage.insert("text_long_1".to_string(), entry.long_form.clone());
            let algorithms: Vec<&str> = entry.sources.iter().map(|s| s.label()).collect();
            passage.insert("extraction_algorithm_1".to_string(), algorithms.join(", "));
            passage
        })
        .collect();
    let document = AbbreviationDocument {
        id: doc.id.clone(),
        inputfile: doc.source_file.clone(),
        passages,
    };
    Collection::new("abbreviations", date, vec![document])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extractors::table::{Provenance, TableSection};

    fn cell(id: &str, text: &str) -> Cell {
        Cell { cell_id: id.to_string(), cell_text: text.to_string() }
    }

    #[test]
    fn test_table_document_shape() {
        let table = Table {
            id: "2".to_string(),
            number: Some(2),
            title: "Table 2".to_string(),
            caption: "Associations".to_string(),
            footer: String::new(),
            column_headings: vec![cell("2.1.1", "SNP"), cell("2.1.2", "P")],
            sections: vec![TableSection {
                title: "Men".to_string(),
                rows: vec![vec![cell("2.2.1", "rs1"), cell("2.2.2", "0.01")]],
            }],
            provenance: vec![Provenance::inline("a.html")],
            content_available: true,
            truncated: false,
        };
        let value = serde_json::to_value(table_document(&table)).expect("json");
        let passages = value["passages"].as_array().expect("passages");
        assert_eq!(passages.len(), 3);
        assert_eq!(passages[1]["offset"], 7);
        assert_eq!(passages[2]["column_headings"][1]["cell_id"], "2.1.2");
        assert_eq!(passages[2]["data_section"][0]["table_section_title_1"], "Men");
        assert_eq!(passages[2]["data_section"][0]["data_rows"][0][0]["cell_text"], "rs1");
        assert!(passages[2].get("text").is_none());
    }

    #[test]
    fn test_unknown_section_type_has_empty_iao_id() {
        assert_eq!(iao_term("methods"), ("methods section".to_string(), "IAO:0000317"));
        assert_eq!(iao_term("funding"), ("funding section".to_string(), ""));
    }
}
