// src/assembler/mod.rs
//! Runs the extraction pipeline for one document group and composes the
//! structured record handed to storage.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::{Config, SectionKind};
use crate::diagnostics::Diagnostic;
use crate::document::DocumentTree;
use crate::extractors::abbreviation::{AbbreviationExtractor, AbbreviationResult};
use crate::extractors::locator::{find, locate};
use crate::extractors::section::{Section, SectionExtractor};
use crate::extractors::table::{merge_tables, Provenance, Table, TableExtractor, TableGrid};
use crate::utils::error::DocumentError;
use crate::utils::text::clean_text;

static KEYWORDS_LABEL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*key\s*-?\s*words?\s*[:.]?\s*").expect("Failed to compile KEYWORDS_LABEL_RE")
});

static KEYWORD_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[;,]").expect("Failed to compile KEYWORD_SPLIT_RE"));

static TABLE_MENTION_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btables?\s+(\d+)").expect("Failed to compile TABLE_MENTION_RE"));

/// Everything one document group contributes: the main document plus any
/// separately supplied tables.
#[derive(Debug)]
pub struct DocumentInput {
    pub id: String,
    pub main_file: String,
    pub main: DocumentTree,
    /// Parsed external table documents, with their file names.
    pub linked_tables: Vec<(String, DocumentTree)>,
    /// Pre-parsed grids from spreadsheet/OCR collaborators.
    pub grids: Vec<(Provenance, Option<u32>, TableGrid)>,
}

impl DocumentInput {
    pub fn new(id: impl Into<String>, main_file: impl Into<String>, main: DocumentTree) -> Self {
        Self {
            id: id.into(),
            main_file: main_file.into(),
            main,
            linked_tables: Vec::new(),
            grids: Vec::new(),
        }
    }
}

/// The extraction result for one document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StructuredDocument {
    pub id: String,
    pub source_file: String,
    pub title: String,
    pub keywords: Vec<String>,
    pub sections: Vec<Section>,
    pub tables: Vec<Table>,
    pub abbreviations: AbbreviationResult,
    pub diagnostics: Vec<Diagnostic>,
}

pub struct DocumentAssembler<'c> {
    config: &'c Config,
}

impl<'c> DocumentAssembler<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    pub fn assemble(&self, input: &DocumentInput) -> Result<StructuredDocument, DocumentError> {
        let tree = &input.main;
        tracing::info!("Assembling document {}", input.id);

        let title = self.title(tree);
        let keywords = self.keywords(tree);

        let section_extractor = SectionExtractor::new(self.config);
        let mut sections = section_extractor.extract(tree);
        if sections.is_empty() && section_extractor.has_section_rules() && tree.has_text(tree.root()) {
            tracing::error!("No configured section matched in {}", input.main_file);
            return Err(DocumentError::MissingSections(input.id.clone()));
        }
        assign_section_ids(&mut sections, "");

        let abbreviations = AbbreviationExtractor::new(self.config).extract(tree, &sections);

        let table_extractor = TableExtractor::new(self.config);
        let mut sources = table_extractor.extract(tree, &Provenance::inline(input.main_file.as_str()));
        for (file, linked) in &input.linked_tables {
            sources.extend(table_extractor.extract(linked, &Provenance::external(file.as_str())));
        }
        for (provenance, number, grid) in &input.grids {
            sources.push(grid.clone().into_parsed(provenance.clone(), *number));
        }
        let (tables, table_diagnostics) = merge_tables(sources);

        let mut diagnostics = self.audit(input);
        diagnostics.extend(table_diagnostics);
        diagnostics.extend(unresolved_table_mentions(&sections, &tables));
        diagnostics.extend(abbreviations.diagnostics.iter().cloned());

        tracing::info!(
            "Document {}: {} sections, {} tables, {} abbreviations, {} diagnostics",
            input.id,
            sections.len(),
            tables.len(),
            abbreviations.entries.len(),
            diagnostics.len()
        );

        Ok(StructuredDocument {
            id: input.id.clone(),
            source_file: input.main_file.clone(),
            title,
            keywords,
            sections,
            tables,
            abbreviations,
            diagnostics,
        })
    }

    fn title(&self, tree: &DocumentTree) -> String {
        self.config
            .rule(SectionKind::Title)
            .and_then(|rule| {
                find(tree, tree.root(), &rule.defined_by)
                    .map(|node| tree.text(node))
                    .find(|text| !text.is_empty())
            })
            .unwrap_or_default()
    }

    fn keywords(&self, tree: &DocumentTree) -> Vec<String> {
        let Some(rule) = self.config.rule(SectionKind::Keywords) else {
            return Vec::new();
        };
        let mut keywords: Vec<String> = Vec::new();
        for region in locate(tree, tree.root(), rule) {
            let found: Vec<String> = match region.data.get("keyword") {
                Some(values) => values.clone(),
                None => {
                    let text = tree.text(region.node);
                    let text = KEYWORDS_LABEL_RE.replace(&text, "");
                    KEYWORD_SPLIT_RE.split(&text).map(clean_text).collect()
                }
            };
            for keyword in found {
                if !keyword.is_empty() && !keywords.contains(&keyword) {
                    keywords.push(keyword);
                }
            }
        }
        keywords
    }

    /// Configured rules (and data entries) that found nothing in this document.
    fn audit(&self, input: &DocumentInput) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        for (kind, rule) in self.config.rules() {
            let mut trees: Vec<&DocumentTree> = vec![&input.main];
            if kind == SectionKind::Tables {
                trees.extend(input.linked_tables.iter().map(|(_, tree)| tree));
            }
            let regions: Vec<_> = trees
                .iter()
                .flat_map(|tree| locate(tree, tree.root(), rule))
                .collect();

            if regions.is_empty() {
                tracing::warn!("Rule '{}' matched nothing in {}", kind.key(), input.id);
                diagnostics.push(Diagnostic::UnmatchedRegion { rule: kind.key().to_string() });
                continue;
            }
            for (data, set) in &rule.data {
                if set.is_empty() || (kind == SectionKind::Tables && is_structural_table_data(data)) {
                    continue;
                }
                if !regions.iter().any(|region| region.data.contains_key(data)) {
                    tracing::debug!("Data '{}.{}' matched nothing in {}", kind.key(), data, input.id);
                    diagnostics.push(Diagnostic::UnmatchedData {
                        rule: kind.key().to_string(),
                        data: data.clone(),
                    });
                }
            }
        }
        diagnostics
    }
}

/// Table data entries that select rows or cells rather than text fields.
fn is_structural_table_data(name: &str) -> bool {
    matches!(name, "table-row" | "header-row" | "header-element")
}

/// Gives every section its hierarchical position: "1", "2", "2.1", ...
pub fn assign_section_ids(sections: &mut [Section], prefix: &str) {
    for (i, section) in sections.iter_mut().enumerate() {
        section.id = if prefix.is_empty() {
            (i + 1).to_string()
        } else {
            format!("{}.{}", prefix, i + 1)
        };
        let id = section.id.clone();
        assign_section_ids(&mut section.subsections, &id);
    }
}

/// "Table N" mentions in running text with no table of that number.
fn unresolved_table_mentions(sections: &[Section], tables: &[Table]) -> Vec<Diagnostic> {
    let mut reported: Vec<u32> = Vec::new();
    let mut diagnostics = Vec::new();
    for section in sections.iter().flat_map(Section::walk) {
        for paragraph in &section.paragraphs {
            for caps in TABLE_MENTION_RE.captures_iter(paragraph) {
                let Ok(number) = caps[1].parse::<u32>() else {
                    continue;
                };
                if reported.contains(&number) || tables.iter().any(|t| t.number == Some(number)) {
                    continue;
                }
                reported.push(number);
                diagnostics.push(Diagnostic::TableReferenceUnresolved {
                    number,
                    section: section.id.clone(),
                });
            }
        }
    }
    diagnostics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::html::parse_html;

    const CONFIG: &str = r#"{"config": {
        "title": {"defined-by": [{"tag": "h1"}]},
        "keywords": {"defined-by": [{"tag": "div", "attrs": {"class": "kwd"}}]},
        "sections": {"defined-by": [{"tag": "section"}], "data": {"headers": [{"tag": "h2"}]}},
        "sub-sections": {"defined-by": [{"tag": "div", "attrs": {"class": "subsec"}}],
                         "data": {"headers": [{"tag": "h3"}]}},
        "tables": {"defined-by": [{"tag": "div", "attrs": {"class": "table-wrap"}}],
                   "data": {"caption": [{"tag": "p", "attrs": {"class": "caption"}}],
                            "footer": [{"tag": "p", "attrs": {"class": "foot"}}]}},
        "figures": {"defined-by": [{"tag": "figure"}]}
    }}"#;

    const ARTICLE: &str = r#"<html><body>
        <h1>Height genetics in adults</h1>
        <div class="kwd">Keywords: GWAS; height, heritability</div>
        <section><h2>Introduction</h2>
            <p>The World Health Organization (WHO) tracks growth.</p>
        </section>
        <section><h2>Methods</h2>
            <div class="subsec"><h3>Cohort</h3><p>Body mass index (BMI) was recorded, see Table 1 and Table 3.</p></div>
            <div class="table-wrap"><p class="caption">Table 1. Cohort summary</p>
                <table><tr><th>Group</th><th>N</th></tr><tr><td>Cases</td><td>120</td></tr></table></div>
        </section>
        <section><p>Unheaded closing text.</p></section>
    </body></html>"#;

    fn config() -> Config {
        Config::from_json_str(CONFIG).expect("config")
    }

    #[test]
    fn test_full_pipeline() {
        let config = config();
        let input = DocumentInput::new("PMC1", "PMC1.html", parse_html(ARTICLE));
        let doc = DocumentAssembler::new(&config).assemble(&input).expect("assembled");

        assert_eq!(doc.title, "Height genetics in adults");
        assert_eq!(doc.keywords, vec!["GWAS", "height", "heritability"]);

        let headings: Vec<(&str, &str)> = doc.sections.iter().map(|s| (s.id.as_str(), s.heading.as_str())).collect();
        assert_eq!(headings, vec![("1", "Introduction"), ("2", "Methods"), ("3", "Unknown-1")]);
        assert_eq!(doc.sections[1].subsections[0].id, "2.1");
        assert_eq!(doc.sections[1].subsections[0].name, "methods");
        // table text stays out of the section's paragraphs
        assert!(doc.sections[1].paragraphs.is_empty());

        assert_eq!(doc.tables.len(), 1);
        assert_eq!(doc.tables[0].id, "1");
        assert_eq!(doc.tables[0].caption, "Table 1. Cohort summary");

        assert_eq!(doc.abbreviations.get("WHO"), Some("World Health Organization"));
        assert_eq!(doc.abbreviations.get("BMI"), Some("Body mass index"));
        assert_eq!(doc.abbreviations.entries[0].locations[0].section, "2.1");

        assert!(doc.diagnostics.contains(&Diagnostic::TableReferenceUnresolved {
            number: 3,
            section: "2.1".to_string()
        }));
        assert!(doc.diagnostics.contains(&Diagnostic::UnmatchedRegion { rule: "figures".to_string() }));
        assert!(doc.diagnostics.contains(&Diagnostic::UnmatchedData {
            rule: "tables".to_string(),
            data: "footer".to_string()
        }));
    }

    #[test]
    fn test_pipeline_is_idempotent() {
        let config = config();
        let input = DocumentInput::new("PMC1", "PMC1.html", parse_html(ARTICLE));
        let assembler = DocumentAssembler::new(&config);
        let first = serde_json::to_string(&assembler.assemble(&input).expect("first run")).expect("json");
        let second = serde_json::to_string(&assembler.assemble(&input).expect("second run")).expect("json");
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_sections_is_document_fatal() {
        let config = config();
        let input = DocumentInput::new("PMC2", "PMC2.html", parse_html("<div><p>Only loose text.</p></div>"));
        match DocumentAssembler::new(&config).assemble(&input) {
            Err(DocumentError::MissingSections(id)) => assert_eq!(id, "PMC2"),
            other => panic!("expected missing-sections error, got {:?}", other.map(|d| d.id)),
        }
    }

    #[test]
    fn test_linked_table_fills_caption_only_inline_table() {
        let config = config();
        let mut input = DocumentInput::new(
            "PMC3",
            "PMC3.html",
            parse_html(
                r#"<section><h2>Results</h2><p>See Table 1.</p>
                   <div class="table-wrap"><p class="caption">Table 1. Associations</p></div></section>"#,
            ),
        );
        input.linked_tables.push((
            "PMC3_table_1.html".to_string(),
            parse_html(
                r#"<div class="table-wrap"><p class="caption">Associations (full)</p><table>
                   <thead><tr><th>SNP</th><th>P</th></tr></thead>
                   <tbody><tr><td>rs1</td><td>1.2 × 10−5</td></tr></tbody></table></div>"#,
            ),
        ));
        let doc = DocumentAssembler::new(&config).assemble(&input).expect("assembled");

        assert_eq!(doc.tables.len(), 1);
        let table = &doc.tables[0];
        assert_eq!(table.id, "1");
        assert_eq!(table.caption, "Table 1. Associations");
        assert_eq!(table.sections[0].rows[0][1].cell_text, "1.2e-5");
        assert!(doc
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::DuplicateTable { number: 1, .. })));
        assert!(!doc
            .diagnostics
            .iter()
            .any(|d| matches!(d, Diagnostic::TableReferenceUnresolved { .. })));
    }
}
