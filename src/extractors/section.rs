// src/extractors/section.rs

// --- Imports ---
use std::collections::BTreeMap;

use serde::Serialize;

use crate::config::{Config, Rule, SectionKind};
use crate::document::{DocumentTree, NodeId};
use crate::extractors::heading::{classify_heading, REFERENCES_TYPE};
use crate::extractors::locator::{find, locate};
use crate::utils::text::clean_text;

// --- Constants ---
/// Type given to top-level sections whose heading maps to nothing known.
pub const DOCUMENT_PART: &str = "document part";

/// Tags treated as block boundaries when no `paragraphs` rule is configured.
/// Covers HTML plus the common JATS body elements.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "aside", "header", "footer", "main", "nav", "ul", "ol",
    "li", "dl", "dt", "dd", "table", "thead", "tbody", "tfoot", "tr", "td", "th", "caption",
    "h1", "h2", "h3", "h4", "h5", "h6", "blockquote", "figure", "figcaption", "pre", "hr",
    "address", "fieldset", "form", "details", "summary",
    // JATS
    "sec", "title", "list", "list-item", "table-wrap", "fig", "ref-list", "ref", "label",
    "def-list", "def-item", "term", "def", "boxed-text", "disp-quote", "statement", "app",
    "app-group", "ack", "fn-group", "fn", "abstract", "body", "back",
];

/// Sub-sections nested deeper than this are read as paragraphs of their
/// ancestor instead of becoming sections.
pub const MAX_SUBSECTION_DEPTH: usize = 32;

// --- Data Structures ---
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reference {
    pub text: String,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub fields: BTreeMap<String, String>,
}

/// One extracted section. Paragraphs and sub-sections are separate ordered
/// lists; no positional interleaving is attempted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Section {
    /// Hierarchical position ("2", "2.1"), filled in by the assembler.
    pub id: String,
    /// Primary semantic type, e.g. "introduction" or "document part".
    pub name: String,
    pub types: Vec<String>,
    pub heading: String,
    pub heading_is_placeholder: bool,
    pub paragraphs: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub references: Vec<Reference>,
    pub subsections: Vec<Section>,
    #[serde(skip)]
    pub node: NodeId,
}

impl Section {
    pub fn has_type(&self, kind: &str) -> bool {
        self.types.iter().any(|t| t == kind)
    }

    /// This section and all nested sub-sections, preorder.
    pub fn walk(&self) -> Vec<&Section> {
        let mut out = vec![self];
        for sub in &self.subsections {
            out.extend(sub.walk());
        }
        out
    }
}

// --- Main Extractor Structure ---
pub struct SectionExtractor<'c> {
    config: &'c Config,
}

impl<'c> SectionExtractor<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// True when the config defines any rule that produces top-level sections.
    pub fn has_section_rules(&self) -> bool {
        self.config.rules().any(|(kind, _)| kind.is_top_level_section())
    }

    /// Builds the section hierarchy for one document.
    pub fn extract(&self, tree: &DocumentTree) -> Vec<Section> {
        let top_level = self.find_top_level(tree);
        tracing::debug!("Located {} top-level sections", top_level.len());

        let mut sections: Vec<Section> = top_level
            .into_iter()
            .filter_map(|(node, kind)| {
                let rule = self.config.rule(kind)?;
                Some(self.build_section(tree, node, kind, rule, None, 0))
            })
            .collect();

        label_unknown_headings(&mut sections);
        sections
    }

    /// Candidates from every section-producing rule, in document order. A node
    /// claimed by two rules keeps the semantic one; a match nested inside an
    /// earlier top-level match is left for sub-section search.
    fn find_top_level(&self, tree: &DocumentTree) -> Vec<(NodeId, SectionKind)> {
        let mut candidates: Vec<(NodeId, SectionKind)> = Vec::new();
        for (kind, rule) in self.config.rules().filter(|(kind, _)| kind.is_top_level_section()) {
            candidates.extend(
                find(tree, tree.root(), &rule.defined_by)
                    .filter(|node| tree.has_text(*node))
                    .map(|node| (node, kind)),
            );
        }
        candidates.sort_by_key(|(node, kind)| (*node, *kind == SectionKind::Sections));

        let mut kept: Vec<(NodeId, SectionKind)> = Vec::new();
        for (node, kind) in candidates {
            if let Some((last, last_kind)) = kept.last() {
                if tree.contains(*last, node) {
                    tracing::trace!(
                        "Skipping '{}' match nested in '{}' section",
                        kind.key(),
                        last_kind.key()
                    );
                    continue;
                }
            }
            kept.push((node, kind));
        }
        kept
    }

    fn build_section(
        &self,
        tree: &DocumentTree,
        node: NodeId,
        kind: SectionKind,
        rule: &Rule,
        parent_types: Option<&[String]>,
        depth: usize,
    ) -> Section {
        // Sub-section roots first: the heading must not come from inside one.
        let sub_rule = match self.config.rule(SectionKind::SubSections) {
            Some(_) if depth >= MAX_SUBSECTION_DEPTH => {
                tracing::warn!(
                    "Sub-sections nested deeper than {} levels are kept as paragraphs",
                    MAX_SUBSECTION_DEPTH
                );
                None
            }
            sub_rule => sub_rule,
        };
        let sub_nodes: Vec<NodeId> = sub_rule
            .map(|sub| {
                find(tree, node, &sub.defined_by)
                    .filter(|n| tree.has_text(*n))
                    .collect()
            })
            .unwrap_or_default();

        let heading_node = rule.data("headers").and_then(|headers| {
            find(tree, node, headers).find(|h| {
                !sub_nodes.iter().any(|s| tree.contains(*s, *h)) && !tree.text(*h).is_empty()
            })
        });
        let heading = heading_node.map(|h| tree.text(h)).unwrap_or_default();

        let types = if kind.is_semantic() {
            vec![kind.key().to_string()]
        } else {
            let classified = classify_heading(&heading);
            match (classified.is_empty(), parent_types) {
                (false, _) => classified,
                (true, Some(parent)) => parent.to_vec(),
                (true, None) => vec![DOCUMENT_PART.to_string()],
            }
        };

        let subsections: Vec<Section> = match sub_rule {
            Some(sub) => sub_nodes
                .iter()
                .map(|sub_node| {
                    self.build_section(tree, *sub_node, SectionKind::SubSections, sub, Some(&types), depth + 1)
                })
                .collect(),
            None => Vec::new(),
        };

        let mut excluded: Vec<NodeId> = sub_nodes.clone();
        excluded.extend(heading_node);
        for region_kind in [SectionKind::Tables, SectionKind::Figures] {
            if let Some(region_rule) = self.config.rule(region_kind) {
                excluded.extend(find(tree, node, &region_rule.defined_by));
            }
        }

        let mut references = Vec::new();
        let mut paragraphs = Vec::new();
        match self.config.rule(SectionKind::References) {
            Some(ref_rule) if types.iter().any(|t| t == REFERENCES_TYPE) => {
                references = self.extract_references(tree, node, ref_rule, &excluded);
            }
            _ => paragraphs = self.extract_paragraphs(tree, node, &excluded),
        }

        tracing::debug!(
            "Section '{}' ({}): {} paragraphs, {} sub-sections",
            heading,
            types.join(", "),
            paragraphs.len(),
            subsections.len()
        );

        Section {
            id: String::new(),
            name: types.first().cloned().unwrap_or_else(|| DOCUMENT_PART.to_string()),
            types,
            heading,
            heading_is_placeholder: false,
            paragraphs,
            references,
            subsections,
            node,
        }
    }

    fn extract_paragraphs(&self, tree: &DocumentTree, node: NodeId, excluded: &[NodeId]) -> Vec<String> {
        if let Some(rule) = self.config.rule(SectionKind::Paragraphs) {
            return find(tree, node, &rule.defined_by)
                .filter(|p| !excluded.iter().any(|e| tree.contains(*e, *p)))
                .map(|p| tree.text(p))
                .filter(|text| !text.is_empty())
                .collect();
        }
        let mut out = Vec::new();
        collect_blocks(tree, node, excluded, &mut out);
        out
    }

    fn extract_references(
        &self,
        tree: &DocumentTree,
        node: NodeId,
        rule: &Rule,
        excluded: &[NodeId],
    ) -> Vec<Reference> {
        locate(tree, node, rule)
            .into_iter()
            .filter(|region| !excluded.iter().any(|e| tree.contains(*e, region.node)))
            .map(|region| {
                let text = clean_text(&tree.raw_text(region.node).replace("Go to:", ""));
                let fields = region
                    .data
                    .iter()
                    .map(|(key, values)| (key.clone(), values.join(". ")))
                    .collect();
                Reference { text, fields }
            })
            .filter(|reference| !reference.text.is_empty())
            .collect()
    }
}

fn is_block(tag: &str) -> bool {
    BLOCK_TAGS.iter().any(|b| b.eq_ignore_ascii_case(tag))
}

/// Default paragraph collection: every block without block children is one
/// paragraph, and each run of loose inline content between blocks is another.
/// Containers are walked with an explicit stack of `(node, next child)`.
fn collect_blocks(tree: &DocumentTree, container: NodeId, excluded: &[NodeId], out: &mut Vec<String>) {
    fn flush(run: &mut String, out: &mut Vec<String>) {
        let text = clean_text(run);
        if !text.is_empty() {
            out.push(text);
        }
        run.clear();
    }

    let mut run = String::new();
    let mut stack: Vec<(NodeId, usize)> = vec![(container, 0)];

    while let Some(&(current, next)) = stack.last() {
        let Some(&child) = tree.children(current).get(next) else {
            flush(&mut run, out);
            stack.pop();
            continue;
        };
        if let Some(top) = stack.last_mut() {
            top.1 += 1;
        }

        if excluded.iter().any(|e| tree.contains(*e, child)) {
            flush(&mut run, out);
            continue;
        }
        let holds_excluded = excluded.iter().any(|e| tree.contains(child, *e));
        match tree.tag(child) {
            Some(tag) if is_block(tag) => {
                flush(&mut run, out);
                let has_block_child = tree
                    .element_children(child)
                    .any(|c| tree.tag(c).map_or(false, is_block));
                if has_block_child || holds_excluded {
                    stack.push((child, 0));
                } else {
                    let text = tree.text(child);
                    if !text.is_empty() {
                        out.push(text);
                    }
                }
            }
            Some(_) if holds_excluded => {
                flush(&mut run, out);
                stack.push((child, 0));
            }
            _ => run.push_str(&tree.raw_text(child)),
        }
    }
}

/// Gives every heading-less section a stable "Unknown-<n>" heading, numbered
/// in preorder across the whole document.
fn label_unknown_headings(sections: &mut [Section]) {
    fn visit(section: &mut Section, counter: &mut usize) {
        if section.heading.is_empty() {
            *counter += 1;
            section.heading = format!("Unknown-{}", counter);
            section.heading_is_placeholder = true;
        }
        for sub in &mut section.subsections {
            visit(sub, counter);
        }
    }
    let mut counter = 0;
    for section in sections.iter_mut() {
        visit(section, &mut counter);
    }
}
