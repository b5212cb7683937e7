// src/extractors/table.rs

// --- Imports ---
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::{Config, Rule, SectionKind};
use crate::diagnostics::Diagnostic;
use crate::document::{DocumentTree, NodeId, NodeKind};
use crate::extractors::locator::{find, locate, Region};
use crate::extractors::pattern::matches_any;
use crate::utils::text::{clean_text, normalize_numeric};

// --- Constants ---
const MAX_SPAN: usize = 1000;
const MAX_COLUMNS: usize = 1000;
/// Slots one table grid may allocate across all rows.
const MAX_GRID_CELLS: usize = 500_000;
/// Bytes of cell text one table grid may hold once spans are copied out.
const MAX_GRID_TEXT: usize = 16 * 1024 * 1024;
/// Larger numbers in captions or file names are not table numbers.
const MAX_TABLE_NUMBER: u32 = 100_000;

static TABLE_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\btable\s*(\d+)").expect("Failed to compile TABLE_NUMBER_RE"));

static TABLE_FILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(.+)_table_(\d+)$").expect("Failed to compile TABLE_FILE_RE"));

// --- Data Structures ---
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Inline,
    External,
}

/// Where a table came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Provenance {
    pub kind: SourceKind,
    pub file: String,
}

impl Provenance {
    pub fn inline(file: impl Into<String>) -> Self {
        Self { kind: SourceKind::Inline, file: file.into() }
    }

    pub fn external(file: impl Into<String>) -> Self {
        Self { kind: SourceKind::External, file: file.into() }
    }
}

/// A run of data rows under one super-row title (empty for untitled runs).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataSection {
    pub title: String,
    pub rows: Vec<Vec<String>>,
}

/// One table as read from a single source, before merging.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTable {
    pub number: Option<u32>,
    pub title: String,
    pub caption: String,
    pub footer: String,
    pub column_headings: Vec<String>,
    pub sections: Vec<DataSection>,
    pub provenance: Provenance,
    /// Set when the cell grid hit its size limits and rows were dropped.
    pub truncated: bool,
}

impl ParsedTable {
    pub fn has_content(&self) -> bool {
        !self.column_headings.is_empty() || self.sections.iter().any(|s| !s.rows.is_empty())
    }
}

/// A raw cell grid handed over by a spreadsheet or OCR collaborator.
#[derive(Debug, Clone, Default)]
pub struct TableGrid {
    pub title: String,
    pub caption: String,
    pub footer: String,
    pub rows: Vec<Vec<String>>,
    /// How many leading rows are column headings.
    pub header_rows: usize,
}

impl TableGrid {
    pub fn into_parsed(self, provenance: Provenance, number: Option<u32>) -> ParsedTable {
        let header_idx: Vec<usize> = (0..self.header_rows.min(self.rows.len())).collect();
        let rows: Vec<Vec<String>> = self
            .rows
            .into_iter()
            .map(|row| row.iter().map(|cell| normalize_numeric(&clean_text(cell))).collect())
            .collect();
        let (column_headings, sections) = split_rows(&rows, &header_idx);
        let number = number.or_else(|| number_from_text(&self.title, &self.caption));
        ParsedTable {
            number,
            title: self.title,
            caption: self.caption,
            footer: self.footer,
            column_headings,
            sections,
            provenance,
            truncated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cell {
    pub cell_id: String,
    pub cell_text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSection {
    pub title: String,
    pub rows: Vec<Vec<Cell>>,
}

/// A merged table with its final identifier and cell ids.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub id: String,
    pub number: Option<u32>,
    pub title: String,
    pub caption: String,
    pub footer: String,
    pub column_headings: Vec<Cell>,
    pub sections: Vec<TableSection>,
    pub provenance: Vec<Provenance>,
    pub content_available: bool,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub truncated: bool,
}

// --- File naming ---

/// Splits `<stem>_table_<n>` into its article stem and table number.
pub fn split_table_file_stem(stem: &str) -> Option<(&str, u32)> {
    let caps = TABLE_FILE_RE.captures(stem)?;
    let base = caps.get(1)?.as_str();
    let number = parse_table_number(caps.get(2)?.as_str())?;
    Some((base, number))
}

fn parse_table_number(digits: &str) -> Option<u32> {
    digits.parse::<u32>().ok().filter(|number| *number <= MAX_TABLE_NUMBER)
}

fn number_from_file(file: &str) -> Option<u32> {
    let stem = std::path::Path::new(file).file_stem()?.to_str()?;
    split_table_file_stem(stem).map(|(_, number)| number)
}

fn number_from_text(title: &str, caption: &str) -> Option<u32> {
    [title, caption]
        .iter()
        .find_map(|text| TABLE_NUMBER_RE.captures(text))
        .and_then(|caps| parse_table_number(&caps[1]))
}

// --- Extraction ---
pub struct TableExtractor<'c> {
    config: &'c Config,
}

impl<'c> TableExtractor<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// Parses every `tables` region of one source document.
    ///
    /// For an external table file holding exactly one table, the number in the
    /// file name overrides any number found in the title or caption.
    pub fn extract(&self, tree: &DocumentTree, provenance: &Provenance) -> Vec<ParsedTable> {
        let Some(rule) = self.config.rule(SectionKind::Tables) else {
            return Vec::new();
        };

        let regions: Vec<Region> = locate(tree, tree.root(), rule)
            .into_iter()
            .filter(|region| !tree.has_class(region.node, "table-group"))
            .collect();

        let mut tables: Vec<ParsedTable> = regions
            .iter()
            .map(|region| self.parse_region(tree, rule, region, provenance))
            .collect();

        if provenance.kind == SourceKind::External && tables.len() == 1 {
            if let Some(number) = number_from_file(&provenance.file) {
                tables[0].number = Some(number);
            }
        }

        tracing::debug!("Parsed {} tables from {}", tables.len(), provenance.file);
        tables
    }

    fn parse_region(
        &self,
        tree: &DocumentTree,
        rule: &Rule,
        region: &Region,
        provenance: &Provenance,
    ) -> ParsedTable {
        let title = region.joined("title", ". ");
        let caption = region.joined("caption", ". ");
        let footer = region.joined("footer", ". ");

        let rows = self.table_rows(tree, rule, region.node);
        let header_idx = self.header_rows(tree, rule, region.node, &rows);
        let (grid, truncated) = expand_spans(tree, &rows);
        if truncated {
            tracing::warn!(
                "Table '{}' in {} exceeds the grid limits; remaining rows dropped",
                title,
                provenance.file
            );
        }
        let (column_headings, sections) = split_rows(&grid, &header_idx);

        let number = number_from_text(&title, &caption);
        tracing::trace!(
            "Table region: number={:?}, {} rows, {} header rows",
            number,
            rows.len(),
            header_idx.len()
        );

        ParsedTable {
            number,
            title,
            caption,
            footer,
            column_headings,
            sections,
            provenance: provenance.clone(),
            truncated,
        }
    }

    fn table_rows(&self, tree: &DocumentTree, rule: &Rule, region: NodeId) -> Vec<NodeId> {
        if let Some(set) = rule.data("table-row") {
            return find(tree, region, set).collect();
        }
        let table = if tree.tag(region) == Some("table") {
            Some(region)
        } else {
            tree.descendants(region).find(|id| tree.tag(*id) == Some("table"))
        };
        let Some(table) = table else {
            return Vec::new();
        };
        // rows of nested tables belong to those tables
        tree.descendants(table)
            .filter(|id| tree.tag(*id) == Some("tr"))
            .filter(|id| {
                tree.parent(*id)
                    .and_then(|parent| tree.closest_tag(parent, "table", table))
                    == Some(table)
            })
            .collect()
    }

    fn header_rows(&self, tree: &DocumentTree, rule: &Rule, region: NodeId, rows: &[NodeId]) -> Vec<usize> {
        let header_nodes: Vec<NodeId> = rule
            .data("header-row")
            .map(|set| find(tree, region, set).collect())
            .unwrap_or_default();
        let header_row_set = rule.data("header-row");
        let header_element = rule.data("header-element");

        let mut idx: Vec<usize> = rows
            .iter()
            .enumerate()
            .filter(|(_, row)| {
                let row = **row;
                let by_rule = header_row_set.map_or(false, |set| matches_any(tree, row, set))
                    || header_nodes.iter().any(|h| tree.contains(*h, row));
                let by_element = header_element.map_or(false, |set| find(tree, row, set).next().is_some());
                let in_thead = tree
                    .parent(row)
                    .and_then(|parent| tree.closest_tag(parent, "thead", region))
                    .is_some();
                let row_cells: Vec<NodeId> = cells(tree, row).collect();
                let all_th = !row_cells.is_empty() && row_cells.iter().all(|c| tree.tag(*c) == Some("th"));
                by_rule || by_element || in_thead || tree.has_class(row, "thead") || all_th
            })
            .map(|(i, _)| i)
            .collect();

        if idx.is_empty() && !rows.is_empty() {
            idx.push(0);
        }
        idx
    }
}

fn cells<'t>(tree: &'t DocumentTree, row: NodeId) -> impl Iterator<Item = NodeId> + 't {
    tree.element_children(row)
        .filter(move |c| matches!(tree.tag(*c), Some("td") | Some("th")))
}

fn span(tree: &DocumentTree, cell: NodeId, name: &str) -> usize {
    tree.attr(cell, name)
        .and_then(|value| value.joined().trim().parse::<usize>().ok())
        .unwrap_or(1)
        .clamp(1, MAX_SPAN)
}

/// Lays row/col spans out into a (possibly ragged) grid of cell texts. A span
/// reaching past the last row is cut off there. Columns beyond `MAX_COLUMNS`
/// are dropped, and once the grid would exceed `MAX_GRID_CELLS` slots or
/// `MAX_GRID_TEXT` bytes of text the remaining cells are dropped and the
/// grid is reported as truncated.
fn expand_spans(tree: &DocumentTree, rows: &[NodeId]) -> (Vec<Vec<String>>, bool) {
    let mut grid: Vec<Vec<Option<String>>> = vec![Vec::new(); rows.len()];
    let mut slots = 0usize;
    let mut text_bytes = 0usize;
    let mut truncated = false;

    'rows: for (r, row) in rows.iter().enumerate() {
        let mut col = 0;
        for cell in cells(tree, *row) {
            while grid[r].get(col).map_or(false, Option::is_some) {
                col += 1;
            }
            if col >= MAX_COLUMNS {
                truncated = true;
                break;
            }
            let text = cell_text(tree, cell);
            let rowspan = span(tree, cell, "rowspan");
            let colspan = span(tree, cell, "colspan").min(MAX_COLUMNS - col);
            let end = col + colspan;
            for target_row in grid.iter_mut().skip(r).take(rowspan) {
                let grown = end.saturating_sub(target_row.len());
                let copied = colspan * text.len();
                if slots + grown > MAX_GRID_CELLS || text_bytes + copied > MAX_GRID_TEXT {
                    truncated = true;
                    break 'rows;
                }
                slots += grown;
                text_bytes += copied;
                if grown > 0 {
                    target_row.resize(end, None);
                }
                for slot in &mut target_row[col..end] {
                    if slot.is_none() {
                        *slot = Some(text.clone());
                    }
                }
            }
            col = end;
        }
    }

    let grid = grid
        .into_iter()
        .map(|row| row.into_iter().map(Option::unwrap_or_default).collect())
        .collect();
    (grid, truncated)
}

enum Mark<'t> {
    Node(NodeId),
    Close(&'t str),
}

/// Cell text with `<sup>`/`<sub>` markers kept and p-values normalized.
fn cell_text(tree: &DocumentTree, cell: NodeId) -> String {
    let mut raw = String::new();
    let mut stack: Vec<Mark> = tree.children(cell).iter().rev().map(|c| Mark::Node(*c)).collect();

    while let Some(mark) = stack.pop() {
        let node = match mark {
            Mark::Node(node) => node,
            Mark::Close(tag) => {
                raw.push_str(&format!("</{}>", tag));
                continue;
            }
        };
        match tree.kind(node) {
            NodeKind::Text(text) => raw.push_str(text),
            NodeKind::Element { tag, .. } if tag == "sup" || tag == "sub" => {
                raw.push_str(&format!("<{}>", tag));
                stack.push(Mark::Close(tag));
                stack.extend(tree.children(node).iter().rev().map(|c| Mark::Node(*c)));
            }
            NodeKind::Element { tag, .. } if tag == "br" => raw.push(' '),
            _ => stack.extend(tree.children(node).iter().rev().map(|c| Mark::Node(*c))),
        }
    }
    normalize_numeric(&clean_text(&raw))
}

fn is_super_row(row: &[String]) -> bool {
    if row.len() < 2 {
        return false;
    }
    let mut values = row.iter().filter(|cell| !cell.is_empty());
    let Some(first) = values.next() else {
        return false;
    };
    values.all(|cell| cell == first) && first.starts_with(|c: char| c.is_ascii_alphabetic())
}

/// Splits a grid into merged column headings and titled data sections.
fn split_rows(grid: &[Vec<String>], header_idx: &[usize]) -> (Vec<String>, Vec<DataSection>) {
    let header_rows: Vec<&Vec<String>> = header_idx.iter().filter_map(|i| grid.get(*i)).collect();
    let width = header_rows.iter().map(|row| row.len()).max().unwrap_or(0);
    let column_headings: Vec<String> = (0..width)
        .map(|col| {
            let mut parts: Vec<&str> = Vec::new();
            for row in &header_rows {
                if let Some(text) = row.get(col).filter(|text| !text.is_empty()) {
                    if parts.last() != Some(&text.as_str()) {
                        parts.push(text);
                    }
                }
            }
            parts.join("|")
        })
        .collect();

    let mut sections: Vec<DataSection> = Vec::new();
    let mut pending_title: Option<String> = None;
    for (i, row) in grid.iter().enumerate() {
        if header_idx.contains(&i) || row.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if is_super_row(row) {
            pending_title = row.iter().find(|cell| !cell.is_empty()).cloned();
            continue;
        }
        match pending_title.take() {
            Some(title) => sections.push(DataSection { title, rows: vec![row.clone()] }),
            None => match sections.last_mut() {
                Some(section) => section.rows.push(row.clone()),
                None => sections.push(DataSection { title: String::new(), rows: vec![row.clone()] }),
            },
        }
    }
    (column_headings, sections)
}

// --- Merging ---

fn fill_missing(target: &mut ParsedTable, other: &ParsedTable) {
    for (field, value) in [
        (&mut target.title, &other.title),
        (&mut target.caption, &other.caption),
        (&mut target.footer, &other.footer),
    ] {
        if field.is_empty() {
            *field = value.clone();
        }
    }
    if !target.has_content() && other.has_content() {
        target.column_headings = other.column_headings.clone();
        target.sections = other.sections.clone();
        target.truncated = other.truncated;
    }
}

/// Reconciles tables from every source of one document group into one
/// ordered collection.
///
/// `sources` must be in first-seen order (main document first, then external
/// files). Numbered tables come out in ascending number; unnumbered tables
/// stay after the highest number seen before them, in their original order.
pub fn merge_tables(sources: Vec<ParsedTable>) -> (Vec<Table>, Vec<Diagnostic>) {
    let mut diagnostics = Vec::new();
    let mut merged: Vec<(ParsedTable, Vec<Provenance>)> = Vec::new();

    for parsed in sources {
        if let Some(number) = parsed.number {
            if let Some((existing, provenance)) = merged
                .iter_mut()
                .find(|(table, _)| table.number == Some(number))
            {
                tracing::warn!(
                    "Table {} found in both {} and {}; keeping the first",
                    number,
                    existing.provenance.file,
                    parsed.provenance.file
                );
                fill_missing(existing, &parsed);
                provenance.push(parsed.provenance.clone());
                diagnostics.push(Diagnostic::DuplicateTable {
                    number,
                    kept: existing.provenance.clone(),
                    other: parsed.provenance.clone(),
                    other_table: Box::new(parsed),
                });
                continue;
            }
        }
        let provenance = vec![parsed.provenance.clone()];
        merged.push((parsed, provenance));
    }

    let mut running_max = 0u32;
    let mut keyed: Vec<((u32, u8), (ParsedTable, Vec<Provenance>))> = merged
        .into_iter()
        .map(|entry| {
            let key = match entry.0.number {
                Some(number) => {
                    running_max = running_max.max(number);
                    (number, 0)
                }
                None => (running_max, 1),
            };
            (key, entry)
        })
        .collect();
    keyed.sort_by_key(|(key, _)| *key);

    let highest = keyed.iter().filter_map(|(_, (t, _))| t.number).max().unwrap_or(0);
    let mut next_free = u64::from(highest) + 1;

    let tables = keyed
        .into_iter()
        .map(|(_, (parsed, provenance))| {
            let id = match parsed.number {
                Some(number) => number.to_string(),
                None => {
                    let id = next_free.to_string();
                    next_free += 1;
                    id
                }
            };
            let table = finalize(id, parsed, provenance);
            if table.truncated {
                diagnostics.push(Diagnostic::TableTruncated {
                    table_id: table.id.clone(),
                    number: table.number,
                });
            }
            if !table.content_available {
                diagnostics.push(Diagnostic::TableContentUnavailable {
                    table_id: table.id.clone(),
                    number: table.number,
                });
            }
            table
        })
        .collect();

    (tables, diagnostics)
}

fn finalize(id: String, parsed: ParsedTable, provenance: Vec<Provenance>) -> Table {
    let content_available = parsed.has_content();
    let truncated = parsed.truncated;
    let column_headings = parsed
        .column_headings
        .into_iter()
        .enumerate()
        .map(|(c, text)| Cell { cell_id: format!("{}.1.{}", id, c + 1), cell_text: text })
        .collect();

    let mut row_id = 2;
    let sections = parsed
        .sections
        .into_iter()
        .map(|section| {
            let rows = section
                .rows
                .into_iter()
                .map(|row| {
                    let cells = row
                        .into_iter()
                        .enumerate()
                        .map(|(c, text)| Cell {
                            cell_id: format!("{}.{}.{}", id, row_id, c + 1),
                            cell_text: text,
                        })
                        .collect();
                    row_id += 1;
                    cells
                })
                .collect();
            TableSection { title: section.title, rows }
        })
        .collect();

    Table {
        id,
        number: parsed.number,
        title: parsed.title,
        caption: parsed.caption,
        footer: parsed.footer,
        column_headings,
        sections,
        provenance,
        content_available,
        truncated,
    }
}
