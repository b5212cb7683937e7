// src/extractors/heading.rs
//! Maps free-text section headings to section types using the bundled
//! `headings.tsv` lookup table (variant<TAB>type per line).

use once_cell::sync::Lazy;
use regex::Regex;

const HEADING_TABLE: &str = include_str!("headings.tsv");

/// Minimum normalized similarity for a heading to count as a known variant.
const MATCH_THRESHOLD: f64 = 0.8;

pub const ABBREVIATIONS_TYPE: &str = "abbreviations";
pub const REFERENCES_TYPE: &str = "references";

static HEADING_VARIANTS: Lazy<Vec<(String, String)>> = Lazy::new(|| {
    HEADING_TABLE
        .lines()
        .filter_map(|line| {
            let (variant, kind) = line.split_once('\t')?;
            Some((variant.trim().to_lowercase(), kind.trim().to_string()))
        })
        .filter(|(variant, kind)| !variant.is_empty() && !kind.is_empty())
        .collect()
});

// "2.1 ", "3. ", "IV) "
static NUMBERING_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:\d+(?:\.\d+)*\.?|[ivx]+[.)]|[a-z][.)])\s*")
        .expect("Failed to compile NUMBERING_RE")
});

static PART_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r" and |\s*/\s*|\s*&\s*").expect("Failed to compile PART_SPLIT_RE"));

fn normalize(heading: &str) -> String {
    let lowered = heading.trim().to_lowercase();
    let stripped = NUMBERING_RE.replace(&lowered, "");
    stripped
        .trim_end_matches(|c: char| c == '.' || c == ':' || c.is_whitespace())
        .trim()
        .to_string()
}

fn best_match(text: &str) -> Option<&'static str> {
    let mut best: Option<(&'static str, f64)> = None;
    for (variant, kind) in HEADING_VARIANTS.iter() {
        let score = strsim::normalized_levenshtein(text, variant);
        if score >= MATCH_THRESHOLD && best.map_or(true, |(_, s)| score > s) {
            best = Some((kind.as_str(), score));
        }
    }
    best.map(|(kind, _)| kind)
}

/// Section types for a heading, in heading order, without duplicates.
/// Combined headings ("Results and Discussion") yield one type per part.
pub fn classify_heading(heading: &str) -> Vec<String> {
    let normalized = normalize(heading);
    if normalized.is_empty() {
        return Vec::new();
    }
    if let Some(kind) = best_match(&normalized) {
        return vec![kind.to_string()];
    }

    let mut kinds: Vec<String> = Vec::new();
    for part in PART_SPLIT_RE.split(&normalized) {
        let part = normalize(part);
        if part.is_empty() {
            continue;
        }
        if let Some(kind) = best_match(&part) {
            if !kinds.iter().any(|k| k == kind) {
                kinds.push(kind.to_string());
            }
        }
    }
    kinds
}
