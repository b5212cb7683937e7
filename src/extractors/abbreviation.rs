// src/extractors/abbreviation.rs
//! Short-form/long-form pairs for one document.
//!
//! Two signals feed the result: author-supplied lists (sections typed
//! "abbreviations" and `abbreviations-table` regions) and parenthetical
//! definitions found in the running text (Schwartz & Hearst, plus a
//! capitalized-phrase fallback and the reverse "SHORT (long form)" order).
//! Author lists always win.

use std::collections::{BTreeMap, BTreeSet};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::config::{Config, SectionKind};
use crate::diagnostics::Diagnostic;
use crate::document::{DocumentTree, NodeId};
use crate::extractors::heading::{ABBREVIATIONS_TYPE, REFERENCES_TYPE};
use crate::extractors::locator::locate;
use crate::extractors::section::Section;
use crate::utils::text::{char_len, clean_text};

/// Long-forms this similar (after normalization) are one variant.
const LONG_FORM_SIMILARITY: f64 = 0.9;

/// Lower-case words allowed inside a capitalized phrase.
const CONNECTORS: &[&str] = &["of", "and", "for", "the", "in", "on", "to"];

static QUOTES_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([(])['"\p{Pi}]|['"\p{Pf}]([);:])"#).expect("Failed to compile QUOTES_RE")
});

static TOKEN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\s\-]+").expect("Failed to compile TOKEN_RE"));

static WORD_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\S+").expect("Failed to compile WORD_RE"));

// --- Output types ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum AbbreviationSource {
    #[serde(rename = "abbreviations section")]
    AbbreviationsSection,
    #[serde(rename = "fulltext")]
    Fulltext,
}

impl AbbreviationSource {
    pub fn label(self) -> &'static str {
        match self {
            AbbreviationSource::AbbreviationsSection => "abbreviations section",
            AbbreviationSource::Fulltext => "fulltext",
        }
    }
}

/// Where a definition was seen: section id, paragraph index within that
/// section, and character offset of the long-form in the paragraph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Location {
    pub section: String,
    pub paragraph: usize,
    pub offset: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AbbreviationEntry {
    pub short_form: String,
    pub long_form: String,
    pub sources: Vec<AbbreviationSource>,
    pub locations: Vec<Location>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AbbreviationResult {
    /// Sorted by short-form; one entry per short-form.
    pub entries: Vec<AbbreviationEntry>,
    #[serde(skip)]
    pub diagnostics: Vec<Diagnostic>,
    /// Short-forms seen in parentheses for which no long-form was found.
    pub unresolved: usize,
}

impl AbbreviationResult {
    pub fn get(&self, short_form: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|entry| entry.short_form == short_form)
            .map(|entry| entry.long_form.as_str())
    }
}

/// One paragraph of running text, addressed by section id and index.
#[derive(Debug, Clone)]
pub struct TextUnit {
    pub section: String,
    pub paragraph: usize,
    pub text: String,
}

// --- Short-form test ---

fn is_all_lowercase(text: &str) -> bool {
    let mut cased = text.chars().filter(|c| c.is_lowercase() || c.is_uppercase()).peekable();
    cased.peek().is_some() && cased.all(char::is_lowercase)
}

/// Whether `candidate` can be an abbreviation: 2 to 10 letters or digits
/// (dots don't count), at most two tokens, at least one letter, starting with a
/// letter or digit, and not all lower-case unless written with dots.
pub fn is_short_form(candidate: &str) -> bool {
    let alnum = candidate.chars().filter(|c| c.is_alphanumeric()).count();
    (2..=10).contains(&alnum)
        && candidate.split_whitespace().count() <= 2
        && candidate.chars().all(|c| c.is_alphanumeric() || c == '.' || c == ' ')
        && candidate.chars().any(char::is_alphabetic)
        && candidate.chars().next().map_or(false, char::is_alphanumeric)
        && (candidate.contains('.') || !is_all_lowercase(candidate))
}

// --- Long-form search ---

fn lower(c: char) -> char {
    c.to_lowercase().next().unwrap_or(c)
}

/// Checks that the short-form letters appear, in order and right to left, in
/// `definition`, the first one at a word start. Returns the shortest suffix of
/// `definition` that satisfies this.
fn validate_definition(short: &str, definition: &str) -> Option<String> {
    if definition.chars().count() < short.chars().count() {
        return None;
    }
    if definition.split_whitespace().any(|word| word == short) {
        return None;
    }

    let chars: Vec<char> = definition.chars().collect();
    let letters: Vec<char> = short.chars().filter(|c| c.is_alphanumeric()).map(lower).collect();
    let mut pos = chars.len();
    for (i, wanted) in letters.iter().enumerate().rev() {
        loop {
            if pos == 0 {
                return None;
            }
            pos -= 1;
            let at_word_start = pos == 0 || !chars[pos - 1].is_alphanumeric();
            if lower(chars[pos]) == *wanted && (i > 0 || at_word_start) {
                break;
            }
        }
    }

    let found: String = chars[pos..].iter().collect();
    let length = short.chars().count();
    if found.split_whitespace().count() > (length + 5).min(length * 2) {
        return None;
    }
    if found.matches('(').count() != found.matches(')').count() {
        return None;
    }
    Some(found)
}

/// Schwartz & Hearst: take the shortest run of preceding words holding as many
/// words starting with the short-form's first letter as the short-form itself.
fn schwartz_hearst(short: &str, preceding: &str) -> Option<(String, usize)> {
    let key = lower(short.chars().next()?);
    let needed = short.chars().map(lower).filter(|c| *c == key).count();

    let mut count = 0;
    let mut start = None;
    for token in TOKEN_RE.find_iter(preceding).collect::<Vec<_>>().into_iter().rev() {
        if token.as_str().chars().next().map(lower) == Some(key) {
            count += 1;
            if count == needed {
                start = Some(token.start());
                break;
            }
        }
    }

    let start = start?;
    let definition = preceding[start..].trim_end();
    let found = validate_definition(short, definition)?;
    Some((found.clone(), start + definition.len() - found.len()))
}

/// Fallback for definitions Schwartz & Hearst can't see, such as
/// "Health Organization (WHO)": the longest run of capitalized words right
/// before the parenthesis whose initials appear in order in the short-form.
fn capitalized_phrase(short: &str, preceding: &str) -> Option<(String, usize)> {
    let words: Vec<(usize, &str)> = WORD_RE
        .find_iter(preceding)
        .map(|m| (m.start(), m.as_str()))
        .collect();
    let is_capitalized = |word: &str| {
        word.starts_with(char::is_uppercase) && word.chars().all(|c| c.is_alphabetic() || c == '-')
    };

    let mut run: Vec<(usize, &str)> = Vec::new();
    for (i, (at, word)) in words.iter().enumerate().rev() {
        let core = word.trim_start_matches(|c: char| !c.is_alphanumeric());
        let lead = word.len() - core.len();
        let is_last = i + 1 == words.len();
        let core = if is_last { core.trim_end_matches(|c: char| !c.is_alphanumeric()) } else { core };
        if core.is_empty() || (!is_last && !word.ends_with(|c: char| c.is_alphanumeric())) {
            break;
        }
        if is_capitalized(core) {
            run.push((at + lead, core));
        } else if CONNECTORS.contains(&core.to_lowercase().as_str()) {
            run.push((at + lead, core));
        } else {
            break;
        }
        if lead > 0 {
            break;
        }
    }
    run.reverse();

    let short_letters: Vec<char> = short.chars().filter(|c| c.is_alphabetic()).map(lower).collect();
    for start in 0..run.len() {
        let (at, first) = run[start];
        if !is_capitalized(first) {
            continue;
        }
        let initials: Vec<char> = run[start..]
            .iter()
            .filter(|(_, word)| is_capitalized(*word))
            .filter_map(|(_, word)| word.chars().next().map(lower))
            .collect();
        if initials.len() >= 2 && is_subsequence(&initials, &short_letters) {
            let phrase = preceding[at..].trim_end().trim_end_matches(|c: char| !c.is_alphanumeric());
            return Some((phrase.to_string(), at));
        }
    }
    None
}

fn is_subsequence(needle: &[char], haystack: &[char]) -> bool {
    let mut rest = haystack.iter();
    needle.iter().all(|c| rest.any(|h| h == c))
}

fn long_form_for(short: &str, preceding: &str) -> Option<(String, usize)> {
    schwartz_hearst(short, preceding).or_else(|| capitalized_phrase(short, preceding))
}

/// "BMI (body mass index)": the word before the parenthesis is the short-form.
fn reverse_pair(inner: &str, preceding: &str) -> Option<(String, usize)> {
    if inner.split_whitespace().count() < 2 {
        return None;
    }
    let last = WORD_RE.find_iter(preceding).last()?;
    let short = last.as_str();
    if !is_short_form(short) {
        return None;
    }
    let found = validate_definition(short, inner)?;
    (found.len() == inner.len()).then(|| (short.to_string(), last.start()))
}

// --- Sentence scanning ---

#[derive(Debug, Clone, PartialEq)]
enum Found {
    Pair {
        short: String,
        long: String,
        long_at: usize,
        short_at: usize,
    },
    Unresolved {
        short: String,
    },
}

fn scan_sentence(raw: &str) -> Vec<Found> {
    if !raw.contains('(') || raw.matches('(').count() != raw.matches(')').count() {
        return Vec::new();
    }
    if raw.find('(') > raw.find(')') {
        return Vec::new();
    }

    let sentence = QUOTES_RE.replace_all(raw, "$1$2").into_owned();
    let bytes = sentence.as_bytes();
    let mut found = Vec::new();
    let mut search_from = 0;

    while let Some(rel) = sentence[search_from..].find(" (") {
        let open = search_from + rel + 1;
        let mut depth = 1;
        let mut close = open + 1;
        while depth > 0 && close < bytes.len() {
            match bytes[close] {
                b'(' => depth += 1,
                b')' | b';' | b':' => depth -= 1,
                _ => {}
            }
            close += 1;
        }
        if depth > 0 {
            search_from = open + 1;
            continue;
        }
        search_from = close;

        let inner = &sentence[open + 1..close - 1];
        let lead = inner.len() - inner.trim_start().len();
        let candidate = inner.trim();
        let candidate_at = open + 1 + lead;
        let preceding = sentence[..open].trim_end();
        if candidate.is_empty() || preceding.is_empty() {
            continue;
        }

        if is_short_form(candidate) {
            match long_form_for(candidate, preceding) {
                Some((long, long_at)) => found.push(Found::Pair {
                    short: candidate.to_string(),
                    long,
                    long_at,
                    short_at: candidate_at,
                }),
                None => {
                    tracing::trace!("No long-form found for '{}'", candidate);
                    found.push(Found::Unresolved { short: candidate.to_string() });
                }
            }
        } else if let Some((short, short_at)) = reverse_pair(candidate, preceding) {
            found.push(Found::Pair {
                short,
                long: candidate.to_string(),
                long_at: candidate_at,
                short_at,
            });
        }
    }
    found
}

// --- Explicit lists ---

fn split_plain_pair(piece: &str) -> Option<(String, String)> {
    let piece = piece.trim().trim_end_matches('.');
    let (short, long) = piece
        .split_once(':')
        .or_else(|| piece.split_once(','))
        .or_else(|| piece.split_once(char::is_whitespace))?;
    let (short, long) = (clean_text(short), clean_text(long));
    (!short.is_empty() && !long.is_empty()).then_some((short, long))
}

/// "BMI: body mass index; WHO, World Health Organization". A lone pair is
/// only trusted when its short side looks like an abbreviation.
fn parse_plain_list(text: &str) -> Vec<(String, String)> {
    let pieces: Vec<&str> = text.split(';').filter(|p| !p.trim().is_empty()).collect();
    let pairs = pieces.iter().filter_map(|piece| split_plain_pair(piece));
    if pieces.len() >= 2 {
        pairs.collect()
    } else {
        pairs.filter(|(short, _)| is_short_form(short)).collect()
    }
}

fn explicit_pairs(tree: &DocumentTree, node: NodeId, texts: &[String]) -> Vec<(String, String)> {
    let rows: Vec<NodeId> = tree.descendants(node).filter(|id| tree.tag(*id) == Some("tr")).collect();
    let from_rows: Vec<(String, String)> = rows
        .iter()
        .flat_map(|row| {
            let cells: Vec<String> = tree
                .element_children(*row)
                .filter(|c| matches!(tree.tag(*c), Some("td") | Some("th")))
                .map(|c| tree.text(c))
                .collect();
            cells
                .chunks_exact(2)
                .map(|pair| (pair[0].clone(), pair[1].clone()))
                .collect::<Vec<_>>()
        })
        .filter(|(short, long)| !short.is_empty() && !long.is_empty())
        .collect();
    if !from_rows.is_empty() {
        return from_rows;
    }

    let terms: Vec<String> = tree
        .descendants(node)
        .filter(|id| tree.tag(*id) == Some("dt"))
        .map(|id| tree.text(id))
        .collect();
    let definitions: Vec<String> = tree
        .descendants(node)
        .filter(|id| tree.tag(*id) == Some("dd"))
        .map(|id| tree.text(id))
        .collect();
    if !terms.is_empty() {
        return terms
            .into_iter()
            .zip(definitions)
            .filter(|(short, long)| !short.is_empty() && !long.is_empty())
            .collect();
    }

    texts.iter().flat_map(|text| parse_plain_list(text)).collect()
}

// --- Resolution ---

fn normalize_long_form(long: &str) -> String {
    let replaced: String = long
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn same_long_form(a: &str, b: &str) -> bool {
    strsim::normalized_levenshtein(&normalize_long_form(a), &normalize_long_form(b)) >= LONG_FORM_SIMILARITY
}

type Position = (usize, usize);

#[derive(Debug, Clone)]
struct Observation {
    long: String,
    position: Position,
    short_position: Position,
    location: Location,
}

/// Near-identical long-forms of one short-form; `long` is the first seen.
#[derive(Debug)]
struct Variant {
    long: String,
    observations: Vec<Observation>,
}

fn group_variants(observations: &[Observation]) -> Vec<Variant> {
    let mut variants: Vec<Variant> = Vec::new();
    for observation in observations {
        match variants.iter_mut().find(|v| same_long_form(&v.long, &observation.long)) {
            Some(variant) => variant.observations.push(observation.clone()),
            None => variants.push(Variant {
                long: observation.long.clone(),
                observations: vec![observation.clone()],
            }),
        }
    }
    variants
}

/// First place `short` is used on its own, outside its definitions.
fn first_usage(units: &[TextUnit], short: &str, definitions: &[Position]) -> Option<Position> {
    let is_boundary = |c: Option<char>| c.map_or(true, |c| !c.is_alphanumeric());
    for (u, unit) in units.iter().enumerate() {
        for (at, _) in unit.text.match_indices(short) {
            let before = unit.text[..at].chars().next_back();
            let after = unit.text[at + short.len()..].chars().next();
            if is_boundary(before) && is_boundary(after) && !definitions.contains(&(u, at)) {
                return Some((u, at));
            }
        }
    }
    None
}

/// Resolves every short-form from running text and explicit lists.
pub fn resolve(units: &[TextUnit], explicit: &[(String, String)]) -> AbbreviationResult {
    let mut heuristic: BTreeMap<String, Vec<Observation>> = BTreeMap::new();
    let mut unresolved: BTreeSet<String> = BTreeSet::new();

    for (u, unit) in units.iter().enumerate() {
        let mut sentence_start = 0;
        for piece in unit.text.split('.') {
            let start = sentence_start + (piece.len() - piece.trim_start().len());
            sentence_start += piece.len() + 1;
            for found in scan_sentence(piece.trim()) {
                match found {
                    Found::Pair { short, long, long_at, short_at } => {
                        let offset = char_len(unit.text.get(..start + long_at).unwrap_or(""));
                        heuristic.entry(short).or_default().push(Observation {
                            long,
                            position: (u, start + long_at),
                            short_position: (u, start + short_at),
                            location: Location {
                                section: unit.section.clone(),
                                paragraph: unit.paragraph,
                                offset,
                            },
                        });
                    }
                    Found::Unresolved { short } => {
                        unresolved.insert(short);
                    }
                }
            }
        }
    }

    let mut explicit_map: BTreeMap<String, Vec<String>> = BTreeMap::new();
    for (short, long) in explicit {
        let longs = explicit_map.entry(short.clone()).or_default();
        if !longs.iter().any(|seen| same_long_form(seen, long)) {
            longs.push(long.clone());
        }
    }

    let mut entries = Vec::new();
    let mut diagnostics = Vec::new();
    let shorts: BTreeSet<&String> = heuristic.keys().chain(explicit_map.keys()).collect();

    for short in shorts {
        let observations = heuristic.get(short).map(Vec::as_slice).unwrap_or(&[]);
        let variants = group_variants(observations);

        let (chosen, mut sources, reason) = match explicit_map.get(short).and_then(|l| l.first()) {
            Some(long) => (long.clone(), vec![AbbreviationSource::AbbreviationsSection], "explicit abbreviations section"),
            None => {
                let definitions: Vec<Position> = observations.iter().map(|o| o.short_position).collect();
                let usage = first_usage(units, short, &definitions);
                let closest = usage.and_then(|usage| {
                    variants
                        .iter()
                        .filter_map(|v| {
                            v.observations
                                .iter()
                                .map(|o| o.position)
                                .filter(|p| *p < usage)
                                .max()
                                .map(|p| (p, v))
                        })
                        .max_by_key(|(p, _)| *p)
                        .map(|(_, v)| v)
                });
                match (closest, variants.first()) {
                    (Some(variant), _) => (variant.long.clone(), Vec::new(), "closest preceding definition"),
                    (None, Some(variant)) => (variant.long.clone(), Vec::new(), "first seen definition"),
                    (None, None) => continue,
                }
            }
        };

        let mut locations = Vec::new();
        let mut rejected: Vec<String> = explicit_map
            .get(short)
            .map(|longs| longs.iter().skip(1).cloned().collect())
            .unwrap_or_default();
        for variant in &variants {
            if same_long_form(&variant.long, &chosen) {
                locations.extend(variant.observations.iter().map(|o| o.location.clone()));
            } else {
                rejected.push(variant.long.clone());
            }
        }
        if !locations.is_empty() {
            sources.push(AbbreviationSource::Fulltext);
        }

        if !rejected.is_empty() {
            tracing::debug!("Abbreviation '{}' resolved to '{}' ({})", short, chosen, reason);
            diagnostics.push(Diagnostic::AbbreviationConflict {
                short_form: short.clone(),
                chosen: chosen.clone(),
                rejected,
                reason: reason.to_string(),
            });
        }

        entries.push(AbbreviationEntry {
            short_form: short.clone(),
            long_form: chosen,
            sources,
            locations,
        });
    }

    let unresolved = unresolved
        .iter()
        .filter(|short| !entries.iter().any(|e| &e.short_form == *short))
        .count();

    AbbreviationResult { entries, diagnostics, unresolved }
}

// --- Extractor ---
pub struct AbbreviationExtractor<'c> {
    config: &'c Config,
}

impl<'c> AbbreviationExtractor<'c> {
    pub fn new(config: &'c Config) -> Self {
        Self { config }
    }

    /// `sections` must already carry their final ids.
    pub fn extract(&self, tree: &DocumentTree, sections: &[Section]) -> AbbreviationResult {
        let mut units = Vec::new();
        let mut explicit = Vec::new();

        for section in sections.iter().flat_map(Section::walk) {
            if section.has_type(ABBREVIATIONS_TYPE) {
                explicit.extend(explicit_pairs(tree, section.node, &section.paragraphs));
            } else if !section.has_type(REFERENCES_TYPE) {
                units.extend(section.paragraphs.iter().enumerate().map(|(i, text)| TextUnit {
                    section: section.id.clone(),
                    paragraph: i,
                    text: text.clone(),
                }));
            }
        }

        if let Some(rule) = self.config.rule(SectionKind::AbbreviationsTable) {
            for region in locate(tree, tree.root(), rule) {
                let text = vec![tree.text(region.node)];
                explicit.extend(explicit_pairs(tree, region.node, &text));
            }
        }

        let result = resolve(&units, &explicit);
        tracing::debug!(
            "Abbreviations: {} entries ({} explicit pairs), {} unresolved",
            result.entries.len(),
            explicit.len(),
            result.unresolved
        );
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::html::parse_html;
    use crate::extractors::section::SectionExtractor;

    fn units(texts: &[&str]) -> Vec<TextUnit> {
        texts
            .iter()
            .enumerate()
            .map(|(i, text)| TextUnit { section: "1".to_string(), paragraph: i, text: text.to_string() })
            .collect()
    }

    #[test]
    fn test_short_form_acceptance() {
        let accepted = ["ABC", "H.P.", "A.BC", "HOUSE", "House", "ÄBÇ", "3ABC", "ABC3", "A.B.3.", "a.b.c."];
        for candidate in accepted {
            assert!(is_short_form(candidate), "{} should be accepted", candidate);
        }
        assert!(is_short_form(&"A.B.".repeat(5)));

        let rejected = ["", "A", "3", "A!B!C!", "H.P.!", "abc", "house", "äbç", "CRIS-CODE"];
        for candidate in rejected {
            assert!(!is_short_form(candidate), "{} should be rejected", candidate);
        }
        assert!(!is_short_form(&"AB".repeat(6)));
    }

    #[test]
    fn test_capitalized_phrase_fallback() {
        let result = resolve(&units(&["In 2020 the Health Organization (WHO) released guidance."]), &[]);
        assert_eq!(result.get("WHO"), Some("Health Organization"));
        let entry = &result.entries[0];
        assert_eq!(entry.sources, vec![AbbreviationSource::Fulltext]);
        assert_eq!(entry.locations[0].offset, 12);
        assert_eq!(result.unresolved, 0);
    }

    #[test]
    fn test_schwartz_hearst_and_reverse_forms() {
        let result = resolve(
            &units(&[
                "Participants with high body mass index (BMI) were excluded.",
                "We measured LDL (low density lipoprotein) levels.",
            ]),
            &[],
        );
        assert_eq!(result.get("BMI"), Some("body mass index"));
        assert_eq!(result.get("LDL"), Some("low density lipoprotein"));
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_unresolved_short_forms_are_counted() {
        let result = resolve(&units(&["Samples were stored (XYZ) overnight."]), &[]);
        assert!(result.entries.is_empty());
        assert_eq!(result.unresolved, 1);
    }

    #[test]
    fn test_closest_preceding_definition_wins() {
        let result = resolve(
            &units(&[
                "We used the polymerase chain reaction (PCR) here.",
                "Later the protein coupling region (PCR) was mentioned.",
                "The PCR results were good.",
            ]),
            &[],
        );
        assert_eq!(result.get("PCR"), Some("protein coupling region"));
        match &result.diagnostics[..] {
            [Diagnostic::AbbreviationConflict { short_form, rejected, reason, .. }] => {
                assert_eq!(short_form, "PCR");
                assert_eq!(rejected, &vec!["polymerase chain reaction".to_string()]);
                assert_eq!(reason, "closest preceding definition");
            }
            other => panic!("expected one conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_first_seen_definition_without_standalone_usage() {
        let result = resolve(
            &units(&[
                "We used the polymerase chain reaction (PCR) here.",
                "Later the protein coupling region (PCR) was mentioned.",
            ]),
            &[],
        );
        assert_eq!(result.get("PCR"), Some("polymerase chain reaction"));
        assert_eq!(result.entries[0].locations.len(), 1);
        match &result.diagnostics[..] {
            [Diagnostic::AbbreviationConflict { chosen, rejected, reason, .. }] => {
                assert_eq!(chosen, "polymerase chain reaction");
                assert_eq!(rejected, &vec!["protein coupling region".to_string()]);
                assert_eq!(reason, "first seen definition");
            }
            other => panic!("expected one conflict, got {:?}", other),
        }
    }

    #[test]
    fn test_near_identical_long_forms_merge() {
        let result = resolve(
            &units(&["Body Mass Index (BMI) was high.", "The body-mass index (BMI) fell."]),
            &[],
        );
        assert_eq!(result.entries.len(), 1);
        assert_eq!(result.get("BMI"), Some("Body Mass Index"));
        assert_eq!(result.entries[0].locations.len(), 2);
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn test_explicit_list_beats_running_text() {
        let explicit = vec![("BMI".to_string(), "Body mass index".to_string())];
        let result = resolve(&units(&["The basal metabolic index (BMI) rose."]), &explicit);
        assert_eq!(result.get("BMI"), Some("Body mass index"));
        assert_eq!(result.entries[0].sources, vec![AbbreviationSource::AbbreviationsSection]);
        assert!(matches!(
            &result.diagnostics[..],
            [Diagnostic::AbbreviationConflict { reason, .. }] if reason == "explicit abbreviations section"
        ));
    }

    #[test]
    fn test_plain_list_parsing() {
        assert_eq!(
            parse_plain_list("BMI: body mass index; WHO, World Health Organization; GWAS genome-wide association study"),
            vec![
                ("BMI".to_string(), "body mass index".to_string()),
                ("WHO".to_string(), "World Health Organization".to_string()),
                ("GWAS".to_string(), "genome-wide association study".to_string()),
            ]
        );
        assert!(parse_plain_list("this is an ordinary sentence").is_empty());
    }

    #[test]
    fn test_abbreviation_sections_from_markup() {
        let config = Config::from_json_str(
            r#"{"sections": {"defined-by": [{"tag": "section"}], "data": {"headers": [{"tag": "h2"}]}}}"#,
        )
        .expect("config");
        let tree = parse_html(
            r#"<section><h2>Introduction</h2><p>High body mass index (BMI) and low density lipoprotein (LDL).</p></section>
               <section><h2>Abbreviations</h2><dl><dt>BMI</dt><dd>Body mass index</dd>
                   <dt>SNP</dt><dd>single nucleotide polymorphism</dd></dl></section>
               <section><h2>List of abbreviations</h2><table><tr><td>HDL</td><td>high density lipoprotein</td></tr></table></section>"#,
        );
        let sections = SectionExtractor::new(&config).extract(&tree);
        let result = AbbreviationExtractor::new(&config).extract(&tree, &sections);

        assert_eq!(result.get("SNP"), Some("single nucleotide polymorphism"));
        assert_eq!(result.get("HDL"), Some("high density lipoprotein"));
        assert_eq!(result.get("LDL"), Some("low density lipoprotein"));
        let bmi = result.entries.iter().find(|e| e.short_form == "BMI").expect("BMI entry");
        assert_eq!(bmi.long_form, "Body mass index");
        assert_eq!(
            bmi.sources,
            vec![AbbreviationSource::AbbreviationsSection, AbbreviationSource::Fulltext]
        );
        assert!(result.diagnostics.is_empty());
    }
}
