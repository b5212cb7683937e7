// src/config/mod.rs
//! Per-publisher extraction rules.
//!
//! The JSON layout follows the established publisher config files:
//! `{"config": {"sections": {"defined-by": [{"tag": "div", "attrs": {"class": "sec"}}],
//! "data": {"headers": [{"tag": "h2"}]}}}}`. Every regex is compiled (and
//! anchored) here, so a bad pattern stops the run before any document is read.

use std::collections::BTreeMap;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::utils::error::ConfigError;

/// Rule names the extractors know about. Anything else in a config file is
/// reported and skipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SectionKind {
    Title,
    Keywords,
    Sections,
    SubSections,
    Paragraphs,
    Tables,
    Figures,
    References,
    AbbreviationsTable,
    Abstract,
    Introduction,
    Background,
    Methods,
    Results,
    Discussion,
    Conclusions,
    Acknowledgements,
    Supplementary,
    Abbreviations,
}

impl SectionKind {
    pub fn from_key(key: &str) -> Option<Self> {
        let kind = match key.trim().to_lowercase().as_str() {
            "title" => SectionKind::Title,
            "keywords" => SectionKind::Keywords,
            "sections" => SectionKind::Sections,
            "sub-sections" | "subsections" => SectionKind::SubSections,
            "paragraphs" => SectionKind::Paragraphs,
            "tables" => SectionKind::Tables,
            "figures" => SectionKind::Figures,
            "references" => SectionKind::References,
            "abbreviations-table" => SectionKind::AbbreviationsTable,
            "abstract" => SectionKind::Abstract,
            "introduction" => SectionKind::Introduction,
            "background" => SectionKind::Background,
            "methods" => SectionKind::Methods,
            "results" => SectionKind::Results,
            "discussion" => SectionKind::Discussion,
            "conclusion" | "conclusions" => SectionKind::Conclusions,
            "acknowledgements" | "acknowledgments" => SectionKind::Acknowledgements,
            "supplementary" => SectionKind::Supplementary,
            "abbreviations" => SectionKind::Abbreviations,
            _ => return None,
        };
        Some(kind)
    }

    pub fn key(self) -> &'static str {
        match self {
            SectionKind::Title => "title",
            SectionKind::Keywords => "keywords",
            SectionKind::Sections => "sections",
            SectionKind::SubSections => "sub-sections",
            SectionKind::Paragraphs => "paragraphs",
            SectionKind::Tables => "tables",
            SectionKind::Figures => "figures",
            SectionKind::References => "references",
            SectionKind::AbbreviationsTable => "abbreviations-table",
            SectionKind::Abstract => "abstract",
            SectionKind::Introduction => "introduction",
            SectionKind::Background => "background",
            SectionKind::Methods => "methods",
            SectionKind::Results => "results",
            SectionKind::Discussion => "discussion",
            SectionKind::Conclusions => "conclusions",
            SectionKind::Acknowledgements => "acknowledgements",
            SectionKind::Supplementary => "supplementary",
            SectionKind::Abbreviations => "abbreviations",
        }
    }

    /// Rules that name a section type directly (e.g. "methods").
    pub fn is_semantic(self) -> bool {
        matches!(
            self,
            SectionKind::Abstract
                | SectionKind::Introduction
                | SectionKind::Background
                | SectionKind::Methods
                | SectionKind::Results
                | SectionKind::Discussion
                | SectionKind::Conclusions
                | SectionKind::Acknowledgements
                | SectionKind::Supplementary
                | SectionKind::Abbreviations
        )
    }

    /// Rules whose matches become top-level sections.
    pub fn is_top_level_section(self) -> bool {
        self == SectionKind::Sections || self.is_semantic()
    }
}

// --- Compiled rules ---

#[derive(Debug, Clone)]
pub struct AttrPattern {
    pub name: String,
    /// All of these must be satisfied.
    pub values: Vec<Regex>,
}

/// One `{tag, attrs}` entry. Tag alternatives are OR'd; attribute names and
/// the values listed under one name are AND'd.
#[derive(Debug, Clone, Default)]
pub struct Pattern {
    pub tags: Vec<Regex>,
    pub attrs: Vec<AttrPattern>,
}

impl Pattern {
    /// Builds a pattern from raw regex text, anchoring each one.
    pub fn new(tags: &[&str], attrs: &[(&str, &[&str])]) -> Result<Self, regex::Error> {
        Ok(Self {
            tags: tags.iter().map(|t| anchored(t)).collect::<Result<_, _>>()?,
            attrs: attrs
                .iter()
                .map(|(name, values)| {
                    Ok(AttrPattern {
                        name: name.to_string(),
                        values: values.iter().map(|v| anchored(v)).collect::<Result<_, _>>()?,
                    })
                })
                .collect::<Result<_, regex::Error>>()?,
        })
    }

    pub fn tag(tag: &str) -> Result<Self, regex::Error> {
        Self::new(&[tag], &[])
    }
}

/// OR-combined set of patterns (a `defined-by` or `data` entry).
#[derive(Debug, Clone, Default)]
pub struct PatternSet {
    patterns: Vec<Pattern>,
}

impl PatternSet {
    pub fn new(patterns: Vec<Pattern>) -> Self {
        Self { patterns }
    }

    pub fn patterns(&self) -> &[Pattern] {
        &self.patterns
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

#[derive(Debug, Clone, Default)]
pub struct Rule {
    pub defined_by: PatternSet,
    pub data: BTreeMap<String, PatternSet>,
}

impl Rule {
    pub fn data(&self, name: &str) -> Option<&PatternSet> {
        self.data.get(name).filter(|set| !set.is_empty())
    }
}

/// Immutable, validated configuration shared read-only by every document task.
#[derive(Debug, Clone, Default)]
pub struct Config {
    rules: BTreeMap<SectionKind, Rule>,
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        tracing::info!("Loading config from {}", path.display());
        Self::from_json_str(&content)
    }

    pub fn from_json_str(content: &str) -> Result<Self, ConfigError> {
        let value: serde_json::Value = serde_json::from_str(content)?;
        let body = match value.get("config") {
            Some(inner) if inner.is_object() => inner.clone(),
            _ => value,
        };
        let entries = body
            .as_object()
            .ok_or_else(|| ConfigError::Shape("top level must be an object of rules".to_string()))?;

        let mut rules = BTreeMap::new();
        for (name, raw_value) in entries {
            let Some(kind) = SectionKind::from_key(name) else {
                tracing::warn!("Ignoring unrecognized config rule '{}'", name);
                continue;
            };
            let raw: RawRule = serde_json::from_value(raw_value.clone())
                .map_err(|e| ConfigError::Shape(format!("rule '{}': {}", name, e)))?;
            let rule = compile_rule(name, raw)?;
            tracing::debug!(
                "Compiled rule '{}' ({} defined-by patterns, {} data entries)",
                name,
                rule.defined_by.patterns().len(),
                rule.data.len()
            );
            if rules.insert(kind, rule).is_some() {
                tracing::warn!(
                    "Config rule '{}' replaces an earlier rule for '{}'",
                    name,
                    kind.key()
                );
            }
        }

        if rules.is_empty() {
            tracing::warn!("Config contains no recognized rules");
        }
        Ok(Self { rules })
    }

    pub fn rule(&self, kind: SectionKind) -> Option<&Rule> {
        self.rules.get(&kind)
    }

    pub fn rules(&self) -> impl Iterator<Item = (SectionKind, &Rule)> {
        self.rules.iter().map(|(kind, rule)| (*kind, rule))
    }
}

// --- Raw (serde) shapes ---

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

impl OneOrMany {
    fn into_vec(self) -> Vec<String> {
        match self {
            OneOrMany::One(value) => vec![value],
            OneOrMany::Many(values) => values,
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawPattern {
    #[serde(default)]
    tag: Option<OneOrMany>,
    #[serde(default)]
    attrs: Option<BTreeMap<String, OneOrMany>>,
    #[serde(flatten)]
    extra: BTreeMap<String, serde_json::Value>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawPatternList {
    Many(Vec<RawPattern>),
    One(RawPattern),
}

impl RawPatternList {
    fn into_vec(self) -> Vec<RawPattern> {
        match self {
            RawPatternList::Many(patterns) => patterns,
            RawPatternList::One(pattern) => vec![pattern],
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawRule {
    #[serde(rename = "defined-by")]
    defined_by: Option<RawPatternList>,
    #[serde(default)]
    data: BTreeMap<String, RawPatternList>,
}

fn anchored(pattern: &str) -> Result<Regex, regex::Error> {
    Regex::new(&format!("^(?:{})$", pattern))
}

fn compile_regex(rule: &str, pattern: &str) -> Result<Regex, ConfigError> {
    anchored(pattern).map_err(|source| ConfigError::Regex {
        rule: rule.to_string(),
        pattern: pattern.to_string(),
        source,
    })
}

fn compile_pattern(rule: &str, raw: RawPattern) -> Result<Pattern, ConfigError> {
    for key in raw.extra.keys() {
        tracing::warn!("Rule '{}': unsupported pattern key '{}' ignored", rule, key);
    }
    let tags = raw
        .tag
        .map(OneOrMany::into_vec)
        .unwrap_or_default()
        .iter()
        .map(|tag| compile_regex(rule, tag))
        .collect::<Result<Vec<_>, _>>()?;
    let attrs = raw
        .attrs
        .unwrap_or_default()
        .into_iter()
        .map(|(name, values)| {
            let values = values
                .into_vec()
                .iter()
                .map(|value| compile_regex(rule, value))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(AttrPattern { name, values })
        })
        .collect::<Result<Vec<_>, ConfigError>>()?;
    if tags.is_empty() && attrs.is_empty() {
        tracing::warn!("Rule '{}' has a pattern with neither tag nor attrs; it matches every element", rule);
    }
    Ok(Pattern { tags, attrs })
}

fn compile_set(rule: &str, raw: RawPatternList) -> Result<PatternSet, ConfigError> {
    raw.into_vec()
        .into_iter()
        .map(|pattern| compile_pattern(rule, pattern))
        .collect::<Result<Vec<_>, _>>()
        .map(PatternSet::new)
}

fn compile_rule(name: &str, raw: RawRule) -> Result<Rule, ConfigError> {
    let defined_by = match raw.defined_by {
        Some(list) => compile_set(name, list)?,
        None => return Err(ConfigError::MissingDefinedBy(name.to_string())),
    };
    if defined_by.is_empty() {
        return Err(ConfigError::MissingDefinedBy(name.to_string()));
    }

    let mut data = BTreeMap::new();
    for (key, list) in raw.data {
        let label = format!("{}.{}", name, key);
        let set = compile_set(&label, list)?;
        if set.is_empty() {
            tracing::warn!("Data rule '{}' has no patterns", label);
        }
        data.insert(key, set);
    }
    Ok(Rule { defined_by, data })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_wrapped_config() {
        let json = r#"{"config": {
            "sections": {"defined-by": [{"tag": "div", "attrs": {"class": ["sec"]}}],
                         "data": {"headers": [{"tag": "h[1-3]"}]}},
            "conclusion": {"defined-by": {"tag": "section"}},
            "sidebar": {"defined-by": [{"tag": "aside"}]}
        }}"#;
        let config = Config::from_json_str(json).expect("valid config");
        let sections = config.rule(SectionKind::Sections).expect("sections rule");
        assert_eq!(sections.defined_by.patterns().len(), 1);
        assert!(sections.data("headers").is_some());
        // alias accepted, unknown rule dropped
        assert!(config.rule(SectionKind::Conclusions).is_some());
        assert_eq!(config.rules().count(), 2);
    }

    #[test]
    fn test_alias_duplicates_keep_one_rule() {
        let json = r#"{
            "conclusion": {"defined-by": [{"tag": "div"}]},
            "conclusions": {"defined-by": [{"tag": "section"}]},
            "acknowledgments": {"defined-by": [{"tag": "footer"}]}
        }"#;
        let config = Config::from_json_str(json).expect("valid config");
        assert_eq!(config.rules().count(), 2);
        // keys load in sorted order, so the later spelling replaces the earlier
        let conclusions = config.rule(SectionKind::Conclusions).expect("conclusions rule");
        assert!(conclusions.defined_by.patterns()[0].tags[0].is_match("section"));
        assert!(config.rule(SectionKind::Acknowledgements).is_some());
    }

    #[test]
    fn test_patterns_are_anchored() {
        let pattern = Pattern::tag("sec").unwrap();
        assert!(pattern.tags[0].is_match("sec"));
        assert!(!pattern.tags[0].is_match("tsec"));
        assert!(!pattern.tags[0].is_match("section"));

        let alternation = Pattern::tag("h1|h2").unwrap();
        assert!(alternation.tags[0].is_match("h2"));
        assert!(!alternation.tags[0].is_match("h12"));
    }

    #[test]
    fn test_bad_regex_is_load_error() {
        let json = r#"{"tables": {"defined-by": [{"tag": "table("}]}}"#;
        match Config::from_json_str(json) {
            Err(ConfigError::Regex { rule, pattern, .. }) => {
                assert_eq!(rule, "tables");
                assert_eq!(pattern, "table(");
            }
            other => panic!("expected regex error, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_defined_by_is_load_error() {
        let json = r#"{"title": {"data": {"headers": [{"tag": "h1"}]}}}"#;
        assert!(matches!(
            Config::from_json_str(json),
            Err(ConfigError::MissingDefinedBy(name)) if name == "title"
        ));
    }
}
