// src/utils/text.rs
use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("Failed to compile WHITESPACE_RE"));

// "1.2 × 10−5", "3x10<sup>-4</sup>" and friends
static TIMES_TEN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s?[*×xX]\s?10_?(?:<sup>)?\s?[–−-]\s?(\d+)(?:</sup>)?")
        .expect("Failed to compile TIMES_TEN_RE")
});

// "1.2 E − 5", "4e-3"
static SCIENTIFIC_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d+(?:\.\d+)?)\s?[eE]\s?[–−-]\s?(\d+)")
        .expect("Failed to compile SCIENTIFIC_RE")
});

/// Normalizes extracted text: thin and non-breaking spaces become plain
/// spaces, whitespace runs collapse to one space, ends are trimmed.
pub fn clean_text(raw: &str) -> String {
    let replaced: String = raw
        .chars()
        .map(|c| match c {
            '\u{00a0}' | '\u{2009}' | '\u{202f}' | '\u{2002}' | '\u{2003}' => ' ',
            other => other,
        })
        .collect();
    WHITESPACE_RE.replace_all(replaced.trim(), " ").into_owned()
}

/// Rewrites p-value style numbers into plain scientific notation.
/// Anything that doesn't look like one is returned unchanged.
pub fn normalize_numeric(value: &str) -> String {
    if let Some(caps) = TIMES_TEN_RE.captures(value) {
        let rest = &value[caps.get(0).map_or(0, |m| m.end())..];
        return format!("{}e-{}{}", &caps[1], &caps[2], rest);
    }
    if let Some(caps) = SCIENTIFIC_RE.captures(value) {
        let rest = &value[caps.get(0).map_or(0, |m| m.end())..];
        return format!("{}e-{}{}", &caps[1], &caps[2], rest);
    }
    value.to_string()
}

/// Character count, used for BioC offsets.
pub fn char_len(text: &str) -> usize {
    text.chars().count()
}
