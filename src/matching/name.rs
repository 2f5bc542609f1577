// src/matching/name.rs - Name normalisation and fingerprinting
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::BTreeSet;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

static WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

/// Spelled-out legal forms and the abbreviation they collapse to.
const LEGAL_FORM_SUBSTITUTIONS: [(&str, &str); 12] = [
    ("public limited company", "plc"),
    ("incorporated", "inc"),
    ("limited liability company", "llc"),
    ("limited liability partnership", "llp"),
    ("limited partnership", "lp"),
    ("limited", "ltd"),
    ("corporation", "corp"),
    ("company", "co"),
    ("gesellschaft mit beschrankter haftung", "gmbh"),
    ("aktiengesellschaft", "ag"),
    ("societe anonyme", "sa"),
    ("besloten vennootschap", "bv"),
];

pub const LEGAL_FORM_TOKENS: [&str; 17] = [
    "inc", "ltd", "llc", "llp", "lp", "gmbh", "co", "corp", "plc", "ag", "sa", "sarl", "bv", "nv",
    "spa", "pty", "srl",
];

/// Comparison key for exact-name grouping.
///
/// Strips diacritics, lowercases, spells out `&`, drops apostrophes, turns any
/// other punctuation into a space and collapses whitespace. `None` and blank
/// names give an empty string.
pub fn normalize_name(name: Option<&str>) -> String {
    let raw = match name {
        Some(n) if !n.trim().is_empty() => n,
        _ => return String::new(),
    };

    let mut out = String::with_capacity(raw.len());
    for c in raw.nfkd().filter(|c| !is_combining_mark(*c)) {
        match c {
            '&' => out.push_str(" and "),
            '\'' | '\u{2019}' | '`' => {}
            c if c.is_alphanumeric() => out.extend(c.to_lowercase()),
            _ => out.push(' '),
        }
    }
    WHITESPACE.replace_all(out.trim(), " ").into_owned()
}

/// Deduplication-grade form of a name: normalized, legal forms removed,
/// remaining tokens deduplicated and sorted.
pub fn fingerprint(name: Option<&str>) -> String {
    let normalized = normalize_name(name);
    if normalized.is_empty() {
        return normalized;
    }

    // Pad so substitutions only match whole tokens.
    let mut padded = format!(" {} ", normalized);
    for (long, short) in LEGAL_FORM_SUBSTITUTIONS.iter() {
        padded = padded.replace(&format!(" {} ", long), &format!(" {} ", short));
    }

    let tokens: BTreeSet<&str> = padded
        .split_whitespace()
        .filter(|t| !LEGAL_FORM_TOKENS.contains(t))
        .collect();
    tokens.into_iter().collect::<Vec<_>>().join(" ")
}

/// Distinct tokens of the normalized name.
pub fn tokenize_name(normalized: &str) -> BTreeSet<String> {
    normalized
        .split_whitespace()
        .map(|t| t.to_string())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_diacritics_and_punctuation() {
        assert_eq!(normalize_name(Some("Société Générale")), "societe generale");
        assert_eq!(normalize_name(Some("  ACME,  Inc. ")), "acme inc");
        assert_eq!(normalize_name(Some("Smith & Sons")), "smith and sons");
        assert_eq!(normalize_name(Some("O'Brien-Holdings")), "obrien holdings");
    }

    #[test]
    fn test_normalize_missing_name() {
        assert_eq!(normalize_name(None), "");
        assert_eq!(normalize_name(Some("   ")), "");
        assert_eq!(normalize_name(Some("...")), "");
    }

    #[test]
    fn test_fingerprint_drops_legal_forms_and_sorts() {
        assert_eq!(fingerprint(Some("Acme Incorporated")), "acme");
        assert_eq!(fingerprint(Some("ACME Inc.")), "acme");
        assert_eq!(fingerprint(Some("Zenith Holdings Limited")), "holdings zenith");
        assert_eq!(fingerprint(Some("Holdings Zenith Ltd Holdings")), "holdings zenith");
        assert_eq!(fingerprint(Some("Inc.")), "");
    }

    #[test]
    fn test_fingerprint_keeps_inner_words() {
        // "co" only drops as a whole token.
        assert_eq!(fingerprint(Some("Cobalt Co")), "cobalt");
        assert_eq!(fingerprint(None), "");
    }

    #[test]
    fn test_tokenize_name() {
        let tokens = tokenize_name("acme acme holdings");
        assert_eq!(tokens.len(), 2);
        assert!(tokens.contains("holdings"));
    }
}
