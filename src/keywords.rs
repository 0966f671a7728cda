//! Buyer-intent keyword matching.
//!
//! A [`KeywordPolicy`] is a pure boolean gate over listing text. Patterns are
//! regular expressions compiled case-insensitively; diacritic alternations such
//! as `cump[ăa]r` are kept verbatim since listings use both spellings.
//!
//! Policies compose: [`KeywordPolicy::any`] matches when one pattern hits,
//! [`KeywordPolicy::all_of`] when every member policy matches. The stricter
//! "dried form" variant is simply `all_of([buyer, dried])`, so neither the
//! coordinator nor the adapters need to know which variant is in force.

use crate::error::ConfigError;
use itertools::Itertools;
use regex::{RegexSet, RegexSetBuilder};

/// Which policy the coordinator gates records with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum PolicyVariant {
    /// Any buyer-intent phrase.
    Buyer,
    /// A buyer-intent phrase and a dried/processed-form qualifier.
    Dried,
}

/// Who decides buyer intent for a source's records.
///
/// Search-result sources return sellers and buyers alike, so the run's policy
/// must gate them. Feeds and group pages are already narrowed by the
/// adapter's own title filter, and their wording ("Furnizare fructe uscate",
/// "Firma cumpără macese") rarely contains a contiguous buyer phrase.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gate {
    /// The coordinator applies the run's [`KeywordPolicy`].
    #[default]
    Policy,
    /// The adapter's title filter is the relevance gate.
    Adapter,
}

/// An ordered set of case-insensitive patterns; matches if any pattern does.
#[derive(Debug, Clone)]
pub struct PatternSet {
    patterns: Vec<String>,
    set: RegexSet,
}

impl PatternSet {
    fn compile<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let patterns: Vec<String> = patterns.iter().map(|p| p.as_ref().to_string()).collect();
        // Compile one by one first so a bad pattern is reported by name.
        for p in &patterns {
            if let Err(source) = RegexSetBuilder::new([p]).case_insensitive(true).build() {
                return Err(ConfigError::Pattern {
                    pattern: p.clone(),
                    source,
                });
            }
        }
        let set = RegexSetBuilder::new(&patterns)
            .case_insensitive(true)
            .build()
            .map_err(|source| ConfigError::Pattern {
                pattern: patterns.join(" | "),
                source,
            })?;
        Ok(Self { patterns, set })
    }
}

/// Boolean relevance gate over listing text.
#[derive(Debug, Clone)]
pub enum KeywordPolicy {
    /// True iff at least one pattern matches. An empty set matches nothing.
    Any(PatternSet),
    /// True iff every member matches. An empty list matches everything.
    All(Vec<KeywordPolicy>),
}

impl KeywordPolicy {
    /// Policy matching when any of `patterns` is found in the text.
    pub fn any<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        Ok(KeywordPolicy::Any(PatternSet::compile(patterns)?))
    }

    /// Policy matching when every member matches.
    pub fn all_of(members: Vec<KeywordPolicy>) -> Self {
        KeywordPolicy::All(members)
    }

    /// Policy requiring each pattern to match on its own (the dual-gate form
    /// used by per-source title filters).
    pub fn require_each<S: AsRef<str>>(patterns: &[S]) -> Result<Self, ConfigError> {
        let members = patterns
            .iter()
            .map(|p| KeywordPolicy::any(std::slice::from_ref(p)))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(KeywordPolicy::All(members))
    }

    /// Build the coordinator gate for `variant` from buyer and dried patterns.
    pub fn for_variant<S: AsRef<str>>(
        variant: PolicyVariant,
        buyer: &[S],
        dried: &[S],
    ) -> Result<Self, ConfigError> {
        let buyer = KeywordPolicy::any(buyer)?;
        Ok(match variant {
            PolicyVariant::Buyer => buyer,
            PolicyVariant::Dried => KeywordPolicy::all_of(vec![buyer, KeywordPolicy::any(dried)?]),
        })
    }

    pub fn matches(&self, text: &str) -> bool {
        match self {
            KeywordPolicy::Any(set) => set.set.is_match(text),
            KeywordPolicy::All(members) => members.iter().all(|m| m.matches(text)),
        }
    }

    /// First pattern (in configured order) of an `Any` policy matching `text`.
    /// For composite policies, the first hit of the first member that has one.
    pub fn first_match(&self, text: &str) -> Option<&str> {
        match self {
            KeywordPolicy::Any(set) => set
                .set
                .matches(text)
                .iter()
                .next()
                .map(|i| set.patterns[i].as_str()),
            KeywordPolicy::All(members) => members.iter().find_map(|m| m.first_match(text)),
        }
    }

    /// Search queries derived from the patterns, for adapters that poll a
    /// search endpoint per keyword.
    ///
    /// Each pattern is reduced to literal text (first alternative of each
    /// character class, quantifiers and anchors dropped), the leading verb is
    /// removed, and the remaining words form one query. Patterns that leave
    /// nothing after the verb produce no query. Order is preserved and
    /// duplicates are removed.
    pub fn search_terms(&self) -> Vec<String> {
        self.raw_terms().into_iter().unique().collect()
    }

    fn raw_terms(&self) -> Vec<String> {
        match self {
            KeywordPolicy::Any(set) => set
                .patterns
                .iter()
                .filter_map(|p| query_from_pattern(p))
                .collect(),
            KeywordPolicy::All(members) => members.iter().flat_map(|m| m.raw_terms()).collect(),
        }
    }
}

fn query_from_pattern(pattern: &str) -> Option<String> {
    let literal = literal_text(pattern);
    let words: Vec<&str> = literal.split_whitespace().skip(1).collect();
    if words.is_empty() {
        None
    } else {
        Some(words.join(" ").to_lowercase())
    }
}

fn literal_text(pattern: &str) -> String {
    let mut out = String::with_capacity(pattern.len());
    let mut chars = pattern.chars();
    while let Some(c) = chars.next() {
        match c {
            '[' => {
                let mut first = None;
                while let Some(cc) = chars.next() {
                    match cc {
                        ']' => break,
                        '\\' => {
                            let escaped = chars.next();
                            first = first.or(escaped);
                        }
                        _ => first = first.or(Some(cc)),
                    }
                }
                if let Some(f) = first {
                    out.push(f);
                }
            }
            '\\' => {
                if let Some(escaped) = chars.next() {
                    out.push(escaped);
                }
            }
            '?' | '*' | '+' | '^' | '$' | '(' | ')' => {}
            // Alternation at top level: keep the first branch only.
            '|' => break,
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buyer() -> KeywordPolicy {
        KeywordPolicy::any(&[
            r"cump[ăa]r macese",
            r"buy dried rosehip",
            r"cump[ăa]r aronia uscat[ăa]",
            r"buy dried sea[\- ]?buckthorn",
        ])
        .unwrap()
    }

    #[test]
    fn test_buyer_vs_seller() {
        let p = buyer();
        assert!(p.matches("cumpăr macese uscate"));
        assert!(!p.matches("vând macese"));
    }

    #[test]
    fn test_diacritic_alternation_and_case() {
        let p = buyer();
        assert!(p.matches("Cumpar macese"));
        assert!(p.matches("CUMPĂR MACESE, zona Cluj"));
        assert!(p.matches("We BUY DRIED SEA-BUCKTHORN in bulk"));
        assert!(p.matches("buy dried seabuckthorn"));
        assert!(!p.matches("cumpăr aronia proaspătă"));
    }

    #[test]
    fn test_dried_variant_requires_both_gates() {
        let p = KeywordPolicy::for_variant(
            PolicyVariant::Dried,
            &[r"cump[ăa]r macese", r"cump[ăa]r aronia"],
            &[r"uscat[ăe]?", r"dried"],
        )
        .unwrap();
        assert!(p.matches("Cumpăr macese uscate"));
        assert!(!p.matches("Cumpăr macese proaspete"));
        assert!(!p.matches("Vând macese uscate"));
    }

    #[test]
    fn test_require_each_is_dual_gate() {
        let p = KeywordPolicy::require_each(&[r"cump[ăa]r|buy", r"uscat|dried"]).unwrap();
        assert!(p.matches("Buy dried aronia"));
        assert!(!p.matches("Buy fresh aronia"));
        assert!(KeywordPolicy::require_each::<&str>(&[]).unwrap().matches("anything"));
    }

    #[test]
    fn test_empty_any_matches_nothing() {
        let p = KeywordPolicy::any::<&str>(&[]).unwrap();
        assert!(!p.matches("cumpăr macese"));
    }

    #[test]
    fn test_bad_pattern_is_reported() {
        let err = KeywordPolicy::any(&["ok", "cump[ăa"]).unwrap_err();
        match err {
            ConfigError::Pattern { pattern, .. } => assert_eq!(pattern, "cump[ăa"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_first_match_respects_order() {
        let p = buyer();
        assert_eq!(p.first_match("cumpar macese si aronia uscata"), Some(r"cump[ăa]r macese"));
        assert_eq!(p.first_match("nimic"), None);
    }

    #[test]
    fn test_search_terms() {
        let p = KeywordPolicy::all_of(vec![
            buyer(),
            KeywordPolicy::any(&[r"uscat[ăe]?", r"cump[ăa]r macese"]).unwrap(),
        ]);
        assert_eq!(
            p.search_terms(),
            vec![
                "macese".to_string(),
                "dried rosehip".to_string(),
                "aronia uscată".to_string(),
                "dried sea-buckthorn".to_string(),
            ]
        );
    }
}
