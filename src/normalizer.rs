//! Text normalization ahead of phonemization.

use crate::error::ConfigError;
use regex::{NoExpand, Regex};

/// Lowercases text, expands abbreviations and collapses whitespace.
#[derive(Debug, Clone)]
pub struct TextNormalizer {
    abbreviations: Vec<(Regex, String)>,
    whitespace: Regex,
}

impl TextNormalizer {
    /// Compile the abbreviation table and whitespace pattern.
    ///
    /// Each key `k` matches `\bk\.` with an ASCII word boundary, so a
    /// non-ASCII letter before the key does not block the match.
    /// Replacements run in table order.
    pub fn new(
        abbreviations: &[(String, String)],
        whitespace_pattern: &str,
    ) -> Result<Self, ConfigError> {
        let whitespace = compile(whitespace_pattern)?;

        let mut compiled = Vec::with_capacity(abbreviations.len());
        for (key, expansion) in abbreviations {
            if key.is_empty() {
                return Err(ConfigError::EmptyAbbreviation);
            }
            let pattern = format!(r"(?-u:\b){}\.", regex::escape(key));
            compiled.push((compile(&pattern)?, expansion.clone()));
        }

        // Expanding twice must be a no-op.
        for (key, expansion) in abbreviations {
            if compiled.iter().any(|(re, _)| re.is_match(expansion)) {
                return Err(ConfigError::RecursiveExpansion {
                    key: key.clone(),
                    expansion: expansion.clone(),
                });
            }
        }

        Ok(Self {
            abbreviations: compiled,
            whitespace,
        })
    }

    pub fn normalize(&self, text: &str) -> String {
        let lowered = text.to_lowercase();
        let expanded = self.expand_abbreviations(&lowered);
        self.collapse_whitespace(&expanded)
    }

    pub fn expand_abbreviations(&self, text: &str) -> String {
        let mut text = text.to_string();
        for (re, expansion) in &self.abbreviations {
            text = re.replace_all(&text, NoExpand(expansion.as_str())).into_owned();
        }
        text
    }

    /// Replace every whitespace run with one space. Leading and trailing
    /// runs are collapsed, not trimmed.
    pub fn collapse_whitespace(&self, text: &str) -> String {
        self.whitespace.replace_all(text, " ").into_owned()
    }
}

fn compile(pattern: &str) -> Result<Regex, ConfigError> {
    Regex::new(pattern).map_err(|source| ConfigError::Regex {
        pattern: pattern.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TokenizerState;

    fn english() -> TextNormalizer {
        let state = TokenizerState::bundled().unwrap();
        TextNormalizer::new(&state.abbreviations_dict, &state.whitespace_regex).unwrap()
    }

    fn table(entries: &[(&str, &str)]) -> Vec<(String, String)> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn expands_titles() {
        let normalizer = english();
        assert_eq!(
            normalizer.normalize("Mr. Smith went to Washington."),
            "mister smith went to washington."
        );
        assert_eq!(normalizer.normalize("Mrs. Smith"), "misess smith");
        assert_eq!(normalizer.normalize("Dr. Who and Lt. Dan"), "doctor who and lieutenant dan");
    }

    #[test]
    fn requires_trailing_period() {
        let normalizer = english();
        assert_eq!(normalizer.normalize("Mr Smith"), "mr smith");
    }

    #[test]
    fn requires_leading_word_boundary() {
        let normalizer = english();
        // "st." inside "first." is not an abbreviation.
        assert_eq!(normalizer.normalize("first."), "first.");
        assert_eq!(normalizer.normalize("St. Louis"), "saint louis");
    }

    #[test]
    fn boundary_is_ascii_only() {
        let normalizer = english();
        assert_eq!(normalizer.normalize("éco. x"), "écompany x");
        assert_eq!(normalizer.normalize("ñmr. x"), "ñmister x");
        assert_eq!(normalizer.normalize("tco. x"), "tco. x");
    }

    #[test]
    fn no_boundary_needed_after_period() {
        let normalizer = english();
        assert_eq!(normalizer.normalize("mr.smith"), "mistersmith");
    }

    #[test]
    fn collapses_whitespace_without_trimming() {
        let normalizer = english();
        assert_eq!(normalizer.normalize("  hello \t\n world  "), " hello world ");
    }

    #[test]
    fn empty_input() {
        assert_eq!(english().normalize(""), "");
    }

    #[test]
    fn table_order_decides_overlaps() {
        let first = TextNormalizer::new(&table(&[("co", "company"), ("col", "colonel")]), r"\s+")
            .unwrap();
        assert_eq!(first.normalize("col. co."), "colonel company");

        let a = TextNormalizer::new(&table(&[("a b", "x"), ("b", "y")]), r"\s+").unwrap();
        let b = TextNormalizer::new(&table(&[("b", "y"), ("a b", "x")]), r"\s+").unwrap();
        assert_eq!(a.normalize("a b."), "x");
        assert_eq!(b.normalize("a b."), "a y");
    }

    #[test]
    fn keys_are_literal() {
        let normalizer = TextNormalizer::new(&table(&[("e.g", "for example")]), r"\s+").unwrap();
        assert_eq!(normalizer.normalize("e.g. this"), "for example this");
        assert_eq!(normalizer.normalize("exg. this"), "exg. this");
    }

    #[test]
    fn dollar_signs_in_expansions_are_literal() {
        let normalizer = TextNormalizer::new(&table(&[("usd", "$1 dollars")]), r"\s+").unwrap();
        assert_eq!(normalizer.normalize("5 usd."), "5 $1 dollars");
    }

    #[test]
    fn expansion_is_idempotent() {
        let normalizer = english();
        let once = normalizer.normalize("Capt. Jones and Sgt. Pepper of Ft. Knox, Ltd.");
        assert_eq!(normalizer.normalize(&once), once);
    }

    #[test]
    fn rejects_recursive_expansion() {
        let err = TextNormalizer::new(&table(&[("mr", "mr."), ("dr", "doctor")]), r"\s+")
            .unwrap_err();
        assert!(matches!(err, ConfigError::RecursiveExpansion { .. }));
    }

    #[test]
    fn rejects_invalid_whitespace_pattern() {
        let err = TextNormalizer::new(&[], r"\s+(").unwrap_err();
        assert!(matches!(err, ConfigError::Regex { .. }));
    }

    #[test]
    fn rejects_empty_key() {
        let err = TextNormalizer::new(&table(&[("", "nothing")]), r"\s+").unwrap_err();
        assert!(matches!(err, ConfigError::EmptyAbbreviation));
    }
}
