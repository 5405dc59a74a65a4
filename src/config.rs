//! Tokenizer state and runtime configuration.

use crate::error::ConfigError;
use crate::tokenizer::SegmentPolicy;
use anyhow::{Context, Result};
use serde::de::{Deserializer, MapAccess, Visitor};
use serde::Deserialize;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Default output sample rate of the Nix-TTS decoder.
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

const DEFAULT_TOKENIZER_STATE: &str = include_str!("../assets/tokenizer_state.json");

/// Tokenizer tables as shipped alongside the exported models.
///
/// ```json
/// {
///   "vocab_dict": { " ": 1, "a": 13, ... },
///   "abbreviations_dict": { "mrs": "misess", "mr": "mister", ... },
///   "whitespace_regex": "\\s+"
/// }
/// ```
///
/// `abbreviations_dict` keeps the order of the JSON document, since expansion
/// is applied key by key in that order.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenizerState {
    pub vocab_dict: HashMap<String, i64>,
    #[serde(deserialize_with = "deserialize_ordered_pairs")]
    pub abbreviations_dict: Vec<(String, String)>,
    pub whitespace_regex: String,
}

impl TokenizerState {
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Load tokenizer state from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = fs::read_to_string(path)
            .with_context(|| format!("Failed to open tokenizer state {}", path.display()))?;
        let state = Self::from_json_str(&json)
            .with_context(|| format!("Failed to parse tokenizer state {}", path.display()))?;
        Ok(state)
    }

    /// The English tables bundled with the crate.
    pub fn bundled() -> Result<Self, ConfigError> {
        Self::from_json_str(DEFAULT_TOKENIZER_STATE)
    }
}

fn deserialize_ordered_pairs<'de, D>(deserializer: D) -> Result<Vec<(String, String)>, D::Error>
where
    D: Deserializer<'de>,
{
    struct OrderedPairs;

    impl<'de> Visitor<'de> for OrderedPairs {
        type Value = Vec<(String, String)>;

        fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
            f.write_str("a map of abbreviation to expansion")
        }

        fn visit_map<A>(self, mut access: A) -> Result<Self::Value, A::Error>
        where
            A: MapAccess<'de>,
        {
            let mut pairs = Vec::with_capacity(access.size_hint().unwrap_or(0));
            while let Some((key, value)) = access.next_entry::<String, String>()? {
                pairs.push((key, value));
            }
            Ok(pairs)
        }
    }

    deserializer.deserialize_map(OrderedPairs)
}

/// Where to fetch the two exported model graphs from.
///
/// Each entry is a local path or an `http(s)://` URL.
#[derive(Clone, Debug, Deserialize)]
pub struct ModelUrls {
    pub encoder: String,
    pub decoder: String,
}

impl ModelUrls {
    pub fn new(encoder: impl Into<String>, decoder: impl Into<String>) -> Self {
        Self {
            encoder: encoder.into(),
            decoder: decoder.into(),
        }
    }

    /// `encoder.onnx` / `decoder.onnx` inside a directory.
    pub fn from_dir(dir: &Path) -> Self {
        Self::new(
            dir.join("encoder.onnx").to_string_lossy(),
            dir.join("decoder.onnx").to_string_lossy(),
        )
    }
}

/// Settings for a [`crate::NixTts`] instance.
#[derive(Clone, Debug)]
pub struct SynthConfig {
    pub sample_rate: u32,
    pub segment_policy: SegmentPolicy,
    pub cache_dir: Option<PathBuf>,
}

impl Default for SynthConfig {
    fn default() -> Self {
        Self {
            sample_rate: DEFAULT_SAMPLE_RATE,
            segment_policy: SegmentPolicy::default(),
            cache_dir: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn bundled_state_parses() {
        let state = TokenizerState::bundled().unwrap();
        assert_eq!(state.vocab_dict.len(), 118);
        assert_eq!(state.vocab_dict["a"], 13);
        assert_eq!(state.vocab_dict["əʊ"], 118);
        assert_eq!(state.whitespace_regex, r"\s+");
    }

    #[test]
    fn abbreviations_keep_document_order() {
        let state = TokenizerState::bundled().unwrap();
        let keys: Vec<&str> = state
            .abbreviations_dict
            .iter()
            .take(3)
            .map(|(key, _)| key.as_str())
            .collect();
        assert_eq!(keys, ["mrs", "mr", "dr"]);
    }

    #[test]
    fn rejects_non_integer_vocab_values() {
        let json = r#"{"vocab_dict": {"a": "one"}, "abbreviations_dict": {}, "whitespace_regex": "\\s+"}"#;
        let err = TokenizerState::from_json_str(json).unwrap_err();
        assert!(matches!(err, ConfigError::Json(_)));
    }

    #[test]
    fn rejects_non_mapping_abbreviations() {
        let json = r#"{"vocab_dict": {"a": 1}, "abbreviations_dict": ["mr"], "whitespace_regex": "\\s+"}"#;
        assert!(TokenizerState::from_json_str(json).is_err());
    }

    #[test]
    fn load_from_file() {
        let mut file = NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"vocab_dict": {{"a": 1, "b": 2}}, "abbreviations_dict": {{"dr": "doctor"}}, "whitespace_regex": "\\s+"}}"#
        )
        .unwrap();

        let state = TokenizerState::load(file.path()).unwrap();
        assert_eq!(state.vocab_dict.len(), 2);
        assert_eq!(state.abbreviations_dict, vec![("dr".to_string(), "doctor".to_string())]);
    }

    #[test]
    fn load_missing_file_fails() {
        let err = TokenizerState::load(Path::new("/nonexistent/state.json")).unwrap_err();
        assert!(err.to_string().contains("Failed to open tokenizer state"));
    }
}
