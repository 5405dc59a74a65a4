//! Error types.
//!
//! Most fallible operations return `anyhow::Result`. Configuration problems are
//! the exception: they are detected at construction time and carry a typed
//! [`ConfigError`] so callers can tell a bad tokenizer state apart from a
//! runtime failure.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Malformed tokenizer configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid tokenizer state JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid vocab entry {symbol:?}: id 0 is reserved for the separator")]
    ReservedId { symbol: String },
    #[error("Invalid vocab entry {symbol:?}: id {id} must be positive")]
    NegativeId { symbol: String, id: i64 },
    #[error("Invalid vocab: id {id} is assigned to both {first:?} and {second:?}")]
    DuplicateId { id: i64, first: String, second: String },
    #[error("Invalid vocab: empty symbol")]
    EmptySymbol,
    #[error("Invalid abbreviation table: empty key")]
    EmptyAbbreviation,
    #[error("Invalid abbreviation {key:?}: expansion {expansion:?} is itself an abbreviation")]
    RecursiveExpansion { key: String, expansion: String },
    #[error("Invalid regex {pattern:?}: {source}")]
    Regex {
        pattern: String,
        #[source]
        source: regex::Error,
    },
}

/// Structured error for callers that need a stable classification, such as
/// the CLI's JSON error output.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TtsError {
    NotInitialized { message: String },
    Config { message: String },
    Phonemizer { message: String },
    Inference { message: String },
    Io { message: String },
    Internal { message: String },
}

impl TtsError {
    pub fn from_anyhow(err: &anyhow::Error) -> Self {
        let message = format!("{err:#}");
        if err.chain().any(|cause| cause.is::<ConfigError>()) {
            return TtsError::Config { message };
        }
        if message.contains("not initialized") {
            return TtsError::NotInitialized { message };
        }
        if err.chain().any(|cause| cause.is::<std::io::Error>())
            || message.contains("Failed to open")
            || message.contains("Failed to resolve")
            || message.contains("Failed to download")
        {
            return TtsError::Io { message };
        }
        if message.contains("Phonemizer")
            || message.contains("espeak")
            || message.contains("Unsupported language")
        {
            return TtsError::Phonemizer { message };
        }
        if message.contains("Encoder") || message.contains("Decoder") || message.contains("ONNX") {
            return TtsError::Inference { message };
        }
        TtsError::Internal { message }
    }

    pub fn message(&self) -> &str {
        match self {
            TtsError::NotInitialized { message }
            | TtsError::Config { message }
            | TtsError::Phonemizer { message }
            | TtsError::Inference { message }
            | TtsError::Io { message }
            | TtsError::Internal { message } => message,
        }
    }
}

impl From<anyhow::Error> for TtsError {
    fn from(err: anyhow::Error) -> Self {
        Self::from_anyhow(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn config_errors_are_classified_through_context() {
        let err: anyhow::Result<()> = Err(ConfigError::EmptySymbol).context("Failed to load vocab");
        let classified = TtsError::from_anyhow(&err.unwrap_err());
        assert!(matches!(classified, TtsError::Config { .. }));
        assert!(classified.message().contains("empty symbol"));
    }

    #[test]
    fn uninitialized_errors_are_classified() {
        let err = anyhow::anyhow!("Synthesizer is not initialized");
        assert!(matches!(TtsError::from(err), TtsError::NotInitialized { .. }));
    }

    fn missing_model(stage: &str, path: &str) -> anyhow::Error {
        anyhow::anyhow!("Failed to open model {path}: no such file")
            .context(format!("Failed to resolve {stage}"))
            .context("Failed to load models")
    }

    #[test]
    fn missing_models_are_io_for_both_stages() {
        let encoder = TtsError::from(missing_model("encoder", "models/encoder.onnx"));
        let decoder = TtsError::from(missing_model("decoder", "models/decoder.onnx"));
        assert!(matches!(encoder, TtsError::Io { .. }), "{encoder:?}");
        assert!(matches!(decoder, TtsError::Io { .. }), "{decoder:?}");
    }

    #[test]
    fn model_paths_do_not_decide_the_kind() {
        let err = anyhow::anyhow!("Failed to load ONNX decoder from models/decoder.onnx: bad graph");
        assert!(matches!(TtsError::from(err), TtsError::Inference { .. }));

        let err = anyhow::anyhow!("Synthesizer exploded near /tmp/decoder.onnx");
        assert!(matches!(TtsError::from(err), TtsError::Internal { .. }));
    }

    #[test]
    fn forward_failures_are_inference() {
        let err = anyhow::anyhow!("shape mismatch").context("Decoder forward failed");
        assert!(matches!(TtsError::from(err), TtsError::Inference { .. }));
    }

    #[test]
    fn serializes_with_kind_tag() {
        let err = TtsError::Phonemizer {
            message: "espeak-ng exited".to_string(),
        };
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"kind":"phonemizer","message":"espeak-ng exited"}"#);
    }
}
