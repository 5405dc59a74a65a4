//! Phonemizer capability and the espeak-ng backend.

use anyhow::{Context, Result};
use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LanguageCode {
    EnUs,
    EnGb,
}

impl LanguageCode {
    /// espeak-ng voice name.
    pub fn espeak_voice(self) -> &'static str {
        match self {
            LanguageCode::EnUs => "en-us",
            LanguageCode::EnGb => "en-gb",
        }
    }
}

pub fn parse_language(code: Option<&str>) -> Result<LanguageCode> {
    let normalized = code.unwrap_or("en-US").trim().to_ascii_lowercase();
    match normalized.as_str() {
        "en-us" | "en_us" | "en" => Ok(LanguageCode::EnUs),
        "en-gb" | "en_gb" | "en-uk" | "en_uk" => Ok(LanguageCode::EnGb),
        "" => Ok(LanguageCode::EnUs),
        other => anyhow::bail!("Unsupported language code: {}", other),
    }
}

/// Converts normalized text into phoneme transcriptions.
///
/// Backends may split their output into several segments (one per sentence or
/// clause). Segments are returned stripped of surrounding whitespace.
#[async_trait]
pub trait Phonemizer: Send + Sync {
    async fn phonemize(&self, text: &str) -> Result<Vec<String>>;
}

#[derive(Clone, Debug)]
pub struct EspeakConfig {
    pub program: String,
    pub language: LanguageCode,
}

impl Default for EspeakConfig {
    fn default() -> Self {
        Self {
            program: "espeak-ng".to_string(),
            language: LanguageCode::EnUs,
        }
    }
}

/// Runs the `espeak-ng` executable in IPA mode, one process per call.
pub struct EspeakPhonemizer {
    config: EspeakConfig,
}

impl EspeakPhonemizer {
    pub fn new(config: EspeakConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Phonemizer for EspeakPhonemizer {
    async fn phonemize(&self, text: &str) -> Result<Vec<String>> {
        let output = Command::new(&self.config.program)
            .arg("-q")
            .arg("--ipa")
            .arg("-v")
            .arg(self.config.language.espeak_voice())
            .arg("--")
            .arg(text)
            .stdin(Stdio::null())
            .output()
            .await
            .with_context(|| format!("Failed to run phonemizer {}", self.config.program))?;

        if !output.status.success() {
            anyhow::bail!(
                "Phonemizer {} exited with {}: {}",
                self.config.program,
                output.status,
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        let stdout = String::from_utf8(output.stdout)
            .context("Phonemizer produced non UTF-8 output")?;
        Ok(split_segments(&stdout))
    }
}

/// One segment per non-blank output line, stripped.
fn split_segments(output: &str) -> Vec<String> {
    output
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}
