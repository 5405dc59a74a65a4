//! Text-to-waveform façade over the tokenizer and the acoustic model.

use crate::config::{ModelUrls, SynthConfig, TokenizerState};
use crate::download::resolve_model;
use crate::inference::{AcousticModel, OrtAcousticModel};
use crate::phonemizer::Phonemizer;
use crate::tokenizer::{TokenBatch, Tokenizer};
use anyhow::{Context, Result};
use std::sync::Arc;

#[derive(Clone, Debug)]
pub struct SynthesisResult {
    pub audio: Vec<f32>,
    pub sample_rate: u32,
    pub phonemes: String,
}

/// Nix-TTS synthesizer.
///
/// Construct with [`NixTts::new`], load the models once with
/// [`NixTts::init`], then call [`NixTts::vocalize`] as often as needed.
pub struct NixTts {
    tokenizer: Tokenizer,
    model_urls: ModelUrls,
    config: SynthConfig,
    model: Option<Arc<dyn AcousticModel>>,
}

impl NixTts {
    pub fn new(
        model_urls: ModelUrls,
        state: &TokenizerState,
        phonemizer: Arc<dyn Phonemizer>,
    ) -> Result<Self> {
        Self::with_config(model_urls, state, phonemizer, SynthConfig::default())
    }

    pub fn with_config(
        model_urls: ModelUrls,
        state: &TokenizerState,
        phonemizer: Arc<dyn Phonemizer>,
        config: SynthConfig,
    ) -> Result<Self> {
        let tokenizer = Tokenizer::new(state, phonemizer)
            .context("Invalid tokenizer state")?
            .with_segment_policy(config.segment_policy);
        Ok(Self {
            tokenizer,
            model_urls,
            config,
            model: None,
        })
    }

    /// Use an already-loaded acoustic model instead of the ONNX files.
    pub fn with_model(mut self, model: Arc<dyn AcousticModel>) -> Self {
        self.model = Some(model);
        self
    }

    /// Resolve and load the encoder and decoder.
    pub async fn init(&mut self) -> Result<()> {
        let urls = self.model_urls.clone();
        let cache_dir = self.config.cache_dir.clone();
        let model = tokio::task::spawn_blocking(move || -> Result<OrtAcousticModel> {
            let encoder = resolve_model(&urls.encoder, cache_dir.as_deref())
                .context("Failed to resolve encoder")?;
            let decoder = resolve_model(&urls.decoder, cache_dir.as_deref())
                .context("Failed to resolve decoder")?;
            OrtAcousticModel::load(&encoder, &decoder)
        })
        .await
        .context("Model loading task panicked")??;

        self.model = Some(Arc::new(model));
        tracing::info!("synthesizer initialized");
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.model.is_some()
    }

    pub fn tokenizer(&self) -> &Tokenizer {
        &self.tokenizer
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    /// Synthesize one text into mono samples at [`NixTts::sample_rate`].
    pub async fn vocalize(&self, text: &str, speaker_id: Option<i64>) -> Result<Vec<f32>> {
        Ok(self.synthesize(text, speaker_id).await?.audio)
    }

    /// Like [`NixTts::vocalize`], also returning the phonemes that were spoken.
    pub async fn synthesize(&self, text: &str, speaker_id: Option<i64>) -> Result<SynthesisResult> {
        let model = self
            .model
            .as_ref()
            .context("Synthesizer is not initialized")?;

        let batch = self.tokenizer.tokenize(&[text]).await?;
        let audio = self.run_model(model.as_ref(), &batch, speaker_id).await?;
        let phonemes = batch.phonemes.into_iter().next().unwrap_or_default();

        tracing::debug!(
            tokens = batch.lengths.first().copied().unwrap_or(0),
            samples = audio.len(),
            "vocalized"
        );

        Ok(SynthesisResult {
            audio,
            sample_rate: self.config.sample_rate,
            phonemes,
        })
    }

    async fn run_model(
        &self,
        model: &dyn AcousticModel,
        batch: &TokenBatch,
        speaker_id: Option<i64>,
    ) -> Result<Vec<f32>> {
        let encoded = model.run_encoder(&batch.tokens, &batch.lengths).await?;
        model.run_decoder(&encoded, speaker_id).await
    }
}
