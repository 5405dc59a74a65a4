//! Encoder/decoder inference over ONNX Runtime sessions.
//!
//! Exported Nix-TTS graphs do not agree on output names across versions, so
//! every output the synthesizer consumes goes through an [`OutputBinding`]:
//! a preferred name with a positional fallback. Callers only ever see
//! [`EncoderOutput`] and a flat waveform.

use crate::preprocessing::{lengths_tensor, sequence_mask};
use anyhow::{Context, Result};
use async_trait::async_trait;
use ndarray::{Array1, Array2, Array3, ArrayD};
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::{DynValue, Tensor};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;

/// Helper macro to convert ort errors to anyhow::Error
macro_rules! ort_err {
    ($expr:expr, $msg:expr) => {
        $expr.map_err(|e| anyhow::anyhow!("{}: {}", $msg, e))
    };
}

/// Encoder results in the form the decoder consumes.
#[derive(Clone, Debug)]
pub struct EncoderOutput {
    /// Latent `z`.
    pub latent: ArrayD<f32>,
    /// Output-frame mask `y_mask`, when the encoder exports one.
    pub mask: Option<ArrayD<f32>>,
}

/// The two neural stages of the synthesizer.
#[async_trait]
pub trait AcousticModel: Send + Sync {
    /// `tokens` is `[batch, max_len]`, `lengths` has one entry per row.
    async fn run_encoder(&self, tokens: &Array2<i64>, lengths: &[usize]) -> Result<EncoderOutput>;

    /// Returns the waveform flattened in row-major order.
    async fn run_decoder(&self, encoded: &EncoderOutput, speaker_id: Option<i64>)
        -> Result<Vec<f32>>;
}

/// Preferred output name, with a positional fallback for exports that use
/// generated names.
#[derive(Clone, Debug)]
pub struct OutputBinding {
    pub name: String,
    pub index: Option<usize>,
}

impl OutputBinding {
    pub fn new(name: impl Into<String>, index: Option<usize>) -> Self {
        Self {
            name: name.into(),
            index,
        }
    }

    /// Pick the concrete output name among a session's outputs.
    pub fn resolve(&self, outputs: &[String]) -> Option<String> {
        if outputs.iter().any(|name| *name == self.name) {
            return Some(self.name.clone());
        }
        self.index.and_then(|index| outputs.get(index).cloned())
    }
}

/// Output bindings for both sessions.
#[derive(Clone, Debug)]
pub struct OutputLayout {
    pub latent: OutputBinding,
    pub mask: OutputBinding,
    pub waveform: OutputBinding,
}

impl Default for OutputLayout {
    fn default() -> Self {
        Self {
            latent: OutputBinding::new("z", Some(2)),
            mask: OutputBinding::new("y_mask", None),
            waveform: OutputBinding::new("xw", Some(0)),
        }
    }
}

struct OnnxSession {
    session: Arc<Mutex<Session>>,
    inputs: Vec<String>,
    outputs: Vec<String>,
}

impl OnnxSession {
    fn load(path: &Path, label: &str) -> Result<Self> {
        tracing::info!(path = %path.display(), "loading {label}");
        let builder = ort_err!(Session::builder(), "Failed to create ONNX session builder")?;
        let builder = ort_err!(
            builder.with_optimization_level(GraphOptimizationLevel::Level3),
            "Failed to set ONNX optimization level"
        )?;
        let session = ort_err!(
            builder.commit_from_file(path),
            format!("Failed to load ONNX {label} from {}", path.display())
        )?;

        let inputs: Vec<String> = session.inputs.iter().map(|input| input.name.clone()).collect();
        let outputs: Vec<String> = session
            .outputs
            .iter()
            .map(|output| output.name.clone())
            .collect();
        tracing::debug!(?inputs, ?outputs, "{label} signature");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            inputs,
            outputs,
        })
    }

    fn has_input(&self, name: &str) -> bool {
        self.inputs.iter().any(|input| input == name)
    }

    /// Run on the blocking pool and copy the requested outputs out.
    ///
    /// The session mutex serializes overlapping calls.
    async fn run(
        &self,
        feeds: Vec<(String, DynValue)>,
        wanted: Vec<String>,
    ) -> Result<Vec<ArrayD<f32>>> {
        let session = Arc::clone(&self.session);
        tokio::task::spawn_blocking(move || -> Result<Vec<ArrayD<f32>>> {
            let mut session = session.lock();
            let outputs = ort_err!(session.run(feeds), "ONNX session run failed")?;
            let arrays = wanted
                .iter()
                .map(|name| -> Result<ArrayD<f32>> {
                    let view = ort_err!(
                        outputs[name.as_str()].try_extract_array::<f32>(),
                        format!("Failed to read output {name}")
                    )?;
                    Ok(view.to_owned())
                })
                .collect::<Result<Vec<_>>>();
            arrays
        })
        .await
        .context("ONNX inference task panicked")?
    }
}

/// Nix-TTS encoder and decoder graphs.
pub struct OrtAcousticModel {
    encoder: OnnxSession,
    decoder: OnnxSession,
    latent_name: String,
    mask_name: Option<String>,
    waveform_name: String,
}

impl OrtAcousticModel {
    pub fn load(encoder_path: &Path, decoder_path: &Path) -> Result<Self> {
        Self::load_with_layout(encoder_path, decoder_path, &OutputLayout::default())
    }

    pub fn load_with_layout(
        encoder_path: &Path,
        decoder_path: &Path,
        layout: &OutputLayout,
    ) -> Result<Self> {
        let encoder = OnnxSession::load(encoder_path, "encoder")?;
        let decoder = OnnxSession::load(decoder_path, "decoder")?;

        let latent_name = layout.latent.resolve(&encoder.outputs).with_context(|| {
            format!(
                "Encoder has no output matching {:?} (outputs: {:?})",
                layout.latent, encoder.outputs
            )
        })?;
        let mask_name = layout.mask.resolve(&encoder.outputs);
        let waveform_name = layout.waveform.resolve(&decoder.outputs).with_context(|| {
            format!(
                "Decoder has no output matching {:?} (outputs: {:?})",
                layout.waveform, decoder.outputs
            )
        })?;

        Ok(Self {
            encoder,
            decoder,
            latent_name,
            mask_name,
            waveform_name,
        })
    }
}

/// Wrap an owned array as a named session input.
macro_rules! feed {
    ($name:expr, $array:expr) => {
        ort_err!(
            Tensor::from_array($array),
            format!("Failed to create {} tensor", $name)
        )
        .map(|tensor| ($name.to_string(), tensor.into_dyn()))
    };
}

/// All-valid `[batch, 1, frames]` mask for a `[batch, channels, frames]` latent.
fn full_mask(latent: &ArrayD<f32>) -> Array3<f32> {
    let shape = latent.shape();
    let batch = shape.first().copied().unwrap_or(1);
    let frames = shape.last().copied().unwrap_or(0);
    sequence_mask(&vec![frames; batch], frames)
}

#[async_trait]
impl AcousticModel for OrtAcousticModel {
    async fn run_encoder(&self, tokens: &Array2<i64>, lengths: &[usize]) -> Result<EncoderOutput> {
        if tokens.nrows() != lengths.len() {
            anyhow::bail!(
                "Encoder input mismatch: {} token rows but {} lengths",
                tokens.nrows(),
                lengths.len()
            );
        }

        let c_lengths: Array1<i64> = lengths_tensor(lengths);
        let feeds = vec![feed!("c", tokens.clone())?, feed!("c_lengths", c_lengths)?];

        let mut wanted = vec![self.latent_name.clone()];
        wanted.extend(self.mask_name.clone());

        let mut outputs = self
            .encoder
            .run(feeds, wanted)
            .await
            .context("Encoder forward failed")?
            .into_iter();
        let latent = outputs.next().context("Encoder returned no latent")?;
        let mask = outputs.next();

        Ok(EncoderOutput { latent, mask })
    }

    async fn run_decoder(
        &self,
        encoded: &EncoderOutput,
        speaker_id: Option<i64>,
    ) -> Result<Vec<f32>> {
        let mut feeds = vec![feed!("z", encoded.latent.clone())?];

        if self.decoder.has_input("y_mask") {
            let mask = match &encoded.mask {
                Some(mask) => mask.clone(),
                None => full_mask(&encoded.latent).into_dyn(),
            };
            feeds.push(feed!("y_mask", mask)?);
        }

        if let Some(sid) = speaker_id {
            if !self.decoder.has_input("sid") {
                anyhow::bail!(
                    "Decoder does not accept a speaker id (inputs: {:?})",
                    self.decoder.inputs
                );
            }
            let batch = encoded.latent.shape().first().copied().unwrap_or(1);
            let sids = Array1::from_elem(batch, sid);
            feeds.push(feed!("sid", sids)?);
        }

        let waveform = self
            .decoder
            .run(feeds, vec![self.waveform_name.clone()])
            .await
            .context("Decoder forward failed")?
            .into_iter()
            .next()
            .context("Decoder returned no waveform")?;

        Ok(waveform.iter().copied().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::IxDyn;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|name| name.to_string()).collect()
    }

    #[test]
    fn binding_prefers_name() {
        let binding = OutputBinding::new("z", Some(2));
        let outputs = names(&["z", "logs", "m"]);
        assert_eq!(binding.resolve(&outputs).as_deref(), Some("z"));
    }

    #[test]
    fn binding_falls_back_to_position() {
        let binding = OutputBinding::new("z", Some(2));
        let outputs = names(&["output_0", "output_1", "output_2"]);
        assert_eq!(binding.resolve(&outputs).as_deref(), Some("output_2"));
    }

    #[test]
    fn binding_without_fallback() {
        let binding = OutputBinding::new("y_mask", None);
        assert_eq!(binding.resolve(&names(&["a", "b"])), None);
        assert_eq!(OutputBinding::new("z", Some(5)).resolve(&names(&["a"])), None);
    }

    #[test]
    fn default_layout_matches_exported_graphs() {
        let layout = OutputLayout::default();
        let encoder_outputs = names(&["1", "2", "3", "4"]);
        assert_eq!(layout.latent.resolve(&encoder_outputs).as_deref(), Some("3"));
        assert_eq!(layout.waveform.resolve(&names(&["wav"])).as_deref(), Some("wav"));
    }

    #[test]
    fn full_mask_covers_every_frame() {
        let latent = ArrayD::<f32>::zeros(IxDyn(&[2, 4, 7]));
        let mask = full_mask(&latent);
        assert_eq!(mask.shape(), &[2, 1, 7]);
        assert!(mask.iter().all(|&value| value == 1.0));
    }

    #[test]
    fn loading_missing_model_fails() {
        let result = OrtAcousticModel::load(
            Path::new("/nonexistent/encoder.onnx"),
            Path::new("/nonexistent/decoder.onnx"),
        );
        assert!(result.is_err());
    }
}
