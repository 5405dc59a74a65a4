//! Nix-TTS inference library
//!
//! Text normalization, phoneme tokenization and ONNX encoder/decoder
//! inference for the Nix-TTS speech synthesizer.

mod audio;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod normalizer;
pub mod phonemizer;
pub mod preprocessing;
pub mod synth;
pub mod tokenizer;
pub mod vocab;

#[cfg(feature = "playback")]
pub use audio::RodioSink;
pub use audio::{save_wav, AudioSink, WavSink};
pub use config::{ModelUrls, SynthConfig, TokenizerState, DEFAULT_SAMPLE_RATE};
pub use error::{ConfigError, TtsError};
pub use inference::{AcousticModel, EncoderOutput, OrtAcousticModel, OutputBinding, OutputLayout};
pub use normalizer::TextNormalizer;
pub use phonemizer::{parse_language, EspeakConfig, EspeakPhonemizer, LanguageCode, Phonemizer};
pub use preprocessing::{intersperse, pad_batch, sequence_mask};
pub use synth::{NixTts, SynthesisResult};
pub use tokenizer::{SegmentPolicy, TokenBatch, Tokenizer};
pub use vocab::{Vocab, SEPARATOR_ID};
