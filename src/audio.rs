//! Audio output: WAV files and device playback.

use anyhow::{Context, Result};
use hound::{SampleFormat, WavSpec, WavWriter};
use std::path::{Path, PathBuf};

/// Save audio samples to a WAV file.
///
/// Args:
///     samples: Audio samples in range [-1.0, 1.0]
///     path: Output file path
///     sample_rate: Sample rate in Hz (22050 for Nix-TTS)
pub fn save_wav(samples: &[f32], path: &Path, sample_rate: u32) -> Result<()> {
    let spec = WavSpec {
        channels: 1,
        sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, spec).context("Failed to create WAV file")?;

    for &sample in samples {
        let clamped = sample.clamp(-1.0, 1.0);
        let int_sample = (clamped * i16::MAX as f32) as i16;
        writer
            .write_sample(int_sample)
            .context("Failed to write sample")?;
    }

    writer.finalize().context("Failed to finalize WAV file")?;

    Ok(())
}

/// Somewhere to send a finished waveform. Mono, fire-and-forget: `play`
/// returns once output has started, without waiting for it to finish.
pub trait AudioSink {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<()>;
}

/// Writes each waveform to a WAV file.
pub struct WavSink {
    path: PathBuf,
}

impl WavSink {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AudioSink for WavSink {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        save_wav(samples, &self.path, sample_rate)?;
        tracing::info!(
            path = %self.path.display(),
            seconds = samples.len() as f32 / sample_rate as f32,
            "wrote audio"
        );
        Ok(())
    }
}

/// Plays on the default output device.
#[cfg(feature = "playback")]
pub struct RodioSink;

#[cfg(feature = "playback")]
impl AudioSink for RodioSink {
    fn play(&self, samples: &[f32], sample_rate: u32) -> Result<()> {
        use rodio::buffer::SamplesBuffer;
        use rodio::{OutputStream, Sink};

        let buffer = SamplesBuffer::new(1, sample_rate, samples.to_vec());
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), String>>();

        // The output stream stops when dropped, so it lives on its own thread
        // until the buffer has drained.
        std::thread::spawn(move || {
            let (_stream, handle) = match OutputStream::try_default() {
                Ok(pair) => pair,
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("Failed to open audio output: {err}")));
                    return;
                }
            };
            let sink = match Sink::try_new(&handle) {
                Ok(sink) => sink,
                Err(err) => {
                    let _ = ready_tx.send(Err(format!("Failed to create audio sink: {err}")));
                    return;
                }
            };
            sink.append(buffer);
            let _ = ready_tx.send(Ok(()));
            sink.sleep_until_end();
        });

        ready_rx
            .recv()
            .context("Audio playback thread stopped")?
            .map_err(|err| anyhow::anyhow!(err))
    }
}
