//! CLI entry point for Nix-TTS.

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;

use nix_tts::{
    parse_language, AudioSink, EspeakConfig, EspeakPhonemizer, ModelUrls, NixTts, SegmentPolicy,
    SynthConfig, TokenizerState, Tokenizer, TtsError, WavSink, DEFAULT_SAMPLE_RATE,
};

#[derive(Parser, Debug)]
#[command(name = "nix-tts")]
#[command(about = "Nix-TTS text-to-speech using ONNX encoder/decoder models")]
struct Args {
    /// Text to synthesize
    #[arg(short, long, conflicts_with = "phonemes")]
    text: Option<String>,

    /// IPA phoneme string to tokenize (skips normalization and espeak-ng)
    #[arg(short, long)]
    phonemes: Option<String>,

    /// Tokenizer state JSON (vocab_dict, abbreviations_dict, whitespace_regex);
    /// the bundled English tables are used when omitted
    #[arg(long)]
    tokenizer_state: Option<PathBuf>,

    /// Directory containing encoder.onnx and decoder.onnx
    #[arg(short, long, default_value = "models")]
    model_dir: PathBuf,

    /// Encoder model path or URL (overrides --model-dir)
    #[arg(long)]
    encoder: Option<String>,

    /// Decoder model path or URL (overrides --model-dir)
    #[arg(long)]
    decoder: Option<String>,

    /// Output WAV file path
    #[arg(short, long, default_value = "output.wav")]
    output: PathBuf,

    /// Speaker id for multi-speaker decoders
    #[arg(long)]
    speaker: Option<i64>,

    /// Phonemizer language: en-us or en-gb
    #[arg(long, default_value = "en-us")]
    language: String,

    /// espeak-ng executable
    #[arg(long, default_value = "espeak-ng")]
    espeak: String,

    /// Keep every sentence the phonemizer returns instead of only the first
    #[arg(long)]
    all_sentences: bool,

    /// Sample rate of the decoder output in Hz
    #[arg(long, default_value_t = DEFAULT_SAMPLE_RATE)]
    sample_rate: u32,

    /// Only print tokens; do not run the models
    #[arg(long)]
    tokenize_only: bool,

    /// Play the result on the default audio device
    #[cfg(feature = "playback")]
    #[arg(long)]
    play: bool,

    /// Print failures as JSON on stderr
    #[arg(long)]
    json_errors: bool,
}

fn init_tracing() {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nix_tts=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_tracing();

    if let Err(err) = run(&args).await {
        if args.json_errors {
            let structured = TtsError::from_anyhow(&err);
            match serde_json::to_string(&structured) {
                Ok(json) => eprintln!("{json}"),
                Err(_) => eprintln!("Error: {err:#}"),
            }
        } else {
            eprintln!("Error: {err:#}");
        }
        std::process::exit(1);
    }
}

async fn run(args: &Args) -> Result<()> {
    let state = match &args.tokenizer_state {
        Some(path) => TokenizerState::load(path)?,
        None => TokenizerState::bundled().context("Bundled tokenizer state is invalid")?,
    };

    let phonemizer = Arc::new(EspeakPhonemizer::new(EspeakConfig {
        program: args.espeak.clone(),
        language: parse_language(Some(&args.language))?,
    }));
    let segment_policy = if args.all_sentences {
        SegmentPolicy::Join
    } else {
        SegmentPolicy::First
    };

    if let Some(phonemes) = &args.phonemes {
        let tokenizer = Tokenizer::new(&state, phonemizer).context("Invalid tokenizer state")?;
        let tokens = tokenizer.encode(phonemes);
        println!("Phonemes: {phonemes:?}");
        println!("Tokens: {tokens:?} (len={})", tokens.len());
        return Ok(());
    }

    let text = args
        .text
        .as_deref()
        .context("Either --text or --phonemes is required")?;

    if args.tokenize_only {
        let tokenizer = Tokenizer::new(&state, phonemizer)
            .context("Invalid tokenizer state")?
            .with_segment_policy(segment_policy);
        let batch = tokenizer.tokenize(&[text]).await?;
        println!("Text: {text:?}");
        println!("Phonemes: {:?}", batch.phonemes);
        println!("Tokens: {:?}", batch.sequence(0).unwrap_or_default());
        println!("Token lengths: {:?}", batch.lengths);
        return Ok(());
    }

    let defaults = ModelUrls::from_dir(&args.model_dir);
    let urls = ModelUrls::new(
        args.encoder.clone().unwrap_or(defaults.encoder),
        args.decoder.clone().unwrap_or(defaults.decoder),
    );
    let config = SynthConfig {
        sample_rate: args.sample_rate,
        segment_policy,
        cache_dir: None,
    };

    let mut tts = NixTts::with_config(urls, &state, phonemizer, config)?;
    tts.init().await.context("Failed to load models")?;

    let result = tts.synthesize(text, args.speaker).await?;
    tracing::info!(phonemes = %result.phonemes, "synthesized");

    WavSink::new(&args.output).play(&result.audio, result.sample_rate)?;
    play_if_requested(args, &result).await
}

#[cfg(feature = "playback")]
async fn play_if_requested(args: &Args, result: &nix_tts::SynthesisResult) -> Result<()> {
    if !args.play {
        return Ok(());
    }
    nix_tts::RodioSink.play(&result.audio, result.sample_rate)?;
    // Playback is fire-and-forget; keep the process alive until it drains.
    let seconds = result.audio.len() as f64 / result.sample_rate as f64;
    tokio::time::sleep(std::time::Duration::from_secs_f64(seconds + 0.25)).await;
    Ok(())
}

#[cfg(not(feature = "playback"))]
async fn play_if_requested(_args: &Args, _result: &nix_tts::SynthesisResult) -> Result<()> {
    Ok(())
}
