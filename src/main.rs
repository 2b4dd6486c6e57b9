//! Application entry point for polyvoice.
//!
//! # Startup sequence (`run`)
//!
//! 1. Initialise logging.
//! 2. Load [`AppConfig`] (returns default on first run).
//! 3. Create the [`tokio`] runtime.
//! 4. Build the recognizer and synthesizer from config.
//! 5. Resolve the voice set and build the [`Orchestrator`].
//! 6. Hand stdin to the console loop until `quit` or Ctrl-C.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio_util::sync::CancellationToken;

use polyvoice::{
    audio::RodioPlayback,
    cli::{self, Cli, Commands},
    config::{AppConfig, AppPaths},
    console::{run_console, ConsoleObserver},
    pipeline::{Collaborators, Orchestrator},
    segment,
    stt::{build_transcriber, SpeechRecognizer},
    tts::{build_synthesizer, resolve_voices},
    voice::VoiceRotation,
};

fn load_config(path: Option<&Path>) -> anyhow::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load_from(path)
            .with_context(|| format!("failed to load config from {}", path.display())),
        None => Ok(AppConfig::load().unwrap_or_else(|e| {
            log::warn!("Failed to load config ({e}); using defaults");
            AppConfig::default()
        })),
    }
}

async fn run_pipeline(config: AppConfig, listen: bool) -> anyhow::Result<()> {
    let paths = AppPaths::new();
    let shutdown = CancellationToken::new();

    let transcriber = build_transcriber(&config.recognition, &paths)?;
    let recognizer = SpeechRecognizer::new(config.listen.clone(), transcriber, shutdown.clone());

    let synthesizer = build_synthesizer(&config.synthesis);
    let voices = {
        let synthesizer = Arc::clone(&synthesizer);
        let synthesis = config.synthesis.clone();
        tokio::task::spawn_blocking(move || resolve_voices(synthesizer.as_ref(), &synthesis))
            .await?
            .context("could not enumerate synthesis voices")?
    };
    log::info!("{} voice(s) available", voices.len());
    let rotation = VoiceRotation::new(voices)?;

    let orchestrator = Orchestrator::new(
        Collaborators {
            recognizer: Arc::new(recognizer),
            synthesizer,
            playback: Arc::new(RodioPlayback::new()),
            observer: Arc::new(ConsoleObserver),
        },
        rotation,
        config.noise.clone(),
        shutdown,
    );

    if listen {
        let _ = orchestrator.start_listening();
    }
    run_console(orchestrator).await
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 1. Logging
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // 2. Configuration
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Run { noise, listen } => {
            log::info!("polyvoice starting up");
            if noise.is_some() {
                config.noise.folder = noise;
            }

            // 3. Tokio runtime
            let rt = tokio::runtime::Builder::new_multi_thread()
                .enable_all()
                .build()
                .context("failed to create tokio runtime")?;
            rt.block_on(run_pipeline(config, listen))
        }

        Commands::Segment {
            source,
            output,
            chunk_ms,
            random,
            min_ms,
            max_ms,
        } => {
            let mode = cli::chunk_mode(random, chunk_ms, min_ms, max_ms, &config.segment);
            let report = segment::segment_dir(&source, &output, mode)?;
            println!(
                "{} chunk(s) written to {}",
                report.exported.len(),
                output.display()
            );
            for (path, reason) in &report.failed {
                eprintln!("skipped {}: {reason}", path.display());
            }
            Ok(())
        }
    }
}
