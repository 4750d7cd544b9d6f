use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use bytes::Bytes;
use clap::{Parser, Subcommand};
use futures::stream::BoxStream;
use tokio_stream::StreamExt as _;
use tracing_subscriber::EnvFilter;

use cadence::{BYTES_PER_SAMPLE, CpalBackend, PlaybackConfig, PlaybackEngine, SAMPLE_RATE};

/// Cadence - streaming audio playback engine
#[derive(Parser)]
#[command(name = "cadence", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Stream a raw PCM file (f32le, mono, 24 kHz) to the speakers
    Play {
        /// Path to the raw PCM file
        file: PathBuf,

        /// Bytes per chunk fed to the engine
        #[arg(long, env = "CADENCE_CHUNK_SIZE", default_value = "4096")]
        chunk_size: usize,

        /// Pace chunks in real time instead of feeding them all at once
        #[arg(long)]
        paced: bool,
    },
    /// Play a short generated tone
    TestSpeaker,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity
    let filter = match cli.verbose {
        0 => "info,cadence=info",
        1 => "info,cadence=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let engine = PlaybackEngine::new(CpalBackend::new(), PlaybackConfig::default());

    match cli.command {
        Command::Play {
            file,
            chunk_size,
            paced,
        } => {
            let data = tokio::fs::read(&file).await?;
            anyhow::ensure!(
                data.len() >= BYTES_PER_SAMPLE,
                "{} holds less than one sample",
                file.display()
            );
            play_bytes(&engine, data, chunk_size.max(1), paced).await
        }
        Command::TestSpeaker => {
            let bytes = sine_samples(440.0, 1.0, 0.5)
                .iter()
                .flat_map(|s| s.to_le_bytes())
                .collect();
            play_bytes(&engine, bytes, 4800, false).await
        }
    }
}

/// Chunk the byte buffer into a stream, play it, and wait for the
/// engine's completion signal.
#[allow(clippy::cast_precision_loss)]
async fn play_bytes(
    engine: &PlaybackEngine<CpalBackend>,
    data: Vec<u8>,
    chunk_size: usize,
    paced: bool,
) -> anyhow::Result<()> {
    let chunks: Vec<std::io::Result<Bytes>> = data
        .chunks(chunk_size)
        .map(|c| Ok(Bytes::copy_from_slice(c)))
        .collect();
    let chunk_secs = chunk_size as f64 / BYTES_PER_SAMPLE as f64 / f64::from(SAMPLE_RATE);

    let stream: BoxStream<'static, std::io::Result<Bytes>> = if paced {
        Box::pin(tokio_stream::iter(chunks).throttle(Duration::from_secs_f64(chunk_secs)))
    } else {
        Box::pin(tokio_stream::iter(chunks))
    };

    let (done_tx, done_rx) = tokio::sync::oneshot::channel();
    engine
        .play(
            stream,
            Box::new(move || {
                let _ = done_tx.send(());
            }),
        )
        .await?;

    tracing::info!("stream consumed; waiting for playback to finish");
    done_rx.await?;
    Ok(())
}

/// Generate sine wave audio samples
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn sine_samples(frequency: f32, duration_secs: f32, amplitude: f32) -> Vec<f32> {
    let num_samples = (SAMPLE_RATE as f32 * duration_secs) as usize;
    (0..num_samples)
        .map(|i| {
            let t = i as f32 / SAMPLE_RATE as f32;
            amplitude * (2.0 * std::f32::consts::PI * frequency * t).sin()
        })
        .collect()
}
