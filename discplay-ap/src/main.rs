//! discplay Audio Player (discplay-ap) - Main entry point
//!
//! Headless driver: opens a cue/bin disc image, plays it through the default
//! (or named) audio device and reports the audible position until the disc
//! ends or the process is interrupted.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use discplay_ap::audio::output::{CpalSink, DEFAULT_QUEUE_SAMPLES};
use discplay_ap::disc::image::ImageDisc;
use discplay_ap::disc::{DiscDevice, DiscType};
use discplay_ap::playback::driver::TICK_INTERVAL;
use discplay_ap::playback::{drive, DriveEnd, Player, PlayerStatus};
use discplay_common::config::{self, LoggingConfig, ReaderMode, CONFIG_ENV_VAR};
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for discplay-ap
#[derive(Parser, Debug)]
#[command(name = "discplay-ap")]
#[command(about = "Gapless CD audio player")]
#[command(version)]
struct Args {
    /// Cue sheet of the disc image to play (overrides [disc] cue_path)
    #[arg(long, env = "DISCPLAY_CUE")]
    cue: Option<PathBuf>,

    /// Config file (default: $DISCPLAY_CONFIG, then the platform config dir)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Audio output device name (overrides [output] device)
    #[arg(short, long, env = "DISCPLAY_DEVICE")]
    device: Option<String>,

    /// Track to start with (1-based)
    #[arg(short, long, default_value_t = 1)]
    track: usize,

    /// Read from the disc in the drive step instead of a background thread
    #[arg(long)]
    inline_reader: bool,

    /// Print status lines as JSON on stdout
    #[arg(long)]
    json: bool,

    /// Status report interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    status_interval_ms: u64,

    /// List audio output devices and exit
    #[arg(long)]
    list_devices: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = config::resolve_config_path(args.config.as_deref(), CONFIG_ENV_VAR);
    let config = config::load_config(config_path.as_deref()).context("Failed to load configuration")?;

    init_tracing(&config.logging)?;

    info!(
        "Starting discplay-ap (git {}, built {}, {})",
        env!("DISCPLAY_GIT_HASH"),
        env!("DISCPLAY_BUILD_TIMESTAMP"),
        env!("DISCPLAY_BUILD_PROFILE")
    );
    if let Some(path) = &config_path {
        info!("Config file: {}", path.display());
    }

    if args.list_devices {
        for name in CpalSink::list_devices().context("Failed to list audio devices")? {
            println!("{}", name);
        }
        return Ok(());
    }

    let Some(cue_path) = args.cue.clone().or_else(|| config.disc.cue_path.clone()) else {
        bail!("No disc image given: pass --cue or set [disc] cue_path");
    };

    let disc = ImageDisc::open(&cue_path).with_context(|| format!("Failed to open {}", cue_path.display()))?;
    match disc.disc_type() {
        DiscType::Audio => {}
        DiscType::Mixed => warn!("Disc has data tracks; they will play as noise"),
        DiscType::Unsupported => bail!("{} contains no audio tracks", cue_path.display()),
    }
    let toc = disc.read_table_of_contents().context("Failed to read table of contents")?;
    for entry in &toc.entries {
        info!("Track {:02}: start {} length {}", entry.track_number, entry.start, entry.duration);
    }

    let mut settings = config.player.clone();
    if args.inline_reader {
        settings.reader_mode = ReaderMode::Inline;
    }

    let device = args.device.clone().or_else(|| config.output.device.clone());
    let queue_samples = DEFAULT_QUEUE_SAMPLES.max(2 * (settings.sink_sufficient + settings.sink_quantum));
    let sink = CpalSink::open(device.as_deref(), queue_samples).context("Failed to open audio output")?;
    info!("Audio output: {}", sink.device_name());

    let mut player = Player::new(Box::new(sink), settings);
    player.enqueue_disc(Arc::new(disc), &toc);
    player.play();
    if args.track > 1 {
        player
            .jump_to_track(args.track - 1)
            .context("Invalid --track")?;
    }

    // Disc reads block, so the drive loop gets its own thread and the async
    // side only waits for signals
    let stop = Arc::new(AtomicBool::new(false));
    let status_interval = Duration::from_millis(args.status_interval_ms.max(1));
    let json = args.json;
    let mut driver = tokio::task::spawn_blocking({
        let stop = Arc::clone(&stop);
        move || {
            let end = drive(&mut player, TICK_INTERVAL, status_interval, &stop, |status| {
                report_status(status, json)
            });
            player.stop();
            end
        }
    });

    let joined = tokio::select! {
        joined = &mut driver => joined,
        _ = shutdown_signal() => {
            stop.store(true, Ordering::Relaxed);
            driver.await
        }
    };

    match joined.context("Drive loop panicked")? {
        DriveEnd::Failed(cause) => {
            error!("Playback failed: {}", cause);
            bail!("Playback failed: {}", cause);
        }
        DriveEnd::EndOfDisc | DriveEnd::Interrupted => {}
    }
    info!("Shutdown complete");
    Ok(())
}

fn report_status(status: &PlayerStatus, json: bool) {
    if json {
        match serde_json::to_string(status) {
            Ok(line) => println!("{}", line),
            Err(e) => warn!("Failed to serialize status: {}", e),
        }
    } else {
        info!(
            "[{}] {} ({}) at {}",
            status.state,
            status.current_track_name,
            status.position_in_track.msf(),
            status.position_msf()
        );
    }
}

/// Initialize tracing from RUST_LOG or the configured level
fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("discplay_ap={0},discplay_common={0}", logging.level).into()
    });

    let file_layer = match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            Some(
                tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };
    let stderr_layer = file_layer
        .is_none()
        .then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr));

    tracing_subscriber::registry()
        .with(filter)
        .with(stderr_layer)
        .with(file_layer)
        .init();
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
