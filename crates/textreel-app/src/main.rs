//! # textreel
//!
//! Plays media in a character terminal: a synthetic playlist is decoded,
//! paced against the wall clock and drawn with an audio visualization on top.
//!
//! Usage: `textreel [config.json]`. The terminal is switched to raw mode and
//! the alternate screen; see [`input::Key`] for the keys. Redirect stderr to
//! keep log lines off the picture.

mod input;
mod services;
mod terminal;

use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use parking_lot::Mutex;
use services::{demo_tracks, spawn_output, DemoPlaylist, SimulatedDevice, SyntheticSource};
use terminal::{TerminalGuard, TerminalRenderer};
use textreel_core::{PipelineConfig, Raster};
use textreel_pipeline::{
    MonotonicTime, OutputConfig, PipelineContext, Session, SessionEvent, SessionParts,
    SharedRaster,
};
use textreel_viz::{VisualizationControl, VisualizationMode, VizWorker};
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const EVENT_POLL: Duration = Duration::from_millis(50);

fn main() -> Result<()> {
    // Logs go to stderr; stdout carries the picture.
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "textreel=info,textreel_pipeline=info,textreel_viz=info".into()),
        )
        .init();

    info!("Starting textreel v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;
    debug!("Effective config: {}", serde_json::to_string(&config)?);

    let output = OutputConfig {
        sample_rate: config.sample_rate,
        ..OutputConfig::default()
    };
    let ctx = Arc::new(PipelineContext::new(config, Arc::new(MonotonicTime::new()))?);

    let overlay: SharedRaster = Arc::new(Mutex::new(Raster::new(
        services::source::PICTURE_WIDTH,
        services::source::PICTURE_HEIGHT,
    )?));
    let control = Arc::new(VisualizationControl::new(
        VisualizationMode::default(),
        ctx.config().viz.spectrum_base_octave,
    ));
    let device = Arc::new(SimulatedDevice::default());

    let output_thread = spawn_output(Arc::clone(&ctx), Arc::clone(&device), output)?;
    let viz_thread =
        VizWorker::new(Arc::clone(&ctx), Arc::clone(&control), Arc::clone(&overlay)).spawn()?;

    let parts = SessionParts {
        source: Box::new(SyntheticSource::new(ctx.config().sample_rate)),
        playlist: Box::new(DemoPlaylist::new(demo_tracks())),
        device,
        renderer: Box::new(TerminalRenderer::stdout()),
        overlay: Some(overlay),
    };
    let (session, handle) = Session::new(Arc::clone(&ctx), parts);
    let session_thread = std::thread::Builder::new()
        .name("session".to_string())
        .spawn(move || session.run())
        .context("Failed to spawn session thread")?;

    // Without a terminal the playlist still plays to the end.
    let guard = match TerminalGuard::enter() {
        Ok(guard) => Some(guard),
        Err(e) => {
            warn!("Keyboard input unavailable: {e}");
            None
        }
    };

    'main: loop {
        if guard.is_some() {
            match input::poll_key(EVENT_POLL) {
                Ok(Some(key)) => {
                    if let Err(e) = input::apply(key, &ctx, &handle, &control) {
                        warn!("Command failed: {e}");
                    }
                }
                Ok(None) => {}
                Err(e) => {
                    warn!("Reading keyboard failed: {e}");
                    std::thread::sleep(EVENT_POLL);
                }
            }
        } else {
            std::thread::sleep(EVENT_POLL);
        }

        while let Some(event) = handle.try_recv_event() {
            match event {
                SessionEvent::StateChanged(state) => debug!("Session state: {:?}", state),
                SessionEvent::FramesDropped(count) => debug!("Dropped {count} late frames"),
                SessionEvent::TrackAdvanced { index, gapless } => {
                    info!("Now playing item {index} (gapless: {gapless})");
                }
                SessionEvent::Error(message) => warn!("Playback error: {message}"),
                SessionEvent::PlaybackFinished => {
                    info!("Playlist finished");
                    break 'main;
                }
            }
        }

        if ctx.should_quit() || session_thread.is_finished() {
            break;
        }
    }

    // The output thread outlives the session so queued audio plays out.
    ctx.request_quit();
    let result = join("session", session_thread)?;
    join("visualization", viz_thread)?;
    output_thread.stop()?;
    drop(guard);
    result?;

    info!("Goodbye");
    Ok(())
}

/// Configuration from the JSON file named on the command line, or defaults.
fn load_config() -> Result<PipelineConfig> {
    let Some(path) = std::env::args().nth(1) else {
        return Ok(PipelineConfig::default());
    };
    let json = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read config file {path}"))?;
    let config = PipelineConfig::from_json_str(&json)
        .with_context(|| format!("Invalid config file {path}"))?;
    info!("Loaded config from {path}");
    Ok(config)
}

fn join<T>(name: &str, handle: JoinHandle<T>) -> Result<T> {
    handle
        .join()
        .map_err(|_| anyhow!("{name} thread panicked"))
}
