//! Viewstate Recorder - Headless Demo
//!
//! Drives a simulated viewer (auto look-around plus one mode switch), records
//! its state changes, then replays the recording back into the viewer with
//! the original timing and logs every step.
//!
//! Usage: `viewstate-recorder [config.json]`

use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use viewstate_recorder::{
    config::{self, AppConfig},
    LookAround, Recorder, TokioScheduler, ViewMode, Viewer, ViewerState,
};

fn main() -> anyhow::Result<()> {
    let (config, config_path) = load_config()?;

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(&config.log_filter)),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting viewstate recorder demo");
    match &config_path {
        Some(path) => tracing::info!("Using config {:?}", path),
        None => tracing::info!("Using default config"),
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_time()
        .build()
        .context("Failed to start timer runtime")?;
    let scheduler = Arc::new(TokioScheduler::new(runtime.handle().clone()));

    let viewer = Viewer::new(ViewerState::default());
    let recorder = Recorder::with_settings(scheduler.clone(), &config.recorder);
    recorder.attach(&viewer);

    let demo = &config.demo;
    let look_around = LookAround::with_rate(
        viewer.clone(),
        scheduler.clone(),
        demo.look_around_interval(),
        demo.look_around_step_rad,
    );

    // Record
    recorder.start_recording();
    look_around.start()?;
    match demo.switch_mode_after() {
        Some(delay) if delay < demo.record_duration() => {
            std::thread::sleep(delay);
            viewer.set_mode(ViewMode::Floorplan);
            std::thread::sleep(demo.record_duration() - delay);
        }
        _ => std::thread::sleep(demo.record_duration()),
    }
    look_around.stop();
    recorder.end_recording();

    tracing::info!(
        "Captured {} samples over {:?}",
        recorder.sample_count(),
        recorder.duration()
    );

    // Rewind the viewer so the replay is visible in its state
    viewer.replace_state(ViewerState::default());

    // Replay
    let (step_tx, step_rx) = crossbeam_channel::unbounded();
    let target = viewer.clone();
    let started = recorder.play(move |state: ViewerState, is_final| {
        target.replace_state(state.clone());
        let _ = step_tx.send((state, is_final));
    })?;

    if !started {
        tracing::warn!("Nothing was recorded, skipping playback");
        return Ok(());
    }

    let mut steps = 0usize;
    for (state, is_final) in step_rx.iter() {
        steps += 1;
        tracing::debug!(
            "Step {}: mode={} longitude={:.4}",
            steps,
            state.mode,
            state.longitude
        );
        if is_final {
            break;
        }
    }

    if let Some(e) = recorder.take_playback_error() {
        return Err(anyhow::Error::new(e).context("Playback aborted"));
    }

    let final_state = viewer.state();
    tracing::info!(
        "Playback delivered {} steps, viewer ended in {} at longitude {:.4}",
        steps,
        final_state.mode,
        final_state.longitude
    );

    if demo.print_log {
        let log = recorder.log();
        println!("{}", serde_json::to_string_pretty(log.samples())?);
    }

    tracing::info!("Shutting down...");
    runtime.shutdown_background();
    Ok(())
}

/// Load config from the path given on the command line, or the default location.
///
/// On first run the default config is written to the default location.
fn load_config() -> anyhow::Result<(AppConfig, Option<std::path::PathBuf>)> {
    if let Some(arg) = std::env::args_os().nth(1) {
        let path = std::path::PathBuf::from(arg);
        let config = AppConfig::load(&path)
            .with_context(|| format!("Failed to load config {:?}", path))?;
        return Ok((config, Some(path)));
    }

    let Some(path) = config::config_path() else {
        return Ok((AppConfig::default(), None));
    };

    if path.exists() {
        return Ok((AppConfig::load_or_default(&path), Some(path)));
    }

    let config = AppConfig::default();
    if config::ensure_app_data_dir()
        .and_then(|_| config.save(&path))
        .is_ok()
    {
        return Ok((config, Some(path)));
    }
    Ok((config, None))
}
