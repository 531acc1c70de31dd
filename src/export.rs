use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{info, warn};

use crate::clock::TickOutcome;
use crate::error::{PlayerError, PlayerResult};
use crate::ffmpeg::FrameSink;
use crate::player::HeroPlayer;
use crate::surface::PixelSurface;

#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub fps: f64,
    pub tick_hz: f64,
    pub seconds: f64,
    pub display_width: f32,
    pub display_height: f32,
    pub pixel_ratio: f32,
    /// Longest time to wait for frames to finish decoding before the first tick.
    pub settle_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExportSummary {
    pub ticks: u64,
    pub advances: u64,
}

/// Plays the loop against an offscreen surface with simulated display refreshes.
///
/// Every tick's surface is written to `sink`, so the output runs at `tick_hz` while the
/// animation inside it advances at `fps`.
pub fn run_export(
    player: &mut HeroPlayer,
    sources: &[PathBuf],
    options: &ExportOptions,
    sink: &mut dyn FrameSink,
) -> PlayerResult<ExportSummary> {
    if !options.tick_hz.is_finite() || options.tick_hz <= 0.0 {
        return Err(PlayerError::rate(format!(
            "tick rate must be a positive finite number, got {}",
            options.tick_hz
        )));
    }
    if !options.seconds.is_finite() || options.seconds < 0.0 {
        return Err(PlayerError::rate(format!(
            "duration must be a non-negative number of seconds, got {}",
            options.seconds
        )));
    }

    let surface = Rc::new(RefCell::new(PixelSurface::new(
        options.display_width,
        options.display_height,
        options.pixel_ratio,
    )));
    let handle = player.activate(sources, options.fps, Rc::clone(&surface), 0.0)?;

    if let Some(timeout) = options.settle_timeout {
        wait_for_frames(player, timeout);
    }

    let ticks = (options.seconds * options.tick_hz).round() as u64;
    let tick_ms = 1000.0 / options.tick_hz;
    let mut advances = 0;
    let result = (1..=ticks).try_for_each(|i| {
        if let TickOutcome::Advanced(_) = player.tick(i as f64 * tick_ms) {
            advances += 1;
        }
        sink.write(surface.borrow().pixels())
    });

    player.deactivate(handle);
    result?;
    sink.finish()?;

    info!(ticks, advances, "export finished");
    Ok(ExportSummary { ticks, advances })
}

fn wait_for_frames(player: &HeroPlayer, timeout: Duration) {
    let Some(frames) = player.frames() else {
        return;
    };
    let deadline = Instant::now() + timeout;
    while !frames.is_settled() {
        if Instant::now() >= deadline {
            warn!(
                loaded = frames.loaded_count(),
                total = frames.len(),
                "frames still decoding; export starts anyway"
            );
            return;
        }
        thread::sleep(Duration::from_millis(5));
    }
    if frames.failed_count() > 0 {
        warn!(failed = frames.failed_count(), "some frames failed to load and will render empty");
    }
}
