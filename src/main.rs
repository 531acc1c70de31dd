use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{ArgAction, Args, Parser, Subcommand};
use tracing::Level;

mod cache;
mod clock;
mod constants;
mod error;
mod export;
mod ffmpeg;
mod frame;
mod frame_loader;
#[cfg(feature = "window")]
mod host;
mod player;
mod render;
mod state;
mod surface;
#[cfg(test)]
mod testing;

use crate::cache::{ImageFileDecoder, PoolSpawner, ResourceCache};
use crate::constants::*;
use crate::export::{ExportOptions, run_export};
use crate::ffmpeg::{Ffmpeg, FrameSink, PngSequence};
use crate::frame_loader::{expand_frame_template, load_sorted_frame_paths};
use crate::player::HeroPlayer;
use crate::render::backing_size;

#[derive(Parser, Debug)]
#[command(name = "flipbook", version, about = "Loop a raster frame sequence as a full-bleed hero animation")]
struct Cli {
    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Render the loop offscreen into an MP4 (or a PNG directory when the output has no extension)
    Export {
        #[command(flatten)]
        source: SourceArgs,

        #[arg(short, long)]
        output: PathBuf,

        /// Clip length in seconds
        #[arg(long, default_value_t = EXPORT_SECONDS)]
        seconds: f64,

        /// Simulated display refresh rate
        #[arg(long, default_value_t = EXPORT_TICK_HZ)]
        tick_hz: f64,
    },

    /// Play the loop in a resizable window
    #[cfg(feature = "window")]
    Window {
        #[command(flatten)]
        source: SourceArgs,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Directory of frames, played in file-name order
    #[arg(long, conflicts_with = "template", required_unless_present = "template")]
    dir: Option<PathBuf>,

    /// Numbered path template such as `hero/frame_{:04}.jpg`
    #[arg(long, requires = "count")]
    template: Option<String>,

    /// Number of frames the template expands to
    #[arg(long)]
    count: Option<usize>,

    /// Index of the first templated frame
    #[arg(long, default_value_t = 0)]
    first: usize,

    /// Target playback rate
    #[arg(long, default_value_t = FPS)]
    fps: f64,

    /// Surface width in display units
    #[arg(long, default_value_t = DISPLAY_WIDTH)]
    width: f32,

    /// Surface height in display units
    #[arg(long, default_value_t = DISPLAY_HEIGHT)]
    height: f32,

    /// Device pixel ratio
    #[arg(long, default_value_t = DEVICE_PIXEL_RATIO)]
    pixel_ratio: f32,

    /// Background decode threads (one per core when omitted)
    #[arg(long)]
    decode_threads: Option<usize>,
}

impl SourceArgs {
    fn resolve(&self) -> anyhow::Result<Vec<PathBuf>> {
        let paths = match (&self.dir, &self.template) {
            (Some(dir), _) => load_sorted_frame_paths(dir)?,
            (None, Some(template)) => expand_frame_template(template, self.count.unwrap_or(0), self.first)?,
            (None, None) => bail!("either --dir or --template is required"),
        };
        Ok(paths)
    }

    fn player(&self) -> anyhow::Result<HeroPlayer> {
        let spawner = PoolSpawner::new(self.decode_threads)?;
        Ok(HeroPlayer::new(ResourceCache::new(ImageFileDecoder, spawner)))
    }
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => Level::INFO,
        1 => Level::DEBUG,
        _ => Level::TRACE,
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();
}

fn open_sink(output: &Path, width: u32, height: u32, tick_hz: f64) -> anyhow::Result<Box<dyn FrameSink>> {
    if output.extension().is_none() {
        return Ok(Box::new(PngSequence::create(output)?));
    }
    Ok(Box::new(Ffmpeg::spawn(width, height, tick_hz, output)?))
}

fn export(source: &SourceArgs, output: &Path, seconds: f64, tick_hz: f64) -> anyhow::Result<()> {
    let sources = source.resolve()?;
    tracing::info!(frames = sources.len(), output = %output.display(), "exporting hero loop");

    let mut player = source.player()?;

    let (width, height) = backing_size(source.width, source.height, source.pixel_ratio);
    if width == 0 || height == 0 {
        bail!("surface {}x{} has no pixels to export", source.width, source.height);
    }
    let mut sink = open_sink(output, width, height, tick_hz)
        .with_context(|| format!("failed to open output {}", output.display()))?;

    let options = ExportOptions {
        fps: source.fps,
        tick_hz,
        seconds,
        display_width: source.width,
        display_height: source.height,
        pixel_ratio: source.pixel_ratio,
        settle_timeout: Some(SETTLE_TIMEOUT),
    };
    let summary = run_export(&mut player, &sources, &options, sink.as_mut())?;
    println!(
        "Wrote {} frames ({} advances) to {}",
        summary.ticks,
        summary.advances,
        output.display()
    );
    Ok(())
}

#[cfg(feature = "window")]
fn window(source: &SourceArgs) -> anyhow::Result<()> {
    let sources = source.resolve()?;
    let mut player = source.player()?;
    let options = host::WindowOptions {
        fps: source.fps,
        width: source.width,
        height: source.height,
    };
    host::run_window(&mut player, &sources, &options)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match &cli.command {
        Command::Export {
            source,
            output,
            seconds,
            tick_hz,
        } => export(source, output, *seconds, *tick_hz),
        #[cfg(feature = "window")]
        Command::Window { source } => window(source),
    }
}
