use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Stdio};

use image::{ImageFormat, RgbaImage};
use tracing::{debug, warn};

use crate::error::{PlayerError, PlayerResult};

/// Destination for captured surface frames.
pub trait FrameSink {
    fn write(&mut self, frame: &RgbaImage) -> PlayerResult<()>;
    /// Flushes and closes the output.
    fn finish(&mut self) -> PlayerResult<()>;
}

/// Pipes raw RGBA frames into an `ffmpeg` child process producing H.264.
pub struct Ffmpeg {
    process: Child,
    stdin: Option<ChildStdin>,
    width: u32,
    height: u32,
}

pub fn ffmpeg_args(width: u32, height: u32, fps: f64, output: &Path) -> Vec<String> {
    let mut args: Vec<String> = [
        "-loglevel", "error",
        "-y",
        "-f", "rawvideo",
        "-pixel_format", "rgba",
    ]
    .into_iter()
    .map(String::from)
    .collect();
    args.extend([
        "-video_size".to_owned(),
        format!("{width}x{height}"),
        "-framerate".to_owned(),
        format!("{fps}"),
    ]);
    args.extend(
        [
            "-i", "-",
            "-c:v", "libx264",
            // yuv420p needs even dimensions
            "-vf", "pad=ceil(iw/2)*2:ceil(ih/2)*2",
            "-pix_fmt", "yuv420p",
        ]
        .into_iter()
        .map(String::from),
    );
    args.push(output.display().to_string());
    args
}

impl Ffmpeg {
    pub fn spawn(width: u32, height: u32, fps: f64, output: &Path) -> PlayerResult<Ffmpeg> {
        let mut process = Command::new("ffmpeg")
            .stdin(Stdio::piped())
            .args(ffmpeg_args(width, height, fps, output))
            .spawn()
            .map_err(|e| PlayerError::encoder(format!("failed to start ffmpeg: {e}")))?;
        let stdin = process
            .stdin
            .take()
            .ok_or_else(|| PlayerError::encoder("failed to open ffmpeg stdin"))?;
        debug!(width, height, fps, output = %output.display(), "ffmpeg started");
        Ok(Ffmpeg {
            process,
            stdin: Some(stdin),
            width,
            height,
        })
    }
}

impl FrameSink for Ffmpeg {
    fn write(&mut self, frame: &RgbaImage) -> PlayerResult<()> {
        if frame.dimensions() != (self.width, self.height) {
            return Err(PlayerError::encoder(format!(
                "frame is {:?}, encoder expects {}x{}",
                frame.dimensions(),
                self.width,
                self.height
            )));
        }
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| PlayerError::encoder("ffmpeg input already closed"))?;
        // Rows are already top to bottom, which is what rawvideo expects.
        stdin.write_all(frame.as_raw())?;
        Ok(())
    }

    fn finish(&mut self) -> PlayerResult<()> {
        self.stdin = None; // closes the pipe so ffmpeg can finalise
        let status = self.process.wait()?;
        if status.success() {
            Ok(())
        } else {
            Err(PlayerError::encoder(format!("ffmpeg exited with {status}")))
        }
    }
}

impl Drop for Ffmpeg {
    fn drop(&mut self) {
        if self.stdin.take().is_some() {
            if let Err(e) = self.process.wait() {
                warn!(error = %e, "failed to wait for ffmpeg process");
            }
        }
    }
}

/// Writes each frame as `frame_NNNNNN.png` into a directory.
pub struct PngSequence {
    dir: PathBuf,
    written: usize,
}

impl PngSequence {
    pub fn create(dir: &Path) -> PlayerResult<Self> {
        fs::create_dir_all(dir)?;
        Ok(Self {
            dir: dir.to_path_buf(),
            written: 0,
        })
    }

    #[cfg(test)]
    pub fn written(&self) -> usize {
        self.written
    }
}

impl FrameSink for PngSequence {
    fn write(&mut self, frame: &RgbaImage) -> PlayerResult<()> {
        let path = self.dir.join(format!("frame_{:06}.png", self.written));
        frame
            .save_with_format(&path, ImageFormat::Png)
            .map_err(|e| PlayerError::encoder(format!("failed to write {}: {e}", path.display())))?;
        self.written += 1;
        Ok(())
    }

    fn finish(&mut self) -> PlayerResult<()> {
        Ok(())
    }
}
