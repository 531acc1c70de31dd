//! Deterministic stand-ins for decoding, scheduling and drawing, shared by unit tests.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use image::{Rgba, RgbaImage};

use crate::cache::{FrameDecoder, LoadJob, Spawner};
use crate::error::{PlayerError, PlayerResult};
use crate::frame::RasterFrame;
use crate::render::DrawRect;
use crate::surface::Surface;

/// `frame_0.png`, `frame_1.png`, ...
pub(crate) fn paths(count: usize) -> Vec<PathBuf> {
    (0..count)
        .map(|i| PathBuf::from(format!("frame_{i}.png")))
        .collect()
}

/// Holds load jobs until the test runs them.
#[derive(Clone, Default)]
pub(crate) struct QueuedSpawner {
    jobs: Rc<RefCell<VecDeque<LoadJob>>>,
}

impl QueuedSpawner {
    pub(crate) fn pending(&self) -> usize {
        self.jobs.borrow().len()
    }

    pub(crate) fn run_all(&self) {
        loop {
            let next = self.jobs.borrow_mut().pop_front();
            let Some(job) = next else { break };
            job();
        }
    }

    pub(crate) fn run_reversed(&self) {
        loop {
            let next = self.jobs.borrow_mut().pop_back();
            let Some(job) = next else { break };
            job();
        }
    }
}

impl Spawner for QueuedSpawner {
    fn spawn(&self, job: LoadJob) {
        self.jobs.borrow_mut().push_back(job);
    }
}

/// Produces a solid frame per source; the colour encodes the trailing index of the file stem.
/// Sources whose name contains `missing` fail.
pub(crate) struct SolidDecoder {
    pub(crate) width: u32,
    pub(crate) height: u32,
}

impl Default for SolidDecoder {
    fn default() -> Self {
        Self {
            width: 4,
            height: 2,
        }
    }
}

impl SolidDecoder {
    pub(crate) fn color_for(index: usize) -> [u8; 4] {
        [(index * 40 % 256) as u8, 255 - (index % 256) as u8, 7, 255]
    }
}

impl FrameDecoder for SolidDecoder {
    fn decode(&self, source: &Path) -> PlayerResult<RasterFrame> {
        let stem = source
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        if stem.contains("missing") {
            return Err(PlayerError::decode(format!("{} not found", source.display())));
        }
        let index = stem
            .rsplit('_')
            .next()
            .and_then(|n| n.parse::<usize>().ok())
            .unwrap_or(0);
        Ok(RasterFrame::from_image(RgbaImage::from_pixel(
            self.width,
            self.height,
            Rgba(Self::color_for(index)),
        )))
    }
}

/// Records every call the renderer makes.
pub(crate) struct RecordingSurface {
    pub(crate) display: (f32, f32),
    pub(crate) ratio: f32,
    pub(crate) backing: Vec<(u32, u32)>,
    pub(crate) scales: Vec<f32>,
    pub(crate) clears: usize,
    pub(crate) draws: Vec<(DrawRect, [u8; 4])>,
}

impl RecordingSurface {
    pub(crate) fn new(width: f32, height: f32, ratio: f32) -> Self {
        Self {
            display: (width, height),
            ratio,
            backing: Vec::new(),
            scales: Vec::new(),
            clears: 0,
            draws: Vec::new(),
        }
    }
}

impl Surface for RecordingSurface {
    fn display_size(&self) -> (f32, f32) {
        self.display
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.ratio
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        self.backing.push((width, height));
    }

    fn set_scale(&mut self, scale: f32) {
        self.scales.push(scale);
    }

    fn clear(&mut self) {
        self.clears += 1;
    }

    fn draw_image(&mut self, frame: &RasterFrame, rect: DrawRect) {
        self.draws.push((rect, frame.pixel(0, 0)));
    }
}
