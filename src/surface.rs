use std::cell::RefCell;
use std::rc::Rc;

use image::{Rgba, RgbaImage};
use tracing::trace;

use crate::frame::RasterFrame;
use crate::render::{DrawRect, backing_size};

/// Drawable raster target whose backing resolution is its display size times its pixel ratio.
pub trait Surface {
    /// Size as laid out, in display units.
    fn display_size(&self) -> (f32, f32);
    fn device_pixel_ratio(&self) -> f32;
    /// Reallocates the backing store in device pixels. Contents are unspecified afterwards.
    fn resize_backing(&mut self, width: u32, height: u32);
    /// Sets the display-to-device scale applied to subsequent draws.
    fn set_scale(&mut self, scale: f32);
    fn clear(&mut self);
    /// Draws `frame` stretched into `rect` (display units); anything outside the backing is cropped.
    fn draw_image(&mut self, frame: &RasterFrame, rect: DrawRect);
}

/// Hands the player whatever surface is current at draw time.
pub trait SurfaceProvider {
    fn with_surface(&self, draw: &mut dyn FnMut(&mut dyn Surface));
}

impl<S: Surface> SurfaceProvider for Rc<RefCell<S>> {
    fn with_surface(&self, draw: &mut dyn FnMut(&mut dyn Surface)) {
        match self.try_borrow_mut() {
            Ok(mut surface) => draw(&mut *surface),
            Err(_) => trace!("surface borrowed by host; skipping draw"),
        }
    }
}

/// CPU surface backed by an RGBA8 image.
///
/// Sampling is nearest-neighbour and frame pixels replace what is underneath, so identical
/// inputs always produce identical pixels.
pub struct PixelSurface {
    display_width: f32,
    display_height: f32,
    pixel_ratio: f32,
    scale: f32,
    pixels: RgbaImage,
}

impl PixelSurface {
    pub fn new(display_width: f32, display_height: f32, pixel_ratio: f32) -> Self {
        let (w, h) = backing_size(display_width, display_height, pixel_ratio);
        Self {
            display_width,
            display_height,
            pixel_ratio,
            scale: 1.0,
            pixels: RgbaImage::new(w, h),
        }
    }

    #[cfg(any(test, feature = "window"))]
    pub fn set_display_size(&mut self, width: f32, height: f32) {
        self.display_width = width;
        self.display_height = height;
    }

    #[cfg(any(test, feature = "window"))]
    pub fn set_device_pixel_ratio(&mut self, ratio: f32) {
        self.pixel_ratio = ratio;
    }

    #[cfg(any(test, feature = "window"))]
    pub fn backing_size(&self) -> (u32, u32) {
        self.pixels.dimensions()
    }

    pub fn pixels(&self) -> &RgbaImage {
        &self.pixels
    }
}

// First and one-past-last device pixel whose centre lies in [start, end).
fn covered_span(start: f32, end: f32, limit: u32) -> (u32, u32) {
    let first = (start - 0.5).ceil().max(0.0);
    let last = (end - 0.5).ceil().clamp(0.0, limit as f32);
    (first.min(limit as f32) as u32, last as u32)
}

impl Surface for PixelSurface {
    fn display_size(&self) -> (f32, f32) {
        (self.display_width, self.display_height)
    }

    fn device_pixel_ratio(&self) -> f32 {
        self.pixel_ratio
    }

    fn resize_backing(&mut self, width: u32, height: u32) {
        if self.pixels.dimensions() != (width, height) {
            self.pixels = RgbaImage::new(width, height);
        }
    }

    fn set_scale(&mut self, scale: f32) {
        self.scale = scale;
    }

    fn clear(&mut self) {
        self.pixels.fill(0);
    }

    fn draw_image(&mut self, frame: &RasterFrame, rect: DrawRect) {
        if rect.is_empty() || frame.width() == 0 || frame.height() == 0 {
            return;
        }
        let (backing_w, backing_h) = self.pixels.dimensions();

        let dx = rect.x * self.scale;
        let dy = rect.y * self.scale;
        let dw = rect.w * self.scale;
        let dh = rect.h * self.scale;

        let (x0, x1) = covered_span(dx, dx + dw, backing_w);
        let (y0, y1) = covered_span(dy, dy + dh, backing_h);

        let (fw, fh) = (frame.width(), frame.height());
        for py in y0..y1 {
            let v = (py as f32 + 0.5 - dy) / dh;
            let sy = ((v * fh as f32) as u32).min(fh - 1);
            for px in x0..x1 {
                let u = (px as f32 + 0.5 - dx) / dw;
                let sx = ((u * fw as f32) as u32).min(fw - 1);
                self.pixels.put_pixel(px, py, Rgba(frame.pixel(sx, sy)));
            }
        }
    }
}
