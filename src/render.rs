use tracing::trace;

use crate::frame::RasterFrame;
use crate::surface::Surface;

/// Placement of a frame on the surface, in display units. May extend past the surface edges.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DrawRect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl DrawRect {
    pub const ZERO: DrawRect = DrawRect {
        x: 0.0,
        y: 0.0,
        w: 0.0,
        h: 0.0,
    };

    pub fn is_empty(&self) -> bool {
        !(self.w > 0.0 && self.h > 0.0)
    }
}

/// Rectangle that covers a `surface_w` x `surface_h` area with a frame of the given size,
/// preserving the frame's aspect ratio and centring the overflow on the cropped axis.
pub fn cover_rect(frame_w: f32, frame_h: f32, surface_w: f32, surface_h: f32) -> DrawRect {
    let usable = |v: f32| v.is_finite() && v > 0.0;
    if !(usable(frame_w) && usable(frame_h) && usable(surface_w) && usable(surface_h)) {
        return DrawRect::ZERO;
    }

    let frame_aspect = frame_w / frame_h;
    let surface_aspect = surface_w / surface_h;

    if frame_aspect > surface_aspect {
        let w = surface_h * frame_aspect;
        DrawRect {
            x: (surface_w - w) / 2.0,
            y: 0.0,
            w,
            h: surface_h,
        }
    } else {
        let h = surface_w / frame_aspect;
        DrawRect {
            x: 0.0,
            y: (surface_h - h) / 2.0,
            w: surface_w,
            h,
        }
    }
}

/// Pixel ratio as the renderer uses it: anything non-finite or non-positive reads as 1.
pub fn effective_pixel_ratio(ratio: f32) -> f32 {
    if ratio.is_finite() && ratio > 0.0 { ratio } else { 1.0 }
}

/// Backing-store size for a surface laid out at `display_w` x `display_h`.
pub fn backing_size(display_w: f32, display_h: f32, ratio: f32) -> (u32, u32) {
    let ratio = effective_pixel_ratio(ratio);
    let device = |v: f32| {
        if v.is_finite() && v > 0.0 {
            (v * ratio).floor() as u32
        } else {
            0
        }
    };
    (device(display_w), device(display_h))
}

#[derive(Debug, Default, Clone, Copy)]
pub struct Renderer;

impl Renderer {
    /// Redraws `surface` from scratch with `frame` cover-fitted.
    ///
    /// Backing size and scale are derived from the surface on every call, so layout or pixel-ratio
    /// changes take effect on the next draw. A missing frame (still decoding or failed) leaves the
    /// surface cleared; a zero-area surface yields [`DrawRect::ZERO`].
    #[tracing::instrument(level = "trace", skip_all)]
    pub fn draw<S: Surface + ?Sized>(&self, surface: &mut S, frame: Option<&RasterFrame>) -> DrawRect {
        let (display_w, display_h) = surface.display_size();
        let ratio = effective_pixel_ratio(surface.device_pixel_ratio());
        let (backing_w, backing_h) = backing_size(display_w, display_h, ratio);

        surface.resize_backing(backing_w, backing_h);
        surface.set_scale(ratio);
        surface.clear();

        let Some(frame) = frame else {
            trace!("frame not decoded yet; surface left blank");
            return DrawRect::ZERO;
        };

        let rect = cover_rect(
            frame.width() as f32,
            frame.height() as f32,
            display_w,
            display_h,
        );
        if rect.is_empty() {
            trace!(display_w, display_h, "nothing to draw");
            return rect;
        }

        surface.draw_image(frame, rect);
        rect
    }
}

#[cfg(test)]
mod tests {
    use image::{Rgba, RgbaImage};

    use super::*;
    use crate::testing::RecordingSurface;

    fn solid(w: u32, h: u32) -> RasterFrame {
        RasterFrame::from_image(RgbaImage::from_pixel(w, h, Rgba([9, 8, 7, 255])))
    }

    #[test]
    fn wide_frame_on_square_surface_overflows_horizontally() {
        let rect = cover_rect(200.0, 100.0, 300.0, 300.0);
        assert_eq!(rect.h, 300.0);
        assert_eq!(rect.w, 600.0);
        assert_eq!(rect.y, 0.0);
        assert_eq!(rect.x, -150.0);
        // Equal overflow on both sides.
        assert_eq!(-rect.x, (rect.x + rect.w) - 300.0);
    }

    #[test]
    fn tall_frame_on_wide_surface_overflows_vertically() {
        let rect = cover_rect(100.0, 200.0, 400.0, 200.0);
        assert_eq!(rect.w, 400.0);
        assert_eq!(rect.h, 800.0);
        assert_eq!(rect.x, 0.0);
        assert_eq!(rect.y, -300.0);
    }

    #[test]
    fn equal_aspect_fills_exactly() {
        let rect = cover_rect(200.0, 100.0, 400.0, 200.0);
        assert_eq!(
            rect,
            DrawRect {
                x: 0.0,
                y: 0.0,
                w: 400.0,
                h: 200.0
            }
        );
    }

    #[test]
    fn cover_rect_always_contains_surface() {
        for (fw, fh) in [(1.0, 1.0), (16.0, 9.0), (9.0, 16.0), (1000.0, 3.0), (3.0, 1000.0)] {
            for (sw, sh) in [(10.0, 10.0), (1920.0, 1080.0), (375.0, 812.0), (1.0, 500.0)] {
                let r = cover_rect(fw, fh, sw, sh);
                assert!(r.x <= 1e-3 && r.y <= 1e-3);
                assert!(r.x + r.w >= sw - 1e-3 && r.y + r.h >= sh - 1e-3);
                assert!(((r.w / r.h) - fw / fh).abs() / (fw / fh) < 1e-4);
            }
        }
    }

    #[test]
    fn degenerate_sizes_give_zero_rect() {
        assert_eq!(cover_rect(100.0, 100.0, 0.0, 200.0), DrawRect::ZERO);
        assert_eq!(cover_rect(100.0, 100.0, 200.0, 0.0), DrawRect::ZERO);
        assert_eq!(cover_rect(0.0, 100.0, 200.0, 200.0), DrawRect::ZERO);
        assert_eq!(cover_rect(100.0, 100.0, f32::NAN, 200.0), DrawRect::ZERO);
        assert!(DrawRect::ZERO.is_empty());
    }

    #[test]
    fn backing_size_scales_by_pixel_ratio() {
        assert_eq!(backing_size(300.0, 150.0, 2.0), (600, 300));
        assert_eq!(backing_size(100.5, 10.0, 1.5), (150, 15));
        assert_eq!(backing_size(300.0, 150.0, 0.0), (300, 150));
        assert_eq!(backing_size(300.0, 150.0, f32::NAN), (300, 150));
        assert_eq!(backing_size(-1.0, 150.0, 2.0), (0, 300));
    }

    #[test]
    fn draw_recomputes_backing_every_call() {
        let mut surface = RecordingSurface::new(200.0, 100.0, 2.0);
        let frame = solid(4, 2);
        Renderer.draw(&mut surface, Some(&frame));

        surface.display = (50.0, 50.0);
        surface.ratio = 3.0;
        let rect = Renderer.draw(&mut surface, Some(&frame));

        assert_eq!(surface.backing, [(400, 200), (150, 150)]);
        assert_eq!(surface.scales, [2.0, 3.0]);
        assert_eq!(surface.clears, 2);
        assert_eq!(rect.h, 50.0);
        assert_eq!(rect.w, 100.0);
    }

    #[test]
    fn missing_frame_clears_without_drawing() {
        let mut surface = RecordingSurface::new(200.0, 100.0, 1.0);
        let rect = Renderer.draw(&mut surface, None);
        assert_eq!(rect, DrawRect::ZERO);
        assert_eq!(surface.clears, 1);
        assert!(surface.draws.is_empty());
    }

    #[test]
    fn zero_area_surface_is_a_no_op_draw() {
        let mut surface = RecordingSurface::new(0.0, 0.0, 2.0);
        let rect = Renderer.draw(&mut surface, Some(&solid(4, 2)));
        assert!(rect.is_empty());
        assert_eq!(surface.backing, [(0, 0)]);
        assert!(surface.draws.is_empty());
    }
}
