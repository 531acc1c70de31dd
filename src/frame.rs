use std::sync::Arc;

use image::RgbaImage;

/// Decoded frame in straight (non-premultiplied) RGBA8, row-major.
///
/// Cloning is cheap: pixel storage is shared.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RasterFrame {
    width: u32,
    height: u32,
    rgba8: Arc<Vec<u8>>,
}

impl RasterFrame {
    pub fn from_image(image: RgbaImage) -> Self {
        let (width, height) = image.dimensions();
        Self {
            width,
            height,
            rgba8: Arc::new(image.into_raw()),
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Pixel at `(x, y)`; callers clamp coordinates to the frame bounds.
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [
            self.rgba8[i],
            self.rgba8[i + 1],
            self.rgba8[i + 2],
            self.rgba8[i + 3],
        ]
    }
}
