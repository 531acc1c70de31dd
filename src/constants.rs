use std::time::Duration;

pub const FPS: f64 = 24.0;                  // Target playback rate (frames per second)
pub const DISPLAY_WIDTH: f32 = 960.0;       // Logical width of the hero surface
pub const DISPLAY_HEIGHT: f32 = 540.0;      // Logical height of the hero surface
pub const DEVICE_PIXEL_RATIO: f32 = 1.0;    // Physical pixels per logical pixel

pub const EXPORT_TICK_HZ: f64 = 60.0;       // Simulated display refresh rate for headless export
pub const EXPORT_SECONDS: f64 = 4.0;        // Default length of an exported clip (seconds)
pub const SETTLE_TIMEOUT: Duration = Duration::from_secs(30); // Max wait for frame decoding before export

pub const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "gif", "webp", "tif", "tiff"];
