use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use exif::{In, Reader, Tag};
use image::DynamicImage;
use image::metadata::Orientation;

use crate::constants::FRAME_EXTENSIONS;
use crate::error::{PlayerError, PlayerResult};
use crate::frame::RasterFrame;

// --- Helper: List and Sort Frame Paths ---
pub fn load_sorted_frame_paths(dir_path: &Path) -> PlayerResult<Vec<PathBuf>> {
    let mut paths = Vec::new();
    let entries = fs::read_dir(dir_path).map_err(|e| {
        PlayerError::source(format!("failed to read directory {}: {e}", dir_path.display()))
    })?;

    for entry in entries {
        let path = entry?.path();
        if path.is_file() && has_frame_extension(&path) {
            paths.push(path);
        }
    }
    paths.sort_by(|a, b| a.file_name().cmp(&b.file_name()));

    if paths.is_empty() {
        Err(PlayerError::source(format!(
            "no frame images found in directory {}",
            dir_path.display()
        )))
    } else {
        Ok(paths)
    }
}

fn has_frame_extension(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| FRAME_EXTENSIONS.iter().any(|known| ext.eq_ignore_ascii_case(known)))
}

// --- Helper: Resolve a Numbered Template ---

/// Expands a template such as `hero/frame_{:04}.jpg` into `count` paths numbered from `first`.
///
/// Exactly one placeholder is supported, either `{}` or a zero-padded `{:0W}`.
pub fn expand_frame_template(template: &str, count: usize, first: usize) -> PlayerResult<Vec<PathBuf>> {
    if count == 0 {
        return Err(PlayerError::source("frame count must be at least 1"));
    }

    let open = template.find('{').ok_or_else(|| {
        PlayerError::source(format!("template {template:?} has no {{}} placeholder"))
    })?;
    let close = template[open..]
        .find('}')
        .map(|i| open + i)
        .ok_or_else(|| PlayerError::source(format!("unterminated placeholder in {template:?}")))?;

    let width = match &template[open + 1..close] {
        "" => 0,
        pattern => pattern
            .strip_prefix(":0")
            .and_then(|w| w.parse::<usize>().ok())
            .ok_or_else(|| {
                PlayerError::source(format!("unsupported placeholder {{{pattern}}} in {template:?}"))
            })?,
    };

    let (head, tail) = (&template[..open], &template[close + 1..]);
    if tail.contains('{') {
        return Err(PlayerError::source(format!(
            "template {template:?} has more than one placeholder"
        )));
    }

    let end = first.checked_add(count).ok_or_else(|| {
        PlayerError::source(format!("{count} frames numbered from {first} overflow the frame index"))
    })?;

    Ok((first..end)
        .map(|i| PathBuf::from(format!("{head}{i:0width$}{tail}")))
        .collect())
}

// --- Load Image, Apply EXIF Orientation, Create Frame ---
pub fn decode_frame(image_path: &Path) -> PlayerResult<RasterFrame> {
    let file_bytes = fs::read(image_path).map_err(|e| {
        PlayerError::decode(format!("failed to read {}: {e}", image_path.display()))
    })?;

    let image = image::load_from_memory(&file_bytes).map_err(|e| {
        PlayerError::decode(format!("failed to decode {}: {e}", image_path.display()))
    })?;

    // Missing or unreadable EXIF is normal for PNG/BMP/GIF sources.
    let orientation = exif_orientation(&file_bytes).unwrap_or(1);
    if orientation != 1 {
        tracing::debug!(path = %image_path.display(), orientation, "applying EXIF orientation");
    }

    Ok(RasterFrame::from_image(orient(image, orientation).to_rgba8()))
}

fn exif_orientation(bytes: &[u8]) -> Option<u8> {
    let exif = Reader::new()
        .read_from_container(&mut Cursor::new(bytes))
        .ok()?;
    let field = exif.get_field(Tag::Orientation, In::PRIMARY)?;
    field.value.get_uint(0).and_then(|v| u8::try_from(v).ok())
}

// 1 = Top-left (normal), 3 = 180 deg, 6 = 90 deg CW, 8 = 90 deg CCW.
// 2, 4, 5 and 7 are the mirrored variants.
fn orient(mut image: DynamicImage, orientation: u8) -> DynamicImage {
    if let Some(orientation) = Orientation::from_exif(orientation) {
        image.apply_orientation(orientation);
    }
    image
}
