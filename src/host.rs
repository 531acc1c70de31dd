use std::cell::RefCell;
use std::path::PathBuf;
use std::rc::Rc;
use std::time::Instant;

use anyhow::{Context, anyhow, bail};
use raylib::prelude::*;
use tracing::warn;

use crate::clock::TickOutcome;
use crate::player::HeroPlayer;
use crate::surface::PixelSurface;

// Larger than any display raylib will open a window on.
const MAX_WINDOW_SIDE: f32 = 16384.0;

pub struct WindowOptions {
    pub fps: f64,
    pub width: f32,
    pub height: f32,
}

fn window_side(name: &str, value: f32) -> anyhow::Result<i32> {
    if !(1.0..=MAX_WINDOW_SIDE).contains(&value) {
        bail!("window {name} must be between 1 and {MAX_WINDOW_SIDE}, got {value}");
    }
    Ok(value as i32)
}

/// Plays the loop full-window until the window is closed.
///
/// Opening the window activates the player and closing it deactivates; every vsync is one tick.
pub fn run_window(player: &mut HeroPlayer, sources: &[PathBuf], options: &WindowOptions) -> anyhow::Result<()> {
    let width = window_side("width", options.width)?;
    let height = window_side("height", options.height)?;
    let (mut rl, thread) = raylib::init()
        .size(width, height)
        .title("Hero Loop")
        .vsync()
        .resizable()
        .build();
    rl.set_trace_log(TraceLogLevel::LOG_ERROR);

    let dpi = rl.get_window_scale_dpi().x;
    let surface = Rc::new(RefCell::new(PixelSurface::new(options.width, options.height, dpi)));
    let started = Instant::now();
    let handle = player
        .activate(sources, options.fps, Rc::clone(&surface), 0.0)
        .context("failed to start playback")?;

    let mut texture: Option<Texture2D> = None;
    let mut layout = None;

    // --- Main Loop ---
    while !rl.window_should_close() {
        let current = (
            rl.get_screen_width(),
            rl.get_screen_height(),
            rl.get_window_scale_dpi().x,
        );
        let relayout = layout != Some(current);
        if relayout {
            layout = Some(current);
            let mut s = surface.borrow_mut();
            s.set_display_size(current.0 as f32, current.1 as f32);
            s.set_device_pixel_ratio(current.2);
        }

        let now_ms = started.elapsed().as_secs_f64() * 1000.0;
        let advanced = matches!(player.tick(now_ms), TickOutcome::Advanced(_));
        // A resize between advances repaints the current frame at the new backing size.
        let repainted = advanced || (relayout && player.redraw());

        if repainted {
            let s = surface.borrow();
            let (w, h) = s.backing_size();
            let stale = texture
                .as_ref()
                .is_none_or(|t| t.width() != w as i32 || t.height() != h as i32);
            if stale && w > 0 && h > 0 {
                let blank = Image::gen_image_color(w as i32, h as i32, Color::BLANK);
                texture = Some(
                    rl.load_texture_from_image(&thread, &blank)
                        .map_err(|e| anyhow!("failed to create surface texture: {e}"))?,
                );
            }
            if let Some(t) = texture.as_mut() {
                if let Err(e) = t.update_texture(s.pixels().as_raw()) {
                    warn!(error = %e, "failed to upload surface");
                }
            }
        }

        let sw = rl.get_screen_width() as f32;
        let sh = rl.get_screen_height() as f32;
        let mut d = rl.begin_drawing(&thread);
        d.clear_background(Color::BLACK);
        if let Some(t) = &texture {
            d.draw_texture_pro(
                t,
                Rectangle::new(0.0, 0.0, t.width() as f32, t.height() as f32),
                Rectangle::new(0.0, 0.0, sw, sh),
                Vector2::new(0.0, 0.0),
                0.0,
                Color::WHITE,
            );
        }
    }

    player.deactivate(handle);
    Ok(())
}
