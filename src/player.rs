use std::path::PathBuf;
use std::rc::Rc;

use tracing::{debug, info};

use crate::cache::{FrameSet, ResourceCache};
use crate::clock::{ClockHandle, PlaybackClock, TickOutcome};
use crate::error::{PlayerError, PlayerResult};
use crate::render::Renderer;
use crate::state::target_interval_ms;
use crate::surface::SurfaceProvider;

/// Identifies one activation; deactivating with a handle from an earlier activation does nothing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlayerHandle {
    generation: u64,
}

struct Running {
    generation: u64,
    frames: FrameSet,
    clock: PlaybackClock,
    handle: ClockHandle,
    draw: Rc<dyn Fn(usize)>,
}

/// Owns the frame cache and the running clock, and wires clock advances to redraws.
///
/// Hosts call [`HeroPlayer::activate`] on mount, [`HeroPlayer::tick`] once per display refresh
/// and [`HeroPlayer::deactivate`] on unmount.
pub struct HeroPlayer {
    cache: ResourceCache,
    renderer: Renderer,
    running: Option<Running>,
    generation: u64,
    retain_frames: bool,
}

impl HeroPlayer {
    pub fn new(cache: ResourceCache) -> Self {
        Self {
            cache,
            renderer: Renderer,
            running: None,
            generation: 0,
            retain_frames: true,
        }
    }

    /// Whether deactivation keeps decoded frames for the next activation.
    #[cfg(test)]
    pub fn with_retained_frames(mut self, retain: bool) -> Self {
        self.retain_frames = retain;
        self
    }

    pub fn activate<P: SurfaceProvider + 'static>(
        &mut self,
        sources: &[PathBuf],
        fps: f64,
        surface: P,
        now_ms: f64,
    ) -> PlayerResult<PlayerHandle> {
        if let Some(running) = &self.running {
            debug!("activate while already running; ignoring");
            return Ok(PlayerHandle {
                generation: running.generation,
            });
        }
        if sources.is_empty() {
            return Err(PlayerError::source("no frame sources to play"));
        }
        target_interval_ms(fps)?;

        let frames = self.cache.load(sources);

        let renderer = self.renderer;
        let draw_frames = frames.clone();
        let draw: Rc<dyn Fn(usize)> = Rc::new(move |index| {
            surface.with_surface(&mut |target| {
                renderer.draw(target, draw_frames.get(index));
            });
        });
        let on_advance = Rc::clone(&draw);
        let (clock, handle) =
            PlaybackClock::start(fps, frames.len(), now_ms, move |index| on_advance(index))?;

        self.generation += 1;
        info!(frames = frames.len(), fps, "hero playback started");
        self.running = Some(Running {
            generation: self.generation,
            frames,
            clock,
            handle,
            draw,
        });
        Ok(PlayerHandle {
            generation: self.generation,
        })
    }

    /// Offers the player one chance to advance. Call once per display refresh.
    pub fn tick(&mut self, now_ms: f64) -> TickOutcome {
        let Some(running) = self.running.as_mut() else {
            return TickOutcome::Stopped;
        };
        let outcome = running.clock.tick(now_ms);
        if outcome == TickOutcome::Stopped {
            self.running = None;
        }
        outcome
    }

    /// Draws the current frame again without advancing, e.g. after the surface was resized.
    /// Returns `false` when nothing is playing.
    pub fn redraw(&self) -> bool {
        let Some(running) = &self.running else {
            return false;
        };
        if running.handle.is_stopped() {
            return false;
        }
        (running.draw)(running.clock.current_index());
        true
    }

    pub fn deactivate(&mut self, handle: PlayerHandle) {
        match &self.running {
            Some(running) if running.generation == handle.generation => {}
            _ => {
                debug!(?handle, "deactivate with stale handle; ignoring");
                return;
            }
        }
        if let Some(running) = self.running.take() {
            running.handle.stop();
            info!(advances = running.clock.advances(), "hero playback stopped");
        }
        if !self.retain_frames {
            self.cache.evict();
        }
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    #[cfg(test)]
    pub fn current_index(&self) -> Option<usize> {
        self.running.as_ref().map(|r| r.clock.current_index())
    }

    #[cfg(test)]
    pub fn advances(&self) -> u64 {
        self.running.as_ref().map_or(0, |r| r.clock.advances())
    }

    /// Frames of the current activation, or the retained set after deactivation.
    pub fn frames(&self) -> Option<&FrameSet> {
        match &self.running {
            Some(running) => Some(&running.frames),
            None => self.cache.current(),
        }
    }
}
