use crate::error::{PlayerError, PlayerResult};

/// Position in the loop plus the timing needed to decide the next advance.
#[derive(Debug, PartialEq, Clone, Copy)]
pub struct PlaybackState {
    pub current_index: usize,     // Always < frame count
    pub last_advance_ms: f64,     // Host timestamp the cadence is measured from
    pub target_interval_ms: f64,  // 1000 / fps
}

impl PlaybackState {
    pub fn new(fps: f64, now_ms: f64) -> PlayerResult<Self> {
        Ok(Self {
            current_index: 0,
            last_advance_ms: now_ms,
            target_interval_ms: target_interval_ms(fps)?,
        })
    }

    /// Steps one frame forward, wrapping at `frame_count`. Returns the new index.
    pub fn advance(&mut self, frame_count: usize) -> usize {
        self.current_index = (self.current_index + 1) % frame_count.max(1);
        self.current_index
    }
}

pub fn target_interval_ms(fps: f64) -> PlayerResult<f64> {
    if !fps.is_finite() || fps <= 0.0 {
        return Err(PlayerError::rate(format!(
            "fps must be a positive finite number, got {fps}"
        )));
    }
    Ok(1000.0 / fps)
}
