use std::cell::Cell;
use std::rc::Rc;

use crate::error::PlayerResult;
use crate::state::PlaybackState;

/// Cooperative cancellation for a running [`PlaybackClock`].
///
/// Stopping only raises a flag; the clock observes it at the start of its next tick.
#[derive(Debug, Clone, Default)]
pub struct ClockHandle {
    stopped: Rc<Cell<bool>>,
}

impl ClockHandle {
    pub fn stop(&self) {
        self.stopped.set(true);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.get()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not enough time has passed since the last advance.
    Waiting,
    /// The index moved one step; carries the new index.
    Advanced(usize),
    /// The clock was stopped before this tick; nothing more will happen.
    Stopped,
}

/// Advances a frame index at a fixed rate, driven by host ticks.
///
/// Each tick advances at most once. A stalled host makes playback lag rather than skip frames.
pub struct PlaybackClock {
    state: PlaybackState,
    frame_count: usize,
    handle: ClockHandle,
    on_advance: Box<dyn FnMut(usize)>,
    advances: u64,
}

impl PlaybackClock {
    pub fn start(
        fps: f64,
        frame_count: usize,
        now_ms: f64,
        on_advance: impl FnMut(usize) + 'static,
    ) -> PlayerResult<(Self, ClockHandle)> {
        let handle = ClockHandle::default();
        let clock = Self {
            state: PlaybackState::new(fps, now_ms)?,
            frame_count: frame_count.max(1),
            handle: handle.clone(),
            on_advance: Box::new(on_advance),
            advances: 0,
        };
        Ok((clock, handle))
    }

    pub fn tick(&mut self, now_ms: f64) -> TickOutcome {
        if self.handle.is_stopped() {
            return TickOutcome::Stopped;
        }

        let interval = self.state.target_interval_ms;
        let elapsed = now_ms - self.state.last_advance_ms;
        // Also rejects NaN and clocks that went backwards.
        if !(elapsed >= interval) {
            return TickOutcome::Waiting;
        }

        let index = self.state.advance(self.frame_count);
        // Keep the phase of the cadence; the remainder never buys a second step this tick.
        self.state.last_advance_ms = now_ms - elapsed % interval;
        self.advances += 1;
        (self.on_advance)(index);
        TickOutcome::Advanced(index)
    }

    pub fn current_index(&self) -> usize {
        self.state.current_index
    }

    pub fn advances(&self) -> u64 {
        self.advances
    }

    #[cfg(test)]
    pub fn is_running(&self) -> bool {
        !self.handle.is_stopped()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn recording_clock(
        fps: f64,
        frames: usize,
    ) -> (PlaybackClock, ClockHandle, Rc<std::cell::RefCell<Vec<usize>>>) {
        let seen = Rc::new(std::cell::RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let (clock, handle) =
            PlaybackClock::start(fps, frames, 0.0, move |i| sink.borrow_mut().push(i)).unwrap();
        (clock, handle, seen)
    }

    #[test]
    fn four_frames_at_two_fps_with_half_second_ticks() {
        let (mut clock, _handle, seen) = recording_clock(2.0, 4);
        assert_eq!(clock.current_index(), 0);

        let outcomes: Vec<_> = (1..=4).map(|i| clock.tick(i as f64 * 500.0)).collect();
        assert_eq!(
            outcomes,
            [
                TickOutcome::Advanced(1),
                TickOutcome::Advanced(2),
                TickOutcome::Advanced(3),
                TickOutcome::Advanced(0),
            ]
        );
        assert_eq!(*seen.borrow(), [1, 2, 3, 0]);
    }

    #[test]
    fn early_ticks_wait() {
        let (mut clock, _handle, seen) = recording_clock(2.0, 4);
        assert_eq!(clock.tick(0.0), TickOutcome::Waiting);
        assert_eq!(clock.tick(499.9), TickOutcome::Waiting);
        assert_eq!(clock.tick(500.0), TickOutcome::Advanced(1));
        assert_eq!(seen.borrow().len(), 1);
    }

    #[test]
    fn stalled_host_lags_instead_of_skipping() {
        let (mut clock, _handle, _) = recording_clock(10.0, 8);
        // Ten intervals pass between two ticks: exactly one step.
        assert_eq!(clock.tick(1000.0), TickOutcome::Advanced(1));
        assert_eq!(clock.advances(), 1);
        assert_eq!(clock.tick(1000.0), TickOutcome::Waiting);
    }

    #[test]
    fn time_going_backwards_never_advances() {
        let (mut clock, _handle, _) = recording_clock(10.0, 8);
        assert_eq!(clock.tick(-5000.0), TickOutcome::Waiting);
        assert_eq!(clock.tick(f64::NAN), TickOutcome::Waiting);
        assert_eq!(clock.advances(), 0);
    }

    #[test]
    fn uniform_ticks_match_target_rate() {
        for (fps, tick_hz, seconds) in [(24.0, 60.0, 10.0), (30.0, 144.0, 3.0), (12.0, 50.0, 7.5)] {
            let (mut clock, _handle, _) = recording_clock(fps, 5);
            let ticks = (seconds * tick_hz) as u64;
            for i in 1..=ticks {
                clock.tick(i as f64 * 1000.0 / tick_hz);
            }
            let expected = (seconds * fps).floor() as i64;
            let diff = (clock.advances() as i64 - expected).abs();
            assert!(
                diff <= 1,
                "{fps} fps at {tick_hz} Hz over {seconds}s: {} advances, expected {expected}",
                clock.advances()
            );
        }
    }

    #[test]
    fn stop_prevents_all_future_advances() {
        let (mut clock, handle, seen) = recording_clock(2.0, 4);
        handle.stop();
        assert!(!clock.is_running());
        for i in 1..=10 {
            assert_eq!(clock.tick(i as f64 * 500.0), TickOutcome::Stopped);
        }
        assert!(seen.borrow().is_empty());
    }

    #[test]
    fn stop_during_a_tick_lets_that_tick_finish() {
        let slot: Rc<Cell<Option<ClockHandle>>> = Rc::new(Cell::new(None));
        let inside = Rc::clone(&slot);
        let (mut clock, handle) = PlaybackClock::start(2.0, 4, 0.0, move |_| {
            if let Some(h) = inside.take() {
                h.stop();
            }
        })
        .unwrap();
        slot.set(Some(handle));

        assert_eq!(clock.tick(500.0), TickOutcome::Advanced(1));
        assert_eq!(clock.tick(1000.0), TickOutcome::Stopped);
        assert_eq!(clock.current_index(), 1);
    }
}
