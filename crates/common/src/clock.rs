//! Frame clock and timing utilities.
//!
//! A performance is driven by a simulated clock, never by wall time. The
//! driver advances the clock one frame at a time and then visits every
//! registered per-frame listener in registration order. Time is always
//! derived as `frame_index / fps` so it never accumulates drift.
//!
//! [`FrameBudget`] is the wall-clock companion used by consumers that must
//! not run faster than real time (the live previewer).

use std::time::Duration;

/// Identifier handed out by [`FrameClock::subscribe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

/// Simulated frame clock carrying an ordered listener registry.
///
/// `L` is the listener payload. The clock only stores and orders listeners;
/// the driver decides what visiting one means.
#[derive(Debug)]
pub struct FrameClock<L> {
    fps: u32,
    frame_index: u64,
    time: f64,
    next_id: u64,
    listeners: Vec<(ListenerId, L)>,
}

impl<L> FrameClock<L> {
    /// Create a clock at time zero. A zero rate is clamped to 1 fps.
    pub fn new(fps: u32) -> Self {
        Self {
            fps: fps.max(1),
            frame_index: 0,
            time: 0.0,
            next_id: 0,
            listeners: Vec::new(),
        }
    }

    /// Move the clock to `frame_index` and return the new time in seconds.
    pub fn advance(&mut self, frame_index: u64) -> f64 {
        self.frame_index = frame_index;
        self.time = frame_index as f64 / self.fps as f64;
        self.time
    }

    /// Current simulated time in seconds.
    pub fn time(&self) -> f64 {
        self.time
    }

    /// Index of the frame the clock currently sits on.
    pub fn frame_index(&self) -> u64 {
        self.frame_index
    }

    pub fn fps(&self) -> u32 {
        self.fps
    }

    /// Length of one tick in seconds.
    pub fn frame_duration(&self) -> f64 {
        1.0 / self.fps as f64
    }

    /// Half a frame: the window within which a scheduled time counts as "now".
    pub fn tolerance(&self) -> f64 {
        1.0 / (2.0 * self.fps as f64)
    }

    /// Register a listener; it is visited after every listener registered before it.
    pub fn subscribe(&mut self, listener: L) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.listeners.push((id, listener));
        id
    }

    /// Remove a listener, returning its payload if it was still registered.
    pub fn unsubscribe(&mut self, id: ListenerId) -> Option<L> {
        let pos = self.listeners.iter().position(|(lid, _)| *lid == id)?;
        Some(self.listeners.remove(pos).1)
    }

    /// Registered listeners in registration order.
    pub fn listeners(&self) -> impl Iterator<Item = (ListenerId, &L)> {
        self.listeners.iter().map(|(id, l)| (*id, l))
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn clear_listeners(&mut self) {
        self.listeners.clear();
    }

    /// Return to time zero and drop every listener.
    pub fn reset(&mut self) {
        self.frame_index = 0;
        self.time = 0.0;
        self.listeners.clear();
    }
}

/// Wall-clock budget of a single frame at a fixed rate.
#[derive(Debug, Clone, Copy)]
pub struct FrameBudget {
    interval: Duration,
}

impl FrameBudget {
    /// Create a budget targeting the given rate. A zero rate is clamped to 1 fps.
    pub fn new(fps: u32) -> Self {
        Self {
            interval: Duration::from_nanos(1_000_000_000 / fps.max(1) as u64),
        }
    }

    /// Target interval per frame.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Time left in the budget after `elapsed` of work. Zero when over budget.
    pub fn remaining(&self, elapsed: Duration) -> Duration {
        self.interval.saturating_sub(elapsed)
    }
}

/// First frame index at or after `secs`.
///
/// A small epsilon keeps exact multiples (e.g. `0.3 * 10`) from rounding up.
/// Also the frame count covering a duration that starts at zero.
pub fn frame_boundary(secs: f64, fps: u32) -> u64 {
    let scaled = secs * fps as f64 - 1e-9;
    if scaled <= 0.0 {
        0
    } else {
        scaled.ceil() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_advance_derives_time_from_index() {
        let mut clock: FrameClock<()> = FrameClock::new(30);
        assert_eq!(clock.advance(3), 0.1);
        assert_eq!(clock.advance(90), 3.0);
        assert_eq!(clock.frame_index(), 90);
    }

    #[test]
    fn test_tolerance_is_half_a_frame() {
        let clock: FrameClock<()> = FrameClock::new(10);
        assert!((clock.tolerance() - 0.05).abs() < 1e-12);
        assert!((clock.frame_duration() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_listeners_keep_registration_order() {
        let mut clock = FrameClock::new(24);
        let a = clock.subscribe("a");
        let b = clock.subscribe("b");
        let c = clock.subscribe("c");

        assert_eq!(clock.unsubscribe(b), Some("b"));
        assert_eq!(clock.unsubscribe(b), None);

        let order: Vec<_> = clock.listeners().map(|(id, l)| (id, *l)).collect();
        assert_eq!(order, vec![(a, "a"), (c, "c")]);
    }

    #[test]
    fn test_reset_clears_time_and_listeners() {
        let mut clock = FrameClock::new(24);
        clock.subscribe(1u8);
        clock.advance(48);
        clock.reset();
        assert_eq!(clock.time(), 0.0);
        assert_eq!(clock.listener_count(), 0);
    }

    #[test]
    fn test_zero_fps_is_clamped() {
        let clock: FrameClock<()> = FrameClock::new(0);
        assert_eq!(clock.fps(), 1);
    }

    #[test]
    fn test_frame_budget_remaining() {
        let budget = FrameBudget::new(50);
        assert_eq!(budget.interval(), Duration::from_millis(20));
        assert_eq!(
            budget.remaining(Duration::from_millis(5)),
            Duration::from_millis(15)
        );
        assert_eq!(budget.remaining(Duration::from_millis(35)), Duration::ZERO);
    }

    #[test]
    fn test_frame_boundary() {
        assert_eq!(frame_boundary(3.0, 10), 30);
        assert_eq!(frame_boundary(0.3, 10), 3);
        assert_eq!(frame_boundary(0.31, 10), 4);
        assert_eq!(frame_boundary(0.0, 30), 0);
    }

    proptest! {
        #[test]
        fn prop_time_never_accumulates_error(fps in 1u32..240, frame in 0u64..1_000_000) {
            let mut clock: FrameClock<()> = FrameClock::new(fps);
            // Walk up to the frame in a few jumps; time must only depend on the index.
            clock.advance(frame / 2);
            let t = clock.advance(frame);
            prop_assert_eq!(t, frame as f64 / fps as f64);
        }

        #[test]
        fn prop_frame_boundary_round_trips(fps in 1u32..240, frame in 0u64..100_000) {
            let secs = frame as f64 / fps as f64;
            prop_assert_eq!(frame_boundary(secs, fps), frame);
        }
    }
}
