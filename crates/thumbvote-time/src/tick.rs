//! Tick sources - the per-frame scheduling abstraction
//!
//! A tick source hands out one pending tick at a time, mirroring a display
//! refresh callback: the loop requests a tick, the source fires it once, and
//! the loop requests the next one. Cancelling the pending tick stops the loop.

use std::collections::VecDeque;
use std::future::Future;
use std::time::Duration;

use thumbvote_core::Timestamp;
use tokio::time::{Interval, MissedTickBehavior};

use crate::{Clock, MonotonicClock};

/// Default refresh period (~60 Hz)
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(16);

/// Handle to a requested tick
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TickHandle(pub u64);

/// Per-frame scheduler
pub trait TickSource {
    /// Schedule the next tick; supersedes any tick still pending
    fn request_tick(&mut self) -> TickHandle;

    /// Cancel a pending tick. Returns false if `handle` was not pending.
    fn cancel_tick(&mut self, handle: TickHandle) -> bool;

    /// Currently pending tick, if any
    fn pending(&self) -> Option<TickHandle>;

    /// Wait for the pending tick to fire
    ///
    /// Resolves to `None` immediately when nothing is pending or the source
    /// is exhausted.
    fn wait(&mut self) -> impl Future<Output = Option<(TickHandle, Timestamp)>> + Send;
}

/// Monotonic handle allocator shared by the implementations
#[derive(Debug, Default)]
struct HandleSlot {
    next_id: u64,
    pending: Option<TickHandle>,
}

impl HandleSlot {
    fn request(&mut self) -> TickHandle {
        self.next_id += 1;
        let handle = TickHandle(self.next_id);
        self.pending = Some(handle);
        handle
    }

    fn cancel(&mut self, handle: TickHandle) -> bool {
        if self.pending == Some(handle) {
            self.pending = None;
            true
        } else {
            false
        }
    }
}

/// Real-time tick source driven by a tokio interval
pub struct IntervalTickSource<C: Clock = MonotonicClock> {
    period: Duration,
    // Created on first wait so construction works outside a runtime
    interval: Option<Interval>,
    clock: C,
    slot: HandleSlot,
}

impl IntervalTickSource<MonotonicClock> {
    pub fn new(period: Duration) -> Self {
        Self::with_clock(period, MonotonicClock::new())
    }
}

impl<C: Clock> IntervalTickSource<C> {
    pub fn with_clock(period: Duration, clock: C) -> Self {
        IntervalTickSource {
            period: period.max(Duration::from_millis(1)),
            interval: None,
            clock,
            slot: HandleSlot::default(),
        }
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl Default for IntervalTickSource<MonotonicClock> {
    fn default() -> Self {
        Self::new(DEFAULT_TICK_INTERVAL)
    }
}

impl<C: Clock> TickSource for IntervalTickSource<C> {
    fn request_tick(&mut self) -> TickHandle {
        self.slot.request()
    }

    fn cancel_tick(&mut self, handle: TickHandle) -> bool {
        self.slot.cancel(handle)
    }

    fn pending(&self) -> Option<TickHandle> {
        self.slot.pending
    }

    async fn wait(&mut self) -> Option<(TickHandle, Timestamp)> {
        self.slot.pending?;

        let period = self.period;
        let interval = self.interval.get_or_insert_with(|| {
            let mut interval = tokio::time::interval(period);
            // A late display refresh is dropped, not replayed in a burst
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        interval.tick().await;

        let handle = self.slot.pending.take()?;
        Some((handle, self.clock.now()))
    }
}

/// Deterministic tick source replaying a fixed list of frame times
#[derive(Debug, Default)]
pub struct ScriptedTickSource {
    frames: VecDeque<Timestamp>,
    slot: HandleSlot,
    fired: u64,
}

impl ScriptedTickSource {
    pub fn new(frames: impl IntoIterator<Item = Timestamp>) -> Self {
        ScriptedTickSource {
            frames: frames.into_iter().collect(),
            slot: HandleSlot::default(),
            fired: 0,
        }
    }

    pub fn from_millis(frames: &[u64]) -> Self {
        Self::new(frames.iter().map(|&ms| Timestamp::from_millis(ms)))
    }

    /// `count` frames spaced by `period`, starting at `start`
    pub fn every(start: Timestamp, period: Duration, count: usize) -> Self {
        Self::new((0..count).map(|i| start + period * i as u32))
    }

    /// Append more frames
    pub fn extend(&mut self, frames: impl IntoIterator<Item = Timestamp>) {
        self.frames.extend(frames);
    }

    /// Frames not yet delivered
    pub fn remaining(&self) -> usize {
        self.frames.len()
    }

    /// Ticks delivered so far
    pub fn fired(&self) -> u64 {
        self.fired
    }
}

impl TickSource for ScriptedTickSource {
    fn request_tick(&mut self) -> TickHandle {
        self.slot.request()
    }

    fn cancel_tick(&mut self, handle: TickHandle) -> bool {
        self.slot.cancel(handle)
    }

    fn pending(&self) -> Option<TickHandle> {
        self.slot.pending
    }

    async fn wait(&mut self) -> Option<(TickHandle, Timestamp)> {
        self.slot.pending?;
        let Some(at) = self.frames.pop_front() else {
            // Script exhausted: the pending tick can never fire
            self.slot.pending = None;
            return None;
        };
        let handle = self.slot.pending.take()?;
        self.fired += 1;
        Some((handle, at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;

    #[tokio::test]
    async fn test_scripted_fires_in_order() {
        let mut ticks = ScriptedTickSource::from_millis(&[0, 16, 33]);

        let mut seen = Vec::new();
        loop {
            ticks.request_tick();
            let Some((_, at)) = ticks.wait().await else {
                break;
            };
            seen.push(at.as_millis());
        }

        assert_eq!(seen, vec![0, 16, 33]);
        assert_eq!(ticks.fired(), 3);
        assert!(ticks.pending().is_none());
    }

    #[tokio::test]
    async fn test_nothing_pending_resolves_none() {
        let mut ticks = ScriptedTickSource::from_millis(&[0, 16]);
        assert!(ticks.wait().await.is_none());
        assert_eq!(ticks.remaining(), 2);
    }

    #[tokio::test]
    async fn test_cancel_prevents_fire() {
        let mut ticks = ScriptedTickSource::from_millis(&[0]);
        let handle = ticks.request_tick();

        assert!(ticks.cancel_tick(handle));
        assert!(!ticks.cancel_tick(handle));
        assert!(ticks.wait().await.is_none());
    }

    #[test]
    fn test_request_supersedes_pending() {
        let mut ticks = ScriptedTickSource::default();
        let first = ticks.request_tick();
        let second = ticks.request_tick();

        assert_ne!(first, second);
        assert_eq!(ticks.pending(), Some(second));
        assert!(!ticks.cancel_tick(first));
    }

    #[test]
    fn test_every_spacing() {
        let ticks = ScriptedTickSource::every(Timestamp::ZERO, Duration::from_millis(20), 4);
        let times: Vec<u64> = ticks.frames.iter().map(|t| t.as_millis()).collect();
        assert_eq!(times, vec![0, 20, 40, 60]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_source_uses_clock() {
        let clock = ManualClock::starting_at(Timestamp::from_millis(42));
        let mut ticks = IntervalTickSource::with_clock(Duration::from_millis(16), clock);

        let handle = ticks.request_tick();
        let (fired, at) = ticks.wait().await.expect("tick should fire");

        assert_eq!(fired, handle);
        assert_eq!(at, Timestamp::from_millis(42));
        assert!(ticks.pending().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_source_cancelled() {
        let mut ticks = IntervalTickSource::new(Duration::from_millis(16));
        let handle = ticks.request_tick();
        ticks.cancel_tick(handle);

        assert!(ticks.wait().await.is_none());
    }
}
