//! Delayed task queue
//!
//! Replaces fire-and-forget timer callbacks with explicit scheduled tasks.
//! Tasks are polled from the tick loop, so a task fires on the first tick at
//! or after its deadline. Each task carries the liveness generation it was
//! scheduled under; the caller discards tasks whose generation is stale.

use std::time::Duration;

use thumbvote_core::Timestamp;

use crate::Generation;

/// Identifier of a scheduled task
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerId(pub u64);

/// A task whose deadline has passed
#[derive(Clone, Debug, PartialEq)]
pub struct Expired<T> {
    pub id: TimerId,
    pub deadline: Timestamp,
    pub generation: Generation,
    pub task: T,
}

#[derive(Clone, Debug)]
struct Entry<T> {
    id: TimerId,
    deadline: Timestamp,
    generation: Generation,
    task: T,
}

/// Deadline-ordered task queue
///
/// Tasks with equal deadlines fire in scheduling order.
#[derive(Clone, Debug)]
pub struct TimerQueue<T> {
    // Sorted by (deadline, id)
    entries: Vec<Entry<T>>,
    next_id: u64,
}

impl<T> TimerQueue<T> {
    pub fn new() -> Self {
        TimerQueue {
            entries: Vec::new(),
            next_id: 0,
        }
    }

    /// Schedule `task` at an absolute deadline
    pub fn schedule_at(&mut self, deadline: Timestamp, generation: Generation, task: T) -> TimerId {
        self.next_id += 1;
        let id = TimerId(self.next_id);
        let pos = self
            .entries
            .partition_point(|e| (e.deadline, e.id) <= (deadline, id));
        self.entries.insert(
            pos,
            Entry {
                id,
                deadline,
                generation,
                task,
            },
        );
        id
    }

    /// Schedule `task` to fire `delay` after `now`
    pub fn schedule_after(
        &mut self,
        now: Timestamp,
        delay: Duration,
        generation: Generation,
        task: T,
    ) -> TimerId {
        self.schedule_at(now + delay, generation, task)
    }

    /// Remove a task. Returns it if it was still queued.
    pub fn cancel(&mut self, id: TimerId) -> Option<T> {
        let pos = self.entries.iter().position(|e| e.id == id)?;
        Some(self.entries.remove(pos).task)
    }

    /// Pop the earliest task whose deadline is at or before `now`
    pub fn pop_due(&mut self, now: Timestamp) -> Option<Expired<T>> {
        if self.entries.first()?.deadline > now {
            return None;
        }
        let entry = self.entries.remove(0);
        Some(Expired {
            id: entry.id,
            deadline: entry.deadline,
            generation: entry.generation,
            task: entry.task,
        })
    }

    /// Earliest deadline still queued
    pub fn next_deadline(&self) -> Option<Timestamp> {
        self.entries.first().map(|e| e.deadline)
    }

    /// Drop every queued task; returns how many were dropped
    pub fn clear(&mut self) -> usize {
        let dropped = self.entries.len();
        self.entries.clear();
        dropped
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl<T> Default for TimerQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ms(v: u64) -> Timestamp {
        Timestamp::from_millis(v)
    }

    #[test]
    fn test_pop_due_in_deadline_order() {
        let mut q = TimerQueue::new();
        let g = Generation(0);
        q.schedule_at(ms(300), g, "c");
        q.schedule_at(ms(100), g, "a");
        q.schedule_at(ms(200), g, "b");

        assert!(q.pop_due(ms(50)).is_none());
        assert_eq!(q.pop_due(ms(250)).map(|e| e.task), Some("a"));
        assert_eq!(q.pop_due(ms(250)).map(|e| e.task), Some("b"));
        assert!(q.pop_due(ms(250)).is_none());
        assert_eq!(q.next_deadline(), Some(ms(300)));
    }

    #[test]
    fn test_equal_deadlines_fifo() {
        let mut q = TimerQueue::new();
        let g = Generation(0);
        q.schedule_at(ms(100), g, 1);
        q.schedule_at(ms(100), g, 2);
        q.schedule_at(ms(100), g, 3);

        let order: Vec<i32> = std::iter::from_fn(|| q.pop_due(ms(100)).map(|e| e.task)).collect();
        assert_eq!(order, vec![1, 2, 3]);
    }

    #[test]
    fn test_schedule_after_and_cancel() {
        let mut q = TimerQueue::new();
        let id = q.schedule_after(ms(1000), Duration::from_millis(1500), Generation(3), "tally");

        assert_eq!(q.next_deadline(), Some(ms(2500)));
        assert_eq!(q.cancel(id), Some("tally"));
        assert_eq!(q.cancel(id), None);
        assert!(q.is_empty());
    }

    #[test]
    fn test_expired_carries_generation() {
        let mut q = TimerQueue::new();
        q.schedule_at(ms(10), Generation(7), ());
        let expired = q.pop_due(ms(10)).unwrap();
        assert_eq!(expired.generation, Generation(7));
        assert_eq!(expired.deadline, ms(10));
    }

    #[test]
    fn test_clear() {
        let mut q = TimerQueue::new();
        q.schedule_at(ms(10), Generation(0), ());
        q.schedule_at(ms(20), Generation(0), ());
        assert_eq!(q.clear(), 2);
        assert_eq!(q.len(), 0);
    }

    #[test]
    fn test_huge_delay_never_due_early() {
        let mut q = TimerQueue::new();
        q.schedule_after(ms(1000), Duration::from_secs(1 << 62), Generation(0), ());

        assert_eq!(q.next_deadline(), Some(Timestamp(u64::MAX)));
        assert!(q.pop_due(ms(1001)).is_none());
    }

    proptest! {
        #[test]
        fn prop_pops_sorted_and_stable(deadlines in prop::collection::vec(0u64..50, 0..40)) {
            let mut q = TimerQueue::new();
            for (i, &d) in deadlines.iter().enumerate() {
                q.schedule_at(ms(d), Generation(0), i);
            }

            let popped: Vec<(Timestamp, usize)> =
                std::iter::from_fn(|| q.pop_due(ms(u64::MAX / 1000)).map(|e| (e.deadline, e.task)))
                    .collect();

            let mut expected: Vec<(Timestamp, usize)> =
                deadlines.iter().enumerate().map(|(i, &d)| (ms(d), i)).collect();
            expected.sort_by_key(|&(deadline, i)| (deadline, i));
            prop_assert_eq!(popped, expected);
            prop_assert!(q.is_empty());
        }

        #[test]
        fn prop_nothing_due_before_deadline(
            deadlines in prop::collection::vec(0u64..1000, 1..20),
            now in 0u64..1000,
        ) {
            let mut q = TimerQueue::new();
            for &d in &deadlines {
                q.schedule_at(ms(d), Generation(0), d);
            }
            while let Some(expired) = q.pop_due(ms(now)) {
                prop_assert!(expired.deadline <= ms(now));
            }
            let remaining = deadlines.iter().filter(|&&d| d > now).count();
            prop_assert_eq!(q.len(), remaining);
        }
    }
}
