//! Gesture Confirmation State Machine
//!
//! Turns a noisy per-frame stream of detections into at most one confirmed
//! vote per hold. The rules, applied per observation:
//!
//! 1. Outside `Recognizing`: clear the hold, report idle.
//! 2. No gesture: clear the hold, report idle. Any gap restarts the hold.
//! 3. A different class than the one held: restart timing for the new class.
//! 4. Same class: report progress; once the hold duration is reached, clear
//!    the hold and report the confirmation in the same step.

use std::time::Duration;

use thumbvote_core::{FrameObservation, GestureClass, SessionMode, Timestamp};
use tracing::{debug, info};

use crate::{HoldConfig, HoldOutput, HoldState};

/// Debouncing state machine over frame observations
#[derive(Clone, Debug, Default)]
pub struct ConfirmationMachine {
    state: HoldState,
    config: HoldConfig,
}

impl ConfirmationMachine {
    pub fn new(config: HoldConfig) -> Self {
        ConfirmationMachine {
            state: HoldState::new(),
            config,
        }
    }

    /// Feed one observation
    pub fn observe(&mut self, obs: &FrameObservation, mode: SessionMode) -> HoldOutput {
        if !mode.accepts_observations() {
            self.reset();
            return HoldOutput::IDLE;
        }

        let Some(detected) = obs.detected else {
            if let Some(class) = self.state.active() {
                debug!(%class, at = %obs.timestamp, "hold interrupted");
            }
            self.reset();
            return HoldOutput::IDLE;
        };

        let Some((active, started)) = self.state.active().zip(self.state.started_at()) else {
            debug!(class = %detected, at = %obs.timestamp, "hold started");
            self.state.begin(detected, obs.timestamp);
            return HoldOutput::IDLE;
        };

        if active != detected {
            debug!(from = %active, to = %detected, at = %obs.timestamp, "hold switched class");
            self.state.begin(detected, obs.timestamp);
            return HoldOutput::IDLE;
        }

        let elapsed = obs.timestamp - started;
        if elapsed >= self.config.hold_duration() {
            info!(class = %active, held_ms = elapsed.as_millis() as u64, "gesture confirmed");
            self.reset();
            return HoldOutput::confirmed(active);
        }

        HoldOutput::in_progress(self.state.progress(obs.timestamp, self.config.hold_duration()))
    }

    /// Clear the hold
    pub fn reset(&mut self) {
        self.state.clear();
    }

    /// Class currently held, if any
    pub fn active(&self) -> Option<GestureClass> {
        self.state.active()
    }

    pub fn hold_state(&self) -> &HoldState {
        &self.state
    }

    /// Progress the current hold would report at `now`
    pub fn progress_at(&self, now: Timestamp) -> f64 {
        self.state.progress(now, self.config.hold_duration())
    }

    pub fn hold_duration(&self) -> Duration {
        self.config.hold_duration()
    }

    pub fn config(&self) -> &HoldConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const P: Option<GestureClass> = Some(GestureClass::Positive);
    const N: Option<GestureClass> = Some(GestureClass::Negative);

    fn machine(ms: u64) -> ConfirmationMachine {
        ConfirmationMachine::new(HoldConfig::from_millis(ms).unwrap())
    }

    fn feed(m: &mut ConfirmationMachine, frames: &[(u64, Option<GestureClass>)]) -> Vec<HoldOutput> {
        frames
            .iter()
            .map(|&(ms, detected)| {
                m.observe(&FrameObservation::at_millis(ms, detected), SessionMode::Recognizing)
            })
            .collect()
    }

    #[test]
    fn test_steady_hold_confirms_once() {
        let mut m = machine(1000);
        let out = feed(&mut m, &[(0, P), (500, P), (1000, P)]);

        let progress: Vec<f64> = out.iter().map(|o| o.progress).collect();
        assert_eq!(progress, vec![0.0, 0.5, 1.0]);
        assert_eq!(out[2].confirmed, Some(GestureClass::Positive));
        assert!(out[..2].iter().all(|o| o.confirmed.is_none()));
        assert!(m.hold_state().is_empty());
    }

    #[test]
    fn test_gap_restarts_hold() {
        let mut m = machine(1000);
        let out = feed(&mut m, &[(0, P), (300, None), (350, P)]);

        assert!(out.iter().all(|o| o.confirmed.is_none()));
        assert_eq!(out[1].progress, 0.0);
        assert_eq!(out[2].progress, 0.0);
        assert_eq!(m.hold_state().started_at(), Some(Timestamp::from_millis(350)));

        // 1000ms after the restart, not after the first frame
        let out = feed(&mut m, &[(1100, P), (1350, P)]);
        assert!(out[0].confirmed.is_none());
        assert_eq!(out[1].confirmed, Some(GestureClass::Positive));
    }

    #[test]
    fn test_class_switch_restarts_for_new_class() {
        let mut m = machine(1000);
        let out = feed(&mut m, &[(0, P), (400, N)]);

        assert!(out.iter().all(|o| o.confirmed.is_none()));
        assert_eq!(out[1].progress, 0.0);
        assert_eq!(m.active(), Some(GestureClass::Negative));
        assert_eq!(m.hold_state().started_at(), Some(Timestamp::from_millis(400)));
    }

    #[test]
    fn test_not_recognizing_clears_hold() {
        let mut m = machine(1000);
        feed(&mut m, &[(0, P), (900, P)]);
        assert_eq!(m.active(), Some(GestureClass::Positive));

        for mode in [SessionMode::Loading, SessionMode::Confirming, SessionMode::Error] {
            let out = m.observe(&FrameObservation::at_millis(1200, P), mode);
            assert_eq!(out, HoldOutput::IDLE);
            assert!(m.hold_state().is_empty());
        }

        // Back in recognizing, the next frame only starts a new hold
        let out = feed(&mut m, &[(1300, P)]);
        assert_eq!(out[0], HoldOutput::IDLE);
    }

    #[test]
    fn test_overshoot_reports_full_progress() {
        let mut m = machine(1000);
        let out = feed(&mut m, &[(0, N), (3000, N)]);
        assert_eq!(out[1], HoldOutput::confirmed(GestureClass::Negative));
    }

    #[test]
    fn test_progress_at_without_observation() {
        let mut m = machine(2000);
        feed(&mut m, &[(1000, P)]);
        assert!((m.progress_at(Timestamp::from_millis(1500)) - 0.25).abs() < 1e-9);
    }

    fn class() -> impl Strategy<Value = GestureClass> {
        prop_oneof![Just(GestureClass::Positive), Just(GestureClass::Negative)]
    }

    fn detection() -> impl Strategy<Value = Option<GestureClass>> {
        prop_oneof![Just(None), class().prop_map(Some)]
    }

    fn timestamps(start: u64, steps: &[u64]) -> Vec<u64> {
        steps
            .iter()
            .scan(start, |t, step| {
                *t += step;
                Some(*t)
            })
            .collect()
    }

    proptest! {
        #[test]
        fn prop_uninterrupted_hold_confirms_at_first_full_frame(
            class in class(),
            hold_ms in 200u64..2000,
            steps in prop::collection::vec(1u64..250, 1..120),
        ) {
            let mut m = machine(hold_ms);
            let mut times = vec![0u64];
            times.extend(timestamps(0, &steps));
            let expected = times.iter().position(|&t| t >= hold_ms);

            let mut confirmations = Vec::new();
            for (i, &t) in times.iter().enumerate() {
                let out = m.observe(&FrameObservation::at_millis(t, Some(class)), SessionMode::Recognizing);
                if out.confirmed.is_some() {
                    prop_assert_eq!(out.confirmed, Some(class));
                    confirmations.push(i);
                }
                if Some(i) == expected {
                    break;
                }
            }

            match expected {
                Some(idx) => prop_assert_eq!(confirmations, vec![idx]),
                None => prop_assert!(confirmations.is_empty()),
            }
        }

        #[test]
        fn prop_gap_discards_first_run(
            class in class(),
            hold_ms in 200u64..2000,
            first in prop::collection::vec(1u64..50, 0..10),
            gap in 1u64..500,
            second in prop::collection::vec(1u64..250, 0..40),
        ) {
            let mut m = machine(hold_ms);
            let run1 = timestamps(0, &first);
            prop_assume!(run1.last().copied().unwrap_or(0) < hold_ms);

            let mut out = m.observe(&FrameObservation::at_millis(0, Some(class)), SessionMode::Recognizing);
            prop_assert!(out.confirmed.is_none());
            for &t in &run1 {
                out = m.observe(&FrameObservation::at_millis(t, Some(class)), SessionMode::Recognizing);
                prop_assert!(out.confirmed.is_none());
            }

            let gap_at = run1.last().copied().unwrap_or(0) + gap;
            out = m.observe(&FrameObservation::at_millis(gap_at, None), SessionMode::Recognizing);
            prop_assert_eq!(out, HoldOutput::IDLE);

            let restart = gap_at + 1;
            let mut run2 = vec![restart];
            run2.extend(timestamps(restart, &second));
            let mut confirmed_at = None;
            for &t in &run2 {
                out = m.observe(&FrameObservation::at_millis(t, Some(class)), SessionMode::Recognizing);
                if out.confirmed.is_some() {
                    confirmed_at = Some(t);
                    break;
                }
            }

            let second_span_ok = run2.iter().any(|&t| t - restart >= hold_ms);
            prop_assert_eq!(confirmed_at.is_some(), second_span_ok);
            if let Some(t) = confirmed_at {
                prop_assert!(t - restart >= hold_ms);
            }
        }

        #[test]
        fn prop_switch_never_confirms_first_class(
            first in class(),
            hold_ms in 500u64..2000,
            switch_after in 1u64..499,
        ) {
            let mut m = machine(hold_ms);
            let a = m.observe(&FrameObservation::at_millis(0, Some(first)), SessionMode::Recognizing);
            let b = m.observe(
                &FrameObservation::at_millis(switch_after, Some(first.opposite())),
                SessionMode::Recognizing,
            );

            prop_assert!(a.confirmed.is_none() && b.confirmed.is_none());
            prop_assert_eq!(b.progress, 0.0);
            prop_assert_eq!(m.active(), Some(first.opposite()));
            prop_assert_eq!(m.hold_state().started_at(), Some(Timestamp::from_millis(switch_after)));
        }

        #[test]
        fn prop_progress_monotone_within_run_and_zero_on_interruption(
            hold_ms in 100u64..2000,
            frames in prop::collection::vec((1u64..120, detection()), 1..200),
        ) {
            let mut m = machine(hold_ms);
            let mut t = 0u64;
            let mut prev: Option<(GestureClass, f64)> = None;

            for (step, detected) in frames {
                t += step;
                let before = m.active();
                let out = m.observe(&FrameObservation::at_millis(t, detected), SessionMode::Recognizing);

                prop_assert!((0.0..=1.0).contains(&out.progress));
                match detected {
                    None => prop_assert_eq!(out.progress, 0.0),
                    Some(class) if before != Some(class) => prop_assert_eq!(out.progress, 0.0),
                    Some(class) => {
                        if let Some((prev_class, prev_progress)) = prev {
                            prop_assert_eq!(prev_class, class);
                            prop_assert!(out.progress >= prev_progress);
                        }
                    }
                }

                prev = match (detected, out.confirmed) {
                    (Some(class), None) => Some((class, out.progress)),
                    _ => None,
                };
            }
        }

        #[test]
        fn prop_inactive_modes_always_idle(
            frames in prop::collection::vec((1u64..500, detection()), 1..50),
            mode in prop_oneof![
                Just(SessionMode::Loading),
                Just(SessionMode::Confirming),
                Just(SessionMode::Error),
            ],
        ) {
            let mut m = machine(300);
            let mut t = 0;
            for (step, detected) in frames {
                t += step;
                let out = m.observe(&FrameObservation::at_millis(t, detected), mode);
                prop_assert_eq!(out, HoldOutput::IDLE);
                prop_assert!(m.hold_state().is_empty());
            }
        }
    }
}
