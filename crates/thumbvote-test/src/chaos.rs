//! Flicker chaos for the confirmation machine
//!
//! Simulates a hostile camera feed:
//! - Frame timing jitter
//! - Detection dropouts (the hand vanishes for a frame)
//! - Misclassification (the opposite thumb for a frame)
//! - Users changing their mind mid-hold
//!
//! Generated streams are fed through a `ConfirmationMachine` and the result
//! is checked against the hold contract, not against a second copy of the
//! algorithm.

use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thumbvote_core::{FrameObservation, GestureClass, SessionMode, Timestamp};
use thumbvote_gesture::{ConfirmationMachine, HoldConfig};

/// Feed degradation parameters
#[derive(Clone, Debug)]
pub struct FlickerConfig {
    /// Nominal frame period
    pub frame_period: Duration,
    /// Extra delay per frame, uniform in [0, jitter_ms]
    pub jitter_ms: u32,
    /// Probability a frame loses the hand (0.0 - 1.0)
    pub dropout_rate: f64,
    /// Probability a frame reports the opposite class (0.0 - 1.0)
    pub misclass_rate: f64,
    /// Probability an intent segment is "no gesture"
    pub idle_rate: f64,
    /// How long the user keeps one intent, in ms
    pub segment_ms: (u64, u64),
}

impl Default for FlickerConfig {
    fn default() -> Self {
        FlickerConfig {
            frame_period: Duration::from_millis(16),
            jitter_ms: 4,
            dropout_rate: 0.02,
            misclass_rate: 0.01,
            idle_rate: 0.3,
            segment_ms: (300, 4000),
        }
    }
}

impl FlickerConfig {
    /// Clean feed, long deliberate holds
    pub fn steady() -> Self {
        FlickerConfig {
            jitter_ms: 0,
            dropout_rate: 0.0,
            misclass_rate: 0.0,
            idle_rate: 0.2,
            segment_ms: (2500, 5000),
            ..Default::default()
        }
    }

    /// Typical webcam in decent light
    pub fn noisy() -> Self {
        Self::default()
    }

    /// Bad light, slow device
    pub fn hostile() -> Self {
        FlickerConfig {
            frame_period: Duration::from_millis(33),
            jitter_ms: 40,
            dropout_rate: 0.15,
            misclass_rate: 0.08,
            idle_rate: 0.3,
            segment_ms: (100, 3000),
        }
    }
}

/// Seeded observation stream generator
pub struct FlickerGenerator {
    config: FlickerConfig,
    rng: StdRng,
}

impl FlickerGenerator {
    pub fn new(config: FlickerConfig, seed: u64) -> Self {
        FlickerGenerator {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Observations covering `duration`, starting at t=0
    pub fn generate(&mut self, duration: Duration) -> Vec<FrameObservation> {
        let end = Timestamp::ZERO + duration;
        let segment = Uniform::new_inclusive(self.config.segment_ms.0, self.config.segment_ms.1);

        let mut frames = Vec::new();
        let mut t = Timestamp::ZERO;
        let mut intent = None;
        let mut intent_until = Timestamp::ZERO;

        while t < end {
            if t >= intent_until {
                intent = self.pick_intent();
                intent_until = t + Duration::from_millis(segment.sample(&mut self.rng));
            }
            frames.push(FrameObservation::new(t, self.degrade(intent)));

            let jitter = match self.config.jitter_ms {
                0 => 0,
                max => self.rng.gen_range(0..=max),
            };
            t = t + self.config.frame_period + Duration::from_millis(jitter as u64);
        }
        frames
    }

    fn pick_intent(&mut self) -> Option<GestureClass> {
        if self.rng.gen_bool(self.config.idle_rate) {
            return None;
        }
        Some(if self.rng.gen_bool(0.5) {
            GestureClass::Positive
        } else {
            GestureClass::Negative
        })
    }

    fn degrade(&mut self, intent: Option<GestureClass>) -> Option<GestureClass> {
        let class = intent?;
        if self.rng.gen_bool(self.config.dropout_rate) {
            return None;
        }
        if self.rng.gen_bool(self.config.misclass_rate) {
            return Some(class.opposite());
        }
        Some(class)
    }
}

/// Outcome of replaying a stream through the machine
#[derive(Clone, Debug, Default)]
pub struct FlickerReport {
    pub frames: usize,
    /// Frame index and class of every confirmation
    pub confirmations: Vec<(usize, GestureClass)>,
    pub violations: Vec<String>,
}

impl FlickerReport {
    pub fn holds_contract(&self) -> bool {
        self.violations.is_empty()
    }

    pub fn count(&self, class: GestureClass) -> usize {
        self.confirmations.iter().filter(|(_, c)| *c == class).count()
    }
}

/// Replay `frames` in `Recognizing` and check the hold contract
///
/// - Every confirmation ends an unbroken same-class run spanning the hold
///   duration, counted from the frame after the previous confirmation
/// - Every such run that spans the hold duration is confirmed
/// - Progress stays within [0, 1]
pub fn replay(hold: HoldConfig, frames: &[FrameObservation]) -> FlickerReport {
    let mut machine = ConfirmationMachine::new(hold);
    let mut report = FlickerReport {
        frames: frames.len(),
        ..Default::default()
    };

    let hold_duration = hold.hold_duration();
    // Start index of the current unbroken run
    let mut run_start: Option<usize> = None;

    for (i, obs) in frames.iter().enumerate() {
        let out = machine.observe(obs, SessionMode::Recognizing);
        if !(0.0..=1.0).contains(&out.progress) {
            report.violations.push(format!("frame {i}: progress {} out of range", out.progress));
        }

        run_start = match (obs.detected, run_start) {
            (None, _) => None,
            (Some(class), Some(start)) if frames[start].detected == Some(class) => Some(start),
            (Some(_), _) => Some(i),
        };

        let spans_hold = run_start
            .map(|start| obs.timestamp - frames[start].timestamp >= hold_duration)
            .unwrap_or(false);

        match out.confirmed {
            Some(class) => {
                if !spans_hold || obs.detected != Some(class) {
                    report
                        .violations
                        .push(format!("frame {i}: {class} confirmed without a full hold"));
                }
                report.confirmations.push((i, class));
                run_start = None;
            }
            None if spans_hold => {
                report
                    .violations
                    .push(format!("frame {i}: full hold not confirmed"));
                run_start = None;
            }
            None => {}
        }
    }
    report
}

/// Generate and replay in one go
pub fn run_flicker(
    config: FlickerConfig,
    seed: u64,
    hold: HoldConfig,
    duration: Duration,
) -> FlickerReport {
    let frames = FlickerGenerator::new(config, seed).generate(duration);
    replay(hold, &frames)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn hold() -> HoldConfig {
        HoldConfig::from_millis(2000).unwrap()
    }

    #[test]
    fn test_generator_is_deterministic() {
        let a = FlickerGenerator::new(FlickerConfig::noisy(), 7).generate(Duration::from_secs(5));
        let b = FlickerGenerator::new(FlickerConfig::noisy(), 7).generate(Duration::from_secs(5));
        assert_eq!(a, b);
        assert!(a.windows(2).all(|w| w[0].timestamp < w[1].timestamp));
    }

    #[test]
    fn test_steady_feed_confirms() {
        let report = run_flicker(FlickerConfig::steady(), 1, hold(), Duration::from_secs(60));
        assert!(report.holds_contract(), "{:?}", report.violations);
        assert!(!report.confirmations.is_empty());
    }

    #[test]
    fn test_contract_under_chaos() {
        for seed in 0..20 {
            for config in [FlickerConfig::noisy(), FlickerConfig::hostile()] {
                let report = run_flicker(config, seed, hold(), Duration::from_secs(30));
                assert!(
                    report.holds_contract(),
                    "seed {seed}: {:?}",
                    report.violations
                );
            }
        }
    }

    #[test]
    fn test_single_dropout_breaks_hold() {
        let mut frames: Vec<FrameObservation> = (0..=125)
            .map(|i| FrameObservation::at_millis(i * 16, Some(GestureClass::Positive)))
            .collect();
        // 1984ms into the hold the hand vanishes for one frame
        frames[124].detected = None;

        let report = replay(hold(), &frames);
        assert!(report.holds_contract());
        assert!(report.confirmations.is_empty());
    }

    fn any_config() -> impl Strategy<Value = FlickerConfig> {
        prop_oneof![
            Just(FlickerConfig::steady()),
            Just(FlickerConfig::noisy()),
            Just(FlickerConfig::hostile()),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_any_feed_holds_contract(
            config in any_config(),
            seed in any::<u64>(),
            hold_ms in 50u64..3000,
        ) {
            let hold = HoldConfig::from_millis(hold_ms).unwrap();
            let report = run_flicker(config, seed, hold, Duration::from_secs(20));
            prop_assert!(report.holds_contract(), "{:?}", report.violations);
        }
    }
}
