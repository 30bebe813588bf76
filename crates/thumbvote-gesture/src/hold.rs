//! Hold state and hold timing configuration

use std::time::Duration;

use thumbvote_core::{fraction_of, ConfigError, GestureClass, Timestamp};

/// Default time a gesture must be held before it counts
pub const DEFAULT_HOLD_DURATION: Duration = Duration::from_millis(2000);

/// Hold timing configuration
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct HoldConfig {
    hold_duration: Duration,
}

impl HoldConfig {
    /// INVARIANT: hold duration is strictly positive
    pub fn new(hold_duration: Duration) -> Result<Self, ConfigError> {
        if hold_duration.is_zero() {
            return Err(ConfigError::NonPositiveDuration {
                field: "hold_duration",
            });
        }
        Ok(HoldConfig { hold_duration })
    }

    pub fn from_millis(millis: u64) -> Result<Self, ConfigError> {
        Self::new(Duration::from_millis(millis))
    }

    #[inline]
    pub fn hold_duration(&self) -> Duration {
        self.hold_duration
    }
}

impl Default for HoldConfig {
    fn default() -> Self {
        HoldConfig {
            hold_duration: DEFAULT_HOLD_DURATION,
        }
    }
}

/// Result of feeding one observation (or one animation step)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HoldOutput {
    /// Hold progress in [0, 1]
    pub progress: f64,
    /// Set exactly once per satisfied hold
    pub confirmed: Option<GestureClass>,
}

impl HoldOutput {
    pub const IDLE: HoldOutput = HoldOutput {
        progress: 0.0,
        confirmed: None,
    };

    pub fn in_progress(progress: f64) -> Self {
        HoldOutput {
            progress,
            confirmed: None,
        }
    }

    pub fn confirmed(class: GestureClass) -> Self {
        HoldOutput {
            progress: 1.0,
            confirmed: Some(class),
        }
    }

    pub fn is_confirmed(&self) -> bool {
        self.confirmed.is_some()
    }
}

/// The class currently being held and when the hold started
///
/// Stored as a single option so "active class" and "start time" can never
/// disagree about whether a hold is in progress.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct HoldState {
    current: Option<(GestureClass, Timestamp)>,
}

impl HoldState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn active(&self) -> Option<GestureClass> {
        self.current.map(|(class, _)| class)
    }

    pub fn started_at(&self) -> Option<Timestamp> {
        self.current.map(|(_, at)| at)
    }

    pub fn is_empty(&self) -> bool {
        self.current.is_none()
    }

    /// Start (or restart) a hold of `class` at `at`
    pub fn begin(&mut self, class: GestureClass, at: Timestamp) {
        self.current = Some((class, at));
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    /// Time held as of `now`; zero when idle
    pub fn elapsed(&self, now: Timestamp) -> Duration {
        match self.current {
            Some((_, started)) => now - started,
            None => Duration::ZERO,
        }
    }

    /// Derived progress as of `now`
    pub fn progress(&self, now: Timestamp, hold_duration: Duration) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        fraction_of(self.elapsed(now), hold_duration)
    }
}
