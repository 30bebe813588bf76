//! Session-level state: modes, tally and the rendering snapshot

use crate::GestureClass;

/// Top-level session mode
///
/// Exactly one mode is active. Only `Recognizing` accepts observations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum SessionMode {
    /// Engine or camera still being acquired
    #[default]
    Loading,
    /// Frames are classified and fed to the confirmation machine
    Recognizing,
    /// A vote was confirmed; thank-you and cooldown in progress
    Confirming,
    /// Engine or camera failed; only the manual fallback remains
    Error,
}

impl SessionMode {
    #[inline]
    pub fn accepts_observations(self) -> bool {
        self == SessionMode::Recognizing
    }

    pub fn name(self) -> &'static str {
        match self {
            SessionMode::Loading => "loading",
            SessionMode::Recognizing => "recognizing",
            SessionMode::Confirming => "confirming",
            SessionMode::Error => "error",
        }
    }
}

impl std::fmt::Display for SessionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Which startup step is in flight while `Loading`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum LoadingPhase {
    #[default]
    LoadingModel,
    StartingCamera,
}

impl LoadingPhase {
    /// Status line for the loading overlay
    pub fn message(self) -> &'static str {
        match self {
            LoadingPhase::LoadingModel => "Loading gesture recognition model...",
            LoadingPhase::StartingCamera => "Starting camera...",
        }
    }
}

/// Vote counters, in memory for the process lifetime
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct VoteTally {
    pub positive: u64,
    pub negative: u64,
}

impl VoteTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, class: GestureClass) {
        match class {
            GestureClass::Positive => self.positive = self.positive.saturating_add(1),
            GestureClass::Negative => self.negative = self.negative.saturating_add(1),
        }
    }

    pub fn count(&self, class: GestureClass) -> u64 {
        match class {
            GestureClass::Positive => self.positive,
            GestureClass::Negative => self.negative,
        }
    }

    pub fn total(&self) -> u64 {
        self.positive + self.negative
    }
}

/// Everything the presentational layer needs to draw one frame of UI
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SessionSnapshot {
    pub mode: SessionMode,
    pub loading_phase: LoadingPhase,
    /// Hold progress in [0, 1]
    pub progress: f64,
    /// Class currently being held, if any
    pub active: Option<GestureClass>,
    pub tally: VoteTally,
    /// Most recent confirmed class (thank-you display)
    pub last_confirmed: Option<GestureClass>,
    /// User-facing error text while in `Error`
    pub error_message: Option<String>,
    /// Manual fallback buttons are enabled
    pub fallback_enabled: bool,
}

impl SessionSnapshot {
    /// Thank-you overlay is showing
    pub fn showing_thank_you(&self) -> bool {
        self.mode == SessionMode::Confirming
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_recognizing_accepts() {
        assert!(SessionMode::Recognizing.accepts_observations());
        assert!(!SessionMode::Loading.accepts_observations());
        assert!(!SessionMode::Confirming.accepts_observations());
        assert!(!SessionMode::Error.accepts_observations());
    }

    #[test]
    fn test_tally_record() {
        let mut tally = VoteTally::new();
        tally.record(GestureClass::Positive);
        tally.record(GestureClass::Positive);
        tally.record(GestureClass::Negative);

        assert_eq!(tally.count(GestureClass::Positive), 2);
        assert_eq!(tally.count(GestureClass::Negative), 1);
        assert_eq!(tally.total(), 3);
    }

    #[test]
    fn test_loading_messages() {
        assert_eq!(
            LoadingPhase::LoadingModel.message(),
            "Loading gesture recognition model..."
        );
        assert_eq!(LoadingPhase::StartingCamera.message(), "Starting camera...");
    }
}
