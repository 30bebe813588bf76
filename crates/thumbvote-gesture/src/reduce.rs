//! Reduction of raw engine output to a single frame observation

use thumbvote_core::{Classification, ConfigError, FrameObservation, Timestamp};

/// How a classification becomes a `FrameObservation`
///
/// The top candidate (highest confidence, engine order on ties) decides the
/// frame. By default no confidence threshold is applied: a low-confidence
/// `Thumb_Up` still counts as a full detection.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct ObservationPolicy {
    min_confidence: Option<f32>,
}

impl ObservationPolicy {
    /// No threshold
    pub fn new() -> Self {
        Self::default()
    }

    /// Ignore top candidates below `min_confidence`
    pub fn with_min_confidence(min_confidence: f32) -> Result<Self, ConfigError> {
        if !(0.0..=1.0).contains(&min_confidence) {
            return Err(ConfigError::ConfidenceOutOfRange(min_confidence));
        }
        Ok(ObservationPolicy {
            min_confidence: Some(min_confidence),
        })
    }

    pub fn from_option(min_confidence: Option<f32>) -> Result<Self, ConfigError> {
        match min_confidence {
            Some(threshold) => Self::with_min_confidence(threshold),
            None => Ok(Self::new()),
        }
    }

    pub fn min_confidence(&self) -> Option<f32> {
        self.min_confidence
    }

    pub fn reduce(&self, classification: &Classification, timestamp: Timestamp) -> FrameObservation {
        let detected = classification.top_candidate().and_then(|top| match self.min_confidence {
            Some(threshold) if top.confidence < threshold => None,
            _ => top.class(),
        });
        FrameObservation::new(timestamp, detected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use thumbvote_core::{GestureCandidate, GestureClass};

    fn t() -> Timestamp {
        Timestamp::from_millis(10)
    }

    #[test]
    fn test_low_confidence_still_counts_by_default() {
        let policy = ObservationPolicy::new();
        let obs = policy.reduce(&Classification::single("Thumb_Up", 0.01), t());
        assert_eq!(obs.detected, Some(GestureClass::Positive));
        assert_eq!(obs.timestamp, t());
    }

    #[test]
    fn test_irrelevant_top_candidate_is_no_gesture() {
        let c = Classification {
            gestures: vec![
                GestureCandidate::new("Open_Palm", 0.8),
                GestureCandidate::new("Thumb_Up", 0.6),
            ],
            landmarks: Vec::new(),
        };
        assert_eq!(ObservationPolicy::new().reduce(&c, t()).detected, None);
    }

    #[test]
    fn test_empty_is_no_gesture() {
        let obs = ObservationPolicy::new().reduce(&Classification::empty(), t());
        assert_eq!(obs, FrameObservation::empty(t()));
    }

    #[test]
    fn test_threshold_when_configured() {
        let policy = ObservationPolicy::with_min_confidence(0.5).unwrap();
        assert_eq!(policy.reduce(&Classification::single("Thumb_Down", 0.49), t()).detected, None);
        assert_eq!(
            policy.reduce(&Classification::single("Thumb_Down", 0.5), t()).detected,
            Some(GestureClass::Negative)
        );
    }

    #[test]
    fn test_threshold_range_checked() {
        assert!(ObservationPolicy::with_min_confidence(1.5).is_err());
        assert!(ObservationPolicy::with_min_confidence(-0.1).is_err());
        assert_eq!(ObservationPolicy::from_option(None).unwrap(), ObservationPolicy::new());
    }
}
