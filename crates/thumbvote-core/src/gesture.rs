//! Gesture classes and per-frame recognition data
//!
//! The confirmation logic only knows two gestures:
//! - Positive: thumb up ("approve")
//! - Negative: thumb down ("disapprove")
//!
//! Every other classifier label is treated as "no gesture".

use crate::Timestamp;

/// Classifier label for the thumb-up gesture
pub const LABEL_THUMB_UP: &str = "Thumb_Up";
/// Classifier label for the thumb-down gesture
pub const LABEL_THUMB_DOWN: &str = "Thumb_Down";

/// The two recognizable gestures
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum GestureClass {
    /// Thumb up - counts as an approve vote
    Positive,
    /// Thumb down - counts as a disapprove vote
    Negative,
}

impl GestureClass {
    /// Normalize a classifier label; unknown labels map to `None`
    pub fn from_label(label: &str) -> Option<Self> {
        match label {
            LABEL_THUMB_UP => Some(GestureClass::Positive),
            LABEL_THUMB_DOWN => Some(GestureClass::Negative),
            _ => None,
        }
    }

    /// Classifier label for this class
    pub fn label(self) -> &'static str {
        match self {
            GestureClass::Positive => LABEL_THUMB_UP,
            GestureClass::Negative => LABEL_THUMB_DOWN,
        }
    }

    pub fn opposite(self) -> Self {
        match self {
            GestureClass::Positive => GestureClass::Negative,
            GestureClass::Negative => GestureClass::Positive,
        }
    }
}

impl std::fmt::Display for GestureClass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GestureClass::Positive => write!(f, "positive"),
            GestureClass::Negative => write!(f, "negative"),
        }
    }
}

/// What the confirmation machine consumes for one frame
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FrameObservation {
    /// Monotonic frame time
    pub timestamp: Timestamp,
    /// Detected class, `None` when no relevant gesture is visible
    pub detected: Option<GestureClass>,
}

impl FrameObservation {
    pub fn new(timestamp: Timestamp, detected: Option<GestureClass>) -> Self {
        FrameObservation {
            timestamp,
            detected,
        }
    }

    /// Observation with no gesture
    pub fn empty(timestamp: Timestamp) -> Self {
        Self::new(timestamp, None)
    }

    pub fn at_millis(millis: u64, detected: Option<GestureClass>) -> Self {
        Self::new(Timestamp::from_millis(millis), detected)
    }
}

/// One ranked guess from the classification engine
#[derive(Clone, Debug, PartialEq)]
pub struct GestureCandidate {
    pub label: String,
    pub confidence: f32,
}

impl GestureCandidate {
    pub fn new(label: impl Into<String>, confidence: f32) -> Self {
        GestureCandidate {
            label: label.into(),
            confidence,
        }
    }

    pub fn class(&self) -> Option<GestureClass> {
        GestureClass::from_label(&self.label)
    }
}

/// Normalized hand landmark (x, y in [0, 1] image space, z relative depth)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Landmark {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Landmark {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Landmark { x, y, z }
    }

    /// Project onto a surface of the given pixel size
    pub fn to_pixels(self, width: u32, height: u32) -> (f32, f32) {
        (self.x * width as f32, self.y * height as f32)
    }
}

/// Points per tracked hand
pub const LANDMARKS_PER_HAND: usize = 21;

/// Skeleton edges drawn between landmark indices
pub const HAND_CONNECTIONS: [(usize, usize); 24] = [
    // thumb
    (0, 1),
    (1, 2),
    (2, 3),
    (3, 4),
    // index
    (0, 5),
    (5, 6),
    (6, 7),
    (7, 8),
    // middle
    (0, 9),
    (9, 10),
    (10, 11),
    (11, 12),
    // ring
    (0, 13),
    (13, 14),
    (14, 15),
    (15, 16),
    // pinky
    (0, 17),
    (17, 18),
    (18, 19),
    (19, 20),
    // palm
    (0, 5),
    (5, 9),
    (9, 13),
    (13, 17),
];

/// Landmark points for one hand
#[derive(Clone, Debug, Default, PartialEq)]
pub struct HandLandmarks {
    pub points: Vec<Landmark>,
}

impl HandLandmarks {
    pub fn new(points: Vec<Landmark>) -> Self {
        HandLandmarks { points }
    }

    /// Skeleton segments whose endpoints are both present
    pub fn segments(&self) -> impl Iterator<Item = (Landmark, Landmark)> + '_ {
        HAND_CONNECTIONS
            .iter()
            .filter_map(|&(a, b)| Some((*self.points.get(a)?, *self.points.get(b)?)))
    }
}

/// Raw per-frame engine output
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Classification {
    /// Ranked guesses, in engine order
    pub gestures: Vec<GestureCandidate>,
    /// One point set per detected hand
    pub landmarks: Vec<HandLandmarks>,
}

impl Classification {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Single-candidate result
    pub fn single(label: impl Into<String>, confidence: f32) -> Self {
        Classification {
            gestures: vec![GestureCandidate::new(label, confidence)],
            landmarks: Vec::new(),
        }
    }

    pub fn with_landmarks(mut self, landmarks: Vec<HandLandmarks>) -> Self {
        self.landmarks = landmarks;
        self
    }

    /// Highest-confidence candidate; ties keep the engine's order
    pub fn top_candidate(&self) -> Option<&GestureCandidate> {
        let mut best: Option<&GestureCandidate> = None;
        for candidate in &self.gestures {
            match best {
                Some(current) if candidate.confidence <= current.confidence => {}
                _ => best = Some(candidate),
            }
        }
        best
    }

    pub fn has_hands(&self) -> bool {
        !self.landmarks.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_label_normalization() {
        assert_eq!(GestureClass::from_label("Thumb_Up"), Some(GestureClass::Positive));
        assert_eq!(GestureClass::from_label("Thumb_Down"), Some(GestureClass::Negative));
        assert_eq!(GestureClass::from_label("Open_Palm"), None);
        assert_eq!(GestureClass::from_label("None"), None);
        assert_eq!(GestureClass::from_label("thumb_up"), None);
    }

    #[test]
    fn test_top_candidate_highest_confidence() {
        let c = Classification {
            gestures: vec![
                GestureCandidate::new("Open_Palm", 0.4),
                GestureCandidate::new("Thumb_Down", 0.9),
                GestureCandidate::new("Thumb_Up", 0.5),
            ],
            landmarks: Vec::new(),
        };
        assert_eq!(c.top_candidate().map(|g| g.label.as_str()), Some("Thumb_Down"));
    }

    #[test]
    fn test_top_candidate_tie_keeps_engine_order() {
        let c = Classification {
            gestures: vec![
                GestureCandidate::new("Thumb_Up", 0.7),
                GestureCandidate::new("Thumb_Down", 0.7),
            ],
            landmarks: Vec::new(),
        };
        assert_eq!(c.top_candidate().map(|g| g.label.as_str()), Some("Thumb_Up"));
    }

    #[test]
    fn test_empty_classification() {
        assert!(Classification::empty().top_candidate().is_none());
        assert!(!Classification::empty().has_hands());
    }

    #[test]
    fn test_segments_skip_missing_points() {
        let full = HandLandmarks::new(vec![Landmark::default(); LANDMARKS_PER_HAND]);
        assert_eq!(full.segments().count(), HAND_CONNECTIONS.len());

        // Only wrist + thumb present
        let partial = HandLandmarks::new(vec![Landmark::default(); 5]);
        assert_eq!(partial.segments().count(), 4);
    }

    #[test]
    fn test_landmark_projection() {
        let p = Landmark::new(0.5, 0.25, 0.0);
        assert_eq!(p.to_pixels(640, 480), (320.0, 120.0));
    }

    fn label() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just(LABEL_THUMB_UP),
            Just(LABEL_THUMB_DOWN),
            Just("Open_Palm"),
            Just("None"),
        ]
    }

    proptest! {
        #[test]
        fn prop_top_candidate_is_first_maximum(
            gestures in prop::collection::vec((label(), 0u8..=10), 0..8),
        ) {
            let c = Classification {
                gestures: gestures
                    .iter()
                    .map(|&(label, score)| GestureCandidate::new(label, f32::from(score) / 10.0))
                    .collect(),
                landmarks: Vec::new(),
            };

            match c.top_candidate() {
                None => prop_assert!(c.gestures.is_empty()),
                Some(top) => {
                    let first_max = c
                        .gestures
                        .iter()
                        .position(|g| c.gestures.iter().all(|o| o.confidence <= g.confidence));
                    prop_assert!(std::ptr::eq(top, &c.gestures[first_max.unwrap()]));
                }
            }
        }
    }
}
