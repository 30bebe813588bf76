//! Simulated engine, camera and surface
//!
//! Deterministic stand-ins for the media stack. What the simulated hand does
//! is described by a `GestureScript`; resource acquisition and release are
//! counted in a shared `ResourceLedger` so tests can check the lifecycle after
//! the app has taken ownership of everything.

use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use thumbvote_core::{
    CameraAccessError, Classification, ClassificationError, EngineInitError, GestureCandidate,
    GestureClass, HandLandmarks, Landmark, Timestamp, LANDMARKS_PER_HAND,
};
use thumbvote_runtime::{
    Camera, CameraConstraints, Dimensions, EngineConfig, ListenerId, ReadyState, Recognizer,
    RecognizerLoader, Surface, VideoFrame, VideoStream,
};
use thumbvote_time::Liveness;

// ============================================================================
// GESTURE SCRIPT
// ============================================================================

/// What the engine reports for a frame
#[derive(Clone, Debug, PartialEq)]
pub enum FrameOutcome {
    /// A thumb gesture with the given confidence
    Gesture(GestureClass, f32),
    /// A hand making some other gesture ("Open_Palm", "None", ...)
    Other(&'static str),
    /// No hand in view
    NoHand,
    /// The engine errors on this frame
    Fail,
}

impl FrameOutcome {
    pub fn thumb_up() -> Self {
        FrameOutcome::Gesture(GestureClass::Positive, 0.9)
    }

    pub fn thumb_down() -> Self {
        FrameOutcome::Gesture(GestureClass::Negative, 0.9)
    }

    pub fn classify(&self) -> Result<Classification, ClassificationError> {
        match self {
            FrameOutcome::Gesture(class, confidence) => {
                Ok(Classification::single(class.label(), *confidence).with_landmarks(vec![open_hand()]))
            }
            FrameOutcome::Other(label) => Ok(Classification {
                gestures: vec![GestureCandidate::new(*label, 0.8)],
                landmarks: vec![open_hand()],
            }),
            FrameOutcome::NoHand => Ok(Classification::empty()),
            FrameOutcome::Fail => Err(ClassificationError("simulated engine fault".into())),
        }
    }
}

/// Piecewise-constant timeline of frame outcomes
///
/// The outcome at `t` is the last segment starting at or before `t`; before
/// the first segment no hand is in view.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct GestureScript {
    segments: Vec<(Timestamp, FrameOutcome)>,
}

impl GestureScript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Switch to `outcome` at `at_ms`
    pub fn at(mut self, at_ms: u64, outcome: FrameOutcome) -> Self {
        let at = Timestamp::from_millis(at_ms);
        let pos = self.segments.partition_point(|(t, _)| *t <= at);
        self.segments.insert(pos, (at, outcome));
        self
    }

    /// The same outcome forever
    pub fn constant(outcome: FrameOutcome) -> Self {
        Self::new().at(0, outcome)
    }

    pub fn outcome_at(&self, t: Timestamp) -> FrameOutcome {
        let idx = self.segments.partition_point(|(start, _)| *start <= t);
        match idx {
            0 => FrameOutcome::NoHand,
            i => self.segments[i - 1].1.clone(),
        }
    }
}

fn open_hand() -> HandLandmarks {
    HandLandmarks::new(
        (0..LANDMARKS_PER_HAND)
            .map(|i| Landmark::new(0.3 + i as f32 * 0.01, 0.4 + i as f32 * 0.015, 0.0))
            .collect(),
    )
}

// ============================================================================
// RESOURCE LEDGER
// ============================================================================

/// Lifecycle counters
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResourceCounts {
    pub loads: u64,
    pub engines_created: u64,
    pub engines_closed: u64,
    pub classifications: u64,
    pub streams_opened: u64,
    pub tracks_stopped: u64,
    pub listeners_added: u64,
    pub listeners_removed: u64,
}

impl ResourceCounts {
    /// Every engine created was closed
    pub fn engines_balanced(&self) -> bool {
        self.engines_created == self.engines_closed
    }
}

/// Shared view of the simulated resources
#[derive(Clone, Debug, Default)]
pub struct ResourceLedger {
    counts: Arc<Mutex<ResourceCounts>>,
    engine_timestamps: Arc<Mutex<Vec<Timestamp>>>,
}

impl ResourceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn counts(&self) -> ResourceCounts {
        *self.counts.lock()
    }

    /// Timestamps the engine was invoked with, in call order
    pub fn engine_timestamps(&self) -> Vec<Timestamp> {
        self.engine_timestamps.lock().clone()
    }

    fn update(&self, f: impl FnOnce(&mut ResourceCounts)) {
        f(&mut *self.counts.lock());
    }
}

// ============================================================================
// ENGINE
// ============================================================================

pub struct SimulatedRecognizer {
    script: GestureScript,
    ledger: ResourceLedger,
    closed: bool,
}

impl Recognizer for SimulatedRecognizer {
    fn classify(
        &mut self,
        _frame: &VideoFrame,
        timestamp: Timestamp,
    ) -> Result<Classification, ClassificationError> {
        if self.closed {
            return Err(ClassificationError("engine closed".into()));
        }
        self.ledger.update(|c| c.classifications += 1);
        self.ledger.engine_timestamps.lock().push(timestamp);
        self.script.outcome_at(timestamp).classify()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.ledger.update(|c| c.engines_closed += 1);
        }
    }
}

/// Engine factory with configurable failure and timing
pub struct SimulatedLoader {
    script: GestureScript,
    ledger: ResourceLedger,
    failure: Option<String>,
    delay: Option<Duration>,
    /// Torn down while the load is in flight
    unmount_during_load: Option<Liveness>,
}

impl SimulatedLoader {
    pub fn new(script: GestureScript, ledger: ResourceLedger) -> Self {
        SimulatedLoader {
            script,
            ledger,
            failure: None,
            delay: None,
            unmount_during_load: None,
        }
    }

    pub fn failing(mut self, reason: impl Into<String>) -> Self {
        self.failure = Some(reason.into());
        self
    }

    /// Change the load latency of an already-built loader
    pub fn set_delay(&mut self, delay: Option<Duration>) {
        self.delay = delay;
    }

    pub fn unmount_during_load(&mut self, liveness: Liveness) {
        self.unmount_during_load = Some(liveness);
    }
}

impl RecognizerLoader for SimulatedLoader {
    type Engine = SimulatedRecognizer;

    async fn load(&mut self, _config: &EngineConfig) -> Result<SimulatedRecognizer, EngineInitError> {
        self.ledger.update(|c| c.loads += 1);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if let Some(liveness) = &self.unmount_during_load {
            liveness.invalidate();
        }
        if let Some(reason) = &self.failure {
            return Err(EngineInitError(reason.clone()));
        }

        self.ledger.update(|c| c.engines_created += 1);
        Ok(SimulatedRecognizer {
            script: self.script.clone(),
            ledger: self.ledger.clone(),
            closed: false,
        })
    }
}

// ============================================================================
// CAMERA
// ============================================================================

/// How the simulated camera responds to `open`
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CameraBehavior {
    /// Stream at `dimensions`, reporting `warmup_frames` not-ready polls first
    Grant {
        dimensions: Dimensions,
        tracks: usize,
        warmup_frames: u32,
    },
    /// Access refused
    Deny(CameraAccessError),
    /// Stream opens but never delivers metadata
    NeverReady,
}

impl Default for CameraBehavior {
    fn default() -> Self {
        CameraBehavior::Grant {
            dimensions: Dimensions::new(640, 480),
            tracks: 1,
            warmup_frames: 0,
        }
    }
}

pub struct SimulatedCamera {
    behavior: CameraBehavior,
    ledger: ResourceLedger,
    unmount_during_open: Option<Liveness>,
}

impl SimulatedCamera {
    pub fn new(behavior: CameraBehavior, ledger: ResourceLedger) -> Self {
        SimulatedCamera {
            behavior,
            ledger,
            unmount_during_open: None,
        }
    }

    pub fn unmount_during_open(&mut self, liveness: Liveness) {
        self.unmount_during_open = Some(liveness);
    }
}

impl Camera for SimulatedCamera {
    type Stream = SimulatedStream;

    async fn open(
        &mut self,
        _constraints: &CameraConstraints,
    ) -> Result<SimulatedStream, CameraAccessError> {
        if let Some(liveness) = &self.unmount_during_open {
            liveness.invalidate();
        }
        let (dimensions, tracks, warmup, never_ready) = match &self.behavior {
            CameraBehavior::Deny(err) => return Err(err.clone()),
            CameraBehavior::Grant {
                dimensions,
                tracks,
                warmup_frames,
            } => (*dimensions, *tracks, *warmup_frames, false),
            CameraBehavior::NeverReady => (Dimensions::default(), 1, 0, true),
        };

        self.ledger.update(|c| c.streams_opened += 1);
        Ok(SimulatedStream {
            dimensions,
            live_tracks: tracks,
            warmup: Cell::new(warmup),
            never_ready,
            sequence: 0,
            ledger: self.ledger.clone(),
        })
    }
}

pub struct SimulatedStream {
    dimensions: Dimensions,
    live_tracks: usize,
    warmup: Cell<u32>,
    never_ready: bool,
    sequence: u64,
    ledger: ResourceLedger,
}

impl VideoStream for SimulatedStream {
    async fn wait_ready(&mut self) -> Result<Dimensions, CameraAccessError> {
        if self.never_ready {
            return Err(CameraAccessError::StreamEnded);
        }
        Ok(self.dimensions)
    }

    fn ready_state(&self) -> ReadyState {
        if self.live_tracks == 0 {
            return ReadyState::Nothing;
        }
        match self.warmup.get() {
            0 => ReadyState::EnoughData,
            n => {
                self.warmup.set(n - 1);
                ReadyState::Metadata
            }
        }
    }

    fn current_frame(&mut self) -> Option<VideoFrame> {
        if self.live_tracks == 0 {
            return None;
        }
        self.sequence += 1;
        Some(VideoFrame::blank(self.dimensions, self.sequence))
    }

    fn stop_tracks(&mut self) -> usize {
        let stopped = std::mem::take(&mut self.live_tracks);
        self.ledger.update(|c| c.tracks_stopped += stopped as u64);
        stopped
    }

    fn live_tracks(&self) -> usize {
        self.live_tracks
    }
}

// ============================================================================
// SURFACE
// ============================================================================

/// Surface that records what was drawn
#[derive(Debug, Default)]
pub struct RecordingSurface {
    dimensions: Dimensions,
    pub frames_drawn: u64,
    pub landmark_overlays: u64,
    pub segments_drawn: u64,
    pub resizes: Vec<Dimensions>,
    listeners: Vec<ListenerId>,
    next_listener: u64,
    ledger: ResourceLedger,
}

impl RecordingSurface {
    pub fn new(ledger: ResourceLedger) -> Self {
        RecordingSurface {
            ledger,
            ..Self::default()
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}

impl Surface for RecordingSurface {
    fn resize(&mut self, dimensions: Dimensions) {
        self.dimensions = dimensions;
        self.resizes.push(dimensions);
    }

    fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    fn draw_frame(&mut self, _frame: &VideoFrame) {
        self.frames_drawn += 1;
    }

    fn draw_landmarks(&mut self, hands: &[HandLandmarks]) {
        self.segments_drawn += hands.iter().map(|h| h.segments().count() as u64).sum::<u64>();
        self.landmark_overlays += 1;
    }

    fn add_viewport_listener(&mut self) -> ListenerId {
        self.next_listener += 1;
        let id = ListenerId(self.next_listener);
        self.listeners.push(id);
        self.ledger.update(|c| c.listeners_added += 1);
        id
    }

    fn remove_viewport_listener(&mut self, id: ListenerId) -> bool {
        let Some(pos) = self.listeners.iter().position(|l| *l == id) else {
            return false;
        };
        self.listeners.remove(pos);
        self.ledger.update(|c| c.listeners_removed += 1);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_lookup() {
        let script = GestureScript::new()
            .at(100, FrameOutcome::thumb_up())
            .at(500, FrameOutcome::NoHand)
            .at(300, FrameOutcome::Fail);

        assert_eq!(script.outcome_at(Timestamp::from_millis(50)), FrameOutcome::NoHand);
        assert_eq!(script.outcome_at(Timestamp::from_millis(100)), FrameOutcome::thumb_up());
        assert_eq!(script.outcome_at(Timestamp::from_millis(299)), FrameOutcome::thumb_up());
        assert_eq!(script.outcome_at(Timestamp::from_millis(300)), FrameOutcome::Fail);
        assert_eq!(script.outcome_at(Timestamp::from_millis(9000)), FrameOutcome::NoHand);
    }

    #[test]
    fn test_outcome_classification() {
        let c = FrameOutcome::thumb_down().classify().unwrap();
        assert_eq!(c.top_candidate().and_then(|g| g.class()), Some(GestureClass::Negative));
        assert!(c.has_hands());

        let other = FrameOutcome::Other("Open_Palm").classify().unwrap();
        assert_eq!(other.top_candidate().and_then(|g| g.class()), None);
        assert!(FrameOutcome::Fail.classify().is_err());
    }

    #[test]
    fn test_stream_warmup_and_stop() {
        let ledger = ResourceLedger::new();
        let mut stream = SimulatedStream {
            dimensions: Dimensions::new(320, 240),
            live_tracks: 2,
            warmup: Cell::new(1),
            never_ready: false,
            sequence: 0,
            ledger: ledger.clone(),
        };

        assert_eq!(stream.ready_state(), ReadyState::Metadata);
        assert_eq!(stream.ready_state(), ReadyState::EnoughData);
        assert_eq!(stream.current_frame().map(|f| f.sequence), Some(1));

        assert_eq!(stream.stop_tracks(), 2);
        assert_eq!(stream.stop_tracks(), 0);
        assert_eq!(stream.ready_state(), ReadyState::Nothing);
        assert_eq!(ledger.counts().tracks_stopped, 2);
    }

    #[test]
    fn test_surface_listeners() {
        let ledger = ResourceLedger::new();
        let mut surface = RecordingSurface::new(ledger.clone());
        let id = surface.add_viewport_listener();
        assert_eq!(surface.listener_count(), 1);
        assert!(surface.remove_viewport_listener(id));
        assert!(!surface.remove_viewport_listener(id));
        assert_eq!(ledger.counts().listeners_removed, 1);
    }
}
