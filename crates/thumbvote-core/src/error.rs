//! Error types for THUMBVOTE
//!
//! Fatal-to-session: `EngineInitError`, `CameraAccessError`.
//! Recovered per frame: `ClassificationError`.

use thiserror::Error;

use crate::{GestureClass, SessionMode};

pub const ENGINE_INIT_MESSAGE: &str =
    "Failed to load gesture recognition model. Please try again later.";
pub const CAMERA_ACCESS_MESSAGE: &str =
    "Could not access camera. Please ensure you have granted camera permissions.";

/// The recognition engine could not be created
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Engine initialization failed: {0}")]
pub struct EngineInitError(pub String);

/// Camera media could not be acquired or never became ready
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CameraAccessError {
    #[error("Camera permission denied")]
    PermissionDenied,

    #[error("No camera device available")]
    NoDevice,

    #[error("Camera stream ended before metadata was available")]
    StreamEnded,

    #[error("Camera error: {0}")]
    Other(String),
}

/// A single frame failed to classify
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Classification failed: {0}")]
pub struct ClassificationError(pub String);

/// Invalid configuration value
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{field} must be strictly positive")]
    NonPositiveDuration { field: &'static str },

    #[error("Invalid duration for {field}: {value}")]
    InvalidDuration { field: &'static str, value: String },

    #[error("min_confidence must be within [0, 1], got {0}")]
    ConfidenceOutOfRange(f32),

    #[error("num_hands must be 1, got {0}")]
    UnsupportedHandCount(u8),

    #[error("Invalid value for {field}: {value}")]
    InvalidValue { field: &'static str, value: String },

    #[error("Malformed configuration: {0}")]
    Malformed(String),
}

/// Why a manual fallback trigger was refused
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerRejected {
    #[error("Manual trigger is only available in error mode (current: {0})")]
    WrongMode(SessionMode),

    #[error("A {0} hold is already animating")]
    AlreadyAnimating(GestureClass),

    #[error("A vote is being confirmed")]
    Confirming,
}

/// Errors that end the recognizing session
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error(transparent)]
    EngineInit(#[from] EngineInitError),

    #[error(transparent)]
    CameraAccess(#[from] CameraAccessError),
}

impl SessionError {
    /// Text shown on the error overlay
    pub fn user_message(&self) -> &'static str {
        match self {
            SessionError::EngineInit(_) => ENGINE_INIT_MESSAGE,
            SessionError::CameraAccess(_) => CAMERA_ACCESS_MESSAGE,
        }
    }
}

/// Core THUMBVOTE errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum VoteError {
    #[error(transparent)]
    Session(#[from] SessionError),

    #[error(transparent)]
    Classification(#[from] ClassificationError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Trigger(#[from] TriggerRejected),
}

impl From<EngineInitError> for VoteError {
    fn from(e: EngineInitError) -> Self {
        VoteError::Session(e.into())
    }
}

impl From<CameraAccessError> for VoteError {
    fn from(e: CameraAccessError) -> Self {
        VoteError::Session(e.into())
    }
}

/// Result type for THUMBVOTE operations
pub type VoteResult<T> = Result<T, VoteError>;
