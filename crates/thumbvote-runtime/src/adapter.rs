//! Recognition engine seam and its lifecycle slot

use std::future::Future;

use serde::Deserialize;
use thumbvote_core::{Classification, ClassificationError, ConfigError, EngineInitError, Timestamp};
use tracing::{debug, info};

use crate::VideoFrame;

/// Hosted gesture recognizer model (float16, v1)
pub const DEFAULT_MODEL_ASSET_PATH: &str = "https://storage.googleapis.com/mediapipe-models/gesture_recognizer/gesture_recognizer/float16/1/gesture_recognizer.task";

/// Compute delegate requested from the engine
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Delegate {
    #[default]
    Gpu,
    Cpu,
}

impl std::str::FromStr for Delegate {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gpu" => Ok(Delegate::Gpu),
            "cpu" => Ok(Delegate::Cpu),
            _ => Err(ConfigError::InvalidValue {
                field: "delegate",
                value: s.to_string(),
            }),
        }
    }
}

/// Engine creation parameters
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    pub delegate: Delegate,
    /// Hands tracked per frame; only one is supported
    pub num_hands: u8,
    pub model_asset_path: String,
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_hands != 1 {
            return Err(ConfigError::UnsupportedHandCount(self.num_hands));
        }
        if self.model_asset_path.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "model_asset_path",
                value: self.model_asset_path.clone(),
            });
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            delegate: Delegate::Gpu,
            num_hands: 1,
            model_asset_path: DEFAULT_MODEL_ASSET_PATH.to_string(),
        }
    }
}

/// A loaded recognition engine
pub trait Recognizer: Send {
    /// Classify one frame
    ///
    /// `timestamp` is strictly increasing across calls on the same engine.
    fn classify(
        &mut self,
        frame: &VideoFrame,
        timestamp: Timestamp,
    ) -> Result<Classification, ClassificationError>;

    /// Release engine resources. Called at most once.
    fn close(&mut self);
}

/// Asynchronous engine factory
pub trait RecognizerLoader: Send {
    type Engine: Recognizer;

    fn load(
        &mut self,
        config: &EngineConfig,
    ) -> impl Future<Output = Result<Self::Engine, EngineInitError>> + Send;
}

/// Engine lifecycle
///
/// `Unloaded -> Loading -> Ready | Failed`, and back to `Unloaded` on
/// release. A ready engine is closed exactly once.
#[derive(Debug)]
pub enum EngineSlot<E> {
    Unloaded,
    Loading,
    Ready(E),
    Failed(EngineInitError),
}

impl<E> Default for EngineSlot<E> {
    fn default() -> Self {
        EngineSlot::Unloaded
    }
}

impl<E: Recognizer> EngineSlot<E> {
    pub fn begin_loading(&mut self) {
        self.release();
        *self = EngineSlot::Loading;
    }

    pub fn install(&mut self, engine: E) {
        self.release();
        *self = EngineSlot::Ready(engine);
    }

    pub fn fail(&mut self, err: EngineInitError) {
        self.release();
        *self = EngineSlot::Failed(err);
    }

    pub fn ready_mut(&mut self) -> Option<&mut E> {
        match self {
            EngineSlot::Ready(engine) => Some(engine),
            _ => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, EngineSlot::Ready(_))
    }

    pub fn name(&self) -> &'static str {
        match self {
            EngineSlot::Unloaded => "unloaded",
            EngineSlot::Loading => "loading",
            EngineSlot::Ready(_) => "ready",
            EngineSlot::Failed(_) => "failed",
        }
    }

    /// Close a ready engine and return to `Unloaded`
    ///
    /// Returns true if an engine was closed.
    pub fn release(&mut self) -> bool {
        match std::mem::take(self) {
            EngineSlot::Ready(mut engine) => {
                engine.close();
                info!("recognition engine closed");
                true
            }
            previous => {
                debug!(state = previous.name(), "engine slot released");
                false
            }
        }
    }
}
