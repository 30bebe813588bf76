//! Camera, video stream and drawing surface seams
//!
//! The loop never talks to a device directly. A `Camera` yields a
//! `VideoStream`; the stream hands out the current frame; a `Surface` draws
//! it. Hosts plug in real media; tests plug in simulations.

use std::future::Future;
use std::sync::Arc;

use serde::Deserialize;
use thumbvote_core::{CameraAccessError, HandLandmarks};

/// Pixel dimensions of a frame or surface
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Dimensions { width, height }
    }

    /// Either side is zero
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

impl std::fmt::Display for Dimensions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// How much media a stream has buffered
///
/// Ordered so that comparisons read naturally: a stream can be drawn once it
/// reaches `CurrentData`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ReadyState {
    #[default]
    Nothing,
    Metadata,
    CurrentData,
    FutureData,
    EnoughData,
}

impl ReadyState {
    #[inline]
    pub fn has_current_frame(self) -> bool {
        self >= ReadyState::CurrentData
    }
}

/// One decoded video frame
///
/// Pixel storage is shared; cloning a frame is cheap.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VideoFrame {
    pub dimensions: Dimensions,
    /// Monotonic frame counter assigned by the stream
    pub sequence: u64,
    pub pixels: Arc<[u8]>,
}

impl VideoFrame {
    pub fn new(dimensions: Dimensions, sequence: u64, pixels: impl Into<Arc<[u8]>>) -> Self {
        VideoFrame {
            dimensions,
            sequence,
            pixels: pixels.into(),
        }
    }

    /// Frame with no pixel payload, for sources that only carry geometry
    pub fn blank(dimensions: Dimensions, sequence: u64) -> Self {
        Self::new(dimensions, sequence, Vec::new())
    }
}

/// Preferred camera orientation
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Facing {
    #[default]
    User,
    Environment,
}

/// Hints passed to `Camera::open`
///
/// Devices may ignore them; the loop sizes the surface from the stream's
/// actual dimensions once metadata is available.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CameraConstraints {
    pub width: u32,
    pub height: u32,
    pub facing: Facing,
}

impl Default for CameraConstraints {
    fn default() -> Self {
        CameraConstraints {
            width: 1280,
            height: 720,
            facing: Facing::User,
        }
    }
}

/// A live camera stream
pub trait VideoStream: Send {
    /// Resolve once the stream has reported its dimensions
    fn wait_ready(&mut self) -> impl Future<Output = Result<Dimensions, CameraAccessError>> + Send;

    fn ready_state(&self) -> ReadyState;

    /// Latest decoded frame, if one is available
    fn current_frame(&mut self) -> Option<VideoFrame>;

    /// Stop every media track. Returns how many were still live.
    fn stop_tracks(&mut self) -> usize;

    fn live_tracks(&self) -> usize;
}

/// Source of camera streams
pub trait Camera: Send {
    type Stream: VideoStream;

    /// Request camera media
    fn open(
        &mut self,
        constraints: &CameraConstraints,
    ) -> impl Future<Output = Result<Self::Stream, CameraAccessError>> + Send;
}

/// Identifies a registered viewport listener
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(pub u64);

/// Drawing target for the mirrored preview and landmark overlay
pub trait Surface: Send {
    /// Match the backing store to the source dimensions
    fn resize(&mut self, dimensions: Dimensions);

    fn dimensions(&self) -> Dimensions;

    /// Draw the frame mirrored, filling the surface
    fn draw_frame(&mut self, frame: &VideoFrame);

    /// Overlay hand landmarks (mirrored to match the preview)
    fn draw_landmarks(&mut self, hands: &[HandLandmarks]);

    /// Start receiving viewport resize notifications
    fn add_viewport_listener(&mut self) -> ListenerId;

    /// Stop receiving them. Returns false if `id` was not registered.
    fn remove_viewport_listener(&mut self, id: ListenerId) -> bool;
}
