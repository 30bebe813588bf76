//! THUMBVOTE Gesture - Hold debouncing and vote confirmation
//!
//! This crate implements the confirmation layer:
//! - Reduction of engine output to one observation per frame
//! - The hold state and its derived progress
//! - The confirmation state machine (exactly one vote per satisfied hold)
//! - The manual fallback trigger sharing the same hold contract

pub mod hold;
pub mod machine;
pub mod reduce;
pub mod fallback;

pub use hold::*;
pub use machine::*;
pub use reduce::*;
pub use fallback::*;
