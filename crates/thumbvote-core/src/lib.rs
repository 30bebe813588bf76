//! THUMBVOTE Core - Fundamental types and primitives
//!
//! This crate defines the core types shared by every layer:
//! - Monotonic time (Timestamp)
//! - Gesture classes, classifier output and frame observations
//! - Session modes, vote tally and the rendering snapshot
//! - The error taxonomy

pub mod time;
pub mod gesture;
pub mod session;
pub mod error;

pub use time::*;
pub use gesture::*;
pub use session::*;
pub use error::*;
