//! THUMBVOTE Time - Clocks, tick scheduling and delayed tasks
//!
//! This crate implements the temporal plumbing of the session:
//! - Monotonic and manual clocks sharing one time base
//! - Tick sources (real interval-driven and scripted deterministic)
//! - Liveness generations for cancelling stale continuations
//! - A deadline-ordered queue for delayed tally/cooldown tasks

pub mod clock;
pub mod tick;
pub mod liveness;
pub mod timer;

pub use clock::*;
pub use tick::*;
pub use liveness::*;
pub use timer::*;
