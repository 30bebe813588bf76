//! THUMBVOTE Test Harness - Simulation and chaos testing
//!
//! This crate provides:
//! - Simulated recognition engine, camera and drawing surface
//! - Resource ledgers for lifecycle checks
//! - Seeded flicker chaos for the confirmation machine
//! - End-to-end scenario harness over a scripted tick source

pub mod simulator;
pub mod chaos;
pub mod harness;

pub use simulator::*;
pub use chaos::*;
pub use harness::*;
