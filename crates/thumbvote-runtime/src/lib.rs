//! THUMBVOTE Runtime - Session controller and capture loop
//!
//! This crate wires the pure confirmation logic to the outside world:
//! - Engine, camera and surface seams (`Recognizer`, `Camera`, `Surface`)
//! - The session controller: modes, tally, confirmation/cooldown sequencing
//! - The capture/render loop with its startup and teardown lifecycle
//! - The tick-driven application driver
//! - Configuration and structured logging

pub mod adapter;
pub mod app;
pub mod capture;
pub mod config;
pub mod controller;
pub mod frame_loop;
pub mod logging;

pub use adapter::*;
pub use app::*;
pub use capture::*;
pub use config::*;
pub use controller::*;
pub use frame_loop::*;
pub use logging::{init as init_logging, LogFormat, LoggingError};
