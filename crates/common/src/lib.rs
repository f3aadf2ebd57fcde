//! Subsync Common Utilities
//!
//! Shared infrastructure for all subsync crates:
//! - Error types and result aliases
//! - Presentation-clock conversion and frame budget measurement
//! - Tracing/logging initialization
//! - Configuration loading

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
