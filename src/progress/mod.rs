//! Progress reporting module
//!
//! Provides real-time progress visualization for SCP transfers
//! with throughput and ETA display.

mod reporter;

pub use reporter::*;
