//! Configuration module for NetCopy
//!
//! Provides configuration management including CLI arguments,
//! device profiles, and connection settings.

mod settings;

pub use settings::*;
