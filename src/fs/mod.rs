//! File system operations module
//!
//! Local-side queries used by transfer channels: file size, existence
//! and free space on the control machine.

mod operations;

pub use operations::*;
