//! File transfer module
//!
//! Verified single-file copies between the control machine and a device:
//! - [`TransferRequest`]: what to copy, and in which direction
//! - [`TransferPolicy`]: skip-if-identical, space check, copy, verify
//! - [`FileCopy`]: driver-facing `put_file` / `get_file` entry points

mod file_copy;
mod policy;
mod request;

pub use file_copy::*;
pub use policy::*;
pub use request::*;
