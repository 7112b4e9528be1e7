//! Hash computation and integrity verification module
//!
//! Provides MD5 digests in the lowercase hex form network devices print,
//! with streaming support for hashing data while it is transferred.

mod integrity;

pub use integrity::*;
