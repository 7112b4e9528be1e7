//! # NetCopy - Verified SCP File Transfer for Network Devices
//!
//! NetCopy copies a single file to or from a network device over SCP and
//! uses MD5 to decide whether the copy is needed and whether it succeeded.
//!
//! ## Features
//!
//! - **Skip if identical**: no copy when both sides already hash the same
//! - **Space check**: the receiving side must have room before copying
//! - **Post-transfer verification**: MD5 of both sides compared afterwards
//! - **Scoped sessions**: the SSH session is released on every exit path
//! - **File system autodetection**: `flash:`, `bootflash:`, ... from `dir`
//! - **Pluggable transport**: anything implementing [`TransferChannel`]
//!
//! ## Quick Start
//!
//! ```no_run
//! use netcopy::channel::ScpChannel;
//! use netcopy::config::RemoteConfig;
//! use netcopy::transfer::{FileCopy, TransferRequest};
//!
//! let config = RemoteConfig::new("rtr1.example.net", "admin");
//! let channel = ScpChannel::new(config);
//!
//! let request = TransferRequest::upload("ios.bin", "ios.bin");
//! let mut copy = FileCopy::new(request, channel).unwrap();
//!
//! let outcome = copy.put_file().unwrap();
//! println!("{:?}", outcome);
//! ```
//!
//! ## Testing Host Drivers
//!
//! ```
//! use netcopy::channel::MemoryChannel;
//! use netcopy::transfer::{FileCopy, TransferRequest};
//!
//! let channel = MemoryChannel::new().with_local_file("cfg.txt", b"hostname r1".to_vec());
//! let request = TransferRequest::upload("cfg.txt", "cfg.txt").with_file_system("flash:");
//! let mut copy = FileCopy::new(request, channel).unwrap();
//!
//! assert!(copy.put_file().unwrap().is_transferred());
//! assert!(copy.put_file().unwrap().is_skipped());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod channel;
pub mod config;
pub mod error;
pub mod fs;
pub mod hash;
pub mod progress;
pub mod transfer;

// Re-export commonly used types
pub use channel::{ChannelSession, MemoryChannel, ScpChannel, TransferChannel};
pub use config::{Direction, RemoteConfig};
pub use error::{FileCopyError, Result};
pub use transfer::{FileCopy, Outcome, TransferPolicy, TransferReport, TransferRequest};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Prelude module for convenient imports
pub mod prelude {
    //! Convenient re-exports for common usage
    //!
    //! ```no_run
    //! use netcopy::prelude::*;
    //! ```

    pub use crate::channel::{ChannelSession, MemoryChannel, ScpChannel, TransferChannel};
    pub use crate::config::{Direction, RemoteConfig};
    pub use crate::error::{FileCopyError, Result};
    pub use crate::hash::{hash_file, Md5Digest};
    pub use crate::progress::ProgressReporter;
    pub use crate::transfer::{FileCopy, Outcome, TransferPolicy, TransferReport, TransferRequest};
}
