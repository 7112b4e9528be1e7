//! Transfer requests and path resolution

use crate::config::Direction;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::path::{Path, PathBuf};

/// One file, one direction
///
/// The device side is a file name on the device and the control side a
/// path on this machine. For an upload the control-side path is the source;
/// for a download it is the destination. Requests are immutable;
/// [`TransferRequest::with_file_system`] returns a new value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferRequest {
    device_file: String,
    local_file: PathBuf,
    direction: Direction,
    file_system: Option<String>,
}

impl TransferRequest {
    /// Create a request from its device-side and control-side files
    pub fn new(
        device_file: impl Into<String>,
        local_file: impl Into<PathBuf>,
        direction: Direction,
    ) -> Self {
        Self {
            device_file: device_file.into(),
            local_file: local_file.into(),
            direction,
            file_system: None,
        }
    }

    /// Control machine to device
    pub fn upload(source: impl AsRef<Path>, dest: impl Into<String>) -> Self {
        Self::new(dest, source.as_ref(), Direction::Upload)
    }

    /// Device to control machine
    pub fn download(source: impl Into<String>, dest: impl AsRef<Path>) -> Self {
        Self::new(source, dest.as_ref(), Direction::Download)
    }

    /// Same request on an explicit device file system
    pub fn with_file_system(self, file_system: impl Into<String>) -> Self {
        Self {
            file_system: Some(file_system.into()),
            ..self
        }
    }

    /// Device file name as given
    pub fn device_file(&self) -> &str {
        &self.device_file
    }

    /// Control-machine path as given
    pub fn local_file(&self) -> &Path {
        &self.local_file
    }

    /// Source, for display
    pub fn source(&self) -> Cow<'_, str> {
        match self.direction {
            Direction::Upload => self.local_file.to_string_lossy(),
            Direction::Download => Cow::Borrowed(&self.device_file),
        }
    }

    /// Destination, for display
    pub fn dest(&self) -> Cow<'_, str> {
        match self.direction {
            Direction::Upload => Cow::Borrowed(&self.device_file),
            Direction::Download => self.local_file.to_string_lossy(),
        }
    }

    /// Configured direction
    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Explicit device file system, if any
    pub fn file_system(&self) -> Option<&str> {
        self.file_system.as_deref()
    }

    /// Device-side and control-side paths on `file_system`
    pub fn resolve(&self, file_system: &str) -> TransferPaths {
        TransferPaths {
            remote: device_path(file_system, &self.device_file),
            local: self.local_file.clone(),
        }
    }
}

/// The device-side and control-side file of a transfer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPaths {
    /// File on the device (destination for uploads, source for downloads)
    pub remote: String,
    /// File on the control machine (source for uploads, destination for downloads)
    pub local: PathBuf,
}

/// Join a device file name onto a file system root
///
/// Names that already carry a file system prefix are used as given.
pub fn device_path(file_system: &str, name: &str) -> String {
    if name.contains(':') || file_system.is_empty() {
        return name.to_string();
    }

    let name = name.trim_start_matches('/');
    if file_system.ends_with(':') || file_system.ends_with('/') {
        format!("{}{}", file_system, name)
    } else {
        format!("{}/{}", file_system, name)
    }
}
