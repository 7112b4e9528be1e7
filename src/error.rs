//! Error types for NetCopy
//!
//! This module defines all error types used throughout the crate. Transfer
//! policy failures (direction, space, verification) are kept apart from the
//! transport failures that the SSH channel surfaces unchanged.

use crate::config::Direction;
use std::path::PathBuf;
use thiserror::Error;

/// Main error type for NetCopy operations
#[derive(Error, Debug)]
pub enum FileCopyError {
    /// The invoked operation does not match the configured direction
    #[error("Attempting {attempted}, but transfer direction is set to {configured}")]
    DirectionMismatch {
        attempted: Direction,
        configured: Direction,
    },

    /// Receiving side does not have room for the file
    #[error("Insufficient space available on {location}: need {required} bytes, have {available} bytes")]
    InsufficientSpace {
        location: String,
        required: u64,
        available: u64,
    },

    /// Post-transfer MD5 comparison failed
    #[error("File transferred, but MD5 does not match for '{path}': remote {remote}, local {local}")]
    VerificationFailed {
        path: String,
        remote: String,
        local: String,
    },

    /// Network/SSH connection error
    #[error("Connection error to '{host}': {message}")]
    Connection { host: String, message: String },

    /// SSH authentication failed
    #[error("SSH authentication failed for '{user}@{host}': {message}")]
    Authentication {
        user: String,
        host: String,
        message: String,
    },

    /// A device command could not be executed
    #[error("Remote command '{command}' failed: {message}")]
    RemoteCommand { command: String, message: String },

    /// Device command produced output we could not interpret
    #[error("Unexpected output from '{command}': {output}")]
    UnexpectedOutput { command: String, output: String },

    /// Remote transfer error
    #[error("Remote transfer error: {0}")]
    RemoteTransfer(String),

    /// Device operation attempted without an open session
    #[error("Transfer channel is not connected")]
    NotConnected,

    /// I/O error on the control machine
    #[error("I/O error at '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Malformed MD5 digest
    #[error("Invalid MD5 digest: {0}")]
    InvalidDigest(String),

    /// File or directory not found
    #[error("Path not found: {0}")]
    NotFound(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl FileCopyError {
    /// Create an I/O error with path context
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create a connection error
    pub fn connection(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Connection {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create an authentication error
    pub fn auth(
        user: impl Into<String>,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Authentication {
            user: user.into(),
            host: host.into(),
            message: message.into(),
        }
    }

    /// Create a remote command error
    pub fn command(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RemoteCommand {
            command: command.into(),
            message: message.into(),
        }
    }

    /// Create an unexpected output error
    pub fn unexpected_output(command: impl Into<String>, output: impl Into<String>) -> Self {
        Self::UnexpectedOutput {
            command: command.into(),
            output: output.into(),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Check if this error came from the transport rather than the policy
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::Authentication { .. }
                | Self::RemoteCommand { .. }
                | Self::UnexpectedOutput { .. }
                | Self::RemoteTransfer(_)
                | Self::NotConnected
                | Self::Io { .. }
        )
    }

    /// Check if a caller retry has a chance of succeeding
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Self::Connection { .. }
                | Self::RemoteCommand { .. }
                | Self::RemoteTransfer(_)
                | Self::Io { .. }
                | Self::VerificationFailed { .. }
        )
    }
}

/// Result type alias for NetCopy operations
pub type Result<T> = std::result::Result<T, FileCopyError>;

impl From<serde_json::Error> for FileCopyError {
    fn from(err: serde_json::Error) -> Self {
        FileCopyError::Config(err.to_string())
    }
}

/// Extension trait for adding path context to std::io::Result
pub trait IoResultExt<T> {
    /// Add path context to an I/O error
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoResultExt<T> for std::io::Result<T> {
    fn with_path(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|e| FileCopyError::io(path, e))
    }
}
