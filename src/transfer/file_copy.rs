//! Driver-facing file copy object
//!
//! Binds one [`TransferRequest`] to one channel. The device file system is
//! resolved when the object is built; `put_file` and `get_file` check the
//! configured direction before touching the channel.

use super::policy::{Outcome, TransferPolicy};
use super::request::TransferRequest;
use crate::channel::TransferChannel;
use crate::config::Direction;
use crate::error::{FileCopyError, Result};
use serde::Serialize;
use std::time::Instant;
use tracing::info;

/// A single file transfer to or from a device
pub struct FileCopy<C: TransferChannel> {
    request: TransferRequest,
    channel: C,
    policy: TransferPolicy,
}

impl<C: TransferChannel> FileCopy<C> {
    /// Bind `request` to `channel`, auto-detecting the file system if the
    /// request does not name one
    pub fn new(request: TransferRequest, mut channel: C) -> Result<Self> {
        let request = match request.file_system() {
            Some(_) => request,
            None => {
                let root = channel.autodetect_filesystem_root()?;
                info!(file_system = %root, "Using auto-detected file system");
                request.with_file_system(root)
            }
        };

        Ok(Self {
            request,
            channel,
            policy: TransferPolicy::new(),
        })
    }

    /// The request, with its file system resolved
    pub fn request(&self) -> &TransferRequest {
        &self.request
    }

    /// Resolved device file system
    pub fn file_system(&self) -> &str {
        self.request.file_system().unwrap_or_default()
    }

    /// The underlying channel
    pub fn channel(&self) -> &C {
        &self.channel
    }

    /// Give back the channel
    pub fn into_channel(self) -> C {
        self.channel
    }

    /// Copy the file from the control machine to the device
    pub fn put_file(&mut self) -> Result<Outcome> {
        self.transfer(Direction::Upload)
    }

    /// Copy the file from the device to the control machine
    pub fn get_file(&mut self) -> Result<Outcome> {
        self.transfer(Direction::Download)
    }

    /// Run the transfer in its configured direction and time it
    pub fn run(&mut self) -> Result<TransferReport> {
        let start = Instant::now();
        let outcome = self.transfer(self.request.direction())?;

        Ok(TransferReport {
            direction: self.request.direction(),
            source: self.request.source().into_owned(),
            destination: self.request.dest().into_owned(),
            file_system: self.file_system().to_string(),
            outcome,
            elapsed_ms: start.elapsed().as_millis() as u64,
        })
    }

    fn transfer(&mut self, attempted: Direction) -> Result<Outcome> {
        let configured = self.request.direction();
        if attempted != configured {
            return Err(FileCopyError::DirectionMismatch {
                attempted,
                configured,
            });
        }

        self.policy.execute(&self.request, &mut self.channel)
    }
}

/// Summary of a finished transfer
#[derive(Debug, Clone, Serialize)]
pub struct TransferReport {
    /// Direction of the copy
    pub direction: Direction,
    /// Source as given
    pub source: String,
    /// Destination as given
    pub destination: String,
    /// Device file system used
    pub file_system: String,
    /// What happened
    pub outcome: Outcome,
    /// Wall-clock time in milliseconds
    pub elapsed_ms: u64,
}

impl TransferReport {
    /// Print a human-readable summary
    pub fn print_summary(&self) {
        let action = match &self.outcome {
            Outcome::Skipped { .. } => "Skipped (destination already matches)".to_string(),
            Outcome::Transferred { bytes, .. } => format!(
                "Transferred {}",
                humansize::format_size(*bytes, humansize::BINARY)
            ),
        };

        println!("{} {} -> {}", self.direction, self.source, self.destination);
        println!("File system: {}", self.file_system);
        println!("Result:      {}", action);
        println!("MD5:         {}", self.outcome.md5());
        println!("Elapsed:     {} ms", self.elapsed_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;

    #[test]
    fn test_put_on_download_request_fails_before_io() {
        let request = TransferRequest::download("a.bin", "a.bin").with_file_system("flash:");
        let mut copy = FileCopy::new(request, MemoryChannel::new()).unwrap();

        let err = copy.put_file().unwrap_err();
        assert!(matches!(
            err,
            FileCopyError::DirectionMismatch {
                attempted: Direction::Upload,
                configured: Direction::Download,
            }
        ));
        assert_eq!(copy.channel().stats().connects, 0);
    }

    #[test]
    fn test_get_on_upload_request_fails_before_io() {
        let request = TransferRequest::upload("a.bin", "a.bin").with_file_system("flash:");
        let mut copy = FileCopy::new(request, MemoryChannel::new()).unwrap();

        assert!(matches!(
            copy.get_file(),
            Err(FileCopyError::DirectionMismatch { .. })
        ));
        assert_eq!(copy.channel().stats(), Default::default());
    }

    #[test]
    fn test_file_system_resolved_at_construction() {
        let channel = MemoryChannel::new()
            .with_file_system("bootflash:")
            .with_local_file("a.bin", b"abc".to_vec());
        let copy = FileCopy::new(TransferRequest::upload("a.bin", "a.bin"), channel).unwrap();

        assert_eq!(copy.file_system(), "bootflash:");
        assert_eq!(copy.request().file_system(), Some("bootflash:"));
    }

    #[test]
    fn test_explicit_file_system_kept() {
        let channel = MemoryChannel::new().with_file_system("bootflash:");
        let request = TransferRequest::upload("a.bin", "a.bin").with_file_system("slot0:");
        let copy = FileCopy::new(request, channel).unwrap();
        assert_eq!(copy.file_system(), "slot0:");
    }

    #[test]
    fn test_put_then_put_again() {
        let channel = MemoryChannel::new().with_local_file("config.txt", b"hostname 1".to_vec());
        let mut copy = FileCopy::new(TransferRequest::upload("config.txt", "config.txt"), channel).unwrap();

        assert!(copy.put_file().unwrap().is_transferred());
        assert!(copy.put_file().unwrap().is_skipped());

        let channel = copy.into_channel();
        assert_eq!(channel.stats().uploads, 1);
        assert!(channel.remote_file("flash:config.txt").is_some());
    }

    #[test]
    fn test_run_report() {
        let channel = MemoryChannel::new().with_remote_file("flash:vlan.dat", b"vlans".to_vec());
        let mut copy = FileCopy::new(TransferRequest::download("vlan.dat", "vlan.dat"), channel).unwrap();

        let report = copy.run().unwrap();
        assert_eq!(report.direction, Direction::Download);
        assert_eq!(report.file_system, "flash:");
        assert!(report.outcome.is_transferred());

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["direction"], "download");
        assert_eq!(json["outcome"]["status"], "transferred");
    }
}
