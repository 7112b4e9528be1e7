//! Verify-before-and-after transfer policy
//!
//! Decides, for one request, whether the copy is needed (MD5 of both sides
//! already equal), whether the receiving side has room, and whether the copy
//! arrived intact. The channel is held through a [`ChannelSession`] so it is
//! released on every exit path.

use super::request::{TransferPaths, TransferRequest};
use crate::channel::{ChannelSession, TransferChannel};
use crate::config::Direction;
use crate::error::{FileCopyError, Result};
use crate::hash::Md5Digest;
use serde::Serialize;
use tracing::{debug, info, info_span};

/// Result of a transfer that did not fail
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum Outcome {
    /// Destination already matched the source
    Skipped {
        /// Digest shared by both sides
        md5: Md5Digest,
    },
    /// File copied and verified
    Transferred {
        /// Digest shared by both sides after the copy
        md5: Md5Digest,
        /// Bytes copied
        bytes: u64,
    },
}

impl Outcome {
    /// Whether the copy was skipped
    pub fn is_skipped(&self) -> bool {
        matches!(self, Self::Skipped { .. })
    }

    /// Whether a copy was performed
    pub fn is_transferred(&self) -> bool {
        matches!(self, Self::Transferred { .. })
    }

    /// Verified digest of the destination
    pub fn md5(&self) -> &Md5Digest {
        match self {
            Self::Skipped { md5 } | Self::Transferred { md5, .. } => md5,
        }
    }
}

/// Remote and local digest of a transfer
struct Digests {
    remote: Md5Digest,
    local: Md5Digest,
}

impl Digests {
    fn matches(&self) -> bool {
        self.remote == self.local
    }
}

/// The verify-before-and-after algorithm
#[derive(Debug, Clone, Copy, Default)]
pub struct TransferPolicy;

impl TransferPolicy {
    /// Create the policy
    pub fn new() -> Self {
        Self
    }

    /// Run `request` over `channel` in the request's direction
    ///
    /// Connects, skips when the destination already matches, checks space,
    /// copies, verifies, and disconnects again whatever happens.
    pub fn execute<C>(&self, request: &TransferRequest, channel: &mut C) -> Result<Outcome>
    where
        C: TransferChannel + ?Sized,
    {
        let span = info_span!(
            "transfer",
            direction = %request.direction(),
            source = %request.source(),
            dest = %request.dest(),
        );
        let _enter = span.enter();

        let mut session = ChannelSession::open(channel)?;
        let outcome = self.run(request, &mut *session)?;
        drop(session);

        Ok(outcome)
    }

    fn run<C>(&self, request: &TransferRequest, channel: &mut C) -> Result<Outcome>
    where
        C: TransferChannel + ?Sized,
    {
        let file_system = match request.file_system() {
            Some(fs) => fs.to_string(),
            None => channel.autodetect_filesystem_root()?,
        };
        let paths = request.resolve(&file_system);
        let direction = request.direction();

        if Self::destination_exists(channel, direction, &paths)? {
            let digests = Self::digests(channel, &paths)?;
            if digests.matches() {
                info!(md5 = %digests.remote, "Destination already matches source, skipping");
                return Ok(Outcome::Skipped { md5: digests.remote });
            }
            info!(
                remote = %digests.remote,
                local = %digests.local,
                "Destination differs from source"
            );
        }

        Self::verify_space(channel, direction, &paths, &file_system)?;

        let bytes = match direction {
            Direction::Upload => channel.transfer_upload(&paths.local, &paths.remote)?,
            Direction::Download => channel.transfer_download(&paths.remote, &paths.local)?,
        };
        debug!(bytes, "Transfer complete, verifying");

        let digests = Self::digests(channel, &paths)?;
        if !digests.matches() {
            return Err(FileCopyError::VerificationFailed {
                path: request.dest().into_owned(),
                remote: digests.remote.to_string(),
                local: digests.local.to_string(),
            });
        }

        info!(md5 = %digests.remote, bytes, "Transfer verified");
        Ok(Outcome::Transferred {
            md5: digests.remote,
            bytes,
        })
    }

    /// Whether the destination is already present on the receiving side
    fn destination_exists<C>(channel: &mut C, direction: Direction, paths: &TransferPaths) -> Result<bool>
    where
        C: TransferChannel + ?Sized,
    {
        match direction {
            Direction::Upload => channel.remote_file_exists(&paths.remote),
            Direction::Download => channel.local_file_exists(&paths.local),
        }
    }

    /// Device-side digest and control-side digest
    ///
    /// For an upload that is (destination, source); for a download it is
    /// (source, destination).
    fn digests<C>(channel: &mut C, paths: &TransferPaths) -> Result<Digests>
    where
        C: TransferChannel + ?Sized,
    {
        let remote = channel.remote_md5(&paths.remote)?;
        let local = channel.local_md5(&paths.local)?;
        debug!(remote = %remote, local = %local, "Compared MD5");
        Ok(Digests { remote, local })
    }

    /// Fail unless the receiving side has more free bytes than the file size
    fn verify_space<C>(
        channel: &mut C,
        direction: Direction,
        paths: &TransferPaths,
        file_system: &str,
    ) -> Result<()>
    where
        C: TransferChannel + ?Sized,
    {
        let (required, available, location) = match direction {
            Direction::Upload => (
                channel.local_file_size(&paths.local)?,
                channel.remote_space_available(file_system)?,
                format!("device {}", file_system),
            ),
            Direction::Download => (
                channel.remote_file_size(&paths.remote)?,
                channel.local_space_available(&paths.local)?,
                format!("control machine ({})", paths.local.display()),
            ),
        };

        debug!(required, available, %location, "Checked free space");
        if available <= required {
            return Err(FileCopyError::InsufficientSpace {
                location,
                required,
                available,
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::MemoryChannel;
    use crate::hash::hash_bytes;
    use proptest::prelude::*;
    use std::path::Path;

    fn upload(source: &str, dest: &str) -> TransferRequest {
        TransferRequest::upload(source, dest).with_file_system("flash:")
    }

    fn download(source: &str, dest: &str) -> TransferRequest {
        TransferRequest::download(source, dest).with_file_system("flash:")
    }

    #[test]
    fn test_upload_to_absent_destination() {
        let content = b"hostname 1";
        let mut channel = MemoryChannel::new().with_local_file("config.txt", content.to_vec());

        let outcome = TransferPolicy::new()
            .execute(&upload("config.txt", "config.txt"), &mut channel)
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Transferred {
                md5: hash_bytes(content).digest,
                bytes: 10,
            }
        );
        assert_eq!(channel.stats().uploads, 1);
        assert_eq!(channel.remote_file("flash:config.txt"), Some(&content[..]));
    }

    #[test]
    fn test_matching_destination_is_skipped() {
        let content = b"hostname 1";
        let mut channel = MemoryChannel::new()
            .with_local_file("config.txt", content.to_vec())
            .with_remote_file("flash:config.txt", content.to_vec());

        let outcome = TransferPolicy::new()
            .execute(&upload("config.txt", "config.txt"), &mut channel)
            .unwrap();

        assert!(outcome.is_skipped());
        assert_eq!(outcome.md5(), &hash_bytes(content).digest);
        assert_eq!(channel.stats().uploads, 0);
    }

    #[test]
    fn test_mismatch_with_insufficient_space() {
        let mut channel = MemoryChannel::new()
            .with_local_file("config.txt", b"hostname 1".to_vec())
            .with_remote_file("flash:config.txt", b"hostname 2".to_vec())
            .with_remote_space(4);

        let err = TransferPolicy::new()
            .execute(&upload("config.txt", "config.txt"), &mut channel)
            .unwrap_err();

        match err {
            FileCopyError::InsufficientSpace {
                required,
                available,
                ..
            } => {
                assert_eq!(required, 10);
                assert_eq!(available, 4);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(channel.stats().uploads, 0);
        assert_eq!(channel.remote_file("flash:config.txt"), Some(&b"hostname 2"[..]));
    }

    #[test]
    fn test_space_equal_to_size_is_insufficient() {
        let mut channel = MemoryChannel::new()
            .with_local_file("a.bin", vec![0u8; 100])
            .with_remote_space(100);

        let err = TransferPolicy::new()
            .execute(&upload("a.bin", "a.bin"), &mut channel)
            .unwrap_err();
        assert!(matches!(err, FileCopyError::InsufficientSpace { .. }));
    }

    #[test]
    fn test_corrupted_upload_fails_verification() {
        let mut channel = MemoryChannel::new()
            .with_local_file("ios.bin", b"image".to_vec())
            .corrupt_transfers(true);

        let err = TransferPolicy::new()
            .execute(&upload("ios.bin", "ios.bin"), &mut channel)
            .unwrap_err();

        match err {
            FileCopyError::VerificationFailed { path, remote, local } => {
                assert_eq!(path, "ios.bin");
                assert_ne!(remote, local);
                assert_eq!(local, hash_bytes(b"image").digest.to_string());
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(channel.stats().uploads, 1);
    }

    #[test]
    fn test_corrupted_download_fails_verification() {
        let mut channel = MemoryChannel::new()
            .with_remote_file("flash:vlan.dat", b"abc".to_vec())
            .corrupt_transfers(true);

        let err = TransferPolicy::new()
            .execute(&download("vlan.dat", "vlan-backup.dat"), &mut channel)
            .unwrap_err();

        match err {
            FileCopyError::VerificationFailed { path, remote, local } => {
                assert_eq!(path, "vlan-backup.dat");
                assert_eq!(remote, hash_bytes(b"abc").digest.to_string());
                let received = channel.local_file(Path::new("vlan-backup.dat")).unwrap();
                assert_eq!(local, hash_bytes(received).digest.to_string());
                assert_ne!(remote, local);
            }
            other => panic!("unexpected error: {:?}", other),
        }
        assert_eq!(channel.stats().downloads, 1);
    }

    #[test]
    fn test_failed_release_keeps_outcome() {
        let mut channel = MemoryChannel::new()
            .with_local_file("a.bin", b"a".to_vec())
            .fail_disconnect(true);

        let outcome = TransferPolicy::new()
            .execute(&upload("a.bin", "a.bin"), &mut channel)
            .unwrap();

        assert_eq!(
            outcome,
            Outcome::Transferred {
                md5: hash_bytes(b"a").digest,
                bytes: 1,
            }
        );
        assert!(!channel.is_connected());
        assert_eq!(channel.stats().disconnects, 1);
    }

    #[test]
    fn test_failed_release_keeps_original_error() {
        let mut channel = MemoryChannel::new()
            .with_local_file("a.bin", vec![7u8; 32])
            .with_remote_space(8)
            .fail_disconnect(true);

        let err = TransferPolicy::new()
            .execute(&upload("a.bin", "a.bin"), &mut channel)
            .unwrap_err();

        assert!(matches!(
            err,
            FileCopyError::InsufficientSpace { required: 32, available: 8, .. }
        ));
        assert_eq!(channel.stats().disconnects, 1);
        assert_eq!(channel.stats().uploads, 0);
    }

    #[test]
    fn test_second_execute_is_skipped() {
        let mut channel = MemoryChannel::new().with_local_file("cfg.txt", b"interface Gi0/1".to_vec());
        let request = upload("cfg.txt", "cfg.txt");
        let policy = TransferPolicy::new();

        assert!(policy.execute(&request, &mut channel).unwrap().is_transferred());
        assert!(policy.execute(&request, &mut channel).unwrap().is_skipped());
        assert_eq!(channel.stats().uploads, 1);
    }

    #[test]
    fn test_download_uses_device_source_and_local_dest() {
        let content = b"! running config";
        let mut channel = MemoryChannel::new()
            .with_remote_file("flash:running.cfg", content.to_vec())
            .with_local_file("backup.cfg", b"stale".to_vec());

        let outcome = TransferPolicy::new()
            .execute(&download("running.cfg", "backup.cfg"), &mut channel)
            .unwrap();

        assert!(outcome.is_transferred());
        assert_eq!(channel.stats().downloads, 1);
        assert_eq!(channel.local_file(Path::new("backup.cfg")), Some(&content[..]));

        let again = TransferPolicy::new()
            .execute(&download("running.cfg", "backup.cfg"), &mut channel)
            .unwrap();
        assert!(again.is_skipped());
    }

    #[test]
    fn test_download_checks_local_space() {
        let mut channel = MemoryChannel::new()
            .with_remote_file("flash:big.bin", vec![1u8; 64])
            .with_local_space(10);

        let err = TransferPolicy::new()
            .execute(&download("big.bin", "big.bin"), &mut channel)
            .unwrap_err();

        assert!(matches!(
            err,
            FileCopyError::InsufficientSpace { required: 64, available: 10, .. }
        ));
        assert_eq!(channel.stats().downloads, 0);
    }

    #[test]
    fn test_channel_released_on_every_path() {
        let policy = TransferPolicy::new();

        let mut ok = MemoryChannel::new().with_local_file("a", b"a".to_vec());
        policy.execute(&upload("a", "a"), &mut ok).unwrap();
        assert!(!ok.is_connected());
        assert_eq!(ok.stats().connects, ok.stats().disconnects);

        let mut failing = MemoryChannel::new();
        assert!(policy.execute(&upload("missing", "missing"), &mut failing).is_err());
        assert!(!failing.is_connected());
        assert_eq!(failing.stats().disconnects, 1);
    }

    #[test]
    fn test_autodetects_file_system_when_absent() {
        let mut channel = MemoryChannel::new()
            .with_file_system("bootflash:")
            .with_local_file("a.bin", b"abc".to_vec());

        TransferPolicy::new()
            .execute(&TransferRequest::upload("a.bin", "a.bin"), &mut channel)
            .unwrap();
        assert!(channel.remote_file("bootflash:a.bin").is_some());
    }

    #[test]
    fn test_outcome_serialization() {
        let outcome = Outcome::Transferred {
            md5: hash_bytes(b"abc").digest,
            bytes: 3,
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "transferred");
        assert_eq!(json["md5"], "900150983cd24fb0d6963f7d28e17f72");
        assert_eq!(json["bytes"], 3);
    }

    proptest! {
        #[test]
        fn prop_matching_destination_never_transfers(data in proptest::collection::vec(any::<u8>(), 0..256)) {
            let mut channel = MemoryChannel::new()
                .with_local_file("f", data.clone())
                .with_remote_file("flash:f", data);

            let outcome = TransferPolicy::new().execute(&upload("f", "f"), &mut channel).unwrap();
            prop_assert!(outcome.is_skipped());
            prop_assert_eq!(channel.stats().uploads, 0);
        }

        #[test]
        fn prop_insufficient_space_never_transfers(
            data in proptest::collection::vec(any::<u8>(), 1..256),
            slack in 0u64..256,
        ) {
            let space = (data.len() as u64).saturating_sub(slack);
            let mut channel = MemoryChannel::new()
                .with_local_file("f", data)
                .with_remote_space(space);

            let result = TransferPolicy::new().execute(&upload("f", "f"), &mut channel);
            let is_insufficient = matches!(result, Err(FileCopyError::InsufficientSpace { .. }));
            prop_assert!(is_insufficient);
            prop_assert_eq!(channel.stats().uploads, 0);
        }
    }
}
