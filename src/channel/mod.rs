//! Transfer channels
//!
//! A [`TransferChannel`] is everything the transfer policy needs from the
//! transport: a session lifecycle, device-side queries (existence, size,
//! free space, MD5) and the raw byte copy in either direction. Control-side
//! queries have default implementations backed by [`crate::fs`] and
//! [`crate::hash`].
//!
//! | Channel | Transport | Use Case |
//! |---------|-----------|----------|
//! | [`ScpChannel`] | SSH exec + SCP | Cisco IOS style devices |
//! | [`MemoryChannel`] | In-process maps | Tests, host driver development |

pub mod ios;
mod memory;
mod scp;

pub use memory::*;
pub use scp::*;

use crate::error::Result;
use crate::hash::{hash_file, Md5Digest};
use std::ops::{Deref, DerefMut};
use std::path::Path;
use tracing::{debug, warn};

/// Capabilities a transport must provide to the transfer policy
pub trait TransferChannel {
    /// Open the session
    fn connect(&mut self) -> Result<()>;

    /// Close the session
    fn disconnect(&mut self) -> Result<()>;

    /// Whether a session is currently open
    fn is_connected(&self) -> bool;

    /// Check whether a file exists on the device
    fn remote_file_exists(&mut self, path: &str) -> Result<bool>;

    /// MD5 of a file on the device
    fn remote_md5(&mut self, path: &str) -> Result<Md5Digest>;

    /// Size in bytes of a file on the device
    fn remote_file_size(&mut self, path: &str) -> Result<u64>;

    /// Free bytes on a device file system
    fn remote_space_available(&mut self, file_system: &str) -> Result<u64>;

    /// Copy a local file to the device, returning bytes sent
    fn transfer_upload(&mut self, source: &Path, dest: &str) -> Result<u64>;

    /// Copy a device file to the control machine, returning bytes received
    fn transfer_download(&mut self, source: &str, dest: &Path) -> Result<u64>;

    /// Default file system root of the device (e.g. `flash:`)
    fn autodetect_filesystem_root(&mut self) -> Result<String>;

    /// Check whether a file exists on the control machine
    fn local_file_exists(&self, path: &Path) -> Result<bool> {
        Ok(crate::fs::file_exists(path))
    }

    /// MD5 of a file on the control machine
    fn local_md5(&self, path: &Path) -> Result<Md5Digest> {
        Ok(hash_file(path)?.digest)
    }

    /// Size in bytes of a file on the control machine
    fn local_file_size(&self, path: &Path) -> Result<u64> {
        crate::fs::file_size(path)
    }

    /// Free bytes on the control machine where `path` would be written
    fn local_space_available(&self, path: &Path) -> Result<u64> {
        crate::fs::available_space(path)
    }
}

/// Connected channel that disconnects when dropped
///
/// Dropping the guard releases the session on every exit path. A failing
/// disconnect is logged and otherwise ignored so it never masks the result
/// of the work done while connected.
pub struct ChannelSession<'a, C: TransferChannel + ?Sized> {
    channel: &'a mut C,
}

impl<'a, C: TransferChannel + ?Sized> ChannelSession<'a, C> {
    /// Connect `channel` and hold it until the guard is dropped
    pub fn open(channel: &'a mut C) -> Result<Self> {
        channel.connect()?;
        debug!("Transfer channel connected");
        Ok(Self { channel })
    }
}

impl<C: TransferChannel + ?Sized> Deref for ChannelSession<'_, C> {
    type Target = C;

    fn deref(&self) -> &C {
        &*self.channel
    }
}

impl<C: TransferChannel + ?Sized> DerefMut for ChannelSession<'_, C> {
    fn deref_mut(&mut self) -> &mut C {
        &mut *self.channel
    }
}

impl<C: TransferChannel + ?Sized> Drop for ChannelSession<'_, C> {
    fn drop(&mut self) {
        match self.channel.disconnect() {
            Ok(()) => debug!("Transfer channel disconnected"),
            Err(e) => warn!(error = %e, "Failed to release transfer channel"),
        }
    }
}
