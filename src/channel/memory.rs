//! In-memory transfer channel
//!
//! Simulates a device and the control machine with in-process file maps so
//! the transfer policy and host drivers can be exercised without a device.

use super::TransferChannel;
use crate::error::{FileCopyError, Result};
use crate::hash::{hash_bytes, Md5Digest};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Counters of channel calls
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Successful connects
    pub connects: usize,
    /// Disconnects
    pub disconnects: usize,
    /// Uploads performed
    pub uploads: usize,
    /// Downloads performed
    pub downloads: usize,
}

/// In-memory device and control machine
#[derive(Debug, Clone)]
pub struct MemoryChannel {
    remote_files: HashMap<String, Vec<u8>>,
    local_files: HashMap<PathBuf, Vec<u8>>,
    remote_space: u64,
    local_space: u64,
    file_system: String,
    corrupt_transfers: bool,
    fail_disconnect: bool,
    connected: bool,
    stats: ChannelStats,
}

impl MemoryChannel {
    /// Empty device with a `flash:` file system and 1 GiB free on both sides
    pub fn new() -> Self {
        Self {
            remote_files: HashMap::new(),
            local_files: HashMap::new(),
            remote_space: 1 << 30,
            local_space: 1 << 30,
            file_system: "flash:".to_string(),
            corrupt_transfers: false,
            fail_disconnect: false,
            connected: false,
            stats: ChannelStats::default(),
        }
    }

    /// Add a file on the device
    pub fn with_remote_file(mut self, path: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        self.remote_files.insert(path.into(), data.into());
        self
    }

    /// Add a file on the control machine
    pub fn with_local_file(mut self, path: impl Into<PathBuf>, data: impl Into<Vec<u8>>) -> Self {
        self.local_files.insert(path.into(), data.into());
        self
    }

    /// Set free bytes on the device
    pub fn with_remote_space(mut self, bytes: u64) -> Self {
        self.remote_space = bytes;
        self
    }

    /// Set free bytes on the control machine
    pub fn with_local_space(mut self, bytes: u64) -> Self {
        self.local_space = bytes;
        self
    }

    /// Set the file system root reported by autodetection
    pub fn with_file_system(mut self, root: impl Into<String>) -> Self {
        self.file_system = root.into();
        self
    }

    /// Damage every transferred copy so verification fails
    pub fn corrupt_transfers(mut self, corrupt: bool) -> Self {
        self.corrupt_transfers = corrupt;
        self
    }

    /// Make every disconnect report an error after closing the session
    pub fn fail_disconnect(mut self, fail: bool) -> Self {
        self.fail_disconnect = fail;
        self
    }

    /// Contents of a device file
    pub fn remote_file(&self, path: &str) -> Option<&[u8]> {
        self.remote_files.get(path).map(Vec::as_slice)
    }

    /// Contents of a control-machine file
    pub fn local_file(&self, path: &Path) -> Option<&[u8]> {
        self.local_files.get(path).map(Vec::as_slice)
    }

    /// Call counters
    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(FileCopyError::NotConnected)
        }
    }

    fn deliver(&self, mut data: Vec<u8>) -> Vec<u8> {
        if self.corrupt_transfers {
            match data.last_mut() {
                Some(byte) => *byte ^= 0xFF,
                None => data.push(0),
            }
        }
        data
    }

    fn remote(&self, path: &str) -> Result<&Vec<u8>> {
        self.remote_files
            .get(path)
            .ok_or_else(|| FileCopyError::NotFound(path.to_string()))
    }

    fn local(&self, path: &Path) -> Result<&Vec<u8>> {
        self.local_files
            .get(path)
            .ok_or_else(|| FileCopyError::NotFound(path.display().to_string()))
    }
}

impl Default for MemoryChannel {
    fn default() -> Self {
        Self::new()
    }
}

impl TransferChannel for MemoryChannel {
    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        self.stats.connects += 1;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<()> {
        if self.connected {
            self.connected = false;
            self.stats.disconnects += 1;
        }
        if self.fail_disconnect {
            return Err(FileCopyError::connection("memory", "session close failed"));
        }
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn remote_file_exists(&mut self, path: &str) -> Result<bool> {
        self.ensure_connected()?;
        Ok(self.remote_files.contains_key(path))
    }

    fn remote_md5(&mut self, path: &str) -> Result<Md5Digest> {
        self.ensure_connected()?;
        Ok(hash_bytes(self.remote(path)?).digest)
    }

    fn remote_file_size(&mut self, path: &str) -> Result<u64> {
        self.ensure_connected()?;
        Ok(self.remote(path)?.len() as u64)
    }

    fn remote_space_available(&mut self, _file_system: &str) -> Result<u64> {
        self.ensure_connected()?;
        Ok(self.remote_space)
    }

    fn transfer_upload(&mut self, source: &Path, dest: &str) -> Result<u64> {
        self.ensure_connected()?;
        let data = self.local(source)?.clone();
        let bytes = data.len() as u64;
        let stored = self.deliver(data);
        self.remote_files.insert(dest.to_string(), stored);
        self.stats.uploads += 1;
        Ok(bytes)
    }

    fn transfer_download(&mut self, source: &str, dest: &Path) -> Result<u64> {
        self.ensure_connected()?;
        let data = self.remote(source)?.clone();
        let bytes = data.len() as u64;
        let stored = self.deliver(data);
        self.local_files.insert(dest.to_path_buf(), stored);
        self.stats.downloads += 1;
        Ok(bytes)
    }

    fn autodetect_filesystem_root(&mut self) -> Result<String> {
        Ok(self.file_system.clone())
    }

    fn local_file_exists(&self, path: &Path) -> Result<bool> {
        Ok(self.local_files.contains_key(path))
    }

    fn local_md5(&self, path: &Path) -> Result<Md5Digest> {
        Ok(hash_bytes(self.local(path)?).digest)
    }

    fn local_file_size(&self, path: &Path) -> Result<u64> {
        Ok(self.local(path)?.len() as u64)
    }

    fn local_space_available(&self, _path: &Path) -> Result<u64> {
        Ok(self.local_space)
    }
}
