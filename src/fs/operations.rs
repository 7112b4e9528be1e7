//! Control-machine file operations
//!
//! Size, existence and free-space queries for the local side of a transfer.

use crate::error::{FileCopyError, IoResultExt, Result};
use std::path::{Path, PathBuf};
use sysinfo::Disks;

/// Check whether a regular file exists at `path`
pub fn file_exists(path: &Path) -> bool {
    path.is_file()
}

/// Size of a local file in bytes
pub fn file_size(path: &Path) -> Result<u64> {
    let meta = std::fs::metadata(path).with_path(path)?;
    if !meta.is_file() {
        return Err(FileCopyError::NotFound(path.display().to_string()));
    }
    Ok(meta.len())
}

/// Closest existing ancestor of `path`, made absolute
fn existing_ancestor(path: &Path) -> Result<PathBuf> {
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir().with_path(path)?.join(path)
    };

    let mut current = absolute.as_path();
    loop {
        if current.exists() {
            return std::fs::canonicalize(current).with_path(current);
        }
        current = current
            .parent()
            .ok_or_else(|| FileCopyError::NotFound(path.display().to_string()))?;
    }
}

/// Get available space on the file system that holds (or would hold) `path`
pub fn available_space(path: &Path) -> Result<u64> {
    let target = existing_ancestor(path)?;
    let disks = Disks::new_with_refreshed_list();

    let mut best_match = None;
    let mut best_len = 0;

    for disk in disks.iter() {
        let mount = disk.mount_point();
        let len = mount.as_os_str().len();
        if target.starts_with(mount) && (best_match.is_none() || len > best_len) {
            best_match = Some(disk.available_space());
            best_len = len;
        }
    }

    best_match.ok_or_else(|| FileCopyError::NotFound(path.display().to_string()))
}
