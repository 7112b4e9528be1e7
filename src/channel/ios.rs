//! Cisco IOS command construction and output parsing
//!
//! The device answers existence, size, free-space and hash questions through
//! CLI commands. These functions build those commands and pull the needed
//! values out of their output; they do no I/O.

use crate::hash::Md5Digest;

/// `dir` command for a path or file system
pub fn dir_command(path: &str) -> String {
    format!("dir {}", path)
}

/// `verify /md5` command for a device file
pub fn md5_command(path: &str) -> String {
    format!("verify /md5 {}", path)
}

/// Command that prints the default file system
pub const DETECT_FS_COMMAND: &str = "dir";

/// Whether `dir <file>` output reports that the file is absent
pub fn is_missing(output: &str) -> bool {
    let lower = output.to_ascii_lowercase();
    lower.contains("%error") || lower.contains("no such file") || lower.contains("not found")
}

/// Last path component of a device path (`flash:/dir/a.bin` -> `a.bin`)
pub fn base_name(path: &str) -> &str {
    path.rsplit(['/', ':']).next().unwrap_or(path)
}

fn is_permissions(token: &str) -> bool {
    token.len() >= 3 && token.chars().all(|c| matches!(c, '-' | 'd' | 'r' | 'w' | 'x'))
}

/// File size from `dir <file>` output
///
/// Listing lines look like `  22  -rw-   12345  Mar 1 2023 10:00:00 +00:00  a.bin`;
/// the size is the first number after the permission column.
pub fn parse_file_size(output: &str, path: &str) -> Option<u64> {
    let name = base_name(path);

    for line in output.lines() {
        let line = line.trim_end();
        let tokens: Vec<&str> = line.split_whitespace().collect();
        if tokens.last() != Some(&name) {
            continue;
        }

        let start = match tokens.iter().position(|t| is_permissions(t)) {
            Some(p) => p + 1,
            None => 1,
        };

        if let Some(size) = tokens[start..].iter().find_map(|t| t.parse::<u64>().ok()) {
            return Some(size);
        }
    }

    None
}

/// Free bytes from `dir <file_system>` output
///
/// Matches both `N bytes total (M bytes free)` and a bare `M bytes free`.
pub fn parse_space_free(output: &str) -> Option<u64> {
    let idx = output.rfind("bytes free")?;
    output[..idx]
        .split_whitespace()
        .last()
        .map(|t| t.trim_start_matches('('))
        .and_then(|t| t.parse().ok())
}

/// Digest from `verify /md5 <file>` output
///
/// IOS prints `verify /md5 (flash:a.bin) = <hash>`; other platforms print the
/// bare hash, so any standalone 32-hex token is accepted as a fallback.
pub fn parse_md5(output: &str) -> Option<Md5Digest> {
    for line in output.lines().rev() {
        if let Some((_, hash)) = line.rsplit_once('=') {
            if let Ok(digest) = Md5Digest::parse(hash) {
                return Some(digest);
            }
        }
    }

    output
        .split_whitespace()
        .rev()
        .find_map(|t| Md5Digest::parse(t).ok())
}

/// File system root from plain `dir` output (`Directory of flash:/` -> `flash:`)
pub fn parse_directory_root(output: &str) -> Option<String> {
    let line = output
        .lines()
        .map(str::trim)
        .find(|l| l.starts_with("Directory of "))?;
    let dir = line["Directory of ".len()..].trim();

    let root = match dir.find(':') {
        Some(idx) => &dir[..=idx],
        None => dir,
    };

    if root.is_empty() {
        None
    } else {
        Some(root.to_string())
    }
}
