//! Integrity verification using MD5
//!
//! MD5 is what network devices compute with `verify /md5`, so both sides of
//! a transfer are compared with it. Hashers support streaming so data can be
//! hashed as it is read.

use crate::error::{FileCopyError, IoResultExt, Result};
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;
use std::str::FromStr;

/// Length of an MD5 digest in hex characters
pub const MD5_HEX_LEN: usize = 32;

const DEFAULT_BUFFER_SIZE: usize = 1024 * 1024;

/// MD5 digest as a lowercase hex string
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Md5Digest(String);

impl Md5Digest {
    /// Parse a hex digest, accepting either case
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();
        if s.len() != MD5_HEX_LEN || !s.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(FileCopyError::InvalidDigest(s.to_string()));
        }
        Ok(Self(s.to_ascii_lowercase()))
    }

    /// Build from raw digest bytes
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(hex::encode(bytes))
    }

    /// Hex string
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Md5Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Md5Digest {
    type Err = FileCopyError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Md5Digest {
    type Error = FileCopyError;

    fn try_from(s: String) -> Result<Self> {
        Self::parse(&s)
    }
}

impl From<Md5Digest> for String {
    fn from(digest: Md5Digest) -> Self {
        digest.0
    }
}

/// Hash of a file together with its size
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashResult {
    /// MD5 digest
    pub digest: Md5Digest,
    /// Size in bytes
    pub size: u64,
}

impl HashResult {
    /// Create a new hash result
    pub fn new(digest: Md5Digest, size: u64) -> Self {
        Self { digest, size }
    }
}

impl fmt::Display for HashResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.digest)
    }
}

/// Streaming MD5 hasher
pub struct StreamingHasher {
    hasher: Md5,
    bytes_processed: u64,
}

impl StreamingHasher {
    /// Create a new streaming hasher
    pub fn new() -> Self {
        Self {
            hasher: Md5::new(),
            bytes_processed: 0,
        }
    }

    /// Process a chunk of data
    pub fn process(&mut self, data: &[u8]) {
        self.hasher.update(data);
        self.bytes_processed += data.len() as u64;
    }

    /// Get bytes processed so far
    pub fn bytes_processed(&self) -> u64 {
        self.bytes_processed
    }

    /// Finalize and get the result
    pub fn finalize(self) -> HashResult {
        let digest = Md5Digest::from_bytes(&self.hasher.finalize());
        HashResult::new(digest, self.bytes_processed)
    }
}

impl Default for StreamingHasher {
    fn default() -> Self {
        Self::new()
    }
}

/// Compute the MD5 of a file
pub fn hash_file(path: &Path) -> Result<HashResult> {
    hash_file_with_buffer(path, DEFAULT_BUFFER_SIZE)
}

/// Compute the MD5 of a file with a custom buffer size
pub fn hash_file_with_buffer(path: &Path, buffer_size: usize) -> Result<HashResult> {
    let file = File::open(path).with_path(path)?;
    let mut reader = BufReader::with_capacity(buffer_size, file);
    let mut hasher = StreamingHasher::new();
    let mut buffer = vec![0u8; buffer_size];

    loop {
        let bytes_read = reader.read(&mut buffer).with_path(path)?;

        if bytes_read == 0 {
            break;
        }

        hasher.process(&buffer[..bytes_read]);
    }

    Ok(hasher.finalize())
}

/// Compute the MD5 of data in memory
pub fn hash_bytes(data: &[u8]) -> HashResult {
    let mut hasher = StreamingHasher::new();
    hasher.process(data);
    hasher.finalize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::TempDir;

    fn create_test_file(dir: &Path, content: &[u8]) -> std::path::PathBuf {
        let path = dir.join("test.bin");
        let mut file = File::create(&path).unwrap();
        file.write_all(content).unwrap();
        path
    }

    #[test]
    fn test_known_digests() {
        assert_eq!(
            hash_bytes(b"").digest.as_str(),
            "d41d8cd98f00b204e9800998ecf8427e"
        );
        assert_eq!(
            hash_bytes(b"abc").digest.as_str(),
            "900150983cd24fb0d6963f7d28e17f72"
        );
        assert_eq!(hash_bytes(b"abc").size, 3);
    }

    #[test]
    fn test_parse_digest() {
        let digest = Md5Digest::parse("  900150983CD24FB0D6963F7D28E17F72\n").unwrap();
        assert_eq!(digest, hash_bytes(b"abc").digest);

        assert!(Md5Digest::parse("abc123").is_err());
        assert!(Md5Digest::parse("z00150983cd24fb0d6963f7d28e17f72").is_err());
    }

    #[test]
    fn test_digest_serde() {
        let digest = hash_bytes(b"abc").digest;
        let json = serde_json::to_string(&digest).unwrap();
        assert_eq!(json, "\"900150983cd24fb0d6963f7d28e17f72\"");

        let bad: std::result::Result<Md5Digest, _> = serde_json::from_str("\"nope\"");
        assert!(bad.is_err());
    }

    #[test]
    fn test_hash_file() {
        let dir = TempDir::new().unwrap();
        let content = b"hostname rtr1\n!\nend\n";
        let path = create_test_file(dir.path(), content);

        let file_hash = hash_file_with_buffer(&path, 4).unwrap();
        assert_eq!(file_hash, hash_bytes(content));
    }

    #[test]
    fn test_hash_missing_file() {
        let dir = TempDir::new().unwrap();
        let err = hash_file(&dir.path().join("missing.bin")).unwrap_err();
        assert!(matches!(err, FileCopyError::Io { .. }));
    }

    #[test]
    fn test_streaming_hasher() {
        let mut hasher = StreamingHasher::new();
        hasher.process(b"Hello, ");
        hasher.process(b"World!");
        assert_eq!(hasher.bytes_processed(), 13);

        let result = hasher.finalize();
        assert_eq!(result.digest.as_str(), "65a8e27d8879283831b664bd8b7f0ad4");
    }
}
