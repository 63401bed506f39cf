//! File identity used as the content cache key.
//!
//! An identity combines the uploaded file name with a SHA-256 digest of the
//! raw bytes, so re-uploading identical content under the same name always
//! maps to the same cache entry.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use std::path::Path;

/// Identity of an uploaded file.
///
/// # Examples
///
/// ```
/// use docqa_rs::core::FileIdentity;
///
/// let a = FileIdentity::from_bytes("notes.txt", b"hello");
/// let b = FileIdentity::from_bytes("notes.txt", b"hello");
/// assert_eq!(a, b);
/// assert_eq!(a.extension(), Some("txt".to_string()));
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FileIdentity {
    /// File name as uploaded (no directory components).
    pub name: String,
    /// Lowercase hex SHA-256 of the raw bytes.
    pub content_hash: String,
}

impl FileIdentity {
    /// Computes the identity of `bytes` uploaded under `name`.
    ///
    /// Directory components of `name` are discarded.
    #[must_use]
    pub fn from_bytes(name: &str, bytes: &[u8]) -> Self {
        let name = Path::new(name)
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or(name)
            .to_string();
        Self {
            name,
            content_hash: hex::encode(Sha256::digest(bytes)),
        }
    }

    /// Stable storage key: `name@<full hash>`.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}@{}", self.name, self.content_hash)
    }

    /// First 16 hex characters of the content hash.
    #[must_use]
    pub fn short_hash(&self) -> &str {
        self.content_hash.get(..16).unwrap_or(&self.content_hash)
    }

    /// Lowercased file extension, if any.
    #[must_use]
    pub fn extension(&self) -> Option<String> {
        Path::new(&self.name)
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
    }
}

impl fmt::Display for FileIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.name, self.short_hash())
    }
}
