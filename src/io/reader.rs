//! File reading utilities with memory mapping support.
//!
//! Uploaded documents are read as raw bytes: identity hashing and format
//! extraction both work on bytes, and only the loader decides how to
//! decode them.

// Memory mapping requires unsafe but is well-documented and safe for read-only access
#![allow(unsafe_code)]

use crate::error::{IoError, Result};
use memmap2::Mmap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Threshold for using memory mapping (1MB).
const MMAP_THRESHOLD: u64 = 1024 * 1024;

/// Maximum document size accepted for upload (256MB).
const MAX_FILE_SIZE: u64 = 256 * 1024 * 1024;

/// File reader with support for memory mapping.
///
/// Small files are read directly; files of 1MB or more are memory mapped
/// and copied out once.
///
/// # Examples
///
/// ```no_run
/// use docqa_rs::io::FileReader;
///
/// let reader = FileReader::open("report.pdf").unwrap();
/// let bytes = reader.read_to_bytes().unwrap();
/// ```
pub struct FileReader {
    file: File,
    size: u64,
    path: String,
}

impl FileReader {
    /// Opens a file for reading.
    ///
    /// # Errors
    ///
    /// Returns an error if the file doesn't exist, can't be opened, or is
    /// larger than the upload limit.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let path_str = path_ref.to_string_lossy().to_string();

        if !path_ref.is_file() {
            return Err(IoError::FileNotFound { path: path_str }.into());
        }

        let file = File::open(path_ref).map_err(|e| IoError::ReadFailed {
            path: path_str.clone(),
            reason: e.to_string(),
        })?;

        let size = file
            .metadata()
            .map_err(|e| IoError::ReadFailed {
                path: path_str.clone(),
                reason: e.to_string(),
            })?
            .len();

        if size > MAX_FILE_SIZE {
            return Err(IoError::ReadFailed {
                path: path_str,
                reason: format!("file too large: {size} bytes (max: {MAX_FILE_SIZE} bytes)"),
            }
            .into());
        }

        Ok(Self {
            file,
            size,
            path: path_str,
        })
    }

    /// Returns the file size in bytes.
    #[must_use]
    pub const fn size(&self) -> u64 {
        self.size
    }

    /// Returns the file path.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Reads the whole file as bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if reading fails.
    pub fn read_to_bytes(&self) -> Result<Vec<u8>> {
        if self.size >= MMAP_THRESHOLD {
            self.read_mmap_bytes()
        } else {
            self.read_direct_bytes()
        }
    }

    fn read_mmap_bytes(&self) -> Result<Vec<u8>> {
        // Safety: the map is read-only and dropped before returning
        let mmap = unsafe {
            Mmap::map(&self.file).map_err(|e| IoError::ReadFailed {
                path: self.path.clone(),
                reason: format!("mmap failed: {e}"),
            })?
        };
        Ok(mmap.to_vec())
    }

    #[allow(clippy::cast_possible_truncation)]
    fn read_direct_bytes(&self) -> Result<Vec<u8>> {
        let mut file = &self.file;
        let mut buffer = Vec::with_capacity(self.size as usize);
        file.read_to_end(&mut buffer)
            .map_err(|e| IoError::ReadFailed {
                path: self.path.clone(),
                reason: e.to_string(),
            })?;
        Ok(buffer)
    }
}

/// Reads a file to bytes, choosing direct read or mmap by size.
///
/// # Errors
///
/// Returns an error if the file cannot be opened or read.
pub fn read_bytes<P: AsRef<Path>>(path: P) -> Result<Vec<u8>> {
    FileReader::open(path)?.read_to_bytes()
}

/// Writes content to a file, creating parent directories if needed.
///
/// # Errors
///
/// Returns an error if directory creation or file writing fails.
pub fn write_file<P: AsRef<Path>>(path: P, content: &str) -> Result<()> {
    let path_ref = path.as_ref();
    let path_str = path_ref.to_string_lossy().to_string();

    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
        && !parent.exists()
    {
        std::fs::create_dir_all(parent).map_err(|e| IoError::WriteFailed {
            path: parent.to_string_lossy().to_string(),
            reason: e.to_string(),
        })?;
    }

    std::fs::write(path_ref, content).map_err(|e| IoError::WriteFailed {
        path: path_str,
        reason: e.to_string(),
    })?;

    Ok(())
}
