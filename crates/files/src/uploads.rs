//! Streamed upload storage
//!
//! This module provides [`UploadStore`], which owns the uploads directory, and
//! [`UploadWriter`], which receives one upload chunk by chunk.
//!
//! # Lifecycle
//!
//! 1. [`UploadStore::begin`] checks the declared media type against the store's
//!    [`UploadPolicy`] and opens a hidden `.part` file. A rejected type never touches disk.
//! 2. [`UploadWriter::write_chunk`] appends bytes, hashing them and enforcing the size cap.
//! 3. [`UploadWriter::finish`] sniffs the leading bytes, syncs and renames the `.part` file
//!    to its final name. Dropping an unfinished writer removes the `.part` file.
//!
//! # Content Sniffing
//!
//! The declared type is what the client says. As a second line of defence the leading bytes
//! are inspected with `infer`; anything recognised as an executable or application binary
//! is rejected even when it was declared as, say, `text/plain`. Text formats (CSV, JSON,
//! SVG) are not reliably detectable and pass on their declared type.

use crate::{atomic::temp_sibling, FilesError};
use acervo_id::UploadName;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

/// Media types accepted by the file service.
pub const ALLOWED_UPLOAD_TYPES: &[&str] = &[
    "image/jpeg",
    "image/png",
    "image/webp",
    "image/gif",
    "image/svg+xml",
    "application/pdf",
    "text/plain",
    "text/csv",
    "application/json",
];

/// Per-file size cap of the file service (20 MiB).
pub const MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

const SNIFF_BYTES: usize = 8 * 1024;

/// Returns the lower-cased media type without parameters: `Text/Plain; charset=utf-8`
/// becomes `text/plain`.
pub fn essence(media_type: &str) -> String {
    media_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase()
}

/// Acceptance rules applied to every upload of a store.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    pub max_bytes: u64,
    pub allowed_types: Vec<String>,
}

impl UploadPolicy {
    pub fn new(max_bytes: u64, allowed_types: &[&str]) -> Self {
        Self {
            max_bytes,
            allowed_types: allowed_types.iter().map(|t| t.to_string()).collect(),
        }
    }

    pub fn allows(&self, media_type: &str) -> bool {
        let media_type = essence(media_type);
        self.allowed_types.iter().any(|t| *t == media_type)
    }
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::new(MAX_UPLOAD_BYTES, ALLOWED_UPLOAD_TYPES)
    }
}

/// Description of a completed upload.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct StoredUpload {
    /// Final filename inside the uploads directory
    pub name: String,

    /// Filename as sent by the client
    pub original_name: String,

    /// Declared media type, normalised with [`essence`]
    pub media_type: String,

    pub size_bytes: u64,

    /// Hexadecimal SHA-256 digest of the content
    pub sha256: String,

    pub stored_at: DateTime<Utc>,
}

/// The uploads directory.
#[derive(Debug, Clone)]
pub struct UploadStore {
    root: PathBuf,
    policy: UploadPolicy,
}

impl UploadStore {
    /// Opens (creating if needed) the uploads directory at `root`.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidRootDirectory` if the directory cannot be created or the
    /// path exists but is not a directory.
    pub fn open(root: &Path, policy: UploadPolicy) -> Result<Self, FilesError> {
        fs::create_dir_all(root).map_err(|e| {
            FilesError::InvalidRootDirectory(format!(
                "Cannot create directory {}: {}",
                root.display(),
                e
            ))
        })?;

        if !root.is_dir() {
            return Err(FilesError::InvalidRootDirectory(format!(
                "Path is not a directory: {}",
                root.display()
            )));
        }

        Ok(Self {
            root: root.to_path_buf(),
            policy,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Starts a new upload.
    ///
    /// # Errors
    ///
    /// - `FilesError::UnsupportedMediaType` if `declared_type` is not allowed
    /// - `FilesError::Io` if the temporary file cannot be created
    pub fn begin(
        &self,
        original_name: &str,
        declared_type: &str,
    ) -> Result<UploadWriter, FilesError> {
        if !self.policy.allows(declared_type) {
            return Err(FilesError::UnsupportedMediaType(declared_type.to_string()));
        }

        let name = UploadName::generate(original_name, Utc::now());
        let final_path = self.root.join(name.as_str());
        let part_path = self.root.join(format!(".{}.part", name));
        let part_path = if part_path.exists() {
            temp_sibling(&part_path, "part")
        } else {
            part_path
        };

        let file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&part_path)
            .map_err(|e| {
                FilesError::Io(std::io::Error::new(
                    e.kind(),
                    format!("Failed to create {}: {}", part_path.display(), e),
                ))
            })?;

        Ok(UploadWriter {
            file: Some(file),
            part_path,
            final_path,
            name,
            original_name: original_name.to_string(),
            media_type: essence(declared_type),
            max_bytes: self.policy.max_bytes,
            size_bytes: 0,
            hasher: Sha256::new(),
            head: Vec::new(),
        })
    }

    /// Absolute path of a stored upload.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidName` if `name` could escape the uploads directory.
    pub fn path_of(&self, name: &str) -> Result<PathBuf, FilesError> {
        let name = UploadName::parse(name)?;
        Ok(self.root.join(name.as_str()))
    }

    /// Removes a stored upload. Returns `false` if it was already gone.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::InvalidName` for unsafe names and `FilesError::Io` for any
    /// failure other than the file not existing.
    pub fn remove(&self, name: &str) -> Result<bool, FilesError> {
        let path = self.path_of(name)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to remove {}: {}", path.display(), e),
            ))),
        }
    }

    /// Names of all completed uploads, sorted. In-flight `.part` files are skipped.
    pub fn list_names(&self) -> Result<Vec<String>, FilesError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            if UploadName::is_safe(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }
}

/// An in-flight upload.
#[derive(Debug)]
pub struct UploadWriter {
    file: Option<File>,
    part_path: PathBuf,
    final_path: PathBuf,
    name: UploadName,
    original_name: String,
    media_type: String,
    max_bytes: u64,
    size_bytes: u64,
    hasher: Sha256,
    head: Vec<u8>,
}

impl UploadWriter {
    /// Appends a chunk.
    ///
    /// # Errors
    ///
    /// Returns `FilesError::PayloadTooLarge` once the total exceeds the cap; the writer
    /// should then be dropped, which discards the partial file.
    pub fn write_chunk(&mut self, chunk: &[u8]) -> Result<(), FilesError> {
        let next = self.size_bytes.saturating_add(chunk.len() as u64);
        if next > self.max_bytes {
            return Err(FilesError::PayloadTooLarge {
                limit: self.max_bytes,
            });
        }

        let file = self
            .file
            .as_mut()
            .ok_or_else(|| std::io::Error::other("upload already finished"))?;
        file.write_all(chunk).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to write {}: {}", self.part_path.display(), e),
            ))
        })?;

        if self.head.len() < SNIFF_BYTES {
            let take = (SNIFF_BYTES - self.head.len()).min(chunk.len());
            self.head.extend_from_slice(&chunk[..take]);
        }
        self.hasher.update(chunk);
        self.size_bytes = next;
        Ok(())
    }

    /// Completes the upload and moves it to its final name.
    ///
    /// # Errors
    ///
    /// - `FilesError::UnsupportedMediaType` if the content sniffs as an executable
    /// - `FilesError::Io` if syncing or renaming fails
    pub fn finish(mut self) -> Result<StoredUpload, FilesError> {
        if let Some(kind) = infer::get(&self.head) {
            if kind.matcher_type() == infer::MatcherType::App {
                tracing::warn!(
                    "rejecting upload {}: declared {} but content is {}",
                    self.original_name,
                    self.media_type,
                    kind.mime_type()
                );
                return Err(FilesError::UnsupportedMediaType(kind.mime_type().to_string()));
            }
        }

        if let Some(file) = self.file.take() {
            file.sync_all()?;
        }
        fs::rename(&self.part_path, &self.final_path).map_err(|e| {
            FilesError::Io(std::io::Error::new(
                e.kind(),
                format!(
                    "Failed to move upload to {}: {}",
                    self.final_path.display(),
                    e
                ),
            ))
        })?;

        let digest = std::mem::take(&mut self.hasher).finalize();

        Ok(StoredUpload {
            name: self.name.to_string(),
            original_name: std::mem::take(&mut self.original_name),
            media_type: std::mem::take(&mut self.media_type),
            size_bytes: self.size_bytes,
            sha256: hex::encode(digest),
            stored_at: Utc::now(),
        })
    }
}

impl Drop for UploadWriter {
    fn drop(&mut self) {
        // `finish` renames the part file away, so this only fires for abandoned uploads.
        if self.part_path.exists() {
            self.file.take();
            if let Err(e) = fs::remove_file(&self.part_path) {
                tracing::warn!(
                    "failed to discard partial upload {}: {}",
                    self.part_path.display(),
                    e
                );
            }
        }
    }
}
