//! Acervo File Storage
//!
//! Low-level file mechanics shared by every Acervo store:
//!
//! - [`atomic`]: write-to-temp-then-rename so readers never observe a partially written file
//! - [`UploadStore`]: streamed storage of uploaded binaries with a size cap, a MIME
//!   allow-list and best-effort content sniffing
//!
//! ## Storage Layout
//!
//! ```text
//! <uploads_dir>/
//! ├── 1718000000000-a8Zk3Q-ajolote.png
//! ├── 1718000000412-Zt0_pq-informe.pdf
//! └── .1718000000900-Qm9xk1-nota.txt.part   # in-flight upload, renamed on completion
//! ```
//!
//! ## Known Gap
//!
//! Atomic rename protects a single file. Related files (a document and the index that
//! references it) are written one after the other, so a crash between the two writes can
//! leave them inconsistent.
//!
//! ## Example Usage
//!
//! ```no_run
//! use acervo_files::{UploadPolicy, UploadStore};
//! use std::path::Path;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let store = UploadStore::open(Path::new("uploads"), UploadPolicy::default())?;
//! let mut writer = store.begin("nota.txt", "text/plain")?;
//! writer.write_chunk(b"hola mundo")?;
//! let stored = writer.finish()?;
//! assert_eq!(stored.size_bytes, 10);
//! # Ok(())
//! # }
//! ```

pub mod atomic;
mod uploads;

pub use acervo_id::UploadName;
pub use uploads::{
    essence, StoredUpload, UploadPolicy, UploadStore, UploadWriter, ALLOWED_UPLOAD_TYPES,
    MAX_UPLOAD_BYTES,
};

/// Errors that can occur during file operations
#[derive(Debug, thiserror::Error)]
pub enum FilesError {
    /// Root directory could not be created or is not a directory
    #[error("Invalid root directory: {0}")]
    InvalidRootDirectory(String),

    /// Filename failed validation (potential directory traversal or unsafe path)
    #[error("Invalid filename: {0}")]
    InvalidName(#[from] acervo_id::IdError),

    /// Declared or sniffed media type is not accepted
    #[error("Unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Upload exceeded the configured size cap
    #[error("File exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },

    /// I/O error occurred
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
