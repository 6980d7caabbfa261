//! Constants used throughout the Acervo core crate.
//!
//! This module contains all path and filename constants to ensure
//! consistency across the codebase and make maintenance easier.

/// Default directory for JSON indexes and documents.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Default directory for uploaded binaries.
pub const DEFAULT_UPLOADS_DIR: &str = "uploads";

/// Default directory for convocatoria files and their list.
pub const DEFAULT_CONVOCATORIAS_DIR: &str = "convocatorias";

/// Filename of the uploaded-files index inside the data directory.
pub const FILES_INDEX_FILENAME: &str = "files-index.json";

/// Filename of the animal catalog index inside the data directory.
pub const ANIMALS_INDEX_FILENAME: &str = "index.json";

/// Directory name of the animal documents inside the data directory.
pub const ANIMALS_DIR_NAME: &str = "animals";

/// Filename of the convocatoria list inside the convocatorias directory.
pub const CONVOCATORIAS_LIST_FILENAME: &str = "convocatorias.json";

/// Public URL prefix under which uploads are served.
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Public URL prefix under which convocatoria files are served.
pub const CONVOCATORIAS_URL_PREFIX: &str = "/convocatorias";

pub const DEFAULT_PAGE: i64 = 1;
pub const DEFAULT_LIMIT: i64 = 20;

/// Number of entries returned by the filename autocomplete.
pub const SUGGEST_LIMIT: i64 = 10;

/// Per-file size cap of uploads (20 MiB).
pub use acervo_files::MAX_UPLOAD_BYTES;
