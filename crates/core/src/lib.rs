//! # Acervo Core
//!
//! Core business logic for the Acervo record services.
//!
//! This crate contains pure data operations over flat JSON files:
//! - [`index`]: `{count, items}` index documents of searchable projections
//! - [`documents`]: one JSON document per record, kept in step with an index
//! - [`query`]: filtering, locale-aware sorting and pagination of index items
//! - [`animals`], [`uploads`], [`convocatorias`]: the domain services
//!
//! **No API concerns**: HTTP servers and request decoding belong in `api-rest`.
//!
//! ## Storage Layout
//!
//! ```text
//! <data_dir>/
//!   files-index.json
//!   index.json
//!   animals/<id>.json
//! <uploads_dir>/<filename>
//! <convocatorias_dir>/
//!   convocatorias.json
//!   <filename>
//! ```

pub mod animals;
pub mod collation;
pub mod config;
pub mod constants;
pub mod convocatorias;
pub mod documents;
pub mod error;
pub mod index;
pub mod query;
pub mod uploads;
pub mod validation;

pub use animals::{AnimalDraft, AnimalRecord, AnimalService, AnimalSummary, ConservationStatus};
pub use config::CoreConfig;
pub use convocatorias::{Convocatoria, ConvocatoriaService};
pub use documents::ConsistencyReport;
pub use error::{AcervoError, AcervoResult, Issue};
pub use query::{ListQuery, Page};
pub use uploads::{FileMeta, FileService, Suggestion};

pub use acervo_files::{StoredUpload, UploadPolicy, UploadWriter};
