//! # API Shared
//!
//! Shared wire types and services for the Acervo servers.
//!
//! Contains:
//! - Response bodies that are not domain records (`HealthRes`, `ErrorRes`, ...)
//! - Multipart form descriptions used by the OpenAPI document
//! - [`HealthService`]
//!
//! Domain records (`FileMeta`, `AnimalRecord`, `Convocatoria`) are defined in `acervo-core`
//! and serialized as they are.

use acervo_core::{FileMeta, Issue, Suggestion};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

pub mod health;

pub use health::HealthService;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct HealthRes {
    pub ok: bool,
    /// Seconds since the server started
    pub uptime: f64,
}

/// Body of every error response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct ErrorRes {
    pub error: String,
    /// Field-level problems, for validation failures
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<Issue>>,
}

impl ErrorRes {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            details: None,
        }
    }

    pub fn with_details(error: impl Into<String>, details: Vec<Issue>) -> Self {
        Self {
            error: error.into(),
            details: Some(details),
        }
    }
}

/// Files accepted by a multi-file upload.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct UploadManyRes {
    pub files: Vec<FileMeta>,
}

#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct SuggestRes {
    pub q: String,
    pub suggestions: Vec<Suggestion>,
}

/// `multipart/form-data` body of `POST /upload`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    pub file: Vec<u8>,
    /// Comma-separated tags
    pub tags: Option<String>,
}

/// `multipart/form-data` body of `POST /uploads`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadManyForm {
    /// Up to 10 files, sent as `files` or `files[]`
    #[schema(value_type = Vec<String>, format = Binary)]
    pub files: Vec<Vec<u8>>,
    /// Comma-separated tags applied to every file
    pub tags: Option<String>,
}

/// `multipart/form-data` body of `POST /api/convocatorias`.
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct ConvocatoriaForm {
    pub titulo: String,
    pub password: String,
    /// PDF or image
    #[schema(value_type = String, format = Binary)]
    pub archivo: Vec<u8>,
}
