use std::path::PathBuf;

/// A single field-level validation problem.
///
/// `path` is the dotted location of the offending value (`tags.2`, `extra`), or empty when
/// the problem concerns the whole request body.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct Issue {
    pub path: String,
    pub message: String,
}

impl Issue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AcervoError {
    #[error("validation failed")]
    Validation(Vec<Issue>),
    #[error("{0} not found")]
    NotFound(String),
    #[error("unsupported media type: {0}")]
    UnsupportedMedia(String),
    #[error("file exceeds the maximum size of {limit} bytes")]
    PayloadTooLarge { limit: u64 },
    #[error("unauthorized")]
    Unauthorized,

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to create storage directory {path}: {source}", path = path.display())]
    StorageDirCreation {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read {path}: {source}", path = path.display())]
    FileRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write {path}: {source}", path = path.display())]
    FileWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to remove {path}: {source}", path = path.display())]
    FileRemove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed JSON in {path}: {source}", path = path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("failed to serialize record: {0}")]
    Serialization(serde_json::Error),
    #[error("update of record {0} must keep its id")]
    IdChanged(String),
    #[error("failed to allocate a unique record id after {0} attempts")]
    IdAllocation(usize),
    #[error("file storage error: {0}")]
    Files(#[source] acervo_files::FilesError),
}

impl AcervoError {
    /// Convenience constructor for a validation error with a single issue.
    pub fn invalid(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation(vec![Issue::new(path, message)])
    }

    /// True for errors caused by the request rather than by the server.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::Validation(_)
                | Self::NotFound(_)
                | Self::UnsupportedMedia(_)
                | Self::PayloadTooLarge { .. }
                | Self::Unauthorized
        )
    }
}

impl From<acervo_files::FilesError> for AcervoError {
    fn from(e: acervo_files::FilesError) -> Self {
        use acervo_files::FilesError;
        match e {
            FilesError::UnsupportedMediaType(media_type) => Self::UnsupportedMedia(media_type),
            FilesError::PayloadTooLarge { limit } => Self::PayloadTooLarge { limit },
            FilesError::InvalidName(e) => Self::NotFound(e.to_string()),
            other => Self::Files(other),
        }
    }
}

pub type AcervoResult<T> = std::result::Result<T, AcervoError>;
