//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. Services never read environment variables during request
//! handling; binaries call [`dir_from_env_value`] and friends once and build a [`CoreConfig`].

use crate::constants::{
    ANIMALS_DIR_NAME, ANIMALS_INDEX_FILENAME, CONVOCATORIAS_LIST_FILENAME, FILES_INDEX_FILENAME,
};
use crate::{AcervoError, AcervoResult};
use std::path::{Path, PathBuf};

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    data_dir: PathBuf,
    uploads_dir: PathBuf,
    convocatorias_dir: PathBuf,
    convocatorias_password: Option<String>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `AcervoError::InvalidConfig` if a directory is empty, if two services would
    /// share one directory, or if the convocatorias password is blank.
    pub fn new(
        data_dir: PathBuf,
        uploads_dir: PathBuf,
        convocatorias_dir: PathBuf,
        convocatorias_password: Option<String>,
    ) -> AcervoResult<Self> {
        for (name, dir) in [
            ("data_dir", &data_dir),
            ("uploads_dir", &uploads_dir),
            ("convocatorias_dir", &convocatorias_dir),
        ] {
            if dir.as_os_str().is_empty() {
                return Err(AcervoError::InvalidConfig(format!("{name} cannot be empty")));
            }
        }

        if data_dir == uploads_dir {
            // Uploads are named by the client; they must never land next to the indexes.
            return Err(AcervoError::InvalidConfig(
                "uploads_dir must differ from data_dir".into(),
            ));
        }

        if matches!(&convocatorias_password, Some(p) if p.trim().is_empty()) {
            return Err(AcervoError::InvalidConfig(
                "convocatorias password cannot be blank".into(),
            ));
        }

        Ok(Self {
            data_dir,
            uploads_dir,
            convocatorias_dir,
            convocatorias_password,
        })
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn uploads_dir(&self) -> &Path {
        &self.uploads_dir
    }

    pub fn convocatorias_dir(&self) -> &Path {
        &self.convocatorias_dir
    }

    pub fn convocatorias_password(&self) -> Option<&str> {
        self.convocatorias_password.as_deref()
    }

    pub fn files_index_path(&self) -> PathBuf {
        self.data_dir.join(FILES_INDEX_FILENAME)
    }

    pub fn animals_index_path(&self) -> PathBuf {
        self.data_dir.join(ANIMALS_INDEX_FILENAME)
    }

    pub fn animals_dir(&self) -> PathBuf {
        self.data_dir.join(ANIMALS_DIR_NAME)
    }

    pub fn convocatorias_list_path(&self) -> PathBuf {
        self.convocatorias_dir.join(CONVOCATORIAS_LIST_FILENAME)
    }
}

/// Resolve a directory from an optional environment value.
///
/// `None` or a blank value yields `default`.
pub fn dir_from_env_value(value: Option<String>, default: &str) -> PathBuf {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(default))
}

/// Normalise an optional secret from the environment; blank values count as unset.
pub fn secret_from_env_value(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(password: Option<&str>) -> AcervoResult<CoreConfig> {
        CoreConfig::new(
            PathBuf::from("data"),
            PathBuf::from("uploads"),
            PathBuf::from("convocatorias"),
            password.map(str::to_string),
        )
    }

    #[test]
    fn derives_store_paths() {
        let cfg = config(None).unwrap();
        assert_eq!(cfg.files_index_path(), Path::new("data/files-index.json"));
        assert_eq!(cfg.animals_index_path(), Path::new("data/index.json"));
        assert_eq!(cfg.animals_dir(), Path::new("data/animals"));
        assert_eq!(
            cfg.convocatorias_list_path(),
            Path::new("convocatorias/convocatorias.json")
        );
    }

    #[test]
    fn rejects_blank_password() {
        assert!(matches!(config(Some("  ")), Err(AcervoError::InvalidConfig(_))));
        assert_eq!(
            config(Some("s3cret")).unwrap().convocatorias_password(),
            Some("s3cret")
        );
    }

    #[test]
    fn rejects_shared_data_and_upload_dirs() {
        let result = CoreConfig::new(
            PathBuf::from("data"),
            PathBuf::from("data"),
            PathBuf::from("convocatorias"),
            None,
        );
        assert!(matches!(result, Err(AcervoError::InvalidConfig(_))));
    }

    #[test]
    fn env_values_fall_back_to_defaults() {
        assert_eq!(dir_from_env_value(None, "data"), PathBuf::from("data"));
        assert_eq!(
            dir_from_env_value(Some("  ".into()), "data"),
            PathBuf::from("data")
        );
        assert_eq!(
            dir_from_env_value(Some("/srv/acervo".into()), "data"),
            PathBuf::from("/srv/acervo")
        );
        assert_eq!(secret_from_env_value(Some(" ".into())), None);
    }
}
