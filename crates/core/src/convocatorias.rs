//! Announcement ("convocatoria") uploads.
//!
//! Files are stored in the convocatorias directory next to `convocatorias.json`, a plain
//! JSON array of [`Convocatoria`] entries in upload order. Uploading requires the shared
//! password from the configuration; without one configured every upload is refused.

use crate::config::CoreConfig;
use crate::constants::{CONVOCATORIAS_LIST_FILENAME, CONVOCATORIAS_URL_PREFIX};
use crate::validation::Issues;
use crate::{AcervoError, AcervoResult};
use acervo_files::atomic::write_atomic;
use acervo_files::{
    StoredUpload, UploadName, UploadPolicy, UploadStore, UploadWriter, MAX_UPLOAD_BYTES,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use utoipa::ToSchema;

/// Media types accepted for convocatoria files.
pub const ALLOWED_CONVOCATORIA_TYPES: &[&str] = &[
    "application/pdf",
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
];

/// A published announcement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct Convocatoria {
    pub titulo: String,
    /// Download path, `/convocatorias/{filename}`
    #[serde(rename = "archivoUrl")]
    pub archivo_url: String,
    /// `pdf` for PDF files, `png` for any image
    pub tipo: String,
}

#[derive(Clone)]
pub struct ConvocatoriaService {
    files: UploadStore,
    list_path: PathBuf,
    password: Option<String>,
    lock: Arc<Mutex<()>>,
}

impl ConvocatoriaService {
    pub fn new(cfg: &CoreConfig) -> AcervoResult<Self> {
        let policy = UploadPolicy::new(MAX_UPLOAD_BYTES, ALLOWED_CONVOCATORIA_TYPES);
        Ok(Self {
            files: UploadStore::open(cfg.convocatorias_dir(), policy)?,
            list_path: cfg.convocatorias_list_path(),
            password: cfg.convocatorias_password().map(str::to_string),
            lock: Arc::new(Mutex::new(())),
        })
    }

    /// All entries in upload order; empty when nothing was published yet.
    pub fn list(&self) -> AcervoResult<Vec<Convocatoria>> {
        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.read_list()
    }

    /// Checks the shared upload password.
    ///
    /// # Errors
    ///
    /// `AcervoError::Unauthorized` when `given` is absent or wrong, or no password is configured.
    pub fn check_password(&self, given: Option<&str>) -> AcervoResult<()> {
        match (self.password.as_deref(), given) {
            (Some(expected), Some(given)) if expected == given => Ok(()),
            (None, _) => {
                tracing::warn!("convocatoria upload refused: no password configured");
                Err(AcervoError::Unauthorized)
            }
            _ => Err(AcervoError::Unauthorized),
        }
    }

    /// Trims and checks a title.
    pub fn validate_title(titulo: Option<&str>) -> AcervoResult<String> {
        let mut issues = Issues::new();
        let titulo = issues.text("titulo", titulo, 1);
        issues.finish(|| titulo.unwrap_or_default())
    }

    /// Starts receiving a convocatoria file.
    pub fn begin_upload(
        &self,
        original_name: &str,
        declared_type: &str,
    ) -> AcervoResult<UploadWriter> {
        Ok(self.files.begin(original_name, declared_type)?)
    }

    /// Appends a completed upload to the list.
    pub fn add(&self, titulo: String, stored: StoredUpload) -> AcervoResult<Convocatoria> {
        let entry = Convocatoria {
            titulo,
            archivo_url: format!("{CONVOCATORIAS_URL_PREFIX}/{}", stored.name),
            tipo: if stored.media_type == "application/pdf" {
                "pdf".into()
            } else {
                "png".into()
            },
        };

        let _guard = self.lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut list = self.read_list()?;
        list.push(entry.clone());
        let bytes = serde_json::to_vec_pretty(&list).map_err(AcervoError::Serialization)?;
        write_atomic(&self.list_path, &bytes).map_err(|source| AcervoError::FileWrite {
            path: self.list_path.clone(),
            source,
        })?;

        tracing::info!("published convocatoria {}", entry.archivo_url);
        Ok(entry)
    }

    /// Path of a stored convocatoria file, if it exists.
    ///
    /// The list file, its temp siblings and partial uploads are never served.
    pub fn file_path(&self, filename: &str) -> Option<PathBuf> {
        if filename.starts_with(CONVOCATORIAS_LIST_FILENAME)
            || filename.ends_with(".tmp")
            || filename.ends_with(".part")
            || UploadName::parse(filename).is_err()
        {
            return None;
        }
        let path = self.files.root().join(filename);
        path.is_file().then_some(path)
    }

    pub fn dir(&self) -> &Path {
        self.files.root()
    }

    fn read_list(&self) -> AcervoResult<Vec<Convocatoria>> {
        match fs::read(&self.list_path) {
            Ok(raw) => serde_json::from_slice(&raw).map_err(|source| AcervoError::Corrupt {
                path: self.list_path.clone(),
                source,
            }),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Vec::new()),
            Err(source) => Err(AcervoError::FileRead {
                path: self.list_path.clone(),
                source,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn service(temp: &TempDir, password: Option<&str>) -> ConvocatoriaService {
        let cfg = CoreConfig::new(
            temp.path().join("data"),
            temp.path().join("uploads"),
            temp.path().join("convocatorias"),
            password.map(str::to_string),
        )
        .unwrap();
        ConvocatoriaService::new(&cfg).unwrap()
    }

    fn publish(service: &ConvocatoriaService, name: &str, mime: &str) -> Convocatoria {
        let mut writer = service.begin_upload(name, mime).unwrap();
        writer.write_chunk(b"contenido").unwrap();
        service
            .add("Beca 2025".into(), writer.finish().unwrap())
            .unwrap()
    }

    #[test]
    fn list_is_empty_before_first_upload() {
        let temp = TempDir::new().unwrap();
        assert!(service(&temp, None).list().unwrap().is_empty());
    }

    #[test]
    fn add_appends_and_persists() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, Some("clave"));

        let pdf = publish(&service, "bases.pdf", "application/pdf");
        let img = publish(&service, "cartel.jpg", "image/jpeg");

        assert_eq!(pdf.tipo, "pdf");
        assert_eq!(img.tipo, "png");
        assert!(pdf.archivo_url.starts_with("/convocatorias/"));
        assert_eq!(service.list().unwrap(), vec![pdf.clone(), img]);

        let raw: serde_json::Value = serde_json::from_slice(
            &fs::read(temp.path().join("convocatorias/convocatorias.json")).unwrap(),
        )
        .unwrap();
        assert_eq!(raw[0]["archivoUrl"], pdf.archivo_url.as_str());
    }

    #[test]
    fn password_rules() {
        let temp = TempDir::new().unwrap();
        let open = service(&temp, Some("clave"));
        assert!(open.check_password(Some("clave")).is_ok());
        assert!(matches!(
            open.check_password(Some("otra")),
            Err(AcervoError::Unauthorized)
        ));
        assert!(open.check_password(None).is_err());

        let temp = TempDir::new().unwrap();
        let closed = service(&temp, None);
        assert!(closed.check_password(Some("")).is_err());
    }

    #[test]
    fn rejects_non_document_types() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, Some("clave"));
        assert!(matches!(
            service.begin_upload("datos.csv", "text/csv"),
            Err(AcervoError::UnsupportedMedia(_))
        ));
    }

    #[test]
    fn title_is_required() {
        assert_eq!(
            ConvocatoriaService::validate_title(Some("  Beca  ")).unwrap(),
            "Beca"
        );
        assert!(ConvocatoriaService::validate_title(Some(" ")).is_err());
        assert!(ConvocatoriaService::validate_title(None).is_err());
    }

    #[test]
    fn file_path_resolves_only_stored_files() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, Some("clave"));
        let entry = publish(&service, "bases.pdf", "application/pdf");
        let name = entry.archivo_url.trim_start_matches("/convocatorias/");

        assert!(service.file_path(name).is_some());
        assert!(service.file_path("nope.pdf").is_none());
        assert!(service.file_path("convocatorias.json").is_none());
        assert!(service.file_path("../data/index.json").is_none());
    }

    #[test]
    fn file_path_hides_list_temp_siblings() {
        let temp = TempDir::new().unwrap();
        let service = service(&temp, Some("clave"));
        publish(&service, "bases.pdf", "application/pdf");

        for name in [
            "convocatorias.json.1718000000000-4242-0.tmp",
            "1718000000000-abc123-bases.pdf.tmp",
        ] {
            fs::write(service.dir().join(name), b"[]").unwrap();
            assert!(service.file_path(name).is_none(), "served {name}");
        }
    }
}
