//! Uploaded-file registry.
//!
//! Binaries are stored by [`acervo_files::UploadStore`] under the uploads directory; their
//! metadata lives in `{data_dir}/files-index.json`. The stored filename is the file's id.

use crate::config::CoreConfig;
use crate::constants::{SUGGEST_LIMIT, UPLOADS_URL_PREFIX};
use crate::documents::ConsistencyReport;
use crate::index::{Indexable, Indexed, JsonFileIndex, Projection, RecordIndex};
use crate::query::{self, ListQuery, Page, Queryable, SortValue};
use crate::{AcervoError, AcervoResult};
use acervo_files::{StoredUpload, UploadName, UploadPolicy, UploadStore, UploadWriter};
use acervo_types::TagSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use utoipa::ToSchema;

/// Sort key used when a listing names none.
pub const DEFAULT_SORT: &str = "created_at";

/// Metadata of an uploaded file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct FileMeta {
    /// Same as `filename`
    pub id: String,
    /// Public path, `/uploads/{filename}`
    pub url: String,
    /// Stored filename
    pub filename: String,
    /// Filename as sent by the client
    pub originalname: String,
    pub mimetype: String,
    /// Extension of the stored filename, without the dot
    pub ext: String,
    pub size: u64,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
    /// Hex SHA-256 of the content; absent for entries registered before checksums existed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sha256: Option<String>,
}

impl FileMeta {
    pub fn from_upload(stored: StoredUpload, tags: &TagSet) -> Self {
        let ext = UploadName::parse(&stored.name)
            .map(|n| n.extension())
            .unwrap_or_default();
        Self {
            id: stored.name.clone(),
            url: format!("{UPLOADS_URL_PREFIX}/{}", stored.name),
            filename: stored.name,
            originalname: stored.original_name,
            mimetype: stored.media_type,
            ext,
            size: stored.size_bytes,
            tags: tags.iter().cloned().collect(),
            created_at: stored.stored_at,
            sha256: Some(stored.sha256),
        }
    }
}

impl Projection for FileMeta {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Indexable for FileMeta {
    type Entry = FileMeta;

    fn project(&self) -> FileMeta {
        self.clone()
    }

    fn search_fields(&self) -> Vec<&str> {
        let mut fields = vec![
            self.filename.as_str(),
            self.originalname.as_str(),
            self.mimetype.as_str(),
            self.ext.as_str(),
        ];
        fields.extend(self.tags.iter().map(String::as_str));
        fields
    }
}

impl Queryable for Indexed<FileMeta> {
    const SORT_KEYS: &'static [&'static str] = &["filename", "size", "created_at"];

    fn search_text(&self) -> &str {
        Indexed::search_text(self)
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "mime" => Some(&self.entry().mimetype),
            "ext" => Some(&self.entry().ext),
            _ => None,
        }
    }

    fn tags(&self) -> &[String] {
        &self.entry().tags
    }

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        let e = self.entry();
        match key {
            "size" => SortValue::Number(e.size),
            "created_at" => SortValue::Time(e.created_at),
            _ => SortValue::Text(&e.filename),
        }
    }
}

/// One autocomplete hit.
#[derive(Debug, Clone, PartialEq, Serialize, ToSchema)]
pub struct Suggestion {
    pub id: String,
    pub filename: String,
    pub url: String,
}

/// File service operations.
#[derive(Clone)]
pub struct FileService {
    uploads: UploadStore,
    index: Arc<dyn RecordIndex<Indexed<FileMeta>>>,
}

impl FileService {
    /// Opens the uploads directory and the file index named by `cfg`.
    pub fn new(cfg: &CoreConfig) -> AcervoResult<Self> {
        let index: JsonFileIndex<Indexed<FileMeta>> = JsonFileIndex::new(cfg.files_index_path());
        Self::with_parts(cfg.uploads_dir(), UploadPolicy::default(), Arc::new(index))
    }

    pub fn with_parts(
        uploads_dir: &Path,
        policy: UploadPolicy,
        index: Arc<dyn RecordIndex<Indexed<FileMeta>>>,
    ) -> AcervoResult<Self> {
        let uploads = UploadStore::open(uploads_dir, policy)?;
        index.ensure()?;
        Ok(Self { uploads, index })
    }

    pub fn uploads_dir(&self) -> &Path {
        self.uploads.root()
    }

    /// Path of a stored binary, if `name` is a safe upload name and the file exists.
    pub fn stored_path(&self, name: &str) -> Option<PathBuf> {
        let path = self.uploads.path_of(name).ok()?;
        path.is_file().then_some(path)
    }

    /// Starts receiving a file. Disallowed declared types fail before anything is written.
    pub fn begin_upload(
        &self,
        original_name: &str,
        declared_type: &str,
    ) -> AcervoResult<UploadWriter> {
        Ok(self.uploads.begin(original_name, declared_type)?)
    }

    /// Records a completed upload in the index.
    pub fn register(&self, stored: StoredUpload, tags: &TagSet) -> AcervoResult<FileMeta> {
        let meta = FileMeta::from_upload(stored, tags);
        self.index.append(Indexed::of(&meta))?;
        tracing::info!("registered upload {} ({} bytes)", meta.filename, meta.size);
        Ok(meta)
    }

    pub fn list(&self, query: &ListQuery) -> AcervoResult<Page<FileMeta>> {
        let items = self.index.items()?;
        Ok(query::run(items, query).map(Indexed::into_entry))
    }

    pub fn get(&self, id: &str) -> AcervoResult<Option<FileMeta>> {
        Ok(self.index.get(id)?.map(Indexed::into_entry))
    }

    /// Removes the binary and then the index entry.
    ///
    /// Returns `false` if no entry had this id. A binary that is already gone is not an error;
    /// any other unlink failure is returned and the entry stays indexed.
    pub fn delete(&self, id: &str) -> AcervoResult<bool> {
        if self.index.get(id)?.is_none() {
            return Ok(false);
        }
        if !self.uploads.remove(id).map_err(AcervoError::Files)? {
            tracing::warn!("upload {id} was indexed but already missing on disk");
        }
        self.index.remove(id)?;
        tracing::info!("deleted upload {id}");
        Ok(true)
    }

    /// Up to ten files whose search text contains `q`, by filename.
    pub fn suggest(&self, q: &str) -> AcervoResult<Vec<Suggestion>> {
        let query = ListQuery::new()
            .search(Some(q.to_string()))
            .sort(None, "filename")
            .limit(SUGGEST_LIMIT);
        Ok(self
            .list(&query)?
            .items
            .into_iter()
            .map(|m| Suggestion {
                id: m.id,
                filename: m.filename,
                url: m.url,
            })
            .collect())
    }

    /// Compares the index with the binaries in the uploads directory.
    pub fn verify(&self) -> AcervoResult<ConsistencyReport> {
        let indexed: Vec<String> = self
            .index
            .items()?
            .iter()
            .map(|i| i.id().to_string())
            .collect();
        let stored = self.uploads.list_names()?;
        Ok(ConsistencyReport::compare(&indexed, &stored))
    }
}
