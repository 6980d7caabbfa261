//! One JSON document per record, paired with an index entry.
//!
//! Layout inside the store directory:
//!
//! ```text
//! <dir>/
//!   <record id>.json
//! ```
//!
//! The document is always written before its index entry. A crash between the two leaves an
//! unindexed document, which [`DocumentStore::verify`] reports and
//! [`DocumentStore::rebuild_index`] repairs.

use crate::index::{Indexable, Indexed, RecordIndex};
use crate::{AcervoError, AcervoResult};
use acervo_files::atomic::write_atomic;
use acervo_id::RecordId;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// How many fresh ids are tried before giving up on a create.
const ID_ATTEMPTS: usize = 5;

/// A record persisted as its own JSON document.
pub trait Document: Indexable + Serialize + DeserializeOwned + Clone + Send + Sync {
    fn id(&self) -> &str;
}

/// Differences between an index and the records it describes.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct ConsistencyReport {
    /// Number of index entries inspected
    pub indexed: usize,

    /// Number of stored records inspected
    pub stored: usize,

    /// Ids present in the index with no stored record
    pub dangling_entries: Vec<String>,

    /// Ids of stored records missing from the index
    pub unindexed: Vec<String>,
}

impl ConsistencyReport {
    pub fn compare(indexed: &[String], stored: &[String]) -> Self {
        let index_ids: BTreeSet<&String> = indexed.iter().collect();
        let stored_ids: BTreeSet<&String> = stored.iter().collect();
        Self {
            indexed: indexed.len(),
            stored: stored.len(),
            dangling_entries: index_ids
                .difference(&stored_ids)
                .map(|s| s.to_string())
                .collect(),
            unindexed: stored_ids
                .difference(&index_ids)
                .map(|s| s.to_string())
                .collect(),
        }
    }

    pub fn is_consistent(&self) -> bool {
        self.dangling_entries.is_empty() && self.unindexed.is_empty()
    }
}

/// Store of `D` documents plus their index.
pub struct DocumentStore<D: Document> {
    dir: PathBuf,
    index: Arc<dyn RecordIndex<Indexed<D::Entry>>>,
    write_lock: Arc<Mutex<()>>,
}

impl<D: Document> Clone for DocumentStore<D> {
    fn clone(&self) -> Self {
        Self {
            dir: self.dir.clone(),
            index: Arc::clone(&self.index),
            write_lock: Arc::clone(&self.write_lock),
        }
    }
}

impl<D: Document> DocumentStore<D> {
    /// Opens the store, creating the directory and an empty index when absent.
    pub fn open(
        dir: impl Into<PathBuf>,
        index: Arc<dyn RecordIndex<Indexed<D::Entry>>>,
    ) -> AcervoResult<Self> {
        let dir = dir.into();
        fs::create_dir_all(&dir).map_err(|source| AcervoError::StorageDirCreation {
            path: dir.clone(),
            source,
        })?;
        index.ensure()?;
        Ok(Self {
            dir,
            index,
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn index(&self) -> &dyn RecordIndex<Indexed<D::Entry>> {
        self.index.as_ref()
    }

    fn document_path(&self, id: &RecordId) -> PathBuf {
        self.dir.join(id.document_filename())
    }

    /// Creates a record under a fresh id.
    ///
    /// `build` receives the allocated id and the creation time, which is also the initial
    /// update time.
    ///
    /// # Errors
    ///
    /// Returns `AcervoError::IdAllocation` if no unused id was found, or a storage error if
    /// the document or index write fails.
    pub fn create(&self, build: impl FnOnce(RecordId, DateTime<Utc>) -> D) -> AcervoResult<D> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut allocated = None;
        for _ in 0..ID_ATTEMPTS {
            let id = RecordId::generate();
            if !self.document_path(&id).exists() {
                allocated = Some(id);
                break;
            }
        }
        let id = allocated.ok_or(AcervoError::IdAllocation(ID_ATTEMPTS))?;

        let path = self.document_path(&id);
        let record = build(id, Utc::now());
        self.write_document(&path, &record)?;
        self.index.append(Indexed::of(&record))?;

        tracing::info!("created document {}", path.display());
        Ok(record)
    }

    /// Reads a record. Ids that are not well-formed are reported as absent.
    ///
    /// # Errors
    ///
    /// Any failure other than the document not existing, including malformed JSON.
    pub fn read(&self, id: &str) -> AcervoResult<Option<D>> {
        let Ok(id) = RecordId::parse(id) else {
            return Ok(None);
        };
        self.read_path(&self.document_path(&id))
    }

    fn read_path(&self, path: &Path) -> AcervoResult<Option<D>> {
        let raw = match fs::read(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(AcervoError::FileRead {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };
        serde_json::from_slice(&raw)
            .map(Some)
            .map_err(|source| AcervoError::Corrupt {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Applies `change` to an existing record and re-registers its projection.
    ///
    /// `change` receives the current record and the update time. Returns `Ok(None)` when the
    /// record does not exist.
    ///
    /// # Errors
    ///
    /// Whatever `change` returns, or a storage error. `change` must keep the record id.
    pub fn update(
        &self,
        id: &str,
        change: impl FnOnce(D, DateTime<Utc>) -> AcervoResult<D>,
    ) -> AcervoResult<Option<D>> {
        let Ok(id) = RecordId::parse(id) else {
            return Ok(None);
        };
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.document_path(&id);
        let Some(current) = self.read_path(&path)? else {
            return Ok(None);
        };

        let updated = change(current, Utc::now())?;
        if updated.id() != id.to_string() {
            return Err(AcervoError::IdChanged(id.to_string()));
        }

        self.write_document(&path, &updated)?;
        self.index.append(Indexed::of(&updated))?;

        tracing::info!("updated document {}", path.display());
        Ok(Some(updated))
    }

    /// Deletes a record and its index entry. Returns `false` if the document did not exist.
    pub fn delete(&self, id: &str) -> AcervoResult<bool> {
        let Ok(id) = RecordId::parse(id) else {
            return Ok(false);
        };
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let path = self.document_path(&id);
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
            Err(source) => return Err(AcervoError::FileRemove { path, source }),
        }
        self.index.remove(&id.to_string())?;

        tracing::info!("deleted document {}", path.display());
        Ok(true)
    }

    /// Ids of all stored documents, sorted. Files that are not `<id>.json` are ignored.
    pub fn list_ids(&self) -> AcervoResult<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(AcervoError::FileRead {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut ids = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name();
            let Some(stem) = name.to_str().and_then(|n| n.strip_suffix(".json")) else {
                continue;
            };
            if RecordId::is_canonical(stem) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Compares the index with the documents on disk.
    pub fn verify(&self) -> AcervoResult<ConsistencyReport> {
        use crate::index::Projection;

        let indexed: Vec<String> = self
            .index
            .items()?
            .iter()
            .map(|i| i.id().to_string())
            .collect();
        Ok(ConsistencyReport::compare(&indexed, &self.list_ids()?))
    }

    /// Rewrites the index from the documents on disk, ordered by id.
    ///
    /// Returns the number of indexed records.
    pub fn rebuild_index(&self) -> AcervoResult<usize> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);

        let mut entries = Vec::new();
        for id in self.list_ids()? {
            let path = self.dir.join(format!("{id}.json"));
            match self.read_path(&path)? {
                Some(record) => entries.push(Indexed::of(&record)),
                None => tracing::warn!("document vanished during rebuild: {}", path.display()),
            }
        }

        let count = entries.len();
        self.index.replace_all(entries)?;
        tracing::info!("rebuilt index with {count} entries");
        Ok(count)
    }

    fn write_document(&self, path: &Path, record: &D) -> AcervoResult<()> {
        let bytes = serde_json::to_vec_pretty(record).map_err(AcervoError::Serialization)?;
        write_atomic(path, &bytes).map_err(|source| AcervoError::FileWrite {
            path: path.to_path_buf(),
            source,
        })
    }
}
