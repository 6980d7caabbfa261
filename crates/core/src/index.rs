//! Secondary index of searchable projections.
//!
//! An index is a single JSON document:
//!
//! ```json
//! { "count": 2, "items": [ { "id": "...", "_searchText": "..." }, ... ] }
//! ```
//!
//! `count == items.len()` after every write. Items keep append order; an upsert of an existing
//! id replaces the entry in place.
//!
//! Storage is abstracted behind [`RecordIndex`] so the query engine never depends on how
//! items are persisted. [`JsonFileIndex`] is the production backend; [`MemoryIndex`] backs
//! tests and tooling.
//!
//! # Concurrency
//!
//! Every operation of a [`JsonFileIndex`] is a whole-file read followed (for mutations) by a
//! whole-file atomic rewrite. Each cycle runs under the index's mutex, so writers within the
//! process are serialized and cannot lose each other's updates. Nothing coordinates separate
//! processes.

use crate::{AcervoError, AcervoResult};
use acervo_files::atomic::write_atomic;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::fs;
use std::io::ErrorKind;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// A projection kept in an index, addressed by its id.
pub trait Projection: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;
}

/// A source record that can be reflected into an index.
pub trait Indexable {
    type Entry: Projection;

    /// The reduced view stored in the index.
    fn project(&self) -> Self::Entry;

    /// Values concatenated into the search text, in order.
    fn search_fields(&self) -> Vec<&str>;
}

/// An index entry: a projection plus its derived search text.
///
/// The search text is the lower-cased, space-joined [`Indexable::search_fields`] of the source
/// record. It can only be produced by [`Indexed::of`], so it is always recomputed from the
/// record being written and never set independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Indexed<T> {
    #[serde(flatten)]
    entry: T,
    #[serde(rename = "_searchText", alias = "_q", default)]
    search_text: String,
}

impl<T: Projection> Indexed<T> {
    pub fn of<S: Indexable<Entry = T>>(source: &S) -> Self {
        Self {
            entry: source.project(),
            search_text: source.search_fields().join(" ").to_lowercase(),
        }
    }

    pub fn entry(&self) -> &T {
        &self.entry
    }

    pub fn into_entry(self) -> T {
        self.entry
    }

    pub fn search_text(&self) -> &str {
        &self.search_text
    }
}

impl<T: Projection> Projection for Indexed<T> {
    fn id(&self) -> &str {
        self.entry.id()
    }
}

/// On-disk shape of an index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexDocument<T> {
    pub count: usize,
    pub items: Vec<T>,
}

impl<T> Default for IndexDocument<T> {
    fn default() -> Self {
        Self {
            count: 0,
            items: Vec::new(),
        }
    }
}

impl<T: Projection> IndexDocument<T> {
    fn upsert(&mut self, item: T) {
        match self.items.iter().position(|i| i.id() == item.id()) {
            Some(pos) => self.items[pos] = item,
            None => self.items.push(item),
        }
        self.count = self.items.len();
    }

    fn remove(&mut self, id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id() != id);
        self.count = self.items.len();
        self.items.len() < before
    }
}

/// Storage capability set of an index.
pub trait RecordIndex<T: Projection>: Send + Sync {
    /// Creates the backing storage if absent. Idempotent; never alters existing content.
    fn ensure(&self) -> AcervoResult<()>;

    /// Inserts `item`, or replaces the entry with the same id in place.
    fn append(&self, item: T) -> AcervoResult<T>;

    fn get(&self, id: &str) -> AcervoResult<Option<T>>;

    /// Removes the entry with `id`; returns whether one was removed.
    fn remove(&self, id: &str) -> AcervoResult<bool>;

    /// All items in index order.
    fn items(&self) -> AcervoResult<Vec<T>>;

    /// Replaces the whole content, e.g. when rebuilding from documents.
    fn replace_all(&self, items: Vec<T>) -> AcervoResult<()>;
}

/// Index persisted as one pretty-printed JSON file.
pub struct JsonFileIndex<T> {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
    _items: PhantomData<fn() -> T>,
}

impl<T> Clone for JsonFileIndex<T> {
    fn clone(&self) -> Self {
        Self {
            path: self.path.clone(),
            lock: Arc::clone(&self.lock),
            _items: PhantomData,
        }
    }
}

impl<T: Projection> JsonFileIndex<T> {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Arc::new(Mutex::new(())),
            _items: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn guard(&self) -> MutexGuard<'_, ()> {
        // The state lives on disk, so a panic in another writer leaves nothing to repair.
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn ensure_locked(&self) -> AcervoResult<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|source| AcervoError::StorageDirCreation {
                    path: parent.to_path_buf(),
                    source,
                })?;
            }
        }

        match fs::metadata(&self.path) {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("creating empty index {}", self.path.display());
                self.write_locked(&IndexDocument::<T>::default())
            }
            Err(source) => Err(AcervoError::FileRead {
                path: self.path.clone(),
                source,
            }),
        }
    }

    fn read_locked(&self) -> AcervoResult<IndexDocument<T>> {
        self.ensure_locked()?;
        let raw = fs::read(&self.path).map_err(|source| AcervoError::FileRead {
            path: self.path.clone(),
            source,
        })?;
        serde_json::from_slice(&raw).map_err(|source| AcervoError::Corrupt {
            path: self.path.clone(),
            source,
        })
    }

    fn write_locked(&self, doc: &IndexDocument<T>) -> AcervoResult<()> {
        let bytes = serde_json::to_vec_pretty(doc).map_err(AcervoError::Serialization)?;
        write_atomic(&self.path, &bytes).map_err(|source| AcervoError::FileWrite {
            path: self.path.clone(),
            source,
        })
    }
}

impl<T: Projection> RecordIndex<T> for JsonFileIndex<T> {
    fn ensure(&self) -> AcervoResult<()> {
        let _guard = self.guard();
        self.ensure_locked()
    }

    fn append(&self, item: T) -> AcervoResult<T> {
        let _guard = self.guard();
        let mut doc = self.read_locked()?;
        doc.upsert(item.clone());
        self.write_locked(&doc)?;
        Ok(item)
    }

    fn get(&self, id: &str) -> AcervoResult<Option<T>> {
        let _guard = self.guard();
        let doc = self.read_locked()?;
        Ok(doc.items.into_iter().find(|i| i.id() == id))
    }

    fn remove(&self, id: &str) -> AcervoResult<bool> {
        let _guard = self.guard();
        let mut doc = self.read_locked()?;
        if !doc.remove(id) {
            return Ok(false);
        }
        self.write_locked(&doc)?;
        Ok(true)
    }

    fn items(&self) -> AcervoResult<Vec<T>> {
        let _guard = self.guard();
        Ok(self.read_locked()?.items)
    }

    fn replace_all(&self, items: Vec<T>) -> AcervoResult<()> {
        let _guard = self.guard();
        self.ensure_locked()?;
        let doc = IndexDocument {
            count: items.len(),
            items,
        };
        self.write_locked(&doc)
    }
}

/// In-process index with the same semantics as [`JsonFileIndex`].
pub struct MemoryIndex<T> {
    doc: Arc<Mutex<IndexDocument<T>>>,
}

impl<T> Clone for MemoryIndex<T> {
    fn clone(&self) -> Self {
        Self {
            doc: Arc::clone(&self.doc),
        }
    }
}

impl<T> Default for MemoryIndex<T> {
    fn default() -> Self {
        Self {
            doc: Arc::new(Mutex::new(IndexDocument::default())),
        }
    }
}

impl<T: Projection> MemoryIndex<T> {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, IndexDocument<T>> {
        self.doc.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Projection> RecordIndex<T> for MemoryIndex<T> {
    fn ensure(&self) -> AcervoResult<()> {
        Ok(())
    }

    fn append(&self, item: T) -> AcervoResult<T> {
        self.guard().upsert(item.clone());
        Ok(item)
    }

    fn get(&self, id: &str) -> AcervoResult<Option<T>> {
        Ok(self.guard().items.iter().find(|i| i.id() == id).cloned())
    }

    fn remove(&self, id: &str) -> AcervoResult<bool> {
        Ok(self.guard().remove(id))
    }

    fn items(&self) -> AcervoResult<Vec<T>> {
        Ok(self.guard().items.clone())
    }

    fn replace_all(&self, items: Vec<T>) -> AcervoResult<()> {
        let mut doc = self.guard();
        doc.count = items.len();
        doc.items = items;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        id: String,
        title: String,
        tags: Vec<String>,
    }

    impl Projection for Note {
        fn id(&self) -> &str {
            &self.id
        }
    }

    impl Indexable for Note {
        type Entry = Note;

        fn project(&self) -> Note {
            self.clone()
        }

        fn search_fields(&self) -> Vec<&str> {
            let mut fields = vec![self.title.as_str()];
            fields.extend(self.tags.iter().map(String::as_str));
            fields
        }
    }

    fn note(id: &str, title: &str) -> Indexed<Note> {
        Indexed::of(&Note {
            id: id.into(),
            title: title.into(),
            tags: vec!["Selva".into()],
        })
    }

    fn index(temp: &TempDir) -> JsonFileIndex<Indexed<Note>> {
        JsonFileIndex::new(temp.path().join("data").join("index.json"))
    }

    fn raw(index: &JsonFileIndex<Indexed<Note>>) -> serde_json::Value {
        serde_json::from_slice(&fs::read(index.path()).unwrap()).unwrap()
    }

    #[test]
    fn search_text_is_derived_and_lowercased() {
        let entry = note("a", "Ajolote Rosa");
        assert_eq!(entry.search_text(), "ajolote rosa selva");
    }

    #[test]
    fn ensure_creates_empty_index() {
        let temp = TempDir::new().unwrap();
        let index = index(&temp);

        index.ensure().unwrap();

        assert_eq!(raw(&index), serde_json::json!({"count": 0, "items": []}));
    }

    #[test]
    fn ensure_is_idempotent_on_populated_index() {
        let temp = TempDir::new().unwrap();
        let index = index(&temp);
        index.append(note("a", "Uno")).unwrap();
        index.append(note("b", "Dos")).unwrap();
        let before = fs::read(index.path()).unwrap();

        for _ in 0..5 {
            index.ensure().unwrap();
        }

        assert_eq!(fs::read(index.path()).unwrap(), before);
        assert_eq!(index.items().unwrap().len(), 2);
    }

    #[test]
    fn append_upserts_in_place_and_keeps_count() {
        let temp = TempDir::new().unwrap();
        let index = index(&temp);
        index.append(note("a", "Uno")).unwrap();
        index.append(note("b", "Dos")).unwrap();
        index.append(note("a", "Uno bis")).unwrap();

        let doc = raw(&index);
        assert_eq!(doc["count"], 2);
        assert_eq!(doc["items"][0]["id"], "a");
        assert_eq!(doc["items"][0]["title"], "Uno bis");
        assert_eq!(doc["items"][0]["_searchText"], "uno bis selva");
        assert_eq!(doc["items"][1]["id"], "b");
    }

    #[test]
    fn get_and_remove() {
        let temp = TempDir::new().unwrap();
        let index = index(&temp);
        index.append(note("a", "Uno")).unwrap();

        assert_eq!(index.get("a").unwrap().unwrap().entry().title, "Uno");
        assert!(index.get("zzz").unwrap().is_none());

        assert!(index.remove("a").unwrap());
        assert!(!index.remove("a").unwrap());
        assert_eq!(raw(&index)["count"], 0);
    }

    #[test]
    fn malformed_index_is_an_error_not_a_reset() {
        let temp = TempDir::new().unwrap();
        let index = index(&temp);
        fs::create_dir_all(index.path().parent().unwrap()).unwrap();
        fs::write(index.path(), b"{ not json").unwrap();

        let result = index.items();

        assert!(matches!(result, Err(AcervoError::Corrupt { .. })));
        assert_eq!(fs::read(index.path()).unwrap(), b"{ not json");
    }

    #[test]
    fn legacy_search_key_is_accepted() {
        let temp = TempDir::new().unwrap();
        let index = index(&temp);
        fs::create_dir_all(index.path().parent().unwrap()).unwrap();
        fs::write(
            index.path(),
            br#"{"count":1,"items":[{"id":"a","title":"Uno","tags":[],"_q":"uno legacy"}]}"#,
        )
        .unwrap();

        let item = index.get("a").unwrap().unwrap();
        assert_eq!(item.search_text(), "uno legacy");
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let temp = TempDir::new().unwrap();
        let index = index(&temp);
        index.ensure().unwrap();

        let handles: Vec<_> = (0..8)
            .map(|t| {
                let index = index.clone();
                std::thread::spawn(move || {
                    for n in 0..10 {
                        index.append(note(&format!("{t}-{n}"), "x")).unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(index.items().unwrap().len(), 80);
        assert_eq!(raw(&index)["count"], 80);
    }

    #[test]
    fn memory_index_matches_file_semantics() {
        let index = MemoryIndex::new();
        index.append(note("a", "Uno")).unwrap();
        index.append(note("b", "Dos")).unwrap();
        index.append(note("a", "Uno bis")).unwrap();

        let ids: Vec<_> = index
            .items()
            .unwrap()
            .iter()
            .map(|i| i.id().to_string())
            .collect();
        assert_eq!(ids, vec!["a", "b"]);
        assert!(index.remove("b").unwrap());
        assert!(!index.remove("b").unwrap());
    }
}
