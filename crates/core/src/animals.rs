//! Animal fact-sheet catalog.
//!
//! Each animal is a JSON document under `{data_dir}/animals/`; the searchable projection
//! lives in `{data_dir}/index.json`.

use crate::config::CoreConfig;
use crate::constants::UPLOADS_URL_PREFIX;
use crate::documents::{ConsistencyReport, Document, DocumentStore};
use crate::index::{Indexable, Indexed, JsonFileIndex, Projection, RecordIndex};
use crate::query::{self, ListQuery, Page, Queryable, SortValue};
use crate::validation::{is_http_url, Issues};
use crate::AcervoResult;
use acervo_types::TagSet;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use utoipa::ToSchema;

/// Sort key used when a listing names none.
pub const DEFAULT_SORT: &str = "nombre";

const MIN_NAME_CHARS: usize = 2;
const MIN_DESCRIPTION_CHARS: usize = 10;

/// IUCN conservation status, plus `ND` for "not determined".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum ConservationStatus {
    #[serde(rename = "CR")]
    CriticallyEndangered,
    #[serde(rename = "EN")]
    Endangered,
    #[serde(rename = "VU")]
    Vulnerable,
    #[serde(rename = "NT")]
    NearThreatened,
    #[serde(rename = "LC")]
    LeastConcern,
    #[default]
    #[serde(rename = "ND")]
    NotDetermined,
}

/// Free-form additional attributes of an animal.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtraFields(Map<String, Value>);

impl ExtraFields {
    pub const MAX_KEYS: usize = 64;
    pub const MAX_DEPTH: usize = 4;
    pub const MAX_BYTES: usize = 16 * 1024;

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    fn check(&self, issues: &mut Issues) {
        if self.0.len() > Self::MAX_KEYS {
            issues.push(
                "extra",
                format!("must have at most {} keys", Self::MAX_KEYS),
            );
        }
        if self.0.values().map(depth).max().unwrap_or(0) >= Self::MAX_DEPTH {
            issues.push(
                "extra",
                format!("must not nest deeper than {} levels", Self::MAX_DEPTH),
            );
        }
        match serde_json::to_vec(&self.0) {
            Ok(bytes) if bytes.len() <= Self::MAX_BYTES => {}
            _ => issues.push(
                "extra",
                format!("must serialize to at most {} bytes", Self::MAX_BYTES),
            ),
        }
    }
}

impl From<Map<String, Value>> for ExtraFields {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

/// Container nesting below a value: 0 for scalars.
fn depth(value: &Value) -> usize {
    match value {
        Value::Array(items) => 1 + items.iter().map(depth).max().unwrap_or(0),
        Value::Object(map) => 1 + map.values().map(depth).max().unwrap_or(0),
        _ => 0,
    }
}

/// Client input for creating or patching an animal.
///
/// On create every required field must be present; on patch absent fields keep their stored
/// value. An `imagen_url` of `""` clears the image.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, ToSchema)]
#[serde(deny_unknown_fields)]
pub struct AnimalDraft {
    /// Accepted for compatibility and ignored; ids are assigned by the server.
    #[serde(default)]
    pub id: Option<String>,
    pub nombre: Option<String>,
    pub nombre_cientifico: Option<String>,
    pub especie: Option<String>,
    pub habitat: Option<String>,
    pub descripcion: Option<String>,
    pub estatus_conservacion: Option<ConservationStatus>,
    pub tags: Option<Vec<String>>,
    pub imagen_url: Option<String>,
    pub fuente: Option<String>,
    #[schema(value_type = Option<Object>)]
    pub extra: Option<Map<String, Value>>,
}

impl AnimalDraft {
    /// Overlays the fields present in `patch`.
    fn overlay(mut self, patch: AnimalDraft) -> Self {
        macro_rules! take {
            ($($field:ident),*) => {
                $(if patch.$field.is_some() { self.$field = patch.$field; })*
            };
        }
        take!(
            nombre,
            nombre_cientifico,
            especie,
            habitat,
            descripcion,
            estatus_conservacion,
            tags,
            imagen_url,
            fuente,
            extra
        );
        self
    }

    /// Validates the draft into a complete set of fields.
    ///
    /// # Errors
    ///
    /// `AcervoError::Validation` listing every failing field.
    pub fn validate(self) -> AcervoResult<AnimalFields> {
        let mut issues = Issues::new();

        let nombre = issues.text("nombre", self.nombre.as_deref(), MIN_NAME_CHARS);
        let nombre_cientifico = issues.text(
            "nombre_cientifico",
            self.nombre_cientifico.as_deref(),
            MIN_NAME_CHARS,
        );
        let especie = issues.text("especie", self.especie.as_deref(), MIN_NAME_CHARS);
        let habitat = issues.text("habitat", self.habitat.as_deref(), MIN_NAME_CHARS);
        let descripcion = issues.text(
            "descripcion",
            self.descripcion.as_deref(),
            MIN_DESCRIPTION_CHARS,
        );

        let imagen_url = self
            .imagen_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if let Some(url) = &imagen_url {
            let local = url.starts_with(&format!("{UPLOADS_URL_PREFIX}/"));
            if !local && !is_http_url(url) {
                issues.push(
                    "imagen_url",
                    format!("must start with {UPLOADS_URL_PREFIX}/ or be an http(s) URL"),
                );
            }
        }

        let extra = self.extra.map(ExtraFields::from);
        if let Some(extra) = &extra {
            extra.check(&mut issues);
        }

        issues.finish(|| AnimalFields {
            nombre: nombre.unwrap_or_default(),
            nombre_cientifico: nombre_cientifico.unwrap_or_default(),
            especie: especie.unwrap_or_default(),
            habitat: habitat.unwrap_or_default(),
            descripcion: descripcion.unwrap_or_default(),
            estatus_conservacion: self.estatus_conservacion.unwrap_or_default(),
            tags: self.tags.unwrap_or_default().into_iter().collect(),
            imagen_url,
            fuente: self.fuente.map(|f| f.trim().to_string()),
            extra,
        })
    }
}

/// Validated animal attributes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnimalFields {
    pub nombre: String,
    pub nombre_cientifico: String,
    pub especie: String,
    pub habitat: String,
    pub descripcion: String,
    #[serde(default)]
    pub estatus_conservacion: ConservationStatus,
    #[serde(default)]
    #[schema(value_type = Vec<String>)]
    pub tags: TagSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub imagen_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fuente: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Option<Object>)]
    pub extra: Option<ExtraFields>,
}

impl From<&AnimalFields> for AnimalDraft {
    fn from(fields: &AnimalFields) -> Self {
        Self {
            id: None,
            nombre: Some(fields.nombre.clone()),
            nombre_cientifico: Some(fields.nombre_cientifico.clone()),
            especie: Some(fields.especie.clone()),
            habitat: Some(fields.habitat.clone()),
            descripcion: Some(fields.descripcion.clone()),
            estatus_conservacion: Some(fields.estatus_conservacion),
            tags: Some(fields.tags.iter().cloned().collect()),
            imagen_url: fields.imagen_url.clone(),
            fuente: fields.fuente.clone(),
            extra: fields.extra.as_ref().map(|e| e.as_map().clone()),
        }
    }
}

/// A stored animal fact-sheet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnimalRecord {
    pub id: String,
    #[serde(flatten)]
    pub fields: AnimalFields,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Index projection of an animal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct AnimalSummary {
    pub id: String,
    pub nombre: String,
    pub nombre_cientifico: String,
    pub especie: String,
    pub habitat: String,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl Projection for AnimalSummary {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Indexable for AnimalRecord {
    type Entry = AnimalSummary;

    fn project(&self) -> AnimalSummary {
        AnimalSummary {
            id: self.id.clone(),
            nombre: self.fields.nombre.clone(),
            nombre_cientifico: self.fields.nombre_cientifico.clone(),
            especie: self.fields.especie.clone(),
            habitat: self.fields.habitat.clone(),
            tags: self.fields.tags.iter().cloned().collect(),
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        let f = &self.fields;
        let mut fields = vec![
            f.nombre.as_str(),
            f.nombre_cientifico.as_str(),
            f.especie.as_str(),
            f.habitat.as_str(),
            f.descripcion.as_str(),
        ];
        fields.extend(f.tags.iter().map(String::as_str));
        fields
    }
}

impl Document for AnimalRecord {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Queryable for Indexed<AnimalSummary> {
    const SORT_KEYS: &'static [&'static str] =
        &["id", "nombre", "nombre_cientifico", "especie", "habitat"];

    fn search_text(&self) -> &str {
        Indexed::search_text(self)
    }

    fn field(&self, name: &str) -> Option<&str> {
        match name {
            "especie" => Some(&self.entry().especie),
            "habitat" => Some(&self.entry().habitat),
            _ => None,
        }
    }

    fn tags(&self) -> &[String] {
        &self.entry().tags
    }

    fn sort_value(&self, key: &str) -> SortValue<'_> {
        let e = self.entry();
        SortValue::Text(match key {
            "id" => &e.id,
            "nombre_cientifico" => &e.nombre_cientifico,
            "especie" => &e.especie,
            "habitat" => &e.habitat,
            _ => &e.nombre,
        })
    }
}

/// Animal catalog operations.
#[derive(Clone)]
pub struct AnimalService {
    store: DocumentStore<AnimalRecord>,
}

impl AnimalService {
    /// Opens the catalog under the configured data directory.
    pub fn new(cfg: &CoreConfig) -> AcervoResult<Self> {
        let index: JsonFileIndex<Indexed<AnimalSummary>> =
            JsonFileIndex::new(cfg.animals_index_path());
        Self::with_index(cfg, Arc::new(index))
    }

    /// Opens the catalog with an explicit index backend.
    pub fn with_index(
        cfg: &CoreConfig,
        index: Arc<dyn RecordIndex<Indexed<AnimalSummary>>>,
    ) -> AcervoResult<Self> {
        Ok(Self {
            store: DocumentStore::open(cfg.animals_dir(), index)?,
        })
    }

    pub fn list(&self, query: &ListQuery) -> AcervoResult<Page<AnimalSummary>> {
        let items = self.store.index().items()?;
        Ok(query::run(items, query).map(Indexed::into_entry))
    }

    pub fn get(&self, id: &str) -> AcervoResult<Option<AnimalRecord>> {
        self.store.read(id)
    }

    /// Validates `draft` and stores it under a fresh id. A client-supplied id is ignored.
    pub fn create(&self, draft: AnimalDraft) -> AcervoResult<AnimalRecord> {
        let fields = draft.validate()?;
        self.store.create(|id, now| AnimalRecord {
            id: id.to_string(),
            fields,
            created_at: now,
            updated_at: now,
        })
    }

    /// Merges `patch` over the stored fields and validates the result.
    ///
    /// Returns `Ok(None)` when the animal does not exist.
    pub fn update(&self, id: &str, patch: AnimalDraft) -> AcervoResult<Option<AnimalRecord>> {
        self.store.update(id, |current, now| {
            let fields = AnimalDraft::from(&current.fields).overlay(patch).validate()?;
            Ok(AnimalRecord {
                fields,
                updated_at: now,
                ..current
            })
        })
    }

    pub fn delete(&self, id: &str) -> AcervoResult<bool> {
        self.store.delete(id)
    }

    pub fn verify(&self) -> AcervoResult<ConsistencyReport> {
        self.store.verify()
    }

    pub fn rebuild_index(&self) -> AcervoResult<usize> {
        self.store.rebuild_index()
    }
}
