//! Animal catalog endpoints.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use acervo_core::animals::DEFAULT_SORT;
use acervo_core::query::{parse_paging, AnimalPage};
use acervo_core::validation::parse_json;
use acervo_core::{AnimalDraft, AnimalRecord, AnimalSummary, ListQuery, Page};
use api_shared::ErrorRes;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::Json;
use serde::Deserialize;
use utoipa::IntoParams;

/// Query parameters of `GET /animals`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct AnimalListParams {
    /// Substring of names, species, habitat, description or tags
    pub q: Option<String>,
    pub especie: Option<String>,
    pub habitat: Option<String>,
    pub tag: Option<String>,
    /// `nombre` (default), `nombre_cientifico`, `especie` or `habitat`
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

#[utoipa::path(
    get,
    path = "/animals",
    params(AnimalListParams),
    responses(
        (status = 200, description = "One page of animals", body = AnimalPage),
        (status = 400, description = "Invalid paging parameters", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn list_animals(
    State(state): State<AppState>,
    Query(params): Query<AnimalListParams>,
) -> ApiResult<Json<Page<AnimalSummary>>> {
    let (page, limit) = parse_paging(params.page.as_deref(), params.limit.as_deref())?;
    let query = ListQuery::new()
        .search(params.q)
        .filter("especie", params.especie)
        .filter("habitat", params.habitat)
        .tag(params.tag)
        .sort(params.sort, DEFAULT_SORT)
        .page(page)
        .limit(limit);
    Ok(Json(state.animals.list(&query)?))
}

#[utoipa::path(
    get,
    path = "/animals/{id}",
    params(("id" = String, Path, description = "Animal id")),
    responses(
        (status = 200, description = "Animal fact-sheet", body = AnimalRecord),
        (status = 404, description = "Unknown animal", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_animal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<AnimalRecord>> {
    state
        .animals
        .get(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("animal"))
}

#[utoipa::path(
    post,
    path = "/animals",
    request_body = AnimalDraft,
    responses(
        (status = 201, description = "Animal created", body = AnimalRecord),
        (status = 400, description = "Validation failed", body = ErrorRes)
    )
)]
/// Create an animal fact-sheet
///
/// The id is always assigned by the server; an `id` in the body is ignored.
#[axum::debug_handler]
pub async fn create_animal(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<(StatusCode, Json<AnimalRecord>)> {
    let draft: AnimalDraft = parse_json(&body)?;
    let record = state.animals.create(draft)?;
    Ok((StatusCode::CREATED, Json(record)))
}

#[utoipa::path(
    patch,
    path = "/animals/{id}",
    params(("id" = String, Path, description = "Animal id")),
    request_body = AnimalDraft,
    responses(
        (status = 200, description = "Animal updated", body = AnimalRecord),
        (status = 400, description = "Validation failed", body = ErrorRes),
        (status = 404, description = "Unknown animal", body = ErrorRes)
    )
)]
/// Patch an animal fact-sheet
///
/// Present fields replace the stored ones; the merged record must still be valid.
#[axum::debug_handler]
pub async fn update_animal(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> ApiResult<Json<AnimalRecord>> {
    let patch: AnimalDraft = parse_json(&body)?;
    state
        .animals
        .update(&id, patch)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("animal"))
}

#[utoipa::path(
    delete,
    path = "/animals/{id}",
    params(("id" = String, Path, description = "Animal id")),
    responses(
        (status = 204, description = "Animal deleted"),
        (status = 404, description = "Unknown animal", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn delete_animal(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.animals.delete(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("animal"))
    }
}
