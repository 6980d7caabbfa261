//! File service endpoints: uploads, listing, metadata, deletion and autocomplete.

use crate::error::{ApiError, ApiResult};
use crate::AppState;
use acervo_core::query::{parse_paging, FilePage};
use acervo_core::uploads::DEFAULT_SORT;
use acervo_core::{AcervoError, FileMeta, ListQuery, Page, StoredUpload, UploadWriter};
use acervo_types::TagSet;
use api_shared::{ErrorRes, SuggestRes, UploadForm, UploadManyForm, UploadManyRes};
use axum::extract::multipart::Field;
use axum::extract::{Multipart, Path, Query, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Deserialize;
use tower::ServiceExt;
use tower_http::services::ServeFile;
use utoipa::IntoParams;

/// Most files accepted by one multi-file upload.
pub const MAX_FILES_PER_UPLOAD: usize = 10;

const FILE_FIELD: &str = "file";
const FILES_FIELDS: &[&str] = &["files", "files[]"];
const TAGS_FIELD: &str = "tags";

/// Streams a multipart field into `writer`.
pub(crate) async fn receive(field: &mut Field<'_>, writer: &mut UploadWriter) -> ApiResult<()> {
    while let Some(chunk) = field.chunk().await? {
        writer.write_chunk(&chunk).map_err(AcervoError::from)?;
    }
    Ok(())
}

/// Filename and declared type of a file field.
pub(crate) fn describe(field: &Field<'_>) -> (String, String) {
    let name = field.file_name().unwrap_or_default().to_string();
    let media_type = field
        .content_type()
        .unwrap_or("application/octet-stream")
        .to_string();
    (name, media_type)
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "File stored", body = FileMeta),
        (status = 400, description = "No file, or media type not allowed", body = ErrorRes),
        (status = 413, description = "File larger than 20 MiB", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Upload a single file
///
/// Accepts one `file` field and optional comma-separated `tags`. Tags are applied once the
/// whole body has been read, so their position in the form does not matter.
#[axum::debug_handler]
pub async fn upload_one(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<FileMeta>)> {
    let mut stored: Option<StoredUpload> = None;
    let mut tags = TagSet::new();

    while let Some(mut field) = multipart.next_field().await? {
        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(FILE_FIELD) if stored.is_none() => {
                let (name, media_type) = describe(&field);
                let mut writer = state.files.begin_upload(&name, &media_type)?;
                receive(&mut field, &mut writer).await?;
                stored = Some(writer.finish().map_err(AcervoError::from)?);
            }
            Some(TAGS_FIELD) => tags = TagSet::from_comma_list(&field.text().await?),
            _ => {}
        }
    }

    let stored = stored.ok_or_else(|| ApiError::invalid(FILE_FIELD, "no file received"))?;
    let meta = state.files.register(stored, &tags)?;
    Ok((StatusCode::CREATED, Json(meta)))
}

#[utoipa::path(
    post,
    path = "/uploads",
    request_body(content = UploadManyForm, content_type = "multipart/form-data"),
    responses(
        (status = 201, description = "Accepted files", body = UploadManyRes),
        (status = 400, description = "No file accepted", body = ErrorRes),
        (status = 413, description = "A file is larger than 20 MiB", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Upload up to ten files
///
/// Files with a disallowed type, and files beyond the tenth, are skipped. If a file exceeds
/// the size cap the request fails with 413, but the files completed before it stay
/// registered.
#[axum::debug_handler]
pub async fn upload_many(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> ApiResult<(StatusCode, Json<UploadManyRes>)> {
    let mut stored: Vec<StoredUpload> = Vec::new();
    let mut tags = TagSet::new();
    let mut failure: Option<ApiError> = None;
    let mut seen = 0usize;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                failure = Some(e.into());
                break;
            }
        };

        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(TAGS_FIELD) => match field.text().await {
                Ok(text) => tags = TagSet::from_comma_list(&text),
                Err(e) => {
                    failure = Some(e.into());
                    break;
                }
            },
            Some(name) if FILES_FIELDS.contains(&name) => {
                seen += 1;
                let (name, media_type) = describe(&field);
                if seen > MAX_FILES_PER_UPLOAD {
                    tracing::warn!("skipping {name}: more than {MAX_FILES_PER_UPLOAD} files");
                    continue;
                }
                match store_part(&state, &mut field, &name, &media_type).await {
                    Ok(Some(upload)) => stored.push(upload),
                    Ok(None) => {}
                    Err(e) => {
                        failure = Some(e);
                        break;
                    }
                }
            }
            _ => {}
        }
    }

    let mut files = Vec::with_capacity(stored.len());
    for upload in stored {
        files.push(state.files.register(upload, &tags)?);
    }

    if let Some(e) = failure {
        return Err(e);
    }
    if files.is_empty() {
        return Err(ApiError::invalid("files", "no files received"));
    }
    Ok((StatusCode::CREATED, Json(UploadManyRes { files })))
}

/// Stores one part of a multi-file upload. `Ok(None)` means the part was skipped.
async fn store_part(
    state: &AppState,
    field: &mut Field<'_>,
    name: &str,
    media_type: &str,
) -> ApiResult<Option<StoredUpload>> {
    let mut writer = match state.files.begin_upload(name, media_type) {
        Ok(writer) => writer,
        Err(AcervoError::UnsupportedMedia(t)) => {
            tracing::warn!("skipping {name}: media type {t} not allowed");
            return Ok(None);
        }
        Err(e) => return Err(e.into()),
    };
    receive(field, &mut writer).await?;
    match writer.finish().map_err(AcervoError::from) {
        Ok(upload) => Ok(Some(upload)),
        Err(AcervoError::UnsupportedMedia(t)) => {
            tracing::warn!("skipping {name}: content detected as {t}");
            Ok(None)
        }
        Err(e) => Err(e.into()),
    }
}

/// Query parameters of `GET /files`.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct FileListParams {
    /// Substring of name, original name, type, extension or tags
    pub q: Option<String>,
    /// Exact media type, e.g. `image/png`
    pub mime: Option<String>,
    /// Exact extension without the dot
    pub ext: Option<String>,
    pub tag: Option<String>,
    /// `created_at` (default), `filename` or `size`
    pub sort: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

impl FileListParams {
    fn into_query(self) -> ApiResult<ListQuery> {
        let (page, limit) = parse_paging(self.page.as_deref(), self.limit.as_deref())?;
        Ok(ListQuery::new()
            .search(self.q)
            .filter("mime", self.mime)
            .filter("ext", self.ext)
            .tag(self.tag)
            .sort(self.sort, DEFAULT_SORT)
            .page(page)
            .limit(limit))
    }
}

#[utoipa::path(
    get,
    path = "/files",
    params(FileListParams),
    responses(
        (status = 200, description = "One page of files", body = FilePage),
        (status = 400, description = "Invalid paging parameters", body = ErrorRes),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
/// Search, filter, sort and page the uploaded files
#[axum::debug_handler]
pub async fn list_files(
    State(state): State<AppState>,
    Query(params): Query<FileListParams>,
) -> ApiResult<Json<Page<FileMeta>>> {
    let query = params.into_query()?;
    Ok(Json(state.files.list(&query)?))
}

#[utoipa::path(
    get,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "File metadata", body = FileMeta),
        (status = 404, description = "Unknown file", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn get_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<FileMeta>> {
    state
        .files
        .get(&id)?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("file"))
}

#[utoipa::path(
    delete,
    path = "/files/{id}",
    params(("id" = String, Path, description = "Stored filename")),
    responses(
        (status = 204, description = "File deleted"),
        (status = 404, description = "Unknown file", body = ErrorRes)
    )
)]
/// Delete a file and its metadata
#[axum::debug_handler]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<StatusCode> {
    if state.files.delete(&id)? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(ApiError::not_found("file"))
    }
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SuggestParams {
    pub q: Option<String>,
}

#[utoipa::path(
    get,
    path = "/search/suggest",
    params(SuggestParams),
    responses(
        (status = 200, description = "Filename suggestions", body = SuggestRes)
    )
)]
/// Autocomplete filenames
///
/// Returns up to ten files whose search text contains `q`, ordered by filename.
#[axum::debug_handler]
pub async fn suggest(
    State(state): State<AppState>,
    Query(params): Query<SuggestParams>,
) -> ApiResult<Json<SuggestRes>> {
    let q = params.q.unwrap_or_default();
    let suggestions = state.files.suggest(&q)?;
    Ok(Json(SuggestRes { q, suggestions }))
}

/// Serves a stored binary under `/uploads/{filename}`.
pub async fn serve_upload(
    State(state): State<AppState>,
    Path(filename): Path<String>,
    request: Request,
) -> Response {
    let Some(path) = state.files.stored_path(&filename) else {
        return ApiError::not_found("file").into_response();
    };
    match ServeFile::new(path).oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}
