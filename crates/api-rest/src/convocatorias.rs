//! Convocatorias server: listing, password-protected upload and download of announcements.

use crate::error::{ApiError, ApiResult};
use crate::files::{describe, receive};
use acervo_core::{AcervoError, Convocatoria, ConvocatoriaService, UploadWriter};
use api_shared::{ConvocatoriaForm, ErrorRes, HealthService};
use axum::extract::{Multipart, Path, State};
use axum::http::{header, HeaderValue};
use axum::response::{IntoResponse, Json, Response};
use std::sync::Arc;

const FILE_FIELD: &str = "archivo";
const TITLE_FIELD: &str = "titulo";
const PASSWORD_FIELD: &str = "password";

#[derive(Clone)]
pub struct ConvocatoriasState {
    pub convocatorias: ConvocatoriaService,
    pub health: Arc<HealthService>,
}

#[utoipa::path(
    get,
    path = "/api/convocatorias",
    responses(
        (status = 200, description = "Convocatorias in upload order", body = Vec<Convocatoria>),
        (status = 500, description = "Internal server error", body = ErrorRes)
    )
)]
#[axum::debug_handler]
pub async fn list_convocatorias(
    State(state): State<ConvocatoriasState>,
) -> ApiResult<Json<Vec<Convocatoria>>> {
    Ok(Json(state.convocatorias.list()?))
}

#[utoipa::path(
    post,
    path = "/api/convocatorias",
    request_body(content = ConvocatoriaForm, content_type = "multipart/form-data"),
    responses(
        (status = 200, description = "Convocatoria published", body = Convocatoria),
        (status = 400, description = "Missing title or file, or bad type", body = ErrorRes),
        (status = 401, description = "Wrong password", body = ErrorRes),
        (status = 413, description = "File larger than 20 MiB", body = ErrorRes)
    )
)]
/// Publish a convocatoria
///
/// The password is checked before anything else, and the file is only kept once every
/// field has been accepted.
#[axum::debug_handler]
pub async fn create_convocatoria(
    State(state): State<ConvocatoriasState>,
    mut multipart: Multipart,
) -> ApiResult<Json<Convocatoria>> {
    let mut writer: Option<UploadWriter> = None;
    let mut file_error: Option<ApiError> = None;
    let mut titulo: Option<String> = None;
    let mut password: Option<String> = None;

    loop {
        let mut field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => break,
            Err(e) => {
                file_error.get_or_insert(e.into());
                break;
            }
        };

        let field_name = field.name().map(str::to_string);
        match field_name.as_deref() {
            Some(TITLE_FIELD) => titulo = Some(field.text().await?),
            Some(PASSWORD_FIELD) => password = Some(field.text().await?),
            Some(FILE_FIELD) if writer.is_none() && file_error.is_none() => {
                let (name, media_type) = describe(&field);
                match state.convocatorias.begin_upload(&name, &media_type) {
                    Ok(mut w) => match receive(&mut field, &mut w).await {
                        Ok(()) => writer = Some(w),
                        Err(e) => {
                            file_error = Some(e);
                            break;
                        }
                    },
                    Err(e) => file_error = Some(e.into()),
                }
            }
            _ => {}
        }
    }

    state.convocatorias.check_password(password.as_deref())?;
    if let Some(e) = file_error {
        return Err(e);
    }
    let writer = writer.ok_or_else(|| ApiError::invalid(FILE_FIELD, "no file received"))?;
    let titulo = ConvocatoriaService::validate_title(titulo.as_deref())?;

    let stored = writer.finish().map_err(AcervoError::from)?;
    let entry = state.convocatorias.add(titulo, stored)?;
    Ok(Json(entry))
}

#[utoipa::path(
    get,
    path = "/convocatorias/{filename}",
    params(("filename" = String, Path, description = "Stored filename")),
    responses(
        (status = 200, description = "File download", content_type = "application/octet-stream"),
        (status = 404, description = "Unknown file", body = ErrorRes)
    )
)]
/// Download a convocatoria file as an attachment
#[axum::debug_handler]
pub async fn download_convocatoria(
    State(state): State<ConvocatoriasState>,
    Path(filename): Path<String>,
) -> ApiResult<Response> {
    let path = state
        .convocatorias
        .file_path(&filename)
        .ok_or_else(|| ApiError::not_found("file"))?;
    let bytes = tokio::fs::read(path.clone())
        .await
        .map_err(|source| AcervoError::FileRead { path, source })?;

    let content_type = infer::get(&bytes)
        .map(|kind| kind.mime_type())
        .unwrap_or("application/octet-stream");
    let disposition = HeaderValue::from_str(&format!("attachment; filename=\"{filename}\""))
        .unwrap_or_else(|_| HeaderValue::from_static("attachment"));

    Ok((
        [
            (header::CONTENT_TYPE, HeaderValue::from_static(content_type)),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    )
        .into_response())
}
