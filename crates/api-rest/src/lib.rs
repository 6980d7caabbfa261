//! # API REST
//!
//! HTTP servers for Acervo.
//!
//! Handles:
//! - the file service ([`router`]): uploads, file metadata, the animal catalog
//! - the convocatorias service ([`convocatorias_router`])
//! - OpenAPI/Swagger documentation
//! - REST-specific concerns (multipart decoding, body limits, CORS, throttling)
//!
//! Business rules live in `acervo-core`; handlers only decode requests and map errors.

#![warn(rust_2018_idioms)]

pub mod animals;
pub mod config;
pub mod convocatorias;
pub mod error;
pub mod files;
pub mod middleware;

use acervo_core::animals::AnimalFields;
use acervo_core::query::{AnimalPage, FilePage};
use acervo_core::{
    AcervoResult, AnimalDraft, AnimalRecord, AnimalService, AnimalSummary, ConservationStatus,
    Convocatoria, ConvocatoriaService, CoreConfig, FileMeta, FileService, Issue, Suggestion,
};
use api_shared::{
    ConvocatoriaForm, ErrorRes, HealthRes, HealthService, SuggestRes, UploadForm,
    UploadManyForm, UploadManyRes,
};
use axum::extract::{DefaultBodyLimit, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use config::ServerConfig;
use convocatorias::ConvocatoriasState;
use middleware::{apply_common_layers, Throttle};
use std::sync::Arc;
use tower_http::set_header::SetResponseHeaderLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

/// Limit for JSON request bodies.
pub const JSON_BODY_LIMIT: usize = 2 * 1024 * 1024;

const MULTIPART_OVERHEAD: usize = 1024 * 1024;
const MAX_FILE_BYTES: usize = acervo_core::constants::MAX_UPLOAD_BYTES as usize;

/// Body limit of `POST /upload` and `POST /api/convocatorias`.
pub const SINGLE_UPLOAD_BODY_LIMIT: usize = MAX_FILE_BYTES + MULTIPART_OVERHEAD;

/// Body limit of `POST /uploads`.
pub const MULTI_UPLOAD_BODY_LIMIT: usize =
    files::MAX_FILES_PER_UPLOAD * MAX_FILE_BYTES + MULTIPART_OVERHEAD;

const UPLOADS_CACHE_CONTROL: &str = "public, max-age=604800";

/// Application state of the file service.
#[derive(Clone)]
pub struct AppState {
    pub files: FileService,
    pub animals: AnimalService,
    pub health: Arc<HealthService>,
}

impl AppState {
    pub fn new(cfg: &CoreConfig) -> AcervoResult<Self> {
        Ok(Self {
            files: FileService::new(cfg)?,
            animals: AnimalService::new(cfg)?,
            health: Arc::new(HealthService::new()),
        })
    }
}

impl ConvocatoriasState {
    pub fn new(cfg: &CoreConfig) -> AcervoResult<Self> {
        Ok(Self {
            convocatorias: ConvocatoriaService::new(cfg)?,
            health: Arc::new(HealthService::new()),
        })
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health,
        files::upload_one,
        files::upload_many,
        files::list_files,
        files::get_file,
        files::delete_file,
        files::suggest,
        animals::list_animals,
        animals::get_animal,
        animals::create_animal,
        animals::update_animal,
        animals::delete_animal,
    ),
    components(schemas(
        HealthRes,
        ErrorRes,
        Issue,
        FileMeta,
        FilePage,
        UploadForm,
        UploadManyForm,
        UploadManyRes,
        Suggestion,
        SuggestRes,
        AnimalDraft,
        AnimalFields,
        AnimalRecord,
        AnimalSummary,
        AnimalPage,
        ConservationStatus,
    ))
)]
struct ApiDoc;

#[derive(OpenApi)]
#[openapi(
    paths(
        convocatorias_health,
        convocatorias::list_convocatorias,
        convocatorias::create_convocatoria,
        convocatorias::download_convocatoria,
    ),
    components(schemas(HealthRes, ErrorRes, Issue, Convocatoria, ConvocatoriaForm))
)]
struct ConvocatoriasDoc;

/// Builds the file service.
pub fn router(state: AppState, server: &ServerConfig) -> Router {
    let serve_upload = get(files::serve_upload).layer(SetResponseHeaderLayer::overriding(
        header::CACHE_CONTROL,
        HeaderValue::from_static(UPLOADS_CACHE_CONTROL),
    ));

    let app = Router::new()
        .route("/health", get(health))
        .route(
            "/upload",
            post(files::upload_one).layer(DefaultBodyLimit::max(SINGLE_UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/uploads",
            post(files::upload_many).layer(DefaultBodyLimit::max(MULTI_UPLOAD_BODY_LIMIT)),
        )
        .route("/uploads/:filename", serve_upload)
        .route("/files", get(files::list_files))
        .route("/files/:id", get(files::get_file).delete(files::delete_file))
        .route("/search/suggest", get(files::suggest))
        .route(
            "/animals",
            get(animals::list_animals).post(animals::create_animal),
        )
        .route(
            "/animals/:id",
            get(animals::get_animal)
                .patch(animals::update_animal)
                .delete(animals::delete_animal),
        )
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
        )
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state);

    apply_common_layers(
        app,
        server.cors_origin.as_deref(),
        Arc::new(Throttle::default()),
    )
}

/// Builds the convocatorias service.
pub fn convocatorias_router(state: ConvocatoriasState, server: &ServerConfig) -> Router {
    let app = Router::new()
        .route("/health", get(convocatorias_health))
        .route("/api/convocatorias", get(convocatorias::list_convocatorias))
        .route(
            "/api/convocatorias",
            post(convocatorias::create_convocatoria)
                .layer(DefaultBodyLimit::max(SINGLE_UPLOAD_BODY_LIMIT)),
        )
        .route(
            "/convocatorias/:filename",
            get(convocatorias::download_convocatoria),
        )
        .merge(
            SwaggerUi::new("/swagger-ui/{_:.*}")
                .url("/api-docs/openapi.json", ConvocatoriasDoc::openapi()),
        )
        .fallback(route_not_found)
        .layer(DefaultBodyLimit::max(JSON_BODY_LIMIT))
        .with_state(state);

    apply_common_layers(
        app,
        server.cors_origin.as_deref(),
        Arc::new(Throttle::default()),
    )
}

async fn route_not_found() -> (StatusCode, Json<ErrorRes>) {
    (StatusCode::NOT_FOUND, Json(ErrorRes::new("route not found")))
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Liveness and uptime in seconds", body = HealthRes)
    )
)]
#[axum::debug_handler]
async fn health(State(state): State<AppState>) -> Json<HealthRes> {
    Json(state.health.check_health())
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Liveness and uptime in seconds", body = HealthRes)
    )
)]
#[axum::debug_handler]
async fn convocatorias_health(State(state): State<ConvocatoriasState>) -> Json<HealthRes> {
    Json(state.health.check_health())
}

#[cfg(test)]
mod tests {
    use super::*;
    use acervo_core::index::{Indexed, MemoryIndex};
    use acervo_core::UploadPolicy;
    use axum::body::Body;
    use axum::http::{Method, Request};
    use axum::response::Response;
    use http_body_util::BodyExt;
    use serde_json::{json, Value};
    use std::path::Path;
    use tempfile::TempDir;
    use tower::ServiceExt;

    const BOUNDARY: &str = "acervo-test-boundary";

    struct Part<'a> {
        name: &'a str,
        file: Option<(&'a str, &'a str)>,
        body: &'a [u8],
    }

    fn field<'a>(name: &'a str, value: &'a str) -> Part<'a> {
        Part {
            name,
            file: None,
            body: value.as_bytes(),
        }
    }

    fn file<'a>(
        name: &'a str,
        filename: &'a str,
        media_type: &'a str,
        body: &'a [u8],
    ) -> Part<'a> {
        Part {
            name,
            file: Some((filename, media_type)),
            body,
        }
    }

    fn multipart(parts: &[Part<'_>]) -> Body {
        let mut out = Vec::new();
        for part in parts {
            out.extend_from_slice(format!("--{BOUNDARY}\r\n").as_bytes());
            let mut head = format!("Content-Disposition: form-data; name=\"{}\"", part.name);
            if let Some((filename, media_type)) = part.file {
                head.push_str(&format!("; filename=\"{filename}\"\r\nContent-Type: {media_type}"));
            }
            head.push_str("\r\n\r\n");
            out.extend_from_slice(head.as_bytes());
            out.extend_from_slice(part.body);
            out.extend_from_slice(b"\r\n");
        }
        out.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
        Body::from(out)
    }

    fn config(temp: &TempDir, password: Option<&str>) -> CoreConfig {
        CoreConfig::new(
            temp.path().join("data"),
            temp.path().join("uploads"),
            temp.path().join("convocatorias"),
            password.map(str::to_string),
        )
        .unwrap()
    }

    fn server() -> ServerConfig {
        ServerConfig {
            addr: config::DEFAULT_ADDR.into(),
            convocatorias_addr: config::DEFAULT_CONVOCATORIAS_ADDR.into(),
            cors_origin: None,
        }
    }

    fn app(temp: &TempDir) -> Router {
        let cfg = config(temp, None);
        router(AppState::new(&cfg).unwrap(), &server())
    }

    /// File service whose uploads are capped at eight bytes of plain text.
    fn capped_app(temp: &TempDir) -> Router {
        let cfg = config(temp, None);
        let index: MemoryIndex<Indexed<FileMeta>> = MemoryIndex::new();
        let files = FileService::with_parts(
            cfg.uploads_dir(),
            UploadPolicy::new(8, &["text/plain"]),
            Arc::new(index),
        )
        .unwrap();
        let state = AppState {
            files,
            animals: AnimalService::new(&cfg).unwrap(),
            health: Arc::new(HealthService::new()),
        };
        router(state, &server())
    }

    fn post_multipart(uri: &str, parts: &[Part<'_>]) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(
                header::CONTENT_TYPE,
                format!("multipart/form-data; boundary={BOUNDARY}"),
            )
            .body(multipart(parts))
            .unwrap()
    }

    fn request(method: Method, uri: &str) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap()
    }

    fn post_json(method: Method, uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(app: &Router, req: Request<Body>) -> Response {
        app.clone().oneshot(req).await.unwrap()
    }

    async fn json_body(res: Response) -> Value {
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn stored_files(dir: &Path) -> usize {
        std::fs::read_dir(dir).map(|d| d.count()).unwrap_or(0)
    }

    #[tokio::test]
    async fn upload_then_delete_text_file() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(
            &app,
            post_multipart(
                "/upload",
                &[
                    file("file", "nota.txt", "text/plain", b"0123456789"),
                    field("tags", "Notas, Campo"),
                ],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let meta = json_body(res).await;
        assert_eq!(meta["size"], 10);
        assert_eq!(meta["mimetype"], "text/plain");
        assert_eq!(meta["tags"], json!(["Notas", "Campo"]));
        let id = meta["id"].as_str().unwrap().to_string();

        let res = send(&app, request(Method::GET, &format!("/uploads/{id}"))).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(
            res.headers()[header::CACHE_CONTROL],
            UPLOADS_CACHE_CONTROL
        );
        assert_eq!(res.headers()[header::X_CONTENT_TYPE_OPTIONS], "nosniff");

        let res = send(&app, request(Method::GET, "/files?q=nota")).await;
        let page = json_body(res).await;
        assert_eq!(page["total"], 1);
        assert!(page["items"][0].get("_searchText").is_none());

        let res = send(&app, request(Method::DELETE, &format!("/files/{id}"))).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);

        let res = send(&app, request(Method::GET, &format!("/files/{id}"))).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await["error"], "file not found");
    }

    #[tokio::test]
    async fn executable_upload_is_rejected_without_a_trace() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(
            &app,
            post_multipart(
                "/upload",
                &[file(
                    "file",
                    "setup.exe",
                    "application/x-msdownload",
                    b"MZ\x90\x00\x03\x00\x00\x00",
                )],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);

        assert_eq!(stored_files(&temp.path().join("uploads")), 0);
        let page = json_body(send(&app, request(Method::GET, "/files")).await).await;
        assert_eq!(page["total"], 0);
    }

    #[tokio::test]
    async fn upload_without_file_is_rejected() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(&app, post_multipart("/upload", &[field("tags", "a")])).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["details"][0]["path"], "file");
    }

    #[tokio::test]
    async fn multi_upload_skips_disallowed_parts() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(
            &app,
            post_multipart(
                "/uploads",
                &[
                    file("files", "a.txt", "text/plain", b"aaa"),
                    file("files[]", "b.bin", "application/octet-stream", b"bbb"),
                    file("files[]", "c.csv", "text/csv", b"c,c"),
                ],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = json_body(res).await;
        let names: Vec<&str> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["originalname"].as_str().unwrap())
            .collect();
        assert_eq!(names, ["a.txt", "c.csv"]);

        let res = send(
            &app,
            post_multipart(
                "/uploads",
                &[file("files", "b.bin", "application/octet-stream", b"bbb")],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn oversized_upload_leaves_no_partial_file() {
        let temp = TempDir::new().unwrap();
        let app = capped_app(&temp);

        let res = send(
            &app,
            post_multipart(
                "/upload",
                &[file("file", "nota.txt", "text/plain", b"0123456789")],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

        assert_eq!(stored_files(&temp.path().join("uploads")), 0);
        let page = json_body(send(&app, request(Method::GET, "/files")).await).await;
        assert_eq!(page["total"], 0);
    }

    #[tokio::test]
    async fn multi_upload_keeps_only_the_first_ten_files() {
        let temp = TempDir::new().unwrap();
        let app = capped_app(&temp);

        let names: Vec<String> = (0..11).map(|i| format!("nota-{i:02}.txt")).collect();
        let parts: Vec<Part<'_>> = names
            .iter()
            .map(|name| file("files", name, "text/plain", b"abc"))
            .collect();

        let res = send(&app, post_multipart("/uploads", &parts)).await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let body = json_body(res).await;
        let accepted: Vec<&str> = body["files"]
            .as_array()
            .unwrap()
            .iter()
            .map(|f| f["originalname"].as_str().unwrap())
            .collect();
        assert_eq!(accepted.len(), 10);
        assert!(!accepted.contains(&"nota-10.txt"));

        assert_eq!(stored_files(&temp.path().join("uploads")), 10);
        let page = json_body(send(&app, request(Method::GET, "/files")).await).await;
        assert_eq!(page["total"], 10);
    }

    #[tokio::test]
    async fn multi_upload_keeps_files_stored_before_an_oversized_one() {
        let temp = TempDir::new().unwrap();
        let app = capped_app(&temp);

        let res = send(
            &app,
            post_multipart(
                "/uploads",
                &[
                    file("files", "corta.txt", "text/plain", b"abc"),
                    file("files", "larga.txt", "text/plain", b"0123456789"),
                    file("files", "otra.txt", "text/plain", b"xyz"),
                ],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::PAYLOAD_TOO_LARGE);

        assert_eq!(stored_files(&temp.path().join("uploads")), 1);
        let page = json_body(send(&app, request(Method::GET, "/files")).await).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["originalname"], "corta.txt");
    }

    #[tokio::test]
    async fn suggest_returns_matching_filenames() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);
        for name in ["informe-ajolote.txt", "informe-aguila.txt", "otro.txt"] {
            let res = send(
                &app,
                post_multipart("/upload", &[file("file", name, "text/plain", b"x")]),
            )
            .await;
            assert_eq!(res.status(), StatusCode::CREATED);
        }

        let body =
            json_body(send(&app, request(Method::GET, "/search/suggest?q=Informe")).await).await;
        assert_eq!(body["q"], "Informe");
        assert_eq!(body["suggestions"].as_array().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn animal_lifecycle() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(
            &app,
            post_json(
                Method::POST,
                "/animals",
                json!({
                    "id": "client-chosen",
                    "nombre": "Ajolote",
                    "nombre_cientifico": "Ambystoma mexicanum",
                    "especie": "Anfibio",
                    "habitat": "Lagos de Xochimilco",
                    "descripcion": "Salamandra neoténica endémica del valle de México.",
                    "tags": ["Endémico"]
                }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::CREATED);
        let record = json_body(res).await;
        let id = record["id"].as_str().unwrap().to_string();
        assert_ne!(id, "client-chosen");

        let page =
            json_body(send(&app, request(Method::GET, "/animals?especie=anfibio")).await).await;
        assert_eq!(page["total"], 1);
        assert_eq!(page["items"][0]["nombre"], "Ajolote");

        let res = send(
            &app,
            post_json(
                Method::PATCH,
                &format!("/animals/{id}"),
                json!({ "habitat": "Canales de Xochimilco" }),
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(json_body(res).await["habitat"], "Canales de Xochimilco");

        let res = send(&app, request(Method::DELETE, &format!("/animals/{id}"))).await;
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        let res = send(&app, request(Method::GET, &format!("/animals/{id}"))).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn invalid_animal_reports_every_issue() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(
            &app,
            post_json(Method::POST, "/animals", json!({ "nombre": "A" })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        let body = json_body(res).await;
        assert_eq!(body["error"], "validation failed");
        assert!(body["details"].as_array().unwrap().len() > 1);

        let res = send(
            &app,
            post_json(Method::POST, "/animals", json!({ "nombre": 5 })),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["details"][0]["path"], "nombre");
    }

    #[tokio::test]
    async fn bad_paging_is_a_validation_error() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(&app, request(Method::GET, "/files?page=abc")).await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(res).await["details"][0]["path"], "page");
    }

    #[tokio::test]
    async fn unknown_route_is_404_json() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let res = send(&app, request(Method::GET, "/nope")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
        assert_eq!(json_body(res).await, json!({ "error": "route not found" }));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let temp = TempDir::new().unwrap();
        let app = app(&temp);

        let body = json_body(send(&app, request(Method::GET, "/health")).await).await;
        assert_eq!(body["ok"], true);
        assert!(body["uptime"].as_f64().unwrap() >= 0.0);
    }

    fn convocatorias_app(temp: &TempDir, password: Option<&str>) -> Router {
        let cfg = config(temp, password);
        convocatorias_router(ConvocatoriasState::new(&cfg).unwrap(), &server())
    }

    #[tokio::test]
    async fn convocatoria_with_wrong_password_is_refused() {
        let temp = TempDir::new().unwrap();
        let app = convocatorias_app(&temp, Some("secreto"));

        let res = send(
            &app,
            post_multipart(
                "/api/convocatorias",
                &[
                    field("titulo", "Becas 2025"),
                    field("password", "otro"),
                    file("archivo", "becas.pdf", "application/pdf", b"%PDF-1.4\n"),
                ],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(json_body(res).await["error"], "wrong password");

        let list = json_body(send(&app, request(Method::GET, "/api/convocatorias")).await).await;
        assert_eq!(list, json!([]));
    }

    #[tokio::test]
    async fn convocatoria_publish_and_download() {
        let temp = TempDir::new().unwrap();
        let app = convocatorias_app(&temp, Some("secreto"));

        let res = send(
            &app,
            post_multipart(
                "/api/convocatorias",
                &[
                    file("archivo", "becas.pdf", "application/pdf", b"%PDF-1.4\n"),
                    field("titulo", "  Becas 2025 "),
                    field("password", "secreto"),
                ],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::OK);
        let entry = json_body(res).await;
        assert_eq!(entry["titulo"], "Becas 2025");
        assert_eq!(entry["tipo"], "pdf");
        let url = entry["archivoUrl"].as_str().unwrap().to_string();

        let res = send(&app, request(Method::GET, &url)).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()[header::CONTENT_DISPOSITION]
            .to_str()
            .unwrap()
            .starts_with("attachment"));

        let res = send(&app, request(Method::GET, "/convocatorias/convocatorias.json")).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn convocatoria_without_title_keeps_no_file() {
        let temp = TempDir::new().unwrap();
        let app = convocatorias_app(&temp, Some("secreto"));

        let res = send(
            &app,
            post_multipart(
                "/api/convocatorias",
                &[
                    field("password", "secreto"),
                    file("archivo", "becas.pdf", "application/pdf", b"%PDF-1.4\n"),
                ],
            ),
        )
        .await;
        assert_eq!(res.status(), StatusCode::BAD_REQUEST);
        assert_eq!(stored_files(&temp.path().join("convocatorias")), 0);
    }
}
