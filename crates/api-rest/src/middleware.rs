//! Cross-cutting HTTP layers: request throttle, CORS and security headers.

use api_shared::ErrorRes;
use axum::extract::{Request, State};
use axum::http::{header, HeaderName, HeaderValue, Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Json, Response};
use axum::Router;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;

/// Requests accepted per throttle window.
pub const THROTTLE_LIMIT: u32 = 100;
pub const THROTTLE_WINDOW: Duration = Duration::from_secs(60);

/// Process-wide fixed-window request counter.
#[derive(Debug)]
pub struct Throttle {
    limit: u32,
    window: Duration,
    state: Mutex<WindowState>,
}

#[derive(Debug)]
struct WindowState {
    started: Instant,
    count: u32,
}

impl Throttle {
    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            state: Mutex::new(WindowState {
                started: Instant::now(),
                count: 0,
            }),
        }
    }

    /// Counts one request; `false` once the current window is exhausted.
    pub fn admit(&self) -> bool {
        self.admit_at(Instant::now())
    }

    fn admit_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if now.saturating_duration_since(state.started) >= self.window {
            state.started = now;
            state.count = 0;
        }
        if state.count >= self.limit {
            return false;
        }
        state.count += 1;
        true
    }
}

impl Default for Throttle {
    fn default() -> Self {
        Self::new(THROTTLE_LIMIT, THROTTLE_WINDOW)
    }
}

async fn enforce_throttle(
    State(throttle): State<Arc<Throttle>>,
    request: Request,
    next: Next,
) -> Response {
    if !throttle.admit() {
        tracing::warn!("throttled {} {}", request.method(), request.uri().path());
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(ErrorRes::new("too many requests, try again later")),
        )
            .into_response();
    }
    next.run(request).await
}

/// CORS for the configured origin, or any origin when none is configured.
pub fn cors(origin: Option<&str>) -> CorsLayer {
    let Some(origin) = origin else {
        return CorsLayer::permissive();
    };
    match HeaderValue::from_str(origin) {
        Ok(value) => CorsLayer::new()
            .allow_origin(value)
            .allow_methods([Method::GET, Method::POST, Method::PATCH, Method::DELETE])
            .allow_headers(Any),
        Err(_) => {
            tracing::warn!("ignoring invalid CORS origin {origin:?}; allowing any origin");
            CorsLayer::permissive()
        }
    }
}

/// Wraps `router` with the layers shared by every Acervo server.
///
/// Layers run outermost first: security headers, CORS, request tracing, then the throttle.
pub fn apply_common_layers(
    router: Router,
    cors_origin: Option<&str>,
    throttle: Arc<Throttle>,
) -> Router {
    router
        .layer(axum::middleware::from_fn_with_state(throttle, enforce_throttle))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .layer(cors(cors_origin))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(SetResponseHeaderLayer::if_not_present(
            HeaderName::from_static("cross-origin-resource-policy"),
            HeaderValue::from_static("cross-origin"),
        ))
}
