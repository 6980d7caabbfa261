//! Standalone file service binary.
//!
//! ## Purpose
//! Runs the file service (uploads, file metadata, animal catalog) on its own.
//!
//! ## Intended use
//! Useful for development when the convocatorias server is not needed. The workspace's main
//! `acervo-run` binary runs both servers concurrently.

use api_rest::config::{core_config_from_env, ServerConfig};
use api_rest::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Starts the file service on `ACERVO_ADDR` (default `0.0.0.0:4000`).
///
/// # Errors
/// Returns an error if:
/// - the logging/tracing configuration cannot be initialised,
/// - the storage directories or index files cannot be prepared,
/// - the server address cannot be bound, or
/// - the HTTP server fails while running.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("api_rest=info".parse()?)
                .add_directive("acervo_core=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env();
    let cfg = core_config_from_env()?;
    let state = AppState::new(&cfg)?;

    tracing::info!("-- Starting Acervo file service on {}", server.addr);
    tracing::info!("   uploads in {}", cfg.uploads_dir().display());

    let app = router(state, &server);
    let listener = tokio::net::TcpListener::bind(&server.addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
