use api_rest::config::{ServerConfig, core_config_from_env};
use api_rest::convocatorias::ConvocatoriasState;
use api_rest::{AppState, convocatorias_router, router};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Main entry point for Acervo
///
/// Starts both servers concurrently:
/// - the file service on port 4000 (configurable via ACERVO_ADDR)
/// - the convocatorias service on port 3000 (configurable via ACERVO_CONVOCATORIAS_ADDR)
///
/// # Environment Variables
/// - `ACERVO_ADDR`, `ACERVO_CONVOCATORIAS_ADDR`: listen addresses
/// - `ACERVO_DATA_DIR`, `ACERVO_UPLOADS_DIR`, `ACERVO_CONVOCATORIAS_DIR`: storage directories
/// - `CORS_ORIGIN`: allowed origin (default: any)
/// - `CONVOCATORIAS_PASSWORD`: upload password for convocatorias (unset refuses uploads)
///
/// # Returns
/// * `Ok(())` - If both servers start and run successfully
/// * `Err(anyhow::Error)` - If startup fails or either server stops with an error
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("acervo_run=info".parse()?)
                .add_directive("api_rest=info".parse()?)
                .add_directive("acervo_core=info".parse()?)
                .add_directive("acervo_files=info".parse()?),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let server = ServerConfig::from_env();
    let cfg = core_config_from_env()?;

    let files_app = router(AppState::new(&cfg)?, &server);
    let convocatorias_app = convocatorias_router(ConvocatoriasState::new(&cfg)?, &server);

    tracing::info!("++ Starting Acervo file service on {}", server.addr);
    tracing::info!(
        "++ Starting Acervo convocatorias on {}",
        server.convocatorias_addr
    );
    if cfg.convocatorias_password().is_none() {
        tracing::warn!("CONVOCATORIAS_PASSWORD is not set; convocatoria uploads will be refused");
    }

    let files_listener = tokio::net::TcpListener::bind(&server.addr).await?;
    let convocatorias_listener = tokio::net::TcpListener::bind(&server.convocatorias_addr).await?;

    let (files_result, convocatorias_result) = tokio::join!(
        axum::serve(files_listener, files_app).into_future(),
        axum::serve(convocatorias_listener, convocatorias_app).into_future(),
    );
    files_result?;
    convocatorias_result?;

    Ok(())
}
