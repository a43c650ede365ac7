use std::sync::Arc;
use std::time::Duration;
use tower_http::services::ServeDir;
use tracing_subscriber::EnvFilter;

use detect_overlay::adapters::{
    detector::{MockDetector, RemoteDetector},
    http::{router, state::HttpState},
};
use detect_overlay::application::ports::{DetectOptions, DetectionPort};
use detect_overlay::application::services::{SessionService, SessionSettings};
use detect_overlay::config::{AppConfig, Backend};
use detect_overlay::domain::catalog::ClassCatalog;

const CLIENT_TIMEOUT_MARGIN: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 1. Inicializar logs (RUST_LOG=info por defecto)
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    // 2. Configuración desde el entorno
    let config = Arc::new(AppConfig::from_env()?);
    tracing::info!("🔧 Configuración: {:?}", config);

    // 3. Catálogo de clases (archivo propio o COCO)
    let catalog = match &config.classes_file {
        Some(path) => ClassCatalog::load(path)?,
        None => ClassCatalog::coco(),
    };
    tracing::info!("🏷️ Catálogo con {} clases", catalog.len());

    // 4. Colaborador de detección
    let detector: Arc<dyn DetectionPort> = match config.backend {
        Backend::Mock => Arc::new(MockDetector::with_delay(config.mock_delay())),
        Backend::Remote => Arc::new(RemoteDetector::new(
            config.endpoint.clone(),
            config.box_mode,
            // el límite lo pone la sesión; el del cliente sólo cubre conexiones colgadas
            config.detect_timeout() + CLIENT_TIMEOUT_MARGIN,
        )?),
    };
    tracing::info!("🔍 Detector activo: {}", detector.name());

    // 5. Servicio de sesión (caso de uso)
    let settings = SessionSettings {
        max_width: config.max_width,
        detect_timeout: config.detect_timeout(),
        options: DetectOptions {
            confidence_threshold: config.confidence_threshold,
        },
    };
    let session = Arc::new(SessionService::new(
        detector,
        Arc::new(catalog),
        settings,
        tokio::runtime::Handle::current(),
    ));

    // 6. Router de Axum y archivos estáticos
    let state = HttpState { session, config: config.clone() };
    let app = router(state).fallback_service(ServeDir::new(&config.static_dir));

    // 7. Lanzar el servidor
    tracing::info!("🚀 Servidor iniciado en http://{}", config.bind);
    tracing::info!("📂 Archivos estáticos servidos desde {}", config.static_dir.display());

    let listener = tokio::net::TcpListener::bind(&config.bind).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
