use std::sync::Arc;

use crate::application::services::SessionService;
use crate::config::AppConfig;

/// Estado compartido para los manejadores HTTP de Axum.
/// Contiene el caso de uso (la sesión) y la configuración efectiva.
#[derive(Clone)]
pub struct HttpState {
    /// Sesión única de subida -> detección -> render.
    pub session: Arc<SessionService>,
    pub config: Arc<AppConfig>,
}
