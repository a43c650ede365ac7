use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::domain::{detection::DetectionList, errors::DomainResult, source::ImageHandle};

/// Imagen tal y como se entrega al colaborador de detección.
#[derive(Debug, Clone)]
pub struct ImagePayload {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
    pub width: u32,
    pub height: u32,
}

impl From<&ImageHandle> for ImagePayload {
    fn from(h: &ImageHandle) -> Self {
        let dims = h.dims();
        Self {
            name: h.name.clone(),
            mime: h.mime.clone(),
            bytes: h.bytes.clone(),
            width: dims.width,
            height: dims.height,
        }
    }
}

/// Opciones que el núcleo reenvía sin interpretarlas.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DetectOptions {
    pub confidence_threshold: Option<f32>,
}

/// Colaborador de detección (modelo local, servicio remoto, mock...).
///
/// Puede tardar arbitrariamente o no responder nunca; el llamador pone el límite de tiempo.
/// Los fallos se reportan como `Network`, `Model` o `InvalidInput`.
#[async_trait]
pub trait DetectionPort: Send + Sync {
    fn name(&self) -> &str;
    async fn detect(&self, image: &ImagePayload, options: &DetectOptions) -> DomainResult<DetectionList>;
}
