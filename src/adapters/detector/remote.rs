use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info};

use crate::application::ports::{DetectOptions, DetectionPort, ImagePayload};
use crate::domain::detection::{BoxMode, Detection, DetectionList};
use crate::domain::errors::{DomainError, DomainResult};

/// Sobre de respuesta del servicio `/detect`.
#[derive(Debug, Deserialize)]
struct WireResponse {
    #[serde(default = "default_success")]
    success: bool,
    #[serde(default)]
    detections: Vec<Detection>,
    #[serde(default)]
    error: Option<String>,
}

fn default_success() -> bool {
    true
}

/// Colaborador remoto: envía la imagen como multipart (`file`) y valida el esquema de vuelta.
///
/// El modo de las cajas no viene en la respuesta; se fija por despliegue.
pub struct RemoteDetector {
    client: reqwest::Client,
    endpoint: String,
    mode: BoxMode,
    request_timeout: Duration,
}

impl RemoteDetector {
    pub fn new(endpoint: impl Into<String>, mode: BoxMode, request_timeout: Duration) -> DomainResult<Self> {
        let endpoint = endpoint.into();
        if !(endpoint.starts_with("http://") || endpoint.starts_with("https://")) {
            return Err(DomainError::Config(format!("endpoint de detección inválido: {endpoint}")));
        }
        let client = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| DomainError::Config(format!("no se pudo crear el cliente HTTP: {e}")))?;
        info!("🌐 Detector remoto en {} (cajas {:?})", endpoint, mode);
        Ok(Self { client, endpoint, mode, request_timeout })
    }

    fn transport_error(&self, e: reqwest::Error) -> DomainError {
        if e.is_timeout() {
            DomainError::Timeout(self.request_timeout)
        } else {
            DomainError::Network(e.to_string())
        }
    }
}

/// Convierte el cuerpo de una respuesta en una lista validada.
fn parse_response(status: reqwest::StatusCode, body: &[u8], mode: BoxMode) -> DomainResult<DetectionList> {
    if status.is_client_error() {
        return Err(DomainError::InvalidInput(format!(
            "el servicio rechazó la imagen ({status}): {}",
            String::from_utf8_lossy(body).chars().take(200).collect::<String>()
        )));
    }
    let wire: WireResponse = match serde_json::from_slice(body) {
        Ok(wire) => wire,
        // Páginas de error de un proxy/gateway: fallo de transporte, no del modelo.
        Err(_) if status.is_server_error() => {
            return Err(DomainError::Network(format!("el servicio respondió {status}")));
        }
        Err(e) => return Err(DomainError::Model(format!("respuesta malformada ({status}): {e}"))),
    };
    if !status.is_success() || !wire.success {
        let reason = wire.error.unwrap_or_else(|| status.to_string());
        return Err(DomainError::Model(reason));
    }
    let list = DetectionList::new(mode, wire.detections);
    list.validate()?;
    Ok(list)
}

#[async_trait]
impl DetectionPort for RemoteDetector {
    fn name(&self) -> &str {
        "remote"
    }

    async fn detect(&self, image: &ImagePayload, options: &DetectOptions) -> DomainResult<DetectionList> {
        // Archivos aceptados por contenido llegan sin MIME útil.
        let mime = if image.mime.starts_with("image/") {
            image.mime.clone()
        } else {
            image::guess_format(&image.bytes)
                .map(|f| f.to_mime_type().to_string())
                .unwrap_or_else(|_| "application/octet-stream".into())
        };
        let part = Part::bytes(image.bytes.to_vec())
            .file_name(image.name.clone())
            .mime_str(&mime)
            .map_err(|e| DomainError::InvalidInput(format!("tipo MIME inválido {mime}: {e}")))?;
        let form = Form::new().part("file", part);

        let mut req = self.client.post(&self.endpoint).multipart(form);
        if let Some(conf) = options.confidence_threshold {
            req = req.query(&[("conf", conf)]);
        }

        debug!("POST {} ({}x{}, {} bytes)", self.endpoint, image.width, image.height, image.bytes.len());
        let res = req.send().await.map_err(|e| self.transport_error(e))?;
        let status = res.status();
        let body = res.bytes().await.map_err(|e| self.transport_error(e))?;

        parse_response(status, &body, self.mode)
    }
}
