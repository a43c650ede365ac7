use serde::Serialize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::domain::detection::BoxMode;
use crate::domain::errors::{DomainError, DomainResult};

/// Qué colaborador de detección se instancia al arrancar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Mock,
    Remote,
}

impl FromStr for Backend {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Ok(Backend::Mock),
            "remote" | "http" => Ok(Backend::Remote),
            other => Err(DomainError::Config(format!("backend desconocido: {other}"))),
        }
    }
}

/// Configuración efectiva del servicio (se expone tal cual en `/api/config`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AppConfig {
    pub bind: String,
    pub max_width: u32,
    pub detect_timeout_ms: u64,
    pub backend: Backend,
    pub endpoint: String,
    pub box_mode: BoxMode,
    pub confidence_threshold: Option<f32>,
    pub classes_file: Option<PathBuf>,
    pub mock_delay_ms: u64,
    pub max_upload_bytes: usize,
    pub static_dir: PathBuf,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            bind: "0.0.0.0:8090".into(),
            max_width: 800,
            detect_timeout_ms: 30_000,
            backend: Backend::Mock,
            endpoint: "http://localhost:8000/detect".into(),
            box_mode: BoxMode::Normalized,
            confidence_threshold: None,
            classes_file: None,
            mock_delay_ms: 0,
            max_upload_bytes: 20 * 1024 * 1024,
            static_dir: PathBuf::from("static"),
        }
    }
}

fn parse<T: FromStr>(key: &str, raw: &str) -> DomainResult<T>
where
    T::Err: std::fmt::Display,
{
    raw.trim()
        .parse::<T>()
        .map_err(|e| DomainError::Config(format!("{key}={raw:?}: {e}")))
}

fn positive<T: PartialOrd + Default>(key: &str, value: T) -> DomainResult<T> {
    if value > T::default() {
        Ok(value)
    } else {
        Err(DomainError::Config(format!("{key} debe ser mayor que 0")))
    }
}

impl AppConfig {
    pub fn from_env() -> DomainResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Construye la configuración a partir de una función de búsqueda clave -> valor.
    /// Los valores vacíos cuentan como ausentes.
    pub fn from_lookup<F>(lookup: F) -> DomainResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut cfg = Self::default();

        if let Some(v) = get("DETECT_BIND") {
            cfg.bind = v.trim().to_string();
        }
        if let Some(v) = get("DETECT_MAX_WIDTH") {
            cfg.max_width = positive("DETECT_MAX_WIDTH", parse("DETECT_MAX_WIDTH", &v)?)?;
        }
        if let Some(v) = get("DETECT_TIMEOUT_MS") {
            cfg.detect_timeout_ms = positive("DETECT_TIMEOUT_MS", parse("DETECT_TIMEOUT_MS", &v)?)?;
        }
        if let Some(v) = get("DETECT_BACKEND") {
            cfg.backend = v.parse()?;
        }
        if let Some(v) = get("DETECT_ENDPOINT") {
            cfg.endpoint = v.trim().to_string();
        }
        if let Some(v) = get("DETECT_BOX_MODE") {
            cfg.box_mode = v.parse()?;
        }
        if let Some(v) = get("DETECT_CONF") {
            let conf: f32 = parse("DETECT_CONF", &v)?;
            if !(0.0..=1.0).contains(&conf) {
                return Err(DomainError::Config(format!("DETECT_CONF fuera de [0,1]: {conf}")));
            }
            cfg.confidence_threshold = Some(conf);
        }
        if let Some(v) = get("DETECT_CLASSES") {
            cfg.classes_file = Some(PathBuf::from(v.trim()));
        }
        if let Some(v) = get("DETECT_MOCK_DELAY_MS") {
            cfg.mock_delay_ms = parse("DETECT_MOCK_DELAY_MS", &v)?;
        }
        if let Some(v) = get("DETECT_MAX_UPLOAD_BYTES") {
            cfg.max_upload_bytes = positive("DETECT_MAX_UPLOAD_BYTES", parse("DETECT_MAX_UPLOAD_BYTES", &v)?)?;
        }
        if let Some(v) = get("DETECT_STATIC_DIR") {
            cfg.static_dir = PathBuf::from(v.trim());
        }

        Ok(cfg)
    }

    pub fn detect_timeout(&self) -> Duration {
        Duration::from_millis(self.detect_timeout_ms)
    }

    pub fn mock_delay(&self) -> Duration {
        Duration::from_millis(self.mock_delay_ms)
    }
}
