use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    #[error("tipo de archivo no soportado: {0}")]
    InvalidFileType(String),
    #[error("no se pudo decodificar la imagen: {0}")]
    Decode(String),
    #[error("error de red: {0}")]
    Network(String),
    #[error("error del modelo: {0}")]
    Model(String),
    #[error("entrada inválida: {0}")]
    InvalidInput(String),
    #[error("la detección excedió el tiempo límite de {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("configuración inválida: {0}")]
    Config(String),
}

pub type DomainResult<T> = Result<T, DomainError>;

/// Categoría estable de un error, expuesta a la capa de UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    InvalidFileType,
    DecodeError,
    NetworkError,
    ModelError,
    InvalidInput,
    Timeout,
    Config,
}

/// Error tal y como queda registrado en una sesión fallida.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub message: String,
}

impl DomainError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::InvalidFileType(_) => ErrorKind::InvalidFileType,
            DomainError::Decode(_) => ErrorKind::DecodeError,
            DomainError::Network(_) => ErrorKind::NetworkError,
            DomainError::Model(_) => ErrorKind::ModelError,
            DomainError::InvalidInput(_) => ErrorKind::InvalidInput,
            DomainError::Timeout(_) => ErrorKind::Timeout,
            DomainError::Config(_) => ErrorKind::Config,
        }
    }

    pub fn info(&self) -> ErrorInfo {
        ErrorInfo {
            kind: self.kind(),
            message: self.to_string(),
        }
    }
}

impl From<&DomainError> for ErrorInfo {
    fn from(e: &DomainError) -> Self {
        e.info()
    }
}
