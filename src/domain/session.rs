use image::RgbaImage;
use serde::Serialize;
use std::sync::Arc;

use super::catalog::ClassCatalog;
use super::detection::DetectionList;
use super::errors::{DomainError, DomainResult, ErrorInfo};
use super::geometry::RenderSurface;
use super::source::{ImageFile, ImageHandle};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum Phase {
    #[default]
    Idle,
    Loading,
    Detecting,
    Ready,
    Failed,
}

/// Identificador de generación de una petición.
///
/// Sólo el resultado cuyo token coincide con la generación actual se aplica;
/// el resto se descarta aunque llegue más tarde.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn generation(&self) -> u64 {
        self.0
    }
}

/// Superficie compuesta (imagen base + cajas + etiquetas).
#[derive(Debug, Clone, PartialEq)]
pub struct Overlay {
    pub image: RgbaImage,
    pub boxes_drawn: usize,
    pub summary: String,
}

#[derive(Debug, Clone, Default)]
pub struct Session {
    pub phase: Phase,
    pub file_name: Option<String>,
    pub source: Option<ImageHandle>,
    pub surface: Option<RenderSurface>,
    pub detections: DetectionList,
    pub overlay: Option<Arc<Overlay>>,
    pub error: Option<ErrorInfo>,
}

/// Vista de sólo lectura de la sesión para la capa de presentación.
#[derive(Debug, Clone, Default)]
pub struct SessionSnapshot {
    pub generation: u64,
    pub phase: Phase,
    pub file_name: Option<String>,
    pub source: Option<ImageHandle>,
    pub surface: Option<RenderSurface>,
    pub detections: DetectionList,
    pub overlay: Option<Arc<Overlay>>,
    pub error: Option<ErrorInfo>,
}

impl SessionSnapshot {
    pub fn summary(&self) -> Option<&str> {
        self.overlay.as_deref().map(|o| o.summary.as_str())
    }
}

/// Máquina de estados de subida/procesado.
///
/// Es síncrona y no hace I/O: el servicio de aplicación la conduce y le
/// pasa los resultados asíncronos junto con el token que los originó.
#[derive(Debug, Default)]
pub struct SessionMachine {
    session: Session,
    generation: u64,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn phase(&self) -> Phase {
        self.session.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// True mientras `token` sea la petición en curso.
    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.generation && matches!(self.session.phase, Phase::Loading | Phase::Detecting)
    }

    /// Selección de imagen (también desde Loading/Detecting: la anterior queda huérfana).
    ///
    /// Un archivo que no es imagen no toca la sesión en curso; sólo deja el error visible.
    pub fn select(&mut self, file: &ImageFile) -> DomainResult<RequestToken> {
        if let Err(e) = file.check_image_type() {
            self.session.error = Some(e.info());
            return Err(e);
        }
        self.generation += 1;
        self.session = Session {
            phase: Phase::Loading,
            file_name: Some(file.name.clone()),
            ..Session::default()
        };
        Ok(RequestToken(self.generation))
    }

    pub fn image_decoded(&mut self, token: RequestToken, handle: ImageHandle, surface: RenderSurface) -> bool {
        if !self.accepts(token, Phase::Loading) {
            return false;
        }
        self.session.phase = Phase::Detecting;
        self.session.source = Some(handle);
        self.session.surface = Some(surface);
        true
    }

    pub fn detections_received(&mut self, token: RequestToken, detections: DetectionList, overlay: Overlay) -> bool {
        if !self.accepts(token, Phase::Detecting) {
            return false;
        }
        self.session.phase = Phase::Ready;
        self.session.detections = detections;
        self.session.overlay = Some(Arc::new(overlay));
        self.session.error = None;
        true
    }

    pub fn detection_failed(&mut self, token: RequestToken, err: &DomainError) -> bool {
        if !self.is_current(token) {
            return false;
        }
        self.session.phase = Phase::Failed;
        self.session.detections = DetectionList::default();
        self.session.overlay = None;
        self.session.error = Some(err.info());
        true
    }

    /// Vuelve a Idle e invalida cualquier token en vuelo.
    pub fn reset(&mut self) {
        self.generation += 1;
        self.session = Session::default();
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let s = &self.session;
        SessionSnapshot {
            generation: self.generation,
            phase: s.phase,
            file_name: s.file_name.clone(),
            source: s.source.clone(),
            surface: s.surface,
            detections: s.detections.clone(),
            overlay: s.overlay.clone(),
            error: s.error.clone(),
        }
    }

    fn accepts(&self, token: RequestToken, phase: Phase) -> bool {
        token.0 == self.generation && self.session.phase == phase
    }
}

/// Texto resumen que acompaña a la superficie renderizada.
pub fn summary_text(count: usize) -> String {
    match count {
        0 => "No objects detected".to_string(),
        1 => "1 object detected".to_string(),
        n => format!("{n} objects detected"),
    }
}

/// Recuento por clase en orden de aparición, p. ej. "2 person, 1 car".
pub fn summarize_detections(detections: &DetectionList, catalog: &ClassCatalog) -> String {
    let mut counts: Vec<(&str, usize)> = Vec::new();
    for det in detections {
        let name = catalog.resolve(det.class_id).name.as_str();
        match counts.iter_mut().find(|(n, _)| *n == name) {
            Some((_, c)) => *c += 1,
            None => counts.push((name, 1)),
        }
    }
    counts
        .iter()
        .map(|(name, count)| format!("{} {}", count, name))
        .collect::<Vec<_>>()
        .join(", ")
}
