use serde::{Deserialize, Serialize};

use super::errors::{DomainError, DomainResult};

/// Tolerancia para cajas normalizadas que rozan el borde (p. ej. 1.0000001).
const NORMALIZED_EPSILON: f64 = 1e-6;

/// Espacio de coordenadas en el que viene expresada una caja.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxMode {
    /// Fracciones [0,1] del ancho/alto de la imagen original.
    #[default]
    Normalized,
    /// Píxeles absolutos de la imagen original.
    Pixel,
}

impl std::str::FromStr for BoxMode {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normalized" | "norm" => Ok(BoxMode::Normalized),
            "pixel" | "px" => Ok(BoxMode::Pixel),
            other => Err(DomainError::Config(format!("box mode desconocido: {other}"))),
        }
    }
}

/// Caja `[x, y, width, height]`; en el cable se serializa como array.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 4]", into = "[f64; 4]")]
pub struct BBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BBox {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self { x, y, width, height }
    }

    fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.width.is_finite() && self.height.is_finite()
    }
}

impl From<[f64; 4]> for BBox {
    fn from([x, y, width, height]: [f64; 4]) -> Self {
        Self { x, y, width, height }
    }
}

impl From<BBox> for [f64; 4] {
    fn from(b: BBox) -> Self {
        [b.x, b.y, b.width, b.height]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_id: u32,
    pub score: f32,
    pub bbox: BBox,
}

impl Detection {
    pub fn new(class_id: u32, score: f32, bbox: impl Into<BBox>) -> Self {
        Self { class_id, score, bbox: bbox.into() }
    }
}

/// Detecciones en el orden devuelto por el colaborador.
///
/// El orden es también el orden de dibujo: las últimas quedan encima.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionList {
    pub mode: BoxMode,
    pub items: Vec<Detection>,
}

impl DetectionList {
    pub fn new(mode: BoxMode, items: Vec<Detection>) -> Self {
        Self { mode, items }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.items.iter()
    }

    /// Comprueba el esquema en la frontera con el colaborador.
    /// Cualquier violación se reporta como error del modelo.
    pub fn validate(&self) -> DomainResult<()> {
        for (i, det) in self.items.iter().enumerate() {
            if !det.score.is_finite() || !(0.0..=1.0).contains(&det.score) {
                return Err(DomainError::Model(format!(
                    "detección {i}: score fuera de [0,1] ({})",
                    det.score
                )));
            }
            let b = &det.bbox;
            if !b.is_finite() {
                return Err(DomainError::Model(format!("detección {i}: bbox no finita")));
            }
            if b.width <= 0.0 || b.height <= 0.0 {
                return Err(DomainError::Model(format!(
                    "detección {i}: bbox degenerada ({}x{})",
                    b.width, b.height
                )));
            }
            if self.mode == BoxMode::Normalized
                && (b.width > 1.0 + NORMALIZED_EPSILON || b.height > 1.0 + NORMALIZED_EPSILON)
            {
                return Err(DomainError::Model(format!(
                    "detección {i}: bbox normalizada mayor que la imagen ({}x{})",
                    b.width, b.height
                )));
            }
        }
        Ok(())
    }
}

impl<'a> IntoIterator for &'a DetectionList {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}
