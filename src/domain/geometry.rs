use serde::Serialize;

use super::detection::{BBox, BoxMode};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Superficie de dibujo derivada de la imagen original y un ancho máximo.
///
/// `scale = min(1, max_width / source.width)`; ancho y alto se guardan sin
/// redondear para que la relación de aspecto se conserve exactamente.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderSurface {
    pub source: Dims,
    pub scale: f64,
    pub width: f64,
    pub height: f64,
}

impl RenderSurface {
    pub fn fit(source: Dims, max_width: u32) -> Self {
        let scale = if source.width == 0 {
            1.0
        } else {
            (max_width as f64 / source.width as f64).min(1.0)
        };
        Self {
            source,
            scale,
            width: source.width as f64 * scale,
            height: source.height as f64 * scale,
        }
    }

    /// Tamaño del raster (redondeado, mínimo 1x1).
    pub fn pixel_size(&self) -> (u32, u32) {
        (
            self.width.round().max(1.0) as u32,
            self.height.round().max(1.0) as u32,
        )
    }
}

/// Caja ya transformada al espacio de dibujo y recortada a la superficie.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RenderBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl RenderBox {
    pub fn is_degenerate(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }

    /// Rectángulo entero en el raster: (x, y, ancho, alto), con ancho/alto >= 1.
    pub fn to_pixels(&self) -> PixelRect {
        let x0 = self.x.round();
        let y0 = self.y.round();
        let x1 = (self.x + self.width).round();
        let y1 = (self.y + self.height).round();
        PixelRect {
            x: x0 as i32,
            y: y0 as i32,
            width: (x1 - x0).max(1.0) as u32,
            height: (y1 - y0).max(1.0) as u32,
        }
    }

    pub fn as_array(&self) -> [f64; 4] {
        [self.x, self.y, self.width, self.height]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

/// Lleva una caja del espacio de la imagen original al de la superficie.
///
/// El llamador declara el modo: esta función nunca lo deduce de los valores.
/// Los bordes se recortan a `[0, source * scale]`; una caja parcialmente
/// fuera queda recortada, no descartada.
pub fn to_render_space(bbox: &BBox, mode: BoxMode, source: Dims, scale: f64) -> RenderBox {
    let (fx, fy) = match mode {
        BoxMode::Normalized => (source.width as f64 * scale, source.height as f64 * scale),
        BoxMode::Pixel => (scale, scale),
    };
    let max_x = source.width as f64 * scale;
    let max_y = source.height as f64 * scale;

    let x0 = bbox.x * fx;
    let y0 = bbox.y * fy;
    let x1 = x0 + bbox.width * fx;
    let y1 = y0 + bbox.height * fy;

    let cx0 = x0.clamp(0.0, max_x);
    let cy0 = y0.clamp(0.0, max_y);
    let cx1 = x1.clamp(0.0, max_x);
    let cy1 = y1.clamp(0.0, max_y);

    RenderBox {
        x: cx0,
        y: cy0,
        width: cx1 - cx0,
        height: cy1 - cy0,
    }
}
