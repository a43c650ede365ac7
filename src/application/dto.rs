use base64::{prelude::BASE64_STANDARD, Engine};
use image::{ImageFormat, RgbaImage};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::domain::{
    catalog::ClassCatalog,
    detection::BoxMode,
    errors::ErrorInfo,
    geometry::to_render_space,
    session::{Phase, SessionSnapshot},
};

#[derive(Debug, Clone, Serialize)]
pub struct DetectionView {
    pub class_id: u32,
    pub name: String,
    pub color: String,
    pub score: f32,
    /// Confianza formateada, p. ej. "92.0%".
    pub confidence: String,
    /// Caja tal y como la devolvió el colaborador.
    pub bbox: [f64; 4],
    /// Caja en píxeles de la superficie, si ya hay superficie.
    pub render_box: Option<[f64; 4]>,
    pub drawn: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourceView {
    pub name: String,
    pub mime: String,
    pub width: u32,
    pub height: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct SurfaceView {
    pub width: u32,
    pub height: u32,
    pub scale: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SnapshotResponse {
    pub generation: u64,
    pub phase: Phase,
    pub file_name: Option<String>,
    pub source: Option<SourceView>,
    pub surface: Option<SurfaceView>,
    pub mode: BoxMode,
    pub summary: Option<String>,
    pub detections: Vec<DetectionView>,
    pub error: Option<ErrorInfo>,
    /// `data:image/png;base64,...` de la superficie renderizada.
    pub image: Option<String>,
}

impl SnapshotResponse {
    pub fn build(snap: &SessionSnapshot, catalog: &ClassCatalog, image: Option<String>) -> Self {
        let detections = snap
            .detections
            .iter()
            .map(|det| {
                let entry = catalog.resolve(det.class_id);
                let render_box = snap
                    .surface
                    .map(|s| to_render_space(&det.bbox, snap.detections.mode, s.source, s.scale));
                DetectionView {
                    class_id: det.class_id,
                    name: entry.name.clone(),
                    color: entry.color.hex(),
                    score: det.score,
                    confidence: format!("{:.1}%", det.score as f64 * 100.0),
                    bbox: det.bbox.into(),
                    render_box: render_box.map(|r| r.as_array()),
                    drawn: render_box.is_some_and(|r| !r.is_degenerate()),
                }
            })
            .collect();

        Self {
            generation: snap.generation,
            phase: snap.phase,
            file_name: snap.file_name.clone(),
            source: snap.source.as_ref().map(|h| {
                let dims = h.dims();
                SourceView {
                    name: h.name.clone(),
                    mime: h.mime.clone(),
                    width: dims.width,
                    height: dims.height,
                }
            }),
            surface: snap.surface.map(|s| {
                let (width, height) = s.pixel_size();
                SurfaceView { width, height, scale: s.scale }
            }),
            mode: snap.detections.mode,
            summary: snap.summary().map(str::to_string),
            detections,
            error: snap.error.clone(),
            image,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct WsSnapshotMessage {
    pub r#type: String,
    pub snapshot: SnapshotResponse,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OkResponse {
    pub ok: bool,
}

pub fn encode_png(img: &RgbaImage) -> Result<Vec<u8>, image::ImageError> {
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, ImageFormat::Png)?;
    Ok(out.into_inner())
}

pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64_STANDARD.encode(png))
}
