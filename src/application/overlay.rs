use image::{imageops::FilterType, DynamicImage, Rgba, RgbaImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut};
use imageproc::rect::Rect;

use crate::application::font;
use crate::domain::{
    catalog::{ClassCatalog, ClassColor},
    detection::DetectionList,
    geometry::{to_render_space, PixelRect, RenderSurface},
    session::{summary_text, Overlay},
};

/// Grosor del contorno en píxeles de la superficie (no se reescala).
pub const STROKE_WIDTH: u32 = 2;
pub const LABEL_TEXT_SCALE: u32 = 2;
pub const LABEL_PAD_X: u32 = 5;
pub const LABEL_PAD_Y: u32 = 3;
/// 7px * 2 + 2 * 3 = 20px.
pub const LABEL_HEIGHT: u32 = font::text_height(LABEL_TEXT_SCALE) + 2 * LABEL_PAD_Y;

const TEXT_COLOR: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// `"<clase> <score*100 con 1 decimal>%"`.
pub fn label_text(class_name: &str, score: f32) -> String {
    format!("{} {:.1}%", class_name, score as f64 * 100.0)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPlacement {
    pub rect: PixelRect,
    /// La etiqueta se dibuja dentro de la caja porque no cabe encima.
    pub inside: bool,
}

/// Coloca el fondo de la etiqueta en la esquina superior izquierda de la caja.
///
/// Va encima de la caja salvo que el borde superior esté a menos de
/// `LABEL_HEIGHT` del borde de la superficie; en ese caso va dentro.
/// Después se ajusta para que no salga de la superficie.
pub fn place_label(anchor: PixelRect, text_width: u32, surface: (u32, u32)) -> LabelPlacement {
    let (sw, sh) = surface;
    let width = (text_width + 2 * LABEL_PAD_X).min(sw);
    let height = LABEL_HEIGHT.min(sh);

    let inside = anchor.y < LABEL_HEIGHT as i32;
    let y = if inside { anchor.y } else { anchor.y - LABEL_HEIGHT as i32 };
    let y = y.clamp(0, (sh - height) as i32);
    let x = anchor.x.clamp(0, (sw - width) as i32);

    LabelPlacement {
        rect: PixelRect { x, y, width, height },
        inside,
    }
}

fn rgba(color: ClassColor) -> Rgba<u8> {
    let [r, g, b] = color.0;
    Rgba([r, g, b, 255])
}

fn stroke_rect(canvas: &mut RgbaImage, r: PixelRect, color: Rgba<u8>) {
    for t in 0..STROKE_WIDTH {
        if r.width <= 2 * t || r.height <= 2 * t {
            break;
        }
        let rect = Rect::at(r.x + t as i32, r.y + t as i32).of_size(r.width - 2 * t, r.height - 2 * t);
        draw_hollow_rect_mut(canvas, rect, color);
    }
}

fn base_layer(source: &DynamicImage, width: u32, height: u32) -> RgbaImage {
    let rgba = source.to_rgba8();
    if rgba.dimensions() == (width, height) {
        rgba
    } else {
        image::imageops::resize(&rgba, width, height, FilterType::Triangle)
    }
}

/// Compone la imagen base escalada y todas las detecciones en orden de lista.
///
/// Cada llamada parte de una copia nueva de `source`: mismas entradas, mismos píxeles.
/// Las cajas degeneradas tras el recorte no se dibujan pero cuentan en el resumen.
pub fn render_overlay(
    source: &DynamicImage,
    surface: &RenderSurface,
    detections: &DetectionList,
    catalog: &ClassCatalog,
) -> Overlay {
    let (pw, ph) = surface.pixel_size();
    let mut canvas = base_layer(source, pw, ph);
    let mut boxes_drawn = 0;

    for det in detections {
        let rb = to_render_space(&det.bbox, detections.mode, surface.source, surface.scale);
        if rb.is_degenerate() {
            continue;
        }
        let entry = catalog.resolve(det.class_id);
        let color = rgba(entry.color);
        let px = rb.to_pixels();
        stroke_rect(&mut canvas, px, color);

        let label = label_text(&entry.name, det.score);
        let placement = place_label(px, font::text_width(&label, LABEL_TEXT_SCALE), (pw, ph));
        let bg = placement.rect;
        draw_filled_rect_mut(&mut canvas, Rect::at(bg.x, bg.y).of_size(bg.width, bg.height), color);
        font::draw_text_mut(
            &mut canvas,
            bg.x + LABEL_PAD_X as i32,
            bg.y + LABEL_PAD_Y as i32,
            &label,
            LABEL_TEXT_SCALE,
            TEXT_COLOR,
        );
        boxes_drawn += 1;
    }

    Overlay {
        image: canvas,
        boxes_drawn,
        summary: summary_text(detections.len()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::catalog::PALETTE;
    use crate::domain::detection::{BoxMode, Detection};
    use crate::domain::geometry::Dims;

    const WHITE: [u8; 4] = [255, 255, 255, 255];

    fn white(width: u32, height: u32) -> DynamicImage {
        DynamicImage::ImageRgba8(RgbaImage::from_pixel(width, height, Rgba(WHITE)))
    }

    fn with_alpha(c: ClassColor) -> [u8; 4] {
        rgba(c).0
    }

    #[test]
    fn label_text_uses_one_decimal() {
        assert_eq!(label_text("person", 0.92), "person 92.0%");
        assert_eq!(label_text("dog", 0.7777), "dog 77.8%");
    }

    #[test]
    fn label_goes_above_box_when_there_is_room() {
        let anchor = PixelRect { x: 50, y: 60, width: 100, height: 40 };
        let p = place_label(anchor, 30, (400, 300));
        assert!(!p.inside);
        assert_eq!(p.rect, PixelRect { x: 50, y: 40, width: 40, height: LABEL_HEIGHT });
    }

    #[test]
    fn label_moves_inside_near_top_edge() {
        let anchor = PixelRect { x: 50, y: 8, width: 100, height: 40 };
        let p = place_label(anchor, 30, (400, 300));
        assert!(p.inside);
        assert_eq!(p.rect.y, 8);
    }

    #[test]
    fn label_is_clamped_to_right_edge() {
        let anchor = PixelRect { x: 380, y: 100, width: 20, height: 20 };
        let p = place_label(anchor, 60, (400, 300));
        assert_eq!(p.rect.x + p.rect.width as i32, 400);
    }

    #[test]
    fn box_outline_uses_class_color_and_two_pixel_stroke() {
        let catalog = ClassCatalog::coco();
        let surface = RenderSurface::fit(Dims::new(200, 100), 800);
        let list = DetectionList::new(BoxMode::Normalized, vec![Detection::new(0, 0.9, [0.25, 0.5, 0.5, 0.4])]);

        let out = render_overlay(&white(200, 100), &surface, &list, &catalog);
        let c = with_alpha(PALETTE[0]);
        assert_eq!(out.boxes_drawn, 1);
        assert_eq!(out.image.get_pixel(50, 80).0, c);
        assert_eq!(out.image.get_pixel(51, 80).0, c);
        assert_eq!(out.image.get_pixel(52, 80).0, WHITE);
        assert_eq!(out.image.get_pixel(100, 70).0, WHITE);
        // fondo de la etiqueta encima de la caja (y 30..50)
        assert_eq!(out.image.get_pixel(51, 31).0, c);
    }

    #[test]
    fn surface_is_downscaled_to_max_width() {
        let surface = RenderSurface::fit(Dims::new(1000, 800), 500);
        let out = render_overlay(&white(1000, 800), &surface, &DetectionList::default(), &ClassCatalog::coco());
        assert_eq!(out.image.dimensions(), (500, 400));
    }

    #[test]
    fn later_detection_draws_on_top() {
        let surface = RenderSurface::fit(Dims::new(100, 100), 800);
        let list = DetectionList::new(
            BoxMode::Normalized,
            vec![
                Detection::new(0, 0.9, [0.1, 0.5, 0.5, 0.3]),
                Detection::new(1, 0.8, [0.1, 0.5, 0.5, 0.3]),
            ],
        );
        let out = render_overlay(&white(100, 100), &surface, &list, &ClassCatalog::coco());
        assert_eq!(out.image.get_pixel(10, 70).0, with_alpha(PALETTE[1]));
    }

    #[test]
    fn degenerate_box_is_listed_but_not_drawn() {
        let surface = RenderSurface::fit(Dims::new(100, 100), 800);
        let list = DetectionList::new(BoxMode::Normalized, vec![Detection::new(0, 0.9, [1.5, 0.2, 0.2, 0.2])]);
        let out = render_overlay(&white(100, 100), &surface, &list, &ClassCatalog::coco());
        assert_eq!(out.boxes_drawn, 0);
        assert_eq!(out.summary, "1 object detected");
        assert!(out.image.pixels().all(|p| p.0 == WHITE));
    }
}
