use image::DynamicImage;
use std::sync::Arc;

use super::errors::{DomainError, DomainResult};
use super::geometry::Dims;

/// Archivo seleccionado por el usuario, todavía sin decodificar.
#[derive(Debug, Clone)]
pub struct ImageFile {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
}

impl ImageFile {
    pub fn new(name: impl Into<String>, mime: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            bytes: bytes.into(),
        }
    }

    /// Acepta `image/*`. Si el MIME falta o es genérico, se mira la cabecera
    /// de los bytes; cualquier otro tipo se rechaza.
    pub fn check_image_type(&self) -> DomainResult<()> {
        let mime = self.mime.trim().to_ascii_lowercase();
        if mime.starts_with("image/") {
            return Ok(());
        }
        if (mime.is_empty() || mime == "application/octet-stream")
            && image::guess_format(&self.bytes).is_ok()
        {
            return Ok(());
        }
        let shown = if mime.is_empty() { "<sin tipo>" } else { mime.as_str() };
        Err(DomainError::InvalidFileType(format!("{} ({shown})", self.name)))
    }
}

/// Imagen decodificada propiedad de una sesión.
#[derive(Debug, Clone)]
pub struct ImageHandle {
    pub name: String,
    pub mime: String,
    pub bytes: Arc<[u8]>,
    pub image: Arc<DynamicImage>,
}

impl ImageHandle {
    pub fn dims(&self) -> Dims {
        Dims::new(self.image.width(), self.image.height())
    }
}

/// Decodifica el archivo. Operación bloqueante: llamar desde `spawn_blocking`.
pub fn decode_image(file: &ImageFile) -> DomainResult<ImageHandle> {
    let image = image::load_from_memory(&file.bytes)
        .map_err(|e| DomainError::Decode(format!("{}: {e}", file.name)))?;
    if image.width() == 0 || image.height() == 0 {
        return Err(DomainError::Decode(format!("{}: dimensiones nulas", file.name)));
    }
    Ok(ImageHandle {
        name: file.name.clone(),
        mime: file.mime.clone(),
        bytes: file.bytes.clone(),
        image: Arc::new(image),
    })
}

#[cfg(test)]
pub(crate) fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbImage::from_fn(width, height, |x, y| image::Rgb([(x % 256) as u8, (y % 256) as u8, 90]));
    let mut out = std::io::Cursor::new(Vec::new());
    DynamicImage::ImageRgb8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}
