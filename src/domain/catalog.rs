use serde::{Serialize, Serializer};
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::errors::{DomainError, DomainResult};

/// Color RGB de una clase.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClassColor(pub [u8; 3]);

impl ClassColor {
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self([r, g, b])
    }

    pub fn hex(&self) -> String {
        let [r, g, b] = self.0;
        format!("#{r:02x}{g:02x}{b:02x}")
    }
}

impl Serialize for ClassColor {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.hex())
    }
}

/// Paleta fija de 20 colores; las clases la recorren de forma cíclica.
pub const PALETTE: [ClassColor; 20] = [
    ClassColor::rgb(0xff, 0x38, 0x38),
    ClassColor::rgb(0xff, 0x9d, 0x97),
    ClassColor::rgb(0xff, 0x70, 0x1f),
    ClassColor::rgb(0xff, 0xb2, 0x1d),
    ClassColor::rgb(0xcf, 0xd2, 0x31),
    ClassColor::rgb(0x48, 0xf9, 0x0a),
    ClassColor::rgb(0x92, 0xcc, 0x17),
    ClassColor::rgb(0x3d, 0xdb, 0x86),
    ClassColor::rgb(0x1a, 0x93, 0x34),
    ClassColor::rgb(0x00, 0xd4, 0xbb),
    ClassColor::rgb(0x2c, 0x99, 0xa8),
    ClassColor::rgb(0x00, 0xc2, 0xff),
    ClassColor::rgb(0x34, 0x45, 0x93),
    ClassColor::rgb(0x64, 0x73, 0xff),
    ClassColor::rgb(0x00, 0x18, 0xec),
    ClassColor::rgb(0x84, 0x38, 0xff),
    ClassColor::rgb(0x52, 0x00, 0x85),
    ClassColor::rgb(0xcb, 0x38, 0xff),
    ClassColor::rgb(0xff, 0x95, 0xc8),
    ClassColor::rgb(0xff, 0x37, 0xc7),
];

const COCO_CLASSES: [&str; 80] = [
    "person", "bicycle", "car", "motorcycle", "airplane", "bus", "train", "truck", "boat",
    "traffic light", "fire hydrant", "stop sign", "parking meter", "bench", "bird", "cat", "dog",
    "horse", "sheep", "cow", "elephant", "bear", "zebra", "giraffe", "backpack", "umbrella",
    "handbag", "tie", "suitcase", "frisbee", "skis", "snowboard", "sports ball", "kite",
    "baseball bat", "baseball glove", "skateboard", "surfboard", "tennis racket",
    "bottle", "wine glass", "cup", "fork", "knife", "spoon", "bowl", "banana",
    "apple", "sandwich", "orange", "broccoli", "carrot", "hot dog", "pizza",
    "donut", "cake", "chair", "couch", "potted plant", "bed", "dining table", "toilet", "tv",
    "laptop", "mouse", "remote", "keyboard", "cell phone", "microwave", "oven", "toaster",
    "sink", "refrigerator", "book", "clock", "vase", "scissors", "teddy bear", "hair drier", "toothbrush",
];

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassEntry {
    pub name: String,
    pub color: ClassColor,
}

/// Catálogo inmutable `class_id -> (nombre, color)`.
///
/// Se construye una vez al arrancar. Los ids fuera de rango se resuelven
/// con `class_id % len`, nunca con error.
#[derive(Debug, Clone)]
pub struct ClassCatalog {
    entries: Vec<ClassEntry>,
}

impl ClassCatalog {
    pub fn new(entries: Vec<ClassEntry>) -> DomainResult<Self> {
        if entries.is_empty() {
            return Err(DomainError::Config("el catálogo de clases está vacío".into()));
        }
        Ok(Self { entries })
    }

    /// Asigna colores de la paleta en orden a una lista de nombres.
    pub fn from_names<I, S>(names: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let entries = names
            .into_iter()
            .enumerate()
            .map(|(i, name)| ClassEntry {
                name: name.into(),
                color: PALETTE[i % PALETTE.len()],
            })
            .collect();
        Self::new(entries)
    }

    /// Catálogo COCO de 80 clases.
    pub fn coco() -> Self {
        let entries = COCO_CLASSES
            .iter()
            .enumerate()
            .map(|(i, name)| ClassEntry {
                name: (*name).to_string(),
                color: PALETTE[i % PALETTE.len()],
            })
            .collect();
        Self { entries }
    }

    /// Lee un fichero de clases con un nombre por línea (se ignoran las vacías).
    pub fn load(path: &Path) -> DomainResult<Self> {
        let file = File::open(path)
            .map_err(|e| DomainError::Config(format!("no se pudo abrir {}: {e}", path.display())))?;
        let mut names = Vec::new();
        for line in BufReader::new(file).lines() {
            let line = line
                .map_err(|e| DomainError::Config(format!("error leyendo {}: {e}", path.display())))?;
            let name = line.trim();
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
        Self::from_names(names)
    }

    pub fn resolve(&self, class_id: u32) -> &ClassEntry {
        &self.entries[class_id as usize % self.entries.len()]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for ClassCatalog {
    fn default() -> Self {
        Self::coco()
    }
}
