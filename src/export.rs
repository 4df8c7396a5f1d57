//! Writing rendered pages to disk

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use image::{ImageBuffer, Rgb};

use crate::preview::{RenderSurface, TextLayer};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("page surface has not been painted")]
    NotPainted,

    #[error("pixel buffer does not match {width}x{height}")]
    BufferMismatch { width: u32, height: u32 },

    #[error("failed to encode {path:?}: {source}")]
    Image {
        path: PathBuf,
        source: image::ImageError,
    },

    #[error("failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to serialize text layer: {0}")]
    Json(#[from] serde_json::Error),
}

/// Save a painted surface's backing buffer as PNG
pub fn save_surface_png(surface: &RenderSurface, path: &Path) -> Result<(), ExportError> {
    let pixels = surface.pixels().ok_or(ExportError::NotPainted)?;
    let (width, height) = (pixels.width(), pixels.height());

    let image: ImageBuffer<Rgb<u8>, &[u8]> = ImageBuffer::from_raw(width, height, pixels.data())
        .ok_or(ExportError::BufferMismatch { width, height })?;

    image.save(path).map_err(|source| ExportError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Save a text layer as pretty-printed JSON
pub fn save_text_layer_json(layer: &TextLayer, path: &Path) -> Result<(), ExportError> {
    let file = File::create(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::to_writer_pretty(BufWriter::new(file), layer)?;
    Ok(())
}
