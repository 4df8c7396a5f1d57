//! MuPDF document backend

use std::path::Path;

use mupdf::text_page::TextBlockType;
use mupdf::{Colorspace, Document, Matrix, Page, TextPageFlags};

use super::backend::{DocumentBackend, PageHandle, PaginatedDocument, check_page};
use super::cancel::CancellationToken;
use super::error::{LoadError, RenderError};
use super::types::{PageSize, PixelBuffer, SourceRef, TextContent, TextItem};

/// Opens PDF (and other MuPDF-supported) documents from disk or memory
#[derive(Clone, Copy, Debug, Default)]
pub struct MupdfBackend;

impl MupdfBackend {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl DocumentBackend for MupdfBackend {
    fn open(&self, source: &SourceRef) -> Result<Box<dyn PaginatedDocument>, LoadError> {
        let doc = match source {
            SourceRef::Path(path) => Document::open(path.to_string_lossy().as_ref()),
            SourceRef::Blob { label, bytes } => Document::from_bytes(&bytes[..], magic_for(label)),
        }
        .map_err(|e| LoadError::unreadable(source.label(), e))?;

        let page_count = doc
            .page_count()
            .map_err(|e| LoadError::unreadable(source.label(), e))?;

        Ok(Box::new(MupdfDocument {
            doc,
            page_count: usize::try_from(page_count).unwrap_or(0),
        }))
    }
}

/// MuPDF picks the document handler from a file name or extension
fn magic_for(label: &str) -> &str {
    Path::new(label)
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("pdf")
}

struct MupdfDocument {
    doc: Document,
    page_count: usize,
}

impl PaginatedDocument for MupdfDocument {
    fn page_count(&self) -> usize {
        self.page_count
    }

    fn page(&self, page: usize) -> Result<Box<dyn PageHandle + '_>, RenderError> {
        check_page(page, self.page_count)?;
        let index = i32::try_from(page - 1).map_err(|e| RenderError::failure(e.to_string()))?;
        let page = self.doc.load_page(index).map_err(mupdf_failure)?;
        let bounds = page.bounds().map_err(mupdf_failure)?;

        Ok(Box::new(MupdfPage {
            page,
            origin: (f64::from(bounds.x0), f64::from(bounds.y0)),
            size: PageSize::new(
                f64::from(bounds.x1 - bounds.x0),
                f64::from(bounds.y1 - bounds.y0),
            ),
        }))
    }
}

struct MupdfPage {
    page: Page,
    origin: (f64, f64),
    size: PageSize,
}

impl PageHandle for MupdfPage {
    fn size(&self) -> PageSize {
        self.size
    }

    fn render(
        &self,
        target: &mut PixelBuffer,
        scale: f64,
        cancel: &CancellationToken,
    ) -> Result<(), RenderError> {
        if cancel.is_cancelled() {
            return Err(RenderError::Cancelled);
        }

        let matrix = Matrix::new_scale(scale as f32, scale as f32);
        let pixmap = self
            .page
            .to_pixmap(&matrix, &Colorspace::device_rgb(), false, false)
            .map_err(mupdf_failure)?;

        let channels = pixmap.n() as usize;
        if channels < PixelBuffer::CHANNELS {
            return Err(RenderError::failure(format!(
                "Unsupported pixmap format: {channels} channels"
            )));
        }

        target.blit_rows(
            pixmap.samples(),
            pixmap.width(),
            pixmap.height(),
            channels,
            pixmap.stride() as usize,
        );
        Ok(())
    }

    fn text_content(&self) -> Result<TextContent, RenderError> {
        let text_page = self
            .page
            .to_text_page(TextPageFlags::empty())
            .map_err(mupdf_failure)?;

        let mut items = Vec::new();
        for block in text_page.blocks() {
            if block.r#type() != TextBlockType::Text {
                continue;
            }
            for line in block.lines() {
                let mut text = String::new();
                let mut font_size: f32 = 0.0;
                for ch in line.chars() {
                    if let Some(c) = ch.char() {
                        text.push(c);
                    }
                    font_size = font_size.max(ch.size());
                }
                if text.trim().is_empty() {
                    continue;
                }

                let bbox = line.bounds();
                items.push(TextItem {
                    text,
                    x: f64::from(bbox.x0) - self.origin.0,
                    y: f64::from(bbox.y0) - self.origin.1,
                    width: f64::from(bbox.x1 - bbox.x0),
                    height: f64::from(bbox.y1 - bbox.y0),
                    font_size: f64::from(font_size),
                });
            }
        }

        Ok(TextContent { items })
    }
}

fn mupdf_failure(e: mupdf::error::Error) -> RenderError {
    RenderError::failure(e.to_string())
}
