//! Seam between the engine and the document backend
//!
//! The engine never looks inside a compiled document. It only asks a backend to open
//! a source, then asks the opened document for page handles. Handles are fetched
//! again for every render and never kept across passes.

use super::cancel::CancellationToken;
use super::error::{LoadError, RenderError};
use super::types::{PageSize, PixelBuffer, SourceRef, TextContent};

/// Opens document sources. Shared with the render worker thread.
pub trait DocumentBackend: Send + Sync {
    /// Parse `source` into a paginated document
    fn open(&self, source: &SourceRef) -> Result<Box<dyn PaginatedDocument>, LoadError>;
}

/// An opened document, owned by the worker thread that opened it
pub trait PaginatedDocument {
    fn page_count(&self) -> usize;

    /// Fetch a handle for a 1-based page number
    fn page(&self, page: usize) -> Result<Box<dyn PageHandle + '_>, RenderError>;
}

/// Per-page proxy used for one render
pub trait PageHandle {
    /// Viewport at scale 1
    fn size(&self) -> PageSize;

    /// Viewport at the given scale
    fn viewport(&self, scale: f64) -> PageSize {
        self.size().scaled(scale)
    }

    /// Rasterize the page into `target`, which is already sized for `scale`.
    ///
    /// Implementations should check `cancel` where they can and return
    /// [`RenderError::Cancelled`] once it is set.
    fn render(
        &self,
        target: &mut PixelBuffer,
        scale: f64,
        cancel: &CancellationToken,
    ) -> Result<(), RenderError>;

    /// Positioned text runs for the selectable text layer
    fn text_content(&self) -> Result<TextContent, RenderError>;
}

/// Validate a 1-based page number against a page count
pub(crate) fn check_page(page: usize, page_count: usize) -> Result<(), RenderError> {
    if page == 0 || page > page_count {
        Err(RenderError::PageOutOfRange { page, page_count })
    } else {
        Ok(())
    }
}
