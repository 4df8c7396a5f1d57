//! Render request and response types

use super::cancel::CancellationToken;
use super::error::{LoadError, RenderError};
use super::geometry::{PageGeometry, ScaleInputs};
use super::types::{PixelBuffer, TextContent};

/// Unique identifier for render requests
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(pub u64);

impl RequestId {
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }
}

/// Request sent to the render worker
#[derive(Debug)]
pub enum RenderRequest {
    /// Rasterize a page at the scale derived from `inputs`
    Raster {
        id: RequestId,
        page: usize,
        inputs: ScaleInputs,
        token: CancellationToken,
    },

    /// Fetch a page's text content for its text layer
    TextContent { id: RequestId, page: usize },

    /// Shutdown the worker
    Shutdown,
}

/// Response from the render worker
#[derive(Debug)]
pub enum RenderResponse {
    /// Document opened (sent once, before any other response)
    Loaded { page_count: usize },

    /// Document could not be opened; the worker exits after sending this
    LoadFailed(LoadError),

    /// Finished raster, sized to `geometry`
    Raster {
        id: RequestId,
        page: usize,
        geometry: PageGeometry,
        pixels: PixelBuffer,
    },

    /// Text content for a page
    Text {
        id: RequestId,
        page: usize,
        content: TextContent,
    },

    /// Request was cancelled before its output was produced
    Cancelled(RequestId),

    /// Error during rendering
    Error {
        id: RequestId,
        page: usize,
        error: RenderError,
    },
}

/// Where the scheduler sends its requests
pub trait RequestSink {
    /// Queue a request. Returns false when nobody is listening anymore.
    fn send_request(&self, request: RenderRequest) -> bool;
}
