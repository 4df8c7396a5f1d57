//! Render worker - owns one opened document on a dedicated thread
//!
//! The worker handles requests strictly in arrival order, so at most one raster
//! runs at a time and pages complete in the order they were issued.

use std::sync::Arc;

use flume::{Receiver, Sender};

use super::backend::{DocumentBackend, PaginatedDocument};
use super::cancel::CancellationToken;
use super::error::{LoadError, RenderError};
use super::geometry::{PageGeometry, ScaleInputs};
use super::request::{RenderRequest, RenderResponse, RequestId};
use super::types::{PixelBuffer, SourceRef};

/// Largest raster a page may ask for (a 16384 x 16384 surface)
pub const MAX_RASTER_PIXELS: u64 = 16_384 * 16_384;

/// Main worker function - runs in a dedicated thread
#[expect(
    clippy::needless_pass_by_value,
    reason = "Values moved into thread, need ownership"
)]
pub fn render_worker(
    backend: Arc<dyn DocumentBackend>,
    source: SourceRef,
    requests: Receiver<RenderRequest>,
    responses: Sender<RenderResponse>,
) {
    let doc = match open_document(backend.as_ref(), &source) {
        Ok(doc) => doc,
        Err(e) => {
            let _ = responses.send(RenderResponse::LoadFailed(e));
            return;
        }
    };

    if responses
        .send(RenderResponse::Loaded {
            page_count: doc.page_count(),
        })
        .is_err()
    {
        return;
    }

    for request in requests {
        let response = match request {
            RenderRequest::Raster {
                id,
                page,
                inputs,
                token,
            } => handle_raster(doc.as_ref(), id, page, &inputs, &token),

            RenderRequest::TextContent { id, page } => handle_text(doc.as_ref(), id, page),

            RenderRequest::Shutdown => break,
        };

        // The engine dropped its receiver: this document was superseded.
        if responses.send(response).is_err() {
            break;
        }
    }

    log::debug!("Render worker for {} exiting", source.label());
}

fn open_document(
    backend: &dyn DocumentBackend,
    source: &SourceRef,
) -> Result<Box<dyn PaginatedDocument>, LoadError> {
    let doc = backend.open(source)?;
    if doc.page_count() == 0 {
        return Err(LoadError::Empty {
            source_label: source.label(),
        });
    }
    Ok(doc)
}

fn handle_raster(
    doc: &dyn PaginatedDocument,
    id: RequestId,
    page: usize,
    inputs: &ScaleInputs,
    token: &CancellationToken,
) -> RenderResponse {
    if token.is_cancelled() {
        return RenderResponse::Cancelled(id);
    }

    match render_page(doc, page, inputs, token) {
        Ok((geometry, pixels)) => {
            if token.is_cancelled() {
                RenderResponse::Cancelled(id)
            } else {
                RenderResponse::Raster {
                    id,
                    page,
                    geometry,
                    pixels,
                }
            }
        }
        Err(RenderError::Cancelled) => RenderResponse::Cancelled(id),
        Err(error) => RenderResponse::Error { id, page, error },
    }
}

/// Size a fresh surface for the page and rasterize into it
pub fn render_page(
    doc: &dyn PaginatedDocument,
    page: usize,
    inputs: &ScaleInputs,
    token: &CancellationToken,
) -> Result<(PageGeometry, PixelBuffer), RenderError> {
    let handle = doc.page(page)?;
    let base = handle.viewport(1.0);
    let geometry = PageGeometry::compute(base, inputs).ok_or_else(|| {
        RenderError::failure(format!(
            "page {page} has no drawable area ({:.1}x{:.1} at width {:.1})",
            base.width, base.height, inputs.container_width
        ))
    })?;

    let pixel_count = u64::from(geometry.pixel_width) * u64::from(geometry.pixel_height);
    if pixel_count > MAX_RASTER_PIXELS {
        return Err(RenderError::failure(format!(
            "page {page} raster of {}x{} pixels exceeds the {MAX_RASTER_PIXELS} pixel limit",
            geometry.pixel_width, geometry.pixel_height
        )));
    }
    let mut pixels = PixelBuffer::try_new(geometry.pixel_width, geometry.pixel_height).ok_or_else(|| {
        RenderError::failure(format!(
            "cannot allocate a {}x{} raster for page {page}",
            geometry.pixel_width, geometry.pixel_height
        ))
    })?;
    handle.render(&mut pixels, geometry.output_scale, token)?;

    Ok((geometry, pixels))
}

fn handle_text(doc: &dyn PaginatedDocument, id: RequestId, page: usize) -> RenderResponse {
    let content = doc.page(page).and_then(|handle| handle.text_content());
    match content {
        Ok(content) => RenderResponse::Text { id, page, content },
        Err(error) => RenderResponse::Error { id, page, error },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{FakeBackend, fake_source};

    fn inputs() -> ScaleInputs {
        ScaleInputs {
            container_width: 800.0,
            zoom_percent: 100,
            device_pixel_ratio: 1.0,
            horizontal_padding: 48.0,
            min_pixel_density: 4.0,
        }
    }

    fn open(pages: usize) -> Box<dyn PaginatedDocument> {
        FakeBackend::uniform(pages).open(&fake_source("doc")).unwrap()
    }

    #[test]
    fn render_page_sizes_buffer_from_geometry() {
        let doc = open(1);
        let (geometry, pixels) = render_page(doc.as_ref(), 1, &inputs(), &CancellationToken::new()).unwrap();
        assert_eq!(pixels.width(), geometry.pixel_width);
        assert_eq!(pixels.height(), geometry.pixel_height);
        assert_eq!(geometry.pixel_width, 752 * 4);
    }

    #[test]
    fn oversized_raster_fails_without_allocating() {
        let backend = FakeBackend::uniform(1);
        let log = backend.render_log();
        let doc = backend.open(&fake_source("doc")).unwrap();
        let huge = ScaleInputs {
            container_width: 1.0e6,
            zoom_percent: 200,
            ..inputs()
        };

        let err = render_page(doc.as_ref(), 1, &huge, &CancellationToken::new()).err().unwrap();
        assert!(matches!(err, RenderError::Failure { .. }));
        assert!(err.to_string().contains("pixel limit"));
        assert!(log.records().is_empty());
    }

    #[test]
    fn out_of_range_page_is_an_error_response() {
        let doc = open(2);
        let token = CancellationToken::new();
        match handle_raster(doc.as_ref(), RequestId::new(1), 3, &inputs(), &token) {
            RenderResponse::Error { error, .. } => {
                assert_eq!(error, RenderError::PageOutOfRange { page: 3, page_count: 2 });
            }
            other => panic!("unexpected response {other:?}"),
        }
    }

    #[test]
    fn cancelled_token_short_circuits() {
        let doc = open(1);
        let token = CancellationToken::new();
        token.cancel();
        assert!(matches!(
            handle_raster(doc.as_ref(), RequestId::new(4), 1, &inputs(), &token),
            RenderResponse::Cancelled(RequestId(4))
        ));
    }

    #[test]
    fn empty_document_fails_to_load() {
        let backend = FakeBackend::uniform(0);
        let err = open_document(&backend, &fake_source("empty")).err().unwrap();
        assert!(matches!(err, LoadError::Empty { .. }));
    }

    #[test]
    fn worker_reports_load_then_serves_requests() {
        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();
        let backend: Arc<dyn DocumentBackend> = Arc::new(FakeBackend::uniform(2));

        let handle = std::thread::spawn(move || {
            render_worker(backend, fake_source("doc"), request_rx, response_tx);
        });

        request_tx
            .send(RenderRequest::TextContent {
                id: RequestId::new(1),
                page: 2,
            })
            .unwrap();
        request_tx.send(RenderRequest::Shutdown).unwrap();

        assert!(matches!(response_rx.recv().unwrap(), RenderResponse::Loaded { page_count: 2 }));
        match response_rx.recv().unwrap() {
            RenderResponse::Text { page, content, .. } => {
                assert_eq!(page, 2);
                assert_eq!(content.items[0].text, "Page 2");
            }
            other => panic!("unexpected response {other:?}"),
        }
        handle.join().unwrap();
    }
}
