//! Page render scheduler - drives one render pass over the document
//!
//! A pass is started for one (document, scale inputs) pair and walks the pages in
//! ascending order, one request at a time: raster page N, then its text layer, then
//! page N + 1. Starting a new pass cancels every in-flight raster first and only then
//! issues the new pass's first request, so two live rasters never target the same
//! surface. Responses that belong to a superseded request are dropped.

use std::collections::VecDeque;

use super::cancel::RenderTask;
use super::geometry::{PageGeometry, ScaleInputs};
use super::loader::DocumentGeneration;
use super::request::{RenderRequest, RenderResponse, RequestId, RequestSink};
use super::surface::RenderSurfacePool;
use super::text_layer::TextLayer;

/// What a pass renders for
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PassKey {
    pub generation: DocumentGeneration,
    pub inputs: ScaleInputs,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Stage {
    /// Nothing outstanding
    Ready,
    /// Waiting for a page raster
    Raster { page: usize, id: RequestId },
    /// Raster committed, waiting for the page's text content
    Text {
        page: usize,
        id: RequestId,
        geometry: PageGeometry,
    },
}

#[derive(Debug)]
struct RenderPass {
    key: PassKey,
    page_count: usize,
    queue: VecDeque<usize>,
    stage: Stage,
}

impl RenderPass {
    fn is_active(&self) -> bool {
        self.stage != Stage::Ready || !self.queue.is_empty()
    }
}

/// What handling a response changed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ResponseOutcome {
    /// Page whose surface received a new raster
    pub committed: Option<usize>,
    /// Page whose text layer was replaced
    pub text_layer: Option<usize>,
}

/// Sequential renderer of every page for the current inputs
#[derive(Debug, Default)]
pub struct PageRenderScheduler {
    pass: Option<RenderPass>,
    next_request_id: u64,
}

impl PageRenderScheduler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Start rendering pages `1..=page_count` for `key`, superseding the active pass.
    ///
    /// Does nothing if the active pass already renders for the same key.
    pub fn start_pass(
        &mut self,
        key: PassKey,
        page_count: usize,
        pool: &mut RenderSurfacePool,
        sink: &dyn RequestSink,
    ) {
        if self.pass.as_ref().is_some_and(|pass| pass.key == key) {
            log::debug!("Render pass for {key:?} already started");
            return;
        }

        let cancelled = pool.cancel_all();
        if cancelled > 0 {
            log::debug!("Cancelled {cancelled} in-flight render(s) for new pass");
        }

        if !key.inputs.is_renderable() {
            log::debug!(
                "No room to render (container width {:.1}), skipping pass",
                key.inputs.container_width
            );
            self.pass = None;
            return;
        }

        log::debug!(
            "Starting render pass: {page_count} page(s), width {:.1}, zoom {}%",
            key.inputs.container_width,
            key.inputs.zoom_percent
        );

        self.pass = Some(RenderPass {
            key,
            page_count,
            queue: (1..=page_count).collect(),
            stage: Stage::Ready,
        });
        self.advance(pool, sink);
    }

    /// Cancel the active pass
    pub fn stop(&mut self, pool: &mut RenderSurfacePool) {
        pool.cancel_all();
        if self.pass.take().is_some_and(|pass| pass.is_active()) {
            log::debug!("Render pass stopped");
        }
    }

    /// A page element mounted after the pass started: render it with the pass inputs
    pub fn page_mounted(&mut self, page: usize, pool: &mut RenderSurfacePool, sink: &dyn RequestSink) {
        let Some(pass) = self.pass.as_mut() else {
            return;
        };
        if page == 0 || page > pass.page_count || pass.queue.contains(&page) {
            return;
        }
        pass.queue.push_back(page);
        self.advance(pool, sink);
    }

    /// A page element went away; it no longer needs rendering
    pub fn page_unmounted(&mut self, page: usize) {
        if let Some(pass) = self.pass.as_mut() {
            pass.queue.retain(|&queued| queued != page);
        }
    }

    /// Whether the active pass still has pages to render
    #[must_use]
    pub fn is_rendering(&self) -> bool {
        self.pass.as_ref().is_some_and(RenderPass::is_active)
    }

    /// Key of the active (or last completed) pass
    #[must_use]
    pub fn pass_key(&self) -> Option<PassKey> {
        self.pass.as_ref().map(|pass| pass.key)
    }

    /// Apply a worker response and keep the pass moving
    pub fn handle_response(
        &mut self,
        response: RenderResponse,
        pool: &mut RenderSurfacePool,
        sink: &dyn RequestSink,
    ) -> ResponseOutcome {
        let mut outcome = ResponseOutcome::default();

        match response {
            RenderResponse::Raster {
                id,
                page,
                geometry,
                pixels,
            } => {
                let committed = pool
                    .entry_mut(page)
                    .is_some_and(|entry| entry.complete_render(id, geometry, pixels));
                if committed {
                    log::trace!(
                        "Page {page} painted at {}x{} px",
                        geometry.pixel_width,
                        geometry.pixel_height
                    );
                    outcome.committed = Some(page);
                } else {
                    log::debug!("Dropping stale raster for page {page} ({id:?})");
                }

                if self.stage() == Some(Stage::Raster { page, id }) {
                    if committed {
                        self.request_text(page, geometry, sink);
                    } else {
                        self.set_stage(Stage::Ready);
                    }
                }
            }

            RenderResponse::Text { id, page, content } => {
                if let Some(Stage::Text {
                    page: staged,
                    id: staged_id,
                    geometry,
                }) = self.stage()
                    && staged == page
                    && staged_id == id
                {
                    if let Some(entry) = pool.text_entry_mut(page) {
                        entry.replace(TextLayer::layout(&content, &geometry));
                        outcome.text_layer = Some(page);
                    }
                    self.set_stage(Stage::Ready);
                } else {
                    log::debug!("Dropping stale text content for page {page}");
                }
            }

            RenderResponse::Cancelled(id) => {
                log::debug!("Render {id:?} cancelled");
                self.settle(id, pool);
            }

            RenderResponse::Error { id, page, error } => {
                if error.is_cancelled() {
                    log::debug!("Render of page {page} cancelled");
                } else {
                    log::error!("Failed to render page {page}: {error}");
                }
                // The raster is already at the new scale; the old layer no longer lines up
                if let Some(Stage::Text { page: staged, id: staged_id, .. }) = self.stage()
                    && staged == page
                    && staged_id == id
                    && let Some(entry) = pool.text_entry_mut(page)
                {
                    entry.clear();
                    outcome.text_layer = Some(page);
                }
                self.settle(id, pool);
            }

            RenderResponse::Loaded { .. } | RenderResponse::LoadFailed(_) => {}
        }

        self.advance(pool, sink);
        outcome
    }

    /// Issue the next raster if nothing is outstanding
    fn advance(&mut self, pool: &mut RenderSurfacePool, sink: &dyn RequestSink) {
        loop {
            let Some(pass) = self.pass.as_mut() else {
                return;
            };
            if pass.stage != Stage::Ready {
                return;
            }
            let Some(page) = pass.queue.pop_front() else {
                log::debug!("Render pass complete");
                return;
            };
            let inputs = pass.key.inputs;

            // Mounting later puts the page back in the queue
            let Some(entry) = pool.entry_mut(page) else {
                continue;
            };

            if let Some(stale) = entry.cancel_in_flight() {
                log::debug!("Cancelled {stale:?} for page {page} before reissue");
            }

            self.next_request_id += 1;
            let task = RenderTask::new(RequestId::new(self.next_request_id));
            let request = RenderRequest::Raster {
                id: task.id,
                page,
                inputs,
                token: task.token.clone(),
            };
            let id = task.id;
            entry.start_render(task);

            if !sink.send_request(request) {
                log::warn!("Render worker is gone, abandoning pass");
                entry.settle(id);
                self.pass = None;
                return;
            }

            self.set_stage(Stage::Raster { page, id });
        }
    }

    fn request_text(&mut self, page: usize, geometry: PageGeometry, sink: &dyn RequestSink) {
        self.next_request_id += 1;
        let id = RequestId::new(self.next_request_id);
        if sink.send_request(RenderRequest::TextContent { id, page }) {
            self.set_stage(Stage::Text { page, id, geometry });
        } else {
            log::warn!("Render worker is gone, abandoning pass");
            self.pass = None;
        }
    }

    /// Forget request `id` after it was cancelled or failed
    fn settle(&mut self, id: RequestId, pool: &mut RenderSurfacePool) {
        if let Some(page) = pool.page_for_request(id)
            && let Some(entry) = pool.entry_mut(page)
        {
            entry.settle(id);
        }

        let outstanding = match self.stage() {
            Some(Stage::Raster { id: staged, .. } | Stage::Text { id: staged, .. }) => staged == id,
            _ => false,
        };
        if outstanding {
            self.set_stage(Stage::Ready);
        }
    }

    fn stage(&self) -> Option<Stage> {
        self.pass.as_ref().map(|pass| pass.stage)
    }

    fn set_stage(&mut self, stage: Stage) {
        if let Some(pass) = self.pass.as_mut() {
            pass.stage = stage;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use super::*;
    use crate::preview::cancel::CancellationToken;
    use crate::preview::error::RenderError;
    use crate::preview::types::{PageSize, PixelBuffer, TextContent, TextItem};

    #[derive(Default)]
    struct RecordingSink {
        requests: RefCell<Vec<RenderRequest>>,
        closed: bool,
    }

    impl RequestSink for RecordingSink {
        fn send_request(&self, request: RenderRequest) -> bool {
            if self.closed {
                return false;
            }
            self.requests.borrow_mut().push(request);
            true
        }
    }

    impl RecordingSink {
        fn take(&self) -> Vec<RenderRequest> {
            std::mem::take(&mut *self.requests.borrow_mut())
        }
    }

    fn inputs(width: f64) -> ScaleInputs {
        ScaleInputs {
            container_width: width,
            zoom_percent: 100,
            device_pixel_ratio: 1.0,
            horizontal_padding: 48.0,
            min_pixel_density: 4.0,
        }
    }

    fn key(width: f64) -> PassKey {
        PassKey {
            generation: DocumentGeneration(1),
            inputs: inputs(width),
        }
    }

    fn pool_with(pages: usize) -> RenderSurfacePool {
        let mut pool = RenderSurfacePool::new();
        for page in 1..=pages {
            pool.mount(page);
        }
        pool
    }

    /// Raster request fields
    fn raster(request: &RenderRequest) -> (RequestId, usize, ScaleInputs, CancellationToken) {
        match request {
            RenderRequest::Raster {
                id,
                page,
                inputs,
                token,
            } => (*id, *page, *inputs, token.clone()),
            other => panic!("expected raster request, got {other:?}"),
        }
    }

    fn text(request: &RenderRequest) -> (RequestId, usize) {
        match request {
            RenderRequest::TextContent { id, page } => (*id, *page),
            other => panic!("expected text request, got {other:?}"),
        }
    }

    fn raster_done(id: RequestId, page: usize, inputs: &ScaleInputs) -> RenderResponse {
        let geometry = PageGeometry::compute(PageSize::new(600.0, 800.0), inputs).unwrap();
        RenderResponse::Raster {
            id,
            page,
            geometry,
            pixels: PixelBuffer::try_new(geometry.pixel_width, geometry.pixel_height).unwrap(),
        }
    }

    fn text_done(id: RequestId, page: usize) -> RenderResponse {
        RenderResponse::Text {
            id,
            page,
            content: TextContent {
                items: vec![TextItem {
                    text: format!("page {page}"),
                    x: 10.0,
                    y: 10.0,
                    width: 50.0,
                    height: 12.0,
                    font_size: 11.0,
                }],
            },
        }
    }

    /// Complete the outstanding raster and text requests of one page
    fn finish_page(
        scheduler: &mut PageRenderScheduler,
        pool: &mut RenderSurfacePool,
        sink: &RecordingSink,
    ) -> usize {
        let requests = sink.take();
        let (id, page, inputs, _) = raster(&requests[0]);
        scheduler.handle_response(raster_done(id, page, &inputs), pool, sink);
        let requests = sink.take();
        let (text_id, text_page) = text(&requests[0]);
        assert_eq!(text_page, page);
        scheduler.handle_response(text_done(text_id, page), pool, sink);
        page
    }

    #[test]
    fn text_failure_clears_layer_from_previous_scale() {
        let mut pool = pool_with(2);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 2, &mut pool, &sink);
        finish_page(&mut scheduler, &mut pool, &sink);
        finish_page(&mut scheduler, &mut pool, &sink);
        assert!(pool.text_layer(1).is_some());

        scheduler.start_pass(key(1000.0), 2, &mut pool, &sink);
        let requests = sink.take();
        let (id, page, inputs, _) = raster(&requests[0]);
        scheduler.handle_response(raster_done(id, page, &inputs), &mut pool, &sink);
        let requests = sink.take();
        let (text_id, _) = text(&requests[0]);

        let outcome = scheduler.handle_response(
            RenderResponse::Error {
                id: text_id,
                page: 1,
                error: RenderError::failure("no text"),
            },
            &mut pool,
            &sink,
        );

        assert_eq!(outcome.text_layer, Some(1));
        assert!(pool.text_layer(1).is_none());
        assert!((pool.surface(1).unwrap().css_width - 952.0).abs() < 1e-9);
        // the pass moves on to page 2
        let (_, next, _, _) = raster(&sink.take()[0]);
        assert_eq!(next, 2);
        assert!(pool.text_layer(2).is_some());
    }

    #[test]
    fn pages_render_one_at_a_time_in_order() {
        let mut pool = pool_with(3);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 3, &mut pool, &sink);
        assert_eq!(sink.requests.borrow().len(), 1);

        let order: Vec<usize> = (0..3)
            .map(|_| finish_page(&mut scheduler, &mut pool, &sink))
            .collect();
        assert_eq!(order, vec![1, 2, 3]);
        assert!(!scheduler.is_rendering());
        assert!(sink.take().is_empty());

        for page in 1..=3 {
            assert!(pool.surface(page).unwrap().is_painted());
            assert_eq!(pool.text_layer(page).unwrap().plain_text(), format!("page {page}"));
        }
    }

    #[test]
    fn text_layer_waits_for_raster() {
        let mut pool = pool_with(1);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 1, &mut pool, &sink);
        let requests = sink.take();
        assert_eq!(requests.len(), 1);
        assert!(matches!(requests[0], RenderRequest::Raster { .. }));
        assert!(pool.text_layer(1).is_none());
    }

    #[test]
    fn new_pass_cancels_before_reissuing() {
        let mut pool = pool_with(2);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 2, &mut pool, &sink);
        let (old_id, _, old_inputs, old_token) = raster(&sink.take()[0]);

        scheduler.start_pass(key(1000.0), 2, &mut pool, &sink);
        assert!(old_token.is_cancelled());
        let (new_id, page, new_inputs, new_token) = raster(&sink.take()[0]);
        assert_eq!(page, 1);
        assert!(!new_token.is_cancelled());

        // the superseded raster finishes anyway and must not land
        let outcome = scheduler.handle_response(raster_done(old_id, 1, &old_inputs), &mut pool, &sink);
        assert_eq!(outcome.committed, None);
        assert!(!pool.surface(1).unwrap().is_painted());
        assert!(sink.take().is_empty());

        let outcome = scheduler.handle_response(raster_done(new_id, 1, &new_inputs), &mut pool, &sink);
        assert_eq!(outcome.committed, Some(1));
        assert!((pool.surface(1).unwrap().css_width - 952.0).abs() < 1e-9);
    }

    #[test]
    fn same_key_does_not_restart() {
        let mut pool = pool_with(1);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 1, &mut pool, &sink);
        scheduler.start_pass(key(800.0), 1, &mut pool, &sink);
        assert_eq!(sink.take().len(), 1);
    }

    #[test]
    fn failure_does_not_abort_the_pass() {
        let mut pool = pool_with(3);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 3, &mut pool, &sink);
        assert_eq!(finish_page(&mut scheduler, &mut pool, &sink), 1);

        let (id, page, _, _) = raster(&sink.take()[0]);
        assert_eq!(page, 2);
        scheduler.handle_response(
            RenderResponse::Error {
                id,
                page,
                error: RenderError::failure("corrupt content stream"),
            },
            &mut pool,
            &sink,
        );
        assert!(pool.entry(2).unwrap().in_flight().is_none());
        assert!(!pool.surface(2).unwrap().is_painted());

        assert_eq!(finish_page(&mut scheduler, &mut pool, &sink), 3);
        assert!(!scheduler.is_rendering());
    }

    #[test]
    fn cancelled_page_moves_on_quietly() {
        let mut pool = pool_with(2);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 2, &mut pool, &sink);
        let (id, _, _, _) = raster(&sink.take()[0]);
        scheduler.handle_response(RenderResponse::Cancelled(id), &mut pool, &sink);

        let (_, page, _, _) = raster(&sink.take()[0]);
        assert_eq!(page, 2);
    }

    #[test]
    fn late_mount_is_rendered_with_pass_inputs() {
        let mut pool = pool_with(1);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 2, &mut pool, &sink);
        assert_eq!(finish_page(&mut scheduler, &mut pool, &sink), 1);
        // page 2 was not mounted when its turn came
        assert!(!scheduler.is_rendering());

        pool.mount(2);
        scheduler.page_mounted(2, &mut pool, &sink);
        assert!(scheduler.is_rendering());
        let (_, page, inputs, _) = raster(&sink.requests.borrow()[0]);
        assert_eq!(page, 2);
        assert_eq!(inputs, key(800.0).inputs);

        // out-of-range mounts are ignored
        scheduler.page_mounted(9, &mut pool, &sink);
        assert_eq!(sink.requests.borrow().len(), 1);
    }

    #[test]
    fn unrenderable_inputs_start_nothing() {
        let mut pool = pool_with(1);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(40.0), 1, &mut pool, &sink);
        assert!(sink.take().is_empty());
        assert!(!scheduler.is_rendering());
    }

    #[test]
    fn stop_cancels_in_flight_render() {
        let mut pool = pool_with(1);
        let sink = RecordingSink::default();
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 1, &mut pool, &sink);
        let (_, _, _, token) = raster(&sink.take()[0]);
        scheduler.stop(&mut pool);
        assert!(token.is_cancelled());
        assert!(!scheduler.is_rendering());
        assert!(scheduler.pass_key().is_none());
    }

    #[test]
    fn closed_sink_abandons_pass() {
        let mut pool = pool_with(2);
        let sink = RecordingSink {
            closed: true,
            ..RecordingSink::default()
        };
        let mut scheduler = PageRenderScheduler::new();

        scheduler.start_pass(key(800.0), 2, &mut pool, &sink);
        assert!(!scheduler.is_rendering());
        assert!(pool.entry(1).unwrap().in_flight().is_none());
    }
}
