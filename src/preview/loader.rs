//! Document loader - resolves a source into a live document handle
//!
//! Each load spawns a render worker that opens the source and then serves render
//! requests for it. The loader owns that worker for as long as the source stays
//! current; loading another source (or unloading) shuts it down, after which none of
//! its responses can reach the engine.

use std::sync::Arc;
use std::time::Duration;

use flume::{Receiver, Sender};

use super::backend::DocumentBackend;
use super::error::LoadError;
use super::request::{RenderRequest, RenderResponse, RequestSink};
use super::types::SourceRef;
use super::worker::render_worker;

/// Identifies one load of one source. Increases with every load.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DocumentGeneration(pub u64);

struct ActiveDocument {
    generation: DocumentGeneration,
    source: SourceRef,
    request_tx: Sender<RenderRequest>,
    response_rx: Receiver<RenderResponse>,
    page_count: Option<usize>,
}

/// Owns the handle of the currently loaded document
pub struct DocumentLoader {
    backend: Arc<dyn DocumentBackend>,
    active: Option<ActiveDocument>,
    next_generation: u64,
}

impl DocumentLoader {
    #[must_use]
    pub fn new(backend: Arc<dyn DocumentBackend>) -> Self {
        Self {
            backend,
            active: None,
            next_generation: 1,
        }
    }

    /// Start loading `source`, superseding whatever was loaded before.
    ///
    /// Completion arrives later as [`RenderResponse::Loaded`] or
    /// [`RenderResponse::LoadFailed`] on the response channel. Loading the same
    /// reference again is allowed and simply reopens it.
    pub fn load(&mut self, source: SourceRef) -> DocumentGeneration {
        self.unload();

        let generation = DocumentGeneration(self.next_generation);
        self.next_generation += 1;

        let (request_tx, request_rx) = flume::unbounded();
        let (response_tx, response_rx) = flume::unbounded();

        let backend = Arc::clone(&self.backend);
        let worker_source = source.clone();
        let worker_tx = response_tx.clone();
        let spawned = std::thread::Builder::new()
            .name(format!("preview-render-{}", generation.0))
            .spawn(move || render_worker(backend, worker_source, request_rx, worker_tx));

        if let Err(e) = spawned {
            log::error!("Failed to spawn render worker: {e}");
            let _ = response_tx.send(RenderResponse::LoadFailed(LoadError::WorkerUnavailable {
                reason: e.to_string(),
            }));
        }

        log::info!("Loading document {} (generation {})", source.label(), generation.0);

        self.active = Some(ActiveDocument {
            generation,
            source,
            request_tx,
            response_rx,
            page_count: None,
        });

        generation
    }

    /// Drop the current document. Pending responses are discarded.
    pub fn unload(&mut self) {
        if let Some(active) = self.active.take() {
            let _ = active.request_tx.send(RenderRequest::Shutdown);
            log::debug!(
                "Superseded document {} (generation {})",
                active.source.label(),
                active.generation.0
            );
        }
    }

    /// Record the page count reported by the worker
    pub fn mark_loaded(&mut self, page_count: usize) {
        if let Some(active) = self.active.as_mut() {
            active.page_count = Some(page_count);
        }
    }

    /// Forget a source that failed to open, keeping nothing alive for it
    pub fn mark_failed(&mut self) {
        self.active = None;
    }

    #[must_use]
    pub fn generation(&self) -> Option<DocumentGeneration> {
        self.active.as_ref().map(|a| a.generation)
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.active.as_ref().is_some_and(|a| a.page_count.is_none())
    }

    /// Whether the worker has exited and every response has been drained
    #[must_use]
    pub fn is_disconnected(&self) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.response_rx.is_disconnected() && a.response_rx.is_empty())
    }

    /// Next response if one is ready
    #[must_use]
    pub fn try_recv(&self) -> Option<RenderResponse> {
        self.active.as_ref()?.response_rx.try_recv().ok()
    }

    /// Wait up to `timeout` for the next response
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<RenderResponse> {
        self.active.as_ref()?.response_rx.recv_timeout(timeout).ok()
    }
}

impl RequestSink for DocumentLoader {
    fn send_request(&self, request: RenderRequest) -> bool {
        self.active
            .as_ref()
            .is_some_and(|a| a.request_tx.send(request).is_ok())
    }
}

impl Drop for DocumentLoader {
    fn drop(&mut self) {
        self.unload();
    }
}
