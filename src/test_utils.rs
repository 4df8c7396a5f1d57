//! In-memory document backend for tests
//!
//! Documents are plain lists of page sizes. Rasters paint every pixel with a shade
//! derived from the page number, text content is one line per page unless
//! configured otherwise. A [`RasterGate`] can hold rasters inside the worker so
//! tests can act while a render is in flight.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

use crate::preview::{
    CancellationToken, DocumentBackend, LoadError, PageHandle, PageSize, PaginatedDocument,
    PixelBuffer, RenderError, SourceRef, TextContent, TextItem,
};

/// US Letter in points
pub const LETTER: PageSize = PageSize::new(612.0, 792.0);

/// Shade every raster of `page` is painted with
#[must_use]
pub fn page_shade(page: usize) -> u8 {
    (page % 200) as u8 + 20
}

/// Blob source whose label selects the fake document
#[must_use]
pub fn fake_source(label: &str) -> SourceRef {
    SourceRef::blob(label, b"%FAKE".to_vec())
}

/// One raster the fake backend performed
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRecord {
    pub page: usize,
    pub scale: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
    pub cancelled: bool,
}

/// Shared log of rasters
#[derive(Clone, Debug, Default)]
pub struct RenderLog {
    records: Arc<Mutex<Vec<RenderRecord>>>,
}

impl RenderLog {
    fn push(&self, record: RenderRecord) {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(record);
    }

    #[must_use]
    pub fn records(&self) -> Vec<RenderRecord> {
        self.records
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Pages of completed (not cancelled) rasters, in order
    #[must_use]
    pub fn completed_pages(&self) -> Vec<usize> {
        self.records()
            .into_iter()
            .filter(|record| !record.cancelled)
            .map(|record| record.page)
            .collect()
    }
}

#[derive(Debug, Default)]
struct GateState {
    open: bool,
    blocked: usize,
}

/// Holds rasters until released
#[derive(Clone, Debug, Default)]
pub struct RasterGate {
    inner: Arc<(Mutex<GateState>, Condvar)>,
}

impl RasterGate {
    /// A closed gate
    #[must_use]
    pub fn closed() -> Self {
        Self::default()
    }

    /// Let every held and future raster through
    pub fn open(&self) {
        let (state, cvar) = &*self.inner;
        state.lock().unwrap_or_else(PoisonError::into_inner).open = true;
        cvar.notify_all();
    }

    /// Wait until a raster is held at the gate
    #[must_use]
    pub fn wait_until_blocked(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let (state, cvar) = &*self.inner;
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        while guard.blocked == 0 {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                return false;
            };
            guard = cvar
                .wait_timeout(guard, remaining)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn pass(&self) {
        let (state, cvar) = &*self.inner;
        let mut guard = state.lock().unwrap_or_else(PoisonError::into_inner);
        if guard.open {
            return;
        }
        guard.blocked += 1;
        cvar.notify_all();
        while !guard.open {
            guard = cvar.wait(guard).unwrap_or_else(PoisonError::into_inner);
        }
        guard.blocked -= 1;
    }
}

/// Configurable in-memory backend
#[derive(Clone, Debug)]
pub struct FakeBackend {
    default_pages: Vec<PageSize>,
    documents: HashMap<String, Vec<PageSize>>,
    load_failures: HashSet<String>,
    failing_pages: HashSet<usize>,
    failing_text: Arc<Mutex<HashSet<usize>>>,
    text: HashMap<usize, Vec<TextItem>>,
    gate: Option<RasterGate>,
    log: RenderLog,
    opens: Arc<AtomicUsize>,
}

impl FakeBackend {
    /// Every source opens as `count` Letter pages
    #[must_use]
    pub fn uniform(count: usize) -> Self {
        Self::with_pages(vec![LETTER; count])
    }

    /// Every source opens with these page sizes
    #[must_use]
    pub fn with_pages(pages: Vec<PageSize>) -> Self {
        Self {
            default_pages: pages,
            documents: HashMap::new(),
            load_failures: HashSet::new(),
            failing_pages: HashSet::new(),
            failing_text: Arc::default(),
            text: HashMap::new(),
            gate: None,
            log: RenderLog::default(),
            opens: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sources labelled `label` open with `pages` instead of the default
    #[must_use]
    pub fn document(mut self, label: &str, pages: Vec<PageSize>) -> Self {
        self.documents.insert(label.to_string(), pages);
        self
    }

    /// Sources labelled `label` fail to open
    #[must_use]
    pub fn fail_load(mut self, label: &str) -> Self {
        self.load_failures.insert(label.to_string());
        self
    }

    /// Rasters of `page` fail
    #[must_use]
    pub fn fail_page(mut self, page: usize) -> Self {
        self.failing_pages.insert(page);
        self
    }

    /// From now on, text content of `page` cannot be extracted. Shared by every
    /// clone, so it also applies to a backend already handed to an engine.
    pub fn fail_text(&self, page: usize) {
        self.failing_text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(page);
    }

    /// Replace the text content of `page`
    #[must_use]
    pub fn text(mut self, page: usize, items: Vec<TextItem>) -> Self {
        self.text.insert(page, items);
        self
    }

    /// Hold every raster at `gate`
    #[must_use]
    pub fn gate(mut self, gate: RasterGate) -> Self {
        self.gate = Some(gate);
        self
    }

    #[must_use]
    pub fn render_log(&self) -> RenderLog {
        self.log.clone()
    }

    /// Number of times a source was opened
    #[must_use]
    pub fn open_count(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

impl DocumentBackend for FakeBackend {
    fn open(&self, source: &SourceRef) -> Result<Box<dyn PaginatedDocument>, LoadError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        let label = source.label();
        if self.load_failures.contains(&label) {
            return Err(LoadError::unreadable(label, "not a paginated document"));
        }

        let pages = self
            .documents
            .get(&label)
            .cloned()
            .unwrap_or_else(|| self.default_pages.clone());

        Ok(Box::new(FakeDocument {
            pages,
            backend: self.clone(),
        }))
    }
}

struct FakeDocument {
    pages: Vec<PageSize>,
    backend: FakeBackend,
}

impl PaginatedDocument for FakeDocument {
    fn page_count(&self) -> usize {
        self.pages.len()
    }

    fn page(&self, page: usize) -> Result<Box<dyn PageHandle + '_>, RenderError> {
        if page == 0 || page > self.pages.len() {
            return Err(RenderError::PageOutOfRange {
                page,
                page_count: self.pages.len(),
            });
        }
        Ok(Box::new(FakePage {
            page,
            size: self.pages[page - 1],
            backend: &self.backend,
        }))
    }
}

struct FakePage<'a> {
    page: usize,
    size: PageSize,
    backend: &'a FakeBackend,
}

impl PageHandle for FakePage<'_> {
    fn size(&self) -> PageSize {
        self.size
    }

    fn render(
        &self,
        target: &mut PixelBuffer,
        scale: f64,
        cancel: &CancellationToken,
    ) -> Result<(), RenderError> {
        if let Some(gate) = &self.backend.gate {
            gate.pass();
        }

        let cancelled = cancel.is_cancelled();
        self.backend.log.push(RenderRecord {
            page: self.page,
            scale,
            pixel_width: target.width(),
            pixel_height: target.height(),
            cancelled,
        });

        if cancelled {
            return Err(RenderError::Cancelled);
        }
        if self.backend.failing_pages.contains(&self.page) {
            return Err(RenderError::failure(format!(
                "broken content stream on page {}",
                self.page
            )));
        }

        target.data_mut().fill(page_shade(self.page));
        Ok(())
    }

    fn text_content(&self) -> Result<TextContent, RenderError> {
        let text_fails = self
            .backend
            .failing_text
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&self.page);
        if text_fails {
            return Err(RenderError::failure(format!(
                "no text layer for page {}",
                self.page
            )));
        }
        let items = self.backend.text.get(&self.page).cloned().unwrap_or_else(|| {
            vec![TextItem {
                text: format!("Page {}", self.page),
                x: 72.0,
                y: 72.0,
                width: 120.0,
                height: 14.0,
                font_size: 12.0,
            }]
        });
        Ok(TextContent { items })
    }
}
