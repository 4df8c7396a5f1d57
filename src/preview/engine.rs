//! Preview engine - ties the loader, scheduler and viewport tracking together
//!
//! The host feeds [`Command`]s in (new source, resize, zoom, navigation, scroll
//! position, page mounts) and drains worker responses with
//! [`PreviewEngine::poll_responses`]. Both return the [`Notification`]s the host has
//! to act on. Everything runs on the caller's thread; only raster and text work
//! happens on the render worker.

use std::sync::Arc;
use std::time::{Duration, Instant};

use super::backend::DocumentBackend;
use super::loader::DocumentLoader;
use super::navigation::NavigationController;
use super::request::RenderResponse;
use super::resize::ResizeCoordinator;
use super::scheduler::{PageRenderScheduler, PassKey};
use super::state::{Effect, Event, PreviewState};
use super::surface::{RenderSurface, RenderSurfacePool};
use super::text_layer::TextLayer;
use super::types::{SourceRef, ToolbarState};
use super::viewport::{PageRect, ScrollSnapshot, StackLayout, ViewportTracker};
use super::zoom::Zoom;

/// Layout constants and initial inputs of the engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct EngineConfig {
    /// Horizontal padding subtracted from the container width
    pub horizontal_padding: f64,
    /// Lower bound of the raster pixel density
    pub min_pixel_density: f64,
    /// Fraction of the viewport excluded at top and bottom when picking the current page
    pub visibility_band: f64,
    /// Padding above the first page
    pub container_padding: f64,
    /// Gap between pages
    pub page_gap: f64,
    pub default_zoom: u16,
    pub device_pixel_ratio: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            horizontal_padding: 48.0,
            min_pixel_density: 4.0,
            visibility_band: 0.2,
            container_padding: 24.0,
            page_gap: 16.0,
            default_zoom: Zoom::FIT_PERCENT,
            device_pixel_ratio: 1.0,
        }
    }
}

/// Input from the host
#[derive(Clone, Debug)]
pub enum Command {
    /// New compiled document, or `None` when there is nothing to show
    LoadSource(Option<SourceRef>),
    /// Content-box width of the scroll container's parent
    ContainerResized(f64),
    /// Several width observations delivered at once
    ContainerResizeBatch(Vec<f64>),
    SetDevicePixelRatio(f64),
    ZoomIn,
    ZoomOut,
    ZoomFit,
    SetZoom(u16),
    GoToPage(usize),
    NextPage,
    PrevPage,
    /// The scroll container moved
    Scrolled(ScrollSnapshot),
    /// Scrolling came to rest without a position report
    ScrollSettled,
    /// A page element was added to the page stack
    MountPage(usize),
    /// A page element was removed from the page stack
    UnmountPage(usize),
    SetCollapsed(bool),
}

/// Output for the host
#[derive(Clone, Debug, PartialEq)]
pub enum Notification {
    /// A document loaded; the host should mount `1..=page_count`
    DocumentReady { page_count: usize },
    /// Show the "not yet compiled" placeholder
    DocumentUnavailable,
    /// Smoothly scroll the content to `top`
    ScrollIntoView { page: usize, top: f64 },
    /// The current page changed
    PageChanged(usize),
    /// A page surface received a new raster
    PageRendered(usize),
    /// A page's text layer was replaced or cleared
    TextLayerReady(usize),
}

/// Multi-page document preview
pub struct PreviewEngine {
    config: EngineConfig,
    state: PreviewState,
    loader: DocumentLoader,
    pool: RenderSurfacePool,
    resize: ResizeCoordinator,
    scheduler: PageRenderScheduler,
    tracker: ViewportTracker,
    navigation: NavigationController,
    layout: StackLayout,
    last_scroll: Option<ScrollSnapshot>,
}

impl PreviewEngine {
    #[must_use]
    pub fn new(backend: Arc<dyn DocumentBackend>, config: EngineConfig) -> Self {
        Self {
            state: PreviewState::new(
                Zoom::new(config.default_zoom),
                config.device_pixel_ratio,
                config.min_pixel_density,
            ),
            loader: DocumentLoader::new(backend),
            pool: RenderSurfacePool::new(),
            resize: ResizeCoordinator::new(),
            scheduler: PageRenderScheduler::new(),
            tracker: ViewportTracker::new(config.visibility_band),
            navigation: NavigationController::new(),
            layout: StackLayout {
                container_padding: config.container_padding,
                page_gap: config.page_gap,
            },
            last_scroll: None,
            config,
        }
    }

    /// Apply a host command
    pub fn apply_command(&mut self, cmd: Command) -> Vec<Notification> {
        match cmd {
            Command::LoadSource(source) => self.dispatch(Event::LoadSource(source)),

            Command::ContainerResized(width) => match self.resize.observe(width) {
                Some(width) => self.dispatch(Event::WidthChanged(width)),
                None => vec![],
            },

            Command::ContainerResizeBatch(widths) => match self.resize.observe_batch(&widths) {
                Some(width) => self.dispatch(Event::WidthChanged(width)),
                None => vec![],
            },

            Command::SetDevicePixelRatio(ratio) => {
                if ratio.is_finite() && ratio > 0.0 {
                    self.dispatch(Event::DevicePixelRatioChanged(ratio))
                } else {
                    log::debug!("Ignoring device pixel ratio {ratio}");
                    vec![]
                }
            }

            Command::ZoomIn => self.dispatch(Event::ZoomIn),
            Command::ZoomOut => self.dispatch(Event::ZoomOut),
            Command::ZoomFit => self.dispatch(Event::ZoomFit),
            Command::SetZoom(percent) => self.dispatch(Event::SetZoom(percent)),

            Command::GoToPage(page) => self.navigate(page),
            Command::NextPage => self.navigate(self.navigation.next(self.state.current_page)),
            Command::PrevPage => self.navigate(self.navigation.prev(self.state.current_page)),

            Command::Scrolled(snapshot) => {
                self.last_scroll = Some(snapshot);
                self.observe_viewport()
            }

            Command::ScrollSettled => self.dispatch(Event::ScrollSettled),

            Command::MountPage(page) => {
                self.mount_page(page);
                vec![]
            }

            Command::UnmountPage(page) => {
                if self.pool.unmount(page).is_some() {
                    self.scheduler.page_unmounted(page);
                }
                vec![]
            }

            Command::SetCollapsed(collapsed) => self.dispatch(Event::SetCollapsed(collapsed)),
        }
    }

    /// Handle every response that is ready without blocking
    pub fn poll_responses(&mut self) -> Vec<Notification> {
        let mut notifications = vec![];
        while let Some(response) = self.loader.try_recv() {
            notifications.extend(self.handle_response(response));
        }
        notifications
    }

    /// Wait up to `timeout` for one response, then drain whatever else is ready
    pub fn wait_for_response(&mut self, timeout: Duration) -> Vec<Notification> {
        let Some(response) = self.loader.recv_timeout(timeout) else {
            return vec![];
        };
        let mut notifications = self.handle_response(response);
        notifications.extend(self.poll_responses());
        notifications
    }

    /// Keep handling responses until loading and rendering are done, or `timeout`
    /// passes
    pub fn run_until_idle(&mut self, timeout: Duration) -> Vec<Notification> {
        let deadline = Instant::now() + timeout;
        let mut notifications = self.poll_responses();

        while self.is_busy() {
            let Some(remaining) = deadline.checked_duration_since(Instant::now()) else {
                log::warn!("Preview still busy after {timeout:?}");
                break;
            };

            match self.loader.recv_timeout(remaining) {
                Some(response) => notifications.extend(self.handle_response(response)),
                None if self.loader.generation().is_none() || self.loader.is_disconnected() => {
                    log::warn!("Render worker exited while work was pending");
                    self.scheduler.stop(&mut self.pool);
                    break;
                }
                None => {}
            }
        }

        notifications
    }

    /// Whether a document is loading or a render pass is running
    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.loader.is_loading() || self.scheduler.is_rendering()
    }

    #[must_use]
    pub fn toolbar(&self) -> ToolbarState {
        self.state.toolbar(self.is_busy(), &self.navigation)
    }

    #[must_use]
    pub fn state(&self) -> &PreviewState {
        &self.state
    }

    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    #[must_use]
    pub fn current_page(&self) -> usize {
        self.state.current_page
    }

    #[must_use]
    pub fn pool(&self) -> &RenderSurfacePool {
        &self.pool
    }

    #[must_use]
    pub fn surface(&self, page: usize) -> Option<&RenderSurface> {
        self.pool.surface(page)
    }

    #[must_use]
    pub fn text_layer(&self, page: usize) -> Option<&TextLayer> {
        self.pool.text_layer(page)
    }

    /// Vertical layout of the mounted pages
    #[must_use]
    pub fn page_layout(&self) -> Vec<PageRect> {
        self.layout.arrange(&self.pool)
    }

    /// Mount every page of the loaded document that is not mounted yet
    pub fn mount_all_pages(&mut self) {
        for page in 1..=self.state.page_count {
            self.mount_page(page);
        }
    }

    fn mount_page(&mut self, page: usize) {
        if page == 0 || page > self.state.page_count {
            log::debug!(
                "Not mounting page {page}: document has {} pages",
                self.state.page_count
            );
            return;
        }
        if self.pool.mount(page) {
            self.scheduler.page_mounted(page, &mut self.pool, &self.loader);
        }
    }

    fn navigate(&mut self, page: usize) -> Vec<Notification> {
        let layout = self.layout.arrange(&self.pool);
        match self.navigation.go_to(page, &layout) {
            Ok(target) => self.dispatch(Event::Navigated(target)),
            Err(e) => {
                log::debug!("Navigation ignored: {e}");
                vec![]
            }
        }
    }

    fn observe_viewport(&mut self) -> Vec<Notification> {
        let Some(snapshot) = self.last_scroll else {
            return vec![];
        };
        let rects = self.layout.arrange(&self.pool);
        match self.tracker.observe(&snapshot, &rects, self.state.current_page) {
            Some(observation) => self.dispatch(Event::PageObserved(observation.page)),
            None => vec![],
        }
    }

    fn handle_response(&mut self, response: RenderResponse) -> Vec<Notification> {
        match response {
            RenderResponse::Loaded { page_count } => {
                log::info!("Document loaded: {page_count} page(s)");
                self.loader.mark_loaded(page_count);
                self.dispatch(Event::DocumentLoaded { page_count })
            }

            RenderResponse::LoadFailed(error) => {
                log::error!("Failed to load document: {error}");
                self.loader.mark_failed();
                self.dispatch(Event::LoadFailed(error.to_string()))
            }

            response => {
                let outcome = self
                    .scheduler
                    .handle_response(response, &mut self.pool, &self.loader);

                let mut notifications = vec![];
                if let Some(page) = outcome.committed {
                    notifications.push(Notification::PageRendered(page));
                    // page heights moved
                    notifications.extend(self.observe_viewport());
                }
                if let Some(page) = outcome.text_layer {
                    notifications.push(Notification::TextLayerReady(page));
                }
                notifications
            }
        }
    }

    fn dispatch(&mut self, event: Event) -> Vec<Notification> {
        let effects = self.state.apply(event);
        let mut notifications = vec![];

        for effect in effects {
            match effect {
                Effect::LoadDocument(source) => {
                    self.loader.load(source);
                }

                Effect::UnloadDocument => {
                    self.loader.unload();
                }

                Effect::RenderAllPages => {
                    self.start_render_pass();
                }

                Effect::StopRendering => {
                    self.scheduler.stop(&mut self.pool);
                }

                Effect::ScrollIntoView { page, top } => {
                    // the host is about to move the viewport
                    self.last_scroll = None;
                    notifications.push(Notification::ScrollIntoView { page, top });
                }

                Effect::PageChanged(page) => {
                    notifications.push(Notification::PageChanged(page));
                }

                Effect::DocumentReady { page_count } => {
                    self.navigation.set_page_count(page_count);
                    self.truncate_pool(page_count);
                    notifications.push(Notification::DocumentReady { page_count });
                }

                Effect::DocumentUnavailable => {
                    self.navigation.set_page_count(0);
                    self.truncate_pool(0);
                    self.last_scroll = None;
                    notifications.push(Notification::DocumentUnavailable);
                }
            }
        }

        notifications
    }

    fn start_render_pass(&mut self) {
        let Some(generation) = self.loader.generation() else {
            return;
        };
        let Some(inputs) = self.state.scale_inputs(self.config.horizontal_padding) else {
            log::debug!("Container width unknown, deferring render pass");
            return;
        };

        self.scheduler.start_pass(
            PassKey { generation, inputs },
            self.state.page_count,
            &mut self.pool,
            &self.loader,
        );
    }

    fn truncate_pool(&mut self, page_count: usize) {
        for page in self.pool.truncate(page_count) {
            self.scheduler.page_unmounted(page);
        }
    }
}
