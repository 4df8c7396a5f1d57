//! Preview state management
//!
//! Every input the preview reacts to (a new source, a load result, a resize, a zoom
//! step, a navigation, a scroll observation) arrives as an [`Event`]. The reducer
//! updates the state and returns the [`Effect`]s the engine has to carry out. The
//! current page is derived here and nowhere else.

use super::geometry::{ScaleInputs, effective_pixel_ratio};
use super::navigation::{NavigationController, NavigationTarget};
use super::types::{DocumentStatus, PageChangeSource, SourceRef, ToolbarState};
use super::zoom::Zoom;

/// Current state of the preview pane
#[derive(Clone, Debug)]
pub struct PreviewState {
    /// Source currently shown, if any
    pub source: Option<SourceRef>,

    pub status: DocumentStatus,

    /// Page count of the loaded document (0 while nothing is loaded)
    pub page_count: usize,

    /// Current page (1-based, 0 while nothing is loaded)
    pub current_page: usize,

    /// Provenance of `current_page`
    pub change_source: PageChangeSource,

    pub zoom: Zoom,

    /// Width of the scroll container's parent, once known
    pub container_width: Option<f64>,

    pub device_pixel_ratio: f64,

    /// Floor of the raster density
    pub min_pixel_density: f64,

    /// Whether the preview pane is collapsed
    pub collapsed: bool,
}

impl Default for PreviewState {
    fn default() -> Self {
        Self::new(Zoom::default(), 1.0, 4.0)
    }
}

impl PreviewState {
    #[must_use]
    pub fn new(zoom: Zoom, device_pixel_ratio: f64, min_pixel_density: f64) -> Self {
        Self {
            source: None,
            status: DocumentStatus::Idle,
            page_count: 0,
            current_page: 0,
            change_source: PageChangeSource::User,
            zoom,
            container_width: None,
            device_pixel_ratio,
            min_pixel_density,
            collapsed: false,
        }
    }

    /// Apply an event and return resulting effects
    #[must_use]
    pub fn apply(&mut self, event: Event) -> Vec<Effect> {
        match event {
            Event::LoadSource(None) => {
                if self.source.is_none() && self.status == DocumentStatus::Idle {
                    return vec![];
                }
                self.source = None;
                self.status = DocumentStatus::Idle;
                self.clear_document();
                vec![
                    Effect::StopRendering,
                    Effect::UnloadDocument,
                    Effect::DocumentUnavailable,
                ]
            }

            Event::LoadSource(Some(source)) => {
                self.source = Some(source.clone());
                self.status = DocumentStatus::Loading;
                vec![Effect::StopRendering, Effect::LoadDocument(source)]
            }

            Event::DocumentLoaded { page_count } => {
                self.status = DocumentStatus::Ready;
                self.page_count = page_count;
                self.change_source = PageChangeSource::User;

                let previous = self.current_page;
                self.current_page = self.current_page.clamp(1, page_count.max(1));

                let mut effects = vec![Effect::DocumentReady { page_count }];
                if self.current_page != previous {
                    effects.push(Effect::PageChanged(self.current_page));
                }
                effects.extend(self.render_all());
                effects
            }

            Event::LoadFailed(reason) => {
                self.status = DocumentStatus::Failed(reason);
                self.clear_document();
                vec![Effect::StopRendering, Effect::DocumentUnavailable]
            }

            Event::WidthChanged(width) => {
                if self.container_width == Some(width) {
                    vec![]
                } else {
                    self.container_width = Some(width);
                    self.render_all()
                }
            }

            Event::DevicePixelRatioChanged(ratio) => {
                let before = effective_pixel_ratio(self.device_pixel_ratio, self.min_pixel_density);
                self.device_pixel_ratio = ratio;
                let after = effective_pixel_ratio(ratio, self.min_pixel_density);
                // below the density floor the rasters come out identical
                if (after - before).abs() > f64::EPSILON {
                    self.render_all()
                } else {
                    vec![]
                }
            }

            Event::ZoomIn => self.change_zoom(|zoom| zoom.step_in()),
            Event::ZoomOut => self.change_zoom(|zoom| zoom.step_out()),
            Event::ZoomFit => self.change_zoom(|zoom| zoom.fit()),
            Event::SetZoom(percent) => self.change_zoom(|zoom| *zoom = Zoom::new(percent)),

            Event::Navigated(target) => {
                self.change_source = PageChangeSource::Programmatic;
                let mut effects = vec![Effect::ScrollIntoView {
                    page: target.page,
                    top: target.top,
                }];
                if self.current_page != target.page {
                    self.current_page = target.page;
                    effects.push(Effect::PageChanged(target.page));
                }
                effects
            }

            Event::PageObserved(page) => {
                // Any observation consumes the programmatic flag
                self.change_source = PageChangeSource::User;
                if page == self.current_page {
                    vec![]
                } else {
                    self.current_page = page;
                    vec![Effect::PageChanged(page)]
                }
            }

            Event::ScrollSettled => {
                // Navigation that needed no scrolling is never observed
                self.change_source = PageChangeSource::User;
                vec![]
            }

            Event::SetCollapsed(collapsed) => {
                if self.collapsed == collapsed {
                    return vec![];
                }
                self.collapsed = collapsed;
                if collapsed {
                    vec![Effect::StopRendering]
                } else {
                    self.render_all()
                }
            }
        }
    }

    /// Scale inputs for the next render pass, once the container width is known
    #[must_use]
    pub fn scale_inputs(&self, horizontal_padding: f64) -> Option<ScaleInputs> {
        Some(ScaleInputs {
            container_width: self.container_width?,
            zoom_percent: self.zoom.percent(),
            device_pixel_ratio: self.device_pixel_ratio,
            horizontal_padding,
            min_pixel_density: self.min_pixel_density,
        })
    }

    /// Whether render passes may run
    #[must_use]
    pub fn can_render(&self) -> bool {
        self.status == DocumentStatus::Ready && !self.collapsed
    }

    /// Toolbar view of this state
    #[must_use]
    pub fn toolbar(&self, is_rendering: bool, navigation: &NavigationController) -> ToolbarState {
        ToolbarState {
            total_pages: self.page_count,
            current_page: self.current_page,
            is_rendering,
            zoom_percent: self.zoom.percent(),
            can_go_prev: navigation.can_go_prev(self.current_page),
            can_go_next: navigation.can_go_next(self.current_page),
            can_zoom_in: self.zoom.can_step_in(),
            can_zoom_out: self.zoom.can_step_out(),
            status: self.status.clone(),
        }
    }

    fn change_zoom(&mut self, change: impl FnOnce(&mut Zoom)) -> Vec<Effect> {
        let before = self.zoom;
        change(&mut self.zoom);
        if self.zoom == before {
            vec![]
        } else {
            self.render_all()
        }
    }

    fn render_all(&self) -> Vec<Effect> {
        if self.can_render() {
            vec![Effect::RenderAllPages]
        } else {
            vec![]
        }
    }

    fn clear_document(&mut self) {
        self.page_count = 0;
        self.current_page = 0;
        self.change_source = PageChangeSource::User;
    }
}

/// Events that modify preview state
#[derive(Clone, Debug)]
pub enum Event {
    /// A new document source, or `None` for nothing to render
    LoadSource(Option<SourceRef>),

    /// The current source finished loading
    DocumentLoaded { page_count: usize },

    /// The current source could not be opened
    LoadFailed(String),

    /// Container width republished by the resize coordinator
    WidthChanged(f64),

    DevicePixelRatioChanged(f64),

    ZoomIn,
    ZoomOut,
    ZoomFit,
    SetZoom(u16),

    /// Explicit navigation resolved to a mounted page
    Navigated(NavigationTarget),

    /// Scroll observation picked a page
    PageObserved(usize),

    /// Scrolling stopped
    ScrollSettled,

    SetCollapsed(bool),
}

/// Side effects to perform after a state change
#[derive(Clone, Debug, PartialEq)]
pub enum Effect {
    /// Open a source, superseding the current document
    LoadDocument(SourceRef),

    /// Drop the current document
    UnloadDocument,

    /// Start a render pass over every page with the current inputs
    RenderAllPages,

    /// Cancel the active render pass
    StopRendering,

    /// Smoothly scroll a page's element into view
    ScrollIntoView { page: usize, top: f64 },

    /// The current page changed
    PageChanged(usize),

    /// A document finished loading
    DocumentReady { page_count: usize },

    /// Nothing can be shown; display the placeholder
    DocumentUnavailable,
}
