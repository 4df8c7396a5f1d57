//! Discrete page navigation: jump, next and previous

use super::error::LayoutUnavailable;
use super::viewport::PageRect;

/// Where a navigation request scrolls to
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct NavigationTarget {
    pub page: usize,
    /// Content offset of the page's top edge
    pub top: f64,
}

/// Turns page requests into scroll targets within `[1, page_count]`
#[derive(Clone, Copy, Debug, Default)]
pub struct NavigationController {
    page_count: usize,
}

impl NavigationController {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_page_count(&mut self, page_count: usize) {
        self.page_count = page_count;
    }

    /// Clamp a requested page into range. `None` while no document is loaded.
    #[must_use]
    pub fn clamp(&self, page: usize) -> Option<usize> {
        (self.page_count > 0).then(|| page.clamp(1, self.page_count))
    }

    /// Resolve a jump to `page` against the mounted page layout.
    ///
    /// Fails when the clamped page has no mounted element; callers treat that as a
    /// no-op, there is no retry.
    pub fn go_to(&self, page: usize, layout: &[PageRect]) -> Result<NavigationTarget, LayoutUnavailable> {
        let page = self.clamp(page).ok_or(LayoutUnavailable { page })?;
        layout
            .iter()
            .find(|rect| rect.page == page)
            .map(|rect| NavigationTarget { page, top: rect.top })
            .ok_or(LayoutUnavailable { page })
    }

    /// Requested page for "next"; [`Self::go_to`] clamps it
    #[must_use]
    pub fn next(&self, current: usize) -> usize {
        current.saturating_add(1)
    }

    /// Requested page for "previous"; [`Self::go_to`] clamps it
    #[must_use]
    pub fn prev(&self, current: usize) -> usize {
        current.saturating_sub(1)
    }

    #[must_use]
    pub fn can_go_prev(&self, current: usize) -> bool {
        self.page_count > 0 && current > 1
    }

    #[must_use]
    pub fn can_go_next(&self, current: usize) -> bool {
        current < self.page_count
    }
}
