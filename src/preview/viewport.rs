//! Viewport tracking - which page occupies the middle of the scroll area
//!
//! Only the central band of the viewport counts: the top and bottom margins (20% by
//! default) are excluded, so a page peeking in at an edge never becomes current.
//! Among the pages intersecting the band, the one with the largest intersection
//! ratio wins. Ties keep the current page.

use serde::Serialize;

use super::surface::RenderSurfacePool;

const RATIO_EPSILON: f64 = 1e-9;

/// Scroll position of the preview container, in CSS pixels
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollSnapshot {
    pub scroll_top: f64,
    pub viewport_height: f64,
}

/// Vertical extent of one mounted page inside the scroll content
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageRect {
    pub page: usize,
    pub top: f64,
    pub height: f64,
}

impl PageRect {
    #[must_use]
    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }

    /// Fraction of this page that lies between `band_top` and `band_bottom`
    #[must_use]
    pub fn intersection_ratio(&self, band_top: f64, band_bottom: f64) -> f64 {
        if self.height <= 0.0 {
            return 0.0;
        }
        let overlap = self.bottom().min(band_bottom) - self.top.max(band_top);
        (overlap / self.height).clamp(0.0, 1.0)
    }
}

/// Spacing of the page stack
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct StackLayout {
    /// Padding above the first page
    pub container_padding: f64,
    /// Gap between consecutive pages
    pub page_gap: f64,
}

impl StackLayout {
    /// Lay out the mounted pages top to bottom using their on-screen heights
    #[must_use]
    pub fn arrange(&self, pool: &RenderSurfacePool) -> Vec<PageRect> {
        let mut rects = Vec::with_capacity(pool.len());
        let mut top = self.container_padding;

        for entry in pool.entries() {
            if !rects.is_empty() {
                top += self.page_gap;
            }
            let height = entry.surface.css_height;
            rects.push(PageRect {
                page: entry.page,
                top,
                height,
            });
            top += height;
        }

        rects
    }
}

/// Result of one observation
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Observation {
    pub page: usize,
    pub ratio: f64,
}

/// Picks the most visible page within the central band
#[derive(Clone, Copy, Debug)]
pub struct ViewportTracker {
    band_margin: f64,
}

impl ViewportTracker {
    /// `band_margin` is the fraction of the viewport excluded at top and at bottom
    #[must_use]
    pub fn new(band_margin: f64) -> Self {
        Self {
            band_margin: band_margin.clamp(0.0, 0.49),
        }
    }

    /// Visible band in content coordinates
    #[must_use]
    pub fn band(&self, snapshot: &ScrollSnapshot) -> (f64, f64) {
        let margin = snapshot.viewport_height.max(0.0) * self.band_margin;
        (
            snapshot.scroll_top + margin,
            snapshot.scroll_top + snapshot.viewport_height.max(0.0) - margin,
        )
    }

    /// Find the winning page, or `None` when no page intersects the band
    #[must_use]
    pub fn observe(&self, snapshot: &ScrollSnapshot, rects: &[PageRect], current: usize) -> Option<Observation> {
        let (band_top, band_bottom) = self.band(snapshot);
        if band_bottom <= band_top {
            return None;
        }

        let mut best: Option<Observation> = None;
        for rect in rects {
            let ratio = rect.intersection_ratio(band_top, band_bottom);
            if ratio <= 0.0 {
                continue;
            }
            best = match best {
                None => Some(Observation { page: rect.page, ratio }),
                Some(b) if ratio > b.ratio + RATIO_EPSILON => Some(Observation { page: rect.page, ratio }),
                Some(b) if (ratio - b.ratio).abs() <= RATIO_EPSILON && rect.page == current => {
                    Some(Observation { page: rect.page, ratio })
                }
                keep => keep,
            };
        }

        best
    }
}
