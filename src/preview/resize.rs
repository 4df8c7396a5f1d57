//! Container width tracking
//!
//! The host reports the content-box width of the scroll container's parent. The
//! scroll container itself is not observed: its width moves whenever a wider page
//! brings in a scrollbar, which would feed back into the next render.

/// Republishes the observed container width only when it changes
#[derive(Debug, Default)]
pub struct ResizeCoordinator {
    width: Option<f64>,
}

impl ResizeCoordinator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one observation. Returns the new width if it differs from the last
    /// published one.
    pub fn observe(&mut self, width: f64) -> Option<f64> {
        if !width.is_finite() {
            log::debug!("Ignoring non-finite container width");
            return None;
        }
        let width = width.max(0.0);
        if self.width == Some(width) {
            return None;
        }
        self.width = Some(width);
        Some(width)
    }

    /// Record a batch of observations delivered together; only the last one counts
    pub fn observe_batch(&mut self, widths: &[f64]) -> Option<f64> {
        let last = widths.iter().rev().copied().find(|w| w.is_finite())?;
        self.observe(last)
    }

    /// Last published width
    #[must_use]
    pub fn width(&self) -> Option<f64> {
        self.width
    }
}
