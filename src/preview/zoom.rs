//! Zoom state for the preview
//!
//! Zoom is a percentage of fit-to-width. It only feeds the scale inputs of the
//! render pass; it never moves the current page.

use serde::{Deserialize, Serialize};

/// Zoom percentage, kept within [`Zoom::MIN_PERCENT`, `Zoom::MAX_PERCENT`]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Zoom {
    percent: u16,
}

impl Default for Zoom {
    fn default() -> Self {
        Self {
            percent: Self::FIT_PERCENT,
        }
    }
}

impl Zoom {
    /// Smallest zoom
    pub const MIN_PERCENT: u16 = 50;
    /// Largest zoom
    pub const MAX_PERCENT: u16 = 200;
    /// Zoom change per step
    pub const STEP_PERCENT: u16 = 25;
    /// Fit to width
    pub const FIT_PERCENT: u16 = 100;

    #[must_use]
    pub fn new(percent: u16) -> Self {
        Self {
            percent: Self::clamp_percent(percent),
        }
    }

    #[must_use]
    pub fn percent(self) -> u16 {
        self.percent
    }

    /// Zoom in by one step
    pub fn step_in(&mut self) {
        self.percent = Self::clamp_percent(self.percent.saturating_add(Self::STEP_PERCENT));
    }

    /// Zoom out by one step
    pub fn step_out(&mut self) {
        self.percent = Self::clamp_percent(self.percent.saturating_sub(Self::STEP_PERCENT));
    }

    /// Reset to fit width
    pub fn fit(&mut self) {
        self.percent = Self::FIT_PERCENT;
    }

    #[must_use]
    pub fn can_step_in(self) -> bool {
        self.percent < Self::MAX_PERCENT
    }

    #[must_use]
    pub fn can_step_out(self) -> bool {
        self.percent > Self::MIN_PERCENT
    }

    #[must_use]
    pub fn clamp_percent(percent: u16) -> u16 {
        percent.clamp(Self::MIN_PERCENT, Self::MAX_PERCENT)
    }
}
