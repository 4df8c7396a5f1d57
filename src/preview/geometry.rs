//! Page scale computation
//!
//! Turns a page's base viewport and the current layout inputs into the two sizes
//! every surface carries: the on-screen (CSS) size, which tracks the display scale,
//! and the backing pixel buffer, which is oversampled by the pixel ratio.

use serde::Serialize;

use super::types::PageSize;

/// Tolerance used when snapping nearly-integral pixel sizes before rounding up
const SNAP_EPSILON: f64 = 1e-6;

/// Layout inputs a render pass is computed from
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScaleInputs {
    /// Width of the scroll container's parent, in CSS pixels
    pub container_width: f64,
    /// User zoom (100 = fit width)
    pub zoom_percent: u16,
    /// Reported device pixel density
    pub device_pixel_ratio: f64,
    /// Horizontal padding subtracted from the container width
    pub horizontal_padding: f64,
    /// Lower bound applied to the device pixel density when rasterizing
    pub min_pixel_density: f64,
}

impl ScaleInputs {
    /// Width available to a page after padding
    #[must_use]
    pub fn available_width(&self) -> f64 {
        self.container_width - self.horizontal_padding
    }

    /// Density the raster is produced at. Never below `min_pixel_density`.
    #[must_use]
    pub fn pixel_ratio(&self) -> f64 {
        effective_pixel_ratio(self.device_pixel_ratio, self.min_pixel_density)
    }

    /// Whether these inputs leave any room to draw a page
    #[must_use]
    pub fn is_renderable(&self) -> bool {
        self.available_width().is_finite() && self.available_width() > 0.0 && self.zoom_percent > 0
    }
}

/// Raster density for a reported device pixel ratio. Unusable ratios count as 1.
#[must_use]
pub fn effective_pixel_ratio(device_pixel_ratio: f64, min_pixel_density: f64) -> f64 {
    let dpr = if device_pixel_ratio.is_finite() && device_pixel_ratio > 0.0 {
        device_pixel_ratio
    } else {
        1.0
    };
    dpr.max(min_pixel_density)
}

/// Resolved sizes for one page at one set of scale inputs
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageGeometry {
    /// Scale of the CSS-visible page relative to its base viewport
    pub display_scale: f64,
    /// Scale the raster is produced at
    pub output_scale: f64,
    /// Oversampling factor between buffer pixels and CSS pixels
    pub pixel_ratio: f64,
    pub css_width: f64,
    pub css_height: f64,
    pub pixel_width: u32,
    pub pixel_height: u32,
}

impl PageGeometry {
    /// Compute the geometry of a page from its scale-1 viewport
    #[must_use]
    pub fn compute(base: PageSize, inputs: &ScaleInputs) -> Option<Self> {
        if !inputs.is_renderable() || base.width <= 0.0 || base.height <= 0.0 {
            return None;
        }

        let display_scale =
            (f64::from(inputs.zoom_percent) / 100.0) * (inputs.available_width() / base.width);
        let pixel_ratio = inputs.pixel_ratio();
        let output_scale = display_scale * pixel_ratio;

        let css = base.scaled(display_scale);
        let output = base.scaled(output_scale);

        Some(Self {
            display_scale,
            output_scale,
            pixel_ratio,
            css_width: css.width,
            css_height: css.height,
            pixel_width: ceil_px(output.width),
            pixel_height: ceil_px(output.height),
        })
    }

    /// The CSS-visible size
    #[must_use]
    pub fn css_size(&self) -> PageSize {
        PageSize::new(self.css_width, self.css_height)
    }
}

fn ceil_px(value: f64) -> u32 {
    let rounded = value.round();
    let snapped = if (value - rounded).abs() < SNAP_EPSILON {
        rounded
    } else {
        value.ceil()
    };
    snapped.clamp(1.0, f64::from(u32::MAX)) as u32
}

#[cfg(test)]
mod tests {
    use super::*;

    const LETTER: PageSize = PageSize::new(612.0, 792.0);

    fn inputs(width: f64, zoom: u16, dpr: f64) -> ScaleInputs {
        ScaleInputs {
            container_width: width,
            zoom_percent: zoom,
            device_pixel_ratio: dpr,
            horizontal_padding: 48.0,
            min_pixel_density: 4.0,
        }
    }

    #[test]
    fn fit_width_at_full_zoom() {
        let geometry = PageGeometry::compute(LETTER, &inputs(800.0, 100, 1.0)).unwrap();
        assert!((geometry.css_width - 752.0).abs() < 1e-9);
        assert_eq!(geometry.pixel_width, 752 * 4);
        assert!((geometry.pixel_ratio - 4.0).abs() < f64::EPSILON);
    }

    #[test]
    fn zoom_increases_css_size_strictly() {
        let mut previous: Option<PageGeometry> = None;
        for zoom in (50..=200).step_by(25) {
            let geometry = PageGeometry::compute(LETTER, &inputs(800.0, zoom, 1.0)).unwrap();
            if let Some(prev) = previous {
                assert!(geometry.css_width > prev.css_width);
                assert!(geometry.css_height > prev.css_height);
            }
            previous = Some(geometry);
        }
    }

    #[test]
    fn buffer_is_oversampled_at_least_four_times() {
        for dpr in [0.5, 1.0, 1.5, 2.0, 3.0, 3.99] {
            for width in [333.0, 800.0, 1001.0] {
                let geometry = PageGeometry::compute(LETTER, &inputs(width, 125, dpr)).unwrap();
                assert!(f64::from(geometry.pixel_width) >= geometry.css_width * 4.0 - 1e-6);
                assert!(f64::from(geometry.pixel_height) >= geometry.css_height * 4.0 - 1e-6);
            }
        }
    }

    #[test]
    fn high_density_displays_use_their_own_ratio() {
        let geometry = PageGeometry::compute(LETTER, &inputs(800.0, 100, 5.0)).unwrap();
        assert!((geometry.pixel_ratio - 5.0).abs() < f64::EPSILON);
        assert_eq!(geometry.pixel_width, 752 * 5);
    }

    #[test]
    fn css_size_ignores_oversampling() {
        let low = PageGeometry::compute(LETTER, &inputs(800.0, 100, 1.0)).unwrap();
        let high = PageGeometry::compute(LETTER, &inputs(800.0, 100, 6.0)).unwrap();
        assert!((low.css_width - high.css_width).abs() < 1e-9);
        assert!(high.pixel_width > low.pixel_width);
    }

    #[test]
    fn no_geometry_without_room() {
        assert!(PageGeometry::compute(LETTER, &inputs(40.0, 100, 1.0)).is_none());
        assert!(PageGeometry::compute(LETTER, &inputs(48.0, 100, 1.0)).is_none());
        assert!(PageGeometry::compute(PageSize::new(0.0, 10.0), &inputs(800.0, 100, 1.0)).is_none());
    }

    #[test]
    fn invalid_device_ratio_falls_back_to_floor() {
        let geometry = PageGeometry::compute(LETTER, &inputs(800.0, 100, f64::NAN)).unwrap();
        assert!((geometry.pixel_ratio - 4.0).abs() < f64::EPSILON);
    }
}
