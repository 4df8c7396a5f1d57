//! Invisible, selectable text layer laid over each page raster
//!
//! The layer is positioned in CSS pixels at the page's display scale, so it lines up
//! with what the user sees rather than with the oversampled pixel buffer.

use serde::Serialize;

use super::geometry::PageGeometry;
use super::types::{TextContent, TextItem};

/// One positioned, transparent text span
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextSpan {
    pub text: String,
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
}

impl TextSpan {
    fn from_item(item: &TextItem, scale: f64) -> Self {
        Self {
            text: item.text.clone(),
            left: item.x * scale,
            top: item.y * scale,
            width: item.width * scale,
            height: item.height * scale,
            font_size: item.font_size * scale,
        }
    }
}

/// Laid-out text layer of one page
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct TextLayer {
    pub width: f64,
    pub height: f64,
    pub scale: f64,
    pub spans: Vec<TextSpan>,
}

impl TextLayer {
    /// Lay out `content` at the geometry's display scale
    #[must_use]
    pub fn layout(content: &TextContent, geometry: &PageGeometry) -> Self {
        let scale = geometry.display_scale;
        let spans = content
            .items
            .iter()
            .filter(|item| !item.text.trim().is_empty())
            .map(|item| TextSpan::from_item(item, scale))
            .collect();

        Self {
            width: geometry.css_width,
            height: geometry.css_height,
            scale,
            spans,
        }
    }

    /// Text of every span, one span per line
    #[must_use]
    pub fn plain_text(&self) -> String {
        self.spans
            .iter()
            .map(|span| span.text.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }
}
