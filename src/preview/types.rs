//! Core types for document preview rendering

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

/// Reference to a compiled document handed over by the compiler service
#[derive(Clone, PartialEq, Eq)]
pub enum SourceRef {
    /// A document on disk
    Path(PathBuf),
    /// An in-memory document blob, identified by its label
    Blob { label: String, bytes: Arc<[u8]> },
}

impl SourceRef {
    /// Create a blob reference from compiled bytes
    #[must_use]
    pub fn blob(label: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self::Blob {
            label: label.into(),
            bytes: bytes.into(),
        }
    }

    /// Short human-readable name used in logs
    #[must_use]
    pub fn label(&self) -> String {
        match self {
            Self::Path(path) => path.display().to_string(),
            Self::Blob { label, .. } => label.clone(),
        }
    }
}

impl fmt::Debug for SourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Path(path) => f.debug_tuple("Path").field(path).finish(),
            Self::Blob { label, bytes } => f
                .debug_struct("Blob")
                .field("label", label)
                .field("len", &bytes.len())
                .finish(),
        }
    }
}

/// Page dimensions in document units (CSS pixels at scale 1)
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct PageSize {
    pub width: f64,
    pub height: f64,
}

impl PageSize {
    #[must_use]
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// The page viewport at the given scale
    #[must_use]
    pub fn scaled(self, scale: f64) -> Self {
        Self {
            width: self.width * scale,
            height: self.height * scale,
        }
    }
}

/// Raw RGB raster for one page.
///
/// Rows are tightly packed, 3 bytes per pixel. A fresh buffer is white, which is
/// what an unpainted page looks like.
#[derive(Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    width: u32,
    height: u32,
    data: Vec<u8>,
}

impl PixelBuffer {
    pub const CHANNELS: usize = 3;

    /// Allocate a white buffer of the given dimensions. `None` if the allocation
    /// cannot be satisfied.
    #[must_use]
    pub fn try_new(width: u32, height: u32) -> Option<Self> {
        let len = (width as usize)
            .checked_mul(height as usize)?
            .checked_mul(Self::CHANNELS)?;
        let mut data = Vec::new();
        data.try_reserve_exact(len).ok()?;
        data.resize(len, 0xFF);
        Some(Self { width, height, data })
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.height
    }

    #[must_use]
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }

    /// Copy rows of `src` (any channel count >= 3, arbitrary stride) into this
    /// buffer. Pixels outside the overlap keep their current value.
    pub fn blit_rows(&mut self, src: &[u8], src_width: u32, src_height: u32, channels: usize, stride: usize) {
        let copy_w = self.width.min(src_width) as usize;
        let copy_h = self.height.min(src_height) as usize;
        let dst_stride = self.width as usize * Self::CHANNELS;

        for y in 0..copy_h {
            let src_row = y * stride;
            let dst_row = y * dst_stride;
            for x in 0..copy_w {
                let s = src_row + x * channels;
                let d = dst_row + x * Self::CHANNELS;
                if s + Self::CHANNELS > src.len() {
                    return;
                }
                self.data[d..d + Self::CHANNELS].copy_from_slice(&src[s..s + Self::CHANNELS]);
            }
        }
    }
}

impl fmt::Debug for PixelBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PixelBuffer")
            .field("width", &self.width)
            .field("height", &self.height)
            .finish_non_exhaustive()
    }
}

/// One run of text on a page, in unscaled page units with a top-left origin
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TextItem {
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub font_size: f64,
}

/// Text content of a page as reported by the backend
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextContent {
    pub items: Vec<TextItem>,
}

/// Where the current page value came from
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PageChangeSource {
    /// Scroll observation
    #[default]
    User,
    /// Explicit navigation, its scroll has not been confirmed yet
    Programmatic,
}

/// Lifecycle of the document currently shown in the preview
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum DocumentStatus {
    /// Nothing to render yet
    #[default]
    Idle,
    Loading,
    Ready,
    /// The last source could not be opened
    Failed(String),
}

impl DocumentStatus {
    /// Whether the preview should show the "not yet compiled" placeholder
    #[must_use]
    pub fn shows_placeholder(&self) -> bool {
        matches!(self, Self::Idle | Self::Failed(_))
    }
}

/// State consumed by the preview toolbar
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolbarState {
    pub total_pages: usize,
    pub current_page: usize,
    pub is_rendering: bool,
    pub zoom_percent: u16,
    pub can_go_prev: bool,
    pub can_go_next: bool,
    pub can_zoom_in: bool,
    pub can_zoom_out: bool,
    pub status: DocumentStatus,
}
