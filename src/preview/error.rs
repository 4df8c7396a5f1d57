//! Error taxonomy for the preview engine

/// The document source could not be opened as a paginated document.
///
/// Fatal for that load only; loading a new source recovers.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LoadError {
    #[error("failed to open document {source_label}: {reason}")]
    Unreadable { source_label: String, reason: String },

    #[error("document {source_label} has no pages")]
    Empty { source_label: String },

    #[error("render worker unavailable: {reason}")]
    WorkerUnavailable { reason: String },
}

impl LoadError {
    pub fn unreadable(source_label: impl Into<String>, reason: impl ToString) -> Self {
        Self::Unreadable {
            source_label: source_label.into(),
            reason: reason.to_string(),
        }
    }
}

/// Errors from raster and text-layer operations
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// Expected when a newer pass supersedes a render; never reported to the user
    #[error("render cancelled")]
    Cancelled,

    #[error("page {page} is out of range (document has {page_count} pages)")]
    PageOutOfRange { page: usize, page_count: usize },

    #[error("{detail}")]
    Failure { detail: String },
}

impl RenderError {
    pub fn failure(msg: impl Into<String>) -> Self {
        Self::Failure { detail: msg.into() }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// Navigation target has no mounted page element
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("page {page} is not mounted")]
pub struct LayoutUnavailable {
    pub page: usize,
}
