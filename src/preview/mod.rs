//! Multi-page document preview engine

mod backend;
mod cancel;
mod engine;
mod error;
mod geometry;
mod loader;
#[cfg(feature = "pdf")]
mod mupdf_backend;
mod navigation;
mod request;
mod resize;
mod scheduler;
mod state;
mod surface;
mod text_layer;
mod types;
mod viewport;
mod worker;
mod zoom;

pub use backend::{DocumentBackend, PageHandle, PaginatedDocument};
pub use cancel::{CancellationToken, RenderTask};
pub use engine::{Command, EngineConfig, Notification, PreviewEngine};
pub use error::{LayoutUnavailable, LoadError, RenderError};
pub use geometry::{PageGeometry, ScaleInputs};
pub use loader::{DocumentGeneration, DocumentLoader};
#[cfg(feature = "pdf")]
pub use mupdf_backend::MupdfBackend;
pub use navigation::{NavigationController, NavigationTarget};
pub use request::{RenderRequest, RenderResponse, RequestId, RequestSink};
pub use resize::ResizeCoordinator;
pub use scheduler::{PageRenderScheduler, PassKey, ResponseOutcome};
pub use state::{Effect, Event, PreviewState};
pub use surface::{RenderSurface, RenderSurfaceEntry, RenderSurfacePool, TextLayerEntry};
pub use text_layer::{TextLayer, TextSpan};
pub use types::*;
pub use viewport::{Observation, PageRect, ScrollSnapshot, StackLayout, ViewportTracker};
pub use worker::{render_page, render_worker};
pub use zoom::Zoom;
