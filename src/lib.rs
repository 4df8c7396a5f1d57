// Export modules for use in tests
pub mod export;
pub mod panic_handler;
pub mod preview;
pub mod settings;

#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;

// Re-export the engine entry points
pub use preview::{Command, EngineConfig, Notification, PreviewEngine, SourceRef, ToolbarState};
pub use settings::Settings;
