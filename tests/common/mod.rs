#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use typeset_preview::preview::{Command, EngineConfig, Notification, PreviewEngine, ScrollSnapshot};
use typeset_preview::test_utils::{FakeBackend, fake_source};

pub const TIMEOUT: Duration = Duration::from_secs(10);

pub fn engine(backend: &FakeBackend) -> PreviewEngine {
    PreviewEngine::new(Arc::new(backend.clone()), EngineConfig::default())
}

/// Load `label`, mount every page and wait for the first render pass
pub fn open(engine: &mut PreviewEngine, label: &str, width: f64) -> Vec<Notification> {
    let mut notifications = engine.apply_command(Command::ContainerResized(width));
    notifications.extend(engine.apply_command(Command::LoadSource(Some(fake_source(label)))));
    notifications.extend(engine.run_until_idle(TIMEOUT));
    engine.mount_all_pages();
    notifications.extend(engine.run_until_idle(TIMEOUT));
    assert!(!engine.is_busy(), "engine did not settle");
    notifications
}

/// Scroll position that puts `page` squarely in the middle of the viewport
pub fn scroll_to(engine: &PreviewEngine, page: usize) -> ScrollSnapshot {
    let rect = engine
        .page_layout()
        .into_iter()
        .find(|rect| rect.page == page)
        .expect("page is mounted");
    ScrollSnapshot {
        scroll_top: rect.top,
        viewport_height: rect.height,
    }
}

pub fn scroll_targets(notifications: &[Notification]) -> Vec<usize> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::ScrollIntoView { page, .. } => Some(*page),
            _ => None,
        })
        .collect()
}

pub fn page_changes(notifications: &[Notification]) -> Vec<usize> {
    notifications
        .iter()
        .filter_map(|n| match n {
            Notification::PageChanged(page) => Some(*page),
            _ => None,
        })
        .collect()
}
