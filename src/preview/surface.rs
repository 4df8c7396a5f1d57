//! Render surface pool - one drawing surface and one text layer per mounted page
//!
//! Entries are keyed by page number, not by position, since page elements can mount
//! in any order. An entry lives from mount to unmount; re-renders only replace its
//! contents.

use std::collections::BTreeMap;

use super::cancel::RenderTask;
use super::geometry::PageGeometry;
use super::request::RequestId;
use super::text_layer::TextLayer;
use super::types::{PageSize, PixelBuffer};

/// Drawing surface of a single page
#[derive(Debug, Default)]
pub struct RenderSurface {
    /// Backing buffer width in device pixels
    pub pixel_width: u32,
    /// Backing buffer height in device pixels
    pub pixel_height: u32,
    /// On-screen width in CSS pixels
    pub css_width: f64,
    /// On-screen height in CSS pixels
    pub css_height: f64,
    /// Interpolation when the buffer is scaled for display. Always off once painted.
    pub image_smoothing: bool,
    /// Geometry of the committed raster
    pub geometry: Option<PageGeometry>,
    pixels: Option<PixelBuffer>,
}

impl RenderSurface {
    fn new() -> Self {
        Self {
            image_smoothing: true,
            ..Self::default()
        }
    }

    /// Replace size and contents in one step
    fn commit(&mut self, geometry: PageGeometry, pixels: PixelBuffer) {
        self.pixel_width = pixels.width();
        self.pixel_height = pixels.height();
        self.css_width = geometry.css_width;
        self.css_height = geometry.css_height;
        self.image_smoothing = false;
        self.geometry = Some(geometry);
        self.pixels = Some(pixels);
    }

    #[must_use]
    pub fn pixels(&self) -> Option<&PixelBuffer> {
        self.pixels.as_ref()
    }

    #[must_use]
    pub fn is_painted(&self) -> bool {
        self.pixels.is_some()
    }

    #[must_use]
    pub fn css_size(&self) -> PageSize {
        PageSize::new(self.css_width, self.css_height)
    }
}

/// Surface of one mounted page plus the render currently targeting it
#[derive(Debug)]
pub struct RenderSurfaceEntry {
    pub page: usize,
    pub surface: RenderSurface,
    in_flight: Option<RenderTask>,
    renders_committed: u64,
}

impl RenderSurfaceEntry {
    fn new(page: usize) -> Self {
        Self {
            page,
            surface: RenderSurface::new(),
            in_flight: None,
            renders_committed: 0,
        }
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<&RenderTask> {
        self.in_flight.as_ref()
    }

    /// Number of rasters committed to this surface since it mounted
    #[must_use]
    pub fn renders_committed(&self) -> u64 {
        self.renders_committed
    }

    /// Cancel the in-flight render, if any, and forget it
    pub fn cancel_in_flight(&mut self) -> Option<RequestId> {
        let task = self.in_flight.take()?;
        task.cancel();
        Some(task.id)
    }

    /// Record a newly issued render. The previous one must already be cancelled.
    pub fn start_render(&mut self, task: RenderTask) {
        debug_assert!(self.in_flight.is_none(), "two live renders for page {}", self.page);
        self.in_flight = Some(task);
    }

    /// Commit a finished raster if it belongs to the render in flight.
    ///
    /// Returns false for output of a cancelled or superseded request, which is
    /// dropped without touching the surface.
    pub fn complete_render(&mut self, id: RequestId, geometry: PageGeometry, pixels: PixelBuffer) -> bool {
        match &self.in_flight {
            Some(task) if task.id == id && !task.token.is_cancelled() => {
                self.in_flight = None;
                self.surface.commit(geometry, pixels);
                self.renders_committed += 1;
                true
            }
            _ => false,
        }
    }

    /// Clear the in-flight marker after a cancellation or failure of `id`
    pub fn settle(&mut self, id: RequestId) -> bool {
        if self.in_flight.as_ref().is_some_and(|task| task.id == id) {
            self.in_flight = None;
            true
        } else {
            false
        }
    }
}

/// Text container of one mounted page
#[derive(Debug)]
pub struct TextLayerEntry {
    pub page: usize,
    pub layer: Option<TextLayer>,
}

impl TextLayerEntry {
    /// Replace the layer contents wholesale
    pub fn replace(&mut self, layer: TextLayer) {
        self.layer = Some(layer);
    }

    /// Drop the layer contents
    pub fn clear(&mut self) {
        self.layer = None;
    }
}

/// Registry of per-page surfaces and text containers
#[derive(Debug, Default)]
pub struct RenderSurfacePool {
    surfaces: BTreeMap<usize, RenderSurfaceEntry>,
    text_layers: BTreeMap<usize, TextLayerEntry>,
}

impl RenderSurfacePool {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create the entries for a page element that just mounted.
    ///
    /// Returns false if the page was already mounted; its entries are kept.
    pub fn mount(&mut self, page: usize) -> bool {
        if page == 0 || self.surfaces.contains_key(&page) {
            return false;
        }
        self.surfaces.insert(page, RenderSurfaceEntry::new(page));
        self.text_layers
            .insert(page, TextLayerEntry { page, layer: None });
        true
    }

    /// Destroy a page's entries, cancelling its in-flight render
    pub fn unmount(&mut self, page: usize) -> Option<RenderSurfaceEntry> {
        self.text_layers.remove(&page);
        let mut entry = self.surfaces.remove(&page)?;
        entry.cancel_in_flight();
        Some(entry)
    }

    /// Unmount every page above `page_count`
    pub fn truncate(&mut self, page_count: usize) -> Vec<usize> {
        let extra: Vec<usize> = self
            .surfaces
            .range(page_count + 1..)
            .map(|(&page, _)| page)
            .collect();
        for page in &extra {
            self.unmount(*page);
        }
        extra
    }

    /// Cancel every in-flight render
    pub fn cancel_all(&mut self) -> usize {
        self.surfaces
            .values_mut()
            .filter_map(RenderSurfaceEntry::cancel_in_flight)
            .count()
    }

    #[must_use]
    pub fn is_mounted(&self, page: usize) -> bool {
        self.surfaces.contains_key(&page)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    /// Mounted page numbers in ascending order
    pub fn pages(&self) -> impl Iterator<Item = usize> + '_ {
        self.surfaces.keys().copied()
    }

    #[must_use]
    pub fn entry(&self, page: usize) -> Option<&RenderSurfaceEntry> {
        self.surfaces.get(&page)
    }

    pub fn entry_mut(&mut self, page: usize) -> Option<&mut RenderSurfaceEntry> {
        self.surfaces.get_mut(&page)
    }

    /// Entries in ascending page order
    pub fn entries(&self) -> impl Iterator<Item = &RenderSurfaceEntry> + '_ {
        self.surfaces.values()
    }

    #[must_use]
    pub fn surface(&self, page: usize) -> Option<&RenderSurface> {
        self.surfaces.get(&page).map(|entry| &entry.surface)
    }

    #[must_use]
    pub fn text_layer(&self, page: usize) -> Option<&TextLayer> {
        self.text_layers.get(&page)?.layer.as_ref()
    }

    pub fn text_entry_mut(&mut self, page: usize) -> Option<&mut TextLayerEntry> {
        self.text_layers.get_mut(&page)
    }

    /// Page whose in-flight render is `id`
    #[must_use]
    pub fn page_for_request(&self, id: RequestId) -> Option<usize> {
        self.surfaces
            .values()
            .find(|entry| entry.in_flight.as_ref().is_some_and(|task| task.id == id))
            .map(|entry| entry.page)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::geometry::ScaleInputs;

    fn geometry(width: f64) -> PageGeometry {
        let inputs = ScaleInputs {
            container_width: width,
            zoom_percent: 100,
            device_pixel_ratio: 1.0,
            horizontal_padding: 48.0,
            min_pixel_density: 4.0,
        };
        PageGeometry::compute(PageSize::new(100.0, 150.0), &inputs).unwrap()
    }

    fn pixels_for(geometry: &PageGeometry) -> PixelBuffer {
        PixelBuffer::try_new(geometry.pixel_width, geometry.pixel_height).unwrap()
    }

    #[test]
    fn mount_is_keyed_by_page_and_idempotent() {
        let mut pool = RenderSurfacePool::new();
        assert!(pool.mount(3));
        assert!(pool.mount(1));
        assert!(!pool.mount(3));
        assert!(!pool.mount(0));
        assert_eq!(pool.pages().collect::<Vec<_>>(), vec![1, 3]);
        assert_eq!(pool.len(), 2);
    }

    #[test]
    fn unmount_cancels_in_flight_render() {
        let mut pool = RenderSurfacePool::new();
        pool.mount(1);
        let task = RenderTask::new(RequestId::new(1));
        let token = task.token.clone();
        pool.entry_mut(1).unwrap().start_render(task);

        pool.unmount(1);
        assert!(token.is_cancelled());
        assert!(pool.text_layer(1).is_none());
        assert!(!pool.is_mounted(1));
    }

    #[test]
    fn stale_raster_is_not_committed() {
        let mut pool = RenderSurfacePool::new();
        pool.mount(1);
        let entry = pool.entry_mut(1).unwrap();

        entry.start_render(RenderTask::new(RequestId::new(1)));
        entry.cancel_in_flight();
        entry.start_render(RenderTask::new(RequestId::new(2)));

        let old = geometry(500.0);
        let new = geometry(900.0);
        assert!(!entry.complete_render(RequestId::new(1), old, pixels_for(&old)));
        assert!(!entry.surface.is_painted());

        assert!(entry.complete_render(RequestId::new(2), new, pixels_for(&new)));
        assert!((entry.surface.css_width - new.css_width).abs() < 1e-9);
        assert_eq!(entry.surface.pixel_width, new.pixel_width);
        assert!(!entry.surface.image_smoothing);
        assert!(entry.in_flight().is_none());
    }

    #[test]
    fn truncate_drops_pages_past_count() {
        let mut pool = RenderSurfacePool::new();
        for page in 1..=5 {
            pool.mount(page);
        }
        assert_eq!(pool.truncate(3), vec![4, 5]);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn request_lookup_finds_page() {
        let mut pool = RenderSurfacePool::new();
        pool.mount(2);
        pool.entry_mut(2)
            .unwrap()
            .start_render(RenderTask::new(RequestId::new(9)));
        assert_eq!(pool.page_for_request(RequestId::new(9)), Some(2));
        assert_eq!(pool.cancel_all(), 1);
        assert_eq!(pool.page_for_request(RequestId::new(9)), None);
    }
}
