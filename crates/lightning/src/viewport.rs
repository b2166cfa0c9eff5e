use crate::gpu::GpuApi;
use crate::types::ViewportSize;

/// Keeps the drawable backing store and GPU viewport matched to the host
/// element's client size.
#[derive(Debug, Default)]
pub struct ViewportManager {
    current: Option<ViewportSize>,
}

impl ViewportManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Size reported by the last [`sync`](Self::sync).
    pub fn current(&self) -> Option<ViewportSize> {
        self.current
    }

    /// Reallocates the backing store only when its size differs from `client`,
    /// then sets the viewport to cover all of it.
    pub fn sync<G: GpuApi>(&mut self, gpu: &mut G, client: ViewportSize) -> ViewportSize {
        if gpu.drawable_size() != (client.width, client.height) {
            tracing::debug!(
                width = client.width,
                height = client.height,
                "resizing drawable"
            );
            gpu.resize_drawable(client.width, client.height);
        }
        gpu.viewport(0, 0, client.width, client.height);
        self.current = Some(client);
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{CallLog, RecordingGpu};

    #[test]
    fn identical_sizes_do_not_reallocate() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::new(log.clone());
        let mut manager = ViewportManager::new();

        for _ in 0..3 {
            let size = manager.sync(&mut gpu, ViewportSize::new(800, 600));
            assert_eq!(size, ViewportSize::new(800, 600));
        }
        assert_eq!(log.drawable_reallocations(), 1);
        assert_eq!(log.last_viewport(), Some((0, 0, 800, 600)));
    }

    #[test]
    fn viewport_tracks_every_resize() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::new(log.clone());
        let mut manager = ViewportManager::new();
        let sizes = [(800, 600), (1024, 768), (1024, 768), (1, 1), (800, 600)];

        for (width, height) in sizes {
            let size = manager.sync(&mut gpu, ViewportSize::new(width, height));
            assert_eq!(size, ViewportSize::new(width, height));
            assert_eq!(gpu.drawable_size(), (width, height));
            assert_eq!(log.last_viewport(), Some((0, 0, width, height)));
        }
        assert_eq!(log.drawable_reallocations(), 4);
        assert_eq!(manager.current(), Some(ViewportSize::new(800, 600)));
    }

    #[test]
    fn matching_initial_drawable_is_kept() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::new(log.clone());
        let (width, height) = gpu.drawable_size();
        ViewportManager::new().sync(&mut gpu, ViewportSize::new(width, height));
        assert_eq!(log.drawable_reallocations(), 0);
    }
}
