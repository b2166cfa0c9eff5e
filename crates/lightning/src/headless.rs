//! A deterministic host with no display.
//!
//! Frames fire only when the caller pumps them, the client size only changes
//! when the caller says so, and every GPU context it hands out shares a single
//! [`CallLog`]. Tests and `storm trace` run the full driver lifecycle on it.

use crate::driver::AnimationDriver;
use crate::gpu::recording::{CallLog, RecordingGpu, RecordingOptions};
use crate::runtime::{Clock, FrameQueue, FrameScheduler, ResizeNotifier, Surface};
use crate::types::{LoopHandle, ResizeSubscription, ViewportSize};

#[derive(Debug)]
pub struct HeadlessHost {
    size: ViewportSize,
    options: RecordingOptions,
    log: CallLog,
    queue: FrameQueue,
    context_unavailable: bool,
    contexts_created: usize,
}

impl HeadlessHost {
    pub fn new(size: ViewportSize) -> Self {
        Self::with_options(size, RecordingOptions::default())
    }

    pub fn with_options(size: ViewportSize, options: RecordingOptions) -> Self {
        Self {
            size,
            options,
            log: CallLog::new(),
            queue: FrameQueue::new(),
            context_unavailable: false,
            contexts_created: 0,
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }

    /// Makes every following context request fail.
    pub fn set_context_unavailable(&mut self, unavailable: bool) {
        self.context_unavailable = unavailable;
    }

    pub fn contexts_created(&self) -> usize {
        self.contexts_created
    }

    /// Changes the client size without notifying anyone.
    pub fn set_client_size(&mut self, size: ViewportSize) {
        self.size = size;
    }

    /// Changes the client size and notifies `driver` if it subscribed.
    pub fn resize<C: Clock>(
        &mut self,
        driver: &mut AnimationDriver<RecordingGpu, C>,
        size: ViewportSize,
    ) -> Option<ViewportSize> {
        self.size = size;
        if !self.queue.has_resize_listener() {
            return None;
        }
        driver.on_resize(self)
    }

    pub fn frame_pending(&self) -> bool {
        self.queue.is_pending()
    }

    pub fn has_resize_listener(&self) -> bool {
        self.queue.has_resize_listener()
    }

    /// Removes the pending frame callback so the caller can fire it.
    pub fn take_due_frame(&mut self) -> Option<LoopHandle> {
        self.queue.take_due()
    }

    /// Fires the pending frame callback, if any. Returns whether a frame was
    /// drawn.
    pub fn advance<C: Clock>(&mut self, driver: &mut AnimationDriver<RecordingGpu, C>) -> bool {
        match self.queue.take_due() {
            Some(handle) => driver.on_frame(self, handle),
            None => false,
        }
    }
}

impl Surface for HeadlessHost {
    type Gpu = RecordingGpu;

    fn client_size(&self) -> ViewportSize {
        self.size
    }

    fn create_context(&mut self) -> Result<RecordingGpu, String> {
        if self.context_unavailable {
            return Err("no GPU adapter available to the headless host".to_string());
        }
        self.contexts_created += 1;
        Ok(RecordingGpu::with_options(
            self.log.clone(),
            self.options.clone(),
        ))
    }
}

impl FrameScheduler for HeadlessHost {
    fn schedule_next_frame(&mut self) -> LoopHandle {
        self.queue.schedule()
    }

    fn cancel_frame(&mut self, handle: LoopHandle) {
        self.queue.cancel(handle);
    }
}

impl ResizeNotifier for HeadlessHost {
    fn subscribe_resize(&mut self) -> ResizeSubscription {
        self.queue.subscribe()
    }

    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription) {
        self.queue.unsubscribe(subscription);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::params::SharedParams;
    use crate::runtime::ManualClock;

    #[test]
    fn advance_without_pending_frame_draws_nothing() {
        let mut host = HeadlessHost::new(ViewportSize::new(8, 8));
        let mut driver = AnimationDriver::new(SharedParams::default(), ManualClock::new());
        assert!(!host.advance(&mut driver));
        assert_eq!(host.log().draw_count(), 0);
    }

    #[test]
    fn resize_before_mount_is_not_delivered() {
        let mut host = HeadlessHost::new(ViewportSize::new(8, 8));
        let mut driver = AnimationDriver::new(SharedParams::default(), ManualClock::new());
        assert_eq!(host.resize(&mut driver, ViewportSize::new(16, 16)), None);
        assert_eq!(host.client_size(), ViewportSize::new(16, 16));
    }

    #[test]
    fn unavailable_context_is_reported() {
        let mut host = HeadlessHost::new(ViewportSize::new(8, 8));
        host.set_context_unavailable(true);
        assert!(host.create_context().is_err());
        assert_eq!(host.contexts_created(), 0);
    }
}
