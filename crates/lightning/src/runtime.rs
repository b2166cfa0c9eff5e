use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant};

use crate::gpu::GpuApi;
use crate::types::{LoopHandle, ResizeSubscription, ViewportSize};

/// Monotonic time source sampled by the animation driver.
pub trait Clock {
    /// Time elapsed since an arbitrary, fixed origin.
    fn now(&self) -> Duration;
}

/// Clock backed by [`Instant`].
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Clock that only moves when told to. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, now: Duration) {
        self.now.set(now);
    }

    pub fn set_secs(&self, seconds: f64) {
        self.now.set(Duration::from_secs_f64(seconds));
    }

    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// The drawable host element.
pub trait Surface {
    type Gpu: GpuApi;

    /// Current logical size of the element, in pixels.
    fn client_size(&self) -> ViewportSize;

    /// Acquires a GPU context for this surface.
    fn create_context(&mut self) -> Result<Self::Gpu, String>;
}

/// Per-frame scheduling primitive of the host.
///
/// At most one callback is pending at any time; scheduling again replaces it.
pub trait FrameScheduler {
    fn schedule_next_frame(&mut self) -> LoopHandle;
    fn cancel_frame(&mut self, handle: LoopHandle);
}

/// Resize-notification subscription of the host.
pub trait ResizeNotifier {
    fn subscribe_resize(&mut self) -> ResizeSubscription;
    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription);
}

/// Everything the driver needs from its environment.
pub trait Host: Surface + FrameScheduler + ResizeNotifier {}

impl<T: Surface + FrameScheduler + ResizeNotifier> Host for T {}

/// Bookkeeping shared by hosts: one pending frame, one resize listener.
#[derive(Debug, Default)]
pub struct FrameQueue {
    next_id: u64,
    pending: Option<LoopHandle>,
    resize_listener: Option<ResizeSubscription>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn schedule(&mut self) -> LoopHandle {
        self.next_id += 1;
        let handle = LoopHandle::from_raw(self.next_id);
        self.pending = Some(handle);
        handle
    }

    pub fn cancel(&mut self, handle: LoopHandle) {
        if self.pending == Some(handle) {
            self.pending = None;
        }
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Takes the pending callback so the host can fire it.
    pub fn take_due(&mut self) -> Option<LoopHandle> {
        self.pending.take()
    }

    pub fn subscribe(&mut self) -> ResizeSubscription {
        self.next_id += 1;
        let subscription = ResizeSubscription::from_raw(self.next_id);
        self.resize_listener = Some(subscription);
        subscription
    }

    pub fn unsubscribe(&mut self, subscription: ResizeSubscription) {
        if self.resize_listener == Some(subscription) {
            self.resize_listener = None;
        }
    }

    pub fn has_resize_listener(&self) -> bool {
        self.resize_listener.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rescheduling_replaces_pending_handle() {
        let mut queue = FrameQueue::new();
        let first = queue.schedule();
        let second = queue.schedule();
        assert_ne!(first, second);
        queue.cancel(first);
        assert!(queue.is_pending());
        assert_eq!(queue.take_due(), Some(second));
        assert_eq!(queue.take_due(), None);
    }

    #[test]
    fn cancel_clears_matching_handle() {
        let mut queue = FrameQueue::new();
        let handle = queue.schedule();
        queue.cancel(handle);
        assert!(!queue.is_pending());
    }

    #[test]
    fn stale_unsubscribe_keeps_current_listener() {
        let mut queue = FrameQueue::new();
        let old = queue.subscribe();
        let current = queue.subscribe();
        queue.unsubscribe(old);
        assert!(queue.has_resize_listener());
        queue.unsubscribe(current);
        assert!(!queue.has_resize_listener());
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let view = clock.clone();
        clock.set_secs(1.5);
        clock.advance(Duration::from_millis(500));
        assert_eq!(view.now(), Duration::from_secs(2));
    }

    #[test]
    fn system_clock_is_monotonic() {
        let clock = SystemClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }
}
