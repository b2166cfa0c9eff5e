use std::sync::Arc;

use anyhow::{anyhow, Result};
use winit::dpi::PhysicalSize;
use winit::event::{ElementState, Event, KeyEvent, WindowEvent};
use winit::event_loop::{ControlFlow, EventLoop};
use winit::keyboard::{Key, NamedKey};
use winit::window::{Window, WindowBuilder};

use crate::effect::LightningEffect;
use crate::gpu::wgpu_backend::WgpuGpu;
use crate::params::LightningParams;
use crate::runtime::{FrameQueue, FrameScheduler, ResizeNotifier, Surface, SystemClock};
use crate::types::{LoopHandle, RebuildPolicy, ResizeSubscription, ViewportSize};

const HUE_STEP: f32 = 10.0;
const INTENSITY_STEP: f32 = 0.1;

/// Settings for [`run_preview`].
#[derive(Debug, Clone)]
pub struct PreviewConfig {
    pub params: LightningParams,
    pub width: u32,
    pub height: u32,
    pub title: String,
    pub policy: RebuildPolicy,
    /// Close the window after this many frames.
    pub max_frames: Option<u64>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            params: LightningParams::default(),
            width: 1280,
            height: 720,
            title: "Lightning".to_string(),
            policy: RebuildPolicy::default(),
            max_frames: None,
        }
    }
}

/// Outcome of a preview session.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PreviewSummary {
    pub frames: u64,
    pub params: LightningParams,
}

/// Host backed by a winit window. A scheduled frame becomes a redraw request.
struct WinitHost {
    window: Arc<Window>,
    queue: FrameQueue,
}

impl Surface for WinitHost {
    type Gpu = WgpuGpu;

    fn client_size(&self) -> ViewportSize {
        let size = self.window.inner_size();
        ViewportSize::new(size.width, size.height)
    }

    fn create_context(&mut self) -> std::result::Result<WgpuGpu, String> {
        let size = self.window.inner_size();
        WgpuGpu::new(self.window.clone(), size.width, size.height).map_err(|err| format!("{err:#}"))
    }
}

impl FrameScheduler for WinitHost {
    fn schedule_next_frame(&mut self) -> LoopHandle {
        let handle = self.queue.schedule();
        self.window.request_redraw();
        handle
    }

    fn cancel_frame(&mut self, handle: LoopHandle) {
        self.queue.cancel(handle);
    }
}

impl ResizeNotifier for WinitHost {
    fn subscribe_resize(&mut self) -> ResizeSubscription {
        self.queue.subscribe()
    }

    fn unsubscribe_resize(&mut self, subscription: ResizeSubscription) {
        self.queue.unsubscribe(subscription);
    }
}

/// Opens a window and runs the effect until it is closed or `max_frames`
/// frames were drawn.
pub fn run_preview(config: PreviewConfig) -> Result<PreviewSummary> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let window = WindowBuilder::new()
        .with_title(config.title.as_str())
        .with_inner_size(PhysicalSize::new(config.width, config.height))
        .build(&event_loop)
        .map_err(|err| anyhow!("failed to create preview window: {err}"))?;
    let window = Arc::new(window);

    let mut host = WinitHost {
        window: window.clone(),
        queue: FrameQueue::new(),
    };
    let mut effect: LightningEffect<WgpuGpu, SystemClock> =
        LightningEffect::new(config.params, SystemClock::new(), config.policy);
    effect.mount(&mut host)?;
    tracing::info!(
        width = config.width,
        height = config.height,
        policy = %effect.policy(),
        "lightning preview running"
    );

    let mut frames = 0u64;
    let mut failure = None;
    let run_result = event_loop.run(|event, elwt| {
        elwt.set_control_flow(ControlFlow::Wait);
        let Event::WindowEvent { window_id, event } = event else {
            return;
        };
        if window_id != window.id() {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                effect.unmount(&mut host);
                elwt.exit();
            }
            WindowEvent::Resized(_) => {
                if host.queue.has_resize_listener() {
                    effect.on_resize(&mut host);
                }
            }
            WindowEvent::RedrawRequested => {
                let Some(handle) = host.queue.take_due() else {
                    return;
                };
                if effect.on_frame(&mut host, handle) {
                    frames += 1;
                }
                if config.max_frames.is_some_and(|limit| frames >= limit) {
                    tracing::debug!(frames, "frame limit reached");
                    effect.unmount(&mut host);
                    elwt.exit();
                }
            }
            WindowEvent::KeyboardInput { event, .. } => {
                let Some(next) = nudge(effect.params(), &event) else {
                    return;
                };
                tracing::info!(hue = next.hue, intensity = next.intensity, "parameters changed");
                if let Err(err) = effect.set_params(&mut host, next) {
                    failure = Some(err);
                    effect.unmount(&mut host);
                    elwt.exit();
                }
            }
            _ => {}
        }
    });

    run_result.map_err(|err| anyhow!("window event loop error: {err}"))?;
    if let Some(err) = failure {
        return Err(err.into());
    }
    Ok(PreviewSummary {
        frames,
        params: effect.params(),
    })
}

/// Maps arrow keys to parameter changes.
fn nudge(current: LightningParams, event: &KeyEvent) -> Option<LightningParams> {
    if event.state != ElementState::Pressed {
        return None;
    }
    let Key::Named(key) = &event.logical_key else {
        return None;
    };
    step(current, *key)
}

fn step(mut params: LightningParams, key: NamedKey) -> Option<LightningParams> {
    match key {
        NamedKey::ArrowLeft => params.hue = (params.hue - HUE_STEP).rem_euclid(360.0),
        NamedKey::ArrowRight => params.hue = (params.hue + HUE_STEP).rem_euclid(360.0),
        NamedKey::ArrowUp => params.intensity += INTENSITY_STEP,
        NamedKey::ArrowDown => params.intensity -= INTENSITY_STEP,
        _ => return None,
    }
    Some(params)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hue_wraps_around_the_colour_wheel() {
        let params = LightningParams {
            hue: 355.0,
            ..LightningParams::default()
        };
        let next = step(params, NamedKey::ArrowRight).unwrap();
        assert!((next.hue - 5.0).abs() < 1e-4, "{}", next.hue);

        let params = LightningParams {
            hue: 5.0,
            ..LightningParams::default()
        };
        let next = step(params, NamedKey::ArrowLeft).unwrap();
        assert!((next.hue - 355.0).abs() < 1e-4, "{}", next.hue);
    }

    #[test]
    fn intensity_is_not_clamped() {
        let params = LightningParams {
            intensity: 0.05,
            ..LightningParams::default()
        };
        let next = step(params, NamedKey::ArrowDown).unwrap();
        assert!(next.intensity < 0.0);
    }

    #[test]
    fn other_keys_are_ignored() {
        assert!(step(LightningParams::default(), NamedKey::Enter).is_none());
    }
}
