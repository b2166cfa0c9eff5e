//! The per-frame animation loop as an explicit state machine.
//!
//! The driver never owns its host. Every transition that touches the outside
//! world (context creation, frame scheduling, resize subscriptions) borrows
//! the [`Host`] for the duration of the call, so a test host can pump frames
//! one at a time and inspect what was drawn in between.

use std::time::Duration;

use crate::compile::{build_program, LinkedProgram};
use crate::error::SetupError;
use crate::gpu::GpuApi;
use crate::params::SharedParams;
use crate::runtime::{Clock, Host};
use crate::shaders::{FRAGMENT_SHADER, FULLSCREEN_QUAD, QUAD_VERTEX_COUNT, VERTEX_SHADER};
use crate::types::{DriverState, LoopHandle, ResizeSubscription, ViewportSize};
use crate::uniforms::UniformLocationTable;
use crate::viewport::ViewportManager;

const STATS_INTERVAL: Duration = Duration::from_secs(1);

/// GPU resources that live from `Ready` until disposal.
struct Pipeline<G: GpuApi> {
    program: LinkedProgram<G>,
    table: UniformLocationTable<G::UniformLocation>,
    quad: G::Buffer,
}

impl<G: GpuApi> Pipeline<G> {
    fn release(self, gpu: &mut G) {
        gpu.delete_buffer(self.quad);
        self.program.release(gpu);
    }
}

#[derive(Debug, Default)]
struct RenderStats {
    last_log: Duration,
    frames_since_log: u64,
}

impl RenderStats {
    fn record(&mut self, elapsed: Duration, total_frames: u64) {
        self.frames_since_log += 1;
        let window = elapsed.saturating_sub(self.last_log);
        if window >= STATS_INTERVAL {
            let fps = self.frames_since_log as f64 / window.as_secs_f64();
            tracing::debug!(
                fps,
                frames = total_frames,
                elapsed_secs = elapsed.as_secs_f64(),
                "render stats"
            );
            self.last_log = elapsed;
            self.frames_since_log = 0;
        }
    }
}

/// Owns the GPU pipeline of one mounted surface and its frame loop.
pub struct AnimationDriver<G: GpuApi, C: Clock> {
    state: DriverState,
    params: SharedParams,
    clock: C,
    gpu: Option<G>,
    pipeline: Option<Pipeline<G>>,
    viewport: ViewportManager,
    start: Duration,
    pending: Option<LoopHandle>,
    resize: Option<ResizeSubscription>,
    failure: Option<SetupError>,
    frames_drawn: u64,
    stats: RenderStats,
}

impl<G: GpuApi, C: Clock> AnimationDriver<G, C> {
    pub fn new(params: SharedParams, clock: C) -> Self {
        Self {
            state: DriverState::Uninitialized,
            params,
            clock,
            gpu: None,
            pipeline: None,
            viewport: ViewportManager::new(),
            start: Duration::ZERO,
            pending: None,
            resize: None,
            failure: None,
            frames_drawn: 0,
            stats: RenderStats::default(),
        }
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    /// The error that moved the driver to `Failed`, if any.
    pub fn failure(&self) -> Option<&SetupError> {
        self.failure.as_ref()
    }

    pub fn frames_drawn(&self) -> u64 {
        self.frames_drawn
    }

    pub fn viewport(&self) -> Option<ViewportSize> {
        self.viewport.current()
    }

    pub fn gpu(&self) -> Option<&G> {
        self.gpu.as_ref()
    }

    pub fn params(&self) -> &SharedParams {
        &self.params
    }

    /// `Uninitialized → Ready`, or `Failed` on any setup error.
    ///
    /// The error is logged here exactly once. Calling this in any other state
    /// is a no-op that reports the stored failure, if there is one.
    pub fn initialize<H>(&mut self, host: &mut H) -> Result<(), SetupError>
    where
        H: Host<Gpu = G>,
    {
        if self.state != DriverState::Uninitialized {
            tracing::trace!(state = ?self.state, "initialize ignored");
            return self.failure.clone().map_or(Ok(()), Err);
        }

        match self.setup(host) {
            Ok((gpu, pipeline)) => {
                self.gpu = Some(gpu);
                self.pipeline = Some(pipeline);
                self.resize = Some(host.subscribe_resize());
                self.start = self.clock.now();
                self.state = DriverState::Ready;
                tracing::debug!(viewport = ?self.viewport.current(), "lightning pipeline ready");
                Ok(())
            }
            Err(err) => {
                tracing::error!(error = %err, "lightning setup failed; effect disabled");
                self.failure = Some(err.clone());
                self.state = DriverState::Failed;
                Err(err)
            }
        }
    }

    fn setup<H>(&mut self, host: &mut H) -> Result<(G, Pipeline<G>), SetupError>
    where
        H: Host<Gpu = G>,
    {
        let mut gpu = host.create_context().map_err(SetupError::context)?;
        self.viewport.sync(&mut gpu, host.client_size());

        let program = build_program(&mut gpu, &VERTEX_SHADER, &FRAGMENT_SHADER)?;
        let table = UniformLocationTable::resolve(&gpu, program.handle());

        let quad = match gpu.create_buffer() {
            Ok(quad) => quad,
            Err(reason) => {
                program.release(&mut gpu);
                return Err(SetupError::context(format!(
                    "vertex buffer allocation failed: {reason}"
                )));
            }
        };
        gpu.buffer_vertices(&quad, &FULLSCREEN_QUAD);
        match table.position_attribute() {
            Some(location) => gpu.vertex_attrib_pointer(&quad, location, 2),
            None => tracing::debug!("position attribute not active in program"),
        }

        Ok((gpu, Pipeline { program, table, quad }))
    }

    /// `Ready → Running`: schedules the first frame.
    pub fn start<H>(&mut self, host: &mut H)
    where
        H: Host<Gpu = G>,
    {
        if self.state != DriverState::Ready {
            tracing::trace!(state = ?self.state, "start ignored");
            return;
        }
        self.pending = Some(host.schedule_next_frame());
        self.state = DriverState::Running;
    }

    /// Runs setup and, when it succeeds, starts the loop.
    pub fn mount<H>(&mut self, host: &mut H) -> Result<(), SetupError>
    where
        H: Host<Gpu = G>,
    {
        self.initialize(host)?;
        self.start(host);
        Ok(())
    }

    /// One iteration of the steady-state loop.
    ///
    /// Returns `false` without touching the GPU when the driver is not running
    /// or `handle` is not the callback it last scheduled.
    pub fn on_frame<H>(&mut self, host: &mut H, handle: LoopHandle) -> bool
    where
        H: Host<Gpu = G>,
    {
        if self.state != DriverState::Running || self.pending != Some(handle) {
            tracing::trace!(handle = handle.raw(), "ignoring stale frame callback");
            return false;
        }
        self.pending = None;

        let (Some(gpu), Some(pipeline)) = (self.gpu.as_mut(), self.pipeline.as_ref()) else {
            return false;
        };

        let viewport = self.viewport.sync(gpu, host.client_size());
        let elapsed = self.clock.now().saturating_sub(self.start);
        let params = self.params.get();
        pipeline.table.apply(gpu, &params, viewport, elapsed);
        gpu.draw_triangles(0, QUAD_VERTEX_COUNT);

        self.frames_drawn += 1;
        self.stats.record(elapsed, self.frames_drawn);
        tracing::trace!(frame = self.frames_drawn, %viewport, "frame drawn");

        self.pending = Some(host.schedule_next_frame());
        true
    }

    /// Handles a resize notification from the host.
    pub fn on_resize<H>(&mut self, host: &mut H) -> Option<ViewportSize>
    where
        H: Host<Gpu = G>,
    {
        if !matches!(self.state, DriverState::Ready | DriverState::Running) {
            return None;
        }
        let gpu = self.gpu.as_mut()?;
        Some(self.viewport.sync(gpu, host.client_size()))
    }

    /// Moves to `Disposed`: cancels the pending frame, drops the resize
    /// listener and releases every GPU resource. Irreversible.
    pub fn dispose<H>(&mut self, host: &mut H)
    where
        H: Host<Gpu = G>,
    {
        if self.state == DriverState::Disposed {
            return;
        }
        if let Some(handle) = self.pending.take() {
            host.cancel_frame(handle);
        }
        if let Some(subscription) = self.resize.take() {
            tracing::trace!(subscription = subscription.raw(), "dropping resize listener");
            host.unsubscribe_resize(subscription);
        }
        self.release_gpu();
        tracing::debug!(
            from = ?self.state,
            frames = self.frames_drawn,
            "lightning driver disposed"
        );
        self.state = DriverState::Disposed;
    }

    fn release_gpu(&mut self) {
        if let (Some(gpu), Some(pipeline)) = (self.gpu.as_mut(), self.pipeline.take()) {
            pipeline.release(gpu);
        }
        self.gpu = None;
    }
}

impl<G: GpuApi, C: Clock> Drop for AnimationDriver<G, C> {
    fn drop(&mut self) {
        self.release_gpu();
    }
}
