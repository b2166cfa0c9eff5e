//! Lightning: an animated, GPU-shader-driven backdrop.
//!
//! A fixed fragment shader domain-warps ten octaves of value noise around the
//! vertical centreline and colours the glow by hue. This crate owns the
//! pipeline mechanics around it:
//!
//! ```text
//!   mount ──▶ ViewportManager::sync ──▶ Surface::create_context
//!                                               │
//!          compile_shader ×2 ──▶ link_program ──┘
//!                                   │
//!             UniformLocationTable::resolve ──▶ quad upload ──▶ Ready
//!
//!   Running: sync ─▶ elapsed ─▶ apply uniforms ─▶ draw 6 vertices ─▶ reschedule
//! ```
//!
//! [`AnimationDriver`] is the state machine. It borrows a [`Host`] for every
//! transition, so the same driver runs inside a winit window
//! ([`run_preview`]) or against the deterministic [`HeadlessHost`].
//! [`LightningEffect`] sits on top and decides what a parameter change does.

pub mod compile;
pub mod driver;
pub mod effect;
pub mod error;
pub mod gpu;
pub mod headless;
pub mod params;
pub mod runtime;
pub mod shaders;
pub mod types;
pub mod uniforms;
pub mod viewport;
pub mod window;

pub use driver::AnimationDriver;
pub use effect::LightningEffect;
pub use error::SetupError;
pub use gpu::recording::{CallLog, GpuCall, RecordingGpu, RecordingOptions, UniformValue};
pub use gpu::GpuApi;
pub use headless::HeadlessHost;
pub use params::{LightningParams, SharedParams};
pub use runtime::{Clock, FrameQueue, Host, ManualClock, SystemClock};
pub use types::{
    DriverState, LoopHandle, RebuildPolicy, ResizeSubscription, ShaderSource, ShaderStage,
    ViewportSize,
};
pub use uniforms::{UniformLocationTable, UniformName};
pub use viewport::ViewportManager;
pub use window::{run_preview, PreviewConfig, PreviewSummary};
