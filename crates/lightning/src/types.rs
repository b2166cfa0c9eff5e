use std::fmt;

use serde::{Deserialize, Serialize};

/// One half of a shader program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

impl fmt::Display for ShaderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ShaderStage::Vertex => f.write_str("vertex"),
            ShaderStage::Fragment => f.write_str("fragment"),
        }
    }
}

/// Immutable source text for a single stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderSource {
    pub stage: ShaderStage,
    pub text: &'static str,
}

impl ShaderSource {
    pub const fn new(stage: ShaderStage, text: &'static str) -> Self {
        Self { stage, text }
    }
}

/// Pixel dimensions of the drawing surface.
///
/// Mirrors the host element's client size. Feeds both the GPU viewport and the
/// `iResolution` uniform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ViewportSize {
    pub width: u32,
    pub height: u32,
}

impl ViewportSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ViewportSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Cancellation token for a scheduled next-frame callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoopHandle(u64);

impl LoopHandle {
    /// Wraps a host-specific callback id.
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Token returned by a resize-notification subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResizeSubscription(u64);

impl ResizeSubscription {
    pub const fn from_raw(id: u64) -> Self {
        Self(id)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

/// Lifecycle of an [`AnimationDriver`](crate::AnimationDriver).
///
/// ```text
/// Uninitialized ──setup──▶ Ready ──start──▶ Running ──dispose──▶ Disposed
///        │
///        └──setup error──▶ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverState {
    Uninitialized,
    Ready,
    Running,
    Disposed,
    Failed,
}

/// How the mounted effect reacts when a parameter changes identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RebuildPolicy {
    /// Tear the driver down and rebuild the whole pipeline from scratch.
    #[default]
    Rebuild,
    /// Keep the linked program and let the next frame pick up the new values.
    InPlace,
}

impl fmt::Display for RebuildPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildPolicy::Rebuild => f.write_str("rebuild"),
            RebuildPolicy::InPlace => f.write_str("in-place"),
        }
    }
}
