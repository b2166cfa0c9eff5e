use std::fmt;
use std::time::Duration;

use crate::gpu::GpuApi;
use crate::params::LightningParams;
use crate::types::ViewportSize;

/// Name of the single vertex input of the fixed vertex stage.
pub const POSITION_ATTRIBUTE: &str = "aPosition";

/// Uniforms declared by the fixed fragment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UniformName {
    Resolution,
    Time,
    Hue,
    XOffset,
    Speed,
    Intensity,
    Size,
}

impl UniformName {
    pub const ALL: [UniformName; 7] = [
        UniformName::Resolution,
        UniformName::Time,
        UniformName::Hue,
        UniformName::XOffset,
        UniformName::Speed,
        UniformName::Intensity,
        UniformName::Size,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            UniformName::Resolution => "iResolution",
            UniformName::Time => "iTime",
            UniformName::Hue => "uHue",
            UniformName::XOffset => "uXOffset",
            UniformName::Speed => "uSpeed",
            UniformName::Intensity => "uIntensity",
            UniformName::Size => "uSize",
        }
    }

    fn index(self) -> usize {
        self as usize
    }
}

impl fmt::Display for UniformName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Locations resolved once per linked program.
///
/// Absent names are kept as `None`; writing through them is a no-op.
#[derive(Debug, Clone, Copy)]
pub struct UniformLocationTable<L: Copy> {
    uniforms: [Option<L>; 7],
    position: Option<u32>,
}

impl<L: Copy> UniformLocationTable<L> {
    pub fn resolve<G>(gpu: &G, program: &G::Program) -> Self
    where
        G: GpuApi<UniformLocation = L>,
    {
        let uniforms = UniformName::ALL.map(|name| {
            let location = gpu.get_uniform_location(program, name.as_str());
            if location.is_none() {
                tracing::debug!(uniform = %name, "uniform not active in program");
            }
            location
        });
        Self {
            uniforms,
            position: gpu.get_attrib_location(program, POSITION_ATTRIBUTE),
        }
    }

    pub fn location(&self, name: UniformName) -> Option<&L> {
        self.uniforms[name.index()].as_ref()
    }

    pub fn position_attribute(&self) -> Option<u32> {
        self.position
    }

    /// Number of uniforms that resolved to a live location.
    pub fn resolved_count(&self) -> usize {
        self.uniforms.iter().filter(|location| location.is_some()).count()
    }

    /// Pushes the per-frame state into the active program.
    pub fn apply<G>(
        &self,
        gpu: &mut G,
        params: &LightningParams,
        viewport: ViewportSize,
        elapsed: Duration,
    ) where
        G: GpuApi<UniformLocation = L>,
    {
        gpu.uniform_2f(
            self.location(UniformName::Resolution),
            viewport.width as f32,
            viewport.height as f32,
        );
        gpu.uniform_1f(self.location(UniformName::Time), elapsed.as_secs_f32());
        gpu.uniform_1f(self.location(UniformName::Hue), params.hue);
        gpu.uniform_1f(self.location(UniformName::XOffset), params.x_offset);
        gpu.uniform_1f(self.location(UniformName::Speed), params.speed);
        gpu.uniform_1f(self.location(UniformName::Intensity), params.intensity);
        gpu.uniform_1f(self.location(UniformName::Size), params.size);
    }
}
