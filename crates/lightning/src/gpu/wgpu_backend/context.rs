use std::sync::Arc;

use anyhow::{anyhow, Context as AnyhowContext, Result};
use winit::window::Window;

/// wgpu instance, device and swapchain for one window.
///
/// The surface is created from the window's raw handles, so the window is
/// kept alive for as long as the surface exists.
pub(crate) struct GpuContext {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub surface_format: wgpu::TextureFormat,
    _instance: wgpu::Instance,
    _window: Arc<Window>,
}

impl GpuContext {
    pub(crate) fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            flags: wgpu::InstanceFlags::default(),
            memory_budget_thresholds: wgpu::MemoryBudgetThresholds::default(),
            backend_options: wgpu::BackendOptions::default(),
        });

        let surface = {
            use raw_window_handle::{HasDisplayHandle, HasWindowHandle};

            let window_handle = window
                .window_handle()
                .map_err(|err| anyhow!("failed to acquire window handle: {err}"))?;
            let display_handle = window
                .display_handle()
                .map_err(|err| anyhow!("failed to acquire display handle: {err}"))?;

            // SAFETY: `_window` keeps the native window alive for the lifetime
            // of the surface, and fields drop in declaration order.
            unsafe {
                instance.create_surface_unsafe(wgpu::SurfaceTargetUnsafe::RawHandle {
                    raw_display_handle: display_handle.as_raw(),
                    raw_window_handle: window_handle.as_raw(),
                })
            }
            .context("failed to create rendering surface")?
        };

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::LowPower,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .context("failed to find a suitable GPU adapter")?;

        let info = adapter.get_info();
        tracing::debug!(
            name = %info.name,
            backend = ?info.backend,
            device_type = ?info.device_type,
            "selected GPU adapter"
        );

        let limits = adapter.limits();
        let (device, queue) = pollster::block_on(adapter.request_device(&wgpu::DeviceDescriptor {
            label: Some("lightning device"),
            required_features: wgpu::Features::empty(),
            required_limits: limits.clone(),
            memory_hints: wgpu::MemoryHints::MemoryUsage,
            trace: wgpu::Trace::default(),
        }))
        .context("failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let Some(&first_format) = surface_caps.formats.first() else {
            anyhow::bail!("surface reports no supported texture formats");
        };
        // Shader output is gamma-encoded already, like a WebGL canvas.
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|format| !format.is_srgb())
            .unwrap_or_else(|| {
                tracing::warn!(
                    fallback = ?first_format,
                    "no linear (non-sRGB) surface format available; colours will be re-encoded"
                );
                first_format
            });

        let present_mode = if surface_caps.present_modes.contains(&wgpu::PresentMode::Fifo) {
            wgpu::PresentMode::Fifo
        } else {
            surface_caps
                .present_modes
                .first()
                .copied()
                .unwrap_or(wgpu::PresentMode::Fifo)
        };
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let max_dimension = limits.max_texture_dimension_2d;
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.clamp(1, max_dimension),
            height: height.clamp(1, max_dimension),
            present_mode,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);
        tracing::debug!(?present_mode, ?surface_format, "configured surface");

        Ok(Self {
            surface,
            device,
            queue,
            config,
            surface_format,
            _instance: instance,
            _window: window,
        })
    }

    /// Reconfigures the swapchain; zero-sized requests keep a 1x1 backing store.
    pub(crate) fn resize(&mut self, width: u32, height: u32) {
        let max_dimension = self.device.limits().max_texture_dimension_2d;
        self.config.width = width.clamp(1, max_dimension);
        self.config.height = height.clamp(1, max_dimension);
        self.surface.configure(&self.device, &self.config);
    }

    pub(crate) fn reconfigure(&mut self) {
        self.surface.configure(&self.device, &self.config);
    }
}
