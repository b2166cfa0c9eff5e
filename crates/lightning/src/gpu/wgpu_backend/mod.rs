//! [`GpuApi`] on top of wgpu.
//!
//! Shader objects hold translated GLSL 450 that already passed naga
//! validation. Linking builds the render pipeline inside a validation error
//! scope. Uniform locations are float offsets into a CPU staging copy of the
//! std140 block, which is uploaded once per draw call.

mod context;
mod pipeline;

use std::sync::Arc;

use anyhow::Result;
use wgpu::util::DeviceExt;
use winit::window::Window;

use self::context::GpuContext;
use self::pipeline::{build_pipeline, merge_blocks, validate_stage, LinkedPipeline};
use super::translate::{translate_stage, TranslatedStage, UniformBlock};
use super::GpuApi;
use crate::types::ShaderStage;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WgpuShader(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WgpuProgram(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WgpuBuffer(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WgpuUniform {
    offset: u32,
    components: u32,
}

struct ShaderSlot {
    stage: ShaderStage,
    source: String,
    translated: Option<TranslatedStage>,
    info_log: String,
}

#[derive(Default)]
struct ProgramSlot {
    attached: Vec<usize>,
    linked: Option<ProgramState>,
    info_log: String,
}

struct ProgramState {
    pipeline: LinkedPipeline,
    translated_vertex: TranslatedStage,
    block: UniformBlock,
    staging: Vec<f32>,
}

/// GPU context bound to a winit window.
pub struct WgpuGpu {
    shaders: Vec<Option<ShaderSlot>>,
    programs: Vec<Option<ProgramSlot>>,
    buffers: Vec<Option<wgpu::Buffer>>,
    vertex_source: Option<usize>,
    active_program: Option<usize>,
    viewport: (i32, i32, u32, u32),
    requested: (u32, u32),
    context: GpuContext,
}

impl WgpuGpu {
    /// Creates the device and swapchain for `window` at the given pixel size.
    pub fn new(window: Arc<Window>, width: u32, height: u32) -> Result<Self> {
        let context = GpuContext::new(window, width, height)?;
        Ok(Self {
            shaders: Vec::new(),
            programs: Vec::new(),
            buffers: Vec::new(),
            vertex_source: None,
            active_program: None,
            viewport: (0, 0, width, height),
            requested: (width, height),
            context,
        })
    }

    fn active(&self) -> Option<&ProgramState> {
        let index = self.active_program?;
        self.programs.get(index)?.as_ref()?.linked.as_ref()
    }

    fn write_uniform(&mut self, location: Option<&WgpuUniform>, values: &[f32]) {
        let Some(location) = location else {
            return;
        };
        let Some(index) = self.active_program else {
            return;
        };
        let Some(linked) = self
            .programs
            .get_mut(index)
            .and_then(Option::as_mut)
            .and_then(|slot| slot.linked.as_mut())
        else {
            return;
        };
        let count = values.len().min(location.components as usize);
        let start = location.offset as usize;
        if let Some(target) = linked.staging.get_mut(start..start + count) {
            target.copy_from_slice(&values[..count]);
        }
    }

    /// Viewport in wgpu's top-left convention, clipped to the swapchain.
    fn target_viewport(&self) -> Option<(f32, f32, f32, f32)> {
        let (x, y, width, height) = self.viewport;
        let target_w = self.context.config.width as i64;
        let target_h = self.context.config.height as i64;
        let left = i64::from(x).clamp(0, target_w);
        let bottom = i64::from(y).clamp(0, target_h);
        let right = (i64::from(x) + i64::from(width)).clamp(0, target_w);
        let top = (i64::from(y) + i64::from(height)).clamp(0, target_h);
        if right <= left || top <= bottom {
            return None;
        }
        Some((
            left as f32,
            (target_h - top) as f32,
            (right - left) as f32,
            (top - bottom) as f32,
        ))
    }
}

impl GpuApi for WgpuGpu {
    type Shader = WgpuShader;
    type Program = WgpuProgram;
    type Buffer = WgpuBuffer;
    type UniformLocation = WgpuUniform;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Self::Shader, String> {
        self.shaders.push(Some(ShaderSlot {
            stage,
            source: String::new(),
            translated: None,
            info_log: String::new(),
        }));
        Ok(WgpuShader(self.shaders.len() - 1))
    }

    fn shader_source(&mut self, shader: &Self::Shader, source: &str) {
        if let Some(Some(slot)) = self.shaders.get_mut(shader.0) {
            slot.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: &Self::Shader) {
        let Some(Some(slot)) = self.shaders.get_mut(shader.0) else {
            return;
        };
        let result = translate_stage(slot.stage, &slot.source).and_then(|translated| {
            validate_stage(&translated)?;
            Ok(translated)
        });
        match result {
            Ok(translated) => {
                slot.translated = Some(translated);
                slot.info_log.clear();
            }
            Err(log) => {
                tracing::debug!(stage = %slot.stage, "naga rejected translated stage");
                slot.translated = None;
                slot.info_log = log;
            }
        }
    }

    fn shader_compile_status(&self, shader: &Self::Shader) -> bool {
        matches!(self.shaders.get(shader.0), Some(Some(slot)) if slot.translated.is_some())
    }

    fn shader_info_log(&self, shader: &Self::Shader) -> String {
        match self.shaders.get(shader.0) {
            Some(Some(slot)) => slot.info_log.clone(),
            _ => String::new(),
        }
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        if let Some(slot) = self.shaders.get_mut(shader.0) {
            *slot = None;
        }
    }

    fn create_program(&mut self) -> Result<Self::Program, String> {
        self.programs.push(Some(ProgramSlot::default()));
        Ok(WgpuProgram(self.programs.len() - 1))
    }

    fn attach_shader(&mut self, program: &Self::Program, shader: &Self::Shader) {
        if let Some(Some(slot)) = self.programs.get_mut(program.0) {
            slot.attached.push(shader.0);
        }
    }

    fn link_program(&mut self, program: &Self::Program) {
        let Some(Some(slot)) = self.programs.get(program.0) else {
            return;
        };
        let compiled = |stage: ShaderStage| {
            slot.attached.iter().find_map(|index| match self.shaders.get(*index) {
                Some(Some(shader)) if shader.stage == stage => shader.translated.as_ref(),
                _ => None,
            })
        };

        let result = match (compiled(ShaderStage::Vertex), compiled(ShaderStage::Fragment)) {
            (Some(vertex), Some(fragment)) => merge_blocks(&vertex.block, &fragment.block)
                .and_then(|block| {
                    let pipeline = build_pipeline(
                        &self.context.device,
                        self.context.surface_format,
                        vertex,
                        fragment,
                        &block,
                    )?;
                    Ok(ProgramState {
                        pipeline,
                        translated_vertex: vertex.clone(),
                        staging: vec![0.0; block.padded_len()],
                        block,
                    })
                }),
            _ => Err("ERROR: program needs a compiled vertex and fragment shader".to_string()),
        };

        if let Some(Some(slot)) = self.programs.get_mut(program.0) {
            match result {
                Ok(linked) => {
                    slot.linked = Some(linked);
                    slot.info_log.clear();
                }
                Err(log) => {
                    slot.linked = None;
                    slot.info_log = log;
                }
            }
        }
    }

    fn program_link_status(&self, program: &Self::Program) -> bool {
        matches!(self.programs.get(program.0), Some(Some(slot)) if slot.linked.is_some())
    }

    fn program_info_log(&self, program: &Self::Program) -> String {
        match self.programs.get(program.0) {
            Some(Some(slot)) => slot.info_log.clone(),
            _ => String::new(),
        }
    }

    fn use_program(&mut self, program: Option<&Self::Program>) {
        self.active_program = program
            .filter(|program| self.program_link_status(program))
            .map(|program| program.0);
    }

    fn delete_program(&mut self, program: Self::Program) {
        if self.active_program == Some(program.0) {
            self.active_program = None;
        }
        if let Some(slot) = self.programs.get_mut(program.0) {
            *slot = None;
        }
    }

    fn get_uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        let Some(Some(slot)) = self.programs.get(program.0) else {
            return None;
        };
        let field = slot.linked.as_ref()?.block.field(name)?;
        Some(WgpuUniform {
            offset: field.offset,
            components: field.kind.components(),
        })
    }

    fn get_attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32> {
        let Some(Some(slot)) = self.programs.get(program.0) else {
            return None;
        };
        slot.linked
            .as_ref()?
            .translated_vertex
            .attributes
            .iter()
            .position(|attribute| attribute == name)
            .map(|index| index as u32)
    }

    fn uniform_1f(&mut self, location: Option<&Self::UniformLocation>, x: f32) {
        self.write_uniform(location, &[x]);
    }

    fn uniform_2f(&mut self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        self.write_uniform(location, &[x, y]);
    }

    fn create_buffer(&mut self) -> Result<Self::Buffer, String> {
        self.buffers.push(None);
        Ok(WgpuBuffer(self.buffers.len() - 1))
    }

    fn buffer_vertices(&mut self, buffer: &Self::Buffer, data: &[f32]) {
        let uploaded = self
            .context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("lightning vertices"),
                contents: bytemuck::cast_slice(data),
                usage: wgpu::BufferUsages::VERTEX,
            });
        if let Some(slot) = self.buffers.get_mut(buffer.0) {
            *slot = Some(uploaded);
        }
    }

    fn vertex_attrib_pointer(&mut self, buffer: &Self::Buffer, location: u32, components: u32) {
        if components != 2 {
            tracing::warn!(location, components, "only vec2 vertex attributes are supported");
            return;
        }
        self.vertex_source = Some(buffer.0);
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        if self.vertex_source == Some(buffer.0) {
            self.vertex_source = None;
        }
        if let Some(slot) = self.buffers.get_mut(buffer.0) {
            if let Some(buffer) = slot.take() {
                buffer.destroy();
            }
        }
    }

    fn drawable_size(&self) -> (u32, u32) {
        self.requested
    }

    fn resize_drawable(&mut self, width: u32, height: u32) {
        self.requested = (width, height);
        self.context.resize(width, height);
        tracing::debug!(width, height, "resized drawable");
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.viewport = (x, y, width, height);
    }

    fn draw_triangles(&mut self, first: i32, count: i32) {
        let Some(rect) = self.target_viewport() else {
            return;
        };
        let Some(linked) = self.active() else {
            return;
        };
        let vertex_buffer = self
            .vertex_source
            .and_then(|index| self.buffers.get(index))
            .and_then(Option::as_ref);
        if vertex_buffer.is_none() && !linked.translated_vertex.attributes.is_empty() {
            return;
        }

        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::debug!("surface lost or outdated; reconfiguring");
                self.context.reconfigure();
                return;
            }
            Err(err) => {
                tracing::warn!(error = %err, "failed to acquire frame; skipping");
                return;
            }
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(uniforms) = linked.pipeline.uniforms.as_ref() {
            self.context.queue.write_buffer(
                &uniforms.buffer,
                0,
                bytemuck::cast_slice(&linked.staging),
            );
        }

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("lightning frame"),
                });
        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("lightning pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let (x, y, width, height) = rect;
            render_pass.set_viewport(x, y, width, height, 0.0, 1.0);
            render_pass.set_pipeline(&linked.pipeline.pipeline);
            if let Some(uniforms) = linked.pipeline.uniforms.as_ref() {
                render_pass.set_bind_group(0, &uniforms.bind_group, &[]);
            }
            if let Some(buffer) = vertex_buffer {
                render_pass.set_vertex_buffer(0, buffer.slice(..));
            }
            let first = first.max(0) as u32;
            render_pass.draw(first..first + count.max(0) as u32, 0..1);
        }
        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
    }
}
