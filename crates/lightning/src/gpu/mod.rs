//! The GPU seam.
//!
//! [`GpuApi`] mirrors the small slice of a GL-style API the effect needs:
//! shader objects with a compile status and info log, programs with a link
//! status, named uniform locations, one vertex buffer, a viewport and a
//! drawable backing store. Two backends implement it:
//! - `recording` keeps everything on the CPU and records each call, so frame
//!   sequences can be asserted on without a display.
//! - `wgpu_backend` drives a real surface. It translates the WebGL stages into GLSL 450,
//!   validates them with naga and builds a render pipeline at link time.

pub mod recording;
mod translate;
pub mod wgpu_backend;

use crate::types::{ShaderSource, ShaderStage};

/// GLSL 450 rendition of a WebGL stage, as the wgpu backend compiles it.
pub fn translate_to_glsl450(source: &ShaderSource) -> Result<String, String> {
    translate::translate_stage(source.stage, source.text).map(|translated| translated.source)
}

/// GL-style access to a GPU context owned by a single thread.
///
/// Handle types are opaque. Uniform writes to an absent location are silent
/// no-ops, matching GL semantics.
pub trait GpuApi {
    type Shader;
    type Program;
    type Buffer;
    type UniformLocation: Copy;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Self::Shader, String>;
    fn shader_source(&mut self, shader: &Self::Shader, source: &str);
    fn compile_shader(&mut self, shader: &Self::Shader);
    fn shader_compile_status(&self, shader: &Self::Shader) -> bool;
    fn shader_info_log(&self, shader: &Self::Shader) -> String;
    fn delete_shader(&mut self, shader: Self::Shader);

    fn create_program(&mut self) -> Result<Self::Program, String>;
    fn attach_shader(&mut self, program: &Self::Program, shader: &Self::Shader);
    fn link_program(&mut self, program: &Self::Program);
    fn program_link_status(&self, program: &Self::Program) -> bool;
    fn program_info_log(&self, program: &Self::Program) -> String;
    fn use_program(&mut self, program: Option<&Self::Program>);
    fn delete_program(&mut self, program: Self::Program);

    fn get_uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation>;
    fn get_attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32>;
    fn uniform_1f(&mut self, location: Option<&Self::UniformLocation>, x: f32);
    fn uniform_2f(&mut self, location: Option<&Self::UniformLocation>, x: f32, y: f32);

    fn create_buffer(&mut self) -> Result<Self::Buffer, String>;
    /// Uploads static vertex data into `buffer`, replacing its contents.
    fn buffer_vertices(&mut self, buffer: &Self::Buffer, data: &[f32]);
    /// Feeds attribute `location` from `buffer` as tightly packed floats.
    fn vertex_attrib_pointer(&mut self, buffer: &Self::Buffer, location: u32, components: u32);
    fn delete_buffer(&mut self, buffer: Self::Buffer);

    /// Size of the drawable backing store, as last requested.
    fn drawable_size(&self) -> (u32, u32);
    /// Reallocates the drawable backing store.
    fn resize_drawable(&mut self, width: u32, height: u32);
    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32);
    /// Draws `count` vertices as a triangle list with the active program.
    fn draw_triangles(&mut self, first: i32, count: i32);
}
