//! Headless GPU that records every state change.
//!
//! Shaders "compile" when their source passes a lexical sanity check (a
//! `main` entry point and balanced delimiters). Uniform and attribute
//! locations are resolved from the declarations found in the attached
//! sources, so a name the program never declares resolves to nothing exactly
//! like it would on a real driver.

use std::cell::{Ref, RefCell};
use std::rc::Rc;

use super::GpuApi;
use crate::types::ShaderStage;

/// Knobs for simulating setup failures.
#[derive(Debug, Clone, Default)]
pub struct RecordingOptions {
    /// Fail compilation of every shader of this stage.
    pub reject_stage: Option<ShaderStage>,
    /// Fail every link attempt.
    pub fail_link: bool,
}

/// A value pushed to a uniform location.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Vec2(f32, f32),
}

impl UniformValue {
    pub fn as_float(self) -> Option<f32> {
        match self {
            UniformValue::Float(x) => Some(x),
            UniformValue::Vec2(..) => None,
        }
    }

    pub fn as_vec2(self) -> Option<(f32, f32)> {
        match self {
            UniformValue::Vec2(x, y) => Some((x, y)),
            UniformValue::Float(_) => None,
        }
    }
}

/// One recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub enum GpuCall {
    CompileShader { stage: ShaderStage, success: bool },
    DeleteShader { stage: ShaderStage },
    LinkProgram { success: bool },
    UseProgram { active: bool },
    DeleteProgram,
    BufferVertices { floats: usize },
    VertexAttribPointer { location: u32, components: u32 },
    DeleteBuffer,
    Uniform { location: u32, value: UniformValue },
    ResizeDrawable { width: u32, height: u32 },
    Viewport { x: i32, y: i32, width: u32, height: u32 },
    Draw { first: i32, count: i32 },
}

#[derive(Debug, Default)]
struct LogState {
    calls: Vec<GpuCall>,
    uniform_names: Vec<String>,
    live_shaders: usize,
    live_programs: usize,
    live_buffers: usize,
}

impl LogState {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(index) = self.uniform_names.iter().position(|known| known == name) {
            return index as u32;
        }
        self.uniform_names.push(name.to_string());
        (self.uniform_names.len() - 1) as u32
    }
}

/// Shared view of everything a [`RecordingGpu`] did.
///
/// Cloning is cheap; every clone observes the same log, which lets tests keep
/// a handle after the GPU itself moved into a driver.
#[derive(Debug, Clone, Default)]
pub struct CallLog(Rc<RefCell<LogState>>);

impl CallLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Ref<'_, [GpuCall]> {
        Ref::map(self.0.borrow(), |state| state.calls.as_slice())
    }

    pub fn clear(&self) {
        self.0.borrow_mut().calls.clear();
    }

    /// Values written to the uniform called `name`, oldest first.
    pub fn uniform_writes(&self, name: &str) -> Vec<UniformValue> {
        let state = self.0.borrow();
        let Some(target) = state.uniform_names.iter().position(|known| known == name) else {
            return Vec::new();
        };
        state
            .calls
            .iter()
            .filter_map(|call| match call {
                GpuCall::Uniform { location, value } if *location as usize == target => {
                    Some(*value)
                }
                _ => None,
            })
            .collect()
    }

    pub fn draw_count(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::Draw { .. }))
    }

    pub fn compile_count(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::CompileShader { .. }))
    }

    pub fn link_count(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::LinkProgram { .. }))
    }

    pub fn drawable_reallocations(&self) -> usize {
        self.count(|call| matches!(call, GpuCall::ResizeDrawable { .. }))
    }

    pub fn last_viewport(&self) -> Option<(i32, i32, u32, u32)> {
        self.0.borrow().calls.iter().rev().find_map(|call| match call {
            GpuCall::Viewport {
                x,
                y,
                width,
                height,
            } => Some((*x, *y, *width, *height)),
            _ => None,
        })
    }

    pub fn last_drawable_size(&self) -> Option<(u32, u32)> {
        self.0.borrow().calls.iter().rev().find_map(|call| match call {
            GpuCall::ResizeDrawable { width, height } => Some((*width, *height)),
            _ => None,
        })
    }

    pub fn live_shaders(&self) -> usize {
        self.0.borrow().live_shaders
    }

    pub fn live_programs(&self) -> usize {
        self.0.borrow().live_programs
    }

    pub fn live_buffers(&self) -> usize {
        self.0.borrow().live_buffers
    }

    fn count(&self, predicate: impl Fn(&GpuCall) -> bool) -> usize {
        self.0.borrow().calls.iter().filter(|call| predicate(call)).count()
    }

    fn push(&self, call: GpuCall) {
        self.0.borrow_mut().calls.push(call);
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedShader(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedProgram(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedBuffer(usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordedUniform(u32);

#[derive(Debug, Default)]
struct ShaderSlot {
    stage: Option<ShaderStage>,
    source: String,
    compiled: bool,
    info_log: String,
}

#[derive(Debug, Default)]
struct ProgramSlot {
    attached: Vec<usize>,
    linked: bool,
    info_log: String,
    uniforms: Vec<String>,
    attributes: Vec<String>,
}

/// CPU-only [`GpuApi`] implementation.
#[derive(Debug)]
pub struct RecordingGpu {
    options: RecordingOptions,
    log: CallLog,
    shaders: Vec<ShaderSlot>,
    programs: Vec<ProgramSlot>,
    buffers: Vec<Vec<f32>>,
    active_program: Option<usize>,
    drawable: (u32, u32),
}

impl RecordingGpu {
    pub fn new(log: CallLog) -> Self {
        Self::with_options(log, RecordingOptions::default())
    }

    pub fn with_options(log: CallLog, options: RecordingOptions) -> Self {
        Self {
            options,
            log,
            shaders: Vec::new(),
            programs: Vec::new(),
            buffers: Vec::new(),
            active_program: None,
            drawable: (300, 150),
        }
    }

    pub fn log(&self) -> &CallLog {
        &self.log
    }
}

impl GpuApi for RecordingGpu {
    type Shader = RecordedShader;
    type Program = RecordedProgram;
    type Buffer = RecordedBuffer;
    type UniformLocation = RecordedUniform;

    fn create_shader(&mut self, stage: ShaderStage) -> Result<Self::Shader, String> {
        self.shaders.push(ShaderSlot {
            stage: Some(stage),
            ..ShaderSlot::default()
        });
        self.log.0.borrow_mut().live_shaders += 1;
        Ok(RecordedShader(self.shaders.len() - 1))
    }

    fn shader_source(&mut self, shader: &Self::Shader, source: &str) {
        if let Some(slot) = self.shaders.get_mut(shader.0) {
            slot.source = source.to_string();
        }
    }

    fn compile_shader(&mut self, shader: &Self::Shader) {
        let Some(slot) = self.shaders.get_mut(shader.0) else {
            return;
        };
        let Some(stage) = slot.stage else {
            return;
        };
        let result = if self.options.reject_stage == Some(stage) {
            Err(format!("ERROR: 0:1: {stage} stage rejected by driver"))
        } else {
            check_source(&slot.source)
        };
        slot.compiled = result.is_ok();
        slot.info_log = result.err().unwrap_or_default();
        self.log.push(GpuCall::CompileShader {
            stage,
            success: slot.compiled,
        });
    }

    fn shader_compile_status(&self, shader: &Self::Shader) -> bool {
        self.shaders
            .get(shader.0)
            .map(|slot| slot.compiled)
            .unwrap_or(false)
    }

    fn shader_info_log(&self, shader: &Self::Shader) -> String {
        self.shaders
            .get(shader.0)
            .map(|slot| slot.info_log.clone())
            .unwrap_or_default()
    }

    fn delete_shader(&mut self, shader: Self::Shader) {
        let Some(slot) = self.shaders.get_mut(shader.0) else {
            return;
        };
        if let Some(stage) = slot.stage.take() {
            self.log.0.borrow_mut().live_shaders -= 1;
            self.log.push(GpuCall::DeleteShader { stage });
        }
    }

    fn create_program(&mut self) -> Result<Self::Program, String> {
        self.programs.push(ProgramSlot::default());
        self.log.0.borrow_mut().live_programs += 1;
        Ok(RecordedProgram(self.programs.len() - 1))
    }

    fn attach_shader(&mut self, program: &Self::Program, shader: &Self::Shader) {
        if let Some(slot) = self.programs.get_mut(program.0) {
            slot.attached.push(shader.0);
        }
    }

    fn link_program(&mut self, program: &Self::Program) {
        let Some(slot) = self.programs.get(program.0) else {
            return;
        };
        let attached: Vec<&ShaderSlot> = slot
            .attached
            .iter()
            .filter_map(|index| self.shaders.get(*index))
            .collect();
        let has_stage = |stage| {
            attached
                .iter()
                .any(|shader| shader.stage == Some(stage) && shader.compiled)
        };

        let result = if self.options.fail_link {
            Err("ERROR: link rejected by driver".to_string())
        } else if !has_stage(ShaderStage::Vertex) || !has_stage(ShaderStage::Fragment) {
            Err("ERROR: program needs a compiled vertex and fragment shader".to_string())
        } else {
            let uniforms = attached
                .iter()
                .flat_map(|shader| declared_names(&shader.source, "uniform"))
                .collect::<Vec<_>>();
            let attributes = attached
                .iter()
                .filter(|shader| shader.stage == Some(ShaderStage::Vertex))
                .flat_map(|shader| declared_names(&shader.source, "attribute"))
                .collect::<Vec<_>>();
            Ok((uniforms, attributes))
        };

        let slot = &mut self.programs[program.0];
        match result {
            Ok((uniforms, attributes)) => {
                slot.linked = true;
                slot.info_log.clear();
                slot.uniforms = uniforms;
                slot.attributes = attributes;
            }
            Err(log) => {
                slot.linked = false;
                slot.info_log = log;
            }
        }
        self.log.push(GpuCall::LinkProgram {
            success: slot.linked,
        });
    }

    fn program_link_status(&self, program: &Self::Program) -> bool {
        self.programs
            .get(program.0)
            .map(|slot| slot.linked)
            .unwrap_or(false)
    }

    fn program_info_log(&self, program: &Self::Program) -> String {
        self.programs
            .get(program.0)
            .map(|slot| slot.info_log.clone())
            .unwrap_or_default()
    }

    fn use_program(&mut self, program: Option<&Self::Program>) {
        self.active_program = program
            .filter(|program| self.program_link_status(program))
            .map(|program| program.0);
        self.log.push(GpuCall::UseProgram {
            active: self.active_program.is_some(),
        });
    }

    fn delete_program(&mut self, program: Self::Program) {
        if self.active_program == Some(program.0) {
            self.active_program = None;
        }
        self.log.0.borrow_mut().live_programs -= 1;
        self.log.push(GpuCall::DeleteProgram);
    }

    fn get_uniform_location(
        &self,
        program: &Self::Program,
        name: &str,
    ) -> Option<Self::UniformLocation> {
        let slot = self.programs.get(program.0)?;
        if !slot.linked || !slot.uniforms.iter().any(|known| known == name) {
            return None;
        }
        Some(RecordedUniform(self.log.0.borrow_mut().intern(name)))
    }

    fn get_attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32> {
        let slot = self.programs.get(program.0)?;
        slot.attributes
            .iter()
            .position(|known| known == name)
            .map(|index| index as u32)
    }

    fn uniform_1f(&mut self, location: Option<&Self::UniformLocation>, x: f32) {
        if let (Some(location), Some(_)) = (location, self.active_program) {
            self.log.push(GpuCall::Uniform {
                location: location.0,
                value: UniformValue::Float(x),
            });
        }
    }

    fn uniform_2f(&mut self, location: Option<&Self::UniformLocation>, x: f32, y: f32) {
        if let (Some(location), Some(_)) = (location, self.active_program) {
            self.log.push(GpuCall::Uniform {
                location: location.0,
                value: UniformValue::Vec2(x, y),
            });
        }
    }

    fn create_buffer(&mut self) -> Result<Self::Buffer, String> {
        self.buffers.push(Vec::new());
        self.log.0.borrow_mut().live_buffers += 1;
        Ok(RecordedBuffer(self.buffers.len() - 1))
    }

    fn buffer_vertices(&mut self, buffer: &Self::Buffer, data: &[f32]) {
        if let Some(contents) = self.buffers.get_mut(buffer.0) {
            contents.clear();
            contents.extend_from_slice(data);
            self.log.push(GpuCall::BufferVertices { floats: data.len() });
        }
    }

    fn vertex_attrib_pointer(&mut self, _buffer: &Self::Buffer, location: u32, components: u32) {
        self.log.push(GpuCall::VertexAttribPointer {
            location,
            components,
        });
    }

    fn delete_buffer(&mut self, buffer: Self::Buffer) {
        if let Some(contents) = self.buffers.get_mut(buffer.0) {
            contents.clear();
        }
        self.log.0.borrow_mut().live_buffers -= 1;
        self.log.push(GpuCall::DeleteBuffer);
    }

    fn drawable_size(&self) -> (u32, u32) {
        self.drawable
    }

    fn resize_drawable(&mut self, width: u32, height: u32) {
        self.drawable = (width, height);
        self.log.push(GpuCall::ResizeDrawable { width, height });
    }

    fn viewport(&mut self, x: i32, y: i32, width: u32, height: u32) {
        self.log.push(GpuCall::Viewport {
            x,
            y,
            width,
            height,
        });
    }

    fn draw_triangles(&mut self, first: i32, count: i32) {
        if self.active_program.is_some() {
            self.log.push(GpuCall::Draw { first, count });
        }
    }
}

/// Minimal stand-in for a GLSL front end.
fn check_source(source: &str) -> Result<(), String> {
    if !source.contains("void main(") {
        return Err("ERROR: 0:0: missing entry point 'main'".to_string());
    }
    let mut depth = [0i32; 2];
    for (line_number, line) in source.lines().enumerate() {
        for ch in line.chars() {
            let (slot, delta) = match ch {
                '{' => (0, 1),
                '}' => (0, -1),
                '(' => (1, 1),
                ')' => (1, -1),
                _ => continue,
            };
            depth[slot] += delta;
            if depth[slot] < 0 {
                return Err(format!("ERROR: 0:{}: unexpected '{ch}'", line_number + 1));
            }
        }
    }
    if depth[0] != 0 {
        return Err("ERROR: 0:0: unexpected end of file, missing '}'".to_string());
    }
    if depth[1] != 0 {
        return Err("ERROR: 0:0: unexpected end of file, missing ')'".to_string());
    }
    Ok(())
}

/// Names declared as `<qualifier> <type> <name>;` at the start of a line.
fn declared_names(source: &str, qualifier: &str) -> Vec<String> {
    source
        .lines()
        .filter_map(|line| {
            let mut words = line.trim().strip_suffix(';')?.split_whitespace();
            if words.next()? != qualifier {
                return None;
            }
            let _ty = words.next()?;
            let name = words.next()?;
            words.next().is_none().then(|| name.to_string())
        })
        .collect()
}
