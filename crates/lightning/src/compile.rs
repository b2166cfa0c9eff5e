//! Stage compilation and program linking.
//!
//! Stage handles never outlive setup: a failed compile releases its shader
//! before returning, and [`link_program`] consumes both stages and releases
//! them whether or not linking succeeds.

use crate::error::SetupError;
use crate::gpu::GpuApi;
use crate::types::{ShaderSource, ShaderStage};

/// A successfully compiled stage awaiting linking.
#[derive(Debug)]
pub struct CompiledShader<G: GpuApi> {
    stage: ShaderStage,
    handle: G::Shader,
}

impl<G: GpuApi> CompiledShader<G> {
    /// Returns the stage to the GPU.
    pub fn release(self, gpu: &mut G) {
        tracing::trace!(stage = %self.stage, "releasing shader stage");
        gpu.delete_shader(self.handle);
    }
}

/// The active GPU program of a mounted surface.
#[derive(Debug)]
pub struct LinkedProgram<G: GpuApi> {
    handle: G::Program,
}

impl<G: GpuApi> LinkedProgram<G> {
    pub fn handle(&self) -> &G::Program {
        &self.handle
    }

    pub fn release(self, gpu: &mut G) {
        gpu.use_program(None);
        gpu.delete_program(self.handle);
    }
}

pub fn compile_shader<G: GpuApi>(
    gpu: &mut G,
    source: &ShaderSource,
) -> Result<CompiledShader<G>, SetupError> {
    let stage = source.stage;
    let handle = gpu
        .create_shader(stage)
        .map_err(|log| SetupError::ShaderCompile { stage, log })?;
    gpu.shader_source(&handle, source.text);
    gpu.compile_shader(&handle);

    if !gpu.shader_compile_status(&handle) {
        let log = gpu.shader_info_log(&handle);
        gpu.delete_shader(handle);
        return Err(SetupError::ShaderCompile { stage, log });
    }

    tracing::trace!(%stage, "compiled shader stage");
    Ok(CompiledShader { stage, handle })
}

/// Links both stages and makes the result the active program.
pub fn link_program<G: GpuApi>(
    gpu: &mut G,
    vertex: CompiledShader<G>,
    fragment: CompiledShader<G>,
) -> Result<LinkedProgram<G>, SetupError> {
    let program = match gpu.create_program() {
        Ok(program) => program,
        Err(log) => {
            vertex.release(gpu);
            fragment.release(gpu);
            return Err(SetupError::ProgramLink { log });
        }
    };
    gpu.attach_shader(&program, &vertex.handle);
    gpu.attach_shader(&program, &fragment.handle);
    gpu.link_program(&program);
    vertex.release(gpu);
    fragment.release(gpu);

    if !gpu.program_link_status(&program) {
        let log = gpu.program_info_log(&program);
        gpu.delete_program(program);
        return Err(SetupError::ProgramLink { log });
    }

    gpu.use_program(Some(&program));
    Ok(LinkedProgram { handle: program })
}

/// Compiles both stages and links them, short-circuiting on the first error.
pub fn build_program<G: GpuApi>(
    gpu: &mut G,
    vertex: &ShaderSource,
    fragment: &ShaderSource,
) -> Result<LinkedProgram<G>, SetupError> {
    let vertex = compile_shader(gpu, vertex)?;
    let fragment = match compile_shader(gpu, fragment) {
        Ok(fragment) => fragment,
        Err(err) => {
            vertex.release(gpu);
            return Err(err);
        }
    };
    link_program(gpu, vertex, fragment)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::recording::{CallLog, GpuCall, RecordingGpu, RecordingOptions};
    use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

    const BROKEN_FRAGMENT: ShaderSource = ShaderSource::new(
        ShaderStage::Fragment,
        "void main() { gl_FragColor = vec4(1.0);",
    );

    #[test]
    fn builds_fixed_program_and_releases_stages() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::new(log.clone());
        let program = build_program(&mut gpu, &VERTEX_SHADER, &FRAGMENT_SHADER).unwrap();

        assert_eq!(log.live_shaders(), 0);
        assert_eq!(log.live_programs(), 1);
        assert!(log
            .calls()
            .contains(&GpuCall::UseProgram { active: true }));

        program.release(&mut gpu);
        assert_eq!(log.live_programs(), 0);
    }

    #[test]
    fn compile_failure_surfaces_log_and_releases_shader() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::new(log.clone());
        let err = compile_shader(&mut gpu, &BROKEN_FRAGMENT).unwrap_err();

        match err {
            SetupError::ShaderCompile { stage, log: info } => {
                assert_eq!(stage, ShaderStage::Fragment);
                assert!(info.contains("missing '}'"), "{info}");
            }
            other => panic!("unexpected error {other:?}"),
        }
        assert_eq!(log.live_shaders(), 0);
    }

    #[test]
    fn fragment_failure_releases_vertex_and_skips_link() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::new(log.clone());
        let err = build_program(&mut gpu, &VERTEX_SHADER, &BROKEN_FRAGMENT).unwrap_err();

        assert!(matches!(err, SetupError::ShaderCompile { .. }));
        assert_eq!(log.link_count(), 0);
        assert_eq!(log.live_shaders(), 0);
        assert_eq!(log.live_programs(), 0);
    }

    #[test]
    fn vertex_failure_never_compiles_fragment() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::with_options(
            log.clone(),
            RecordingOptions {
                reject_stage: Some(ShaderStage::Vertex),
                ..RecordingOptions::default()
            },
        );
        let err = build_program(&mut gpu, &VERTEX_SHADER, &FRAGMENT_SHADER).unwrap_err();

        assert!(matches!(
            err,
            SetupError::ShaderCompile {
                stage: ShaderStage::Vertex,
                ..
            }
        ));
        assert_eq!(log.compile_count(), 1);
    }

    #[test]
    fn link_failure_releases_everything() {
        let log = CallLog::new();
        let mut gpu = RecordingGpu::with_options(
            log.clone(),
            RecordingOptions {
                fail_link: true,
                ..RecordingOptions::default()
            },
        );
        let err = build_program(&mut gpu, &VERTEX_SHADER, &FRAGMENT_SHADER).unwrap_err();

        assert_eq!(
            err,
            SetupError::ProgramLink {
                log: "ERROR: link rejected by driver".to_string()
            }
        );
        assert_eq!(log.live_shaders(), 0);
        assert_eq!(log.live_programs(), 0);
    }
}
