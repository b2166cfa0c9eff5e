use std::borrow::Cow;

use wgpu::naga;

use super::super::translate::{TranslatedStage, UniformBlock};
use crate::types::ShaderStage;

/// Parses and validates a translated stage with naga so failures surface at
/// compile time with a readable log instead of as a device error later.
pub(crate) fn validate_stage(stage: &TranslatedStage) -> Result<(), String> {
    let naga_stage = naga_stage(stage.stage);
    let module = naga::front::glsl::Frontend::default()
        .parse(&naga::front::glsl::Options::from(naga_stage), &stage.source)
        .map_err(|errors| format!("{errors}"))?;
    naga::valid::Validator::new(
        naga::valid::ValidationFlags::all(),
        naga::valid::Capabilities::all(),
    )
    .validate(&module)
    .map_err(|err| format!("{err}"))?;
    Ok(())
}

fn naga_stage(stage: ShaderStage) -> naga::ShaderStage {
    match stage {
        ShaderStage::Vertex => naga::ShaderStage::Vertex,
        ShaderStage::Fragment => naga::ShaderStage::Fragment,
    }
}

fn create_module(device: &wgpu::Device, stage: &TranslatedStage) -> wgpu::ShaderModule {
    let label = match stage.stage {
        ShaderStage::Vertex => "lightning vertex",
        ShaderStage::Fragment => "lightning fragment",
    };
    device.create_shader_module(wgpu::ShaderModuleDescriptor {
        label: Some(label),
        source: wgpu::ShaderSource::Glsl {
            shader: Cow::Owned(stage.source.clone()),
            stage: naga_stage(stage.stage),
            defines: &[],
        },
    })
}

/// Uniform buffer plus the bind group that exposes it at set 0.
pub(crate) struct UniformBinding {
    pub buffer: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
}

/// Everything a linked program needs to draw.
pub(crate) struct LinkedPipeline {
    pub pipeline: wgpu::RenderPipeline,
    pub uniforms: Option<UniformBinding>,
}

/// Merges the stage blocks. Both stages may declare uniforms, but then the
/// declarations must agree since they share one binding.
pub(crate) fn merge_blocks(
    vertex: &UniformBlock,
    fragment: &UniformBlock,
) -> Result<UniformBlock, String> {
    match (vertex.is_empty(), fragment.is_empty()) {
        (true, _) => Ok(fragment.clone()),
        (false, true) => Ok(vertex.clone()),
        (false, false) if vertex == fragment => Ok(fragment.clone()),
        (false, false) => {
            Err("ERROR: vertex and fragment stages declare different uniforms".to_string())
        }
    }
}

pub(crate) fn build_pipeline(
    device: &wgpu::Device,
    surface_format: wgpu::TextureFormat,
    vertex: &TranslatedStage,
    fragment: &TranslatedStage,
    block: &UniformBlock,
) -> Result<LinkedPipeline, String> {
    device.push_error_scope(wgpu::ErrorFilter::Validation);

    let vertex_module = create_module(device, vertex);
    let fragment_module = create_module(device, fragment);

    let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some("lightning uniform layout"),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    });

    let uniforms = if block.is_empty() {
        None
    } else {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("lightning uniforms"),
            size: (block.padded_len() * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("lightning uniform bind group"),
            layout: &uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            }],
        });
        Some(UniformBinding { buffer, bind_group })
    };

    let uniform_layouts = [&uniform_layout];
    let bind_group_layouts: &[&wgpu::BindGroupLayout] = if uniforms.is_some() {
        &uniform_layouts
    } else {
        &[]
    };
    let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("lightning pipeline layout"),
        bind_group_layouts,
        push_constant_ranges: &[],
    });

    let attributes: Vec<wgpu::VertexAttribute> = (0..vertex.attributes.len() as u32)
        .map(|location| wgpu::VertexAttribute {
            format: wgpu::VertexFormat::Float32x2,
            offset: 0,
            shader_location: location,
        })
        .collect();
    let vertex_buffers = [wgpu::VertexBufferLayout {
        array_stride: (2 * std::mem::size_of::<f32>()) as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &attributes,
    }];

    let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("lightning pipeline"),
        layout: Some(&pipeline_layout),
        vertex: wgpu::VertexState {
            module: &vertex_module,
            entry_point: Some("main"),
            buffers: if attributes.is_empty() {
                &[]
            } else {
                &vertex_buffers
            },
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: wgpu::PrimitiveTopology::TriangleList,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: &fragment_module,
            entry_point: Some("main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: surface_format,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        multiview: None,
        cache: None,
    });

    if let Some(err) = pollster::block_on(device.pop_error_scope()) {
        return Err(format!("{err}"));
    }

    Ok(LinkedPipeline { pipeline, uniforms })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gpu::translate::translate_stage;
    use crate::shaders::{FRAGMENT_SHADER, VERTEX_SHADER};

    fn translated(stage: ShaderStage, source: &str) -> TranslatedStage {
        translate_stage(stage, source).unwrap()
    }

    #[test]
    fn fixed_stages_pass_naga_validation() {
        for source in [VERTEX_SHADER, FRAGMENT_SHADER] {
            let stage = translated(source.stage, source.text);
            if let Err(log) = validate_stage(&stage) {
                panic!("{} stage rejected: {log}", source.stage);
            }
        }
    }

    #[test]
    fn undeclared_identifier_fails_validation_with_log() {
        let stage = translated(
            ShaderStage::Fragment,
            "void main() {\n    gl_FragColor = vec4(missing, 0.0, 0.0, 1.0);\n}\n",
        );
        let log = validate_stage(&stage).unwrap_err();
        assert!(!log.trim().is_empty());
    }

    #[test]
    fn conflicting_uniform_blocks_do_not_link() {
        let first = translated(
            ShaderStage::Vertex,
            "uniform float uScale;\nvoid main() {}\n",
        );
        let second = translated(
            ShaderStage::Fragment,
            "uniform vec2 uOffset;\nvoid main() {}\n",
        );
        let empty = UniformBlock::default();

        let err = merge_blocks(&first.block, &second.block).unwrap_err();
        assert!(err.contains("different uniforms"), "{err}");

        assert_eq!(merge_blocks(&empty, &second.block), Ok(second.block.clone()));
        assert_eq!(merge_blocks(&first.block, &empty), Ok(first.block.clone()));
        assert_eq!(
            merge_blocks(&second.block, &second.block),
            Ok(second.block.clone())
        );
    }
}
