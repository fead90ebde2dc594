use wgpu::util::DeviceExt;

use crate::compile::{self, ShaderError, ShaderKind, ShaderSources};

/// Screen quad corners as signed bytes, drawn as a four-vertex strip.
///
/// Each corner is an `(x, y)` pair padded to four bytes because vertex
/// strides must be a multiple of four.
const QUAD_VERTICES: [[i8; 4]; 4] = [[-1, 1, 0, 0], [-1, -1, 0, 0], [1, 1, 0, 0], [1, -1, 0, 0]];
const QUAD_VERTEX_COUNT: u32 = QUAD_VERTICES.len() as u32;
const QUAD_STRIDE: wgpu::BufferAddress = 4;
const QUAD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Sint8x2];

/// Device objects shared by every program built on a context.
pub(crate) struct PipelineLayouts {
    pub uniform_layout: wgpu::BindGroupLayout,
    pub quad: wgpu::Buffer,
}

impl PipelineLayouts {
    pub fn new(device: &wgpu::Device) -> Self {
        let uniform_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("yinyang uniform layout"),
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

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("yinyang quad"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Self {
            uniform_layout,
            quad,
        }
    }

    pub fn vertex_count(&self) -> u32 {
        QUAD_VERTEX_COUNT
    }
}

/// Linked yin-yang program: both shader stages bound into one render pipeline.
pub struct YinYangPipeline {
    pub(crate) pipeline: wgpu::RenderPipeline,
}

impl std::fmt::Debug for YinYangPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("YinYangPipeline").finish_non_exhaustive()
    }
}

impl YinYangPipeline {
    pub(crate) fn new(
        device: &wgpu::Device,
        layouts: &PipelineLayouts,
        surface_format: wgpu::TextureFormat,
        sample_count: u32,
        sources: &ShaderSources,
    ) -> Result<Self, ShaderError> {
        let vertex_module = compile::compile_stage(device, sources, ShaderKind::Vertex)?;
        let fragment_module = compile::compile_stage(device, sources, ShaderKind::Fragment)?;

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("yinyang pipeline layout"),
            bind_group_layouts: &[&layouts.uniform_layout],
            push_constant_ranges: &[],
        });

        // Interface mismatches between the stages only show up here.
        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("yinyang pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &vertex_module,
                entry_point: Some("main"),
                buffers: &[wgpu::VertexBufferLayout {
                    array_stride: QUAD_STRIDE,
                    step_mode: wgpu::VertexStepMode::Vertex,
                    attributes: &QUAD_ATTRIBUTES,
                }],
                compilation_options: wgpu::PipelineCompilationOptions::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None,
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: sample_count,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
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
        if let Some(error) = pollster::block_on(device.pop_error_scope()) {
            return Err(ShaderError::Link {
                log: error.to_string(),
            });
        }

        Ok(Self { pipeline })
    }
}
