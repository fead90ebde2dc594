use anyhow::Result;
use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use tracing::{debug, warn};
use winit::dpi::PhysicalSize;

use crate::compile::{self, ShaderError, ShaderSources};
use crate::engine::{DrawCall, FrameError, GpuBackend};
use crate::types::RendererConfig;
use crate::viewport::Viewport;

use super::context::GpuContext;
use super::pipeline::{PipelineLayouts, YinYangPipeline};
use super::uniforms::YinYangUniforms;

/// `wgpu` implementation of [`GpuBackend`] bound to one window surface.
pub(crate) struct GpuState {
    context: GpuContext,
    layouts: PipelineLayouts,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    uniforms: YinYangUniforms,
    multisample_target: Option<MultisampleTarget>,
}

struct MultisampleTarget {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

impl MultisampleTarget {
    fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        size: PhysicalSize<u32>,
        sample_count: u32,
    ) -> Self {
        let extent = wgpu::Extent3d {
            width: size.width.max(1),
            height: size.height.max(1),
            depth_or_array_layers: 1,
        };
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("msaa color target"),
            size: extent,
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            _texture: texture,
            view,
        }
    }
}

impl GpuState {
    pub(crate) fn new<T>(
        target: T,
        initial_size: PhysicalSize<u32>,
        config: &RendererConfig,
    ) -> Result<Self>
    where
        T: HasDisplayHandle + HasWindowHandle + Send + Sync + 'static,
    {
        let context = GpuContext::new(
            target,
            initial_size,
            config.antialiasing,
            config.color_space,
            config.gpu_power,
        )?;
        let layouts = PipelineLayouts::new(&context.device);

        let uniforms = YinYangUniforms::default();
        let uniform_buffer = context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("yinyang uniforms"),
            size: std::mem::size_of::<YinYangUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let uniform_bind_group = context
            .device
            .create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("yinyang uniform bind group"),
                layout: &layouts.uniform_layout,
                entries: &[wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                }],
            });

        let multisample_target = (context.sample_count > 1).then(|| {
            MultisampleTarget::new(
                &context.device,
                context.surface_format,
                context.size,
                context.sample_count,
            )
        });

        Ok(Self {
            context,
            layouts,
            uniform_buffer,
            uniform_bind_group,
            uniforms,
            multisample_target,
        })
    }

    fn surface_error(&self, err: wgpu::SurfaceError) -> FrameError {
        match err {
            wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => {
                debug!(error = ?err, "surface out of date; reconfiguring");
                self.context.reconfigure();
                FrameError::Retry(err.to_string())
            }
            wgpu::SurfaceError::Timeout => {
                warn!("surface timeout; skipping frame");
                FrameError::Skip(err.to_string())
            }
            wgpu::SurfaceError::OutOfMemory => FrameError::Fatal(err.to_string()),
            other => {
                warn!(error = ?other, "surface error; skipping frame");
                FrameError::Skip(other.to_string())
            }
        }
    }
}

impl GpuBackend for GpuState {
    type Program = YinYangPipeline;

    fn shader_compiler_supported(&mut self) -> bool {
        compile::probe_shader_compiler(&self.context.device)
    }

    fn build_program(&mut self, sources: &ShaderSources) -> Result<YinYangPipeline, ShaderError> {
        YinYangPipeline::new(
            &self.context.device,
            &self.layouts,
            self.context.surface_format,
            self.context.sample_count,
            sources,
        )
    }

    fn resize(&mut self, viewport: Viewport) {
        let size = PhysicalSize::new(viewport.width(), viewport.height());
        if !self.context.resize(size) {
            return;
        }
        if self.context.sample_count > 1 {
            self.multisample_target = Some(MultisampleTarget::new(
                &self.context.device,
                self.context.surface_format,
                size,
                self.context.sample_count,
            ));
        }
    }

    fn present(&mut self, draw: Option<DrawCall<'_, YinYangPipeline>>) -> Result<(), FrameError> {
        let frame = match self.context.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(err) => return Err(self.surface_error(err)),
        };
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        if let Some(call) = &draw {
            self.uniforms = YinYangUniforms::new(&call.params);
            self.context.queue.write_buffer(
                &self.uniform_buffer,
                0,
                bytemuck::bytes_of(&self.uniforms),
            );
        }

        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("yinyang encoder"),
                });
        {
            let (attachment_view, resolve_target) = match self.multisample_target.as_ref() {
                Some(msaa) => (&msaa.view, Some(&view)),
                None => (&view, None),
            };
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("yinyang pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: attachment_view,
                    depth_slice: None,
                    resolve_target,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });

            if let Some(call) = draw {
                pass.set_pipeline(&call.program.pipeline);
                pass.set_bind_group(0, &self.uniform_bind_group, &[]);
                pass.set_vertex_buffer(0, self.layouts.quad.slice(..));
                pass.draw(0..self.layouts.vertex_count(), 0..1);
            }
        }

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
