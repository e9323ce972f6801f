use std::num::NonZeroU64;

use thiserror::Error;
use wgpu::util::DeviceExt;

use super::uniforms::{body_colors, pack_strided, BodyColorUniform, ModelViewProjectionUniform};
use crate::{
    body::BodyMetadata,
    camera::Camera,
    error::DeviceError,
    gpu::GpuContext,
    physics::{ComputeBackend, GpuBackend},
};

const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.0,
    g: 0.82,
    b: 0.8,
    a: 1.0,
};
const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const POSITION_STRIDE: u64 = 3 * 4;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error(transparent)]
    Surface(#[from] wgpu::SurfaceError),
    #[error(transparent)]
    Device(#[from] DeviceError),
}

/// What to draw this frame.
pub struct Scene<'a> {
    pub backend: &'a mut GpuBackend,
    pub metadata: &'a [BodyMetadata],
    pub selection: Option<usize>,
}

struct ColorSlots {
    buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
    stride: u64,
    current: Vec<BodyColorUniform>,
}

pub struct Renderer {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    render_pipeline: wgpu::RenderPipeline,
    depth_view: wgpu::TextureView,
    mvp_buffer: wgpu::Buffer,
    mvp_bind_group: wgpu::BindGroup,
    color_layout: wgpu::BindGroupLayout,
    colors: Option<ColorSlots>,
}

impl Renderer {
    pub fn new(
        surface: wgpu::Surface<'static>,
        gpu: &GpuContext,
        size: winit::dpi::PhysicalSize<u32>,
        camera: &Camera,
    ) -> Self {
        let config = Self::create_surface_config(&surface, gpu, size);
        surface.configure(&gpu.device, &config);
        let depth_view = Self::create_depth_view(gpu, &config);

        let mvp_buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("MVP Buffer"),
            contents: bytemuck::bytes_of(&ModelViewProjectionUniform::new(camera.mvp_cols())),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let mvp_layout = Self::create_uniform_layout(gpu, "MVP Bind Group Layout", false);
        let color_layout = Self::create_uniform_layout(gpu, "Color Bind Group Layout", true);
        let mvp_bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("MVP Bind Group"),
            layout: &mvp_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: mvp_buffer.as_entire_binding(),
            }],
        });

        let shader = gpu.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Sphere Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../shaders/spheres.wgsl").into()),
        });
        let render_pipeline =
            Self::create_render_pipeline(gpu, &shader, &[&mvp_layout, &color_layout], config.format);

        Self {
            surface,
            config,
            render_pipeline,
            depth_view,
            mvp_buffer,
            mvp_bind_group,
            color_layout,
            colors: None,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    pub fn resize(&mut self, gpu: &GpuContext, new_size: winit::dpi::PhysicalSize<u32>, camera: &Camera) {
        if new_size.width > 0 && new_size.height > 0 {
            self.config.width = new_size.width;
            self.config.height = new_size.height;
            self.surface.configure(&gpu.device, &self.config);
            self.depth_view = Self::create_depth_view(gpu, &self.config);
            self.update_camera(gpu, camera);
        }
    }

    pub fn update_camera(&self, gpu: &GpuContext, camera: &Camera) {
        let uniform = ModelViewProjectionUniform::new(camera.mvp_cols());
        gpu.queue.write_buffer(&self.mvp_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    /// Draws every body as one indexed draw, or just clears without a scene.
    pub fn render(&mut self, gpu: &GpuContext, scene: Option<Scene<'_>>) -> Result<(), RenderError> {
        if let Some(scene) = &scene {
            self.update_colors(gpu, scene.metadata, scene.selection);
        }

        let output = self.surface.get_current_texture()?;
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder = gpu.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        match scene {
            Some(scene) => {
                let body_count = scene.metadata.len().max(1) as u32;
                let indices_per_body = scene.backend.index_count() / body_count;
                {
                    let buffers = scene.backend.graphics_view()?;
                    let mut render_pass = self.begin_pass(&mut encoder, &view);
                    if let Some(colors) = &self.colors {
                        render_pass.set_pipeline(&self.render_pipeline);
                        render_pass.set_bind_group(0, &self.mvp_bind_group, &[]);
                        render_pass.set_vertex_buffer(0, buffers.vertices.slice(..));
                        render_pass.set_vertex_buffer(1, buffers.normals.slice(..));
                        render_pass.set_index_buffer(buffers.indices.slice(..), wgpu::IndexFormat::Uint32);

                        for body in 0..scene.backend.body_count() as u32 {
                            let offset = (body as u64 * colors.stride) as wgpu::DynamicOffset;
                            render_pass.set_bind_group(1, &colors.bind_group, &[offset]);
                            let start = body * indices_per_body;
                            render_pass.draw_indexed(start..start + indices_per_body, 0, 0..1);
                        }
                    }
                }
                let submission = gpu.queue.submit(Some(encoder.finish()));
                scene.backend.record_graphics_submission(submission);
            }
            None => {
                drop(self.begin_pass(&mut encoder, &view));
                gpu.queue.submit(Some(encoder.finish()));
            }
        }

        output.present();
        Ok(())
    }

    fn begin_pass<'a>(
        &'a self,
        encoder: &'a mut wgpu::CommandEncoder,
        view: &'a wgpu::TextureView,
    ) -> wgpu::RenderPass<'a> {
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Render Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        })
    }

    fn update_colors(&mut self, gpu: &GpuContext, metadata: &[BodyMetadata], selection: Option<usize>) {
        let colors = body_colors(metadata, selection);
        let reusable = matches!(&self.colors, Some(slots) if slots.current.len() == colors.len());
        if !reusable {
            self.colors = Some(self.create_color_slots(gpu, colors));
            return;
        }

        if let Some(slots) = &mut self.colors {
            if slots.current != colors {
                gpu.queue.write_buffer(&slots.buffer, 0, &pack_strided(&colors, slots.stride as usize));
                slots.current = colors;
            }
        }
    }

    fn create_color_slots(&self, gpu: &GpuContext, colors: Vec<BodyColorUniform>) -> ColorSlots {
        let color_size = std::mem::size_of::<BodyColorUniform>() as u64;
        let alignment = gpu.device.limits().min_uniform_buffer_offset_alignment as u64;
        let stride = color_size.div_ceil(alignment) * alignment;

        let buffer = gpu.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Body Color Buffer"),
            contents: &pack_strided(&colors, stride as usize),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Body Color Bind Group"),
            layout: &self.color_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: NonZeroU64::new(color_size),
                }),
            }],
        });

        ColorSlots {
            buffer,
            bind_group,
            stride,
            current: colors,
        }
    }

    fn create_surface_config(
        surface: &wgpu::Surface,
        gpu: &GpuContext,
        size: winit::dpi::PhysicalSize<u32>,
    ) -> wgpu::SurfaceConfiguration {
        let surface_caps = surface.get_capabilities(&gpu.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .unwrap_or(wgpu::TextureFormat::Bgra8UnormSrgb);
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: wgpu::PresentMode::Fifo,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        }
    }

    fn create_depth_view(gpu: &GpuContext, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
        let texture = gpu.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: config.width,
                height: config.height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    fn create_uniform_layout(gpu: &GpuContext, label: &str, dynamic: bool) -> wgpu::BindGroupLayout {
        gpu.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(label),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: dynamic,
                    min_binding_size: None,
                },
                count: None,
            }],
        })
    }

    fn create_render_pipeline(
        gpu: &GpuContext,
        shader: &wgpu::ShaderModule,
        bind_group_layouts: &[&wgpu::BindGroupLayout],
        surface_format: wgpu::TextureFormat,
    ) -> wgpu::RenderPipeline {
        let pipeline_layout = gpu.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Sphere Pipeline Layout"),
            bind_group_layouts,
            push_constant_ranges: &[],
        });

        gpu.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Sphere Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: "vs_main",
                buffers: &[
                    Self::vec3_buffer_layout(&Self::IN_COORDS),
                    Self::vec3_buffer_layout(&Self::IN_NORMALS),
                ],
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: surface_format,
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                strip_index_format: None,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                polygon_mode: wgpu::PolygonMode::Fill,
                unclipped_depth: false,
                conservative: false,
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        })
    }

    const IN_COORDS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    const IN_NORMALS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Float32x3];

    fn vec3_buffer_layout(attributes: &'static [wgpu::VertexAttribute]) -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: POSITION_STRIDE,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes,
        }
    }
}
