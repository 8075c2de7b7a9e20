// SPDX-License-Identifier: GPL-3.0-only

//! GPU display backend
//!
//! Draws into an offscreen RGBA target that stands in for the window surface.
//! Shader and pipeline validation failures are caught through error scopes so
//! they can be reported as renderer errors instead of device panics.

use super::backend::{GraphicsBackend, IDENTITY, Mat4};
use crate::constants::quad;
use crate::errors::RenderError;
use crate::gpu;
use std::sync::Arc;
use tracing::{debug, info, warn};
use wgpu::util::DeviceExt;

const SHADER_SOURCE: &str = include_str!("quad.wgsl");

const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

const POSITION_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 0,
}];

const TEX_COORD_ATTRIBUTES: [wgpu::VertexAttribute; 1] = [wgpu::VertexAttribute {
    format: wgpu::VertexFormat::Float32x2,
    offset: 0,
    shader_location: 1,
}];

/// Uniform block matching `Transforms` in quad.wgsl
#[repr(C)]
#[derive(Debug, Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Transforms {
    mvp: Mat4,
    tex: Mat4,
}

/// Linked program and everything bound alongside it
struct Program {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    uniform_buffer: wgpu::Buffer,
    positions: wgpu::Buffer,
    tex_coords: wgpu::Buffer,
}

struct FrameTexture {
    texture: wgpu::Texture,
    bind_group: wgpu::BindGroup,
    width: u32,
    height: u32,
}

pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    adapter_name: String,
    target_view: wgpu::TextureView,
    program: Option<Program>,
    frame_texture: Option<FrameTexture>,
    transforms: Transforms,
    encoder: Option<wgpu::CommandEncoder>,
    drew_quad: bool,
}

impl WgpuBackend {
    /// Create a GPU device and an offscreen target of `width` x `height`
    pub fn create(width: u32, height: u32) -> Result<Self, RenderError> {
        let (device, queue, info) = pollster::block_on(gpu::create_render_device("edgecam display"))
            .map_err(RenderError::AdapterUnavailable)?;
        info!(adapter = %info.adapter_name, backend = ?info.backend, width, height, "GPU display backend created");
        Self::with_device(device, queue, info.adapter_name, width, height)
    }

    /// Use an existing device
    pub fn with_device(
        device: Arc<wgpu::Device>,
        queue: Arc<wgpu::Queue>,
        adapter_name: String,
        width: u32,
        height: u32,
    ) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::DeviceCreation(format!(
                "render target {}x{} is empty",
                width, height
            )));
        }

        let target = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("edgecam display target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let target_view = target.create_view(&wgpu::TextureViewDescriptor::default());

        Ok(Self {
            device,
            queue,
            adapter_name,
            target_view,
            program: None,
            frame_texture: None,
            transforms: Transforms {
                mvp: IDENTITY,
                tex: IDENTITY,
            },
            encoder: None,
            drew_quad: false,
        })
    }

    pub fn adapter_name(&self) -> &str {
        &self.adapter_name
    }

    /// Wait for validation errors raised since the matching push
    fn pop_validation_error(&self) -> Option<String> {
        pollster::block_on(self.device.pop_error_scope()).map(|e| e.to_string())
    }

    fn link_program(&self, shader: &wgpu::ShaderModule) -> Program {
        let device = &self.device;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("edgecam quad bind group layout"),
            entries: &[
                // Transforms (mvp + texture matrix)
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // Frame texture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                // Sampler
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("edgecam quad pipeline layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("edgecam quad pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: shader,
                entry_point: Some("vs_main"),
                buffers: &[
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &POSITION_ATTRIBUTES,
                    },
                    wgpu::VertexBufferLayout {
                        array_stride: std::mem::size_of::<[f32; 2]>() as wgpu::BufferAddress,
                        step_mode: wgpu::VertexStepMode::Vertex,
                        attributes: &TEX_COORD_ATTRIBUTES,
                    },
                ],
                compilation_options: Default::default(),
            },
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                ..Default::default()
            },
            depth_stencil: None,
            multisample: wgpu::MultisampleState {
                count: 1,
                mask: !0,
                alpha_to_coverage_enabled: false,
            },
            fragment: Some(wgpu::FragmentState {
                module: shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: TARGET_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            multiview: None,
            cache: None,
        });

        // Linear filtering, clamped at the edges
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("edgecam frame sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let uniform_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("edgecam transforms"),
            contents: bytemuck::bytes_of(&self.transforms),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let positions = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("edgecam quad positions"),
            contents: bytemuck::cast_slice(&quad::POSITIONS),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let tex_coords = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("edgecam quad texture coordinates"),
            contents: bytemuck::cast_slice(&quad::TEX_COORDS),
            usage: wgpu::BufferUsages::VERTEX,
        });

        Program {
            pipeline,
            bind_group_layout,
            sampler,
            uniform_buffer,
            positions,
            tex_coords,
        }
    }

    fn create_frame_texture(&self, program: &Program, width: u32, height: u32) -> FrameTexture {
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("edgecam frame texture"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());

        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("edgecam quad bind group"),
            layout: &program.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: program.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&program.sampler),
                },
            ],
        });

        debug!(width, height, "Allocated frame texture");
        FrameTexture {
            texture,
            bind_group,
            width,
            height,
        }
    }

    fn encoder(&mut self) -> &mut wgpu::CommandEncoder {
        let device = &self.device;
        self.encoder.get_or_insert_with(|| {
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("edgecam frame encoder"),
            })
        })
    }
}

impl GraphicsBackend for WgpuBackend {
    fn name(&self) -> &'static str {
        "wgpu"
    }

    fn init(&mut self) -> Result<(), RenderError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let shader = self
            .device
            .create_shader_module(wgpu::ShaderModuleDescriptor {
                label: Some("edgecam quad shader"),
                source: wgpu::ShaderSource::Wgsl(SHADER_SOURCE.into()),
            });
        if let Some(e) = self.pop_validation_error() {
            return Err(RenderError::ShaderCompilation(e));
        }

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let program = self.link_program(&shader);
        if let Some(e) = self.pop_validation_error() {
            return Err(RenderError::ProgramLink(e));
        }

        // Start with a 1x1 texture; the first upload sizes it
        let frame_texture = self.create_frame_texture(&program, 1, 1);
        self.frame_texture = Some(frame_texture);
        self.program = Some(program);
        info!(adapter = %self.adapter_name, "Display program linked");
        Ok(())
    }

    fn set_projection(&mut self, mvp: Mat4) {
        self.transforms.mvp = mvp;
        if let Some(program) = &self.program {
            self.queue.write_buffer(
                &program.uniform_buffer,
                0,
                bytemuck::bytes_of(&self.transforms),
            );
        }
    }

    fn begin_frame(&mut self) {
        if self.encoder.is_some() {
            warn!("Previous frame was never finished, discarding it");
            self.encoder = None;
        }
        self.drew_quad = false;
        self.encoder();
    }

    fn upload_texture(
        &mut self,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), RenderError> {
        let expected = width as usize * height as usize * 4;
        if width == 0 || height == 0 || rgba.len() < expected {
            return Err(RenderError::InvalidFrame(format!(
                "{}x{} upload with {} bytes",
                width,
                height,
                rgba.len()
            )));
        }
        let program = self.program.as_ref().ok_or(RenderError::SurfaceLost)?;
        if self.frame_texture.is_none() {
            return Err(RenderError::SurfaceLost);
        }

        let needs_resize = self
            .frame_texture
            .as_ref()
            .is_some_and(|t| t.width != width || t.height != height);
        if needs_resize {
            let resized = self.create_frame_texture(program, width, height);
            self.frame_texture = Some(resized);
        }

        let Some(frame_texture) = &self.frame_texture else {
            return Err(RenderError::SurfaceLost);
        };
        self.queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &frame_texture.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba[..expected],
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(4 * width),
                rows_per_image: Some(height),
            },
            wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
        );
        Ok(())
    }

    fn draw_quad(&mut self) -> Result<(), RenderError> {
        let (Some(program), Some(frame_texture)) = (&self.program, &self.frame_texture) else {
            return Err(RenderError::SurfaceLost);
        };
        let Some(encoder) = self.encoder.as_mut() else {
            return Err(RenderError::InvalidFrame("draw outside a frame".to_string()));
        };

        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("edgecam quad pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_pipeline(&program.pipeline);
            pass.set_bind_group(0, &frame_texture.bind_group, &[]);
            pass.set_vertex_buffer(0, program.positions.slice(..));
            pass.set_vertex_buffer(1, program.tex_coords.slice(..));
            pass.draw(0..quad::VERTEX_COUNT, 0..1);
        }
        self.drew_quad = true;
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), RenderError> {
        let Some(mut encoder) = self.encoder.take() else {
            return Err(RenderError::InvalidFrame("no frame in progress".to_string()));
        };

        if !self.drew_quad {
            // Clear-only pass
            let _pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("edgecam clear pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &self.target_view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });
        }

        self.queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    fn release_texture(&mut self) {
        if let Some(frame_texture) = self.frame_texture.take() {
            frame_texture.texture.destroy();
            debug!("Frame texture released");
        }
        self.encoder = None;
    }
}
