//! GPU side of the viewer: three pipelines (photos, particles, dimmer)
//! sharing one globals uniform. Everything drawn comes from a
//! [`FrameSnapshot`]; the renderer holds no gallery state of its own.

use std::borrow::Cow;

use bytemuck::{Pod, Zeroable};
use tracing::debug;
use wgpu::util::DeviceExt;

use crate::events::LoadedImage;
use crate::gallery::scene::{FrameSnapshot, ParticleField};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;
const SHADER: &str = include_str!("../shaders/gallery.wgsl");

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct QuadVertex {
    pos: [f32; 2],
    uv: [f32; 2],
}

impl QuadVertex {
    fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        const ATTRS: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<QuadVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRS,
        }
    }
}

// Unit plane centred on the origin, facing +Z; image row 0 at the top.
const QUAD: [QuadVertex; 4] = [
    QuadVertex {
        pos: [-0.5, -0.5],
        uv: [0.0, 1.0],
    },
    QuadVertex {
        pos: [0.5, -0.5],
        uv: [1.0, 1.0],
    },
    QuadVertex {
        pos: [-0.5, 0.5],
        uv: [0.0, 0.0],
    },
    QuadVertex {
        pos: [0.5, 0.5],
        uv: [1.0, 0.0],
    },
];

fn particle_layout<'a>() -> wgpu::VertexBufferLayout<'a> {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x3];
    wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<[f32; 3]>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Instance,
        attributes: &ATTRS,
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4],
    camera: [f32; 4],
    fog_ambient: [f32; 4],
    spot_pos: [f32; 4],
    spot_dir: [f32; 4],
    spot_cone: [f32; 4],
    point_pos: [f32; 4],
    point_color: [f32; 4],
    particles: [f32; 4],
}

impl Globals {
    fn from_snapshot(frame: &FrameSnapshot) -> Self {
        let lighting = &frame.lighting;
        let spot = &lighting.spot;
        let spot_dir = (spot.target - spot.position).normalize_or_zero();
        let inner = spot.angle * (1.0 - spot.penumbra);
        let point = &lighting.point;
        Self {
            view_proj: frame.view_proj.to_cols_array_2d(),
            camera: frame.camera_position.extend(frame.fog.density).to_array(),
            fog_ambient: frame.fog.color.extend(lighting.ambient).to_array(),
            spot_pos: spot.position.extend(spot.intensity).to_array(),
            spot_dir: spot_dir.extend(spot.angle.cos()).to_array(),
            spot_cone: [inner.cos(), 0.0, 0.0, 0.0],
            point_pos: point.position.extend(point.intensity).to_array(),
            point_color: point.color.extend(1.0).to_array(),
            particles: [
                frame.particles.rotation,
                frame.particles.size,
                frame.particles.opacity,
                0.0,
            ],
        }
    }
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct PhotoUniform {
    model: [[f32; 4]; 4],
    params: [f32; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Pod, Zeroable)]
struct DimmerUniform {
    model: [[f32; 4]; 4],
    color: [f32; 4],
}

struct PhotoGpu {
    uniform: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct ParticleGpu {
    buffer: wgpu::Buffer,
    count: u32,
}

pub struct Renderer {
    globals: wgpu::Buffer,
    globals_bind: wgpu::BindGroup,
    photo_layout: wgpu::BindGroupLayout,
    sampler: wgpu::Sampler,
    quad: wgpu::Buffer,
    photo_pipeline: wgpu::RenderPipeline,
    particle_pipeline: wgpu::RenderPipeline,
    dimmer_pipeline: wgpu::RenderPipeline,
    dimmer_uniform: wgpu::Buffer,
    dimmer_bind: wgpu::BindGroup,
    photos: Vec<PhotoGpu>,
    particles: Option<ParticleGpu>,
    depth: wgpu::TextureView,
}

fn uniform_entry(binding: u32, visibility: wgpu::ShaderStages) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn depth_state(write: bool) -> wgpu::DepthStencilState {
    wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: write,
        depth_compare: wgpu::CompareFunction::Less,
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    }
}

const ADDITIVE: wgpu::BlendState = wgpu::BlendState {
    color: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::SrcAlpha,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
    alpha: wgpu::BlendComponent {
        src_factor: wgpu::BlendFactor::Zero,
        dst_factor: wgpu::BlendFactor::One,
        operation: wgpu::BlendOperation::Add,
    },
};

struct PipelineSpec<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    vs: &'a str,
    fs: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    blend: wgpu::BlendState,
    depth_write: bool,
}

fn create_pipeline(
    device: &wgpu::Device,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    spec: PipelineSpec<'_>,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(spec.label),
        layout: Some(spec.layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some(spec.vs),
            buffers: spec.buffers,
            compilation_options: Default::default(),
        },
        primitive: wgpu::PrimitiveState {
            topology: spec.topology,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            ..Default::default()
        },
        depth_stencil: Some(depth_state(spec.depth_write)),
        multisample: wgpu::MultisampleState::default(),
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(spec.fs),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(spec.blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        multiview: None,
        cache: None,
    })
}

fn create_depth(device: &wgpu::Device, width: u32, height: u32) -> wgpu::TextureView {
    let tex = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("gallery-depth"),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    tex.create_view(&wgpu::TextureViewDescriptor::default())
}

fn upload_texture(device: &wgpu::Device, queue: &wgpu::Queue, image: &LoadedImage) -> wgpu::TextureView {
    let size = wgpu::Extent3d {
        width: image.width,
        height: image.height,
        depth_or_array_layers: 1,
    };
    let tex = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("photo"),
        size,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        tex.as_image_copy(),
        &image.pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * image.width),
            rows_per_image: Some(image.height),
        },
        size,
    );
    tex.create_view(&wgpu::TextureViewDescriptor::default())
}

impl Renderer {
    pub fn new(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("gallery-shader"),
            source: wgpu::ShaderSource::Wgsl(Cow::Borrowed(SHADER)),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gallery-globals-layout"),
            entries: &[uniform_entry(
                0,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });
        let photo_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gallery-photo-layout"),
            entries: &[
                uniform_entry(0, wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT),
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
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });
        let dimmer_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("gallery-dimmer-layout"),
            entries: &[uniform_entry(
                3,
                wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
            )],
        });

        let globals = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gallery-globals"),
            size: std::mem::size_of::<Globals>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let globals_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gallery-globals"),
            layout: &globals_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals.as_entire_binding(),
            }],
        });

        let dimmer_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("gallery-dimmer"),
            size: std::mem::size_of::<DimmerUniform>() as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let dimmer_bind = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("gallery-dimmer"),
            layout: &dimmer_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 3,
                resource: dimmer_uniform.as_entire_binding(),
            }],
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("photo-sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let quad = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gallery-quad"),
            contents: bytemuck::cast_slice(&QUAD),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let photo_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gallery-photo-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &photo_layout],
            push_constant_ranges: &[],
        });
        let particle_pipeline_layout =
            device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("gallery-particle-pipeline-layout"),
                bind_group_layouts: &[&globals_layout],
                push_constant_ranges: &[],
            });
        let dimmer_pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("gallery-dimmer-pipeline-layout"),
            bind_group_layouts: &[&globals_layout, &dimmer_layout],
            push_constant_ranges: &[],
        });

        let photo_pipeline = create_pipeline(
            device,
            &shader,
            format,
            PipelineSpec {
                label: "gallery-photos",
                layout: &photo_pipeline_layout,
                vs: "vs_photo",
                fs: "fs_photo",
                buffers: &[QuadVertex::layout()],
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                blend: wgpu::BlendState::REPLACE,
                depth_write: true,
            },
        );
        let particle_pipeline = create_pipeline(
            device,
            &shader,
            format,
            PipelineSpec {
                label: "gallery-particles",
                layout: &particle_pipeline_layout,
                vs: "vs_particle",
                fs: "fs_particle",
                buffers: &[particle_layout()],
                topology: wgpu::PrimitiveTopology::TriangleList,
                blend: ADDITIVE,
                depth_write: false,
            },
        );
        let dimmer_pipeline = create_pipeline(
            device,
            &shader,
            format,
            PipelineSpec {
                label: "gallery-dimmer",
                layout: &dimmer_pipeline_layout,
                vs: "vs_dimmer",
                fs: "fs_dimmer",
                buffers: &[QuadVertex::layout()],
                topology: wgpu::PrimitiveTopology::TriangleStrip,
                blend: wgpu::BlendState::ALPHA_BLENDING,
                depth_write: false,
            },
        );

        Self {
            globals,
            globals_bind,
            photo_layout,
            sampler,
            quad,
            photo_pipeline,
            particle_pipeline,
            dimmer_pipeline,
            dimmer_uniform,
            dimmer_bind,
            photos: Vec::new(),
            particles: None,
            depth: create_depth(device, width, height),
        }
    }

    pub fn resize(&mut self, device: &wgpu::Device, width: u32, height: u32) {
        self.depth = create_depth(device, width, height);
    }

    /// Replace every photo texture. Indices follow `images`.
    pub fn upload_gallery(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, images: &[LoadedImage]) {
        self.photos = images
            .iter()
            .map(|image| {
                let view = upload_texture(device, queue, image);
                let uniform = device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some("photo-uniform"),
                    size: std::mem::size_of::<PhotoUniform>() as wgpu::BufferAddress,
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                });
                let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some("photo"),
                    layout: &self.photo_layout,
                    entries: &[
                        wgpu::BindGroupEntry {
                            binding: 0,
                            resource: uniform.as_entire_binding(),
                        },
                        wgpu::BindGroupEntry {
                            binding: 1,
                            resource: wgpu::BindingResource::TextureView(&view),
                        },
                        wgpu::BindGroupEntry {
                            binding: 2,
                            resource: wgpu::BindingResource::Sampler(&self.sampler),
                        },
                    ],
                });
                PhotoGpu {
                    uniform,
                    bind_group,
                }
            })
            .collect();
        debug!(count = self.photos.len(), "photo textures uploaded");
    }

    pub fn upload_particles(&mut self, device: &wgpu::Device, field: &ParticleField) {
        if field.is_empty() {
            self.particles = None;
            return;
        }
        let buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("gallery-particles"),
            contents: bytemuck::cast_slice(field.points()),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.particles = Some(ParticleGpu {
            buffer,
            count: field.len() as u32,
        });
    }

    pub fn render(
        &self,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        frame: &FrameSnapshot,
    ) {
        queue.write_buffer(
            &self.globals,
            0,
            bytemuck::bytes_of(&Globals::from_snapshot(frame)),
        );
        for instance in &frame.photos {
            if let Some(gpu) = self.photos.get(instance.index) {
                let uniform = PhotoUniform {
                    model: instance.model.to_cols_array_2d(),
                    params: [
                        instance.size.x,
                        instance.size.y,
                        if instance.lit { 1.0 } else { 0.0 },
                        0.0,
                    ],
                };
                queue.write_buffer(&gpu.uniform, 0, bytemuck::bytes_of(&uniform));
            }
        }
        if frame.dimmer.visible {
            let uniform = DimmerUniform {
                model: frame.dimmer.model.to_cols_array_2d(),
                color: [0.0, 0.0, 0.0, frame.dimmer.opacity],
            };
            queue.write_buffer(&self.dimmer_uniform, 0, bytemuck::bytes_of(&uniform));
        }

        let fog = frame.fog.color;
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("gallery"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: f64::from(fog.x),
                        g: f64::from(fog.y),
                        b: f64::from(fog.z),
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Discard,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_bind_group(0, &self.globals_bind, &[]);

        pass.set_pipeline(&self.photo_pipeline);
        pass.set_vertex_buffer(0, self.quad.slice(..));
        for instance in &frame.photos {
            if let Some(gpu) = self.photos.get(instance.index) {
                pass.set_bind_group(1, &gpu.bind_group, &[]);
                pass.draw(0..4, 0..1);
            }
        }

        if let Some(particles) = &self.particles {
            pass.set_pipeline(&self.particle_pipeline);
            pass.set_vertex_buffer(0, particles.buffer.slice(..));
            pass.draw(0..6, 0..particles.count);
        }

        if frame.dimmer.visible {
            pass.set_pipeline(&self.dimmer_pipeline);
            pass.set_bind_group(1, &self.dimmer_bind, &[]);
            pass.set_vertex_buffer(0, self.quad.slice(..));
            pass.draw(0..4, 0..1);
        }
    }
}
