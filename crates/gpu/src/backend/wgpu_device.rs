//! [`Device`] implementation on top of `wgpu`.
//!
//! Kernels are written against GL conventions, so this backend adapts:
//!
//! * clip space, through the `device_clip` uniform every module reads in
//!   `to_clip`: depth is remapped from `-1..1` to `0..1`, and offscreen
//!   targets are drawn upside down so texel row 0 is the bottom row, as in GL.
//!   Offscreen pipelines flip their front face to match.
//! * viewports, which are bottom-left based.
//! * uniforms, which live in one small buffer per declaration and are
//!   written in place, so every draw is submitted right away.
//!
//! Pipelines are built lazily and cached by everything that affects them.

use std::collections::HashMap;

use wgpu::util::DeviceExt;

use crate::{
    source::{ProgramLayout, ProgramSource, SamplerDimension, Slot},
    Attribute, BufferHandle, Capabilities, ClearFlags, CullMode, DepthBufferHandle, Device, Filter,
    GpuError, Primitive, ProgramHandle, RenderState, RenderTargetBinding, TextureDescriptor,
    TextureHandle, TextureKind, TextureType, UniformLocation, UniformType, UniformUpload, Viewport,
    Wrap,
};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth24Plus;
const STAGES: wgpu::ShaderStages = wgpu::ShaderStages::VERTEX_FRAGMENT;

fn texture_format(ty: TextureType) -> wgpu::TextureFormat {
    match ty {
        TextureType::UnsignedByte => wgpu::TextureFormat::Rgba8Unorm,
        TextureType::Float => wgpu::TextureFormat::Rgba32Float,
        TextureType::HalfFloat => wgpu::TextureFormat::Rgba16Float,
    }
}

fn filter_mode(filter: Filter) -> wgpu::FilterMode {
    match filter {
        Filter::Nearest => wgpu::FilterMode::Nearest,
        Filter::Linear => wgpu::FilterMode::Linear,
    }
}

fn address_mode(wrap: Wrap) -> wgpu::AddressMode {
    match wrap {
        Wrap::ClampToEdge => wgpu::AddressMode::ClampToEdge,
        Wrap::Repeat => wgpu::AddressMode::Repeat,
    }
}

fn vertex_format(components: u32) -> wgpu::VertexFormat {
    match components {
        1 => wgpu::VertexFormat::Float32,
        2 => wgpu::VertexFormat::Float32x2,
        3 => wgpu::VertexFormat::Float32x3,
        _ => wgpu::VertexFormat::Float32x4,
    }
}

fn default_components(attribute: Attribute) -> u32 {
    match attribute {
        Attribute::TexCoord => 2,
        Attribute::Position | Attribute::Normal => 3,
        Attribute::Color => 4,
    }
}

/// Uniform bytes in WGSL uniform layout. `mat3x3` columns are padded to 16.
fn uniform_bytes(value: UniformUpload) -> Vec<u8> {
    match value {
        UniformUpload::Float(x) => bytemuck::bytes_of(&x).to_vec(),
        UniformUpload::Int(x) => bytemuck::bytes_of(&x).to_vec(),
        UniformUpload::Vec2(v) => bytemuck::cast_slice(&v).to_vec(),
        UniformUpload::Vec3(v) => bytemuck::cast_slice(&v).to_vec(),
        UniformUpload::Vec4(v) => bytemuck::cast_slice(&v).to_vec(),
        UniformUpload::Mat3(m) => {
            let padded = [m[0], m[1], m[2], 0.0, m[3], m[4], m[5], 0.0, m[6], m[7], m[8], 0.0];
            bytemuck::cast_slice(&padded).to_vec()
        }
        UniformUpload::Mat4(m) => bytemuck::cast_slice(&m).to_vec(),
    }
}

struct GpuBuffer {
    buffer: wgpu::Buffer,
}

struct GpuTexture {
    desc: TextureDescriptor,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    /// Single-level view for use as a color attachment.
    attachment: Option<wgpu::TextureView>,
    sampler: wgpu::Sampler,
    format: wgpu::TextureFormat,
}

struct Attachment {
    view: wgpu::TextureView,
    width: u32,
    height: u32,
}

struct GpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    layout: ProgramLayout,
    uniform_buffers: Vec<wgpu::Buffer>,
    /// Texture unit read by each sampler slot.
    sampler_units: Vec<u32>,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct VertexSlot {
    location: u32,
    components: u32,
    fallback: bool,
}

#[derive(Clone, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramHandle,
    color_format: wgpu::TextureFormat,
    has_depth: bool,
    offscreen: bool,
    primitive: Primitive,
    state: RenderState,
    vertex: Vec<VertexSlot>,
    unfilterable: u32,
}

struct Fallbacks {
    texture_2d: wgpu::TextureView,
    texture_cube: wgpu::TextureView,
    sampler: wgpu::Sampler,
    vertex: wgpu::Buffer,
}

struct SurfaceState {
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    frame: Option<(wgpu::SurfaceTexture, wgpu::TextureView)>,
}

/// The target a draw or clear goes to.
struct Target<'a> {
    color: &'a wgpu::TextureView,
    depth: Option<&'a wgpu::TextureView>,
    format: wgpu::TextureFormat,
    width: u32,
    height: u32,
    offscreen: bool,
}

pub struct WgpuDevice {
    name: String,
    device: wgpu::Device,
    queue: wgpu::Queue,
    capabilities: Capabilities,
    float32_filterable: bool,
    renderable: Vec<wgpu::TextureFormat>,
    surface: Option<SurfaceState>,
    /// Stands in for the window when running without a surface.
    window_target: Attachment,
    window_format: wgpu::TextureFormat,
    window_depth: Attachment,
    clip_offscreen: wgpu::Buffer,
    clip_window: wgpu::Buffer,
    fallbacks: Fallbacks,
    next_id: u32,
    buffers: HashMap<BufferHandle, GpuBuffer>,
    textures: HashMap<TextureHandle, GpuTexture>,
    depth_buffers: HashMap<DepthBufferHandle, Attachment>,
    programs: HashMap<ProgramHandle, GpuProgram>,
    layouts: HashMap<(ProgramHandle, u32), (wgpu::BindGroupLayout, wgpu::PipelineLayout)>,
    pipelines: HashMap<PipelineKey, wgpu::RenderPipeline>,
    current_program: Option<ProgramHandle>,
    render_target: Option<RenderTargetBinding>,
    units: HashMap<u32, TextureHandle>,
    attributes: HashMap<u32, (BufferHandle, u32)>,
    viewport: Viewport,
    clear_color: [f32; 4],
    state: RenderState,
}

fn attachment(device: &wgpu::Device, format: wgpu::TextureFormat, width: u32, height: u32, label: &str) -> Attachment {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d {
            width: width.max(1),
            height: height.max(1),
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    Attachment {
        view: texture.create_view(&wgpu::TextureViewDescriptor::default()),
        width: width.max(1),
        height: height.max(1),
    }
}

fn clip_buffer(device: &wgpu::Device, y_scale: f32, label: &str) -> wgpu::Buffer {
    device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
        label: Some(label),
        contents: bytemuck::cast_slice(&[y_scale, 0.5, 0.5, 0.0_f32]),
        usage: wgpu::BufferUsages::UNIFORM,
    })
}

fn fallbacks(device: &wgpu::Device) -> Fallbacks {
    let texture = |layers: u32, label: &str| {
        device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: 1,
                height: 1,
                depth_or_array_layers: layers,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8Unorm,
            usage: wgpu::TextureUsages::TEXTURE_BINDING,
            view_formats: &[],
        })
    };
    let texture_2d = texture(1, "fallback 2d").create_view(&wgpu::TextureViewDescriptor::default());
    let texture_cube = texture(6, "fallback cube").create_view(&wgpu::TextureViewDescriptor {
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });
    Fallbacks {
        texture_2d,
        texture_cube,
        sampler: device.create_sampler(&wgpu::SamplerDescriptor::default()),
        vertex: device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("fallback attribute"),
            contents: &[0u8; 16],
            usage: wgpu::BufferUsages::VERTEX,
        }),
    }
}

impl WgpuDevice {
    /// A device with no window: the default target is an offscreen texture
    /// of `width` × `height`.
    pub fn headless(width: u32, height: u32) -> Result<Self, GpuError> {
        let instance = wgpu::Instance::default();
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: None,
        }))
        .ok_or_else(|| GpuError::BackendUnavailable("no compatible adapter".to_owned()))?;
        Self::from_adapter(&adapter, None, width, height)
    }

    /// A device presenting to `surface`, which `instance` created.
    pub fn with_surface(
        instance: &wgpu::Instance,
        surface: wgpu::Surface<'static>,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            force_fallback_adapter: false,
            compatible_surface: Some(&surface),
        }))
        .ok_or_else(|| GpuError::BackendUnavailable("no adapter compatible with the window surface".to_owned()))?;
        Self::from_adapter(&adapter, Some(surface), width, height)
    }

    fn from_adapter(
        adapter: &wgpu::Adapter,
        surface: Option<wgpu::Surface<'static>>,
        width: u32,
        height: u32,
    ) -> Result<Self, GpuError> {
        let float32_filterable = adapter.features().contains(wgpu::Features::FLOAT32_FILTERABLE);
        let required_features = if float32_filterable {
            wgpu::Features::FLOAT32_FILTERABLE
        } else {
            wgpu::Features::empty()
        };
        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("water device"),
                required_features,
                required_limits: wgpu::Limits::default().using_resolution(adapter.limits()),
            },
            None,
        ))
        .map_err(|err| GpuError::BackendUnavailable(err.to_string()))?;
        device.on_uncaptured_error(Box::new(|err| tracing::error!(%err, "uncaptured wgpu error")));

        let renderable: Vec<_> = [TextureType::UnsignedByte, TextureType::Float, TextureType::HalfFloat]
            .into_iter()
            .map(texture_format)
            .filter(|format| {
                adapter
                    .get_texture_format_features(*format)
                    .allowed_usages
                    .contains(wgpu::TextureUsages::RENDER_ATTACHMENT)
            })
            .collect();

        let info = adapter.get_info();
        let name = format!("wgpu/{:?} {}", info.backend, info.name);
        let capabilities = Capabilities {
            float_textures: true,
            float_linear_filtering: float32_filterable,
            half_float_textures: true,
            half_float_linear_filtering: true,
        };
        tracing::info!(adapter = %name, ?capabilities, ?renderable, "initialised wgpu device");

        let surface = surface.map(|surface| {
            let caps = surface.get_capabilities(adapter);
            let format = caps
                .formats
                .iter()
                .copied()
                .find(|f| !f.is_srgb())
                .unwrap_or(wgpu::TextureFormat::Bgra8Unorm);
            let config = wgpu::SurfaceConfiguration {
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                format,
                width: width.max(1),
                height: height.max(1),
                desired_maximum_frame_latency: 2,
                present_mode: wgpu::PresentMode::Fifo,
                alpha_mode: caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
                view_formats: vec![],
            };
            surface.configure(&device, &config);
            SurfaceState {
                surface,
                config,
                frame: None,
            }
        });
        let window_format = surface
            .as_ref()
            .map_or(wgpu::TextureFormat::Rgba8Unorm, |s| s.config.format);

        Ok(Self {
            name,
            window_target: attachment(&device, wgpu::TextureFormat::Rgba8Unorm, width, height, "window"),
            window_format,
            window_depth: attachment(&device, DEPTH_FORMAT, width, height, "window depth"),
            clip_offscreen: clip_buffer(&device, -1.0, "offscreen clip"),
            clip_window: clip_buffer(&device, 1.0, "window clip"),
            fallbacks: fallbacks(&device),
            device,
            queue,
            capabilities,
            float32_filterable,
            renderable,
            surface,
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            depth_buffers: HashMap::new(),
            programs: HashMap::new(),
            layouts: HashMap::new(),
            pipelines: HashMap::new(),
            current_program: None,
            render_target: None,
            units: HashMap::new(),
            attributes: HashMap::new(),
            viewport: Viewport::new(0, 0, width, height),
            clear_color: [0.0, 0.0, 0.0, 1.0],
            state: RenderState::default(),
        })
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn filterable(&self, format: wgpu::TextureFormat) -> bool {
        format != wgpu::TextureFormat::Rgba32Float || self.float32_filterable
    }

    /// Texture bound to the unit a sampler slot reads, if it has the right
    /// dimension.
    fn sampled_texture(&self, program: &GpuProgram, sampler: usize) -> Option<&GpuTexture> {
        let unit = program.sampler_units.get(sampler)?;
        let texture = self.textures.get(self.units.get(unit)?)?;
        let expected = match program.layout.samplers.get(sampler)?.dimension {
            SamplerDimension::D2 => TextureKind::D2,
            SamplerDimension::Cube => TextureKind::Cube,
        };
        (texture.desc.kind == expected).then_some(texture)
    }

    fn unfilterable_mask(&self, program: &GpuProgram) -> u32 {
        (0..program.layout.samplers.len())
            .filter(|&i| self.sampled_texture(program, i).is_some_and(|t| !self.filterable(t.format)))
            .fold(0, |mask, i| mask | (1 << i))
    }

    fn ensure_frame(&mut self) -> Result<(), GpuError> {
        if self.render_target.is_some() {
            return Ok(());
        }
        let Some(state) = &mut self.surface else {
            return Ok(());
        };
        if state.frame.is_some() {
            return Ok(());
        }
        let texture = match state.surface.get_current_texture() {
            Ok(texture) => texture,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                tracing::warn!("surface lost, reconfiguring");
                state.surface.configure(&self.device, &state.config);
                state
                    .surface
                    .get_current_texture()
                    .map_err(|err| GpuError::Surface(err.to_string()))?
            }
            Err(err) => return Err(GpuError::Surface(err.to_string())),
        };
        let view = texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        state.frame = Some((texture, view));
        Ok(())
    }

    fn target(&self) -> Result<Target<'_>, GpuError> {
        if let Some(binding) = self.render_target {
            let texture = self.textures.get(&binding.color).ok_or(GpuError::InvalidHandle)?;
            let depth = self.depth_buffers.get(&binding.depth).ok_or(GpuError::InvalidHandle)?;
            return Ok(Target {
                color: texture.attachment.as_ref().ok_or(GpuError::IncompleteRenderTarget)?,
                depth: Some(&depth.view),
                format: texture.format,
                width: texture.desc.width,
                height: texture.desc.height,
                offscreen: true,
            });
        }
        let color = match &self.surface {
            Some(SurfaceState {
                frame: Some((_, view)), ..
            }) => view,
            Some(_) => return Err(GpuError::Surface("no frame acquired".to_owned())),
            None => &self.window_target.view,
        };
        Ok(Target {
            color,
            depth: Some(&self.window_depth.view),
            format: self.window_format,
            width: self.window_depth.width,
            height: self.window_depth.height,
            offscreen: false,
        })
    }

    /// Pixel rectangle for the current viewport in wgpu's top-left space,
    /// clamped to the target. `None` when nothing would be drawn.
    #[allow(clippy::cast_precision_loss)]
    fn pass_viewport(&self, target: &Target<'_>) -> Option<[f32; 4]> {
        let v = self.viewport;
        let x = u32::try_from(v.x).unwrap_or(0).min(target.width);
        let bottom = u32::try_from(v.y).unwrap_or(0).min(target.height);
        let width = v.width.min(target.width - x);
        let height = v.height.min(target.height - bottom);
        if width == 0 || height == 0 {
            return None;
        }
        let y = if target.offscreen {
            bottom
        } else {
            target.height - bottom - height
        };
        Some([x as f32, y as f32, width as f32, height as f32])
    }

    fn ensure_layout(&mut self, program: ProgramHandle, unfilterable: u32) -> Result<(), GpuError> {
        if self.layouts.contains_key(&(program, unfilterable)) {
            return Ok(());
        }
        let gpu_program = self.programs.get(&program).ok_or(GpuError::InvalidHandle)?;
        let layout = &gpu_program.layout;

        let buffer_entry = |binding| wgpu::BindGroupLayoutEntry {
            binding,
            visibility: STAGES,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        };
        let mut entries = vec![buffer_entry(crate::source::CLIP_BINDING)];
        entries.extend(layout.uniforms.iter().map(|u| buffer_entry(u.binding)));
        for (i, sampler) in layout.samplers.iter().enumerate() {
            let filterable = unfilterable & (1 << i) == 0;
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.texture_binding,
                visibility: STAGES,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable },
                    view_dimension: match sampler.dimension {
                        SamplerDimension::D2 => wgpu::TextureViewDimension::D2,
                        SamplerDimension::Cube => wgpu::TextureViewDimension::Cube,
                    },
                    multisampled: false,
                },
                count: None,
            });
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: sampler.sampler_binding,
                visibility: STAGES,
                ty: wgpu::BindingType::Sampler(if filterable {
                    wgpu::SamplerBindingType::Filtering
                } else {
                    wgpu::SamplerBindingType::NonFiltering
                }),
                count: None,
            });
        }

        let bind_group_layout = self.device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some(&gpu_program.label),
            entries: &entries,
        });
        let pipeline_layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some(&gpu_program.label),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });
        self.layouts
            .insert((program, unfilterable), (bind_group_layout, pipeline_layout));
        Ok(())
    }

    fn ensure_pipeline(&mut self, key: &PipelineKey) -> Result<(), GpuError> {
        if self.pipelines.contains_key(key) {
            return Ok(());
        }
        self.ensure_layout(key.program, key.unfilterable)?;
        let program = self.programs.get(&key.program).ok_or(GpuError::InvalidHandle)?;
        let (_, pipeline_layout) = self
            .layouts
            .get(&(key.program, key.unfilterable))
            .ok_or(GpuError::InvalidHandle)?;

        let attributes: Vec<[wgpu::VertexAttribute; 1]> = key
            .vertex
            .iter()
            .map(|slot| {
                [wgpu::VertexAttribute {
                    format: vertex_format(slot.components),
                    offset: 0,
                    shader_location: slot.location,
                }]
            })
            .collect();
        let buffers: Vec<_> = key
            .vertex
            .iter()
            .zip(&attributes)
            .map(|(slot, attributes)| wgpu::VertexBufferLayout {
                array_stride: if slot.fallback {
                    0
                } else {
                    u64::from(slot.components) * 4
                },
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes,
            })
            .collect();

        let blend_component = wgpu::BlendComponent {
            src_factor: wgpu::BlendFactor::SrcAlpha,
            dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha,
            operation: wgpu::BlendOperation::Add,
        };

        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some(&program.label),
            layout: Some(pipeline_layout),
            vertex: wgpu::VertexState {
                module: &program.module,
                entry_point: "vs_main",
                buffers: &buffers,
            },
            fragment: Some(wgpu::FragmentState {
                module: &program.module,
                entry_point: "fs_main",
                targets: &[Some(wgpu::ColorTargetState {
                    format: key.color_format,
                    blend: key.state.blend.then_some(wgpu::BlendState {
                        color: blend_component,
                        alpha: blend_component,
                    }),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
            }),
            primitive: wgpu::PrimitiveState {
                topology: match key.primitive {
                    Primitive::Triangles => wgpu::PrimitiveTopology::TriangleList,
                    Primitive::Lines => wgpu::PrimitiveTopology::LineList,
                },
                front_face: if key.offscreen {
                    wgpu::FrontFace::Cw
                } else {
                    wgpu::FrontFace::Ccw
                },
                cull_mode: match key.state.cull {
                    CullMode::None => None,
                    CullMode::Front => Some(wgpu::Face::Front),
                    CullMode::Back => Some(wgpu::Face::Back),
                },
                ..Default::default()
            },
            depth_stencil: key.has_depth.then(|| wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: key.state.depth_test,
                depth_compare: if key.state.depth_test {
                    wgpu::CompareFunction::Less
                } else {
                    wgpu::CompareFunction::Always
                },
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::Link {
                label: program.label.clone(),
                log: err.to_string(),
            });
        }
        tracing::debug!(kernel = %program.label, format = ?key.color_format, "built pipeline");
        self.pipelines.insert(key.clone(), pipeline);
        Ok(())
    }

    fn bind_group(&self, program: &GpuProgram, layout: &wgpu::BindGroupLayout, offscreen: bool) -> wgpu::BindGroup {
        let clip = if offscreen { &self.clip_offscreen } else { &self.clip_window };
        let mut entries = vec![wgpu::BindGroupEntry {
            binding: crate::source::CLIP_BINDING,
            resource: clip.as_entire_binding(),
        }];
        for (slot, buffer) in program.layout.uniforms.iter().zip(&program.uniform_buffers) {
            entries.push(wgpu::BindGroupEntry {
                binding: slot.binding,
                resource: buffer.as_entire_binding(),
            });
        }
        for (i, sampler) in program.layout.samplers.iter().enumerate() {
            let (view, sampler_object) = match self.sampled_texture(program, i) {
                Some(texture) => (&texture.view, &texture.sampler),
                None => (
                    match sampler.dimension {
                        SamplerDimension::D2 => &self.fallbacks.texture_2d,
                        SamplerDimension::Cube => &self.fallbacks.texture_cube,
                    },
                    &self.fallbacks.sampler,
                ),
            };
            entries.push(wgpu::BindGroupEntry {
                binding: sampler.texture_binding,
                resource: wgpu::BindingResource::TextureView(view),
            });
            entries.push(wgpu::BindGroupEntry {
                binding: sampler.sampler_binding,
                resource: wgpu::BindingResource::Sampler(sampler_object),
            });
        }
        self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&program.label),
            layout,
            entries: &entries,
        })
    }

    fn draw(&mut self, primitive: Primitive, indices: Option<BufferHandle>, count: u32) -> Result<(), GpuError> {
        let handle = self.current_program.ok_or(GpuError::NoProgram)?;
        self.ensure_frame()?;
        let (color_format, offscreen) = {
            let target = self.target()?;
            (target.format, target.offscreen)
        };
        let program = self.programs.get(&handle).ok_or(GpuError::InvalidHandle)?;
        let vertex = program
            .layout
            .attributes
            .iter()
            .map(|attribute| {
                let location = attribute.location();
                match self.attributes.get(&location) {
                    Some(&(_, components)) => VertexSlot {
                        location,
                        components,
                        fallback: false,
                    },
                    None => VertexSlot {
                        location,
                        components: default_components(*attribute),
                        fallback: true,
                    },
                }
            })
            .collect();
        let key = PipelineKey {
            program: handle,
            color_format,
            has_depth: true,
            offscreen,
            primitive,
            state: self.state,
            vertex,
            unfilterable: self.unfilterable_mask(program),
        };
        self.ensure_pipeline(&key)?;
        self.encode_draw(&key, indices, count)
    }

    #[allow(clippy::cast_possible_truncation)]
    fn encode_draw(&self, key: &PipelineKey, indices: Option<BufferHandle>, count: u32) -> Result<(), GpuError> {
        let program = self.programs.get(&key.program).ok_or(GpuError::InvalidHandle)?;
        let pipeline = self.pipelines.get(key).ok_or(GpuError::InvalidHandle)?;
        let (layout, _) = self
            .layouts
            .get(&(key.program, key.unfilterable))
            .ok_or(GpuError::InvalidHandle)?;
        let target = self.target()?;
        let Some([x, y, width, height]) = self.pass_viewport(&target) else {
            return Ok(());
        };

        let mut vertex_buffers = Vec::with_capacity(key.vertex.len());
        for slot in &key.vertex {
            let buffer = if slot.fallback {
                &self.fallbacks.vertex
            } else {
                let (handle, _) = self.attributes.get(&slot.location).ok_or(GpuError::InvalidHandle)?;
                &self.buffers.get(handle).ok_or(GpuError::InvalidHandle)?.buffer
            };
            vertex_buffers.push(buffer);
        }
        let index_buffer = indices
            .map(|handle| self.buffers.get(&handle).map(|b| &b.buffer).ok_or(GpuError::InvalidHandle))
            .transpose()?;
        let bind_group = self.bind_group(program, layout, key.offscreen);

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some(&program.label),
        });
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some(&program.label),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: target.color,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: target.depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                    view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
            });
            pass.set_viewport(x, y, width, height, 0.0, 1.0);
            pass.set_pipeline(pipeline);
            pass.set_bind_group(0, &bind_group, &[]);
            for (slot, buffer) in vertex_buffers.iter().enumerate() {
                pass.set_vertex_buffer(slot as u32, buffer.slice(..));
            }
            match index_buffer {
                Some(buffer) => {
                    pass.set_index_buffer(buffer.slice(..), wgpu::IndexFormat::Uint32);
                    pass.draw_indexed(0..count, 0, 0..1);
                }
                None => pass.draw(0..count, 0..1),
            }
        }
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }
}

impl Device for WgpuDevice {
    fn name(&self) -> &str {
        &self.name
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferHandle, GpuError> {
        let contents: &[u8] = if data.is_empty() {
            &[0u8; 4]
        } else {
            bytemuck::cast_slice(data)
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("vertex buffer"),
            contents,
            usage: wgpu::BufferUsages::VERTEX,
        });
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, GpuBuffer { buffer });
        Ok(handle)
    }

    fn create_index_buffer(&mut self, data: &[u32]) -> Result<BufferHandle, GpuError> {
        let contents: &[u8] = if data.is_empty() {
            &[0u8; 4]
        } else {
            bytemuck::cast_slice(data)
        };
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("index buffer"),
            contents,
            usage: wgpu::BufferUsages::INDEX,
        });
        let handle = BufferHandle(self.next());
        self.buffers.insert(handle, GpuBuffer { buffer });
        Ok(handle)
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureHandle, GpuError> {
        let format = texture_format(desc.ty);
        let renderable = desc.kind == TextureKind::D2 && self.renderable.contains(&format);
        let mut usage = wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        if renderable {
            usage |= wgpu::TextureUsages::RENDER_ATTACHMENT;
        }
        let layers = match desc.kind {
            TextureKind::D2 => 1,
            TextureKind::Cube => 6,
        };
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: None,
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: layers,
            },
            mip_level_count: desc.mip_levels.max(1),
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            dimension: Some(match desc.kind {
                TextureKind::D2 => wgpu::TextureViewDimension::D2,
                TextureKind::Cube => wgpu::TextureViewDimension::Cube,
            }),
            ..Default::default()
        });
        let attachment = renderable.then(|| {
            texture.create_view(&wgpu::TextureViewDescriptor {
                mip_level_count: Some(1),
                ..Default::default()
            })
        });

        // Unfilterable formats may only be sampled with nearest filtering.
        let filtering = self.filterable(format);
        let filter = |f: Filter| if filtering { filter_mode(f) } else { wgpu::FilterMode::Nearest };
        let sampler = self.device.create_sampler(&wgpu::SamplerDescriptor {
            label: None,
            address_mode_u: address_mode(desc.wrap_s),
            address_mode_v: address_mode(desc.wrap_t),
            address_mode_w: address_mode(desc.wrap_t),
            mag_filter: filter(desc.mag_filter),
            min_filter: filter(desc.min_filter),
            mipmap_filter: if desc.mip_levels > 1 {
                filter(desc.min_filter)
            } else {
                wgpu::FilterMode::Nearest
            },
            ..Default::default()
        });

        let handle = TextureHandle(self.next());
        self.textures.insert(
            handle,
            GpuTexture {
                desc: *desc,
                texture,
                view,
                attachment,
                sampler,
                format,
            },
        );
        Ok(handle)
    }

    fn write_texture(
        &mut self,
        texture: TextureHandle,
        level: u32,
        layer: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GpuError> {
        let target = self.textures.get(&texture).ok_or(GpuError::InvalidHandle)?;
        if target.desc.ty != TextureType::UnsignedByte
            || level >= target.desc.mip_levels
            || rgba.len() != (width * height * 4) as usize
        {
            return Err(GpuError::InvalidHandle);
        }
        self.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &target.texture,
                mip_level: level,
                origin: wgpu::Origin3d { x: 0, y: 0, z: layer },
                aspect: wgpu::TextureAspect::All,
            },
            rgba,
            wgpu::ImageDataLayout {
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

    fn create_depth_buffer(&mut self, width: u32, height: u32) -> Result<DepthBufferHandle, GpuError> {
        let attachment = attachment(&self.device, DEPTH_FORMAT, width, height, "depth");
        let handle = DepthBufferHandle(self.next());
        self.depth_buffers.insert(handle, attachment);
        Ok(handle)
    }

    fn destroy_depth_buffer(&mut self, depth: DepthBufferHandle) {
        self.depth_buffers.remove(&depth);
    }

    fn render_target_complete(&self, texture: TextureHandle) -> bool {
        self.textures.get(&texture).is_some_and(|t| t.attachment.is_some())
    }

    fn set_render_target(&mut self, target: Option<RenderTargetBinding>) {
        self.render_target = target;
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
    }

    fn compile_program(&mut self, label: &str, source: &ProgramSource) -> Result<ProgramHandle, GpuError> {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let module = self.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some(label),
            source: wgpu::ShaderSource::Wgsl(source.module.as_str().into()),
        });
        if let Some(err) = pollster::block_on(self.device.pop_error_scope()) {
            return Err(GpuError::Compile {
                label: label.to_owned(),
                log: err.to_string(),
            });
        }

        let uniform_buffers = source
            .layout
            .uniforms
            .iter()
            .map(|slot| {
                self.device.create_buffer(&wgpu::BufferDescriptor {
                    label: Some(&slot.name),
                    size: slot.ty.uniform_size().max(16),
                    usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
                    mapped_at_creation: false,
                })
            })
            .collect();
        let program = ProgramHandle(self.next());
        self.programs.insert(
            program,
            GpuProgram {
                label: label.to_owned(),
                module,
                sampler_units: vec![0; source.layout.samplers.len()],
                layout: source.layout.clone(),
                uniform_buffers,
            },
        );

        // Link eagerly against a plain offscreen target so interface
        // mismatches are reported here rather than at the first draw.
        let probe = PipelineKey {
            program,
            color_format: wgpu::TextureFormat::Rgba8Unorm,
            has_depth: true,
            offscreen: true,
            primitive: Primitive::Triangles,
            state: RenderState::default(),
            vertex: source
                .layout
                .attributes
                .iter()
                .map(|a| VertexSlot {
                    location: a.location(),
                    components: default_components(*a),
                    fallback: true,
                })
                .collect(),
            unfilterable: 0,
        };
        if let Err(err) = self.ensure_pipeline(&probe) {
            self.programs.remove(&program);
            return Err(err);
        }
        Ok(program)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.layout.location_of(name)
    }

    fn attribute_location(&self, program: ProgramHandle, attribute: Attribute) -> Option<u32> {
        let layout = &self.programs.get(&program)?.layout;
        layout.attributes.contains(&attribute).then(|| attribute.location())
    }

    fn use_program(&mut self, program: ProgramHandle) {
        self.current_program = Some(program);
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformUpload) -> Result<(), GpuError> {
        let handle = self.current_program.ok_or(GpuError::NoProgram)?;
        let program = self.programs.get_mut(&handle).ok_or(GpuError::InvalidHandle)?;
        match program.layout.slot(location).ok_or(GpuError::InvalidHandle)? {
            Slot::Uniform(slot) if slot.ty.accepts(&value) => {
                let index = location.id() as usize;
                self.queue
                    .write_buffer(&program.uniform_buffers[index], 0, &uniform_bytes(value));
            }
            Slot::Sampler(index, _) if matches!(value, UniformUpload::Int(_)) => {
                if let UniformUpload::Int(unit) = value {
                    program.sampler_units[index] = u32::try_from(unit).unwrap_or(0);
                }
            }
            Slot::Uniform(slot) => {
                return Err(GpuError::UniformTypeMismatch {
                    name: slot.name.clone(),
                    expected: slot.ty,
                    actual: value.kind_name(),
                })
            }
            Slot::Sampler(_, slot) => {
                return Err(GpuError::UniformTypeMismatch {
                    name: slot.name.clone(),
                    expected: UniformType::Int,
                    actual: value.kind_name(),
                })
            }
        }
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        match texture {
            Some(texture) => self.units.insert(unit, texture),
            None => self.units.remove(&unit),
        };
    }

    fn enable_attribute(&mut self, location: u32, buffer: BufferHandle, components: u32) {
        self.attributes.insert(location, (buffer, components));
    }

    fn disable_attribute(&mut self, location: u32) {
        self.attributes.remove(&location);
    }

    fn draw_arrays(&mut self, primitive: Primitive, count: u32) -> Result<(), GpuError> {
        self.draw(primitive, None, count)
    }

    fn draw_elements(&mut self, primitive: Primitive, indices: BufferHandle, count: u32) -> Result<(), GpuError> {
        self.draw(primitive, Some(indices), count)
    }

    fn set_clear_color(&mut self, color: [f32; 4]) {
        self.clear_color = color;
    }

    fn clear(&mut self, flags: ClearFlags) -> Result<(), GpuError> {
        self.ensure_frame()?;
        let target = self.target()?;
        let [r, g, b, a] = self.clear_color.map(f64::from);
        let mut encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("clear") });
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.color,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: if flags.color {
                        wgpu::LoadOp::Clear(wgpu::Color { r, g, b, a })
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: target.depth.map(|view| wgpu::RenderPassDepthStencilAttachment {
                view,
                depth_ops: Some(wgpu::Operations {
                    load: if flags.depth {
                        wgpu::LoadOp::Clear(1.0)
                    } else {
                        wgpu::LoadOp::Load
                    },
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        self.queue.submit(Some(encoder.finish()));
        Ok(())
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn set_render_state(&mut self, state: RenderState) {
        self.state = state;
    }

    fn begin_frame(&mut self) -> Result<(), GpuError> {
        self.ensure_frame()
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        if let Some((texture, _)) = self.surface.as_mut().and_then(|s| s.frame.take()) {
            texture.present();
        }
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        if let Some(state) = &mut self.surface {
            state.frame = None;
            state.config.width = width;
            state.config.height = height;
            state.surface.configure(&self.device, &state.config);
        }
        self.window_target = attachment(&self.device, wgpu::TextureFormat::Rgba8Unorm, width, height, "window");
        self.window_depth = attachment(&self.device, DEPTH_FORMAT, width, height, "depth");
        tracing::debug!(width, height, "resized window target");
    }
}
