//! A device that draws nothing and remembers everything.
//!
//! Useful for tests and for running the simulation headless: every command is
//! validated against the same rules a real backend applies (handles exist,
//! uniform types match, a program is in use) and then appended to a shared
//! [`CommandLog`].

use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use water_math::Viewport;

use crate::{
    source::{ProgramSource, Slot},
    Attribute, BufferHandle, Capabilities, Capability, ClearFlags, DepthBufferHandle, Device, GpuError,
    Primitive, ProgramHandle, RenderState, RenderTargetBinding, TextureDescriptor, TextureHandle,
    TextureType, UniformLocation, UniformUpload,
};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    CreateBuffer {
        buffer: BufferHandle,
        len: usize,
    },
    CreateTexture {
        texture: TextureHandle,
        desc: TextureDescriptor,
    },
    WriteTexture {
        texture: TextureHandle,
        level: u32,
        layer: u32,
    },
    CreateDepthBuffer {
        depth: DepthBufferHandle,
        width: u32,
        height: u32,
    },
    DestroyDepthBuffer(DepthBufferHandle),
    SetRenderTarget(Option<RenderTargetBinding>),
    SetViewport(Viewport),
    CompileProgram {
        program: ProgramHandle,
        label: String,
    },
    UseProgram(ProgramHandle),
    SetUniform {
        program: ProgramHandle,
        name: String,
        value: UniformUpload,
    },
    BindTexture {
        unit: u32,
        texture: Option<TextureHandle>,
    },
    EnableAttribute {
        location: u32,
        buffer: BufferHandle,
    },
    DisableAttribute(u32),
    Draw {
        program: ProgramHandle,
        label: String,
        primitive: Primitive,
        count: u32,
        indexed: bool,
        target: Option<TextureHandle>,
        state: RenderState,
    },
    Clear {
        flags: ClearFlags,
        target: Option<TextureHandle>,
    },
    SetRenderState(RenderState),
    BeginFrame,
    EndFrame,
}

/// Shared handle to a [`RecordingDevice`]'s command history. Clone it before
/// boxing the device into a [`Context`](crate::Context).
#[derive(Debug, Clone, Default)]
pub struct CommandLog(Arc<Mutex<Vec<Command>>>);

impl CommandLog {
    fn push(&self, command: Command) {
        self.0.lock().push(command);
    }

    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.0.lock().clone()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.0.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.lock().is_empty()
    }

    pub fn clear(&self) {
        self.0.lock().clear();
    }

    /// Every draw, in issue order.
    #[must_use]
    pub fn draws(&self) -> Vec<Command> {
        self.0
            .lock()
            .iter()
            .filter(|c| matches!(c, Command::Draw { .. }))
            .cloned()
            .collect()
    }

    #[must_use]
    pub fn draw_labels(&self) -> Vec<String> {
        self.0
            .lock()
            .iter()
            .filter_map(|c| match c {
                Command::Draw { label, .. } => Some(label.clone()),
                _ => None,
            })
            .collect()
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.0.lock().iter().filter(|c| predicate(c)).count()
    }
}

struct RecordedTexture {
    desc: TextureDescriptor,
}

struct RecordedProgram {
    label: String,
    source: ProgramSource,
}

#[derive(Copy, Clone)]
struct RecordedDepth {
    width: u32,
    height: u32,
}

pub struct RecordingDevice {
    log: CommandLog,
    capabilities: Capabilities,
    unrenderable: Vec<TextureType>,
    rejected_sources: Vec<(String, String)>,
    next_id: u32,
    buffers: HashMap<BufferHandle, usize>,
    textures: HashMap<TextureHandle, RecordedTexture>,
    depth_buffers: HashMap<DepthBufferHandle, RecordedDepth>,
    programs: HashMap<ProgramHandle, RecordedProgram>,
    current_program: Option<ProgramHandle>,
    render_target: Option<RenderTargetBinding>,
    viewport: Viewport,
    surface: (u32, u32),
    state: RenderState,
}

impl Default for RecordingDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl RecordingDevice {
    #[must_use]
    pub fn new() -> Self {
        Self::with_capabilities(Capabilities::ALL)
    }

    #[must_use]
    pub fn with_capabilities(capabilities: Capabilities) -> Self {
        Self {
            log: CommandLog::default(),
            capabilities,
            unrenderable: Vec::new(),
            rejected_sources: Vec::new(),
            next_id: 1,
            buffers: HashMap::new(),
            textures: HashMap::new(),
            depth_buffers: HashMap::new(),
            programs: HashMap::new(),
            current_program: None,
            render_target: None,
            viewport: Viewport::new(0, 0, 800, 600),
            surface: (800, 600),
            state: RenderState::default(),
        }
    }

    /// Textures of this type report an incomplete render target.
    #[must_use]
    pub fn without_render_target(mut self, ty: TextureType) -> Self {
        self.unrenderable.push(ty);
        self
    }

    /// Fails compilation of any module containing `marker`, with `log` as the
    /// device diagnostic.
    #[must_use]
    pub fn rejecting(mut self, marker: &str, log: &str) -> Self {
        self.rejected_sources.push((marker.to_owned(), log.to_owned()));
        self
    }

    #[must_use]
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }

    /// Size of the pretend window.
    #[must_use]
    pub fn surface_size(&self) -> (u32, u32) {
        self.surface
    }

    fn next(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    fn current_target(&self) -> Option<TextureHandle> {
        self.render_target.map(|t| t.color)
    }

    fn check_draw(&self, primitive: Primitive, count: u32, indexed: bool) -> Result<Command, GpuError> {
        let program = self.current_program.ok_or(GpuError::NoProgram)?;
        let label = self
            .programs
            .get(&program)
            .map(|p| p.label.clone())
            .ok_or(GpuError::InvalidHandle)?;
        Ok(Command::Draw {
            program,
            label,
            primitive,
            count,
            indexed,
            target: self.current_target(),
            state: self.state,
        })
    }
}

impl Device for RecordingDevice {
    fn name(&self) -> &str {
        "recording"
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferHandle, GpuError> {
        let buffer = BufferHandle(self.next());
        self.buffers.insert(buffer, data.len());
        self.log.push(Command::CreateBuffer { buffer, len: data.len() });
        Ok(buffer)
    }

    fn create_index_buffer(&mut self, data: &[u32]) -> Result<BufferHandle, GpuError> {
        let buffer = BufferHandle(self.next());
        self.buffers.insert(buffer, data.len());
        self.log.push(Command::CreateBuffer { buffer, len: data.len() });
        Ok(buffer)
    }

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureHandle, GpuError> {
        match desc.ty {
            TextureType::Float if !self.capabilities.float_textures => {
                return Err(GpuError::MissingCapability(Capability::FloatTextures));
            }
            TextureType::HalfFloat if !self.capabilities.half_float_textures => {
                return Err(GpuError::MissingCapability(Capability::HalfFloatTextures));
            }
            _ => {}
        }
        let texture = TextureHandle(self.next());
        self.textures.insert(texture, RecordedTexture { desc: *desc });
        self.log.push(Command::CreateTexture { texture, desc: *desc });
        Ok(texture)
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
        let recorded = self.textures.get(&texture).ok_or(GpuError::InvalidHandle)?;
        if level >= recorded.desc.mip_levels || rgba.len() != (width * height * 4) as usize {
            return Err(GpuError::InvalidHandle);
        }
        self.log.push(Command::WriteTexture { texture, level, layer });
        Ok(())
    }

    fn create_depth_buffer(&mut self, width: u32, height: u32) -> Result<DepthBufferHandle, GpuError> {
        let depth = DepthBufferHandle(self.next());
        self.depth_buffers.insert(depth, RecordedDepth { width, height });
        self.log.push(Command::CreateDepthBuffer { depth, width, height });
        Ok(depth)
    }

    fn destroy_depth_buffer(&mut self, depth: DepthBufferHandle) {
        self.depth_buffers.remove(&depth);
        self.log.push(Command::DestroyDepthBuffer(depth));
    }

    fn render_target_complete(&self, texture: TextureHandle) -> bool {
        self.textures.get(&texture).is_some_and(|t| {
            t.desc.kind == crate::TextureKind::D2 && !self.unrenderable.contains(&t.desc.ty)
        })
    }

    fn set_render_target(&mut self, target: Option<RenderTargetBinding>) {
        if let Some(binding) = target {
            let depth_fits = self.depth_buffers.get(&binding.depth).is_some_and(|d| {
                self.textures
                    .get(&binding.color)
                    .is_some_and(|t| t.desc.width == d.width && t.desc.height == d.height)
            });
            debug_assert!(depth_fits, "depth attachment does not match color attachment");
        }
        self.render_target = target;
        self.log.push(Command::SetRenderTarget(target));
    }

    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn set_viewport(&mut self, viewport: Viewport) {
        self.viewport = viewport;
        self.log.push(Command::SetViewport(viewport));
    }

    fn compile_program(&mut self, label: &str, source: &ProgramSource) -> Result<ProgramHandle, GpuError> {
        if let Some((_, log)) = self
            .rejected_sources
            .iter()
            .find(|(marker, _)| source.module.contains(marker.as_str()))
        {
            return Err(GpuError::Compile {
                label: label.to_owned(),
                log: log.clone(),
            });
        }
        let program = ProgramHandle(self.next());
        self.programs.insert(
            program,
            RecordedProgram {
                label: label.to_owned(),
                source: source.clone(),
            },
        );
        self.log.push(Command::CompileProgram {
            program,
            label: label.to_owned(),
        });
        Ok(program)
    }

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation> {
        self.programs.get(&program)?.source.layout.location_of(name)
    }

    fn attribute_location(&self, program: ProgramHandle, attribute: Attribute) -> Option<u32> {
        let layout = &self.programs.get(&program)?.source.layout;
        layout.attributes.contains(&attribute).then(|| attribute.location())
    }

    fn use_program(&mut self, program: ProgramHandle) {
        if self.current_program != Some(program) {
            self.current_program = Some(program);
            self.log.push(Command::UseProgram(program));
        }
    }

    fn set_uniform(&mut self, location: UniformLocation, value: UniformUpload) -> Result<(), GpuError> {
        let program = self.current_program.ok_or(GpuError::NoProgram)?;
        let layout = &self.programs.get(&program).ok_or(GpuError::InvalidHandle)?.source.layout;
        let name = match layout.slot(location).ok_or(GpuError::InvalidHandle)? {
            Slot::Uniform(slot) if slot.ty.accepts(&value) => slot.name.clone(),
            Slot::Sampler(_, slot) if matches!(value, UniformUpload::Int(_)) => slot.name.clone(),
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
                    expected: crate::UniformType::Int,
                    actual: value.kind_name(),
                })
            }
        };
        self.log.push(Command::SetUniform { program, name, value });
        Ok(())
    }

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>) {
        self.log.push(Command::BindTexture { unit, texture });
    }

    fn enable_attribute(&mut self, location: u32, buffer: BufferHandle, _components: u32) {
        self.log.push(Command::EnableAttribute { location, buffer });
    }

    fn disable_attribute(&mut self, location: u32) {
        self.log.push(Command::DisableAttribute(location));
    }

    fn draw_arrays(&mut self, primitive: Primitive, count: u32) -> Result<(), GpuError> {
        let draw = self.check_draw(primitive, count, false)?;
        self.log.push(draw);
        Ok(())
    }

    fn draw_elements(&mut self, primitive: Primitive, indices: BufferHandle, count: u32) -> Result<(), GpuError> {
        let len = *self.buffers.get(&indices).ok_or(GpuError::InvalidHandle)?;
        if count as usize > len {
            return Err(GpuError::InvalidHandle);
        }
        let draw = self.check_draw(primitive, count, true)?;
        self.log.push(draw);
        Ok(())
    }

    fn set_clear_color(&mut self, _color: [f32; 4]) {}

    fn clear(&mut self, flags: ClearFlags) -> Result<(), GpuError> {
        self.log.push(Command::Clear {
            flags,
            target: self.current_target(),
        });
        Ok(())
    }

    fn render_state(&self) -> RenderState {
        self.state
    }

    fn set_render_state(&mut self, state: RenderState) {
        if self.state != state {
            self.state = state;
            self.log.push(Command::SetRenderState(state));
        }
    }

    fn begin_frame(&mut self) -> Result<(), GpuError> {
        self.log.push(Command::BeginFrame);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        self.log.push(Command::EndFrame);
        Ok(())
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.surface = (width, height);
    }
}
