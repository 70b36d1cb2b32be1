//! The command interface every backend implements, and the plain data types
//! that cross it.

#[cfg(feature = "mock")]
pub mod recording;
#[cfg(feature = "wgpu")]
pub mod wgpu_device;

use water_math::Viewport;

use crate::{source::ProgramSource, GpuError};

macro_rules! handle {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub(crate) u32);

        impl $name {
            #[must_use]
            pub const fn id(self) -> u32 {
                self.0
            }
        }
    };
}

handle!(
    /// Device-side vertex or index buffer.
    BufferHandle
);
handle!(
    /// Device-side 2D texture or cubemap.
    TextureHandle
);
handle!(DepthBufferHandle);
handle!(
    /// A compiled and linked vertex/fragment pair.
    ProgramHandle
);
handle!(
    /// Uniform slot in the program it was looked up from.
    UniformLocation
);

/// What the device can do with high-precision textures.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub float_textures: bool,
    pub float_linear_filtering: bool,
    pub half_float_textures: bool,
    pub half_float_linear_filtering: bool,
}

impl Capabilities {
    pub const ALL: Self = Self {
        float_textures: true,
        float_linear_filtering: true,
        half_float_textures: true,
        half_float_linear_filtering: true,
    };

    pub const NONE: Self = Self {
        float_textures: false,
        float_linear_filtering: false,
        half_float_textures: false,
        half_float_linear_filtering: false,
    };
}

impl Default for Capabilities {
    fn default() -> Self {
        Self::ALL
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferTarget {
    Vertex,
    Index,
}

/// Mesh attribute streams a kernel can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Attribute {
    Position,
    TexCoord,
    Normal,
    Color,
}

impl Attribute {
    pub const ALL: [Self; 4] = [Self::Position, Self::TexCoord, Self::Normal, Self::Color];

    /// Field name inside the injected `VertexInput` struct.
    #[must_use]
    pub const fn shader_name(self) -> &'static str {
        match self {
            Self::Position => "vertex_position",
            Self::TexCoord => "vertex_texcoord",
            Self::Normal => "vertex_normal",
            Self::Color => "vertex_color",
        }
    }

    #[must_use]
    pub const fn location(self) -> u32 {
        match self {
            Self::Position => 0,
            Self::TexCoord => 1,
            Self::Normal => 2,
            Self::Color => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Primitive {
    Triangles,
    Lines,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureFormat {
    Rgb,
    Rgba,
}

/// Numeric precision of each channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureType {
    UnsignedByte,
    Float,
    HalfFloat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Filter {
    Nearest,
    Linear,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Wrap {
    ClampToEdge,
    Repeat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextureKind {
    D2,
    Cube,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureDescriptor {
    pub kind: TextureKind,
    pub width: u32,
    pub height: u32,
    pub format: TextureFormat,
    pub ty: TextureType,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    pub mip_levels: u32,
}

/// Color and depth attachments for offscreen drawing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetBinding {
    pub color: TextureHandle,
    pub depth: DepthBufferHandle,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CullMode {
    #[default]
    None,
    Front,
    Back,
}

/// Fixed-function state applied to subsequent draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RenderState {
    pub cull: CullMode,
    pub depth_test: bool,
    /// Straight alpha blending (`src_alpha`, `one_minus_src_alpha`).
    pub blend: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClearFlags {
    pub color: bool,
    pub depth: bool,
}

impl ClearFlags {
    pub const ALL: Self = Self {
        color: true,
        depth: true,
    };
    pub const COLOR: Self = Self {
        color: true,
        depth: false,
    };
}

/// A uniform value in device layout: matrices are column-major.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformUpload {
    Float(f32),
    Int(i32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4([f32; 16]),
}

impl UniformUpload {
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Float(_) => "f32",
            Self::Int(_) => "i32",
            Self::Vec2(_) => "vec2<f32>",
            Self::Vec3(_) => "vec3<f32>",
            Self::Vec4(_) => "vec4<f32>",
            Self::Mat3(_) => "mat3x3<f32>",
            Self::Mat4(_) => "mat4x4<f32>",
        }
    }
}

/// Synchronous, in-order device commands.
///
/// The shape follows the classic immediate-mode API: uniforms and attribute
/// bindings apply to the program selected by [`use_program`](Self::use_program),
/// and draws go to the render target selected by
/// [`set_render_target`](Self::set_render_target) (`None` is the window).
pub trait Device {
    fn name(&self) -> &str;

    fn capabilities(&self) -> Capabilities;

    fn create_vertex_buffer(&mut self, data: &[f32]) -> Result<BufferHandle, GpuError>;

    fn create_index_buffer(&mut self, data: &[u32]) -> Result<BufferHandle, GpuError>;

    fn create_texture(&mut self, desc: &TextureDescriptor) -> Result<TextureHandle, GpuError>;

    /// Uploads tightly packed RGBA8 pixels into one mip level of one layer
    /// (cube face) of `texture`.
    fn write_texture(
        &mut self,
        texture: TextureHandle,
        level: u32,
        layer: u32,
        width: u32,
        height: u32,
        rgba: &[u8],
    ) -> Result<(), GpuError>;

    fn create_depth_buffer(&mut self, width: u32, height: u32) -> Result<DepthBufferHandle, GpuError>;

    fn destroy_depth_buffer(&mut self, depth: DepthBufferHandle);

    /// Whether `texture` can be used as a color attachment. Must not change
    /// any state visible to later draws.
    fn render_target_complete(&self, texture: TextureHandle) -> bool;

    fn set_render_target(&mut self, target: Option<RenderTargetBinding>);

    fn viewport(&self) -> Viewport;

    fn set_viewport(&mut self, viewport: Viewport);

    fn compile_program(&mut self, label: &str, source: &ProgramSource) -> Result<ProgramHandle, GpuError>;

    fn uniform_location(&self, program: ProgramHandle, name: &str) -> Option<UniformLocation>;

    fn attribute_location(&self, program: ProgramHandle, attribute: Attribute) -> Option<u32>;

    fn use_program(&mut self, program: ProgramHandle);

    fn set_uniform(&mut self, location: UniformLocation, value: UniformUpload) -> Result<(), GpuError>;

    fn bind_texture(&mut self, unit: u32, texture: Option<TextureHandle>);

    fn enable_attribute(&mut self, location: u32, buffer: BufferHandle, components: u32);

    fn disable_attribute(&mut self, location: u32);

    fn draw_arrays(&mut self, primitive: Primitive, count: u32) -> Result<(), GpuError>;

    fn draw_elements(&mut self, primitive: Primitive, indices: BufferHandle, count: u32) -> Result<(), GpuError>;

    fn set_clear_color(&mut self, color: [f32; 4]);

    fn clear(&mut self, flags: ClearFlags) -> Result<(), GpuError>;

    fn render_state(&self) -> RenderState;

    fn set_render_state(&mut self, state: RenderState);

    fn begin_frame(&mut self) -> Result<(), GpuError> {
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), GpuError> {
        Ok(())
    }

    /// The window surface changed size.
    fn resize(&mut self, _width: u32, _height: u32) {}
}
