//! The height field and the passes that advance it.

use water_geometry::{Mesh, MeshOptions};
use water_gpu::{
    Capability, Context, Filter, GpuError, GpuMesh, PingPong, Primitive, Shader, ShaderLibrary, Texture,
    TextureOptions, TextureType, UniformValue,
};
use water_math::{TransformContext, Vector3};

use crate::{kernels, DropSink};

pub const DEFAULT_RESOLUTION: u32 = 256;

/// Texel type and filtering the state textures were created with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Precision {
    pub ty: TextureType,
    pub filter: Filter,
}

struct Kernels {
    drop: Shader,
    update: Shader,
    normal: Shader,
    sphere: Shader,
}

impl Kernels {
    fn compile(context: &mut Context, library: &ShaderLibrary) -> Result<Self, GpuError> {
        Ok(Self {
            drop: Shader::from_library(context, library, kernels::DROP)?,
            update: Shader::from_library(context, library, kernels::UPDATE)?,
            normal: Shader::from_library(context, library, kernels::NORMAL)?,
            sphere: Shader::from_library(context, library, kernels::SPHERE)?,
        })
    }
}

fn pick_filter(linear: bool, precision: &str) -> Filter {
    if linear {
        Filter::Linear
    } else {
        tracing::info!(precision, "linear filtering unavailable, sampling water state with nearest");
        Filter::Nearest
    }
}

fn renderable(state: &PingPong, context: &Context) -> bool {
    state.current().can_draw_to(context) && state.scratch().can_draw_to(context)
}

/// Float textures if they can be drawn to, half-float otherwise.
fn allocate_state(context: &mut Context, resolution: u32) -> Result<(PingPong, Precision), GpuError> {
    let caps = context.capabilities();
    if !caps.float_textures {
        return Err(GpuError::MissingCapability(Capability::FloatTextures));
    }
    let filter = pick_filter(caps.float_linear_filtering, "float");
    let options = TextureOptions::default().with_type(TextureType::Float).with_filter(filter);
    let state = PingPong::new(context, resolution, resolution, options)?;
    if renderable(&state, context) {
        return Ok((
            state,
            Precision {
                ty: TextureType::Float,
                filter,
            },
        ));
    }

    tracing::warn!("cannot render to float textures, falling back to half-float");
    if !caps.half_float_textures {
        return Err(GpuError::MissingCapability(Capability::HalfFloatTextures));
    }
    let filter = pick_filter(caps.half_float_linear_filtering, "half-float");
    let options = TextureOptions::default().with_type(TextureType::HalfFloat).with_filter(filter);
    let state = PingPong::new(context, resolution, resolution, options)?;
    if renderable(&state, context) {
        return Ok((
            state,
            Precision {
                ty: TextureType::HalfFloat,
                filter,
            },
        ));
    }
    Err(GpuError::IncompleteRenderTarget)
}

/// Draws the full-grid plane with `shader` into the scratch texture, reading
/// the current one from unit 0, then swaps.
fn pass(
    state: &mut PingPong,
    context: &mut Context,
    shader: &mut Shader,
    plane: &GpuMesh,
    transforms: &TransformContext,
    uniforms: &[(&str, UniformValue)],
) -> Result<(), GpuError> {
    state.render(context, |context, current| {
        current.bind(context, 0);
        shader
            .uniforms(context, &[("water", UniformValue::Sampler(0))])?
            .uniforms(context, uniforms)?
            .draw(context, transforms, plane, Primitive::Triangles)
    })
}

/// The water simulation: a double-buffered height field plus its kernels.
///
/// Texels hold `(height, velocity, normal.x, normal.z)`. Every pass reads
/// the current texture, writes the other and swaps, so after any sequence of
/// passes exactly one texture is authoritative.
pub struct Water {
    state: PingPong,
    precision: Precision,
    plane: GpuMesh,
    kernels: Kernels,
    transforms: TransformContext,
    delta: [f32; 2],
}

impl Water {
    /// Creates a `resolution` × `resolution` simulation.
    ///
    /// # Errors
    ///
    /// [`GpuError::MissingCapability`] when the device has no usable float
    /// or half-float textures, [`GpuError::IncompleteRenderTarget`] when it
    /// cannot render into either, and any kernel compile error.
    #[allow(clippy::cast_precision_loss)]
    pub fn new(context: &mut Context, library: &ShaderLibrary, resolution: u32) -> Result<Self, GpuError> {
        let (state, precision) = allocate_state(context, resolution)?;
        let plane = GpuMesh::compile(context, &Mesh::plane(1, 1, MeshOptions::default()))?;
        let kernels = Kernels::compile(context, library)?;
        let delta = [
            1.0 / state.current().width() as f32,
            1.0 / state.current().height() as f32,
        ];
        tracing::info!(
            resolution,
            texel = ?precision.ty,
            filter = ?precision.filter,
            "water simulation ready"
        );
        Ok(Self {
            state,
            precision,
            plane,
            kernels,
            transforms: TransformContext::new(),
            delta,
        })
    }

    /// Adds a disturbance at world `(x, z)`, both in `[-1, 1]`.
    pub fn add_drop(
        &mut self,
        context: &mut Context,
        x: f32,
        z: f32,
        radius: f32,
        strength: f32,
    ) -> Result<(), GpuError> {
        tracing::debug!(x, z, radius, strength, "drop");
        pass(
            &mut self.state,
            context,
            &mut self.kernels.drop,
            &self.plane,
            &self.transforms,
            &[
                ("center", UniformValue::Vec2([x, z])),
                ("radius", UniformValue::Scalar(radius)),
                ("strength", UniformValue::Scalar(strength)),
            ],
        )
    }

    /// Displaces the water a sphere of `radius` pushes aside as it moves from
    /// `old_center` to `new_center`.
    pub fn move_sphere(
        &mut self,
        context: &mut Context,
        old_center: Vector3,
        new_center: Vector3,
        radius: f32,
    ) -> Result<(), GpuError> {
        pass(
            &mut self.state,
            context,
            &mut self.kernels.sphere,
            &self.plane,
            &self.transforms,
            &[
                ("old_center", old_center.into()),
                ("new_center", new_center.into()),
                ("radius", UniformValue::Scalar(radius)),
            ],
        )
    }

    pub fn step_simulation(&mut self, context: &mut Context) -> Result<(), GpuError> {
        pass(
            &mut self.state,
            context,
            &mut self.kernels.update,
            &self.plane,
            &self.transforms,
            &[("delta", UniformValue::Vec2(self.delta))],
        )
    }

    pub fn update_normals(&mut self, context: &mut Context) -> Result<(), GpuError> {
        pass(
            &mut self.state,
            context,
            &mut self.kernels.normal,
            &self.plane,
            &self.transforms,
            &[("delta", UniformValue::Vec2(self.delta))],
        )
    }

    /// One frame of simulation: two steps, then fresh normals.
    pub fn tick(&mut self, context: &mut Context) -> Result<(), GpuError> {
        self.step_simulation(context)?;
        self.step_simulation(context)?;
        self.update_normals(context)
    }

    /// Recompiles every kernel from `library`. The old kernels stay in use
    /// if any of the new ones fails to build.
    pub fn reload_kernels(&mut self, context: &mut Context, library: &ShaderLibrary) -> Result<(), GpuError> {
        self.kernels = Kernels::compile(context, library)?;
        tracing::info!("reloaded water kernels");
        Ok(())
    }

    /// The authoritative state texture.
    #[must_use]
    pub fn texture(&self) -> &Texture {
        self.state.current()
    }

    #[must_use]
    pub fn state(&self) -> &PingPong {
        &self.state
    }

    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.state.swap_count()
    }

    #[must_use]
    pub fn precision(&self) -> Precision {
        self.precision
    }

    /// Texel spacing in texture coordinates.
    #[must_use]
    pub fn delta(&self) -> [f32; 2] {
        self.delta
    }

    /// A [`DropSink`] that splashes into this simulation.
    pub fn sink<'a>(&'a mut self, context: &'a mut Context) -> WaterSink<'a> {
        WaterSink { water: self, context }
    }
}

pub struct WaterSink<'a> {
    water: &'a mut Water,
    context: &'a mut Context,
}

impl DropSink for WaterSink<'_> {
    type Error = GpuError;

    fn add_drop(&mut self, x: f32, z: f32, radius: f32, strength: f32) -> Result<(), GpuError> {
        self.water.add_drop(self.context, x, z, radius, strength)
    }
}
