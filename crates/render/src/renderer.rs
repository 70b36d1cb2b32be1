//! Draws the pool, the water surface, an optional obstacle and falling
//! droplets, and keeps the caustics texture in step with the water.

use serde::{Deserialize, Serialize};
use water_geometry::{Mesh, MeshOptions};
use water_gpu::{
    ClearFlags, Context, CullMode, GpuError, GpuMesh, Primitive, Shader, ShaderLibrary, Texture, TextureOptions,
    UniformValue,
};
use water_math::{TransformContext, Vector3};
use water_sim::{Droplet, Water};

use crate::{cubemap::Cubemap, kernels, scene::SceneConfig};

/// Texture units. The pool kernels share one binding layout so every
/// program that includes them sees the same units.
const WATER_UNIT: u32 = 0;
const TILES_UNIT: u32 = 1;
const CAUSTICS_UNIT: u32 = 2;
const SKY_UNIT: u32 = 3;

/// Detail of the generated sphere used for droplets.
pub const DROPLET_DETAIL: u32 = 6;
const OBSTACLE_DETAIL: u32 = 10;

/// Sphere uniforms uploaded when no obstacle is in the pool. A zero radius
/// never intersects a ray and casts no shadow.
const NO_OBSTACLE: Obstacle = Obstacle {
    center: [0.0, -10.0, 0.0],
    radius: 0.0,
};

/// A sphere resting in the pool.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Obstacle {
    pub center: [f32; 3],
    pub radius: f32,
}

impl Obstacle {
    fn uniforms(&self) -> [(&'static str, UniformValue); 2] {
        [
            ("sphere_center", UniformValue::Vec3(self.center)),
            ("sphere_radius", UniformValue::Scalar(self.radius)),
        ]
    }
}

struct Kernels {
    caustics: Shader,
    surface_above: Shader,
    surface_under: Shader,
    pool: Shader,
    obstacle: Shader,
    droplet: Shader,
}

impl Kernels {
    fn compile(context: &mut Context, library: &ShaderLibrary) -> Result<Self, GpuError> {
        Ok(Self {
            caustics: Shader::from_library(context, library, kernels::CAUSTICS)?,
            surface_above: Shader::from_library(context, library, kernels::SURFACE_ABOVE)?,
            surface_under: Shader::from_library(context, library, kernels::SURFACE_UNDER)?,
            pool: Shader::from_library(context, library, kernels::POOL)?,
            obstacle: Shader::from_library(context, library, kernels::OBSTACLE)?,
            droplet: Shader::from_library(context, library, kernels::DROPLET)?,
        })
    }
}

/// The open-topped pool: a unit cube without its `-y` face, which the pool
/// kernel flips to the top.
fn pool_mesh() -> Mesh {
    let mut cube = Mesh::cube(MeshOptions::default());
    if let Some(triangles) = cube.triangles.as_mut() {
        triangles.drain(4..6);
    }
    cube
}

pub struct Renderer {
    caustics: Texture,
    tiles: Texture,
    water_mesh: GpuMesh,
    pool_mesh: GpuMesh,
    obstacle_mesh: GpuMesh,
    droplet_mesh: GpuMesh,
    kernels: Kernels,
    light: Vector3,
    obstacle: Option<Obstacle>,
    droplet_color: [f32; 4],
}

impl Renderer {
    /// Builds the meshes, the caustics target and every rendering kernel.
    pub fn new(
        context: &mut Context,
        library: &ShaderLibrary,
        config: &SceneConfig,
        tiles: Texture,
    ) -> Result<Self, GpuError> {
        let detail = config.water_detail.max(1);
        let water_mesh = GpuMesh::compile(context, &Mesh::plane(detail, detail, MeshOptions::default()))?;
        let pool_mesh = GpuMesh::compile(context, &pool_mesh())?;
        let obstacle_mesh = GpuMesh::compile(context, &Mesh::sphere(OBSTACLE_DETAIL, MeshOptions::default()))?;
        let droplet_mesh = GpuMesh::compile(context, &Mesh::sphere(DROPLET_DETAIL, MeshOptions::default()))?;
        let caustics = Texture::new(
            context,
            config.caustics_resolution,
            config.caustics_resolution,
            TextureOptions::default(),
        )?;
        let kernels = Kernels::compile(context, library)?;
        let [x, y, z] = config.light;
        tracing::debug!(
            water_detail = detail,
            caustics = config.caustics_resolution,
            "renderer ready"
        );
        Ok(Self {
            caustics,
            tiles,
            water_mesh,
            pool_mesh,
            obstacle_mesh,
            droplet_mesh,
            kernels,
            light: Vector3::new(x, y, z).unit(),
            obstacle: config.obstacle,
            droplet_color: config.droplet_color,
        })
    }

    /// Recompiles every kernel, keeping the current ones if any fails.
    pub fn reload_kernels(&mut self, context: &mut Context, library: &ShaderLibrary) -> Result<(), GpuError> {
        self.kernels = Kernels::compile(context, library)?;
        Ok(())
    }

    #[must_use]
    pub fn caustics(&self) -> &Texture {
        &self.caustics
    }

    #[must_use]
    pub fn light(&self) -> Vector3 {
        self.light
    }

    #[must_use]
    pub fn obstacle(&self) -> Option<Obstacle> {
        self.obstacle
    }

    pub fn set_obstacle(&mut self, obstacle: Option<Obstacle>) {
        self.obstacle = obstacle;
    }

    fn sphere_uniforms(&self) -> [(&'static str, UniformValue); 2] {
        self.obstacle.unwrap_or(NO_OBSTACLE).uniforms()
    }

    /// Projects refracted light through the current water surface onto the
    /// pool floor, storing intensity in red and rim shadow in green.
    pub fn update_caustics(
        &mut self,
        context: &mut Context,
        water: &Water,
        transforms: &TransformContext,
    ) -> Result<(), GpuError> {
        let sphere = self.sphere_uniforms();
        let light = self.light;
        let shader = &mut self.kernels.caustics;
        let mesh = &self.water_mesh;
        self.caustics.draw_to(context, |context| {
            context.set_clear_color([0.0; 4]);
            context.clear(ClearFlags::COLOR)?;
            water.texture().bind(context, WATER_UNIT);
            shader
                .uniforms(
                    context,
                    &[
                        ("light", light.into()),
                        ("water", UniformValue::Sampler(WATER_UNIT)),
                    ],
                )?
                .uniforms(context, &sphere)?
                .draw(context, transforms, mesh, Primitive::Triangles)
        })
    }

    fn bind_pool(&self, context: &mut Context, water: &Water) {
        water.texture().bind(context, WATER_UNIT);
        self.tiles.bind(context, TILES_UNIT);
        self.caustics.bind(context, CAUSTICS_UNIT);
    }

    fn pool_uniforms(&self) -> [(&'static str, UniformValue); 4] {
        [
            ("light", self.light.into()),
            ("water", UniformValue::Sampler(WATER_UNIT)),
            ("tiles", UniformValue::Sampler(TILES_UNIT)),
            ("caustic_tex", UniformValue::Sampler(CAUSTICS_UNIT)),
        ]
    }

    /// Draws the tiled walls and floor, culling back faces.
    pub fn render_pool(
        &mut self,
        context: &mut Context,
        water: &Water,
        transforms: &TransformContext,
    ) -> Result<(), GpuError> {
        context.set_cull_mode(CullMode::Back);
        let result = self.draw_pool(context, water, transforms);
        context.set_cull_mode(CullMode::None);
        result
    }

    fn draw_pool(&mut self, context: &mut Context, water: &Water, transforms: &TransformContext) -> Result<(), GpuError> {
        self.bind_pool(context, water);
        let (pool, sphere) = (self.pool_uniforms(), self.sphere_uniforms());
        self.kernels
            .pool
            .uniforms(context, &pool)?
            .uniforms(context, &sphere)?
            .draw(context, transforms, &self.pool_mesh, Primitive::Triangles)
    }

    /// Draws the surface twice: front faces are culled for the view from
    /// above, back faces for the view from below.
    pub fn render_water(
        &mut self,
        context: &mut Context,
        water: &Water,
        sky: &Cubemap,
        transforms: &TransformContext,
        eye: Vector3,
    ) -> Result<(), GpuError> {
        let result = self.draw_surface(context, water, sky, transforms, eye);
        context.set_cull_mode(CullMode::None);
        result
    }

    fn draw_surface(
        &mut self,
        context: &mut Context,
        water: &Water,
        sky: &Cubemap,
        transforms: &TransformContext,
        eye: Vector3,
    ) -> Result<(), GpuError> {
        self.bind_pool(context, water);
        sky.bind(context, SKY_UNIT);
        let (pool, sphere) = (self.pool_uniforms(), self.sphere_uniforms());
        let surface = [("eye", UniformValue::from(eye)), ("sky", UniformValue::Sampler(SKY_UNIT))];

        for (cull, shader) in [
            (CullMode::Front, &mut self.kernels.surface_above),
            (CullMode::Back, &mut self.kernels.surface_under),
        ] {
            context.set_cull_mode(cull);
            shader
                .uniforms(context, &pool)?
                .uniforms(context, &sphere)?
                .uniforms(context, &surface)?
                .draw(context, transforms, &self.water_mesh, Primitive::Triangles)?;
        }
        Ok(())
    }

    /// Draws the obstacle, if there is one.
    pub fn render_obstacle(
        &mut self,
        context: &mut Context,
        water: &Water,
        transforms: &TransformContext,
    ) -> Result<(), GpuError> {
        let Some(obstacle) = self.obstacle else {
            return Ok(());
        };
        self.bind_pool(context, water);
        let pool = self.pool_uniforms();
        self.kernels
            .obstacle
            .uniforms(context, &pool)?
            .uniforms(context, &obstacle.uniforms())?
            .draw(context, transforms, &self.obstacle_mesh, Primitive::Triangles)
    }

    /// Draws each live droplet as a small translucent sphere, blended over
    /// the scene.
    pub fn render_droplets<'a>(
        &mut self,
        context: &mut Context,
        transforms: &mut TransformContext,
        droplets: impl IntoIterator<Item = &'a Droplet>,
    ) -> Result<(), GpuError> {
        context.set_blend(true);
        let result = self.draw_droplets(context, transforms, droplets);
        context.set_blend(false);
        result
    }

    fn draw_droplets<'a>(
        &mut self,
        context: &mut Context,
        transforms: &mut TransformContext,
        droplets: impl IntoIterator<Item = &'a Droplet>,
    ) -> Result<(), GpuError> {
        let shader = &mut self.kernels.droplet;
        shader.uniforms(context, &[("color", UniformValue::Vec4(self.droplet_color))])?;
        for droplet in droplets {
            let mut scoped = transforms.scoped_model_view();
            let (position, radius) = (droplet.position, droplet.radius);
            scoped
                .model_view
                .translate(position.x, position.y, position.z)
                .scale(radius, radius, radius);
            shader.draw(context, &scoped, &self.droplet_mesh, Primitive::Triangles)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_mesh_drops_one_face() {
        let cube = Mesh::cube(MeshOptions::default());
        let pool = pool_mesh();
        assert_eq!(pool.triangle_count(), cube.triangle_count() - 2);
        let removed = &cube.triangles.as_ref().unwrap()[4..6];
        let kept = pool.triangles.as_ref().unwrap();
        assert!(removed.iter().all(|t| !kept.contains(t)));
    }

    #[test]
    fn obstacle_uniforms_carry_center_and_radius() {
        let obstacle = Obstacle {
            center: [0.1, -0.2, 0.3],
            radius: 0.25,
        };
        let [(_, center), (_, radius)] = obstacle.uniforms();
        assert_eq!(center, UniformValue::Vec3([0.1, -0.2, 0.3]));
        assert_eq!(radius, UniformValue::Scalar(0.25));
    }
}
