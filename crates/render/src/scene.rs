//! The interactive scene: simulation, droplets, camera and pointer input
//! tied together into one frame update.

use std::{
    path::PathBuf,
    time::{Duration, Instant},
};

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use water_gpu::{ClearFlags, Context, GpuError, ShaderLibrary, Texture, TextureOptions, Wrap};
use water_math::{Raytracer, TransformContext, Vector3, Viewport};
use water_sim::{DropletConfig, DropletSystem, RandomDropConfig, RandomDrops, Water, DEFAULT_RESOLUTION};

use crate::{
    assets,
    camera::OrbitCamera,
    cubemap::Cubemap,
    renderer::{Obstacle, Renderer},
};

const GENERATED_TILES: (u32, u32) = (256, 8);
const GENERATED_SKY: u32 = 128;

/// Frames longer than this are dropped rather than simulated, so the water
/// does not lurch after the window was hidden or the process stalled.
pub const MAX_FRAME_SECONDS: f32 = 1.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Edge length of the simulation textures.
    pub resolution: u32,
    /// Subdivisions of the rendered water surface.
    pub water_detail: u32,
    pub caustics_resolution: u32,
    /// Direction towards the sun. Normalized on use.
    pub light: [f32; 3],
    pub clear_color: [f32; 4],
    pub droplet_color: [f32; 4],
    pub droplets: DropletConfig,
    pub random_drops: RandomDropConfig,
    /// Minimum time between droplets while dragging across the water.
    pub drag_interval_ms: u64,
    pub camera: OrbitCamera,
    /// Tile image for the pool walls. A checker pattern is generated when
    /// unset.
    pub tiles: Option<PathBuf>,
    /// Sky faces ordered +x, -x, +y, -y, +z, -z. A gradient is generated
    /// when unset.
    pub sky: Option<[PathBuf; 6]>,
    pub obstacle: Option<Obstacle>,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            resolution: DEFAULT_RESOLUTION,
            water_detail: 200,
            caustics_resolution: 1024,
            light: [0.0, 1.0, 0.0],
            clear_color: [0.82, 0.85, 0.88, 1.0],
            droplet_color: [0.92, 0.95, 0.98, 0.6],
            droplets: DropletConfig::default(),
            random_drops: RandomDropConfig::default(),
            drag_interval_ms: 70,
            camera: OrbitCamera::default(),
            tiles: None,
            sky: None,
            obstacle: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Drag {
    Idle,
    /// Rain droplets where the pointer crosses the water.
    Drops { last: Instant },
    /// Turn the camera, remembering the previous pointer position.
    Orbit { x: f32, y: f32 },
}

/// What [`Scene::start_drag`] decided the gesture does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragMode {
    Drops,
    Orbit,
}

fn load_tiles(context: &mut Context, config: &SceneConfig) -> anyhow::Result<Texture> {
    let image = match &config.tiles {
        Some(path) => assets::load_image(path)?,
        None => assets::checker_tiles(GENERATED_TILES.0, GENERATED_TILES.1),
    };
    let options = TextureOptions::default().with_wrap(Wrap::Repeat).with_mipmaps();
    Ok(Texture::from_image(context, &image, options)?)
}

fn load_sky(context: &mut Context, config: &SceneConfig) -> anyhow::Result<Cubemap> {
    Ok(match &config.sky {
        Some(paths) => Cubemap::load(context, paths)?,
        None => Cubemap::gradient(context, GENERATED_SKY)?,
    })
}

pub struct Scene {
    config: SceneConfig,
    water: Water,
    renderer: Renderer,
    sky: Cubemap,
    droplets: DropletSystem,
    random_drops: RandomDrops,
    camera: OrbitCamera,
    transforms: TransformContext,
    viewport: Viewport,
    drag: Drag,
    paused: bool,
    frames: u64,
}

impl Scene {
    /// Builds the simulation and renderer on `context`, drawing into its
    /// current viewport. `seed` makes the random drops reproducible.
    pub fn new(
        context: &mut Context,
        library: &ShaderLibrary,
        config: SceneConfig,
        seed: Option<u64>,
    ) -> anyhow::Result<Self> {
        let water = Water::new(context, library, config.resolution).context("creating the water simulation")?;
        let tiles = load_tiles(context, &config).context("loading pool tiles")?;
        let sky = load_sky(context, &config).context("loading the sky cubemap")?;
        let renderer = Renderer::new(context, library, &config, tiles).context("creating the renderer")?;

        let viewport = context.viewport();
        let mut transforms = TransformContext::new();
        OrbitCamera::set_projection(&mut transforms, viewport);
        let camera = config.camera;
        camera.apply(&mut transforms);

        tracing::info!(
            resolution = config.resolution,
            obstacle = config.obstacle.is_some(),
            random_drops = config.random_drops.enabled,
            "scene ready"
        );
        Ok(Self {
            droplets: DropletSystem::new(config.droplets),
            random_drops: RandomDrops::new(config.random_drops, seed),
            config,
            water,
            renderer,
            sky,
            camera,
            transforms,
            viewport,
            drag: Drag::Idle,
            paused: false,
            frames: 0,
        })
    }

    /// Advances the simulation by `seconds`. Long frames and paused scenes
    /// leave everything untouched.
    pub fn update(&mut self, context: &mut Context, seconds: f32) -> Result<(), GpuError> {
        if seconds > MAX_FRAME_SECONDS {
            tracing::debug!(seconds, "skipping long frame");
            return Ok(());
        }
        if self.paused {
            return Ok(());
        }

        if let Some((x, z)) = self.random_drops.update(seconds) {
            self.droplets.spawn(x, z);
        }
        self.water.tick(context)?;
        self.renderer.update_caustics(context, &self.water, &self.transforms)?;
        self.droplets.update(seconds, &mut self.water.sink(context))?;
        self.frames += 1;
        Ok(())
    }

    /// Draws the pool, the water, the obstacle and any falling droplets.
    pub fn draw(&mut self, context: &mut Context) -> Result<(), GpuError> {
        context.set_clear_color(self.config.clear_color);
        context.clear(ClearFlags::ALL)?;
        self.camera.apply(&mut self.transforms);
        let eye = Raytracer::new(&self.transforms, self.viewport).eye;

        context.set_depth_test(true);
        let result = self.draw_passes(context, eye);
        context.set_depth_test(false);
        result
    }

    fn draw_passes(&mut self, context: &mut Context, eye: Vector3) -> Result<(), GpuError> {
        self.renderer.render_pool(context, &self.water, &self.transforms)?;
        self.renderer
            .render_water(context, &self.water, &self.sky, &self.transforms, eye)?;
        self.renderer.render_obstacle(context, &self.water, &self.transforms)?;
        self.renderer
            .render_droplets(context, &mut self.transforms, self.droplets.alive())
    }

    /// One displayed frame: update then draw, bracketed by the device's
    /// frame begin and end.
    pub fn frame(&mut self, context: &mut Context, seconds: f32) -> Result<(), GpuError> {
        context.begin_frame()?;
        let result = self.update(context, seconds).and_then(|()| self.draw(context));
        context.end_frame()?;
        result
    }

    pub fn resize(&mut self, context: &mut Context, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        context.resize(width, height);
        self.viewport = Viewport::new(0, 0, width, height);
        context.set_viewport(self.viewport);
        OrbitCamera::set_projection(&mut self.transforms, self.viewport);
        tracing::debug!(width, height, "resized");
    }

    /// Where the pointer at `(x, y)` window pixels meets the rest plane of
    /// the water.
    fn pick_surface(&mut self, x: f32, y: f32) -> Vector3 {
        self.camera.apply(&mut self.transforms);
        let tracer = Raytracer::new(&self.transforms, self.viewport);
        Raytracer::hit_plane(tracer.eye, tracer.ray_for_pixel(x, y), 0.0)
    }

    fn inside_pool(point: Vector3) -> bool {
        point.x.abs() < 1.0 && point.z.abs() < 1.0
    }

    /// Begins a pointer gesture at `(x, y)`. Pressing over the water drops a
    /// droplet there and keeps raining them while dragging; anywhere else
    /// the drag orbits the camera.
    pub fn start_drag(&mut self, x: f32, y: f32, now: Instant) -> DragMode {
        let point = self.pick_surface(x, y);
        if Self::inside_pool(point) {
            self.droplets.spawn(point.x, point.z);
            self.drag = Drag::Drops { last: now };
            DragMode::Drops
        } else {
            self.drag = Drag::Orbit { x, y };
            DragMode::Orbit
        }
    }

    pub fn during_drag(&mut self, x: f32, y: f32, now: Instant) {
        match self.drag {
            Drag::Idle => {}
            Drag::Drops { last } => {
                let interval = Duration::from_millis(self.config.drag_interval_ms);
                if now.saturating_duration_since(last) <= interval {
                    return;
                }
                let point = self.pick_surface(x, y);
                if Self::inside_pool(point) {
                    self.droplets.spawn(point.x, point.z);
                    self.drag = Drag::Drops { last: now };
                }
            }
            Drag::Orbit { x: old_x, y: old_y } => {
                self.camera.orbit(x - old_x, y - old_y);
                self.drag = Drag::Orbit { x, y };
            }
        }
    }

    pub fn stop_drag(&mut self) {
        self.drag = Drag::Idle;
    }

    /// Flips the pause state and returns the new one.
    pub fn toggle_pause(&mut self) -> bool {
        self.paused = !self.paused;
        tracing::info!(paused = self.paused, "toggled pause");
        self.paused
    }

    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_random_drops(&mut self, enabled: bool) {
        self.random_drops.set_enabled(enabled);
        tracing::info!(enabled, "random drops");
    }

    #[must_use]
    pub fn random_drops_enabled(&self) -> bool {
        self.random_drops.is_enabled()
    }

    /// Moves the obstacle to `center`, pushing aside the water it sweeps
    /// through. Does nothing when the scene has no obstacle.
    pub fn move_obstacle(&mut self, context: &mut Context, center: [f32; 3]) -> Result<(), GpuError> {
        let Some(obstacle) = self.renderer.obstacle() else {
            return Ok(());
        };
        let [ox, oy, oz] = obstacle.center;
        let [nx, ny, nz] = center;
        self.water.move_sphere(
            context,
            Vector3::new(ox, oy, oz),
            Vector3::new(nx, ny, nz),
            obstacle.radius,
        )?;
        self.renderer.set_obstacle(Some(Obstacle { center, ..obstacle }));
        Ok(())
    }

    /// Rebuilds every kernel from `library`. Kernels that were already
    /// running stay in place when the new sources fail to compile.
    pub fn reload_kernels(&mut self, context: &mut Context, library: &ShaderLibrary) -> Result<(), GpuError> {
        self.water.reload_kernels(context, library)?;
        self.renderer.reload_kernels(context, library)?;
        tracing::info!("reloaded scene kernels");
        Ok(())
    }

    #[must_use]
    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    #[must_use]
    pub fn water(&self) -> &Water {
        &self.water
    }

    #[must_use]
    pub fn renderer(&self) -> &Renderer {
        &self.renderer
    }

    #[must_use]
    pub fn droplets(&self) -> &DropletSystem {
        &self.droplets
    }

    pub fn droplets_mut(&mut self) -> &mut DropletSystem {
        &mut self.droplets
    }

    #[must_use]
    pub fn camera(&self) -> &OrbitCamera {
        &self.camera
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    /// Frames simulated so far.
    #[must_use]
    pub fn frames(&self) -> u64 {
        self.frames
    }
}
