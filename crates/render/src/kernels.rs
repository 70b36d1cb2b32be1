//! The pool, surface, caustics and droplet kernels, embedded at build time.

use water_gpu::ShaderLibrary;

pub const CAUSTICS: &str = "caustics";
pub const SURFACE_ABOVE: &str = "surface_above";
pub const SURFACE_UNDER: &str = "surface_under";
pub const POOL: &str = "pool";
pub const OBSTACLE: &str = "obstacle";
pub const DROPLET: &str = "droplet";

pub const SOURCES: [(&str, &str); 13] = [
    ("pool.wgsl", include_str!("../shaders/pool.wgsl")),
    ("surface.wgsl", include_str!("../shaders/surface.wgsl")),
    ("surface.vert.wgsl", include_str!("../shaders/surface.vert.wgsl")),
    ("surface_above.frag.wgsl", include_str!("../shaders/surface_above.frag.wgsl")),
    ("surface_under.frag.wgsl", include_str!("../shaders/surface_under.frag.wgsl")),
    ("pool.vert.wgsl", include_str!("../shaders/pool.vert.wgsl")),
    ("pool.frag.wgsl", include_str!("../shaders/pool.frag.wgsl")),
    ("obstacle.vert.wgsl", include_str!("../shaders/obstacle.vert.wgsl")),
    ("obstacle.frag.wgsl", include_str!("../shaders/obstacle.frag.wgsl")),
    ("caustics.vert.wgsl", include_str!("../shaders/caustics.vert.wgsl")),
    ("caustics.frag.wgsl", include_str!("../shaders/caustics.frag.wgsl")),
    ("droplet.vert.wgsl", include_str!("../shaders/droplet.vert.wgsl")),
    ("droplet.frag.wgsl", include_str!("../shaders/droplet.frag.wgsl")),
];

/// Registers the rendering sources and programs in `library`.
pub fn register_kernels(library: &mut ShaderLibrary) {
    for (name, source) in SOURCES {
        library.register_source(name, source);
    }
    library
        .register_program(CAUSTICS, "caustics.vert.wgsl", "caustics.frag.wgsl")
        .register_program(SURFACE_ABOVE, "surface.vert.wgsl", "surface_above.frag.wgsl")
        .register_program(SURFACE_UNDER, "surface.vert.wgsl", "surface_under.frag.wgsl")
        .register_program(POOL, "pool.vert.wgsl", "pool.frag.wgsl")
        .register_program(OBSTACLE, "obstacle.vert.wgsl", "obstacle.frag.wgsl")
        .register_program(DROPLET, "droplet.vert.wgsl", "droplet.frag.wgsl");
}

/// A library holding every kernel the application uses, simulation included.
#[must_use]
pub fn full_library() -> ShaderLibrary {
    let mut library = ShaderLibrary::new();
    water_sim::register_kernels(&mut library);
    register_kernels(&mut library);
    library
}
