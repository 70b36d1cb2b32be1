//! The simulation kernels, embedded at build time.

use water_gpu::ShaderLibrary;

pub const DROP: &str = "water_drop";
pub const UPDATE: &str = "water_update";
pub const NORMAL: &str = "water_normal";
pub const SPHERE: &str = "water_sphere";

const VERTEX: &str = "water.vert.wgsl";

/// Every embedded source, by file name.
pub const SOURCES: [(&str, &str); 5] = [
    (VERTEX, include_str!("../shaders/water.vert.wgsl")),
    ("drop.frag.wgsl", include_str!("../shaders/drop.frag.wgsl")),
    ("update.frag.wgsl", include_str!("../shaders/update.frag.wgsl")),
    ("normal.frag.wgsl", include_str!("../shaders/normal.frag.wgsl")),
    ("sphere.frag.wgsl", include_str!("../shaders/sphere.frag.wgsl")),
];

/// Registers the simulation sources and programs in `library`.
pub fn register_kernels(library: &mut ShaderLibrary) {
    for (name, source) in SOURCES {
        library.register_source(name, source);
    }
    library
        .register_program(DROP, VERTEX, "drop.frag.wgsl")
        .register_program(UPDATE, VERTEX, "update.frag.wgsl")
        .register_program(NORMAL, VERTEX, "normal.frag.wgsl")
        .register_program(SPHERE, VERTEX, "sphere.frag.wgsl");
}
