#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! # Water Render
//!
//! Draws the simulated pool and turns pointer input into droplets and camera
//! motion.
//!
//! ## Key Components
//!
//! -   **[`Scene`]:** one frame of the application. Advances the water,
//!     refreshes caustics, integrates droplets, then draws the pool, the
//!     surface from above and below, the obstacle and the droplets.
//! -   **[`Renderer`]:** the rendering kernels and the meshes and caustics
//!     texture they draw with.
//! -   **[`OrbitCamera`]:** pitch/yaw orbit around the pool.
//! -   **[`Cubemap`], [`assets`]:** sky and tile images, from disk or
//!     generated.
//! -   **`run`:** the winit window loop on a wgpu surface (feature `gpu`).

pub mod assets;
pub mod camera;
pub mod cubemap;
pub mod kernels;
pub mod renderer;
#[cfg(feature = "gpu")]
pub mod run;
pub mod scene;

pub use assets::AssetError;
pub use camera::OrbitCamera;
pub use cubemap::Cubemap;
pub use kernels::{full_library, register_kernels};
pub use renderer::{Obstacle, Renderer};
#[cfg(feature = "gpu")]
pub use run::{run, RunOptions};
pub use scene::{DragMode, Scene, SceneConfig};
