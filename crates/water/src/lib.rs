#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! # Water Simulation
//!
//! The height-field water simulation and the droplets that disturb it.
//!
//! ## Key Components
//!
//! -   **[`Water`]:** owns the double-buffered state textures and the drop,
//!     update, normal and sphere kernels. Every pass reads the current
//!     texture, renders into the other one and swaps; [`Water::tick`] runs
//!     two simulation steps followed by a normal update.
//! -   **[`DropletSystem`]:** CPU-integrated droplets that fall under gravity
//!     and splash into any [`DropSink`] once they reach the surface.
//! -   **[`RandomDrops`]:** a seeded timer that picks a random landing spot
//!     once per interval.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use water_gpu::{Context, RecordingDevice, ShaderLibrary};
//! use water_sim::{register_kernels, DropletSystem, Water};
//!
//! let mut context = Context::new(Box::new(RecordingDevice::new()));
//! let mut library = ShaderLibrary::new();
//! register_kernels(&mut library);
//!
//! let mut water = Water::new(&mut context, &library, 256)?;
//! let mut droplets = DropletSystem::default();
//! droplets.spawn(0.2, -0.4);
//! for _ in 0..60 {
//!     water.tick(&mut context)?;
//!     droplets.update(1.0 / 60.0, &mut water.sink(&mut context))?;
//! }
//! ```

pub mod droplet;
pub mod kernels;
pub mod water;

pub use droplet::{DropSink, Droplet, DropletConfig, DropletSystem, RandomDropConfig, RandomDrops};
pub use kernels::register_kernels;
pub use water::{Precision, Water, WaterSink, DEFAULT_RESOLUTION};
