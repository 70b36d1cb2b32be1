#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
//! Procedural meshes for the pool, the water surface and the droplets.
//!
//! A [`Mesh`] holds plain CPU-side arrays. Uploading them is the job of the
//! GPU layer; nothing in this crate talks to a device.

pub mod indexer;
pub mod mesh;

mod generators;

pub use indexer::{Indexer, Record};
pub use mesh::{Mesh, MeshError, MeshOptions};
