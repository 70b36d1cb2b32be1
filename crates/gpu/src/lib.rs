#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! # Water GPU
//!
//! The device layer between the simulation and whatever is actually drawing
//! pixels.
//!
//! ## Key Components
//!
//! -   **[`Device`]:** a small, GL-flavoured command interface. Two backends
//!     implement it: [`RecordingDevice`] (feature `mock`, on by default) keeps
//!     an inspectable log of every command and needs no GPU, while
//!     `WgpuDevice` (feature `wgpu`) drives a real adapter through `wgpu`.
//! -   **[`Context`]:** owns the device and the single [`RenderTarget`] that
//!     [`Texture::draw_to`] checks out for the duration of an offscreen pass.
//! -   **[`Buffer`], [`Texture`], [`PingPong`], [`GpuMesh`]:** device
//!     resources. `PingPong` is the two-slot texture arena the simulation
//!     reads from and writes to in turn.
//! -   **[`Shader`]:** a compiled kernel pair plus the uniform plumbing that
//!     feeds it, including the camera matrices it references.
//! -   **[`ShaderLibrary`]:** named kernel sources, embedded at build time and
//!     optionally overridden from a directory for hot reloading.
//!
//! Kernels are WGSL with two additions, handled by [`source::assemble`]:
//! `uniform name: type;` declarations, and `sampler2D`/`samplerCube` uniform
//! types that expand to a texture and sampler pair.

pub mod backend;
pub mod buffer;
pub mod context;
pub mod library;
pub mod mesh;
pub mod shader;
pub mod source;
pub mod texture;

pub use backend::{
    Attribute, BufferHandle, BufferTarget, Capabilities, ClearFlags, CullMode, DepthBufferHandle,
    Device, Filter, Primitive, ProgramHandle, RenderState, RenderTargetBinding, TextureDescriptor,
    TextureFormat, TextureHandle, TextureKind, TextureType, UniformLocation, UniformUpload, Wrap,
};
#[cfg(feature = "mock")]
pub use backend::recording::{Command, CommandLog, RecordingDevice};
#[cfg(feature = "wgpu")]
pub use backend::wgpu_device::WgpuDevice;
pub use buffer::Buffer;
pub use context::{Context, RenderTarget};
pub use library::ShaderLibrary;
pub use mesh::GpuMesh;
pub use shader::{Shader, UniformValue};
pub use source::{CameraMatrix, ProgramLayout, ProgramSource, SamplerDimension, UniformType};
pub use texture::{PingPong, Texture, TextureOptions};
pub use water_math::Viewport;

use std::fmt;

use thiserror::Error;

/// A device feature the caller asked for and did not get.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    FloatTextures,
    FloatLinearFiltering,
    HalfFloatTextures,
    HalfFloatLinearFiltering,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::FloatTextures => "floating-point texture support",
            Self::FloatLinearFiltering => "linear filtering of floating-point textures",
            Self::HalfFloatTextures => "half-float texture support",
            Self::HalfFloatLinearFiltering => "linear filtering of half-float textures",
        })
    }
}

#[derive(Error, Debug)]
pub enum GpuError {
    #[error("{0} is required but not supported")]
    MissingCapability(Capability),
    #[error("rendering to this texture is not supported (incomplete render target)")]
    IncompleteRenderTarget,
    #[error("the render target is already checked out; draw_to scopes cannot nest")]
    RenderTargetBusy,
    #[error("compile error in `{label}`: {log}")]
    Compile { label: String, log: String },
    #[error("link error in `{label}`: {log}")]
    Link { label: String, log: String },
    #[error("buffer elements not of consistent size, average size is {average}")]
    InconsistentBuffer { average: f32 },
    #[error("don't know how to load uniform of length {0}")]
    UnsupportedUniformLength(usize),
    #[error("uniform `{name}` is declared as {expected:?} but was given {actual}")]
    UniformTypeMismatch {
        name: String,
        expected: UniformType,
        actual: &'static str,
    },
    #[error("draw issued with no program in use")]
    NoProgram,
    #[error("unknown or destroyed device handle")]
    InvalidHandle,
    #[error("no kernel named `{0}` in the shader library")]
    UnknownKernel(String),
    #[error("i/o error reading `{path}`: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error(transparent)]
    Mesh(#[from] water_geometry::MeshError),
    #[error("backend not available: {0}")]
    BackendUnavailable(String),
    #[error("surface error: {0}")]
    Surface(String),
}
