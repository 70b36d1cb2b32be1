#![deny(clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions, clippy::many_single_char_names)]
//! # Water Math
//!
//! The small linear-algebra layer shared by every other crate in the
//! workspace.
//!
//! ## Key Components
//!
//! -   **[`Vector3`]:** a plain `(x, y, z)` value type. Every operation
//!     returns a new value.
//! -   **[`Matrix4`]:** sixteen floats in row-major order. The default value
//!     is the identity. Angles taken by the constructors are in degrees and
//!     the projection constructors follow the OpenGL clip-space convention
//!     (depth in `[-1, 1]`).
//! -   **[`TransformContext`]:** the model-view and projection
//!     [`MatrixStack`]s that draw calls read their camera matrices from,
//!     plus `project`/`unproject` against a [`Viewport`].
//! -   **[`Raytracer`]:** turns a pixel under the pointer into a world-space
//!     ray.
//!
//! ```rust
//! use water_math::{Matrix4, TransformContext, Vector3};
//!
//! let mut transforms = TransformContext::new();
//! transforms.model_view.translate(1.0, 2.0, 3.0);
//! let p = transforms.model_view.current().transform_point(Vector3::ZERO);
//! assert_eq!(p, Vector3::new(1.0, 2.0, 3.0));
//! assert_eq!(Matrix4::default(), Matrix4::identity());
//! ```

pub mod matrix;
pub mod raytracer;
pub mod transform;
pub mod vector;

pub use matrix::Matrix4;
pub use raytracer::Raytracer;
pub use transform::{MatrixStack, ModelViewGuard, StackGuard, TransformContext, Viewport};
pub use vector::Vector3;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    #[error("matrix stack underflow: pop called with no saved matrix")]
    EmptyStack,
}
