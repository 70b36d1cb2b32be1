//! Row-major 4×4 matrices.
//!
//! Element `m[row * 4 + col]`. Points are column vectors, so the translation
//! of an affine matrix lives in `m[3]`, `m[7]` and `m[11]`. Devices expect
//! column-major storage; use [`Matrix4::to_cols_array`] when uploading.

use std::ops::Mul;

use crate::Vector3;

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Matrix4 {
    pub m: [f32; 16],
}

impl Default for Matrix4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Matrix4 {
    pub const IDENTITY: Self = Self {
        m: [
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ],
    };

    #[must_use]
    pub const fn from_rows(m: [f32; 16]) -> Self {
        Self { m }
    }

    #[must_use]
    pub const fn identity() -> Self {
        Self::IDENTITY
    }

    /// `self * other`: transforming a point by the product applies `other`
    /// first, then `self`.
    #[must_use]
    pub fn multiply(&self, other: &Self) -> Self {
        let a = &self.m;
        let b = &other.m;
        let mut r = [0.0; 16];
        for row in 0..4 {
            for col in 0..4 {
                r[row * 4 + col] = a[row * 4] * b[col]
                    + a[row * 4 + 1] * b[4 + col]
                    + a[row * 4 + 2] * b[8 + col]
                    + a[row * 4 + 3] * b[12 + col];
            }
        }
        Self { m: r }
    }

    #[must_use]
    pub fn transpose(&self) -> Self {
        let m = &self.m;
        Self {
            m: [
                m[0], m[4], m[8], m[12], //
                m[1], m[5], m[9], m[13], //
                m[2], m[6], m[10], m[14], //
                m[3], m[7], m[11], m[15],
            ],
        }
    }

    /// Inverse by cofactor expansion over the determinant.
    ///
    /// Singular input is not detected: the division by a zero determinant
    /// leaves infinite or NaN entries in the result.
    #[must_use]
    #[rustfmt::skip]
    pub fn inverse(&self) -> Self {
        let m = &self.m;
        let mut r = [0.0_f32; 16];

        r[0] = m[5]*m[10]*m[15] - m[5]*m[14]*m[11] - m[6]*m[9]*m[15] + m[6]*m[13]*m[11] + m[7]*m[9]*m[14] - m[7]*m[13]*m[10];
        r[1] = -m[1]*m[10]*m[15] + m[1]*m[14]*m[11] + m[2]*m[9]*m[15] - m[2]*m[13]*m[11] - m[3]*m[9]*m[14] + m[3]*m[13]*m[10];
        r[2] = m[1]*m[6]*m[15] - m[1]*m[14]*m[7] - m[2]*m[5]*m[15] + m[2]*m[13]*m[7] + m[3]*m[5]*m[14] - m[3]*m[13]*m[6];
        r[3] = -m[1]*m[6]*m[11] + m[1]*m[10]*m[7] + m[2]*m[5]*m[11] - m[2]*m[9]*m[7] - m[3]*m[5]*m[10] + m[3]*m[9]*m[6];

        r[4] = -m[4]*m[10]*m[15] + m[4]*m[14]*m[11] + m[6]*m[8]*m[15] - m[6]*m[12]*m[11] - m[7]*m[8]*m[14] + m[7]*m[12]*m[10];
        r[5] = m[0]*m[10]*m[15] - m[0]*m[14]*m[11] - m[2]*m[8]*m[15] + m[2]*m[12]*m[11] + m[3]*m[8]*m[14] - m[3]*m[12]*m[10];
        r[6] = -m[0]*m[6]*m[15] + m[0]*m[14]*m[7] + m[2]*m[4]*m[15] - m[2]*m[12]*m[7] - m[3]*m[4]*m[14] + m[3]*m[12]*m[6];
        r[7] = m[0]*m[6]*m[11] - m[0]*m[10]*m[7] - m[2]*m[4]*m[11] + m[2]*m[8]*m[7] + m[3]*m[4]*m[10] - m[3]*m[8]*m[6];

        r[8] = m[4]*m[9]*m[15] - m[4]*m[13]*m[11] - m[5]*m[8]*m[15] + m[5]*m[12]*m[11] + m[7]*m[8]*m[13] - m[7]*m[12]*m[9];
        r[9] = -m[0]*m[9]*m[15] + m[0]*m[13]*m[11] + m[1]*m[8]*m[15] - m[1]*m[12]*m[11] - m[3]*m[8]*m[13] + m[3]*m[12]*m[9];
        r[10] = m[0]*m[5]*m[15] - m[0]*m[13]*m[7] - m[1]*m[4]*m[15] + m[1]*m[12]*m[7] + m[3]*m[4]*m[13] - m[3]*m[12]*m[5];
        r[11] = -m[0]*m[5]*m[11] + m[0]*m[9]*m[7] + m[1]*m[4]*m[11] - m[1]*m[8]*m[7] - m[3]*m[4]*m[9] + m[3]*m[8]*m[5];

        r[12] = -m[4]*m[9]*m[14] + m[4]*m[13]*m[10] + m[5]*m[8]*m[14] - m[5]*m[12]*m[10] - m[6]*m[8]*m[13] + m[6]*m[12]*m[9];
        r[13] = m[0]*m[9]*m[14] - m[0]*m[13]*m[10] - m[1]*m[8]*m[14] + m[1]*m[12]*m[10] + m[2]*m[8]*m[13] - m[2]*m[12]*m[9];
        r[14] = -m[0]*m[5]*m[14] + m[0]*m[13]*m[6] + m[1]*m[4]*m[14] - m[1]*m[12]*m[6] - m[2]*m[4]*m[13] + m[2]*m[12]*m[5];
        r[15] = m[0]*m[5]*m[10] - m[0]*m[9]*m[6] - m[1]*m[4]*m[10] + m[1]*m[8]*m[6] + m[2]*m[4]*m[9] - m[2]*m[8]*m[5];

        let det = m[0]*r[0] + m[1]*r[4] + m[2]*r[8] + m[3]*r[12];
        for value in &mut r {
            *value /= det;
        }
        Self { m: r }
    }

    /// Applies the full matrix to `(v, 1)` and divides by the resulting `w`.
    #[must_use]
    pub fn transform_point(&self, v: Vector3) -> Vector3 {
        let m = &self.m;
        let w = m[12] * v.x + m[13] * v.y + m[14] * v.z + m[15];
        Vector3::new(
            m[0] * v.x + m[1] * v.y + m[2] * v.z + m[3],
            m[4] * v.x + m[5] * v.y + m[6] * v.z + m[7],
            m[8] * v.x + m[9] * v.y + m[10] * v.z + m[11],
        ) / w
    }

    /// Applies only the upper 3×3 block; translation is ignored.
    #[must_use]
    pub fn transform_vector(&self, v: Vector3) -> Vector3 {
        let m = &self.m;
        Vector3::new(
            m[0] * v.x + m[1] * v.y + m[2] * v.z,
            m[4] * v.x + m[5] * v.y + m[6] * v.z,
            m[8] * v.x + m[9] * v.y + m[10] * v.z,
        )
    }

    #[must_use]
    pub const fn scale(x: f32, y: f32, z: f32) -> Self {
        Self {
            m: [
                x, 0.0, 0.0, 0.0, //
                0.0, y, 0.0, 0.0, //
                0.0, 0.0, z, 0.0, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    #[must_use]
    pub const fn translate(x: f32, y: f32, z: f32) -> Self {
        Self {
            m: [
                1.0, 0.0, 0.0, x, //
                0.0, 1.0, 0.0, y, //
                0.0, 0.0, 1.0, z, //
                0.0, 0.0, 0.0, 1.0,
            ],
        }
    }

    /// Rotation of `degrees` about the axis `(x, y, z)`. The axis does not
    /// need to be normalized. A zero angle or a zero axis yields identity.
    #[must_use]
    pub fn rotate(degrees: f32, x: f32, y: f32, z: f32) -> Self {
        if degrees == 0.0 || (x == 0.0 && y == 0.0 && z == 0.0) {
            return Self::identity();
        }

        let d = (x * x + y * y + z * z).sqrt();
        let (x, y, z) = (x / d, y / d, z / d);
        let (s, c) = degrees.to_radians().sin_cos();
        let t = 1.0 - c;

        Self {
            m: [
                x * x * t + c,
                x * y * t - z * s,
                x * z * t + y * s,
                0.0,
                y * x * t + z * s,
                y * y * t + c,
                y * z * t - x * s,
                0.0,
                z * x * t - y * s,
                z * y * t + x * s,
                z * z * t + c,
                0.0,
                0.0,
                0.0,
                0.0,
                1.0,
            ],
        }
    }

    /// Symmetric perspective projection. `fov` is the vertical field of view
    /// in degrees.
    #[must_use]
    pub fn perspective(fov: f32, aspect: f32, near: f32, far: f32) -> Self {
        let y = (fov * std::f32::consts::PI / 360.0).tan() * near;
        let x = y * aspect;
        Self::frustum(-x, x, -y, y, near, far)
    }

    /// General off-axis frustum, mapping depth `near..far` to `-1..1`.
    #[must_use]
    pub fn frustum(l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Self {
        Self {
            m: [
                2.0 * n / (r - l),
                0.0,
                (r + l) / (r - l),
                0.0,
                0.0,
                2.0 * n / (t - b),
                (t + b) / (t - b),
                0.0,
                0.0,
                0.0,
                -(f + n) / (f - n),
                -2.0 * f * n / (f - n),
                0.0,
                0.0,
                -1.0,
                0.0,
            ],
        }
    }

    /// Column-major copy, the layout shader uniforms expect.
    #[must_use]
    pub fn to_cols_array(&self) -> [f32; 16] {
        self.transpose().m
    }

    /// Upper-left 3×3 block, row-major.
    #[must_use]
    pub fn upper_3x3(&self) -> [f32; 9] {
        let m = &self.m;
        [m[0], m[1], m[2], m[4], m[5], m[6], m[8], m[9], m[10]]
    }

    #[must_use]
    pub fn approx_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.m
            .iter()
            .zip(other.m.iter())
            .all(|(a, b)| (a - b).abs() <= epsilon)
    }
}

impl Mul for Matrix4 {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self {
        self.multiply(&rhs)
    }
}

impl From<glam::Mat4> for Matrix4 {
    fn from(value: glam::Mat4) -> Self {
        // glam is column-major, so its column array read as rows is the transpose.
        Self {
            m: value.to_cols_array(),
        }
        .transpose()
    }
}

impl From<Matrix4> for glam::Mat4 {
    fn from(value: Matrix4) -> Self {
        glam::Mat4::from_cols_array(&value.to_cols_array())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f32 = 1e-5;

    #[test]
    fn translate_moves_origin_exactly() {
        let p = Matrix4::translate(3.0, -2.0, 0.5).transform_point(Vector3::ZERO);
        assert_eq!(p, Vector3::new(3.0, -2.0, 0.5));
    }

    #[test]
    fn transform_vector_ignores_translation() {
        let v = Matrix4::translate(10.0, 10.0, 10.0).transform_vector(Vector3::UNIT_X);
        assert_eq!(v, Vector3::UNIT_X);
    }

    #[test]
    fn multiply_applies_right_operand_first() {
        let t = Matrix4::translate(1.0, 0.0, 0.0);
        let s = Matrix4::scale(2.0, 2.0, 2.0);
        let p = (t * s).transform_point(Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(p, Vector3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn rotate_degenerate_is_identity() {
        assert_eq!(Matrix4::rotate(0.0, 1.0, 0.0, 0.0), Matrix4::identity());
        assert_eq!(Matrix4::rotate(45.0, 0.0, 0.0, 0.0), Matrix4::identity());
    }

    #[test]
    fn rotate_quarter_turn_about_z() {
        let p = Matrix4::rotate(90.0, 0.0, 0.0, 5.0).transform_point(Vector3::UNIT_X);
        assert!((p - Vector3::UNIT_Y).length() < EPS, "got {p:?}");
    }

    #[test]
    fn perspective_maps_near_and_far_planes() {
        let p = Matrix4::perspective(45.0, 1.5, 0.1, 100.0);
        let near = p.transform_point(Vector3::new(0.0, 0.0, -0.1));
        let far = p.transform_point(Vector3::new(0.0, 0.0, -100.0));
        assert!((near.z + 1.0).abs() < 1e-4, "near depth {}", near.z);
        assert!((far.z - 1.0).abs() < 1e-4, "far depth {}", far.z);
    }

    #[test]
    fn singular_inverse_is_not_finite() {
        let inv = Matrix4::scale(1.0, 0.0, 1.0).inverse();
        assert!(inv.m.iter().any(|v| !v.is_finite()));
    }

    #[test]
    fn glam_round_trip_preserves_layout() {
        let m = Matrix4::translate(1.0, 2.0, 3.0);
        let g: glam::Mat4 = m.into();
        assert_eq!(g.w_axis.truncate(), glam::Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(Matrix4::from(g), m);
    }
}
