use std::collections::{BTreeMap, HashMap, HashSet};

use water_math::{Matrix4, TransformContext, Vector3};

use crate::{
    source::{self, CameraMatrix},
    Attribute, Context, Device, GpuError, GpuMesh, Primitive, ProgramHandle, ShaderLibrary,
    UniformLocation, UniformUpload,
};

/// A value for [`Shader::uniforms`]. Matrices are row-major, the same layout
/// as [`Matrix4`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum UniformValue {
    Scalar(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Vec4([f32; 4]),
    Mat3([f32; 9]),
    Mat4(Matrix4),
    /// Texture unit for a sampler uniform.
    Sampler(u32),
}

impl UniformValue {
    /// Picks the variant from the number of components.
    ///
    /// # Errors
    ///
    /// [`GpuError::UnsupportedUniformLength`] unless `values` has 1, 2, 3, 4,
    /// 9 or 16 elements.
    pub fn from_slice(values: &[f32]) -> Result<Self, GpuError> {
        Ok(match *values {
            [x] => Self::Scalar(x),
            [x, y] => Self::Vec2([x, y]),
            [x, y, z] => Self::Vec3([x, y, z]),
            [x, y, z, w] => Self::Vec4([x, y, z, w]),
            _ if values.len() == 9 => {
                let mut m = [0.0; 9];
                m.copy_from_slice(values);
                Self::Mat3(m)
            }
            _ if values.len() == 16 => {
                let mut m = [0.0; 16];
                m.copy_from_slice(values);
                Self::Mat4(Matrix4::from_rows(m))
            }
            _ => return Err(GpuError::UnsupportedUniformLength(values.len())),
        })
    }

    /// Device layout. A scalar aimed at a sampler becomes its integer unit.
    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    fn to_upload(self, sampler: bool) -> UniformUpload {
        match self {
            Self::Scalar(x) if sampler => UniformUpload::Int(x as i32),
            Self::Scalar(x) => UniformUpload::Float(x),
            Self::Vec2(v) => UniformUpload::Vec2(v),
            Self::Vec3(v) => UniformUpload::Vec3(v),
            Self::Vec4(v) => UniformUpload::Vec4(v),
            Self::Mat3(m) => UniformUpload::Mat3([m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]]),
            Self::Mat4(m) => UniformUpload::Mat4(m.to_cols_array()),
            Self::Sampler(unit) => UniformUpload::Int(unit as i32),
        }
    }
}

impl From<f32> for UniformValue {
    fn from(x: f32) -> Self {
        Self::Scalar(x)
    }
}

impl From<[f32; 2]> for UniformValue {
    fn from(v: [f32; 2]) -> Self {
        Self::Vec2(v)
    }
}

impl From<[f32; 3]> for UniformValue {
    fn from(v: [f32; 3]) -> Self {
        Self::Vec3(v)
    }
}

impl From<Vector3> for UniformValue {
    fn from(v: Vector3) -> Self {
        Self::Vec3(v.to_array())
    }
}

impl From<[f32; 4]> for UniformValue {
    fn from(v: [f32; 4]) -> Self {
        Self::Vec4(v)
    }
}

impl From<Matrix4> for UniformValue {
    fn from(m: Matrix4) -> Self {
        Self::Mat4(m)
    }
}

/// Transpose of the upper 3×3 of the inverse model-view, row-major.
fn normal_matrix(model_view: &Matrix4) -> [f32; 9] {
    let m = model_view.inverse().upper_3x3();
    [m[0], m[3], m[6], m[1], m[4], m[7], m[2], m[5], m[8]]
}

/// A compiled kernel pair and the lookups needed to feed it.
#[derive(Debug)]
pub struct Shader {
    label: String,
    program: ProgramHandle,
    camera_matrices: Vec<CameraMatrix>,
    samplers: HashSet<String>,
    uniform_locations: HashMap<String, Option<UniformLocation>>,
    attribute_locations: BTreeMap<Attribute, Option<u32>>,
}

impl Shader {
    /// Assembles and compiles a kernel.
    ///
    /// # Errors
    ///
    /// [`GpuError::Compile`] or [`GpuError::Link`] carrying the device's log.
    pub fn new(context: &mut Context, label: &str, vertex: &str, fragment: &str) -> Result<Self, GpuError> {
        let source = source::assemble(label, vertex, fragment)?;
        let program = context.device_mut().compile_program(label, &source)?;
        tracing::debug!(
            kernel = label,
            matrices = ?source.camera_matrices,
            samplers = source.layout.samplers.len(),
            "compiled kernel"
        );
        Ok(Self {
            label: label.to_owned(),
            program,
            camera_matrices: source.camera_matrices,
            samplers: source.layout.samplers.into_iter().map(|s| s.name).collect(),
            uniform_locations: HashMap::new(),
            attribute_locations: BTreeMap::new(),
        })
    }

    /// Compiles the program `name` registered in `library`.
    pub fn from_library(context: &mut Context, library: &ShaderLibrary, name: &str) -> Result<Self, GpuError> {
        let (vertex, fragment) = library.program_sources(name)?;
        Self::new(context, name, &vertex, &fragment)
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn program(&self) -> ProgramHandle {
        self.program
    }

    /// Camera matrices the kernel references, in binding order.
    #[must_use]
    pub fn camera_matrices(&self) -> &[CameraMatrix] {
        &self.camera_matrices
    }

    #[must_use]
    pub fn is_sampler(&self, name: &str) -> bool {
        self.samplers.contains(name)
    }

    fn location(&mut self, device: &dyn Device, name: &str) -> Option<UniformLocation> {
        if let Some(cached) = self.uniform_locations.get(name) {
            return *cached;
        }
        let location = device.uniform_location(self.program, name);
        self.uniform_locations.insert(name.to_owned(), location);
        location
    }

    fn attribute_location(&mut self, device: &dyn Device, attribute: Attribute) -> Option<u32> {
        let program = self.program;
        *self
            .attribute_locations
            .entry(attribute)
            .or_insert_with(|| device.attribute_location(program, attribute))
    }

    /// Sets uniforms on this program, selecting it first. Names the kernel
    /// does not declare are ignored.
    ///
    /// # Errors
    ///
    /// [`GpuError::UniformTypeMismatch`] when a value does not fit its
    /// declaration.
    pub fn uniforms(
        &mut self,
        context: &mut Context,
        values: &[(&str, UniformValue)],
    ) -> Result<&mut Self, GpuError> {
        let device = context.device_mut();
        device.use_program(self.program);
        for (name, value) in values {
            let Some(location) = self.location(&*device, name) else {
                continue;
            };
            let upload = value.to_upload(self.samplers.contains(*name));
            device.set_uniform(location, upload)?;
        }
        Ok(self)
    }

    fn upload_camera_matrices(&mut self, context: &mut Context, transforms: &TransformContext) -> Result<(), GpuError> {
        if self.camera_matrices.is_empty() {
            return Ok(());
        }
        let model_view = *transforms.model_view.current();
        let projection = *transforms.projection.current();
        let model_view_projection = projection.multiply(&model_view);

        let values: Vec<_> = self
            .camera_matrices
            .iter()
            .map(|matrix| {
                let value = match matrix {
                    CameraMatrix::ModelView => UniformValue::Mat4(model_view),
                    CameraMatrix::Projection => UniformValue::Mat4(projection),
                    CameraMatrix::ModelViewProjection => UniformValue::Mat4(model_view_projection),
                    CameraMatrix::ModelViewInverse => UniformValue::Mat4(model_view.inverse()),
                    CameraMatrix::ProjectionInverse => UniformValue::Mat4(projection.inverse()),
                    CameraMatrix::ModelViewProjectionInverse => UniformValue::Mat4(model_view_projection.inverse()),
                    CameraMatrix::Normal => UniformValue::Mat3(normal_matrix(&model_view)),
                };
                (matrix.uniform_name(), value)
            })
            .collect();
        self.uniforms(context, &values)?;
        Ok(())
    }

    /// Draws `mesh` with the current transforms.
    ///
    /// Uses the mesh's triangle or line list for `primitive` when it has one,
    /// otherwise draws its vertices in order. Attributes this program read
    /// for an earlier mesh but `mesh` lacks are disabled.
    #[allow(clippy::cast_possible_truncation)]
    pub fn draw(
        &mut self,
        context: &mut Context,
        transforms: &TransformContext,
        mesh: &GpuMesh,
        primitive: Primitive,
    ) -> Result<(), GpuError> {
        self.upload_camera_matrices(context, transforms)?;
        let device = context.device_mut();
        device.use_program(self.program);

        for (attribute, buffer) in mesh.attributes() {
            let (Some(location), Some(handle)) = (self.attribute_location(&*device, attribute), buffer.handle()) else {
                continue;
            };
            device.enable_attribute(location, handle, buffer.arity() as u32);
        }
        for (attribute, location) in &self.attribute_locations {
            if let Some(location) = location {
                if mesh.attribute(*attribute).is_none() {
                    device.disable_attribute(*location);
                }
            }
        }

        let indices = match primitive {
            Primitive::Triangles => mesh.triangles(),
            Primitive::Lines => mesh.lines(),
        };
        match indices.and_then(|b| b.handle().map(|handle| (handle, b.len()))) {
            Some((handle, len)) => device.draw_elements(primitive, handle, len as u32),
            None => device.draw_arrays(primitive, mesh.vertex_count()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_slice_picks_variant_by_length() {
        assert_eq!(UniformValue::from_slice(&[1.0]).unwrap(), UniformValue::Scalar(1.0));
        assert_eq!(
            UniformValue::from_slice(&[1.0, 2.0, 3.0]).unwrap(),
            UniformValue::Vec3([1.0, 2.0, 3.0])
        );
        assert!(matches!(UniformValue::from_slice(&[0.0; 9]), Ok(UniformValue::Mat3(_))));
        assert!(matches!(UniformValue::from_slice(&[0.0; 16]), Ok(UniformValue::Mat4(_))));
    }

    #[test]
    fn unsupported_lengths_are_rejected() {
        for len in [0, 5, 8, 12] {
            let err = UniformValue::from_slice(&vec![0.0; len]).unwrap_err();
            assert!(matches!(err, GpuError::UnsupportedUniformLength(n) if n == len));
        }
        assert_eq!(
            GpuError::UnsupportedUniformLength(5).to_string(),
            "don't know how to load uniform of length 5"
        );
    }

    #[test]
    fn matrices_upload_column_major() {
        let m = Matrix4::translate(1.0, 2.0, 3.0);
        let UniformUpload::Mat4(cols) = UniformValue::Mat4(m).to_upload(false) else {
            panic!("expected a mat4 upload");
        };
        assert_eq!(&cols[12..15], &[1.0, 2.0, 3.0]);

        let rows = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0];
        let UniformUpload::Mat3(cols) = UniformValue::Mat3(rows).to_upload(false) else {
            panic!("expected a mat3 upload");
        };
        assert_eq!(&cols[..3], &[1.0, 4.0, 7.0]);
    }

    #[test]
    fn scalar_for_sampler_becomes_int() {
        assert_eq!(UniformValue::Scalar(2.0).to_upload(true), UniformUpload::Int(2));
        assert_eq!(UniformValue::Scalar(2.0).to_upload(false), UniformUpload::Float(2.0));
    }

    #[test]
    fn normal_matrix_of_uniform_scale() {
        let n = normal_matrix(&Matrix4::scale(2.0, 2.0, 2.0));
        assert!((n[0] - 0.5).abs() < 1e-6 && (n[4] - 0.5).abs() < 1e-6 && n[1].abs() < 1e-6);
    }
}
