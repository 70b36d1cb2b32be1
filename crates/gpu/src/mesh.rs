use water_geometry::Mesh;

use crate::{Attribute, Buffer, Context, GpuError};

/// A [`Mesh`] uploaded to the device: one vertex buffer per present
/// attribute plus the triangle and line index buffers.
#[derive(Debug)]
pub struct GpuMesh {
    vertex_count: u32,
    attributes: Vec<(Attribute, Buffer<f32>)>,
    triangles: Option<Buffer<u32>>,
    lines: Option<Buffer<u32>>,
}

fn upload<const N: usize>(context: &mut Context, records: &[[f32; N]]) -> Result<Buffer<f32>, GpuError> {
    let mut buffer = Buffer::from_records(records);
    buffer.compile(context)?;
    Ok(buffer)
}

fn upload_indices<const N: usize>(context: &mut Context, records: &[[u32; N]]) -> Result<Buffer<u32>, GpuError> {
    let mut buffer = Buffer::from_records(records);
    buffer.compile(context)?;
    Ok(buffer)
}

impl GpuMesh {
    /// Validates `mesh` and uploads everything it carries.
    #[allow(clippy::cast_possible_truncation)]
    pub fn compile(context: &mut Context, mesh: &Mesh) -> Result<Self, GpuError> {
        mesh.validate()?;

        let mut attributes = vec![(Attribute::Position, upload(context, &mesh.vertices)?)];
        if let Some(coords) = &mesh.coords {
            attributes.push((Attribute::TexCoord, upload(context, coords)?));
        }
        if let Some(normals) = &mesh.normals {
            attributes.push((Attribute::Normal, upload(context, normals)?));
        }
        if let Some(colors) = &mesh.colors {
            attributes.push((Attribute::Color, upload(context, colors)?));
        }
        let triangles = mesh
            .triangles
            .as_deref()
            .map(|t| upload_indices(context, t))
            .transpose()?;
        let lines = mesh.lines.as_deref().map(|l| upload_indices(context, l)).transpose()?;

        tracing::debug!(
            vertices = mesh.vertex_count(),
            triangles = mesh.triangle_count(),
            "uploaded mesh"
        );
        Ok(Self {
            vertex_count: mesh.vertex_count() as u32,
            attributes,
            triangles,
            lines,
        })
    }

    #[must_use]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[must_use]
    pub fn attribute(&self, attribute: Attribute) -> Option<&Buffer<f32>> {
        self.attributes.iter().find(|(a, _)| *a == attribute).map(|(_, b)| b)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (Attribute, &Buffer<f32>)> {
        self.attributes.iter().map(|(a, b)| (*a, b))
    }

    #[must_use]
    pub fn triangles(&self) -> Option<&Buffer<u32>> {
        self.triangles.as_ref()
    }

    #[must_use]
    pub fn lines(&self) -> Option<&Buffer<u32>> {
        self.lines.as_ref()
    }
}
