use thiserror::Error;

use crate::Indexer;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MeshError {
    #[error("attribute `{attribute}` has {found} elements, expected {expected}")]
    AttributeLength {
        attribute: &'static str,
        expected: usize,
        found: usize,
    },
    #[error("{list} index {index} out of range for {vertex_count} vertices")]
    IndexOutOfRange {
        list: &'static str,
        index: u32,
        vertex_count: usize,
    },
}

/// Which optional arrays a generated mesh carries.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MeshOptions {
    pub coords: bool,
    pub normals: bool,
    pub colors: bool,
    pub triangles: bool,
    /// Also build the unique-edge line list.
    pub lines: bool,
}

impl Default for MeshOptions {
    fn default() -> Self {
        Self {
            coords: false,
            normals: false,
            colors: false,
            triangles: true,
            lines: false,
        }
    }
}

impl MeshOptions {
    #[must_use]
    pub fn with_coords(mut self) -> Self {
        self.coords = true;
        self
    }

    #[must_use]
    pub fn with_normals(mut self) -> Self {
        self.normals = true;
        self
    }

    #[must_use]
    pub fn with_lines(mut self) -> Self {
        self.lines = true;
        self
    }
}

/// Vertex attributes plus index lists. Positions are always present.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Mesh {
    pub vertices: Vec<[f32; 3]>,
    pub coords: Option<Vec<[f32; 2]>>,
    pub normals: Option<Vec<[f32; 3]>>,
    pub colors: Option<Vec<[f32; 4]>>,
    pub triangles: Option<Vec<[u32; 3]>>,
    pub lines: Option<Vec<[u32; 2]>>,
}

impl Mesh {
    /// Empty mesh with the arrays selected by `options` switched on.
    #[must_use]
    pub fn new(options: MeshOptions) -> Self {
        Self {
            vertices: Vec::new(),
            coords: options.coords.then(Vec::new),
            normals: options.normals.then(Vec::new),
            colors: options.colors.then(Vec::new),
            triangles: options.triangles.then(Vec::new),
            lines: options.lines.then(Vec::new),
        }
    }

    #[must_use]
    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    #[must_use]
    pub fn triangle_count(&self) -> usize {
        self.triangles.as_ref().map_or(0, Vec::len)
    }

    /// Replaces the line list with every distinct triangle edge.
    pub fn compute_wireframe(&mut self) {
        let mut indexer = Indexer::new();
        for &[a, b, c] in self.triangles.iter().flatten() {
            for (from, to) in [(a, b), (b, c), (c, a)] {
                indexer.add([from.min(to), from.max(to)]);
            }
        }
        self.lines = Some(indexer.into_unique());
    }

    /// Checks that every enabled attribute matches the vertex count and every
    /// index points at a vertex.
    ///
    /// # Errors
    ///
    /// The first [`MeshError`] found.
    pub fn validate(&self) -> Result<(), MeshError> {
        let expected = self.vertices.len();
        let lengths = [
            ("coords", self.coords.as_ref().map(Vec::len)),
            ("normals", self.normals.as_ref().map(Vec::len)),
            ("colors", self.colors.as_ref().map(Vec::len)),
        ];
        for (attribute, found) in lengths {
            if let Some(found) = found.filter(|&found| found != expected) {
                return Err(MeshError::AttributeLength {
                    attribute,
                    expected,
                    found,
                });
            }
        }

        let triangles = self.triangles.iter().flatten().flat_map(|t| t.iter());
        let lines = self.lines.iter().flatten().flat_map(|l| l.iter());
        for (list, index) in triangles
            .map(|&i| ("triangles", i))
            .chain(lines.map(|&i| ("lines", i)))
        {
            if index as usize >= expected {
                return Err(MeshError::IndexOutOfRange {
                    list,
                    index,
                    vertex_count: expected,
                });
            }
        }
        Ok(())
    }

    pub(crate) fn finish(mut self, options: MeshOptions) -> Self {
        if let Some(colors) = self.colors.as_mut() {
            colors.resize(self.vertices.len(), [1.0; 4]);
        }
        if options.lines {
            self.compute_wireframe();
        }
        tracing::debug!(
            vertices = self.vertices.len(),
            triangles = self.triangle_count(),
            "generated mesh"
        );
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triangle() -> Mesh {
        Mesh {
            vertices: vec![[0.0; 3], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]],
            triangles: Some(vec![[0, 1, 2]]),
            ..Mesh::default()
        }
    }

    #[test]
    fn validate_accepts_consistent_mesh() {
        assert_eq!(triangle().validate(), Ok(()));
    }

    #[test]
    fn validate_rejects_short_attribute() {
        let mut mesh = triangle();
        mesh.normals = Some(vec![[0.0, 0.0, 1.0]]);
        assert_eq!(
            mesh.validate(),
            Err(MeshError::AttributeLength {
                attribute: "normals",
                expected: 3,
                found: 1
            })
        );
    }

    #[test]
    fn validate_rejects_dangling_index() {
        let mut mesh = triangle();
        mesh.lines = Some(vec![[0, 3]]);
        assert!(matches!(
            mesh.validate(),
            Err(MeshError::IndexOutOfRange { list: "lines", index: 3, .. })
        ));
    }

    #[test]
    fn wireframe_of_one_triangle_has_three_edges() {
        let mut mesh = triangle();
        mesh.compute_wireframe();
        assert_eq!(mesh.lines, Some(vec![[0, 1], [1, 2], [0, 2]]));
    }
}
