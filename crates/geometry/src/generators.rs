use water_math::Vector3;

use crate::{Indexer, Mesh, MeshOptions};

/// Face corners (indices into the cube's 8 octant corners) and the face normal.
const CUBE_FACES: [([usize; 4], [f32; 3]); 6] = [
    ([0, 4, 2, 6], [-1.0, 0.0, 0.0]),
    ([1, 3, 5, 7], [1.0, 0.0, 0.0]),
    ([0, 1, 4, 5], [0.0, -1.0, 0.0]),
    ([2, 6, 3, 7], [0.0, 1.0, 0.0]),
    ([0, 2, 1, 3], [0.0, 0.0, -1.0]),
    ([4, 5, 6, 7], [0.0, 0.0, 1.0]),
];

/// Sign vector of octant `i`: bit 0 is x, bit 1 is y, bit 2 is z.
#[allow(clippy::cast_precision_loss)]
fn pick_octant(i: usize) -> Vector3 {
    Vector3::new(
        ((i & 1) * 2) as f32 - 1.0,
        (i & 2) as f32 - 1.0,
        ((i & 4) / 2) as f32 - 1.0,
    )
}

/// Pushes barycentric coordinates outwards so the normalized sphere patch has
/// more even triangle sizes.
fn fix(t: f32) -> f32 {
    t + (t - t * t) / 2.0
}

impl Mesh {
    /// A `detail_x` × `detail_y` grid over `[-1, 1]²` in the z = 0 plane,
    /// facing +z.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn plane(detail_x: u32, detail_y: u32, options: MeshOptions) -> Self {
        let detail_x = detail_x.max(1);
        let detail_y = detail_y.max(1);
        let mut mesh = Self::new(options);

        for y in 0..=detail_y {
            let t = y as f32 / detail_y as f32;
            for x in 0..=detail_x {
                let s = x as f32 / detail_x as f32;
                mesh.vertices.push([2.0 * s - 1.0, 2.0 * t - 1.0, 0.0]);
                if let Some(coords) = mesh.coords.as_mut() {
                    coords.push([s, t]);
                }
                if let Some(normals) = mesh.normals.as_mut() {
                    normals.push([0.0, 0.0, 1.0]);
                }
                if x < detail_x && y < detail_y {
                    let i = x + y * (detail_x + 1);
                    if let Some(triangles) = mesh.triangles.as_mut() {
                        triangles.push([i, i + 1, i + detail_x + 1]);
                        triangles.push([i + detail_x + 1, i + 1, i + detail_x + 2]);
                    }
                }
            }
        }

        mesh.finish(options)
    }

    /// The `[-1, 1]³` cube with four unshared vertices per face. Faces are
    /// ordered -x, +x, -y, +y, -z, +z, two triangles each.
    #[must_use]
    #[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
    pub fn cube(options: MeshOptions) -> Self {
        let mut mesh = Self::new(options);

        for (face, (corners, normal)) in CUBE_FACES.iter().enumerate() {
            let v = face as u32 * 4;
            for (j, &corner) in corners.iter().enumerate() {
                mesh.vertices.push(pick_octant(corner).to_array());
                if let Some(coords) = mesh.coords.as_mut() {
                    coords.push([(j & 1) as f32, ((j & 2) / 2) as f32]);
                }
                if let Some(normals) = mesh.normals.as_mut() {
                    normals.push(*normal);
                }
            }
            if let Some(triangles) = mesh.triangles.as_mut() {
                triangles.push([v, v + 1, v + 2]);
                triangles.push([v + 2, v + 1, v + 3]);
            }
        }

        mesh.finish(options)
    }

    /// Unit sphere built from eight octant patches with shared edges merged.
    /// Normals, when requested, equal the positions.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn sphere(detail: u32, options: MeshOptions) -> Self {
        let detail = detail.max(1) as usize;
        let d = detail as f32;
        let mut mesh = Self::new(options);
        let mut indexer: Indexer<([f32; 3], Option<[f32; 2]>)> = Indexer::new();
        let mut triangles = Vec::new();

        for octant in 0..8 {
            let scale = pick_octant(octant);
            let flip = scale.x * scale.y * scale.z > 0.0;
            let tri = |a: u32, b: u32, c: u32| if flip { [a, c, b] } else { [a, b, c] };
            let mut data = Vec::new();
            let row_start = |k: usize| k * (detail + 1) - k * k.saturating_sub(1) / 2;

            for i in 0..=detail {
                for j in 0..=detail - i {
                    let a = i as f32 / d;
                    let b = j as f32 / d;
                    let c = (detail - i - j) as f32 / d;
                    let vertex = Vector3::new(fix(a), fix(b), fix(c)).unit() * scale;
                    let coord = options.coords.then(|| {
                        if scale.y > 0.0 {
                            [1.0 - a, c]
                        } else {
                            [c, 1.0 - a]
                        }
                    });
                    data.push(indexer.add((vertex.to_array(), coord)));
                }

                if i > 0 {
                    let above = row_start(i - 1);
                    let row = row_start(i);
                    for j in 0..=detail - i {
                        let (a, b) = (above + j, row + j);
                        triangles.push(tri(data[a], data[a + 1], data[b]));
                        if i + j < detail {
                            triangles.push(tri(data[b], data[a + 1], data[b + 1]));
                        }
                    }
                }
            }
        }

        let unique = indexer.into_unique();
        mesh.vertices = unique.iter().map(|(v, _)| *v).collect();
        if mesh.coords.is_some() {
            mesh.coords = Some(unique.iter().map(|(_, c)| c.unwrap_or_default()).collect());
        }
        if mesh.normals.is_some() {
            mesh.normals = Some(mesh.vertices.clone());
        }
        if mesh.triangles.is_some() {
            mesh.triangles = Some(triangles);
        }

        mesh.finish(options)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn octant_signs_cover_all_combinations() {
        assert_eq!(pick_octant(0), Vector3::new(-1.0, -1.0, -1.0));
        assert_eq!(pick_octant(7), Vector3::new(1.0, 1.0, 1.0));
        assert_eq!(pick_octant(5), Vector3::new(1.0, -1.0, 1.0));
    }

    #[test]
    fn fix_keeps_endpoints() {
        assert_eq!(fix(0.0), 0.0);
        assert_eq!(fix(1.0), 1.0);
        assert!(fix(0.5) > 0.5);
    }
}
