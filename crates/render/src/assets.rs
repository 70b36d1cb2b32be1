//! Images the renderer samples: pool tiles and sky faces, either decoded
//! from disk or generated.

use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use thiserror::Error;
use water_gpu::GpuError;

#[derive(Error, Debug)]
pub enum AssetError {
    #[error("failed to read `{path}`: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode `{path}`: {source}")]
    Decode {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
    #[error("sky face {face} is {width}x{height}, expected {expected}x{expected}")]
    FaceSize {
        face: usize,
        width: u32,
        height: u32,
        expected: u32,
    },
    #[error(transparent)]
    Gpu(#[from] GpuError),
}

/// Reads and decodes an image file into RGBA8.
pub fn load_image(path: &Path) -> Result<RgbaImage, AssetError> {
    let bytes = std::fs::read(path).map_err(|source| AssetError::Io {
        path: path.to_owned(),
        source,
    })?;
    let image = image::load_from_memory(&bytes).map_err(|source| AssetError::Decode {
        path: path.to_owned(),
        source,
    })?;
    tracing::debug!(path = %path.display(), width = image.width(), height = image.height(), "decoded image");
    Ok(image.to_rgba8())
}

const TILE: Rgba<u8> = Rgba([214, 226, 232, 255]);
const GROUT: Rgba<u8> = Rgba([120, 134, 142, 255]);

/// Light tiles separated by darker grout, `count` tiles along each edge.
#[must_use]
pub fn checker_tiles(size: u32, count: u32) -> RgbaImage {
    let cell = (size / count.max(1)).max(1);
    let grout = (cell / 16).max(1);
    RgbaImage::from_fn(size, size, |x, y| {
        let (u, v) = (x % cell, y % cell);
        if u < grout || v < grout {
            GROUT
        } else if ((x / cell) + (y / cell)) % 2 == 0 {
            TILE
        } else {
            let Rgba([r, g, b, a]) = TILE;
            Rgba([r - 10, g - 8, b - 6, a])
        }
    })
}

/// Direction through texel `(s, t)` of cube face `face`, both in `[-1, 1]`
/// with `t` growing downwards. Faces are ordered +x, -x, +y, -y, +z, -z.
fn face_direction(face: usize, s: f32, t: f32) -> [f32; 3] {
    match face {
        0 => [1.0, -t, -s],
        1 => [-1.0, -t, s],
        2 => [s, 1.0, t],
        3 => [s, -1.0, -t],
        4 => [s, -t, 1.0],
        _ => [-s, -t, -1.0],
    }
}

fn mix(a: [f32; 3], b: [f32; 3], t: f32) -> [f32; 3] {
    [a[0] + (b[0] - a[0]) * t, a[1] + (b[1] - a[1]) * t, a[2] + (b[2] - a[2]) * t]
}

/// One face of a sky that fades from a pale horizon to a deeper zenith.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn gradient_sky_face(face: usize, size: u32) -> RgbaImage {
    const HORIZON: [f32; 3] = [0.86, 0.9, 0.94];
    const ZENITH: [f32; 3] = [0.35, 0.55, 0.85];
    const GROUND: [f32; 3] = [0.55, 0.58, 0.6];

    let scale = 2.0 / size.max(1) as f32;
    RgbaImage::from_fn(size, size, |x, y| {
        let s = (x as f32 + 0.5) * scale - 1.0;
        let t = (y as f32 + 0.5) * scale - 1.0;
        let [dx, dy, dz] = face_direction(face, s, t);
        let height = dy / (dx * dx + dy * dy + dz * dz).sqrt();
        let color = if height >= 0.0 {
            mix(HORIZON, ZENITH, height.sqrt())
        } else {
            mix(HORIZON, GROUND, (-height).sqrt())
        };
        Rgba([
            (color[0] * 255.0) as u8,
            (color[1] * 255.0) as u8,
            (color[2] * 255.0) as u8,
            255,
        ])
    })
}
