//! Six-faced sky texture sampled by the surface kernels.

use std::path::PathBuf;

use image::RgbaImage;
use water_gpu::{Context, Texture, TextureOptions};

use crate::assets::{self, AssetError};

/// Face names in upload order.
pub const FACES: [&str; 6] = ["xpos", "xneg", "ypos", "yneg", "zpos", "zneg"];

#[derive(Debug)]
pub struct Cubemap {
    texture: Texture,
}

impl Cubemap {
    /// Uploads six square faces of equal size, ordered as [`FACES`].
    pub fn from_faces(context: &mut Context, faces: &[RgbaImage; 6]) -> Result<Self, AssetError> {
        let expected = faces[0].width();
        for (face, image) in faces.iter().enumerate() {
            if image.width() != expected || image.height() != expected {
                return Err(AssetError::FaceSize {
                    face,
                    width: image.width(),
                    height: image.height(),
                    expected,
                });
            }
        }
        let texture = Texture::cube(context, expected, TextureOptions::default())?;
        for (face, image) in (0u32..).zip(faces) {
            texture.write_face(context, face, image)?;
        }
        Ok(Self { texture })
    }

    /// Loads the faces from `paths`, ordered as [`FACES`].
    pub fn load(context: &mut Context, paths: &[PathBuf; 6]) -> Result<Self, AssetError> {
        let mut faces: [RgbaImage; 6] = Default::default();
        for (face, path) in faces.iter_mut().zip(paths) {
            *face = assets::load_image(path)?;
        }
        tracing::info!(size = faces[0].width(), "loaded sky cubemap");
        Self::from_faces(context, &faces)
    }

    /// A generated horizon-to-zenith sky.
    pub fn gradient(context: &mut Context, size: u32) -> Result<Self, AssetError> {
        let faces = std::array::from_fn(|face| assets::gradient_sky_face(face, size));
        Self::from_faces(context, &faces)
    }

    pub fn bind(&self, context: &mut Context, unit: u32) {
        self.texture.bind(context, unit);
    }

    #[must_use]
    pub fn texture(&self) -> &Texture {
        &self.texture
    }
}
