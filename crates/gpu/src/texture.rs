//! Device textures, the scoped offscreen drawing built on them, and the
//! two-slot arena used for ping-pong passes.

use image::{imageops, RgbaImage};
use water_math::Viewport;

use crate::{
    Capability, Context, Filter, GpuError, TextureDescriptor, TextureFormat, TextureHandle,
    TextureKind, TextureType, Wrap,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TextureOptions {
    pub format: TextureFormat,
    pub ty: TextureType,
    pub min_filter: Filter,
    pub mag_filter: Filter,
    pub wrap_s: Wrap,
    pub wrap_t: Wrap,
    /// Allocate a full mip chain. Only [`Texture::from_image`] fills it.
    pub mipmaps: bool,
}

impl Default for TextureOptions {
    fn default() -> Self {
        Self {
            format: TextureFormat::Rgba,
            ty: TextureType::UnsignedByte,
            min_filter: Filter::Linear,
            mag_filter: Filter::Linear,
            wrap_s: Wrap::ClampToEdge,
            wrap_t: Wrap::ClampToEdge,
            mipmaps: false,
        }
    }
}

impl TextureOptions {
    #[must_use]
    pub fn with_type(mut self, ty: TextureType) -> Self {
        self.ty = ty;
        self
    }

    #[must_use]
    pub fn with_filter(mut self, filter: Filter) -> Self {
        self.min_filter = filter;
        self.mag_filter = filter;
        self
    }

    #[must_use]
    pub fn with_wrap(mut self, wrap: Wrap) -> Self {
        self.wrap_s = wrap;
        self.wrap_t = wrap;
        self
    }

    #[must_use]
    pub fn with_mipmaps(mut self) -> Self {
        self.mipmaps = true;
        self
    }

    fn linear(&self) -> bool {
        self.min_filter == Filter::Linear || self.mag_filter == Filter::Linear
    }
}

fn mip_levels(width: u32, height: u32) -> u32 {
    32 - width.max(height).max(1).leading_zeros()
}

#[derive(Debug)]
pub struct Texture {
    handle: TextureHandle,
    desc: TextureDescriptor,
}

impl Texture {
    /// Allocates an uninitialised 2D texture.
    ///
    /// # Errors
    ///
    /// [`GpuError::MissingCapability`] when a float or half-float texture is
    /// requested on a device without support for it, or with linear filtering
    /// the device cannot do for that precision.
    pub fn new(
        context: &mut Context,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self, GpuError> {
        Self::allocate(context, TextureKind::D2, width, height, options)
    }

    /// Allocates a cubemap with six `size` × `size` faces.
    pub fn cube(context: &mut Context, size: u32, options: TextureOptions) -> Result<Self, GpuError> {
        Self::allocate(context, TextureKind::Cube, size, size, options)
    }

    fn allocate(
        context: &mut Context,
        kind: TextureKind,
        width: u32,
        height: u32,
        options: TextureOptions,
    ) -> Result<Self, GpuError> {
        let caps = context.capabilities();
        match options.ty {
            TextureType::UnsignedByte => {}
            TextureType::Float => {
                if !caps.float_textures {
                    return Err(GpuError::MissingCapability(Capability::FloatTextures));
                }
                if options.linear() && !caps.float_linear_filtering {
                    return Err(GpuError::MissingCapability(Capability::FloatLinearFiltering));
                }
            }
            TextureType::HalfFloat => {
                if !caps.half_float_textures {
                    return Err(GpuError::MissingCapability(Capability::HalfFloatTextures));
                }
                if options.linear() && !caps.half_float_linear_filtering {
                    return Err(GpuError::MissingCapability(Capability::HalfFloatLinearFiltering));
                }
            }
        }

        let desc = TextureDescriptor {
            kind,
            width,
            height,
            format: options.format,
            ty: options.ty,
            min_filter: options.min_filter,
            mag_filter: options.mag_filter,
            wrap_s: options.wrap_s,
            wrap_t: options.wrap_t,
            mip_levels: if options.mipmaps { mip_levels(width, height) } else { 1 },
        };
        let handle = context.device_mut().create_texture(&desc)?;
        Ok(Self { handle, desc })
    }

    /// Uploads a decoded image, bottom row first so that texture coordinate
    /// `(0, 0)` is the lower-left corner of the picture. Mip levels are
    /// downsampled on the CPU when requested.
    pub fn from_image(context: &mut Context, image: &RgbaImage, options: TextureOptions) -> Result<Self, GpuError> {
        let texture = Self::new(context, image.width(), image.height(), options)?;
        let mut level_image = imageops::flip_vertical(image);
        for level in 0..texture.desc.mip_levels {
            if level > 0 {
                let width = (level_image.width() / 2).max(1);
                let height = (level_image.height() / 2).max(1);
                level_image = imageops::resize(&level_image, width, height, imageops::FilterType::Triangle);
            }
            context.device_mut().write_texture(
                texture.handle,
                level,
                0,
                level_image.width(),
                level_image.height(),
                level_image.as_raw(),
            )?;
        }
        Ok(texture)
    }

    /// Writes one face of a cubemap. Faces are ordered +x, -x, +y, -y, +z, -z.
    pub fn write_face(&self, context: &mut Context, face: u32, image: &RgbaImage) -> Result<(), GpuError> {
        context
            .device_mut()
            .write_texture(self.handle, 0, face, image.width(), image.height(), image.as_raw())
    }

    #[must_use]
    pub fn handle(&self) -> TextureHandle {
        self.handle
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.desc.width
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.desc.height
    }

    #[must_use]
    pub fn descriptor(&self) -> &TextureDescriptor {
        &self.desc
    }

    pub fn bind(&self, context: &mut Context, unit: u32) {
        context.device_mut().bind_texture(unit, Some(self.handle));
    }

    pub fn unbind(&self, context: &mut Context, unit: u32) {
        context.device_mut().bind_texture(unit, None);
    }

    /// Whether this texture can be drawn into. Changes no state.
    #[must_use]
    pub fn can_draw_to(&self, context: &Context) -> bool {
        context.device().render_target_complete(self.handle)
    }

    /// Runs `callback` with all drawing redirected into this texture and the
    /// viewport covering it.
    ///
    /// The previous viewport and the window target are restored afterwards,
    /// whether or not `callback` succeeded.
    ///
    /// # Errors
    ///
    /// [`GpuError::RenderTargetBusy`] when called from inside another
    /// `draw_to`, [`GpuError::IncompleteRenderTarget`] when the device cannot
    /// render to this texture, or whatever `callback` returns.
    pub fn draw_to<T, E, F>(&self, context: &mut Context, callback: F) -> Result<T, E>
    where
        F: FnOnce(&mut Context) -> Result<T, E>,
        E: From<GpuError>,
    {
        let mut target = context.checkout_render_target()?;
        let previous = context.viewport();
        if let Err(err) = target.attach(context.device_mut(), self) {
            context.checkin_render_target(target);
            return Err(err.into());
        }
        context.set_viewport(Viewport::new(0, 0, self.desc.width, self.desc.height));

        let result = callback(context);

        context.device_mut().set_render_target(None);
        context.set_viewport(previous);
        context.checkin_render_target(target);
        result
    }

    /// Exchanges the device texture and dimensions with `other` in O(1).
    pub fn swap_with(&mut self, other: &mut Self) {
        std::mem::swap(self, other);
    }
}

/// Two same-shaped textures, one of which is current.
///
/// A pass reads the current texture, draws into the other one and then flips
/// the index, so the texture being sampled is never the one being written.
#[derive(Debug)]
pub struct PingPong {
    slots: [Texture; 2],
    current: usize,
    swaps: u64,
}

impl PingPong {
    pub fn new(context: &mut Context, width: u32, height: u32, options: TextureOptions) -> Result<Self, GpuError> {
        let first = Texture::new(context, width, height, options)?;
        let second = Texture::new(context, width, height, options)?;
        Ok(Self {
            slots: [first, second],
            current: 0,
            swaps: 0,
        })
    }

    /// The authoritative state.
    #[must_use]
    pub fn current(&self) -> &Texture {
        &self.slots[self.current]
    }

    /// The texture the next pass will write.
    #[must_use]
    pub fn scratch(&self) -> &Texture {
        &self.slots[1 - self.current]
    }

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.current
    }

    /// Swaps performed since construction.
    #[must_use]
    pub fn swap_count(&self) -> u64 {
        self.swaps
    }

    pub fn swap(&mut self) {
        self.current = 1 - self.current;
        self.swaps += 1;
    }

    /// Runs one pass: `pass` draws into the scratch texture and gets the
    /// current one to read from. On success the roles swap; on failure
    /// nothing changes and the current texture stays authoritative.
    pub fn render<T, E, F>(&mut self, context: &mut Context, pass: F) -> Result<T, E>
    where
        F: FnOnce(&mut Context, &Texture) -> Result<T, E>,
        E: From<GpuError>,
    {
        let current = &self.slots[self.current];
        let scratch = &self.slots[1 - self.current];
        let output = scratch.draw_to(context, |context| pass(context, current))?;
        self.swap();
        Ok(output)
    }
}
