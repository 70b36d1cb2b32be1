use water_math::Viewport;

use crate::{
    Capabilities, ClearFlags, CullMode, DepthBufferHandle, Device, GpuError, RenderState,
    RenderTargetBinding, Texture,
};

/// The offscreen render target shared by every [`Texture::draw_to`] call:
/// a depth buffer sized to whatever texture is currently attached.
///
/// It lives in a single slot on the [`Context`]; `draw_to` takes it out for
/// the length of its callback and puts it back afterwards, so a nested
/// `draw_to` finds the slot empty.
#[derive(Debug, Default)]
pub struct RenderTarget {
    depth: Option<(DepthBufferHandle, u32, u32)>,
}

impl RenderTarget {
    /// Points drawing at `texture`, (re)allocating the depth buffer when the
    /// size changed.
    pub(crate) fn attach(&mut self, device: &mut dyn Device, texture: &Texture) -> Result<(), GpuError> {
        let (width, height) = (texture.width(), texture.height());
        let depth = match self.depth {
            Some((handle, w, h)) if w == width && h == height => handle,
            previous => {
                if let Some((handle, ..)) = previous {
                    device.destroy_depth_buffer(handle);
                    self.depth = None;
                }
                tracing::debug!(width, height, "resizing render target depth buffer");
                let handle = device.create_depth_buffer(width, height)?;
                self.depth = Some((handle, width, height));
                handle
            }
        };

        if !device.render_target_complete(texture.handle()) {
            return Err(GpuError::IncompleteRenderTarget);
        }
        device.set_render_target(Some(RenderTargetBinding {
            color: texture.handle(),
            depth,
        }));
        Ok(())
    }

    #[must_use]
    pub fn depth_size(&self) -> Option<(u32, u32)> {
        self.depth.map(|(_, w, h)| (w, h))
    }
}

/// A device plus the rendering state the layers above share.
pub struct Context {
    device: Box<dyn Device>,
    render_target: Option<RenderTarget>,
}

impl Context {
    #[must_use]
    pub fn new(device: Box<dyn Device>) -> Self {
        tracing::info!(backend = device.name(), "created rendering context");
        Self {
            device,
            render_target: Some(RenderTarget::default()),
        }
    }

    #[must_use]
    pub fn device(&self) -> &dyn Device {
        self.device.as_ref()
    }

    pub fn device_mut(&mut self) -> &mut dyn Device {
        self.device.as_mut()
    }

    #[must_use]
    pub fn capabilities(&self) -> Capabilities {
        self.device.capabilities()
    }

    #[must_use]
    pub fn viewport(&self) -> Viewport {
        self.device.viewport()
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.device.set_viewport(viewport);
    }

    /// Whether a `draw_to` scope currently holds the render target.
    #[must_use]
    pub fn render_target_busy(&self) -> bool {
        self.render_target.is_none()
    }

    pub(crate) fn checkout_render_target(&mut self) -> Result<RenderTarget, GpuError> {
        self.render_target.take().ok_or(GpuError::RenderTargetBusy)
    }

    pub(crate) fn checkin_render_target(&mut self, target: RenderTarget) {
        self.render_target = Some(target);
    }

    pub fn set_clear_color(&mut self, color: [f32; 4]) {
        self.device.set_clear_color(color);
    }

    pub fn clear(&mut self, flags: ClearFlags) -> Result<(), GpuError> {
        self.device.clear(flags)
    }

    pub fn set_cull_mode(&mut self, cull: CullMode) {
        let state = self.device.render_state();
        self.device.set_render_state(RenderState { cull, ..state });
    }

    pub fn set_depth_test(&mut self, depth_test: bool) {
        let state = self.device.render_state();
        self.device.set_render_state(RenderState { depth_test, ..state });
    }

    pub fn set_blend(&mut self, blend: bool) {
        let state = self.device.render_state();
        self.device.set_render_state(RenderState { blend, ..state });
    }

    pub fn begin_frame(&mut self) -> Result<(), GpuError> {
        self.device.begin_frame()
    }

    pub fn end_frame(&mut self) -> Result<(), GpuError> {
        self.device.end_frame()
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        self.device.resize(width, height);
    }
}
