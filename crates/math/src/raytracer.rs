use crate::{TransformContext, Vector3, Viewport};

/// Casts world-space rays through viewport pixels.
///
/// Built from a snapshot of the camera matrices; rebuild it whenever the
/// camera moves.
#[derive(Copy, Clone, Debug)]
pub struct Raytracer {
    /// Camera position in world space.
    pub eye: Vector3,
    viewport: Viewport,
    ray00: Vector3,
    ray10: Vector3,
    ray01: Vector3,
    ray11: Vector3,
}

impl Raytracer {
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn new(transforms: &TransformContext, viewport: Viewport) -> Self {
        let m = &transforms.model_view.current().m;

        // Eye = -R^T t for a rigid model-view matrix [R | t].
        let axis_x = Vector3::new(m[0], m[4], m[8]);
        let axis_y = Vector3::new(m[1], m[5], m[9]);
        let axis_z = Vector3::new(m[2], m[6], m[10]);
        let offset = Vector3::new(m[3], m[7], m[11]);
        let eye = Vector3::new(-offset.dot(axis_x), -offset.dot(axis_y), -offset.dot(axis_z));

        let min_x = viewport.x as f32;
        let min_y = viewport.y as f32;
        let max_x = min_x + viewport.width as f32;
        let max_y = min_y + viewport.height as f32;
        let corner = |x: f32, y: f32| {
            transforms.unproject(Vector3::new(x, y, 1.0), viewport) - eye
        };

        Self {
            eye,
            viewport,
            ray00: corner(min_x, min_y),
            ray10: corner(max_x, min_y),
            ray01: corner(min_x, max_y),
            ray11: corner(max_x, max_y),
        }
    }

    /// Unit direction through the pixel `(x, y)`, with `y` counted down from
    /// the top edge as pointer events report it.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn ray_for_pixel(&self, x: f32, y: f32) -> Vector3 {
        let x = (x - self.viewport.x as f32) / self.viewport.width as f32;
        let y = 1.0 - (y - self.viewport.y as f32) / self.viewport.height as f32;
        let bottom = self.ray00.lerp(self.ray10, x);
        let top = self.ray01.lerp(self.ray11, x);
        bottom.lerp(top, y).unit()
    }

    /// Point where `origin + ray * t` crosses the plane `y = height`.
    ///
    /// A ray parallel to the plane gives non-finite components.
    #[must_use]
    pub fn hit_plane(origin: Vector3, ray: Vector3, height: f32) -> Vector3 {
        origin + ray * ((height - origin.y) / ray.y)
    }
}
