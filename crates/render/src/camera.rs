//! The orbiting view of the pool.

use serde::{Deserialize, Serialize};
use water_math::{TransformContext, Viewport};

pub const FIELD_OF_VIEW: f32 = 45.0;
pub const NEAR: f32 = 0.01;
pub const FAR: f32 = 100.0;

/// Pitch never quite reaches straight up or down so the view keeps a
/// well-defined horizon.
pub const MAX_PITCH: f32 = 89.999;

/// Camera circling the pool center, angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitCamera {
    pub angle_x: f32,
    pub angle_y: f32,
    pub distance: f32,
}

impl Default for OrbitCamera {
    fn default() -> Self {
        Self {
            angle_x: -25.0,
            angle_y: -200.5,
            distance: 4.0,
        }
    }
}

impl OrbitCamera {
    /// Loads the view into the model-view stack.
    pub fn apply(&self, transforms: &mut TransformContext) {
        transforms
            .model_view
            .load_identity()
            .translate(0.0, 0.0, -self.distance)
            .rotate(-self.angle_x, 1.0, 0.0, 0.0)
            .rotate(-self.angle_y, 0.0, 1.0, 0.0)
            .translate(0.0, 0.5, 0.0);
    }

    /// Loads a perspective projection matching `viewport`'s aspect ratio.
    pub fn set_projection(transforms: &mut TransformContext, viewport: Viewport) {
        transforms
            .projection
            .load_identity()
            .perspective(FIELD_OF_VIEW, viewport.aspect(), NEAR, FAR);
    }

    /// Turns by a pointer movement of `(dx, dy)` pixels.
    pub fn orbit(&mut self, dx: f32, dy: f32) {
        self.angle_y -= dx;
        self.angle_x = (self.angle_x - dy).clamp(-MAX_PITCH, MAX_PITCH);
    }
}

#[cfg(test)]
mod tests {
    use water_math::{Raytracer, Vector3};

    use super::*;

    #[test]
    fn pitch_is_clamped() {
        let mut camera = OrbitCamera::default();
        camera.orbit(0.0, -500.0);
        assert!((camera.angle_x - MAX_PITCH).abs() < 1e-6);
        camera.orbit(10.0, 1000.0);
        assert!((camera.angle_x + MAX_PITCH).abs() < 1e-6);
        assert!((camera.angle_y + 210.5).abs() < 1e-6);
    }

    #[test]
    fn eye_sits_at_orbit_distance_from_the_target() {
        let camera = OrbitCamera::default();
        let mut transforms = TransformContext::new();
        camera.apply(&mut transforms);
        let viewport = Viewport::new(0, 0, 800, 600);
        OrbitCamera::set_projection(&mut transforms, viewport);

        let eye = Raytracer::new(&transforms, viewport).eye;
        let target = Vector3::new(0.0, -0.5, 0.0);
        assert!(((eye - target).length() - camera.distance).abs() < 1e-4);
        // Default pitch looks down at the water from above.
        assert!(eye.y > 0.0);
    }
}
