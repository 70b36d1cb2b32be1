//! Matrix stacks and the transform context that draws read camera
//! matrices from.

use std::ops::{Deref, DerefMut};

use crate::{MathError, Matrix4, Vector3};

/// Pixel rectangle, origin at the bottom-left corner.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Viewport {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    #[must_use]
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height.max(1) as f32
    }
}

/// A current matrix plus the frames saved by [`push`](Self::push).
#[derive(Clone, Debug, Default)]
pub struct MatrixStack {
    current: Matrix4,
    saved: Vec<Matrix4>,
}

impl MatrixStack {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn current(&self) -> &Matrix4 {
        &self.current
    }

    /// Number of saved frames.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.saved.len()
    }

    pub fn push(&mut self) {
        self.saved.push(self.current);
    }

    /// Restores the most recently pushed matrix.
    ///
    /// # Errors
    ///
    /// [`MathError::EmptyStack`] when nothing has been pushed.
    pub fn pop(&mut self) -> Result<(), MathError> {
        self.current = self.saved.pop().ok_or(MathError::EmptyStack)?;
        Ok(())
    }

    /// Pushes now and pops when the returned guard is dropped. The guard
    /// derefs to the stack, so transforms can be applied through it.
    pub fn scoped(&mut self) -> StackGuard<'_> {
        self.push();
        StackGuard { stack: self }
    }

    fn restore(&mut self) {
        if let Some(saved) = self.saved.pop() {
            self.current = saved;
        }
    }

    pub fn load_identity(&mut self) -> &mut Self {
        self.current = Matrix4::identity();
        self
    }

    pub fn load_matrix(&mut self, m: Matrix4) -> &mut Self {
        self.current = m;
        self
    }

    /// `current = current * m`, so the last transform applied is the first
    /// one a vertex sees.
    pub fn multiply(&mut self, m: &Matrix4) -> &mut Self {
        self.current = self.current.multiply(m);
        self
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.multiply(&Matrix4::translate(x, y, z))
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) -> &mut Self {
        self.multiply(&Matrix4::scale(x, y, z))
    }

    pub fn rotate(&mut self, degrees: f32, x: f32, y: f32, z: f32) -> &mut Self {
        self.multiply(&Matrix4::rotate(degrees, x, y, z))
    }

    pub fn perspective(&mut self, fov: f32, aspect: f32, near: f32, far: f32) -> &mut Self {
        self.multiply(&Matrix4::perspective(fov, aspect, near, far))
    }

    pub fn frustum(&mut self, l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> &mut Self {
        self.multiply(&Matrix4::frustum(l, r, b, t, n, f))
    }
}

/// Restores the stack to its state at [`MatrixStack::scoped`] when dropped.
pub struct StackGuard<'a> {
    stack: &'a mut MatrixStack,
}

impl Deref for StackGuard<'_> {
    type Target = MatrixStack;

    fn deref(&self) -> &MatrixStack {
        self.stack
    }
}

impl DerefMut for StackGuard<'_> {
    fn deref_mut(&mut self) -> &mut MatrixStack {
        self.stack
    }
}

impl Drop for StackGuard<'_> {
    fn drop(&mut self) {
        // The guard pushed exactly one frame, and nested guards borrow the
        // stack mutably, so that frame is still on top here.
        self.stack.restore();
    }
}

/// Model-view and projection stacks, passed explicitly to every draw.
#[derive(Clone, Debug, Default)]
pub struct TransformContext {
    pub model_view: MatrixStack,
    pub projection: MatrixStack,
}

impl TransformContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saves the model-view matrix and restores it when the guard drops.
    ///
    /// Unlike [`MatrixStack::scoped`] the guard derefs to the whole context,
    /// so it can be handed to draws that need both matrices.
    pub fn scoped_model_view(&mut self) -> ModelViewGuard<'_> {
        self.model_view.push();
        ModelViewGuard { context: self }
    }

    #[must_use]
    pub fn model_view_projection(&self) -> Matrix4 {
        self.projection.current().multiply(self.model_view.current())
    }

    /// World point to window coordinates. `z` is depth in `0..1`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn project(&self, point: Vector3, viewport: Viewport) -> Vector3 {
        let ndc = self.model_view_projection().transform_point(point);
        Vector3::new(
            viewport.x as f32 + viewport.width as f32 * (ndc.x * 0.5 + 0.5),
            viewport.y as f32 + viewport.height as f32 * (ndc.y * 0.5 + 0.5),
            ndc.z * 0.5 + 0.5,
        )
    }

    /// Inverse of [`project`](Self::project).
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn unproject(&self, window: Vector3, viewport: Viewport) -> Vector3 {
        let ndc = Vector3::new(
            (window.x - viewport.x as f32) / viewport.width as f32 * 2.0 - 1.0,
            (window.y - viewport.y as f32) / viewport.height as f32 * 2.0 - 1.0,
            window.z * 2.0 - 1.0,
        );
        self.model_view_projection().inverse().transform_point(ndc)
    }
}

pub struct ModelViewGuard<'a> {
    context: &'a mut TransformContext,
}

impl Deref for ModelViewGuard<'_> {
    type Target = TransformContext;

    fn deref(&self) -> &TransformContext {
        self.context
    }
}

impl DerefMut for ModelViewGuard<'_> {
    fn deref_mut(&mut self) -> &mut TransformContext {
        self.context
    }
}

impl Drop for ModelViewGuard<'_> {
    fn drop(&mut self) {
        self.context.model_view.restore();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_on_empty_stack_fails() {
        let mut stack = MatrixStack::new();
        assert_eq!(stack.pop(), Err(MathError::EmptyStack));
    }

    #[test]
    fn push_pop_restores_current() {
        let mut stack = MatrixStack::new();
        stack.translate(1.0, 0.0, 0.0);
        let before = *stack.current();
        stack.push();
        stack.scale(4.0, 4.0, 4.0);
        assert_ne!(*stack.current(), before);
        stack.pop().unwrap();
        assert_eq!(*stack.current(), before);
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn scoped_guard_pops_on_drop() {
        let mut stack = MatrixStack::new();
        {
            let mut guard = stack.scoped();
            guard.translate(0.0, 5.0, 0.0);
            assert_eq!(guard.depth(), 1);
            {
                let mut inner = guard.scoped();
                inner.scale(2.0, 2.0, 2.0);
                assert_eq!(inner.depth(), 2);
            }
            assert_eq!(*guard.current(), Matrix4::translate(0.0, 5.0, 0.0));
        }
        assert_eq!(*stack.current(), Matrix4::identity());
        assert_eq!(stack.depth(), 0);
    }

    #[test]
    fn model_view_guard_leaves_projection_alone() {
        let mut transforms = TransformContext::new();
        transforms.projection.perspective(45.0, 1.0, 0.1, 10.0);
        let projection = *transforms.projection.current();
        {
            let mut scoped = transforms.scoped_model_view();
            scoped.model_view.translate(1.0, 2.0, 3.0);
            scoped.projection.scale(2.0, 2.0, 2.0);
            assert_eq!(*scoped.model_view.current(), Matrix4::translate(1.0, 2.0, 3.0));
        }
        assert_eq!(*transforms.model_view.current(), Matrix4::identity());
        assert_eq!(transforms.model_view.depth(), 0);
        assert_ne!(*transforms.projection.current(), projection);
    }

    #[test]
    fn project_then_unproject_round_trips() {
        let mut transforms = TransformContext::new();
        transforms.projection.perspective(45.0, 4.0 / 3.0, 0.1, 100.0);
        transforms.model_view.translate(0.0, 0.0, -5.0).rotate(30.0, 0.0, 1.0, 0.0);
        let viewport = Viewport::new(0, 0, 800, 600);

        let point = Vector3::new(0.3, -0.2, 0.7);
        let window = transforms.project(point, viewport);
        let back = transforms.unproject(window, viewport);
        assert!((back - point).length() < 1e-3, "round trip gave {back:?}");
    }

    #[test]
    fn project_centre_of_view_hits_viewport_centre() {
        let mut transforms = TransformContext::new();
        transforms.projection.perspective(60.0, 2.0, 0.5, 50.0);
        let viewport = Viewport::new(10, 20, 400, 200);
        let window = transforms.project(Vector3::new(0.0, 0.0, -3.0), viewport);
        assert!((window.x - 210.0).abs() < 1e-3);
        assert!((window.y - 120.0).abs() < 1e-3);
    }
}
