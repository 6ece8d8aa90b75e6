//! Fixed-function style matrix stack.
//!
//! Two root matrices (projection, modelview) plus a bounded stack for
//! push/pop scopes. Inside a modelview push scope, edits are redirected to
//! a scratch transform matrix that the vertex emission path applies to each
//! point, so locally-transformed geometry can be batched without touching
//! the modelview root.
//!
//! Composition follows classic GL: every operation right-multiplies the
//! current matrix in column-vector convention (`M ← M × Op`), so the most
//! recently issued transform applies first in local space.

use cgmath::{frustum, ortho, Deg, InnerSpace, Matrix4, SquareMatrix, Vector3};

/// Stack capacity; exceeding it is a programming error and panics.
pub const MAX_MATRIX_STACK_SIZE: usize = 32;

/// Which root matrix transform operations target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatrixMode {
    Projection,
    ModelView,
}

/// Which matrix edits currently land in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Target {
    Projection,
    ModelView,
    Transform,
}

#[derive(Debug)]
pub struct MatrixStack {
    mode: MatrixMode,
    target: Target,
    projection: Matrix4<f32>,
    modelview: Matrix4<f32>,
    /// Scratch matrix used inside modelview push scopes.
    transform: Matrix4<f32>,
    use_transform: bool,
    stack: Vec<Matrix4<f32>>,
}

impl MatrixStack {
    pub fn new() -> MatrixStack {
        MatrixStack {
            mode: MatrixMode::ModelView,
            target: Target::ModelView,
            projection: Matrix4::identity(),
            modelview: Matrix4::identity(),
            transform: Matrix4::identity(),
            use_transform: false,
            stack: Vec::with_capacity(MAX_MATRIX_STACK_SIZE),
        }
    }

    // =========================================================================
    // Mode and scope
    // =========================================================================

    /// Selects which root subsequent operations edit.
    pub fn set_mode(&mut self, mode: MatrixMode) {
        self.mode = mode;
        self.target = match mode {
            MatrixMode::Projection => Target::Projection,
            MatrixMode::ModelView => {
                if self.use_transform {
                    Target::Transform
                } else {
                    Target::ModelView
                }
            }
        };
    }

    /// Captures the current matrix. In modelview mode, edits are redirected
    /// to the scratch transform for the duration of the scope.
    pub fn push(&mut self) {
        assert!(
            self.stack.len() < MAX_MATRIX_STACK_SIZE,
            "matrix stack overflow (capacity {MAX_MATRIX_STACK_SIZE})"
        );
        if self.mode == MatrixMode::ModelView {
            self.use_transform = true;
            self.target = Target::Transform;
        }
        self.stack.push(*self.current());
    }

    /// Restores the top of the stack into the current matrix. When the
    /// stack empties in modelview mode, the transform redirection ends.
    pub fn pop(&mut self) {
        if let Some(top) = self.stack.pop() {
            *self.current_mut() = top;
        }
        if self.stack.is_empty() && self.mode == MatrixMode::ModelView {
            self.target = Target::ModelView;
            self.use_transform = false;
        }
    }

    // =========================================================================
    // Operations
    // =========================================================================

    pub fn identity(&mut self) {
        *self.current_mut() = Matrix4::identity();
    }

    pub fn translate(&mut self, x: f32, y: f32, z: f32) {
        self.multiply(Matrix4::from_translation(Vector3::new(x, y, z)));
    }

    /// Rotates by `angle_deg` degrees around `axis`.
    pub fn rotate(&mut self, angle_deg: f32, x: f32, y: f32, z: f32) {
        let axis = Vector3::new(x, y, z);
        if axis.magnitude2() == 0.0 {
            return;
        }
        self.multiply(Matrix4::from_axis_angle(axis.normalize(), Deg(angle_deg)));
    }

    pub fn scale(&mut self, x: f32, y: f32, z: f32) {
        self.multiply(Matrix4::from_nonuniform_scale(x, y, z));
    }

    pub fn multiply(&mut self, op: Matrix4<f32>) {
        let current = self.current_mut();
        *current = *current * op;
    }

    pub fn frustum(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) {
        self.multiply(frustum(
            left as f32,
            right as f32,
            bottom as f32,
            top as f32,
            near as f32,
            far as f32,
        ));
    }

    pub fn ortho(&mut self, left: f64, right: f64, bottom: f64, top: f64, near: f64, far: f64) {
        self.multiply(ortho(
            left as f32,
            right as f32,
            bottom as f32,
            top as f32,
            near as f32,
            far as f32,
        ));
    }

    // =========================================================================
    // Access
    // =========================================================================

    pub fn mode(&self) -> MatrixMode {
        self.mode
    }

    pub fn projection(&self) -> Matrix4<f32> {
        self.projection
    }

    pub fn modelview(&self) -> Matrix4<f32> {
        self.modelview
    }

    /// The scratch transform applied to vertices inside a push scope.
    pub fn transform(&self) -> Matrix4<f32> {
        self.transform
    }

    pub fn use_transform(&self) -> bool {
        self.use_transform
    }

    pub fn set_projection(&mut self, m: Matrix4<f32>) {
        self.projection = m;
    }

    pub fn set_modelview(&mut self, m: Matrix4<f32>) {
        self.modelview = m;
    }

    fn current(&self) -> &Matrix4<f32> {
        match self.target {
            Target::Projection => &self.projection,
            Target::ModelView => &self.modelview,
            Target::Transform => &self.transform,
        }
    }

    fn current_mut(&mut self) -> &mut Matrix4<f32> {
        match self.target {
            Target::Projection => &mut self.projection,
            Target::ModelView => &mut self.modelview,
            Target::Transform => &mut self.transform,
        }
    }
}

impl Default for MatrixStack {
    fn default() -> Self {
        MatrixStack::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::Vector4;

    #[test]
    fn test_starts_as_identity_modelview() {
        let stack = MatrixStack::new();
        assert_eq!(stack.mode(), MatrixMode::ModelView);
        assert_eq!(stack.modelview(), Matrix4::identity());
        assert_eq!(stack.projection(), Matrix4::identity());
        assert!(!stack.use_transform());
    }

    #[test]
    fn test_push_pop_leaves_modelview_untouched() {
        let mut stack = MatrixStack::new();
        stack.translate(3.0, 4.0, 5.0);
        let before = stack.modelview();

        stack.push();
        stack.translate(100.0, 0.0, 0.0);
        stack.rotate(45.0, 0.0, 0.0, 1.0);
        stack.pop();

        assert_eq!(stack.modelview(), before);
        assert!(!stack.use_transform());
    }

    #[test]
    fn test_push_enables_transform_redirection() {
        let mut stack = MatrixStack::new();
        stack.push();
        assert!(stack.use_transform());
        stack.translate(1.0, 2.0, 3.0);
        // The edit landed in the scratch transform, not the modelview.
        assert_eq!(stack.modelview(), Matrix4::identity());
        let p = stack.transform() * Vector4::new(0.0, 0.0, 0.0, 1.0);
        assert_eq!((p.x, p.y, p.z), (1.0, 2.0, 3.0));
        stack.pop();
        assert!(!stack.use_transform());
    }

    #[test]
    fn test_projection_mode_edits_projection() {
        let mut stack = MatrixStack::new();
        stack.set_mode(MatrixMode::Projection);
        stack.ortho(0.0, 800.0, 600.0, 0.0, 0.0, 1.0);
        assert_ne!(stack.projection(), Matrix4::identity());
        assert_eq!(stack.modelview(), Matrix4::identity());
        stack.identity();
        assert_eq!(stack.projection(), Matrix4::identity());
    }

    #[test]
    fn test_composition_applies_latest_op_first() {
        // Translate then scale: the scale acts in the translated local
        // space, so the origin maps to the translation alone.
        let mut stack = MatrixStack::new();
        stack.translate(10.0, 0.0, 0.0);
        stack.scale(2.0, 2.0, 2.0);
        let p = stack.modelview() * Vector4::new(1.0, 0.0, 0.0, 1.0);
        assert_eq!(p.x, 12.0);
    }

    #[test]
    fn test_rotate_zero_axis_is_noop() {
        let mut stack = MatrixStack::new();
        stack.rotate(90.0, 0.0, 0.0, 0.0);
        assert_eq!(stack.modelview(), Matrix4::identity());
    }

    #[test]
    #[should_panic(expected = "matrix stack overflow")]
    fn test_stack_overflow_panics() {
        let mut stack = MatrixStack::new();
        for _ in 0..=MAX_MATRIX_STACK_SIZE {
            stack.push();
        }
    }

    #[test]
    fn test_nested_push_pop() {
        let mut stack = MatrixStack::new();
        stack.push();
        stack.translate(1.0, 0.0, 0.0);
        let outer = stack.transform();
        stack.push();
        stack.translate(0.0, 1.0, 0.0);
        stack.pop();
        assert_eq!(stack.transform(), outer);
        assert!(stack.use_transform());
        stack.pop();
        assert!(!stack.use_transform());
    }

    #[test]
    fn test_pop_on_empty_stack_is_noop() {
        let mut stack = MatrixStack::new();
        stack.pop();
        assert_eq!(stack.modelview(), Matrix4::identity());
    }
}
