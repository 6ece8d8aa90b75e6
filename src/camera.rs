//! Camera configurations and their matrices.

use cgmath::{perspective, Deg, EuclideanSpace, Matrix4, Point3, Vector2, Vector3};

/// Near clip plane distance used by the 3D projections.
pub const CULL_DISTANCE_NEAR: f32 = 0.01;
/// Far clip plane distance used by the 3D projections.
pub const CULL_DISTANCE_FAR: f32 = 1000.0;

// =============================================================================
// 2D
// =============================================================================

/// A 2D camera. With zero offset/target/rotation and unit zoom the camera
/// matrix is the identity.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera2D {
    /// Screen-space displacement applied after zoom and rotation.
    pub offset: Vector2<f32>,
    /// World-space point the camera looks at.
    pub target: Vector2<f32>,
    /// Rotation in degrees.
    pub rotation: f32,
    /// Zoom factor; 1.0 is unscaled.
    pub zoom: f32,
}

impl Default for Camera2D {
    fn default() -> Self {
        Camera2D {
            offset: Vector2::new(0.0, 0.0),
            target: Vector2::new(0.0, 0.0),
            rotation: 0.0,
            zoom: 1.0,
        }
    }
}

impl Camera2D {
    /// The modelview contribution of this camera: translate to the target,
    /// rotate, scale by zoom, then translate by the offset (in application
    /// order).
    pub fn matrix(&self) -> Matrix4<f32> {
        let origin = Matrix4::from_translation(Vector3::new(-self.target.x, -self.target.y, 0.0));
        let rotation = Matrix4::from_angle_z(Deg(self.rotation));
        let scale = Matrix4::from_nonuniform_scale(self.zoom, self.zoom, 1.0);
        let translation = Matrix4::from_translation(Vector3::new(self.offset.x, self.offset.y, 0.0));
        translation * scale * rotation * origin
    }
}

// =============================================================================
// 3D
// =============================================================================

/// Projection kind of a [`Camera3D`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CameraProjection {
    /// `fovy` is the vertical field of view in degrees.
    Perspective,
    /// `fovy` is the orthographic view width in world units.
    Orthographic,
}

/// A 3D camera: eye position, look-at target, up vector and projection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera3D {
    pub position: Vector3<f32>,
    pub target: Vector3<f32>,
    pub up: Vector3<f32>,
    pub fovy: f32,
    pub projection: CameraProjection,
}

impl Default for Camera3D {
    fn default() -> Self {
        Camera3D {
            position: Vector3::new(0.0, 10.0, 10.0),
            target: Vector3::new(0.0, 0.0, 0.0),
            up: Vector3::new(0.0, 1.0, 0.0),
            fovy: 45.0,
            projection: CameraProjection::Perspective,
        }
    }
}

impl Camera3D {
    /// Right-handed look-at view matrix.
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(
            Point3::from_vec(self.position),
            Point3::from_vec(self.target),
            self.up,
        )
    }

    /// Projection matrix for the given viewport aspect ratio.
    pub fn projection_matrix(&self, aspect: f32) -> Matrix4<f32> {
        match self.projection {
            CameraProjection::Perspective => perspective(
                Deg(self.fovy),
                aspect,
                CULL_DISTANCE_NEAR,
                CULL_DISTANCE_FAR,
            ),
            CameraProjection::Orthographic => {
                let right = self.fovy as f64 / 2.0;
                let top = right / aspect as f64;
                cgmath::ortho(
                    -right as f32,
                    right as f32,
                    -top as f32,
                    top as f32,
                    CULL_DISTANCE_NEAR,
                    CULL_DISTANCE_FAR,
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cgmath::{SquareMatrix, Vector4};

    #[test]
    fn test_default_camera2d_is_identity() {
        let cam = Camera2D::default();
        assert_eq!(cam.matrix(), Matrix4::identity());
    }

    #[test]
    fn test_camera2d_target_translates() {
        let cam = Camera2D {
            target: Vector2::new(10.0, 20.0),
            ..Default::default()
        };
        let p = cam.matrix() * Vector4::new(10.0, 20.0, 0.0, 1.0);
        assert_eq!((p.x, p.y), (0.0, 0.0));
    }

    #[test]
    fn test_camera2d_zoom_scales_about_target() {
        let cam = Camera2D {
            zoom: 2.0,
            ..Default::default()
        };
        let p = cam.matrix() * Vector4::new(3.0, 0.0, 0.0, 1.0);
        assert_eq!(p.x, 6.0);
    }

    #[test]
    fn test_camera3d_view_moves_eye_to_origin() {
        let cam = Camera3D {
            position: Vector3::new(0.0, 0.0, 5.0),
            ..Default::default()
        };
        let eye = cam.view_matrix() * Vector4::new(0.0, 0.0, 5.0, 1.0);
        assert!(eye.x.abs() < 1e-6 && eye.y.abs() < 1e-6 && eye.z.abs() < 1e-6);
    }

    #[test]
    fn test_camera3d_projection_kinds_differ() {
        let mut cam = Camera3D::default();
        let persp = cam.projection_matrix(16.0 / 9.0);
        cam.projection = CameraProjection::Orthographic;
        cam.fovy = 10.0;
        let ortho = cam.projection_matrix(16.0 / 9.0);
        assert_ne!(persp, ortho);
        // Orthographic projection has no perspective row.
        assert_eq!(ortho.w.w, 1.0);
        assert_eq!(persp.w.w, 0.0);
    }
}
