//! Ray intersection against spheres, boxes, triangles, meshes and models.
//!
//! Every query returns a [`RayHitInfo`] record; a miss carries
//! `hit == false` with zeroed fields. Mesh and model queries iterate all
//! triangles in world space, there is no acceleration structure.

use crate::math::{Matrix4, Vector3};
use crate::mesh::{Mesh, Model};
use cgmath::{InnerSpace, Vector4};

const EPSILON: f32 = 1e-6;

/// A half-line: origin plus normalized direction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ray {
    pub position: Vector3<f32>,
    pub direction: Vector3<f32>,
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vector3<f32>,
    pub max: Vector3<f32>,
}

impl BoundingBox {
    /// Smallest box containing a mesh's position stream.
    pub fn from_mesh(mesh: &Mesh) -> BoundingBox {
        let mut min = Vector3::new(f32::MAX, f32::MAX, f32::MAX);
        let mut max = Vector3::new(f32::MIN, f32::MIN, f32::MIN);
        for v in mesh.vertices.chunks_exact(3) {
            min.x = min.x.min(v[0]);
            min.y = min.y.min(v[1]);
            min.z = min.z.min(v[2]);
            max.x = max.x.max(v[0]);
            max.y = max.y.max(v[1]);
            max.z = max.z.max(v[2]);
        }
        BoundingBox { min, max }
    }
}

/// Result of a ray query.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHitInfo {
    pub hit: bool,
    pub distance: f32,
    pub position: Vector3<f32>,
    pub normal: Vector3<f32>,
}

impl RayHitInfo {
    pub fn miss() -> RayHitInfo {
        RayHitInfo {
            hit: false,
            distance: 0.0,
            position: Vector3::new(0.0, 0.0, 0.0),
            normal: Vector3::new(0.0, 0.0, 0.0),
        }
    }
}

// =============================================================================
// Boolean overlap checks
// =============================================================================

pub fn check_collision_boxes(a: BoundingBox, b: BoundingBox) -> bool {
    a.min.x <= b.max.x
        && a.max.x >= b.min.x
        && a.min.y <= b.max.y
        && a.max.y >= b.min.y
        && a.min.z <= b.max.z
        && a.max.z >= b.min.z
}

pub fn check_collision_spheres(
    center_a: Vector3<f32>,
    radius_a: f32,
    center_b: Vector3<f32>,
    radius_b: f32,
) -> bool {
    (center_b - center_a).magnitude2() <= (radius_a + radius_b) * (radius_a + radius_b)
}

pub fn check_collision_box_sphere(
    bounds: BoundingBox,
    center: Vector3<f32>,
    radius: f32,
) -> bool {
    let clamped = Vector3::new(
        center.x.clamp(bounds.min.x, bounds.max.x),
        center.y.clamp(bounds.min.y, bounds.max.y),
        center.z.clamp(bounds.min.z, bounds.max.z),
    );
    (center - clamped).magnitude2() <= radius * radius
}

// =============================================================================
// Ray queries
// =============================================================================

/// Ray vs sphere, geometric solution.
pub fn ray_sphere(ray: &Ray, center: Vector3<f32>, radius: f32) -> RayHitInfo {
    let to_center = center - ray.position;
    let projected = to_center.dot(ray.direction);
    let closest_sq = to_center.magnitude2() - projected * projected;
    let radius_sq = radius * radius;
    if closest_sq > radius_sq {
        return RayHitInfo::miss();
    }

    let half_chord = (radius_sq - closest_sq).sqrt();
    let mut distance = projected - half_chord;
    if distance < 0.0 {
        // Origin inside the sphere: the exit point is the hit.
        distance = projected + half_chord;
    }
    if distance < 0.0 {
        return RayHitInfo::miss();
    }

    let position = ray.position + ray.direction * distance;
    let mut normal = position - center;
    if normal.magnitude2() > 0.0 {
        normal = normal.normalize();
    }
    RayHitInfo {
        hit: true,
        distance,
        position,
        normal,
    }
}

/// Ray vs axis-aligned box, slab intersection. The normal is the axis of
/// the entering face.
pub fn ray_box(ray: &Ray, bounds: BoundingBox) -> RayHitInfo {
    let mut t_near = f32::MIN;
    let mut t_far = f32::MAX;
    let mut near_axis = 0;
    let mut near_sign = 0.0f32;

    let origin: [f32; 3] = [ray.position.x, ray.position.y, ray.position.z];
    let dir: [f32; 3] = [ray.direction.x, ray.direction.y, ray.direction.z];
    let min: [f32; 3] = [bounds.min.x, bounds.min.y, bounds.min.z];
    let max: [f32; 3] = [bounds.max.x, bounds.max.y, bounds.max.z];

    for axis in 0..3 {
        if dir[axis].abs() < EPSILON {
            if origin[axis] < min[axis] || origin[axis] > max[axis] {
                return RayHitInfo::miss();
            }
            continue;
        }
        let inv = 1.0 / dir[axis];
        let mut t0 = (min[axis] - origin[axis]) * inv;
        let mut t1 = (max[axis] - origin[axis]) * inv;
        if t0 > t1 {
            std::mem::swap(&mut t0, &mut t1);
        }
        if t0 > t_near {
            t_near = t0;
            near_axis = axis;
            near_sign = -dir[axis].signum();
        }
        t_far = t_far.min(t1);
        if t_near > t_far || t_far < 0.0 {
            return RayHitInfo::miss();
        }
    }

    let distance = if t_near >= 0.0 { t_near } else { t_far };
    let mut normal = Vector3::new(0.0, 0.0, 0.0);
    match near_axis {
        0 => normal.x = near_sign,
        1 => normal.y = near_sign,
        _ => normal.z = near_sign,
    }
    RayHitInfo {
        hit: true,
        distance,
        position: ray.position + ray.direction * distance,
        normal,
    }
}

/// Ray vs triangle (Möller–Trumbore). The returned normal faces against
/// the ray direction.
pub fn ray_triangle(
    ray: &Ray,
    v0: Vector3<f32>,
    v1: Vector3<f32>,
    v2: Vector3<f32>,
) -> RayHitInfo {
    let edge1 = v1 - v0;
    let edge2 = v2 - v0;

    let p = ray.direction.cross(edge2);
    let determinant = edge1.dot(p);
    if determinant.abs() < EPSILON {
        return RayHitInfo::miss();
    }
    let inv_det = 1.0 / determinant;

    let t_vec = ray.position - v0;
    let u = t_vec.dot(p) * inv_det;
    if !(0.0..=1.0).contains(&u) {
        return RayHitInfo::miss();
    }

    let q = t_vec.cross(edge1);
    let v = ray.direction.dot(q) * inv_det;
    if v < 0.0 || u + v > 1.0 {
        return RayHitInfo::miss();
    }

    let distance = edge2.dot(q) * inv_det;
    if distance <= EPSILON {
        return RayHitInfo::miss();
    }

    let mut normal = edge1.cross(edge2).normalize();
    if normal.dot(ray.direction) > 0.0 {
        normal = -normal;
    }
    RayHitInfo {
        hit: true,
        distance,
        position: ray.position + ray.direction * distance,
        normal,
    }
}

/// Ray vs the horizontal plane `y == ground_height`.
pub fn ray_ground_plane(ray: &Ray, ground_height: f32) -> RayHitInfo {
    if ray.direction.y.abs() < EPSILON {
        return RayHitInfo::miss();
    }
    let distance = (ground_height - ray.position.y) / ray.direction.y;
    if distance < 0.0 {
        return RayHitInfo::miss();
    }
    let position = ray.position + ray.direction * distance;
    RayHitInfo {
        hit: true,
        distance,
        position: Vector3::new(position.x, ground_height, position.z),
        normal: Vector3::new(0.0, 1.0, 0.0),
    }
}

/// Ray vs every triangle of a mesh, transformed into world space. Returns
/// the nearest hit.
pub fn ray_mesh(ray: &Ray, mesh: &Mesh, transform: Matrix4<f32>) -> RayHitInfo {
    let world = |index: usize| -> Vector3<f32> {
        let v = Vector4::new(
            mesh.vertices[index * 3],
            mesh.vertices[index * 3 + 1],
            mesh.vertices[index * 3 + 2],
            1.0,
        );
        let w = transform * v;
        Vector3::new(w.x, w.y, w.z)
    };

    let mut best = RayHitInfo::miss();
    for tri in 0..mesh.triangle_count {
        let (a, b, c) = if mesh.indices.is_empty() {
            (world(tri * 3), world(tri * 3 + 1), world(tri * 3 + 2))
        } else {
            (
                world(mesh.indices[tri * 3] as usize),
                world(mesh.indices[tri * 3 + 1] as usize),
                world(mesh.indices[tri * 3 + 2] as usize),
            )
        };
        let hit = ray_triangle(ray, a, b, c);
        if hit.hit && (!best.hit || hit.distance < best.distance) {
            best = hit;
        }
    }
    best
}

/// Ray vs every mesh of a model under its stored transform.
pub fn ray_model(ray: &Ray, model: &Model) -> RayHitInfo {
    let mut best = RayHitInfo::miss();
    for mesh in &model.meshes {
        let hit = ray_mesh(ray, mesh, model.transform);
        if hit.hit && (!best.hit || hit.distance < best.distance) {
            best = hit;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::gen_mesh_cube;
    use cgmath::SquareMatrix;

    fn forward_ray() -> Ray {
        Ray {
            position: Vector3::new(0.0, 0.0, -1.0),
            direction: Vector3::new(0.0, 0.0, 1.0),
        }
    }

    #[test]
    fn test_ray_triangle_head_on() {
        let hit = ray_triangle(
            &forward_ray(),
            Vector3::new(-1.0, -1.0, 0.0),
            Vector3::new(1.0, -1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        assert!(hit.hit);
        assert!((hit.distance - 1.0).abs() < 1e-6);
        assert!((hit.position - Vector3::new(0.0, 0.0, 0.0)).magnitude() < 1e-6);
        assert!((hit.normal - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-6);
    }

    #[test]
    fn test_ray_triangle_miss() {
        let hit = ray_triangle(
            &forward_ray(),
            Vector3::new(10.0, 10.0, 0.0),
            Vector3::new(11.0, 10.0, 0.0),
            Vector3::new(10.0, 11.0, 0.0),
        );
        assert!(!hit.hit);
    }

    #[test]
    fn test_ray_triangle_parallel() {
        let ray = Ray {
            position: Vector3::new(0.0, 0.0, -1.0),
            direction: Vector3::new(1.0, 0.0, 0.0),
        };
        let hit = ray_triangle(
            &ray,
            Vector3::new(-1.0, -1.0, 0.0),
            Vector3::new(1.0, -1.0, 0.0),
            Vector3::new(0.0, 1.0, 0.0),
        );
        assert!(!hit.hit);
    }

    #[test]
    fn test_ray_sphere_hit_and_normal() {
        let hit = ray_sphere(&forward_ray(), Vector3::new(0.0, 0.0, 2.0), 1.0);
        assert!(hit.hit);
        assert!((hit.distance - 2.0).abs() < 1e-6);
        assert!((hit.normal - Vector3::new(0.0, 0.0, -1.0)).magnitude() < 1e-6);
    }

    #[test]
    fn test_ray_sphere_from_inside() {
        let ray = Ray {
            position: Vector3::new(0.0, 0.0, 0.0),
            direction: Vector3::new(0.0, 0.0, 1.0),
        };
        let hit = ray_sphere(&ray, Vector3::new(0.0, 0.0, 0.0), 1.0);
        assert!(hit.hit);
        assert!((hit.distance - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_ray_box_entry_face() {
        let bounds = BoundingBox {
            min: Vector3::new(-1.0, -1.0, 0.0),
            max: Vector3::new(1.0, 1.0, 2.0),
        };
        let hit = ray_box(&forward_ray(), bounds);
        assert!(hit.hit);
        assert!((hit.distance - 1.0).abs() < 1e-6);
        assert_eq!(hit.normal, Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn test_ray_box_miss() {
        let bounds = BoundingBox {
            min: Vector3::new(5.0, 5.0, 5.0),
            max: Vector3::new(6.0, 6.0, 6.0),
        };
        assert!(!ray_box(&forward_ray(), bounds).hit);
    }

    #[test]
    fn test_ray_ground_plane() {
        let ray = Ray {
            position: Vector3::new(3.0, 4.0, 0.0),
            direction: Vector3::new(0.0, -1.0, 0.0),
        };
        let hit = ray_ground_plane(&ray, 1.0);
        assert!(hit.hit);
        assert!((hit.distance - 3.0).abs() < 1e-6);
        assert_eq!(hit.position.y, 1.0);
        assert_eq!(hit.normal, Vector3::new(0.0, 1.0, 0.0));

        let away = Ray {
            position: Vector3::new(0.0, 4.0, 0.0),
            direction: Vector3::new(0.0, 1.0, 0.0),
        };
        assert!(!ray_ground_plane(&away, 1.0).hit);
    }

    #[test]
    fn test_ray_mesh_nearest_face() {
        let cube = gen_mesh_cube(2.0, 2.0, 2.0);
        let ray = Ray {
            position: Vector3::new(0.0, 0.0, -5.0),
            direction: Vector3::new(0.0, 0.0, 1.0),
        };
        let hit = ray_mesh(&ray, &cube, Matrix4::identity());
        assert!(hit.hit);
        // The nearest face of the cube sits at z = -1.
        assert!((hit.distance - 4.0).abs() < 1e-5);
    }

    #[test]
    fn test_ray_mesh_respects_transform() {
        let cube = gen_mesh_cube(2.0, 2.0, 2.0);
        let ray = Ray {
            position: Vector3::new(10.0, 0.0, -5.0),
            direction: Vector3::new(0.0, 0.0, 1.0),
        };
        let moved = Matrix4::from_translation(Vector3::new(10.0, 0.0, 0.0));
        assert!(ray_mesh(&ray, &cube, moved).hit);
        assert!(!ray_mesh(&ray, &cube, Matrix4::identity()).hit);
    }

    #[test]
    fn test_bounding_box_from_mesh() {
        let cube = gen_mesh_cube(2.0, 4.0, 6.0);
        let bounds = BoundingBox::from_mesh(&cube);
        assert_eq!(bounds.min, Vector3::new(-1.0, -2.0, -3.0));
        assert_eq!(bounds.max, Vector3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_overlap_checks() {
        let a = BoundingBox {
            min: Vector3::new(0.0, 0.0, 0.0),
            max: Vector3::new(2.0, 2.0, 2.0),
        };
        let b = BoundingBox {
            min: Vector3::new(1.0, 1.0, 1.0),
            max: Vector3::new(3.0, 3.0, 3.0),
        };
        let c = BoundingBox {
            min: Vector3::new(5.0, 5.0, 5.0),
            max: Vector3::new(6.0, 6.0, 6.0),
        };
        assert!(check_collision_boxes(a, b));
        assert!(!check_collision_boxes(a, c));

        assert!(check_collision_spheres(
            Vector3::new(0.0, 0.0, 0.0),
            1.0,
            Vector3::new(1.5, 0.0, 0.0),
            1.0
        ));
        assert!(check_collision_box_sphere(a, Vector3::new(3.0, 1.0, 1.0), 1.5));
        assert!(!check_collision_box_sphere(c, Vector3::new(0.0, 0.0, 0.0), 1.0));
    }
}
