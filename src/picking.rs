//! Ray construction and the host side of pick selection.
//!
//! The pick kernel leaves one `(distance, triangle)` pair per work-group; the
//! host scans those pairs for the global minimum and maps the winning triangle
//! to its body.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::camera::Camera;

/// Distance reported for a miss. Shared by the kernel's initial value, the
/// host reduction's starting minimum, and the hit test.
pub const NO_HIT_DISTANCE: f32 = 1.0e4;

const INTERSECTION_EPSILON: f32 = 1.0e-7;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    /// Unit length.
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self { origin, direction: direction.normalize() }
    }

    /// World-space ray through a surface coordinate, starting on the near plane.
    pub fn from_surface(camera: &Camera, x: f32, y: f32) -> Self {
        let ndc = camera.surface_to_ndc(x, y);
        let inverse = camera.mvp_inverse();

        let origin = inverse * Vec4::new(ndc.x, ndc.y, 0.0, 1.0);
        let direction = inverse * Vec4::new(0.0, 0.0, 1.0, 0.0);

        Self::new(origin.truncate() / origin.w, direction.truncate())
    }

    /// Möller–Trumbore; distance along the ray or `NO_HIT_DISTANCE`.
    pub fn intersect_triangle(&self, a: Vec3, b: Vec3, c: Vec3) -> f32 {
        let edge1 = b - a;
        let edge2 = c - a;
        let p = self.direction.cross(edge2);
        let det = edge1.dot(p);
        if det.abs() < INTERSECTION_EPSILON {
            return NO_HIT_DISTANCE;
        }

        let inv_det = 1.0 / det;
        let s = self.origin - a;
        let u = s.dot(p) * inv_det;
        if !(0.0..=1.0).contains(&u) {
            return NO_HIT_DISTANCE;
        }

        let q = s.cross(edge1);
        let v = self.direction.dot(q) * inv_det;
        if v < 0.0 || u + v > 1.0 {
            return NO_HIT_DISTANCE;
        }

        let t = edge2.dot(q) * inv_det;
        if t > INTERSECTION_EPSILON && t < NO_HIT_DISTANCE {
            t
        } else {
            NO_HIT_DISTANCE
        }
    }
}

/// Ray as laid out for the pick kernel's uniform.
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct RayUniform {
    pub origin: [f32; 4],
    pub direction: [f32; 4],
}

impl From<&Ray> for RayUniform {
    fn from(ray: &Ray) -> Self {
        Self {
            origin: ray.origin.extend(0.0).to_array(),
            direction: ray.direction.extend(0.0).to_array(),
        }
    }
}

/// Per-work-group minimum written by the pick kernel.
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct PickPair {
    pub distance: f32,
    /// Global triangle index across all bodies.
    pub triangle: u32,
}

impl PickPair {
    pub const MISS: PickPair = PickPair { distance: NO_HIT_DISTANCE, triangle: 0 };
}

/// Final reduction: the body owning the nearest hit, if any pair hit at all.
pub fn reduce_pick_results(pairs: &[PickPair], triangles_per_body: u32) -> Option<usize> {
    if triangles_per_body == 0 {
        return None;
    }

    let mut nearest = NO_HIT_DISTANCE;
    let mut triangle = None;
    for pair in pairs {
        if pair.distance < nearest {
            nearest = pair.distance;
            triangle = Some(pair.triangle);
        }
    }

    triangle.map(|t| (t / triangles_per_body) as usize)
}
