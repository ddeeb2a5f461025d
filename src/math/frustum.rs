//! View frustum for culling

use crate::core::types::{Vec3, Vec4, Mat4};
use super::aabb::BoundingSphere;

/// A plane defined by normal and distance from origin
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub distance: f32,
}

impl Plane {
    pub fn new(normal: Vec3, distance: f32) -> Self {
        Self { normal, distance }
    }

    /// Signed distance from point to plane (positive = in front)
    pub fn distance_to_point(&self, point: Vec3) -> f32 {
        self.normal.dot(point) + self.distance
    }

    /// Packed (normal.xyz, distance) for uniform upload
    pub fn to_array(&self) -> [f32; 4] {
        [self.normal.x, self.normal.y, self.normal.z, self.distance]
    }
}

/// View frustum planes, ordered left, right, bottom, top, near, far
#[derive(Clone, Copy, Debug)]
pub struct Frustum {
    pub planes: [Plane; 6],
}

impl Frustum {
    /// Number of side planes (left, right, bottom, top) at the front of `planes`
    pub const SIDE_PLANES: usize = 4;

    /// Extract frustum planes from a view-projection matrix (Gribb/Hartmann).
    ///
    /// Assumes wgpu clip space, i.e. depth in [0, 1].
    pub fn from_view_projection(vp: &Mat4) -> Self {
        let row = |i: usize| Vec4::new(vp.col(0)[i], vp.col(1)[i], vp.col(2)[i], vp.col(3)[i]);
        let (r0, r1, r2, r3) = (row(0), row(1), row(2), row(3));

        Self {
            planes: [
                Self::normalize_plane(r3 + r0), // left
                Self::normalize_plane(r3 - r0), // right
                Self::normalize_plane(r3 + r1), // bottom
                Self::normalize_plane(r3 - r1), // top
                Self::normalize_plane(r2),      // near (z >= 0)
                Self::normalize_plane(r3 - r2), // far
            ],
        }
    }

    fn normalize_plane(plane: Vec4) -> Plane {
        let normal = plane.truncate();
        let len = normal.length();
        if len > 0.0 {
            Plane {
                normal: normal / len,
                distance: plane.w / len,
            }
        } else {
            Plane::new(Vec3::ZERO, 0.0)
        }
    }

    /// The four side planes
    pub fn side_planes(&self) -> &[Plane] {
        &self.planes[..Self::SIDE_PLANES]
    }

    /// Side planes packed for the cull uniform
    pub fn side_planes_packed(&self) -> [[f32; 4]; 4] {
        [
            self.planes[0].to_array(),
            self.planes[1].to_array(),
            self.planes[2].to_array(),
            self.planes[3].to_array(),
        ]
    }

    /// Conservative sphere test against the four side planes only.
    ///
    /// Near and far are left to the caller's distance cutoff.
    pub fn sphere_within_sides(&self, sphere: &BoundingSphere) -> bool {
        self.side_planes()
            .iter()
            .all(|plane| plane.distance_to_point(sphere.center) >= -sphere.radius)
    }
}
