//! Axis-aligned bounding box and bounding sphere

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Tightest box around a set of points
    pub fn from_points(points: &[Vec3]) -> Self {
        let mut aabb = Self::new(Vec3::splat(f32::INFINITY), Vec3::splat(f32::NEG_INFINITY));
        for &p in points {
            aabb.expand(p);
        }
        aabb
    }

    /// Get center point
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    /// Get size (max - min)
    pub fn size(&self) -> Vec3 {
        self.max - self.min
    }

    /// Get half-extents
    pub fn half_extent(&self) -> Vec3 {
        self.size() * 0.5
    }

    /// Expand AABB to include point
    pub fn expand(&mut self, point: Vec3) {
        self.min = self.min.min(point);
        self.max = self.max.max(point);
    }

    /// Sphere enclosing the box, optionally padded
    pub fn bounding_sphere(&self, padding: f32) -> BoundingSphere {
        BoundingSphere {
            center: self.center(),
            radius: self.half_extent().length() + padding.max(0.0),
        }
    }
}

/// Sphere used for conservative visibility tests
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: Vec3,
    pub radius: f32,
}
