//! Bounding volumes and view-frustum math shared by the CPU and GPU cull paths

pub mod aabb;
pub mod frustum;

pub use aabb::{Aabb, BoundingSphere};
pub use frustum::{Plane, Frustum};
