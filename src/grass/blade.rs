//! The blade record shared by the physics, cull and draw stages.
//!
//! A blade is a quadratic Bezier (base, control, tip) packed into four
//! `vec4<f32>` slots (64 bytes). The same bytes are bound to the compute and
//! vertex stages, so the layout must match `Blade` in the grass shaders.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use crate::math::{Aabb, BoundingSphere};

/// Fraction of the height at which the control point rests on an undisturbed blade
pub const REST_CONTROL_FRACTION: f32 = 0.5;

/// Stiffness floor; stiffness is stored as the length of the up vector
pub const MIN_STIFFNESS: f32 = 0.01;

/// Offsets shorter than this are treated as collapsed onto the base
pub const DEGENERATE_EPSILON: f32 = 1e-6;

/// GPU blade record (64 bytes, 16-byte aligned). Must match `Blade` in grass_*.wgsl.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Pod, Zeroable)]
pub struct Blade {
    /// xyz: base position, w: direction angle (radians)
    pub base: [f32; 4],
    // -- 16 bytes --
    /// xyz: Bezier control point, w: height
    pub control: [f32; 4],
    // -- 16 bytes --
    /// xyz: up vector scaled by stiffness, w: width
    pub params: [f32; 4],
    // -- 16 bytes --
    /// xyz: tip position, w: padding / LOD scratch
    pub tip: [f32; 4],
    // -- 16 bytes --
    // Total: 64 bytes
}

impl Blade {
    /// Build a blade at rest.
    ///
    /// `up` is the terrain normal at the base; it is normalized and packed
    /// together with `stiffness` (clamped to [`MIN_STIFFNESS`]).
    pub fn new(base: Vec3, direction: f32, up: Vec3, height: f32, width: f32, stiffness: f32) -> Self {
        let height = height.max(0.0);
        let stiffness = stiffness.max(MIN_STIFFNESS);
        let params = (up.normalize_or(Vec3::Y) * stiffness).extend(width.max(0.0));

        // Derive the rest shape from the packed up vector so it matches `up()` exactly
        let up = params.truncate().normalize_or(Vec3::Y);
        let rest_control = base + up * (height * REST_CONTROL_FRACTION);
        let (control, tip) = correct_shape(base, up, height, rest_control, std::f32::consts::FRAC_PI_2);

        Self {
            base: base.extend(direction).to_array(),
            control: control.extend(height).to_array(),
            params: params.to_array(),
            tip: tip.extend(0.0).to_array(),
        }
    }

    pub fn base_position(&self) -> Vec3 {
        Vec4::from(self.base).truncate()
    }

    /// Facing angle around the up axis (radians)
    pub fn direction(&self) -> f32 {
        self.base[3]
    }

    pub fn control_point(&self) -> Vec3 {
        Vec4::from(self.control).truncate()
    }

    pub fn height(&self) -> f32 {
        self.control[3]
    }

    pub fn tip_position(&self) -> Vec3 {
        Vec4::from(self.tip).truncate()
    }

    pub fn width(&self) -> f32 {
        self.params[3]
    }

    /// Unit up vector (terrain normal at the base)
    pub fn up(&self) -> Vec3 {
        Vec4::from(self.params).truncate().normalize_or(Vec3::Y)
    }

    pub fn stiffness(&self) -> f32 {
        Vec4::from(self.params).truncate().length()
    }

    /// Unit normal of the blade's flat side
    pub fn facing(&self) -> Vec3 {
        facing_direction(self.direction(), self.up())
    }

    /// Unit vector across the blade's width
    pub fn width_axis(&self) -> Vec3 {
        self.up().cross(self.facing()).normalize_or(Vec3::X)
    }

    /// Control point an undisturbed blade rests at
    pub fn rest_control_point(&self) -> Vec3 {
        self.base_position() + self.up() * (self.height() * REST_CONTROL_FRACTION)
    }

    /// Write a new control point and tip, keeping the packed constants
    pub fn set_shape(&mut self, control: Vec3, tip: Vec3) {
        let height = self.height();
        let scratch = self.tip[3];
        self.control = control.extend(height).to_array();
        self.tip = tip.extend(scratch).to_array();
    }

    /// Point on the Bezier curve at parameter `t` in [0, 1]
    pub fn evaluate(&self, t: f32) -> Vec3 {
        let t = t.clamp(0.0, 1.0);
        let s = 1.0 - t;
        self.base_position() * (s * s) + self.control_point() * (2.0 * s * t) + self.tip_position() * (t * t)
    }

    /// Box around the control polygon (the curve lies inside its convex hull)
    pub fn bounds(&self) -> Aabb {
        Aabb::from_points(&[self.base_position(), self.control_point(), self.tip_position()])
    }

    /// Sphere around the control polygon padded by half the width
    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bounds().bounding_sphere(self.width() * 0.5)
    }
}

/// Facing vector for a direction angle, made perpendicular to `up`
pub fn facing_direction(direction: f32, up: Vec3) -> Vec3 {
    let f = Vec3::new(direction.cos(), 0.0, direction.sin());
    let f = f - up * f.dot(up);
    let len = f.length();
    if len > DEGENERATE_EPSILON {
        f / len
    } else {
        up.cross(Vec3::Z).normalize_or(Vec3::X)
    }
}

/// Restore the curve-validity invariants after the control point moved.
///
/// Keeps the control point on or above the base plane and within `height` of
/// the base, then derives the tip by continuing the lean of the base→control
/// segment for the remaining length, bending by at most `max_bend` radians.
/// Returns `(control, tip)`.
pub fn correct_shape(base: Vec3, up: Vec3, height: f32, control: Vec3, max_bend: f32) -> (Vec3, Vec3) {
    let mut control = control;
    if control.y < base.y {
        control.y = base.y;
    }

    let mut offset = control - base;
    let mut len = offset.length();
    let dir = if len > DEGENERATE_EPSILON { offset / len } else { up };

    if len > height {
        offset = dir * height;
        len = height;
        control = base + offset;
    }

    let lean = dir - up * dir.dot(up);
    let bent = (dir + lean).normalize_or(dir);
    let tip_dir = limit_bend(dir, bent, max_bend);

    let remaining = (height - len).max(0.0);
    (control, control + tip_dir * remaining)
}

/// Rotate `from` toward `to` by no more than `max_angle` radians
fn limit_bend(from: Vec3, to: Vec3, max_angle: f32) -> Vec3 {
    let cos_angle = from.dot(to).clamp(-1.0, 1.0);
    let angle = cos_angle.acos();
    if angle <= max_angle {
        return to;
    }
    let perp = (to - from * cos_angle).normalize_or(Vec3::ZERO);
    from * max_angle.cos() + perp * max_angle.sin()
}
