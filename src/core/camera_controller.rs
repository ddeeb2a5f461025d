//! First-person fly camera for walking the grass field

use crate::core::camera::Camera;
use crate::core::input::InputState;
use crate::terrain::HeightProvider;
use winit::event::MouseButton;
use winit::keyboard::KeyCode;

/// Speed change per scroll notch
const SCROLL_SPEED_FACTOR: f32 = 1.15;

/// WASD + mouse look controller. Scroll changes movement speed.
///
/// Looking works with the cursor grabbed or while the right button is held.
pub struct FpsCameraController {
    /// Movement speed in units per second
    pub speed: f32,
    /// Mouse sensitivity
    pub sensitivity: f32,
    /// Sprint multiplier (Ctrl)
    pub sprint_multiplier: f32,
    /// Smallest allowed eye height above the ground
    pub ground_clearance: f32,
    yaw: f32,
    pitch: f32,
}

impl FpsCameraController {
    pub const MIN_SPEED: f32 = 0.5;
    pub const MAX_SPEED: f32 = 200.0;

    pub fn new(speed: f32, sensitivity: f32) -> Self {
        Self {
            speed: speed.clamp(Self::MIN_SPEED, Self::MAX_SPEED),
            sensitivity,
            sprint_multiplier: 3.0,
            ground_clearance: 0.3,
            yaw: 0.0,
            pitch: 0.0,
        }
    }

    /// Take yaw and pitch from the camera's current orientation
    pub fn sync_from(&mut self, camera: &Camera) {
        let forward = camera.forward();
        self.yaw = (-forward.x).atan2(-forward.z);
        self.pitch = forward.y.clamp(-1.0, 1.0).asin().clamp(-1.5, 1.5);
    }

    /// Update camera based on input, keeping it above `ground`
    pub fn update(&mut self, camera: &mut Camera, input: &InputState, dt: f32, ground: &dyn HeightProvider) {
        let scroll = input.scroll_delta();
        if scroll != 0.0 {
            self.speed = (self.speed * SCROLL_SPEED_FACTOR.powf(scroll)).clamp(Self::MIN_SPEED, Self::MAX_SPEED);
            log::debug!("Camera speed {:.1}", self.speed);
        }

        // Mouse look while captured or right-dragging
        if input.is_mouse_captured() || input.is_mouse_button_pressed(MouseButton::Right) {
            let (dx, dy) = input.mouse_delta();
            self.yaw -= dx * self.sensitivity * 0.001;
            self.pitch = (self.pitch - dy * self.sensitivity * 0.001).clamp(-1.5, 1.5);
            camera.set_rotation_euler(self.yaw, self.pitch);
        }

        let forward = camera.forward();
        let right = camera.right();
        let mut velocity = glam::Vec3::ZERO;
        let held = |key| input.is_key_pressed(key);

        if held(KeyCode::KeyW) {
            velocity += forward;
        }
        if held(KeyCode::KeyS) {
            velocity -= forward;
        }
        if held(KeyCode::KeyA) {
            velocity -= right;
        }
        if held(KeyCode::KeyD) {
            velocity += right;
        }
        if held(KeyCode::Space) {
            velocity.y += 1.0;
        }
        if held(KeyCode::ShiftLeft) || held(KeyCode::ShiftRight) {
            velocity.y -= 1.0;
        }

        if velocity.length_squared() > 0.0 {
            let mut speed = self.speed;
            if held(KeyCode::ControlLeft) {
                speed *= self.sprint_multiplier;
            }
            camera.position += velocity.normalize() * speed * dt;
        }

        self.keep_above_ground(camera, ground);
    }

    /// Push the camera up if it sank below the ground clearance
    pub fn keep_above_ground(&self, camera: &mut Camera, ground: &dyn HeightProvider) {
        let p = camera.position;
        if ground.footprint().is_some_and(|fp| !fp.contains(p.x, p.z)) {
            return;
        }
        let floor = ground.height(p.x, p.z) + self.ground_clearance;
        if p.y < floor {
            camera.position.y = floor;
        }
    }

    pub fn yaw(&self) -> f32 {
        self.yaw
    }

    pub fn pitch(&self) -> f32 {
        self.pitch
    }
}

impl Default for FpsCameraController {
    fn default() -> Self {
        Self::new(6.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terrain::FlatTerrain;
    use glam::Vec3;

    #[test]
    fn test_keeps_camera_above_ground() {
        let controller = FpsCameraController::default();
        let mut camera = Camera::new(Vec3::new(0.0, -4.0, 0.0), 60.0, 1.0);
        controller.keep_above_ground(&mut camera, &FlatTerrain::new(2.0));
        assert!((camera.position.y - 2.3).abs() < 1e-5);

        camera.position.y = 10.0;
        controller.keep_above_ground(&mut camera, &FlatTerrain::new(2.0));
        assert_eq!(camera.position.y, 10.0);
    }

    #[test]
    fn test_sync_matches_camera() {
        let camera = Camera::look_at(Vec3::ZERO, Vec3::new(1.0, 0.0, -1.0), Vec3::Y);
        let mut controller = FpsCameraController::default();
        controller.sync_from(&camera);

        let mut rebuilt = camera.clone();
        rebuilt.set_rotation_euler(controller.yaw(), controller.pitch());
        assert!((rebuilt.forward() - camera.forward()).length() < 1e-4);
    }

    #[test]
    fn test_idle_update_does_not_move() {
        let mut controller = FpsCameraController::default();
        let mut camera = Camera::new(Vec3::new(1.0, 5.0, 1.0), 60.0, 1.0);
        controller.update(&mut camera, &InputState::new(), 0.1, &FlatTerrain::default());
        assert_eq!(camera.position, Vec3::new(1.0, 5.0, 1.0));
    }
}
