//! GPU buffer management

pub mod blade_buffer;
pub mod camera_buffer;

pub use blade_buffer::BladeBuffer;
pub use camera_buffer::{CameraBuffer, CameraUniform};
