//! Rendering system and GPU interfaces

pub mod buffer;
pub mod context;
pub mod grass_renderer;
pub mod pipeline;
pub mod profiler;

pub use context::GpuContext;
pub use grass_renderer::{FrameTarget, GrassRenderer};
