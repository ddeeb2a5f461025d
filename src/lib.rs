//! Meadow - GPU-simulated, compute-culled grass field rendering

pub mod core;
pub mod math;
pub mod terrain;
pub mod grass;
pub mod render;
