//! Frame timing and simulation time

use std::collections::VecDeque;
use std::time::{Duration, Instant};

/// Rolling frame statistics
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct FrameStats {
    pub avg_fps: f32,
    pub min_fps: f32,
    pub max_fps: f32,
    pub frame_count: u64,
}

/// Tracks wall-clock frame timing and FPS
pub struct FrameTimer {
    last_frame: Instant,
    delta: Duration,
    frame_count: u64,
    /// (timestamp, frame_time_secs) for the last `window`
    history: VecDeque<(Instant, f32)>,
    window: Duration,
}

impl FrameTimer {
    pub fn new() -> Self {
        Self {
            last_frame: Instant::now(),
            delta: Duration::ZERO,
            frame_count: 0,
            history: VecDeque::new(),
            window: Duration::from_secs(2),
        }
    }

    /// Call once per frame
    pub fn tick(&mut self) {
        let now = Instant::now();
        self.delta = now - self.last_frame;
        self.last_frame = now;
        self.frame_count += 1;

        self.history.push_back((now, self.delta.as_secs_f32()));
        while let Some(&(timestamp, _)) = self.history.front() {
            if now.duration_since(timestamp) > self.window {
                self.history.pop_front();
            } else {
                break;
            }
        }
    }

    /// Wall-clock delta of the last frame in seconds
    pub fn delta_secs(&self) -> f32 {
        self.delta.as_secs_f32()
    }

    pub fn frame_count(&self) -> u64 {
        self.frame_count
    }

    /// FPS statistics over the rolling window
    pub fn stats(&self) -> FrameStats {
        let mut total = 0.0f32;
        let mut min_fps = f32::INFINITY;
        let mut max_fps = 0.0f32;

        for &(_, frame_time) in &self.history {
            total += frame_time;
            let fps = if frame_time > 0.0 { 1.0 / frame_time } else { 0.0 };
            min_fps = min_fps.min(fps);
            max_fps = max_fps.max(fps);
        }

        if self.history.is_empty() {
            return FrameStats {
                frame_count: self.frame_count,
                ..Default::default()
            };
        }

        FrameStats {
            avg_fps: if total > 0.0 { self.history.len() as f32 / total } else { 0.0 },
            min_fps,
            max_fps,
            frame_count: self.frame_count,
        }
    }
}

impl Default for FrameTimer {
    fn default() -> Self {
        Self::new()
    }
}

/// Simulation time fed to the physics pass.
///
/// `total_time` only advances while unpaused, and each step is clamped to
/// `max_delta` so a long hitch (window drag, breakpoint) does not become one
/// giant physics step.
#[derive(Debug, Clone, Copy)]
pub struct SimulationClock {
    delta_time: f32,
    total_time: f32,
    max_delta: f32,
    time_scale: f32,
    paused: bool,
}

impl SimulationClock {
    pub fn new(max_delta: f32) -> Self {
        Self {
            delta_time: 0.0,
            total_time: 0.0,
            max_delta: max_delta.max(0.0),
            time_scale: 1.0,
            paused: false,
        }
    }

    /// Advance by a wall-clock delta (seconds)
    pub fn advance(&mut self, wall_delta: f32) {
        if self.paused || !wall_delta.is_finite() {
            self.delta_time = 0.0;
            return;
        }
        self.delta_time = (wall_delta.max(0.0) * self.time_scale).min(self.max_delta);
        self.total_time += self.delta_time;
    }

    pub fn delta_time(&self) -> f32 {
        self.delta_time
    }

    pub fn total_time(&self) -> f32 {
        self.total_time
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }
}

impl Default for SimulationClock {
    fn default() -> Self {
        Self::new(1.0 / 20.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clock_accumulates() {
        let mut clock = SimulationClock::new(0.1);
        clock.advance(0.016);
        clock.advance(0.016);
        assert!((clock.total_time() - 0.032).abs() < 1e-6);
        assert!((clock.delta_time() - 0.016).abs() < 1e-6);
    }

    #[test]
    fn test_clock_clamps_hitch() {
        let mut clock = SimulationClock::new(0.05);
        clock.advance(2.0);
        assert_eq!(clock.delta_time(), 0.05);
        assert_eq!(clock.total_time(), 0.05);
    }

    #[test]
    fn test_clock_pause() {
        let mut clock = SimulationClock::default();
        clock.advance(0.01);
        clock.set_paused(true);
        clock.advance(0.01);
        assert_eq!(clock.delta_time(), 0.0);
        assert!((clock.total_time() - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_clock_rejects_nan() {
        let mut clock = SimulationClock::default();
        clock.advance(f32::NAN);
        assert_eq!(clock.delta_time(), 0.0);
        assert_eq!(clock.total_time(), 0.0);
    }

    #[test]
    fn test_frame_timer_empty_stats() {
        let timer = FrameTimer::new();
        let stats = timer.stats();
        assert_eq!(stats.frame_count, 0);
        assert_eq!(stats.avg_fps, 0.0);
    }

    #[test]
    fn test_frame_timer_counts() {
        let mut timer = FrameTimer::new();
        timer.tick();
        timer.tick();
        assert_eq!(timer.frame_count(), 2);
        assert_eq!(timer.stats().frame_count, 2);
    }
}
