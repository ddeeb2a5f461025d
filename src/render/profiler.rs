//! GPU profiling using wgpu timestamp queries

/// Per-pass GPU timing data (in milliseconds)
#[derive(Debug, Clone, Copy, Default, serde::Serialize, serde::Deserialize)]
pub struct GpuTimings {
    pub physics_ms: f32,
    pub cull_ms: f32,
    pub draw_ms: f32,
    pub total_gpu_ms: f32,
}

/// Pass slots in the query set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfiledPass {
    Physics = 0,
    Cull = 1,
    Draw = 2,
}

struct Queries {
    query_set: wgpu::QuerySet,
    resolve_buffer: wgpu::Buffer,
    read_buffer: wgpu::Buffer,
}

/// GPU profiler using timestamp queries.
///
/// Stays disabled when the device lacks `TIMESTAMP_QUERY`.
pub struct GpuProfiler {
    enabled: bool,
    queries: Option<Queries>,
    timestamp_period: f32,
    /// Stores the latest resolved timings
    latest_timings: GpuTimings,
    /// Rolling average over N frames
    frame_timings: std::collections::VecDeque<GpuTimings>,
    max_history: usize,
}

const NUM_PASSES: u32 = 3; // physics, cull, draw
const TIMESTAMPS_PER_PASS: u32 = 2; // begin + end
const TOTAL_TIMESTAMPS: u32 = NUM_PASSES * TIMESTAMPS_PER_PASS;
const BUFFER_SIZE: u64 = TOTAL_TIMESTAMPS as u64 * std::mem::size_of::<u64>() as u64;

impl GpuProfiler {
    pub fn new(device: &wgpu::Device, queue: &wgpu::Queue, enabled: bool) -> Self {
        let supported = device.features().contains(wgpu::Features::TIMESTAMP_QUERY);
        if enabled && !supported {
            log::warn!("GPU profiling requested but TIMESTAMP_QUERY is unavailable");
        }

        let queries = supported.then(|| Queries {
            query_set: device.create_query_set(&wgpu::QuerySetDescriptor {
                label: Some("gpu_profiler_queries"),
                ty: wgpu::QueryType::Timestamp,
                count: TOTAL_TIMESTAMPS,
            }),
            resolve_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("gpu_profiler_resolve"),
                size: BUFFER_SIZE,
                usage: wgpu::BufferUsages::QUERY_RESOLVE | wgpu::BufferUsages::COPY_SRC,
                mapped_at_creation: false,
            }),
            read_buffer: device.create_buffer(&wgpu::BufferDescriptor {
                label: Some("gpu_profiler_read"),
                size: BUFFER_SIZE,
                usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
                mapped_at_creation: false,
            }),
        });

        Self {
            enabled: enabled && supported,
            queries,
            timestamp_period: queue.get_timestamp_period(),
            latest_timings: GpuTimings::default(),
            frame_timings: std::collections::VecDeque::new(),
            max_history: 60,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled && self.queries.is_some();
    }

    fn active(&self) -> Option<&Queries> {
        if self.enabled { self.queries.as_ref() } else { None }
    }

    /// Get timestamp writes for a compute pass
    pub fn compute_pass_timestamp_writes(&self, pass: ProfiledPass) -> Option<wgpu::ComputePassTimestampWrites<'_>> {
        let q = self.active()?;
        let index = pass as u32;
        Some(wgpu::ComputePassTimestampWrites {
            query_set: &q.query_set,
            beginning_of_pass_write_index: Some(index * 2),
            end_of_pass_write_index: Some(index * 2 + 1),
        })
    }

    /// Get timestamp writes for a render pass
    pub fn render_pass_timestamp_writes(&self, pass: ProfiledPass) -> Option<wgpu::RenderPassTimestampWrites<'_>> {
        let q = self.active()?;
        let index = pass as u32;
        Some(wgpu::RenderPassTimestampWrites {
            query_set: &q.query_set,
            beginning_of_pass_write_index: Some(index * 2),
            end_of_pass_write_index: Some(index * 2 + 1),
        })
    }

    /// Resolve queries and copy to readable buffer. Call after all passes, before submit.
    pub fn resolve(&self, encoder: &mut wgpu::CommandEncoder) {
        let Some(q) = self.active() else {
            return;
        };
        encoder.resolve_query_set(&q.query_set, 0..TOTAL_TIMESTAMPS, &q.resolve_buffer, 0);
        encoder.copy_buffer_to_buffer(&q.resolve_buffer, 0, &q.read_buffer, 0, BUFFER_SIZE);
    }

    /// Read back results of the last submitted frame.
    pub fn read_results(&mut self, device: &wgpu::Device) {
        let Some(q) = self.active() else {
            return;
        };

        let buffer_slice = q.read_buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        buffer_slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });

        // Poll device to process the map
        device.poll(wgpu::PollType::Wait { submission_index: None, timeout: None }).ok();

        let mut resolved = None;
        if let Ok(Ok(())) = rx.try_recv() {
            let data = buffer_slice.get_mapped_range();
            let timestamps: &[u64] = bytemuck::cast_slice(&data);
            resolved = timings_from_ticks(timestamps, self.timestamp_period);
            drop(data);
            q.read_buffer.unmap();
        }

        if let Some(timings) = resolved {
            self.frame_timings.push_back(timings);
            if self.frame_timings.len() > self.max_history {
                self.frame_timings.pop_front();
            }
            self.latest_timings = timings;
        }
    }

    /// Get latest per-pass timings
    pub fn latest_timings(&self) -> GpuTimings {
        self.latest_timings
    }

    /// Get averaged timings over the history window
    pub fn average_timings(&self) -> GpuTimings {
        if self.frame_timings.is_empty() {
            return GpuTimings::default();
        }
        let n = self.frame_timings.len() as f32;
        let sum = self.frame_timings.iter().fold(GpuTimings::default(), |acc, t| GpuTimings {
            physics_ms: acc.physics_ms + t.physics_ms,
            cull_ms: acc.cull_ms + t.cull_ms,
            draw_ms: acc.draw_ms + t.draw_ms,
            total_gpu_ms: acc.total_gpu_ms + t.total_gpu_ms,
        });
        GpuTimings {
            physics_ms: sum.physics_ms / n,
            cull_ms: sum.cull_ms / n,
            draw_ms: sum.draw_ms / n,
            total_gpu_ms: sum.total_gpu_ms / n,
        }
    }
}

/// Convert raw begin/end ticks into per-pass milliseconds
fn timings_from_ticks(timestamps: &[u64], timestamp_period: f32) -> Option<GpuTimings> {
    if timestamps.len() < TOTAL_TIMESTAMPS as usize {
        return None;
    }
    let ns_per_tick = timestamp_period as f64;
    let ms = |begin: u64, end: u64| -> f32 {
        ((end.wrapping_sub(begin)) as f64 * ns_per_tick / 1_000_000.0) as f32
    };
    Some(GpuTimings {
        physics_ms: ms(timestamps[0], timestamps[1]),
        cull_ms: ms(timestamps[2], timestamps[3]),
        draw_ms: ms(timestamps[4], timestamps[5]),
        total_gpu_ms: ms(timestamps[0], timestamps[5]),
    })
}
