//! GPU storage for the blade store, the compacted draw list and the indirect
//! draw arguments.
//!
//! All three buffers live for the scene lifetime. The blade buffer is written
//! once at upload and from then on only by the physics pass; the draw list and
//! args are rebuilt by the cull pass every frame.

use crate::core::error::Error;
use crate::grass::{Blade, BladeStore, DrawEntry, DrawIndirectArgs};

const ARGS_SIZE: u64 = std::mem::size_of::<DrawIndirectArgs>() as u64;
const ENTRY_SIZE: u64 = std::mem::size_of::<DrawEntry>() as u64;

/// Map a buffer for reading, block until it is ready, and copy its bytes out
fn read_mapped(device: &wgpu::Device, buffer: &wgpu::Buffer) -> Result<Vec<u8>, Error> {
    let slice = buffer.slice(..);
    let (tx, rx) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = tx.send(result);
    });
    device
        .poll(wgpu::PollType::Wait { submission_index: None, timeout: None })
        .map_err(|e| Error::Gpu(format!("Device poll failed: {}", e)))?;

    match rx.recv() {
        Ok(Ok(())) => {}
        Ok(Err(e)) => return Err(Error::Gpu(format!("Buffer map failed: {}", e))),
        Err(_) => return Err(Error::Gpu("Buffer map callback dropped".into())),
    }

    let bytes = slice.get_mapped_range().to_vec();
    buffer.unmap();
    Ok(bytes)
}

/// GPU buffers shared by the physics, cull and draw passes
pub struct BladeBuffer {
    /// `array<Blade>`, read-write for physics, read-only for cull and draw
    blades: wgpu::Buffer,
    /// `array<u32>` packed draw entries, `capacity` long
    draw_list: wgpu::Buffer,
    /// `DrawIndirectArgs`, atomically incremented by the cull pass
    draw_args: wgpu::Buffer,
    /// Staging copy of `draw_args` for visible-count readback
    args_readback: wgpu::Buffer,
    blade_count: u32,
    capacity: u32,
}

impl BladeBuffer {
    /// Allocate the buffers and upload the store and initial args. The draw
    /// list holds one entry per blade.
    pub fn new(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        store: &BladeStore,
        initial_args: DrawIndirectArgs,
    ) -> Result<Self, Error> {
        let blade_count = u32::try_from(store.len())
            .map_err(|_| Error::Gpu(format!("{} blades do not fit a u32 count", store.len())))?;
        Self::with_capacity(device, queue, store, initial_args, blade_count)
    }

    /// Like `new`, with an explicit draw list length (at least 1)
    pub(crate) fn with_capacity(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        store: &BladeStore,
        initial_args: DrawIndirectArgs,
        capacity: u32,
    ) -> Result<Self, Error> {
        let blade_count = u32::try_from(store.len())
            .map_err(|_| Error::Gpu(format!("{} blades do not fit a u32 count", store.len())))?;
        let capacity = capacity.max(1);

        let limits = device.limits();
        if store.byte_size() > limits.max_storage_buffer_binding_size as u64 {
            return Err(Error::Gpu(format!(
                "Blade buffer of {}MB exceeds the device storage binding limit of {}MB",
                store.byte_size() / 1024 / 1024,
                limits.max_storage_buffer_binding_size / 1024 / 1024
            )));
        }

        let blades = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_blades"),
            size: store.byte_size(),
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let draw_list = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_draw_list"),
            size: capacity as u64 * ENTRY_SIZE,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let draw_args = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_draw_args"),
            size: ARGS_SIZE,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::INDIRECT
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });

        let args_readback = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_draw_args_readback"),
            size: ARGS_SIZE,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        queue.write_buffer(&blades, 0, bytemuck::cast_slice(store.as_slice()));
        queue.write_buffer(&draw_args, 0, bytemuck::bytes_of(&initial_args));

        log::info!(
            "Uploaded {} blades ({:.1}MB), draw list capacity {}",
            blade_count,
            store.byte_size() as f64 / (1024.0 * 1024.0),
            capacity
        );

        Ok(Self {
            blades,
            draw_list,
            draw_args,
            args_readback,
            blade_count,
            capacity,
        })
    }

    /// Overwrite the GPU blades (e.g. after a reset). Length must match.
    pub fn upload_blades(&self, queue: &wgpu::Queue, blades: &[Blade]) -> Result<(), Error> {
        if blades.len() != self.blade_count as usize {
            return Err(Error::Gpu(format!(
                "Blade upload of {} does not match buffer of {}",
                blades.len(),
                self.blade_count
            )));
        }
        queue.write_buffer(&self.blades, 0, bytemuck::cast_slice(blades));
        Ok(())
    }

    /// Zero `instance_count` ahead of the cull pass
    pub fn clear_instance_count(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.clear_buffer(
            &self.draw_args,
            DrawIndirectArgs::INSTANCE_COUNT_OFFSET,
            Some(std::mem::size_of::<u32>() as u64),
        );
    }

    /// Record a copy of the args into the readback buffer
    pub fn copy_args_for_readback(&self, encoder: &mut wgpu::CommandEncoder) {
        encoder.copy_buffer_to_buffer(&self.draw_args, 0, &self.args_readback, 0, ARGS_SIZE);
    }

    /// Blocking read of the args last copied by `copy_args_for_readback`
    pub fn read_args(&self, device: &wgpu::Device) -> Result<DrawIndirectArgs, Error> {
        let bytes = read_mapped(device, &self.args_readback)?;
        Ok(bytemuck::pod_read_unaligned(&bytes[..ARGS_SIZE as usize]))
    }

    /// Blocking read of the args and the live part of the draw list as the
    /// last submitted cull pass left them
    pub fn read_draw_list(
        &self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
    ) -> Result<(DrawIndirectArgs, Vec<DrawEntry>), Error> {
        let list_size = self.draw_list.size();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_draw_list_readback"),
            size: list_size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grass_draw_list_readback"),
        });
        self.copy_args_for_readback(&mut encoder);
        encoder.copy_buffer_to_buffer(&self.draw_list, 0, &staging, 0, list_size);
        queue.submit(Some(encoder.finish()));

        let args = self.read_args(device)?;
        let live = args.instance_count.min(self.capacity) as usize;
        let bytes = read_mapped(device, &staging)?;
        let entries = bytes
            .chunks_exact(ENTRY_SIZE as usize)
            .take(live)
            .map(|chunk| DrawEntry(bytemuck::pod_read_unaligned(chunk)))
            .collect();
        Ok((args, entries))
    }

    /// Blocking read of the whole blade buffer
    pub fn read_blades(&self, device: &wgpu::Device, queue: &wgpu::Queue) -> Result<Vec<Blade>, Error> {
        let size = self.blades.size();
        let staging = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("grass_blades_readback"),
            size,
            usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("grass_blades_readback"),
        });
        encoder.copy_buffer_to_buffer(&self.blades, 0, &staging, 0, size);
        queue.submit(Some(encoder.finish()));

        let bytes = read_mapped(device, &staging)?;
        Ok(bytes
            .chunks_exact(std::mem::size_of::<Blade>())
            .map(bytemuck::pod_read_unaligned)
            .collect())
    }

    pub fn blades(&self) -> &wgpu::Buffer {
        &self.blades
    }

    pub fn draw_list(&self) -> &wgpu::Buffer {
        &self.draw_list
    }

    pub fn draw_args(&self) -> &wgpu::Buffer {
        &self.draw_args
    }

    pub fn blade_count(&self) -> u32 {
        self.blade_count
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}
