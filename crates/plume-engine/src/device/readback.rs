use anyhow::{Context, Result};

use super::GpuContext;

/// Synchronously reads `size` bytes from the start of a GPU buffer.
///
/// The source buffer must carry `COPY_SRC` usage. The copy goes through a
/// transient staging buffer; the calling thread blocks until the device has
/// finished all submitted work, so this is a tool for consumers, tests and
/// debugging rather than the per-frame hot path.
pub fn read_buffer(gpu: &GpuContext, buffer: &wgpu::Buffer, size: u64) -> Result<Vec<u8>> {
    anyhow::ensure!(size > 0, "readback of zero bytes");
    anyhow::ensure!(
        size <= buffer.size(),
        "readback of {} bytes from a {}-byte buffer",
        size,
        buffer.size()
    );

    let staging = gpu.device().create_buffer(&wgpu::BufferDescriptor {
        label: Some("plume readback staging"),
        size,
        usage: wgpu::BufferUsages::MAP_READ | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });

    let mut encoder = gpu
        .device()
        .create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("plume readback encoder"),
        });
    encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
    gpu.queue().submit(std::iter::once(encoder.finish()));

    let slice = staging.slice(..);
    let (sender, receiver) = std::sync::mpsc::channel();
    slice.map_async(wgpu::MapMode::Read, move |result| {
        let _ = sender.send(result);
    });

    gpu.device()
        .poll(wgpu::PollType::wait_indefinitely())
        .context("device poll failed during readback")?;

    receiver
        .recv()
        .context("readback mapping callback dropped")?
        .context("failed to map readback staging buffer")?;

    let data = slice.get_mapped_range().to_vec();
    staging.unmap();

    Ok(data)
}
