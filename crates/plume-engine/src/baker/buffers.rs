use glam::{Vec2, Vec3};

use crate::device::GpuContext;
use crate::mesh::CombinedMesh;
use crate::sample::SamplePoint;

use super::record::{FrameParams, SourceGpuRecord, SurfaceSample};

/// The GPU buffer set owned by one baker.
///
/// Allocation happens once per initialization and is sized by the combined
/// domain's topology; any topology or sample-count change tears the whole set
/// down and reallocates (`validate`), never resizes in place. Consumers that
/// cached the output handle must re-fetch it afterwards.
///
/// The position ring holds two same-sized slots. `current_slot()` receives
/// this frame's bake; after the transfer dispatch the owner calls `swap()`,
/// which flips the parity flag so this frame's positions become the next
/// frame's "previous" data. Ownership of both slots never moves, keeping
/// disposal unambiguous.
pub struct BakeBuffers {
    sample_points: wgpu::Buffer,
    position_ring: [wgpu::Buffer; 2],
    /// Index of the slot holding the *current* frame's positions.
    parity: usize,

    normals: wgpu::Buffer,
    uvs: wgpu::Buffer,
    source_index: wgpu::Buffer,
    source_table: wgpu::Buffer,
    params: wgpu::Buffer,
    output: wgpu::Buffer,

    sample_count: u32,
    vertex_count: u32,
    source_count: u32,
}

impl BakeBuffers {
    /// Allocates every buffer and seeds the static data: sample points, the
    /// source index map, normals, uvs, and both position ring slots (so the
    /// first dispatch sees zero displacement).
    ///
    /// `source_index_map` must already be expressed in registration ordinals;
    /// `source_count` is the registered count, which may exceed the number of
    /// sources contributing vertices when unreadable sources were skipped.
    pub fn allocate(
        gpu: &GpuContext,
        sample_count: u32,
        combined: &CombinedMesh,
        source_index_map: &[u32],
        source_count: u32,
        points: &[SamplePoint],
    ) -> Self {
        debug_assert_eq!(points.len(), sample_count as usize);
        debug_assert_eq!(source_index_map.len(), combined.vertex_count());

        let device = gpu.device();
        let vertex_count = combined.vertex_count() as u32;

        let storage_init = |label: &str, contents: &[u8]| -> wgpu::Buffer {
            use wgpu::util::DeviceExt;
            device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(label),
                contents,
                usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            })
        };

        let sample_points =
            storage_init("plume sample points", bytemuck::cast_slice(points));
        let source_index =
            storage_init("plume source index map", bytemuck::cast_slice(source_index_map));
        let normals = storage_init(
            "plume normal buffer",
            bytemuck::cast_slice(&widen(&combined.channels().normals)),
        );
        let uvs = storage_init(
            "plume uv buffer",
            bytemuck::cast_slice(&flatten_uv(&combined.channels().uvs)),
        );

        let seeded_positions = widen(&combined.channels().positions);
        let position_ring = [
            storage_init("plume position ring 0", bytemuck::cast_slice(&seeded_positions)),
            storage_init("plume position ring 1", bytemuck::cast_slice(&seeded_positions)),
        ];

        let source_table = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plume source metadata table"),
            size: SourceGpuRecord::SIZE * source_count as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plume frame params"),
            size: FrameParams::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // COPY_SRC so consumers (and tests) can read the records back.
        let output = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plume sample output"),
            size: SurfaceSample::SIZE * sample_count as u64,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_SRC
                | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        log::debug!(
            "allocated bake buffers: {} samples, {} vertices, {} sources",
            sample_count,
            vertex_count,
            source_count
        );

        Self {
            sample_points,
            position_ring,
            parity: 0,
            normals,
            uvs,
            source_index,
            source_table,
            params,
            output,
            sample_count,
            vertex_count,
            source_count,
        }
    }

    #[inline]
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    #[inline]
    pub fn vertex_count(&self) -> u32 {
        self.vertex_count
    }

    #[inline]
    pub fn source_count(&self) -> u32 {
        self.source_count
    }

    #[inline]
    pub fn sample_points(&self) -> &wgpu::Buffer {
        &self.sample_points
    }

    #[inline]
    pub fn normals(&self) -> &wgpu::Buffer {
        &self.normals
    }

    #[inline]
    pub fn uvs(&self) -> &wgpu::Buffer {
        &self.uvs
    }

    #[inline]
    pub fn source_index(&self) -> &wgpu::Buffer {
        &self.source_index
    }

    #[inline]
    pub fn source_table(&self) -> &wgpu::Buffer {
        &self.source_table
    }

    #[inline]
    pub fn params(&self) -> &wgpu::Buffer {
        &self.params
    }

    #[inline]
    pub fn output(&self) -> &wgpu::Buffer {
        &self.output
    }

    /// Ring parity: which slot is "current" for this frame.
    #[inline]
    pub fn parity(&self) -> usize {
        self.parity
    }

    /// The slot receiving this frame's positions.
    #[inline]
    pub fn current_positions(&self) -> &wgpu::Buffer {
        &self.position_ring[self.parity]
    }

    /// The slot holding the previous frame's positions.
    #[inline]
    pub fn previous_positions(&self) -> &wgpu::Buffer {
        &self.position_ring[1 - self.parity]
    }

    /// Ring slot by raw index, for building both parity bind groups up front.
    #[inline]
    pub fn ring_slot(&self, index: usize) -> &wgpu::Buffer {
        &self.position_ring[index]
    }

    /// Flips ring parity. Call after the transfer dispatch for the frame.
    #[inline]
    pub fn swap(&mut self) {
        self.parity = 1 - self.parity;
    }

    /// Uploads baked vertex attributes for one source at its combined-domain
    /// offset. When `seed_previous` is set the previous ring slot receives the
    /// same data, which suppresses the first-frame velocity spike.
    ///
    /// `scratch` is the caller's reusable widening buffer.
    pub fn write_pose(
        &self,
        gpu: &GpuContext,
        vertex_offset: u32,
        positions: &[Vec3],
        normals: &[Vec3],
        uvs: &[Vec2],
        seed_previous: bool,
        scratch: &mut Vec<[f32; 4]>,
    ) {
        let queue = gpu.queue();
        let pos_offset = vertex_offset as u64 * 16;

        widen_into(positions, scratch);
        queue.write_buffer(
            self.current_positions(),
            pos_offset,
            bytemuck::cast_slice(scratch),
        );
        if seed_previous {
            queue.write_buffer(
                self.previous_positions(),
                pos_offset,
                bytemuck::cast_slice(scratch),
            );
        }

        widen_into(normals, scratch);
        queue.write_buffer(&self.normals, pos_offset, bytemuck::cast_slice(scratch));

        queue.write_buffer(
            &self.uvs,
            vertex_offset as u64 * 8,
            bytemuck::cast_slice(&flatten_uv(uvs)),
        );
    }

    /// Uploads the per-source metadata table.
    pub fn upload_source_table(&self, gpu: &GpuContext, records: &[SourceGpuRecord]) {
        debug_assert_eq!(records.len(), self.source_count as usize);
        gpu.queue()
            .write_buffer(&self.source_table, 0, bytemuck::cast_slice(records));
    }

    /// Uploads the per-dispatch uniform parameters.
    pub fn upload_params(&self, gpu: &GpuContext, frame_rate: f32) {
        let params = FrameParams {
            sample_count: self.sample_count,
            source_count: self.source_count,
            frame_rate,
            _pad: 0,
        };
        gpu.queue()
            .write_buffer(&self.params, 0, bytemuck::bytes_of(&params));
    }
}

/// Vec3 streams are stored as vec4 on the GPU (16-byte stride).
fn widen(v: &[Vec3]) -> Vec<[f32; 4]> {
    let mut out = Vec::new();
    widen_into(v, &mut out);
    out
}

fn widen_into(v: &[Vec3], out: &mut Vec<[f32; 4]>) {
    out.clear();
    out.extend(v.iter().map(|p| [p.x, p.y, p.z, 0.0]));
}

fn flatten_uv(v: &[Vec2]) -> Vec<[f32; 2]> {
    v.iter().map(|uv| [uv.x, uv.y]).collect()
}
