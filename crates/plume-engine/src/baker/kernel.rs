use crate::device::GpuContext;

use super::record::FrameParams;
use super::{BakeBuffers, group_count};

/// Compiled transfer compute pipeline.
///
/// Compiled once per device and injected into bakers at construction, so any
/// number of bakers share one pipeline. The bind-group layout covers the full
/// `BakeBuffers` set; one bind group exists per ring parity so the per-frame
/// swap is just an index flip.
pub struct TransferKernel {
    pipeline: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl TransferKernel {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("plume transfer shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/transfer.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("plume transfer bgl"),
            entries: &[
                uniform_entry(0, FrameParams::SIZE),
                storage_entry(1, true),  // sample points
                storage_entry(2, true),  // current positions
                storage_entry(3, true),  // previous positions
                storage_entry(4, true),  // normals
                storage_entry(5, true),  // uvs
                storage_entry(6, true),  // source index map
                storage_entry(7, true),  // source metadata table
                storage_entry(8, false), // output samples
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("plume transfer pipeline layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
            label: Some("plume transfer pipeline"),
            layout: Some(&pipeline_layout),
            module: &shader,
            entry_point: Some("transfer"),
            compilation_options: Default::default(),
            cache: None,
        });

        Self { pipeline, layout }
    }

    /// Builds the bind group for one ring parity.
    ///
    /// `parity` names the slot treated as *current*; the other slot binds as
    /// previous.
    pub fn bind_group(
        &self,
        gpu: &GpuContext,
        buffers: &BakeBuffers,
        parity: usize,
    ) -> wgpu::BindGroup {
        gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("plume transfer bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: buffers.params().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: buffers.sample_points().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: buffers.ring_slot(parity).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: buffers.ring_slot(1 - parity).as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: buffers.normals().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: buffers.uvs().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 6,
                    resource: buffers.source_index().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 7,
                    resource: buffers.source_table().as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 8,
                    resource: buffers.output().as_entire_binding(),
                },
            ],
        })
    }

    /// Encodes the transfer dispatch for `sample_count` samples.
    pub fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        sample_count: u32,
    ) {
        let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
            label: Some("plume transfer pass"),
            timestamp_writes: None,
        });
        pass.set_pipeline(&self.pipeline);
        pass.set_bind_group(0, bind_group, &[]);
        pass.dispatch_workgroups(group_count(sample_count), 1, 1);
    }
}

pub(crate) fn uniform_entry(binding: u32, min_size: u64) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: false,
            min_binding_size: std::num::NonZeroU64::new(min_size),
        },
        count: None,
    }
}

pub(crate) fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}
