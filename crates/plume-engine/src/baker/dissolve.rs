use std::sync::Arc;

use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use glam::Vec3;

use crate::device::GpuContext;
use crate::sample::SamplePointSource;
use crate::source::{DeformingSource, SourceId, SourceSet};
use crate::time::FrameTime;

use super::kernel::{storage_entry, uniform_entry};
use super::record::BorderSample;
use super::{DeformingSurfaceBaker, TransferKernel, group_count};

/// Per-source dissolve parameters for one frame.
///
/// `enabled` for a sample at distance `r` from `reference_position`:
/// - inactive source: always 0
/// - `blur <= 0`: hard edge, 1 inside `range`, 0 outside
/// - otherwise: `1 - smoothstep(range, range + blur, r)`
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct DissolveState {
    pub is_active: bool,
    pub reference_position: Vec3,
    pub range: f32,
    pub blur: f32,
}

impl DissolveState {
    /// The padding value for sources without a caller-provided state.
    pub fn inactive() -> Self {
        Self {
            is_active: false,
            reference_position: Vec3::ZERO,
            range: 0.0,
            blur: 0.0,
        }
    }

    /// CPU mirror of the kernel's enabled computation, for tests and
    /// host-side previews.
    pub fn enabled_at(&self, distance: f32) -> f32 {
        if !self.is_active {
            return 0.0;
        }
        if self.blur <= 0.0 {
            if distance <= self.range { 1.0 } else { 0.0 }
        } else {
            1.0 - smoothstep(self.range, self.range + self.blur, distance)
        }
    }

    fn to_record(self) -> DissolveStateRecord {
        DissolveStateRecord {
            reference: self.reference_position.to_array(),
            is_active: self.is_active as u32,
            range: self.range,
            blur: self.blur,
            _pad: [0.0; 2],
        }
    }
}

impl Default for DissolveState {
    fn default() -> Self {
        Self::inactive()
    }
}

fn smoothstep(edge0: f32, edge1: f32, x: f32) -> f32 {
    let t = ((x - edge0) / (edge1 - edge0)).clamp(0.0, 1.0);
    t * t * (3.0 - 2.0 * t)
}

/// GPU layout of one dissolve state, one per registration ordinal.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct DissolveStateRecord {
    reference: [f32; 3],
    is_active: u32,
    range: f32,
    blur: f32,
    _pad: [f32; 2],
}

impl DissolveStateRecord {
    const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct BorderParams {
    sample_count: u32,
    source_count: u32,
    _pad: [u32; 2],
}

impl BorderParams {
    const SIZE: u64 = std::mem::size_of::<Self>() as u64;
}

/// Compiled dissolve pipelines: a reset pass and the border-sampling pass,
/// sharing one bind-group layout. Compiled once per device and injected.
pub struct DissolveKernel {
    reset: wgpu::ComputePipeline,
    sample_border: wgpu::ComputePipeline,
    layout: wgpu::BindGroupLayout,
}

impl DissolveKernel {
    pub fn new(gpu: &GpuContext) -> Self {
        let device = gpu.device();

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("plume dissolve shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/dissolve_border.wgsl").into()),
        });

        let layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("plume dissolve bgl"),
            entries: &[
                uniform_entry(0, BorderParams::SIZE),
                storage_entry(1, true),  // baked surface samples
                storage_entry(2, true),  // dissolve state table
                storage_entry(3, false), // border output
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("plume dissolve pipeline layout"),
            bind_group_layouts: &[&layout],
            immediate_size: 0,
        });

        let pipeline = |label: &str, entry: &str| -> wgpu::ComputePipeline {
            device.create_compute_pipeline(&wgpu::ComputePipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                module: &shader,
                entry_point: Some(entry),
                compilation_options: Default::default(),
                cache: None,
            })
        };

        Self {
            reset: pipeline("plume dissolve reset pipeline", "reset"),
            sample_border: pipeline("plume dissolve border pipeline", "sample_border"),
            layout,
        }
    }

    fn bind_group(
        &self,
        gpu: &GpuContext,
        params: &wgpu::Buffer,
        mesh_samples: &wgpu::Buffer,
        states: &wgpu::Buffer,
        border_out: &wgpu::Buffer,
    ) -> wgpu::BindGroup {
        gpu.device().create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("plume dissolve bind group"),
            layout: &self.layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: params.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: mesh_samples.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: states.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: border_out.as_entire_binding(),
                },
            ],
        })
    }

    /// Encodes reset followed by border sampling. Both passes cover the full
    /// sample range; separate passes give an implicit barrier between them.
    fn encode(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        bind_group: &wgpu::BindGroup,
        sample_count: u32,
    ) {
        let groups = group_count(sample_count);
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("plume dissolve reset pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.reset);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("plume dissolve border pass"),
                timestamp_writes: None,
            });
            pass.set_pipeline(&self.sample_border);
            pass.set_bind_group(0, bind_group, &[]);
            pass.dispatch_workgroups(groups, 1, 1);
        }
    }
}

struct BorderResources {
    border: wgpu::Buffer,
    states: wgpu::Buffer,
    params: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

/// A deforming baker plus a per-sample dissolve border overlay.
///
/// Each update first runs the full deforming bake, then derives a second
/// buffer of border records from the baked samples: every record carries the
/// sample's attributes and an `enabled` weight from the owning source's
/// [`DissolveState`]. Consumers emit particles only where `enabled` crosses
/// their threshold, which concentrates emission on the dissolve front.
pub struct DissolveBorderSampler {
    base: DeformingSurfaceBaker,
    kernel: Arc<DissolveKernel>,
    resources: Option<BorderResources>,
    state_scratch: Vec<DissolveStateRecord>,
}

impl DissolveBorderSampler {
    pub fn new(
        transfer: Arc<TransferKernel>,
        dissolve: Arc<DissolveKernel>,
        sampler: Arc<dyn SamplePointSource>,
    ) -> Self {
        Self {
            base: DeformingSurfaceBaker::new(transfer, sampler),
            kernel: dissolve,
            resources: None,
            state_scratch: Vec::new(),
        }
    }

    pub fn configure(&mut self, sources: SourceSet<Box<dyn DeformingSource>>, sample_count: u32) {
        self.base.configure(sources, sample_count);
        self.resources = None;
    }

    /// Re-checks configuration and discards all buffers, including the border
    /// overlay's.
    pub fn validate(&mut self) {
        self.base.validate();
        self.resources = None;
    }

    pub fn is_valid(&self) -> bool {
        self.base.is_valid()
    }

    pub fn is_initialized(&self) -> bool {
        self.base.is_initialized() && self.resources.is_some()
    }

    pub fn sample_count(&self) -> u32 {
        self.base.sample_count()
    }

    pub fn sources(&self) -> &SourceSet<Box<dyn DeformingSource>> {
        self.base.sources()
    }

    pub fn source_mut(&mut self, id: SourceId) -> Option<&mut Box<dyn DeformingSource>> {
        self.base.source_mut(id)
    }

    /// The underlying baked sample buffer (pre-dissolve).
    pub fn sample_buffer(&self) -> Option<&wgpu::Buffer> {
        self.base.sample_buffer()
    }

    /// The border overlay buffer of [`BorderSample`] records; `None` until
    /// the first successful update.
    pub fn border_buffer(&self) -> Option<&wgpu::Buffer> {
        self.resources.as_ref().map(|r| &r.border)
    }

    /// Runs the deforming bake, then the dissolve overlay.
    ///
    /// `states` is matched to sources by registration ordinal. A length
    /// mismatch is logged once per call; missing entries are treated as
    /// inactive and extras are ignored.
    pub fn update_buffer(
        &mut self,
        gpu: &GpuContext,
        frame: &FrameTime,
        states: &[DissolveState],
    ) -> Result<()> {
        self.base.update_buffer(gpu, frame)?;
        let Some(buffers) = self.base.buffers() else {
            self.resources = None;
            return Ok(());
        };

        if self.resources.is_none() {
            self.resources = Some(self.allocate_resources(gpu, buffers));
        }
        let resources = self.resources.as_ref().expect("just allocated");

        let source_count = buffers.source_count() as usize;
        if states.len() != source_count {
            log::warn!(
                "dissolve state count {} does not match source count {}; padding with inactive",
                states.len(),
                source_count
            );
        }
        self.state_scratch.clear();
        self.state_scratch.extend(
            states
                .iter()
                .copied()
                .chain(std::iter::repeat(DissolveState::inactive()))
                .take(source_count)
                .map(DissolveState::to_record),
        );

        let queue = gpu.queue();
        queue.write_buffer(
            &resources.states,
            0,
            bytemuck::cast_slice(&self.state_scratch),
        );
        let params = BorderParams {
            sample_count: buffers.sample_count(),
            source_count: buffers.source_count(),
            _pad: [0; 2],
        };
        queue.write_buffer(&resources.params, 0, bytemuck::bytes_of(&params));

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("plume dissolve encoder"),
            });
        self.kernel
            .encode(&mut encoder, &resources.bind_group, buffers.sample_count());
        queue.submit(std::iter::once(encoder.finish()));
        Ok(())
    }

    /// Releases all GPU buffers, the base baker's included. Idempotent.
    pub fn dispose(&mut self) {
        self.resources = None;
        self.base.dispose();
    }

    fn allocate_resources(
        &self,
        gpu: &GpuContext,
        buffers: &super::BakeBuffers,
    ) -> BorderResources {
        let device = gpu.device();

        let border = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plume border output"),
            size: BorderSample::SIZE * buffers.sample_count() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        });
        let states = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plume dissolve state table"),
            size: DissolveStateRecord::SIZE * buffers.source_count() as u64,
            usage: wgpu::BufferUsages::STORAGE | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let params = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("plume border params"),
            size: BorderParams::SIZE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group =
            self.kernel
                .bind_group(gpu, &params, buffers.output(), &states, &border);

        BorderResources {
            border,
            states,
            params,
            bind_group,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── enabled weight ──────────────────────────────────────────────────────

    #[test]
    fn inactive_state_is_always_disabled() {
        let s = DissolveState::inactive();
        assert_eq!(s.enabled_at(0.0), 0.0);
        assert_eq!(s.enabled_at(100.0), 0.0);
    }

    #[test]
    fn hard_edge_when_blur_is_zero() {
        let s = DissolveState {
            is_active: true,
            reference_position: Vec3::ZERO,
            range: 2.0,
            blur: 0.0,
        };
        assert_eq!(s.enabled_at(1.9), 1.0);
        assert_eq!(s.enabled_at(2.0), 1.0);
        assert_eq!(s.enabled_at(2.1), 0.0);
    }

    #[test]
    fn blur_band_falls_off_monotonically() {
        let s = DissolveState {
            is_active: true,
            reference_position: Vec3::ZERO,
            range: 1.0,
            blur: 1.0,
        };
        assert_eq!(s.enabled_at(0.5), 1.0);
        assert_eq!(s.enabled_at(1.0), 1.0);
        assert_eq!(s.enabled_at(2.0), 0.0);
        assert_eq!(s.enabled_at(3.0), 0.0);

        let mid = s.enabled_at(1.5);
        assert!(mid > 0.0 && mid < 1.0);

        let mut prev = f32::INFINITY;
        for step in 0..=20 {
            let e = s.enabled_at(step as f32 * 0.15);
            assert!(e <= prev);
            prev = e;
        }
    }

    #[test]
    fn negative_blur_behaves_like_hard_edge() {
        let s = DissolveState {
            is_active: true,
            reference_position: Vec3::ZERO,
            range: 1.0,
            blur: -0.5,
        };
        assert_eq!(s.enabled_at(0.5), 1.0);
        assert_eq!(s.enabled_at(1.5), 0.0);
    }

    // ── GPU record layout ───────────────────────────────────────────────────

    #[test]
    fn state_record_layout_matches_shader() {
        assert_eq!(DissolveStateRecord::SIZE, 32);
        assert_eq!(BorderParams::SIZE, 16);
    }

    #[test]
    fn state_record_packs_activity_flag() {
        let rec = DissolveState {
            is_active: true,
            reference_position: Vec3::new(1.0, 2.0, 3.0),
            range: 4.0,
            blur: 0.5,
        }
        .to_record();
        assert_eq!(rec.reference, [1.0, 2.0, 3.0]);
        assert_eq!(rec.is_active, 1);
        assert_eq!(DissolveState::inactive().to_record().is_active, 0);
    }
}
