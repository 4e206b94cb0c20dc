use std::sync::Arc;

use anyhow::{Result, ensure};
use glam::Mat4;

use crate::device::GpuContext;
use crate::mesh::{CombinedMesh, VertexChannels};
use crate::sample::SamplePointSource;
use crate::source::{DeformingSource, SourceId, SourceSet};
use crate::time::FrameTime;

use super::record::SourceGpuRecord;
use super::{BakeBuffers, MAX_SOURCE_COUNT, TransferKernel, clamp_sample_count};

/// Bakes deforming mesh sources into the output sample buffer.
///
/// Unlike the static variant, every frame re-bakes each source's current pose
/// into the combined-domain buffers before dispatching the transfer kernel,
/// and the position ring swaps afterwards so velocity reflects actual vertex
/// motion, not just root-transform deltas.
///
/// Initialization is lazy: the first `update_buffer` after configuration
/// allocates. A configuration the baker cannot honor (over-capacity source
/// list, invalid rest mesh) is logged and leaves the baker uninitialized;
/// subsequent updates are no-ops until the configuration changes and
/// `validate` is called.
pub struct DeformingSurfaceBaker {
    kernel: Arc<TransferKernel>,
    sampler: Arc<dyn SamplePointSource>,

    sample_count: u32,
    sources: SourceSet<Box<dyn DeformingSource>>,
    /// Set when a lazy-init attempt failed; cleared by `validate`/`configure`.
    init_failed: bool,

    buffers: Option<BakeBuffers>,
    /// One bind group per ring parity, built at initialization.
    bind_groups: Option<[wgpu::BindGroup; 2]>,
    /// Combined-domain vertex offset and count per registration ordinal.
    vertex_spans: Vec<(u32, u32)>,

    previous_roots: Vec<Mat4>,
    first_bake: bool,

    pose_scratch: VertexChannels,
    widen_scratch: Vec<[f32; 4]>,
}

impl DeformingSurfaceBaker {
    pub fn new(kernel: Arc<TransferKernel>, sampler: Arc<dyn SamplePointSource>) -> Self {
        Self {
            kernel,
            sampler,
            sample_count: 0,
            sources: SourceSet::new(),
            init_failed: false,
            buffers: None,
            bind_groups: None,
            vertex_spans: Vec::new(),
            previous_roots: Vec::new(),
            first_bake: true,
            pose_scratch: VertexChannels::default(),
            widen_scratch: Vec::new(),
        }
    }

    /// Stores the source list and desired sample count. Allocation is deferred
    /// to the first `update_buffer`.
    pub fn configure(&mut self, sources: SourceSet<Box<dyn DeformingSource>>, sample_count: u32) {
        self.sample_count = clamp_sample_count(sample_count);
        self.sources = sources;
        self.discard_buffers();
    }

    /// Re-checks configuration values and unconditionally discards buffers,
    /// forcing reallocation on the next update. Must be called after any
    /// external mutation of sources or sample count.
    pub fn validate(&mut self) {
        self.sample_count = clamp_sample_count(self.sample_count);
        self.discard_buffers();
    }

    pub fn is_valid(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.buffers.is_some()
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn sources(&self) -> &SourceSet<Box<dyn DeformingSource>> {
        &self.sources
    }

    pub fn source_mut(&mut self, id: SourceId) -> Option<&mut Box<dyn DeformingSource>> {
        self.sources.get_mut(id)
    }

    /// Handle to the output sample buffer; `None` until the first successful
    /// update. Re-fetch after `validate`, the allocation is replaced.
    pub fn sample_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffers.as_ref().map(|b| b.output())
    }

    pub(super) fn buffers(&self) -> Option<&BakeBuffers> {
        self.buffers.as_ref()
    }

    /// Re-bakes every source's current pose and dispatches the transfer
    /// kernel, initializing first if needed.
    ///
    /// Configuration problems (no sources, over capacity, invalid rest mesh)
    /// are logged and leave the frame a no-op; `Err` is reserved for contract
    /// violations such as a pose bake returning the wrong vertex count.
    pub fn update_buffer(&mut self, gpu: &GpuContext, frame: &FrameTime) -> Result<()> {
        if !self.is_valid() || self.init_failed {
            return Ok(());
        }
        if self.buffers.is_none() {
            self.initialize(gpu)?;
            if self.buffers.is_none() {
                return Ok(());
            }
        }

        self.encode_frame(gpu, frame)?;
        Ok(())
    }

    /// Releases all GPU buffers. Idempotent.
    pub fn dispose(&mut self) {
        self.discard_buffers();
    }

    fn initialize(&mut self, gpu: &GpuContext) -> Result<()> {
        if self.sources.len() > MAX_SOURCE_COUNT {
            log::error!(
                "too many deforming sources ({}); maximum is {}. Staying uninitialized",
                self.sources.len(),
                MAX_SOURCE_COUNT
            );
            self.init_failed = true;
            return Ok(());
        }

        for (_, source) in self.sources.iter() {
            if let Err(err) = source.rest_mesh().validate() {
                log::error!(
                    "rest mesh of source '{}' is invalid: {err}. Staying uninitialized",
                    source.name()
                );
                self.init_failed = true;
                return Ok(());
            }
        }

        let meshes: Vec<_> = self.sources.iter().map(|(_, s)| s.rest_mesh()).collect();
        let combined = CombinedMesh::build(&meshes)?;
        let points = self.sampler.generate(&combined, self.sample_count as usize)?;

        self.vertex_spans = (0..meshes.len())
            .map(|ordinal| {
                let range = combined.vertex_range(ordinal);
                (range.start, range.end - range.start)
            })
            .collect();

        let buffers = BakeBuffers::allocate(
            gpu,
            self.sample_count,
            &combined,
            combined.source_index_map(),
            self.sources.len() as u32,
            &points,
        );

        self.bind_groups = Some([
            self.kernel.bind_group(gpu, &buffers, 0),
            self.kernel.bind_group(gpu, &buffers, 1),
        ]);
        self.buffers = Some(buffers);

        self.previous_roots = self.sources.iter().map(|(_, s)| s.root_transform()).collect();
        self.first_bake = true;

        log::info!(
            "deforming baker initialized: {} samples over {} sources, {} combined vertices",
            self.sample_count,
            self.sources.len(),
            combined.vertex_count()
        );
        Ok(())
    }

    fn encode_frame(&mut self, gpu: &GpuContext, frame: &FrameTime) -> Result<()> {
        let buffers = self.buffers.as_mut().expect("initialized");
        let bind_groups = self.bind_groups.as_ref().expect("initialized");

        let mut records = Vec::with_capacity(self.sources.len());
        for (ordinal, (_, source)) in self.sources.iter().enumerate() {
            let (offset, expected) = self.vertex_spans[ordinal];

            source.bake_pose(&mut self.pose_scratch)?;
            ensure!(
                self.pose_scratch.positions.len() == expected as usize,
                "source '{}' baked {} vertices, rest mesh has {}",
                source.name(),
                self.pose_scratch.positions.len(),
                expected
            );

            buffers.write_pose(
                gpu,
                offset,
                &self.pose_scratch.positions,
                &self.pose_scratch.normals,
                &self.pose_scratch.uvs,
                self.first_bake,
                &mut self.widen_scratch,
            );

            let current_root = source.root_transform();
            let previous_root = if self.first_bake {
                current_root
            } else {
                self.previous_roots[ordinal]
            };
            records.push(SourceGpuRecord::new(
                current_root,
                previous_root,
                source.world_to_local(),
                source.material_count(),
            ));
        }

        buffers.upload_source_table(gpu, &records);
        buffers.upload_params(gpu, frame.frame_rate());

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("plume deforming bake encoder"),
            });
        self.kernel
            .encode(&mut encoder, &bind_groups[buffers.parity()], buffers.sample_count());
        gpu.queue().submit(std::iter::once(encoder.finish()));

        // This frame's slot becomes next frame's history.
        buffers.swap();
        for (ordinal, (_, source)) in self.sources.iter().enumerate() {
            self.previous_roots[ordinal] = source.root_transform();
        }
        self.first_bake = false;
        Ok(())
    }

    fn discard_buffers(&mut self) {
        self.bind_groups = None;
        self.buffers = None;
        self.vertex_spans.clear();
        self.previous_roots.clear();
        self.first_bake = true;
        self.init_failed = false;
    }
}
