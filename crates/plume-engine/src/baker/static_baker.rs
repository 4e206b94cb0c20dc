use std::sync::Arc;

use anyhow::Result;
use glam::Mat4;

use crate::device::GpuContext;
use crate::mesh::CombinedMesh;
use crate::sample::SamplePointSource;
use crate::source::{SourceId, SourceSet, StaticSource};
use crate::time::FrameTime;

use super::record::SourceGpuRecord;
use super::{BakeBuffers, MAX_SOURCE_COUNT, TransferKernel, clamp_sample_count};

/// Bakes rigid mesh sources into the output sample buffer.
///
/// Geometry is uploaded once at initialization; per-frame work is limited to
/// refreshing the per-source transform table and one transfer dispatch, so an
/// update is O(source count), not O(vertex count). Velocity is derived purely
/// from frame-to-frame root-transform deltas.
///
/// Sources whose mesh is missing or unreadable are skipped with a warning;
/// they keep their registration ordinal but own no vertices, so the effective
/// sample support shrinks without aborting initialization.
pub struct StaticSurfaceBaker {
    kernel: Arc<TransferKernel>,
    sampler: Arc<dyn SamplePointSource>,

    sample_count: u32,
    sources: SourceSet<StaticSource>,

    buffers: Option<BakeBuffers>,
    bind_group: Option<wgpu::BindGroup>,

    current_roots: Vec<Mat4>,
    previous_roots: Vec<Mat4>,
}

impl StaticSurfaceBaker {
    /// Creates an unconfigured baker. Both the transfer kernel and the
    /// sample-point source are injected here and shared between bakers.
    pub fn new(kernel: Arc<TransferKernel>, sampler: Arc<dyn SamplePointSource>) -> Self {
        Self {
            kernel,
            sampler,
            sample_count: 0,
            sources: SourceSet::new(),
            buffers: None,
            bind_group: None,
            current_roots: Vec::new(),
            previous_roots: Vec::new(),
        }
    }

    /// Stores the source list and desired sample count. Does not allocate.
    ///
    /// Sample counts below the minimum are clamped with a warning rather than
    /// rejected.
    pub fn configure(&mut self, sources: SourceSet<StaticSource>, sample_count: u32) {
        self.sample_count = clamp_sample_count(sample_count);
        self.sources = sources;
        self.discard_buffers();
    }

    /// Re-checks configuration values and unconditionally discards buffers.
    ///
    /// Must be called after any external mutation of sources or sample count;
    /// skipping it leaves subsequent behavior undefined (documented contract,
    /// not enforced).
    pub fn validate(&mut self) {
        self.sample_count = clamp_sample_count(self.sample_count);
        self.discard_buffers();
    }

    /// True when at least one source is registered.
    pub fn is_valid(&self) -> bool {
        !self.sources.is_empty()
    }

    pub fn is_initialized(&self) -> bool {
        self.buffers.is_some()
    }

    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn sources(&self) -> &SourceSet<StaticSource> {
        &self.sources
    }

    /// Mutable source access, e.g. to animate a transform between frames.
    pub fn source_mut(&mut self, id: SourceId) -> Option<&mut StaticSource> {
        self.sources.get_mut(id)
    }

    /// Handle to the output sample buffer; `None` unless initialized. The
    /// underlying allocation is replaced (not resized) across
    /// reconfigurations, so consumers must re-fetch after `validate`.
    pub fn sample_buffer(&self) -> Option<&wgpu::Buffer> {
        self.buffers.as_ref().map(|b| b.output())
    }

    /// Combines readable sources, generates sample points and allocates the
    /// buffer set.
    ///
    /// Configuration problems degrade: unreadable meshes are skipped with a
    /// warning, and a source list beyond capacity is truncated with an error
    /// log. Only an empty effective source set or a generator failure leaves
    /// the baker uninitialized.
    pub fn initialize(&mut self, gpu: &GpuContext) -> Result<()> {
        anyhow::ensure!(self.is_valid(), "initialize called before configure");
        self.discard_buffers();

        let mut effective = self.sources.len();
        if effective > MAX_SOURCE_COUNT {
            log::error!(
                "too many mesh sources ({}); truncating to the maximum of {}",
                effective,
                MAX_SOURCE_COUNT
            );
            effective = MAX_SOURCE_COUNT;
        }

        // Readable meshes, tagged with their registration ordinal.
        let mut ordinals = Vec::new();
        let mut meshes = Vec::new();
        for (ordinal, (_, source)) in self.sources.iter().enumerate().take(effective) {
            match source.readable_mesh() {
                Some(mesh) => {
                    ordinals.push(ordinal as u32);
                    meshes.push(mesh);
                }
                None => {
                    log::warn!("skipping source '{}': no readable mesh", source.name);
                }
            }
        }

        if meshes.is_empty() {
            log::error!("no readable meshes among {} sources; staying uninitialized", effective);
            return Ok(());
        }

        let combined = CombinedMesh::build(&meshes)?;
        let points = self.sampler.generate(&combined, self.sample_count as usize)?;

        // The combined domain indexes the compact (readable) list; the uploaded
        // map must speak registration ordinals so it addresses the full table.
        let index_map: Vec<u32> = combined
            .source_index_map()
            .iter()
            .map(|&compact| ordinals[compact as usize])
            .collect();

        let buffers = BakeBuffers::allocate(
            gpu,
            self.sample_count,
            &combined,
            &index_map,
            effective as u32,
            &points,
        );

        // Static geometry never swaps the ring; one bind group suffices.
        self.bind_group = Some(self.kernel.bind_group(gpu, &buffers, buffers.parity()));
        self.buffers = Some(buffers);

        // Seed the transform history from the current pose so the first
        // update reports zero velocity.
        self.current_roots = self
            .sources
            .iter()
            .take(effective)
            .map(|(_, s)| s.transform)
            .collect();
        self.previous_roots = self.current_roots.clone();

        log::info!(
            "static baker initialized: {} samples over {} readable sources ({} registered)",
            self.sample_count,
            meshes.len(),
            self.sources.len()
        );
        Ok(())
    }

    /// Refreshes the transform table and dispatches the transfer kernel.
    ///
    /// No-op when there are no valid sources or the baker is uninitialized;
    /// the static variant does not lazily initialize.
    pub fn update_buffer(&mut self, gpu: &GpuContext, frame: &FrameTime) {
        if !self.is_valid() {
            return;
        }
        let Some(buffers) = self.buffers.as_ref() else {
            return;
        };
        let Some(bind_group) = self.bind_group.as_ref() else {
            return;
        };

        // Capture current transforms.
        let effective = self.current_roots.len();
        for (i, (_, source)) in self.sources.iter().enumerate().take(effective) {
            self.current_roots[i] = source.transform;
        }

        let records: Vec<SourceGpuRecord> = self
            .sources
            .iter()
            .enumerate()
            .take(effective)
            .map(|(i, (_, source))| {
                SourceGpuRecord::new(
                    self.current_roots[i],
                    self.previous_roots[i],
                    self.current_roots[i].inverse(),
                    source.material_count,
                )
            })
            .collect();

        buffers.upload_source_table(gpu, &records);
        buffers.upload_params(gpu, frame.frame_rate());

        let mut encoder = gpu
            .device()
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("plume static bake encoder"),
            });
        self.kernel
            .encode(&mut encoder, bind_group, buffers.sample_count());
        gpu.queue().submit(std::iter::once(encoder.finish()));

        // Transform history for the next frame's velocity baseline.
        self.previous_roots.copy_from_slice(&self.current_roots);
    }

    /// Releases all GPU buffers. Idempotent.
    pub fn dispose(&mut self) {
        self.discard_buffers();
    }

    fn discard_buffers(&mut self) {
        self.bind_group = None;
        self.buffers = None;
        self.current_roots.clear();
        self.previous_roots.clear();
    }
}

// Lifecycle behavior needs a live device and is covered by the integration
// tests in tests/bake_pipeline.rs; the CPU-side pieces (clamping, source-set
// semantics, ordinal remapping inputs) have unit tests in their own modules.
