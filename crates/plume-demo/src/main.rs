//! Headless bake driver.
//!
//! Runs the static baker and the dissolve-wrapped deforming baker against
//! procedural meshes for a few seconds of simulated time, reading a handful
//! of records back each second so the output is visibly alive. Run with
//! `RUST_LOG=debug` for per-frame detail.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use anyhow::Result;
use glam::{Mat4, Quat, Vec3};

use plume_engine::baker::{
    DissolveBorderSampler, DissolveKernel, DissolveState, StaticSurfaceBaker, SurfaceSample,
    TransferKernel,
};
use plume_engine::device::{GpuContext, read_buffer};
use plume_engine::logging::{LoggingConfig, init_logging};
use plume_engine::mesh::primitives;
use plume_engine::sample::{AreaWeightedSampler, SamplePointSource};
use plume_engine::source::{DeformingSource, SkinnedSource, SourceSet, StaticSource};
use plume_engine::time::FrameTime;

const FRAMES: u32 = 300;
const DT: f32 = 1.0 / 60.0;

fn main() -> Result<()> {
    init_logging(LoggingConfig::default());

    let gpu = GpuContext::headless()?;
    let transfer = Arc::new(TransferKernel::new(&gpu));
    let dissolve = Arc::new(DissolveKernel::new(&gpu));
    let sampler: Arc<dyn SamplePointSource> = Arc::new(AreaWeightedSampler::default());

    // A spinning cube over a ground plane.
    let mut static_baker = StaticSurfaceBaker::new(Arc::clone(&transfer), Arc::clone(&sampler));
    let mut static_sources = SourceSet::new();
    let spinner = static_sources.insert(StaticSource::new("spinner", primitives::cube(1.0)));
    static_sources.insert(StaticSource::new("ground", primitives::plane(8, 4.0)));
    static_baker.configure(static_sources, 512);
    static_baker.initialize(&gpu)?;

    // A single-bone skinned cube bobbing on the spot, dissolving outward from
    // its center.
    let mut border_sampler =
        DissolveBorderSampler::new(transfer, dissolve, Arc::clone(&sampler));
    let mut deforming_sources: SourceSet<Box<dyn DeformingSource>> = SourceSet::new();
    let bobber = SharedSkinned::register(
        &mut deforming_sources,
        SkinnedSource::rigid("bobber", primitives::cube(1.0))?,
    );
    border_sampler.configure(deforming_sources, 512);

    for i in 0..FRAMES {
        let frame = FrameTime::fixed(DT);
        let t = i as f32 * DT;

        if let Some(src) = static_baker.source_mut(spinner) {
            src.transform = Mat4::from_rotation_translation(
                Quat::from_rotation_y(t * 1.5),
                Vec3::new(t.cos() * 2.0, 1.0, t.sin() * 2.0),
            );
        }
        static_baker.update_buffer(&gpu, &frame);

        bobber
            .borrow_mut()
            .set_pose(&[Mat4::from_translation(Vec3::Y * (t * 3.0).sin() * 0.5)])?;
        let state = DissolveState {
            is_active: true,
            reference_position: Vec3::ZERO,
            // Sweep the dissolve front across the cube and back.
            range: 0.9 * (t * 0.8).sin().abs(),
            blur: 0.15,
        };
        border_sampler.update_buffer(&gpu, &frame, &[state])?;

        if i % 60 == 0 {
            report(&gpu, &static_baker, &border_sampler, i)?;
        }
    }

    static_baker.dispose();
    border_sampler.dispose();
    log::info!("demo finished: {FRAMES} frames");
    Ok(())
}

/// Registered source the demo keeps animating after handing ownership to the
/// baker. `rest` is a cached clone; topology never changes post-construction.
struct SharedSkinned {
    name: String,
    rest: plume_engine::mesh::MeshData,
    inner: Rc<RefCell<SkinnedSource>>,
}

impl SharedSkinned {
    fn register(
        set: &mut SourceSet<Box<dyn DeformingSource>>,
        source: SkinnedSource,
    ) -> Rc<RefCell<SkinnedSource>> {
        let name = source.name().to_owned();
        let rest = source.rest_mesh().clone();
        let inner = Rc::new(RefCell::new(source));
        set.insert(Box::new(Self {
            name,
            rest,
            inner: Rc::clone(&inner),
        }));
        inner
    }
}

impl DeformingSource for SharedSkinned {
    fn name(&self) -> &str {
        &self.name
    }

    fn rest_mesh(&self) -> &plume_engine::mesh::MeshData {
        &self.rest
    }

    fn bake_pose(&self, out: &mut plume_engine::mesh::VertexChannels) -> Result<()> {
        self.inner.borrow().bake_pose(out)
    }

    fn root_transform(&self) -> Mat4 {
        self.inner.borrow().root_transform()
    }

    fn world_to_local(&self) -> Mat4 {
        self.inner.borrow().world_to_local()
    }
}

fn report(
    gpu: &GpuContext,
    static_baker: &StaticSurfaceBaker,
    border_sampler: &DissolveBorderSampler,
    frame: u32,
) -> Result<()> {
    if let Some(buffer) = static_baker.sample_buffer() {
        let bytes = read_buffer(gpu, buffer, SurfaceSample::SIZE * 8)?;
        let samples: &[SurfaceSample] = bytemuck::cast_slice(&bytes);
        let speed: f32 = samples
            .iter()
            .map(|s| Vec3::from_slice(&s.velocity[..3]).length())
            .sum::<f32>()
            / samples.len() as f32;
        log::info!("frame {frame}: static sample speed ≈ {speed:.2} u/s (first 8)");
    }

    if let Some(buffer) = border_sampler.border_buffer() {
        use plume_engine::baker::BorderSample;
        let count = border_sampler.sample_count();
        let bytes = read_buffer(gpu, buffer, BorderSample::SIZE * count as u64)?;
        let border: &[BorderSample] = bytemuck::cast_slice(&bytes);
        let enabled = border.iter().filter(|b| b.enabled > 0.5).count();
        log::info!("frame {frame}: dissolve front covers {enabled}/{count} samples");
    }
    Ok(())
}
