//! Surface-sample bakers.
//!
//! All bakers share one pipeline shape: bake geometry into the combined-domain
//! buffers, run the transfer kernel over the fixed sample-point set, then
//! advance the position ring so the next frame measures displacement against
//! this one. The variants differ only in their per-frame geometry refresh:
//!
//! - [`StaticSurfaceBaker`] — geometry baked once, per-frame work is the
//!   per-source transform table plus one dispatch
//! - [`DeformingSurfaceBaker`] — every source's current pose is re-baked each
//!   frame before the dispatch
//! - [`DissolveBorderSampler`] — wraps the deforming baker and overlays a
//!   two-pass enabled-flag computation per sample
//!
//! Kernels are compiled once ([`TransferKernel`], [`DissolveKernel`]) and
//! injected at baker construction, so several bakers on one device share
//! pipelines.
//!
//! Lifecycle for every variant:
//! `configure -> (validate)* -> initialize -> update_buffer* -> dispose`,
//! where `validate` tears buffers down after any external change to sources
//! or sample count, and `dispose` is idempotent.

mod buffers;
mod deforming_baker;
mod dissolve;
mod kernel;
mod record;
mod static_baker;

pub use buffers::BakeBuffers;
pub use deforming_baker::DeformingSurfaceBaker;
pub use dissolve::{DissolveBorderSampler, DissolveKernel, DissolveState};
pub use kernel::TransferKernel;
pub use record::{BorderSample, FrameParams, SourceGpuRecord, SurfaceSample};
pub use static_baker::StaticSurfaceBaker;

/// Compute workgroup size shared by every kernel in this module. Dispatches
/// round the group count up; kernels bounds-check, so sample counts that are
/// not a multiple of this are still fully processed.
pub const THREAD_GROUP_SIZE: u32 = 64;

/// Lower bound on the configured sample count. Values below this are clamped
/// with a warning.
pub const MIN_SAMPLE_COUNT: u32 = 64;

/// Upper bound on registered sources per baker. The per-source metadata and
/// dissolve-state tables are sized against this.
pub const MAX_SOURCE_COUNT: usize = 256;

#[inline]
pub(crate) fn group_count(samples: u32) -> u32 {
    samples.div_ceil(THREAD_GROUP_SIZE)
}

/// Applies the configure-time sample count contract: clamp to the minimum,
/// warning when the caller's value was out of range.
pub(crate) fn clamp_sample_count(requested: u32) -> u32 {
    if requested < MIN_SAMPLE_COUNT {
        log::warn!(
            "sample count {} below minimum; clamped to {}",
            requested,
            MIN_SAMPLE_COUNT
        );
        MIN_SAMPLE_COUNT
    } else {
        requested
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_count_rounds_up() {
        assert_eq!(group_count(64), 1);
        assert_eq!(group_count(65), 2);
        assert_eq!(group_count(128), 2);
        assert_eq!(group_count(1), 1);
    }

    #[test]
    fn sample_count_clamps_to_minimum() {
        assert_eq!(clamp_sample_count(0), MIN_SAMPLE_COUNT);
        assert_eq!(clamp_sample_count(63), MIN_SAMPLE_COUNT);
        assert_eq!(clamp_sample_count(64), 64);
        assert_eq!(clamp_sample_count(1000), 1000);
    }
}
