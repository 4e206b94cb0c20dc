//! Sample-point generation over the combined vertex domain.
//!
//! Sample points are fixed references into the combined mesh: a host triangle
//! plus barycentric weights. They are generated once per topology and uploaded
//! verbatim; the transfer kernel re-evaluates them against freshly baked
//! vertex data every frame.
//!
//! Generation is behind the [`SamplePointSource`] trait so hosts can plug in
//! their own distribution (blue noise, per-material weighting, ...). The
//! default [`AreaWeightedSampler`] is deterministic for a fixed domain and
//! count, which keeps repeated initialization stable.

mod area_weighted;
mod point;

pub use area_weighted::AreaWeightedSampler;
pub use point::SamplePoint;

use anyhow::Result;

use crate::mesh::CombinedMesh;

/// Produces exactly `count` sample points over a combined domain.
pub trait SamplePointSource {
    fn generate(&self, mesh: &CombinedMesh, count: usize) -> Result<Vec<SamplePoint>>;
}
