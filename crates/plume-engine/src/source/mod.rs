//! Source registration.
//!
//! A source is one mesh-bearing entity (static or deformable) plus its
//! transforms and material segment count. Sources live in a [`SourceSet`],
//! which hands out stable [`SourceId`] handles and iterates in registration
//! order; that order is the per-sample source ordinal baked into the output
//! buffer, so it must never change for the lifetime of a set.

mod deforming;
mod set;
mod skinned;
mod static_source;

pub use deforming::DeformingSource;
pub use set::{SourceId, SourceSet};
pub use skinned::{BoneWeights, SkinnedSource};
pub use static_source::StaticSource;
