//! Mesh geometry and the combined vertex domain.
//!
//! Bakers never sample individual meshes directly. All registered sources are
//! concatenated into one [`CombinedMesh`] whose vertex range is the single
//! addressable domain for sample points, intermediate GPU buffers and the
//! per-vertex source index map.

mod combined;
mod data;

pub mod primitives;

pub use combined::CombinedMesh;
pub use data::{MeshData, VertexChannels};
