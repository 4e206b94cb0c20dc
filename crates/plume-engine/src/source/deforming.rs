use anyhow::Result;
use glam::Mat4;

use crate::mesh::{MeshData, VertexChannels};

/// A mesh source whose shape changes every frame (skeletal animation, morphs).
///
/// The trait is the "bake current pose" capability: each frame the baker asks
/// the source to write its current local-space vertex attributes into a
/// reusable channel buffer. Topology (vertex count, triangles) comes from
/// `rest_mesh()` and must stay fixed between re-initializations; only
/// attribute values may change per frame.
pub trait DeformingSource {
    /// Display name for log messages.
    fn name(&self) -> &str;

    /// Rest-pose mesh defining topology for the combined domain.
    fn rest_mesh(&self) -> &MeshData;

    /// Writes the current deformed pose (local space) into `out`.
    ///
    /// `out` is cleared and refilled; its final length must equal the rest
    /// mesh's vertex count.
    fn bake_pose(&self, out: &mut VertexChannels) -> Result<()>;

    /// Local-to-world transform of the source's anchor.
    fn root_transform(&self) -> Mat4;

    /// World-to-local transform derived from the skeletal root.
    ///
    /// This is deliberately the skeleton root rather than the renderer
    /// transform: baked pose vertices live in the root bone's space.
    fn world_to_local(&self) -> Mat4;

    /// Material segment count, forwarded to the per-source metadata table.
    fn material_count(&self) -> u32 {
        1
    }
}
