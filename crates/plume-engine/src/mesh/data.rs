use anyhow::Result;
use glam::{Vec2, Vec3};

/// Per-vertex attribute streams (position, normal, uv).
///
/// The three streams always have the same length. This is also the target
/// layout for per-frame pose bakes, so deforming sources can refill an
/// existing allocation without churn.
#[derive(Debug, Clone, Default)]
pub struct VertexChannels {
    pub positions: Vec<Vec3>,
    pub normals: Vec<Vec3>,
    pub uvs: Vec<Vec2>,
}

impl VertexChannels {
    pub fn with_capacity(n: usize) -> Self {
        Self {
            positions: Vec::with_capacity(n),
            normals: Vec::with_capacity(n),
            uvs: Vec::with_capacity(n),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.positions.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Clears all streams, keeping allocations for reuse.
    pub fn clear(&mut self) {
        self.positions.clear();
        self.normals.clear();
        self.uvs.clear();
    }

    /// Resizes all streams to `n`, zero-filling new entries.
    pub fn resize(&mut self, n: usize) {
        self.positions.resize(n, Vec3::ZERO);
        self.normals.resize(n, Vec3::ZERO);
        self.uvs.resize(n, Vec2::ZERO);
    }

    fn streams_consistent(&self) -> bool {
        self.normals.len() == self.positions.len() && self.uvs.len() == self.positions.len()
    }
}

/// A triangle mesh with per-vertex attributes.
#[derive(Debug, Clone, Default)]
pub struct MeshData {
    pub channels: VertexChannels,
    /// Triangle list; every index is a valid vertex index.
    pub triangles: Vec<[u32; 3]>,
}

impl MeshData {
    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    /// Validates stream lengths and index bounds.
    ///
    /// Sources with invalid meshes are skipped at baker initialization, so
    /// this is the single point deciding what "readable" means for us.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(
            self.channels.streams_consistent(),
            "attribute streams disagree: {} positions, {} normals, {} uvs",
            self.channels.positions.len(),
            self.channels.normals.len(),
            self.channels.uvs.len()
        );
        anyhow::ensure!(!self.channels.is_empty(), "mesh has no vertices");
        anyhow::ensure!(!self.triangles.is_empty(), "mesh has no triangles");

        let n = self.vertex_count() as u32;
        for (t, tri) in self.triangles.iter().enumerate() {
            anyhow::ensure!(
                tri.iter().all(|&i| i < n),
                "triangle {} references vertex out of range (n = {})",
                t,
                n
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tri_mesh() -> MeshData {
        MeshData {
            channels: VertexChannels {
                positions: vec![Vec3::ZERO, Vec3::X, Vec3::Y],
                normals: vec![Vec3::Z; 3],
                uvs: vec![Vec2::ZERO, Vec2::X, Vec2::Y],
            },
            triangles: vec![[0, 1, 2]],
        }
    }

    #[test]
    fn valid_mesh_passes() {
        assert!(tri_mesh().validate().is_ok());
    }

    #[test]
    fn mismatched_streams_fail() {
        let mut m = tri_mesh();
        m.channels.normals.pop();
        assert!(m.validate().is_err());
    }

    #[test]
    fn out_of_range_index_fails() {
        let mut m = tri_mesh();
        m.triangles.push([0, 1, 9]);
        assert!(m.validate().is_err());
    }

    #[test]
    fn empty_mesh_fails() {
        assert!(MeshData::default().validate().is_err());
    }
}
