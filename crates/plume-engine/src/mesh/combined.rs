use std::ops::Range;

use anyhow::Result;

use super::{MeshData, VertexChannels};

/// Concatenation of all source meshes into one addressable vertex domain.
///
/// Invariants, established at build time and relied on everywhere downstream:
/// - per-source vertex ranges are contiguous, non-overlapping and ordered
///   identically to the input slice
/// - the sum of range lengths equals the combined vertex count
/// - `source_index[v]` is the ordinal of the source owning vertex `v`, and is
///   always a valid ordinal
/// - triangles never span two sources (they are re-indexed per source)
#[derive(Debug, Clone)]
pub struct CombinedMesh {
    channels: VertexChannels,
    triangles: Vec<[u32; 3]>,
    vertex_ranges: Vec<Range<u32>>,
    source_index: Vec<u32>,
}

impl CombinedMesh {
    /// Builds the combined domain from meshes in registration order.
    ///
    /// Every input must already be validated; an invalid mesh here is a
    /// programmer error, not a skippable configuration problem.
    pub fn build(meshes: &[&MeshData]) -> Result<Self> {
        anyhow::ensure!(!meshes.is_empty(), "no meshes to combine");

        let vertex_total: usize = meshes.iter().map(|m| m.vertex_count()).sum();
        let triangle_total: usize = meshes.iter().map(|m| m.triangle_count()).sum();

        let mut channels = VertexChannels::with_capacity(vertex_total);
        let mut triangles = Vec::with_capacity(triangle_total);
        let mut vertex_ranges = Vec::with_capacity(meshes.len());
        let mut source_index = Vec::with_capacity(vertex_total);

        let mut offset: u32 = 0;
        for (ordinal, mesh) in meshes.iter().enumerate() {
            mesh.validate()?;

            let n = mesh.vertex_count() as u32;
            channels.positions.extend_from_slice(&mesh.channels.positions);
            channels.normals.extend_from_slice(&mesh.channels.normals);
            channels.uvs.extend_from_slice(&mesh.channels.uvs);

            for tri in &mesh.triangles {
                triangles.push([tri[0] + offset, tri[1] + offset, tri[2] + offset]);
            }

            source_index.extend(std::iter::repeat(ordinal as u32).take(n as usize));
            vertex_ranges.push(offset..offset + n);
            offset += n;
        }

        debug_assert_eq!(offset as usize, vertex_total);
        debug_assert_eq!(source_index.len(), vertex_total);

        Ok(Self {
            channels,
            triangles,
            vertex_ranges,
            source_index,
        })
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.channels.len()
    }

    #[inline]
    pub fn channels(&self) -> &VertexChannels {
        &self.channels
    }

    #[inline]
    pub fn triangles(&self) -> &[[u32; 3]] {
        &self.triangles
    }

    /// Number of sources the domain was built from.
    #[inline]
    pub fn source_count(&self) -> usize {
        self.vertex_ranges.len()
    }

    /// Combined-domain vertex range occupied by source `ordinal`.
    #[inline]
    pub fn vertex_range(&self, ordinal: usize) -> Range<u32> {
        self.vertex_ranges[ordinal].clone()
    }

    /// Per-vertex owning-source table, one `u32` ordinal per combined vertex.
    #[inline]
    pub fn source_index_map(&self) -> &[u32] {
        &self.source_index
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::mesh::primitives;

    #[test]
    fn ranges_cover_domain_without_overlap() {
        let a = primitives::cube(1.0);
        let b = primitives::plane(2, 1.0);
        let combined = CombinedMesh::build(&[&a, &b]).unwrap();

        let total: u32 = (0..combined.source_count())
            .map(|i| combined.vertex_range(i).len() as u32)
            .sum();
        assert_eq!(total as usize, combined.vertex_count());

        assert_eq!(combined.vertex_range(0).start, 0);
        assert_eq!(
            combined.vertex_range(0).end,
            combined.vertex_range(1).start
        );
        assert_eq!(
            combined.vertex_range(1).end as usize,
            combined.vertex_count()
        );
    }

    #[test]
    fn source_index_map_is_valid_and_ordered() {
        let a = primitives::cube(1.0);
        let b = primitives::plane(3, 2.0);
        let combined = CombinedMesh::build(&[&a, &b]).unwrap();

        let map = combined.source_index_map();
        assert_eq!(map.len(), combined.vertex_count());
        assert!(map.iter().all(|&s| (s as usize) < combined.source_count()));

        for ordinal in 0..combined.source_count() {
            for v in combined.vertex_range(ordinal) {
                assert_eq!(map[v as usize], ordinal as u32);
            }
        }
    }

    #[test]
    fn triangles_are_reindexed_into_owner_range() {
        let a = primitives::cube(1.0);
        let b = primitives::cube(2.0);
        let combined = CombinedMesh::build(&[&a, &b]).unwrap();

        for tri in combined.triangles() {
            let owner = combined.source_index_map()[tri[0] as usize];
            let range = combined.vertex_range(owner as usize);
            assert!(tri.iter().all(|&i| range.contains(&i)));
        }
    }

    #[test]
    fn combined_positions_preserve_order() {
        let a = primitives::cube(1.0);
        let b = primitives::cube(1.0);
        let combined = CombinedMesh::build(&[&a, &b]).unwrap();

        let n = a.vertex_count();
        assert_eq!(combined.channels().positions[..n], a.channels.positions[..]);
        assert_eq!(combined.channels().positions[n..], b.channels.positions[..]);
        assert_ne!(combined.channels().positions[0], Vec3::NAN);
    }

    #[test]
    fn empty_input_is_rejected() {
        assert!(CombinedMesh::build(&[]).is_err());
    }
}
