use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::mesh::CombinedMesh;

use super::{SamplePoint, SamplePointSource};

/// Area-weighted stratified sampler.
///
/// Triangles are chosen in proportion to their surface area via a cumulative
/// area table; barycentric coordinates use the square-root warp so points are
/// uniform within each triangle. The RNG is seeded from a fixed value, so the
/// same domain and count always produce the same point set.
#[derive(Debug, Clone)]
pub struct AreaWeightedSampler {
    seed: u64,
}

impl AreaWeightedSampler {
    pub fn new(seed: u64) -> Self {
        Self { seed }
    }
}

impl Default for AreaWeightedSampler {
    fn default() -> Self {
        Self::new(0x706c_756d_65)
    }
}

impl SamplePointSource for AreaWeightedSampler {
    fn generate(&self, mesh: &CombinedMesh, count: usize) -> Result<Vec<SamplePoint>> {
        anyhow::ensure!(count > 0, "sample count must be positive");

        let positions = &mesh.channels().positions;
        let triangles = mesh.triangles();

        // Cumulative area table.
        let mut cumulative = Vec::with_capacity(triangles.len());
        let mut total = 0.0f64;
        for tri in triangles {
            let a = positions[tri[0] as usize];
            let b = positions[tri[1] as usize];
            let c = positions[tri[2] as usize];
            let area = (b - a).cross(c - a).length() as f64 * 0.5;
            total += area;
            cumulative.push(total);
        }
        anyhow::ensure!(
            total > 0.0,
            "combined domain has zero surface area; nothing to sample"
        );

        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut points = Vec::with_capacity(count);

        for _ in 0..count {
            let pick = rng.gen_range(0.0..total);
            let t = cumulative.partition_point(|&acc| acc < pick);
            let t = t.min(triangles.len() - 1);

            // Square-root warp keeps the distribution uniform over the triangle.
            let r1 = rng.gen_range(0.0f32..1.0).sqrt();
            let r2 = rng.gen_range(0.0f32..1.0);
            let w0 = 1.0 - r1;
            let w1 = r1 * (1.0 - r2);
            let w2 = r1 * r2;

            points.push(SamplePoint {
                indices: triangles[t],
                weights: [w0, w1, w2],
            });
        }

        Ok(points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::primitives;

    #[test]
    fn generates_exact_count_with_valid_references() {
        let mesh = primitives::cube(1.0);
        let combined = CombinedMesh::build(&[&mesh]).unwrap();
        let points = AreaWeightedSampler::default()
            .generate(&combined, 256)
            .unwrap();

        assert_eq!(points.len(), 256);
        let n = combined.vertex_count() as u32;
        for p in &points {
            assert!(p.indices.iter().all(|&i| i < n));
            let sum: f32 = p.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-5);
            assert!(p.weights.iter().all(|&w| (0.0..=1.0).contains(&w)));
        }
    }

    #[test]
    fn generation_is_deterministic_per_domain() {
        let mesh = primitives::plane(4, 2.0);
        let combined = CombinedMesh::build(&[&mesh]).unwrap();
        let sampler = AreaWeightedSampler::default();

        let a = sampler.generate(&combined, 128).unwrap();
        let b = sampler.generate(&combined, 128).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn larger_triangles_attract_more_samples() {
        // Two sources: a tiny cube and a large plane. The plane dominates the
        // surface area, so it should own the clear majority of samples.
        let small = primitives::cube(0.1);
        let large = primitives::plane(1, 10.0);
        let combined = CombinedMesh::build(&[&small, &large]).unwrap();

        let points = AreaWeightedSampler::default()
            .generate(&combined, 1000)
            .unwrap();
        let map = combined.source_index_map();
        let on_plane = points
            .iter()
            .filter(|p| map[p.indices[0] as usize] == 1)
            .count();
        assert!(on_plane > 900, "expected plane-heavy split, got {on_plane}");
    }
}
