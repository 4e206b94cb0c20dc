use anyhow::Result;
use glam::{Mat4, Vec3};

use crate::mesh::{MeshData, VertexChannels};

use super::DeformingSource;

/// Up to four bone influences for one vertex. Weights sum to 1.
#[derive(Debug, Copy, Clone)]
pub struct BoneWeights {
    pub bones: [u16; 4],
    pub weights: [f32; 4],
}

impl BoneWeights {
    /// A vertex bound rigidly to a single bone.
    pub fn rigid(bone: u16) -> Self {
        Self {
            bones: [bone, 0, 0, 0],
            weights: [1.0, 0.0, 0.0, 0.0],
        }
    }
}

/// Linear-blend-skinned deforming source.
///
/// The host animates the pose by writing the bone palette (`set_pose`) each
/// frame; `bake_pose` then evaluates the skin on the CPU into the baker's
/// channel buffer. Positions come out in root-bone space, matching what
/// `world_to_local()` reports.
pub struct SkinnedSource {
    name: String,
    rest: MeshData,
    influences: Vec<BoneWeights>,

    /// Inverse bind matrix per bone (rest pose, root-bone space).
    inverse_bind: Vec<Mat4>,

    /// Current pose matrix per bone (root-bone space).
    pose: Vec<Mat4>,

    root_transform: Mat4,
    material_count: u32,
}

impl SkinnedSource {
    pub fn new(
        name: impl Into<String>,
        rest: MeshData,
        influences: Vec<BoneWeights>,
        inverse_bind: Vec<Mat4>,
    ) -> Result<Self> {
        rest.validate()?;
        anyhow::ensure!(
            influences.len() == rest.vertex_count(),
            "influence count {} does not match vertex count {}",
            influences.len(),
            rest.vertex_count()
        );
        let bone_count = inverse_bind.len();
        anyhow::ensure!(bone_count > 0, "skinned source needs at least one bone");
        for (v, inf) in influences.iter().enumerate() {
            anyhow::ensure!(
                inf.bones.iter().all(|&b| (b as usize) < bone_count),
                "vertex {} references a bone outside the palette ({} bones)",
                v,
                bone_count
            );
        }

        Ok(Self {
            name: name.into(),
            rest,
            influences,
            pose: vec![Mat4::IDENTITY; bone_count],
            inverse_bind,
            root_transform: Mat4::IDENTITY,
            material_count: 1,
        })
    }

    /// A single-bone source: the whole mesh follows one animated matrix.
    pub fn rigid(name: impl Into<String>, rest: MeshData) -> Result<Self> {
        let influences = vec![BoneWeights::rigid(0); rest.vertex_count()];
        Self::new(name, rest, influences, vec![Mat4::IDENTITY])
    }

    pub fn bone_count(&self) -> usize {
        self.pose.len()
    }

    /// Replaces the current bone palette (root-bone space).
    pub fn set_pose(&mut self, pose: &[Mat4]) -> Result<()> {
        anyhow::ensure!(
            pose.len() == self.pose.len(),
            "pose has {} bones, palette expects {}",
            pose.len(),
            self.pose.len()
        );
        self.pose.copy_from_slice(pose);
        Ok(())
    }

    pub fn set_root_transform(&mut self, transform: Mat4) {
        self.root_transform = transform;
    }

    pub fn set_material_count(&mut self, count: u32) {
        self.material_count = count;
    }

    fn skin_matrix(&self, bone: u16) -> Mat4 {
        let b = bone as usize;
        self.pose[b] * self.inverse_bind[b]
    }
}

impl DeformingSource for SkinnedSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn rest_mesh(&self) -> &MeshData {
        &self.rest
    }

    fn bake_pose(&self, out: &mut VertexChannels) -> Result<()> {
        out.clear();

        let channels = &self.rest.channels;
        for (v, inf) in self.influences.iter().enumerate() {
            let p = channels.positions[v];
            let n = channels.normals[v];

            let mut pos = Vec3::ZERO;
            let mut normal = Vec3::ZERO;
            for k in 0..4 {
                let w = inf.weights[k];
                if w == 0.0 {
                    continue;
                }
                let m = self.skin_matrix(inf.bones[k]);
                pos += m.transform_point3(p) * w;
                normal += m.transform_vector3(n) * w;
            }

            out.positions.push(pos);
            out.normals.push(normal.normalize_or_zero());
            out.uvs.push(channels.uvs[v]);
        }

        Ok(())
    }

    fn root_transform(&self) -> Mat4 {
        self.root_transform
    }

    fn world_to_local(&self) -> Mat4 {
        self.root_transform.inverse()
    }

    fn material_count(&self) -> u32 {
        self.material_count
    }
}
