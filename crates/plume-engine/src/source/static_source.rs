use glam::Mat4;

use crate::mesh::MeshData;

/// A rigid (non-deforming) mesh source.
///
/// Geometry is baked once at initialization; only `transform` is re-read each
/// frame, so hosts animate rigid motion by mutating it between updates.
#[derive(Debug, Clone)]
pub struct StaticSource {
    /// Display name used in log messages only; never an identity key.
    pub name: String,

    /// Source geometry. `None` (or invalid data) marks a source whose mesh
    /// could not be read; it is skipped with a warning at initialization.
    pub mesh: Option<MeshData>,

    /// Local-to-world transform of the source's anchor.
    pub transform: Mat4,

    /// Material segment count, forwarded to the per-source metadata table.
    pub material_count: u32,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, mesh: MeshData) -> Self {
        Self {
            name: name.into(),
            mesh: Some(mesh),
            transform: Mat4::IDENTITY,
            material_count: 1,
        }
    }

    pub fn with_transform(mut self, transform: Mat4) -> Self {
        self.transform = transform;
        self
    }

    /// A source whose mesh is unavailable (mirrors a renderer with a missing
    /// or non-readable mesh asset).
    pub fn unreadable(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mesh: None,
            transform: Mat4::IDENTITY,
            material_count: 0,
        }
    }

    /// The mesh, if present and structurally valid.
    pub fn readable_mesh(&self) -> Option<&MeshData> {
        let mesh = self.mesh.as_ref()?;
        if let Err(err) = mesh.validate() {
            log::warn!("source '{}' has an unreadable mesh: {err:#}", self.name);
            return None;
        }
        Some(mesh)
    }

    /// World-to-local inverse of the current transform.
    pub fn world_to_local(&self) -> Mat4 {
        self.transform.inverse()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec3;

    use super::*;
    use crate::mesh::primitives;

    #[test]
    fn readable_mesh_roundtrip() {
        let s = StaticSource::new("cube", primitives::cube(1.0));
        assert!(s.readable_mesh().is_some());
        assert!(StaticSource::unreadable("ghost").readable_mesh().is_none());
    }

    #[test]
    fn structurally_broken_mesh_is_unreadable() {
        let mut mesh = primitives::cube(1.0);
        mesh.triangles.push([0, 1, 999]);
        let s = StaticSource::new("broken", mesh);
        assert!(s.readable_mesh().is_none());
    }

    #[test]
    fn world_to_local_inverts_transform() {
        let s = StaticSource::new("cube", primitives::cube(1.0))
            .with_transform(Mat4::from_translation(Vec3::new(3.0, -1.0, 2.0)));
        let p = Vec3::new(0.5, 0.5, 0.5);
        let roundtrip = s.world_to_local().transform_point3(s.transform.transform_point3(p));
        assert!((roundtrip - p).length() < 1e-5);
    }
}
