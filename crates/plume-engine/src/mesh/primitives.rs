//! Procedural test/demo meshes.

use glam::{Vec2, Vec3};

use super::{MeshData, VertexChannels};

/// Axis-aligned cube centered at the origin: 24 vertices (4 per face, so
/// normals stay flat), 12 triangles.
pub fn cube(size: f32) -> MeshData {
    let h = size * 0.5;

    // (normal, tangent, bitangent) per face.
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::X, Vec3::Y, Vec3::Z),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::Y, Vec3::Z, Vec3::X),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::Y, Vec3::X),
    ];

    let mut channels = VertexChannels::with_capacity(24);
    let mut triangles = Vec::with_capacity(12);

    for (normal, tangent, bitangent) in faces {
        let base = channels.len() as u32;
        for (u, v) in [(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 1.0)] {
            let pos = normal * h + tangent * ((u - 0.5) * size) + bitangent * ((v - 0.5) * size);
            channels.positions.push(pos);
            channels.normals.push(normal);
            channels.uvs.push(Vec2::new(u, v));
        }
        triangles.push([base, base + 1, base + 2]);
        triangles.push([base, base + 2, base + 3]);
    }

    MeshData {
        channels,
        triangles,
    }
}

/// Flat XZ plane of `subdiv` x `subdiv` quads spanning `size` on each side.
pub fn plane(subdiv: u32, size: f32) -> MeshData {
    let subdiv = subdiv.max(1);
    let step = size / subdiv as f32;
    let half = size * 0.5;
    let verts_per_row = subdiv + 1;

    let mut channels = VertexChannels::with_capacity((verts_per_row * verts_per_row) as usize);
    for z in 0..verts_per_row {
        for x in 0..verts_per_row {
            channels.positions.push(Vec3::new(
                x as f32 * step - half,
                0.0,
                z as f32 * step - half,
            ));
            channels.normals.push(Vec3::Y);
            channels
                .uvs
                .push(Vec2::new(x as f32 / subdiv as f32, z as f32 / subdiv as f32));
        }
    }

    let mut triangles = Vec::with_capacity((subdiv * subdiv * 2) as usize);
    for z in 0..subdiv {
        for x in 0..subdiv {
            let i = z * verts_per_row + x;
            triangles.push([i, i + 1, i + verts_per_row]);
            triangles.push([i + 1, i + verts_per_row + 1, i + verts_per_row]);
        }
    }

    MeshData {
        channels,
        triangles,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cube_topology() {
        let m = cube(1.0);
        assert_eq!(m.vertex_count(), 24);
        assert_eq!(m.triangle_count(), 12);
        m.validate().unwrap();
    }

    #[test]
    fn plane_topology() {
        let m = plane(4, 2.0);
        assert_eq!(m.vertex_count(), 25);
        assert_eq!(m.triangle_count(), 32);
        m.validate().unwrap();
    }

    #[test]
    fn cube_normals_are_unit_axis_aligned() {
        let m = cube(2.0);
        for n in &m.channels.normals {
            assert!((n.length() - 1.0).abs() < 1e-6);
            assert_eq!(n.abs().max_element(), 1.0);
        }
    }
}
