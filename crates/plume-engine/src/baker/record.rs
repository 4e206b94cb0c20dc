use bytemuck::{Pod, Zeroable};
use glam::Mat4;

/// One output sample record, fully rewritten by every transfer dispatch.
///
/// Layout is mirrored by `SurfaceSample` in `shaders/transfer.wgsl`; vector
/// quantities are padded to vec4 so the WGSL struct needs no implicit padding.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SurfaceSample {
    /// World-space position (w unused).
    pub position: [f32; 4],
    /// Position in the owning source's object space.
    pub position_os: [f32; 4],
    /// World-space unit normal.
    pub normal: [f32; 4],
    /// World-space velocity, `(current - previous) * frame_rate`.
    pub velocity: [f32; 4],
    /// Interpolated texture coordinate.
    pub uv: [f32; 2],
    /// Registration-order ordinal of the owning source.
    pub source: u32,
    pub _pad: u32,
}

impl SurfaceSample {
    pub const SIZE: u64 = std::mem::size_of::<SurfaceSample>() as u64;
}

/// Dissolve-augmented output record (`BorderSample` in
/// `shaders/dissolve_border.wgsl`).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct BorderSample {
    pub position: [f32; 4],
    pub normal: [f32; 4],
    pub velocity: [f32; 4],
    pub uv: [f32; 2],
    /// 1 inside the dissolve range, 0 beyond range + blur, smooth between.
    pub enabled: f32,
    pub _pad: u32,
}

impl BorderSample {
    pub const SIZE: u64 = std::mem::size_of::<BorderSample>() as u64;
}

/// Per-source metadata table entry, uploaded every frame.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct SourceGpuRecord {
    /// Local-to-world root transform at the current bake.
    pub current_root: [[f32; 4]; 4],
    /// Root transform at the previous bake; the velocity baseline.
    pub previous_root: [[f32; 4]; 4],
    /// World-to-local transform used for the object-space output position.
    pub world_to_local: [[f32; 4]; 4],
    pub material_count: u32,
    pub _pad: [u32; 3],
}

impl SourceGpuRecord {
    pub const SIZE: u64 = std::mem::size_of::<SourceGpuRecord>() as u64;

    pub fn new(
        current_root: Mat4,
        previous_root: Mat4,
        world_to_local: Mat4,
        material_count: u32,
    ) -> Self {
        Self {
            current_root: current_root.to_cols_array_2d(),
            previous_root: previous_root.to_cols_array_2d(),
            world_to_local: world_to_local.to_cols_array_2d(),
            material_count,
            _pad: [0; 3],
        }
    }
}

impl Default for SourceGpuRecord {
    fn default() -> Self {
        Self::new(Mat4::IDENTITY, Mat4::IDENTITY, Mat4::IDENTITY, 0)
    }
}

/// Per-dispatch uniform parameters for the transfer kernel.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct FrameParams {
    pub sample_count: u32,
    pub source_count: u32,
    pub frame_rate: f32,
    pub _pad: u32,
}

impl FrameParams {
    pub const SIZE: u64 = std::mem::size_of::<FrameParams>() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    // WGSL-side struct sizes; a drift here corrupts every record past the first.

    #[test]
    fn surface_sample_is_80_bytes() {
        assert_eq!(SurfaceSample::SIZE, 80);
    }

    #[test]
    fn border_sample_is_64_bytes() {
        assert_eq!(BorderSample::SIZE, 64);
    }

    #[test]
    fn source_record_is_208_bytes() {
        assert_eq!(SourceGpuRecord::SIZE, 208);
    }

    #[test]
    fn frame_params_are_16_bytes() {
        assert_eq!(FrameParams::SIZE, 16);
    }

    #[test]
    fn source_record_carries_matrices_column_major() {
        let m = Mat4::from_translation(glam::Vec3::new(1.0, 2.0, 3.0));
        let rec = SourceGpuRecord::new(m, Mat4::IDENTITY, Mat4::IDENTITY, 2);
        // Translation lives in the fourth column.
        assert_eq!(rec.current_root[3][0], 1.0);
        assert_eq!(rec.current_root[3][1], 2.0);
        assert_eq!(rec.current_root[3][2], 3.0);
        assert_eq!(rec.material_count, 2);
    }
}
