use bytemuck::{Pod, Zeroable};

/// A fixed surface location in the combined vertex domain.
///
/// `indices` name the host triangle's three combined-domain vertices;
/// `weights` are barycentric and sum to 1. The struct is uploaded to the GPU
/// as-is (24 bytes, scalar fields only, so WGSL and Rust layouts agree).
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct SamplePoint {
    pub indices: [u32; 3],
    pub weights: [f32; 3],
}

impl SamplePoint {
    pub const SIZE: u64 = std::mem::size_of::<SamplePoint>() as u64;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpu_layout_is_tight() {
        // Scalar-only struct: no implicit padding on either side of the FFI.
        assert_eq!(SamplePoint::SIZE, 24);
    }
}
