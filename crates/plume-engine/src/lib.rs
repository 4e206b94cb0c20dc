//! Plume engine crate.
//!
//! Bakes deforming and static 3-D meshes into GPU-resident surface-sample
//! buffers (position, normal, velocity, uv, source index) for consumption by
//! particle systems, and layers an optional dissolve-border pass on top.

pub mod device;
pub mod time;

pub mod logging;
pub mod mesh;
pub mod sample;
pub mod source;
pub mod baker;
