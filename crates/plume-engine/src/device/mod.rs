//! GPU device management.
//!
//! This module is responsible for:
//! - creating the wgpu Instance/Adapter/Device/Queue (headless, no surface)
//! - synchronous buffer readback for consumers and tests
//!
//! Bakers never create a device themselves; a `GpuContext` is passed in by
//! the host, so multiple bakers can share one device and queue.

mod context;
mod init;
mod readback;

pub use context::GpuContext;
pub use init::GpuInit;
pub use readback::read_buffer;
