//! Time subsystem.
//!
//! Provides stable, testable frame timing utilities without coupling to a host
//! runtime. Intended usage:
//! - one `FrameClock` per bake loop
//! - call `tick()` once per frame to obtain the `FrameTime` passed to bakers

mod frame_clock;

pub use frame_clock::{FrameClock, FrameTime};
