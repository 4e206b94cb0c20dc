use std::time::{Duration, Instant};

/// Frame timing snapshot.
///
/// Velocity in the transfer kernel is `(current - previous) * frame_rate()`,
/// so `dt` must describe the interval between the previous and the current
/// bake, not wall-clock time since startup.
#[derive(Debug, Copy, Clone)]
pub struct FrameTime {
    /// Time elapsed since the previous frame tick, in seconds. Always > 0.
    pub dt: f32,

    /// Monotonic frame counter.
    pub frame_index: u64,
}

impl FrameTime {
    /// A fixed-step snapshot, mainly for tests and offline baking.
    pub fn fixed(dt: f32) -> Self {
        debug_assert!(dt > 0.0);
        Self { dt, frame_index: 0 }
    }

    /// Instantaneous frame rate (1 / dt).
    #[inline]
    pub fn frame_rate(&self) -> f32 {
        1.0 / self.dt
    }
}

/// Frame clock producing `FrameTime` snapshots.
///
/// Delta time is clamped to avoid pathological values when the host is paused
/// by the debugger, minimized, or stalls; an unclamped dt would turn into a
/// velocity spike in the baked samples.
#[derive(Debug, Clone)]
pub struct FrameClock {
    last: Instant,
    frame_index: u64,
    dt_min: Duration,
    dt_max: Duration,
}

impl FrameClock {
    /// Creates a new clock with default clamps.
    ///
    /// Clamp rationale:
    /// - minimum prevents zero-dt (and thus infinite frame-rate) from tight loops
    /// - maximum prevents velocity explosions after long stalls
    pub fn new() -> Self {
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min: Duration::from_micros(100),  // 0.0001s
            dt_max: Duration::from_millis(250),  // 0.25s
        }
    }

    /// Creates a clock with custom delta-time clamps.
    pub fn with_clamps(dt_min: Duration, dt_max: Duration) -> Self {
        debug_assert!(dt_min <= dt_max);
        Self {
            last: Instant::now(),
            frame_index: 0,
            dt_min,
            dt_max,
        }
    }

    /// Resets the clock baseline.
    ///
    /// Useful after a baker re-initialization or when resuming from suspension.
    pub fn reset(&mut self) {
        self.last = Instant::now();
    }

    /// Advances the clock and returns a new `FrameTime`.
    pub fn tick(&mut self) -> FrameTime {
        let now = Instant::now();
        let mut dt = now.saturating_duration_since(self.last);

        // Clamp delta time to keep downstream velocity stable.
        if dt < self.dt_min {
            dt = self.dt_min;
        } else if dt > self.dt_max {
            dt = self.dt_max;
        }

        self.last = now;

        let ft = FrameTime {
            dt: dt.as_secs_f32(),
            frame_index: self.frame_index,
        };

        self.frame_index = self.frame_index.wrapping_add(1);

        ft
    }
}

impl Default for FrameClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixed_frame_rate_is_reciprocal() {
        let ft = FrameTime::fixed(1.0 / 60.0);
        assert!((ft.frame_rate() - 60.0).abs() < 1e-3);
    }

    #[test]
    fn tick_clamps_minimum_dt() {
        let mut clock = FrameClock::new();
        // Two immediate ticks cannot produce a dt below the clamp.
        clock.tick();
        let ft = clock.tick();
        assert!(ft.dt >= 0.0001);
        assert!(ft.frame_rate().is_finite());
    }

    #[test]
    fn frame_index_increments() {
        let mut clock = FrameClock::new();
        let a = clock.tick();
        let b = clock.tick();
        assert_eq!(b.frame_index, a.frame_index + 1);
    }
}
