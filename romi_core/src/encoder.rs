//! Quadrature encoder decoding with overflow-safe accumulation.
//!
//! The hardware timer counts ticks in a free-running 16-bit register. Each
//! `update()` reads the counter and a monotonic clock, corrects the raw
//! difference for wrap-around, and smooths both the tick delta and the time
//! interval over the last `SMOOTHING_WINDOW` updates.
//!
//! Wrap detection relies only on the magnitude of the signed difference: the
//! true change between two updates must stay within half the counter range.
//! Callers pick the update cadence to honor that at top wheel speed.

use std::time::Instant;

use romi_traits::{Clock, TickCounter};
use tracing::trace;

use crate::config::EncoderCfg;
use crate::error::Result;
use crate::hw_error::lift;
use crate::ring::RingBuffer;
use crate::util::us_to_secs;

/// Number of updates averaged by the position and velocity estimates.
pub const SMOOTHING_WINDOW: usize = 6;
/// Full range of the 16-bit hardware counter.
pub const COUNTER_RANGE: i32 = 65_536;
/// Largest tick change that can be told apart from a wrap.
pub const COUNTER_HALF_RANGE: i32 = 32_768;

/// Signed tick change from `prev` to `current` on a counter wrapping at 2^16.
///
/// Differences beyond ±32768 are assumed to have crossed the wrap point.
#[inline]
pub fn wrap_delta(prev: u16, current: u16) -> i32 {
    let diff = i32::from(current) - i32::from(prev);
    if diff < -COUNTER_HALF_RANGE {
        diff + COUNTER_RANGE
    } else if diff > COUNTER_HALF_RANGE {
        diff - COUNTER_RANGE
    } else {
        diff
    }
}

pub struct QuadratureFilter<T: TickCounter, C: Clock> {
    counter: T,
    clock: C,
    epoch: Instant,
    /// Accumulated (smoothed) ticks since construction or the last `zero()`.
    position: f64,
    prev_count: u16,
    prev_time_us: u64,
    dt_us: u64,
    delta: i32,
    deltas: RingBuffer<i32, SMOOTHING_WINDOW>,
    dts: RingBuffer<u64, SMOOTHING_WINDOW>,
    rad_per_tick: f64,
}

impl<T: TickCounter, C: Clock> core::fmt::Debug for QuadratureFilter<T, C> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QuadratureFilter")
            .field("position_ticks", &self.position)
            .field("prev_count", &self.prev_count)
            .field("dt_us", &self.dt_us)
            .finish()
    }
}

impl<T: TickCounter, C: Clock> QuadratureFilter<T, C> {
    /// Wrap a counter. The reference count starts at 0 and the reference
    /// time at the moment of construction; the zero-filled buffers stand in
    /// for the missing history.
    pub fn new(counter: T, clock: C, cfg: &EncoderCfg) -> Self {
        let epoch = clock.now();
        Self {
            counter,
            clock,
            epoch,
            position: 0.0,
            prev_count: 0,
            prev_time_us: 0,
            dt_us: 0,
            delta: 0,
            deltas: RingBuffer::new(),
            dts: RingBuffer::new(),
            rad_per_tick: cfg.radians_per_tick(),
        }
    }

    /// Sample the counter and fold the corrected delta into the estimate.
    pub fn update(&mut self) -> Result<()> {
        let now_us = self.clock.us_since(self.epoch);
        let current = lift(self.counter.count(), "reading encoder counter")?;

        self.dt_us = now_us.saturating_sub(self.prev_time_us);
        self.dts.push(self.dt_us);

        self.delta = wrap_delta(self.prev_count, current);
        self.deltas.push(self.delta);

        self.prev_time_us = now_us;
        self.prev_count = current;

        self.position += self.deltas.mean_by(f64::from);
        trace!(
            count = current,
            delta = self.delta,
            dt_us = self.dt_us,
            "encoder update"
        );
        Ok(())
    }

    /// Accumulated position in radians.
    pub fn position(&self) -> f64 {
        self.position * self.rad_per_tick
    }

    /// Smoothed angular velocity in radians per second.
    ///
    /// Exactly 0 when the latest interval was 0 (no motion data yet).
    pub fn velocity(&self) -> f64 {
        if self.dt_us == 0 {
            return 0.0;
        }
        let delta_rad = self.deltas.mean_by(f64::from) * self.rad_per_tick;
        let dt_s = self.dts.mean_by(|us| us as f64) / crate::util::MICROS_PER_SEC as f64;
        delta_rad / dt_s
    }

    /// Timestamp of the latest update, in seconds since construction.
    pub fn time(&self) -> f64 {
        us_to_secs(self.prev_time_us)
    }

    /// Latest update interval in seconds.
    pub fn dt(&self) -> f64 {
        us_to_secs(self.dt_us)
    }

    /// Latest wrap-corrected tick delta.
    pub fn delta(&self) -> i32 {
        self.delta
    }

    /// Raw counter value seen by the latest update (or `zero()`).
    pub fn raw_count(&self) -> u16 {
        self.prev_count
    }

    /// Reset the accumulated position and resynchronize with the counter.
    ///
    /// Smoothing buffers are kept so velocity reporting carries on across
    /// the reset.
    pub fn zero(&mut self) -> Result<()> {
        self.prev_count = lift(self.counter.count(), "reading encoder counter")?;
        self.position = 0.0;
        Ok(())
    }
}
