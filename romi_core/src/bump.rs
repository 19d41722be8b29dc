//! Bump detection: sticky per-switch flags aggregated with logical OR.
//!
//! The interrupt context only ever calls [`BumpFlag::trigger`]; the control
//! loop polls and clears. A single atomic boolean is the whole protocol, so no
//! lock is involved on either side.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use romi_traits::BumpSensor;
use tracing::debug;

/// Sticky hit flag shared between an edge handler and the control loop.
#[derive(Debug, Clone, Default)]
pub struct BumpFlag {
    hit: Arc<AtomicBool>,
}

impl BumpFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a hit. Safe to call from an interrupt/callback thread.
    #[inline]
    pub fn trigger(&self) {
        self.hit.store(true, Ordering::Release);
    }
}

impl BumpSensor for BumpFlag {
    #[inline]
    fn is_triggered(&self) -> bool {
        self.hit.load(Ordering::Acquire)
    }

    #[inline]
    fn reset(&self) {
        self.hit.store(false, Ordering::Release);
    }
}

/// Any number of bump sensors seen as one.
#[derive(Debug, Default)]
pub struct BumpArray<S: BumpSensor> {
    sensors: Vec<S>,
}

impl<S: BumpSensor> BumpArray<S> {
    pub fn new(sensors: Vec<S>) -> Self {
        Self { sensors }
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Indices of the sensors currently latched.
    pub fn triggered(&self) -> Vec<usize> {
        self.sensors
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_triggered())
            .map(|(i, _)| i)
            .collect()
    }
}

impl<S: BumpSensor> BumpSensor for BumpArray<S> {
    fn is_triggered(&self) -> bool {
        self.sensors.iter().any(|s| s.is_triggered())
    }

    fn reset(&self) {
        for s in &self.sensors {
            s.reset();
        }
        debug!(sensors = self.sensors.len(), "bump flags cleared");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flag_is_sticky_until_reset() {
        let f = BumpFlag::new();
        assert!(!f.is_triggered());
        f.trigger();
        f.trigger();
        assert!(f.is_triggered());
        f.reset();
        assert!(!f.is_triggered());
    }

    #[test]
    fn array_ors_and_resets_all() {
        let flags: Vec<BumpFlag> = (0..6).map(|_| BumpFlag::new()).collect();
        let handles = flags.clone();
        let array = BumpArray::new(flags);
        assert!(!array.is_triggered());
        handles[4].trigger();
        assert!(array.is_triggered());
        assert_eq!(array.triggered(), vec![4]);
        array.reset();
        assert!(!array.is_triggered());
        assert!(!handles[4].is_triggered());
    }

    #[test]
    fn empty_array_never_triggers() {
        let array: BumpArray<BumpFlag> = BumpArray::new(Vec::new());
        assert!(!array.is_triggered());
        array.reset();
    }

    #[test]
    fn trigger_from_another_thread_is_seen() {
        let f = BumpFlag::new();
        let isr = f.clone();
        std::thread::spawn(move || isr.trigger())
            .join()
            .expect("join");
        assert!(f.is_triggered());
    }
}
