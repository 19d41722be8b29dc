//! Fixed-capacity ring buffer used by the smoothing filters.
//!
//! Always holds exactly `N` entries: it starts zero-filled (`T::default()`)
//! and every push evicts the oldest value. Push is O(1) and never allocates.

#[derive(Debug, Clone, Copy)]
pub struct RingBuffer<T, const N: usize> {
    buf: [T; N],
    head: usize,
}

impl<T: Copy + Default, const N: usize> Default for RingBuffer<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> RingBuffer<T, N> {
    pub fn new() -> Self {
        const { assert!(N > 0, "ring buffer capacity must be non-zero") };
        Self {
            buf: [T::default(); N],
            head: 0,
        }
    }

    /// Push a value, returning the evicted oldest one.
    #[inline]
    pub fn push(&mut self, v: T) -> T {
        let old = self.buf[self.head];
        self.buf[self.head] = v;
        self.head = (self.head + 1) % N;
        old
    }

    /// Arithmetic mean over all `N` slots (denominator is always `N`).
    pub fn mean_by(&self, f: impl Fn(T) -> f64) -> f64 {
        self.buf.iter().map(|&v| f(v)).sum::<f64>() / N as f64
    }
}
