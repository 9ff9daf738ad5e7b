//! Replay-protection validators: [`StrictCounter`] for ordered transports,
//! [`SlidingWindow`] for unordered ones.

use crate::core::constants::{REPLAY_WINDOW_BITS, REPLAY_WINDOW_SLOTS, REPLAY_WINDOW_WORDS};
use crate::core::error::CryptoError;
use zeroize::Zeroize;

/// Rejects any `(high, low)` counter pair at or below the highest accepted so far.
///
/// Suited to transports that guarantee in-order, non-duplicated delivery
/// (the counter itself is then the entire anti-replay mechanism).
#[derive(Debug, Default, Clone, Copy)]
pub struct StrictCounter {
    max_high: u16,
    max_low: u64,
    seen_any: bool,
}

impl StrictCounter {
    /// A fresh validator that has not yet accepted anything.
    pub fn new() -> Self {
        StrictCounter::default()
    }

    /// Returns `Ok(())` if `(high, low)` is strictly greater than the
    /// highest accepted pair, `Err(NonUniqueNonce)` otherwise.
    pub fn check(&self, high: u16, low: u64) -> Result<(), CryptoError> {
        if self.seen_any && (high, low) <= (self.max_high, self.max_low) {
            return Err(CryptoError::NonUniqueNonce);
        }
        Ok(())
    }

    /// Commit `(high, low)` as the new highest accepted pair.
    ///
    /// Must only be called after the corresponding AEAD open succeeded.
    pub fn accept(&mut self, high: u16, low: u64) {
        self.max_high = high;
        self.max_low = low;
        self.seen_any = true;
    }
}

/// One 1024-bit bitmap tracking which low-counters have been seen for a
/// given high counter.
#[derive(Debug, Clone, Copy)]
struct Window {
    high: u16,
    bitmap: [u64; REPLAY_WINDOW_WORDS],
    max_low: u64,
    initialized: bool,
}

impl Window {
    fn new(high: u16) -> Self {
        Window {
            high,
            bitmap: [0; REPLAY_WINDOW_WORDS],
            max_low: 0,
            initialized: false,
        }
    }

    fn bit_is_set(&self, offset: u64) -> bool {
        let word = (offset / 64) as usize;
        let bit = offset % 64;
        self.bitmap[word] & (1u64 << bit) != 0
    }

    fn set_bit(&mut self, offset: u64) {
        let word = (offset / 64) as usize;
        let bit = offset % 64;
        self.bitmap[word] |= 1u64 << bit;
    }

    /// Shift the window left by `n` bits (i.e. the new high-water mark
    /// advanced by `n`), preserving already-set bits via cross-word carry.
    fn shift(&mut self, n: u64) {
        let bits = REPLAY_WINDOW_BITS as u64;
        if n >= bits {
            self.bitmap = [0; REPLAY_WINDOW_WORDS];
            return;
        }
        let word_shift = (n / 64) as usize;
        let bit_shift = n % 64;
        let words = REPLAY_WINDOW_WORDS;
        let mut shifted = [0u64; REPLAY_WINDOW_WORDS];
        for i in (word_shift..words).rev() {
            let src = i - word_shift;
            let mut v = self.bitmap[src] << bit_shift;
            if bit_shift > 0 && src > 0 {
                v |= self.bitmap[src - 1] >> (64 - bit_shift);
            }
            shifted[i] = v;
        }
        self.bitmap = shifted;
    }

    fn check(&self, low: u64) -> Result<(), CryptoError> {
        if !self.initialized || low > self.max_low {
            return Ok(());
        }
        let diff = self.max_low - low;
        if diff >= REPLAY_WINDOW_BITS as u64 {
            return Err(CryptoError::NonUniqueNonce);
        }
        if self.bit_is_set(diff) {
            return Err(CryptoError::NonUniqueNonce);
        }
        Ok(())
    }

    fn accept(&mut self, low: u64) {
        if !self.initialized {
            self.initialized = true;
            self.max_low = low;
            self.set_bit(0);
            return;
        }
        if low > self.max_low {
            let shift = low - self.max_low;
            self.shift(shift);
            self.max_low = low;
            self.set_bit(0);
        } else {
            let diff = self.max_low - low;
            self.set_bit(diff);
        }
    }
}

/// Replay validator tolerant of out-of-order (but not duplicated) delivery.
///
/// Holds up to [`REPLAY_WINDOW_SLOTS`] simultaneous high-counter windows so a
/// high-counter rollover does not spuriously reject frames still in flight
/// under the previous high counter.
#[derive(Debug, Clone)]
pub struct SlidingWindow {
    windows: Vec<Window>,
}

impl Default for SlidingWindow {
    fn default() -> Self {
        SlidingWindow::new()
    }
}

impl SlidingWindow {
    /// An empty validator.
    pub fn new() -> Self {
        SlidingWindow {
            windows: Vec::with_capacity(REPLAY_WINDOW_SLOTS),
        }
    }

    fn find(&self, high: u16) -> Option<usize> {
        self.windows.iter().position(|w| w.high == high)
    }

    /// Check whether `(high, low)` would be accepted, without committing it.
    pub fn check(&self, high: u16, low: u64) -> Result<(), CryptoError> {
        match self.find(high) {
            Some(idx) => self.windows[idx].check(low),
            None => Ok(()),
        }
    }

    /// Commit `(high, low)` as seen. Must only be called after the
    /// corresponding AEAD open succeeded.
    pub fn accept(&mut self, high: u16, low: u64) {
        if let Some(idx) = self.find(high) {
            self.windows[idx].accept(low);
            return;
        }
        if self.windows.len() >= REPLAY_WINDOW_SLOTS {
            self.windows.remove(0);
        }
        let mut w = Window::new(high);
        w.accept(low);
        self.windows.push(w);
    }

    /// Scrub all tracked window state.
    pub fn zeroize(&mut self) {
        for w in &mut self.windows {
            w.bitmap.zeroize();
            w.max_low.zeroize();
        }
        self.windows.clear();
    }
}
