//! 96-bit structured nonce: `low64(BE) ++ high16(BE) ++ epoch16(BE)`.

use crate::core::constants::{AEAD_NONCE_SIZE, NONCE_EPOCH_OFFSET, NONCE_HIGH_OFFSET};
use crate::core::error::CryptoError;

/// A strictly monotonic per-direction nonce counter with an immutable epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nonce {
    low: u64,
    high: u16,
    epoch: u16,
}

impl Nonce {
    /// A zero-valued counter for the given epoch.
    pub fn new(epoch: u16) -> Self {
        Nonce {
            low: 0,
            high: 0,
            epoch,
        }
    }

    /// The immutable epoch this nonce belongs to.
    pub fn epoch(&self) -> u16 {
        self.epoch
    }

    /// `(high, low)` ordering key, used by replay validators.
    pub fn counter(&self) -> (u16, u64) {
        (self.high, self.low)
    }

    /// Add one to the 80-bit counter. Fails once both halves are saturated.
    pub fn increment(&mut self) -> Result<(), CryptoError> {
        match self.low.checked_add(1) {
            Some(low) => {
                self.low = low;
                Ok(())
            }
            None => {
                let high = self
                    .high
                    .checked_add(1)
                    .ok_or(CryptoError::NonceOverflow)?;
                self.high = high;
                self.low = 0;
                Ok(())
            }
        }
    }

    /// Return a copy incremented by one, without mutating `self`.
    ///
    /// Used on the decrypt path to compute the candidate nonce before the
    /// AEAD is opened, so a failed open never desynchronizes the counter.
    pub fn peek_next(&self) -> Result<Nonce, CryptoError> {
        let mut next = *self;
        next.increment()?;
        Ok(next)
    }

    /// Encode into the 12-byte wire layout.
    pub fn encode(&self, buf: &mut [u8; AEAD_NONCE_SIZE]) {
        buf[0..8].copy_from_slice(&self.low.to_be_bytes());
        buf[NONCE_HIGH_OFFSET..NONCE_HIGH_OFFSET + 2].copy_from_slice(&self.high.to_be_bytes());
        buf[NONCE_EPOCH_OFFSET..NONCE_EPOCH_OFFSET + 2].copy_from_slice(&self.epoch.to_be_bytes());
    }

    /// Decode from the 12-byte wire layout.
    pub fn decode(buf: &[u8; AEAD_NONCE_SIZE]) -> Self {
        let low = u64::from_be_bytes(buf[0..8].try_into().unwrap());
        let high = u16::from_be_bytes(
            buf[NONCE_HIGH_OFFSET..NONCE_HIGH_OFFSET + 2]
                .try_into()
                .unwrap(),
        );
        let epoch = u16::from_be_bytes(
            buf[NONCE_EPOCH_OFFSET..NONCE_EPOCH_OFFSET + 2]
                .try_into()
                .unwrap(),
        );
        Nonce { low, high, epoch }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn increment_basic() {
        let mut n = Nonce::new(7);
        n.increment().unwrap();
        assert_eq!(n.counter(), (0, 1));
        assert_eq!(n.epoch(), 7);
    }

    #[test]
    fn increment_carries_into_high() {
        let mut n = Nonce {
            low: u64::MAX,
            high: 0,
            epoch: 0,
        };
        n.increment().unwrap();
        assert_eq!(n.counter(), (1, 0));
    }

    #[test]
    fn increment_fails_when_saturated() {
        let mut n = Nonce {
            low: u64::MAX,
            high: u16::MAX,
            epoch: 0,
        };
        assert!(matches!(n.increment(), Err(CryptoError::NonceOverflow)));
    }

    #[test]
    fn encode_decode_roundtrip() {
        let n = Nonce {
            low: 0x0102_0304_0506_0708,
            high: 0x090A,
            epoch: 0x0B0C,
        };
        let mut buf = [0u8; AEAD_NONCE_SIZE];
        n.encode(&mut buf);
        assert_eq!(Nonce::decode(&buf), n);
    }

    #[test]
    fn peek_next_does_not_mutate() {
        let n = Nonce::new(0);
        let peeked = n.peek_next().unwrap();
        assert_eq!(n.counter(), (0, 0));
        assert_eq!(peeked.counter(), (0, 1));
    }
}
