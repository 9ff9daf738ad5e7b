//! Keyed BLAKE2s helpers used for key derivation, MAC1/MAC2, and cookie sealing.
//!
//! Grounded on the boringtun `b2s_hash` / `b2s_keyed_mac_16*` helper family:
//! small, allocation-light wrappers around the `blake2` crate rather than a
//! bespoke MAC implementation.

use blake2::digest::consts::U16;
use blake2::digest::{FixedOutput, KeyInit, Mac, Update};
use blake2::{Blake2sMac, Blake2s256, Digest};

/// Unkeyed BLAKE2s-256 hash over one or two concatenated inputs.
pub fn b2s_hash(data1: &[u8], data2: &[u8]) -> [u8; 32] {
    let mut hasher = Blake2s256::new();
    hasher.update(data1);
    hasher.update(data2);
    hasher.finalize().into()
}

/// Keyed BLAKE2s-128 MAC over one input (MAC1, and the inner word of MAC2).
pub fn b2s_keyed_mac_16(key: &[u8], data: &[u8]) -> [u8; 16] {
    let mut mac = Blake2sMac::<U16>::new_from_slice(key).expect("any key length is valid");
    Mac::update(&mut mac, data);
    let mut out = [0u8; 16];
    FixedOutput::finalize_into(mac, (&mut out).into());
    out
}

/// Keyed BLAKE2s-128 MAC over two concatenated inputs (MAC2 over msg1++mac1).
pub fn b2s_keyed_mac_16_2(key: &[u8], data1: &[u8], data2: &[u8]) -> [u8; 16] {
    let mut mac = Blake2sMac::<U16>::new_from_slice(key).expect("any key length is valid");
    Mac::update(&mut mac, data1);
    Mac::update(&mut mac, data2);
    let mut out = [0u8; 16];
    FixedOutput::finalize_into(mac, (&mut out).into());
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mac16_is_deterministic_and_key_sensitive() {
        let a = b2s_keyed_mac_16(b"key-a", b"data");
        let b = b2s_keyed_mac_16(b"key-a", b"data");
        let c = b2s_keyed_mac_16(b"key-b", b"data");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn hash_mixes_both_inputs() {
        let a = b2s_hash(b"one", b"two");
        let b = b2s_hash(b"onetwo", b"");
        // Distinct framing of the same concatenated bytes still differs
        // because Blake2s's `update` calls are independent of slice
        // boundaries only for a *single* call; two calls with a boundary
        // produce the same digest as one call over the concatenation.
        assert_eq!(a, b);
        let c = b2s_hash(b"one", b"three");
        assert_ne!(a, c);
    }
}
