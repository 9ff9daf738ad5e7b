//! Thin wrapper around [`zeroize::Zeroize`] so call sites read the same way
//! regardless of whether the value is a fixed array, a `Vec`, or a struct
//! deriving `Zeroize`/`ZeroizeOnDrop`.

use zeroize::Zeroize;

/// Overwrite `value` with zeros in a way the compiler cannot optimize away.
pub fn zero_bytes<Z: Zeroize + ?Sized>(value: &mut Z) {
    value.zeroize();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_bytes_clears_a_fixed_buffer() {
        let mut buf = [0xAAu8; 32];
        zero_bytes(&mut buf);
        assert_eq!(buf, [0u8; 32]);
    }

    #[test]
    fn zero_bytes_clears_a_vec() {
        let mut buf = vec![0xAAu8; 16];
        zero_bytes(&mut buf.as_mut_slice());
        assert!(buf.iter().all(|&b| b == 0));
    }
}
