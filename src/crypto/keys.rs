//! X25519 static-key management and session identifiers.

use crate::core::{PRIVATE_KEY_SIZE, PUBLIC_KEY_SIZE, SESSION_ID_SIZE};
use rand::{rngs::OsRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroize;

/// A static X25519 keypair for long-term peer identity.
///
/// The private key is zeroized on drop.
#[derive(Clone)]
pub struct StaticKeypair {
    private: [u8; PRIVATE_KEY_SIZE],
    public: [u8; PUBLIC_KEY_SIZE],
}

impl StaticKeypair {
    /// Generate a new random keypair.
    pub fn generate() -> Self {
        let builder = snow::Builder::new(crate::core::NOISE_PATTERN.parse().unwrap());
        let keypair = builder.generate_keypair().unwrap();

        let mut private_key = [0u8; PRIVATE_KEY_SIZE];
        let mut public_key = [0u8; PUBLIC_KEY_SIZE];
        private_key.copy_from_slice(&keypair.private);
        public_key.copy_from_slice(&keypair.public);

        Self {
            private: private_key,
            public: public_key,
        }
    }

    /// Build a keypair from existing key material (e.g. loaded from config).
    pub fn from_bytes(private: [u8; PRIVATE_KEY_SIZE], public: [u8; PUBLIC_KEY_SIZE]) -> Self {
        Self { private, public }
    }

    /// The public key.
    pub fn public_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.public
    }

    /// The private key.
    ///
    /// Exposes sensitive key material; callers must not retain copies longer
    /// than necessary.
    pub fn private_key(&self) -> &[u8; PRIVATE_KEY_SIZE] {
        &self.private
    }

    /// Compute `DH(our_static, their_static)`.
    ///
    /// Used only to derive the rekey authentication key that mixes
    /// post-compromise security into every rekey.
    pub fn compute_static_dh(&self, remote_public: &[u8; PUBLIC_KEY_SIZE]) -> [u8; 32] {
        let secret = StaticSecret::from(self.private);
        let public = PublicKey::from(*remote_public);
        let shared = secret.diffie_hellman(&public);
        *shared.as_bytes()
    }
}

impl Drop for StaticKeypair {
    fn drop(&mut self) {
        self.private.zeroize();
    }
}

/// Session identifier: the first 32 bytes of the handshake's channel-binding
/// hash, used for AAD construction and demultiplexing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SessionId(pub [u8; SESSION_ID_SIZE]);

impl SessionId {
    /// A random session ID, for tests and standalone tooling.
    pub fn generate() -> Self {
        let mut id = [0u8; SESSION_ID_SIZE];
        OsRng.fill_bytes(&mut id);
        Self(id)
    }

    /// Build from raw bytes (typically the handshake hash prefix).
    pub fn from_bytes(bytes: [u8; SESSION_ID_SIZE]) -> Self {
        Self(bytes)
    }

    /// The raw bytes.
    pub fn as_bytes(&self) -> &[u8; SESSION_ID_SIZE] {
        &self.0
    }
}

impl AsRef<[u8]> for SessionId {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keypair_generation_is_random() {
        let kp1 = StaticKeypair::generate();
        let kp2 = StaticKeypair::generate();
        assert_ne!(kp1.public_key(), kp2.public_key());
        assert_ne!(kp1.private_key(), kp2.private_key());
    }

    #[test]
    fn session_id_generation_is_random() {
        let id1 = SessionId::generate();
        let id2 = SessionId::generate();
        assert_ne!(id1, id2);
        assert_eq!(id1.as_bytes().len(), SESSION_ID_SIZE);
    }

    #[test]
    fn session_id_from_bytes_roundtrip() {
        let bytes = [0x42u8; SESSION_ID_SIZE];
        let id = SessionId::from_bytes(bytes);
        assert_eq!(id.as_bytes(), &bytes);
    }

    #[test]
    fn static_dh_is_symmetric() {
        let a = StaticKeypair::generate();
        let b = StaticKeypair::generate();
        assert_eq!(
            a.compute_static_dh(b.public_key()),
            b.compute_static_dh(a.public_key())
        );
    }
}
