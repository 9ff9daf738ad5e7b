//! Single-direction-pair AEAD session: ChaCha20-Poly1305 with the 60-byte
//! structured AAD and a 12-byte structured [`Nonce`].

use crate::core::constants::{AAD_SIZE, AEAD_KEY_SIZE, AEAD_NONCE_SIZE};
use crate::core::error::CryptoError;
use crate::crypto::keys::SessionId;
use crate::crypto::nonce::Nonce;
use crate::crypto::replay::{SlidingWindow, StrictCounter};
use chacha20poly1305::{
    aead::{AeadInPlace, KeyInit},
    ChaCha20Poly1305,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// A 32-byte AEAD key, zeroized on drop.
#[derive(Clone, ZeroizeOnDrop)]
pub struct SessionKey([u8; AEAD_KEY_SIZE]);

impl SessionKey {
    /// Build from raw bytes. Fails if not exactly [`AEAD_KEY_SIZE`] bytes.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, CryptoError> {
        let arr: [u8; AEAD_KEY_SIZE] = bytes.try_into().map_err(|_| CryptoError::InvalidKeySize)?;
        Ok(SessionKey(arr))
    }

    /// The raw key bytes.
    pub fn as_bytes(&self) -> &[u8; AEAD_KEY_SIZE] {
        &self.0
    }
}

/// Which end of the connection this session plays, for AAD direction bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The handshake responder / long-running listener.
    Server,
    /// The handshake initiator.
    Client,
}

impl Role {
    fn send_direction(self) -> &'static [u8; 16] {
        match self {
            Role::Server => crate::core::constants::DIRECTION_SERVER_TO_CLIENT,
            Role::Client => crate::core::constants::DIRECTION_CLIENT_TO_SERVER,
        }
    }

    fn recv_direction(self) -> &'static [u8; 16] {
        match self {
            Role::Server => crate::core::constants::DIRECTION_CLIENT_TO_SERVER,
            Role::Client => crate::core::constants::DIRECTION_SERVER_TO_CLIENT,
        }
    }
}

/// Either anti-replay strategy a [`Session`] may be built with.
#[derive(Debug, Clone)]
pub enum ReplayMode {
    /// For ordered transports: rejects anything not strictly greater than the max seen.
    Strict(StrictCounter),
    /// For unordered transports: tolerates reordering within a bounded window.
    Sliding(SlidingWindow),
}

fn build_aad(session_id: &SessionId, direction: &[u8; 16], nonce_bytes: &[u8; AEAD_NONCE_SIZE]) -> [u8; AAD_SIZE] {
    let mut aad = [0u8; AAD_SIZE];
    aad[0..32].copy_from_slice(session_id.as_bytes());
    aad[32..48].copy_from_slice(direction);
    aad[48..60].copy_from_slice(nonce_bytes);
    aad
}

/// One direction-pair of AEAD state, bound to a single epoch.
pub struct Session {
    session_id: SessionId,
    role: Role,
    send_cipher: ChaCha20Poly1305,
    recv_cipher: ChaCha20Poly1305,
    send_nonce: Nonce,
    recv_nonce: Nonce,
    replay: ReplayMode,
}

impl Session {
    /// Construct a session for one epoch from a send/recv key pair.
    pub fn new(
        session_id: SessionId,
        role: Role,
        send_key: &SessionKey,
        recv_key: &SessionKey,
        epoch: u16,
        replay: ReplayMode,
    ) -> Self {
        Session {
            session_id,
            role,
            send_cipher: ChaCha20Poly1305::new(send_key.as_bytes().into()),
            recv_cipher: ChaCha20Poly1305::new(recv_key.as_bytes().into()),
            send_nonce: Nonce::new(epoch),
            recv_nonce: Nonce::new(epoch),
            replay,
        }
    }

    /// The epoch this session instance is bound to.
    pub fn epoch(&self) -> u16 {
        self.send_nonce.epoch()
    }

    /// Seal `buf` in place, returning the 12-byte nonce used.
    ///
    /// `buf` must already hold only the plaintext; the 16-byte tag is
    /// appended by the underlying AEAD.
    pub fn encrypt(&mut self, buf: &mut Vec<u8>) -> Result<[u8; AEAD_NONCE_SIZE], CryptoError> {
        self.send_nonce.increment()?;
        let mut nonce_bytes = [0u8; AEAD_NONCE_SIZE];
        self.send_nonce.encode(&mut nonce_bytes);
        let aad = build_aad(&self.session_id, self.role.send_direction(), &nonce_bytes);
        self.send_cipher
            .encrypt_in_place(nonce_bytes.as_slice().into(), &aad, buf)
            .map_err(|_| CryptoError::InsufficientCapacity)?;
        Ok(nonce_bytes)
    }

    /// Decrypt a frame whose nonce is implicit (ordered transport): the
    /// receiver's own monotonic counter determines the expected nonce, so no
    /// nonce bytes travel on the wire.
    pub fn decrypt_implicit(&mut self, buf: &mut Vec<u8>) -> Result<(), CryptoError> {
        let candidate = self.recv_nonce.peek_next()?;
        let (high, low) = candidate.counter();
        let strict = match &self.replay {
            ReplayMode::Strict(s) => s,
            ReplayMode::Sliding(_) => return Err(CryptoError::MalformedFrame),
        };
        strict.check(high, low)?;

        let mut nonce_bytes = [0u8; AEAD_NONCE_SIZE];
        candidate.encode(&mut nonce_bytes);
        let aad = build_aad(&self.session_id, self.role.recv_direction(), &nonce_bytes);
        self.recv_cipher
            .decrypt_in_place(nonce_bytes.as_slice().into(), &aad, buf)
            .map_err(|_| CryptoError::AuthFailure)?;

        self.recv_nonce = candidate;
        if let ReplayMode::Strict(s) = &mut self.replay {
            s.accept(high, low);
        }
        Ok(())
    }

    /// Decrypt a frame whose nonce travels on the wire (unordered transport).
    pub fn decrypt_explicit(
        &mut self,
        nonce_bytes: [u8; AEAD_NONCE_SIZE],
        buf: &mut Vec<u8>,
    ) -> Result<(), CryptoError> {
        let candidate = Nonce::decode(&nonce_bytes);
        let (high, low) = candidate.counter();
        let sliding = match &self.replay {
            ReplayMode::Sliding(s) => s,
            ReplayMode::Strict(_) => return Err(CryptoError::MalformedFrame),
        };
        sliding.check(high, low)?;

        let aad = build_aad(&self.session_id, self.role.recv_direction(), &nonce_bytes);
        self.recv_cipher
            .decrypt_in_place(nonce_bytes.as_slice().into(), &aad, buf)
            .map_err(|_| CryptoError::AuthFailure)?;

        if let ReplayMode::Sliding(s) = &mut self.replay {
            s.accept(high, low);
        }
        Ok(())
    }

    /// Scrub all key material and replay state held by this session.
    pub fn zeroize(&mut self) {
        // ChaCha20Poly1305 does not expose its key for re-zeroization; the
        // owning SessionKey values are zeroized independently at their own
        // drop sites. Here we scrub what this type itself owns.
        if let ReplayMode::Sliding(s) = &mut self.replay {
            s.zeroize();
        }
        let mut id = self.session_id.0;
        id.zeroize();
    }
}
