//! Epoch-ring session wrapper for unordered transports.
//!
//! The epoch lives in the last two bytes of the 12-byte nonce itself, so no
//! separate epoch prefix is needed on the wire. Because delivery may be
//! reordered or delayed, retired epochs are kept around until explicitly
//! removed rather than auto-evicted on first use.

use crate::core::constants::{AEAD_NONCE_SIZE, MAX_REKEY_EPOCH};
use crate::core::error::CryptoError;
use crate::core::traits::RekeyableSession;
use crate::crypto::aead::{ReplayMode, Role, Session, SessionKey};
use crate::crypto::epoch_ring::EpochRing;
use crate::crypto::keys::SessionId;
use crate::crypto::replay::SlidingWindow;
use std::sync::Mutex;
use tracing::warn;

struct Inner {
    ring: EpochRing,
    send_epoch: u16,
}

/// Unordered-transport session wrapper built on a bounded epoch ring.
pub struct RingSession {
    session_id: SessionId,
    role: Role,
    inner: Mutex<Inner>,
}

impl RingSession {
    /// Build a fresh wrapper around the session established by the handshake, at epoch 0.
    pub fn new(session_id: SessionId, role: Role, send_key: &SessionKey, recv_key: &SessionKey) -> Self {
        let session = Session::new(
            session_id,
            role,
            send_key,
            recv_key,
            0,
            ReplayMode::Sliding(SlidingWindow::new()),
        );
        let mut ring = EpochRing::new();
        ring.insert(0, session);
        RingSession {
            session_id,
            role,
            inner: Mutex::new(Inner { ring, send_epoch: 0 }),
        }
    }

    /// Seal `plaintext`, returning a complete `[nonce(12)][ciphertext][tag]` datagram.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let mut inner = self.inner.lock().unwrap();
        let send_epoch = inner.send_epoch;
        let session = inner
            .ring
            .resolve_mut(send_epoch)
            .ok_or(CryptoError::UnknownEpoch)?;
        let mut buf = plaintext.to_vec();
        let nonce = session.encrypt(&mut buf)?;
        let mut datagram = Vec::with_capacity(AEAD_NONCE_SIZE + buf.len());
        datagram.extend_from_slice(&nonce);
        datagram.extend_from_slice(&buf);
        Ok(datagram)
    }

    /// Open a `[nonce(12)][ciphertext][tag]` datagram, routing to the
    /// session installed for the epoch embedded in the nonce.
    pub fn decrypt(&self, datagram: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if datagram.len() < AEAD_NONCE_SIZE {
            return Err(CryptoError::MalformedFrame);
        }
        let nonce_bytes: [u8; AEAD_NONCE_SIZE] = datagram[0..AEAD_NONCE_SIZE].try_into().unwrap();
        let epoch = u16::from_be_bytes([
            nonce_bytes[crate::core::constants::NONCE_EPOCH_OFFSET],
            nonce_bytes[crate::core::constants::NONCE_EPOCH_OFFSET + 1],
        ]);
        let mut inner = self.inner.lock().unwrap();
        let session = inner.ring.resolve_mut(epoch).ok_or_else(|| {
            warn!(target: "replay", epoch, "datagram rejected: unknown epoch");
            CryptoError::UnknownEpoch
        })?;
        let mut buf = datagram[AEAD_NONCE_SIZE..].to_vec();
        if let Err(e) = session.decrypt_explicit(nonce_bytes, &mut buf) {
            warn!(target: "replay", epoch, reason = %e, "datagram rejected");
            return Err(e);
        }
        Ok(buf)
    }
}

impl RekeyableSession for RingSession {
    fn rekey(&self, send_key: &[u8], recv_key: &[u8]) -> Result<u16, CryptoError> {
        let send_key = SessionKey::from_slice(send_key)?;
        let recv_key = SessionKey::from_slice(recv_key)?;
        let mut inner = self.inner.lock().unwrap();
        let current = inner.ring.current().ok_or(CryptoError::UnknownEpoch)?;
        let new_epoch = current.checked_add(1).ok_or(CryptoError::EpochExhausted)?;
        if new_epoch >= MAX_REKEY_EPOCH {
            return Err(CryptoError::EpochExhausted);
        }
        if inner.ring.len() >= inner.ring.capacity() {
            if let Some(oldest) = inner.ring.oldest() {
                if oldest == inner.send_epoch {
                    return Err(CryptoError::RekeyRefused);
                }
            }
        }
        let session = Session::new(
            self.session_id,
            self.role,
            &send_key,
            &recv_key,
            new_epoch,
            ReplayMode::Sliding(SlidingWindow::new()),
        );
        inner.ring.insert(new_epoch, session);
        Ok(new_epoch)
    }

    fn set_send_epoch(&self, epoch: u16) {
        self.inner.lock().unwrap().send_epoch = epoch;
    }

    fn remove_epoch(&self, epoch: u16) -> Result<(), CryptoError> {
        let mut inner = self.inner.lock().unwrap();
        if epoch == inner.send_epoch {
            return Err(CryptoError::RekeyRefused);
        }
        if inner.ring.len() <= 1 {
            return Err(CryptoError::RekeyRefused);
        }
        inner.ring.remove(epoch);
        Ok(())
    }

    fn send_epoch(&self) -> u16 {
        self.inner.lock().unwrap().send_epoch
    }
}
