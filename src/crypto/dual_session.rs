//! Epoch-tagged dual-session wrapper for ordered transports.
//!
//! Wire format per frame: `[epoch(2, BE)] [AEAD-sealed payload]`. The epoch
//! tag is the only per-frame routing key a rekey needs, since the nonce
//! counter itself is implicit and strictly increasing per direction.

use crate::core::constants::MAX_REKEY_EPOCH;
use crate::core::error::CryptoError;
use crate::core::traits::RekeyableSession;
use crate::crypto::aead::{ReplayMode, Role, Session, SessionKey};
use crate::crypto::keys::SessionId;
use crate::crypto::replay::StrictCounter;
use std::sync::{Mutex, RwLock};
use tracing::warn;

struct Slot {
    epoch: u16,
    session: Mutex<Session>,
}

struct Inner {
    current: Slot,
    previous: Option<Slot>,
    send_epoch: u16,
}

/// Ordered-transport session wrapper tolerating exactly one in-flight rekey.
pub struct DualSession {
    session_id: SessionId,
    role: Role,
    inner: RwLock<Inner>,
}

impl DualSession {
    /// Build a fresh wrapper around the session established by the handshake, at epoch 0.
    pub fn new(session_id: SessionId, role: Role, send_key: &SessionKey, recv_key: &SessionKey) -> Self {
        let session = Session::new(
            session_id,
            role,
            send_key,
            recv_key,
            0,
            ReplayMode::Strict(StrictCounter::new()),
        );
        DualSession {
            session_id,
            role,
            inner: RwLock::new(Inner {
                current: Slot {
                    epoch: 0,
                    session: Mutex::new(session),
                },
                previous: None,
                send_epoch: 0,
            }),
        }
    }

    /// Seal `plaintext`, returning a complete `[epoch][ciphertext][tag]` frame.
    pub fn encrypt(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let guard = self.inner.read().unwrap();
        let send_epoch = guard.send_epoch;
        let slot = if guard.current.epoch == send_epoch {
            &guard.current
        } else {
            match &guard.previous {
                Some(p) if p.epoch == send_epoch => p,
                _ => return Err(CryptoError::UnknownEpoch),
            }
        };
        let mut buf = plaintext.to_vec();
        slot.session.lock().unwrap().encrypt(&mut buf)?;
        let mut frame = Vec::with_capacity(2 + buf.len());
        frame.extend_from_slice(&send_epoch.to_be_bytes());
        frame.extend_from_slice(&buf);
        Ok(frame)
    }

    /// Open a `[epoch][ciphertext][tag]` frame, routing to the current or
    /// previous session by its epoch tag.
    ///
    /// On the first successful decrypt at the current epoch, the previous
    /// epoch's session (if any) is evicted and zeroized: ordered delivery
    /// guarantees no further previous-epoch frames can arrive.
    pub fn decrypt(&self, frame: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if frame.len() < 2 {
            return Err(CryptoError::MalformedFrame);
        }
        let epoch = u16::from_be_bytes([frame[0], frame[1]]);
        let guard = self.inner.read().unwrap();
        let is_current = guard.current.epoch == epoch;
        let slot = if is_current {
            &guard.current
        } else {
            match &guard.previous {
                Some(p) if p.epoch == epoch => p,
                _ => {
                    warn!(target: "replay", epoch, "frame rejected: unknown epoch");
                    return Err(CryptoError::UnknownEpoch);
                }
            }
        };
        let mut buf = frame[2..].to_vec();
        if let Err(e) = slot.session.lock().unwrap().decrypt_implicit(&mut buf) {
            warn!(target: "replay", epoch, reason = %e, "frame rejected");
            return Err(e);
        }
        drop(guard);

        if is_current {
            let mut guard = self.inner.write().unwrap();
            if guard.current.epoch == epoch {
                if let Some(mut p) = guard.previous.take() {
                    p.session.get_mut().unwrap().zeroize();
                }
            }
        }
        Ok(buf)
    }
}

impl RekeyableSession for DualSession {
    fn rekey(&self, send_key: &[u8], recv_key: &[u8]) -> Result<u16, CryptoError> {
        let send_key = SessionKey::from_slice(send_key)?;
        let recv_key = SessionKey::from_slice(recv_key)?;
        let mut guard = self.inner.write().unwrap();
        let new_epoch = guard
            .current
            .epoch
            .checked_add(1)
            .ok_or(CryptoError::EpochExhausted)?;
        if new_epoch >= MAX_REKEY_EPOCH {
            return Err(CryptoError::EpochExhausted);
        }
        let new_session = Session::new(
            self.session_id,
            self.role,
            &send_key,
            &recv_key,
            new_epoch,
            ReplayMode::Strict(StrictCounter::new()),
        );
        let old_current = std::mem::replace(
            &mut guard.current,
            Slot {
                epoch: new_epoch,
                session: Mutex::new(new_session),
            },
        );
        if let Some(mut stale) = guard.previous.replace(old_current) {
            stale.session.get_mut().unwrap().zeroize();
        }
        Ok(new_epoch)
    }

    fn set_send_epoch(&self, epoch: u16) {
        self.inner.write().unwrap().send_epoch = epoch;
    }

    fn remove_epoch(&self, _epoch: u16) -> Result<(), CryptoError> {
        // No-op for ordered transport: previous-epoch eviction is automatic
        // on the first current-epoch decrypt (see `decrypt`).
        Ok(())
    }

    fn send_epoch(&self) -> u16 {
        self.inner.read().unwrap().send_epoch
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pair() -> (DualSession, DualSession) {
        let session_id = SessionId::generate();
        let c2s = SessionKey::from_slice(&[0x11u8; 32]).unwrap();
        let s2c = SessionKey::from_slice(&[0x22u8; 32]).unwrap();
        (
            DualSession::new(session_id, Role::Client, &c2s, &s2c),
            DualSession::new(session_id, Role::Server, &c2s, &s2c),
        )
    }

    #[test]
    fn roundtrip_and_replay() {
        let (client, server) = pair();
        let frame = client.encrypt(b"secret payload").unwrap();
        assert_eq!(frame.len(), 2 + 14 + 16);
        let pt = server.decrypt(&frame).unwrap();
        assert_eq!(pt, b"secret payload");
        assert!(server.decrypt(&frame).is_err());
    }

    #[test]
    fn rekey_keeps_in_flight_previous_epoch_decryptable() {
        let (client, server) = pair();
        let before = client.encrypt(b"before").unwrap();

        let new_c2s = SessionKey::from_slice(&[0x33u8; 32]).unwrap();
        let new_s2c = SessionKey::from_slice(&[0x44u8; 32]).unwrap();
        server.rekey(new_c2s.as_bytes(), new_s2c.as_bytes()).unwrap();
        client.rekey(new_c2s.as_bytes(), new_s2c.as_bytes()).unwrap();
        client.set_send_epoch(1);

        // Server still decrypts the frame sealed under epoch 0.
        assert_eq!(server.decrypt(&before).unwrap(), b"before");

        let after = client.encrypt(b"after").unwrap();
        assert_eq!(&after[0..2], &1u16.to_be_bytes());
        assert_eq!(server.decrypt(&after).unwrap(), b"after");

        // Previous epoch was evicted on the first current-epoch decrypt.
        assert!(server.inner.read().unwrap().previous.is_none());
    }

    #[test]
    fn unknown_epoch_rejected() {
        let (_client, server) = pair();
        let mut bogus = 99u16.to_be_bytes().to_vec();
        bogus.extend_from_slice(&[0u8; 30]);
        assert!(matches!(
            server.decrypt(&bogus),
            Err(CryptoError::UnknownEpoch)
        ));
    }

    #[test]
    fn empty_payload_frame_is_eighteen_bytes() {
        let (client, server) = pair();
        let frame = client.encrypt(b"").unwrap();
        assert_eq!(frame.len(), 18);
        assert_eq!(server.decrypt(&frame).unwrap(), b"");
    }
}
