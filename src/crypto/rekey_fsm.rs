//! Rekey finite state machine: `Stable -> Rekeying -> Pending -> Stable`,
//! coordinating key installation with activation and timeout-driven abort
//! without ever blocking the data plane.

use crate::core::constants::REKEY_PENDING_TIMEOUT;
use crate::core::error::CryptoError;
use crate::core::traits::RekeyableSession;
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use zeroize::Zeroize;

/// Current phase of the rekey state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FsmState {
    /// No rekey in flight.
    Stable,
    /// A rekey has been requested and the crypto install call is in flight.
    Rekeying,
    /// A new epoch has been installed for receive; awaiting peer confirmation.
    Pending,
}

struct Inner {
    state: FsmState,
    last_rekey_epoch: u16,
    send_epoch: u16,
    pending_epoch: Option<u16>,
    pending_since: Option<Instant>,
    peer_epoch_seen_max: u16,
}

/// Coordinates rekey installation and activation for a single [`RekeyableSession`].
pub struct RekeyFsm {
    inner: Mutex<Inner>,
    pending_timeout: Duration,
}

impl RekeyFsm {
    /// A fresh FSM in `Stable` state at epoch 0, with the default pending timeout.
    pub fn new() -> Self {
        RekeyFsm {
            inner: Mutex::new(Inner {
                state: FsmState::Stable,
                last_rekey_epoch: 0,
                send_epoch: 0,
                pending_epoch: None,
                pending_since: None,
                peer_epoch_seen_max: 0,
            }),
            pending_timeout: REKEY_PENDING_TIMEOUT,
        }
    }

    /// Current FSM state.
    pub fn state(&self) -> FsmState {
        self.inner.lock().unwrap().state
    }

    /// Currently active outbound epoch as tracked by the FSM.
    pub fn send_epoch(&self) -> u16 {
        self.inner.lock().unwrap().send_epoch
    }

    /// Begin a rekey: install `send_key`/`recv_key` into `session` as a new
    /// epoch. The crypto install call runs without holding the FSM's lock so
    /// concurrent data-plane traffic is never blocked by it.
    pub fn start_rekey(
        &self,
        session: &impl RekeyableSession,
        send_key: &[u8],
        recv_key: &[u8],
    ) -> Result<(), CryptoError> {
        {
            let mut inner = self.inner.lock().unwrap();
            if inner.state != FsmState::Stable {
                return Ok(()); // a rekey is already in flight; no-op
            }
            if inner.last_rekey_epoch >= crate::core::constants::MAX_REKEY_EPOCH {
                return Err(CryptoError::EpochExhausted);
            }
            inner.state = FsmState::Rekeying;
        }
        debug!(target: "rekey", state = "Rekeying", "starting rekey");

        let result = session.rekey(send_key, recv_key);

        let mut inner = self.inner.lock().unwrap();
        match result {
            Ok(new_epoch) => {
                if inner.state != FsmState::Rekeying {
                    // State moved on (e.g. a concurrent abort) while the lock
                    // was released for the crypto call; undo the install
                    // rather than clobber whatever state we're in now.
                    let _ = session.remove_epoch(new_epoch);
                    warn!(target: "rekey", state = ?inner.state, epoch = new_epoch, "rekey install superseded, undoing");
                    return Ok(());
                }
                inner.state = FsmState::Pending;
                inner.pending_epoch = Some(new_epoch);
                inner.pending_since = Some(Instant::now());
                inner.last_rekey_epoch = new_epoch;
                debug!(target: "rekey", state = "Pending", epoch = new_epoch, "rekey installed");

                if inner.peer_epoch_seen_max >= new_epoch {
                    self.promote_locked(&mut inner, session);
                }
                Ok(())
            }
            Err(e) => {
                inner.state = FsmState::Stable;
                warn!(target: "rekey", state = "Stable", error = %e, "rekey install failed");
                Err(e)
            }
        }
    }

    /// Record that authenticated peer traffic was observed at `epoch`. If a
    /// rekey is `Pending` at or below this epoch, promotes it to `Stable`
    /// immediately (the "early-ack" case).
    pub fn activate_send_epoch(&self, session: &impl RekeyableSession, epoch: u16) {
        let mut inner = self.inner.lock().unwrap();
        inner.peer_epoch_seen_max = inner.peer_epoch_seen_max.max(epoch);
        if inner.state == FsmState::Pending {
            if let Some(pending) = inner.pending_epoch {
                if epoch >= pending {
                    self.promote_locked(&mut inner, session);
                }
            }
        }
    }

    fn promote_locked(&self, inner: &mut Inner, session: &impl RekeyableSession) {
        if let Some(pending) = inner.pending_epoch.take() {
            session.set_send_epoch(pending);
            inner.send_epoch = pending;
            inner.pending_since = None;
            inner.state = FsmState::Stable;
            debug!(target: "rekey", state = "Stable", epoch = pending, "rekey confirmed");
        }
    }

    /// If a pending rekey has exceeded the pending timeout, abort it: remove
    /// the installed epoch from the session and return to `Stable` on the
    /// still-active send epoch.
    pub fn abort_pending_if_expired(&self, session: &impl RekeyableSession, now: Instant) {
        let mut inner = self.inner.lock().unwrap();
        if inner.state != FsmState::Pending {
            return;
        }
        let since = match inner.pending_since {
            Some(t) => t,
            None => return,
        };
        if now.duration_since(since) < self.pending_timeout {
            return;
        }
        if let Some(pending) = inner.pending_epoch.take() {
            let _ = session.remove_epoch(pending);
            warn!(target: "rekey", state = "Stable", epoch = pending, "pending rekey timed out, aborted");
        }
        inner.pending_since = None;
        inner.state = FsmState::Stable;
    }
}

impl Default for RekeyFsm {
    fn default() -> Self {
        RekeyFsm::new()
    }
}

impl Drop for RekeyFsm {
    fn drop(&mut self) {
        if let Ok(mut inner) = self.inner.lock() {
            inner.last_rekey_epoch.zeroize();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aead::{Role, SessionKey};
    use crate::crypto::dual_session::DualSession;
    use crate::crypto::keys::SessionId;

    fn session() -> DualSession {
        let id = SessionId::generate();
        let c2s = SessionKey::from_slice(&[0x11u8; 32]).unwrap();
        let s2c = SessionKey::from_slice(&[0x22u8; 32]).unwrap();
        DualSession::new(id, Role::Server, &c2s, &s2c)
    }

    #[test]
    fn full_confirm_cycle_reaches_stable_at_new_epoch() {
        let fsm = RekeyFsm::new();
        let sess = session();
        fsm.start_rekey(&sess, &[0x33u8; 32], &[0x44u8; 32]).unwrap();
        assert_eq!(fsm.state(), FsmState::Pending);

        fsm.activate_send_epoch(&sess, 1);
        assert_eq!(fsm.state(), FsmState::Stable);
        assert_eq!(fsm.send_epoch(), 1);
    }

    #[test]
    fn early_ack_before_start_rekey_returns_still_promotes_immediately() {
        let fsm = RekeyFsm::new();
        let sess = session();
        // Peer already confirmed epoch 1 by the time our install finishes
        // (simulated by recording it before calling start_rekey completes,
        // since start_rekey releases the lock during `session.rekey`).
        fsm.activate_send_epoch(&sess, 1);
        fsm.start_rekey(&sess, &[0x33u8; 32], &[0x44u8; 32]).unwrap();
        assert_eq!(fsm.state(), FsmState::Stable);
    }

    #[test]
    fn timeout_aborts_pending_and_removes_epoch() {
        let fsm = RekeyFsm::new();
        let sess = session();
        fsm.start_rekey(&sess, &[0x33u8; 32], &[0x44u8; 32]).unwrap();
        assert_eq!(fsm.state(), FsmState::Pending);

        let future = Instant::now() + Duration::from_secs(10);
        fsm.abort_pending_if_expired(&sess, future);
        assert_eq!(fsm.state(), FsmState::Stable);
        assert_eq!(fsm.send_epoch(), 0);
    }

    #[test]
    fn not_yet_expired_pending_is_left_alone() {
        let fsm = RekeyFsm::new();
        let sess = session();
        fsm.start_rekey(&sess, &[0x33u8; 32], &[0x44u8; 32]).unwrap();
        fsm.abort_pending_if_expired(&sess, Instant::now());
        assert_eq!(fsm.state(), FsmState::Pending);
    }
}
