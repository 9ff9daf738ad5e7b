//! Shared trait bridging the rekey FSM to whichever session wrapper
//! (ordered dual-session or unordered epoch-ring) it happens to be driving.

use crate::core::error::CryptoError;

/// A crypto wrapper the rekey FSM can install fresh keys into.
///
/// Implemented by both [`crate::crypto::dual_session::DualSession`] (ordered
/// transport) and [`crate::crypto::ring_session::RingSession`] (unordered
/// transport), so the FSM itself stays transport-agnostic.
pub trait RekeyableSession {
    /// Install a freshly derived key pair as a new epoch, without changing
    /// which epoch is used for sending. Returns the new epoch number.
    fn rekey(&self, send_key: &[u8], recv_key: &[u8]) -> Result<u16, CryptoError>;

    /// Switch the outbound epoch.
    fn set_send_epoch(&self, epoch: u16);

    /// Remove a retired epoch's session, scrubbing its key material.
    ///
    /// Returns `Ok(())` even if the epoch was already absent; returns
    /// [`CryptoError::RekeyRefused`] if removing it would evict the active
    /// send epoch.
    fn remove_epoch(&self, epoch: u16) -> Result<(), CryptoError>;

    /// Currently active outbound epoch.
    fn send_epoch(&self) -> u16;
}
