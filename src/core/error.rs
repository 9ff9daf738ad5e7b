//! Error taxonomy for the session crypto core.

use thiserror::Error;

/// Errors from the data-plane: nonce, AEAD, replay, epoch-ring, dual-session, rekey FSM.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// AEAD key was not exactly [`crate::core::constants::AEAD_KEY_SIZE`] bytes.
    #[error("invalid key size")]
    InvalidKeySize,

    /// The 80-bit nonce counter would wrap; the session must be torn down.
    #[error("nonce counter exhausted")]
    NonceOverflow,

    /// The output buffer lacks room for the AEAD tag (and, for unordered
    /// transport, the leading nonce).
    #[error("insufficient buffer capacity for in-place seal")]
    InsufficientCapacity,

    /// Frame shorter than the minimum possible length for its kind.
    #[error("malformed frame")]
    MalformedFrame,

    /// Epoch tag (or nonce-embedded epoch) does not resolve to an installed session.
    #[error("unknown epoch")]
    UnknownEpoch,

    /// Replay validator rejected the nonce as already seen or too old.
    #[error("replay detected")]
    NonUniqueNonce,

    /// AEAD `Open` failed: bad tag, wrong key, or AAD mismatch.
    #[error("AEAD authentication failed")]
    AuthFailure,

    /// Rekey refused because evicting the oldest epoch would remove the
    /// active send epoch.
    #[error("rekey refused: would evict the active send epoch")]
    RekeyRefused,

    /// Last-rekey epoch reached the safety cutoff; a full handshake is required.
    #[error("epoch exhausted, full re-handshake required")]
    EpochExhausted,
}

/// Internal handshake failure kinds.
///
/// Never returned across the public handshake boundary: the public entry
/// points collapse every variant here into a single opaque failure so a
/// network observer cannot distinguish "wrong key" from "unknown peer" from
/// "under load". Kept distinct internally purely for logging.
#[derive(Debug, Error)]
pub enum HandshakeError {
    /// MAC1 verification failed; the message is dropped before any Noise state exists.
    #[error("invalid mac1")]
    InvalidMac1,

    /// MAC2 verification failed while under load.
    #[error("invalid mac2")]
    InvalidMac2,

    /// Server is under load and requires a cookie before continuing.
    #[error("cookie required")]
    CookieRequired,

    /// Version byte is not the single supported protocol version.
    #[error("unsupported protocol version")]
    UnknownProtocol,

    /// Client static public key is not present in the allow-list.
    #[error("unknown peer")]
    UnknownPeer,

    /// Client static public key is present but disabled.
    #[error("peer disabled")]
    PeerDisabled,

    /// Message shorter than the minimum possible handshake message.
    #[error("handshake message too short")]
    MsgTooShort,

    /// Underlying Noise state machine rejected the message.
    #[error("noise protocol error: {0}")]
    Noise(String),

    /// The peer's static public key did not match the expected pinned key.
    #[error("peer static key mismatch")]
    StaticKeyMismatch,

    /// A second cookie reply was received after already retrying once.
    #[error("repeated cookie reply")]
    RepeatedCookieReply,
}

/// Uniform external handshake failure.
///
/// Every [`HandshakeError`] funnels into this single unit-like error before
/// crossing the public API boundary, per the external error-handling design.
#[derive(Debug, Error)]
#[error("handshake failed")]
pub struct HandshakeFailed;

/// Errors from the cookie manager.
#[derive(Debug, Error)]
pub enum CookieError {
    /// Cookie reply shorter than [`crate::core::constants::COOKIE_REPLY_SIZE`].
    #[error("cookie reply too short")]
    ReplyTooShort,

    /// XChaCha20-Poly1305 open of the cookie reply failed.
    #[error("cookie reply decryption failed")]
    DecryptionFailed,
}

impl From<snow::Error> for HandshakeError {
    fn from(e: snow::Error) -> Self {
        HandshakeError::Noise(e.to_string())
    }
}
