//! # tunnel-core
//!
//! The cryptographic data-plane and key-establishment core of a point-to-point
//! VPN: the layer that turns plaintext packets into authenticated,
//! replay-protected, direction-bound wire frames and back, and the state
//! machine that rotates session keys without dropping in-flight traffic.
//!
//! This crate is deliberately a library with no socket, TUN, or framing code
//! of its own — those are external collaborators consumed through plain data
//! and the [`core::RekeyableSession`] trait. It provides:
//!
//! - The AEAD session record ([`crypto::Session`]): per-direction keys, a
//!   monotonic 96-bit nonce, associated-data construction, in-place seal/open.
//! - Replay protection for both ordered ([`crypto::StrictCounter`]) and
//!   unordered ([`crypto::SlidingWindow`]) transports.
//! - A Noise-IK handshake ([`crypto::Responder`], [`crypto::Initiator`]) with
//!   WireGuard-style MAC1/MAC2 DoS mitigation and a stateless cookie
//!   challenge ([`crypto::CookieManager`]) under load.
//! - Epoch-tagged session wrappers for seamless rekey over ordered
//!   ([`crypto::DualSession`]) and unordered ([`crypto::RingSession`])
//!   transports, coordinated by a [`crypto::RekeyFsm`].
//! - Secure scrubbing of key material via [`zeroize`].
//!
//! ## Feature Flags
//!
//! - `crypto` (default): the handshake and transport-AEAD layer described
//!   above. The crate has nothing useful to offer without it, but it remains
//!   a feature so downstream crates can depend on [`core`] alone.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included): constants, error taxonomy, shared traits.
pub mod core;

// Crypto layer (feature-gated)
#[cfg(feature = "crypto")]
#[cfg_attr(docsrs, doc(cfg(feature = "crypto")))]
pub mod crypto;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;

    #[cfg(feature = "crypto")]
    pub use crate::crypto::*;
}
