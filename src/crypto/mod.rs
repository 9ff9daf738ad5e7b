//! Cryptographic core: handshake, transport AEAD, replay protection, rekey
//! coordination, and the DoS-mitigation primitives that gate them.

pub mod aead;
pub(crate) mod clock;
pub mod cookie;
pub mod dual_session;
pub mod epoch_ring;
pub mod handshake;
pub mod keys;
pub mod load_monitor;
pub mod mac;
pub mod nonce;
pub mod rekey_fsm;
pub mod replay;
pub mod ring_session;
pub mod zeroize_util;

pub use aead::{Role, Session, SessionKey};
pub use cookie::CookieManager;
pub use dual_session::DualSession;
pub use epoch_ring::EpochRing;
pub use handshake::{AllowList, Initiator, PeerEntry, Responder, ResponderOutcome, ResponseOutcome, SessionKeys};
pub use keys::{SessionId, StaticKeypair};
pub use load_monitor::LoadMonitor;
pub use nonce::Nonce;
pub use rekey_fsm::{FsmState, RekeyFsm};
pub use replay::{SlidingWindow, StrictCounter};
pub use ring_session::RingSession;
