//! Protocol constants for the session crypto core.
//!
//! These values are fixed by the wire format and MUST NOT be changed
//! without a protocol version bump.

use std::time::Duration;

// =============================================================================
// CRYPTOGRAPHIC CONSTANTS
// =============================================================================

/// Poly1305 authentication tag size.
pub const AEAD_TAG_SIZE: usize = 16;

/// ChaCha20-Poly1305 nonce size (data-plane AEAD).
pub const AEAD_NONCE_SIZE: usize = 12;

/// XChaCha20-Poly1305 nonce size (cookie reply sealing only).
pub const COOKIE_NONCE_SIZE: usize = 24;

/// AEAD key size.
pub const AEAD_KEY_SIZE: usize = 32;

/// X25519 public key size.
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 private key size.
pub const PRIVATE_KEY_SIZE: usize = 32;

/// BLAKE2s hash output size.
pub const HASH_SIZE: usize = 32;

/// Session identifier size (channel-binding hash, truncated).
pub const SESSION_ID_SIZE: usize = 32;

/// Protocol version carried as the first byte of handshake message 1.
pub const PROTOCOL_VERSION: u8 = 1;

/// Protocol label mixed into every keyed BLAKE2s derivation.
pub const PROTOCOL_LABEL: &[u8] = b"TunGo";

// =============================================================================
// NONCE LAYOUT
// =============================================================================

/// Byte offset of the 64-bit low counter within a 12-byte nonce.
pub const NONCE_LOW_OFFSET: usize = 0;

/// Byte offset of the 16-bit high counter within a 12-byte nonce.
pub const NONCE_HIGH_OFFSET: usize = 8;

/// Byte offset of the 16-bit epoch within a 12-byte nonce.
pub const NONCE_EPOCH_OFFSET: usize = 10;

// =============================================================================
// AAD / DIRECTION
// =============================================================================

/// Associated-data length: session-id(32) ++ direction(16) ++ nonce(12).
pub const AAD_SIZE: usize = SESSION_ID_SIZE + 16 + AEAD_NONCE_SIZE;

/// Direction label used in the AAD for client-to-server frames.
pub const DIRECTION_CLIENT_TO_SERVER: &[u8; 16] = b"client-to-server";

/// Direction label used in the AAD for server-to-client frames.
pub const DIRECTION_SERVER_TO_CLIENT: &[u8; 16] = b"server-to-client";

// =============================================================================
// EPOCH TAG (ordered-transport framing)
// =============================================================================

/// Size of the epoch tag prepended to ordered-transport frames.
pub const EPOCH_TAG_SIZE: usize = 2;

/// Epoch ring capacity (unordered transport): current + up to 3 retired.
pub const EPOCH_RING_CAPACITY: usize = 4;

/// Safety cutoff forcing a full re-handshake instead of further rekeys.
pub const MAX_REKEY_EPOCH: u16 = 65_000;

// =============================================================================
// REPLAY PROTECTION
// =============================================================================

/// Sliding-window width in bits.
pub const REPLAY_WINDOW_BITS: usize = 1024;

/// Sliding-window width in 64-bit words.
pub const REPLAY_WINDOW_WORDS: usize = REPLAY_WINDOW_BITS / 64;

/// Number of simultaneous high-counter windows tolerated.
pub const REPLAY_WINDOW_SLOTS: usize = 4;

// =============================================================================
// HANDSHAKE
// =============================================================================

/// Noise pattern used for the session handshake.
pub const NOISE_PATTERN: &str = "Noise_IK_25519_ChaChaPoly_BLAKE2s";

/// Keyed-MAC output size used for MAC1/MAC2.
pub const MAC_SIZE: usize = 16;

/// Minimum length of handshake message 1: version(1) + noise-msg1(e:32 +
/// encrypted-s:48 + payload-tag:16 = 96) + mac1 + mac2.
pub const MIN_HANDSHAKE_MSG1_SIZE: usize = 1 + 96 + MAC_SIZE + MAC_SIZE;

/// Exact length of a cookie reply: nonce(24) + cookie(16) + tag(16).
pub const COOKIE_REPLY_SIZE: usize = COOKIE_NONCE_SIZE + 16 + AEAD_TAG_SIZE;

/// Label mixed into the MAC1 key derivation.
pub const LABEL_MAC1: &[u8] = b"mac1";

/// Label mixed into the MAC2 key derivation.
pub const LABEL_MAC2: &[u8] = b"mac2";

/// Label mixed into the cookie-reply encryption key derivation.
pub const LABEL_COOKIE: &[u8] = b"cookie";

// =============================================================================
// COOKIE / DOS MITIGATION
// =============================================================================

/// Width of a cookie time bucket.
pub const COOKIE_BUCKET: Duration = Duration::from_secs(120);

/// Default handshake-rate threshold above which cookies are required.
pub const DEFAULT_LOAD_THRESHOLD: u64 = 1000;

/// Load-monitor counter reset period.
pub const LOAD_RESET_PERIOD: Duration = Duration::from_secs(1);

// =============================================================================
// REKEY
// =============================================================================

/// Default time a pending rekey may remain unconfirmed before abort.
pub const REKEY_PENDING_TIMEOUT: Duration = Duration::from_secs(5);
