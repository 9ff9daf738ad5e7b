//! Noise-IK handshake with WireGuard-style DoS mitigation: an unconditional
//! MAC1 check, and a MAC2 + stateless cookie challenge consulted only while
//! [`LoadMonitor::is_under_load`] is true.
//!
//! Grounded on boringtun's handshake framing (`LABEL_MAC1`/`LABEL_COOKIE`,
//! `b2s_keyed_mac_16`) combined with the teacher's `snow`-based
//! initiator/responder split and HKDF session-key derivation.

use crate::core::constants::{
    COOKIE_REPLY_SIZE, LABEL_MAC1, LABEL_MAC2, MAC_SIZE, MIN_HANDSHAKE_MSG1_SIZE, PROTOCOL_LABEL,
    PROTOCOL_VERSION,
};
use crate::core::error::{CookieError, HandshakeError, HandshakeFailed};
use crate::crypto::aead::{Role, SessionKey};
use crate::crypto::cookie::CookieManager;
use crate::crypto::keys::{SessionId, StaticKeypair};
use crate::crypto::load_monitor::LoadMonitor;
use crate::crypto::mac::{b2s_hash, b2s_keyed_mac_16, b2s_keyed_mac_16_2};
use hkdf::Hkdf;
use rand::{rngs::OsRng, RngCore};
use sha2::Sha256;
use snow::{Builder, HandshakeState};
use std::collections::HashMap;
use std::net::IpAddr;
use subtle::ConstantTimeEq;
use tracing::{debug, warn};
use zeroize::Zeroize;

fn mac1_key(server_static_pub: &[u8; 32]) -> [u8; 32] {
    let mut context = Vec::with_capacity(LABEL_MAC1.len() + PROTOCOL_LABEL.len() + 1 + 32);
    context.extend_from_slice(LABEL_MAC1);
    context.extend_from_slice(PROTOCOL_LABEL);
    context.push(PROTOCOL_VERSION);
    context.extend_from_slice(server_static_pub);
    b2s_hash(&context, &[])
}

fn mac2_key(cookie: &[u8; 16]) -> [u8; 32] {
    let mut context = Vec::with_capacity(LABEL_MAC2.len() + PROTOCOL_LABEL.len() + 1 + 16);
    context.extend_from_slice(LABEL_MAC2);
    context.extend_from_slice(PROTOCOL_LABEL);
    context.push(PROTOCOL_VERSION);
    context.extend_from_slice(cookie);
    b2s_hash(&context, &[])
}

/// One allow-listed peer.
#[derive(Debug, Clone)]
pub struct PeerEntry {
    /// Whether this peer is currently permitted to complete a handshake.
    pub enabled: bool,
    /// Stable 1-based ordinal assigned to this peer (used for IP allocation
    /// by the caller; not interpreted by the crypto core).
    pub client_id: u64,
}

/// Static-public-key allow-list consulted by the responder.
#[derive(Debug, Default, Clone)]
pub struct AllowList(pub HashMap<[u8; 32], PeerEntry>);

/// Channel-binding-derived session keys for one completed handshake.
pub struct SessionKeys {
    /// Session identifier: the first 32 bytes of the Noise transcript hash.
    pub session_id: SessionId,
    /// client-to-server key.
    pub c2s: SessionKey,
    /// server-to-client key.
    pub s2c: SessionKey,
    /// Mixes a static-static DH into future rekeys for post-compromise security.
    pub rekey_auth_key: [u8; 32],
}

impl SessionKeys {
    /// The key this role should encrypt outbound traffic with.
    pub fn send_key(&self, role: Role) -> &SessionKey {
        match role {
            Role::Client => &self.c2s,
            Role::Server => &self.s2c,
        }
    }

    /// The key this role should decrypt inbound traffic with.
    pub fn recv_key(&self, role: Role) -> &SessionKey {
        match role {
            Role::Client => &self.s2c,
            Role::Server => &self.c2s,
        }
    }
}

fn derive_session_keys(
    handshake_hash: &[u8],
    static_dh: [u8; 32],
) -> Result<SessionKeys, HandshakeError> {
    let hk = Hkdf::<Sha256>::from_prk(handshake_hash)
        .map_err(|_| HandshakeError::Noise("handshake hash too short for HKDF".into()))?;
    let mut okm = [0u8; 64];
    hk.expand(b"session keys v1", &mut okm)
        .map_err(|_| HandshakeError::Noise("hkdf expand failed".into()))?;
    let c2s = SessionKey::from_slice(&okm[0..32]).map_err(|_| HandshakeError::Noise("key size".into()))?;
    let s2c = SessionKey::from_slice(&okm[32..64]).map_err(|_| HandshakeError::Noise("key size".into()))?;
    okm.zeroize();

    let rekey_auth_key = b2s_hash(b"rekey auth v1", &static_dh);

    let mut session_id = [0u8; 32];
    session_id.copy_from_slice(&handshake_hash[0..32]);

    Ok(SessionKeys {
        session_id: SessionId::from_bytes(session_id),
        c2s,
        s2c,
        rekey_auth_key,
    })
}

/// Server-side handshake endpoint: holds the long-term identity, the peer
/// allow-list, and the DoS-mitigation machinery.
pub struct Responder {
    local: StaticKeypair,
    allow_list: AllowList,
    cookie_mgr: CookieManager,
    load: LoadMonitor,
}

/// Result of processing one inbound handshake message 1.
pub enum ResponderOutcome {
    /// Server is under load and has issued a cookie reply instead of completing the handshake.
    CookieReply(Vec<u8>),
    /// Handshake completed; `msg2` must be sent back to the client.
    Accepted {
        /// Message 2 bytes to send to the client.
        msg2: Vec<u8>,
        /// Derived session keys and identifier.
        keys: SessionKeys,
        /// The client's allow-list entry.
        client_id: u64,
    },
}

impl Responder {
    /// Build a responder with a fresh default-threshold load monitor and a
    /// freshly generated cookie secret.
    pub fn new(local: StaticKeypair, allow_list: AllowList) -> Self {
        Responder {
            local,
            allow_list,
            cookie_mgr: CookieManager::new(),
            load: LoadMonitor::with_default_threshold(),
        }
    }

    /// Process an inbound handshake message 1.
    pub fn accept(&self, msg: &[u8], remote_ip: Option<IpAddr>) -> Result<ResponderOutcome, HandshakeFailed> {
        match self.try_accept(msg, remote_ip) {
            Ok(outcome) => Ok(outcome),
            Err(e) => {
                warn!(target: "handshake", reason = %e, "handshake rejected");
                Err(HandshakeFailed)
            }
        }
    }

    fn try_accept(&self, msg: &[u8], remote_ip: Option<IpAddr>) -> Result<ResponderOutcome, HandshakeError> {
        if msg.len() < MIN_HANDSHAKE_MSG1_SIZE {
            return Err(HandshakeError::MsgTooShort);
        }
        let version = msg[0];
        if version != PROTOCOL_VERSION {
            return Err(HandshakeError::UnknownProtocol);
        }
        let noise_msg1 = &msg[1..msg.len() - 2 * MAC_SIZE];
        let mac1 = &msg[msg.len() - 2 * MAC_SIZE..msg.len() - MAC_SIZE];
        let mac2 = &msg[msg.len() - MAC_SIZE..];

        let expected_mac1 = b2s_keyed_mac_16(&mac1_key(self.local.public_key()), noise_msg1);
        if !constant_time_eq(&expected_mac1, mac1) {
            return Err(HandshakeError::InvalidMac1);
        }

        self.load.record_attempt();

        if self.load.is_under_load() {
            let client_ephemeral: [u8; 32] = noise_msg1
                .get(0..32)
                .and_then(|s| s.try_into().ok())
                .ok_or(HandshakeError::MsgTooShort)?;
            let cookie = match remote_ip {
                Some(ip) => self.cookie_mgr.compute_cookie_value(ip),
                None => return Err(HandshakeError::CookieRequired),
            };
            let expected_mac2 = b2s_keyed_mac_16_2(&mac2_key(&cookie), noise_msg1, mac1);
            if !constant_time_eq(&expected_mac2, mac2) {
                let ip = remote_ip.ok_or(HandshakeError::CookieRequired)?;
                let reply = self
                    .cookie_mgr
                    .create_cookie_reply(ip, &client_ephemeral, self.local.public_key());
                debug!(target: "cookie", "issuing cookie reply under load");
                return Ok(ResponderOutcome::CookieReply(reply.to_vec()));
            }
        }

        let mut state = Builder::new(crate::core::constants::NOISE_PATTERN.parse().unwrap())
            .local_private_key(self.local.private_key())
            .build_responder()
            .map_err(HandshakeError::from)?;

        let mut payload = [0u8; 0];
        state
            .read_message(noise_msg1, &mut payload)
            .map_err(HandshakeError::from)?;

        let remote_static: [u8; 32] = state
            .get_remote_static()
            .ok_or(HandshakeError::UnknownPeer)?
            .try_into()
            .map_err(|_| HandshakeError::UnknownPeer)?;

        let entry = self
            .allow_list
            .0
            .get(&remote_static)
            .ok_or(HandshakeError::UnknownPeer)?;
        if !entry.enabled {
            return Err(HandshakeError::PeerDisabled);
        }
        let client_id = entry.client_id;

        let mut msg2 = vec![0u8; 128];
        let len = state
            .write_message(&[], &mut msg2)
            .map_err(HandshakeError::from)?;
        msg2.truncate(len);

        if !state.is_handshake_finished() {
            return Err(HandshakeError::Noise("handshake did not complete".into()));
        }
        let handshake_hash = state.get_handshake_hash().to_vec();
        let static_dh = self.local.compute_static_dh(&remote_static);
        let keys = derive_session_keys(&handshake_hash, static_dh)?;

        debug!(target: "handshake", client_id, "handshake accepted");
        Ok(ResponderOutcome::Accepted {
            msg2,
            keys,
            client_id,
        })
    }
}

/// Client-side handshake endpoint.
pub struct Initiator {
    local: StaticKeypair,
    server_static_pub: [u8; 32],
}

impl Initiator {
    /// Build an initiator pinned to the given server static public key.
    pub fn new(local: StaticKeypair, server_static_pub: [u8; 32]) -> Self {
        Initiator {
            local,
            server_static_pub,
        }
    }

    /// Build handshake message 1. `cookie` is `None` on the first attempt;
    /// pass the cookie recovered from a cookie reply on the single retry.
    pub fn build_message1(&self, cookie: Option<&[u8; 16]>) -> Result<(HandshakeState, Vec<u8>), HandshakeFailed> {
        self.try_build_message1(cookie).map_err(|e| {
            warn!(target: "handshake", reason = %e, "failed to build handshake message 1");
            HandshakeFailed
        })
    }

    fn try_build_message1(
        &self,
        cookie: Option<&[u8; 16]>,
    ) -> Result<(HandshakeState, Vec<u8>), HandshakeError> {
        let mut state = Builder::new(crate::core::constants::NOISE_PATTERN.parse().unwrap())
            .local_private_key(self.local.private_key())
            .remote_public_key(&self.server_static_pub)
            .build_initiator()
            .map_err(HandshakeError::from)?;

        let mut noise_msg1 = vec![0u8; 96];
        let len = state
            .write_message(&[], &mut noise_msg1)
            .map_err(HandshakeError::from)?;
        noise_msg1.truncate(len);

        let mac1 = b2s_keyed_mac_16(&mac1_key(&self.server_static_pub), &noise_msg1);
        let mac2 = match cookie {
            Some(c) => b2s_keyed_mac_16_2(&mac2_key(c), &noise_msg1, &mac1),
            None => {
                let mut random = [0u8; MAC_SIZE];
                OsRng.fill_bytes(&mut random);
                random
            }
        };

        let mut msg = Vec::with_capacity(1 + noise_msg1.len() + 2 * MAC_SIZE);
        msg.push(PROTOCOL_VERSION);
        msg.extend_from_slice(&noise_msg1);
        msg.extend_from_slice(&mac1);
        msg.extend_from_slice(&mac2);
        Ok((state, msg))
    }

    /// Process the server's response: either a cookie reply (caller should
    /// retry [`Initiator::build_message1`] with the recovered cookie exactly
    /// once) or handshake message 2, completing the handshake.
    ///
    /// `is_retry` must be `true` if this response is to a message 1 that was
    /// itself already built using a recovered cookie; a second cookie reply
    /// at that point is fatal rather than retried again.
    pub fn process_response(
        &self,
        state: HandshakeState,
        response: &[u8],
        is_retry: bool,
    ) -> Result<ResponseOutcome, HandshakeFailed> {
        self.try_process_response(state, response, is_retry).map_err(|e| {
            warn!(target: "handshake", reason = %e, "handshake response rejected");
            HandshakeFailed
        })
    }

    fn try_process_response(
        &self,
        mut state: HandshakeState,
        response: &[u8],
        is_retry: bool,
    ) -> Result<ResponseOutcome, HandshakeError> {
        if response.len() == COOKIE_REPLY_SIZE {
            if is_retry {
                return Err(HandshakeError::RepeatedCookieReply);
            }
            // Handled by the caller via `decrypt_cookie_reply` directly,
            // since it needs the client ephemeral which only the caller's
            // retained `state`/message bytes can supply cheaply.
            return Ok(ResponseOutcome::CookieReply(response.to_vec()));
        }

        let mut payload = [0u8; 0];
        state
            .read_message(response, &mut payload)
            .map_err(HandshakeError::from)?;

        if !state.is_handshake_finished() {
            return Err(HandshakeError::Noise("handshake did not complete".into()));
        }

        let remote_static: [u8; 32] = state
            .get_remote_static()
            .ok_or(HandshakeError::StaticKeyMismatch)?
            .try_into()
            .map_err(|_| HandshakeError::StaticKeyMismatch)?;
        if remote_static != self.server_static_pub {
            return Err(HandshakeError::StaticKeyMismatch);
        }

        let handshake_hash = state.get_handshake_hash().to_vec();
        let static_dh = self.local.compute_static_dh(&remote_static);
        let keys = derive_session_keys(&handshake_hash, static_dh)?;
        debug!(target: "handshake", "handshake completed");
        Ok(ResponseOutcome::Accepted(keys))
    }

    /// Recover the cookie from a cookie reply, given the ephemeral public
    /// key this initiator sent in message 1.
    pub fn recover_cookie(
        &self,
        reply: &[u8],
        client_ephemeral_pub: &[u8; 32],
    ) -> Result<[u8; 16], CookieError> {
        CookieManager::decrypt_cookie_reply(reply, client_ephemeral_pub, &self.server_static_pub)
    }
}

/// Outcome of processing the server's handshake response.
pub enum ResponseOutcome {
    /// A cookie reply; retry once with the recovered cookie.
    CookieReply(Vec<u8>),
    /// Handshake completed.
    Accepted(SessionKeys),
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    a.len() == b.len() && a.ct_eq(b).into()
}
