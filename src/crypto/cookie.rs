//! Stateless, time-bucketed cookie challenge used to throttle handshake
//! floods without the server retaining any per-client state.
//!
//! Grounded on boringtun's `RateLimiter::current_cookie`/`format_cookie_reply`
//! (time-bucketed keyed MAC, XChaCha20-Poly1305-sealed reply), generalized to
//! the 120-second bucket and explicit previous-bucket acceptance this
//! protocol's cookie design calls for.
use crate::core::constants::{COOKIE_BUCKET, COOKIE_NONCE_SIZE, COOKIE_REPLY_SIZE, LABEL_COOKIE, PROTOCOL_LABEL, PROTOCOL_VERSION};
use crate::core::error::CookieError;
use crate::crypto::clock::{Clock, SystemClock};
use crate::crypto::mac::b2s_hash;
use chacha20poly1305::{
    aead::{Aead, KeyInit},
    XChaCha20Poly1305, XNonce,
};
use rand::{rngs::OsRng, RngCore};
use std::net::IpAddr;
use subtle::ConstantTimeEq;
use zeroize::Zeroize;

fn ip_to_16(ip: IpAddr) -> [u8; 16] {
    match ip {
        IpAddr::V4(v4) => v4.to_ipv6_mapped().octets(),
        IpAddr::V6(v6) => v6.octets(),
    }
}

fn bucket_for(seconds: u64) -> u64 {
    seconds / COOKIE_BUCKET.as_secs()
}

/// Derives and validates stateless cookies, and seals/opens cookie replies.
pub struct CookieManager {
    secret: [u8; 32],
    clock: Box<dyn Clock>,
}

impl CookieManager {
    /// A manager with a freshly generated random secret, driven by the real
    /// wall clock.
    pub fn new() -> Self {
        CookieManager::with_clock(SystemClock)
    }

    /// A manager driven by an injected clock, so bucket rollovers can be
    /// exercised deterministically in tests.
    pub(crate) fn with_clock(clock: impl Clock + 'static) -> Self {
        let mut secret = [0u8; 32];
        OsRng.fill_bytes(&mut secret);
        CookieManager {
            secret,
            clock: Box::new(clock),
        }
    }

    fn cookie_value(&self, ip: IpAddr, bucket: u64) -> [u8; 16] {
        let ip_bytes = ip_to_16(ip);
        let bucket_bytes = (bucket as u16).to_le_bytes();
        let mut input = [0u8; 18];
        input[0..16].copy_from_slice(&ip_bytes);
        input[16..18].copy_from_slice(&bucket_bytes);
        crate::crypto::mac::b2s_keyed_mac_16(&self.secret, &input)
    }

    /// The cookie value a client at `ip` should present right now.
    pub fn compute_cookie_value(&self, ip: IpAddr) -> [u8; 16] {
        self.cookie_value(ip, bucket_for(self.clock.now_secs()))
    }

    /// Accept the cookie if it matches the current bucket or the immediately
    /// preceding one, tolerating a bucket boundary crossing mid-handshake.
    pub fn validate_cookie(&self, ip: IpAddr, cookie: &[u8; 16]) -> bool {
        let now = bucket_for(self.clock.now_secs());
        let current = self.cookie_value(ip, now);
        if constant_time_eq(&current, cookie) {
            return true;
        }
        if now > 0 {
            let previous = self.cookie_value(ip, now - 1);
            if constant_time_eq(&previous, cookie) {
                return true;
            }
        }
        false
    }

    fn reply_key(server_static_pub: &[u8; 32], client_ephemeral_pub: &[u8; 32]) -> [u8; 32] {
        let mut context = Vec::with_capacity(LABEL_COOKIE.len() + PROTOCOL_LABEL.len() + 1 + 32 + 32);
        context.extend_from_slice(LABEL_COOKIE);
        context.extend_from_slice(PROTOCOL_LABEL);
        context.push(PROTOCOL_VERSION);
        context.extend_from_slice(server_static_pub);
        context.extend_from_slice(client_ephemeral_pub);
        b2s_hash(&context, &[])
    }

    /// Seal the current cookie value, bound to both the client's ephemeral
    /// key and the server's static key so the reply cannot be replayed by a
    /// different client.
    pub fn create_cookie_reply(
        &self,
        ip: IpAddr,
        client_ephemeral_pub: &[u8; 32],
        server_static_pub: &[u8; 32],
    ) -> [u8; COOKIE_REPLY_SIZE] {
        let cookie = self.compute_cookie_value(ip);
        let key = Self::reply_key(server_static_pub, client_ephemeral_pub);
        let cipher = XChaCha20Poly1305::new((&key).into());

        let mut nonce_bytes = [0u8; COOKIE_NONCE_SIZE];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = XNonce::from_slice(&nonce_bytes);
        let ciphertext = cipher
            .encrypt(nonce, cookie.as_slice())
            .expect("sealing a 16-byte cookie cannot fail");

        let mut reply = [0u8; COOKIE_REPLY_SIZE];
        reply[0..COOKIE_NONCE_SIZE].copy_from_slice(&nonce_bytes);
        reply[COOKIE_NONCE_SIZE..].copy_from_slice(&ciphertext);
        reply
    }

    /// Recover the cookie value from a reply produced by
    /// [`CookieManager::create_cookie_reply`] for the matching key pair.
    pub fn decrypt_cookie_reply(
        reply: &[u8],
        client_ephemeral_pub: &[u8; 32],
        server_static_pub: &[u8; 32],
    ) -> Result<[u8; 16], CookieError> {
        if reply.len() != COOKIE_REPLY_SIZE {
            return Err(CookieError::ReplyTooShort);
        }
        let key = Self::reply_key(server_static_pub, client_ephemeral_pub);
        let cipher = XChaCha20Poly1305::new((&key).into());
        let nonce = XNonce::from_slice(&reply[0..COOKIE_NONCE_SIZE]);
        let plaintext = cipher
            .decrypt(nonce, &reply[COOKIE_NONCE_SIZE..])
            .map_err(|_| CookieError::DecryptionFailed)?;
        plaintext.try_into().map_err(|_| CookieError::DecryptionFailed)
    }

    /// Replace the secret with a fresh random one, scrubbing the old value.
    pub fn rotate_secret(&mut self) {
        self.secret.zeroize();
        OsRng.fill_bytes(&mut self.secret);
    }
}

impl Default for CookieManager {
    fn default() -> Self {
        CookieManager::new()
    }
}

impl Drop for CookieManager {
    fn drop(&mut self) {
        self.secret.zeroize();
    }
}

fn constant_time_eq(a: &[u8; 16], b: &[u8; 16]) -> bool {
    a.ct_eq(b).into()
}
