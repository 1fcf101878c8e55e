//! Per-hop onion encryption for HTLC routing.
//!
//! Each layer is X25519 ECDH against the next hop's gossip-published key,
//! HKDF-derived into a ChaCha20Poly1305 key, then AEAD-sealed (see
//! DESIGN.md for the key-agreement dependency choice).
//!
//! Nonces are random per layer and live only in the opaque ciphertext
//! field — they never feed a frame hash, only the ciphertext bytes do.

use chacha20poly1305::{
    aead::{Aead, KeyInit},
    ChaCha20Poly1305, Nonce,
};
use hkdf::Hkdf;
use rand::RngCore;
use sha3::Sha3_256;
use thiserror::Error;
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

#[derive(Debug, Error)]
pub enum OnionError {
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("malformed onion layer")]
    Malformed,
}

/// One hop's payload before encryption: the next hop identifier, the
/// forwarded amount/timelock, and the still-encrypted inner onion.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OnionPayload {
    pub next_hop: Vec<u8>,
    pub forwarded_amount: u128,
    pub forwarded_timelock: u64,
    pub inner: Vec<u8>,
}

impl OnionPayload {
    fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&(self.next_hop.len() as u32).to_be_bytes());
        buf.extend_from_slice(&self.next_hop);
        buf.extend_from_slice(&self.forwarded_amount.to_be_bytes());
        buf.extend_from_slice(&self.forwarded_timelock.to_be_bytes());
        buf.extend_from_slice(&self.inner);
        buf
    }

    fn decode(bytes: &[u8]) -> Result<Self, OnionError> {
        if bytes.len() < 4 {
            return Err(OnionError::Malformed);
        }
        let len = u32::from_be_bytes(bytes[0..4].try_into().unwrap()) as usize;
        let mut off = 4;
        if bytes.len() < off + len + 16 + 8 {
            return Err(OnionError::Malformed);
        }
        let next_hop = bytes[off..off + len].to_vec();
        off += len;
        let forwarded_amount = u128::from_be_bytes(bytes[off..off + 16].try_into().unwrap());
        off += 16;
        let forwarded_timelock = u64::from_be_bytes(bytes[off..off + 8].try_into().unwrap());
        off += 8;
        let inner = bytes[off..].to_vec();
        Ok(Self { next_hop, forwarded_amount, forwarded_timelock, inner })
    }
}

/// Seal `payload` to `recipient_pub`. The ephemeral public key and nonce
/// are prefixed onto the ciphertext so the recipient can derive the same
/// shared secret without any prior session state.
pub fn seal_layer(recipient_pub: &PublicKey, payload: &OnionPayload) -> Vec<u8> {
    let ephemeral = EphemeralSecret::random_from_rng(rand::rngs::OsRng);
    let ephemeral_pub = PublicKey::from(&ephemeral);
    let shared = ephemeral.diffie_hellman(recipient_pub);

    let key = derive_key(shared.as_bytes());
    let cipher = ChaCha20Poly1305::new((&key).into());

    let mut nonce_bytes = [0u8; 12];
    rand::rngs::OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let plaintext = payload.encode();
    let ciphertext = cipher.encrypt(nonce, plaintext.as_ref()).expect("seal never fails");

    let mut out = Vec::with_capacity(32 + 12 + ciphertext.len());
    out.extend_from_slice(ephemeral_pub.as_bytes());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    out
}

/// Peel one layer using the local hop's static secret key.
pub fn open_layer(local_secret: &StaticSecret, sealed: &[u8]) -> Result<OnionPayload, OnionError> {
    if sealed.len() < 32 + 12 {
        return Err(OnionError::Malformed);
    }
    let mut eph_bytes = [0u8; 32];
    eph_bytes.copy_from_slice(&sealed[0..32]);
    let ephemeral_pub = PublicKey::from(eph_bytes);

    let nonce = Nonce::from_slice(&sealed[32..44]);
    let ciphertext = &sealed[44..];

    let shared = local_secret.diffie_hellman(&ephemeral_pub);
    let key = derive_key(shared.as_bytes());
    let cipher = ChaCha20Poly1305::new((&key).into());

    let plaintext = cipher
        .decrypt(nonce, ciphertext)
        .map_err(|_| OnionError::DecryptionFailed)?;
    OnionPayload::decode(&plaintext)
}

fn derive_key(shared_secret: &[u8; 32]) -> [u8; 32] {
    let hk = Hkdf::<Sha3_256>::new(None, shared_secret);
    let mut okm = [0u8; 32];
    hk.expand(b"xln-onion-v1", &mut okm).expect("32 bytes is a valid HKDF output length");
    okm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seal_open_round_trip() {
        let hop_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let hop_pub = PublicKey::from(&hop_secret);

        let payload = OnionPayload {
            next_hop: b"hop2".to_vec(),
            forwarded_amount: 1000,
            forwarded_timelock: 40,
            inner: b"nested-onion-bytes".to_vec(),
        };

        let sealed = seal_layer(&hop_pub, &payload);
        let opened = open_layer(&hop_secret, &sealed).unwrap();
        assert_eq!(opened, payload);
    }

    #[test]
    fn wrong_key_fails() {
        let hop_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);
        let hop_pub = PublicKey::from(&hop_secret);
        let wrong_secret = StaticSecret::random_from_rng(rand::rngs::OsRng);

        let payload = OnionPayload {
            next_hop: vec![1, 2, 3],
            forwarded_amount: 1,
            forwarded_timelock: 1,
            inner: vec![],
        };
        let sealed = seal_layer(&hop_pub, &payload);
        assert!(open_layer(&wrong_secret, &sealed).is_err());
    }
}
