use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use xln_core::Signer;
use zeroize::Zeroizing;

use crate::hash::keccak256;

/// A secp256k1 keypair with an XLN [`Signer`] address derived the same
/// way an Ethereum-style address is derived: keccak256 of the
/// uncompressed public key, low 20 bytes, left-padded into the 32-byte
/// `Signer` slot used throughout the protocol.
pub struct KeyPair {
    pub signer: Signer,
    pub public_key: PublicKey,
    secret_key: Zeroizing<[u8; 32]>,
}

impl KeyPair {
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let mut rng = rand::thread_rng();
        let (sk, pk) = secp.generate_keypair(&mut rng);
        Self::from_secret_key(sk, pk)
    }

    fn from_secret_key(sk: SecretKey, pk: PublicKey) -> Self {
        let signer = signer_from_pubkey(&pk);
        Self {
            signer,
            public_key: pk,
            secret_key: Zeroizing::new(sk.secret_bytes()),
        }
    }

    pub fn from_raw_secret(bytes: [u8; 32]) -> Result<Self, secp256k1::Error> {
        let secp = Secp256k1::new();
        let sk = SecretKey::from_slice(&bytes)?;
        let pk = PublicKey::from_secret_key(&secp, &sk);
        Ok(Self::from_secret_key(sk, pk))
    }

    /// Sign a 32-byte digest (a frame hash, never a raw message body).
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Signature {
        let secp = Secp256k1::signing_only();
        let sk = SecretKey::from_slice(&*self.secret_key).expect("valid secret key");
        let msg = Message::from_digest(*digest);
        secp.sign_ecdsa(&msg, &sk)
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "KeyPair {{ signer: {:?} }}", self.signer)
    }
}

pub fn signer_from_pubkey(pk: &PublicKey) -> Signer {
    let uncompressed = pk.serialize_uncompressed();
    // Skip the 0x04 prefix byte, hash the remaining 64 bytes, keep the
    // low 20 bytes, left-pad into the 32-byte Signer slot.
    let digest = keccak256(&uncompressed[1..]);
    let mut out = [0u8; 32];
    out[12..].copy_from_slice(&digest[12..]);
    Signer::from_bytes(out)
}

pub fn verify_digest(
    public_key: &PublicKey,
    digest: &[u8; 32],
    signature: &Signature,
) -> bool {
    let secp = Secp256k1::verification_only();
    let msg = Message::from_digest(*digest);
    secp.verify_ecdsa(&msg, signature, public_key).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sign_verify_round_trip() {
        let kp = KeyPair::generate();
        let digest = keccak256(b"the frame hash stand-in");
        let sig = kp.sign_digest(&digest);
        assert!(verify_digest(&kp.public_key, &digest, &sig));
    }

    #[test]
    fn tampered_digest_fails() {
        let kp = KeyPair::generate();
        let digest = keccak256(b"original");
        let sig = kp.sign_digest(&digest);
        let other = keccak256(b"tampered");
        assert!(!verify_digest(&kp.public_key, &other, &sig));
    }
}
