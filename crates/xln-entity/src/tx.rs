//! Entity-level transactions: the unit of work a replica orders into a
//! frame.

use secp256k1::ecdsa::Signature;
use serde::{Deserialize, Serialize};

use xln_codec::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{AccountKey, EntityId, GossipProfile, JEventEnvelope, Nonce, Signer, SortableTx};
use xln_crypto::tx_hash_of;

/// The closed set of things an entity frame can contain. Unknown kinds
/// cannot be constructed or decoded — there is no catch-all variant.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntityTx {
    /// Free-form message appended to the entity's chat log. Exists so a
    /// human operator can observe a replica taking frames at all without
    /// any account machinery running yet.
    Chat { message: String },
    /// Request to open a bilateral account with `counterparty`. The
    /// account machine itself lives one layer down, in `xln-account`;
    /// this tx only records the entity's consent to open it.
    AccountOpen { counterparty: EntityId },
    /// Apply a deduplicated jurisdiction event into entity state.
    JEventApply { envelope: JEventEnvelope },
    /// Publish or refresh this entity's gossip profile.
    GossipPublish { profile: GossipProfile },
    /// Relay an HTLC forwarding notice produced by the account layer so
    /// other entity-layer observers (gossip, gateways) learn a hop was
    /// attempted, without exposing the onion's contents.
    HtlcForward { account_key: AccountKey, hop_index: u32 },
}

impl EntityTx {
    /// Stable discriminant used as the third sort key and recorded in
    /// frames so a decoder can distinguish variants without relying on
    /// enum declaration order surviving future edits.
    pub fn kind(&self) -> u8 {
        match self {
            EntityTx::Chat { .. } => 0,
            EntityTx::AccountOpen { .. } => 1,
            EntityTx::JEventApply { .. } => 2,
            EntityTx::GossipPublish { .. } => 3,
            EntityTx::HtlcForward { .. } => 4,
        }
    }
}

/// A tx plus the signer's nonce and the ECDSA signature over
/// `(nonce, kind, tx_hash)`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedEntityTx {
    pub tx: EntityTx,
    pub from: Signer,
    pub nonce: Nonce,
    #[serde(with = "sig_serde")]
    pub signature: Signature,
}

impl SortableTx for SignedEntityTx {
    fn nonce_key(&self) -> u64 {
        self.nonce
    }
    fn signer_key(&self) -> &Signer {
        &self.from
    }
    fn kind_key(&self) -> u8 {
        self.tx.kind()
    }
}

/// secp256k1's `Signature` has no `serde` impl; round-trip it through its
/// 64-byte compact form instead.
mod sig_serde {
    use secp256k1::ecdsa::Signature;
    use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S: Serializer>(sig: &Signature, s: S) -> Result<S::Ok, S::Error> {
        sig.serialize_compact().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Signature, D::Error> {
        let bytes = <Vec<u8>>::deserialize(d)?;
        Signature::from_compact(&bytes).map_err(D::Error::custom)
    }
}

impl Encodable for EntityTx {
    fn rlp_append(&self, s: &mut RlpStream) {
        match self {
            EntityTx::Chat { message } => {
                s.begin_list(2);
                s.append(&0u8);
                s.append(message);
            }
            EntityTx::AccountOpen { counterparty } => {
                s.begin_list(2);
                s.append(&1u8);
                s.append(counterparty);
            }
            EntityTx::JEventApply { envelope } => {
                s.begin_list(2);
                s.append(&2u8);
                s.append(envelope);
            }
            EntityTx::GossipPublish { profile } => {
                s.begin_list(2);
                s.append(&3u8);
                s.append(profile);
            }
            EntityTx::HtlcForward { account_key, hop_index } => {
                s.begin_list(3);
                s.append(&4u8);
                s.append(account_key);
                s.append(hop_index);
            }
        }
    }
}

impl Decodable for EntityTx {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        match rlp.val_at::<u8>(0)? {
            0 => Ok(EntityTx::Chat { message: rlp.val_at(1)? }),
            1 => Ok(EntityTx::AccountOpen { counterparty: rlp.val_at(1)? }),
            2 => Ok(EntityTx::JEventApply { envelope: rlp.val_at(1)? }),
            3 => Ok(EntityTx::GossipPublish { profile: rlp.val_at(1)? }),
            4 => Ok(EntityTx::HtlcForward {
                account_key: rlp.val_at(1)?,
                hop_index: rlp.val_at(2)?,
            }),
            _ => Err(DecoderError::Custom("unknown EntityTx tag")),
        }
    }
}

impl Encodable for SignedEntityTx {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(4);
        s.append(&self.tx);
        s.append(&self.from);
        s.append(&self.nonce);
        s.append(&self.signature.serialize_compact().as_ref());
    }
}

impl Decodable for SignedEntityTx {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        let sig_bytes: Vec<u8> = rlp.val_at(3)?;
        if sig_bytes.len() != 64 {
            return Err(DecoderError::RlpInvalidLength);
        }
        let mut arr = [0u8; 64];
        arr.copy_from_slice(&sig_bytes);
        let signature = Signature::from_compact(&arr)
            .map_err(|_| DecoderError::Custom("malformed signature"))?;
        Ok(SignedEntityTx {
            tx: rlp.val_at(0)?,
            from: rlp.val_at(1)?,
            nonce: rlp.val_at(2)?,
            signature,
        })
    }
}

/// The digest a signer signs and the value a frame header commits to
/// instead of the full tx body. Deliberately excludes the signature
/// field itself — hashing the already-signed struct would make signing
/// circular (you cannot sign over a digest of your own signature).
pub fn tx_hash(signed: &SignedEntityTx) -> xln_core::TxHash {
    unsigned_digest(&signed.tx, &signed.from, signed.nonce)
}

/// The exact bytes a signer signs: `rlp([tx, from, nonce])`.
pub fn unsigned_digest(tx: &EntityTx, from: &Signer, nonce: Nonce) -> xln_core::TxHash {
    let mut s = RlpStream::new();
    s.begin_list(3);
    s.append(tx);
    s.append(from);
    s.append(&nonce);
    tx_hash_of(&s.out())
}

#[cfg(test)]
mod tests {
    use super::*;
    use xln_crypto::KeyPair;

    fn sample_signed(nonce: Nonce) -> SignedEntityTx {
        let kp = KeyPair::generate();
        let tx = EntityTx::Chat { message: "hi".into() };
        let digest = unsigned_digest(&tx, &kp.signer, nonce);
        let signature = kp.sign_digest(digest.as_bytes());
        SignedEntityTx { tx, from: kp.signer, nonce, signature }
    }

    #[test]
    fn round_trips_through_rlp() {
        let signed = sample_signed(7);
        let bytes = xln_codec::encode(&signed);
        let back: SignedEntityTx = xln_codec::decode(&bytes).unwrap();
        assert_eq!(signed, back);
    }

    #[test]
    fn kind_is_stable_per_variant() {
        assert_eq!(EntityTx::Chat { message: "x".into() }.kind(), 0);
        assert_eq!(
            EntityTx::AccountOpen { counterparty: EntityId::from_bytes([1; 32]) }.kind(),
            1
        );
    }
}
