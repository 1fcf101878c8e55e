//! Canonical RLP encode/decode and the Merkle tree used everywhere a
//! consensus-visible hash is computed.
//!
//! Built on the `rlp` crate's own `Encodable`/`Decodable`/`RlpStream`
//! idiom, with every wire-visible value given its own small module.

pub mod merkle;

pub use rlp::{Decodable, DecoderError, Encodable, Rlp, RlpStream};

/// Encode any RLP-encodable value to its canonical byte representation.
pub fn encode<T: Encodable>(value: &T) -> Vec<u8> {
    rlp::encode(value).to_vec()
}

/// Decode canonical bytes back into `T`.
pub fn decode<T: Decodable>(bytes: &[u8]) -> Result<T, DecoderError> {
    rlp::decode(bytes)
}

/// Encode a list of `(key, value)` pairs whose keys are already
/// comparable bytes, sorted ascending before encoding, so every caller
/// that hashes a table (signer nonces, per-token deltas, ...) gets the
/// same canonical bytes regardless of insertion order.
pub fn rlp_encode_sorted_map<K, V>(stream: &mut RlpStream, mut entries: Vec<(K, V)>)
where
    K: AsRef<[u8]> + Ord,
    V: Encodable,
{
    entries.sort_by(|a, b| a.0.as_ref().cmp(b.0.as_ref()));
    stream.begin_list(entries.len());
    for (k, v) in &entries {
        stream.begin_list(2);
        stream.append(&k.as_ref());
        stream.append(v);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip_u64() {
        let v: u64 = 123_456_789;
        let bytes = encode(&v);
        let back: u64 = decode(&bytes).unwrap();
        assert_eq!(v, back);
    }

    #[test]
    fn sorted_map_is_order_independent() {
        let mut s1 = RlpStream::new();
        rlp_encode_sorted_map(&mut s1, vec![(b"b".to_vec(), 2u64), (b"a".to_vec(), 1u64)]);
        let mut s2 = RlpStream::new();
        rlp_encode_sorted_map(&mut s2, vec![(b"a".to_vec(), 1u64), (b"b".to_vec(), 2u64)]);
        assert_eq!(s1.out(), s2.out());
    }
}
