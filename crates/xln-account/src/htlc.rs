//! HTLC bookkeeping local to one account: the lock itself plus the
//! timestamp needed to judge whether a resolve arrived suspiciously
//! close to its timelock.

use serde::{Deserialize, Serialize};
use xln_codec::{Decodable, DecoderError, Encodable, Rlp, RlpStream};
use xln_core::{HtlcLock, Timestamp};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingHtlc {
    pub lock: HtlcLock,
    pub created_at: Timestamp,
}

impl Encodable for PendingHtlc {
    fn rlp_append(&self, s: &mut RlpStream) {
        s.begin_list(2);
        s.append(&self.lock);
        s.append(&(self.created_at as u64));
    }
}

impl Decodable for PendingHtlc {
    fn decode(rlp: &Rlp) -> Result<Self, DecoderError> {
        Ok(PendingHtlc {
            lock: rlp.val_at(0)?,
            created_at: rlp.val_at::<u64>(1)? as i64,
        })
    }
}
