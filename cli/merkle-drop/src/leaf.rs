//! Leaf encoding.
//!
//! Leaf formula: `keccak256(address[20] || amount_be[32])`, tightly packed.
//! The on-chain verifier MUST derive leaves with exactly this layout and hash,
//! otherwise every proof produced here silently fails to verify.

use crate::common::{keccak256, Hash};
use crate::record::Record;

/// Length of the packed leaf preimage: 20-byte address + 32-byte amount.
pub const LEAF_PREIMAGE_LEN: usize = 52;

/// Packs a record as `address || amount` with no padding.
pub fn leaf_preimage(record: &Record) -> [u8; LEAF_PREIMAGE_LEN] {
    let mut packed = [0u8; LEAF_PREIMAGE_LEN];
    packed[..20].copy_from_slice(record.address.as_bytes());
    record.amount.to_big_endian(&mut packed[20..]);
    packed
}

/// Encodes one record into its tree leaf.
pub fn encode(record: &Record) -> Hash {
    keccak256(&leaf_preimage(record))
}
