//! Record identity hashing for cross-chain verification.
//!
//! Both chains must derive the same 32-byte record id for a transfer so the
//! mirrored side can detect re-delivery. All inputs are packed into
//! fixed-size 32-byte slots (amounts and nonces big-endian, left-padded)
//! before hashing with keccak256.
//!
//! # Record id layout (224 bytes total)
//! - Bytes 0-31:    source chain key
//! - Bytes 32-63:   destination chain key
//! - Bytes 64-95:   origin token key
//! - Bytes 96-127:  from account (left-padded)
//! - Bytes 128-159: destination account (left-padded)
//! - Bytes 160-191: digest of the (item id, amount) pairs
//! - Bytes 192-223: nonce (big-endian, left-padded)

use tiny_keccak::{Hasher, Keccak};

use crate::types::{Address, ChainId, ItemId, TokenKey};

/// Domain tag mixed into chain keys (exactly 16 bytes).
const CHAIN_KEY_TAG: &[u8; 16] = b"NFT_BRIDGE_CHAIN";

/// Compute keccak256 hash of arbitrary data
pub fn keccak256(data: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak::v256();
    hasher.update(data);
    let mut output = [0u8; 32];
    hasher.finalize(&mut output);
    output
}

/// Compute the 32-byte key identifying a chain.
///
/// Layout before hashing (64 bytes): the domain tag in bytes 0-15, zeros up
/// to byte 55, then the chain id big-endian in bytes 56-63.
pub fn chain_key(chain: ChainId) -> [u8; 32] {
    let mut data = [0u8; 64];
    data[0..16].copy_from_slice(CHAIN_KEY_TAG);
    data[56..64].copy_from_slice(&chain.0.to_be_bytes());
    keccak256(&data)
}

/// Encode a 20-byte address as 32 bytes (left-padded with zeros).
pub fn encode_address(addr: &Address) -> [u8; 32] {
    let mut out = [0u8; 32];
    out[12..32].copy_from_slice(addr.as_bytes());
    out
}

/// Encode a token identity as a 32-byte key.
///
/// Hashes the 8-byte big-endian chain id followed by the 20-byte address,
/// so the same contract address on different chains yields distinct keys.
pub fn encode_token(token: &TokenKey) -> [u8; 32] {
    let mut data = [0u8; 28];
    data[0..8].copy_from_slice(&token.chain.0.to_be_bytes());
    data[8..28].copy_from_slice(token.address.as_bytes());
    keccak256(&data)
}

/// Deterministic address for the pegged counterpart of an origin token.
///
/// Takes the last 20 bytes of the origin's token key hash, so both sides
/// can derive the pegged collection address without coordination.
pub fn mirror_address(origin: &TokenKey) -> Address {
    let digest = encode_token(origin);
    let mut out = [0u8; 20];
    out.copy_from_slice(&digest[12..32]);
    Address(out)
}

/// Digest of a batch of (item id, amount) pairs.
///
/// Each pair occupies one 32-byte slot: item id big-endian in bytes 0-15,
/// amount big-endian in bytes 16-31. Pair order is significant.
pub fn items_digest(item_ids: &[ItemId], amounts: &[u128]) -> [u8; 32] {
    let mut data = vec![0u8; item_ids.len() * 32];
    for (i, (item_id, amount)) in item_ids.iter().zip(amounts.iter()).enumerate() {
        let slot = &mut data[i * 32..(i + 1) * 32];
        slot[0..16].copy_from_slice(&item_id.to_be_bytes());
        slot[16..32].copy_from_slice(&amount.to_be_bytes());
    }
    keccak256(&data)
}

/// Compute the canonical record id for a cross-chain transfer.
#[allow(clippy::too_many_arguments)]
pub fn compute_record_id(
    src_chain: ChainId,
    dest_chain: ChainId,
    token: &TokenKey,
    from_account: &Address,
    to_account: &Address,
    item_ids: &[ItemId],
    amounts: &[u128],
    nonce: u64,
) -> [u8; 32] {
    // 7 * 32 = 224 bytes
    let mut data = [0u8; 224];

    data[0..32].copy_from_slice(&chain_key(src_chain));
    data[32..64].copy_from_slice(&chain_key(dest_chain));
    data[64..96].copy_from_slice(&encode_token(token));
    data[96..128].copy_from_slice(&encode_address(from_account));
    data[128..160].copy_from_slice(&encode_address(to_account));
    data[160..192].copy_from_slice(&items_digest(item_ids, amounts));

    // nonce as uint256, big-endian, left-padded
    data[192 + 24..224].copy_from_slice(&nonce.to_be_bytes());

    keccak256(&data)
}

/// Convert 32-byte hash to hex string (for attributes/logging)
pub fn bytes32_to_hex(bytes: &[u8; 32]) -> String {
    format!("0x{}", hex::encode(bytes))
}

/// Parse hex string (with or without 0x prefix) to 32-byte array
pub fn hex_to_bytes32(s: &str) -> Result<[u8; 32], &'static str> {
    let s = s.strip_prefix("0x").unwrap_or(s);
    if s.len() != 64 {
        return Err("Invalid hex length: expected 64 characters");
    }
    let bytes = hex::decode(s).map_err(|_| "Invalid hex character")?;
    let mut out = [0u8; 32];
    out.copy_from_slice(&bytes);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// keccak256("hello") is a well-known vector.
    #[test]
    fn test_keccak256_basic() {
        let result = keccak256(b"hello");
        assert_eq!(
            bytes32_to_hex(&result),
            "0x1c8aff950685c2ed4bc3174f3472287b56d9517b9c948127319a09a7a36deac8"
        );
    }

    /// keccak256 of the empty input.
    #[test]
    fn test_keccak256_empty() {
        let result = keccak256(b"");
        assert_eq!(
            bytes32_to_hex(&result),
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470"
        );
    }

    #[test]
    fn test_hex_roundtrip() {
        let original = keccak256(b"roundtrip");
        let hex = bytes32_to_hex(&original);
        assert_eq!(hex_to_bytes32(&hex).unwrap(), original);
        assert_eq!(hex_to_bytes32(&hex[2..]).unwrap(), original);
    }

    #[test]
    fn test_hex_bad_input() {
        assert!(hex_to_bytes32("0x1234").is_err());
        assert!(hex_to_bytes32(&"zz".repeat(32)).is_err());
    }

    #[test]
    fn test_encode_address_left_padded() {
        let addr = Address([0xab; 20]);
        let encoded = encode_address(&addr);
        assert_eq!(&encoded[0..12], &[0u8; 12]);
        assert_eq!(&encoded[12..32], &[0xab; 20]);
    }

    #[test]
    fn test_chain_key_distinct_per_chain() {
        assert_ne!(chain_key(ChainId(1)), chain_key(ChainId(2)));
    }

    #[test]
    fn test_token_key_distinct_per_chain() {
        let addr = Address([0x11; 20]);
        let a = TokenKey::new(ChainId(1), addr);
        let b = TokenKey::new(ChainId(2), addr);
        assert_ne!(encode_token(&a), encode_token(&b));
    }

    #[test]
    fn test_mirror_address_deterministic() {
        let origin = TokenKey::new(ChainId(1), Address([0x22; 20]));
        assert_eq!(mirror_address(&origin), mirror_address(&origin));
        let other = TokenKey::new(ChainId(2), Address([0x22; 20]));
        assert_ne!(mirror_address(&origin), mirror_address(&other));
    }

    #[test]
    fn test_items_digest_order_sensitive() {
        let a = items_digest(&[1, 2], &[1, 1]);
        let b = items_digest(&[2, 1], &[1, 1]);
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_id_nonce_sensitive() {
        let token = TokenKey::new(ChainId(1), Address([0x33; 20]));
        let from = Address([0x44; 20]);
        let to = Address([0x55; 20]);
        let a = compute_record_id(ChainId(1), ChainId(2), &token, &from, &to, &[7], &[1], 0);
        let b = compute_record_id(ChainId(1), ChainId(2), &token, &from, &to, &[7], &[1], 1);
        assert_ne!(a, b);
    }

    #[test]
    fn test_record_id_deterministic() {
        let token = TokenKey::new(ChainId(1), Address([0x33; 20]));
        let from = Address([0x44; 20]);
        let to = Address([0x55; 20]);
        let a = compute_record_id(ChainId(1), ChainId(2), &token, &from, &to, &[7, 8], &[1, 2], 3);
        let b = compute_record_id(ChainId(1), ChainId(2), &token, &from, &to, &[7, 8], &[1, 2], 3);
        assert_eq!(a, b);
    }
}
