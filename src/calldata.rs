//! Call-Data Encoding Module
//!
//! ABI encoding for the contract calls the pipeline issues: token approval
//! and transfer on the stable-token contract, and pool creation / claim /
//! refund on the PacketPool contract. Encoding is selector + 32-byte words.

use crate::crypto::keccak256;
use crate::envelope::Address;

/// Maximum memo length in bytes.
///
/// The memo shares a single 32-byte field with the banner selector byte:
/// `banner_id || memo || zero padding`.
pub const MEMO_MAX_BYTES: usize = 31;

/// First four bytes of the Keccak-256 hash of the function signature.
fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn pad_address(address: &Address) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[12..].copy_from_slice(address.as_bytes());
    word
}

fn pad_u128(value: u128) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn pad_u8(value: u8) -> [u8; 32] {
    let mut word = [0u8; 32];
    word[31] = value;
    word
}

/// Packs the banner selector byte and the memo into one `bytes32` word.
///
/// Returns `None` when the memo exceeds [`MEMO_MAX_BYTES`].
pub fn pack_memo(memo: &str, banner_id: u8) -> Option<[u8; 32]> {
    let memo_bytes = memo.as_bytes();
    if memo_bytes.len() > MEMO_MAX_BYTES {
        return None;
    }
    let mut word = [0u8; 32];
    word[0] = banner_id;
    word[1..1 + memo_bytes.len()].copy_from_slice(memo_bytes);
    Some(word)
}

/// `approve(address,uint256)` on the token contract.
pub fn encode_approve(spender: &Address, amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&selector("approve(address,uint256)"));
    data.extend_from_slice(&pad_address(spender));
    data.extend_from_slice(&pad_u128(amount));
    data
}

/// `transfer(address,uint256)` on the token contract.
pub fn encode_transfer(to: &Address, amount: u128) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 64);
    data.extend_from_slice(&selector("transfer(address,uint256)"));
    data.extend_from_slice(&pad_address(to));
    data.extend_from_slice(&pad_u128(amount));
    data
}

/// `createPool(uint256,uint8,bytes32)` on the pool contract.
///
/// `memo_and_banner` is the packed word from [`pack_memo`].
pub fn encode_create_pool(amount: u128, shares: u8, memo_and_banner: [u8; 32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 96);
    data.extend_from_slice(&selector("createPool(uint256,uint8,bytes32)"));
    data.extend_from_slice(&pad_u128(amount));
    data.extend_from_slice(&pad_u8(shares));
    data.extend_from_slice(&memo_and_banner);
    data
}

/// `claim(bytes32)` on the pool contract.
pub fn encode_claim(pool_id: [u8; 32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector("claim(bytes32)"));
    data.extend_from_slice(&pool_id);
    data
}

/// `refund(bytes32)` on the pool contract.
pub fn encode_refund(pool_id: [u8; 32]) -> Vec<u8> {
    let mut data = Vec::with_capacity(4 + 32);
    data.extend_from_slice(&selector("refund(bytes32)"));
    data.extend_from_slice(&pool_id);
    data
}
