//! RLP Encoding and Decoding
//!
//! Minimal recursive-length-prefix codec used for the wire format of batch-call
//! transaction envelopes. Integers are encoded as minimal big-endian byte
//! strings (no leading zeros); lists nest arbitrarily.

use thiserror::Error;

/// Errors produced while decoding RLP input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RlpError {
    /// Input ended before the announced payload length
    #[error("unexpected end of RLP input")]
    UnexpectedEnd,
    /// Bytes remained after the top-level item was decoded
    #[error("trailing bytes after RLP item")]
    TrailingBytes,
    /// A length prefix did not fit in usize
    #[error("RLP length prefix overflow")]
    LengthOverflow,
    /// A byte string was used where a list was expected, or vice versa
    #[error("unexpected RLP item type: expected {expected}")]
    UnexpectedType { expected: &'static str },
    /// An integer field was longer than its target width
    #[error("RLP integer too long: {actual} bytes (max {max})")]
    IntegerTooLong { actual: usize, max: usize },
    /// The input used a non-minimal encoding for its value
    #[error("non-canonical RLP encoding")]
    NonCanonical,
}

/// A decoded RLP item: either a byte string or a list of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Item {
    Bytes(Vec<u8>),
    List(Vec<Item>),
}

impl Item {
    /// Returns the byte-string payload, or an error for a list item.
    pub fn bytes(&self) -> Result<&[u8], RlpError> {
        match self {
            Item::Bytes(b) => Ok(b),
            Item::List(_) => Err(RlpError::UnexpectedType { expected: "bytes" }),
        }
    }

    /// Returns the list elements, or an error for a byte-string item.
    pub fn list(&self) -> Result<&[Item], RlpError> {
        match self {
            Item::List(items) => Ok(items),
            Item::Bytes(_) => Err(RlpError::UnexpectedType { expected: "list" }),
        }
    }

    /// Interprets the item as a minimal big-endian u64, rejecting
    /// zero-padded encodings.
    pub fn as_u64(&self) -> Result<u64, RlpError> {
        let bytes = self.bytes()?;
        if bytes.len() > 8 {
            return Err(RlpError::IntegerTooLong {
                actual: bytes.len(),
                max: 8,
            });
        }
        if bytes.first() == Some(&0) {
            return Err(RlpError::NonCanonical);
        }
        let mut value = 0u64;
        for &b in bytes {
            value = (value << 8) | b as u64;
        }
        Ok(value)
    }

    /// Interprets the item as a minimal big-endian u128, rejecting
    /// zero-padded encodings.
    pub fn as_u128(&self) -> Result<u128, RlpError> {
        let bytes = self.bytes()?;
        if bytes.len() > 16 {
            return Err(RlpError::IntegerTooLong {
                actual: bytes.len(),
                max: 16,
            });
        }
        if bytes.first() == Some(&0) {
            return Err(RlpError::NonCanonical);
        }
        let mut value = 0u128;
        for &b in bytes {
            value = (value << 8) | b as u128;
        }
        Ok(value)
    }

    /// Interprets the item as a fixed-width byte array, left-padding short
    /// (minimally encoded) values with zeros.
    pub fn as_fixed<const N: usize>(&self) -> Result<[u8; N], RlpError> {
        let bytes = self.bytes()?;
        if bytes.len() > N {
            return Err(RlpError::IntegerTooLong {
                actual: bytes.len(),
                max: N,
            });
        }
        let mut out = [0u8; N];
        out[N - bytes.len()..].copy_from_slice(bytes);
        Ok(out)
    }
}

// ============================================================================
// ENCODING
// ============================================================================

fn length_to_bytes(len: usize) -> Vec<u8> {
    let mut value = len;
    let mut bytes = Vec::new();
    while value > 0 {
        bytes.push((value & 0xff) as u8);
        value >>= 8;
    }
    bytes.reverse();
    if bytes.is_empty() {
        vec![0]
    } else {
        bytes
    }
}

/// Encodes a byte string.
pub fn encode_bytes(data: &[u8]) -> Vec<u8> {
    match data.len() {
        0 => vec![0x80],
        1 if data[0] < 0x80 => vec![data[0]],
        len if len <= 55 => {
            let mut out = Vec::with_capacity(1 + len);
            out.push(0x80 + len as u8);
            out.extend_from_slice(data);
            out
        }
        len => {
            let len_bytes = length_to_bytes(len);
            let mut out = Vec::with_capacity(1 + len_bytes.len() + len);
            out.push(0xb7 + len_bytes.len() as u8);
            out.extend_from_slice(&len_bytes);
            out.extend_from_slice(data);
            out
        }
    }
}

/// Encodes an unsigned integer as a minimal big-endian byte string.
pub fn encode_u64(value: u64) -> Vec<u8> {
    encode_bytes(&trim_leading_zeros(&value.to_be_bytes()))
}

/// Encodes an unsigned 128-bit integer as a minimal big-endian byte string.
pub fn encode_u128(value: u128) -> Vec<u8> {
    encode_bytes(&trim_leading_zeros(&value.to_be_bytes()))
}

/// Encodes a list from already-encoded item payloads.
pub fn encode_list(items: &[Vec<u8>]) -> Vec<u8> {
    let total_len: usize = items.iter().map(|item| item.len()).sum();
    if total_len <= 55 {
        let mut out = Vec::with_capacity(1 + total_len);
        out.push(0xc0 + total_len as u8);
        for item in items {
            out.extend_from_slice(item);
        }
        out
    } else {
        let len_bytes = length_to_bytes(total_len);
        let mut out = Vec::with_capacity(1 + len_bytes.len() + total_len);
        out.push(0xf7 + len_bytes.len() as u8);
        out.extend_from_slice(&len_bytes);
        for item in items {
            out.extend_from_slice(item);
        }
        out
    }
}

fn trim_leading_zeros(data: &[u8]) -> Vec<u8> {
    let start = data.iter().position(|&b| b != 0).unwrap_or(data.len());
    data[start..].to_vec()
}

// ============================================================================
// DECODING
// ============================================================================

/// Decodes a single top-level RLP item, requiring the full input be consumed.
///
/// Only canonical encodings are accepted: single bytes below 0x80 must encode
/// as themselves, the long form is rejected for payloads that fit the short
/// form, and length prefixes must carry no leading zeros. Two distinct byte
/// strings therefore never decode to the same structure.
pub fn decode(input: &[u8]) -> Result<Item, RlpError> {
    let (item, consumed) = decode_item(input)?;
    if consumed != input.len() {
        return Err(RlpError::TrailingBytes);
    }
    Ok(item)
}

fn read_length(input: &[u8], len_of_len: usize) -> Result<usize, RlpError> {
    if input.len() < len_of_len {
        return Err(RlpError::UnexpectedEnd);
    }
    if len_of_len > std::mem::size_of::<usize>() {
        return Err(RlpError::LengthOverflow);
    }
    let mut len = 0usize;
    for &b in &input[..len_of_len] {
        len = len
            .checked_mul(256)
            .and_then(|v| v.checked_add(b as usize))
            .ok_or(RlpError::LengthOverflow)?;
    }
    Ok(len)
}

fn decode_item(input: &[u8]) -> Result<(Item, usize), RlpError> {
    let first = *input.first().ok_or(RlpError::UnexpectedEnd)?;
    match first {
        0x00..=0x7f => Ok((Item::Bytes(vec![first]), 1)),
        0x80..=0xb7 => {
            let len = (first - 0x80) as usize;
            if input.len() < 1 + len {
                return Err(RlpError::UnexpectedEnd);
            }
            if len == 1 && input[1] < 0x80 {
                return Err(RlpError::NonCanonical);
            }
            Ok((Item::Bytes(input[1..1 + len].to_vec()), 1 + len))
        }
        0xb8..=0xbf => {
            let len_of_len = (first - 0xb7) as usize;
            let len = read_length(&input[1..], len_of_len)?;
            if len <= 55 || input[1] == 0 {
                return Err(RlpError::NonCanonical);
            }
            let start = 1 + len_of_len;
            if input.len() < start + len {
                return Err(RlpError::UnexpectedEnd);
            }
            Ok((Item::Bytes(input[start..start + len].to_vec()), start + len))
        }
        0xc0..=0xf7 => {
            let len = (first - 0xc0) as usize;
            decode_list_payload(input, 1, len)
        }
        0xf8..=0xff => {
            let len_of_len = (first - 0xf7) as usize;
            let len = read_length(&input[1..], len_of_len)?;
            if len <= 55 || input[1] == 0 {
                return Err(RlpError::NonCanonical);
            }
            decode_list_payload(input, 1 + len_of_len, len)
        }
    }
}

fn decode_list_payload(
    input: &[u8],
    start: usize,
    len: usize,
) -> Result<(Item, usize), RlpError> {
    if input.len() < start + len {
        return Err(RlpError::UnexpectedEnd);
    }
    let payload = &input[start..start + len];
    let mut items = Vec::new();
    let mut offset = 0;
    while offset < payload.len() {
        let (item, consumed) = decode_item(&payload[offset..])?;
        items.push(item);
        offset += consumed;
    }
    Ok((Item::List(items), start + len))
}
