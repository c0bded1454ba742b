//! Transaction Envelope Module
//!
//! Defines the batch-call transaction envelope (type `0x76`), the canonical
//! sign-payload derivation for the standard and fee-payer signing modes, and
//! the wire serialization used by `eth_sendRawTransaction`.
//!
//! Wire layout: `0x76 || rlp([chain_id, nonce, max_priority_fee_per_gas,
//! max_fee_per_gas, gas, fee_token, calls, y_parity, r, s])`, with three more
//! items (`fp_y_parity, fp_r, fp_s`) appended when a fee payer co-signs.
//! `calls` is a list of `[to, value, data]` triples; call order is preserved
//! end-to-end and determines execution order on-chain.

use std::fmt;

use thiserror::Error;

use crate::crypto::{keccak256, AttributedSignature, SignatureParts};
use crate::rlp::{self, RlpError};

/// Transaction type byte for batch-call envelopes.
pub const TX_TYPE: u8 = 0x76;

/// Trailing marker of a sponsor-tagged transaction (`feefeefeefee`).
pub const SPONSOR_MAGIC: [u8; 6] = [0xfe, 0xef, 0xee, 0xfe, 0xef, 0xee];

/// Errors produced by envelope encoding, decoding, and sponsor tagging.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("serialized transaction does not start with type byte 0x76")]
    BadTypeByte,
    #[error("serialized transaction has {actual} items (expected 10 or 13)")]
    WrongItemCount { actual: usize },
    #[error("envelope carries no calls")]
    EmptyCalls,
    #[error("sponsor tag missing or malformed")]
    MissingSponsorTag,
    #[error("signature signed under {actual:?} mode where {expected:?} was required")]
    ModeMismatch {
        expected: SigningMode,
        actual: SigningMode,
    },
    #[error("invalid signature parity: {actual} (expected 0 or 1)")]
    InvalidParity { actual: u64 },
    #[error("RLP error: {0}")]
    Rlp(#[from] RlpError),
}

// ============================================================================
// CORE TYPES
// ============================================================================

/// A 20-byte account or contract address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Address(pub [u8; 20]);

impl Address {
    /// Parses a `0x`-prefixed (or bare) 40-hex-char address.
    pub fn from_hex(value: &str) -> Result<Self, CodecError> {
        let stripped = value.strip_prefix("0x").unwrap_or(value);
        let bytes =
            hex::decode(stripped).map_err(|_| CodecError::InvalidAddress(value.to_string()))?;
        if bytes.len() != 20 {
            return Err(CodecError::InvalidAddress(value.to_string()));
        }
        let mut out = [0u8; 20];
        out.copy_from_slice(&bytes);
        Ok(Address(out))
    }

    pub fn as_bytes(&self) -> &[u8; 20] {
        &self.0
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

/// A single on-chain invocation inside a batch envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    /// Target contract address
    pub to: Address,
    /// Native value attached to the call (always 0 for Packet flows)
    pub value: u128,
    /// ABI-encoded call data
    pub data: Vec<u8>,
}

/// An unsigned batch-call transaction envelope.
///
/// Built once per pipeline run; signatures are attached at serialization time
/// rather than mutating the envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxEnvelope {
    pub chain_id: u64,
    pub nonce: u64,
    pub max_priority_fee_per_gas: u128,
    pub max_fee_per_gas: u128,
    pub gas: u64,
    /// Token in which the transaction fee is denominated
    pub fee_token: Address,
    /// Ordered, non-empty sequence of calls
    pub calls: Vec<Call>,
}

/// The two signing modes over an envelope.
///
/// A standard-mode hash authorizes the envelope with the sender paying their
/// own fee; a fee-payer-mode hash authorizes covering the fee for a given
/// sender. The two preimages differ structurally (the fee-payer preimage
/// additionally commits to the sender address), so the hashes can never
/// coincide for the same envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningMode {
    Standard,
    FeePayer,
}

/// A derived sign payload tagged with the mode it was derived under.
///
/// Signers consume this value whole, and the serializer checks the mode when
/// a signature is attached, so a standard hash cannot be smuggled into the
/// fee-payer slot (or vice versa) by caller mistake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignPayload {
    pub hash: [u8; 32],
    pub mode: SigningMode,
}

/// A deserialized, signed transaction as recovered from wire bytes.
#[derive(Debug, Clone)]
pub struct SignedEnvelope {
    pub envelope: TxEnvelope,
    pub user_signature: SignatureParts,
    pub fee_payer_signature: Option<SignatureParts>,
}

// ============================================================================
// SIGN-PAYLOAD DERIVATION AND SERIALIZATION
// ============================================================================

impl TxEnvelope {
    /// RLP items for the unsigned body, in wire order.
    fn unsigned_items(&self) -> Vec<Vec<u8>> {
        let calls: Vec<Vec<u8>> = self
            .calls
            .iter()
            .map(|call| {
                rlp::encode_list(&[
                    rlp::encode_bytes(call.to.as_bytes()),
                    rlp::encode_u128(call.value),
                    rlp::encode_bytes(&call.data),
                ])
            })
            .collect();

        vec![
            rlp::encode_u64(self.chain_id),
            rlp::encode_u64(self.nonce),
            rlp::encode_u128(self.max_priority_fee_per_gas),
            rlp::encode_u128(self.max_fee_per_gas),
            rlp::encode_u64(self.gas),
            rlp::encode_bytes(self.fee_token.as_bytes()),
            rlp::encode_list(&calls),
        ]
    }

    fn preimage(&self, sender: Option<&Address>) -> Vec<u8> {
        let mut items = self.unsigned_items();
        if let Some(sender) = sender {
            items.push(rlp::encode_bytes(sender.as_bytes()));
        }
        let body = rlp::encode_list(&items);
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(TX_TYPE);
        out.extend_from_slice(&body);
        out
    }

    /// Derives the hash the sender signs when paying their own fee.
    pub fn sign_payload_standard(&self) -> SignPayload {
        SignPayload {
            hash: keccak256(&self.preimage(None)),
            mode: SigningMode::Standard,
        }
    }

    /// Derives the hash a fee payer signs to cover the fee for `sender`.
    ///
    /// The sender address is part of the preimage even though the sender's
    /// own signature is not: the fee payer commits to exactly whose
    /// transaction it is sponsoring.
    pub fn sign_payload_fee_payer(&self, sender: &Address) -> SignPayload {
        SignPayload {
            hash: keccak256(&self.preimage(Some(sender))),
            mode: SigningMode::FeePayer,
        }
    }

    /// Serializes the envelope with its signature(s) into wire bytes.
    ///
    /// The user signature must have been produced under `Standard` mode and
    /// the fee-payer signature (when present) under `FeePayer` mode;
    /// attaching a signature from the wrong mode is rejected rather than
    /// producing a transaction the chain would misattribute.
    pub fn serialize_signed(
        &self,
        user: &AttributedSignature,
        fee_payer: Option<&AttributedSignature>,
    ) -> Result<Vec<u8>, CodecError> {
        if self.calls.is_empty() {
            return Err(CodecError::EmptyCalls);
        }
        if user.mode != SigningMode::Standard {
            return Err(CodecError::ModeMismatch {
                expected: SigningMode::Standard,
                actual: user.mode,
            });
        }
        if let Some(fp) = fee_payer {
            if fp.mode != SigningMode::FeePayer {
                return Err(CodecError::ModeMismatch {
                    expected: SigningMode::FeePayer,
                    actual: fp.mode,
                });
            }
        }

        let mut items = self.unsigned_items();
        push_signature_items(&mut items, &user.parts);
        if let Some(fp) = fee_payer {
            push_signature_items(&mut items, &fp.parts);
        }

        let body = rlp::encode_list(&items);
        let mut out = Vec::with_capacity(1 + body.len());
        out.push(TX_TYPE);
        out.extend_from_slice(&body);
        Ok(out)
    }

    /// Decodes wire bytes back into an envelope plus its signature(s).
    ///
    /// Accepts both the self-paid form (10 items) and the sponsored form
    /// (13 items).
    pub fn deserialize(bytes: &[u8]) -> Result<SignedEnvelope, CodecError> {
        let (first, body) = bytes.split_first().ok_or(CodecError::BadTypeByte)?;
        if *first != TX_TYPE {
            return Err(CodecError::BadTypeByte);
        }

        let decoded = rlp::decode(body)?;
        let items = decoded.list()?;
        if items.len() != 10 && items.len() != 13 {
            return Err(CodecError::WrongItemCount {
                actual: items.len(),
            });
        }

        let mut calls = Vec::new();
        for entry in items[6].list()? {
            let fields = entry.list()?;
            if fields.len() != 3 {
                return Err(CodecError::WrongItemCount {
                    actual: fields.len(),
                });
            }
            calls.push(Call {
                to: Address(fields[0].as_fixed()?),
                value: fields[1].as_u128()?,
                data: fields[2].bytes()?.to_vec(),
            });
        }
        if calls.is_empty() {
            return Err(CodecError::EmptyCalls);
        }

        let envelope = TxEnvelope {
            chain_id: items[0].as_u64()?,
            nonce: items[1].as_u64()?,
            max_priority_fee_per_gas: items[2].as_u128()?,
            max_fee_per_gas: items[3].as_u128()?,
            gas: items[4].as_u64()?,
            fee_token: Address(items[5].as_fixed()?),
            calls,
        };

        let user_signature = decode_signature_items(&items[7..10])?;
        let fee_payer_signature = if items.len() == 13 {
            Some(decode_signature_items(&items[10..13])?)
        } else {
            None
        };

        Ok(SignedEnvelope {
            envelope,
            user_signature,
            fee_payer_signature,
        })
    }
}

fn push_signature_items(items: &mut Vec<Vec<u8>>, sig: &SignatureParts) {
    items.push(rlp::encode_u64(sig.y_parity as u64));
    items.push(rlp::encode_bytes(&trim_word(&sig.r)));
    items.push(rlp::encode_bytes(&trim_word(&sig.s)));
}

fn decode_signature_items(items: &[rlp::Item]) -> Result<SignatureParts, CodecError> {
    let y_parity = items[0].as_u64()?;
    if y_parity > 1 {
        return Err(CodecError::InvalidParity { actual: y_parity });
    }
    Ok(SignatureParts {
        y_parity: y_parity as u8,
        r: items[1].as_fixed()?,
        s: items[2].as_fixed()?,
    })
}

fn trim_word(word: &[u8; 32]) -> Vec<u8> {
    let start = word.iter().position(|&b| b != 0).unwrap_or(word.len());
    word[start..].to_vec()
}

// ============================================================================
// SPONSOR TAGGING
// ============================================================================

/// Appends `sender || feefeefeefee` to a serialized user-signed transaction.
///
/// The suffix carries the sender address across the service boundary so the
/// sponsorship service never has to recover it from the signature.
pub fn tag_for_sponsorship(serialized: &[u8], sender: &Address) -> Vec<u8> {
    let mut out = Vec::with_capacity(serialized.len() + 26);
    out.extend_from_slice(serialized);
    out.extend_from_slice(sender.as_bytes());
    out.extend_from_slice(&SPONSOR_MAGIC);
    out
}

/// Splits a sponsor-tagged transaction into the raw serialized transaction
/// and the embedded sender address.
///
/// Rejects input whose trailing 6 bytes are not the exact magic marker; no
/// other channel is trusted for the sender address.
pub fn split_sponsor_tag(tagged: &[u8]) -> Result<(Vec<u8>, Address), CodecError> {
    if tagged.len() < 27 {
        return Err(CodecError::MissingSponsorTag);
    }
    let (rest, magic) = tagged.split_at(tagged.len() - 6);
    if magic != SPONSOR_MAGIC {
        return Err(CodecError::MissingSponsorTag);
    }
    let (tx, sender_bytes) = rest.split_at(rest.len() - 20);
    let mut sender = [0u8; 20];
    sender.copy_from_slice(sender_bytes);
    Ok((tx.to_vec(), Address(sender)))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_envelope() -> TxEnvelope {
        TxEnvelope {
            chain_id: 5700,
            nonce: 7,
            max_priority_fee_per_gas: 1_000_000_000,
            max_fee_per_gas: 3_000_000_000,
            gas: 210_000,
            fee_token: Address([0x11; 20]),
            calls: vec![
                Call {
                    to: Address([0x22; 20]),
                    value: 0,
                    data: vec![0xde, 0xad, 0xbe, 0xef],
                },
                Call {
                    to: Address([0x33; 20]),
                    value: 0,
                    data: vec![0xca, 0xfe],
                },
            ],
        }
    }

    fn test_signature(fill: u8, y_parity: u8) -> SignatureParts {
        SignatureParts {
            r: [fill; 32],
            s: [fill.wrapping_add(1); 32],
            y_parity,
        }
    }

    /// What is tested: serialize → deserialize reproduces every envelope field
    /// Why: field corruption through the encode/decode boundary would produce
    /// valid-looking but wrong transactions
    #[test]
    fn test_serialize_round_trip() {
        let envelope = test_envelope();
        let user = AttributedSignature::standard(test_signature(0x44, 1));

        let bytes = envelope.serialize_signed(&user, None).unwrap();
        assert_eq!(bytes[0], TX_TYPE);

        let decoded = TxEnvelope::deserialize(&bytes).unwrap();
        assert_eq!(decoded.envelope, envelope);
        assert_eq!(decoded.user_signature, user.parts);
        assert!(decoded.fee_payer_signature.is_none());
    }

    /// What is tested: dual-signature round trip keeps the user signature
    /// byte-identical and carries the fee-payer signature separately
    /// Why: re-signing would invalidate the user's approval of the envelope
    #[test]
    fn test_dual_signature_round_trip() {
        let envelope = test_envelope();
        let user = AttributedSignature::standard(test_signature(0x44, 0));
        let fee_payer = AttributedSignature::fee_payer(test_signature(0x55, 1));

        let bytes = envelope.serialize_signed(&user, Some(&fee_payer)).unwrap();
        let decoded = TxEnvelope::deserialize(&bytes).unwrap();

        assert_eq!(decoded.envelope.calls, envelope.calls);
        assert_eq!(decoded.user_signature, user.parts);
        assert_eq!(decoded.fee_payer_signature, Some(fee_payer.parts));
    }

    /// What is tested: the two signing modes yield different payloads, and
    /// every envelope field perturbs the standard payload
    /// Why: mode coupling is the most safety-critical contract in the system
    #[test]
    fn test_sign_payload_mode_and_field_sensitivity() {
        let envelope = test_envelope();
        let sender = Address([0x99; 20]);

        let standard = envelope.sign_payload_standard();
        let fee_payer = envelope.sign_payload_fee_payer(&sender);
        assert_ne!(standard.hash, fee_payer.hash);
        assert_eq!(standard.mode, SigningMode::Standard);
        assert_eq!(fee_payer.mode, SigningMode::FeePayer);

        let mut changed = envelope.clone();
        changed.nonce += 1;
        assert_ne!(changed.sign_payload_standard().hash, standard.hash);

        let mut changed = envelope.clone();
        changed.gas += 1;
        assert_ne!(changed.sign_payload_standard().hash, standard.hash);

        let mut changed = envelope.clone();
        changed.max_fee_per_gas += 1;
        assert_ne!(changed.sign_payload_standard().hash, standard.hash);

        let mut changed = envelope.clone();
        changed.calls[0].data.push(0x00);
        assert_ne!(changed.sign_payload_standard().hash, standard.hash);

        let mut changed = envelope.clone();
        changed.calls[1].to = Address([0x34; 20]);
        assert_ne!(changed.sign_payload_standard().hash, standard.hash);
    }

    /// What is tested: fee-payer payloads over the same envelope differ per
    /// sender
    /// Why: the fee payer commits to whose transaction it sponsors
    #[test]
    fn test_fee_payer_payload_commits_to_sender() {
        let envelope = test_envelope();
        let a = envelope.sign_payload_fee_payer(&Address([0x01; 20]));
        let b = envelope.sign_payload_fee_payer(&Address([0x02; 20]));
        assert_ne!(a.hash, b.hash);
    }

    /// What is tested: payload derivation is deterministic
    /// Why: the user and the sponsorship service must derive identical hashes
    #[test]
    fn test_sign_payload_deterministic() {
        let envelope = test_envelope();
        assert_eq!(
            envelope.sign_payload_standard().hash,
            envelope.clone().sign_payload_standard().hash
        );
    }

    fn wire_with_parity(parity: u64) -> Vec<u8> {
        let mut items = test_envelope().unsigned_items();
        items.push(rlp::encode_u64(parity));
        items.push(rlp::encode_bytes(&[0x44; 32]));
        items.push(rlp::encode_bytes(&[0x55; 32]));
        let body = rlp::encode_list(&items);
        let mut out = vec![TX_TYPE];
        out.extend_from_slice(&body);
        out
    }

    /// What is tested: parity items outside {0, 1} are rejected on decode,
    /// including values whose low byte would alias a valid parity
    /// Why: the deserializer handles untrusted bytes, and a parity of 256
    /// must not silently truncate to 0 and reach the wire re-serialized
    #[test]
    fn test_deserialize_rejects_bad_parity() {
        for parity in [2u64, 5, 256] {
            assert!(matches!(
                TxEnvelope::deserialize(&wire_with_parity(parity)),
                Err(CodecError::InvalidParity { actual }) if actual == parity
            ));
        }
        for parity in [0u64, 1] {
            let decoded = TxEnvelope::deserialize(&wire_with_parity(parity)).unwrap();
            assert_eq!(decoded.user_signature.y_parity, parity as u8);
        }
    }

    /// What is tested: attaching a signature under the wrong mode is rejected
    /// Why: a cryptographically valid but semantically wrong signature must
    /// not reach the wire
    #[test]
    fn test_serialize_rejects_wrong_mode() {
        let envelope = test_envelope();
        let fee_payer_as_user = AttributedSignature::fee_payer(test_signature(0x44, 0));
        assert!(matches!(
            envelope.serialize_signed(&fee_payer_as_user, None),
            Err(CodecError::ModeMismatch { .. })
        ));

        let user = AttributedSignature::standard(test_signature(0x44, 0));
        let user_as_fee_payer = AttributedSignature::standard(test_signature(0x55, 1));
        assert!(matches!(
            envelope.serialize_signed(&user, Some(&user_as_fee_payer)),
            Err(CodecError::ModeMismatch { .. })
        ));
    }

    /// What is tested: sponsor tag round trip and rejection of a bad marker
    /// Why: the embedded suffix is the only trusted channel for the sender
    #[test]
    fn test_sponsor_tag_round_trip() {
        let tx = vec![0x76, 0x01, 0x02, 0x03];
        let sender = Address([0xab; 20]);

        let tagged = tag_for_sponsorship(&tx, &sender);
        assert_eq!(tagged.len(), tx.len() + 26);

        let (stripped, extracted) = split_sponsor_tag(&tagged).unwrap();
        assert_eq!(stripped, tx);
        assert_eq!(extracted, sender);

        let mut corrupted = tagged.clone();
        let last = corrupted.len() - 1;
        corrupted[last] ^= 0xff;
        assert!(matches!(
            split_sponsor_tag(&corrupted),
            Err(CodecError::MissingSponsorTag)
        ));

        assert!(matches!(
            split_sponsor_tag(&[0x01, 0x02]),
            Err(CodecError::MissingSponsorTag)
        ));
    }

    /// What is tested: address parsing accepts 0x-prefixed and bare hex,
    /// rejects short input
    /// Why: malformed addresses must fail validation before any network call
    #[test]
    fn test_address_from_hex() {
        let addr = Address::from_hex("0x1111111111111111111111111111111111111111").unwrap();
        assert_eq!(addr, Address([0x11; 20]));
        let bare = Address::from_hex("2222222222222222222222222222222222222222").unwrap();
        assert_eq!(bare, Address([0x22; 20]));
        assert!(Address::from_hex("0x1234").is_err());
        assert!(Address::from_hex("not-an-address").is_err());
    }
}
