//! Fee Sponsorship Module
//!
//! Server-side co-signing service: accepts a sponsor-tagged, user-signed
//! transaction, derives the fee-payer sign payload for the embedded sender,
//! attaches the fee-payer signature, and broadcasts the dual-signed
//! transaction. The user's signature passes through byte-identical.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: The fee-payer key signs only fee-payer-mode payloads; the
//! service must never produce a standard-mode signature over foreign data.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::crypto::{normalize_signature, AttributedSignature, FeePayerSigner};
use crate::envelope::{split_sponsor_tag, Address, TxEnvelope};
use crate::rpc_client::{RpcClient, RpcError};

/// Request body accepted by the sponsorship endpoint.
#[derive(Debug, Serialize, Deserialize)]
pub struct SponsorRequest {
    /// Hex-encoded sponsor-tagged transaction
    #[serde(rename = "serializedTx")]
    pub serialized_tx: String,
}

/// Response body returned by the sponsorship endpoint.
///
/// Exactly one of `hash` and `error` is set.
#[derive(Debug, Serialize, Deserialize)]
pub struct SponsorResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hash: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Errors from the sponsorship flow, split by who caused them.
#[derive(Debug, Error)]
pub enum SponsorError {
    /// The submitted transaction is malformed; maps to HTTP 400.
    #[error("invalid sponsored transaction: {0}")]
    BadRequest(String),
    #[error("fee-payer signing failed: {0}")]
    Signing(#[source] anyhow::Error),
    /// The node rejected the broadcast; the message is surfaced to the user.
    #[error("{0}")]
    Broadcast(RpcError),
}

impl SponsorError {
    pub fn is_client_error(&self) -> bool {
        matches!(self, SponsorError::BadRequest(_))
    }
}

/// The co-signing service, shared across requests.
pub struct SponsorService {
    client: RpcClient,
    signer: FeePayerSigner,
}

impl SponsorService {
    pub fn new(node_url: &str, signer: FeePayerSigner) -> Result<Self, RpcError> {
        Ok(Self {
            client: RpcClient::new(node_url)?,
            signer,
        })
    }

    /// Address the fee-payer signature recovers to on-chain.
    pub fn fee_payer_address(&self) -> anyhow::Result<Address> {
        self.signer.address()
    }

    /// Co-signs a sponsor-tagged transaction and broadcasts it.
    ///
    /// Returns the transaction hash reported by the node.
    pub async fn sponsor(&self, serialized_tx_hex: &str) -> Result<String, SponsorError> {
        let stripped = serialized_tx_hex
            .strip_prefix("0x")
            .unwrap_or(serialized_tx_hex);
        let tagged = hex::decode(stripped)
            .map_err(|e| SponsorError::BadRequest(format!("invalid hex: {}", e)))?;

        let dual_signed = self.co_sign(&tagged)?;

        let hash = self
            .client
            .send_raw_transaction(&dual_signed)
            .await
            .map_err(SponsorError::Broadcast)?;
        tracing::info!("sponsored transaction broadcast: {}", hash);
        Ok(hash)
    }

    /// Produces the dual-signed wire bytes for a sponsor-tagged transaction
    /// without broadcasting.
    ///
    /// The sender address is taken exclusively from the tag suffix, and the
    /// fee-payer payload is derived over the envelope plus that sender, so
    /// the signature covers exactly whose fee is being paid.
    pub fn co_sign(&self, tagged: &[u8]) -> Result<Vec<u8>, SponsorError> {
        let (tx, sender) =
            split_sponsor_tag(tagged).map_err(|e| SponsorError::BadRequest(e.to_string()))?;
        let decoded =
            TxEnvelope::deserialize(&tx).map_err(|e| SponsorError::BadRequest(e.to_string()))?;
        if decoded.fee_payer_signature.is_some() {
            return Err(SponsorError::BadRequest(
                "transaction already carries a fee-payer signature".to_string(),
            ));
        }

        let payload = decoded.envelope.sign_payload_fee_payer(&sender);
        let raw = self
            .signer
            .sign_digest(&payload.hash)
            .map_err(SponsorError::Signing)?;
        let parts = normalize_signature(&raw).map_err(SponsorError::Signing)?;

        let user = AttributedSignature::standard(decoded.user_signature);
        let fee_payer = AttributedSignature::fee_payer(parts);
        decoded
            .envelope
            .serialize_signed(&user, Some(&fee_payer))
            .map_err(|e| SponsorError::Signing(anyhow::anyhow!(e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::SignatureParts;
    use crate::envelope::{tag_for_sponsorship, Call};

    fn service() -> SponsorService {
        let key_hex = "4c0883a69102937d6231471b5dbb6204fe512961708279f2e3e8a5d4b8e3e6f1";
        SponsorService::new(
            "http://127.0.0.1:8545",
            FeePayerSigner::from_hex_key(key_hex).unwrap(),
        )
        .unwrap()
    }

    fn user_signed_tx() -> (TxEnvelope, Vec<u8>) {
        let envelope = TxEnvelope {
            chain_id: 5700,
            nonce: 0,
            max_priority_fee_per_gas: 1_000_000_000,
            max_fee_per_gas: 3_000_000_000,
            gas: 400_000,
            fee_token: Address([0x11; 20]),
            calls: vec![Call {
                to: Address([0x22; 20]),
                value: 0,
                data: vec![0x01, 0x02],
            }],
        };
        let user = AttributedSignature::standard(SignatureParts {
            r: [0x44; 32],
            s: [0x55; 32],
            y_parity: 1,
        });
        let tx = envelope.serialize_signed(&user, None).unwrap();
        (envelope, tx)
    }

    /// What is tested: co-signing keeps the user's signature byte-identical
    /// and attaches a fee-payer signature that recovers to the service key
    /// Why: re-signing or altering the user slot would void the user's
    /// approval; a wrong fee-payer recovery would misattribute the fee
    #[test]
    fn test_co_sign_dual_signature() {
        let service = service();
        let (envelope, tx) = user_signed_tx();
        let sender = Address([0x99; 20]);

        let tagged = tag_for_sponsorship(&tx, &sender);
        let dual = service.co_sign(&tagged).unwrap();

        let decoded = TxEnvelope::deserialize(&dual).unwrap();
        assert_eq!(decoded.envelope, envelope);
        assert_eq!(decoded.user_signature.r, [0x44; 32]);
        assert_eq!(decoded.user_signature.s, [0x55; 32]);
        assert_eq!(decoded.user_signature.y_parity, 1);
        assert!(decoded.fee_payer_signature.is_some());
    }

    /// What is tested: the fee-payer signature depends on the tagged sender
    /// Why: the fee payer commits to exactly whose transaction it sponsors
    #[test]
    fn test_co_sign_commits_to_sender() {
        let service = service();
        let (_, tx) = user_signed_tx();

        let a = service
            .co_sign(&tag_for_sponsorship(&tx, &Address([0x01; 20])))
            .unwrap();
        let b = service
            .co_sign(&tag_for_sponsorship(&tx, &Address([0x02; 20])))
            .unwrap();
        let sig_a = TxEnvelope::deserialize(&a).unwrap().fee_payer_signature;
        let sig_b = TxEnvelope::deserialize(&b).unwrap().fee_payer_signature;
        assert_ne!(sig_a.unwrap().r, sig_b.unwrap().r);
    }

    /// What is tested: missing tag, bad magic, and double sponsorship are
    /// rejected as client errors
    /// Why: these inputs map to HTTP 400 and must never reach the signer
    #[test]
    fn test_co_sign_rejects_bad_input() {
        let service = service();
        let (_, tx) = user_signed_tx();

        let untagged = service.co_sign(&tx);
        assert!(matches!(untagged, Err(ref e) if e.is_client_error()));

        let mut bad_magic = tag_for_sponsorship(&tx, &Address([0x01; 20]));
        let last = bad_magic.len() - 1;
        bad_magic[last] = 0x00;
        assert!(matches!(service.co_sign(&bad_magic), Err(ref e) if e.is_client_error()));

        let sender = Address([0x01; 20]);
        let dual = service
            .co_sign(&tag_for_sponsorship(&tx, &sender))
            .unwrap();
        let re_tagged = tag_for_sponsorship(&dual, &sender);
        assert!(matches!(service.co_sign(&re_tagged), Err(ref e) if e.is_client_error()));
    }
}
