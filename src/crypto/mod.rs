//! Cryptographic Operations Module
//!
//! Signature normalization, the external-signer seam, and the in-process
//! fee-payer signer. The pipeline never holds the end user's key: user
//! signatures come from a custodial wallet provider over JSON-RPC, while the
//! fee-payer signature is produced locally with the server-held secp256k1 key.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: The fee-payer private key must never be exposed or logged.

use anyhow::{Context, Result};
use k256::ecdsa::signature::hazmat::PrehashSigner;
use k256::ecdsa::{RecoveryId, Signature as EcdsaSignature, SigningKey, VerifyingKey};
use sha3::{Digest, Keccak256};
use std::time::Duration;

use crate::envelope::{Address, SignPayload, SigningMode};

/// Computes the Keccak-256 hash of `input`.
pub fn keccak256(input: &[u8]) -> [u8; 32] {
    let mut hasher = Keccak256::new();
    hasher.update(input);
    hasher.finalize().into()
}

// ============================================================================
// SIGNATURE NORMALIZATION
// ============================================================================

/// Canonical components of a secp256k1 signature.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureParts {
    /// First 32 bytes of the raw signature
    pub r: [u8; 32],
    /// Second 32 bytes of the raw signature
    pub s: [u8; 32],
    /// Recovery parity, normalized to 0 or 1
    pub y_parity: u8,
}

/// A signature paired with the signing mode its payload was derived under.
///
/// Constructed at the point where the raw signature is normalized, so the
/// serializer can verify that each signature lands in the slot its hash was
/// actually derived for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttributedSignature {
    pub parts: SignatureParts,
    pub mode: SigningMode,
}

impl AttributedSignature {
    pub fn standard(parts: SignatureParts) -> Self {
        Self {
            parts,
            mode: SigningMode::Standard,
        }
    }

    pub fn fee_payer(parts: SignatureParts) -> Self {
        Self {
            parts,
            mode: SigningMode::FeePayer,
        }
    }
}

/// Splits a 65-byte raw signature into `{r, s, yParity}`.
///
/// Byte layout is fixed: bytes 0–31 = r, 32–63 = s, byte 64 = recovery
/// indicator. Legacy (27/28) and modern (0/1) recovery encodings are
/// normalized identically: `27 | 0 → 0`, anything else `→ 1`.
pub fn normalize_signature(raw: &[u8]) -> Result<SignatureParts> {
    if raw.len() != 65 {
        return Err(anyhow::anyhow!(
            "invalid signature length: expected 65 bytes, got {}",
            raw.len()
        ));
    }

    let mut r = [0u8; 32];
    let mut s = [0u8; 32];
    r.copy_from_slice(&raw[0..32]);
    s.copy_from_slice(&raw[32..64]);

    let v = raw[64];
    let y_parity = if v == 27 || v == 0 { 0 } else { 1 };

    Ok(SignatureParts { r, s, y_parity })
}

// ============================================================================
// EXTERNAL SIGNER SEAM
// ============================================================================

/// A signing operation delegated to a key the pipeline does not hold.
///
/// Implementations may involve user interaction (wallet approval prompt) and
/// can be slow or rejected; failures propagate as pipeline errors.
pub trait ExternalSigner {
    /// Signs the payload's 32-byte hash, returning the raw 65-byte signature
    /// (`r || s || v`).
    async fn sign(&self, payload: &SignPayload) -> Result<Vec<u8>>;
}

/// Signer backed by the end user's custodial wallet provider.
///
/// Issues a `secp256k1_sign` JSON-RPC request; the provider may prompt the
/// user for approval before responding.
pub struct ProviderSigner {
    client: reqwest::Client,
    endpoint: String,
}

impl ProviderSigner {
    /// Creates a signer talking to the given provider endpoint.
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl ExternalSigner for ProviderSigner {
    async fn sign(&self, payload: &SignPayload) -> Result<Vec<u8>> {
        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "method": "secp256k1_sign",
            "params": [format!("0x{}", hex::encode(payload.hash))],
            "id": 1,
        });

        let response: serde_json::Value = self
            .client
            .post(&self.endpoint)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Failed to send secp256k1_sign request to {}", self.endpoint))?
            .json()
            .await
            .context("Failed to parse secp256k1_sign response")?;

        if let Some(error) = response.get("error") {
            let message = error
                .get("message")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown signer error");
            return Err(anyhow::anyhow!("signer rejected request: {}", message));
        }

        let signature_hex = response
            .get("result")
            .and_then(serde_json::Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("no result in secp256k1_sign response"))?;

        let raw = hex::decode(signature_hex.strip_prefix("0x").unwrap_or(signature_hex))
            .context("Failed to decode signature hex")?;
        if raw.len() != 65 {
            return Err(anyhow::anyhow!(
                "provider returned {}-byte signature (expected 65)",
                raw.len()
            ));
        }
        Ok(raw)
    }
}

// ============================================================================
// FEE-PAYER SIGNER
// ============================================================================

/// In-process signer holding the server-side fee-payer key.
///
/// Fast and non-interactive; used only by the sponsorship service.
pub struct FeePayerSigner {
    signing_key: SigningKey,
}

impl FeePayerSigner {
    /// Builds a signer from a 32-byte hex-encoded private key.
    pub fn from_hex_key(key_hex: &str) -> Result<Self> {
        let key_bytes = hex::decode(key_hex.strip_prefix("0x").unwrap_or(key_hex))
            .context("Failed to decode fee-payer private key hex")?;
        if key_bytes.len() != 32 {
            return Err(anyhow::anyhow!(
                "invalid fee-payer key length: expected 32 bytes, got {}",
                key_bytes.len()
            ));
        }
        let key_array: [u8; 32] = key_bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("Failed to convert fee-payer key to array"))?;
        let signing_key = SigningKey::from_bytes(&key_array.into())
            .map_err(|e| anyhow::anyhow!("Failed to create ECDSA signing key: {}", e))?;
        Ok(Self { signing_key })
    }

    /// Derives the Ethereum-style address of the fee-payer key:
    /// `keccak256(uncompressed_public_key)[12..32]`.
    pub fn address(&self) -> Result<Address> {
        let verifying_key = self.signing_key.verifying_key();
        let point = verifying_key.to_encoded_point(false);
        let public_key_bytes = point.as_bytes();
        if public_key_bytes.len() != 65 || public_key_bytes[0] != 0x04 {
            return Err(anyhow::anyhow!(
                "Invalid public key format: expected 65 bytes with 0x04 prefix"
            ));
        }

        let hash = keccak256(&public_key_bytes[1..]);
        let mut address = [0u8; 20];
        address.copy_from_slice(&hash[12..32]);
        Ok(Address(address))
    }

    /// Signs a 32-byte digest, returning `r || s || v` with v in 27/28 form.
    ///
    /// The recovery id is computed by candidate recovery: try id 0, compare
    /// the recovered key against our own, fall back to id 1.
    pub fn sign_digest(&self, digest: &[u8; 32]) -> Result<Vec<u8>> {
        let signature: EcdsaSignature = self
            .signing_key
            .sign_prehash(digest)
            .map_err(|e| anyhow::anyhow!("Failed to sign digest: {}", e))?;

        let sig_bytes = signature.to_bytes();
        let r = &sig_bytes[..32];
        let s = &sig_bytes[32..64];

        let verifying_key = self.signing_key.verifying_key();
        let expected = verifying_key.to_encoded_point(false);

        let recovery_id_0 = RecoveryId::try_from(0u8)
            .map_err(|e| anyhow::anyhow!("invalid recovery id: {}", e))?;
        let recovery_id = match VerifyingKey::recover_from_prehash(digest, &signature, recovery_id_0)
        {
            Ok(recovered) if recovered.to_encoded_point(false) == expected => 0u8,
            _ => 1u8,
        };

        let mut out = Vec::with_capacity(65);
        out.extend_from_slice(r);
        out.extend_from_slice(s);
        out.push(recovery_id + 27);
        Ok(out)
    }
}

impl ExternalSigner for FeePayerSigner {
    async fn sign(&self, payload: &SignPayload) -> Result<Vec<u8>> {
        self.sign_digest(&payload.hash)
    }
}
