//! Envelope Builder Module
//!
//! Turns a user action (create packet, claim, refund, batch send) into the
//! ordered call list and the fully populated unsigned envelope. Validation
//! happens here, before any signing step; nonce, fee data, and gas are
//! fetched concurrently once the calls are fixed.

use thiserror::Error;

use crate::calldata::{
    encode_approve, encode_claim, encode_create_pool, encode_refund, encode_transfer, pack_memo,
    MEMO_MAX_BYTES,
};
use crate::envelope::{Address, Call, TxEnvelope};
use crate::gas;
use crate::rpc_client::{RpcClient, RpcError};

/// Number of decimal places in the stable token.
pub const TOKEN_DECIMALS: u32 = 6;

/// Contract addresses the builder targets.
#[derive(Debug, Clone, Copy)]
pub struct Contracts {
    /// Stable-token contract (approvals and transfers)
    pub token: Address,
    /// PacketPool contract (create, claim, refund)
    pub pool: Address,
    /// Token the transaction fee is denominated in
    pub fee_token: Address,
}

/// A user action, as received from the UI layer.
///
/// Amounts arrive as decimal strings; all parsing and range checks happen in
/// [`ActionRequest::to_calls`] so nothing malformed reaches an envelope.
#[derive(Debug, Clone)]
pub enum ActionRequest {
    CreatePool {
        /// Total amount, decimal string in token units (e.g. "10.5")
        amount: String,
        /// Number of claimable shares, 1..=255
        shares: u8,
        /// Free-text memo, at most 31 bytes of UTF-8
        memo: String,
        /// Banner artwork selector packed alongside the memo
        banner_id: u8,
    },
    Claim {
        /// Pool id, 32-byte hex string
        pool_id: String,
    },
    Refund {
        /// Pool id, 32-byte hex string
        pool_id: String,
    },
    BatchTransfer {
        /// Already-resolved recipient addresses with decimal amount strings
        recipients: Vec<(Address, String)>,
    },
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("invalid amount: {0}")]
    InvalidAmount(String),
    #[error("share count must be between 1 and 255")]
    SharesOutOfRange,
    #[error("memo is {len} bytes (maximum {MEMO_MAX_BYTES})")]
    MemoTooLong { len: usize },
    #[error("invalid pool id: {0}")]
    InvalidPoolId(String),
    #[error("batch transfer has no recipients")]
    EmptyRecipients,
}

/// Parses a decimal token-amount string into base units.
///
/// Accepts an optional fractional part of at most [`TOKEN_DECIMALS`] digits.
/// Zero and non-numeric input are rejected.
pub fn parse_token_amount(amount: &str) -> Result<u128, ValidationError> {
    let invalid = || ValidationError::InvalidAmount(amount.to_string());

    let (whole, frac) = match amount.split_once('.') {
        Some((whole, frac)) => (whole, frac),
        None => (amount, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if frac.len() > TOKEN_DECIMALS as usize {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }

    let whole_units: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac_units: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{:0<width$}", frac, width = TOKEN_DECIMALS as usize);
        padded.parse().map_err(|_| invalid())?
    };

    let scale = 10u128.pow(TOKEN_DECIMALS);
    let units = whole_units
        .checked_mul(scale)
        .and_then(|w| w.checked_add(frac_units))
        .ok_or_else(invalid)?;
    if units == 0 {
        return Err(invalid());
    }
    Ok(units)
}

fn parse_pool_id(pool_id: &str) -> Result<[u8; 32], ValidationError> {
    let stripped = pool_id.strip_prefix("0x").unwrap_or(pool_id);
    let bytes = hex::decode(stripped)
        .map_err(|_| ValidationError::InvalidPoolId(pool_id.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| ValidationError::InvalidPoolId(pool_id.to_string()))
}

impl ActionRequest {
    /// Whether this action gets an `eth_call` pre-flight before signing.
    ///
    /// Only the single-call actions are simulated; create and batch-send
    /// envelopes depend on intra-batch state a single `eth_call` cannot see.
    pub fn wants_preflight(&self) -> bool {
        matches!(self, ActionRequest::Claim { .. } | ActionRequest::Refund { .. })
    }

    pub fn is_refund(&self) -> bool {
        matches!(self, ActionRequest::Refund { .. })
    }

    /// Validates the action and assembles its ordered call list.
    ///
    /// For pool creation the approval precedes the pool call: both execute
    /// atomically in one envelope, in list order.
    pub fn to_calls(&self, contracts: &Contracts) -> Result<Vec<Call>, ValidationError> {
        match self {
            ActionRequest::CreatePool {
                amount,
                shares,
                memo,
                banner_id,
            } => {
                let units = parse_token_amount(amount)?;
                if *shares == 0 {
                    return Err(ValidationError::SharesOutOfRange);
                }
                let packed = pack_memo(memo, *banner_id).ok_or(ValidationError::MemoTooLong {
                    len: memo.as_bytes().len(),
                })?;
                Ok(vec![
                    Call {
                        to: contracts.token,
                        value: 0,
                        data: encode_approve(&contracts.pool, units),
                    },
                    Call {
                        to: contracts.pool,
                        value: 0,
                        data: encode_create_pool(units, *shares, packed),
                    },
                ])
            }
            ActionRequest::Claim { pool_id } => Ok(vec![Call {
                to: contracts.pool,
                value: 0,
                data: encode_claim(parse_pool_id(pool_id)?),
            }]),
            ActionRequest::Refund { pool_id } => Ok(vec![Call {
                to: contracts.pool,
                value: 0,
                data: encode_refund(parse_pool_id(pool_id)?),
            }]),
            ActionRequest::BatchTransfer { recipients } => {
                if recipients.is_empty() {
                    return Err(ValidationError::EmptyRecipients);
                }
                let mut calls = Vec::with_capacity(recipients.len());
                for (to, amount) in recipients {
                    let units = parse_token_amount(amount)?;
                    calls.push(Call {
                        to: contracts.token,
                        value: 0,
                        data: encode_transfer(to, units),
                    });
                }
                Ok(calls)
            }
        }
    }
}

/// Populates an unsigned envelope for the given calls.
///
/// Nonce, fee data, and the gas estimate are fetched concurrently; the first
/// two are required, while gas falls back internally and never fails.
pub async fn build_envelope(
    client: &RpcClient,
    chain_id: u64,
    contracts: &Contracts,
    sender: &Address,
    calls: Vec<Call>,
    refund_floor: bool,
) -> Result<TxEnvelope, RpcError> {
    let (nonce, fee_data, gas) = tokio::join!(
        client.transaction_count(sender),
        client.fee_data(),
        async {
            if refund_floor {
                gas::estimate_refund_gas(client, sender, &calls).await
            } else {
                gas::estimate_gas(client, sender, &calls).await
            }
        }
    );
    let nonce = nonce?;
    let fee_data = fee_data?;

    Ok(TxEnvelope {
        chain_id,
        nonce,
        max_priority_fee_per_gas: fee_data.max_priority_fee_per_gas,
        max_fee_per_gas: fee_data.max_fee_per_gas,
        gas,
        fee_token: contracts.fee_token,
        calls,
    })
}
