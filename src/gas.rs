//! Gas Estimation Module
//!
//! Wraps the node's batch gas estimation with a safety margin, a fixed
//! fallback when estimation fails, and a floor for refund batches whose cost
//! grows with unclaimed shares. Estimation never aborts a pipeline run.

use crate::envelope::{Address, Call};
use crate::rpc_client::RpcClient;

/// Gas limit used when the node's estimate is unavailable.
pub const GAS_FALLBACK: u64 = 400_000;

/// Minimum gas limit for refund transactions.
///
/// A refund pays out every unclaimed share in one call, so its cost scales
/// with pool size in a way a point-in-time estimate can undershoot.
pub const REFUND_GAS_FLOOR: u64 = 650_000;

/// Safety margin applied to node estimates: estimate * 120 / 100.
const MARGIN_NUM: u64 = 120;
const MARGIN_DEN: u64 = 100;

fn with_margin(estimate: u64) -> u64 {
    estimate.saturating_mul(MARGIN_NUM) / MARGIN_DEN
}

/// Estimates a gas limit for the batch, with a 20% margin on top of the
/// node's figure.
///
/// Falls back to [`GAS_FALLBACK`] when the node rejects the estimation call
/// or is unreachable; a failed estimate downgrades to a log line, never an
/// error. The broadcast itself remains the authoritative failure point.
pub async fn estimate_gas(client: &RpcClient, from: &Address, calls: &[Call]) -> u64 {
    match client.estimate_batch_gas(from, calls).await {
        Ok(estimate) => with_margin(estimate),
        Err(e) => {
            tracing::warn!("gas estimation failed, using fallback {}: {}", GAS_FALLBACK, e);
            GAS_FALLBACK
        }
    }
}

/// Estimates a gas limit for a refund batch, clamped to at least
/// [`REFUND_GAS_FLOOR`].
pub async fn estimate_refund_gas(client: &RpcClient, from: &Address, calls: &[Call]) -> u64 {
    estimate_gas(client, from, calls).await.max(REFUND_GAS_FLOOR)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// What is tested: the 20% margin arithmetic, including rounding down
    /// Why: the margin must scale the node's figure without overflowing
    #[test]
    fn test_margin_arithmetic() {
        assert_eq!(with_margin(100_000), 120_000);
        assert_eq!(with_margin(21_000), 25_200);
        assert_eq!(with_margin(1), 1);
        assert_eq!(with_margin(u64::MAX), u64::MAX / 100);
    }
}
