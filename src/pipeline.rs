//! Transaction Pipeline Module
//!
//! Orchestrates one user action end to end: validate and assemble calls,
//! pre-flight where applicable, build the envelope, obtain the user's
//! signature, then broadcast, either directly (self-paid fee) or through the
//! sponsorship service (fee-payer co-signed). Status is tracked per run and
//! every failure is translated into a user-facing message before surfacing.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: The pipeline never holds the user's private key; all user
//! signatures come through the [`ExternalSigner`] seam.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use thiserror::Error;

use crate::builder::{build_envelope, ActionRequest, Contracts, ValidationError};
use crate::crypto::{normalize_signature, AttributedSignature, ExternalSigner};
use crate::envelope::{tag_for_sponsorship, Address, CodecError};
use crate::reasons;
use crate::rpc_client::{RpcClient, RpcError};
use crate::sponsor::{SponsorRequest, SponsorResponse};
use crate::status::{PipelineStatus, StatusSnapshot, StatusTracker};

/// Errors surfaced by a pipeline run.
///
/// `Reverted` and `Broadcast` carry already-translated user-facing text;
/// everything else keeps its source error for the log.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("{0}")]
    Validation(#[from] ValidationError),
    #[error("failed to read chain state: {0}")]
    Read(RpcError),
    #[error("{0}")]
    Reverted(String),
    #[error("signing failed: {0}")]
    Signing(#[source] anyhow::Error),
    #[error("{0}")]
    Broadcast(String),
    #[error("{0}")]
    Codec(#[from] CodecError),
    #[error("sponsorship failed: {0}")]
    Sponsorship(String),
    #[error("internal status error: {0}")]
    Status(#[from] crate::status::InvalidTransition),
}

/// Per-pool outcome of a bulk refund sweep.
#[derive(Debug)]
pub struct RefundOutcome {
    pub pool_id: String,
    pub result: Result<String, PipelineError>,
}

/// One user's transaction pipeline.
///
/// Owns the RPC client, the external signer, and a status tracker; a single
/// pipeline runs one action at a time.
pub struct Pipeline<S: ExternalSigner> {
    client: RpcClient,
    http: reqwest::Client,
    signer: S,
    chain_id: u64,
    contracts: Contracts,
    sender: Address,
    sponsor_url: Option<String>,
    status: StatusTracker,
}

impl<S: ExternalSigner> Pipeline<S> {
    pub fn new(
        node_url: &str,
        chain_id: u64,
        contracts: Contracts,
        sender: Address,
        signer: S,
    ) -> Result<Self, RpcError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| RpcError::Transport(format!("Failed to create HTTP client: {}", e)))?;
        Ok(Self {
            client: RpcClient::new(node_url)?,
            http,
            signer,
            chain_id,
            contracts,
            sender,
            sponsor_url: None,
            status: StatusTracker::new(),
        })
    }

    /// Sets the sponsorship service endpoint, enabling sponsored runs.
    pub fn with_sponsor(mut self, sponsor_url: &str) -> Self {
        self.sponsor_url = Some(sponsor_url.to_string());
        self
    }

    pub fn status(&self) -> StatusSnapshot {
        self.status.snapshot()
    }

    /// Runs an action with the sender paying their own fee.
    ///
    /// Returns the transaction hash; the tracker ends in `success` or
    /// `error` accordingly.
    pub async fn run(&mut self, action: &ActionRequest) -> Result<String, PipelineError> {
        self.status.reset();
        let result = self.run_inner(action, false).await;
        self.settle(&result);
        result
    }

    /// Runs an action through the sponsorship service.
    ///
    /// The signed transaction is tagged with the sender address and handed to
    /// the service, which co-signs and broadcasts it.
    pub async fn run_sponsored(&mut self, action: &ActionRequest) -> Result<String, PipelineError> {
        self.status.reset();
        let result = self.run_inner(action, true).await;
        self.settle(&result);
        result
    }

    /// Refunds every listed pool, one sponsored transaction per pool.
    ///
    /// Pools are processed sequentially so each transaction sees the previous
    /// nonce confirmed by the node's pending count. A failure is recorded and
    /// the sweep continues; `abort` stops it between pools.
    pub async fn refund_all(
        &mut self,
        pool_ids: &[String],
        abort: &AtomicBool,
    ) -> Vec<RefundOutcome> {
        let mut outcomes = Vec::with_capacity(pool_ids.len());
        for pool_id in pool_ids {
            if abort.load(Ordering::SeqCst) {
                tracing::info!("refund sweep aborted after {} pools", outcomes.len());
                break;
            }
            let action = ActionRequest::Refund {
                pool_id: pool_id.clone(),
            };
            let result = self.run_sponsored(&action).await;
            if let Err(e) = &result {
                tracing::warn!("refund of pool {} failed: {}", pool_id, e);
            }
            outcomes.push(RefundOutcome {
                pool_id: pool_id.clone(),
                result,
            });
        }
        outcomes
    }

    fn settle(&mut self, result: &Result<String, PipelineError>) {
        match result {
            Ok(hash) => {
                if let Err(e) = self.status.succeed(hash) {
                    tracing::error!("status tracker out of sync: {}", e);
                }
            }
            Err(error) => {
                if let Err(e) = self.status.fail(&error.to_string()) {
                    tracing::error!("status tracker out of sync: {}", e);
                }
            }
        }
    }

    async fn run_inner(
        &mut self,
        action: &ActionRequest,
        sponsored: bool,
    ) -> Result<String, PipelineError> {
        self.status.advance(PipelineStatus::Building)?;

        let calls = action.to_calls(&self.contracts)?;

        // Pre-flight single-call actions so a doomed transaction is caught
        // before the user is asked to sign.
        if action.wants_preflight() {
            let call = &calls[0];
            if let Err(RpcError::Node { message, .. }) =
                self.client.call(&self.sender, &call.to, &call.data).await
            {
                let ignorable =
                    sponsored && action.is_refund() && reasons::is_insufficient_gas(&message);
                if !ignorable {
                    return Err(PipelineError::Reverted(reasons::user_message(&message)));
                }
                tracing::debug!("ignoring pre-flight gas shortfall on sponsored refund");
            }
            // Transport failures fall through: the pre-flight is advisory and
            // the broadcast remains the authoritative failure point.
        }

        let envelope = build_envelope(
            &self.client,
            self.chain_id,
            &self.contracts,
            &self.sender,
            calls,
            action.is_refund(),
        )
        .await
        .map_err(PipelineError::Read)?;

        self.status.advance(PipelineStatus::Signing)?;

        let payload = envelope.sign_payload_standard();
        let raw = self
            .signer
            .sign(&payload)
            .await
            .map_err(PipelineError::Signing)?;
        let parts = normalize_signature(&raw).map_err(PipelineError::Signing)?;
        let user = AttributedSignature::standard(parts);

        self.status.advance(PipelineStatus::Broadcasting)?;

        let serialized = envelope.serialize_signed(&user, None)?;
        if sponsored {
            self.broadcast_sponsored(&serialized).await
        } else {
            self.broadcast_direct(&serialized).await
        }
    }

    async fn broadcast_direct(&self, serialized: &[u8]) -> Result<String, PipelineError> {
        match self.client.send_raw_transaction(serialized).await {
            Ok(hash) => {
                tracing::info!("transaction broadcast: {}", hash);
                Ok(hash)
            }
            Err(RpcError::Node { message, .. }) => {
                Err(PipelineError::Broadcast(reasons::user_message(&message)))
            }
            Err(e @ RpcError::Transport(_)) => Err(PipelineError::Read(e)),
        }
    }

    async fn broadcast_sponsored(&self, serialized: &[u8]) -> Result<String, PipelineError> {
        let sponsor_url = self
            .sponsor_url
            .as_deref()
            .ok_or_else(|| PipelineError::Sponsorship("no sponsorship endpoint configured".to_string()))?;

        let tagged = tag_for_sponsorship(serialized, &self.sender);
        let request = SponsorRequest {
            serialized_tx: format!("0x{}", hex::encode(tagged)),
        };

        let response: SponsorResponse = self
            .http
            .post(sponsor_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                PipelineError::Sponsorship(format!("failed to reach sponsorship service: {}", e))
            })?
            .json()
            .await
            .map_err(|e| {
                PipelineError::Sponsorship(format!("invalid sponsorship response: {}", e))
            })?;

        if let Some(error) = response.error {
            return Err(PipelineError::Broadcast(reasons::user_message(&error)));
        }
        match response.hash {
            Some(hash) => {
                tracing::info!("sponsored transaction broadcast: {}", hash);
                Ok(hash)
            }
            None => Err(PipelineError::Sponsorship(
                "sponsorship response carried neither hash nor error".to_string(),
            )),
        }
    }
}
