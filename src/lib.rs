//! Packet Transaction Pipeline Library
//!
//! This crate builds, signs, and broadcasts the batch-call transactions behind
//! Packet's token flows: packet (pool) creation, claims, refunds, and batch
//! sends. It also hosts the fee sponsorship service that co-signs user
//! transactions so senders need not hold the gas token.

pub mod api;
pub mod builder;
pub mod calldata;
pub mod config;
pub mod crypto;
pub mod envelope;
pub mod gas;
pub mod pipeline;
pub mod reasons;
pub mod rlp;
pub mod rpc_client;
pub mod sponsor;
pub mod status;

// Re-export commonly used types
pub use builder::{ActionRequest, Contracts, ValidationError};
pub use config::{ApiConfig, Config, ContractsConfig, NetworkConfig, SponsorConfig};
pub use crypto::{
    normalize_signature, AttributedSignature, ExternalSigner, FeePayerSigner, ProviderSigner,
    SignatureParts,
};
pub use envelope::{Address, Call, SignPayload, SignedEnvelope, SigningMode, TxEnvelope};
pub use pipeline::{Pipeline, PipelineError};
pub use sponsor::{SponsorRequest, SponsorResponse, SponsorService};
pub use status::{PipelineStatus, StatusSnapshot, StatusTracker};
