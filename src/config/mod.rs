//! Configuration Management Module
//!
//! Loads and validates configuration for the Packet pipeline and its
//! sponsorship service: network endpoint and chain id, contract addresses,
//! fee-payer key indirection, and API server settings.
//!
//! The fee-payer private key is never stored in the config file; the file
//! names the environment variable the key is read from at runtime.

use serde::{Deserialize, Serialize};

use crate::builder::Contracts;
use crate::envelope::Address;

// ============================================================================
// CONFIGURATION STRUCTURES
// ============================================================================

/// Main configuration structure containing all service settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Target network connection details
    pub network: NetworkConfig,
    /// Deployed contract addresses
    pub contracts: ContractsConfig,
    /// Fee sponsorship settings
    pub sponsor: SponsorConfig,
    /// API server configuration (host, port, CORS settings)
    pub api: ApiConfig,
}

/// Connection details for the target network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Human-readable name for the network
    pub name: String,
    /// RPC endpoint URL for node communication
    pub rpc_url: String,
    /// Unique chain identifier
    pub chain_id: u64,
}

/// Deployed contract addresses, as 0x-prefixed hex strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractsConfig {
    /// Stable-token contract address
    pub token_addr: String,
    /// PacketPool contract address
    pub pool_addr: String,
    /// Token the transaction fee is denominated in
    pub fee_token_addr: String,
}

/// Fee sponsorship configuration.
///
/// The config file carries the environment variable name, not the key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SponsorConfig {
    /// Environment variable name containing the fee-payer secp256k1 private
    /// key (hex encoded). Default: "PACKET_FEE_PAYER_KEY"
    #[serde(default = "default_fee_payer_key_env")]
    pub fee_payer_key_env: String,
}

fn default_fee_payer_key_env() -> String {
    "PACKET_FEE_PAYER_KEY".to_string()
}

impl SponsorConfig {
    /// Loads the fee-payer private key from the environment variable.
    pub fn get_fee_payer_key(&self) -> anyhow::Result<String> {
        std::env::var(&self.fee_payer_key_env).map_err(|_| {
            anyhow::anyhow!(
                "Environment variable '{}' not set. Please set it with your fee-payer private key (hex encoded).",
                self.fee_payer_key_env
            )
        })
    }
}

/// API server configuration for external communication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host address to bind the API server to
    pub host: String,
    /// Port number to bind the API server to
    pub port: u16,
    /// Allowed CORS origins for cross-origin requests
    pub cors_origins: Vec<String>,
}

// ============================================================================
// CONFIGURATION LOADING AND MANAGEMENT
// ============================================================================

impl Config {
    /// Validates the configuration.
    ///
    /// Checks that every contract address parses as a 20-byte hex address
    /// and that the chain id is nonzero, so malformed settings fail at
    /// startup instead of at the first transaction.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.network.chain_id == 0 {
            return Err(anyhow::anyhow!(
                "Configuration error: network.chain_id must be nonzero"
            ));
        }
        for (field, value) in [
            ("contracts.token_addr", &self.contracts.token_addr),
            ("contracts.pool_addr", &self.contracts.pool_addr),
            ("contracts.fee_token_addr", &self.contracts.fee_token_addr),
        ] {
            Address::from_hex(value).map_err(|_| {
                anyhow::anyhow!(
                    "Configuration error: {} is not a valid 20-byte hex address: {}",
                    field,
                    value
                )
            })?;
        }
        Ok(())
    }

    /// Parses the configured contract addresses into builder form.
    pub fn resolve_contracts(&self) -> anyhow::Result<Contracts> {
        Ok(Contracts {
            token: Address::from_hex(&self.contracts.token_addr)
                .map_err(|e| anyhow::anyhow!("invalid token_addr: {}", e))?,
            pool: Address::from_hex(&self.contracts.pool_addr)
                .map_err(|e| anyhow::anyhow!("invalid pool_addr: {}", e))?,
            fee_token: Address::from_hex(&self.contracts.fee_token_addr)
                .map_err(|e| anyhow::anyhow!("invalid fee_token_addr: {}", e))?,
        })
    }

    /// Loads configuration from the TOML file.
    ///
    /// The path defaults to `config/packet-pipeline.toml` and can be
    /// overridden via the `PACKET_PIPELINE_CONFIG_PATH` environment variable
    /// (used by tests and the `--config` flag).
    pub fn load() -> anyhow::Result<Self> {
        let config_path = std::env::var("PACKET_PIPELINE_CONFIG_PATH")
            .unwrap_or_else(|_| "config/packet-pipeline.toml".to_string());

        if std::path::Path::new(&config_path).exists() {
            let content = std::fs::read_to_string(&config_path)?;
            let config: Config = toml::from_str(&content)?;
            config.validate()?;
            Ok(config)
        } else {
            Err(anyhow::anyhow!(
                "Configuration file '{}' not found. Please copy the template:\n\
                cp config/packet-pipeline.template.toml config/packet-pipeline.toml\n\
                Then edit config/packet-pipeline.toml with your actual values.",
                config_path
            ))
        }
    }
}
