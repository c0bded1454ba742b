//! Packet Fee Sponsorship Service
//!
//! A server-side co-signing service for Packet transactions. Users sign their
//! batch envelopes in their wallet and submit them here tagged with their
//! address; the service attaches the fee-payer signature and broadcasts the
//! dual-signed transaction so users never need to hold the gas token.
//!
//! ## Security Requirements
//!
//! **CRITICAL**: This service holds the fee-payer private key and pays gas for
//! whatever it co-signs. Ensure proper key management and access controls for
//! production use.

use anyhow::Result;
use tracing::info;

use packet_pipeline::api::ApiServer;
use packet_pipeline::config::Config;
use packet_pipeline::crypto::FeePayerSigner;
use packet_pipeline::sponsor::SponsorService;

// ============================================================================
// MAIN APPLICATION ENTRY POINT
// ============================================================================

/// Main application entry point that initializes and runs the sponsorship
/// service.
///
/// This function:
/// 1. Initializes logging and tracing
/// 2. Loads configuration from TOML file
/// 3. Loads the fee-payer key and initializes the sponsor service
/// 4. Runs the API server until shutdown
#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging for debugging and monitoring
    tracing_subscriber::fmt::init();

    info!("Starting Packet Fee Sponsorship Service");

    // Parse command line arguments
    let args: Vec<String> = std::env::args().collect();

    // Check for help flag
    if args.iter().any(|arg| arg == "--help" || arg == "-h") {
        println!("Packet Fee Sponsorship Service");
        println!();
        println!("Usage: packet-sponsor [OPTIONS]");
        println!();
        println!("Options:");
        println!("  --config <path>   Use custom config file path");
        println!("  --help, -h        Show this help message");
        println!();
        println!("Environment variables:");
        println!("  PACKET_PIPELINE_CONFIG_PATH   Path to config file (overrides --config)");
        println!("  PACKET_FEE_PAYER_KEY          Fee-payer private key (hex encoded)");
        return Ok(());
    }

    // Parse command line arguments
    let mut config_path = None;

    let mut i = 1; // Skip program name
    while i < args.len() {
        if args[i] == "--config" && i + 1 < args.len() {
            config_path = Some(args[i + 1].clone());
            i += 1;
        }
        i += 1;
    }

    if let Some(path) = config_path {
        std::env::set_var("PACKET_PIPELINE_CONFIG_PATH", &path);
        info!("Using custom config: {}", path);
    }

    // Load configuration from config/packet-pipeline.toml (or override path)
    let config = Config::load()?;
    info!("Configuration loaded successfully");

    // Load the fee-payer key and build the sponsor service
    let key_hex = config.sponsor.get_fee_payer_key()?;
    let signer = FeePayerSigner::from_hex_key(&key_hex)?;
    let service = SponsorService::new(&config.network.rpc_url, signer)?;
    info!(
        "Sponsoring fees from {} on {} (chain id {})",
        service.fee_payer_address()?,
        config.network.name,
        config.network.chain_id
    );

    // Run the API server (this blocks until shutdown)
    let server = ApiServer::new(config, service);
    server.run().await
}
