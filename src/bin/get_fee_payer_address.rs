//! Get Fee-Payer Address
//!
//! This binary reads the service configuration, loads the fee-payer key from
//! its environment variable, and prints the address the fee-payer signature
//! recovers to. Use it to fund the fee-payer account before starting the
//! sponsorship service.

use anyhow::Result;
use packet_pipeline::config::Config;
use packet_pipeline::crypto::FeePayerSigner;

fn main() -> Result<()> {
    // Load config
    let config = Config::load()?;

    // Load the fee-payer key and derive its address
    let key_hex = config.sponsor.get_fee_payer_key()?;
    let signer = FeePayerSigner::from_hex_key(&key_hex)?;

    println!("{}", signer.address()?);

    Ok(())
}
