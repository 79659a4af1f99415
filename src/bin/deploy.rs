//! One-shot deployer binary. Exit code 0 on success, 1 on any error.

use presale_minter::{deploy, DeployConfig};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match DeployConfig::load() {
        Ok(c) => c,
        Err(e) => {
            error!(error = %e, "FATAL: Config error, set DEPLOYER_* env vars or deployer.toml");
            std::process::exit(1);
        }
    };

    info!(
        rpc = %config.rpc_url,
        network = %config.network_id,
        "Starting deployment"
    );

    match deploy::run(config).await {
        Ok(contract_id) => {
            println!("NFT contract address: {contract_id}");
        }
        Err(e) => {
            eprintln!("{e}");
            std::process::exit(1);
        }
    }
}
