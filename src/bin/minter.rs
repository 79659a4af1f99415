//! Presale minter binary.
//!
//! Subcommands: `watch` (default), `status`, `start-presale`,
//! `presale-mint`, `mint`.

use presale_minter::contract::MAX_TOKEN_IDS;
use presale_minter::store::{describe_age, RefreshGroup};
use presale_minter::{Config, NftContract, PresaleLifecycle, RpcClient, Wallet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::load().unwrap_or_else(|e| {
        // Fall back only when no config exists; parsing errors fail hard.
        let err_str = format!("{e}");
        if err_str.contains("not found") || err_str.contains("missing field") {
            warn!(error = %e, "No config file found, using defaults");
            Config::default()
        } else {
            error!(error = %e, "FATAL: Config error, fix env vars or minter.toml");
            std::process::exit(1);
        }
    });

    info!(
        contract = %config.contract_id,
        rpc = %config.rpc_url,
        network = %config.network_id,
        "Configuration loaded"
    );

    if let Err(e) = run(config).await {
        error!(error = %e, "Minter failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    let rpc = Arc::new(RpcClient::new(
        &config.rpc_url,
        &config.fallback_rpc_url,
        &config.network_id,
    ));
    let contract_id = config
        .contract_id
        .parse()
        .map_err(|e| presale_minter::Error::Config(format!("invalid contract id: {e}")))?;
    let contract = NftContract::new(Arc::clone(&rpc), contract_id, config.gas_tgas);
    let wallet = Wallet::load(&config.keys_path)?;
    let lifecycle = PresaleLifecycle::new(contract, wallet, config.poll_interval_secs);

    // Wrong network aborts here, before any contract traffic.
    lifecycle.connect().await?;

    let command = std::env::args().nth(1).unwrap_or_else(|| "watch".into());
    match command.as_str() {
        "watch" => {
            lifecycle.refresh_all().await;
            print_status(&lifecycle);

            let cancel = CancellationToken::new();
            let shutdown = cancel.clone();
            tokio::spawn(async move {
                shutdown_signal().await;
                shutdown.cancel();
            });
            lifecycle.run(cancel).await;
            info!("Watcher stopped");
        }
        "status" => {
            lifecycle.refresh_all().await;
            print_status(&lifecycle);
        }
        "start-presale" => {
            lifecycle.start_presale().await?;
            println!("presale started");
        }
        "presale-mint" => {
            lifecycle.presale_mint().await?;
            println!("minted during presale");
        }
        "mint" => {
            lifecycle.public_mint().await?;
            println!("minted");
        }
        other => {
            eprintln!("unknown command: {other}");
            eprintln!("usage: minter [watch|status|start-presale|presale-mint|mint]");
            std::process::exit(2);
        }
    }
    Ok(())
}

fn print_status(lifecycle: &PresaleLifecycle) {
    let store = lifecycle.store();
    let snapshot = store.snapshot();
    println!("{}", store.render());
    println!("{}/{} minted", snapshot.tokens_minted, MAX_TOKEN_IDS);
    // Distinguish a stale snapshot from a fresh negative read.
    println!(
        "presale state: {}",
        describe_age(store.staleness(RefreshGroup::Presale))
    );
    println!(
        "minted count:  {}",
        describe_age(store.staleness(RefreshGroup::Minted))
    );
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received SIGINT, shutting down..."),
        _ = terminate => info!("Received SIGTERM, shutting down..."),
    }
}
