//! # Presale Minter
//!
//! Client for an NFT presale contract: mirrors remote state (presale
//! started/ended, owner, minted count) through polling and forwards the
//! user actions (connect, start presale, presale mint, public mint) as
//! signed transactions. Ships with a one-shot deployer.
//!
//! ## Binaries
//! - `minter` - lifecycle watcher and action CLI
//! - `deploy` - publish the contract and print its account id

pub mod config;
pub mod contract;
pub mod deploy;
mod error;
pub mod lifecycle;
pub mod rpc;
pub mod store;
pub mod wallet;

pub use config::{Config, DeployConfig};
pub use contract::NftContract;
pub use error::Error;
pub use lifecycle::PresaleLifecycle;
pub use rpc::RpcClient;
pub use store::{RenderState, StatusStore};
pub use wallet::Wallet;
