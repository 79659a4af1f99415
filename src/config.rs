//! Minter and deployer configuration.

use serde::Deserialize;

/// Configuration for the presale minter.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    /// Target chain id. Provider acquisition fails on any other network.
    #[serde(default = "defaults::network_id")]
    pub network_id: String,

    #[serde(default = "defaults::contract_id")]
    pub contract_id: String,

    #[serde(default = "defaults::keys_path")]
    pub keys_path: String,

    #[serde(default = "defaults::poll_interval_secs")]
    pub poll_interval_secs: u64,

    #[serde(default = "defaults::gas_tgas")]
    pub gas_tgas: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            rpc_url: defaults::rpc_url(),
            fallback_rpc_url: defaults::fallback_rpc_url(),
            network_id: defaults::network_id(),
            contract_id: defaults::contract_id(),
            keys_path: defaults::keys_path(),
            poll_interval_secs: defaults::poll_interval_secs(),
            gas_tgas: defaults::gas_tgas(),
        }
    }
}

impl Config {
    /// Load from `minter.toml` (optional) layered under `MINTER_*` env vars.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("minter").required(false))
            .add_source(config::Environment::with_prefix("MINTER"))
            .build()
            .and_then(|c| c.try_deserialize())
    }
}

/// Configuration for the one-shot deployer. `metadata_base_uri` and
/// `whitelist_contract_id` have no defaults; a missing value fails the run.
#[derive(Debug, Clone, Deserialize)]
pub struct DeployConfig {
    #[serde(default = "defaults::rpc_url")]
    pub rpc_url: String,

    #[serde(default = "defaults::fallback_rpc_url")]
    pub fallback_rpc_url: String,

    #[serde(default = "defaults::network_id")]
    pub network_id: String,

    #[serde(default = "defaults::keys_path")]
    pub keys_path: String,

    #[serde(default = "defaults::wasm_path")]
    pub wasm_path: String,

    /// Base URI the deployed collection serves token metadata from.
    pub metadata_base_uri: String,

    /// Pre-existing whitelist contract consulted during presale.
    pub whitelist_contract_id: String,

    /// Account to deploy to. Defaults to a fresh timestamped subaccount of
    /// the signer, so re-running creates an independent instance.
    #[serde(default)]
    pub contract_account_id: Option<String>,

    /// Funding transferred to the fresh contract account (yoctoNEAR).
    #[serde(default = "defaults::initial_balance_yocto")]
    pub initial_balance_yocto: u128,

    #[serde(default = "defaults::gas_tgas")]
    pub gas_tgas: u64,
}

impl DeployConfig {
    /// Load from `deployer.toml` (optional) layered under `DEPLOYER_*` env vars.
    pub fn load() -> Result<Self, config::ConfigError> {
        config::Config::builder()
            .add_source(config::File::with_name("deployer").required(false))
            .add_source(config::Environment::with_prefix("DEPLOYER"))
            .build()
            .and_then(|c| c.try_deserialize())
    }
}

mod defaults {
    fn network() -> String {
        std::env::var("MINTER_NETWORK")
            .or_else(|_| std::env::var("NEAR_NETWORK"))
            .unwrap_or_else(|_| "testnet".into())
    }

    pub fn network_id() -> String {
        network()
    }

    pub fn rpc_url() -> String {
        if let Ok(url) = std::env::var("MINTER_RPC_URL") {
            if !url.is_empty() {
                return url;
            }
        }
        if network().contains("mainnet") {
            "https://free.rpc.fastnear.com".into()
        } else {
            "https://test.rpc.fastnear.com".into()
        }
    }

    pub fn fallback_rpc_url() -> String {
        if network().contains("mainnet") {
            "https://near.lava.build".into()
        } else {
            "https://neart.lava.build".into()
        }
    }

    pub fn contract_id() -> String {
        "nft.presale.testnet".into()
    }

    pub fn keys_path() -> String {
        "./account_keys/minter.testnet.json".into()
    }

    pub fn wasm_path() -> String {
        "./res/nft_presale.wasm".into()
    }

    pub fn poll_interval_secs() -> u64 {
        5
    }

    pub fn gas_tgas() -> u64 {
        100
    }

    pub fn initial_balance_yocto() -> u128 {
        // 5 NEAR covers code storage for a small collection contract.
        5_000_000_000_000_000_000_000_000
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_poll_interval_is_five_seconds() {
        let config = Config::default();
        assert_eq!(config.poll_interval_secs, 5);
    }

    #[test]
    fn test_default_network_is_testnet() {
        let config = Config::default();
        assert_eq!(config.network_id, "testnet");
        assert!(config.rpc_url.contains("test") || config.rpc_url.contains("neart"));
    }

    #[test]
    fn test_deploy_config_requires_constructor_params() {
        // No file, no env: missing metadata_base_uri / whitelist_contract_id
        // must surface as a config error rather than silent defaults.
        let result: Result<DeployConfig, _> = config::Config::builder()
            .build()
            .and_then(|c| c.try_deserialize());
        assert!(result.is_err());
    }
}
