//! One-shot contract deployment.
//!
//! A single transaction creates a fresh contract account, funds it, deploys
//! the wasm, and invokes the initializer with the configured metadata base
//! URI and whitelist contract id. There is no rollback and no idempotence:
//! re-running with the default account naming deploys a new, independent
//! instance.

use crate::config::DeployConfig;
use crate::rpc::RpcClient;
use crate::wallet::Wallet;
use near_gas::NearGas;
use near_primitives::transaction::{
    Action, CreateAccountAction, DeployContractAction, FunctionCallAction, TransferAction,
};
use near_primitives::types::AccountId;
use near_primitives::views::FinalExecutionStatus;
use serde::Serialize;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::info;

/// Constructor arguments, serialized in declaration order.
#[derive(Serialize)]
struct InitArgs<'a> {
    metadata_base_uri: &'a str,
    whitelist_contract_id: &'a str,
}

/// Deploy the contract and return the account it now lives at.
pub async fn run(config: DeployConfig) -> Result<AccountId, crate::Error> {
    let rpc = RpcClient::new(&config.rpc_url, &config.fallback_rpc_url, &config.network_id);
    let wallet = Wallet::load(&config.keys_path)?;
    wallet.connect(&rpc).await?;

    let code = std::fs::read(&config.wasm_path).map_err(|e| {
        crate::Error::Config(format!("failed to read wasm {}: {e}", config.wasm_path))
    })?;

    let contract_account =
        derive_contract_account(config.contract_account_id.as_deref(), wallet.account_id())?;

    info!(
        contract = %contract_account,
        wasm_bytes = code.len(),
        whitelist = %config.whitelist_contract_id,
        metadata = %config.metadata_base_uri,
        "Deploying NFT contract"
    );

    let args = init_args(&config.metadata_base_uri, &config.whitelist_contract_id)?;
    let actions = vec![
        Action::CreateAccount(CreateAccountAction {}),
        Action::Transfer(TransferAction {
            deposit: config.initial_balance_yocto,
        }),
        Action::DeployContract(DeployContractAction { code }),
        Action::FunctionCall(Box::new(FunctionCallAction {
            method_name: "new".to_string(),
            args,
            gas: NearGas::from_tgas(config.gas_tgas).as_gas(),
            deposit: 0,
        })),
    ];

    let signed_tx = wallet.sign(&rpc, &contract_account, actions).await?;
    let outcome = rpc.send_signed_tx(signed_tx).await?;

    match outcome.status {
        FinalExecutionStatus::SuccessValue(_) => {
            info!(tx_hash = %outcome.transaction_outcome.id, "Deployment transaction finalized");
            Ok(contract_account)
        }
        FinalExecutionStatus::Failure(e) => {
            Err(crate::Error::Contract(format!("deployment failed: {e:?}")))
        }
        FinalExecutionStatus::Started | FinalExecutionStatus::NotStarted => Err(crate::Error::Rpc(
            "deployment TX not finalized by commit endpoint".into(),
        )),
    }
}

/// Initializer arguments: metadata base URI first, whitelist contract second.
fn init_args(metadata_base_uri: &str, whitelist_contract_id: &str) -> Result<Vec<u8>, crate::Error> {
    serde_json::to_vec(&InitArgs {
        metadata_base_uri,
        whitelist_contract_id,
    })
    .map_err(|e| crate::Error::Config(format!("failed to encode init args: {e}")))
}

/// Explicit account when configured, otherwise a fresh timestamped
/// subaccount of the signer.
fn derive_contract_account(
    configured: Option<&str>,
    signer: &AccountId,
) -> Result<AccountId, crate::Error> {
    let raw = match configured {
        Some(id) => id.to_string(),
        None => format!("nft-{}.{signer}", unix_now()),
    };
    raw.parse()
        .map_err(|e| crate::Error::Config(format!("invalid contract account {raw}: {e}")))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_args_order_metadata_then_whitelist() {
        let args = init_args("ipfs://x", "whitelist.testnet").unwrap();
        assert_eq!(
            String::from_utf8(args).unwrap(),
            r#"{"metadata_base_uri":"ipfs://x","whitelist_contract_id":"whitelist.testnet"}"#
        );
    }

    #[test]
    fn test_derive_account_uses_configured_id() {
        let signer: AccountId = "alice.testnet".parse().unwrap();
        let account = derive_contract_account(Some("nft.alice.testnet"), &signer).unwrap();
        assert_eq!(account.as_str(), "nft.alice.testnet");
    }

    #[test]
    fn test_derive_account_defaults_to_fresh_subaccount() {
        let signer: AccountId = "alice.testnet".parse().unwrap();
        let account = derive_contract_account(None, &signer).unwrap();
        assert!(account.as_str().starts_with("nft-"));
        assert!(account.as_str().ends_with(".alice.testnet"));
    }

    #[test]
    fn test_derive_account_rejects_invalid_id() {
        let signer: AccountId = "alice.testnet".parse().unwrap();
        assert!(derive_contract_account(Some("NOT VALID"), &signer).is_err());
    }
}
