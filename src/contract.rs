//! Typed client for the remote NFT presale contract.

use crate::rpc::RpcClient;
use crate::wallet::Wallet;
use near_gas::NearGas;
use near_primitives::transaction::{Action, FunctionCallAction};
use near_primitives::types::AccountId;
use near_primitives::views::{FinalExecutionOutcomeView, FinalExecutionStatus};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Fixed mint fee: 0.01 NEAR in yocto.
pub const MINT_DEPOSIT_YOCTO: u128 = 10_000_000_000_000_000_000_000;

/// Collection size.
pub const MAX_TOKEN_IDS: u64 = 20;

/// Read/write surface of the deployed presale contract. The contract itself
/// is an opaque remote collaborator referenced only by account id.
pub struct NftContract {
    rpc: Arc<RpcClient>,
    contract_id: AccountId,
    gas: NearGas,
}

impl NftContract {
    pub fn new(rpc: Arc<RpcClient>, contract_id: AccountId, gas_tgas: u64) -> Self {
        Self {
            rpc,
            contract_id,
            gas: NearGas::from_tgas(gas_tgas),
        }
    }

    pub fn contract_id(&self) -> &AccountId {
        &self.contract_id
    }

    pub(crate) fn rpc(&self) -> &RpcClient {
        &self.rpc
    }

    // --- Read surface ---

    pub async fn presale_started(&self) -> Result<bool, crate::Error> {
        let value = self.view("presale_started").await?;
        value
            .as_bool()
            .ok_or_else(|| crate::Error::Contract("presale_started: expected bool".into()))
    }

    /// Presale end as a unix timestamp in seconds. Zero until scheduled.
    pub async fn presale_ended(&self) -> Result<u64, crate::Error> {
        let value = self.view("presale_ended").await?;
        u64_from_value(&value)
            .ok_or_else(|| crate::Error::Contract("presale_ended: expected uint".into()))
    }

    /// The contract owner's account id, as the raw string the contract reports.
    pub async fn owner(&self) -> Result<String, crate::Error> {
        let value = self.view("owner").await?;
        value
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| crate::Error::Contract("owner: expected string".into()))
    }

    /// Number of tokens minted so far.
    pub async fn token_ids(&self) -> Result<u64, crate::Error> {
        let value = self.view("token_ids").await?;
        u64_from_value(&value)
            .ok_or_else(|| crate::Error::Contract("token_ids: expected uint".into()))
    }

    // --- Write surface ---

    pub async fn start_presale(&self, wallet: &Wallet) -> Result<(), crate::Error> {
        self.call(wallet, "start_presale", 0).await
    }

    pub async fn presale_mint(&self, wallet: &Wallet) -> Result<(), crate::Error> {
        self.call(wallet, "presale_mint", MINT_DEPOSIT_YOCTO).await
    }

    pub async fn mint(&self, wallet: &Wallet) -> Result<(), crate::Error> {
        self.call(wallet, "mint", MINT_DEPOSIT_YOCTO).await
    }

    // --- Plumbing ---

    async fn view(&self, method: &str) -> Result<Value, crate::Error> {
        let bytes = self
            .rpc
            .view_function(&self.contract_id, method, b"{}".to_vec())
            .await?;
        serde_json::from_slice(&bytes)
            .map_err(|e| crate::Error::Contract(format!("{method}: invalid JSON result: {e}")))
    }

    async fn call(&self, wallet: &Wallet, method: &str, deposit: u128) -> Result<(), crate::Error> {
        let actions = vec![Action::FunctionCall(Box::new(FunctionCallAction {
            method_name: method.to_string(),
            args: b"{}".to_vec(),
            gas: self.gas.as_gas(),
            deposit,
        }))];

        let signed_tx = wallet.sign(&self.rpc, &self.contract_id, actions).await?;
        let outcome = self.rpc.send_signed_tx(signed_tx).await?;
        check_outcome(method, outcome)
    }
}

fn check_outcome(method: &str, outcome: FinalExecutionOutcomeView) -> Result<(), crate::Error> {
    match outcome.status {
        FinalExecutionStatus::SuccessValue(_) => {
            info!(method, tx_hash = %outcome.transaction_outcome.id, "TX executed");
            Ok(())
        }
        FinalExecutionStatus::Failure(e) => Err(crate::Error::Contract(format!("{method}: {e:?}"))),
        FinalExecutionStatus::Started | FinalExecutionStatus::NotStarted => Err(
            crate::Error::Rpc(format!("{method}: TX not finalized by commit endpoint")),
        ),
    }
}

/// Contracts serialize u64/u128 either as a JSON number or a decimal string.
fn u64_from_value(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_mint_deposit_is_one_hundredth_near() {
        // 1 NEAR = 10^24 yocto.
        assert_eq!(MINT_DEPOSIT_YOCTO * 100, 1_000_000_000_000_000_000_000_000);
    }

    #[test]
    fn test_u64_from_number_and_string() {
        assert_eq!(u64_from_value(&json!(42)), Some(42));
        assert_eq!(u64_from_value(&json!("42")), Some(42));
        assert_eq!(u64_from_value(&json!(true)), None);
        assert_eq!(u64_from_value(&json!("not a number")), None);
    }
}
