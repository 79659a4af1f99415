//! Local wallet: key loading, network-checked connection, transaction signing.

use crate::rpc::RpcClient;
use near_crypto::{PublicKey, SecretKey, Signer};
use near_primitives::transaction::{Action, SignedTransaction, Transaction, TransactionV0};
use near_primitives::types::AccountId;
use std::str::FromStr;
use tracing::info;

/// A signing wallet bound to one account.
pub struct Wallet {
    signer: Signer,
    account_id: AccountId,
}

impl Wallet {
    /// Load key material from the `MINTER_KEYS_JSON` env var when set,
    /// otherwise from a near-cli-format JSON key file.
    pub fn load(keys_path: &str) -> Result<Self, crate::Error> {
        let json = match std::env::var("MINTER_KEYS_JSON") {
            Ok(j) if !j.is_empty() => j,
            _ => std::fs::read_to_string(keys_path)
                .map_err(|e| crate::Error::Wallet(format!("failed to read {keys_path}: {e}")))?,
        };
        let wallet = Self::from_keys_json(&json)?;
        info!(account = %wallet.account_id, "Loaded wallet key");
        Ok(wallet)
    }

    /// Parse keys JSON in the near-cli format:
    /// `{"account_id": "...", "public_key": "...", "private_key": "..."}`
    /// or an array of such objects (first entry wins).
    pub fn from_keys_json(json: &str) -> Result<Self, crate::Error> {
        #[derive(serde::Deserialize)]
        struct KeyFile {
            account_id: String,
            #[serde(alias = "private_key")]
            secret_key: String,
        }

        let key: KeyFile = if json.trim().starts_with('[') {
            let keys: Vec<KeyFile> = serde_json::from_str(json)
                .map_err(|e| crate::Error::Wallet(format!("invalid key JSON: {e}")))?;
            keys.into_iter()
                .next()
                .ok_or_else(|| crate::Error::Wallet("empty key array".to_string()))?
        } else {
            serde_json::from_str(json)
                .map_err(|e| crate::Error::Wallet(format!("invalid key JSON: {e}")))?
        };

        let secret_key = SecretKey::from_str(&key.secret_key)
            .map_err(|e| crate::Error::Wallet(format!("invalid secret key: {e}")))?;
        let account_id: AccountId = key
            .account_id
            .parse()
            .map_err(|e| crate::Error::Wallet(format!("invalid account: {e}")))?;

        Ok(Self {
            signer: near_crypto::InMemorySigner::from_secret_key(account_id.clone(), secret_key),
            account_id,
        })
    }

    pub fn account_id(&self) -> &AccountId {
        &self.account_id
    }

    pub fn public_key(&self) -> PublicKey {
        self.signer.public_key()
    }

    /// Verify the RPC endpoint serves the configured target network.
    /// Errors with `WrongNetwork` on mismatch; the session stays unusable.
    pub async fn connect(&self, rpc: &RpcClient) -> Result<(), crate::Error> {
        rpc.ensure_network().await?;
        info!(account = %self.account_id, network = rpc.network_id(), "Wallet connected");
        Ok(())
    }

    /// Build and sign a transaction against the current chain nonce and a
    /// recent block hash. Re-checks the target network first.
    pub async fn sign(
        &self,
        rpc: &RpcClient,
        receiver_id: &AccountId,
        actions: Vec<Action>,
    ) -> Result<SignedTransaction, crate::Error> {
        rpc.ensure_network().await?;

        let access_key = rpc
            .query_access_key(&self.account_id, &self.signer.public_key())
            .await?;
        let block_hash = rpc.latest_block_hash().await?;

        let signed_tx = Transaction::V0(TransactionV0 {
            signer_id: self.account_id.clone(),
            public_key: self.signer.public_key(),
            nonce: access_key.nonce + 1,
            receiver_id: receiver_id.clone(),
            block_hash,
            actions,
        })
        .sign(&self.signer);
        Ok(signed_tx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use near_crypto::KeyType;

    fn random_secret() -> String {
        SecretKey::from_random(KeyType::ED25519).to_string()
    }

    #[test]
    fn test_parse_single_key_object() {
        let secret = random_secret();
        let json = format!(r#"{{"account_id": "alice.testnet", "secret_key": "{secret}"}}"#);
        let wallet = Wallet::from_keys_json(&json).unwrap();
        assert_eq!(wallet.account_id().as_str(), "alice.testnet");
    }

    #[test]
    fn test_parse_private_key_alias() {
        let secret = random_secret();
        let json = format!(r#"{{"account_id": "alice.testnet", "private_key": "{secret}"}}"#);
        let wallet = Wallet::from_keys_json(&json).unwrap();
        assert_eq!(wallet.account_id().as_str(), "alice.testnet");
    }

    #[test]
    fn test_parse_key_array_takes_first() {
        let s1 = random_secret();
        let s2 = random_secret();
        let json = format!(
            r#"[{{"account_id": "a.testnet", "secret_key": "{s1}"}},
                {{"account_id": "b.testnet", "secret_key": "{s2}"}}]"#
        );
        let wallet = Wallet::from_keys_json(&json).unwrap();
        assert_eq!(wallet.account_id().as_str(), "a.testnet");
    }

    #[test]
    fn test_empty_array_is_an_error() {
        assert!(Wallet::from_keys_json("[]").is_err());
    }

    #[test]
    fn test_garbage_secret_key_is_an_error() {
        let json = r#"{"account_id": "a.testnet", "secret_key": "not-a-key"}"#;
        assert!(Wallet::from_keys_json(json).is_err());
    }
}
