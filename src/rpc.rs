//! RPC client with primary → fallback failover and target-network enforcement.

use near_crypto::PublicKey;
use near_jsonrpc_client::methods;
use near_jsonrpc_client::JsonRpcClient;
use near_primitives::hash::CryptoHash;
use near_primitives::transaction::SignedTransaction;
use near_primitives::types::{AccountId, BlockReference, Finality, FunctionArgs};
use near_primitives::views::{AccessKeyView, FinalExecutionOutcomeView, QueryRequest};
use std::sync::Mutex;
use std::time::Instant;
use tokio::sync::RwLock;
use tracing::{info, warn};

/// Cached block hash / chain id TTL.
const CACHE_TTL_SECS: u64 = 30;

const CIRCUIT_BREAKER_THRESHOLD: u64 = 5;
const CIRCUIT_BREAKER_WINDOW_MS: u64 = 30_000;

struct CircuitState {
    failures: u64,
    last_failure_ms: u64,
    open: bool,
}

/// JSON-RPC client bound to a single target network.
///
/// Every provider acquisition re-verifies the remote chain id against the
/// configured target (served from a short-lived cache between polls), so a
/// wallet pointed at the wrong network fails fast instead of reading or
/// writing foreign state.
pub struct RpcClient {
    primary: JsonRpcClient,
    fallback: JsonRpcClient,
    primary_url: String,
    fallback_url: String,
    network_id: String,
    circuit: Mutex<CircuitState>,
    cached_block_hash: RwLock<Option<(CryptoHash, Instant)>>,
    cached_chain_id: RwLock<Option<(String, Instant)>>,
}

impl RpcClient {
    pub fn new(primary_url: &str, fallback_url: &str, network_id: &str) -> Self {
        info!(
            primary = primary_url,
            fallback = fallback_url,
            network = network_id,
            "RPC client initialized with failover"
        );
        Self {
            primary: JsonRpcClient::connect(primary_url),
            fallback: JsonRpcClient::connect(fallback_url),
            primary_url: primary_url.to_string(),
            fallback_url: fallback_url.to_string(),
            network_id: network_id.to_string(),
            circuit: Mutex::new(CircuitState {
                failures: 0,
                last_failure_ms: 0,
                open: false,
            }),
            cached_block_hash: RwLock::new(None),
            cached_chain_id: RwLock::new(None),
        }
    }

    /// The configured target network id.
    pub fn network_id(&self) -> &str {
        &self.network_id
    }

    /// Verify the remote chain id matches the configured target.
    ///
    /// Runs on every provider acquisition; a fresh (<30s) verified chain id
    /// is served from cache so steady-state polling costs one extra RPC per
    /// TTL window, not per call.
    pub async fn ensure_network(&self) -> Result<(), crate::Error> {
        let chain_id = {
            let cache = self.cached_chain_id.read().await;
            match *cache {
                Some((ref id, when)) if when.elapsed().as_secs() < CACHE_TTL_SECS => {
                    Some(id.clone())
                }
                _ => None,
            }
        };

        let chain_id = match chain_id {
            Some(id) => id,
            None => {
                let status = match self.active().call(methods::status::RpcStatusRequest).await {
                    Ok(s) => {
                        self.record_success();
                        s
                    }
                    Err(e) => {
                        self.record_failure();
                        warn!(error = %e, "Primary RPC status query failed, trying fallback");
                        self.fallback
                            .call(methods::status::RpcStatusRequest)
                            .await
                            .map_err(|e2| {
                                crate::Error::Rpc(format!(
                                    "status query failed on both RPCs: primary={e}, fallback={e2}"
                                ))
                            })?
                    }
                };
                let id = status.chain_id;
                let mut cache = self.cached_chain_id.write().await;
                *cache = Some((id.clone(), Instant::now()));
                id
            }
        };

        check_chain_id(&self.network_id, &chain_id)
    }

    /// Call a read-only contract method and return the raw result bytes.
    pub async fn view_function(
        &self,
        contract_id: &AccountId,
        method_name: &str,
        args: Vec<u8>,
    ) -> Result<Vec<u8>, crate::Error> {
        self.ensure_network().await?;

        let make_request = || methods::query::RpcQueryRequest {
            block_reference: BlockReference::Finality(Finality::Final),
            request: QueryRequest::CallFunction {
                account_id: contract_id.clone(),
                method_name: method_name.to_string(),
                args: FunctionArgs::from(args.clone()),
            },
        };

        let resp = match self.active().call(make_request()).await {
            Ok(r) => {
                self.record_success();
                r
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, method = method_name, "RPC view call failed, trying fallback");
                self.fallback.call(make_request()).await.map_err(|e2| {
                    crate::Error::Rpc(format!(
                        "view call {method_name} failed: primary={e}, fallback={e2}"
                    ))
                })?
            }
        };

        match resp.kind {
            near_jsonrpc_primitives::types::query::QueryResponseKind::CallResult(result) => {
                Ok(result.result)
            }
            other => Err(crate::Error::Rpc(format!(
                "unexpected query response: {other:?}"
            ))),
        }
    }

    /// Get a recent block hash, using cache when fresh (<30s).
    pub async fn latest_block_hash(&self) -> Result<CryptoHash, crate::Error> {
        {
            let cache = self.cached_block_hash.read().await;
            if let Some((hash, when)) = *cache {
                if when.elapsed().as_secs() < CACHE_TTL_SECS {
                    return Ok(hash);
                }
            }
        }
        let block = match self
            .active()
            .call(methods::block::RpcBlockRequest {
                block_reference: BlockReference::Finality(Finality::Final),
            })
            .await
        {
            Ok(b) => {
                self.record_success();
                b
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "Primary RPC block query failed, trying fallback");
                self.fallback
                    .call(methods::block::RpcBlockRequest {
                        block_reference: BlockReference::Finality(Finality::Final),
                    })
                    .await
                    .map_err(|e2| {
                        crate::Error::Rpc(format!(
                            "block query failed on both RPCs: primary={e}, fallback={e2}"
                        ))
                    })?
            }
        };
        let hash = block.header.hash;
        {
            let mut cache = self.cached_block_hash.write().await;
            *cache = Some((hash, Instant::now()));
        }
        Ok(hash)
    }

    /// Query an access key's on-chain state (nonce). Automatic failover.
    pub async fn query_access_key(
        &self,
        account_id: &AccountId,
        public_key: &PublicKey,
    ) -> Result<AccessKeyView, crate::Error> {
        let make_request = || methods::query::RpcQueryRequest {
            block_reference: BlockReference::Finality(Finality::Final),
            request: QueryRequest::ViewAccessKey {
                account_id: account_id.clone(),
                public_key: public_key.clone(),
            },
        };

        let resp = match self.active().call(make_request()).await {
            Ok(r) => {
                self.record_success();
                r
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "RPC access_key query failed, trying fallback");
                self.fallback.call(make_request()).await.map_err(|e2| {
                    crate::Error::Rpc(format!(
                        "access_key query failed: primary={e}, fallback={e2}"
                    ))
                })?
            }
        };

        match resp.kind {
            near_jsonrpc_primitives::types::query::QueryResponseKind::AccessKey(ak) => Ok(ak),
            other => Err(crate::Error::Rpc(format!(
                "unexpected query response: {other:?}"
            ))),
        }
    }

    /// Send a signed transaction and wait for finality. Automatic failover.
    pub async fn send_signed_tx(
        &self,
        signed_tx: SignedTransaction,
    ) -> Result<FinalExecutionOutcomeView, crate::Error> {
        match self
            .active()
            .call(methods::broadcast_tx_commit::RpcBroadcastTxCommitRequest {
                signed_transaction: signed_tx.clone(),
            })
            .await
        {
            Ok(outcome) => {
                self.record_success();
                Ok(outcome)
            }
            Err(e) => {
                self.record_failure();
                warn!(error = %e, "Primary broadcast_tx_commit failed, trying fallback");
                self.fallback
                    .call(methods::broadcast_tx_commit::RpcBroadcastTxCommitRequest {
                        signed_transaction: signed_tx,
                    })
                    .await
                    .map_err(|e2| {
                        crate::Error::Rpc(format!(
                            "broadcast_tx_commit failed: primary={e}, fallback={e2}"
                        ))
                    })
            }
        }
    }

    // --- Failover / circuit breaker ---

    /// Active client (primary unless circuit is open).
    fn active(&self) -> &JsonRpcClient {
        if self.is_circuit_open() {
            &self.fallback
        } else {
            &self.primary
        }
    }

    fn record_success(&self) {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if circuit.failures > 0 {
            info!(primary = %self.primary_url, "Primary RPC recovered");
            circuit.failures = 0;
            circuit.open = false;
        }
    }

    fn record_failure(&self) {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        circuit.failures += 1;
        circuit.last_failure_ms = now_ms();
        if circuit.failures >= CIRCUIT_BREAKER_THRESHOLD && !circuit.open {
            circuit.open = true;
            warn!(
                failures = circuit.failures,
                fallback = %self.fallback_url,
                "Circuit breaker opened, routing to fallback"
            );
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        let mut circuit = self.circuit.lock().unwrap_or_else(|e| e.into_inner());
        if !circuit.open {
            return false;
        }
        if now_ms() - circuit.last_failure_ms > CIRCUIT_BREAKER_WINDOW_MS {
            circuit.open = false;
            circuit.failures = 0;
            info!(primary = %self.primary_url, "Circuit breaker half-open, retrying primary");
            return false;
        }
        true
    }

    /// Currently active RPC URL.
    pub fn active_url(&self) -> &str {
        if self.is_circuit_open() {
            &self.fallback_url
        } else {
            &self.primary_url
        }
    }
}

/// Reject any remote chain id other than the configured target.
fn check_chain_id(expected: &str, actual: &str) -> Result<(), crate::Error> {
    if actual != expected {
        return Err(crate::Error::WrongNetwork {
            expected: expected.to_string(),
            actual: actual.to_string(),
        });
    }
    Ok(())
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dummy_client() -> RpcClient {
        RpcClient::new("http://127.0.0.1:1", "http://127.0.0.1:2", "testnet")
    }

    #[test]
    fn test_circuit_stays_closed_below_threshold() {
        let client = dummy_client();
        for _ in 0..CIRCUIT_BREAKER_THRESHOLD - 1 {
            client.record_failure();
        }
        assert!(!client.is_circuit_open());
        assert_eq!(client.active_url(), "http://127.0.0.1:1");
    }

    #[test]
    fn test_circuit_opens_at_threshold_and_routes_to_fallback() {
        let client = dummy_client();
        for _ in 0..CIRCUIT_BREAKER_THRESHOLD {
            client.record_failure();
        }
        assert!(client.is_circuit_open());
        assert_eq!(client.active_url(), "http://127.0.0.1:2");
    }

    #[test]
    fn test_chain_id_mismatch_is_wrong_network() {
        match check_chain_id("testnet", "mainnet") {
            Err(crate::Error::WrongNetwork { expected, actual }) => {
                assert_eq!(expected, "testnet");
                assert_eq!(actual, "mainnet");
            }
            other => panic!("expected WrongNetwork, got {other:?}"),
        }
    }

    #[test]
    fn test_chain_id_match_passes() {
        assert!(check_chain_id("testnet", "testnet").is_ok());
    }

    #[test]
    fn test_success_resets_circuit() {
        let client = dummy_client();
        for _ in 0..CIRCUIT_BREAKER_THRESHOLD {
            client.record_failure();
        }
        client.record_success();
        assert!(!client.is_circuit_open());
    }
}
