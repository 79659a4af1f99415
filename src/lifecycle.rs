//! The presale lifecycle view: an eventually-consistent local reflection of
//! remote contract state, plus the four user actions that mutate it.
//!
//! Read refreshes follow a degrade-to-stale policy: a failed remote read
//! keeps the previous snapshot (its staleness visible via the store's
//! last-success timestamps) and never masquerades as a fresh negative.
//! Write actions surface their errors and always release the loading
//! indicator through an RAII guard.

use crate::contract::NftContract;
use crate::store::{describe_age, log_transition, RefreshGroup, RenderState, StatusStore};
use crate::wallet::Wallet;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

pub struct PresaleLifecycle {
    contract: NftContract,
    wallet: Wallet,
    store: Arc<StatusStore>,
    poll_interval: Duration,
}

impl PresaleLifecycle {
    pub fn new(contract: NftContract, wallet: Wallet, poll_interval_secs: u64) -> Self {
        Self {
            contract,
            wallet,
            store: Arc::new(StatusStore::new()),
            poll_interval: Duration::from_secs(poll_interval_secs),
        }
    }

    pub fn store(&self) -> &Arc<StatusStore> {
        &self.store
    }

    // --- Actions ---

    /// Connect the wallet session. Fails with `WrongNetwork` (and leaves the
    /// session disconnected) when the RPC serves a different chain.
    pub async fn connect(&self) -> Result<(), crate::Error> {
        self.wallet.connect(self.contract.rpc()).await?;
        self.store.mark_connected();
        Ok(())
    }

    /// Owner-only: open the presale window, then refresh local state.
    pub async fn start_presale(&self) -> Result<(), crate::Error> {
        let _loading = self.store.begin_loading();
        self.contract.start_presale(&self.wallet).await?;
        self.refresh_status().await;
        Ok(())
    }

    /// Mint during the presale window (fixed 0.01 NEAR fee).
    pub async fn presale_mint(&self) -> Result<(), crate::Error> {
        let _loading = self.store.begin_loading();
        self.contract.presale_mint(&self.wallet).await?;
        info!("Presale mint succeeded");
        self.refresh_minted_count().await;
        Ok(())
    }

    /// Mint after the presale has ended (fixed 0.01 NEAR fee).
    pub async fn public_mint(&self) -> Result<(), crate::Error> {
        let _loading = self.store.begin_loading();
        self.contract.mint(&self.wallet).await?;
        info!("Public mint succeeded");
        self.refresh_minted_count().await;
        Ok(())
    }

    // --- Refreshes ---

    /// Read `presale_started`; while it reads false, also recompute the owner
    /// flag from the contract's reported owner. Returns the started flag
    /// (the stale one when the read fails).
    pub async fn refresh_status(&self) -> bool {
        let ticket = self.store.begin();
        let started = match self.contract.presale_started().await {
            Ok(s) => s,
            Err(e) => {
                warn!(
                    error = %e,
                    age = %describe_age(self.store.staleness(RefreshGroup::Presale)),
                    "presale_started read failed, keeping stale snapshot"
                );
                return self.store.snapshot().presale_started;
            }
        };

        // Owner flag is only recomputed before the presale starts; once
        // started it stays at its last computed value.
        let owner = if !started {
            match self.contract.owner().await {
                Ok(owner) => Some(owner_matches(&owner, self.wallet.account_id().as_str())),
                Err(e) => {
                    warn!(error = %e, "owner read failed, keeping previous owner flag");
                    None
                }
            }
        } else {
            None
        };

        self.store.commit_status(ticket, started, owner);
        started
    }

    /// Read the presale end timestamp and compare against wall-clock now.
    /// Ended only when the deadline is strictly in the past.
    pub async fn refresh_ended(&self) -> bool {
        let ticket = self.store.begin();
        match self.contract.presale_ended().await {
            Ok(ends_at) => {
                let ended = presale_has_ended(ends_at, now_secs());
                self.store.commit_ended(ticket, ended);
                ended
            }
            Err(e) => {
                warn!(
                    error = %e,
                    age = %describe_age(self.store.staleness(RefreshGroup::Presale)),
                    "presale_ended read failed, keeping stale snapshot"
                );
                self.store.snapshot().presale_ended
            }
        }
    }

    /// Snapshot the minted counter; a failed read retains the stale value.
    pub async fn refresh_minted_count(&self) -> u64 {
        let ticket = self.store.begin();
        match self.contract.token_ids().await {
            Ok(count) => {
                self.store.commit_minted(ticket, count);
                count
            }
            Err(e) => {
                warn!(
                    error = %e,
                    age = %describe_age(self.store.staleness(RefreshGroup::Minted)),
                    "token_ids read failed, keeping stale count"
                );
                self.store.snapshot().tokens_minted
            }
        }
    }

    /// Refresh everything once: status, ended (when started), minted count.
    pub async fn refresh_all(&self) {
        if self.refresh_status().await {
            self.refresh_ended().await;
        }
        self.refresh_minted_count().await;
    }

    // --- Watch loop ---

    /// Poll the contract until cancelled. One interval drives the
    /// status/ended checks and stops once the presale has ended; a second
    /// keeps the minted counter fresh for the life of the process. State
    /// transitions are logged as they land.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut presale_tick = tokio::time::interval(self.poll_interval);
        let mut minted_tick = tokio::time::interval(self.poll_interval);
        let mut presale_settled = false;
        let mut last_state: Option<RenderState> = None;

        loop {
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = presale_tick.tick(), if !presale_settled => {
                    if self.refresh_status().await && self.refresh_ended().await {
                        info!("Presale ended, stopping presale polling");
                        presale_settled = true;
                    }
                }
                _ = minted_tick.tick() => {
                    self.refresh_minted_count().await;
                }
            }

            let state = self.store.render();
            log_transition(last_state, state);
            last_state = Some(state);
        }
    }
}

/// Strictly-less comparison: a presale whose deadline equals "now" has not
/// ended yet.
pub fn presale_has_ended(ends_at: u64, now: u64) -> bool {
    ends_at < now
}

/// Case-insensitive owner comparison against the connected account.
pub fn owner_matches(owner: &str, account: &str) -> bool {
    owner.eq_ignore_ascii_case(account)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs()
}

#[cfg(test)]
mod tests {
    use super::*;

    // --- Ended comparison ---

    #[test]
    fn test_presale_not_ended_before_deadline() {
        assert!(!presale_has_ended(100, 50));
    }

    #[test]
    fn test_presale_not_ended_exactly_at_deadline() {
        assert!(!presale_has_ended(100, 100));
    }

    #[test]
    fn test_presale_ended_after_deadline() {
        assert!(presale_has_ended(100, 101));
    }

    // --- Owner comparison ---

    #[test]
    fn test_owner_match_is_case_insensitive() {
        assert!(owner_matches("Alice.Testnet", "alice.testnet"));
        assert!(owner_matches("alice.testnet", "ALICE.TESTNET"));
    }

    #[test]
    fn test_owner_mismatch() {
        assert!(!owner_matches("alice.testnet", "bob.testnet"));
    }
}
