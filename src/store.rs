//! Single-owner presale view state with explicit refresh ordering.
//!
//! Every remote read takes a [`Ticket`] when it begins; a completion commits
//! only if no younger ticket in the same refresh group has committed first.
//! Out-of-order completions are rejected instead of silently clobbering
//! fresher state, and each group carries a last-success timestamp so a stale
//! snapshot is distinguishable from a fresh negative read.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// Refresh ordering token, issued when a remote read begins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

/// Which part of the snapshot a refresh updates. The presale flags and the
/// minted counter are polled by independent timers, so each orders its own
/// commits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshGroup {
    Presale,
    Minted,
}

/// Point-in-time copy of the view state.
#[derive(Debug, Clone, Default)]
pub struct Snapshot {
    pub connected: bool,
    pub presale_started: bool,
    pub presale_ended: bool,
    pub is_owner: bool,
    pub tokens_minted: u64,
    /// Bumped on every committed refresh.
    pub seq: u64,
    pub presale_refreshed_at: Option<Instant>,
    pub minted_refreshed_at: Option<Instant>,
    presale_ticket: u64,
    minted_ticket: u64,
}

/// The single owner of mutable view state.
pub struct StatusStore {
    inner: Mutex<Snapshot>,
    next_ticket: AtomicU64,
    loading: AtomicBool,
}

impl StatusStore {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Snapshot::default()),
            next_ticket: AtomicU64::new(1),
            loading: AtomicBool::new(false),
        }
    }

    /// Issue the next refresh ticket. Call before the remote read starts.
    pub fn begin(&self) -> Ticket {
        Ticket(self.next_ticket.fetch_add(1, Ordering::Relaxed))
    }

    pub fn snapshot(&self) -> Snapshot {
        self.lock().clone()
    }

    pub fn mark_connected(&self) {
        let mut snap = self.lock();
        snap.connected = true;
        snap.seq += 1;
    }

    /// Commit a presale-status read. `owner` is `Some` only when the flag was
    /// recomputed this cycle (it is read solely while presale has not
    /// started, freezing afterwards). Returns false if a younger commit
    /// already landed and this one was rejected as stale.
    pub fn commit_status(&self, ticket: Ticket, started: bool, owner: Option<bool>) -> bool {
        let mut snap = self.lock();
        if ticket.0 <= snap.presale_ticket {
            debug!(ticket = ticket.0, latest = snap.presale_ticket, "Stale status commit rejected");
            return false;
        }
        snap.presale_ticket = ticket.0;
        snap.presale_started = started;
        if let Some(is_owner) = owner {
            snap.is_owner = is_owner;
        }
        snap.presale_refreshed_at = Some(Instant::now());
        snap.seq += 1;
        true
    }

    /// Commit a presale-ended read. Same staleness rule as status commits.
    pub fn commit_ended(&self, ticket: Ticket, ended: bool) -> bool {
        let mut snap = self.lock();
        if ticket.0 <= snap.presale_ticket {
            debug!(ticket = ticket.0, latest = snap.presale_ticket, "Stale ended commit rejected");
            return false;
        }
        snap.presale_ticket = ticket.0;
        snap.presale_ended = ended;
        snap.presale_refreshed_at = Some(Instant::now());
        snap.seq += 1;
        true
    }

    /// Commit a minted-counter read.
    pub fn commit_minted(&self, ticket: Ticket, count: u64) -> bool {
        let mut snap = self.lock();
        if ticket.0 <= snap.minted_ticket {
            debug!(ticket = ticket.0, latest = snap.minted_ticket, "Stale minted commit rejected");
            return false;
        }
        snap.minted_ticket = ticket.0;
        snap.tokens_minted = count;
        snap.minted_refreshed_at = Some(Instant::now());
        snap.seq += 1;
        true
    }

    /// Age of the last successful refresh for a group, if any succeeded.
    pub fn staleness(&self, group: RefreshGroup) -> Option<Duration> {
        let snap = self.lock();
        let at = match group {
            RefreshGroup::Presale => snap.presale_refreshed_at,
            RefreshGroup::Minted => snap.minted_refreshed_at,
        };
        at.map(|t| t.elapsed())
    }

    /// RAII loading indicator. Always cleared on drop, success or failure.
    pub fn begin_loading(&self) -> LoadingGuard<'_> {
        self.loading.store(true, Ordering::Relaxed);
        LoadingGuard { store: self }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.load(Ordering::Relaxed)
    }

    /// Derive the render state from the current snapshot.
    pub fn render(&self) -> RenderState {
        let snap = self.snapshot();
        if !snap.connected {
            return RenderState::Disconnected;
        }
        if self.is_loading() {
            return RenderState::Loading;
        }
        if snap.is_owner && !snap.presale_started {
            return RenderState::OwnerPrePresale;
        }
        if !snap.presale_started {
            return RenderState::AwaitingPresale;
        }
        if !snap.presale_ended {
            return RenderState::PresaleOpen;
        }
        RenderState::PresaleClosed
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Snapshot> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Default for StatusStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Guard from [`StatusStore::begin_loading`]. Clears the flag on drop.
pub struct LoadingGuard<'a> {
    store: &'a StatusStore,
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.store.loading.store(false, Ordering::Relaxed);
    }
}

/// User-facing lifecycle state, derived from the snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderState {
    Disconnected,
    Loading,
    /// Presale not started and the connected account owns the contract.
    OwnerPrePresale,
    AwaitingPresale,
    PresaleOpen,
    PresaleClosed,
}

impl fmt::Display for RenderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            RenderState::Disconnected => "connect your wallet",
            RenderState::Loading => "loading...",
            RenderState::OwnerPrePresale => "presale not started; owner may start it",
            RenderState::AwaitingPresale => "presale hasn't started yet",
            RenderState::PresaleOpen => "presale is open: whitelisted addresses can mint",
            RenderState::PresaleClosed => "public mint is open",
        };
        f.write_str(text)
    }
}

/// Human-readable refresh age, so a stale snapshot reads differently from a
/// fresh negative result.
pub fn describe_age(age: Option<Duration>) -> String {
    match age {
        Some(age) => format!("refreshed {}s ago", age.as_secs()),
        None => "never refreshed".into(),
    }
}

/// Log a render-state transition.
pub fn log_transition(from: Option<RenderState>, to: RenderState) {
    match from {
        Some(prev) if prev != to => info!(from = %prev, to = %to, "View state changed"),
        None => info!(state = %to, "View state"),
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connected_store() -> StatusStore {
        let store = StatusStore::new();
        store.mark_connected();
        store
    }

    // --- Connection ---

    #[test]
    fn test_failed_connect_leaves_session_disconnected() {
        let store = StatusStore::new();
        let connect_result: Result<(), crate::Error> = Err(crate::Error::WrongNetwork {
            expected: "testnet".into(),
            actual: "mainnet".into(),
        });
        // mark_connected only runs on the success path, as in
        // PresaleLifecycle::connect.
        if connect_result.is_ok() {
            store.mark_connected();
        }
        assert!(!store.snapshot().connected);
        assert_eq!(store.render(), RenderState::Disconnected);
    }

    // --- Ordering ---

    #[test]
    fn test_in_order_commits_apply() {
        let store = connected_store();
        let t1 = store.begin();
        let t2 = store.begin();
        assert!(store.commit_status(t1, false, None));
        assert!(store.commit_status(t2, true, None));
        assert!(store.snapshot().presale_started);
    }

    #[test]
    fn test_out_of_order_completion_is_rejected() {
        let store = connected_store();
        // Two overlapping refreshes: the younger (t2) completes first.
        let t1 = store.begin();
        let t2 = store.begin();
        assert!(store.commit_status(t2, true, None));
        assert!(!store.commit_status(t1, false, None));
        // The younger refresh wins deterministically.
        assert!(store.snapshot().presale_started);
    }

    #[test]
    fn test_rejected_commit_does_not_bump_seq() {
        let store = connected_store();
        let t1 = store.begin();
        let t2 = store.begin();
        store.commit_status(t2, true, None);
        let seq = store.snapshot().seq;
        store.commit_status(t1, false, None);
        assert_eq!(store.snapshot().seq, seq);
    }

    #[test]
    fn test_minted_and_presale_groups_order_independently() {
        let store = connected_store();
        let t1 = store.begin();
        let t2 = store.begin();
        // A younger presale commit must not invalidate an older minted one.
        assert!(store.commit_status(t2, true, None));
        assert!(store.commit_minted(t1, 7));
        assert_eq!(store.snapshot().tokens_minted, 7);
    }

    #[test]
    fn test_repeated_minted_commit_is_idempotent() {
        let store = connected_store();
        store.commit_minted(store.begin(), 12);
        store.commit_minted(store.begin(), 12);
        assert_eq!(store.snapshot().tokens_minted, 12);
    }

    // --- Owner flag ---

    #[test]
    fn test_owner_flag_frozen_when_not_recomputed() {
        let store = connected_store();
        assert!(store.commit_status(store.begin(), false, Some(true)));
        // Presale starts; owner is no longer recomputed.
        assert!(store.commit_status(store.begin(), true, None));
        assert!(store.snapshot().is_owner);
    }

    // --- Staleness ---

    #[test]
    fn test_staleness_none_before_first_success() {
        let store = connected_store();
        assert!(store.staleness(RefreshGroup::Presale).is_none());
        store.commit_status(store.begin(), false, None);
        assert!(store.staleness(RefreshGroup::Presale).is_some());
        assert!(store.staleness(RefreshGroup::Minted).is_none());
    }

    #[test]
    fn test_describe_age_distinguishes_never_from_stale() {
        assert_eq!(describe_age(None), "never refreshed");
        assert_eq!(
            describe_age(Some(Duration::from_secs(7))),
            "refreshed 7s ago"
        );
    }

    // --- Loading guard ---

    #[test]
    fn test_loading_guard_clears_on_drop() {
        let store = connected_store();
        {
            let _guard = store.begin_loading();
            assert!(store.is_loading());
        }
        assert!(!store.is_loading());
    }

    #[test]
    fn test_loading_guard_clears_on_error_path() {
        let store = connected_store();
        let failing = || -> Result<(), crate::Error> {
            let _guard = store.begin_loading();
            Err(crate::Error::Rpc("boom".into()))
        };
        assert!(failing().is_err());
        assert!(!store.is_loading());
    }

    // --- Render precedence ---

    #[test]
    fn test_render_disconnected_before_anything_else() {
        let store = StatusStore::new();
        store.commit_status(store.begin(), true, Some(true));
        assert_eq!(store.render(), RenderState::Disconnected);
    }

    #[test]
    fn test_render_loading_masks_lifecycle_states() {
        let store = connected_store();
        let _guard = store.begin_loading();
        assert_eq!(store.render(), RenderState::Loading);
    }

    #[test]
    fn test_render_owner_pre_presale() {
        let store = connected_store();
        store.commit_status(store.begin(), false, Some(true));
        assert_eq!(store.render(), RenderState::OwnerPrePresale);
    }

    #[test]
    fn test_render_awaiting_presale_for_non_owner() {
        let store = connected_store();
        store.commit_status(store.begin(), false, Some(false));
        assert_eq!(store.render(), RenderState::AwaitingPresale);
    }

    #[test]
    fn test_render_presale_open_offers_presale_mint() {
        let store = connected_store();
        store.commit_status(store.begin(), true, None);
        store.commit_ended(store.begin(), false);
        assert_eq!(store.render(), RenderState::PresaleOpen);
    }

    #[test]
    fn test_render_presale_closed_offers_public_mint() {
        let store = connected_store();
        store.commit_status(store.begin(), true, None);
        store.commit_ended(store.begin(), true);
        assert_eq!(store.render(), RenderState::PresaleClosed);
    }
}
