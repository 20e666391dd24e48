// @zen-component: CONV-ConversationStore
//
//! In-memory conversation store with TTL-based expiration.
//!
//! Maps each [`ConversationId`] to the most recent [`ContinuationToken`].
//! A keyed lock table serializes chat turns on the same conversation so that
//! the read of the previous token and the write of the next one can never
//! interleave with another turn on that id.

use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{ContinuationToken, ConversationId};

/// Default idle lifetime of a conversation record: 24 hours.
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Default upper bound on stored conversations.
pub const DEFAULT_MAX_ENTRIES: usize = 10_000;

/// Default interval between eviction sweeps.
pub const DEFAULT_EVICTION_INTERVAL: Duration = Duration::from_secs(60);

/// Lifecycle limits for the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StoreConfig {
    /// Records not written for longer than this read as absent.
    pub ttl: Duration,
    /// Soft bound on the number of records; the least recently written
    /// record is evicted to make room for a new conversation.
    pub max_entries: usize,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            max_entries: DEFAULT_MAX_ENTRIES,
        }
    }
}

#[derive(Debug, Clone)]
struct ConversationRecord {
    token: ContinuationToken,
    /// Milliseconds since store epoch when the record was last written.
    touched_ms: u64,
}

/// Conversation id → latest continuation token, plus per-id turn locks.
pub struct ConversationStore {
    records: DashMap<ConversationId, ConversationRecord>,
    locks: DashMap<ConversationId, Arc<Mutex<()>>>,
    config: StoreConfig,
    /// Reference point for record timestamps.
    epoch: Instant,
}

impl ConversationStore {
    /// Create a store with default limits.
    pub fn new() -> Self {
        Self::with_config(StoreConfig::default())
    }

    pub fn with_config(config: StoreConfig) -> Self {
        Self {
            records: DashMap::new(),
            locks: DashMap::new(),
            config: StoreConfig {
                max_entries: config.max_entries.max(1),
                ..config
            },
            epoch: Instant::now(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    fn now_ms(&self) -> u64 {
        self.epoch.elapsed().as_millis() as u64
    }

    fn is_expired(&self, record: &ConversationRecord, now_ms: u64) -> bool {
        now_ms.saturating_sub(record.touched_ms) > self.config.ttl.as_millis() as u64
    }

    /// Latest continuation token for `id`, or `None` for a new (or expired)
    /// conversation.
    pub fn get(&self, id: &ConversationId) -> Option<ContinuationToken> {
        let now_ms = self.now_ms();
        let record = self.records.get(id)?;
        if self.is_expired(&record, now_ms) {
            return None;
        }
        Some(record.token.clone())
    }

    /// Unconditionally replace the token for `id`.
    pub fn set(&self, id: ConversationId, token: ContinuationToken) {
        if !self.records.contains_key(&id) && self.records.len() >= self.config.max_entries {
            self.make_room();
        }
        let touched_ms = self.now_ms();
        self.records
            .insert(id, ConversationRecord { token, touched_ms });
    }

    /// Forget a conversation. Returns the token it held, if any.
    pub fn remove(&self, id: &ConversationId) -> Option<ContinuationToken> {
        self.records.remove(id).map(|(_, record)| record.token)
    }

    /// Number of stored records, including expired ones not yet swept.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Number of records that have not yet expired.
    pub fn live_len(&self) -> usize {
        let now_ms = self.now_ms();
        self.records
            .iter()
            .filter(|entry| !self.is_expired(entry.value(), now_ms))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Wait for exclusive access to `id` and start a chat turn on it.
    ///
    /// Turns on the same id are granted in the order they start waiting.
    /// The lock is released when the returned guard is committed or dropped.
    pub async fn begin_turn(&self, id: ConversationId) -> ConversationTurn<'_> {
        let lock = self
            .locks
            .entry(id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        let guard = lock.lock_owned().await;
        ConversationTurn {
            store: self,
            id,
            _guard: guard,
        }
    }

    /// Drop expired records and idle turn locks. Returns the number of
    /// records evicted.
    pub fn evict_expired(&self) -> usize {
        let now_ms = self.now_ms();
        let mut evicted = 0;
        self.records.retain(|_, record| {
            let keep = !self.is_expired(record, now_ms);
            if !keep {
                evicted += 1;
            }
            keep
        });
        // A lock referenced only by the table has no holder and no waiter.
        self.locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        evicted
    }

    /// Evict expired records, then the least recently written one if the
    /// store is still full.
    fn make_room(&self) {
        self.evict_expired();
        if self.records.len() < self.config.max_entries {
            return;
        }
        let oldest = self
            .records
            .iter()
            .min_by_key(|entry| entry.value().touched_ms)
            .map(|entry| *entry.key());
        if let Some(id) = oldest {
            self.records.remove(&id);
            debug!(conversation_id = %id, "evicted least recently used conversation");
        }
    }

    /// Spawn a periodic eviction task that runs until `shutdown` is cancelled.
    pub fn spawn_eviction_task(
        self: &Arc<Self>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> JoinHandle<()> {
        let store = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let evicted = store.evict_expired();
                        if evicted > 0 {
                            debug!(
                                evicted,
                                remaining = store.len(),
                                "evicted expired conversations"
                            );
                        }
                    }
                }
            }
        })
    }

    #[cfg(test)]
    fn lock_count(&self) -> usize {
        self.locks.len()
    }
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Exclusive access to one conversation for the duration of a chat turn.
///
/// Dropping the turn without calling [`commit`](Self::commit) leaves the
/// store exactly as it was.
pub struct ConversationTurn<'a> {
    store: &'a ConversationStore,
    id: ConversationId,
    _guard: OwnedMutexGuard<()>,
}

impl ConversationTurn<'_> {
    pub fn id(&self) -> ConversationId {
        self.id
    }

    /// Token left by the previous turn, if any.
    pub fn previous(&self) -> Option<ContinuationToken> {
        self.store.get(&self.id)
    }

    /// Record the token produced by this turn and release the lock.
    pub fn commit(self, token: ContinuationToken) {
        self.store.set(self.id, token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> ConversationId {
        let hex = format!("{n:02x}");
        format!("{0}{0}{0}{0}-{0}{0}-{0}{0}-{0}{0}-{0}{0}{0}{0}{0}{0}", hex)
            .parse()
            .unwrap()
    }

    fn tok(s: &str) -> ContinuationToken {
        ContinuationToken::from(s)
    }

    #[test]
    fn get_returns_none_for_missing_id() {
        let store = ConversationStore::new();
        assert!(store.get(&id(1)).is_none());
    }

    #[test]
    fn set_then_get() {
        let store = ConversationStore::new();
        store.set(id(1), tok("tok-1"));
        assert_eq!(store.get(&id(1)), Some(tok("tok-1")));
    }

    #[test]
    fn set_overwrites_previous_token() {
        let store = ConversationStore::new();
        store.set(id(1), tok("tok-1"));
        store.set(id(1), tok("tok-2"));
        assert_eq!(store.get(&id(1)), Some(tok("tok-2")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn repeated_identical_set_is_idempotent() {
        let store = ConversationStore::new();
        store.set(id(1), tok("tok-1"));
        store.set(id(1), tok("tok-1"));
        assert_eq!(store.get(&id(1)), Some(tok("tok-1")));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn unknown_id_stays_absent_after_unrelated_writes() {
        let store = ConversationStore::new();
        assert!(store.get(&id(9)).is_none());
        store.set(id(1), tok("a"));
        store.set(id(2), tok("b"));
        assert!(store.get(&id(9)).is_none());
    }

    #[test]
    fn remove_forgets_conversation() {
        let store = ConversationStore::new();
        store.set(id(1), tok("tok-1"));
        assert_eq!(store.remove(&id(1)), Some(tok("tok-1")));
        assert!(store.get(&id(1)).is_none());
        assert!(store.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn expired_record_reads_as_absent_and_is_evicted() {
        let store = ConversationStore::with_config(StoreConfig {
            ttl: Duration::from_millis(10),
            max_entries: 100,
        });
        store.set(id(1), tok("tok-1"));
        tokio::time::advance(Duration::from_millis(30)).await;
        store.set(id(2), tok("tok-2"));

        assert!(store.get(&id(1)).is_none());
        assert_eq!(store.get(&id(2)), Some(tok("tok-2")));
        assert_eq!(store.len(), 2);
        assert_eq!(store.live_len(), 1);
        assert_eq!(store.evict_expired(), 1);
        assert_eq!(store.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_store_evicts_least_recently_written() {
        let store = ConversationStore::with_config(StoreConfig {
            ttl: DEFAULT_TTL,
            max_entries: 2,
        });
        store.set(id(1), tok("a"));
        tokio::time::advance(Duration::from_millis(5)).await;
        store.set(id(2), tok("b"));
        tokio::time::advance(Duration::from_millis(5)).await;
        store.set(id(3), tok("c"));

        assert_eq!(store.len(), 2);
        assert!(store.get(&id(1)).is_none());
        assert_eq!(store.get(&id(2)), Some(tok("b")));
        assert_eq!(store.get(&id(3)), Some(tok("c")));
    }

    #[test]
    fn overwriting_in_full_store_does_not_evict() {
        let store = ConversationStore::with_config(StoreConfig {
            ttl: DEFAULT_TTL,
            max_entries: 2,
        });
        store.set(id(1), tok("a"));
        store.set(id(2), tok("b"));
        store.set(id(1), tok("a2"));

        assert_eq!(store.get(&id(1)), Some(tok("a2")));
        assert_eq!(store.get(&id(2)), Some(tok("b")));
    }

    #[tokio::test(start_paused = true)]
    async fn turn_on_same_id_waits_for_previous_turn() {
        let store = ConversationStore::new();

        let first = store.begin_turn(id(1)).await;
        let blocked =
            tokio::time::timeout(Duration::from_millis(50), store.begin_turn(id(1))).await;
        assert!(blocked.is_err(), "second turn must wait for the first");

        first.commit(tok("tok-1"));
        let second = store.begin_turn(id(1)).await;
        assert_eq!(second.previous(), Some(tok("tok-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn turns_on_different_ids_do_not_block() {
        let store = ConversationStore::new();

        let _first = store.begin_turn(id(1)).await;
        let other =
            tokio::time::timeout(Duration::from_millis(50), store.begin_turn(id(2))).await;
        assert!(other.is_ok());
    }

    #[tokio::test]
    async fn dropped_turn_leaves_store_untouched() {
        let store = ConversationStore::new();
        store.set(id(1), tok("tok-1"));

        {
            let turn = store.begin_turn(id(1)).await;
            assert_eq!(turn.previous(), Some(tok("tok-1")));
        }

        assert_eq!(store.get(&id(1)), Some(tok("tok-1")));
        let turn = store.begin_turn(id(1)).await;
        assert_eq!(turn.id(), id(1));
    }

    #[tokio::test]
    async fn sweep_prunes_idle_locks_only() {
        let store = ConversationStore::new();
        let held = store.begin_turn(id(1)).await;
        drop(store.begin_turn(id(2)).await);
        assert_eq!(store.lock_count(), 2);

        store.evict_expired();
        assert_eq!(store.lock_count(), 1);

        held.commit(tok("tok-1"));
        store.evict_expired();
        assert_eq!(store.lock_count(), 0);
        assert_eq!(store.get(&id(1)), Some(tok("tok-1")));
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_task_sweeps_expired_records() {
        let store = Arc::new(ConversationStore::with_config(StoreConfig {
            ttl: Duration::from_secs(10),
            max_entries: 100,
        }));
        store.set(id(1), tok("tok-1"));
        let shutdown = CancellationToken::new();
        let handle = store.spawn_eviction_task(Duration::from_secs(1), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(store.len(), 1);

        tokio::time::sleep(Duration::from_millis(7_500)).await;
        assert_eq!(store.len(), 0);
        assert!(store.get(&id(1)).is_none());

        shutdown.cancel();
        handle.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn eviction_task_stops_on_shutdown() {
        let store = Arc::new(ConversationStore::new());
        let shutdown = CancellationToken::new();
        let handle = store.spawn_eviction_task(Duration::from_secs(1), shutdown.clone());

        tokio::time::sleep(Duration::from_secs(3)).await;
        shutdown.cancel();
        handle.await.unwrap();
    }
}
