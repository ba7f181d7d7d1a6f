//! Persistence of runtime snapshots.
//!
//! Handlers publish snapshots into a `watch` channel without waiting; one
//! flusher task per live connection writes the latest published value back
//! to the record store. Snapshots published while a write is in flight
//! coalesce into one follow-up write.
//!
//! ```text
//! worker ──send_replace──► watch ──changed──► flusher ──load/save──► RecordStore
//! ```

use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use botkeeper_core::{RecordStore, StoreError, StoreResult};
use botkeeper_framework::{FlushSink, RuntimeSnapshot};

/// Retry behavior when a write loses an optimistic-concurrency race.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushPolicy {
    /// Additional attempts after the first conflict.
    pub retries: u32,
    pub retry_delay: Duration,
}

impl Default for FlushPolicy {
    fn default() -> Self {
        Self {
            retries: 3,
            retry_delay: Duration::from_millis(50),
        }
    }
}

/// [`FlushSink`] feeding a flusher task.
pub(crate) struct WatchSink(pub(crate) watch::Sender<RuntimeSnapshot>);

impl FlushSink for WatchSink {
    fn flush(&self, snapshot: RuntimeSnapshot) {
        self.0.send_replace(snapshot);
    }
}

/// Writes every snapshot that `rx` observes until the sender is dropped.
///
/// The last value published before the sender goes away is still written.
pub(crate) async fn run_flusher(
    mut rx: watch::Receiver<RuntimeSnapshot>,
    store: &dyn RecordStore,
    policy: FlushPolicy,
) {
    while rx.changed().await.is_ok() {
        let snapshot = rx.borrow_and_update().clone();
        if let Err(e) = persist_snapshot(store, &snapshot, policy).await {
            warn!(
                bot_id = %snapshot.bot_id,
                status = %snapshot.status,
                error = %e,
                "Failed to persist runtime state"
            );
        }
    }
}

/// Overwrites the runtime-owned fields of the stored record.
///
/// Every attempt reloads the record, so configuration edits saved in the
/// meantime are kept.
pub(crate) async fn persist_snapshot(
    store: &dyn RecordStore,
    snapshot: &RuntimeSnapshot,
    policy: FlushPolicy,
) -> StoreResult<()> {
    let mut attempt = 0;
    loop {
        let mut bot = store.load(&snapshot.bot_id).await?;
        bot.status = snapshot.status;
        bot.statistics = snapshot.statistics.clone();

        match store.save(&bot).await {
            Ok(revision) => {
                debug!(
                    bot_id = %snapshot.bot_id,
                    status = %snapshot.status,
                    revision,
                    "Persisted runtime state"
                );
                return Ok(());
            }
            Err(StoreError::Conflict { .. }) if attempt < policy.retries => {
                attempt += 1;
                debug!(bot_id = %snapshot.bot_id, attempt, "Revision conflict, retrying");
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(e) => return Err(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    use async_trait::async_trait;

    use botkeeper_core::{
        Bot, BotDraft, BotId, BotStatus, Credential, MemoryStore, OwnerId, Statistics,
    };

    use super::*;

    fn seeded() -> (Arc<MemoryStore>, BotId) {
        let store = Arc::new(MemoryStore::new());
        let bot = Bot::from_draft(
            BotId::new("b1"),
            OwnerId::new("alice"),
            BotDraft {
                name: "Helper".into(),
                credential: Credential::new("token"),
                ..Default::default()
            },
        )
        .unwrap();
        store.insert_bot(bot);
        (store, BotId::new("b1"))
    }

    fn snapshot(bot_id: &BotId, messages: u64) -> RuntimeSnapshot {
        RuntimeSnapshot {
            bot_id: bot_id.clone(),
            status: BotStatus::Online,
            statistics: Statistics {
                message_count: messages,
                ..Default::default()
            },
        }
    }

    /// Store whose first `conflicts` saves lose a race.
    struct Contended {
        inner: Arc<MemoryStore>,
        conflicts: AtomicU32,
    }

    #[async_trait]
    impl RecordStore for Contended {
        async fn load(&self, id: &BotId) -> StoreResult<Bot> {
            self.inner.load(id).await
        }

        async fn load_with_credential(&self, id: &BotId) -> StoreResult<Bot> {
            self.inner.load_with_credential(id).await
        }

        async fn save(&self, bot: &Bot) -> StoreResult<u64> {
            if self.conflicts.load(Ordering::SeqCst) > 0 {
                self.conflicts.fetch_sub(1, Ordering::SeqCst);
                return Err(StoreError::Conflict {
                    id: bot.id.clone(),
                    expected: bot.revision,
                    found: bot.revision + 1,
                });
            }
            self.inner.save(bot).await
        }

        async fn list_by_owner(&self, owner: &OwnerId) -> StoreResult<Vec<Bot>> {
            self.inner.list_by_owner(owner).await
        }
    }

    fn fast(retries: u32) -> FlushPolicy {
        FlushPolicy {
            retries,
            retry_delay: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_persist_keeps_configuration() {
        let (store, id) = seeded();
        let before = store.load(&id).await.unwrap();

        persist_snapshot(store.as_ref(), &snapshot(&id, 4), fast(0))
            .await
            .unwrap();

        let after = store.load_with_credential(&id).await.unwrap();
        assert_eq!(after.status, BotStatus::Online);
        assert_eq!(after.statistics.message_count, 4);
        assert_eq!(after.name, before.name);
        assert_eq!(after.credential, Some(Credential::new("token")));
    }

    #[tokio::test]
    async fn test_conflicts_are_retried() {
        let (inner, id) = seeded();
        let store = Contended {
            inner: Arc::clone(&inner),
            conflicts: AtomicU32::new(2),
        };

        persist_snapshot(&store, &snapshot(&id, 1), fast(2)).await.unwrap();
        assert_eq!(inner.load(&id).await.unwrap().statistics.message_count, 1);
    }

    #[tokio::test]
    async fn test_conflicts_give_up_after_retries() {
        let (inner, id) = seeded();
        let store = Contended {
            inner,
            conflicts: AtomicU32::new(5),
        };

        let err = persist_snapshot(&store, &snapshot(&id, 1), fast(1))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
    }

    #[tokio::test]
    async fn test_flusher_writes_last_value_after_sender_drops() {
        let (store, id) = seeded();
        let (tx, rx) = watch::channel(snapshot(&id, 0));
        let sink = WatchSink(tx);

        sink.flush(snapshot(&id, 1));
        sink.flush(snapshot(&id, 2));
        drop(sink);

        run_flusher(rx, store.as_ref(), fast(0)).await;
        assert_eq!(store.load(&id).await.unwrap().statistics.message_count, 2);
    }
}
