//! One bot's live gateway connection.
//!
//! ```text
//!                    ┌────────────────────── LiveConnection ───────────────────────┐
//! gateway events ──► │ worker: recv ─► Dispatcher ─► handlers ─► WatchSink (watch) │
//!                    │                                                 │           │
//!                    │ flusher: changed ─► persist_snapshot ◄──────────┘           │
//!                    └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! The worker owns the runtime state and processes events strictly in
//! order. Teardown cancels the worker, closes the session and waits for the
//! flusher to drain before the final offline write.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use botkeeper_core::{
    Bot, BotId, BotStatus, BoxedSession, BoxedStore, GatewayConnection, GatewayEvent, OwnerId,
};
use botkeeper_framework::{BotRuntimeState, Dispatcher, HandlerContext, RuntimeSnapshot};

use crate::flush::{FlushPolicy, WatchSink, persist_snapshot, run_flusher};

pub(crate) struct LiveConnection {
    bot_id: BotId,
    owner: OwnerId,
    session: BoxedSession,
    snapshots: watch::Receiver<RuntimeSnapshot>,
    cancel: CancellationToken,
    worker: JoinHandle<()>,
    flusher: JoinHandle<()>,
}

impl LiveConnection {
    /// Spawns the worker and flusher for a freshly opened connection.
    pub(crate) fn spawn(
        bot: Bot,
        connection: GatewayConnection,
        dispatcher: Arc<Dispatcher>,
        store: BoxedStore,
        policy: FlushPolicy,
    ) -> Self {
        let state = BotRuntimeState::new(bot);
        let bot_id = state.bot_id().clone();
        let owner = state.owner().clone();

        let (tx, rx) = watch::channel(state.snapshot());
        let cancel = CancellationToken::new();
        let GatewayConnection { session, events } = connection;

        let worker = tokio::spawn(run_worker(
            state,
            events,
            Arc::clone(&session),
            dispatcher,
            WatchSink(tx),
            cancel.clone(),
        ));

        let flusher_rx = rx.clone();
        let flusher = tokio::spawn(async move {
            run_flusher(flusher_rx, store.as_ref(), policy).await;
        });

        Self {
            bot_id,
            owner,
            session,
            snapshots: rx,
            cancel,
            worker,
            flusher,
        }
    }

    pub(crate) fn owner(&self) -> &OwnerId {
        &self.owner
    }

    /// Status as last published by the worker.
    pub(crate) fn status(&self) -> BotStatus {
        self.snapshots.borrow().status
    }

    /// Stops the worker, closes the session, drains pending flushes and
    /// persists the final state as offline.
    pub(crate) async fn shutdown(self, store: &BoxedStore, policy: FlushPolicy) {
        self.cancel.cancel();
        self.session.close().await;

        if let Err(e) = self.worker.await {
            warn!(bot_id = %self.bot_id, error = %e, "Worker task ended abnormally");
        }
        if let Err(e) = self.flusher.await {
            warn!(bot_id = %self.bot_id, error = %e, "Flusher task ended abnormally");
        }

        let mut last = self.snapshots.borrow().clone();
        last.status = BotStatus::Offline;
        match persist_snapshot(store.as_ref(), &last, policy).await {
            Ok(()) => info!(bot_id = %self.bot_id, "Bot is offline"),
            Err(e) => warn!(
                bot_id = %self.bot_id,
                error = %e,
                "Failed to persist offline status"
            ),
        }
    }
}

async fn run_worker(
    mut state: BotRuntimeState,
    mut events: mpsc::Receiver<GatewayEvent>,
    session: BoxedSession,
    dispatcher: Arc<Dispatcher>,
    sink: WatchSink,
    cancel: CancellationToken,
) {
    debug!(bot_id = %state.bot_id(), "Worker started");

    loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break,

            event = events.recv() => {
                let Some(event) = event else {
                    debug!(bot_id = %state.bot_id(), "Gateway event stream ended");
                    break;
                };
                let mut ctx = HandlerContext::new(&mut state, session.as_ref(), &sink);
                dispatcher.dispatch(&mut ctx, &event).await;
            }
        }
    }

    debug!(bot_id = %state.bot_id(), "Worker stopped");
}
