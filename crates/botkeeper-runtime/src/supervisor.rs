//! Connection supervisor.
//!
//! The [`Supervisor`] owns every live connection and is the only component
//! that opens or closes one. Requests for the same bot id are serialized by a
//! per-id slot lock; requests for different bots proceed independently.
//!
//! ```text
//!  slots: Mutex<HashMap<BotId, Arc<AsyncMutex<Option<LiveConnection>>>>>
//!                   │
//!   start(b1) ──────┼──► lock slot b1 ──► load ─► authorize ─► open ─► spawn
//!   start(b1) ──────┤        (waits)        └─► already running ─► report
//!   stop(b2)  ──────┴──► lock slot b2 ──► authorize ─► teardown ─► offline
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use botkeeper_runtime::Supervisor;
//!
//! let supervisor = Supervisor::builder(store, connector)
//!     .flush_policy(config.runtime.flush_policy())
//!     .build();
//!
//! let report = supervisor.start(&bot_id, &requester).await?;
//! supervisor.stop(&bot_id, &requester).await?;
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use tokio::signal;
use tracing::{debug, info, warn};

use botkeeper_core::{BotId, BotStatus, BoxedConnector, BoxedStore, Credential, Requester};
use botkeeper_framework::Dispatcher;

use crate::config::BotkeeperConfig;
use crate::connection::LiveConnection;
use crate::error::{SupervisorError, SupervisorResult};
use crate::flush::FlushPolicy;
use crate::logging;

type Slot = Arc<tokio::sync::Mutex<Option<LiveConnection>>>;

/// Result of a successful [`Supervisor::start`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StartReport {
    pub bot_id: BotId,
    /// Live status at the time of the call. A fresh connection reports
    /// `offline` until the gateway confirms the login.
    pub status: BotStatus,
    pub already_running: bool,
}

/// Counts of live connections by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SupervisorStats {
    pub live: usize,
    pub online: usize,
    pub errored: usize,
    /// Opened but not yet ready.
    pub connecting: usize,
}

/// Opens, tracks and closes live gateway connections.
pub struct Supervisor {
    store: BoxedStore,
    connector: BoxedConnector,
    dispatcher: Arc<Dispatcher>,
    policy: FlushPolicy,
    slots: parking_lot::Mutex<HashMap<BotId, Slot>>,
}

impl Supervisor {
    /// Creates a supervisor with the default handlers and flush policy.
    pub fn new(store: BoxedStore, connector: BoxedConnector) -> Self {
        Self::builder(store, connector).build()
    }

    pub fn builder(store: BoxedStore, connector: BoxedConnector) -> SupervisorBuilder {
        SupervisorBuilder::new(store, connector)
    }

    /// Creates a supervisor from configuration, initializing logging first.
    pub fn from_config(
        config: &BotkeeperConfig,
        store: BoxedStore,
        connector: BoxedConnector,
    ) -> Self {
        logging::init_from_config(&config.logging);

        info!(
            log_level = %config.logging.level,
            log_format = ?config.logging.format,
            flush_retries = config.runtime.flush_retries,
            "Supervisor initialized from configuration"
        );

        Self::builder(store, connector)
            .flush_policy(config.runtime.flush_policy())
            .build()
    }

    // =========================================================================
    // Start / Stop
    // =========================================================================

    /// Starts a bot on behalf of `requester`.
    ///
    /// Returns as soon as the connection is opened; the login completes in
    /// the background. Starting a bot that is already live opens nothing and
    /// reports `already_running`.
    pub async fn start(
        &self,
        bot_id: &BotId,
        requester: &Requester,
    ) -> SupervisorResult<StartReport> {
        let slot = self.slot(bot_id);
        let result = {
            let mut live = slot.lock().await;
            self.start_locked(&mut live, bot_id, requester).await
        };
        drop(slot);
        self.prune(bot_id);
        result
    }

    async fn start_locked(
        &self,
        live: &mut Option<LiveConnection>,
        bot_id: &BotId,
        requester: &Requester,
    ) -> SupervisorResult<StartReport> {
        let mut bot = self.store.load_with_credential(bot_id).await?;
        requester.authorize(bot_id, &bot.owner)?;

        if let Some(conn) = live.as_ref() {
            debug!(bot_id = %bot_id, requester = %requester.id, "Bot already running");
            return Ok(StartReport {
                bot_id: bot_id.clone(),
                status: conn.status(),
                already_running: true,
            });
        }

        let credential = bot.credential.take().unwrap_or_else(|| {
            warn!(bot_id = %bot_id, "Bot has no credential, login will be rejected");
            Credential::default()
        });
        let owner = bot.owner.clone();

        let connection = self.connector.open(bot_id, &credential);
        let conn = LiveConnection::spawn(
            bot,
            connection,
            Arc::clone(&self.dispatcher),
            Arc::clone(&self.store),
            self.policy,
        );
        let status = conn.status();
        *live = Some(conn);

        info!(bot_id = %bot_id, owner = %owner, requester = %requester.id, "Started bot");
        Ok(StartReport {
            bot_id: bot_id.clone(),
            status,
            already_running: false,
        })
    }

    /// Stops a live bot on behalf of `requester` and persists it offline.
    ///
    /// Returns once the worker has exited and pending state has been written.
    pub async fn stop(&self, bot_id: &BotId, requester: &Requester) -> SupervisorResult<()> {
        let slot = self.slot(bot_id);
        let result = {
            let mut live = slot.lock().await;
            self.stop_locked(&mut live, bot_id, requester).await
        };
        drop(slot);
        self.prune(bot_id);
        result
    }

    async fn stop_locked(
        &self,
        live: &mut Option<LiveConnection>,
        bot_id: &BotId,
        requester: &Requester,
    ) -> SupervisorResult<()> {
        match live.as_ref() {
            Some(conn) => requester.authorize(bot_id, conn.owner())?,
            None => {
                let bot = self.store.load(bot_id).await?;
                requester.authorize(bot_id, &bot.owner)?;
                return Err(SupervisorError::NoLiveConnection(bot_id.clone()));
            }
        }

        if let Some(conn) = live.take() {
            conn.shutdown(&self.store, self.policy).await;
        }
        info!(bot_id = %bot_id, requester = %requester.id, "Stopped bot");
        Ok(())
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the live status of a bot, or `None` if it is not running.
    pub async fn status(&self, bot_id: &BotId) -> Option<BotStatus> {
        let slot = self.slots.lock().get(bot_id).cloned()?;
        let live = slot.lock().await;
        live.as_ref().map(LiveConnection::status)
    }

    pub async fn is_live(&self, bot_id: &BotId) -> bool {
        self.status(bot_id).await.is_some()
    }

    /// Returns the ids of all live bots, sorted.
    pub async fn live_ids(&self) -> Vec<BotId> {
        let mut ids = Vec::new();
        for (id, slot) in self.snapshot_slots() {
            if slot.lock().await.is_some() {
                ids.push(id);
            }
        }
        ids.sort();
        ids
    }

    pub async fn stats(&self) -> SupervisorStats {
        let mut stats = SupervisorStats::default();
        for (_, slot) in self.snapshot_slots() {
            let Some(status) = slot.lock().await.as_ref().map(LiveConnection::status) else {
                continue;
            };
            stats.live += 1;
            match status {
                BotStatus::Online => stats.online += 1,
                BotStatus::Error => stats.errored += 1,
                BotStatus::Offline => stats.connecting += 1,
            }
        }
        stats
    }

    // =========================================================================
    // Process Lifecycle
    // =========================================================================

    /// Stops every live bot without authorization checks and persists each
    /// as offline.
    pub async fn shutdown_all(&self) {
        let shutdowns = self.snapshot_slots().into_iter().map(|(_, slot)| async move {
            let conn = slot.lock().await.take();
            match conn {
                Some(conn) => {
                    conn.shutdown(&self.store, self.policy).await;
                    true
                }
                None => false,
            }
        });
        let stopped = futures::future::join_all(shutdowns)
            .await
            .into_iter()
            .filter(|stopped| *stopped)
            .count();

        self.slots.lock().retain(|_, slot| !Self::is_idle(slot));
        info!(stopped, "All bots stopped");
    }

    /// Waits for `shutdown`, then stops every live bot.
    pub async fn run_until<F>(&self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        shutdown.await;
        self.shutdown_all().await;
    }

    /// Waits for Ctrl+C or SIGTERM, then stops every live bot.
    pub async fn run(&self) {
        info!("Supervisor is running. Press Ctrl+C to stop.");
        self.run_until(wait_for_shutdown()).await;
    }

    // =========================================================================
    // Slots
    // =========================================================================

    fn slot(&self, bot_id: &BotId) -> Slot {
        Arc::clone(self.slots.lock().entry(bot_id.clone()).or_default())
    }

    fn snapshot_slots(&self) -> Vec<(BotId, Slot)> {
        self.slots
            .lock()
            .iter()
            .map(|(id, slot)| (id.clone(), Arc::clone(slot)))
            .collect()
    }

    /// Removes the slot of `bot_id` if it is empty and nobody else holds it.
    fn prune(&self, bot_id: &BotId) {
        let mut slots = self.slots.lock();
        if slots.get(bot_id).is_some_and(Self::is_idle) {
            slots.remove(bot_id);
        }
    }

    /// Only meaningful while the outer map lock is held, which keeps new
    /// holders from appearing.
    fn is_idle(slot: &Slot) -> bool {
        Arc::strong_count(slot) == 1 && slot.try_lock().is_ok_and(|live| live.is_none())
    }
}

impl std::fmt::Debug for Supervisor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Supervisor")
            .field("slots", &self.slots.lock().len())
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// Waits for shutdown signals (Ctrl+C or SIGTERM).
async fn wait_for_shutdown() {
    #[cfg(unix)]
    {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    _ = signal::ctrl_c() => info!("Received Ctrl+C, shutting down"),
                    _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
                }
            }
            Err(e) => {
                warn!(error = %e, "Failed to register SIGTERM handler, waiting for Ctrl+C only");
                if let Err(e) = signal::ctrl_c().await {
                    warn!(error = %e, "Failed to listen for Ctrl+C");
                }
                info!("Shutting down");
            }
        }
    }

    #[cfg(not(unix))]
    {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl+C");
        }
        info!("Received Ctrl+C, shutting down");
    }
}

// =============================================================================
// SupervisorBuilder
// =============================================================================

/// Builder for a [`Supervisor`].
pub struct SupervisorBuilder {
    store: BoxedStore,
    connector: BoxedConnector,
    dispatcher: Option<Dispatcher>,
    policy: FlushPolicy,
}

impl SupervisorBuilder {
    pub fn new(store: BoxedStore, connector: BoxedConnector) -> Self {
        Self {
            store,
            connector,
            dispatcher: None,
            policy: FlushPolicy::default(),
        }
    }

    /// Replaces the default handlers.
    pub fn dispatcher(mut self, dispatcher: Dispatcher) -> Self {
        self.dispatcher = Some(dispatcher);
        self
    }

    pub fn flush_policy(mut self, policy: FlushPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn build(self) -> Supervisor {
        Supervisor {
            store: self.store,
            connector: self.connector,
            dispatcher: Arc::new(self.dispatcher.unwrap_or_else(Dispatcher::with_defaults)),
            policy: self.policy,
            slots: parking_lot::Mutex::new(HashMap::new()),
        }
    }
}
