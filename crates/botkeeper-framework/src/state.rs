//! In-memory state of one live bot.

use botkeeper_core::{Bot, BotId, BotStatus, OwnerId, Statistics};
use serde::Serialize;

use crate::stats::StatisticsAggregator;

/// The runtime-owned fields of a bot record at one point in time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RuntimeSnapshot {
    pub bot_id: BotId,
    pub status: BotStatus,
    pub statistics: Statistics,
}

/// State a worker mutates while processing events.
///
/// `bot` is the record as loaded at start, without its credential. Command
/// and settings edits made afterwards take effect on the next start.
#[derive(Debug, Clone)]
pub struct BotRuntimeState {
    bot: Bot,
    stats: StatisticsAggregator,
    status: BotStatus,
}

impl BotRuntimeState {
    /// Builds the state for a freshly opened connection. The status stays
    /// `offline` until the gateway reports ready.
    pub fn new(bot: Bot) -> Self {
        let stats = StatisticsAggregator::new(bot.statistics.clone());
        Self {
            bot: bot.redacted(),
            stats,
            status: BotStatus::Offline,
        }
    }

    pub fn bot(&self) -> &Bot {
        &self.bot
    }

    pub fn bot_id(&self) -> &BotId {
        &self.bot.id
    }

    pub fn owner(&self) -> &OwnerId {
        &self.bot.owner
    }

    pub fn status(&self) -> BotStatus {
        self.status
    }

    pub fn set_status(&mut self, status: BotStatus) {
        self.status = status;
    }

    pub fn stats(&self) -> &StatisticsAggregator {
        &self.stats
    }

    pub fn stats_mut(&mut self) -> &mut StatisticsAggregator {
        &mut self.stats
    }

    pub fn snapshot(&self) -> RuntimeSnapshot {
        RuntimeSnapshot {
            bot_id: self.bot.id.clone(),
            status: self.status,
            statistics: self.stats.stats().clone(),
        }
    }
}
