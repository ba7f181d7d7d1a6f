//! Runtime statistics bookkeeping.

use botkeeper_core::{ServerInfo, ServerSnapshot, Statistics};
use chrono::{DateTime, Utc};

/// Owns the [`Statistics`] of one live bot.
///
/// Counters only ever grow and `last_active` never moves backwards, so events
/// delivered with slightly out-of-order timestamps cannot rewind anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatisticsAggregator {
    stats: Statistics,
}

impl StatisticsAggregator {
    /// Continues from previously persisted statistics.
    pub fn new(stats: Statistics) -> Self {
        Self { stats }
    }

    pub fn record_message(&mut self, at: DateTime<Utc>) {
        self.stats.message_count = self.stats.message_count.saturating_add(1);
        self.touch(at);
    }

    pub fn record_command(&mut self, at: DateTime<Utc>) {
        self.stats.commands_used = self.stats.commands_used.saturating_add(1);
        self.touch(at);
    }

    /// Moves `last_active` forward to `at`.
    pub fn touch(&mut self, at: DateTime<Utc>) {
        self.stats.last_active = Some(match self.stats.last_active {
            Some(current) => current.max(at),
            None => at,
        });
    }

    /// Replaces the server inventory wholesale.
    pub fn replace_servers(&mut self, servers: &[ServerInfo]) {
        self.stats.servers = servers.iter().map(ServerSnapshot::from).collect();
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }
}
