//! The persisted bot record.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::command::CommandTable;
use super::{BotId, OwnerId};
use crate::error::{StoreError, StoreResult};

/// Prefix used when a bot is created without one.
pub const DEFAULT_PREFIX: &str = "!";

const DEFAULT_DESCRIPTION: &str = "A bot created with botkeeper";
const DEFAULT_WELCOME: &str = "Welcome to the server!";

/// Connection status of a bot, as seen by the persisted record.
///
/// Only the runtime changes this field; configuration edits never do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BotStatus {
    /// No live connection.
    #[default]
    Offline,
    /// Connected and processing events.
    Online,
    /// The live connection reported an unrecoverable error.
    Error,
}

impl BotStatus {
    /// Returns the status as its wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for BotStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Secret used to log in to the gateway.
///
/// Never serialized and never printed.
#[derive(Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    /// Wraps a secret.
    pub fn new(secret: impl Into<String>) -> Self {
        Self(secret.into())
    }

    /// Returns the secret. Only connectors should call this.
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// Returns whether the secret is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(***)")
    }
}

// =============================================================================
// Settings
// =============================================================================

/// Message sent to members when they join a server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WelcomeMessage {
    #[serde(default)]
    pub enabled: bool,
    /// Template; see `botkeeper_framework::template` for placeholders.
    #[serde(default = "default_welcome")]
    pub message: String,
}

impl Default for WelcomeMessage {
    fn default() -> Self {
        Self {
            enabled: false,
            message: default_welcome(),
        }
    }
}

fn default_welcome() -> String {
    DEFAULT_WELCOME.to_string()
}

/// Role granted to members when they join a server.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AutoRole {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub role_id: Option<String>,
}

impl AutoRole {
    /// Returns the role to grant, if the feature is enabled and configured.
    pub fn active_role(&self) -> Option<&str> {
        match &self.role_id {
            Some(role) if self.enabled && !role.is_empty() => Some(role),
            _ => None,
        }
    }
}

/// Moderation toggle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Moderation {
    #[serde(default)]
    pub enabled: bool,
}

/// Per-bot feature settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BotSettings {
    #[serde(default)]
    pub welcome_message: WelcomeMessage,
    #[serde(default)]
    pub auto_role: AutoRole,
    #[serde(default)]
    pub moderation: Moderation,
}

// =============================================================================
// Statistics
// =============================================================================

/// One server the bot was connected to when it became ready.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub server_id: String,
    pub server_name: String,
    pub member_count: u64,
}

/// Runtime statistics stored on the bot record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    #[serde(default)]
    pub message_count: u64,
    #[serde(default)]
    pub commands_used: u64,
    #[serde(default)]
    pub last_active: Option<DateTime<Utc>>,
    #[serde(default)]
    pub servers: Vec<ServerSnapshot>,
}

// =============================================================================
// Bot
// =============================================================================

/// A persisted bot record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bot {
    pub id: BotId,
    pub owner: OwnerId,
    pub name: String,
    #[serde(default)]
    pub client_id: String,
    #[serde(default = "default_prefix")]
    pub prefix: String,
    #[serde(default = "default_description")]
    pub description: String,
    #[serde(default)]
    pub avatar: Option<String>,
    /// Only populated by `RecordStore::load_with_credential`.
    #[serde(default, skip_serializing)]
    pub credential: Option<Credential>,
    #[serde(default)]
    pub commands: CommandTable,
    #[serde(default)]
    pub settings: BotSettings,
    #[serde(default)]
    pub status: BotStatus,
    #[serde(default)]
    pub statistics: Statistics,
    /// Optimistic concurrency token, bumped by the store on every save.
    #[serde(default)]
    pub revision: u64,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

fn default_prefix() -> String {
    DEFAULT_PREFIX.to_string()
}

fn default_description() -> String {
    DEFAULT_DESCRIPTION.to_string()
}

impl Bot {
    /// Builds a new offline bot from a creation request.
    pub fn from_draft(id: BotId, owner: OwnerId, draft: BotDraft) -> StoreResult<Self> {
        if draft.name.trim().is_empty() {
            return Err(StoreError::invalid("bot name is required"));
        }
        if draft.credential.is_empty() {
            return Err(StoreError::invalid("bot credential is required"));
        }

        let now = Utc::now();
        Ok(Self {
            id,
            owner,
            name: draft.name.trim().to_string(),
            client_id: draft.client_id,
            prefix: non_empty(draft.prefix).unwrap_or_else(default_prefix),
            description: non_empty(draft.description).unwrap_or_else(default_description),
            avatar: None,
            credential: Some(draft.credential),
            commands: CommandTable::default(),
            settings: BotSettings::default(),
            status: BotStatus::Offline,
            statistics: Statistics::default(),
            revision: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Applies a configuration edit.
    ///
    /// Empty strings mean "unchanged". Settings are merged per feature. Status
    /// and statistics are never touched.
    pub fn apply_patch(&mut self, patch: BotPatch) {
        if let Some(name) = non_empty(patch.name) {
            self.name = name;
        }
        if let Some(prefix) = non_empty(patch.prefix) {
            self.prefix = prefix;
        }
        if let Some(description) = non_empty(patch.description) {
            self.description = description;
        }
        if let Some(avatar) = non_empty(patch.avatar) {
            self.avatar = Some(avatar);
        }
        if let Some(credential) = patch.credential.filter(|c| !c.is_empty()) {
            self.credential = Some(credential);
        }
        if let Some(settings) = patch.settings {
            if let Some(welcome) = settings.welcome_message {
                self.settings.welcome_message = welcome;
            }
            if let Some(auto_role) = settings.auto_role {
                self.settings.auto_role = auto_role;
            }
            if let Some(moderation) = settings.moderation {
                self.settings.moderation = moderation;
            }
        }
    }

    /// Returns a copy without the credential.
    pub fn redacted(&self) -> Self {
        Self {
            credential: None,
            ..self.clone()
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Request to create a bot.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotDraft {
    pub name: String,
    #[serde(default)]
    pub client_id: String,
    pub credential: Credential,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Partial update of a bot's configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub prefix: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub credential: Option<Credential>,
    #[serde(default)]
    pub settings: Option<SettingsPatch>,
}

/// Per-feature replacement of settings.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SettingsPatch {
    #[serde(default)]
    pub welcome_message: Option<WelcomeMessage>,
    #[serde(default)]
    pub auto_role: Option<AutoRole>,
    #[serde(default)]
    pub moderation: Option<Moderation>,
}
