//! Persisted records: bots, their command tables and their owners.

mod bot;
mod command;
mod owner;

pub use bot::{
    AutoRole, Bot, BotDraft, BotPatch, BotSettings, BotStatus, Credential, Moderation,
    ServerSnapshot, SettingsPatch, Statistics, WelcomeMessage,
};
pub use command::{Command, CommandDraft, CommandPatch, CommandTable};
pub use owner::{Owner, Requester};

/// Defines a string-backed identifier newtype.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord,
            serde::Serialize, serde::Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wraps an existing identifier.
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Generates a fresh random identifier.
            pub fn generate() -> Self {
                Self(uuid::Uuid::new_v4().simple().to_string())
            }

            /// Returns the identifier as a string slice.
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $name {
            fn from(id: &str) -> Self {
                Self(id.to_string())
            }
        }

        impl From<String> for $name {
            fn from(id: String) -> Self {
                Self(id)
            }
        }
    };
}

string_id!(
    /// Unique identifier of a bot record.
    BotId
);

string_id!(
    /// Unique identifier of an owner (user) record.
    OwnerId
);

string_id!(
    /// Identifier of one entry in a bot's command table.
    CommandId
);
