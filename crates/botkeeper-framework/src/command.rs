//! Prefix command routing.
//!
//! ```text
//!   "!Ping   me"   prefix "!"
//!    │
//!    ├─ strip prefix ──► "Ping   me"
//!    ├─ split        ──► ["Ping", "me"]
//!    └─ lookup "ping" in table (stored order, enabled only)
//! ```

use botkeeper_core::CommandTable;

/// A resolved command invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandMatch {
    /// Name of the matched entry as stored.
    pub name: String,
    /// Response text, sent verbatim.
    pub response: String,
    /// Tokens after the command name.
    pub args: Vec<String>,
}

/// Stateless router from message text to command table entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct CommandRouter;

impl CommandRouter {
    /// Routes `text` through `table`.
    ///
    /// Returns `None` unless `text` starts with exactly `prefix` and the first
    /// token names an enabled entry. Name comparison ignores case.
    pub fn route(prefix: &str, table: &CommandTable, text: &str) -> Option<CommandMatch> {
        if prefix.is_empty() {
            return None;
        }
        let body = text.strip_prefix(prefix)?;
        let mut tokens = body.split_whitespace();
        let name = tokens.next()?.to_lowercase();

        let command = table
            .iter()
            .filter(|c| c.enabled)
            .find(|c| c.name.to_lowercase() == name)?;

        Some(CommandMatch {
            name: command.name.clone(),
            response: command.response.clone(),
            args: tokens.map(str::to_string).collect(),
        })
    }
}
