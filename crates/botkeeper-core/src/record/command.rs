//! User-defined command tables.

use serde::{Deserialize, Serialize};

use super::CommandId;
use crate::error::{StoreError, StoreResult};

/// One trigger → response entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Command {
    #[serde(default = "CommandId::generate")]
    pub id: CommandId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub response: String,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl Command {
    /// Returns whether this entry answers to `name`, ignoring case.
    pub fn answers_to(&self, name: &str) -> bool {
        self.name.to_lowercase() == name.to_lowercase()
    }
}

/// Request to add a command.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandDraft {
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub response: String,
}

/// Partial update of a command. Empty strings mean "unchanged".
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CommandPatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub response: Option<String>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

/// Ordered command entries whose names are unique ignoring case.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "Vec<Command>", into = "Vec<Command>")]
pub struct CommandTable {
    entries: Vec<Command>,
}

impl CommandTable {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Iterates entries in stored order.
    pub fn iter(&self) -> std::slice::Iter<'_, Command> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Looks up an entry by id.
    pub fn get(&self, id: &CommandId) -> Option<&Command> {
        self.entries.iter().find(|c| &c.id == id)
    }

    /// Appends a new, enabled command.
    pub fn add(&mut self, draft: CommandDraft) -> StoreResult<&Command> {
        validate_name(&draft.name)?;
        if draft.response.is_empty() {
            return Err(StoreError::invalid("command response is required"));
        }
        self.ensure_unique(&draft.name, None)?;

        self.entries.push(Command {
            id: CommandId::generate(),
            name: draft.name,
            description: draft.description,
            response: draft.response,
            enabled: true,
        });
        Ok(&self.entries[self.entries.len() - 1])
    }

    /// Applies a partial update to an existing command.
    pub fn update(&mut self, id: &CommandId, patch: CommandPatch) -> StoreResult<&Command> {
        let index = self.position(id)?;

        if let Some(name) = patch.name.as_deref().filter(|n| !n.is_empty()) {
            validate_name(name)?;
            self.ensure_unique(name, Some(id))?;
        }

        let command = &mut self.entries[index];
        if let Some(name) = patch.name.filter(|n| !n.is_empty()) {
            command.name = name;
        }
        if let Some(description) = patch.description.filter(|d| !d.is_empty()) {
            command.description = description;
        }
        if let Some(response) = patch.response.filter(|r| !r.is_empty()) {
            command.response = response;
        }
        if let Some(enabled) = patch.enabled {
            command.enabled = enabled;
        }
        Ok(&self.entries[index])
    }

    /// Removes a command and returns it.
    pub fn remove(&mut self, id: &CommandId) -> StoreResult<Command> {
        let index = self.position(id)?;
        Ok(self.entries.remove(index))
    }

    fn position(&self, id: &CommandId) -> StoreResult<usize> {
        self.entries
            .iter()
            .position(|c| &c.id == id)
            .ok_or_else(|| StoreError::CommandNotFound(id.clone()))
    }

    fn ensure_unique(&self, name: &str, except: Option<&CommandId>) -> StoreResult<()> {
        let clash = self
            .entries
            .iter()
            .any(|c| Some(&c.id) != except && c.answers_to(name));
        if clash {
            Err(StoreError::DuplicateCommand(name.to_string()))
        } else {
            Ok(())
        }
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() || name.chars().any(char::is_whitespace) {
        return Err(StoreError::invalid(format!(
            "command name '{name}' must be a single non-empty word"
        )));
    }
    Ok(())
}

impl TryFrom<Vec<Command>> for CommandTable {
    type Error = StoreError;

    fn try_from(commands: Vec<Command>) -> StoreResult<Self> {
        let mut table = Self::new();
        for command in commands {
            validate_name(&command.name)?;
            table.ensure_unique(&command.name, None)?;
            table.entries.push(command);
        }
        Ok(table)
    }
}

impl From<CommandTable> for Vec<Command> {
    fn from(table: CommandTable) -> Self {
        table.entries
    }
}

impl<'a> IntoIterator for &'a CommandTable {
    type Item = &'a Command;
    type IntoIter = std::slice::Iter<'a, Command>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft(name: &str, response: &str) -> CommandDraft {
        CommandDraft {
            name: name.into(),
            description: String::new(),
            response: response.into(),
        }
    }

    #[test]
    fn test_add_rejects_case_insensitive_duplicate() {
        let mut table = CommandTable::new();
        table.add(draft("ping", "pong")).unwrap();
        let err = table.add(draft("PING", "again")).unwrap_err();
        assert_eq!(err, StoreError::DuplicateCommand("PING".into()));
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_add_rejects_multi_word_names() {
        let mut table = CommandTable::new();
        assert!(matches!(
            table.add(draft("two words", "x")),
            Err(StoreError::Invalid(_))
        ));
    }

    #[test]
    fn test_update_rename_into_existing_name_fails() {
        let mut table = CommandTable::new();
        table.add(draft("ping", "pong")).unwrap();
        let id = table.add(draft("help", "...")).unwrap().id.clone();

        let err = table
            .update(
                &id,
                CommandPatch {
                    name: Some("Ping".into()),
                    ..Default::default()
                },
            )
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateCommand(_)));

        let updated = table
            .update(
                &id,
                CommandPatch {
                    name: Some("HELP".into()),
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(updated.name, "HELP");
        assert!(!updated.enabled);
    }

    #[test]
    fn test_remove_unknown_command() {
        let mut table = CommandTable::new();
        let missing = CommandId::new("nope");
        assert_eq!(
            table.remove(&missing).unwrap_err(),
            StoreError::CommandNotFound(missing)
        );
    }

    #[test]
    fn test_deserialize_rejects_duplicates() {
        let json = r#"[
            {"name": "ping", "response": "pong"},
            {"name": "Ping", "response": "again"}
        ]"#;
        assert!(serde_json::from_str::<CommandTable>(json).is_err());
    }

    #[test]
    fn test_deserialize_keeps_order_and_defaults() {
        let json = r#"[
            {"name": "b", "response": "2", "enabled": false},
            {"name": "a", "response": "1"}
        ]"#;
        let table: CommandTable = serde_json::from_str(json).unwrap();
        let names: Vec<_> = table.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["b", "a"]);
        assert!(table.iter().nth(1).unwrap().enabled);
    }
}
