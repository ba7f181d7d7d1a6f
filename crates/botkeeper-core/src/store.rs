//! Record store contract and the in-memory implementation.
//!
//! The runtime only needs id-keyed `load` / `save` plus listing by owner;
//! the query language of a real backend is its own business.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use tracing::{debug, info};

use crate::error::{StoreError, StoreResult};
use crate::record::{
    Bot, BotDraft, BotId, BotPatch, Command, CommandDraft, CommandId, CommandPatch, Owner,
    OwnerId, Requester,
};

/// Read/write access to persisted bot records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Loads a bot without its credential.
    async fn load(&self, id: &BotId) -> StoreResult<Bot>;

    /// Loads a bot including its credential.
    ///
    /// Only the component opening gateway connections should call this.
    async fn load_with_credential(&self, id: &BotId) -> StoreResult<Bot>;

    /// Saves a bot and returns its new revision.
    ///
    /// Fails with [`StoreError::Conflict`] when `bot.revision` is not the
    /// stored revision. A `None` credential keeps the stored one.
    async fn save(&self, bot: &Bot) -> StoreResult<u64>;

    /// Lists the bots of one owner, without credentials.
    async fn list_by_owner(&self, owner: &OwnerId) -> StoreResult<Vec<Bot>>;
}

/// A shared record store.
pub type BoxedStore = Arc<dyn RecordStore>;

#[derive(Default)]
struct Records {
    bots: HashMap<BotId, Bot>,
    owners: HashMap<OwnerId, Owner>,
}

impl Records {
    fn bot_for(&self, id: &BotId, requester: &Requester) -> StoreResult<&Bot> {
        let bot = self
            .bots
            .get(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))?;
        requester.authorize(id, &bot.owner)?;
        Ok(bot)
    }

    fn bot_for_mut(&mut self, id: &BotId, requester: &Requester) -> StoreResult<&mut Bot> {
        self.bot_for(id, requester)?;
        self.bots
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }
}

/// In-memory [`RecordStore`] that also implements the owner-facing CRUD
/// operations of the console.
#[derive(Default)]
pub struct MemoryStore {
    records: RwLock<Records>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces an owner.
    pub fn insert_owner(&self, owner: Owner) {
        let mut records = self.records.write();
        debug!(owner_id = %owner.id, "Inserted owner");
        records.owners.insert(owner.id.clone(), owner);
    }

    /// Returns a copy of an owner.
    pub fn owner(&self, id: &OwnerId) -> Option<Owner> {
        self.records.read().owners.get(id).cloned()
    }

    /// Seeds a complete bot record, creating its owner if unknown.
    pub fn insert_bot(&self, bot: Bot) {
        let mut records = self.records.write();
        let owner_id = bot.owner.clone();
        records
            .owners
            .entry(owner_id.clone())
            .or_insert_with(|| Owner::new(owner_id.clone(), owner_id.as_str()))
            .bots
            .insert(bot.id.clone());
        records.bots.insert(bot.id.clone(), bot);
    }

    /// Creates a bot owned by the requester.
    pub fn create_bot(&self, requester: &Requester, draft: BotDraft) -> StoreResult<Bot> {
        let mut records = self.records.write();
        let owner = records
            .owners
            .get_mut(&requester.id)
            .ok_or_else(|| StoreError::OwnerNotFound(requester.id.clone()))?;

        let bot = Bot::from_draft(BotId::generate(), requester.id.clone(), draft)?;
        owner.bots.insert(bot.id.clone());
        info!(bot_id = %bot.id, owner_id = %bot.owner, "Created bot");

        let redacted = bot.redacted();
        records.bots.insert(bot.id.clone(), bot);
        Ok(redacted)
    }

    /// Applies a configuration edit on behalf of the requester.
    pub fn update_config(
        &self,
        id: &BotId,
        requester: &Requester,
        patch: BotPatch,
    ) -> StoreResult<Bot> {
        let mut records = self.records.write();
        let bot = records.bot_for_mut(id, requester)?;
        bot.apply_patch(patch);
        touch(bot);
        Ok(bot.redacted())
    }

    /// Deletes a bot and detaches it from its owner.
    pub fn delete_bot(&self, id: &BotId, requester: &Requester) -> StoreResult<()> {
        let mut records = self.records.write();
        let owner_id = records.bot_for(id, requester)?.owner.clone();

        records.bots.remove(id);
        if let Some(owner) = records.owners.get_mut(&owner_id) {
            owner.bots.remove(id);
        }
        info!(bot_id = %id, owner_id = %owner_id, "Deleted bot");
        Ok(())
    }

    /// Adds a command to a bot's table.
    pub fn add_command(
        &self,
        id: &BotId,
        requester: &Requester,
        draft: CommandDraft,
    ) -> StoreResult<Command> {
        let mut records = self.records.write();
        let bot = records.bot_for_mut(id, requester)?;
        let command = bot.commands.add(draft)?.clone();
        touch(bot);
        Ok(command)
    }

    /// Updates a command in a bot's table.
    pub fn update_command(
        &self,
        id: &BotId,
        requester: &Requester,
        command_id: &CommandId,
        patch: CommandPatch,
    ) -> StoreResult<Command> {
        let mut records = self.records.write();
        let bot = records.bot_for_mut(id, requester)?;
        let command = bot.commands.update(command_id, patch)?.clone();
        touch(bot);
        Ok(command)
    }

    /// Removes a command from a bot's table.
    pub fn remove_command(
        &self,
        id: &BotId,
        requester: &Requester,
        command_id: &CommandId,
    ) -> StoreResult<Command> {
        let mut records = self.records.write();
        let bot = records.bot_for_mut(id, requester)?;
        let command = bot.commands.remove(command_id)?;
        touch(bot);
        Ok(command)
    }
}

fn touch(bot: &mut Bot) {
    bot.revision += 1;
    bot.updated_at = Utc::now();
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn load(&self, id: &BotId) -> StoreResult<Bot> {
        self.records
            .read()
            .bots
            .get(id)
            .map(Bot::redacted)
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn load_with_credential(&self, id: &BotId) -> StoreResult<Bot> {
        self.records
            .read()
            .bots
            .get(id)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(id.clone()))
    }

    async fn save(&self, bot: &Bot) -> StoreResult<u64> {
        let mut records = self.records.write();
        let stored = records
            .bots
            .get_mut(&bot.id)
            .ok_or_else(|| StoreError::NotFound(bot.id.clone()))?;

        if stored.revision != bot.revision {
            return Err(StoreError::Conflict {
                id: bot.id.clone(),
                expected: bot.revision,
                found: stored.revision,
            });
        }

        let credential = bot
            .credential
            .clone()
            .or_else(|| stored.credential.take());
        *stored = Bot {
            credential,
            ..bot.clone()
        };
        touch(stored);
        Ok(stored.revision)
    }

    async fn list_by_owner(&self, owner: &OwnerId) -> StoreResult<Vec<Bot>> {
        let records = self.records.read();
        let mut bots: Vec<Bot> = records
            .bots
            .values()
            .filter(|bot| &bot.owner == owner)
            .map(Bot::redacted)
            .collect();
        bots.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(bots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{BotStatus, Credential};

    fn store_with_owner() -> (MemoryStore, Requester) {
        let store = MemoryStore::new();
        let owner = Owner::new("alice", "Alice");
        let requester = owner.as_requester();
        store.insert_owner(owner);
        (store, requester)
    }

    fn draft() -> BotDraft {
        BotDraft {
            name: "Helper".into(),
            credential: Credential::new("token"),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_load_hides_credential() {
        let (store, alice) = store_with_owner();
        let bot = store.create_bot(&alice, draft()).unwrap();
        assert!(bot.credential.is_none());

        assert!(store.load(&bot.id).await.unwrap().credential.is_none());
        let full = store.load_with_credential(&bot.id).await.unwrap();
        assert_eq!(full.credential, Some(Credential::new("token")));
    }

    #[tokio::test]
    async fn test_save_with_stale_revision_conflicts() {
        let (store, alice) = store_with_owner();
        let bot = store.create_bot(&alice, draft()).unwrap();

        let mut first = store.load(&bot.id).await.unwrap();
        let mut second = first.clone();

        first.status = BotStatus::Online;
        store.save(&first).await.unwrap();

        second.status = BotStatus::Error;
        let err = store.save(&second).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict { .. }));
        assert_eq!(store.load(&bot.id).await.unwrap().status, BotStatus::Online);
    }

    #[tokio::test]
    async fn test_save_keeps_stored_credential() {
        let (store, alice) = store_with_owner();
        let bot = store.create_bot(&alice, draft()).unwrap();

        let loaded = store.load(&bot.id).await.unwrap();
        store.save(&loaded).await.unwrap();

        let full = store.load_with_credential(&bot.id).await.unwrap();
        assert_eq!(full.credential, Some(Credential::new("token")));
    }

    #[tokio::test]
    async fn test_delete_detaches_from_owner() {
        let (store, alice) = store_with_owner();
        let bot = store.create_bot(&alice, draft()).unwrap();
        assert!(store.owner(&alice.id).unwrap().bots.contains(&bot.id));

        store.delete_bot(&bot.id, &alice).unwrap();

        assert!(store.owner(&alice.id).unwrap().bots.is_empty());
        assert_eq!(
            store.load(&bot.id).await.unwrap_err(),
            StoreError::NotFound(bot.id.clone())
        );
    }

    #[tokio::test]
    async fn test_mutations_require_owner_or_admin() {
        let (store, alice) = store_with_owner();
        let bot = store.create_bot(&alice, draft()).unwrap();

        let mallory = Requester::user("mallory");
        assert!(matches!(
            store.delete_bot(&bot.id, &mallory),
            Err(StoreError::Unauthorized { .. })
        ));

        let admin = Requester::admin("root");
        store
            .add_command(
                &bot.id,
                &admin,
                CommandDraft {
                    name: "ping".into(),
                    response: "pong".into(),
                    ..Default::default()
                },
            )
            .unwrap();
        assert_eq!(store.load(&bot.id).await.unwrap().commands.len(), 1);
    }

    #[tokio::test]
    async fn test_list_by_owner() {
        let (store, alice) = store_with_owner();
        store.insert_owner(Owner::new("bob", "Bob"));
        let bob = Requester::user("bob");

        store.create_bot(&alice, draft()).unwrap();
        store.create_bot(&alice, draft()).unwrap();
        store.create_bot(&bob, draft()).unwrap();

        let bots = store.list_by_owner(&alice.id).await.unwrap();
        assert_eq!(bots.len(), 2);
        assert!(bots.iter().all(|b| b.credential.is_none()));
    }
}
