//! Owners and the resolved requester identity.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{BotId, OwnerId};
use crate::error::{StoreError, StoreResult};

/// A user that owns bots.
///
/// Membership of a bot id in `bots` mirrors `Bot::owner`; the store keeps both
/// sides in sync on create and delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: OwnerId,
    pub username: String,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub bots: BTreeSet<BotId>,
}

impl Owner {
    /// Creates an owner with no bots.
    pub fn new(id: impl Into<OwnerId>, username: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            username: username.into(),
            is_admin: false,
            bots: BTreeSet::new(),
        }
    }

    /// Marks the owner as an administrator.
    pub fn admin(mut self) -> Self {
        self.is_admin = true;
        self
    }

    /// Returns the resolved identity of this owner.
    pub fn as_requester(&self) -> Requester {
        Requester {
            id: self.id.clone(),
            is_admin: self.is_admin,
        }
    }
}

/// The identity the boundary layer resolved for the caller of an operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Requester {
    pub id: OwnerId,
    #[serde(default)]
    pub is_admin: bool,
}

impl Requester {
    /// A regular user.
    pub fn user(id: impl Into<OwnerId>) -> Self {
        Self {
            id: id.into(),
            is_admin: false,
        }
    }

    /// An administrator.
    pub fn admin(id: impl Into<OwnerId>) -> Self {
        Self {
            id: id.into(),
            is_admin: true,
        }
    }

    /// Returns whether this requester may manage a bot owned by `owner`.
    pub fn can_manage(&self, owner: &OwnerId) -> bool {
        self.is_admin || &self.id == owner
    }

    /// Fails with `Unauthorized` unless [`can_manage`](Self::can_manage).
    pub fn authorize(&self, bot_id: &BotId, owner: &OwnerId) -> StoreResult<()> {
        if self.can_manage(owner) {
            Ok(())
        } else {
            Err(StoreError::Unauthorized {
                bot_id: bot_id.clone(),
                requester: self.id.clone(),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_owner_and_admin_may_manage() {
        let owner = OwnerId::new("alice");
        assert!(Requester::user("alice").can_manage(&owner));
        assert!(Requester::admin("root").can_manage(&owner));
        assert!(!Requester::user("mallory").can_manage(&owner));
    }

    #[test]
    fn test_authorize_reports_requester() {
        let err = Requester::user("mallory")
            .authorize(&BotId::new("b1"), &OwnerId::new("alice"))
            .unwrap_err();
        assert_eq!(
            err,
            StoreError::Unauthorized {
                bot_id: BotId::new("b1"),
                requester: OwnerId::new("mallory"),
            }
        );
    }
}
