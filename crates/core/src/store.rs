//! Persistence contracts the engines are written against. Implementations
//! live outside this crate; the engines never hold entity state themselves.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::history::{ActionType, HistoryEntry, NewHistoryEntry};
use crate::domain::lead::{Lead, LeadId, LeadStatus, NewLead};
use crate::domain::user::{Role, User, UserId};
use crate::errors::StoreError;

#[async_trait]
pub trait LeadStore: Send + Sync {
    async fn find_by_id(&self, id: LeadId) -> Result<Option<Lead>, StoreError>;

    /// Leads in status NEW with no owner, in no particular order.
    async fn find_new_unowned(&self) -> Result<Vec<Lead>, StoreError>;

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError>;

    /// Overwrites an existing lead. Fails with [`StoreError::Missing`] when the
    /// id is unknown. The engines save before appending the matching history
    /// line; callers that need both or neither must wrap the two calls in one
    /// transaction.
    async fn save(&self, lead: Lead) -> Result<(), StoreError>;

    async fn count_by_status(&self, status: LeadStatus) -> Result<u64, StoreError>;

    async fn count_by_owner(&self, owner: UserId) -> Result<u64, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError>;

    /// Active users holding `role`, ordered by ascending id.
    async fn find_active_by_role(&self, role: Role) -> Result<Vec<User>, StoreError>;

    async fn save(&self, user: User) -> Result<(), StoreError>;
}

/// Append-only audit storage. Every `find_*` returns newest first, ties broken
/// by descending entry id. An append is not atomic with the lead save that
/// precedes it (see [`LeadStore::save`]).
#[async_trait]
pub trait HistoryStore: Send + Sync {
    async fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError>;

    async fn find_by_lead(&self, lead: LeadId) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn find_by_lead_and_action(
        &self,
        lead: LeadId,
        action: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn find_recent(&self, lead: LeadId, limit: usize)
        -> Result<Vec<HistoryEntry>, StoreError>;

    async fn find_by_actor(&self, actor: UserId) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn find_by_action(&self, action: &str) -> Result<Vec<HistoryEntry>, StoreError>;

    async fn find_by_action_type(
        &self,
        action_type: ActionType,
    ) -> Result<Vec<HistoryEntry>, StoreError>;

    /// Entries with `start <= recorded_at <= end`, optionally for one lead.
    async fn find_between(
        &self,
        lead: Option<LeadId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, StoreError>;
}
