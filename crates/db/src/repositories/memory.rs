use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use leadflow_core::domain::history::{
    newest_first, ActionType, HistoryEntry, HistoryEntryId, NewHistoryEntry,
};
use leadflow_core::domain::lead::{Lead, LeadId, LeadStatus, NewLead};
use leadflow_core::domain::user::{Role, User, UserId};
use leadflow_core::errors::StoreError;
use leadflow_core::store::{HistoryStore, LeadStore, UserStore};

#[derive(Default)]
struct LeadTable {
    next_id: i64,
    rows: HashMap<LeadId, Lead>,
}

#[derive(Default)]
pub struct InMemoryLeadStore {
    table: RwLock<LeadTable>,
}

#[async_trait::async_trait]
impl LeadStore for InMemoryLeadStore {
    async fn find_by_id(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.get(&id).cloned())
    }

    async fn find_new_unowned(&self) -> Result<Vec<Lead>, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|lead| lead.is_unassigned_new()).cloned().collect())
    }

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let mut table = self.table.write().await;
        table.next_id += 1;
        let stored = Lead {
            id: LeadId(table.next_id),
            profile: lead.profile,
            score: lead.score,
            status: LeadStatus::New,
            owner: None,
            created_at: lead.created_at,
            updated_at: lead.created_at,
            created_by: lead.created_by.clone(),
            updated_by: lead.created_by,
        };
        table.rows.insert(stored.id, stored.clone());
        Ok(stored)
    }

    async fn save(&self, lead: Lead) -> Result<(), StoreError> {
        let mut table = self.table.write().await;
        match table.rows.get_mut(&lead.id) {
            Some(existing) => {
                *existing = lead;
                Ok(())
            }
            None => Err(StoreError::Missing { entity: "lead", id: lead.id.to_string() }),
        }
    }

    async fn count_by_status(&self, status: LeadStatus) -> Result<u64, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|lead| lead.status == status).count() as u64)
    }

    async fn count_by_owner(&self, owner: UserId) -> Result<u64, StoreError> {
        let table = self.table.read().await;
        Ok(table.rows.values().filter(|lead| lead.is_owned_by(owner)).count() as u64)
    }
}

/// Users keyed by id; a `BTreeMap` keeps role lookups in ascending id order.
#[derive(Default)]
pub struct InMemoryUserStore {
    users: RwLock<BTreeMap<UserId, User>>,
}

impl InMemoryUserStore {
    pub fn with_users(users: impl IntoIterator<Item = User>) -> Self {
        Self { users: RwLock::new(users.into_iter().map(|user| (user.id, user)).collect()) }
    }
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.get(&id).cloned())
    }

    async fn find_active_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let users = self.users.read().await;
        Ok(users.values().filter(|user| user.active && user.role == role).cloned().collect())
    }

    async fn save(&self, user: User) -> Result<(), StoreError> {
        let mut users = self.users.write().await;
        users.insert(user.id, user);
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryHistoryStore {
    entries: RwLock<Vec<HistoryEntry>>,
}

impl InMemoryHistoryStore {
    async fn select(&self, keep: impl Fn(&HistoryEntry) -> bool) -> Vec<HistoryEntry> {
        let entries = self.entries.read().await;
        let mut selected: Vec<_> = entries.iter().filter(|entry| keep(entry)).cloned().collect();
        selected.sort_by(newest_first);
        selected
    }
}

#[async_trait::async_trait]
impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError> {
        let mut entries = self.entries.write().await;
        let id = HistoryEntryId(entries.len() as i64 + 1);
        let stored = entry.into_entry(id);
        entries.push(stored.clone());
        Ok(stored)
    }

    async fn find_by_lead(&self, lead: LeadId) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.select(|entry| entry.lead_id == lead).await)
    }

    async fn find_by_lead_and_action(
        &self,
        lead: LeadId,
        action: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.select(|entry| entry.lead_id == lead && entry.action == action).await)
    }

    async fn find_recent(
        &self,
        lead: LeadId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let mut entries = self.select(|entry| entry.lead_id == lead).await;
        entries.truncate(limit);
        Ok(entries)
    }

    async fn find_by_actor(&self, actor: UserId) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.select(|entry| entry.actor == Some(actor)).await)
    }

    async fn find_by_action(&self, action: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.select(|entry| entry.action == action).await)
    }

    async fn find_by_action_type(
        &self,
        action_type: ActionType,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self.select(|entry| entry.action_type == action_type).await)
    }

    async fn find_between(
        &self,
        lead: Option<LeadId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        Ok(self
            .select(|entry| {
                lead.map_or(true, |lead| entry.lead_id == lead)
                    && entry.recorded_at >= start
                    && entry.recorded_at <= end
            })
            .await)
    }
}
