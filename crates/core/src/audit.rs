use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::debug;

use crate::domain::history::{action, ActionType, HistoryEntry, NewHistoryEntry};
use crate::domain::lead::{LeadId, LeadStatus};
use crate::domain::user::UserId;
use crate::errors::LeadError;
use crate::store::HistoryStore;

/// Everything needed to append one audit line, minus the timestamp which is
/// taken when the line is recorded.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HistoryRecord {
    pub lead_id: LeadId,
    pub actor: Option<UserId>,
    pub comment: String,
    pub action: &'static str,
    pub action_type: ActionType,
    pub old_status: Option<LeadStatus>,
    pub new_status: Option<LeadStatus>,
}

impl HistoryRecord {
    pub fn new(
        lead_id: LeadId,
        action: &'static str,
        action_type: ActionType,
        comment: impl Into<String>,
    ) -> Self {
        Self {
            lead_id,
            actor: None,
            comment: comment.into(),
            action,
            action_type,
            old_status: None,
            new_status: None,
        }
    }

    pub fn by(mut self, actor: impl Into<Option<UserId>>) -> Self {
        self.actor = actor.into();
        self
    }

    pub fn transition(mut self, from: Option<LeadStatus>, to: Option<LeadStatus>) -> Self {
        self.old_status = from;
        self.new_status = to;
        self
    }
}

/// Append-only recorder and read projections over a lead's audit trail.
pub struct HistoryLog<H> {
    store: Arc<H>,
}

impl<H> Clone for HistoryLog<H> {
    fn clone(&self) -> Self {
        Self { store: Arc::clone(&self.store) }
    }
}

impl<H> HistoryLog<H>
where
    H: HistoryStore,
{
    pub fn new(store: Arc<H>) -> Self {
        Self { store }
    }

    pub async fn record(&self, record: HistoryRecord) -> Result<HistoryEntry, LeadError> {
        let entry = self
            .store
            .append(NewHistoryEntry {
                lead_id: record.lead_id,
                actor: record.actor,
                comment: record.comment,
                action: record.action.to_string(),
                action_type: record.action_type,
                old_status: record.old_status,
                new_status: record.new_status,
                recorded_at: Utc::now(),
            })
            .await?;

        debug!(
            event_name = "history.appended",
            lead_id = %entry.lead_id,
            entry_id = entry.id.0,
            action = %entry.action,
            action_type = %entry.action_type,
            "history entry appended"
        );
        Ok(entry)
    }

    /// Free-text note on a lead; never changes status.
    pub async fn add_comment(
        &self,
        lead_id: LeadId,
        actor: Option<UserId>,
        text: &str,
    ) -> Result<HistoryEntry, LeadError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(LeadError::Validation("comment text must not be blank".to_string()));
        }
        self.record(
            HistoryRecord::new(lead_id, action::COMMENT_ADDED, ActionType::UserAction, text)
                .by(actor),
        )
        .await
    }

    pub async fn for_lead(&self, lead_id: LeadId) -> Result<Vec<HistoryEntry>, LeadError> {
        Ok(self.store.find_by_lead(lead_id).await?)
    }

    pub async fn for_lead_and_action(
        &self,
        lead_id: LeadId,
        action: &str,
    ) -> Result<Vec<HistoryEntry>, LeadError> {
        Ok(self.store.find_by_lead_and_action(lead_id, action).await?)
    }

    pub async fn recent(
        &self,
        lead_id: LeadId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, LeadError> {
        if limit == 0 {
            return Ok(Vec::new());
        }
        Ok(self.store.find_recent(lead_id, limit).await?)
    }

    pub async fn by_actor(&self, actor: UserId) -> Result<Vec<HistoryEntry>, LeadError> {
        Ok(self.store.find_by_actor(actor).await?)
    }

    pub async fn by_action(&self, action: &str) -> Result<Vec<HistoryEntry>, LeadError> {
        Ok(self.store.find_by_action(action).await?)
    }

    pub async fn by_action_type(
        &self,
        action_type: ActionType,
    ) -> Result<Vec<HistoryEntry>, LeadError> {
        Ok(self.store.find_by_action_type(action_type).await?)
    }

    pub async fn between(
        &self,
        lead_id: Option<LeadId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, LeadError> {
        if start > end {
            return Err(LeadError::Validation(format!(
                "history range start {start} is after end {end}"
            )));
        }
        Ok(self.store.find_between(lead_id, start, end).await?)
    }

    /// Entries for the lead that carry non-blank comment text.
    pub async fn comments_for_lead(
        &self,
        lead_id: LeadId,
    ) -> Result<Vec<HistoryEntry>, LeadError> {
        let entries = self.store.find_by_lead(lead_id).await?;
        Ok(entries.into_iter().filter(HistoryEntry::has_comment).collect())
    }

    pub async fn count_for_lead(&self, lead_id: LeadId) -> Result<usize, LeadError> {
        Ok(self.store.find_by_lead(lead_id).await?.len())
    }
}

#[cfg(test)]
mod tests {
    use crate::domain::history::{action, ActionType};
    use crate::domain::lead::{LeadId, LeadStatus};
    use crate::domain::user::UserId;

    use super::HistoryRecord;

    #[test]
    fn record_builder_carries_actor_and_transition() {
        let record = HistoryRecord::new(
            LeadId(9),
            action::ESCALATED,
            ActionType::Workflow,
            "Lead escalated to manager mgr due to high value",
        )
        .by(UserId(3))
        .transition(Some(LeadStatus::Assigned), Some(LeadStatus::PreConversion));

        assert_eq!(record.actor, Some(UserId(3)));
        assert_eq!(record.old_status, Some(LeadStatus::Assigned));
        assert_eq!(record.new_status, Some(LeadStatus::PreConversion));
        assert_eq!(record.action, "Escalated");
    }

    #[test]
    fn system_records_have_no_actor() {
        let record =
            HistoryRecord::new(LeadId(1), action::SCORE_RECALCULATED, ActionType::System, "");
        assert_eq!(record.actor, None);
        assert_eq!(record.old_status, None);
    }
}
