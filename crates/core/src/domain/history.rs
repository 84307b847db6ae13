use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::lead::{LeadId, LeadStatus};
use crate::domain::user::UserId;
use crate::errors::LeadError;

/// Action labels written by the engines.
pub mod action {
    pub const CREATED: &str = "Created";
    pub const UPDATED: &str = "Updated";
    pub const ASSIGNED: &str = "Assigned";
    pub const STATUS_CHANGED: &str = "Status Changed";
    pub const ESCALATED: &str = "Escalated";
    pub const APPROVAL_REQUESTED: &str = "Approval Requested";
    pub const APPROVED: &str = "Approved";
    pub const REJECTED: &str = "Rejected";
    pub const SCORE_RECALCULATED: &str = "Score Recalculated";
    pub const REASSIGNED: &str = "Reassigned";
    pub const COMMENT_ADDED: &str = "Comment Added";
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HistoryEntryId(pub i64);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    System,
    UserAction,
    Workflow,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::System => "SYSTEM",
            Self::UserAction => "USER_ACTION",
            Self::Workflow => "WORKFLOW",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ActionType {
    type Err = LeadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SYSTEM" => Ok(Self::System),
            "USER_ACTION" => Ok(Self::UserAction),
            "WORKFLOW" => Ok(Self::Workflow),
            other => Err(LeadError::Validation(format!(
                "unknown action type `{other}` (expected SYSTEM|USER_ACTION|WORKFLOW)"
            ))),
        }
    }
}

/// One immutable line of a lead's audit trail.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub id: HistoryEntryId,
    pub lead_id: LeadId,
    pub actor: Option<UserId>,
    pub comment: String,
    pub action: String,
    pub action_type: ActionType,
    pub old_status: Option<LeadStatus>,
    pub new_status: Option<LeadStatus>,
    pub recorded_at: DateTime<Utc>,
}

impl HistoryEntry {
    pub fn has_comment(&self) -> bool {
        !self.comment.trim().is_empty()
    }
}

/// An entry ready to be appended; the store assigns the id, which doubles as
/// the insertion-order tie breaker for equal timestamps.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewHistoryEntry {
    pub lead_id: LeadId,
    pub actor: Option<UserId>,
    pub comment: String,
    pub action: String,
    pub action_type: ActionType,
    pub old_status: Option<LeadStatus>,
    pub new_status: Option<LeadStatus>,
    pub recorded_at: DateTime<Utc>,
}

impl NewHistoryEntry {
    pub fn into_entry(self, id: HistoryEntryId) -> HistoryEntry {
        HistoryEntry {
            id,
            lead_id: self.lead_id,
            actor: self.actor,
            comment: self.comment,
            action: self.action,
            action_type: self.action_type,
            old_status: self.old_status,
            new_status: self.new_status,
            recorded_at: self.recorded_at,
        }
    }
}

/// Newest first; equal timestamps fall back to the later insertion first.
pub fn newest_first(a: &HistoryEntry, b: &HistoryEntry) -> std::cmp::Ordering {
    b.recorded_at.cmp(&a.recorded_at).then_with(|| b.id.cmp(&a.id))
}
