use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use crate::audit::{HistoryLog, HistoryRecord};
use crate::domain::history::{action, ActionType, HistoryEntry};
use crate::domain::lead::{Lead, LeadId, LeadProfile, LeadStatus, NewLead};
use crate::domain::user::{Role, User, UserId};
use crate::errors::LeadError;
use crate::lifecycle::rules;
use crate::scoring::ScoringEngine;
use crate::store::{HistoryStore, LeadStore, UserStore};

/// How an assignment came about; decides the wording and category of the
/// audit line, never the transition itself.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AssignmentChannel {
    Direct,
    RoundRobin,
    Manual,
}

impl AssignmentChannel {
    fn comment(&self, username: &str) -> String {
        match self {
            Self::Direct => format!("Lead assigned to {username}"),
            Self::RoundRobin => format!("Lead distributed to {username}"),
            Self::Manual => format!("Lead manually distributed to {username}"),
        }
    }

    fn action_type(&self) -> ActionType {
        match self {
            Self::Direct | Self::RoundRobin => ActionType::System,
            Self::Manual => ActionType::UserAction,
        }
    }
}

/// The lead status state machine. Every operation loads the entities it
/// needs, checks all preconditions, and only then saves the lead and appends
/// exactly one history entry.
pub struct LifecycleEngine<L, U, H> {
    leads: Arc<L>,
    users: Arc<U>,
    history: HistoryLog<H>,
    scoring: ScoringEngine,
}

impl<L, U, H> LifecycleEngine<L, U, H>
where
    L: LeadStore,
    U: UserStore,
    H: HistoryStore,
{
    pub fn new(leads: Arc<L>, users: Arc<U>, history: Arc<H>, scoring: ScoringEngine) -> Self {
        Self { leads, users, history: HistoryLog::new(history), scoring }
    }

    pub fn scoring(&self) -> &ScoringEngine {
        &self.scoring
    }

    pub fn history(&self) -> &HistoryLog<H> {
        &self.history
    }

    pub(crate) fn leads(&self) -> &L {
        &self.leads
    }

    pub(crate) fn users(&self) -> &U {
        &self.users
    }

    pub async fn lead(&self, id: LeadId) -> Result<Lead, LeadError> {
        self.leads.find_by_id(id).await?.ok_or_else(|| LeadError::lead_not_found(id))
    }

    pub async fn user(&self, id: UserId) -> Result<User, LeadError> {
        self.users.find_by_id(id).await?.ok_or_else(|| LeadError::user_not_found(id))
    }

    /// Intake: validates and scores the profile, stores the lead as NEW
    /// without an owner.
    pub async fn create(
        &self,
        profile: LeadProfile,
        creator: Option<UserId>,
    ) -> Result<Lead, LeadError> {
        profile.validate()?;
        let creator = match creator {
            Some(id) => Some(self.user(id).await?),
            None => None,
        };

        let score = self.scoring.score(&profile);
        let lead = self
            .leads
            .insert(NewLead {
                profile,
                score,
                created_at: Utc::now(),
                created_by: creator.as_ref().map(|user| user.username.clone()),
            })
            .await?;

        self.history
            .record(
                HistoryRecord::new(lead.id, action::CREATED, ActionType::System, "Lead created")
                    .by(creator.as_ref().map(|user| user.id))
                    .transition(None, Some(LeadStatus::New)),
            )
            .await?;

        info!(
            event_name = "lead.created",
            lead_id = %lead.id,
            score = lead.score,
            "lead created"
        );
        Ok(lead)
    }

    /// Replaces the caller-supplied attributes and rescores. Status and owner
    /// are untouched.
    pub async fn update_profile(
        &self,
        lead_id: LeadId,
        profile: LeadProfile,
        actor_id: UserId,
    ) -> Result<Lead, LeadError> {
        profile.validate()?;
        let mut lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;

        let old_score = lead.score;
        lead.score = self.scoring.score(&profile);
        lead.profile = profile;
        touch(&mut lead, Some(&actor));

        let comment = format!("Lead details updated; score {old_score} -> {}", lead.score);
        self.commit(
            &lead,
            HistoryRecord::new(lead.id, action::UPDATED, ActionType::UserAction, comment)
                .by(actor.id),
        )
        .await?;
        Ok(lead)
    }

    pub async fn assign(&self, lead_id: LeadId, user_id: UserId) -> Result<Lead, LeadError> {
        let lead = self.lead(lead_id).await?;
        let assignee = self.user(user_id).await?;
        self.assign_lead(lead, &assignee, AssignmentChannel::Direct).await
    }

    pub(crate) async fn assign_lead(
        &self,
        mut lead: Lead,
        assignee: &User,
        channel: AssignmentChannel,
    ) -> Result<Lead, LeadError> {
        rules::ensure_active(assignee)?;
        rules::ensure_not_terminal(&lead)?;

        let old_status = lead.status;
        lead.status = LeadStatus::Assigned;
        lead.owner = Some(assignee.id);
        touch(&mut lead, Some(assignee));

        self.commit(
            &lead,
            HistoryRecord::new(
                lead.id,
                action::ASSIGNED,
                channel.action_type(),
                channel.comment(&assignee.username),
            )
            .by(assignee.id)
            .transition(Some(old_status), Some(LeadStatus::Assigned)),
        )
        .await?;

        info!(
            event_name = "lead.assigned",
            lead_id = %lead.id,
            assignee_id = %assignee.id,
            channel = ?channel,
            "lead assigned"
        );
        Ok(lead)
    }

    pub async fn update_status(
        &self,
        lead_id: LeadId,
        new_status: LeadStatus,
        actor_id: UserId,
    ) -> Result<Lead, LeadError> {
        let mut lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;
        rules::ensure_not_terminal(&lead)?;

        let old_status = lead.status;
        lead.status = new_status;
        touch(&mut lead, Some(&actor));

        self.commit(
            &lead,
            HistoryRecord::new(
                lead.id,
                action::STATUS_CHANGED,
                ActionType::UserAction,
                format!("Status changed from {old_status} to {new_status}"),
            )
            .by(actor.id)
            .transition(Some(old_status), Some(new_status)),
        )
        .await?;
        Ok(lead)
    }

    /// Hands a high-value lead from its owner to the lowest-id active manager.
    pub async fn escalate(&self, lead_id: LeadId, actor_id: UserId) -> Result<Lead, LeadError> {
        let mut lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;

        if !self.scoring.is_high_value(&lead.profile) {
            return Err(LeadError::BusinessRuleViolation(
                "lead does not meet high-value criteria for escalation".to_string(),
            ));
        }
        rules::ensure_owner(&lead, &actor, "escalate")?;
        rules::ensure_not_terminal(&lead)?;
        let manager = self.first_active_manager().await?;

        let old_status = lead.status;
        lead.status = LeadStatus::PreConversion;
        lead.owner = Some(manager.id);
        touch(&mut lead, Some(&actor));

        self.commit(
            &lead,
            HistoryRecord::new(
                lead.id,
                action::ESCALATED,
                ActionType::Workflow,
                format!("Lead escalated to manager {} due to high value", manager.username),
            )
            .by(actor.id)
            .transition(Some(old_status), Some(LeadStatus::PreConversion)),
        )
        .await?;

        info!(
            event_name = "lead.escalated",
            lead_id = %lead.id,
            actor_id = %actor.id,
            manager_id = %manager.id,
            "lead escalated"
        );
        Ok(lead)
    }

    /// Standard approval path for leads below the high-value threshold.
    pub async fn request_approval(
        &self,
        lead_id: LeadId,
        actor_id: UserId,
    ) -> Result<Lead, LeadError> {
        let mut lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;

        rules::ensure_owner(&lead, &actor, "request approval for")?;
        if self.scoring.is_high_value(&lead.profile) {
            return Err(LeadError::BusinessRuleViolation(
                "high-value leads must be escalated, not approved through the standard process"
                    .to_string(),
            ));
        }
        rules::ensure_not_terminal(&lead)?;

        let old_status = lead.status;
        lead.status = LeadStatus::InProgress;
        touch(&mut lead, Some(&actor));

        self.commit(
            &lead,
            HistoryRecord::new(
                lead.id,
                action::APPROVAL_REQUESTED,
                ActionType::Workflow,
                "Approval requested for lead conversion",
            )
            .by(actor.id)
            .transition(Some(old_status), Some(LeadStatus::InProgress)),
        )
        .await?;
        Ok(lead)
    }

    pub async fn approve(&self, lead_id: LeadId, actor_id: UserId) -> Result<Lead, LeadError> {
        let mut lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;

        rules::ensure_manager(&actor, "approve")?;
        rules::ensure_owner(&lead, &actor, "approve")?;
        rules::ensure_not_terminal(&lead)?;

        let old_status = lead.status;
        lead.status = LeadStatus::Converted;
        touch(&mut lead, Some(&actor));

        self.commit(
            &lead,
            HistoryRecord::new(
                lead.id,
                action::APPROVED,
                ActionType::Workflow,
                "Lead conversion approved by manager",
            )
            .by(actor.id)
            .transition(Some(old_status), Some(LeadStatus::Converted)),
        )
        .await?;

        info!(
            event_name = "lead.converted",
            lead_id = %lead.id,
            actor_id = %actor.id,
            "lead converted"
        );
        Ok(lead)
    }

    pub async fn reject(
        &self,
        lead_id: LeadId,
        actor_id: UserId,
        reason: Option<&str>,
    ) -> Result<Lead, LeadError> {
        let mut lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;

        rules::ensure_manager(&actor, "reject")?;
        rules::ensure_owner(&lead, &actor, "reject")?;
        rules::ensure_not_terminal(&lead)?;

        let old_status = lead.status;
        lead.status = LeadStatus::Rejected;
        touch(&mut lead, Some(&actor));

        let reason = reason
            .map(str::trim)
            .filter(|reason| !reason.is_empty())
            .unwrap_or("No reason provided");
        self.commit(
            &lead,
            HistoryRecord::new(
                lead.id,
                action::REJECTED,
                ActionType::Workflow,
                format!("Lead conversion rejected by manager. Reason: {reason}"),
            )
            .by(actor.id)
            .transition(Some(old_status), Some(LeadStatus::Rejected)),
        )
        .await?;

        info!(
            event_name = "lead.rejected",
            lead_id = %lead.id,
            actor_id = %actor.id,
            "lead rejected"
        );
        Ok(lead)
    }

    pub async fn recalculate_score(&self, lead_id: LeadId) -> Result<Lead, LeadError> {
        let mut lead = self.lead(lead_id).await?;

        let old_score = lead.score;
        lead.score = self.scoring.score(&lead.profile);
        touch(&mut lead, None);

        self.commit(
            &lead,
            HistoryRecord::new(
                lead.id,
                action::SCORE_RECALCULATED,
                ActionType::System,
                format!("Lead score recalculated from {old_score} to {}", lead.score),
            ),
        )
        .await?;
        Ok(lead)
    }

    pub async fn add_comment(
        &self,
        lead_id: LeadId,
        actor_id: UserId,
        text: &str,
    ) -> Result<HistoryEntry, LeadError> {
        let lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;
        self.history.add_comment(lead.id, Some(actor.id), text).await
    }

    /// True when `escalate` would be accepted for a lead in its current
    /// working status. Only fails when the lead or actor is unknown.
    pub async fn can_escalate(&self, lead_id: LeadId, actor_id: UserId) -> Result<bool, LeadError> {
        let lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;
        Ok(self.scoring.is_high_value(&lead.profile)
            && lead.is_owned_by(actor.id)
            && rules::escalation_status_allowed(lead.status))
    }

    pub async fn can_approve(&self, lead_id: LeadId, actor_id: UserId) -> Result<bool, LeadError> {
        let lead = self.lead(lead_id).await?;
        let actor = self.user(actor_id).await?;
        Ok(actor.is_manager()
            && lead.is_owned_by(actor.id)
            && rules::approval_status_allowed(lead.status))
    }

    async fn first_active_manager(&self) -> Result<User, LeadError> {
        let mut managers = self.users.find_active_by_role(Role::SalesManager).await?;
        managers.sort_by_key(|user| user.id);
        managers.into_iter().next().ok_or(LeadError::NoManagerAvailable)
    }

    /// Saves the mutated lead and appends its single audit line.
    pub(crate) async fn commit(
        &self,
        lead: &Lead,
        record: HistoryRecord,
    ) -> Result<HistoryEntry, LeadError> {
        self.leads.save(lead.clone()).await?;
        self.history.record(record).await
    }
}

pub(crate) fn touch(lead: &mut Lead, actor: Option<&User>) {
    lead.updated_at = Utc::now();
    if let Some(actor) = actor {
        lead.updated_by = Some(actor.username.clone());
    }
}
