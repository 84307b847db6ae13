//! Round-robin allocation of unassigned leads to active sales persons.
//!
//! Batch operations are best effort: each lead is an independent committed
//! step, per-lead failures are logged and skipped, and rerunning after an
//! interruption only picks up leads that are still NEW and unowned.

use std::cmp::Ordering as CmpOrdering;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use uuid::Uuid;

use crate::audit::HistoryRecord;
use crate::config::{ConfigError, DistributionConfig};
use crate::domain::history::{action, ActionType};
use crate::domain::lead::{Lead, LeadId, LeadStatus};
use crate::domain::user::{Role, User, UserId};
use crate::errors::LeadError;
use crate::lifecycle::engine::touch;
use crate::lifecycle::{AssignmentChannel, LifecycleEngine};
use crate::store::{HistoryStore, LeadStore, UserStore};

/// Order in which candidate leads take round-robin slots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistributionOrder {
    /// Highest score first, then oldest, then lowest id.
    ScoreDesc,
    /// Oldest first, then lowest id.
    CreatedAsc,
}

impl DistributionOrder {
    fn compare(&self, a: &Lead, b: &Lead) -> CmpOrdering {
        let by_age = a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id));
        match self {
            Self::ScoreDesc => b.score.cmp(&a.score).then(by_age),
            Self::CreatedAsc => by_age,
        }
    }
}

impl FromStr for DistributionOrder {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "score_desc" => Ok(Self::ScoreDesc),
            "created_asc" => Ok(Self::CreatedAsc),
            other => Err(ConfigError::Validation(format!(
                "unsupported distribution order `{other}` (expected score_desc|created_asc)"
            ))),
        }
    }
}

/// What a batch does when there are leads to hand out but nobody to take them.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EmptyPoolPolicy {
    Fail,
    Skip,
}

impl FromStr for EmptyPoolPolicy {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "fail" => Ok(Self::Fail),
            "skip" => Ok(Self::Skip),
            other => Err(ConfigError::Validation(format!(
                "unsupported empty pool policy `{other}` (expected fail|skip)"
            ))),
        }
    }
}

/// Monotonic slot counter shared by every batch run on one engine. Each
/// lead takes a distinct slot even when runs overlap.
#[derive(Debug, Default)]
struct RoundRobinCounter(AtomicU64);

impl RoundRobinCounter {
    fn new(start: u64) -> Self {
        Self(AtomicU64::new(start))
    }

    fn next_slot(&self) -> u64 {
        self.0.fetch_add(1, Ordering::SeqCst)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum SkipReason {
    NotFound,
    NotNew(LeadStatus),
    Failed(String),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => f.write_str("lead does not exist"),
            Self::NotNew(status) => write!(f, "lead is {status}, not NEW"),
            Self::Failed(message) => write!(f, "assignment failed: {message}"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedLead {
    pub lead_id: LeadId,
    pub reason: SkipReason,
}

/// Outcome of a targeted distribution.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct DistributionReport {
    pub distributed: Vec<LeadId>,
    pub skipped: Vec<SkippedLead>,
}

impl DistributionReport {
    pub fn distributed_count(&self) -> usize {
        self.distributed.len()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SalesPersonLoad {
    pub user_id: UserId,
    pub username: String,
    pub owned_leads: u64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct DistributionStats {
    pub active_sales_persons: usize,
    pub new_leads: u64,
    pub assigned_leads: u64,
    /// NEW plus ASSIGNED, the leads still in the distribution funnel.
    pub total: u64,
    /// Leads in any status, terminal ones included.
    pub all_leads: u64,
    pub per_person: Vec<SalesPersonLoad>,
}

pub struct DistributionEngine<L, U, H> {
    lifecycle: Arc<LifecycleEngine<L, U, H>>,
    counter: RoundRobinCounter,
    config: DistributionConfig,
}

impl<L, U, H> DistributionEngine<L, U, H>
where
    L: LeadStore,
    U: UserStore,
    H: HistoryStore,
{
    pub fn new(lifecycle: Arc<LifecycleEngine<L, U, H>>, config: DistributionConfig) -> Self {
        Self::with_counter_start(lifecycle, config, 0)
    }

    /// Starts the slot counter at `start`, e.g. to resume rotation where a
    /// previous process left off.
    pub fn with_counter_start(
        lifecycle: Arc<LifecycleEngine<L, U, H>>,
        config: DistributionConfig,
        start: u64,
    ) -> Self {
        Self { lifecycle, counter: RoundRobinCounter::new(start), config }
    }

    pub fn lifecycle(&self) -> &LifecycleEngine<L, U, H> {
        &self.lifecycle
    }

    pub fn config(&self) -> DistributionConfig {
        self.config
    }

    /// Hands every NEW unowned lead to the active sales persons in rotation
    /// and returns how many were assigned.
    pub async fn distribute_all(&self) -> Result<usize, LeadError> {
        let run_id = Uuid::new_v4();
        let mut leads = self.lifecycle.leads().find_new_unowned().await?;
        if leads.is_empty() {
            info!(event_name = "distribution.noop", %run_id, "no unassigned leads to distribute");
            return Ok(0);
        }

        let pool = self.lifecycle.users().find_active_by_role(Role::SalesPerson).await?;
        let pool: Vec<User> = pool.into_iter().filter(User::is_distribution_candidate).collect();
        if pool.is_empty() {
            return self.empty_pool(run_id, leads.len());
        }

        let order = self.config.order;
        leads.sort_by(|a, b| order.compare(a, b));

        info!(
            event_name = "distribution.started",
            %run_id,
            leads = leads.len(),
            sales_persons = pool.len(),
            order = ?order,
            "distributing unassigned leads"
        );

        let mut distributed = 0;
        for lead in leads {
            let lead_id = lead.id;
            // another run may have claimed the lead since the listing
            let current = match self.lifecycle.leads().find_by_id(lead_id).await {
                Ok(Some(current)) if current.is_unassigned_new() => current,
                Ok(_) => continue,
                Err(error) => {
                    warn!(
                        event_name = "distribution.lead_failed",
                        %run_id,
                        lead_id = %lead_id,
                        error = %error,
                        "lead skipped"
                    );
                    continue;
                }
            };

            let assignee = &pool[self.slot(pool.len())];
            match self.lifecycle.assign_lead(current, assignee, AssignmentChannel::RoundRobin).await
            {
                Ok(_) => distributed += 1,
                Err(error) => warn!(
                    event_name = "distribution.lead_failed",
                    %run_id,
                    lead_id = %lead_id,
                    assignee_id = %assignee.id,
                    error = %error,
                    "lead skipped"
                ),
            }
        }

        info!(event_name = "distribution.finished", %run_id, distributed, "distribution finished");
        Ok(distributed)
    }

    /// Round-robin over an explicit set of leads and users. Unknown user ids
    /// fail the call; leads that are missing, not NEW, or fail to assign are
    /// reported as skipped.
    pub async fn distribute_specific(
        &self,
        lead_ids: &[LeadId],
        user_ids: &[UserId],
    ) -> Result<DistributionReport, LeadError> {
        let run_id = Uuid::new_v4();
        let mut pool = Vec::with_capacity(user_ids.len());
        for user_id in user_ids {
            let user = self.lifecycle.user(*user_id).await?;
            if user.active {
                pool.push(user);
            } else {
                warn!(
                    event_name = "distribution.user_inactive",
                    %run_id,
                    user_id = %user.id,
                    "inactive user left out of rotation"
                );
            }
        }

        let mut report = DistributionReport::default();
        if lead_ids.is_empty() {
            return Ok(report);
        }
        if pool.is_empty() {
            self.empty_pool(run_id, lead_ids.len())?;
            report.skipped = lead_ids
                .iter()
                .map(|lead_id| SkippedLead {
                    lead_id: *lead_id,
                    reason: SkipReason::Failed(LeadError::NoEligibleAssignees.to_string()),
                })
                .collect();
            return Ok(report);
        }

        for lead_id in lead_ids {
            let lead = match self.lifecycle.leads().find_by_id(*lead_id).await {
                Ok(Some(lead)) => lead,
                Ok(None) => {
                    report
                        .skipped
                        .push(SkippedLead { lead_id: *lead_id, reason: SkipReason::NotFound });
                    continue;
                }
                Err(error) => {
                    report.skipped.push(SkippedLead {
                        lead_id: *lead_id,
                        reason: SkipReason::Failed(error.to_string()),
                    });
                    continue;
                }
            };
            if lead.status != LeadStatus::New {
                report.skipped.push(SkippedLead {
                    lead_id: *lead_id,
                    reason: SkipReason::NotNew(lead.status),
                });
                continue;
            }

            let assignee = &pool[self.slot(pool.len())];
            match self.lifecycle.assign_lead(lead, assignee, AssignmentChannel::Manual).await {
                Ok(lead) => report.distributed.push(lead.id),
                Err(error) => {
                    warn!(
                        event_name = "distribution.lead_failed",
                        %run_id,
                        lead_id = %lead_id,
                        assignee_id = %assignee.id,
                        error = %error,
                        "lead skipped"
                    );
                    report.skipped.push(SkippedLead {
                        lead_id: *lead_id,
                        reason: SkipReason::Failed(error.to_string()),
                    });
                }
            }
        }

        info!(
            event_name = "distribution.finished",
            %run_id,
            distributed = report.distributed.len(),
            skipped = report.skipped.len(),
            "targeted distribution finished"
        );
        Ok(report)
    }

    /// Moves a lead to another user without touching the rotation or the
    /// lead's status.
    pub async fn reassign(
        &self,
        lead_id: LeadId,
        new_user_id: UserId,
        actor_id: UserId,
    ) -> Result<Lead, LeadError> {
        let mut lead = self.lifecycle.lead(lead_id).await?;
        let new_owner = self.lifecycle.user(new_user_id).await?;
        let actor = self.lifecycle.user(actor_id).await?;
        if !new_owner.active {
            return Err(LeadError::BusinessRuleViolation(format!(
                "user {} is inactive and cannot take over lead {}",
                new_owner.username, lead.id
            )));
        }

        let previous = match lead.owner {
            Some(owner_id) => match self.lifecycle.users().find_by_id(owner_id).await? {
                Some(owner) => owner.username,
                None => format!("user {owner_id}"),
            },
            None => "unassigned".to_string(),
        };

        lead.owner = Some(new_owner.id);
        touch(&mut lead, Some(&actor));

        self.lifecycle
            .commit(
                &lead,
                HistoryRecord::new(
                    lead.id,
                    action::REASSIGNED,
                    ActionType::UserAction,
                    format!("Lead reassigned from {previous} to {}", new_owner.username),
                )
                .by(actor.id),
            )
            .await?;

        info!(
            event_name = "lead.reassigned",
            lead_id = %lead.id,
            new_owner_id = %new_owner.id,
            actor_id = %actor.id,
            "lead reassigned"
        );
        Ok(lead)
    }

    pub async fn distribution_stats(&self) -> Result<DistributionStats, LeadError> {
        let leads = self.lifecycle.leads();
        let sales_persons = self.lifecycle.users().find_active_by_role(Role::SalesPerson).await?;

        let mut all_leads = 0;
        for status in LeadStatus::ALL {
            all_leads += leads.count_by_status(status).await?;
        }
        let new_leads = leads.count_by_status(LeadStatus::New).await?;
        let assigned_leads = leads.count_by_status(LeadStatus::Assigned).await?;

        let mut per_person = Vec::with_capacity(sales_persons.len());
        for person in &sales_persons {
            per_person.push(SalesPersonLoad {
                user_id: person.id,
                username: person.username.clone(),
                owned_leads: leads.count_by_owner(person.id).await?,
            });
        }

        Ok(DistributionStats {
            active_sales_persons: sales_persons.len(),
            new_leads,
            assigned_leads,
            total: new_leads + assigned_leads,
            all_leads,
            per_person,
        })
    }

    fn slot(&self, pool_size: usize) -> usize {
        (self.counter.next_slot() % pool_size as u64) as usize
    }

    fn empty_pool(&self, run_id: Uuid, pending: usize) -> Result<usize, LeadError> {
        match self.config.empty_pool {
            EmptyPoolPolicy::Fail => Err(LeadError::NoEligibleAssignees),
            EmptyPoolPolicy::Skip => {
                warn!(
                    event_name = "distribution.empty_pool",
                    %run_id,
                    pending,
                    "no active sales persons; leads left unassigned"
                );
                Ok(0)
            }
        }
    }
}
