use std::collections::HashMap;
use std::sync::Arc;

use rust_decimal::Decimal;

use leadflow_core::config::DistributionConfig;
use leadflow_core::domain::history::{action, ActionType};
use leadflow_core::store::LeadStore;
use leadflow_core::{
    DistributionEngine, DistributionOrder, EmptyPoolPolicy, Lead, LeadError, LeadId, LeadProfile,
    LeadStatus, LifecycleEngine, Role, ScoringEngine, SkipReason, User, UserId,
};
use leadflow_db::{InMemoryHistoryStore, InMemoryLeadStore, InMemoryUserStore};

type Distributor = DistributionEngine<InMemoryLeadStore, InMemoryUserStore, InMemoryHistoryStore>;

const MANAGER: UserId = UserId(1);
const SAM: UserId = UserId(10);
const RILEY: UserId = UserId(11);
const CASEY: UserId = UserId(12);
const RETIRED: UserId = UserId(13);

fn user(id: UserId, username: &str, role: Role, active: bool) -> User {
    User { id, username: username.to_string(), role, active }
}

struct Harness {
    leads: Arc<InMemoryLeadStore>,
    distributor: Distributor,
}

impl Harness {
    fn build(users: Vec<User>, config: DistributionConfig) -> Self {
        let leads = Arc::new(InMemoryLeadStore::default());
        let lifecycle = Arc::new(LifecycleEngine::new(
            Arc::clone(&leads),
            Arc::new(InMemoryUserStore::with_users(users)),
            Arc::new(InMemoryHistoryStore::default()),
            ScoringEngine::default(),
        ));
        Self { leads, distributor: DistributionEngine::new(lifecycle, config) }
    }

    fn with_sales_persons(count: usize) -> Self {
        let mut users = vec![user(MANAGER, "mia.manager", Role::SalesManager, true)];
        for index in 0..count {
            users.push(user(
                UserId(10 + index as i64),
                &format!("sales-{index}"),
                Role::SalesPerson,
                true,
            ));
        }
        users.push(user(UserId(99), "pat.retired", Role::SalesPerson, false));
        Self::build(users, DistributionConfig::default())
    }

    fn team() -> Self {
        Self::build(
            vec![
                user(MANAGER, "mia.manager", Role::SalesManager, true),
                user(SAM, "sam.sales", Role::SalesPerson, true),
                user(RILEY, "riley.sales", Role::SalesPerson, true),
                user(CASEY, "casey.sales", Role::SalesPerson, true),
                user(RETIRED, "pat.retired", Role::SalesPerson, false),
            ],
            DistributionConfig::default(),
        )
    }

    async fn intake(&self, count: usize) -> Vec<Lead> {
        let mut created = Vec::with_capacity(count);
        for index in 0..count {
            let profile = LeadProfile::new(format!("Lead {index}"));
            created.push(self.distributor.lifecycle().create(profile, None).await.expect("create"));
        }
        created
    }

    async fn stored(&self, id: LeadId) -> Lead {
        self.leads.find_by_id(id).await.expect("store").expect("lead exists")
    }

    async fn owners(&self, leads: &[Lead]) -> HashMap<UserId, usize> {
        let mut owners = HashMap::new();
        for lead in leads {
            if let Some(owner) = self.stored(lead.id).await.owner {
                *owners.entry(owner).or_insert(0) += 1;
            }
        }
        owners
    }
}

#[tokio::test]
async fn five_leads_over_two_persons_split_three_and_two() {
    let harness = Harness::with_sales_persons(2);
    let leads = harness.intake(5).await;

    let distributed = harness.distributor.distribute_all().await.expect("distribute");
    assert_eq!(distributed, 5);

    let owners = harness.owners(&leads).await;
    assert_eq!(owners.get(&UserId(10)), Some(&3));
    assert_eq!(owners.get(&UserId(11)), Some(&2));
    assert!(!owners.contains_key(&UserId(99)));
}

#[tokio::test]
async fn round_robin_is_fair_for_uneven_pools() {
    for (lead_count, persons) in [(7usize, 3usize), (10, 4), (3, 3), (9, 2)] {
        let harness = Harness::with_sales_persons(persons);
        let leads = harness.intake(lead_count).await;

        let distributed = harness.distributor.distribute_all().await.expect("distribute");
        assert_eq!(distributed, lead_count);

        let owners = harness.owners(&leads).await;
        let floor = lead_count / persons;
        let ceil = lead_count.div_ceil(persons);
        assert_eq!(owners.len(), persons);
        for count in owners.values() {
            assert!(
                *count == floor || *count == ceil,
                "{lead_count} leads over {persons} persons gave someone {count}"
            );
        }
    }
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let harness = Harness::team();
    let leads = harness.intake(4).await;

    assert_eq!(harness.distributor.distribute_all().await.expect("first"), 4);
    assert_eq!(harness.distributor.distribute_all().await.expect("second"), 0);

    let history = harness.distributor.lifecycle().history();
    for lead in &leads {
        let assignments =
            history.for_lead_and_action(lead.id, action::ASSIGNED).await.expect("history");
        assert_eq!(assignments.len(), 1, "lead {} assigned more than once", lead.id);
        assert_eq!(assignments[0].action_type, ActionType::System);
        assert_eq!(assignments[0].old_status, Some(LeadStatus::New));
        assert_eq!(assignments[0].new_status, Some(LeadStatus::Assigned));
        assert!(assignments[0].comment.starts_with("Lead distributed to "));
    }
}

#[tokio::test]
async fn highest_score_takes_the_first_slot() {
    let harness = Harness::team();
    let plain = harness.intake(2).await;
    let rich = harness
        .distributor
        .lifecycle()
        .create(
            LeadProfile::new("Big Fish")
                .with_company("Globex")
                .with_potential_value(Decimal::new(1_500_000, 0)),
            None,
        )
        .await
        .expect("create");

    harness.distributor.distribute_all().await.expect("distribute");

    assert_eq!(harness.stored(rich.id).await.owner, Some(SAM));
    assert_eq!(harness.stored(plain[0].id).await.owner, Some(RILEY));
    assert_eq!(harness.stored(plain[1].id).await.owner, Some(CASEY));
}

#[tokio::test]
async fn creation_order_ignores_score_when_configured() {
    let harness = Harness::build(
        vec![
            user(SAM, "sam.sales", Role::SalesPerson, true),
            user(RILEY, "riley.sales", Role::SalesPerson, true),
        ],
        DistributionConfig { order: DistributionOrder::CreatedAsc, ..DistributionConfig::default() },
    );
    let first = harness.intake(1).await.remove(0);
    let rich = harness
        .distributor
        .lifecycle()
        .create(LeadProfile::new("Later").with_potential_value(Decimal::new(2_000_000, 0)), None)
        .await
        .expect("create");

    harness.distributor.distribute_all().await.expect("distribute");
    assert_eq!(harness.stored(first.id).await.owner, Some(SAM));
    assert_eq!(harness.stored(rich.id).await.owner, Some(RILEY));
}

#[tokio::test]
async fn rotation_continues_across_runs() {
    let harness = Harness::with_sales_persons(2);
    let first = harness.intake(1).await;
    harness.distributor.distribute_all().await.expect("first");
    let second = harness.intake(1).await;
    harness.distributor.distribute_all().await.expect("second");

    assert_eq!(harness.stored(first[0].id).await.owner, Some(UserId(10)));
    assert_eq!(harness.stored(second[0].id).await.owner, Some(UserId(11)));
}

#[tokio::test]
async fn nothing_to_distribute_is_not_an_error_even_without_staff() {
    let harness = Harness::build(
        vec![user(MANAGER, "mia.manager", Role::SalesManager, true)],
        DistributionConfig::default(),
    );
    assert_eq!(harness.distributor.distribute_all().await.expect("empty"), 0);
}

#[tokio::test]
async fn empty_pool_follows_configured_policy() {
    let users = vec![
        user(MANAGER, "mia.manager", Role::SalesManager, true),
        user(RETIRED, "pat.retired", Role::SalesPerson, false),
    ];

    let failing = Harness::build(users.clone(), DistributionConfig::default());
    failing.intake(2).await;
    assert_eq!(failing.distributor.distribute_all().await, Err(LeadError::NoEligibleAssignees));

    let skipping = Harness::build(
        users,
        DistributionConfig { empty_pool: EmptyPoolPolicy::Skip, ..DistributionConfig::default() },
    );
    let leads = skipping.intake(2).await;
    assert_eq!(skipping.distributor.distribute_all().await.expect("skip"), 0);
    assert_eq!(skipping.stored(leads[0].id).await.status, LeadStatus::New);
}

#[tokio::test]
async fn targeted_distribution_skips_what_it_cannot_take() {
    let harness = Harness::team();
    let leads = harness.intake(4).await;
    harness.distributor.lifecycle().assign(leads[1].id, CASEY).await.expect("pre-assign");

    let report = harness
        .distributor
        .distribute_specific(
            &[leads[0].id, leads[1].id, LeadId(404), leads[2].id, leads[3].id],
            &[SAM, RILEY, RETIRED],
        )
        .await
        .expect("distribute");

    assert_eq!(report.distributed, vec![leads[0].id, leads[2].id, leads[3].id]);
    assert_eq!(report.skipped.len(), 2);
    assert_eq!(report.skipped[0].reason, SkipReason::NotNew(LeadStatus::Assigned));
    assert_eq!(report.skipped[1].lead_id, LeadId(404));
    assert_eq!(report.skipped[1].reason, SkipReason::NotFound);

    assert_eq!(harness.stored(leads[0].id).await.owner, Some(SAM));
    assert_eq!(harness.stored(leads[2].id).await.owner, Some(RILEY));
    assert_eq!(harness.stored(leads[3].id).await.owner, Some(SAM));

    let entries = harness
        .distributor
        .lifecycle()
        .history()
        .for_lead_and_action(leads[0].id, action::ASSIGNED)
        .await
        .expect("history");
    assert_eq!(entries[0].comment, "Lead manually distributed to sam.sales");
    assert_eq!(entries[0].action_type, ActionType::UserAction);
}

#[tokio::test]
async fn targeted_distribution_rejects_unknown_users() {
    let harness = Harness::team();
    let leads = harness.intake(1).await;

    let error = harness
        .distributor
        .distribute_specific(&[leads[0].id], &[SAM, UserId(777)])
        .await
        .expect_err("unknown user");
    assert!(matches!(error, LeadError::NotFound { entity: "user", .. }));
    assert_eq!(harness.stored(leads[0].id).await.status, LeadStatus::New);
}

#[tokio::test]
async fn reassign_keeps_status_and_names_previous_owner() {
    let harness = Harness::team();
    let leads = harness.intake(2).await;
    harness.distributor.lifecycle().assign(leads[0].id, SAM).await.expect("assign");
    harness
        .distributor
        .lifecycle()
        .update_status(leads[0].id, LeadStatus::InProgress, SAM)
        .await
        .expect("status");

    let moved = harness.distributor.reassign(leads[0].id, RILEY, MANAGER).await.expect("reassign");
    assert_eq!(moved.owner, Some(RILEY));
    assert_eq!(moved.status, LeadStatus::InProgress);

    let fresh = harness.distributor.reassign(leads[1].id, CASEY, MANAGER).await.expect("reassign");
    assert_eq!(fresh.status, LeadStatus::New);

    let history = harness.distributor.lifecycle().history();
    let reassigned = history.by_action(action::REASSIGNED).await.expect("history");
    let comments: Vec<_> = reassigned.iter().map(|entry| entry.comment.as_str()).collect();
    assert_eq!(
        comments,
        vec![
            "Lead reassigned from unassigned to casey.sales",
            "Lead reassigned from sam.sales to riley.sales",
        ]
    );
    assert!(reassigned.iter().all(|entry| entry.actor == Some(MANAGER)));
    assert!(reassigned.iter().all(|entry| entry.old_status.is_none()));

    let inactive =
        harness.distributor.reassign(leads[0].id, RETIRED, MANAGER).await.expect_err("inactive");
    assert!(matches!(inactive, LeadError::BusinessRuleViolation(_)));
}

#[tokio::test]
async fn reassign_does_not_advance_the_rotation() {
    let harness = Harness::team();
    let leads = harness.intake(1).await;
    harness.distributor.reassign(leads[0].id, CASEY, MANAGER).await.expect("reassign");

    // the reassigned lead is still NEW but owned, so it is not picked up
    let next = harness.intake(1).await;
    assert_eq!(harness.distributor.distribute_all().await.expect("distribute"), 1);
    assert_eq!(harness.stored(next[0].id).await.owner, Some(SAM));
}

#[tokio::test]
async fn stats_are_read_only_aggregates() {
    let harness = Harness::team();
    let leads = harness.intake(5).await;
    harness.distributor.lifecycle().assign(leads[0].id, SAM).await.expect("assign");
    harness.distributor.lifecycle().assign(leads[1].id, SAM).await.expect("assign");
    harness.distributor.lifecycle().assign(leads[2].id, RILEY).await.expect("assign");
    harness
        .distributor
        .lifecycle()
        .update_status(leads[2].id, LeadStatus::InProgress, RILEY)
        .await
        .expect("status");

    let stats = harness.distributor.distribution_stats().await.expect("stats");
    assert_eq!(stats.active_sales_persons, 3);
    assert_eq!(stats.new_leads, 2);
    assert_eq!(stats.assigned_leads, 2);
    // the IN_PROGRESS lead is past the funnel
    assert_eq!(stats.total, 4);
    assert_eq!(stats.all_leads, 5);

    let loads: Vec<_> =
        stats.per_person.iter().map(|load| (load.username.as_str(), load.owned_leads)).collect();
    assert_eq!(loads, vec![("sam.sales", 2), ("riley.sales", 1), ("casey.sales", 0)]);

    let again = harness.distributor.distribution_stats().await.expect("stats");
    assert_eq!(again, stats);
}

#[tokio::test]
async fn stats_total_leaves_out_leads_past_assignment() {
    let harness = Harness::team();
    let leads = harness.intake(3).await;
    let lifecycle = harness.distributor.lifecycle();
    lifecycle.assign(leads[1].id, SAM).await.expect("assign");
    lifecycle.assign(leads[2].id, RILEY).await.expect("assign");
    lifecycle.update_status(leads[2].id, LeadStatus::Converted, RILEY).await.expect("convert");

    let stats = harness.distributor.distribution_stats().await.expect("stats");
    assert_eq!(stats.new_leads, 1);
    assert_eq!(stats.assigned_leads, 1);
    assert_eq!(stats.total, 2);
    assert_eq!(stats.all_leads, 3);
}
