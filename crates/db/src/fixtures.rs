use std::sync::Arc;

use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::Executor;
use tracing::info;

use leadflow_core::domain::lead::{LeadId, LeadProfile, LeadSource};
use leadflow_core::domain::user::{Role, User, UserId};
use leadflow_core::errors::LeadError;
use leadflow_core::lifecycle::LifecycleEngine;
use leadflow_core::scoring::ScoringEngine;
use leadflow_core::store::UserStore;

use crate::connection::DbPool;
use crate::repositories::{db_error, SqlHistoryStore, SqlLeadStore, SqlUserStore};

/// `created_by` tag carried by every demo lead; clean-up only ever touches
/// leads with this tag.
pub const DEMO_SEED_MARKER: &str = "demo-seed";

/// Demo sales team: one manager, three sales persons, one deactivated account.
const SEED_USERS: &[SeedUser] = &[
    SeedUser { id: 1, username: "morgan.manager", role: Role::SalesManager, active: true },
    SeedUser { id: 2, username: "sam.sales", role: Role::SalesPerson, active: true },
    SeedUser { id: 3, username: "riley.sales", role: Role::SalesPerson, active: true },
    SeedUser { id: 4, username: "casey.sales", role: Role::SalesPerson, active: true },
    SeedUser { id: 5, username: "pat.retired", role: Role::SalesPerson, active: false },
];

/// Unassigned intake covering every value tier, including one lead above the
/// default high-value threshold.
const SEED_LEADS: &[SeedLead] = &[
    SeedLead {
        name: "Hank Scorpio",
        company: Some("Globex Corporation"),
        email: Some("hank@globex.example"),
        phone: Some("+1 555 0100"),
        potential_value: 1_250_000,
        source: "PARTNER_REFERRAL",
    },
    SeedLead {
        name: "Bill Lumbergh",
        company: Some("Initech"),
        email: Some("bill@initech.example"),
        phone: None,
        potential_value: 600_000,
        source: "WEBINAR",
    },
    SeedLead {
        name: "Wile E. Coyote",
        company: Some("Acme Corp"),
        email: None,
        phone: Some("+1 555 0142"),
        potential_value: 120_000,
        source: "WEBSITE_SIGNUP",
    },
    SeedLead {
        name: "Arthur Dent",
        company: None,
        email: Some("arthur@earth.example"),
        phone: None,
        potential_value: 55_000,
        source: "COLD_CALL",
    },
    SeedLead {
        name: "Marla Singer",
        company: Some("Paper Street Soap"),
        email: None,
        phone: None,
        potential_value: 8_000,
        source: "Trade Show",
    },
];

#[derive(Debug, Clone, Copy)]
struct SeedUser {
    id: i64,
    username: &'static str,
    role: Role,
    active: bool,
}

impl SeedUser {
    fn to_user(self) -> User {
        User {
            id: UserId(self.id),
            username: self.username.to_string(),
            role: self.role,
            active: self.active,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct SeedLead {
    name: &'static str,
    company: Option<&'static str>,
    email: Option<&'static str>,
    phone: Option<&'static str>,
    potential_value: i64,
    source: &'static str,
}

impl SeedLead {
    fn to_profile(self) -> LeadProfile {
        LeadProfile {
            name: self.name.to_string(),
            company: self.company.map(str::to_string),
            email: self.email.map(str::to_string),
            phone: self.phone.map(str::to_string),
            potential_value: Some(Decimal::new(self.potential_value, 0)),
            source: Some(LeadSource::parse(self.source)),
        }
    }
}

/// Deterministic demo data for local runs and end-to-end checks.
pub struct DemoSeedDataset;

impl DemoSeedDataset {
    /// Upserts the demo users and creates the demo leads through the
    /// lifecycle engine, so every lead is scored and carries its "Created"
    /// history line.
    pub async fn load(pool: &DbPool, scoring: ScoringEngine) -> Result<SeedResult, LeadError> {
        let users = Arc::new(SqlUserStore::new(pool.clone()));
        for seed in SEED_USERS {
            users.save(seed.to_user()).await?;
        }

        let engine = LifecycleEngine::new(
            Arc::new(SqlLeadStore::new(pool.clone())),
            users,
            Arc::new(SqlHistoryStore::new(pool.clone())),
            scoring,
        );

        let mut leads_seeded = Vec::with_capacity(SEED_LEADS.len());
        for seed in SEED_LEADS {
            let lead = engine.create(seed.to_profile(), None).await?;
            sqlx::query("UPDATE leads SET created_by = ?1, updated_by = ?1 WHERE id = ?2")
                .bind(DEMO_SEED_MARKER)
                .bind(lead.id.0)
                .execute(pool)
                .await
                .map_err(db_error)?;
            leads_seeded.push(SeededLead { lead_id: lead.id, name: seed.name, score: lead.score });
        }

        info!(
            event_name = "seed.loaded",
            users = SEED_USERS.len(),
            leads = leads_seeded.len(),
            "demo dataset loaded"
        );
        Ok(SeedResult { users_seeded: SEED_USERS.len(), leads_seeded })
    }

    /// Checks that every demo user exists with its seeded role and flag.
    pub async fn verify(pool: &DbPool) -> Result<VerificationResult, LeadError> {
        let mut checks = Vec::with_capacity(SEED_USERS.len() + 1);

        for seed in SEED_USERS {
            let present: i64 = sqlx::query_scalar(
                "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1 AND username = ?2 AND role = ?3 AND active = ?4)",
            )
            .bind(seed.id)
            .bind(seed.username)
            .bind(seed.role.as_str())
            .bind(seed.active)
            .fetch_one(pool)
            .await
            .map_err(db_error)?;
            checks.push((seed.username, present == 1));
        }

        let names: Vec<&str> = SEED_LEADS.iter().map(|seed| seed.name).collect();
        let lead_count: i64 = sqlx::query_scalar(&format!(
            "SELECT COUNT(DISTINCT name) FROM leads WHERE created_by = ?1 AND name IN {}",
            sql_array(&names)
        ))
        .bind(DEMO_SEED_MARKER)
        .fetch_one(pool)
        .await
        .map_err(db_error)?;
        checks.push(("demo-leads", lead_count == SEED_LEADS.len() as i64));

        let all_present = checks.iter().all(|(_, ok)| *ok);
        Ok(VerificationResult { all_present, checks })
    }

    /// Removes the demo leads, whose history cascades with them, then any
    /// demo user that no remaining lead or history line refers to. Leads and
    /// history outside the demo set are left untouched.
    pub async fn clean(pool: &DbPool) -> Result<(), LeadError> {
        let user_ids = SEED_USERS.iter().map(|seed| seed.id.to_string()).collect::<Vec<_>>();

        let mut tx = pool.begin().await.map_err(db_error)?;
        let removed = tx
            .execute(sqlx::query("DELETE FROM leads WHERE created_by = ?1").bind(DEMO_SEED_MARKER))
            .await
            .map_err(db_error)?
            .rows_affected();
        tx.execute(sqlx::query(&format!(
            "DELETE FROM users
             WHERE id IN ({})
               AND NOT EXISTS (SELECT 1 FROM leads WHERE leads.owner_id = users.id)
               AND NOT EXISTS (SELECT 1 FROM lead_history WHERE lead_history.actor_id = users.id)",
            user_ids.join(",")
        )))
        .await
        .map_err(db_error)?;
        tx.commit().await.map_err(db_error)?;

        info!(event_name = "seed.cleaned", leads_removed = removed, "demo dataset removed");
        Ok(())
    }
}

fn sql_array(values: &[&str]) -> String {
    let quoted = values
        .iter()
        .map(|value| format!("'{}'", value.replace('\'', "''")))
        .collect::<Vec<_>>()
        .join(",");
    format!("({quoted})")
}

#[derive(Debug, Serialize)]
pub struct SeedResult {
    pub users_seeded: usize,
    pub leads_seeded: Vec<SeededLead>,
}

#[derive(Debug, Serialize)]
pub struct SeededLead {
    pub lead_id: LeadId,
    pub name: &'static str,
    pub score: u8,
}

#[derive(Debug, Serialize)]
pub struct VerificationResult {
    pub all_present: bool,
    pub checks: Vec<(&'static str, bool)>,
}

#[cfg(test)]
mod tests {
    use leadflow_core::domain::lead::LeadStatus;
    use leadflow_core::scoring::ScoringEngine;
    use leadflow_core::store::LeadStore;

    use super::*;
    use crate::{connect_with_settings, migrations};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    #[test]
    fn seed_profiles_are_valid() {
        for seed in SEED_LEADS {
            seed.to_profile().validate().expect("valid demo profile");
        }
    }

    #[tokio::test]
    async fn load_then_verify_reports_everything_present() {
        let pool = pool().await;
        let result = DemoSeedDataset::load(&pool, ScoringEngine::default()).await.expect("load");
        assert_eq!(result.users_seeded, 5);
        assert_eq!(result.leads_seeded.len(), 5);
        // 40 (1M tier) + 30 (partner) + 30 (email, phone, company)
        assert_eq!(result.leads_seeded[0].score, 100);

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(verification.all_present, "{:?}", verification.checks);
    }

    #[tokio::test]
    async fn clean_removes_seeded_rows() {
        let pool = pool().await;
        DemoSeedDataset::load(&pool, ScoringEngine::default()).await.expect("load");
        DemoSeedDataset::clean(&pool).await.expect("clean");

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        assert!(verification.checks.iter().all(|(_, ok)| !ok));
    }

    #[tokio::test]
    async fn clean_leaves_other_leads_and_their_history_alone() {
        let pool = pool().await;
        DemoSeedDataset::load(&pool, ScoringEngine::default()).await.expect("load");

        let engine = LifecycleEngine::new(
            Arc::new(SqlLeadStore::new(pool.clone())),
            Arc::new(SqlUserStore::new(pool.clone())),
            Arc::new(SqlHistoryStore::new(pool.clone())),
            ScoringEngine::default(),
        );
        // shares a demo name but was not created by the seed
        let real = engine.create(LeadProfile::new("Arthur Dent"), None).await.expect("create");
        engine.assign(real.id, UserId(2)).await.expect("assign");

        DemoSeedDataset::clean(&pool).await.expect("clean");

        let kept = SqlLeadStore::new(pool.clone())
            .find_by_id(real.id)
            .await
            .expect("load")
            .expect("real lead survives");
        assert_eq!(kept.status, LeadStatus::Assigned);
        assert_eq!(kept.owner, Some(UserId(2)));
        assert_eq!(engine.history().count_for_lead(real.id).await.expect("history"), 2);

        let remaining: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM leads").fetch_one(&pool).await.expect("count");
        assert_eq!(remaining, 1);

        let users = SqlUserStore::new(pool.clone());
        assert!(users.find_by_id(UserId(2)).await.expect("owner").is_some());
        assert!(users.find_by_id(UserId(3)).await.expect("unreferenced").is_none());

        let verification = DemoSeedDataset::verify(&pool).await.expect("verify");
        assert!(!verification.all_present);
        DemoSeedDataset::load(&pool, ScoringEngine::default()).await.expect("reload");
        assert!(DemoSeedDataset::verify(&pool).await.expect("verify").all_present);
    }
}
