use std::str::FromStr;

use rust_decimal::Decimal;
use sqlx::Row;

use leadflow_core::domain::lead::{Lead, LeadId, LeadProfile, LeadSource, LeadStatus, NewLead};
use leadflow_core::domain::user::UserId;
use leadflow_core::errors::StoreError;
use leadflow_core::store::LeadStore;

use super::{db_error, decode_error, decode_timestamp, encode_timestamp};
use crate::DbPool;

const LEAD_COLUMNS: &str = "id, name, company, email, phone, potential_value, source, score, \
                            status, owner_id, created_at, updated_at, created_by, updated_by";

pub struct SqlLeadStore {
    pool: DbPool,
}

impl SqlLeadStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_lead(row: &sqlx::sqlite::SqliteRow) -> Result<Lead, StoreError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let potential_value: Option<String> = row.try_get("potential_value").map_err(decode_error)?;
    let source: Option<String> = row.try_get("source").map_err(decode_error)?;
    let score: i64 = row.try_get("score").map_err(decode_error)?;
    let status: String = row.try_get("status").map_err(decode_error)?;
    let owner_id: Option<i64> = row.try_get("owner_id").map_err(decode_error)?;
    let created_at: String = row.try_get("created_at").map_err(decode_error)?;
    let updated_at: String = row.try_get("updated_at").map_err(decode_error)?;

    let potential_value = potential_value
        .map(|raw| {
            Decimal::from_str(&raw)
                .map_err(|error| StoreError::Decode(format!("potential_value `{raw}`: {error}")))
        })
        .transpose()?;

    Ok(Lead {
        id: LeadId(id),
        profile: LeadProfile {
            name: row.try_get("name").map_err(decode_error)?,
            company: row.try_get("company").map_err(decode_error)?,
            email: row.try_get("email").map_err(decode_error)?,
            phone: row.try_get("phone").map_err(decode_error)?,
            potential_value,
            source: source.map(LeadSource::from),
        },
        score: u8::try_from(score)
            .map_err(|_| StoreError::Decode(format!("score `{score}` out of range")))?,
        status: status.parse::<LeadStatus>().map_err(decode_error)?,
        owner: owner_id.map(UserId),
        created_at: decode_timestamp("created_at", &created_at)?,
        updated_at: decode_timestamp("updated_at", &updated_at)?,
        created_by: row.try_get("created_by").map_err(decode_error)?,
        updated_by: row.try_get("updated_by").map_err(decode_error)?,
    })
}

#[async_trait::async_trait]
impl LeadStore for SqlLeadStore {
    async fn find_by_id(&self, id: LeadId) -> Result<Option<Lead>, StoreError> {
        let row = sqlx::query(&format!("SELECT {LEAD_COLUMNS} FROM leads WHERE id = ?"))
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_lead).transpose()
    }

    async fn find_new_unowned(&self) -> Result<Vec<Lead>, StoreError> {
        let rows = sqlx::query(&format!(
            "SELECT {LEAD_COLUMNS} FROM leads WHERE status = 'NEW' AND owner_id IS NULL"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_lead).collect()
    }

    async fn insert(&self, lead: NewLead) -> Result<Lead, StoreError> {
        let created_at = encode_timestamp(&lead.created_at);
        let result = sqlx::query(
            "INSERT INTO leads (name, company, email, phone, potential_value, source, score,
                                status, owner_id, created_at, updated_at, created_by, updated_by)
             VALUES (?, ?, ?, ?, ?, ?, ?, 'NEW', NULL, ?, ?, ?, ?)",
        )
        .bind(&lead.profile.name)
        .bind(&lead.profile.company)
        .bind(&lead.profile.email)
        .bind(&lead.profile.phone)
        .bind(lead.profile.potential_value.map(|value| value.to_string()))
        .bind(lead.profile.source.as_ref().map(|source| source.code().to_string()))
        .bind(i64::from(lead.score))
        .bind(&created_at)
        .bind(&created_at)
        .bind(&lead.created_by)
        .bind(&lead.created_by)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(Lead {
            id: LeadId(result.last_insert_rowid()),
            profile: lead.profile,
            score: lead.score,
            status: LeadStatus::New,
            owner: None,
            created_at: lead.created_at,
            updated_at: lead.created_at,
            created_by: lead.created_by.clone(),
            updated_by: lead.created_by,
        })
    }

    async fn save(&self, lead: Lead) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE leads SET
                 name = ?, company = ?, email = ?, phone = ?, potential_value = ?, source = ?,
                 score = ?, status = ?, owner_id = ?, updated_at = ?, updated_by = ?
             WHERE id = ?",
        )
        .bind(&lead.profile.name)
        .bind(&lead.profile.company)
        .bind(&lead.profile.email)
        .bind(&lead.profile.phone)
        .bind(lead.profile.potential_value.map(|value| value.to_string()))
        .bind(lead.profile.source.as_ref().map(|source| source.code().to_string()))
        .bind(i64::from(lead.score))
        .bind(lead.status.as_str())
        .bind(lead.owner.map(|owner| owner.0))
        .bind(encode_timestamp(&lead.updated_at))
        .bind(&lead.updated_by)
        .bind(lead.id.0)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::Missing { entity: "lead", id: lead.id.to_string() });
        }
        Ok(())
    }

    async fn count_by_status(&self, status: LeadStatus) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM leads WHERE status = ?")
            .bind(status.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }

    async fn count_by_owner(&self, owner: UserId) -> Result<u64, StoreError> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(1) FROM leads WHERE owner_id = ?")
            .bind(owner.0)
            .fetch_one(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(count.max(0) as u64)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::Decimal;

    use leadflow_core::domain::lead::{LeadId, LeadProfile, LeadSource, LeadStatus, NewLead};
    use leadflow_core::domain::user::{Role, User, UserId};
    use leadflow_core::errors::StoreError;
    use leadflow_core::store::{LeadStore, UserStore};

    use super::SqlLeadStore;
    use crate::repositories::SqlUserStore;
    use crate::{connect_with_settings, migrations, DbPool};

    async fn pool() -> DbPool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        pool
    }

    fn new_lead(name: &str) -> NewLead {
        NewLead {
            profile: LeadProfile::new(name)
                .with_company("Globex")
                .with_email("buyer@globex.com")
                .with_potential_value(Decimal::new(25_000_050, 2))
                .with_source(LeadSource::Custom("Podcast".to_string())),
            score: 42,
            created_at: Utc::now(),
            created_by: Some("intake".to_string()),
        }
    }

    #[tokio::test]
    async fn insert_then_load_preserves_profile() {
        let store = SqlLeadStore::new(pool().await);
        let inserted = store.insert(new_lead("Hank Scorpio")).await.expect("insert");

        let loaded = store.find_by_id(inserted.id).await.expect("load").expect("exists");
        assert_eq!(loaded.profile, inserted.profile);
        assert_eq!(loaded.status, LeadStatus::New);
        assert_eq!(loaded.owner, None);
        assert_eq!(loaded.score, 42);
        assert_eq!(loaded.profile.potential_value, Some(Decimal::new(25_000_050, 2)));
    }

    #[tokio::test]
    async fn save_updates_status_owner_and_counts() {
        let pool = pool().await;
        let users = SqlUserStore::new(pool.clone());
        users
            .save(User {
                id: UserId(4),
                username: "sam".to_string(),
                role: Role::SalesPerson,
                active: true,
            })
            .await
            .expect("user");

        let store = SqlLeadStore::new(pool);
        let first = store.insert(new_lead("First")).await.expect("insert");
        store.insert(new_lead("Second")).await.expect("insert");

        let mut assigned = first.clone();
        assigned.status = LeadStatus::Assigned;
        assigned.owner = Some(UserId(4));
        store.save(assigned).await.expect("save");

        assert_eq!(store.count_by_status(LeadStatus::New).await.expect("count"), 1);
        assert_eq!(store.count_by_status(LeadStatus::Assigned).await.expect("count"), 1);
        assert_eq!(store.count_by_owner(UserId(4)).await.expect("count"), 1);

        let unowned = store.find_new_unowned().await.expect("unowned");
        assert_eq!(unowned.len(), 1);
        assert_eq!(unowned[0].profile.name, "Second");
    }

    #[tokio::test]
    async fn save_of_unknown_lead_is_reported_missing() {
        let store = SqlLeadStore::new(pool().await);
        let mut lead = store.insert(new_lead("Ghost")).await.expect("insert");
        lead.id = LeadId(999);

        let error = store.save(lead).await.expect_err("unknown id");
        assert!(matches!(error, StoreError::Missing { entity: "lead", .. }));
    }
}
