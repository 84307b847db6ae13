use chrono::{DateTime, Utc};
use sqlx::Row;

use leadflow_core::domain::history::{ActionType, HistoryEntry, HistoryEntryId, NewHistoryEntry};
use leadflow_core::domain::lead::{LeadId, LeadStatus};
use leadflow_core::domain::user::UserId;
use leadflow_core::errors::StoreError;
use leadflow_core::store::HistoryStore;

use super::{db_error, decode_error, decode_timestamp, encode_timestamp};
use crate::DbPool;

const HISTORY_COLUMNS: &str =
    "id, lead_id, actor_id, comment, action, action_type, old_status, new_status, recorded_at";
const NEWEST_FIRST: &str = "ORDER BY recorded_at DESC, id DESC";

pub struct SqlHistoryStore {
    pool: DbPool,
}

impl SqlHistoryStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn fetch(
        &self,
        filter: &str,
        params: Vec<Param>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let sql =
            format!("SELECT {HISTORY_COLUMNS} FROM lead_history WHERE {filter} {NEWEST_FIRST}");
        let mut query = sqlx::query(&sql);
        for param in params {
            query = match param {
                Param::Int(value) => query.bind(value),
                Param::Text(value) => query.bind(value),
            };
        }
        let rows = query.fetch_all(&self.pool).await.map_err(db_error)?;
        rows.iter().map(row_to_entry).collect()
    }
}

enum Param {
    Int(i64),
    Text(String),
}

fn parse_status(column: &str, raw: Option<String>) -> Result<Option<LeadStatus>, StoreError> {
    raw.map(|raw| {
        raw.parse::<LeadStatus>()
            .map_err(|error| StoreError::Decode(format!("{column} `{raw}`: {error}")))
    })
    .transpose()
}

fn row_to_entry(row: &sqlx::sqlite::SqliteRow) -> Result<HistoryEntry, StoreError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let lead_id: i64 = row.try_get("lead_id").map_err(decode_error)?;
    let actor_id: Option<i64> = row.try_get("actor_id").map_err(decode_error)?;
    let action_type: String = row.try_get("action_type").map_err(decode_error)?;
    let old_status: Option<String> = row.try_get("old_status").map_err(decode_error)?;
    let new_status: Option<String> = row.try_get("new_status").map_err(decode_error)?;
    let recorded_at: String = row.try_get("recorded_at").map_err(decode_error)?;

    Ok(HistoryEntry {
        id: HistoryEntryId(id),
        lead_id: LeadId(lead_id),
        actor: actor_id.map(UserId),
        comment: row.try_get("comment").map_err(decode_error)?,
        action: row.try_get("action").map_err(decode_error)?,
        action_type: action_type.parse::<ActionType>().map_err(decode_error)?,
        old_status: parse_status("old_status", old_status)?,
        new_status: parse_status("new_status", new_status)?,
        recorded_at: decode_timestamp("recorded_at", &recorded_at)?,
    })
}

#[async_trait::async_trait]
impl HistoryStore for SqlHistoryStore {
    async fn append(&self, entry: NewHistoryEntry) -> Result<HistoryEntry, StoreError> {
        let result = sqlx::query(
            "INSERT INTO lead_history (lead_id, actor_id, comment, action, action_type,
                                       old_status, new_status, recorded_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.lead_id.0)
        .bind(entry.actor.map(|actor| actor.0))
        .bind(&entry.comment)
        .bind(&entry.action)
        .bind(entry.action_type.as_str())
        .bind(entry.old_status.map(|status| status.as_str()))
        .bind(entry.new_status.map(|status| status.as_str()))
        .bind(encode_timestamp(&entry.recorded_at))
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(entry.into_entry(HistoryEntryId(result.last_insert_rowid())))
    }

    async fn find_by_lead(&self, lead: LeadId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.fetch("lead_id = ?", vec![Param::Int(lead.0)]).await
    }

    async fn find_by_lead_and_action(
        &self,
        lead: LeadId,
        action: &str,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let params = vec![Param::Int(lead.0), Param::Text(action.to_string())];
        self.fetch("lead_id = ? AND action = ?", params).await
    }

    async fn find_recent(
        &self,
        lead: LeadId,
        limit: usize,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let sql = format!(
            "SELECT {HISTORY_COLUMNS} FROM lead_history WHERE lead_id = ? {NEWEST_FIRST} LIMIT ?"
        );
        let rows = sqlx::query(&sql)
            .bind(lead.0)
            .bind(limit)
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;
        rows.iter().map(row_to_entry).collect()
    }

    async fn find_by_actor(&self, actor: UserId) -> Result<Vec<HistoryEntry>, StoreError> {
        self.fetch("actor_id = ?", vec![Param::Int(actor.0)]).await
    }

    async fn find_by_action(&self, action: &str) -> Result<Vec<HistoryEntry>, StoreError> {
        self.fetch("action = ?", vec![Param::Text(action.to_string())]).await
    }

    async fn find_by_action_type(
        &self,
        action_type: ActionType,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        self.fetch("action_type = ?", vec![Param::Text(action_type.as_str().to_string())]).await
    }

    async fn find_between(
        &self,
        lead: Option<LeadId>,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<HistoryEntry>, StoreError> {
        let range =
            vec![Param::Text(encode_timestamp(&start)), Param::Text(encode_timestamp(&end))];
        match lead {
            Some(lead) => {
                let mut params = vec![Param::Int(lead.0)];
                params.extend(range);
                self.fetch("lead_id = ? AND recorded_at BETWEEN ? AND ?", params).await
            }
            None => self.fetch("recorded_at BETWEEN ? AND ?", range).await,
        }
    }
}
