use sqlx::Row;

use leadflow_core::domain::user::{Role, User, UserId};
use leadflow_core::errors::StoreError;
use leadflow_core::store::UserStore;

use super::{db_error, decode_error};
use crate::DbPool;

pub struct SqlUserStore {
    pool: DbPool,
}

impl SqlUserStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

fn row_to_user(row: &sqlx::sqlite::SqliteRow) -> Result<User, StoreError> {
    let id: i64 = row.try_get("id").map_err(decode_error)?;
    let username: String = row.try_get("username").map_err(decode_error)?;
    let role: String = row.try_get("role").map_err(decode_error)?;
    let active: bool = row.try_get("active").map_err(decode_error)?;

    Ok(User {
        id: UserId(id),
        username,
        role: role.parse::<Role>().map_err(decode_error)?,
        active,
    })
}

#[async_trait::async_trait]
impl UserStore for SqlUserStore {
    async fn find_by_id(&self, id: UserId) -> Result<Option<User>, StoreError> {
        let row = sqlx::query("SELECT id, username, role, active FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        row.as_ref().map(row_to_user).transpose()
    }

    async fn find_active_by_role(&self, role: Role) -> Result<Vec<User>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, username, role, active FROM users
             WHERE role = ? AND active = 1
             ORDER BY id ASC",
        )
        .bind(role.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(row_to_user).collect()
    }

    async fn save(&self, user: User) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO users (id, username, role, active)
             VALUES (?, ?, ?, ?)
             ON CONFLICT(id) DO UPDATE SET
                 username = excluded.username,
                 role = excluded.role,
                 active = excluded.active",
        )
        .bind(user.id.0)
        .bind(&user.username)
        .bind(user.role.as_str())
        .bind(user.active)
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}
