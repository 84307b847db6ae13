use chrono::{DateTime, SecondsFormat, Utc};

use leadflow_core::errors::StoreError;

pub mod history;
pub mod lead;
pub mod memory;
pub mod user;

pub use history::SqlHistoryStore;
pub use lead::SqlLeadStore;
pub use memory::{InMemoryHistoryStore, InMemoryLeadStore, InMemoryUserStore};
pub use user::SqlUserStore;

pub(crate) fn db_error(error: sqlx::Error) -> StoreError {
    StoreError::Database(error.to_string())
}

pub(crate) fn decode_error(error: impl ToString) -> StoreError {
    StoreError::Decode(error.to_string())
}

/// Fixed-width UTC timestamps, so text comparison in SQL matches time order.
pub(crate) fn encode_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub(crate) fn decode_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>, StoreError> {
    DateTime::parse_from_rfc3339(raw)
        .map(|value| value.with_timezone(&Utc))
        .map_err(|error| StoreError::Decode(format!("{column} `{raw}`: {error}")))
}
