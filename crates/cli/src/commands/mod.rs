pub mod config;
pub mod distribute;
pub mod history;
pub mod migrate;
pub mod seed;
pub mod stats;

use std::future::Future;
use std::sync::Arc;

use leadflow_core::config::{AppConfig, LoadOptions};
use leadflow_core::errors::LeadError;
use leadflow_core::lifecycle::LifecycleEngine;
use leadflow_core::scoring::ScoringEngine;
use leadflow_db::{
    connect_with_config, migrations, DbPool, SqlHistoryStore, SqlLeadStore, SqlUserStore,
};
use serde::Serialize;

/// `(error_class, message, exit_code)` of a failed command step.
pub(crate) type Failure = (&'static str, String, u8);

pub(crate) type SqlLifecycle = LifecycleEngine<SqlLeadStore, SqlUserStore, SqlHistoryStore>;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
}

impl CommandResult {
    pub fn success(command: &str, message: impl Into<String>) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
        };
        Self { exit_code, output: serialize_payload(payload) }
    }
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}

/// Loads config, connects, applies pending migrations, then hands the pool to
/// `work`. The pool is closed before returning whatever `work` produced.
pub(crate) fn with_database<T, F, Fut>(command: &str, work: F) -> Result<T, CommandResult>
where
    F: FnOnce(AppConfig, DbPool) -> Fut,
    Fut: Future<Output = Result<T, Failure>>,
{
    let config = AppConfig::load(LoadOptions::default()).map_err(|error| {
        CommandResult::failure(
            command,
            "config_validation",
            format!("configuration issue: {error}"),
            2,
        )
    })?;

    let runtime =
        tokio::runtime::Builder::new_current_thread().enable_all().build().map_err(|error| {
            CommandResult::failure(
                command,
                "runtime_init",
                format!("failed to initialize async runtime: {error}"),
                3,
            )
        })?;

    let result = runtime.block_on(async move {
        let pool = connect_with_config(&config.database)
            .await
            .map_err(|error| ("db_connectivity", error.to_string(), 4u8))?;
        if let Err(error) = migrations::run_pending(&pool).await {
            pool.close().await;
            return Err(("migration", error.to_string(), 5u8));
        }

        let outcome = work(config, pool.clone()).await;
        pool.close().await;
        outcome
    });

    result.map_err(|(error_class, message, exit_code)| {
        CommandResult::failure(command, error_class, message, exit_code)
    })
}

pub(crate) fn lifecycle(config: &AppConfig, pool: &DbPool) -> Arc<SqlLifecycle> {
    Arc::new(LifecycleEngine::new(
        Arc::new(SqlLeadStore::new(pool.clone())),
        Arc::new(SqlUserStore::new(pool.clone())),
        Arc::new(SqlHistoryStore::new(pool.clone())),
        ScoringEngine::new(&config.scoring),
    ))
}

/// Domain refusals exit with 7, an empty pool or missing manager with 8, and
/// store failures with 5.
pub(crate) fn lead_failure(error: LeadError) -> Failure {
    let exit_code = match &error {
        LeadError::Store(_) => 5,
        LeadError::NoEligibleAssignees | LeadError::NoManagerAvailable => 8,
        LeadError::NotFound { .. }
        | LeadError::BusinessRuleViolation(_)
        | LeadError::Unauthorized(_)
        | LeadError::Validation(_) => 7,
    };
    (error.class(), error.to_string(), exit_code)
}
