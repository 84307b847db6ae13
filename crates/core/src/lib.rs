pub mod audit;
pub mod config;
pub mod distribution;
pub mod domain;
pub mod errors;
pub mod lifecycle;
pub mod scoring;
pub mod store;

pub use audit::{HistoryLog, HistoryRecord};
pub use config::{AppConfig, ConfigError, ConfigOverrides, LoadOptions};
pub use distribution::{
    DistributionEngine, DistributionOrder, DistributionReport, DistributionStats, EmptyPoolPolicy,
    SalesPersonLoad, SkipReason, SkippedLead,
};
pub use domain::history::{ActionType, HistoryEntry, HistoryEntryId, NewHistoryEntry};
pub use domain::lead::{Lead, LeadId, LeadProfile, LeadSource, LeadStatus, NewLead};
pub use domain::user::{Role, User, UserId};
pub use errors::{InterfaceError, LeadError, StoreError};
pub use lifecycle::{AssignmentChannel, LifecycleEngine};
pub use scoring::{Priority, ScoringEngine, ScoringProfile};
pub use store::{HistoryStore, LeadStore, UserStore};
