use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("{entity} `{id}` does not exist in the store")]
    Missing { entity: &'static str, id: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum LeadError {
    #[error("{entity} not found with id: {id}")]
    NotFound { entity: &'static str, id: String },
    #[error("business rule violation: {0}")]
    BusinessRuleViolation(String),
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    #[error("no active sales persons found for lead distribution")]
    NoEligibleAssignees,
    #[error("no active manager found for lead escalation")]
    NoManagerAvailable,
    #[error("validation failed: {0}")]
    Validation(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl LeadError {
    pub fn lead_not_found(id: impl ToString) -> Self {
        Self::NotFound { entity: "lead", id: id.to_string() }
    }

    pub fn user_not_found(id: impl ToString) -> Self {
        Self::NotFound { entity: "user", id: id.to_string() }
    }

    /// Stable machine-readable class, used by outer layers as an error code.
    pub fn class(&self) -> &'static str {
        match self {
            Self::NotFound { .. } => "not_found",
            Self::BusinessRuleViolation(_) => "business_rule_violation",
            Self::Unauthorized(_) => "unauthorized",
            Self::NoEligibleAssignees => "no_eligible_assignees",
            Self::NoManagerAvailable => "no_manager_available",
            Self::Validation(_) => "validation",
            Self::Store(_) => "store",
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String, correlation_id: String },
    #[error("forbidden: {message}")]
    Forbidden { message: String, correlation_id: String },
    #[error("not found: {message}")]
    NotFound { message: String, correlation_id: String },
    #[error("conflict: {message}")]
    Conflict { message: String, correlation_id: String },
    #[error("service unavailable: {message}")]
    ServiceUnavailable { message: String, correlation_id: String },
}

impl InterfaceError {
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::BadRequest { .. } => {
                "The request could not be processed. Check inputs and try again."
            }
            Self::Forbidden { .. } => "You are not allowed to perform this action on the lead.",
            Self::NotFound { .. } => "The requested lead or user does not exist.",
            Self::Conflict { .. } => {
                "No eligible team member is available to take the lead right now."
            }
            Self::ServiceUnavailable { .. } => {
                "The service is temporarily unavailable. Please retry shortly."
            }
        }
    }

    pub fn correlation_id(&self) -> &str {
        match self {
            Self::BadRequest { correlation_id, .. }
            | Self::Forbidden { correlation_id, .. }
            | Self::NotFound { correlation_id, .. }
            | Self::Conflict { correlation_id, .. }
            | Self::ServiceUnavailable { correlation_id, .. } => correlation_id,
        }
    }
}

impl LeadError {
    pub fn into_interface(self, correlation_id: impl Into<String>) -> InterfaceError {
        let correlation_id = correlation_id.into();
        let mut mapped = InterfaceError::from(self);
        match &mut mapped {
            InterfaceError::BadRequest { correlation_id: id, .. }
            | InterfaceError::Forbidden { correlation_id: id, .. }
            | InterfaceError::NotFound { correlation_id: id, .. }
            | InterfaceError::Conflict { correlation_id: id, .. }
            | InterfaceError::ServiceUnavailable { correlation_id: id, .. } => *id = correlation_id,
        }
        mapped
    }
}

impl From<LeadError> for InterfaceError {
    fn from(value: LeadError) -> Self {
        let message = value.to_string();
        let correlation_id = "unassigned".to_owned();
        match value {
            LeadError::Validation(_) | LeadError::BusinessRuleViolation(_) => {
                Self::BadRequest { message, correlation_id }
            }
            LeadError::Unauthorized(_) => Self::Forbidden { message, correlation_id },
            LeadError::NotFound { .. } => Self::NotFound { message, correlation_id },
            LeadError::NoEligibleAssignees | LeadError::NoManagerAvailable => {
                Self::Conflict { message, correlation_id }
            }
            LeadError::Store(_) => Self::ServiceUnavailable { message, correlation_id },
        }
    }
}
