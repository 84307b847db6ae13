use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::LeadError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Role {
    SalesPerson,
    SalesManager,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::SalesPerson => "SALES_PERSON",
            Self::SalesManager => "SALES_MANAGER",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = LeadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_uppercase().as_str() {
            "SALES_PERSON" => Ok(Self::SalesPerson),
            "SALES_MANAGER" => Ok(Self::SalesManager),
            other => Err(LeadError::Validation(format!(
                "unknown role `{other}` (expected SALES_PERSON|SALES_MANAGER)"
            ))),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub role: Role,
    pub active: bool,
}

impl User {
    pub fn is_manager(&self) -> bool {
        self.role == Role::SalesManager
    }

    /// Only active sales persons take part in round-robin distribution.
    pub fn is_distribution_candidate(&self) -> bool {
        self.active && self.role == Role::SalesPerson
    }
}
