use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::user::UserId;
use crate::errors::LeadError;

const MAX_NAME_LEN: usize = 100;
const MAX_COMPANY_LEN: usize = 100;
const MAX_EMAIL_LEN: usize = 100;
const MAX_PHONE_LEN: usize = 20;
const MAX_VALUE_SCALE: u32 = 2;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LeadId(pub i64);

impl fmt::Display for LeadId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LeadStatus {
    New,
    Assigned,
    InProgress,
    PreConversion,
    Converted,
    Rejected,
}

impl LeadStatus {
    pub const ALL: [LeadStatus; 6] = [
        Self::New,
        Self::Assigned,
        Self::InProgress,
        Self::PreConversion,
        Self::Converted,
        Self::Rejected,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::New => "NEW",
            Self::Assigned => "ASSIGNED",
            Self::InProgress => "IN_PROGRESS",
            Self::PreConversion => "PRE_CONVERSION",
            Self::Converted => "CONVERTED",
            Self::Rejected => "REJECTED",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Converted | Self::Rejected)
    }
}

impl fmt::Display for LeadStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LeadStatus {
    type Err = LeadError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_uppercase();
        Self::ALL.into_iter().find(|status| status.as_str() == normalized).ok_or_else(|| {
            LeadError::Validation(format!(
                "unknown lead status `{}` (expected one of NEW|ASSIGNED|IN_PROGRESS|PRE_CONVERSION|CONVERTED|REJECTED)",
                value.trim()
            ))
        })
    }
}

/// Where a lead came from. The first four variants are the canonical intake
/// channels; the rest exist for records imported from the older channel list,
/// and `Custom` keeps any free-text source verbatim.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum LeadSource {
    PartnerReferral,
    Webinar,
    WebsiteSignup,
    ColdCall,
    Referral,
    LinkedInCampaign,
    TradeShow,
    EmailCampaign,
    SocialMedia,
    Other,
    Custom(String),
}

impl LeadSource {
    pub fn code(&self) -> &str {
        match self {
            Self::PartnerReferral => "PARTNER_REFERRAL",
            Self::Webinar => "WEBINAR",
            Self::WebsiteSignup => "WEBSITE_SIGNUP",
            Self::ColdCall => "COLD_CALL",
            Self::Referral => "REFERRAL",
            Self::LinkedInCampaign => "LINKEDIN_CAMPAIGN",
            Self::TradeShow => "TRADE_SHOW",
            Self::EmailCampaign => "EMAIL_CAMPAIGN",
            Self::SocialMedia => "SOCIAL_MEDIA",
            Self::Other => "OTHER",
            Self::Custom(raw) => raw.as_str(),
        }
    }

    /// Accepts either the code (`PARTNER_REFERRAL`) or the display label
    /// (`Partner Referral`), case-insensitively.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.trim().to_ascii_uppercase().replace([' ', '-'], "_");
        match normalized.as_str() {
            "PARTNER_REFERRAL" => Self::PartnerReferral,
            "WEBINAR" => Self::Webinar,
            "WEBSITE_SIGNUP" => Self::WebsiteSignup,
            "COLD_CALL" => Self::ColdCall,
            "REFERRAL" => Self::Referral,
            "LINKEDIN_CAMPAIGN" => Self::LinkedInCampaign,
            "TRADE_SHOW" => Self::TradeShow,
            "EMAIL_CAMPAIGN" => Self::EmailCampaign,
            "SOCIAL_MEDIA" => Self::SocialMedia,
            "OTHER" => Self::Other,
            _ => Self::Custom(raw.trim().to_string()),
        }
    }
}

impl From<String> for LeadSource {
    fn from(value: String) -> Self {
        Self::parse(&value)
    }
}

impl From<LeadSource> for String {
    fn from(value: LeadSource) -> Self {
        value.code().to_string()
    }
}

impl fmt::Display for LeadSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Caller-supplied attributes of a lead. Score, status and ownership are
/// derived and live on [`Lead`] only.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadProfile {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub potential_value: Option<Decimal>,
    pub source: Option<LeadSource>,
}

impl LeadProfile {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), ..Self::default() }
    }

    pub fn with_company(mut self, company: impl Into<String>) -> Self {
        self.company = Some(company.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }

    pub fn with_potential_value(mut self, value: Decimal) -> Self {
        self.potential_value = Some(value);
        self
    }

    pub fn with_source(mut self, source: LeadSource) -> Self {
        self.source = Some(source);
        self
    }

    pub fn validate(&self) -> Result<(), LeadError> {
        let name = self.name.trim();
        if name.is_empty() {
            return Err(LeadError::Validation("lead name is required".to_string()));
        }
        check_len("lead name", name, MAX_NAME_LEN)?;

        if let Some(company) = &self.company {
            check_len("company", company, MAX_COMPANY_LEN)?;
        }

        if let Some(email) = present(&self.email) {
            check_len("email", email, MAX_EMAIL_LEN)?;
            if !looks_like_email(email) {
                return Err(LeadError::Validation(format!("email `{email}` is not a valid address")));
            }
        }

        if let Some(phone) = &self.phone {
            check_len("phone", phone, MAX_PHONE_LEN)?;
        }

        if let Some(value) = self.potential_value {
            if value.is_sign_negative() && !value.is_zero() {
                return Err(LeadError::Validation(
                    "potential value must not be negative".to_string(),
                ));
            }
            if value.normalize().scale() > MAX_VALUE_SCALE {
                return Err(LeadError::Validation(format!(
                    "potential value `{value}` has more than {MAX_VALUE_SCALE} fraction digits"
                )));
            }
        }

        Ok(())
    }
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), LeadError> {
    if value.chars().count() > max {
        return Err(LeadError::Validation(format!("{field} must not exceed {max} characters")));
    }
    Ok(())
}

fn looks_like_email(value: &str) -> bool {
    match value.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.contains('@')
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !value.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

/// Returns the value only when it carries non-whitespace content.
pub(crate) fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|value| !value.is_empty())
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub profile: LeadProfile,
    pub score: u8,
    pub status: LeadStatus,
    pub owner: Option<UserId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub created_by: Option<String>,
    pub updated_by: Option<String>,
}

impl Lead {
    pub fn is_owned_by(&self, user: UserId) -> bool {
        self.owner == Some(user)
    }

    pub fn is_unassigned_new(&self) -> bool {
        self.status == LeadStatus::New && self.owner.is_none()
    }
}

/// A lead that has been scored but not yet persisted; the store assigns the id
/// and stores it in status NEW without an owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewLead {
    pub profile: LeadProfile,
    pub score: u8,
    pub created_at: DateTime<Utc>,
    pub created_by: Option<String>,
}
