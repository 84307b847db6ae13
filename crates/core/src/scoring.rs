use std::fmt;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::{ConfigError, ScoringConfig};
use crate::domain::lead::{present, LeadProfile, LeadSource};

pub const MAX_SCORE: u8 = 100;

/// Weight table used to turn lead attributes into a score.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoringProfile {
    /// Value tiers 40/30/20/10/5, four-channel source table, +10 per
    /// contact field, priority bands 80/60/40.
    Standard,
    /// Value tiers 50/20/5, extended source table, +15/+5 contact bonus,
    /// priority bands 80/50. Only the score tables change: the high-value
    /// check stays `>=` the threshold here, although the deployment these
    /// tables come from compared with a strict `>`.
    Legacy,
}

impl FromStr for ScoringProfile {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "standard" => Ok(Self::Standard),
            "legacy" => Ok(Self::Legacy),
            other => Err(ConfigError::Validation(format!(
                "unsupported scoring profile `{other}` (expected standard|legacy)"
            ))),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    VeryLow,
    Low,
    Medium,
    High,
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::High => "HIGH",
            Self::Medium => "MEDIUM",
            Self::Low => "LOW",
            Self::VeryLow => "VERY_LOW",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScoringEngine {
    profile: ScoringProfile,
    high_value_threshold: Decimal,
}

impl Default for ScoringEngine {
    fn default() -> Self {
        Self::new(&ScoringConfig::default())
    }
}

impl ScoringEngine {
    pub fn new(config: &ScoringConfig) -> Self {
        Self { profile: config.profile, high_value_threshold: config.high_value_threshold }
    }

    pub fn profile(&self) -> ScoringProfile {
        self.profile
    }

    pub fn high_value_threshold(&self) -> Decimal {
        self.high_value_threshold
    }

    /// Deterministic score in `0..=100` computed from the profile alone.
    pub fn score(&self, lead: &LeadProfile) -> u8 {
        let value = self.value_points(lead.potential_value);
        let source = self.source_points(lead.source.as_ref());
        let completeness = self.completeness_points(lead);
        let total = (value + source + completeness).min(u32::from(MAX_SCORE));

        debug!(
            event_name = "lead.scored",
            profile = ?self.profile,
            value_points = value,
            source_points = source,
            completeness_points = completeness,
            score = total,
            "computed lead score"
        );

        // bounded by MAX_SCORE above
        total as u8
    }

    /// High value means the potential value meets or exceeds the threshold.
    pub fn is_high_value(&self, lead: &LeadProfile) -> bool {
        lead.potential_value.is_some_and(|value| value >= self.high_value_threshold)
    }

    pub fn priority_of(&self, score: u8) -> Priority {
        match self.profile {
            ScoringProfile::Standard => match score {
                80.. => Priority::High,
                60..=79 => Priority::Medium,
                40..=59 => Priority::Low,
                _ => Priority::VeryLow,
            },
            ScoringProfile::Legacy => match score {
                80.. => Priority::High,
                50..=79 => Priority::Medium,
                _ => Priority::Low,
            },
        }
    }

    fn value_points(&self, value: Option<Decimal>) -> u32 {
        let Some(value) = value else {
            return 0;
        };

        match self.profile {
            ScoringProfile::Standard => {
                if value >= Decimal::new(1_000_000, 0) {
                    40
                } else if value >= Decimal::new(500_000, 0) {
                    30
                } else if value >= Decimal::new(100_000, 0) {
                    20
                } else if value >= Decimal::new(50_000, 0) {
                    10
                } else {
                    5
                }
            }
            ScoringProfile::Legacy => {
                if value > Decimal::new(500_000, 0) {
                    50
                } else if value >= Decimal::new(100_000, 0) {
                    20
                } else {
                    5
                }
            }
        }
    }

    fn source_points(&self, source: Option<&LeadSource>) -> u32 {
        let Some(source) = source else {
            return 0;
        };

        match self.profile {
            ScoringProfile::Standard => match source {
                LeadSource::PartnerReferral => 30,
                LeadSource::Webinar => 25,
                LeadSource::WebsiteSignup => 20,
                LeadSource::ColdCall => 10,
                _ => 0,
            },
            ScoringProfile::Legacy => match source {
                LeadSource::PartnerReferral => 30,
                LeadSource::Referral => 20,
                LeadSource::Webinar => 15,
                LeadSource::LinkedInCampaign | LeadSource::TradeShow => 12,
                LeadSource::WebsiteSignup => 10,
                LeadSource::EmailCampaign | LeadSource::SocialMedia => 8,
                LeadSource::ColdCall => 5,
                LeadSource::Other => 3,
                LeadSource::Custom(_) => 0,
            },
        }
    }

    fn completeness_points(&self, lead: &LeadProfile) -> u32 {
        let has_email = present(&lead.email).is_some();
        let has_phone = present(&lead.phone).is_some();

        match self.profile {
            ScoringProfile::Standard => {
                let has_company = present(&lead.company).is_some();
                [has_email, has_phone, has_company].into_iter().filter(|present| *present).count()
                    as u32
                    * 10
            }
            ScoringProfile::Legacy => match (has_email, has_phone) {
                (true, true) => 15,
                (true, false) | (false, true) => 5,
                (false, false) => 0,
            },
        }
    }
}
