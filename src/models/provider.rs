use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown approval status: {0}")]
pub struct UnknownApproval(pub String);

impl TryFrom<String> for ApprovalStatus {
    type Error = UnknownApproval;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "pending" => Ok(ApprovalStatus::Pending),
            "approved" => Ok(ApprovalStatus::Approved),
            "rejected" => Ok(ApprovalStatus::Rejected),
            _ => Err(UnknownApproval(value)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Provider {
    pub id: Uuid,
    pub business_name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub service_types: Vec<String>,
    pub is_available: bool,
    pub is_active: bool,
    #[sqlx(try_from = "String")]
    pub approval_status: ApprovalStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating_avg: f64,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Provider {
    /// Approved and not deactivated by an administrator.
    pub fn can_take_jobs(&self) -> bool {
        self.is_active && self.approval_status == ApprovalStatus::Approved
    }

    pub fn offers(&self, service_type: &str) -> bool {
        self.service_types
            .iter()
            .any(|s| s.eq_ignore_ascii_case(service_type))
    }
}

#[derive(Debug, Clone)]
pub struct NewProvider {
    pub id: Uuid,
    pub business_name: String,
    pub phone: Option<String>,
    pub service_types: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderUpdate {
    pub business_name: Option<String>,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub service_types: Option<Vec<String>>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct ProviderFilter {
    pub service_type: Option<String>,
    pub available_only: bool,
    /// Restrict to approved, active providers.
    pub public_only: bool,
}

/// Running mean over `count` ratings.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RatingSummary {
    pub average: f64,
    pub count: i32,
}

impl RatingSummary {
    pub fn with_rating(self, rating: i16) -> Self {
        let count = self.count + 1;
        let average = (self.average * f64::from(self.count) + f64::from(rating)) / f64::from(count);
        Self { average, count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn incremental_mean_matches_formula() {
        let start = RatingSummary {
            average: 3.0,
            count: 2,
        };
        let after_four = start.with_rating(4);
        assert_eq!(after_four.count, 3);
        assert!((after_four.average - 10.0 / 3.0).abs() < 1e-9);

        let after_five = after_four.with_rating(5);
        assert_eq!(after_five.count, 4);
        assert!((after_five.average - 3.75).abs() < 1e-9);
    }

    #[test]
    fn first_rating_is_the_average() {
        let summary = RatingSummary {
            average: 0.0,
            count: 0,
        }
        .with_rating(5);
        assert_eq!(summary.count, 1);
        assert_eq!(summary.average, 5.0);
    }
}
