use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use super::user::Role;

/// Lifecycle status of a hire request.
///
/// `pending -> confirmed -> in-progress -> completed`, with `cancelled` and
/// `declined` as the other terminal states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, utoipa::ToSchema)]
#[serde(rename_all = "kebab-case")]
pub enum HireStatus {
    Pending,
    #[serde(alias = "assigned", alias = "accepted")]
    Confirmed,
    #[serde(alias = "in_progress")]
    InProgress,
    Completed,
    Cancelled,
    Declined,
}

impl HireStatus {
    pub const ALL: [HireStatus; 6] = [
        HireStatus::Pending,
        HireStatus::Confirmed,
        HireStatus::InProgress,
        HireStatus::Completed,
        HireStatus::Cancelled,
        HireStatus::Declined,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HireStatus::Pending => "pending",
            HireStatus::Confirmed => "confirmed",
            HireStatus::InProgress => "in-progress",
            HireStatus::Completed => "completed",
            HireStatus::Cancelled => "cancelled",
            HireStatus::Declined => "declined",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "pending" => Some(HireStatus::Pending),
            "confirmed" | "assigned" | "accepted" => Some(HireStatus::Confirmed),
            "in-progress" | "in_progress" => Some(HireStatus::InProgress),
            "completed" => Some(HireStatus::Completed),
            "cancelled" | "canceled" => Some(HireStatus::Cancelled),
            "declined" => Some(HireStatus::Declined),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            HireStatus::Completed | HireStatus::Cancelled | HireStatus::Declined
        )
    }
}

impl std::fmt::Display for HireStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown hire request status: {0}")]
pub struct UnknownStatus(pub String);

impl TryFrom<String> for HireStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HireStatus::parse(&value).ok_or(UnknownStatus(value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct HireRequest {
    pub id: Uuid,
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub contact_number: String,
    pub address: String,
    pub service_type: String,
    pub description: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub additional_info: Option<String>,
    pub price: Option<Decimal>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    #[sqlx(try_from = "String")]
    pub status: HireStatus,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[sqlx(skip)]
    pub messages: Vec<RequestMessage>,
}

impl HireRequest {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }

    /// Whether `provider_id` may read this request and post to its thread.
    pub fn involves_provider(&self, provider_id: Uuid) -> bool {
        self.provider_id == Some(provider_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RequestMessage {
    pub id: Uuid,
    pub request_id: Uuid,
    #[sqlx(try_from = "String")]
    pub sender_role: Role,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewHireRequest {
    pub customer_id: Uuid,
    pub provider_id: Option<Uuid>,
    pub name: String,
    pub email: String,
    pub contact_number: String,
    pub address: String,
    pub service_type: String,
    pub description: String,
    pub preferred_date: NaiveDate,
    pub preferred_time: String,
    pub additional_info: Option<String>,
    pub price: Option<Decimal>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct NewMessage {
    pub sender_role: Role,
    pub sender_id: Uuid,
    pub sender_name: String,
    pub text: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_status_names_resolve_to_canonical_states() {
        assert_eq!(HireStatus::parse("assigned"), Some(HireStatus::Confirmed));
        assert_eq!(HireStatus::parse("in_progress"), Some(HireStatus::InProgress));
        assert_eq!(HireStatus::parse("canceled"), Some(HireStatus::Cancelled));
        assert_eq!(HireStatus::parse("archived"), None);

        let parsed: HireStatus = serde_json::from_str("\"assigned\"").unwrap();
        assert_eq!(parsed, HireStatus::Confirmed);
        assert_eq!(
            serde_json::to_string(&HireStatus::InProgress).unwrap(),
            "\"in-progress\""
        );
    }

    #[test]
    fn only_completed_cancelled_declined_are_terminal() {
        let terminal: Vec<_> = HireStatus::ALL
            .iter()
            .filter(|s| s.is_terminal())
            .map(|s| s.as_str())
            .collect();
        assert_eq!(terminal, vec!["completed", "cancelled", "declined"]);
    }
}
