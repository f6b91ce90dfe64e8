use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::hire_request::{HireRequest, HireStatus, RequestMessage};
use crate::models::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateHireRequestPayload {
    /// Address the request to one provider (direct hire).
    pub provider_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub name: String,
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 5, max = 32))]
    pub contact_number: String,
    #[validate(length(min = 1, max = 500))]
    pub address: String,
    #[validate(length(min = 1, max = 120))]
    pub service_type: String,
    #[validate(length(min = 1, max = 5000))]
    pub description: String,
    /// `YYYY-MM-DD` or an RFC 3339 timestamp.
    #[validate(length(min = 1))]
    pub preferred_date: String,
    #[validate(length(min = 1, max = 64))]
    pub preferred_time: String,
    #[validate(length(max = 5000))]
    pub additional_info: Option<String>,
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(default)]
pub struct AcceptRequestPayload {
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpdateJobStatusPayload {
    pub status: HireStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct AddMessagePayload {
    #[validate(length(min = 1, max = 2000, message = "Message text is required"))]
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct FeedbackPayload {
    #[validate(range(min = 1, max = 5))]
    pub rating: i16,
    #[validate(length(max = 2000))]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct AvailableRequestsQuery {
    pub service_type: Option<String>,
    /// Only requests for service types the provider offers.
    pub match_services: Option<bool>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
    #[validate(range(min = 0.0))]
    pub max_distance_km: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct JobsQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: Uuid,
    pub sender_role: Role,
    pub sender_id: Uuid,
    pub name: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl From<RequestMessage> for MessageResponse {
    fn from(value: RequestMessage) -> Self {
        Self {
            id: value.id,
            sender_role: value.sender_role,
            sender_id: value.sender_id,
            name: value.sender_name,
            text: value.text,
            timestamp: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HireRequestResponse {
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
    #[schema(value_type = Option<String>)]
    pub price: Option<Decimal>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub status: HireStatus,
    pub messages: Vec<MessageResponse>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<HireRequest> for HireRequestResponse {
    fn from(value: HireRequest) -> Self {
        Self {
            id: value.id,
            customer_id: value.customer_id,
            provider_id: value.provider_id,
            name: value.name,
            email: value.email,
            contact_number: value.contact_number,
            address: value.address,
            service_type: value.service_type,
            description: value.description,
            preferred_date: value.preferred_date,
            preferred_time: value.preferred_time,
            additional_info: value.additional_info,
            price: value.price,
            latitude: value.latitude,
            longitude: value.longitude,
            status: value.status,
            messages: value.messages.into_iter().map(Into::into).collect(),
            accepted_at: value.accepted_at,
            started_at: value.started_at,
            completed_at: value.completed_at,
            cancelled_at: value.cancelled_at,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvailableRequestResponse {
    #[serde(flatten)]
    pub request: HireRequestResponse,
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct FeedbackResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub provider_rating_avg: f64,
    pub provider_rating_count: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
pub struct JobStatusCounts {
    pub confirmed: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub cancelled: i64,
    pub declined: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderDashboardStats {
    pub total_jobs: i64,
    pub jobs_by_status: JobStatusCounts,
    pub available_requests: i64,
    #[schema(value_type = String)]
    pub total_earnings: Decimal,
    pub rating_avg: f64,
    pub rating_count: i32,
    pub is_available: bool,
}
