use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::feedback::Feedback;
use crate::models::provider::{ApprovalStatus, Provider, ProviderUpdate};

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct ProviderQuery {
    pub service_type: Option<String>,
    pub available: Option<bool>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct UpdateProviderPayload {
    #[validate(length(min = 1, max = 160))]
    pub business_name: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
    #[validate(length(max = 2000))]
    pub bio: Option<String>,
    pub service_types: Option<Vec<String>>,
    #[validate(range(min = -90.0, max = 90.0))]
    pub latitude: Option<f64>,
    #[validate(range(min = -180.0, max = 180.0))]
    pub longitude: Option<f64>,
}

impl From<UpdateProviderPayload> for ProviderUpdate {
    fn from(value: UpdateProviderPayload) -> Self {
        Self {
            business_name: value.business_name.map(|s| s.trim().to_string()),
            phone: value.phone,
            bio: value.bio,
            service_types: value.service_types.map(normalize_service_types),
            latitude: value.latitude,
            longitude: value.longitude,
        }
    }
}

/// Trimmed, lower-cased and de-duplicated.
pub fn normalize_service_types(types: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(types.len());
    for t in types {
        let t = t.trim().to_lowercase();
        if !t.is_empty() && !out.contains(&t) {
            out.push(t);
        }
    }
    out
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct AvailabilityPayload {
    pub is_available: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ApprovalPayload {
    pub status: ApprovalStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderResponse {
    pub id: Uuid,
    pub business_name: String,
    pub phone: Option<String>,
    pub bio: Option<String>,
    pub service_types: Vec<String>,
    pub is_available: bool,
    pub is_active: bool,
    pub approval_status: ApprovalStatus,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub rating_avg: f64,
    pub rating_count: i32,
    pub created_at: DateTime<Utc>,
}

impl From<Provider> for ProviderResponse {
    fn from(value: Provider) -> Self {
        Self {
            id: value.id,
            business_name: value.business_name,
            phone: value.phone,
            bio: value.bio,
            service_types: value.service_types,
            is_available: value.is_available,
            is_active: value.is_active,
            approval_status: value.approval_status,
            latitude: value.latitude,
            longitude: value.longitude,
            rating_avg: value.rating_avg,
            rating_count: value.rating_count,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ReviewResponse {
    pub id: Uuid,
    pub request_id: Uuid,
    pub rating: i16,
    pub comment: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl From<Feedback> for ReviewResponse {
    fn from(value: Feedback) -> Self {
        Self {
            id: value.id,
            request_id: value.request_id,
            rating: value.rating,
            comment: value.comment,
            created_at: value.created_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ProviderDetailResponse {
    #[serde(flatten)]
    pub provider: ProviderResponse,
    pub reviews: Vec<ReviewResponse>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn service_types_are_normalized() {
        let out = normalize_service_types(vec![
            " Plumbing ".into(),
            "plumbing".into(),
            "".into(),
            "Electrical".into(),
        ]);
        assert_eq!(out, vec!["plumbing".to_string(), "electrical".to_string()]);
    }
}
