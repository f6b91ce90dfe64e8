use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};
use uuid::Uuid;
use validator::Validate;

use crate::models::support_ticket::SupportTicket;

#[derive(Debug, Clone, Serialize, Deserialize, Validate, ToSchema)]
pub struct CreateTicketPayload {
    #[validate(length(min = 1, max = 200))]
    pub subject: String,
    #[validate(length(min = 1, max = 5000))]
    pub message: String,
    /// `low`, `normal` (default) or `high`.
    pub priority: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, Validate, ToSchema)]
#[serde(default)]
pub struct UpdateTicketPayload {
    pub status: Option<String>,
    pub priority: Option<String>,
    #[validate(length(max = 5000))]
    pub admin_response: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, IntoParams)]
#[serde(default)]
#[into_params(parameter_in = Query)]
pub struct TicketQuery {
    pub status: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TicketResponse {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub priority: String,
    pub admin_response: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<SupportTicket> for TicketResponse {
    fn from(value: SupportTicket) -> Self {
        Self {
            id: value.id,
            user_id: value.user_id,
            subject: value.subject,
            message: value.message,
            status: value.status,
            priority: value.priority,
            admin_response: value.admin_response,
            created_at: value.created_at,
            updated_at: value.updated_at,
        }
    }
}
