use sqlx::PgPool;
use tracing::info;
use uuid::Uuid;

use crate::dto::support_dto::{CreateTicketPayload, UpdateTicketPayload};
use crate::error::{Error, Result};
use crate::models::support_ticket::{SupportTicket, TICKET_PRIORITIES, TICKET_STATUSES};

const TICKET_COLUMNS: &str =
    "id, user_id, subject, message, status, priority, admin_response, created_at, updated_at";

#[derive(Clone)]
pub struct SupportService {
    pool: PgPool,
}

fn checked(value: Option<&str>, allowed: &[&str], field: &str) -> Result<Option<String>> {
    match value.map(|v| v.trim().to_lowercase()) {
        None => Ok(None),
        Some(v) if allowed.contains(&v.as_str()) => Ok(Some(v)),
        Some(v) => Err(Error::BadRequest(format!(
            "Invalid {} '{}'; expected one of: {}",
            field,
            v,
            allowed.join(", ")
        ))),
    }
}

impl SupportService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, user_id: Uuid, payload: CreateTicketPayload) -> Result<SupportTicket> {
        let priority = checked(payload.priority.as_deref(), &TICKET_PRIORITIES, "priority")?
            .unwrap_or_else(|| "normal".to_string());
        let sql = format!(
            r#"
            INSERT INTO support_tickets (user_id, subject, message, priority)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            TICKET_COLUMNS
        );
        let ticket = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(user_id)
            .bind(payload.subject.trim())
            .bind(payload.message.trim())
            .bind(&priority)
            .fetch_one(&self.pool)
            .await?;
        info!(ticket_id = %ticket.id, user_id = %user_id, "support ticket opened");
        Ok(ticket)
    }

    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<SupportTicket>> {
        let sql = format!(
            "SELECT {} FROM support_tickets WHERE user_id = $1 ORDER BY created_at DESC",
            TICKET_COLUMNS
        );
        let tickets = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    pub async fn list_all(&self, status: Option<&str>) -> Result<Vec<SupportTicket>> {
        let status = checked(status, &TICKET_STATUSES, "status")?;
        let sql = format!(
            "SELECT {} FROM support_tickets WHERE ($1::text IS NULL OR status = $1) ORDER BY created_at DESC",
            TICKET_COLUMNS
        );
        let tickets = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(status)
            .fetch_all(&self.pool)
            .await?;
        Ok(tickets)
    }

    pub async fn update(&self, id: Uuid, payload: UpdateTicketPayload) -> Result<SupportTicket> {
        let status = checked(payload.status.as_deref(), &TICKET_STATUSES, "status")?;
        let priority = checked(payload.priority.as_deref(), &TICKET_PRIORITIES, "priority")?;
        let sql = format!(
            r#"
            UPDATE support_tickets
            SET status = COALESCE($2, status),
                priority = COALESCE($3, priority),
                admin_response = COALESCE($4, admin_response),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            TICKET_COLUMNS
        );
        let ticket = sqlx::query_as::<_, SupportTicket>(&sql)
            .bind(id)
            .bind(&status)
            .bind(&priority)
            .bind(&payload.admin_response)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("Ticket not found".into()))?;
        info!(ticket_id = %id, status = %ticket.status, "support ticket updated");
        Ok(ticket)
    }
}
