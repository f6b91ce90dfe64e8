use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use super::{OpenRequestFilter, ProviderStore, RequestStore};
use crate::error::{Error, Result};
use crate::models::feedback::{Feedback, NewFeedback};
use crate::models::hire_request::{HireRequest, HireStatus, NewHireRequest, NewMessage, RequestMessage};
use crate::models::provider::{ApprovalStatus, NewProvider, Provider, ProviderFilter, ProviderUpdate};
use crate::services::workflow::StatusChange;

const REQUEST_COLUMNS: &str = "id, customer_id, provider_id, name, email, contact_number, address, \
    service_type, description, preferred_date, preferred_time, additional_info, price, latitude, \
    longitude, status, accepted_at, started_at, completed_at, cancelled_at, created_at, updated_at";

const PROVIDER_COLUMNS: &str = "id, business_name, phone, bio, service_types, is_available, \
    is_active, approval_status, latitude, longitude, rating_avg, rating_count, created_at, updated_at";

#[derive(Clone)]
pub struct PgRequestStore {
    pool: PgPool,
}

impl PgRequestStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn attach_messages(&self, requests: &mut [HireRequest]) -> Result<()> {
        if requests.is_empty() {
            return Ok(());
        }
        let ids: Vec<Uuid> = requests.iter().map(|r| r.id).collect();
        let messages = sqlx::query_as::<_, RequestMessage>(
            r#"
            SELECT id, request_id, sender_role, sender_id, sender_name, text, created_at
            FROM hire_request_messages
            WHERE request_id = ANY($1)
            ORDER BY created_at ASC
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut by_request: HashMap<Uuid, Vec<RequestMessage>> = HashMap::new();
        for message in messages {
            by_request.entry(message.request_id).or_default().push(message);
        }
        for request in requests.iter_mut() {
            request.messages = by_request.remove(&request.id).unwrap_or_default();
        }
        Ok(())
    }
}

#[async_trait]
impl RequestStore for PgRequestStore {
    async fn insert(&self, new: NewHireRequest) -> Result<HireRequest> {
        let sql = format!(
            r#"
            INSERT INTO hire_requests (
                customer_id, provider_id, name, email, contact_number, address,
                service_type, description, preferred_date, preferred_time,
                additional_info, price, latitude, longitude, status
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,'pending')
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        );
        let request = sqlx::query_as::<_, HireRequest>(&sql)
            .bind(new.customer_id)
            .bind(new.provider_id)
            .bind(&new.name)
            .bind(&new.email)
            .bind(&new.contact_number)
            .bind(&new.address)
            .bind(&new.service_type)
            .bind(&new.description)
            .bind(new.preferred_date)
            .bind(&new.preferred_time)
            .bind(&new.additional_info)
            .bind(new.price)
            .bind(new.latitude)
            .bind(new.longitude)
            .fetch_one(&self.pool)
            .await?;
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<HireRequest>> {
        let sql = format!("SELECT {} FROM hire_requests WHERE id = $1", REQUEST_COLUMNS);
        let request = sqlx::query_as::<_, HireRequest>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        match request {
            Some(request) => {
                let mut items = [request];
                self.attach_messages(&mut items).await?;
                let [request] = items;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<HireRequest>> {
        let sql = format!(
            "SELECT {} FROM hire_requests WHERE customer_id = $1 ORDER BY created_at DESC",
            REQUEST_COLUMNS
        );
        let mut items = sqlx::query_as::<_, HireRequest>(&sql)
            .bind(customer_id)
            .fetch_all(&self.pool)
            .await?;
        self.attach_messages(&mut items).await?;
        Ok(items)
    }

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<HireStatus>,
    ) -> Result<Vec<HireRequest>> {
        let sql = format!(
            r#"
            SELECT {} FROM hire_requests
            WHERE provider_id = $1 AND ($2::text IS NULL OR status = $2)
            ORDER BY created_at DESC
            "#,
            REQUEST_COLUMNS
        );
        let mut items = sqlx::query_as::<_, HireRequest>(&sql)
            .bind(provider_id)
            .bind(status.map(|s| s.as_str()))
            .fetch_all(&self.pool)
            .await?;
        self.attach_messages(&mut items).await?;
        Ok(items)
    }

    async fn list_open_for_provider(
        &self,
        provider_id: Uuid,
        filter: &OpenRequestFilter,
    ) -> Result<Vec<HireRequest>> {
        let service_types: Option<Vec<String>> = filter
            .service_types
            .as_ref()
            .map(|types| types.iter().map(|t| t.to_lowercase()).collect());
        let sql = format!(
            r#"
            SELECT {} FROM hire_requests hr
            WHERE hr.status = 'pending'
              AND (hr.provider_id IS NULL OR hr.provider_id = $1)
              AND NOT EXISTS (
                  SELECT 1 FROM provider_declined_requests d
                  WHERE d.provider_id = $1 AND d.request_id = hr.id
              )
              AND ($2::text[] IS NULL OR LOWER(hr.service_type) = ANY($2))
            ORDER BY hr.created_at DESC
            "#,
            REQUEST_COLUMNS
        );
        let mut items = sqlx::query_as::<_, HireRequest>(&sql)
            .bind(provider_id)
            .bind(service_types)
            .fetch_all(&self.pool)
            .await?;
        self.attach_messages(&mut items).await?;
        Ok(items)
    }

    async fn apply_change(&self, id: Uuid, change: &StatusChange) -> Result<Option<HireRequest>> {
        let target = change.to.unwrap_or(change.from);
        let sql = format!(
            r#"
            UPDATE hire_requests
            SET status = $3,
                provider_id = COALESCE($4, provider_id),
                price = COALESCE($5, price),
                accepted_at = COALESCE($6, accepted_at),
                started_at = COALESCE($7, started_at),
                completed_at = COALESCE($8, completed_at),
                cancelled_at = COALESCE($9, cancelled_at),
                updated_at = NOW()
            WHERE id = $1 AND status = $2
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        );
        let updated = sqlx::query_as::<_, HireRequest>(&sql)
            .bind(id)
            .bind(change.from.as_str())
            .bind(target.as_str())
            .bind(change.provider_id)
            .bind(change.price)
            .bind(change.accepted_at)
            .bind(change.started_at)
            .bind(change.completed_at)
            .bind(change.cancelled_at)
            .fetch_optional(&self.pool)
            .await?;

        match updated {
            Some(request) => {
                let mut items = [request];
                self.attach_messages(&mut items).await?;
                let [request] = items;
                Ok(Some(request))
            }
            None => Ok(None),
        }
    }

    async fn record_decline(&self, provider_id: Uuid, request_id: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            INSERT INTO provider_declined_requests (provider_id, request_id)
            VALUES ($1, $2)
            ON CONFLICT (provider_id, request_id) DO NOTHING
            "#,
        )
        .bind(provider_id)
        .bind(request_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    async fn has_declined(&self, provider_id: Uuid, request_id: Uuid) -> Result<bool> {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT 1 FROM provider_declined_requests
                WHERE provider_id = $1 AND request_id = $2
            )
            "#,
        )
        .bind(provider_id)
        .bind(request_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists.0)
    }

    async fn append_message(&self, request_id: Uuid, message: NewMessage) -> Result<RequestMessage> {
        let mut tx = self.pool.begin().await?;
        let stored = sqlx::query_as::<_, RequestMessage>(
            r#"
            INSERT INTO hire_request_messages (request_id, sender_role, sender_id, sender_name, text)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, request_id, sender_role, sender_id, sender_name, text, created_at
            "#,
        )
        .bind(request_id)
        .bind(message.sender_role.as_str())
        .bind(message.sender_id)
        .bind(&message.sender_name)
        .bind(&message.text)
        .fetch_one(&mut *tx)
        .await?;

        sqlx::query("UPDATE hire_requests SET updated_at = NOW() WHERE id = $1")
            .bind(request_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(stored)
    }
}

#[derive(Clone)]
pub struct PgProviderStore {
    pool: PgPool,
}

impl PgProviderStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProviderStore for PgProviderStore {
    async fn create(&self, new: NewProvider) -> Result<Provider> {
        let sql = format!(
            r#"
            INSERT INTO providers (id, business_name, phone, service_types)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            PROVIDER_COLUMNS
        );
        let provider = sqlx::query_as::<_, Provider>(&sql)
            .bind(new.id)
            .bind(&new.business_name)
            .bind(&new.phone)
            .bind(&new.service_types)
            .fetch_one(&self.pool)
            .await?;
        Ok(provider)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Provider>> {
        let sql = format!("SELECT {} FROM providers WHERE id = $1", PROVIDER_COLUMNS);
        let provider = sqlx::query_as::<_, Provider>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(provider)
    }

    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<Provider>> {
        let sql = format!(
            r#"
            SELECT {} FROM providers
            WHERE ($1 = FALSE OR (is_active AND approval_status = 'approved'))
              AND ($2 = FALSE OR is_available)
              AND ($3::text IS NULL OR EXISTS (
                  SELECT 1 FROM UNNEST(service_types) s WHERE LOWER(s) = LOWER($3)
              ))
            ORDER BY rating_avg DESC, business_name ASC
            "#,
            PROVIDER_COLUMNS
        );
        let items = sqlx::query_as::<_, Provider>(&sql)
            .bind(filter.public_only)
            .bind(filter.available_only)
            .bind(&filter.service_type)
            .fetch_all(&self.pool)
            .await?;
        Ok(items)
    }

    async fn update_profile(&self, id: Uuid, update: ProviderUpdate) -> Result<Option<Provider>> {
        let sql = format!(
            r#"
            UPDATE providers
            SET business_name = COALESCE($2, business_name),
                phone = COALESCE($3, phone),
                bio = COALESCE($4, bio),
                service_types = COALESCE($5, service_types),
                latitude = COALESCE($6, latitude),
                longitude = COALESCE($7, longitude),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROVIDER_COLUMNS
        );
        let provider = sqlx::query_as::<_, Provider>(&sql)
            .bind(id)
            .bind(&update.business_name)
            .bind(&update.phone)
            .bind(&update.bio)
            .bind(&update.service_types)
            .bind(update.latitude)
            .bind(update.longitude)
            .fetch_optional(&self.pool)
            .await?;
        Ok(provider)
    }

    async fn set_availability(&self, id: Uuid, available: bool) -> Result<Option<Provider>> {
        let sql = format!(
            "UPDATE providers SET is_available = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROVIDER_COLUMNS
        );
        let provider = sqlx::query_as::<_, Provider>(&sql)
            .bind(id)
            .bind(available)
            .fetch_optional(&self.pool)
            .await?;
        Ok(provider)
    }

    async fn set_approval(&self, id: Uuid, status: ApprovalStatus) -> Result<Option<Provider>> {
        let sql = format!(
            "UPDATE providers SET approval_status = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            PROVIDER_COLUMNS
        );
        let provider = sqlx::query_as::<_, Provider>(&sql)
            .bind(id)
            .bind(status.as_str())
            .fetch_optional(&self.pool)
            .await?;
        Ok(provider)
    }

    async fn add_feedback(&self, feedback: NewFeedback) -> Result<(Feedback, Provider)> {
        let mut tx = self.pool.begin().await?;

        let stored = sqlx::query_as::<_, Feedback>(
            r#"
            INSERT INTO feedbacks (request_id, provider_id, customer_id, rating, comment)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (request_id) DO NOTHING
            RETURNING id, request_id, provider_id, customer_id, rating, comment, created_at
            "#,
        )
        .bind(feedback.request_id)
        .bind(feedback.provider_id)
        .bind(feedback.customer_id)
        .bind(feedback.rating)
        .bind(&feedback.comment)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| Error::BadRequest("Feedback was already submitted for this request".into()))?;

        // Single-statement update: concurrent ratings serialize on the row lock.
        let sql = format!(
            r#"
            UPDATE providers
            SET rating_avg = (rating_avg * rating_count + $2) / (rating_count + 1),
                rating_count = rating_count + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            PROVIDER_COLUMNS
        );
        let provider = sqlx::query_as::<_, Provider>(&sql)
            .bind(feedback.provider_id)
            .bind(f64::from(feedback.rating))
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| Error::NotFound("Provider not found".into()))?;

        tx.commit().await?;
        Ok((stored, provider))
    }

    async fn list_feedback(&self, provider_id: Uuid) -> Result<Vec<Feedback>> {
        let items = sqlx::query_as::<_, Feedback>(
            r#"
            SELECT id, request_id, provider_id, customer_id, rating, comment, created_at
            FROM feedbacks
            WHERE provider_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(provider_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(items)
    }
}
