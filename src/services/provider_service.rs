use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::dto::provider_dto::{ProviderQuery, UpdateProviderPayload};
use crate::error::{Error, Result};
use crate::models::feedback::Feedback;
use crate::models::provider::{ApprovalStatus, Provider, ProviderFilter};
use crate::repository::ProviderStore;

#[derive(Clone)]
pub struct ProviderService {
    providers: Arc<dyn ProviderStore>,
}

impl ProviderService {
    pub fn new(providers: Arc<dyn ProviderStore>) -> Self {
        Self { providers }
    }

    /// Approved, active providers, best rated first.
    pub async fn list_public(&self, query: &ProviderQuery) -> Result<Vec<Provider>> {
        let filter = ProviderFilter {
            service_type: query
                .service_type
                .as_deref()
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_lowercase),
            available_only: query.available.unwrap_or(false),
            public_only: true,
        };
        self.providers.list(&filter).await
    }

    pub async fn get_public(&self, id: Uuid) -> Result<(Provider, Vec<Feedback>)> {
        let provider = self
            .providers
            .get(id)
            .await?
            .filter(Provider::can_take_jobs)
            .ok_or_else(|| Error::NotFound("Provider not found".into()))?;
        let reviews = self.providers.list_feedback(id).await?;
        Ok((provider, reviews))
    }

    pub async fn get_own(&self, id: Uuid) -> Result<Provider> {
        self.providers
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound("Provider profile not found".into()))
    }

    pub async fn update_own(&self, id: Uuid, payload: UpdateProviderPayload) -> Result<Provider> {
        if payload.latitude.is_some() != payload.longitude.is_some() {
            return Err(Error::BadRequest(
                "latitude and longitude must be provided together".into(),
            ));
        }
        let provider = self
            .providers
            .update_profile(id, payload.into())
            .await?
            .ok_or_else(|| Error::NotFound("Provider profile not found".into()))?;
        info!(provider_id = %id, "provider profile updated");
        Ok(provider)
    }

    pub async fn set_availability(&self, id: Uuid, available: bool) -> Result<Provider> {
        let provider = self
            .providers
            .set_availability(id, available)
            .await?
            .ok_or_else(|| Error::NotFound("Provider profile not found".into()))?;
        info!(provider_id = %id, available, "provider availability changed");
        Ok(provider)
    }

    pub async fn set_approval(&self, id: Uuid, status: ApprovalStatus) -> Result<Provider> {
        let provider = self
            .providers
            .set_approval(id, status)
            .await?
            .ok_or_else(|| Error::NotFound("Provider not found".into()))?;
        info!(provider_id = %id, status = status.as_str(), "provider approval changed");
        Ok(provider)
    }
}
