use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use crate::dto::hire_request_dto::{
    AvailableRequestsQuery, CreateHireRequestPayload, JobStatusCounts, ProviderDashboardStats,
};
use crate::error::{Error, Result};
use crate::middleware::auth::Identity;
use crate::models::feedback::{Feedback, NewFeedback};
use crate::models::hire_request::{HireRequest, HireStatus, NewHireRequest, NewMessage, RequestMessage};
use crate::models::provider::Provider;
use crate::models::user::Role;
use crate::repository::{OpenRequestFilter, ProviderStore, RequestStore};
use crate::services::workflow::{self, Actor, HireAction};
use crate::utils::{geo, time};

#[derive(Clone)]
pub struct HireRequestService {
    requests: Arc<dyn RequestStore>,
    providers: Arc<dyn ProviderStore>,
}

/// A pending request as seen from one provider's position.
#[derive(Debug, Clone)]
pub struct AvailableRequest {
    pub request: HireRequest,
    pub distance_km: Option<f64>,
}

impl HireRequestService {
    pub fn new(requests: Arc<dyn RequestStore>, providers: Arc<dyn ProviderStore>) -> Self {
        Self {
            requests,
            providers,
        }
    }

    pub async fn create(
        &self,
        identity: &Identity,
        payload: CreateHireRequestPayload,
    ) -> Result<HireRequest> {
        if !identity.is(Role::Customer) {
            return Err(Error::Forbidden("Only customers can create hire requests".into()));
        }
        let preferred_date = time::parse_date(&payload.preferred_date)
            .ok_or_else(|| Error::BadRequest("preferred_date must be a valid date".into()))?;
        if payload.price.is_some_and(|p| p.is_sign_negative()) {
            return Err(Error::BadRequest("price cannot be negative".into()));
        }
        if payload.latitude.is_some() != payload.longitude.is_some() {
            return Err(Error::BadRequest(
                "latitude and longitude must be provided together".into(),
            ));
        }

        if let Some(provider_id) = payload.provider_id {
            let provider = self.require_provider(provider_id).await?;
            if !provider.can_take_jobs() || !provider.is_available {
                return Err(Error::BadRequest(
                    "The selected provider is not accepting requests".into(),
                ));
            }
        }

        let request = self
            .requests
            .insert(NewHireRequest {
                customer_id: identity.user_id,
                provider_id: payload.provider_id,
                name: payload.name.trim().to_string(),
                email: payload.email.trim().to_lowercase(),
                contact_number: payload.contact_number.trim().to_string(),
                address: payload.address.trim().to_string(),
                service_type: payload.service_type.trim().to_string(),
                description: payload.description,
                preferred_date,
                preferred_time: payload.preferred_time,
                additional_info: payload.additional_info.filter(|s| !s.trim().is_empty()),
                price: payload.price,
                latitude: payload.latitude,
                longitude: payload.longitude,
            })
            .await?;

        info!(
            request_id = %request.id,
            customer_id = %request.customer_id,
            provider_id = ?request.provider_id,
            service_type = %request.service_type,
            "hire request created"
        );
        Ok(request)
    }

    /// Loads a request the caller is allowed to see.
    pub async fn get_visible(&self, identity: &Identity, id: Uuid) -> Result<HireRequest> {
        let request = self.require_request(id).await?;
        let visible = match identity.role {
            Role::Admin => true,
            Role::Customer => request.customer_id == identity.user_id,
            Role::Provider => {
                request.involves_provider(identity.user_id)
                    || (request.status == HireStatus::Pending
                        && request.provider_id.is_none()
                        && !self
                            .requests
                            .has_declined(identity.user_id, request.id)
                            .await?)
            }
            Role::ShopOwner => false,
        };
        if !visible {
            return Err(Error::Forbidden("You do not have access to this request".into()));
        }
        Ok(request)
    }

    pub async fn list_for_customer(&self, identity: &Identity) -> Result<Vec<HireRequest>> {
        self.requests.list_for_customer(identity.user_id).await
    }

    pub async fn list_jobs(
        &self,
        identity: &Identity,
        status: Option<HireStatus>,
    ) -> Result<Vec<HireRequest>> {
        self.requests.list_for_provider(identity.user_id, status).await
    }

    pub async fn list_available(
        &self,
        identity: &Identity,
        query: &AvailableRequestsQuery,
    ) -> Result<Vec<AvailableRequest>> {
        let provider = self.require_provider(identity.user_id).await?;
        if !provider.can_take_jobs() {
            return Err(Error::Forbidden("Provider account is not approved".into()));
        }

        let service_types = match (&query.service_type, query.match_services) {
            (Some(service_type), _) => Some(vec![service_type.trim().to_string()]),
            (None, Some(true)) if !provider.service_types.is_empty() => {
                Some(provider.service_types.clone())
            }
            _ => None,
        };
        let open = self
            .requests
            .list_open_for_provider(provider.id, &OpenRequestFilter { service_types })
            .await?;

        let origin = query
            .latitude
            .zip(query.longitude)
            .or_else(|| provider.latitude.zip(provider.longitude));
        Ok(rank_by_distance(open, origin, query.max_distance_km))
    }

    /// Runs one workflow action for the caller and persists the outcome.
    pub async fn transition(
        &self,
        identity: &Identity,
        id: Uuid,
        action: HireAction,
    ) -> Result<HireRequest> {
        let request = self.require_request(id).await?;
        let actor = Actor::from(identity);

        let declined_by_actor = match actor {
            Actor::Provider(provider_id) => {
                if matches!(action, HireAction::Accept { .. }) {
                    let provider = self.require_provider(provider_id).await?;
                    if !provider.can_take_jobs() {
                        return Err(Error::Forbidden("Provider account is not approved".into()));
                    }
                }
                self.requests.has_declined(provider_id, id).await?
            }
            _ => false,
        };

        if let HireAction::Accept { price: Some(price) } = &action {
            if price.is_sign_negative() {
                return Err(Error::BadRequest("price cannot be negative".into()));
            }
        }

        let change = workflow::plan(&request, actor, &action, declined_by_actor, time::now())?;

        let updated = if change.to.is_some() {
            self.requests
                .apply_change(id, &change)
                .await?
                .ok_or_else(|| {
                    Error::BadRequest(
                        "Request was updated by someone else; reload and try again".into(),
                    )
                })?
        } else {
            request
        };

        if change.record_decline {
            if let Actor::Provider(provider_id) = actor {
                self.requests.record_decline(provider_id, id).await?;
            }
        }

        info!(
            request_id = %id,
            user_id = %identity.user_id,
            action = action.name(),
            from = %change.from,
            to = %updated.status,
            "hire request transition"
        );
        Ok(updated)
    }

    pub async fn add_message(
        &self,
        identity: &Identity,
        id: Uuid,
        text: &str,
    ) -> Result<RequestMessage> {
        let text = text.trim();
        if text.is_empty() {
            return Err(Error::BadRequest("Message text is required".into()));
        }
        let request = self.require_request(id).await?;

        let sender_name = match identity.role {
            Role::Customer if request.customer_id == identity.user_id => request.name.clone(),
            Role::Provider if request.involves_provider(identity.user_id) => {
                self.require_provider(identity.user_id).await?.business_name
            }
            _ => {
                return Err(Error::Forbidden(
                    "Only the customer and the assigned provider can post messages".into(),
                ))
            }
        };

        let message = self
            .requests
            .append_message(
                id,
                NewMessage {
                    sender_role: identity.role,
                    sender_id: identity.user_id,
                    sender_name,
                    text: text.to_string(),
                },
            )
            .await?;
        info!(request_id = %id, sender_id = %identity.user_id, "message appended");
        Ok(message)
    }

    pub async fn submit_feedback(
        &self,
        identity: &Identity,
        id: Uuid,
        rating: i16,
        comment: Option<String>,
    ) -> Result<(Feedback, Provider)> {
        if !(1..=5).contains(&rating) {
            return Err(Error::BadRequest("rating must be between 1 and 5".into()));
        }
        let request = self.require_request(id).await?;
        if !identity.is(Role::Customer) || request.customer_id != identity.user_id {
            return Err(Error::Forbidden("You can only rate your own requests".into()));
        }
        if request.status != HireStatus::Completed {
            return Err(Error::BadRequest("Only completed jobs can be rated".into()));
        }
        let provider_id = request
            .provider_id
            .ok_or_else(|| Error::BadRequest("Request has no assigned provider".into()))?;

        let (feedback, provider) = self
            .providers
            .add_feedback(NewFeedback {
                request_id: id,
                provider_id,
                customer_id: identity.user_id,
                rating,
                comment: comment.filter(|c| !c.trim().is_empty()),
            })
            .await?;
        info!(
            request_id = %id,
            provider_id = %provider_id,
            rating,
            rating_avg = provider.rating_avg,
            rating_count = provider.rating_count,
            "feedback recorded"
        );
        Ok((feedback, provider))
    }

    pub async fn dashboard(&self, identity: &Identity) -> Result<ProviderDashboardStats> {
        let provider = self.require_provider(identity.user_id).await?;
        let jobs = self.requests.list_for_provider(provider.id, None).await?;

        let mut counts = JobStatusCounts::default();
        let mut total_earnings = Decimal::ZERO;
        for job in &jobs {
            match job.status {
                HireStatus::Confirmed => counts.confirmed += 1,
                HireStatus::InProgress => counts.in_progress += 1,
                HireStatus::Completed => {
                    counts.completed += 1;
                    total_earnings += job.price.unwrap_or_default();
                }
                HireStatus::Cancelled => counts.cancelled += 1,
                HireStatus::Declined => counts.declined += 1,
                HireStatus::Pending => {}
            }
        }

        let available_requests = if provider.can_take_jobs() {
            self.requests
                .list_open_for_provider(provider.id, &OpenRequestFilter::default())
                .await?
                .len() as i64
        } else {
            0
        };

        Ok(ProviderDashboardStats {
            total_jobs: jobs.len() as i64,
            jobs_by_status: counts,
            available_requests,
            total_earnings,
            rating_avg: provider.rating_avg,
            rating_count: provider.rating_count,
            is_available: provider.is_available,
        })
    }

    async fn require_request(&self, id: Uuid) -> Result<HireRequest> {
        self.requests
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound("Hire request not found".into()))
    }

    async fn require_provider(&self, id: Uuid) -> Result<Provider> {
        self.providers
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound("Provider profile not found".into()))
    }
}

/// Orders requests nearest first when an origin is known; requests without
/// coordinates keep their recency order after the located ones.
pub fn rank_by_distance(
    requests: Vec<HireRequest>,
    origin: Option<(f64, f64)>,
    max_distance_km: Option<f64>,
) -> Vec<AvailableRequest> {
    let Some(origin) = origin.filter(|(lat, lon)| geo::valid_coordinates(*lat, *lon)) else {
        return requests
            .into_iter()
            .map(|request| AvailableRequest {
                request,
                distance_km: None,
            })
            .collect();
    };

    let mut ranked: Vec<AvailableRequest> = requests
        .into_iter()
        .map(|request| {
            let distance_km = request
                .coordinates()
                .map(|point| geo::haversine_km(origin, point));
            AvailableRequest {
                request,
                distance_km,
            }
        })
        .filter(|item| match (item.distance_km, max_distance_km) {
            (Some(d), Some(max)) => d <= max,
            _ => true,
        })
        .collect();

    ranked.sort_by(|a, b| match (a.distance_km, b.distance_km) {
        (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    });
    ranked
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};

    fn located(lat: Option<f64>, lon: Option<f64>, minutes_ago: i64) -> HireRequest {
        let created = Utc::now() - chrono::Duration::minutes(minutes_ago);
        HireRequest {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            provider_id: None,
            name: "N".into(),
            email: "n@example.com".into(),
            contact_number: "555-0000".into(),
            address: "A".into(),
            service_type: "cleaning".into(),
            description: "D".into(),
            preferred_date: NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
            preferred_time: "noon".into(),
            additional_info: None,
            price: None,
            latitude: lat,
            longitude: lon,
            status: HireStatus::Pending,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: created,
            updated_at: created,
            messages: Vec::new(),
        }
    }

    #[test]
    fn nearest_first_then_unlocated() {
        let far = located(Some(48.8566), Some(2.3522), 1);
        let unknown = located(None, None, 2);
        let near = located(Some(51.51), Some(-0.13), 3);
        let ids = (near.id, far.id, unknown.id);

        let ranked = rank_by_distance(vec![far, unknown, near], Some((51.5074, -0.1278)), None);
        let order: Vec<Uuid> = ranked.iter().map(|r| r.request.id).collect();
        assert_eq!(order, vec![ids.0, ids.1, ids.2]);
        assert!(ranked[0].distance_km.unwrap() < 1.0);
        assert!(ranked[2].distance_km.is_none());
    }

    #[test]
    fn max_distance_drops_far_requests_only() {
        let far = located(Some(48.8566), Some(2.3522), 1);
        let unknown = located(None, None, 2);
        let ranked = rank_by_distance(vec![far, unknown], Some((51.5074, -0.1278)), Some(50.0));
        assert_eq!(ranked.len(), 1);
        assert!(ranked[0].distance_km.is_none());
    }

    #[test]
    fn without_origin_order_is_untouched() {
        let a = located(Some(1.0), Some(1.0), 1);
        let b = located(None, None, 2);
        let ids = vec![a.id, b.id];
        let ranked = rank_by_distance(vec![a, b], None, Some(1.0));
        assert_eq!(ranked.iter().map(|r| r.request.id).collect::<Vec<_>>(), ids);
    }
}
