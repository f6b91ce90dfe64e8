//! In-memory stores. State lives in `RwLock`-guarded maps and is lost on
//! restart; every trait method takes the lock once so compare-and-set and
//! rating updates are atomic with respect to each other.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{OpenRequestFilter, ProviderStore, RequestStore};
use crate::error::{Error, Result};
use crate::models::feedback::{Feedback, NewFeedback};
use crate::models::hire_request::{HireRequest, HireStatus, NewHireRequest, NewMessage, RequestMessage};
use crate::models::provider::{
    ApprovalStatus, NewProvider, Provider, ProviderFilter, ProviderUpdate, RatingSummary,
};
use crate::services::workflow::StatusChange;

#[derive(Default)]
struct RequestTables {
    requests: HashMap<Uuid, HireRequest>,
    declined: HashSet<(Uuid, Uuid)>,
}

#[derive(Default)]
pub struct InMemoryRequestStore {
    tables: RwLock<RequestTables>,
}

impl InMemoryRequestStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn newest_first(mut items: Vec<HireRequest>) -> Vec<HireRequest> {
    items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    items
}

#[async_trait]
impl RequestStore for InMemoryRequestStore {
    async fn insert(&self, new: NewHireRequest) -> Result<HireRequest> {
        let now = Utc::now();
        let request = HireRequest {
            id: Uuid::new_v4(),
            customer_id: new.customer_id,
            provider_id: new.provider_id,
            name: new.name,
            email: new.email,
            contact_number: new.contact_number,
            address: new.address,
            service_type: new.service_type,
            description: new.description,
            preferred_date: new.preferred_date,
            preferred_time: new.preferred_time,
            additional_info: new.additional_info,
            price: new.price,
            latitude: new.latitude,
            longitude: new.longitude,
            status: HireStatus::Pending,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        };
        let mut tables = self.tables.write().await;
        tables.requests.insert(request.id, request.clone());
        Ok(request)
    }

    async fn get(&self, id: Uuid) -> Result<Option<HireRequest>> {
        let tables = self.tables.read().await;
        Ok(tables.requests.get(&id).cloned())
    }

    async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<HireRequest>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .requests
                .values()
                .filter(|r| r.customer_id == customer_id)
                .cloned()
                .collect(),
        ))
    }

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<HireStatus>,
    ) -> Result<Vec<HireRequest>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .requests
                .values()
                .filter(|r| r.provider_id == Some(provider_id))
                .filter(|r| status.map_or(true, |s| r.status == s))
                .cloned()
                .collect(),
        ))
    }

    async fn list_open_for_provider(
        &self,
        provider_id: Uuid,
        filter: &OpenRequestFilter,
    ) -> Result<Vec<HireRequest>> {
        let tables = self.tables.read().await;
        Ok(newest_first(
            tables
                .requests
                .values()
                .filter(|r| r.status == HireStatus::Pending)
                .filter(|r| r.provider_id.map_or(true, |p| p == provider_id))
                .filter(|r| !tables.declined.contains(&(provider_id, r.id)))
                .filter(|r| {
                    filter.service_types.as_ref().map_or(true, |types| {
                        types.iter().any(|t| t.eq_ignore_ascii_case(&r.service_type))
                    })
                })
                .cloned()
                .collect(),
        ))
    }

    async fn apply_change(&self, id: Uuid, change: &StatusChange) -> Result<Option<HireRequest>> {
        let mut tables = self.tables.write().await;
        let Some(request) = tables.requests.get_mut(&id) else {
            return Ok(None);
        };
        if request.status != change.from {
            return Ok(None);
        }
        change.apply_to(request, Utc::now());
        Ok(Some(request.clone()))
    }

    async fn record_decline(&self, provider_id: Uuid, request_id: Uuid) -> Result<bool> {
        let mut tables = self.tables.write().await;
        Ok(tables.declined.insert((provider_id, request_id)))
    }

    async fn has_declined(&self, provider_id: Uuid, request_id: Uuid) -> Result<bool> {
        let tables = self.tables.read().await;
        Ok(tables.declined.contains(&(provider_id, request_id)))
    }

    async fn append_message(&self, request_id: Uuid, message: NewMessage) -> Result<RequestMessage> {
        let mut tables = self.tables.write().await;
        let request = tables
            .requests
            .get_mut(&request_id)
            .ok_or_else(|| Error::NotFound("Hire request not found".into()))?;
        let now = Utc::now();
        let stored = RequestMessage {
            id: Uuid::new_v4(),
            request_id,
            sender_role: message.sender_role,
            sender_id: message.sender_id,
            sender_name: message.sender_name,
            text: message.text,
            created_at: now,
        };
        request.messages.push(stored.clone());
        request.updated_at = now;
        Ok(stored)
    }
}

#[derive(Default)]
struct ProviderTables {
    providers: HashMap<Uuid, Provider>,
    feedback: Vec<Feedback>,
}

#[derive(Default)]
pub struct InMemoryProviderStore {
    tables: RwLock<ProviderTables>,
}

impl InMemoryProviderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProviderStore for InMemoryProviderStore {
    async fn create(&self, new: NewProvider) -> Result<Provider> {
        let mut tables = self.tables.write().await;
        if tables.providers.contains_key(&new.id) {
            return Err(Error::BadRequest("Provider profile already exists".into()));
        }
        let now = Utc::now();
        let provider = Provider {
            id: new.id,
            business_name: new.business_name,
            phone: new.phone,
            bio: None,
            service_types: new.service_types,
            is_available: true,
            is_active: true,
            approval_status: ApprovalStatus::Pending,
            latitude: None,
            longitude: None,
            rating_avg: 0.0,
            rating_count: 0,
            created_at: now,
            updated_at: now,
        };
        tables.providers.insert(provider.id, provider.clone());
        Ok(provider)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Provider>> {
        let tables = self.tables.read().await;
        Ok(tables.providers.get(&id).cloned())
    }

    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<Provider>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Provider> = tables
            .providers
            .values()
            .filter(|p| !filter.public_only || p.can_take_jobs())
            .filter(|p| !filter.available_only || p.is_available)
            .filter(|p| filter.service_type.as_deref().map_or(true, |s| p.offers(s)))
            .cloned()
            .collect();
        items.sort_by(|a, b| {
            b.rating_avg
                .partial_cmp(&a.rating_avg)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.business_name.cmp(&b.business_name))
        });
        Ok(items)
    }

    async fn update_profile(&self, id: Uuid, update: ProviderUpdate) -> Result<Option<Provider>> {
        let mut tables = self.tables.write().await;
        let Some(provider) = tables.providers.get_mut(&id) else {
            return Ok(None);
        };
        if let Some(name) = update.business_name {
            provider.business_name = name;
        }
        if update.phone.is_some() {
            provider.phone = update.phone;
        }
        if update.bio.is_some() {
            provider.bio = update.bio;
        }
        if let Some(types) = update.service_types {
            provider.service_types = types;
        }
        if update.latitude.is_some() {
            provider.latitude = update.latitude;
        }
        if update.longitude.is_some() {
            provider.longitude = update.longitude;
        }
        provider.updated_at = Utc::now();
        Ok(Some(provider.clone()))
    }

    async fn set_availability(&self, id: Uuid, available: bool) -> Result<Option<Provider>> {
        let mut tables = self.tables.write().await;
        Ok(tables.providers.get_mut(&id).map(|p| {
            p.is_available = available;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn set_approval(&self, id: Uuid, status: ApprovalStatus) -> Result<Option<Provider>> {
        let mut tables = self.tables.write().await;
        Ok(tables.providers.get_mut(&id).map(|p| {
            p.approval_status = status;
            p.updated_at = Utc::now();
            p.clone()
        }))
    }

    async fn add_feedback(&self, feedback: NewFeedback) -> Result<(Feedback, Provider)> {
        let mut tables = self.tables.write().await;
        if tables.feedback.iter().any(|f| f.request_id == feedback.request_id) {
            return Err(Error::BadRequest("Feedback was already submitted for this request".into()));
        }
        let provider = tables
            .providers
            .get_mut(&feedback.provider_id)
            .ok_or_else(|| Error::NotFound("Provider not found".into()))?;

        let summary = RatingSummary {
            average: provider.rating_avg,
            count: provider.rating_count,
        }
        .with_rating(feedback.rating);
        provider.rating_avg = summary.average;
        provider.rating_count = summary.count;
        provider.updated_at = Utc::now();
        let provider = provider.clone();

        let stored = Feedback {
            id: Uuid::new_v4(),
            request_id: feedback.request_id,
            provider_id: feedback.provider_id,
            customer_id: feedback.customer_id,
            rating: feedback.rating,
            comment: feedback.comment,
            created_at: Utc::now(),
        };
        tables.feedback.push(stored.clone());
        Ok((stored, provider))
    }

    async fn list_feedback(&self, provider_id: Uuid) -> Result<Vec<Feedback>> {
        let tables = self.tables.read().await;
        let mut items: Vec<Feedback> = tables
            .feedback
            .iter()
            .filter(|f| f.provider_id == provider_id)
            .cloned()
            .collect();
        items.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::user::Role;
    use crate::services::workflow::{plan, Actor, HireAction};
    use chrono::NaiveDate;
    use std::sync::Arc;

    fn new_request(customer_id: Uuid, service_type: &str) -> NewHireRequest {
        NewHireRequest {
            customer_id,
            provider_id: None,
            name: "Sam".into(),
            email: "sam@example.com".into(),
            contact_number: "555-0101".into(),
            address: "2 Elm St".into(),
            service_type: service_type.into(),
            description: "Fix the fence".into(),
            preferred_date: NaiveDate::from_ymd_opt(2026, 12, 1).unwrap(),
            preferred_time: "09:00".into(),
            additional_info: None,
            price: None,
            latitude: None,
            longitude: None,
        }
    }

    #[tokio::test]
    async fn only_one_concurrent_accept_wins() {
        let store = Arc::new(InMemoryRequestStore::new());
        let request = store.insert(new_request(Uuid::new_v4(), "carpentry")).await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = store.clone();
            let snapshot = request.clone();
            handles.push(tokio::spawn(async move {
                let provider = Uuid::new_v4();
                let change = plan(
                    &snapshot,
                    Actor::Provider(provider),
                    &HireAction::Accept { price: None },
                    false,
                    Utc::now(),
                )
                .unwrap();
                store.apply_change(snapshot.id, &change).await.unwrap()
            }));
        }

        let mut winners = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
        let stored = store.get(request.id).await.unwrap().unwrap();
        assert_eq!(stored.status, HireStatus::Confirmed);
        assert!(stored.provider_id.is_some());
    }

    #[tokio::test]
    async fn declined_requests_never_resurface() {
        let store = InMemoryRequestStore::new();
        let provider = Uuid::new_v4();
        let kept = store.insert(new_request(Uuid::new_v4(), "cleaning")).await.unwrap();
        let declined = store.insert(new_request(Uuid::new_v4(), "cleaning")).await.unwrap();

        assert!(store.record_decline(provider, declined.id).await.unwrap());
        assert!(!store.record_decline(provider, declined.id).await.unwrap());

        for _ in 0..3 {
            let open = store
                .list_open_for_provider(provider, &OpenRequestFilter::default())
                .await
                .unwrap();
            let ids: Vec<Uuid> = open.iter().map(|r| r.id).collect();
            assert_eq!(ids, vec![kept.id]);
        }

        let other = store
            .list_open_for_provider(Uuid::new_v4(), &OpenRequestFilter::default())
            .await
            .unwrap();
        assert_eq!(other.len(), 2);
    }

    #[tokio::test]
    async fn open_queue_carries_message_threads() {
        let store = InMemoryRequestStore::new();
        let customer_id = Uuid::new_v4();
        let request = store.insert(new_request(customer_id, "painting")).await.unwrap();
        store
            .append_message(
                request.id,
                NewMessage {
                    sender_role: Role::Customer,
                    sender_id: customer_id,
                    sender_name: "Sam".into(),
                    text: "Two rooms, white walls".into(),
                },
            )
            .await
            .unwrap();

        let open = store
            .list_open_for_provider(Uuid::new_v4(), &OpenRequestFilter::default())
            .await
            .unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].messages.len(), 1);
        assert_eq!(open[0].messages[0].text, "Two rooms, white walls");
    }

    #[tokio::test]
    async fn open_queue_filters_by_service_type() {
        let store = InMemoryRequestStore::new();
        store.insert(new_request(Uuid::new_v4(), "Plumbing")).await.unwrap();
        store.insert(new_request(Uuid::new_v4(), "gardening")).await.unwrap();

        let filter = OpenRequestFilter {
            service_types: Some(vec!["plumbing".into()]),
        };
        let open = store.list_open_for_provider(Uuid::new_v4(), &filter).await.unwrap();
        assert_eq!(open.len(), 1);
        assert_eq!(open[0].service_type, "Plumbing");
    }

    #[tokio::test]
    async fn sequential_ratings_are_all_counted() {
        let store = InMemoryProviderStore::new();
        let provider_id = Uuid::new_v4();
        store
            .create(NewProvider {
                id: provider_id,
                business_name: "Fixit".into(),
                phone: None,
                service_types: vec!["plumbing".into()],
            })
            .await
            .unwrap();

        let mut last = None;
        for rating in [3, 3, 4, 5] {
            let (_, provider) = store
                .add_feedback(NewFeedback {
                    request_id: Uuid::new_v4(),
                    provider_id,
                    customer_id: Uuid::new_v4(),
                    rating,
                    comment: None,
                })
                .await
                .unwrap();
            last = Some(provider);
        }
        let provider = last.unwrap();
        assert_eq!(provider.rating_count, 4);
        assert!((provider.rating_avg - 3.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn concurrent_ratings_are_all_counted() {
        let store = Arc::new(InMemoryProviderStore::new());
        let provider_id = Uuid::new_v4();
        store
            .create(NewProvider {
                id: provider_id,
                business_name: "Fixit".into(),
                phone: None,
                service_types: vec!["plumbing".into()],
            })
            .await
            .unwrap();
        let feedback = |rating| NewFeedback {
            request_id: Uuid::new_v4(),
            provider_id,
            customer_id: Uuid::new_v4(),
            rating,
            comment: None,
        };
        for _ in 0..2 {
            store.add_feedback(feedback(3)).await.unwrap();
        }
        let seeded = store.get(provider_id).await.unwrap().unwrap();
        assert_eq!(seeded.rating_count, 2);
        assert!((seeded.rating_avg - 3.0).abs() < 1e-9);

        let handles: Vec<_> = [4, 5]
            .into_iter()
            .map(|rating| {
                let store = store.clone();
                let submission = feedback(rating);
                tokio::spawn(async move { store.add_feedback(submission).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let provider = store.get(provider_id).await.unwrap().unwrap();
        assert_eq!(provider.rating_count, 4);
        assert!((provider.rating_avg - 3.75).abs() < 1e-9);
    }

    #[tokio::test]
    async fn feedback_is_unique_per_request() {
        let store = InMemoryProviderStore::new();
        let provider_id = Uuid::new_v4();
        store
            .create(NewProvider {
                id: provider_id,
                business_name: "Fixit".into(),
                phone: None,
                service_types: vec![],
            })
            .await
            .unwrap();
        let feedback = NewFeedback {
            request_id: Uuid::new_v4(),
            provider_id,
            customer_id: Uuid::new_v4(),
            rating: 5,
            comment: Some("great".into()),
        };
        store.add_feedback(feedback.clone()).await.unwrap();
        assert!(store.add_feedback(feedback).await.is_err());
        assert_eq!(store.get(provider_id).await.unwrap().unwrap().rating_count, 1);
    }
}
