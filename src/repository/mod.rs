//! Persistence seams for the hire-request workflow.
//!
//! `RequestStore` owns hire requests, their message threads and the
//! per-provider declined set; `ProviderStore` owns provider profiles, the
//! rating aggregate and feedback. Both have a Postgres implementation used
//! in production and an in-memory one used by tests and local tooling.

mod memory;
mod postgres;

pub use memory::{InMemoryProviderStore, InMemoryRequestStore};
pub use postgres::{PgProviderStore, PgRequestStore};

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::feedback::{Feedback, NewFeedback};
use crate::models::hire_request::{HireRequest, HireStatus, NewHireRequest, NewMessage, RequestMessage};
use crate::models::provider::{ApprovalStatus, NewProvider, Provider, ProviderFilter, ProviderUpdate};
use crate::services::workflow::StatusChange;

/// Filter for a provider's open queue.
#[derive(Debug, Clone, Default)]
pub struct OpenRequestFilter {
    /// When set, only requests whose service type is in this list.
    pub service_types: Option<Vec<String>>,
}

#[async_trait]
pub trait RequestStore: Send + Sync {
    async fn insert(&self, new: NewHireRequest) -> Result<HireRequest>;

    /// Fetch a request with its message thread.
    async fn get(&self, id: Uuid) -> Result<Option<HireRequest>>;

    async fn list_for_customer(&self, customer_id: Uuid) -> Result<Vec<HireRequest>>;

    async fn list_for_provider(
        &self,
        provider_id: Uuid,
        status: Option<HireStatus>,
    ) -> Result<Vec<HireRequest>>;

    /// Pending requests open to `provider_id`: unaddressed or addressed to
    /// them, and not in their declined set. Newest first, with messages.
    async fn list_open_for_provider(
        &self,
        provider_id: Uuid,
        filter: &OpenRequestFilter,
    ) -> Result<Vec<HireRequest>>;

    /// Applies `change` only if the request is still in `change.from`.
    /// Returns `None` when the request is missing or its status moved on.
    async fn apply_change(&self, id: Uuid, change: &StatusChange) -> Result<Option<HireRequest>>;

    /// Adds `(provider_id, request_id)` to the declined set. Returns `false`
    /// if it was already there.
    async fn record_decline(&self, provider_id: Uuid, request_id: Uuid) -> Result<bool>;

    async fn has_declined(&self, provider_id: Uuid, request_id: Uuid) -> Result<bool>;

    async fn append_message(&self, request_id: Uuid, message: NewMessage) -> Result<RequestMessage>;
}

#[async_trait]
pub trait ProviderStore: Send + Sync {
    async fn create(&self, new: NewProvider) -> Result<Provider>;

    async fn get(&self, id: Uuid) -> Result<Option<Provider>>;

    async fn list(&self, filter: &ProviderFilter) -> Result<Vec<Provider>>;

    async fn update_profile(&self, id: Uuid, update: ProviderUpdate) -> Result<Option<Provider>>;

    async fn set_availability(&self, id: Uuid, available: bool) -> Result<Option<Provider>>;

    async fn set_approval(&self, id: Uuid, status: ApprovalStatus) -> Result<Option<Provider>>;

    /// Stores feedback and folds its rating into the provider's running
    /// average atomically. Fails if the request already has feedback.
    async fn add_feedback(&self, feedback: NewFeedback) -> Result<(Feedback, Provider)>;

    async fn list_feedback(&self, provider_id: Uuid) -> Result<Vec<Feedback>>;
}
