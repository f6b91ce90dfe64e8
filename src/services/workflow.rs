//! Hire-request status transitions.
//!
//! ```text
//! pending ──accept──> confirmed ──start──> in-progress ──complete──> completed
//!    │                    │                     │
//!    ├──decline (direct hire)──> declined       │
//!    └──────────────cancel (customer)───────────┴──> cancelled
//! ```
//!
//! A provider declining an *open* request (one with no addressed provider)
//! does not change its status; the request is only added to that provider's
//! declined set so it never shows up in their available list again.
//!
//! [`plan`] is pure: it inspects the current record and returns a
//! [`StatusChange`] which the store applies with a compare-and-set on
//! [`StatusChange::from`].

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::middleware::auth::Identity;
use crate::models::hire_request::{HireRequest, HireStatus};
use crate::models::user::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Actor {
    Customer(Uuid),
    Provider(Uuid),
    Other(Role),
}

impl From<&Identity> for Actor {
    fn from(identity: &Identity) -> Self {
        match identity.role {
            Role::Customer => Actor::Customer(identity.user_id),
            Role::Provider => Actor::Provider(identity.user_id),
            other => Actor::Other(other),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HireAction {
    Accept { price: Option<Decimal> },
    Decline,
    Start,
    Complete,
    Cancel,
}

impl HireAction {
    /// Maps a requested target status onto the action that reaches it.
    pub fn for_target(target: HireStatus) -> Option<Self> {
        match target {
            HireStatus::Confirmed => Some(HireAction::Accept { price: None }),
            HireStatus::InProgress => Some(HireAction::Start),
            HireStatus::Completed => Some(HireAction::Complete),
            HireStatus::Cancelled => Some(HireAction::Cancel),
            HireStatus::Declined => Some(HireAction::Decline),
            HireStatus::Pending => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            HireAction::Accept { .. } => "accept",
            HireAction::Decline => "decline",
            HireAction::Start => "start",
            HireAction::Complete => "complete",
            HireAction::Cancel => "cancel",
        }
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TransitionError {
    /// The actor is not allowed to touch this request.
    #[error("{0}")]
    NotPermitted(String),
    /// The request's current status does not allow the action.
    #[error("{0}")]
    Illegal(String),
}

/// Planned mutation of a hire request.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub from: HireStatus,
    /// `None` when the status stays as is (open-request decline).
    pub to: Option<HireStatus>,
    pub provider_id: Option<Uuid>,
    pub price: Option<Decimal>,
    pub accepted_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub record_decline: bool,
}

impl StatusChange {
    fn new(from: HireStatus, to: Option<HireStatus>) -> Self {
        Self {
            from,
            to,
            provider_id: None,
            price: None,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            record_decline: false,
        }
    }

    /// Applies the change to an in-memory record.
    pub fn apply_to(&self, request: &mut HireRequest, now: DateTime<Utc>) {
        if let Some(to) = self.to {
            request.status = to;
        }
        if let Some(provider_id) = self.provider_id {
            request.provider_id = Some(provider_id);
        }
        if let Some(price) = self.price {
            request.price = Some(price);
        }
        request.accepted_at = self.accepted_at.or(request.accepted_at);
        request.started_at = self.started_at.or(request.started_at);
        request.completed_at = self.completed_at.or(request.completed_at);
        request.cancelled_at = self.cancelled_at.or(request.cancelled_at);
        request.updated_at = now;
    }
}

/// Validates `action` by `actor` against `request` and plans the change.
///
/// `declined_by_actor` tells whether the acting provider already has this
/// request in their declined set.
pub fn plan(
    request: &HireRequest,
    actor: Actor,
    action: &HireAction,
    declined_by_actor: bool,
    now: DateTime<Utc>,
) -> Result<StatusChange, TransitionError> {
    let status = request.status;

    match action {
        HireAction::Cancel => {
            let Actor::Customer(customer_id) = actor else {
                return Err(not_permitted("Only the requesting customer can cancel a request"));
            };
            if customer_id != request.customer_id {
                return Err(not_permitted("You can only cancel your own requests"));
            }
            if status.is_terminal() {
                return Err(illegal(format!("Request is already {}", status)));
            }
            let mut change = StatusChange::new(status, Some(HireStatus::Cancelled));
            change.cancelled_at = Some(now);
            Ok(change)
        }
        HireAction::Accept { price } => {
            let provider_id = provider_of(actor)?;
            if let Some(assigned) = request.provider_id {
                if assigned != provider_id {
                    return Err(not_permitted("Request is assigned to another provider"));
                }
            }
            if status != HireStatus::Pending {
                return Err(illegal(format!(
                    "Only pending requests can be accepted (current status: {})",
                    status
                )));
            }
            if declined_by_actor {
                return Err(illegal("You have already declined this request"));
            }
            let mut change = StatusChange::new(status, Some(HireStatus::Confirmed));
            change.provider_id = Some(provider_id);
            change.price = *price;
            change.accepted_at = Some(now);
            Ok(change)
        }
        HireAction::Decline => {
            let provider_id = provider_of(actor)?;
            if status != HireStatus::Pending {
                return Err(illegal(format!(
                    "Only pending requests can be declined (current status: {})",
                    status
                )));
            }
            match request.provider_id {
                Some(assigned) if assigned == provider_id => {
                    let mut change = StatusChange::new(status, Some(HireStatus::Declined));
                    change.record_decline = true;
                    Ok(change)
                }
                Some(_) => Err(not_permitted("Request is assigned to another provider")),
                None => {
                    let mut change = StatusChange::new(status, None);
                    change.record_decline = true;
                    Ok(change)
                }
            }
        }
        HireAction::Start => {
            require_assigned(request, actor)?;
            if status != HireStatus::Confirmed {
                return Err(illegal(format!(
                    "Only confirmed jobs can be started (current status: {})",
                    status
                )));
            }
            let mut change = StatusChange::new(status, Some(HireStatus::InProgress));
            change.started_at = Some(now);
            Ok(change)
        }
        HireAction::Complete => {
            require_assigned(request, actor)?;
            if status != HireStatus::InProgress {
                return Err(illegal(format!(
                    "Only jobs in progress can be completed (current status: {})",
                    status
                )));
            }
            let mut change = StatusChange::new(status, Some(HireStatus::Completed));
            change.completed_at = Some(now);
            Ok(change)
        }
    }
}

fn provider_of(actor: Actor) -> Result<Uuid, TransitionError> {
    match actor {
        Actor::Provider(id) => Ok(id),
        Actor::Customer(_) => Err(not_permitted("Customers can only cancel their requests")),
        Actor::Other(role) => Err(not_permitted(format!(
            "Role '{}' cannot change hire request status",
            role
        ))),
    }
}

fn require_assigned(request: &HireRequest, actor: Actor) -> Result<Uuid, TransitionError> {
    let provider_id = provider_of(actor)?;
    if request.provider_id != Some(provider_id) {
        return Err(not_permitted("This job is not assigned to you"));
    }
    Ok(provider_id)
}

fn not_permitted(msg: impl Into<String>) -> TransitionError {
    TransitionError::NotPermitted(msg.into())
}

fn illegal(msg: impl Into<String>) -> TransitionError {
    TransitionError::Illegal(msg.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn request(status: HireStatus, provider_id: Option<Uuid>) -> HireRequest {
        let now = Utc::now();
        HireRequest {
            id: Uuid::new_v4(),
            customer_id: Uuid::new_v4(),
            provider_id,
            name: "Dana".into(),
            email: "dana@example.com".into(),
            contact_number: "555-0100".into(),
            address: "1 Main St".into(),
            service_type: "plumbing".into(),
            description: "Leaking sink".into(),
            preferred_date: NaiveDate::from_ymd_opt(2026, 11, 2).unwrap(),
            preferred_time: "10:00".into(),
            additional_info: None,
            price: None,
            latitude: None,
            longitude: None,
            status,
            accepted_at: None,
            started_at: None,
            completed_at: None,
            cancelled_at: None,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
        }
    }

    #[test]
    fn full_lifecycle_by_assigned_provider() {
        let provider_a = Uuid::new_v4();
        let provider_b = Uuid::new_v4();
        let now = Utc::now();
        let mut req = request(HireStatus::Pending, None);

        let price = Some(Decimal::new(4500, 2));
        let accept = plan(&req, Actor::Provider(provider_a), &HireAction::Accept { price }, false, now)
            .expect("accept");
        assert_eq!(accept.to, Some(HireStatus::Confirmed));
        accept.apply_to(&mut req, now);
        assert_eq!(req.provider_id, Some(provider_a));
        assert_eq!(req.price, price);
        assert!(req.accepted_at.is_some());

        plan(&req, Actor::Provider(provider_a), &HireAction::Start, false, now)
            .expect("start")
            .apply_to(&mut req, now);
        assert_eq!(req.status, HireStatus::InProgress);
        assert!(req.started_at.is_some());

        let err = plan(&req, Actor::Provider(provider_b), &HireAction::Complete, false, now)
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotPermitted(_)));

        plan(&req, Actor::Provider(provider_a), &HireAction::Complete, false, now)
            .expect("complete")
            .apply_to(&mut req, now);
        assert_eq!(req.status, HireStatus::Completed);
        assert!(req.completed_at.is_some());
    }

    #[test]
    fn start_requires_confirmed_status() {
        let provider = Uuid::new_v4();
        let req = request(HireStatus::Pending, Some(provider));
        let err = plan(&req, Actor::Provider(provider), &HireAction::Start, false, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Illegal(_)));
    }

    #[test]
    fn complete_requires_in_progress() {
        let provider = Uuid::new_v4();
        let req = request(HireStatus::Confirmed, Some(provider));
        let err = plan(&req, Actor::Provider(provider), &HireAction::Complete, false, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::Illegal(_)));
    }

    #[test]
    fn non_assigned_provider_cannot_start() {
        let req = request(HireStatus::Confirmed, Some(Uuid::new_v4()));
        let err = plan(&req, Actor::Provider(Uuid::new_v4()), &HireAction::Start, false, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotPermitted(_)));
    }

    #[test]
    fn customer_may_only_cancel_own_request() {
        let req = request(HireStatus::Confirmed, Some(Uuid::new_v4()));
        let owner = Actor::Customer(req.customer_id);

        let err = plan(&req, owner, &HireAction::Complete, false, Utc::now()).unwrap_err();
        assert!(matches!(err, TransitionError::NotPermitted(_)));

        let err = plan(&req, Actor::Customer(Uuid::new_v4()), &HireAction::Cancel, false, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotPermitted(_)));

        let change = plan(&req, owner, &HireAction::Cancel, false, Utc::now()).expect("cancel");
        assert_eq!(change.to, Some(HireStatus::Cancelled));
        assert!(change.cancelled_at.is_some());
    }

    #[test]
    fn terminal_states_reject_every_action() {
        let provider = Uuid::new_v4();
        for status in [HireStatus::Completed, HireStatus::Cancelled, HireStatus::Declined] {
            let req = request(status, Some(provider));
            let customer = Actor::Customer(req.customer_id);
            assert!(plan(&req, customer, &HireAction::Cancel, false, Utc::now()).is_err());
            for action in [
                HireAction::Accept { price: None },
                HireAction::Decline,
                HireAction::Start,
                HireAction::Complete,
            ] {
                let result = plan(&req, Actor::Provider(provider), &action, false, Utc::now());
                assert!(
                    matches!(result, Err(TransitionError::Illegal(_))),
                    "{} from {} should be illegal",
                    action.name(),
                    status
                );
            }
        }
    }

    #[test]
    fn declining_open_request_keeps_status() {
        let req = request(HireStatus::Pending, None);
        let change = plan(&req, Actor::Provider(Uuid::new_v4()), &HireAction::Decline, false, Utc::now())
            .expect("decline");
        assert_eq!(change.to, None);
        assert!(change.record_decline);
    }

    #[test]
    fn declining_direct_hire_ends_it() {
        let provider = Uuid::new_v4();
        let req = request(HireStatus::Pending, Some(provider));
        let change = plan(&req, Actor::Provider(provider), &HireAction::Decline, false, Utc::now())
            .expect("decline");
        assert_eq!(change.to, Some(HireStatus::Declined));
        assert!(change.record_decline);

        let err = plan(&req, Actor::Provider(Uuid::new_v4()), &HireAction::Decline, false, Utc::now())
            .unwrap_err();
        assert!(matches!(err, TransitionError::NotPermitted(_)));
    }

    #[test]
    fn provider_cannot_accept_after_declining() {
        let req = request(HireStatus::Pending, None);
        let err = plan(
            &req,
            Actor::Provider(Uuid::new_v4()),
            &HireAction::Accept { price: None },
            true,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::Illegal(_)));
    }

    #[test]
    fn direct_hire_is_reserved_for_addressed_provider() {
        let req = request(HireStatus::Pending, Some(Uuid::new_v4()));
        let err = plan(
            &req,
            Actor::Provider(Uuid::new_v4()),
            &HireAction::Accept { price: None },
            false,
            Utc::now(),
        )
        .unwrap_err();
        assert!(matches!(err, TransitionError::NotPermitted(_)));
    }

    #[test]
    fn admins_and_shop_owners_cannot_drive_transitions() {
        let req = request(HireStatus::Pending, None);
        for role in [Role::Admin, Role::ShopOwner] {
            let err = plan(&req, Actor::Other(role), &HireAction::Accept { price: None }, false, Utc::now())
                .unwrap_err();
            assert!(matches!(err, TransitionError::NotPermitted(_)));
        }
    }

    #[test]
    fn targets_map_to_actions() {
        assert_eq!(HireAction::for_target(HireStatus::InProgress), Some(HireAction::Start));
        assert_eq!(HireAction::for_target(HireStatus::Completed), Some(HireAction::Complete));
        assert_eq!(HireAction::for_target(HireStatus::Pending), None);
    }
}
