pub mod catalog;
pub mod feedback;
pub mod hire_request;
pub mod provider;
pub mod support_ticket;
pub mod user;
