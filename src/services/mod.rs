pub mod admin_service;
pub mod auth_service;
pub mod catalog_service;
pub mod hire_request_service;
pub mod mail_service;
pub mod provider_service;
pub mod shop_service;
pub mod support_service;
pub mod workflow;
