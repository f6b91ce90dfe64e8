pub mod admin_dto;
pub mod auth_dto;
pub mod catalog_dto;
pub mod hire_request_dto;
pub mod provider_dto;
pub mod response;
pub mod support_dto;
