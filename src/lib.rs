pub mod config;
pub mod database;
pub mod dto;
pub mod error;
pub mod middleware;
pub mod models;
pub mod repository;
pub mod routes;
pub mod services;
pub mod utils;

use std::sync::Arc;

use reqwest::Client;
use sqlx::PgPool;

use crate::error::{Error, Result};
use crate::repository::{PgProviderStore, PgRequestStore, ProviderStore, RequestStore};
use crate::services::{
    admin_service::AdminService,
    auth_service::AuthService,
    catalog_service::CatalogService,
    hire_request_service::HireRequestService,
    mail_service::{mailer_from_config, Mailer},
    provider_service::ProviderService,
    shop_service::ShopService,
    support_service::SupportService,
};

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub hire_service: HireRequestService,
    pub provider_service: ProviderService,
    pub auth_service: AuthService,
    pub catalog_service: CatalogService,
    pub shop_service: ShopService,
    pub support_service: SupportService,
    pub admin_service: AdminService,
}

impl AppState {
    pub fn new(pool: PgPool) -> Result<Self> {
        let http_client = http_client()?;
        let mailer = mailer_from_config(crate::config::get_config(), http_client.clone());
        let requests: Arc<dyn RequestStore> = Arc::new(PgRequestStore::new(pool.clone()));
        let providers: Arc<dyn ProviderStore> = Arc::new(PgProviderStore::new(pool.clone()));
        Ok(Self::with_stores(pool, requests, providers, mailer, http_client))
    }

    /// Builds the state around explicit stores; tests pass in-memory ones.
    pub fn with_stores(
        pool: PgPool,
        requests: Arc<dyn RequestStore>,
        providers: Arc<dyn ProviderStore>,
        mailer: Arc<dyn Mailer>,
        http_client: Client,
    ) -> Self {
        Self {
            hire_service: HireRequestService::new(requests, providers.clone()),
            provider_service: ProviderService::new(providers.clone()),
            auth_service: AuthService::new(pool.clone(), providers, mailer, http_client),
            catalog_service: CatalogService::new(pool.clone()),
            shop_service: ShopService::new(pool.clone()),
            support_service: SupportService::new(pool.clone()),
            admin_service: AdminService::new(pool.clone()),
            pool,
        }
    }
}

pub fn http_client() -> Result<Client> {
    Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()
        .map_err(|e| Error::Internal(format!("Failed to build HTTP client: {}", e)))
}
