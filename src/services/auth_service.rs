use std::sync::Arc;

use reqwest::Client;
use serde::Deserialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::get_config;
use crate::dto::auth_dto::{GoogleLoginPayload, LoginPayload, RegisterPayload};
use crate::dto::provider_dto::normalize_service_types;
use crate::error::{Error, Result};
use crate::middleware::auth::issue_token;
use crate::models::provider::NewProvider;
use crate::models::user::{PasswordReset, Role, User};
use crate::repository::ProviderStore;
use crate::services::mail_service::{password_reset_mail, Mailer};
use crate::utils::{crypto, time, token};

const USER_COLUMNS: &str =
    "id, name, email, phone, password_hash, google_id, role, is_active, created_at, updated_at";

const GOOGLE_TOKENINFO_URL: &str = "https://oauth2.googleapis.com/tokeninfo";

#[derive(Clone)]
pub struct AuthService {
    pool: PgPool,
    providers: Arc<dyn ProviderStore>,
    mailer: Arc<dyn Mailer>,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct GoogleTokenInfo {
    aud: String,
    sub: String,
    email: Option<String>,
    email_verified: Option<String>,
    name: Option<String>,
}

/// Role a self-service signup may ask for. Administrators are provisioned
/// out of band.
pub fn signup_role(requested: Option<&str>) -> Result<Role> {
    match requested.map(str::trim).filter(|r| !r.is_empty()) {
        None => Ok(Role::Customer),
        Some(raw) => match Role::parse(raw) {
            Some(Role::Admin) => Err(Error::Forbidden("Cannot self-register as admin".into())),
            Some(role) => Ok(role),
            None => Err(Error::BadRequest(format!("Unknown role '{}'", raw))),
        },
    }
}

impl AuthService {
    pub fn new(
        pool: PgPool,
        providers: Arc<dyn ProviderStore>,
        mailer: Arc<dyn Mailer>,
        client: Client,
    ) -> Self {
        Self {
            pool,
            providers,
            mailer,
            client,
        }
    }

    pub fn token_for(&self, user: &User) -> Result<String> {
        let config = get_config();
        issue_token(user.id, user.role, &config.jwt_secret, config.jwt_ttl_hours)
    }

    pub async fn register(&self, payload: RegisterPayload) -> Result<User> {
        let role = signup_role(payload.role.as_deref())?;
        let email = payload.email.trim().to_lowercase();
        let business_name = payload
            .business_name
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        if role == Role::Provider && business_name.is_none() {
            return Err(Error::BadRequest("business_name is required for providers".into()));
        }
        if self.find_by_email(&email).await?.is_some() {
            return Err(Error::BadRequest("Email is already registered".into()));
        }

        let password_hash = crypto::hash_password(&payload.password)?;
        let user = self
            .insert_user(
                payload.name.trim(),
                &email,
                payload.phone.as_deref(),
                Some(&password_hash),
                None,
                role,
            )
            .await?;

        if role == Role::Provider {
            self.create_provider_profile(
                &user,
                business_name.unwrap_or_else(|| user.name.clone()),
                normalize_service_types(payload.service_types),
            )
            .await?;
        }

        info!(user_id = %user.id, role = %user.role, "user registered");
        Ok(user)
    }

    pub async fn login(&self, payload: LoginPayload) -> Result<User> {
        let email = payload.email.trim().to_lowercase();
        let user = self
            .find_by_email(&email)
            .await?
            .ok_or_else(|| Error::Unauthorized("Invalid email or password".into()))?;
        let valid = user
            .password_hash
            .as_deref()
            .map(|hash| crypto::verify_password(&payload.password, hash))
            .unwrap_or(false);
        if !valid {
            warn!(email = %email, "failed login attempt");
            return Err(Error::Unauthorized("Invalid email or password".into()));
        }
        if !user.is_active {
            return Err(Error::Forbidden("Account is deactivated".into()));
        }
        info!(user_id = %user.id, "user logged in");
        Ok(user)
    }

    pub async fn google_login(&self, payload: GoogleLoginPayload) -> Result<User> {
        let client_id = get_config()
            .google_client_id
            .clone()
            .ok_or_else(|| Error::BadRequest("Google sign-in is not configured".into()))?;

        let resp = self
            .client
            .get(GOOGLE_TOKENINFO_URL)
            .query(&[("id_token", payload.id_token.as_str())])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(Error::Unauthorized("Invalid Google token".into()));
        }
        let info: GoogleTokenInfo = resp.json().await?;
        if info.aud != client_id {
            return Err(Error::Unauthorized("Google token was issued for another client".into()));
        }
        if info.email_verified.as_deref() != Some("true") {
            return Err(Error::Unauthorized("Google email is not verified".into()));
        }
        let email = info
            .email
            .map(|e| e.trim().to_lowercase())
            .ok_or_else(|| Error::Unauthorized("Google token has no email".into()))?;

        let user = if let Some(user) = self.find_by_google_id(&info.sub).await? {
            user
        } else if let Some(user) = self.find_by_email(&email).await? {
            self.link_google_id(user.id, &info.sub).await?
        } else {
            let role = signup_role(payload.role.as_deref())?;
            let name = info.name.unwrap_or_else(|| email.clone());
            let user = self
                .insert_user(&name, &email, None, None, Some(&info.sub), role)
                .await?;
            if role == Role::Provider {
                self.create_provider_profile(&user, name, Vec::new()).await?;
            }
            info!(user_id = %user.id, role = %user.role, "user registered with Google");
            user
        };

        if !user.is_active {
            return Err(Error::Forbidden("Account is deactivated".into()));
        }
        Ok(user)
    }

    pub async fn get_user(&self, id: Uuid) -> Result<User> {
        let sql = format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS);
        sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| Error::NotFound("User not found".into()))
    }

    /// Always succeeds so callers cannot probe which emails exist.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let email = email.trim().to_lowercase();
        let Some(user) = self.find_by_email(&email).await? else {
            info!("password reset requested for unknown email");
            return Ok(());
        };
        if !user.is_active {
            return Ok(());
        }

        let config = get_config();
        let raw = token::generate_access_token(token::RESET_TOKEN_LENGTH);
        let expires_at = time::now() + chrono::Duration::minutes(config.reset_token_ttl_minutes);
        sqlx::query("INSERT INTO password_resets (token_hash, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(crypto::hash_token(&raw))
            .bind(user.id)
            .bind(expires_at)
            .execute(&self.pool)
            .await?;

        let mail = password_reset_mail(
            &user.email,
            &config.frontend_url,
            &raw,
            config.reset_token_ttl_minutes,
        );
        if let Err(e) = self.mailer.send(mail).await {
            warn!(user_id = %user.id, error = %e, "failed to send password reset email");
        }
        info!(user_id = %user.id, "password reset issued");
        Ok(())
    }

    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> Result<()> {
        let mut tx = self.pool.begin().await?;
        let reset = sqlx::query_as::<_, PasswordReset>(
            r#"
            SELECT token_hash, user_id, expires_at, used_at
            FROM password_resets
            WHERE token_hash = $1
            FOR UPDATE
            "#,
        )
        .bind(crypto::hash_token(raw_token.trim()))
        .fetch_optional(&mut *tx)
        .await?
        .filter(|r| r.is_usable(time::now()))
        .ok_or_else(|| Error::BadRequest("Reset link is invalid or has expired".into()))?;

        let password_hash = crypto::hash_password(new_password)?;
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE id = $1")
            .bind(reset.user_id)
            .bind(&password_hash)
            .execute(&mut *tx)
            .await?;
        sqlx::query("UPDATE password_resets SET used_at = NOW() WHERE token_hash = $1")
            .bind(&reset.token_hash)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        info!(user_id = %reset.user_id, "password reset completed");
        Ok(())
    }

    /// Deletes reset tokens that are used or past their expiry.
    pub async fn purge_expired_resets(&self) -> Result<u64> {
        let result = sqlx::query(
            "DELETE FROM password_resets WHERE used_at IS NOT NULL OR expires_at < NOW()",
        )
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected())
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE LOWER(email) = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn find_by_google_id(&self, google_id: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {} FROM users WHERE google_id = $1", USER_COLUMNS);
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(google_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn link_google_id(&self, id: Uuid, google_id: &str) -> Result<User> {
        let sql = format!(
            "UPDATE users SET google_id = $2, updated_at = NOW() WHERE id = $1 RETURNING {}",
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .bind(google_id)
            .fetch_one(&self.pool)
            .await?;
        Ok(user)
    }

    async fn insert_user(
        &self,
        name: &str,
        email: &str,
        phone: Option<&str>,
        password_hash: Option<&str>,
        google_id: Option<&str>,
        role: Role,
    ) -> Result<User> {
        let sql = format!(
            r#"
            INSERT INTO users (name, email, phone, password_hash, google_id, role)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            USER_COLUMNS
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(name)
            .bind(email)
            .bind(phone)
            .bind(password_hash)
            .bind(google_id)
            .bind(role.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::Database(db) if db.is_unique_violation() => {
                    Error::BadRequest("Email is already registered".into())
                }
                other => other.into(),
            })?;
        Ok(user)
    }

    /// A provider account without its profile row cannot work; roll the
    /// user back if the profile insert fails.
    async fn create_provider_profile(
        &self,
        user: &User,
        business_name: String,
        service_types: Vec<String>,
    ) -> Result<()> {
        let created = self
            .providers
            .create(NewProvider {
                id: user.id,
                business_name,
                phone: user.phone.clone(),
                service_types,
            })
            .await;
        if let Err(e) = created {
            sqlx::query("DELETE FROM users WHERE id = $1")
                .bind(user.id)
                .execute(&self.pool)
                .await?;
            return Err(e);
        }
        Ok(())
    }
}
