use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub to: String,
    pub subject: String,
    pub text: String,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: OutgoingMail) -> Result<()>;
}

/// Delivers mail through an HTTP mail API (`MAIL_API_URL`).
#[derive(Clone)]
pub struct HttpMailer {
    client: Client,
    api_url: String,
    api_key: Option<String>,
    from: String,
}

impl HttpMailer {
    pub fn new(client: Client, api_url: String, api_key: Option<String>, from: String) -> Self {
        Self {
            client,
            api_url,
            api_key,
            from,
        }
    }
}

#[async_trait]
impl Mailer for HttpMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        let mut req = self.client.post(&self.api_url).json(&json!({
            "from": self.from,
            "to": mail.to,
            "subject": mail.subject,
            "text": mail.text,
        }));
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }
        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), body = %body, "mail API rejected message");
            return Err(Error::Internal(format!("Mail API returned {}", status)));
        }
        info!(to = %mail.to, subject = %mail.subject, "mail sent");
        Ok(())
    }
}

/// Used when no mail API is configured: the message only goes to the log.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: OutgoingMail) -> Result<()> {
        info!(to = %mail.to, subject = %mail.subject, body = %mail.text, "mail delivery disabled; message logged");
        Ok(())
    }
}

pub fn mailer_from_config(config: &Config, client: Client) -> std::sync::Arc<dyn Mailer> {
    match &config.mail_api_url {
        Some(url) => std::sync::Arc::new(HttpMailer::new(
            client,
            url.clone(),
            config.mail_api_key.clone(),
            config.mail_from.clone(),
        )),
        None => std::sync::Arc::new(LogMailer),
    }
}

pub fn password_reset_mail(to: &str, frontend_url: &str, token: &str, ttl_minutes: i64) -> OutgoingMail {
    let link = format!(
        "{}/reset-password/{}",
        frontend_url.trim_end_matches('/'),
        token
    );
    OutgoingMail {
        to: to.to_string(),
        subject: "Reset your password".to_string(),
        text: format!(
            "We received a request to reset your password.\n\n\
             Open this link to choose a new one:\n{}\n\n\
             The link expires in {} minutes. If you did not ask for this, ignore this email.",
            link, ttl_minutes
        ),
    }
}
