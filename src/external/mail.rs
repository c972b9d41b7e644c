use crate::config::MailConfig;
use crate::emails::EmailTemplate;
use crate::error::{AppError, AppResult};
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, template: EmailTemplate) -> Self {
        Self {
            to: to.into(),
            subject: template.subject,
            html: template.html,
        }
    }
}

#[async_trait::async_trait]
pub trait MailClient: Send + Sync {
    async fn send(&self, message: EmailMessage) -> AppResult<()>;
}

pub type DynMailClient = Arc<dyn MailClient>;

/// Picks the Resend client when an API key is configured, otherwise logs emails.
pub fn create_mail_client(config: &MailConfig) -> DynMailClient {
    if config.api_key.is_empty() {
        log::warn!("MAIL_API_KEY not configured, outgoing emails will only be logged");
        Arc::new(LogMailClient)
    } else {
        Arc::new(ResendMailClient::new(config))
    }
}

pub struct ResendMailClient {
    client: Client,
    api_key: String,
    api_url: String,
    from: String,
}

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    html: &'a str,
}

impl ResendMailClient {
    pub fn new(config: &MailConfig) -> Self {
        Self {
            client: Client::new(),
            api_key: config.api_key.clone(),
            api_url: config.api_url.clone(),
            from: format!("{} <{}>", config.from_name, config.from_email),
        }
    }
}

#[async_trait::async_trait]
impl MailClient for ResendMailClient {
    async fn send(&self, message: EmailMessage) -> AppResult<()> {
        let body = ResendEmail {
            from: &self.from,
            to: vec![message.to.as_str()],
            subject: &message.subject,
            html: &message.html,
        };

        let response = self
            .client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        if response.status().is_success() {
            Ok(())
        } else {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            Err(AppError::ExternalApiError(format!(
                "Failed to send email ({status}): {error_text}"
            )))
        }
    }
}

/// 开发环境使用：只写日志，不真正发送
pub struct LogMailClient;

#[async_trait::async_trait]
impl MailClient for LogMailClient {
    async fn send(&self, message: EmailMessage) -> AppResult<()> {
        log::info!(
            "Email (not sent) to={} subject={:?}",
            message.to,
            message.subject
        );
        Ok(())
    }
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every message; addresses listed in `failing` make `send` fail.
    #[derive(Default)]
    pub struct RecordingMailClient {
        pub sent: Mutex<Vec<EmailMessage>>,
        pub failing: Vec<String>,
    }

    impl RecordingMailClient {
        pub fn failing_for(addresses: &[&str]) -> Self {
            Self {
                sent: Mutex::new(Vec::new()),
                failing: addresses.iter().map(|a| a.to_string()).collect(),
            }
        }

        pub fn sent(&self) -> Vec<EmailMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl MailClient for RecordingMailClient {
        async fn send(&self, message: EmailMessage) -> AppResult<()> {
            if self.failing.contains(&message.to) {
                return Err(AppError::ExternalApiError(format!(
                    "mailbox unavailable: {}",
                    message.to
                )));
            }
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_client_is_used_without_api_key() {
        let client = create_mail_client(&MailConfig::default());
        let result = client
            .send(EmailMessage {
                to: "owner@example.com".into(),
                subject: "hello".into(),
                html: "<p>hi</p>".into(),
            })
            .await;
        assert!(result.is_ok());
    }

    #[test]
    fn test_resend_from_header() {
        let config = MailConfig {
            api_key: "re_123".into(),
            ..MailConfig::default()
        };
        let client = ResendMailClient::new(&config);
        assert_eq!(client.from, "Resource Hub <noreply@localhost>");
    }
}
