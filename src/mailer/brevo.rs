use super::Mailer;
use crate::config::MailConfig;
use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, info};

const BREVO_SEND_URL: &str = "https://api.brevo.com/v3/smtp/email";

pub struct BrevoMailer {
    client: reqwest::Client,
    api_key: String,
    sender: Contact,
}

#[derive(Debug, Clone, Serialize)]
struct Contact {
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SendRequest<'a> {
    sender: &'a Contact,
    to: Vec<Contact>,
    subject: &'a str,
    text_content: &'a str,
}

impl BrevoMailer {
    pub fn new(config: &MailConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .context("Failed to build email HTTP client")?;
        info!("Brevo mailer initialized (sender: {})", config.sender_email);
        Ok(Self {
            client,
            api_key: config.api_key.clone(),
            sender: Contact {
                name: Some(config.sender_name.clone()),
                email: config.sender_email.clone(),
            },
        })
    }
}

#[async_trait]
impl Mailer for BrevoMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        let payload = SendRequest {
            sender: &self.sender,
            to: vec![Contact {
                name: None,
                email: to.to_string(),
            }],
            subject,
            text_content: body,
        };

        let resp = self
            .client
            .post(BREVO_SEND_URL)
            .header("accept", "application/json")
            .header("api-key", &self.api_key)
            .json(&payload)
            .send()
            .await
            .context("Brevo request failed")?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Brevo API error: {} {}", status, body);
        }

        debug!("Email accepted by Brevo ({})", status);
        Ok(())
    }
}
