mod brevo;

use anyhow::Result;
use async_trait::async_trait;

pub use brevo::BrevoMailer;

/// Plain-text transactional email.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()>;
}
