use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
struct ConfigFile {
    server: ServerConfig,
    storage: StorageConfig,
    email: EmailConfig,
    #[serde(default)]
    otp: OtpConfig,
    llm: LlmFileConfig,
}

#[derive(Debug, Clone, Deserialize)]
struct ServerConfig {
    bind: String,
}

#[derive(Debug, Clone, Deserialize)]
struct StorageConfig {
    data_dir: String,
}

#[derive(Debug, Clone, Deserialize)]
struct EmailConfig {
    api_key: String,
    sender_email: String,
    sender_name: String,
    #[serde(default = "default_email_timeout")]
    timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
struct OtpConfig {
    ttl_minutes: i64,
    max_attempts: i32,
    resend_cooldown_secs: i64,
}

impl Default for OtpConfig {
    fn default() -> Self {
        Self {
            ttl_minutes: 10,
            max_attempts: 5,
            resend_cooldown_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
struct LlmFileConfig {
    url: String,
    api_keys: Vec<String>,
    #[serde(default = "default_llm_timeout")]
    timeout_secs: u64,
}

fn default_email_timeout() -> u64 {
    60
}

fn default_llm_timeout() -> u64 {
    20
}

/// Brevo transactional email settings.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub timeout: Duration,
}

/// Expiry, attempt cap and resend cooldown for verification codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OtpPolicy {
    pub ttl: chrono::TimeDelta,
    pub max_attempts: i32,
    pub resend_cooldown: chrono::TimeDelta,
}

impl Default for OtpPolicy {
    fn default() -> Self {
        OtpConfig::default().into()
    }
}

impl From<OtpConfig> for OtpPolicy {
    fn from(c: OtpConfig) -> Self {
        Self {
            ttl: chrono::TimeDelta::minutes(c.ttl_minutes),
            max_attempts: c.max_attempts,
            resend_cooldown: chrono::TimeDelta::seconds(c.resend_cooldown_secs),
        }
    }
}

/// Generation endpoint plus the ordered credential list tried on each prompt.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub url: String,
    pub api_keys: Vec<String>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub bind: String,
    pub data_dir: PathBuf,
    pub mail: MailConfig,
    pub otp: OtpPolicy,
    pub llm: LlmConfig,
}

impl Config {
    pub fn parse(content: &str) -> Result<Self> {
        let config_file: ConfigFile =
            toml::from_str(content).context("Failed to parse config file")?;

        Ok(Self {
            bind: config_file.server.bind,
            data_dir: config_file.storage.data_dir.into(),
            mail: MailConfig {
                api_key: config_file.email.api_key,
                sender_email: config_file.email.sender_email,
                sender_name: config_file.email.sender_name,
                timeout: Duration::from_secs(config_file.email.timeout_secs),
            },
            otp: config_file.otp.into(),
            llm: LlmConfig {
                url: config_file.llm.url,
                api_keys: config_file.llm.api_keys,
                timeout: Duration::from_secs(config_file.llm.timeout_secs),
            },
        })
    }

    pub fn from_file(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path))?;
        Self::parse(&content)
    }

    pub fn load() -> Result<Self> {
        let path =
            std::env::var("GOLDBLOG_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::from_file(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
        [server]
        bind = "127.0.0.1:8000"

        [storage]
        data_dir = "data"

        [email]
        api_key = "brevo-key"
        sender_email = "noreply@example.com"
        sender_name = "Gold Blog"

        [llm]
        url = "https://example.com/generate"
        api_keys = ["k1", "", "k3"]
    "#;

    #[test]
    fn defaults_fill_optional_sections() {
        let config = Config::parse(MINIMAL).unwrap();

        assert_eq!(config.otp, OtpPolicy::default());
        assert_eq!(config.otp.max_attempts, 5);
        assert_eq!(config.otp.ttl, chrono::TimeDelta::minutes(10));
        assert_eq!(config.otp.resend_cooldown, chrono::TimeDelta::seconds(60));
        assert_eq!(config.mail.timeout, Duration::from_secs(60));
        assert_eq!(config.llm.timeout, Duration::from_secs(20));
        assert_eq!(config.llm.api_keys, vec!["k1", "", "k3"]);
        assert_eq!(config.data_dir, PathBuf::from("data"));
    }

    #[test]
    fn otp_section_overrides_policy() {
        let content = format!(
            "{MINIMAL}\n[otp]\nttl_minutes = 15\nmax_attempts = 3\nresend_cooldown_secs = 30\n"
        );
        let config = Config::parse(&content).unwrap();

        assert_eq!(config.otp.ttl, chrono::TimeDelta::minutes(15));
        assert_eq!(config.otp.max_attempts, 3);
        assert_eq!(config.otp.resend_cooldown, chrono::TimeDelta::seconds(30));
    }

    #[test]
    fn missing_llm_section_is_an_error() {
        let content = MINIMAL.replace("[llm]", "[unused]");
        assert!(Config::parse(&content).is_err());
    }
}
