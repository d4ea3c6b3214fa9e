//! Worker configuration (C8 ambient stack): one env-var-driven struct per
//! concern, loaded and validated the way `pytake-api::config::ApiConfig`
//! loads and validates its own — `from_env()` fails fast on anything
//! missing or malformed, `validate()` catches anything syntactically valid
//! but operationally nonsensical.

use std::env;
use std::time::Duration;

use wa_storage::BucketConfig;
use wa_whatsapp::WhatsAppConfig;

use crate::error::{ConfigError, ConfigResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
    Compact,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub bucket: BucketConfig,
    pub whatsapp: WhatsAppConfig,
    /// `sqlite://<path>?mode=rwc` DSN for the durable ingestion queue.
    pub queue_database_url: String,
    pub poll_interval_busy: Duration,
    pub poll_interval_idle: Duration,
    pub response_delay: Duration,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Reads every variable this binary needs, loading `.env` first via
    /// `dotenvy` (idempotent — `wa_storage::BucketConfig::from_env` loads it
    /// again internally, which is harmless).
    pub fn from_env() -> ConfigResult<Self> {
        dotenvy::dotenv().ok();

        let bucket = BucketConfig::from_env().map_err(|e| ConfigError::InvalidConfig(e.to_string()))?;
        let whatsapp = load_whatsapp_config()?;

        let queue_database_url = env::var("QUEUE_DATABASE_URL")
            .unwrap_or_else(|_| "sqlite://wa-worker-queue.db?mode=rwc".to_string());

        let poll_interval_busy = parse_seconds("QUEUE_POLL_INTERVAL_BUSY", "0.2")?;
        let poll_interval_idle = parse_seconds("QUEUE_POLL_INTERVAL_IDLE", "1.0")?;
        let response_delay = parse_seconds("QUEUE_RESPONSE_DELAY", "1.0")?;

        let log_level = env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string());
        let log_format = match env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()).to_lowercase().as_str() {
            "json" => LogFormat::Json,
            "compact" => LogFormat::Compact,
            _ => LogFormat::Pretty,
        };

        Ok(Self {
            bucket,
            whatsapp,
            queue_database_url,
            poll_interval_busy,
            poll_interval_idle,
            response_delay,
            log_level,
            log_format,
        })
    }

    pub fn validate(&self) -> ConfigResult<()> {
        if self.whatsapp.access_token.is_empty() {
            return Err(ConfigError::InvalidConfig("WHATSAPP_ACCESS_TOKEN cannot be empty".to_string()));
        }
        if self.whatsapp.phone_number_id.is_empty() {
            return Err(ConfigError::InvalidConfig("WHATSAPP_PHONE_NUMBER_ID cannot be empty".to_string()));
        }
        if self.queue_database_url.is_empty() {
            return Err(ConfigError::InvalidConfig("QUEUE_DATABASE_URL cannot be empty".to_string()));
        }
        if self.poll_interval_busy.is_zero() {
            return Err(ConfigError::InvalidConfig("QUEUE_POLL_INTERVAL_BUSY must be greater than zero".to_string()));
        }
        if self.poll_interval_idle.is_zero() {
            return Err(ConfigError::InvalidConfig("QUEUE_POLL_INTERVAL_IDLE must be greater than zero".to_string()));
        }
        Ok(())
    }
}

fn parse_seconds(variable: &str, default: &str) -> ConfigResult<Duration> {
    let raw = env::var(variable).unwrap_or_else(|_| default.to_string());
    let seconds: f64 = raw
        .parse()
        .map_err(|source| ConfigError::ParseError { variable: variable.to_string(), source })?;
    Ok(Duration::from_secs_f64(seconds.max(0.0)))
}

fn load_whatsapp_config() -> ConfigResult<WhatsAppConfig> {
    let access_token = env::var("WHATSAPP_ACCESS_TOKEN")
        .map_err(|_| ConfigError::MissingVariable("WHATSAPP_ACCESS_TOKEN".to_string()))?;
    let phone_number_id = env::var("WHATSAPP_PHONE_NUMBER_ID")
        .map_err(|_| ConfigError::MissingVariable("WHATSAPP_PHONE_NUMBER_ID".to_string()))?;
    let base_url = env::var("WHATSAPP_BASE_URL").unwrap_or_else(|_| WhatsAppConfig::default().base_url);
    let webhook_verify_token = env::var("WHATSAPP_WEBHOOK_VERIFY_TOKEN").unwrap_or_default();
    let app_secret = env::var("WHATSAPP_APP_SECRET").unwrap_or_default();

    Ok(WhatsAppConfig { access_token, phone_number_id, base_url, webhook_verify_token, app_secret })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_required_vars() {
        env::set_var("BUCKET_REGION", "us-east-1");
        env::set_var("BUCKET_KEY_ID", "test-key");
        env::set_var("BUCKET_KEY_SECRET", "test-secret");
        env::set_var("BUCKET_NAME", "test-bucket");
        env::set_var("WHATSAPP_ACCESS_TOKEN", "token");
        env::set_var("WHATSAPP_PHONE_NUMBER_ID", "12345");
    }

    fn clear_vars() {
        for var in [
            "BUCKET_REGION",
            "BUCKET_KEY_ID",
            "BUCKET_KEY_SECRET",
            "BUCKET_NAME",
            "WHATSAPP_ACCESS_TOKEN",
            "WHATSAPP_PHONE_NUMBER_ID",
            "QUEUE_POLL_INTERVAL_BUSY",
            "QUEUE_POLL_INTERVAL_IDLE",
            "QUEUE_RESPONSE_DELAY",
            "LOG_LEVEL",
            "LOG_FORMAT",
        ] {
            env::remove_var(var);
        }
    }

    #[test]
    fn from_env_applies_documented_defaults() {
        clear_vars();
        set_required_vars();

        let config = WorkerConfig::from_env().unwrap();
        assert_eq!(config.poll_interval_busy, Duration::from_secs_f64(0.2));
        assert_eq!(config.poll_interval_idle, Duration::from_secs_f64(1.0));
        assert_eq!(config.response_delay, Duration::from_secs_f64(1.0));
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.validate().is_ok());

        clear_vars();
    }

    #[test]
    fn from_env_rejects_missing_whatsapp_token() {
        clear_vars();
        env::set_var("BUCKET_REGION", "us-east-1");
        env::set_var("BUCKET_KEY_ID", "test-key");
        env::set_var("BUCKET_KEY_SECRET", "test-secret");
        env::set_var("BUCKET_NAME", "test-bucket");
        env::set_var("WHATSAPP_PHONE_NUMBER_ID", "12345");

        assert!(WorkerConfig::from_env().is_err());
        clear_vars();
    }

    #[test]
    fn validate_rejects_zero_poll_interval() {
        clear_vars();
        set_required_vars();
        env::set_var("QUEUE_POLL_INTERVAL_BUSY", "0");

        let config = WorkerConfig::from_env().unwrap();
        assert!(config.validate().is_err());
        clear_vars();
    }
}
