//! Structured logging, initialized once at binary startup. Same shape as
//! `pytake-api::logging::init_logging`: env-filter first, fall back to the
//! configured level, fall back to `"info"`.

use tracing_subscriber::fmt::{self, format::FmtSpan};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Registry};

use crate::config::{LogFormat, WorkerConfig};

pub fn init_logging(config: &WorkerConfig) -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.log_level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let subscriber = Registry::default().with(env_filter);

    match config.log_format {
        LogFormat::Json => {
            let layer = fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(true)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);
            subscriber.with(layer).init();
        }
        LogFormat::Pretty => {
            let layer = fmt::layer()
                .pretty()
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE);
            subscriber.with(layer).init();
        }
        LogFormat::Compact => {
            let layer = fmt::layer().compact().with_target(false).with_thread_ids(false).with_span_events(FmtSpan::CLOSE);
            subscriber.with(layer).init();
        }
    }

    tracing::info!(log_level = %config.log_level, log_format = ?config.log_format, "logging initialized");
    Ok(())
}

/// Named event-logging call sites, mirroring `pytake-api::logging::events`
/// but at the seams this binary actually has: queue claim/dedup, lock
/// lifecycle, provider fallback, outbound delivery.
pub mod events {
    pub fn worker_starting(version: &str) {
        tracing::info!(version = %version, event = "worker_starting", "worker starting");
    }

    pub fn worker_ready() {
        tracing::info!(event = "worker_ready", "worker entering poll loop");
    }

    pub fn worker_stopping(reason: &str) {
        tracing::info!(reason = %reason, event = "worker_stopping", "worker shutting down");
    }

    pub fn job_claimed(row_id: i64) {
        tracing::debug!(row_id, event = "job_claimed", "claimed queued webhook payload");
    }

    pub fn job_done(row_id: i64) {
        tracing::debug!(row_id, event = "job_done", "marked queued job done");
    }

    pub fn job_failed(row_id: i64, error: &str) {
        tracing::warn!(row_id, error = %error, event = "job_failed", "queued job failed, marking error");
    }

    pub fn message_deduplicated(idempotency_key: &str) {
        tracing::debug!(idempotency_key = %idempotency_key, event = "message_deduplicated", "skipped already-ingested message");
    }

    pub fn lock_acquired(user_prefix: &str) {
        tracing::debug!(user_prefix = %user_prefix, event = "lock_acquired", "acquired user lock");
    }

    pub fn lock_timeout(user_prefix: &str) {
        tracing::warn!(user_prefix = %user_prefix, event = "lock_timeout", "timed out acquiring user lock");
    }

    pub fn response_scheduled(operator_id: &str, user_id: &str, due_in_ms: i64) {
        tracing::debug!(operator_id = %operator_id, user_id = %user_id, due_in_ms, event = "response_scheduled", "scheduled response generation");
    }

    pub fn response_generation_failed(operator_id: &str, user_id: &str, error: &str) {
        tracing::error!(operator_id = %operator_id, user_id = %user_id, error = %error, event = "response_generation_failed", "response generation failed");
    }

    pub fn outbound_send_failed(user_id: &str, error: &str) {
        tracing::error!(user_id = %user_id, error = %error, event = "outbound_send_failed", "outbound WhatsApp send failed");
    }
}
