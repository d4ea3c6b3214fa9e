use std::sync::Arc;

use async_trait::async_trait;
use tracing::{error, info};
use wa_case::{CaseHandler, CaseProcessor, CaseResult};
use wa_core::MediaContent;
use wa_queue::QueueStore;
use wa_storage::{LockConfig, ObjectStore};
use wa_whatsapp::{InboundMessage, WhatsAppClient};
use wa_worker::worker::WorkerDeps;
use wa_worker::WorkerConfig;

/// Placeholder for the concrete business logic a real deployment supplies.
/// `wa-case` ships no default `CaseProcessor` on purpose (see its own
/// docs); this one never decides a response is needed, so the response
/// step never fires. Wire in a real processor (LLM-backed or otherwise)
/// before running this binary against live traffic.
struct NoopCaseProcessor;

#[async_trait]
impl CaseProcessor for NoopCaseProcessor {
    async fn process_message(
        &self,
        _handler: &mut CaseHandler,
        _message: &InboundMessage,
        _media_content: Option<MediaContent>,
    ) -> CaseResult<bool> {
        Ok(false)
    }

    async fn generate_response(&self, _handler: &mut CaseHandler, _max_tokens: Option<u64>) -> CaseResult<bool> {
        Ok(false)
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = match WorkerConfig::from_env() {
        Ok(config) => match config.validate() {
            Ok(()) => config,
            Err(e) => {
                eprintln!("Configuration validation failed: {e}");
                std::process::exit(1);
            }
        },
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = wa_worker::logging::init_logging(&config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    wa_worker::logging::events::worker_starting(env!("CARGO_PKG_VERSION"));

    let store = match ObjectStore::connect(&config.bucket).await {
        Ok(store) => store,
        Err(e) => {
            error!("Failed to connect to object store: {e}");
            std::process::exit(1);
        }
    };

    let queue = match QueueStore::connect(&config.queue_database_url).await {
        Ok(queue) => queue,
        Err(e) => {
            error!("Failed to connect to queue database: {e}");
            std::process::exit(1);
        }
    };

    let whatsapp = match WhatsAppClient::new(config.whatsapp.clone()) {
        Ok(client) => Arc::new(client),
        Err(e) => {
            error!("Failed to build WhatsApp client: {e}");
            std::process::exit(1);
        }
    };

    let deps = WorkerDeps {
        store,
        whatsapp,
        queue,
        processor: Arc::new(NoopCaseProcessor),
        lock_config: LockConfig::default(),
    };

    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(());
    let worker_task = tokio::spawn(wa_worker::run(deps, config, shutdown_rx));

    info!("wa-worker ready");
    shutdown_signal().await;
    info!("shutdown signal received, stopping worker loop");

    let _ = shutdown_tx.send(());
    match worker_task.await {
        Ok(Ok(())) => info!("worker loop shut down cleanly"),
        Ok(Err(e)) => error!("worker loop exited with error: {e}"),
        Err(e) => error!("failed to join worker task: {e}"),
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c().await.expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
