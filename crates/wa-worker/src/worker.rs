//! The cooperative polling loop (C8): drains the durable ingestion queue,
//! resolves each inbound message to its case, defers to the injected
//! [`CaseProcessor`] for what to do with it, and coalesces response
//! generation into a due-time map so that several quick messages from the
//! same contact produce one reply instead of several.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};

use wa_case::{CaseHandler, CaseProcessor, Contact};
use wa_core::{CoreError, InteractiveChoice, MediaContent};
use wa_queue::{ClaimedJob, QueueStore};
use wa_storage::{acquire_user_lock, CaseStorage, LockConfig, ObjectStore};
use wa_whatsapp::{InboundMessage, Media, WebhookPayload, WhatsAppClient};

use crate::config::WorkerConfig;
use crate::error::WorkerResult;
use crate::logging::events;

/// A (operator, user) pair whose case has pending unanswered messages.
/// Re-inserting the same key pushes the due time forward, so a burst of
/// inbound messages from one contact only ever triggers one response pass.
type JobDue = HashMap<(String, String), DateTime<Utc>>;

/// A safety cap on `CaseProcessor::generate_response` rounds per due
/// response, so a processor stuck returning `true` (e.g. a broken tool-call
/// loop) can't wedge the worker on one contact forever.
const MAX_RESPONSE_ROUNDS: u32 = 8;

/// Everything the loop needs beyond what it reads from `WorkerConfig`.
/// `processor` is the polymorphic hook spec.md §9 calls for: this crate
/// drives the lifecycle, the processor decides what a message means.
pub struct WorkerDeps {
    pub store: ObjectStore,
    pub whatsapp: Arc<WhatsAppClient>,
    pub queue: QueueStore,
    pub processor: Arc<dyn CaseProcessor>,
    pub lock_config: LockConfig,
}

/// Runs the ingestion/response loop until `shutdown` fires. Each iteration:
/// claim and fully process at most one queued job, then process any
/// response due so far, then sleep for `poll_interval_busy` if a job was
/// claimed this round or `poll_interval_idle` otherwise.
///
/// spec.md §4.8 step 4 ("trigger garbage collection") has no equivalent in
/// a non-GC runtime; this loop has no step for it, by design — see
/// DESIGN.md.
pub async fn run(deps: WorkerDeps, config: WorkerConfig, mut shutdown: tokio::sync::watch::Receiver<()>) -> WorkerResult<()> {
    let mut job_due: JobDue = HashMap::new();
    events::worker_ready();

    loop {
        if shutdown.has_changed().unwrap_or(true) {
            break;
        }

        let claimed = ingestion_step(&deps, &mut job_due, config.response_delay).await?;
        response_step(&deps, &mut job_due).await;

        let sleep_for = if claimed { config.poll_interval_busy } else { config.poll_interval_idle };
        tokio::select! {
            _ = tokio::time::sleep(sleep_for) => {}
            _ = shutdown.changed() => break,
        }
    }

    events::worker_stopping("shutdown signal received");
    Ok(())
}

/// Claims at most one job and processes it end to end, marking it done or
/// error on the queue. Returns whether a job was claimed at all, which
/// decides the busy/idle sleep interval for the next iteration.
async fn ingestion_step(deps: &WorkerDeps, job_due: &mut JobDue, response_delay: Duration) -> WorkerResult<bool> {
    let Some(job) = deps.queue.claim_next().await? else {
        return Ok(false);
    };
    events::job_claimed(job.row_id);

    match process_claimed_job(deps, &job, job_due, response_delay).await {
        Ok(()) => {
            deps.queue.mark_done(job.row_id).await?;
            events::job_done(job.row_id);
        }
        Err(err) => {
            events::job_failed(job.row_id, &err.to_string());
            deps.queue.mark_error(job.row_id, err.to_string()).await?;
        }
    }
    Ok(true)
}

async fn process_claimed_job(deps: &WorkerDeps, job: &ClaimedJob, job_due: &mut JobDue, response_delay: Duration) -> WorkerResult<()> {
    let payload: WebhookPayload = serde_json::from_value(job.payload.clone()).map_err(CoreError::Serialization)?;

    for entry in &payload.entry {
        for change in &entry.changes {
            let operator_id = change.value.metadata.phone_number_id.clone();
            let Some(messages) = &change.value.messages else { continue };

            let profile_name = |wa_id: &str| -> Option<String> {
                change.value.contacts.as_ref()?.iter().find(|c| c.wa_id == wa_id)?.profile_name.clone()
            };

            for message in messages {
                let user_id = message.from.clone();
                let needs_response = process_inbound_message(deps, &operator_id, &user_id, message, profile_name(&user_id)).await?;
                if needs_response {
                    let due = Utc::now() + chrono::Duration::from_std(response_delay).unwrap_or_default();
                    job_due.insert((operator_id.clone(), user_id.clone()), due);
                    let due_in_ms = response_delay.as_millis() as i64;
                    events::response_scheduled(&operator_id, &user_id, due_in_ms);
                }
            }
        }
    }
    Ok(())
}

async fn process_inbound_message(
    deps: &WorkerDeps,
    operator_id: &str,
    user_id: &str,
    message: &InboundMessage,
    profile_name: Option<String>,
) -> WorkerResult<bool> {
    let user_prefix = format!("{operator_id}/{user_id}");
    let _lock = match acquire_user_lock(&deps.store, &user_prefix, "wa-worker", &deps.lock_config).await {
        Ok(guard) => guard,
        Err(err) => {
            if matches!(err, CoreError::LockTimeout(_)) {
                events::lock_timeout(&user_prefix);
            }
            return Err(err.into());
        }
    };
    events::lock_acquired(&user_prefix);

    let storage = CaseStorage::new(deps.store.clone(), operator_id, user_id);
    let contact = Contact { phone: user_id.to_string(), profile_name };
    let mut handler = CaseHandler::new(storage, deps.whatsapp.clone(), operator_id, user_id, contact);

    handler.case_decide().await?;
    handler.user_data_lookup().await?;
    handler.context_build(None).await?;

    let media_content = fetch_inline_media(&deps.whatsapp, message).await?;

    if let Some(choice) = interactive_choice(message) {
        handler.ingest_interactive_reply(&message.id, &message.timestamp, choice).await?;
    } else {
        handler.dedup_and_ingest_message(message, media_content.clone()).await?;
    }

    Ok(deps.processor.process_message(&mut handler, message, media_content).await?)
}

/// Runs every (operator, user) whose due time has passed through
/// `CaseProcessor::generate_response`, removing each from `job_due` before
/// processing so a slow or failing generation never blocks new inbound
/// messages from accumulating another due entry behind it.
async fn response_step(deps: &WorkerDeps, job_due: &mut JobDue) {
    let now = Utc::now();
    let due: Vec<(String, String)> = job_due.iter().filter(|(_, due)| **due <= now).map(|(key, _)| key.clone()).collect();

    for (operator_id, user_id) in due {
        job_due.remove(&(operator_id.clone(), user_id.clone()));
        if let Err(err) = generate_response_for(deps, &operator_id, &user_id).await {
            events::response_generation_failed(&operator_id, &user_id, &err.to_string());
        }
    }
}

async fn generate_response_for(deps: &WorkerDeps, operator_id: &str, user_id: &str) -> WorkerResult<()> {
    let user_prefix = format!("{operator_id}/{user_id}");
    let _lock = acquire_user_lock(&deps.store, &user_prefix, "wa-worker", &deps.lock_config).await?;
    events::lock_acquired(&user_prefix);

    let storage = CaseStorage::new(deps.store.clone(), operator_id, user_id);
    let contact = Contact { phone: user_id.to_string(), profile_name: None };
    let mut handler = CaseHandler::new(storage, deps.whatsapp.clone(), operator_id, user_id, contact);
    handler.case_decide().await?;
    handler.context_build(None).await?;

    let mut rounds = 0;
    while rounds < MAX_RESPONSE_ROUNDS {
        let again = deps.processor.generate_response(&mut handler, None).await?;
        if !again {
            break;
        }
        rounds += 1;
    }
    Ok(())
}

fn message_media(message: &InboundMessage) -> Option<&Media> {
    message
        .image
        .as_ref()
        .or(message.document.as_ref())
        .or(message.audio.as_ref())
        .or(message.video.as_ref())
        .or(message.sticker.as_ref())
}

async fn fetch_inline_media(whatsapp: &WhatsAppClient, message: &InboundMessage) -> WorkerResult<Option<MediaContent>> {
    let Some(media) = message_media(message) else { return Ok(None) };
    let Some(media_id) = &media.id else { return Ok(None) };

    let info = whatsapp.get_media_info(media_id).await?;
    let bytes = whatsapp.download_media(&info.url).await?;
    Ok(Some(MediaContent { mime: info.mime_type, content: bytes }))
}

fn interactive_choice(message: &InboundMessage) -> Option<InteractiveChoice> {
    let interactive = message.interactive.as_ref()?;
    if let Some(button_reply) = &interactive.button_reply {
        return Some(InteractiveChoice { id: button_reply.id.clone(), title: button_reply.title.clone() });
    }
    if let Some(list_reply) = &interactive.list_reply {
        return Some(InteractiveChoice { id: list_reply.id.clone(), title: list_reply.title.clone() });
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use wa_whatsapp::{InboundButtonReply, InboundInteractiveMessage};

    fn base_message() -> InboundMessage {
        InboundMessage {
            id: "wamid.1".to_string(),
            from: "15550001111".to_string(),
            timestamp: "1700000000".to_string(),
            message_type: "text".to_string(),
            context: None,
            text: None,
            image: None,
            document: None,
            audio: None,
            video: None,
            location: None,
            contacts: None,
            button: None,
            interactive: None,
            sticker: None,
            reaction: None,
            errors: None,
        }
    }

    #[test]
    fn message_media_prefers_image_over_other_kinds() {
        let mut message = base_message();
        message.image = Some(Media { id: Some("img1".to_string()), link: None, caption: None, filename: None, mime_type: Some("image/jpeg".to_string()), sha256: None, voice: None, animated: None });
        message.document = Some(Media { id: Some("doc1".to_string()), link: None, caption: None, filename: None, mime_type: None, sha256: None, voice: None, animated: None });
        assert_eq!(message_media(&message).unwrap().id.as_deref(), Some("img1"));
    }

    #[test]
    fn interactive_choice_reads_button_reply() {
        let mut message = base_message();
        message.interactive = Some(InboundInteractiveMessage {
            interactive_type: "button_reply".to_string(),
            button_reply: Some(InboundButtonReply { id: "opt_1".to_string(), title: "Yes".to_string() }),
            list_reply: None,
        });
        let choice = interactive_choice(&message).unwrap();
        assert_eq!(choice.id, "opt_1");
        assert_eq!(choice.title, "Yes");
    }

    #[test]
    fn interactive_choice_is_none_for_plain_text() {
        assert!(interactive_choice(&base_message()).is_none());
    }
}
