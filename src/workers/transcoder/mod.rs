pub mod pipeline;

use futures_util::StreamExt;
use lapin::message::Delivery;
use lapin::options::{BasicAckOptions, BasicNackOptions};
use std::pin::pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tracing::{Instrument, error, info, info_span, warn};
use uuid::Uuid;

use crate::infrastructure::queue::rabbitmq::{RabbitMqService, WorkQueue};
use crate::media::error::JobError;
use crate::modules::video::events::TranscodeJob;
use crate::state::AppState;
use pipeline::{JobSummary, process_job};

const RECONNECT_DELAY: Duration = Duration::from_secs(5);

pub async fn start_transcoder_worker(state: AppState, queue: RabbitMqService) -> anyhow::Result<()> {
    info!("🎥 Starting Transcoder Worker...");

    let concurrency = state.config.worker_concurrency.max(1);
    let work_queue = WorkQueue {
        name: state.config.queue_name.clone(),
        dead_letter: state.config.dead_letter_queue(),
        lock_duration: state.config.lock_duration(),
        prefetch: u16::try_from(concurrency).unwrap_or(u16::MAX),
    };
    let slots = Arc::new(Semaphore::new(concurrency));
    let consumer_tag = format!("transcoder-{}", Uuid::new_v4());
    let mut shutdown = pin!(tokio::signal::ctrl_c());

    loop {
        let mut consumer = queue.consume(&work_queue, &consumer_tag).await?;
        info!(
            concurrency,
            "🎥 Transcoder Worker listening on '{}'", work_queue.name
        );

        let stream_lost = loop {
            tokio::select! {
                _ = &mut shutdown => break false,
                next = consumer.next() => match next {
                    Some(Ok(delivery)) => {
                        let permit = slots.clone().acquire_owned().await?;
                        let state = state.clone();
                        tokio::spawn(async move {
                            handle_delivery(&state, delivery).await;
                            drop(permit);
                        });
                    }
                    Some(Err(e)) => {
                        error!("Consumer error: {}", e);
                        break true;
                    }
                    None => break true,
                },
            }
        };

        if !stream_lost {
            break;
        }

        tokio::time::sleep(RECONNECT_DELAY).await;
        queue.reconnect().await?;
    }

    info!("🛑 Shutdown requested, waiting for in-flight jobs...");
    let _drained = slots.acquire_many(concurrency as u32).await?;
    info!("👋 Transcoder Worker stopped");
    Ok(())
}

async fn handle_delivery(state: &AppState, delivery: Delivery) {
    info!("📦 Received transcoding job");

    let job = match serde_json::from_slice::<TranscodeJob>(&delivery.data) {
        Ok(job) => job,
        Err(e) => {
            error!("❌ Failed to parse job: {}", e);
            reject(&delivery).await;
            return;
        }
    };

    let span = info_span!("job", video_id = %job.id, owner_id = %job.data.user_id);
    match run_job(state, &job).instrument(span.clone()).await {
        Ok(summary) => {
            span.in_scope(|| info!(?summary, "✅ Job completed successfully"));
            if let Err(e) = delivery.ack(BasicAckOptions::default()).await {
                error!(video_id = %job.id, "Failed to ack message: {}", e);
            }
        }
        Err(e) => {
            span.in_scope(|| error!("❌ Failed to process job: {}", e));
            reject(&delivery).await;
        }
    }
}

/// Signs the source, runs the pipeline, and marks the record FAILED when
/// the job cannot finish.
pub async fn run_job(state: &AppState, job: &TranscodeJob) -> Result<JobSummary, JobError> {
    let result = sign_and_process(state, job).await;

    if result.is_err() {
        if let Err(e) = state.videos.mark_failed(job.video_id()).await {
            warn!("Failed to mark video as failed: {}", e);
        }
    }

    result
}

async fn sign_and_process(state: &AppState, job: &TranscodeJob) -> Result<JobSummary, JobError> {
    if job.video_id().is_empty() || job.filename().is_empty() {
        return Err(JobError::InvalidJob("missing video id or filename".into()));
    }

    let source_url = state
        .storage
        .signed_download_url(job.filename(), state.config.signed_url_ttl())
        .await
        .map_err(|source| JobError::SignedUrl {
            filename: job.filename().to_string(),
            source,
        })?;

    process_job(state, job, &source_url).await
}

/// Dead-letters the delivery instead of requeueing it.
async fn reject(delivery: &Delivery) {
    let options = BasicNackOptions {
        requeue: false,
        ..BasicNackOptions::default()
    };
    if let Err(e) = delivery.nack(options).await {
        error!("Failed to reject message: {}", e);
    }
}
