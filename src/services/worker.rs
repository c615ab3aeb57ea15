use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::models::job::QueuedJob;
use crate::services::processor::JobProcessor;
use crate::services::queue::JobReceiver;

/// The single background consumer of the job queue.
///
/// Jobs are processed one at a time in submission order. Shutdown is only
/// observed between jobs, so a job that has started always reaches a
/// terminal state.
pub struct Worker {
    receiver: JobReceiver,
    processor: JobProcessor,
    shutdown: CancellationToken,
}

impl Worker {
    pub fn new(receiver: JobReceiver, processor: JobProcessor, shutdown: CancellationToken) -> Self {
        Self {
            receiver,
            processor,
            shutdown,
        }
    }

    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(self.run())
    }

    pub async fn run(mut self) {
        tracing::info!("Background worker started, waiting for jobs");

        loop {
            let queued = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => {
                    tracing::info!("Shutdown requested, stopping worker");
                    break;
                }
                next = self.receiver.dequeue() => match next {
                    Some(queued) => queued,
                    None => {
                        tracing::info!("Job queue closed, stopping worker");
                        break;
                    }
                },
            };

            self.handle(queued).await;
        }
    }

    async fn handle(&self, queued: QueuedJob) {
        let QueuedJob { job_id, job } = queued;

        let outcome = AssertUnwindSafe(self.processor.process(job_id, &job))
            .catch_unwind()
            .await;

        if let Err(panic) = outcome {
            let message = panic_message(panic.as_ref());
            tracing::error!(job_id = %job_id, panic = %message, "Job processing panicked");
            metrics::counter!("product_counter_jobs_failed_total").increment(1);

            let error = format!("job processing panicked: {message}");
            if let Err(e) = self.processor.store().fail(job_id, error).await {
                tracing::warn!(job_id = %job_id, error = %e, "Could not record panicked job");
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
