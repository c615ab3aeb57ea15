use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

use crate::models::job::QueuedJob;

/// Create the in-memory job queue and its single consumer.
pub fn channel() -> (JobQueue, JobReceiver) {
    let (sender, receiver) = mpsc::unbounded_channel();
    let depth = Arc::new(AtomicUsize::new(0));
    (
        JobQueue {
            sender,
            depth: Arc::clone(&depth),
        },
        JobReceiver { receiver, depth },
    )
}

/// Producer side of the FIFO job queue.
#[derive(Clone)]
pub struct JobQueue {
    sender: UnboundedSender<QueuedJob>,
    depth: Arc<AtomicUsize>,
}

impl JobQueue {
    /// Enqueue a job. Never blocks; fails only once the worker is gone.
    pub fn enqueue(&self, job: QueuedJob) -> Result<(), QueueError> {
        let job_id = job.job_id;
        let depth = self.depth.fetch_add(1, Ordering::SeqCst) + 1;

        if self.sender.send(job).is_err() {
            self.depth.fetch_sub(1, Ordering::SeqCst);
            return Err(QueueError::Closed(job_id));
        }

        metrics::gauge!("product_counter_queue_depth").set(depth as f64);
        Ok(())
    }

    /// Jobs waiting to be picked up by the worker.
    pub fn depth(&self) -> usize {
        self.depth.load(Ordering::SeqCst)
    }
}

/// Consumer side of the job queue, owned by the worker.
pub struct JobReceiver {
    receiver: UnboundedReceiver<QueuedJob>,
    depth: Arc<AtomicUsize>,
}

impl JobReceiver {
    /// Wait for the oldest pending job. `None` once every producer is dropped.
    pub async fn dequeue(&mut self) -> Option<QueuedJob> {
        let job = self.receiver.recv().await?;
        let depth = self.depth.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::gauge!("product_counter_queue_depth").set(depth as f64);
        Some(job)
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum QueueError {
    #[error("Job queue is closed, job {0} was not enqueued")]
    Closed(Uuid),
}
