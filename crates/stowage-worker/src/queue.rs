//! Bounded job queue: a dispatcher task, a worker semaphore and a drain-on-shutdown.
//!
//! Submission never blocks. When the channel is full the job is refused and the caller
//! decides what to log. [`BackgroundQueue::shutdown`] stops intake, lets queued jobs run and
//! waits until the last in-flight job has finished.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use stowage_core::UploadConfig;
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinHandle;

pub type Job = Pin<Box<dyn Future<Output = anyhow::Result<()>> + Send + 'static>>;

#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    #[error("Background queue is full, dropping job {name}")]
    Full { name: String },

    #[error("Background queue is shut down, dropping job {name}")]
    Closed { name: String },
}

#[derive(Debug, Clone)]
pub struct BackgroundQueueConfig {
    pub max_workers: usize,
    /// Jobs buffered before submission is refused
    pub capacity: usize,
}

impl Default for BackgroundQueueConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            capacity: 256,
        }
    }
}

impl BackgroundQueueConfig {
    pub fn from_config(config: &UploadConfig) -> Self {
        Self {
            max_workers: config.background_max_workers,
            capacity: config.background_queue_capacity,
        }
    }
}

struct QueuedJob {
    name: String,
    job: Job,
}

pub struct BackgroundQueue {
    sender: Mutex<Option<mpsc::Sender<QueuedJob>>>,
    dispatcher: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundQueue {
    /// Spawn the dispatcher on the current runtime.
    pub fn start(config: BackgroundQueueConfig) -> Self {
        let max_workers = config.max_workers.max(1);
        let (sender, receiver) = mpsc::channel(config.capacity.max(1));

        let dispatcher = tokio::spawn(Self::dispatch(receiver, max_workers));

        tracing::info!(
            max_workers = max_workers,
            capacity = config.capacity,
            "Background queue started"
        );

        Self {
            sender: Mutex::new(Some(sender)),
            dispatcher: Mutex::new(Some(dispatcher)),
        }
    }

    /// Queue a job without waiting for room.
    pub fn submit<F>(&self, name: impl Into<String>, job: F) -> Result<(), QueueError>
    where
        F: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        let name = name.into();
        let sender = match self.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(_) => None,
        };
        let Some(sender) = sender else {
            return Err(QueueError::Closed { name });
        };

        sender
            .try_send(QueuedJob {
                name,
                job: Box::pin(job),
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(queued) => QueueError::Full { name: queued.name },
                mpsc::error::TrySendError::Closed(queued) => QueueError::Closed { name: queued.name },
            })
    }

    pub fn is_running(&self) -> bool {
        self.sender
            .lock()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Stop accepting jobs and wait for everything already queued to finish.
    ///
    /// Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if let Ok(mut guard) = self.sender.lock() {
            guard.take();
        }

        let dispatcher = match self.dispatcher.lock() {
            Ok(mut guard) => guard.take(),
            Err(_) => None,
        };

        if let Some(handle) = dispatcher {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Background queue dispatcher failed");
            }
            tracing::info!("Background queue drained");
        }
    }

    async fn dispatch(mut receiver: mpsc::Receiver<QueuedJob>, max_workers: usize) {
        let workers = Arc::new(Semaphore::new(max_workers));

        while let Some(queued) = receiver.recv().await {
            let permit = match workers.clone().acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            tokio::spawn(async move {
                let _permit = permit;
                Self::run(queued).await;
            });
        }

        // Every permit back means no job is still running.
        let _ = workers.acquire_many(max_workers as u32).await;
    }

    async fn run(queued: QueuedJob) {
        let QueuedJob { name, job } = queued;
        let start = Instant::now();

        match job.await {
            Ok(()) => tracing::debug!(
                job = %name,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Background job finished"
            ),
            Err(e) => tracing::error!(
                job = %name,
                error = %e,
                duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                "Background job failed"
            ),
        }
    }
}
