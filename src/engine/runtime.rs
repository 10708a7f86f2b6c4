//! Engine dispatch runtime.
//!
//! Engine calls can be slow. The dispatcher runs them on a small, bounded
//! pool of worker threads so a session only ever waits on a reply channel,
//! with a timeout it chooses.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender, TrySendError};
use uuid::Uuid;

use crate::config::DispatcherConfig;
use crate::engine::{AnalysisResult, InferenceEngine};
use crate::error::{DispatchError, EngineError, PanelError, PanelResult};
use crate::request::RequestEnvelope;

type EngineReply = Result<AnalysisResult, EngineError>;

enum Job {
    Run {
        envelope: RequestEnvelope,
        reply: Sender<EngineReply>,
    },
}

/// Handle returned by [`EngineDispatcher::submit`].
pub struct ExecutionHandle {
    request_id: Uuid,
    rx: Receiver<EngineReply>,
}

impl ExecutionHandle {
    /// Id of the envelope this handle waits on.
    #[must_use]
    pub const fn request_id(&self) -> Uuid {
        self.request_id
    }

    /// Waits for the engine to finish.
    pub fn join(self) -> PanelResult<AnalysisResult> {
        let reply = self.rx.recv().map_err(|_| DispatchError::Disconnected)?;
        Ok(reply?)
    }

    /// Waits for the engine with a timeout.
    ///
    /// On timeout the call keeps running on its worker; its reply is dropped.
    pub fn join_timeout(self, timeout: Duration) -> PanelResult<AnalysisResult> {
        let reply = self.rx.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => DispatchError::Timeout {
                duration_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
            },
            RecvTimeoutError::Disconnected => DispatchError::Disconnected,
        })?;
        Ok(reply?)
    }
}

/// Bounded worker pool in front of an [`InferenceEngine`].
pub struct EngineDispatcher {
    tx: Option<Sender<Job>>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
    timeout: Duration,
}

impl EngineDispatcher {
    /// Starts the workers.
    ///
    /// # Errors
    /// `PanelError::Internal` if a worker thread cannot be spawned.
    pub fn start(config: &DispatcherConfig, engine: Arc<dyn InferenceEngine>) -> PanelResult<Self> {
        let workers = config.workers.max(1);
        let queue_capacity = config.queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let engine = Arc::clone(&engine);
            let handle = thread::Builder::new()
                .name(format!("probpanel-engine-{idx}"))
                .spawn(move || {
                    while let Ok(Job::Run { envelope, reply }) = rx.recv() {
                        let span = tracing::debug_span!(
                            "engine_call",
                            request_id = %envelope.request_id,
                            catalogue = %envelope.catalogue_id,
                            action = %envelope.request.action(),
                        );
                        let _entered = span.enter();
                        let result = engine.run(&envelope.request);
                        if let Err(err) = &result {
                            tracing::debug!(error = %err, "engine call failed");
                        }
                        let _ = reply.send(result);
                    }
                })
                .map_err(|e| PanelError::internal(format!("failed to spawn engine worker: {e}")))?;
            handles.push(handle);
        }

        tracing::info!(workers, queue_capacity, "engine dispatcher started");
        Ok(Self {
            tx: Some(tx),
            workers: handles,
            queue_capacity,
            timeout: config.timeout(),
        })
    }

    /// Queues an envelope without blocking.
    ///
    /// # Errors
    /// `QueueFull` when the queue is at capacity, `Disconnected` after shutdown.
    pub fn submit(&self, envelope: RequestEnvelope) -> Result<ExecutionHandle, DispatchError> {
        let tx = self.tx.as_ref().ok_or(DispatchError::Disconnected)?;
        let (reply, rx) = bounded::<EngineReply>(1);
        let request_id = envelope.request_id;
        match tx.try_send(Job::Run { envelope, reply }) {
            Ok(()) => Ok(ExecutionHandle { request_id, rx }),
            Err(TrySendError::Full(_)) => Err(DispatchError::QueueFull {
                capacity: self.queue_capacity,
            }),
            Err(TrySendError::Disconnected(_)) => Err(DispatchError::Disconnected),
        }
    }

    /// Runs an envelope and waits up to the configured timeout.
    pub fn run(&self, envelope: RequestEnvelope) -> PanelResult<AnalysisResult> {
        self.submit(envelope)?.join_timeout(self.timeout)
    }

    /// Configured wait for [`run`](Self::run).
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl Drop for EngineDispatcher {
    fn drop(&mut self) {
        // Closing the channel lets workers drain queued jobs and exit.
        self.tx.take();
        for handle in self.workers.drain(..) {
            let _ = handle.join();
        }
    }
}
