//! Allocation worker pool.
//!
//! A fixed set of named OS threads pulls jobs off one bounded queue. Each job
//! carries its own one-shot reply channel, so every request gets exactly one
//! answer: the allocation, the algorithm's error, or a dispatch failure.
//! Panics inside the algorithm are caught per job and the worker carries on.
//!
//! The async side never runs the algorithm itself; it only sends a job and
//! awaits the reply.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Instant;

use num_bigint::BigUint;
use parking_lot::Mutex;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use qf_core::aggregate::AggregatedContributions;
use qf_core::traits::AllocationAlgorithm;
use qf_core::types::{Allocation, AllocationOptions};

use crate::config::DispatcherConfig;
use crate::error::DispatchError;

/// Input for one allocation run.
#[derive(Debug, Clone)]
pub struct AllocationRequest {
    pub contributions: Arc<AggregatedContributions>,
    pub match_pool: BigUint,
    pub options: AllocationOptions,
}

type Reply = Result<Allocation, DispatchError>;

struct Job {
    request: AllocationRequest,
    reply: oneshot::Sender<Reply>,
}

pub struct AllocationDispatcher {
    sender: Mutex<Option<mpsc::Sender<Job>>>,
    workers: Mutex<Vec<JoinHandle<()>>>,
}

impl AllocationDispatcher {
    /// Spawn `config.workers` threads running `algorithm`.
    pub fn new(
        algorithm: Arc<dyn AllocationAlgorithm>,
        config: &DispatcherConfig,
    ) -> Result<Self, DispatchError> {
        let workers = config.workers.max(1);
        let (sender, receiver) = mpsc::channel(config.queue_capacity.max(1));
        let queue = Arc::new(Mutex::new(receiver));

        let mut handles = Vec::with_capacity(workers);
        for id in 0..workers {
            let algorithm = algorithm.clone();
            let queue = queue.clone();
            let handle = std::thread::Builder::new()
                .name(format!("qf-alloc-{id}"))
                .spawn(move || worker_loop(id, algorithm, queue))
                .map_err(|e| DispatchError::Spawn(e.to_string()))?;
            handles.push(handle);
        }

        info!(
            workers,
            queue_capacity = config.queue_capacity,
            "dispatcher: worker pool started"
        );

        Ok(Self {
            sender: Mutex::new(Some(sender)),
            workers: Mutex::new(handles),
        })
    }

    /// Queue `request` and wait for its reply. Waits for queue space when all
    /// workers are busy and the queue is full.
    pub async fn dispatch(&self, request: AllocationRequest) -> Result<Allocation, DispatchError> {
        let sender = self.sender.lock().clone().ok_or(DispatchError::PoolClosed)?;
        let (reply, rx) = oneshot::channel();
        sender
            .send(Job { request, reply })
            .await
            .map_err(|_| DispatchError::PoolClosed)?;
        await_reply(rx).await
    }

    /// Close the queue and join every worker. Jobs already queued still run.
    /// Blocks the calling thread until the workers have exited.
    pub fn shutdown(&self) {
        drop(self.sender.lock().take());
        let handles: Vec<_> = self.workers.lock().drain(..).collect();
        for handle in handles {
            if handle.join().is_err() {
                warn!("dispatcher: worker thread exited abnormally");
            }
        }
        info!("dispatcher: worker pool stopped");
    }

    pub fn is_closed(&self) -> bool {
        self.sender.lock().is_none()
    }
}

async fn await_reply(rx: oneshot::Receiver<Reply>) -> Reply {
    rx.await.map_err(|_| DispatchError::WorkerTerminated)?
}

fn worker_loop(
    id: usize,
    algorithm: Arc<dyn AllocationAlgorithm>,
    queue: Arc<Mutex<mpsc::Receiver<Job>>>,
) {
    debug!(worker = id, "dispatcher: worker started");
    loop {
        // Only one idle worker waits on the channel; the rest wait on the lock.
        let job = queue.lock().blocking_recv();
        let Some(Job { request, reply }) = job else {
            break;
        };

        let started = Instant::now();
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            algorithm.compute(&request.contributions, &request.match_pool, &request.options)
        }));

        let result = match outcome {
            Ok(Ok(allocation)) => {
                debug!(
                    worker = id,
                    projects = allocation.len(),
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "dispatcher: allocation computed"
                );
                Ok(allocation)
            }
            Ok(Err(e)) => {
                warn!(worker = id, error = %e, "dispatcher: allocation failed");
                Err(DispatchError::Allocation(e))
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(worker = id, %message, "dispatcher: allocation panicked");
                Err(DispatchError::WorkerPanicked(message))
            }
        };

        if reply.send(result).is_err() {
            debug!(worker = id, "dispatcher: requester dropped before reply");
        }
    }
    debug!(worker = id, "dispatcher: queue closed, worker exiting");
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
