use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::pipeline;
use crate::server::ControlFlags;
use crate::transport::Transport;

/// One accepted connection. Owned by the queue while queued, by exactly one
/// worker once dequeued, and dropped on worker return.
pub struct WorkItem {
    pub transport: Transport,
    pub peer: SocketAddr,
    /// Catalog snapshot pinned for the whole connection.
    pub catalog: Arc<Catalog>,
}

/// Why a submit was refused. Either way the caller closes the connection.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitError {
    QueueFull,
    ShuttingDown,
}

#[derive(Clone, Copy, Debug, Default)]
pub struct PoolStats {
    pub completed: u64,
    pub rejected: u64,
}

#[derive(Default)]
struct QueueState {
    items: VecDeque<WorkItem>,
    active_workers: usize,
    shutdown: bool,
    completed: u64,
    rejected: u64,
}

struct Shared {
    state: Mutex<QueueState>,
    /// Wakes one idle worker on submit, everyone on shutdown.
    work_available: Notify,
    /// Wakes `wait_idle` after each finished item.
    work_done: Notify,
    max_queue: usize,
}

/// Fixed set of workers draining a bounded FIFO queue.
///
/// The classic mutex-and-two-condvars pool: workers wait on
/// `work_available` until the queue is non-empty or shutdown is flagged,
/// finish their current item before exiting, and signal `work_done` so
/// `wait_idle` can prove quiescence.
pub struct WorkerPool {
    shared: Arc<Shared>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(
        config: Arc<ServerConfig>,
        flags: Arc<ControlFlags>,
    ) -> Result<WorkerPool, StartupError> {
        if config.thread_pool_size == 0 {
            return Err(StartupError::EmptyPool);
        }
        let shared = Arc::new(Shared {
            state: Mutex::new(QueueState::default()),
            work_available: Notify::new(),
            work_done: Notify::new(),
            max_queue: config.max_queue_size,
        });
        let workers = (0..config.thread_pool_size)
            .map(|worker| {
                let shared = Arc::clone(&shared);
                let config = Arc::clone(&config);
                let flags = Arc::clone(&flags);
                tokio::spawn(worker_loop(worker, shared, config, flags))
            })
            .collect();
        info!(workers = config.thread_pool_size, queue = config.max_queue_size, "worker pool started");
        Ok(WorkerPool { shared, workers })
    }

    /// Hand a connection to the pool. Fails fast when the queue is at
    /// capacity or the pool is draining; the rejected item is dropped,
    /// which closes its connection.
    pub fn try_submit(&self, item: WorkItem) -> Result<(), SubmitError> {
        {
            let mut state = self.shared.state.lock();
            if state.shutdown {
                return Err(SubmitError::ShuttingDown);
            }
            if state.items.len() >= self.shared.max_queue {
                state.rejected += 1;
                return Err(SubmitError::QueueFull);
            }
            state.items.push_back(item);
        }
        self.shared.work_available.notify_one();
        Ok(())
    }

    /// Block until the queue is empty and no worker is mid-connection.
    pub async fn wait_idle(&self) {
        loop {
            let done = self.shared.work_done.notified();
            tokio::pin!(done);
            done.as_mut().enable();
            {
                let state = self.shared.state.lock();
                if state.items.is_empty() && state.active_workers == 0 {
                    return;
                }
            }
            done.await;
        }
    }

    /// Flip the shutdown flag and wake every waiting worker. Workers drain
    /// what is already queued, then exit.
    pub fn shutdown(&self) {
        {
            self.shared.state.lock().shutdown = true;
        }
        self.shared.work_available.notify_waiters();
    }

    /// Shut down, join all workers, and report the final counters.
    pub async fn destroy(self) -> PoolStats {
        self.shutdown();
        let WorkerPool { shared, workers } = self;
        for worker in workers {
            let _ = worker.await;
        }
        let stats = {
            let state = shared.state.lock();
            PoolStats {
                completed: state.completed,
                rejected: state.rejected,
            }
        };
        info!(
            completed = stats.completed,
            rejected = stats.rejected,
            "worker pool destroyed"
        );
        stats
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.shared.state.lock();
        PoolStats {
            completed: state.completed,
            rejected: state.rejected,
        }
    }

    pub fn queue_len(&self) -> usize {
        self.shared.state.lock().items.len()
    }
}

async fn worker_loop(
    worker: usize,
    shared: Arc<Shared>,
    config: Arc<ServerConfig>,
    flags: Arc<ControlFlags>,
) {
    debug!(worker, "worker started");
    loop {
        // Arm the wakeup before checking the queue so a submit landing
        // between the check and the await is never lost.
        let wakeup = shared.work_available.notified();
        tokio::pin!(wakeup);
        wakeup.as_mut().enable();

        let item = {
            let mut state = shared.state.lock();
            if let Some(item) = state.items.pop_front() {
                state.active_workers += 1;
                Some(item)
            } else if state.shutdown {
                break;
            } else {
                None
            }
        };

        match item {
            Some(item) => {
                pipeline::serve(item, &config, &flags).await;
                {
                    let mut state = shared.state.lock();
                    state.active_workers -= 1;
                    state.completed += 1;
                }
                shared.work_done.notify_waiters();
            }
            None => wakeup.await,
        }
    }
    debug!(worker, "worker exited");
}
