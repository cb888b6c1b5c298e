use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use hearth::catalog::Catalog;
use hearth::config::ServerConfig;
use hearth::pool::{SubmitError, WorkItem, WorkerPool};
use hearth::server::ControlFlags;
use hearth::transport::Transport;
use tokio::net::{TcpListener, TcpStream};
use tokio::time::sleep;

fn pool_config(workers: usize, queue: usize, read_timeout_secs: u64) -> Arc<ServerConfig> {
    Arc::new(ServerConfig {
        webroot: PathBuf::from("/nonexistent"),
        http_port: 0,
        https_port: 0,
        thread_pool_size: workers,
        max_queue_size: queue,
        read_timeout: Duration::from_secs(read_timeout_secs),
        log_file: None,
    })
}

/// A real connected socket pair; the returned client keeps the worker's
/// transport open until dropped.
async fn connection() -> (TcpStream, WorkItem) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let client = TcpStream::connect(addr).await.unwrap();
    let (server, peer) = listener.accept().await.unwrap();
    let item = WorkItem {
        transport: Transport::Plain(server),
        peer,
        catalog: Arc::new(Catalog::default()),
    };
    (client, item)
}

#[cfg(test)]
mod pool_lifecycle_tests {
    use super::*;

    #[tokio::test]
    async fn test_zero_workers_is_an_error() {
        let flags = Arc::new(ControlFlags::default());
        assert!(WorkerPool::new(pool_config(0, 10, 1), flags).is_err());
    }

    #[tokio::test]
    async fn test_completes_each_submitted_item() {
        let flags = Arc::new(ControlFlags::default());
        let pool = WorkerPool::new(pool_config(2, 8, 1), flags).unwrap();

        for _ in 0..5 {
            let (client, item) = connection().await;
            // Closing the client makes the connection finish immediately.
            drop(client);
            pool.try_submit(item).unwrap();
        }

        pool.wait_idle().await;
        assert_eq!(pool.stats().completed, 5);
        assert_eq!(pool.queue_len(), 0);
        pool.destroy().await;
    }

    #[tokio::test]
    async fn test_wait_idle_returns_immediately_when_nothing_queued() {
        let flags = Arc::new(ControlFlags::default());
        let pool = WorkerPool::new(pool_config(2, 8, 1), flags).unwrap();
        pool.wait_idle().await;
        assert_eq!(pool.stats().completed, 0);
        pool.destroy().await;
    }

    #[tokio::test]
    async fn test_destroy_drains_already_queued_items() {
        let flags = Arc::new(ControlFlags::default());
        let pool = WorkerPool::new(pool_config(1, 8, 5), flags).unwrap();

        // Occupy the single worker with a connection that stays open.
        let (busy_client, busy_item) = connection().await;
        pool.try_submit(busy_item).unwrap();
        while pool.queue_len() > 0 {
            sleep(Duration::from_millis(5)).await;
        }

        for _ in 0..3 {
            let (client, item) = connection().await;
            drop(client);
            pool.try_submit(item).unwrap();
        }
        assert_eq!(pool.queue_len(), 3);

        pool.shutdown();
        drop(busy_client);
        let stats = pool.destroy().await;
        assert_eq!(stats.completed, 4);
        assert_eq!(stats.rejected, 0);
    }
}

#[cfg(test)]
mod backpressure_tests {
    use super::*;

    #[tokio::test]
    async fn test_full_queue_rejects_and_counts() {
        let flags = Arc::new(ControlFlags::default());
        let pool = WorkerPool::new(pool_config(1, 2, 5), flags).unwrap();

        // Keep the only worker busy.
        let (busy_client, busy_item) = connection().await;
        pool.try_submit(busy_item).unwrap();
        while pool.queue_len() > 0 {
            sleep(Duration::from_millis(5)).await;
        }

        // Fill the queue to capacity.
        let (filler_a, item_a) = connection().await;
        let (filler_b, item_b) = connection().await;
        pool.try_submit(item_a).unwrap();
        pool.try_submit(item_b).unwrap();
        assert_eq!(pool.queue_len(), 2);

        // One over: rejected, counted, queue never exceeds its bound.
        let (overflow_client, overflow_item) = connection().await;
        assert_eq!(pool.try_submit(overflow_item), Err(SubmitError::QueueFull));
        assert_eq!(pool.queue_len(), 2);
        assert_eq!(pool.stats().rejected, 1);

        drop(busy_client);
        drop(filler_a);
        drop(filler_b);
        drop(overflow_client);
        let stats = pool.destroy().await;
        assert_eq!(stats.completed, 3);
        assert_eq!(stats.rejected, 1);
    }

    #[tokio::test]
    async fn test_submit_after_shutdown_is_rejected() {
        let flags = Arc::new(ControlFlags::default());
        let pool = WorkerPool::new(pool_config(1, 4, 1), flags).unwrap();
        pool.shutdown();
        let (_client, item) = connection().await;
        assert_eq!(pool.try_submit(item), Err(SubmitError::ShuttingDown));
        let stats = pool.destroy().await;
        assert_eq!(stats.completed, 0);
    }
}
