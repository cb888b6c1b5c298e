use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpSocket, TcpStream};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::catalog::{Catalog, CatalogCell};
use crate::config::ServerConfig;
use crate::error::StartupError;
use crate::pool::{SubmitError, WorkItem, WorkerPool};
use crate::transport::{TlsGate, Transport};
use crate::BACKLOG;

/// Async flags the outside world flips: signals set them, the acceptor
/// samples them at least once per second.
#[derive(Debug, Default)]
pub struct ControlFlags {
    pub shutdown: AtomicBool,
    pub refresh_catalog: AtomicBool,
}

impl ControlFlags {
    pub fn request_shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    pub fn request_refresh(&self) {
        self.refresh_catalog.store(true, Ordering::Relaxed);
    }
}

/// Both listeners bound, TLS material verified, initial catalog built.
pub struct Server {
    config: Arc<ServerConfig>,
    http_listener: TcpListener,
    https_listener: TcpListener,
    tls: TlsGate,
    catalog_cell: Arc<CatalogCell>,
}

impl Server {
    /// Bring everything up. Every failure here is fatal and maps to a
    /// non-zero exit. Call from within a runtime.
    pub fn bind(config: ServerConfig) -> Result<Server, StartupError> {
        let catalog = Catalog::build(&config.webroot)?;
        let tls = TlsGate::load(&config.webroot)?;
        let http_listener = listen(config.http_port)?;
        let https_listener = listen(config.https_port)?;
        Ok(Server {
            config: Arc::new(config),
            http_listener,
            https_listener,
            tls,
            catalog_cell: Arc::new(CatalogCell::new(catalog)),
        })
    }

    pub fn http_addr(&self) -> std::io::Result<SocketAddr> {
        self.http_listener.local_addr()
    }

    pub fn https_addr(&self) -> std::io::Result<SocketAddr> {
        self.https_listener.local_addr()
    }

    pub fn catalog_cell(&self) -> Arc<CatalogCell> {
        Arc::clone(&self.catalog_cell)
    }

    /// Acceptor loop: multiplex both listeners, sample the control flags at
    /// least once per second, hand accepted connections to the pool.
    /// Returns after a graceful drain.
    pub async fn run(self, flags: Arc<ControlFlags>) -> Result<(), StartupError> {
        let pool = WorkerPool::new(Arc::clone(&self.config), Arc::clone(&flags))?;
        info!(
            http = %self.http_addr().map(|a| a.to_string()).unwrap_or_default(),
            https = %self.https_addr().map(|a| a.to_string()).unwrap_or_default(),
            "server ready"
        );

        loop {
            if flags.shutdown.load(Ordering::Relaxed) {
                break;
            }
            if flags.refresh_catalog.load(Ordering::Relaxed) {
                self.refresh_catalog(&pool).await;
                flags.refresh_catalog.store(false, Ordering::Relaxed);
            }

            tokio::select! {
                accepted = self.http_listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.dispatch_plain(stream, peer, &pool),
                        Err(err) => warn!(%err, "accept failed on cleartext listener"),
                    }
                }
                accepted = self.https_listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => self.dispatch_secure(stream, peer, &pool).await,
                        Err(err) => warn!(%err, "accept failed on TLS listener"),
                    }
                }
                _ = tokio::time::sleep(Duration::from_secs(1)) => {}
            }
        }

        info!("shutdown requested, draining");
        drop(self.http_listener);
        drop(self.https_listener);
        pool.destroy().await;
        info!("server stopped");
        Ok(())
    }

    /// Quiesce the pool, rebuild, publish. A failed rebuild keeps the old
    /// snapshot in place.
    async fn refresh_catalog(&self, pool: &WorkerPool) {
        info!("catalog refresh requested");
        pool.wait_idle().await;
        let webroot = self.config.webroot.clone();
        match tokio::task::spawn_blocking(move || Catalog::build(&webroot)).await {
            Ok(Ok(catalog)) => {
                self.catalog_cell.publish(catalog);
                info!("catalog refresh complete");
            }
            Ok(Err(err)) => warn!(%err, "catalog rebuild failed, keeping previous snapshot"),
            Err(err) => warn!(%err, "catalog rebuild task failed"),
        }
    }

    fn dispatch_plain(&self, stream: TcpStream, peer: SocketAddr, pool: &WorkerPool) {
        info!(%peer, "cleartext connection accepted");
        let _ = stream.set_nodelay(true);
        self.submit(Transport::Plain(stream), peer, pool);
    }

    async fn dispatch_secure(&self, stream: TcpStream, peer: SocketAddr, pool: &WorkerPool) {
        info!(%peer, "TLS connection accepted");
        let _ = stream.set_nodelay(true);
        let transport = match timeout(self.config.read_timeout, self.tls.handshake(stream)).await {
            Ok(Ok(transport)) => transport,
            Ok(Err(err)) => {
                warn!(%peer, %err, "TLS handshake failed");
                return;
            }
            Err(_) => {
                warn!(%peer, "TLS handshake timed out");
                return;
            }
        };
        self.submit(transport, peer, pool);
    }

    fn submit(&self, transport: Transport, peer: SocketAddr, pool: &WorkerPool) {
        let item = WorkItem {
            transport,
            peer,
            catalog: self.catalog_cell.snapshot(),
        };
        match pool.try_submit(item) {
            Ok(()) => {}
            Err(SubmitError::QueueFull) => warn!(%peer, "work queue full, closing connection"),
            Err(SubmitError::ShuttingDown) => debug!(%peer, "pool draining, closing connection"),
        }
    }
}

fn listen(port: u16) -> Result<TcpListener, StartupError> {
    let socket =
        TcpSocket::new_v4().map_err(|source| StartupError::Bind { port, source })?;
    socket
        .set_reuseaddr(true)
        .map_err(|source| StartupError::Bind { port, source })?;
    socket
        .bind(SocketAddr::from(([0, 0, 0, 0], port)))
        .map_err(|source| StartupError::Bind { port, source })?;
    socket
        .listen(BACKLOG)
        .map_err(|source| StartupError::Bind { port, source })
}

/// Wire process signals onto the control flags: SIGINT/SIGTERM/SIGQUIT ask
/// for shutdown, SIGUSR1 asks for a catalog rebuild.
pub fn spawn_signal_listener(flags: Arc<ControlFlags>) {
    tokio::spawn(async move {
        #[cfg(unix)]
        {
            use tokio::signal::unix::{signal, SignalKind};

            let mut interrupt =
                signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");
            let mut terminate =
                signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
            let mut quit = signal(SignalKind::quit()).expect("failed to install SIGQUIT handler");
            let mut refresh =
                signal(SignalKind::user_defined1()).expect("failed to install SIGUSR1 handler");

            loop {
                tokio::select! {
                    _ = interrupt.recv() => {
                        info!("shutdown signal received");
                        flags.request_shutdown();
                    }
                    _ = terminate.recv() => {
                        info!("shutdown signal received");
                        flags.request_shutdown();
                    }
                    _ = quit.recv() => {
                        info!("shutdown signal received");
                        flags.request_shutdown();
                    }
                    _ = refresh.recv() => {
                        info!("catalog refresh signal received");
                        flags.request_refresh();
                    }
                }
            }
        }

        #[cfg(not(unix))]
        {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("shutdown signal received");
                flags.request_shutdown();
            }
        }
    });
}
