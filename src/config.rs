use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Frozen configuration record consumed by the server core.
///
/// Built once before any listener exists; nothing mutates it afterwards.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Server root containing the `webpages/` subtree and `keys/`.
    pub webroot: PathBuf,
    /// Cleartext listener port.
    pub http_port: u16,
    /// TLS listener port.
    pub https_port: u16,
    /// Number of workers draining the queue.
    pub thread_pool_size: usize,
    /// Bounded work queue depth.
    pub max_queue_size: usize,
    /// Bound on a stalled transport read (and the TLS handshake).
    pub read_timeout: Duration,
    /// Append log records here instead of stderr.
    pub log_file: Option<PathBuf>,
}

/// Command-line flags. The short letters match the historical getopt set.
#[derive(Debug, Parser)]
#[command(name = "hearth", about = "Static-file HTTP/HTTPS origin server")]
pub struct Cli {
    /// Server root containing webpages/ and keys/
    #[arg(short = 'w', long)]
    pub webroot: PathBuf,

    /// Cleartext listener port
    #[arg(short = 'p', long, default_value_t = 80)]
    pub http_port: u16,

    /// TLS listener port
    #[arg(short = 's', long, default_value_t = 443)]
    pub https_port: u16,

    /// Number of worker threads
    #[arg(short = 't', long = "threads", default_value_t = 20)]
    pub threads: usize,

    /// Bounded work queue depth
    #[arg(long = "queue", default_value_t = 100)]
    pub queue: usize,

    /// Per-connection read timeout in seconds
    #[arg(long = "read-timeout", default_value_t = 1)]
    pub read_timeout_secs: u64,

    /// Append log records to this file instead of stderr
    #[arg(long = "log-file")]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    pub fn into_config(self) -> ServerConfig {
        ServerConfig {
            webroot: self.webroot,
            http_port: self.http_port,
            https_port: self.https_port,
            thread_pool_size: self.threads,
            max_queue_size: self.queue,
            read_timeout: Duration::from_secs(self.read_timeout_secs),
            log_file: self.log_file,
        }
    }
}
