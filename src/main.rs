use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::error;
use tracing_subscriber::EnvFilter;

use hearth::config::Cli;
use hearth::server::{spawn_signal_listener, ControlFlags, Server};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Cli::parse().into_config();

    init_logging(config.log_file.as_deref());

    tracing::info!(
        webroot = %config.webroot.display(),
        http_port = config.http_port,
        https_port = config.https_port,
        workers = config.thread_pool_size,
        queue = config.max_queue_size,
        "starting"
    );

    let server = match Server::bind(config) {
        Ok(server) => server,
        Err(err) => {
            error!(%err, "startup failed");
            return ExitCode::FAILURE;
        }
    };

    let flags = Arc::new(ControlFlags::default());
    spawn_signal_listener(Arc::clone(&flags));

    match server.run(flags).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "server failed");
            ExitCode::FAILURE
        }
    }
}

fn init_logging(log_file: Option<&std::path::Path>) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    match log_file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .expect("failed to open log file");
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::sync::Mutex::new(file))
                .with_ansi(false)
                .init();
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}
