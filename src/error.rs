use std::path::PathBuf;

use thiserror::Error;

/// Fatal conditions surfaced while bringing the server up. Anything that
/// happens after the listeners are bound is reported to the client as an
/// HTTP status instead of propagating here.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("failed to bind port {port}: {source}")]
    Bind {
        port: u16,
        #[source]
        source: std::io::Error,
    },
    #[error("document root `{root}` is unreadable: {source}")]
    CatalogRoot {
        root: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to read TLS material `{path}`: {source}")]
    TlsRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("no certificate found in `{path}`")]
    TlsCertMissing { path: PathBuf },
    #[error("no private key found in `{path}`")]
    TlsKeyMissing { path: PathBuf },
    #[error("TLS key does not match the certificate: {0}")]
    TlsKeyMismatch(#[from] tokio_rustls::rustls::Error),
    #[error("worker pool requires at least one thread")]
    EmptyPool,
}
