use std::io;
use std::path::Path;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tokio_rustls::rustls::ServerConfig as TlsServerConfig;
use tokio_rustls::server::TlsStream;
use tokio_rustls::TlsAcceptor;

use crate::error::StartupError;

/// Uniform byte stream over a cleartext or TLS connection. Everything past
/// the acceptor reads and writes through this; only the transport itself
/// knows which variant it holds.
pub enum Transport {
    Plain(TcpStream),
    Secure(Box<TlsStream<TcpStream>>),
}

impl Transport {
    pub fn is_secure(&self) -> bool {
        matches!(self, Transport::Secure(_))
    }

    /// Bytes read; 0 means the peer closed.
    pub async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            Transport::Plain(stream) => stream.read(buf).await,
            Transport::Secure(stream) => stream.read(buf).await,
        }
    }

    pub async fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        match self {
            Transport::Plain(stream) => stream.write_all(buf).await,
            Transport::Secure(stream) => stream.write_all(buf).await,
        }
    }

    /// Orderly shutdown; the TLS variant sends close_notify first.
    pub async fn close(&mut self) {
        let _ = match self {
            Transport::Plain(stream) => stream.shutdown().await,
            Transport::Secure(stream) => stream.shutdown().await,
        };
    }
}

/// TLS material loaded and verified once at startup. The handshake is the
/// only TLS operation the acceptor performs; workers just see a
/// `Transport`.
#[derive(Clone)]
pub struct TlsGate {
    acceptor: TlsAcceptor,
}

impl TlsGate {
    /// Load `keys/cert.pem` and `keys/key.pem` from the server root. A key
    /// that does not belong to the certificate is fatal.
    pub fn load(webroot: &Path) -> Result<TlsGate, StartupError> {
        let cert_path = webroot.join("keys").join("cert.pem");
        let key_path = webroot.join("keys").join("key.pem");

        let cert_pem = std::fs::read(&cert_path).map_err(|source| StartupError::TlsRead {
            path: cert_path.clone(),
            source,
        })?;
        let mut cert_reader = cert_pem.as_slice();
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut cert_reader)
            .collect::<Result<_, _>>()
            .map_err(|source| StartupError::TlsRead {
                path: cert_path.clone(),
                source,
            })?;
        if certs.is_empty() {
            return Err(StartupError::TlsCertMissing { path: cert_path });
        }

        let key_pem = std::fs::read(&key_path).map_err(|source| StartupError::TlsRead {
            path: key_path.clone(),
            source,
        })?;
        let mut key_reader = key_pem.as_slice();
        let key: PrivateKeyDer<'static> = rustls_pemfile::private_key(&mut key_reader)
            .map_err(|source| StartupError::TlsRead {
                path: key_path.clone(),
                source,
            })?
            .ok_or(StartupError::TlsKeyMissing { path: key_path })?;

        let config = TlsServerConfig::builder()
            .with_no_client_auth()
            .with_single_cert(certs, key)?;
        Ok(TlsGate {
            acceptor: TlsAcceptor::from(Arc::new(config)),
        })
    }

    /// Server-side handshake on a freshly accepted socket.
    pub async fn handshake(&self, stream: TcpStream) -> io::Result<Transport> {
        let stream = self.acceptor.accept(stream).await?;
        Ok(Transport::Secure(Box::new(stream)))
    }
}
