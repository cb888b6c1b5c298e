use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::Ordering;

use tokio::fs::File;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::catalog::Catalog;
use crate::config::ServerConfig;
use crate::mime;
use crate::pool::WorkItem;
use crate::request::{self, Method, Request, Version};
use crate::response::{self, ByteWindow, FileHeaders, StreamEnd};
use crate::server::ControlFlags;
use crate::transport::Transport;
use crate::MAX_REQUEST_SIZE;

enum Outcome {
    KeepAlive,
    Close,
}

/// Serve one connection end-to-end: read, parse, decide, emit, and loop
/// while keep-alive holds. Owns the transport; the connection is closed on
/// return.
pub async fn serve(item: WorkItem, config: &ServerConfig, flags: &ControlFlags) {
    let WorkItem {
        mut transport,
        peer,
        catalog,
    } = item;
    let mut buf = vec![0u8; MAX_REQUEST_SIZE];

    loop {
        if flags.shutdown.load(Ordering::Relaxed) {
            break;
        }
        let n = match timeout(config.read_timeout, transport.read(&mut buf)).await {
            Ok(Ok(0)) => break, // peer closed
            Ok(Ok(n)) => n,
            Ok(Err(err)) => {
                warn!(%peer, %err, "request read failed");
                break;
            }
            Err(_) => break, // idle past the read timeout
        };

        let outcome = match request::parse(&buf[..n]) {
            Ok(req) => {
                info!(
                    %peer,
                    method = ?req.method,
                    target = req.target,
                    version = req.version.as_str(),
                    "request"
                );
                debug!(
                    %peer,
                    host = req.host.unwrap_or(""),
                    user_agent = req.user_agent.unwrap_or(""),
                    keep_alive = req.keep_alive,
                    etag_in = req.etag_in,
                    dnt = req.dnt,
                    gpc = req.gpc,
                    "request detail"
                );
                handle_request(&mut transport, &req, &catalog, config, peer).await
            }
            Err(err) => {
                warn!(%peer, status = err.status(), "request rejected at parse");
                let error_response = response::build_error_response(err.status(), None);
                let _ = transport.write_all(&error_response).await;
                Outcome::Close
            }
        };

        match outcome {
            Outcome::KeepAlive => continue,
            Outcome::Close => break,
        }
    }

    transport.close().await;
    debug!(%peer, "connection closed");
}

/// The status-selection state machine, first match wins: OPTIONS,
/// unsupported method, path validation, TLS upgrade redirect, conditional
/// hits, open failures, range arithmetic, full response.
async fn handle_request(
    transport: &mut Transport,
    req: &Request<'_>,
    catalog: &Catalog,
    config: &ServerConfig,
    peer: SocketAddr,
) -> Outcome {
    if req.method == Method::Options {
        let headers = response::build_options(req.version, req.keep_alive);
        return write_then(transport, headers.as_bytes(), req.keep_alive, peer).await;
    }

    if req.method == Method::Unsupported {
        return send_error(transport, 501, Some(req.version), peer).await;
    }

    if !request::validate_path(req.target) {
        warn!(%peer, target = req.target, "path rejected");
        return send_error(transport, 403, Some(req.version), peer).await;
    }

    // Cleartext request asking for TLS: send the client across.
    if req.upgrade_requested && !transport.is_secure() {
        let host = req.host.unwrap_or("localhost");
        let location = format!("https://{}{}", host, req.target);
        info!(%peer, %location, "redirecting to TLS endpoint");
        let headers = response::build_redirect(req.version, &location);
        let _ = transport.write_all(headers.as_bytes()).await;
        return Outcome::Close;
    }

    let resolved = request::resolve_path(req.target, &config.webroot);
    let entry = catalog.lookup(&resolved);

    if let Some(entry) = entry {
        // Validators first: a conditional hit never opens the file.
        if req.etag_in != 0 && req.etag_in == entry.content_fingerprint {
            debug!(%peer, etag = entry.content_fingerprint, "validator match");
            let headers = response::build_not_modified(req.version, entry);
            let _ = transport.write_all(headers.as_bytes()).await;
            return Outcome::Close;
        }
        if let Some(since) = req.if_modified_since {
            // Byte comparison of two IMF-fixdates; same-format strings
            // order the same way the dates do.
            if entry.last_modified.as_str() <= since {
                debug!(%peer, "not modified since");
                let headers = response::build_not_modified(req.version, entry);
                let _ = transport.write_all(headers.as_bytes()).await;
                return Outcome::Close;
            }
        }
    }

    let mut file = match File::open(&resolved).await {
        Ok(file) => file,
        Err(err) => {
            let status = match err.kind() {
                ErrorKind::NotFound => 404,
                ErrorKind::PermissionDenied => 403,
                _ => 500,
            };
            warn!(%peer, path = %resolved, %err, status, "open failed");
            return send_error(transport, status, Some(req.version), peer).await;
        }
    };
    let file_size = match file.metadata().await {
        Ok(meta) => meta.len(),
        Err(err) => {
            warn!(%peer, path = %resolved, %err, "metadata failed");
            return send_error(transport, 500, Some(req.version), peer).await;
        }
    };

    let window = match req.range {
        Some(spec) => match response::resolve_range(spec, file_size) {
            Some(window) => Some(window),
            None => {
                warn!(%peer, ?spec, file_size, "unsatisfiable range");
                let headers = response::build_range_not_satisfiable(req.version, file_size);
                let _ = transport.write_all(headers.as_bytes()).await;
                return Outcome::Close;
            }
        },
        None => None,
    };

    let (status, content_length, content_range) = match window {
        Some(window) => (206, window.len(), Some((window, file_size))),
        None => (200, file_size, None),
    };

    let headers = response::build_file_headers(&FileHeaders {
        version: req.version,
        status,
        media_type: mime::from_path(&resolved).as_str(),
        content_length,
        keep_alive: req.keep_alive,
        validators: entry,
        content_range,
    });
    if let Err(err) = transport.write_all(headers.as_bytes()).await {
        warn!(%peer, %err, "header write failed");
        return Outcome::Close;
    }

    // HEAD runs the same machine but never streams the body.
    if req.method == Method::Head || content_length == 0 {
        return if req.keep_alive {
            Outcome::KeepAlive
        } else {
            Outcome::Close
        };
    }

    let window = window.unwrap_or(ByteWindow {
        start: 0,
        end: file_size - 1,
    });
    match response::stream_body(transport, &mut file, window).await {
        Ok(StreamEnd::Complete) => {
            info!(%peer, bytes = window.len(), status, "response sent");
            if req.keep_alive {
                Outcome::KeepAlive
            } else {
                Outcome::Close
            }
        }
        Ok(StreamEnd::PeerClosed) => Outcome::Close,
        Err(err) => {
            warn!(%peer, %err, "body write failed");
            Outcome::Close
        }
    }
}

async fn write_then(
    transport: &mut Transport,
    bytes: &[u8],
    keep_alive: bool,
    peer: SocketAddr,
) -> Outcome {
    match transport.write_all(bytes).await {
        Ok(()) => {
            if keep_alive {
                Outcome::KeepAlive
            } else {
                Outcome::Close
            }
        }
        Err(err) => {
            warn!(%peer, %err, "response write failed");
            Outcome::Close
        }
    }
}

async fn send_error(
    transport: &mut Transport,
    status: u16,
    version: Option<Version>,
    peer: SocketAddr,
) -> Outcome {
    let error_response = response::build_error_response(status, version);
    if let Err(err) = transport.write_all(&error_response).await {
        debug!(%peer, %err, "error response write failed");
    }
    Outcome::Close
}
