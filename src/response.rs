use std::io::{self, ErrorKind, SeekFrom};
use std::time::SystemTime;

use once_cell::sync::Lazy;
use rustc_hash::FxHashMap;
use tokio::fs::File;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tracing::info;

use crate::catalog::CatalogEntry;
use crate::request::{RangeSpec, Version};
use crate::transport::Transport;
use crate::STREAM_BUF_SIZE;

/// Reason phrases the server can emit.
pub fn reason_phrase(status: u16) -> &'static str {
    match status {
        200 => "OK",
        206 => "Partial Content",
        301 => "Moved Permanently",
        304 => "Not Modified",
        400 => "Bad Request",
        403 => "Forbidden",
        404 => "Not Found",
        416 => "Range Not Satisfiable",
        418 => "I'm a teapot",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        505 => "HTTP Version Not Supported",
        _ => "Unknown",
    }
}

/// Current time as IMF-fixdate for the `Date` header.
pub fn current_http_date() -> String {
    httpdate::fmt_http_date(SystemTime::now())
}

/// Concrete byte window of a satisfiable range request, both ends
/// inclusive.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteWindow {
    pub start: u64,
    pub end: u64,
}

impl ByteWindow {
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }
}

/// Clamp a range request against the file size. `None` means the range is
/// unsatisfiable and the response must be 416.
pub fn resolve_range(spec: RangeSpec, file_size: u64) -> Option<ByteWindow> {
    if file_size == 0 {
        return None;
    }
    let last = file_size - 1;
    match spec {
        RangeSpec::Suffix(suffix) => {
            let start = file_size.saturating_sub(suffix);
            if start > last {
                None
            } else {
                Some(ByteWindow { start, end: last })
            }
        }
        RangeSpec::From(start) => {
            if start >= file_size {
                None
            } else {
                Some(ByteWindow { start, end: last })
            }
        }
        RangeSpec::FromTo(start, end) => {
            if start >= file_size || end < start {
                None
            } else {
                Some(ByteWindow {
                    start,
                    end: end.min(last),
                })
            }
        }
    }
}

fn connection_header(keep_alive: bool) -> &'static str {
    if keep_alive {
        "Connection: keep-alive\r\n"
    } else {
        "Connection: close\r\n"
    }
}

/// Inputs for a 200/206 header block.
pub struct FileHeaders<'a> {
    pub version: Version,
    /// 200 or 206.
    pub status: u16,
    pub media_type: &'static str,
    pub content_length: u64,
    pub keep_alive: bool,
    /// Catalog entry when there is one; absent files are served without
    /// validators.
    pub validators: Option<&'a CatalogEntry>,
    /// Window plus total file size, 206 only.
    pub content_range: Option<(ByteWindow, u64)>,
}

pub fn build_file_headers(h: &FileHeaders<'_>) -> String {
    let mut out = format!(
        "{} {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nAccept-Ranges: bytes\r\nDate: {}\r\n",
        h.version.as_str(),
        h.status,
        reason_phrase(h.status),
        h.media_type,
        h.content_length,
        current_http_date(),
    );
    if let Some(entry) = h.validators {
        out.push_str(&format!(
            "Last-Modified: {}\r\nETag: \"{}\"\r\n",
            entry.last_modified, entry.content_fingerprint
        ));
    }
    if let Some((window, total)) = h.content_range {
        out.push_str(&format!(
            "Content-Range: bytes {}-{}/{}\r\n",
            window.start, window.end, total
        ));
    }
    out.push_str(connection_header(h.keep_alive));
    out.push_str("\r\n");
    out
}

/// Error page bodies are fixed per status; render them once.
static ERROR_BODIES: Lazy<FxHashMap<u16, String>> = Lazy::new(|| {
    [400, 403, 404, 416, 500, 501, 505]
        .into_iter()
        .map(|status| (status, render_error_body(status)))
        .collect()
});

fn render_error_body(status: u16) -> String {
    let reason = reason_phrase(status);
    format!(
        "<html>\n<head><title>{status} {reason}</title></head>\n<body>\n<h1>{status} {reason}</h1>\n</body>\n</html>\n"
    )
}

/// Status line, minimal headers, and a small HTML body carrying only the
/// numeric code and reason phrase. Error responses always close.
pub fn build_error_response(status: u16, version: Option<Version>) -> Vec<u8> {
    let body = match ERROR_BODIES.get(&status) {
        Some(body) => body.clone(),
        None => render_error_body(status),
    };
    let version = version.map(Version::as_str).unwrap_or("HTTP/1.1");
    let headers = format!(
        "{} {} {}\r\nContent-Type: text/html\r\nContent-Length: {}\r\nDate: {}\r\nConnection: close\r\n\r\n",
        version,
        status,
        reason_phrase(status),
        body.len(),
        current_http_date(),
    );
    let mut out = Vec::with_capacity(headers.len() + body.len());
    out.extend_from_slice(headers.as_bytes());
    out.extend_from_slice(body.as_bytes());
    out
}

/// 304 with the validators the client can keep trusting. Conditional hits
/// end the connection.
pub fn build_not_modified(version: Version, entry: &CatalogEntry) -> String {
    format!(
        "{} 304 Not Modified\r\nDate: {}\r\nETag: \"{}\"\r\nLast-Modified: {}\r\nConnection: close\r\n\r\n",
        version.as_str(),
        current_http_date(),
        entry.content_fingerprint,
        entry.last_modified,
    )
}

pub fn build_redirect(version: Version, location: &str) -> String {
    format!(
        "{} 301 Moved Permanently\r\nLocation: {}\r\nDate: {}\r\nConnection: close\r\n\r\n",
        version.as_str(),
        location,
        current_http_date(),
    )
}

pub fn build_options(version: Version, keep_alive: bool) -> String {
    let mut out = format!(
        "{} 200 OK\r\nAllow: GET, HEAD, OPTIONS\r\nDate: {}\r\nContent-Length: 0\r\n",
        version.as_str(),
        current_http_date(),
    );
    out.push_str(connection_header(keep_alive));
    out.push_str("\r\n");
    out
}

/// 416 with the valid-range hint and an empty body.
pub fn build_range_not_satisfiable(version: Version, file_size: u64) -> String {
    format!(
        "{} 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nDate: {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        version.as_str(),
        file_size,
        current_http_date(),
    )
}

/// How a body transfer ended; decides whether the connection may be
/// reused.
#[derive(Debug, PartialEq, Eq)]
pub enum StreamEnd {
    /// Every byte went out.
    Complete,
    /// Peer went away mid-body. Normal for media seeking; the connection
    /// is done.
    PeerClosed,
}

/// Stream `window.len()` bytes of `file` starting at `window.start`.
///
/// A connection reset or broken pipe mid-body ends the response cleanly;
/// any other transport error propagates.
pub async fn stream_body(
    transport: &mut Transport,
    file: &mut File,
    window: ByteWindow,
) -> io::Result<StreamEnd> {
    file.seek(SeekFrom::Start(window.start)).await?;
    let mut buf = vec![0u8; STREAM_BUF_SIZE];
    let mut remaining = window.len();
    let mut total_sent: u64 = 0;
    while remaining > 0 {
        let chunk = remaining.min(STREAM_BUF_SIZE as u64) as usize;
        let n = file.read(&mut buf[..chunk]).await?;
        if n == 0 {
            // File came up short of the window; stop like a short read.
            break;
        }
        match transport.write_all(&buf[..n]).await {
            Ok(()) => {}
            Err(err) if is_peer_reset(&err) => {
                info!(
                    sent = total_sent,
                    expected = window.len(),
                    "peer closed during body transfer"
                );
                return Ok(StreamEnd::PeerClosed);
            }
            Err(err) => return Err(err),
        }
        remaining -= n as u64;
        total_sent += n as u64;
    }
    Ok(StreamEnd::Complete)
}

fn is_peer_reset(err: &io::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::ConnectionReset | ErrorKind::BrokenPipe
    )
}
