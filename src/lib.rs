//! Static-file HTTP/HTTPS origin server: a precomputed content catalog, a
//! bounded worker pool, and a request pipeline that streams files whole or
//! as a single byte range.

pub mod catalog;
pub mod config;
pub mod error;
pub mod mime;
pub mod pipeline;
pub mod pool;
pub mod request;
pub mod response;
pub mod server;
pub mod transport;

/// Largest request message read from a connection in one pass.
pub const MAX_REQUEST_SIZE: usize = 8192;

/// Chunk size for streaming file bodies.
pub const STREAM_BUF_SIZE: usize = 65536;

/// Listen backlog for both listeners.
pub const BACKLOG: u32 = 20;

pub use catalog::{Catalog, CatalogCell, CatalogEntry};
pub use config::ServerConfig;
pub use error::StartupError;
pub use server::{ControlFlags, Server};
