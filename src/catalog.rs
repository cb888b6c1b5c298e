use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use tracing::{debug, info, warn};

use crate::error::StartupError;

/// One servable file at snapshot time.
#[derive(Debug, Clone)]
pub struct CatalogEntry {
    /// Absolute filesystem path the entry was built from.
    pub path: String,
    /// djb2 of `path`; the catalog key. Never 0.
    pub path_fingerprint: u32,
    /// Additive byte-sum of the file contents; the ETag value. Never 0.
    pub content_fingerprint: u32,
    /// IMF-fixdate text, e.g. `Sat, 01 Aug 2026 08:00:00 GMT`.
    pub last_modified: String,
}

/// Immutable snapshot of every servable file under the document root,
/// keyed by path fingerprint. Never mutated after publication.
#[derive(Debug, Default)]
pub struct Catalog {
    entries: FxHashMap<u32, CatalogEntry>,
}

/// djb2 over the path bytes: seed 5381, `h = h * 33 + byte`.
pub fn path_fingerprint(path: &str) -> u32 {
    let mut hash: u32 = 5381;
    for &byte in path.as_bytes() {
        hash = hash.wrapping_mul(33).wrapping_add(byte as u32);
    }
    hash
}

/// Additive byte-sum over the file contents, seed 5381. Not cryptographic:
/// this value is the ETag clients revalidate with, so it must stay
/// bit-for-bit stable across rebuilds of an unchanged file.
pub fn content_fingerprint(bytes: &[u8]) -> u32 {
    let mut hash: u32 = 5381;
    for &byte in bytes {
        hash = hash.wrapping_add(byte as u32);
    }
    hash
}

impl Catalog {
    /// Walk `{webroot}/webpages` and fingerprint every regular file.
    ///
    /// Files under a `videos/` directory are left out of the snapshot; they
    /// stay openable but are served without validators. Unreadable files
    /// are logged and skipped; an unreadable root fails the build.
    pub fn build(webroot: &Path) -> Result<Catalog, StartupError> {
        let root = format!("{}/webpages", webroot.display());
        let mut entries = FxHashMap::default();
        walk(&root, &mut entries).map_err(|source| StartupError::CatalogRoot {
            root: PathBuf::from(&root),
            source,
        })?;
        info!(entries = entries.len(), root = %root, "content catalog built");
        Ok(Catalog { entries })
    }

    /// Fingerprint the path, then look it up. Absent means the pipeline
    /// falls back to opening the file without validators.
    pub fn lookup(&self, path: &str) -> Option<&CatalogEntry> {
        let fingerprint = path_fingerprint(path);
        if fingerprint == 0 {
            return None;
        }
        self.entries.get(&fingerprint)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn walk(dir: &str, entries: &mut FxHashMap<u32, CatalogEntry>) -> std::io::Result<()> {
    for dir_entry in fs::read_dir(dir)? {
        let dir_entry = match dir_entry {
            Ok(dir_entry) => dir_entry,
            Err(err) => {
                warn!(%dir, %err, "skipping unreadable directory entry");
                continue;
            }
        };
        let name = dir_entry.file_name();
        let name = name.to_string_lossy();
        let path = format!("{}/{}", dir, name);
        let file_type = match dir_entry.file_type() {
            Ok(file_type) => file_type,
            Err(err) => {
                warn!(%path, %err, "skipping unreadable directory entry");
                continue;
            }
        };
        if file_type.is_dir() {
            if name == "videos" {
                debug!(%path, "videos subtree excluded from catalog");
                continue;
            }
            // A subtree we cannot read is skipped, not fatal.
            if let Err(err) = walk(&path, entries) {
                warn!(%path, %err, "skipping unreadable subtree");
            }
        } else if file_type.is_file() {
            match index_file(&path) {
                Ok(Some(entry)) => {
                    if entries.contains_key(&entry.path_fingerprint) {
                        warn!(%path, fingerprint = entry.path_fingerprint,
                              "path fingerprint collision, entry skipped");
                    } else {
                        entries.insert(entry.path_fingerprint, entry);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(%path, %err, "skipping unreadable file"),
            }
        }
    }
    Ok(())
}

fn index_file(path: &str) -> std::io::Result<Option<CatalogEntry>> {
    let bytes = fs::read(path)?;
    let path_fingerprint = path_fingerprint(path);
    let content_fingerprint = content_fingerprint(&bytes);
    if path_fingerprint == 0 || content_fingerprint == 0 {
        warn!(%path, "zero fingerprint, entry skipped");
        return Ok(None);
    }
    let mtime = fs::metadata(path)?
        .modified()
        .unwrap_or(SystemTime::UNIX_EPOCH);
    Ok(Some(CatalogEntry {
        path: path.to_owned(),
        path_fingerprint,
        content_fingerprint,
        last_modified: httpdate::fmt_http_date(mtime),
    }))
}

/// Atomically swappable handle to the published catalog.
///
/// Workers clone the `Arc` when a connection is enqueued and hold it for
/// the duration of that connection, so a superseded snapshot is freed only
/// once the last in-flight reference drops.
#[derive(Debug)]
pub struct CatalogCell {
    current: RwLock<Arc<Catalog>>,
}

impl CatalogCell {
    pub fn new(catalog: Catalog) -> CatalogCell {
        CatalogCell {
            current: RwLock::new(Arc::new(catalog)),
        }
    }

    pub fn snapshot(&self) -> Arc<Catalog> {
        self.current.read().clone()
    }

    /// Publish a freshly built catalog. Call only with the worker pool
    /// quiesced so no request observes the swap mid-flight.
    pub fn publish(&self, catalog: Catalog) {
        *self.current.write() = Arc::new(catalog);
    }
}
