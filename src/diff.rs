//! Content diff engine: upload only what changed.
//!
//! Every artifact the publisher produces (rendered pages, theme assets) is
//! compared against the copy already in the object store before anything is
//! written. Unchanged artifacts are neither uploaded nor invalidated on the
//! CDN, which keeps repeated publishes cheap and keeps invalidation batches
//! limited to real changes.
//!
//! # Design
//!
//! The comparison is **content-addressed**: the local digest is the MD5 of
//! the payload, the remote digest is the object's entity tag. A single-part
//! S3 upload reports exactly the MD5 of the body as its ETag, so a match means
//! the stored bytes are identical. Multipart ETags (`<md5>-<parts>`) never
//! match, which only costs a redundant upload.
//!
//! A lookup has three outcomes:
//!
//! 1. The object exists and its tag matches (case-insensitively): skip.
//! 2. The object exists with a different tag, or does not exist: upload.
//! 3. The lookup fails for any other reason: the error propagates. A
//!    connectivity failure must not be mistaken for content drift.
//!
//! Writes that come back with a non-2xx status are logged and recovered: the
//! key is left out of the invalidation set and the run carries on.

use crate::naming;
use crate::plugin::Log;
use crate::store::{self, Body, ObjectStore, StoreError};
use std::fmt;
use std::fs::File;
use std::io::{self, Read};
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};

/// Lowercase hex MD5 of an in-memory payload.
pub fn content_digest(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

/// Lowercase hex MD5 of a file, streamed from disk.
pub fn file_digest(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        context.consume(&buf[..n]);
    }
    Ok(format!("{:x}", context.compute()))
}

/// Strip the quotes providers wrap entity tags in.
pub fn normalize_etag(etag: &str) -> &str {
    etag.trim().trim_matches('"')
}

/// Stored digest for `key`, or `None` when the object does not exist.
pub fn remote_digest(store: &dyn ObjectStore, key: &str) -> Result<Option<String>, StoreError> {
    match store.head(key) {
        Ok(etag) => Ok(Some(normalize_etag(&etag).to_string())),
        Err(StoreError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

/// Whether the local digest differs from what the store holds for `key`.
pub fn needs_upload(
    store: &dyn ObjectStore,
    local_digest: &str,
    key: &str,
) -> Result<bool, StoreError> {
    let remote = remote_digest(store, key)?;
    Ok(needs_upload_against(remote.as_deref(), local_digest))
}

/// The upload decision once the stored digest is known: upload unless the
/// store holds an object whose digest matches, ignoring case.
pub fn needs_upload_against(remote: Option<&str>, local_digest: &str) -> bool {
    !remote.is_some_and(|r| r.eq_ignore_ascii_case(local_digest))
}

/// Per-run upload counters. Safe to update from several threads.
#[derive(Debug, Default)]
struct Counters {
    uploaded: AtomicU32,
    unchanged: AtomicU32,
    failed: AtomicU32,
}

/// Summary of upload decisions for a publish run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct UploadStats {
    pub uploaded: u32,
    pub unchanged: u32,
    pub failed: u32,
}

impl UploadStats {
    pub fn total(&self) -> u32 {
        self.uploaded + self.unchanged + self.failed
    }
}

impl fmt::Display for UploadStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.failed > 0 {
            write!(
                f,
                "{} uploaded, {} unchanged, {} failed ({} total)",
                self.uploaded,
                self.unchanged,
                self.failed,
                self.total()
            )
        } else if self.unchanged > 0 {
            write!(
                f,
                "{} uploaded, {} unchanged ({} total)",
                self.uploaded,
                self.unchanged,
                self.total()
            )
        } else {
            write!(f, "{} uploaded", self.uploaded)
        }
    }
}

/// Diff-gated writer in front of an object store.
pub struct Uploader<'a> {
    store: &'a dyn ObjectStore,
    log: &'a Log,
    counters: Counters,
}

impl<'a> Uploader<'a> {
    pub fn new(store: &'a dyn ObjectStore, log: &'a Log) -> Self {
        Self {
            store,
            log,
            counters: Counters::default(),
        }
    }

    /// Upload rendered content under `key` unless the store already has it.
    ///
    /// Returns the path to invalidate (`/key`) when an upload succeeded.
    pub fn upload_content(&self, key: &str, content: &str) -> Result<Option<String>, StoreError> {
        let digest = content_digest(content.as_bytes());
        self.upload(key, &digest, || Body::Bytes(content.as_bytes().to_vec()))
    }

    /// Upload a local file under `key` unless the store already has it.
    pub fn upload_file(&self, key: &str, path: &Path) -> Result<Option<String>, StoreError> {
        let digest = file_digest(path)?;
        self.upload(key, &digest, || Body::File(path.to_path_buf()))
    }

    fn upload(
        &self,
        key: &str,
        digest: &str,
        body: impl FnOnce() -> Body,
    ) -> Result<Option<String>, StoreError> {
        let remote = remote_digest(self.store, key)?;
        self.log.debug(
            &format!(
                "Content md5 {}, stored etag {}",
                digest,
                remote.as_deref().unwrap_or("<none>")
            ),
            Some(key),
        );

        if !needs_upload_against(remote.as_deref(), digest) {
            self.counters.unchanged.fetch_add(1, Ordering::Relaxed);
            self.log.debug(
                &format!("Skipping {} (unchanged)", self.store.describe(key)),
                None,
            );
            return Ok(None);
        }

        let status = self.store.put(key, body())?;
        if store::is_success(status) {
            self.counters.uploaded.fetch_add(1, Ordering::Relaxed);
            self.log
                .info(&format!("Uploaded {}", self.store.describe(key)));
            Ok(Some(naming::invalidation_path(key)))
        } else {
            self.counters.failed.fetch_add(1, Ordering::Relaxed);
            self.log.error(
                &format!(
                    "Got unexpected status {} uploading {}",
                    status,
                    self.store.describe(key)
                ),
                None,
            );
            Ok(None)
        }
    }

    pub fn stats(&self) -> UploadStats {
        UploadStats {
            uploaded: self.counters.uploaded.load(Ordering::Relaxed),
            unchanged: self.counters.unchanged.load(Ordering::Relaxed),
            failed: self.counters.failed.load(Ordering::Relaxed),
        }
    }
}
