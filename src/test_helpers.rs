//! Shared test utilities for the feedpress test suite.
//!
//! Provides recording fakes for the remote clients and the log fan-out, plus
//! a helper for laying out themes on disk.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let store = MemoryStore::new();
//! store.seed("index.html", b"<p>old</p>");
//! let (log, entries) = memory_log();
//!
//! // ... run something against `&store` and `&log` ...
//!
//! assert_eq!(store.puts(), vec!["index.html".to_string()]);
//! assert!(entries.lock().unwrap().iter().any(|e| e.level == Level::Info));
//! ```
//!
//! The fakes are `Clone` and share their state between clones, so a test can
//! box one copy into a plugin and keep another for assertions.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::diff::content_digest;
use crate::plugin::{Log, Logger, Plugin, PluginContext, PluginError};
use crate::store::{Body, Cdn, ObjectStore, StoreError};

// =========================================================================
// Object store
// =========================================================================

#[derive(Debug, Default)]
struct StoreState {
    objects: BTreeMap<String, (Vec<u8>, String)>,
    failing_heads: BTreeSet<String>,
    rejected_puts: BTreeMap<String, u16>,
    puts: Vec<String>,
}

/// In-memory object store that records every write.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate `key` as if it had been uploaded before.
    pub fn seed(&self, key: &str, bytes: &[u8]) {
        let etag = format!("\"{}\"", content_digest(bytes));
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), (bytes.to_vec(), etag));
    }

    /// Pre-populate `key` with an explicit entity tag and no content.
    pub fn seed_etag(&self, key: &str, etag: &str) {
        self.state
            .lock()
            .unwrap()
            .objects
            .insert(key.to_string(), (Vec::new(), etag.to_string()));
    }

    /// Make lookups of `key` fail with a transport error.
    pub fn fail_head(&self, key: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_heads
            .insert(key.to_string());
    }

    /// Make writes of `key` answer with `status` without storing anything.
    pub fn reject_put(&self, key: &str, status: u16) {
        self.state
            .lock()
            .unwrap()
            .rejected_puts
            .insert(key.to_string(), status);
    }

    /// Keys written so far, in write order (including rejected writes).
    pub fn puts(&self) -> Vec<String> {
        self.state.lock().unwrap().puts.clone()
    }

    pub fn object(&self, key: &str) -> Option<Vec<u8>> {
        self.state
            .lock()
            .unwrap()
            .objects
            .get(key)
            .map(|(bytes, _)| bytes.clone())
    }
}

impl ObjectStore for MemoryStore {
    fn head(&self, key: &str) -> Result<String, StoreError> {
        let state = self.state.lock().unwrap();
        if state.failing_heads.contains(key) {
            return Err(StoreError::Transport(format!("connection reset: {key}")));
        }
        state
            .objects
            .get(key)
            .map(|(_, etag)| etag.clone())
            .ok_or_else(|| StoreError::NotFound(key.to_string()))
    }

    fn put(&self, key: &str, body: Body) -> Result<u16, StoreError> {
        let bytes = match body {
            Body::Bytes(bytes) => bytes,
            Body::File(path) => fs::read(path)?,
        };
        let mut state = self.state.lock().unwrap();
        state.puts.push(key.to_string());
        if let Some(status) = state.rejected_puts.get(key) {
            return Ok(*status);
        }
        let etag = format!("\"{}\"", content_digest(&bytes));
        state.objects.insert(key.to_string(), (bytes, etag));
        Ok(200)
    }

    fn describe(&self, key: &str) -> String {
        format!("mem://{key}")
    }
}

// =========================================================================
// CDN
// =========================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvalidationRequest {
    pub distribution_id: String,
    pub paths: Vec<String>,
    pub caller_reference: String,
}

/// CDN fake answering every request with a fixed status.
#[derive(Debug, Clone)]
pub struct RecordingCdn {
    status: u16,
    requests: Arc<Mutex<Vec<InvalidationRequest>>>,
}

impl RecordingCdn {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            requests: Arc::default(),
        }
    }

    pub fn requests(&self) -> Vec<InvalidationRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Cdn for RecordingCdn {
    fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<u16, StoreError> {
        self.requests.lock().unwrap().push(InvalidationRequest {
            distribution_id: distribution_id.to_string(),
            paths: paths.to_vec(),
            caller_reference: caller_reference.to_string(),
        });
        Ok(self.status)
    }
}

// =========================================================================
// Logging
// =========================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Error,
    Debug,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub level: Level,
    pub message: String,
    /// Debug detail, or the rendered cause of an error.
    pub detail: Option<String>,
}

pub type Entries = Arc<Mutex<Vec<LogEntry>>>;

/// Logging plugin that keeps every message in memory.
#[derive(Debug, Default)]
pub struct MemoryLogger {
    pub entries: Entries,
}

impl MemoryLogger {
    fn record(&self, level: Level, message: &str, detail: Option<String>) {
        self.entries.lock().unwrap().push(LogEntry {
            level,
            message: message.to_string(),
            detail,
        });
    }
}

impl Plugin for MemoryLogger {
    fn name(&self) -> &str {
        "memory"
    }

    fn version(&self) -> &str {
        "0.0.0"
    }

    fn init(&mut self, _ctx: PluginContext) -> Result<(), PluginError> {
        Ok(())
    }
}

impl Logger for MemoryLogger {
    fn info(&self, msg: &str) {
        self.record(Level::Info, msg, None);
    }

    fn error(&self, msg: &str, cause: Option<&dyn std::error::Error>) {
        self.record(Level::Error, msg, cause.map(|e| e.to_string()));
    }

    fn debug(&self, msg: &str, detail: Option<&str>) {
        self.record(Level::Debug, msg, detail.map(str::to_string));
    }
}

/// A log handle wired to a single [`MemoryLogger`], and that logger's entries.
pub fn memory_log() -> (Log, Entries) {
    let logger = MemoryLogger::default();
    let entries = logger.entries.clone();
    let log = Log::new();
    log.attach(Arc::new(Mutex::new(logger)));
    (log, entries)
}

/// Messages logged at `level`, in order.
pub fn messages(entries: &Entries, level: Level) -> Vec<String> {
    entries
        .lock()
        .unwrap()
        .iter()
        .filter(|e| e.level == level)
        .map(|e| e.message.clone())
        .collect()
}

// =========================================================================
// Themes
// =========================================================================

/// Write `themes_dir/name/index.html` and, if given, `post.html`.
pub fn write_theme(themes_dir: &Path, name: &str, index: &str, post: Option<&str>) {
    let dir = themes_dir.join(name);
    fs::create_dir_all(&dir).unwrap();
    fs::write(dir.join("index.html"), index).unwrap();
    if let Some(post) = post {
        fs::write(dir.join("post.html"), post).unwrap();
    }
}
