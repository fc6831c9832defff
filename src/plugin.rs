//! Plugin capability model.
//!
//! Every plugin implements the base [`Plugin`] trait (name, version, init,
//! dispose) plus one of five role traits:
//!
//! | Role | Trait | Adds |
//! |------|-------|------|
//! | Posting | [`Posting`] | `ping_interval`, `ping` |
//! | Processing | [`Processing`] | `process` |
//! | Saving | [`Saving`] | `save`, `flush` |
//! | Publishing | [`Publishing`] | `publish` |
//! | Logging | [`Logging`] | `info`, `error`, `debug` (via [`Logger`]) |
//!
//! The [`Registry`](crate::registry::Registry) keeps one typed collection per
//! role, so nothing ever has to downcast a plugin to find out what it can do.
//!
//! ## Lifecycle
//!
//! `init` is called exactly once, after the [`PluginContext`] (log handle,
//! settings, application handle) is available and before any role operation.
//! `dispose` is called exactly once at shutdown, even when `init` failed, so it
//! must cope with a half-initialized plugin. A plugin whose `init` returned an
//! error never receives data.

use crate::post::Post;
use crate::publish::PublishError;
use crate::store::StoreError;
use crate::theme::ThemeError;
use crate::types::PublishReport;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PluginError {
    #[error("Missing required setting '{key}' for plugin {plugin}")]
    MissingSetting { plugin: String, key: String },
    #[error("Invalid setting '{key}' for plugin {plugin}: {reason}")]
    InvalidSetting {
        plugin: String,
        key: String,
        reason: String,
    },
    #[error("Plugin {0} is not active")]
    Inactive(String),
    #[error("Theme error: {0}")]
    Theme(#[from] ThemeError),
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Publish error: {0}")]
    Publish(#[from] PublishError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The five roles a plugin can play.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Role {
    Posting,
    Processing,
    Saving,
    Publishing,
    Logging,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Role::Posting => "posting",
            Role::Processing => "processing",
            Role::Saving => "saving",
            Role::Publishing => "publishing",
            Role::Logging => "logging",
        };
        f.write_str(name)
    }
}

/// Base capability set shared by every plugin.
pub trait Plugin: Send {
    fn name(&self) -> &str;

    fn version(&self) -> &str;

    /// Called once after the context is injected. An error here keeps the
    /// plugin out of the data path for the rest of the run.
    fn init(&mut self, ctx: PluginContext) -> Result<(), PluginError>;

    /// Called once at shutdown, whether or not `init` succeeded.
    fn dispose(&mut self) {}
}

/// Produces new posts when polled.
pub trait Posting: Plugin {
    /// How often to poll. Zero disables polling.
    fn ping_interval(&self) -> Duration {
        Duration::ZERO
    }

    fn ping(&mut self) -> Result<Vec<Post>, PluginError> {
        Ok(Vec::new())
    }
}

/// Rewrites a post in place. Must be safe to run more than once on the same
/// post.
pub trait Processing: Plugin {
    fn process(&mut self, post: &mut Post) -> Result<(), PluginError>;
}

/// Persists posts.
pub trait Saving: Plugin {
    fn save(&mut self, post: &Post) -> Result<(), PluginError>;

    /// Force buffered writes out. A failure must leave previously saved posts
    /// intact.
    fn flush(&mut self) -> Result<(), PluginError>;
}

/// Emits posts somewhere.
pub trait Publishing: Plugin {
    /// Consume a single-pass sequence of posts whose length is declared up
    /// front by `count`.
    fn publish(
        &mut self,
        posts: &mut dyn Iterator<Item = Post>,
        count: usize,
    ) -> Result<PublishReport, PluginError>;
}

/// A diagnostic sink. Implementations must never panic and must not block
/// for longer than a local write.
pub trait Logger: Send {
    fn info(&self, msg: &str);

    fn error(&self, msg: &str, cause: Option<&dyn std::error::Error>);

    fn debug(&self, msg: &str, detail: Option<&str>);
}

/// A logging plugin: a [`Logger`] with a plugin lifecycle.
pub trait Logging: Plugin + Logger {}

impl<T: Plugin + Logger> Logging for T {}

/// Fan-out handle to every active logging plugin.
///
/// Cheap to clone. Clones share the sink list, so a plugin holding a handle
/// sees logging plugins that are activated after it. Logging sinks must not
/// log through their own context from inside `info`/`error`/`debug`.
#[derive(Clone, Default)]
pub struct Log {
    sinks: Arc<RwLock<Vec<Arc<Mutex<dyn Logging>>>>>,
}

impl Log {
    /// A handle with no sinks; messages are dropped until one is attached.
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn attach(&self, sink: Arc<Mutex<dyn Logging>>) {
        let mut sinks = self.sinks.write().unwrap_or_else(|e| e.into_inner());
        sinks.push(sink);
    }

    /// Detach every sink. Later messages are dropped.
    pub(crate) fn clear(&self) {
        let mut sinks = self.sinks.write().unwrap_or_else(|e| e.into_inner());
        sinks.clear();
    }

    fn each(&self, f: impl Fn(&dyn Logging)) {
        let sinks = self.sinks.read().unwrap_or_else(|e| e.into_inner());
        for sink in sinks.iter() {
            let guard = sink.lock().unwrap_or_else(|e| e.into_inner());
            f(&*guard);
        }
    }

    pub fn info(&self, msg: &str) {
        self.each(|sink| sink.info(msg));
    }

    pub fn error(&self, msg: &str, cause: Option<&dyn std::error::Error>) {
        self.each(|sink| sink.error(msg, cause));
    }

    pub fn debug(&self, msg: &str, detail: Option<&str>) {
        self.each(|sink| sink.debug(msg, detail));
    }
}

impl fmt::Debug for Log {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let count = self.sinks.read().map(|s| s.len()).unwrap_or(0);
        f.debug_struct("Log").field("sinks", &count).finish()
    }
}

/// String-keyed configuration for one plugin.
///
/// Empty values are treated as absent, so a stock config can list every key
/// with an empty default without turning optional features on.
#[derive(Debug, Clone, Default)]
pub struct Settings {
    plugin: String,
    values: BTreeMap<String, String>,
}

impl Settings {
    pub fn new(plugin: impl Into<String>, values: BTreeMap<String, String>) -> Self {
        Self {
            plugin: plugin.into(),
            values,
        }
    }

    /// Build settings from literal pairs (handy for embedding and tests).
    pub fn from_pairs(plugin: impl Into<String>, pairs: &[(&str, &str)]) -> Self {
        let values = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Self::new(plugin, values)
    }

    pub fn plugin(&self) -> &str {
        &self.plugin
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    pub fn require(&self, key: &str) -> Result<&str, PluginError> {
        self.get(key).ok_or_else(|| PluginError::MissingSetting {
            plugin: self.plugin.clone(),
            key: key.to_string(),
        })
    }

    /// Parse an optional value. Absent keys give `Ok(None)`.
    pub fn parse<T>(&self, key: &str) -> Result<Option<T>, PluginError>
    where
        T: FromStr,
        T::Err: fmt::Display,
    {
        match self.get(key) {
            None => Ok(None),
            Some(raw) => raw
                .trim()
                .parse()
                .map(Some)
                .map_err(|e: T::Err| self.invalid(key, e.to_string())),
        }
    }

    /// `true` only for a literal `"true"` (any case).
    pub fn flag(&self, key: &str) -> bool {
        self.get(key).is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }

    pub fn invalid(&self, key: &str, reason: impl Into<String>) -> PluginError {
        PluginError::InvalidSetting {
            plugin: self.plugin.clone(),
            key: key.to_string(),
            reason: reason.into(),
        }
    }
}

/// Identity of a registered plugin, as seen by its siblings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PluginInfo {
    pub name: String,
    pub version: String,
    pub role: Role,
}

/// Read-only view of the owning application, used to discover siblings.
#[derive(Debug, Clone, Default)]
pub struct AppHandle {
    plugins: Arc<Vec<PluginInfo>>,
}

impl AppHandle {
    pub fn new(plugins: Vec<PluginInfo>) -> Self {
        Self {
            plugins: Arc::new(plugins),
        }
    }

    pub fn plugins(&self) -> &[PluginInfo] {
        &self.plugins
    }

    pub fn with_role(&self, role: Role) -> impl Iterator<Item = &PluginInfo> {
        self.plugins.iter().filter(move |p| p.role == role)
    }

    pub fn find(&self, name: &str) -> Option<&PluginInfo> {
        self.plugins.iter().find(|p| p.name == name)
    }
}

/// Everything injected into a plugin before `init`.
#[derive(Debug, Clone)]
pub struct PluginContext {
    pub log: Log,
    pub settings: Settings,
    pub app: AppHandle,
}

impl PluginContext {
    pub fn new(log: Log, settings: Settings, app: AppHandle) -> Self {
        Self { log, settings, app }
    }
}
