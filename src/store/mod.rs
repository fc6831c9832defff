//! Remote object store and CDN clients.
//!
//! The publish pipeline needs exactly three remote operations: read an
//! object's stored digest, write an object, and invalidate CDN paths. They are
//! expressed as two traits, [`ObjectStore`] and [`Cdn`], so the pipeline never
//! touches a provider SDK directly and tests can hand it in-memory fakes.
//!
//! Credential, region, and endpoint resolution happen in [`connect`], which
//! builds ready-to-use clients from the publisher's settings.
//!
//! | Store | Module | When |
//! |-------|--------|------|
//! | `dir` | [`dir`] | always; a local directory acts as the bucket |
//! | `s3`  | `s3`    | cargo feature `s3`; S3 + CloudFront |

pub mod dir;
#[cfg(feature = "s3")]
pub mod s3;

use crate::plugin::{PluginError, Settings};
use std::path::PathBuf;
use thiserror::Error;

pub use dir::DirStore;

#[derive(Error, Debug)]
pub enum StoreError {
    /// The object does not exist. Expected during digest lookups.
    #[error("Object not found: {0}")]
    NotFound(String),
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Invalid object key: {0}")]
    InvalidKey(String),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Payload of a put: in-memory bytes or a local file streamed by the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Body {
    Bytes(Vec<u8>),
    File(PathBuf),
}

/// Minimal object store client.
pub trait ObjectStore: Send + Sync {
    /// Stored digest (entity tag) of `key`, as the provider reports it.
    /// Returns [`StoreError::NotFound`] when the object does not exist.
    fn head(&self, key: &str) -> Result<String, StoreError>;

    /// Write `key` and return the provider's HTTP status code.
    fn put(&self, key: &str, body: Body) -> Result<u16, StoreError>;

    /// Human-readable location of `key`, for log lines.
    fn describe(&self, key: &str) -> String;
}

/// Minimal CDN client.
pub trait Cdn: Send + Sync {
    /// Request invalidation of `paths` and return the HTTP status code.
    fn create_invalidation(
        &self,
        distribution_id: &str,
        paths: &[String],
        caller_reference: &str,
    ) -> Result<u16, StoreError>;
}

/// Whether a status code counts as success.
pub fn is_success(status: u16) -> bool {
    (200..300).contains(&status)
}

/// Clients built from configuration.
pub struct Clients {
    pub store: Box<dyn ObjectStore>,
    pub cdn: Option<Box<dyn Cdn>>,
}

/// Build the store (and CDN, when one is configured) named by the `store`
/// setting. Defaults to the directory store.
pub fn connect(settings: &Settings) -> Result<Clients, PluginError> {
    match settings.get("store").unwrap_or("dir") {
        "dir" => {
            let root = settings.require("dir")?;
            Ok(Clients {
                store: Box::new(DirStore::new(root)),
                cdn: None,
            })
        }
        "s3" => connect_s3(settings),
        other => Err(settings.invalid("store", format!("unknown store kind '{other}'"))),
    }
}

#[cfg(feature = "s3")]
fn connect_s3(settings: &Settings) -> Result<Clients, PluginError> {
    s3::connect(settings)
}

#[cfg(not(feature = "s3"))]
fn connect_s3(settings: &Settings) -> Result<Clients, PluginError> {
    Err(settings.invalid("store", "built without the `s3` feature"))
}
