//! A local directory acting as a bucket.
//!
//! Keys map to paths under the root. The entity tag of an object is the MD5
//! of its bytes, the same value a single-part S3 upload reports, so the diff
//! engine behaves identically against either store.

use super::{Body, ObjectStore, StoreError};
use crate::diff;
use std::fs;
use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone)]
pub struct DirStore {
    root: PathBuf,
}

impl DirStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Resolve a key to a path under the root, rejecting anything that could
    /// escape it.
    fn resolve(&self, key: &str) -> Result<PathBuf, StoreError> {
        if key.is_empty() || key.starts_with('/') {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        for component in Path::new(key).components() {
            if !matches!(component, Component::Normal(_)) {
                return Err(StoreError::InvalidKey(key.to_string()));
            }
        }
        Ok(self.root.join(key))
    }
}

impl ObjectStore for DirStore {
    fn head(&self, key: &str) -> Result<String, StoreError> {
        let path = self.resolve(key)?;
        if !path.is_file() {
            return Err(StoreError::NotFound(key.to_string()));
        }
        Ok(diff::file_digest(&path)?)
    }

    fn put(&self, key: &str, body: Body) -> Result<u16, StoreError> {
        let path = self.resolve(key)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match body {
            Body::Bytes(bytes) => fs::write(&path, bytes)?,
            Body::File(source) => {
                fs::copy(&source, &path)?;
            }
        }
        Ok(200)
    }

    fn describe(&self, key: &str) -> String {
        format!("file://{}", self.root.join(key).display())
    }
}
