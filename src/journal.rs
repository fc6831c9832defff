//! JSON journal: the saving plugin behind `feedpress post`.
//!
//! All posts live in one JSON array, newest first. Saves are buffered in
//! memory and written out on `flush` (and on `dispose`). The file is replaced
//! atomically, by writing a sibling temp file and renaming it over the old
//! one, so a failed flush never leaves a truncated journal behind.

use crate::plugin::{Log, Plugin, PluginContext, PluginError, Saving};
use crate::post::Post;
use std::fs;
use std::path::{Path, PathBuf};

pub const JOURNAL: &str = "journal";

/// Read every post from the journal at `path`, newest first.
///
/// A missing journal is an empty feed.
pub fn load(path: &Path) -> Result<Vec<Post>, PluginError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let bytes = fs::read(path)?;
    let mut posts: Vec<Post> = serde_json::from_slice(&bytes)?;
    sort_newest_first(&mut posts);
    Ok(posts)
}

fn sort_newest_first(posts: &mut [Post]) {
    posts.sort_by(|a, b| b.created().cmp(&a.created()));
}

/// Saving plugin writing posts to a JSON file.
#[derive(Debug, Default)]
pub struct JsonJournal {
    path: PathBuf,
    posts: Vec<Post>,
    dirty: bool,
    log: Log,
}

impl JsonJournal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Posts known to the journal, including unflushed ones.
    pub fn posts(&self) -> &[Post] {
        &self.posts
    }

    fn temp_path(&self) -> PathBuf {
        let name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| JOURNAL.to_string());
        self.path.with_file_name(format!(".{name}.tmp"))
    }
}

impl Plugin for JsonJournal {
    fn name(&self) -> &str {
        JOURNAL
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, ctx: PluginContext) -> Result<(), PluginError> {
        self.path = PathBuf::from(ctx.settings.require("path")?);
        self.posts = load(&self.path)?;
        ctx.log.debug(
            &format!("Journal holds {} posts", self.posts.len()),
            Some(&self.path.display().to_string()),
        );
        self.log = ctx.log;
        Ok(())
    }

    fn dispose(&mut self) {
        if let Err(e) = self.flush() {
            self.log.error("Failed to flush journal on shutdown", Some(&e));
        }
    }
}

impl Saving for JsonJournal {
    /// Buffer `post`, replacing an earlier version with the same id.
    fn save(&mut self, post: &Post) -> Result<(), PluginError> {
        match self.posts.iter_mut().find(|p| p.id() == post.id()) {
            Some(existing) => *existing = post.clone(),
            None => self.posts.push(post.clone()),
        }
        self.dirty = true;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), PluginError> {
        if !self.dirty {
            return Ok(());
        }
        sort_newest_first(&mut self.posts);
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.temp_path();
        fs::write(&tmp, serde_json::to_vec_pretty(&self.posts)?)?;
        fs::rename(&tmp, &self.path)?;
        self.dirty = false;
        self.log.info(&format!(
            "Saved {} posts to {}",
            self.posts.len(),
            self.path.display()
        ));
        Ok(())
    }
}
