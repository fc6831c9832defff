//! Publish pipeline: turn an ordered post sequence into a paginated site.
//!
//! ## Remote Layout
//!
//! ```text
//! index.html            page 0, newest posts first
//! index1.html ...       later pages, `posts_per_page` posts each
//! posts/{id}.html       one page per post (only if the theme has post.html)
//! assets/...            the theme's assets/ tree, mirrored
//! ```
//!
//! ## Flow
//!
//! The post sequence is single-pass, so pages are built while it is consumed:
//!
//! 1. For each post, render and upload its post page, then buffer it.
//! 2. When the buffer holds `posts_per_page` posts, render and upload the
//!    next index page and start a new buffer.
//! 3. A non-empty buffer left at the end becomes the last index page.
//! 4. The theme's assets are synced.
//! 5. Every path that was actually uploaded is invalidated in one request.
//!
//! The number of index pages is fixed before any post is seen:
//! `ceil(count / posts_per_page)`, so every page knows the last page number.
//! Nothing is uploaded for an empty feed, assets included.
//!
//! Every upload goes through the [`Uploader`], which skips content the store
//! already holds. Re-running a publish with nothing changed uploads nothing
//! and invalidates nothing.

use crate::diff::Uploader;
use crate::invalidate::{self, Dispatcher};
use crate::naming;
use crate::plugin::{Log, Plugin, PluginContext, PluginError, Publishing};
use crate::post::Post;
use crate::store::{Cdn, ObjectStore, StoreError};
use crate::theme::{Renderer, Theme, ThemeError};
use crate::types::{IndexContext, PageInfo, PublishReport};
use rayon::prelude::*;
use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum PublishError {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
    #[error("Render error: {0}")]
    Theme(#[from] ThemeError),
    #[error("Failed to walk assets: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Could not start upload workers: {0}")]
    Pool(String),
}

// ============================================================================
// Pagination
// ============================================================================

/// Posts for one index page.
#[derive(Debug)]
pub struct PageBatch {
    pub posts: Vec<Post>,
    pub info: PageInfo,
}

/// Page accounting for a single pass over `count` posts.
#[derive(Debug)]
pub struct Paginator {
    per_page: NonZeroUsize,
    max_page: usize,
    page: usize,
    buffer: Vec<Post>,
}

impl Paginator {
    pub fn new(count: usize, per_page: NonZeroUsize) -> Self {
        Self {
            per_page,
            max_page: max_page(count, per_page),
            page: 0,
            buffer: Vec::with_capacity(per_page.get()),
        }
    }

    /// Zero-based number of the last page.
    pub fn max_page(&self) -> usize {
        self.max_page
    }

    /// Buffer a post. Returns a full page once `per_page` posts are buffered.
    pub fn push(&mut self, post: Post) -> Option<PageBatch> {
        self.buffer.push(post);
        if self.buffer.len() < self.per_page.get() {
            return None;
        }
        Some(self.take())
    }

    /// The partial last page, if any posts are still buffered.
    pub fn finish(mut self) -> Option<PageBatch> {
        if self.buffer.is_empty() {
            None
        } else {
            Some(self.take())
        }
    }

    fn take(&mut self) -> PageBatch {
        let batch = PageBatch {
            posts: std::mem::take(&mut self.buffer),
            info: PageInfo::new(self.page, self.max_page),
        };
        self.page += 1;
        batch
    }
}

/// `ceil(count / per_page) - 1`, or 0 for an empty feed.
pub fn max_page(count: usize, per_page: NonZeroUsize) -> usize {
    count.div_ceil(per_page.get()).saturating_sub(1)
}

// ============================================================================
// Assets
// ============================================================================

/// Every file under `dir` with its remote key, sorted by path.
pub fn collect_assets(dir: &Path) -> Result<Vec<(String, PathBuf)>, PublishError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Ok(relative) = entry.path().strip_prefix(dir) else {
            continue;
        };
        if let Some(key) = naming::asset_key(relative) {
            files.push((key, entry.path().to_path_buf()));
        }
    }
    Ok(files)
}

/// Resolve the number of parallel asset uploads.
///
/// - `None` → one worker per available core
/// - `Some(n)` → `n` workers (at least one)
pub fn effective_uploads(max_uploads: Option<usize>) -> usize {
    match max_uploads {
        Some(n) => n.max(1),
        None => std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1),
    }
}

// ============================================================================
// Pipeline
// ============================================================================

/// One publish run against a store, independent of plugin plumbing.
pub struct Pipeline<'a> {
    renderer: &'a dyn Renderer,
    uploader: Uploader<'a>,
    log: &'a Log,
    per_page: NonZeroUsize,
    assets_dir: Option<PathBuf>,
    max_uploads: Option<usize>,
}

impl<'a> Pipeline<'a> {
    pub fn new(
        renderer: &'a dyn Renderer,
        store: &'a dyn ObjectStore,
        log: &'a Log,
        per_page: NonZeroUsize,
    ) -> Self {
        Self {
            renderer,
            uploader: Uploader::new(store, log),
            log,
            per_page,
            assets_dir: None,
            max_uploads: None,
        }
    }

    /// Mirror `dir` under `assets/` after the pages are published.
    pub fn with_assets(mut self, dir: PathBuf) -> Self {
        self.assets_dir = Some(dir);
        self
    }

    pub fn with_max_uploads(mut self, max_uploads: Option<usize>) -> Self {
        self.max_uploads = max_uploads;
        self
    }

    /// Render and upload everything. The returned report lists the paths
    /// that changed; invalidating them is left to the caller.
    pub fn run(
        &self,
        posts: &mut dyn Iterator<Item = Post>,
        count: usize,
    ) -> Result<PublishReport, PublishError> {
        let mut report = PublishReport::default();
        if count == 0 {
            self.log.info("No posts to publish");
            return Ok(report);
        }

        let mut paginator = Paginator::new(count, self.per_page);
        let mut paths = BTreeSet::new();
        self.log.debug(
            &format!(
                "Publishing {} posts on {} pages",
                count,
                paginator.max_page() + 1
            ),
            None,
        );

        for post in posts {
            if let Some(html) = self.renderer.render_post(&post)? {
                paths.extend(
                    self.uploader
                        .upload_content(&naming::post_key(post.id()), &html)?,
                );
                report.post_pages += 1;
            }
            if let Some(batch) = paginator.push(post) {
                paths.extend(self.publish_page(&batch)?);
                report.index_pages += 1;
            }
        }
        if let Some(batch) = paginator.finish() {
            paths.extend(self.publish_page(&batch)?);
            report.index_pages += 1;
        }

        if let Some(dir) = &self.assets_dir {
            let (assets, changed) = self.sync_assets(dir)?;
            report.assets = assets;
            paths.extend(changed);
        }

        report.uploads = self.uploader.stats();
        report.invalidated = paths.into_iter().collect();
        Ok(report)
    }

    fn publish_page(&self, batch: &PageBatch) -> Result<Option<String>, PublishError> {
        let html = self.renderer.render_index(&IndexContext {
            posts: &batch.posts,
            page: batch.info,
        })?;
        Ok(self
            .uploader
            .upload_content(&naming::index_key(batch.info.num), &html)?)
    }

    /// Upload every asset file, in parallel. Returns the number of files
    /// examined and the paths that changed.
    fn sync_assets(&self, dir: &Path) -> Result<(usize, Vec<String>), PublishError> {
        if !dir.is_dir() {
            self.log.info(&format!(
                "No assets directory at {}, skipping asset sync",
                dir.display()
            ));
            return Ok((0, Vec::new()));
        }

        let files = collect_assets(dir)?;
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(effective_uploads(self.max_uploads))
            .build()
            .map_err(|e| PublishError::Pool(e.to_string()))?;

        let uploader = &self.uploader;
        let results: Result<Vec<Option<String>>, StoreError> = pool.install(|| {
            files
                .par_iter()
                .map(|(key, path)| uploader.upload_file(key, path))
                .collect()
        });
        let changed = results?.into_iter().flatten().collect();
        Ok((files.len(), changed))
    }
}

// ============================================================================
// Publisher plugin
// ============================================================================

pub const PUBLISHER: &str = "publisher";

struct Active {
    log: Log,
    renderer: Box<dyn Renderer>,
    assets_dir: PathBuf,
    per_page: NonZeroUsize,
    distribution_id: Option<String>,
    max_uploads: Option<usize>,
}

/// Publishing plugin that renders the feed with a theme and syncs it to an
/// object store, invalidating changed paths on the CDN.
///
/// Settings:
///
/// | Key | Required | Meaning |
/// |-----|----------|---------|
/// | `theme` | yes | theme directory name |
/// | `posts_per_page` | yes | positive integer |
/// | `themes_dir` | no | where themes live (default `themes`) |
/// | `distribution_id` | no | CDN distribution; no invalidation without it |
/// | `max_uploads` | no | parallel asset uploads (default: core count) |
pub struct SitePublisher {
    store: Box<dyn ObjectStore>,
    cdn: Option<Box<dyn Cdn>>,
    active: Option<Active>,
}

impl SitePublisher {
    pub fn new(store: Box<dyn ObjectStore>, cdn: Option<Box<dyn Cdn>>) -> Self {
        Self {
            store,
            cdn,
            active: None,
        }
    }

    fn run(
        &self,
        active: &Active,
        posts: &mut dyn Iterator<Item = Post>,
        count: usize,
    ) -> Result<PublishReport, PublishError> {
        let pipeline = Pipeline::new(
            active.renderer.as_ref(),
            self.store.as_ref(),
            &active.log,
            active.per_page,
        )
        .with_assets(active.assets_dir.clone())
        .with_max_uploads(active.max_uploads);

        let mut report = pipeline.run(posts, count)?;
        let paths: BTreeSet<String> = report.invalidated.iter().cloned().collect();
        let dispatcher = Dispatcher::new(
            self.cdn.as_deref(),
            active.distribution_id.as_deref(),
            &active.log,
        );
        report.invalidation = dispatcher.dispatch(&paths, &invalidate::caller_reference())?;
        active.log.info(&format!("Published: {}", report.uploads));
        Ok(report)
    }
}

impl Plugin for SitePublisher {
    fn name(&self) -> &str {
        PUBLISHER
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, ctx: PluginContext) -> Result<(), PluginError> {
        let settings = &ctx.settings;
        let theme_name = settings.require("theme")?;
        settings.require("posts_per_page")?;
        let per_page = settings
            .parse::<usize>("posts_per_page")?
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| settings.invalid("posts_per_page", "must be a positive integer"))?;
        let max_uploads = settings.parse::<usize>("max_uploads")?;
        if max_uploads == Some(0) {
            return Err(settings.invalid("max_uploads", "must be a positive integer"));
        }
        let themes_dir = PathBuf::from(settings.get("themes_dir").unwrap_or("themes"));

        let theme = Theme::load(&themes_dir, theme_name)?;
        if !theme.has_post_template() {
            ctx.log
                .info("Post template not found, post pages will not be generated.");
        }
        ctx.log.debug(
            &format!("Loaded theme {}", theme.name()),
            Some(&themes_dir.display().to_string()),
        );

        self.active = Some(Active {
            assets_dir: theme.assets_dir(),
            renderer: Box::new(theme),
            per_page,
            distribution_id: settings.get("distribution_id").map(str::to_string),
            max_uploads,
            log: ctx.log,
        });
        Ok(())
    }

    fn dispose(&mut self) {
        self.active = None;
    }
}

impl Publishing for SitePublisher {
    fn publish(
        &mut self,
        posts: &mut dyn Iterator<Item = Post>,
        count: usize,
    ) -> Result<PublishReport, PluginError> {
        let active = self
            .active
            .as_ref()
            .ok_or_else(|| PluginError::Inactive(PUBLISHER.to_string()))?;
        self.run(active, posts, count).map_err(|e| {
            active.log.error("Publishing failed", Some(&e));
            PluginError::from(e)
        })
    }
}
