//! Shared types passed between the pipeline, the renderer, and the CLI.
//!
//! The render contexts are serialized into template variables, so their
//! field names are part of the theme contract:
//!
//! ```text
//! index.html:  posts[], page.num, page.max, page.is_first, page.is_last
//! post.html:   post.id, post.created, post.content, post.attachments[], post.images[]
//! ```

use crate::diff::UploadStats;
use crate::invalidate::Dispatch;
use crate::post::Post;
use serde::Serialize;

/// Position of an index page within the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PageInfo {
    /// Zero-based page number.
    pub num: usize,
    /// Zero-based number of the last page.
    pub max: usize,
    pub is_first: bool,
    pub is_last: bool,
}

impl PageInfo {
    pub fn new(num: usize, max: usize) -> Self {
        Self {
            num,
            max,
            is_first: num == 0,
            is_last: num == max,
        }
    }
}

/// Template context for one index page.
#[derive(Debug, Serialize)]
pub struct IndexContext<'a> {
    pub posts: &'a [Post],
    pub page: PageInfo,
}

/// What a publish run did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishReport {
    /// Index pages rendered (uploaded or found unchanged).
    pub index_pages: usize,
    /// Post pages rendered.
    pub post_pages: usize,
    /// Asset files examined.
    pub assets: usize,
    /// Paths handed to the invalidation dispatcher, sorted.
    pub invalidated: Vec<String>,
    pub invalidation: Dispatch,
    pub uploads: UploadStats,
}

impl Default for PublishReport {
    fn default() -> Self {
        Self {
            index_pages: 0,
            post_pages: 0,
            assets: 0,
            invalidated: Vec::new(),
            invalidation: Dispatch::Nothing,
            uploads: UploadStats::default(),
        }
    }
}
