//! Remote key conventions for everything the publisher writes.
//!
//! ```text
//! index.html            page 0 of the feed
//! index1.html           page 1
//! index{N}.html         page N
//! posts/{id}.html       one page per post (hyphenated lowercase UUID)
//! assets/{relative}     theme assets, mirroring the theme's assets/ tree
//! ```
//!
//! Keys never start with `/`. The CDN path for a key is `/` + key.

use std::path::{Component, Path};
use uuid::Uuid;

/// Remote prefix under which theme assets are mirrored.
pub const ASSETS_PREFIX: &str = "assets";

/// Key for index page `page` (zero-based).
pub fn index_key(page: usize) -> String {
    if page == 0 {
        "index.html".to_string()
    } else {
        format!("index{page}.html")
    }
}

/// Key for a post's detail page.
pub fn post_key(id: Uuid) -> String {
    format!("posts/{id}.html")
}

/// Key for an asset, given its path relative to the theme's asset directory.
///
/// Components are joined with `/` regardless of platform. Returns `None` for
/// paths that are not plain relative paths.
pub fn asset_key(relative: &Path) -> Option<String> {
    let mut key = String::from(ASSETS_PREFIX);
    let mut any = false;
    for component in relative.components() {
        match component {
            Component::Normal(part) => {
                key.push('/');
                key.push_str(&part.to_string_lossy());
                any = true;
            }
            Component::CurDir => {}
            _ => return None,
        }
    }
    any.then_some(key)
}

/// CDN path to invalidate for a key.
pub fn invalidation_path(key: &str) -> String {
    format!("/{key}")
}
