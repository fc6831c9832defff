//! # feedpress
//!
//! Publishes an aggregated post feed as a paginated static site. Posts come
//! in through plugins, get rewritten by processing plugins, are saved to a
//! journal, and are finally rendered through a theme and uploaded to an
//! object store. Only artifacts whose content changed are uploaded, and only
//! those are invalidated on the CDN.
//!
//! # Architecture: Plugins Around a Publish Pipeline
//!
//! ```text
//! posting ──► processing ──► saving ──► publishing
//!  (ping)     (htmlize)     (journal)   (publisher)
//!                                          │
//!                     render ──► diff ──► upload ──► invalidate
//! ```
//!
//! Every stage is a plugin role. The [`registry`] owns the plugins, one typed
//! collection per role, and moves posts between them. The publisher plugin is
//! a thin shell around the [`publish`] pipeline, which is testable on its own
//! with an in-memory store and a trivial renderer.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`post`] | Post and attachment data model |
//! | [`plugin`] | Plugin traits, injected context, log fan-out, settings lookup |
//! | [`registry`] | Plugin ownership, activation lifecycle, post flow between roles |
//! | [`config`] | `feedpress.toml` loading, merging, validation, per-plugin settings |
//! | [`store`] | Object store and CDN client traits, directory store, S3/CloudFront clients |
//! | [`diff`] | Content diff engine: MD5 vs stored ETag, diff-gated uploads |
//! | [`naming`] | Remote key conventions for pages, posts, and assets |
//! | [`types`] | Template render contexts and the publish report |
//! | [`theme`] | Renderer seam and the Tera theme loader |
//! | [`publish`] | Pagination, asset sync, and the site publisher plugin |
//! | [`invalidate`] | One CDN invalidation per publish run |
//! | [`urls`] | URL recognition and normalization |
//! | [`htmlize`] | Processing plugin linking URLs and line breaks |
//! | [`journal`] | Saving plugin keeping posts in a JSON file |
//! | [`logging`] | `tracing` setup and the logging plugin that feeds it |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Content-Addressed Uploads
//!
//! Each page is rendered on every run, hashed, and compared with the stored
//! object's ETag before upload. Rendering is cheap next to a network round
//! trip, and comparing rendered output catches every reason a page may have
//! changed (post edits, template edits, pagination shifts) without tracking
//! any of them.
//!
//! ## Capabilities Over Inheritance
//!
//! A plugin is one base trait plus the role traits it implements. The
//! registry stores each role in its own collection, so routing a post never
//! needs a downcast.
//!
//! ## Tera Themes
//!
//! Site pages are rendered from user-editable Tera templates, so a theme can
//! change without rebuilding the binary. Small fixed fragments, like the
//! anchors inserted by [`htmlize`], are produced with Maud.

pub mod config;
pub mod diff;
pub mod htmlize;
pub mod invalidate;
pub mod journal;
pub mod logging;
pub mod naming;
pub mod output;
pub mod plugin;
pub mod post;
pub mod publish;
pub mod registry;
pub mod store;
pub mod theme;
pub mod types;
pub mod urls;

#[cfg(test)]
pub(crate) mod test_helpers;
