//! CLI output formatting for every command.
//!
//! # Information-First Display
//!
//! Output is **information-centric**: each entity (post, plugin, publish
//! run) gets a header line naming it, followed by indented context lines.
//! Remote keys and paths are secondary context, never the headline.
//!
//! # Output Format
//!
//! ## Post
//!
//! ```text
//! Post 67e55044-10b1-426f-9247-bb680e5fe0c8
//!     Created: 2026-10-16 09:30:00 UTC
//!     Content: Reading example.com today
//!     001 image https://example.com/cat.jpg
//! ```
//!
//! ## Check
//!
//! ```text
//! Plugins
//! 001 tracing v0.6.0 (logging)
//! 002 publisher v0.6.0 (publishing)
//!     Failed: Missing required setting 'theme' for plugin publisher
//! ```
//!
//! ## Publish
//!
//! ```text
//! Published 3 index pages, 5 post pages, 2 assets
//!     Uploads: 2 uploaded, 8 unchanged (10 total)
//!     Invalidation: created for 2 paths
//!     /index.html
//!     /posts/67e55044-10b1-426f-9247-bb680e5fe0c8.html
//! ```
//!
//! # Architecture
//!
//! Each command has a `format_*` function (returns `Vec<String>`) for
//! testability and a `print_*` wrapper that writes to stdout. Format
//! functions are pure: no I/O, no side effects.

use crate::invalidate::Dispatch;
use crate::plugin::PluginInfo;
use crate::post::Post;
use crate::registry::ActivationReport;
use crate::types::PublishReport;

const PREVIEW_CHARS: usize = 60;

// ============================================================================
// Shared helpers
// ============================================================================

/// Format a 1-based position as a zero-padded 3-digit string.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

/// Return indentation string: 4 spaces per depth level.
fn indent(depth: usize) -> String {
    "    ".repeat(depth)
}

/// Strip HTML tags from a string (simple angle-bracket stripping).
fn strip_html_tags(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }
    result
}

/// Truncate text to `max` characters, appending `...` if truncated.
fn truncate_desc(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        None => text.to_string(),
        Some((cut, _)) => format!("{}...", &text[..cut]),
    }
}

/// One-line preview of possibly multi-line HTML content.
fn preview(content: &str) -> String {
    let text = strip_html_tags(content);
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    truncate_desc(&flat, PREVIEW_CHARS)
}

fn plural(n: usize, one: &str, many: &str) -> String {
    if n == 1 {
        format!("{} {}", n, one)
    } else {
        format!("{} {}", n, many)
    }
}

fn plugin_line(index: usize, info: &PluginInfo) -> String {
    format!(
        "{} {} v{} ({})",
        format_index(index),
        info.name,
        info.version,
        info.role
    )
}

// ============================================================================
// Post
// ============================================================================

/// Describe a freshly created post.
pub fn format_post(post: &Post) -> Vec<String> {
    let mut lines = vec![format!("Post {}", post.id())];
    lines.push(format!(
        "{}Created: {}",
        indent(1),
        post.created().format("%Y-%m-%d %H:%M:%S UTC")
    ));
    let content = preview(&post.content);
    if !content.is_empty() {
        lines.push(format!("{}Content: {}", indent(1), content));
    }
    for (i, attachment) in post.attachments().iter().enumerate() {
        let what = attachment
            .url
            .clone()
            .unwrap_or_else(|| preview(&attachment.content));
        lines.push(format!(
            "{}{} {} {}",
            indent(1),
            format_index(i + 1),
            attachment.kind,
            what
        ));
    }
    lines
}

pub fn print_post(post: &Post) {
    for line in format_post(post) {
        println!("{}", line);
    }
}

// ============================================================================
// Check
// ============================================================================

/// List activated plugins, then failed ones with their errors.
pub fn format_activation(report: &ActivationReport) -> Vec<String> {
    let mut lines = vec!["Plugins".to_string()];
    let mut index = 0;
    for info in &report.activated {
        index += 1;
        lines.push(plugin_line(index, info));
    }
    for (info, err) in &report.failed {
        index += 1;
        lines.push(plugin_line(index, info));
        lines.push(format!("{}Failed: {}", indent(1), err));
    }
    if index == 0 {
        lines.push(format!("{}(none registered)", indent(1)));
    }
    lines
}

pub fn print_activation(report: &ActivationReport) {
    for line in format_activation(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Publish
// ============================================================================

fn format_dispatch(dispatch: &Dispatch) -> String {
    match dispatch {
        Dispatch::Nothing => "nothing changed".to_string(),
        Dispatch::Disabled => "disabled (no CDN distribution)".to_string(),
        Dispatch::Created { paths } => {
            format!("created for {}", plural(*paths, "path", "paths"))
        }
        Dispatch::Rejected(status) => format!("rejected (status {})", status),
    }
}

/// Summarize a publish run.
pub fn format_publish_report(report: &PublishReport) -> Vec<String> {
    if report.index_pages == 0 {
        return vec!["Nothing to publish".to_string()];
    }
    let mut lines = vec![format!(
        "Published {}, {}, {}",
        plural(report.index_pages, "index page", "index pages"),
        plural(report.post_pages, "post page", "post pages"),
        plural(report.assets, "asset", "assets"),
    )];
    lines.push(format!("{}Uploads: {}", indent(1), report.uploads));
    lines.push(format!(
        "{}Invalidation: {}",
        indent(1),
        format_dispatch(&report.invalidation)
    ));
    for path in &report.invalidated {
        lines.push(format!("{}{}", indent(1), path));
    }
    lines
}

pub fn print_publish_report(report: &PublishReport) {
    for line in format_publish_report(report) {
        println!("{}", line);
    }
}

// ============================================================================
// Tests
// ============================================================================
