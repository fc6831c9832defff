//! Processing plugin that turns post text into light HTML.
//!
//! Two passes over the post content and every attachment that allows
//! processing:
//!
//! 1. **Links.** Each URL outside an existing `<a>` element and outside any
//!    tag's markup (`<img src="...">`) becomes an anchor. The target is the normalized, demobilized URL; the text is its
//!    short display form. When several spellings lead to the same target,
//!    only the spelling seen first is linked.
//! 2. **Line breaks.** With `allow_newlines = true`, `\n` and `\r\n` become
//!    `<br>`.
//!
//! Running the plugin again over its own output changes nothing.

use crate::plugin::{Log, Plugin, PluginContext, PluginError, Processing};
use crate::post::Post;
use crate::urls;
use maud::html;
use regex::Regex;
use std::sync::LazyLock;

static ANCHOR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<a\b[^>]*>.*?</a\s*>").expect("anchor regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^<>]*>").expect("tag regex"));

static NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\r?\n").expect("newline regex"));

pub const HTMLIZE: &str = "htmlize";

/// Link URLs in `text` and, if asked, turn line breaks into `<br>`.
pub fn htmlize(text: &str, allow_newlines: bool) -> String {
    let protected: Vec<_> = ANCHOR
        .find_iter(text)
        .chain(TAG.find_iter(text))
        .map(|m| m.range())
        .collect();
    // target -> raw spelling that introduced it
    let mut linked: Vec<(String, &str)> = Vec::new();
    let mut out = String::with_capacity(text.len());
    let mut last = 0;

    for found in urls::find_urls(text) {
        if protected
            .iter()
            .any(|a| a.start < found.end && found.start < a.end)
        {
            continue;
        }
        let target = urls::demobilize(&urls::normalize(found.raw));
        let first = match linked.iter().find(|(t, _)| *t == target) {
            Some((_, raw)) => *raw,
            None => {
                linked.push((target.clone(), found.raw));
                found.raw
            }
        };
        if first != found.raw {
            continue;
        }
        out.push_str(&text[last..found.start]);
        out.push_str(&anchor(&target, urls::display(found.raw)));
        last = found.end;
    }
    out.push_str(&text[last..]);

    if allow_newlines {
        NEWLINE.replace_all(&out, "<br>").into_owned()
    } else {
        out
    }
}

fn anchor(href: &str, label: &str) -> String {
    html! { a href=(href) { (label) } }.into_string()
}

/// The `htmlize` processing plugin.
#[derive(Debug, Default)]
pub struct Htmlize {
    allow_newlines: bool,
    log: Log,
}

impl Htmlize {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Plugin for Htmlize {
    fn name(&self) -> &str {
        HTMLIZE
    }

    fn version(&self) -> &str {
        "0.5"
    }

    fn init(&mut self, ctx: PluginContext) -> Result<(), PluginError> {
        self.allow_newlines = ctx.settings.flag("allow_newlines");
        self.log = ctx.log;
        Ok(())
    }
}

impl Processing for Htmlize {
    fn process(&mut self, post: &mut Post) -> Result<(), PluginError> {
        self.log
            .debug("Htmlizing post", Some(&post.id().to_string()));
        post.content = htmlize(&post.content, self.allow_newlines);
        for content in post.processable_attachments_mut() {
            *content = htmlize(content, self.allow_newlines);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::{AppHandle, Settings};
    use crate::test_helpers::memory_log;

    #[test]
    fn links_urls_with_short_text() {
        assert_eq!(
            htmlize("read https://www.example.com/ now", false),
            r#"read <a href="https://www.example.com/">example.com</a> now"#
        );
    }

    #[test]
    fn adds_scheme_and_drops_mobile_host() {
        assert_eq!(
            htmlize("m.example.com? no: www.m.example.com", false),
            r#"m.example.com? no: <a href="http://www.m.example.com">m.example.com</a>"#
        );
        assert_eq!(
            htmlize("https://m.example.com/a", false),
            r#"<a href="https://example.com/a">m.example.com/a</a>"#
        );
    }

    #[test]
    fn trailing_punctuation_stays_outside_link() {
        assert_eq!(
            htmlize("(see www.a.com).", false),
            r#"(see <a href="http://www.a.com">a.com</a>)."#
        );
    }

    #[test]
    fn first_spelling_wins_for_a_target() {
        let out = htmlize("www.A.com and www.a.com and www.A.com", false);
        assert_eq!(
            out,
            r#"<a href="http://www.a.com">A.com</a> and www.a.com and <a href="http://www.a.com">A.com</a>"#
        );
    }

    #[test]
    fn escapes_attribute_and_text() {
        assert_eq!(
            htmlize("http://a.com/?x=1&y=2", false),
            r#"<a href="http://a.com/?x=1&amp;y=2">a.com/?x=1&amp;y=2</a>"#
        );
    }

    #[test]
    fn existing_anchors_are_left_alone() {
        let text = r#"<a href="http://a.com">http://a.com</a> and http://b.com"#;
        assert_eq!(
            htmlize(text, false),
            r#"<a href="http://a.com">http://a.com</a> and <a href="http://b.com">b.com</a>"#
        );
    }

    #[test]
    fn urls_inside_tag_attributes_are_left_alone() {
        let text = r#"<img src="http://a.com/x.png" alt=""> via www.b.com"#;
        assert_eq!(
            htmlize(text, false),
            r#"<img src="http://a.com/x.png" alt=""> via <a href="http://www.b.com">b.com</a>"#
        );
    }

    #[test]
    fn newlines_only_when_allowed() {
        assert_eq!(htmlize("a\nb\r\nc", false), "a\nb\r\nc");
        assert_eq!(htmlize("a\nb\r\nc", true), "a<br>b<br>c");
    }

    #[test]
    fn running_twice_changes_nothing() {
        let once = htmlize("see https://x.io/a\nand www.y.com!", true);
        assert_eq!(htmlize(&once, true), once);
    }

    #[test]
    fn plugin_processes_content_and_text_attachments() {
        let (log, _) = memory_log();
        let mut plugin = Htmlize::new();
        plugin
            .init(PluginContext::new(
                log,
                Settings::from_pairs(HTMLIZE, &[("allow_newlines", "true")]),
                AppHandle::default(),
            ))
            .unwrap();

        let mut post = Post::new("hi\nwww.a.com");
        post.attach("image", Some("https://img/1.jpg".into()), "https://img/1.jpg");
        post.attach("quote", None, "via https://b.com");
        plugin.process(&mut post).unwrap();

        assert_eq!(post.content, r#"hi<br><a href="http://www.a.com">a.com</a>"#);
        let attachments = post.attachments();
        assert_eq!(attachments[0].content, "https://img/1.jpg");
        assert_eq!(
            attachments[1].content,
            r#"via <a href="https://b.com">b.com</a>"#
        );
    }
}
