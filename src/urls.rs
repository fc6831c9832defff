//! URL recognition in free text.
//!
//! One grammar is shared by everything that looks for links in post text:
//! a run of non-space characters starting with `http://`, `https://` (any
//! case) or `www.`. Trailing sentence punctuation and unbalanced closing
//! brackets are not part of the URL:
//!
//! ```text
//! "see www.example.com/a."        -> www.example.com/a
//! "(https://example.com)"         -> https://example.com
//! "https://x.org/Rust_(language)" -> https://x.org/Rust_(language)
//! ```
//!
//! The remaining functions map a raw match to the forms used for links:
//! [`normalize`] and [`demobilize`] produce the link target, [`display`] the
//! link text.

use regex::Regex;
use std::sync::LazyLock;

static URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\b(?:https?://|www\.)[^\s<>"']+"#).expect("url regex")
});

const SCHEMES: [&str; 2] = ["https://", "http://"];
const MOBILE_PREFIXES: [&str; 2] = ["m.", "mobile."];

/// A URL found in text. `start..end` is the byte range of `raw`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlMatch<'a> {
    pub start: usize,
    pub end: usize,
    pub raw: &'a str,
}

/// Every URL in `text`, in order of appearance.
pub fn find_urls(text: &str) -> Vec<UrlMatch<'_>> {
    URL.find_iter(text)
        .filter_map(|m| {
            let raw = trim_trailing(m.as_str());
            if display(raw).is_empty() {
                return None;
            }
            Some(UrlMatch {
                start: m.start(),
                end: m.start() + raw.len(),
                raw,
            })
        })
        .collect()
}

fn trim_trailing(mut s: &str) -> &str {
    while let Some(last) = s.chars().last() {
        let trim = match last {
            '.' | ',' | ';' | ':' | '!' | '?' => true,
            ')' => unbalanced(s, '(', ')'),
            ']' => unbalanced(s, '[', ']'),
            '}' => unbalanced(s, '{', '}'),
            _ => false,
        };
        if !trim {
            break;
        }
        s = &s[..s.len() - last.len_utf8()];
    }
    s
}

fn unbalanced(s: &str, open: char, close: char) -> bool {
    s.matches(close).count() > s.matches(open).count()
}

/// Split off a leading `http://` or `https://`, matched case-insensitively.
/// The scheme is empty when there is none.
fn split_scheme(url: &str) -> (&str, &str) {
    for scheme in SCHEMES {
        if url
            .get(..scheme.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(scheme))
        {
            return url.split_at(scheme.len());
        }
    }
    ("", url)
}

fn host_end(rest: &str) -> usize {
    rest.find(['/', '?', '#']).unwrap_or(rest.len())
}

/// Absolute form: `http://` added when there is no scheme, scheme and host
/// lowercased. Path, query, and fragment are kept as written.
pub fn normalize(raw: &str) -> String {
    let (scheme, rest) = split_scheme(raw);
    let scheme = if scheme.is_empty() {
        "http://".to_string()
    } else {
        scheme.to_ascii_lowercase()
    };
    let end = host_end(rest);
    format!("{}{}{}", scheme, rest[..end].to_lowercase(), &rest[end..])
}

/// Drop an `m.` or `mobile.` host prefix, as long as a domain is left.
pub fn demobilize(url: &str) -> String {
    let (scheme, rest) = split_scheme(url);
    for prefix in MOBILE_PREFIXES {
        if !rest
            .get(..prefix.len())
            .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        {
            continue;
        }
        let stripped = &rest[prefix.len()..];
        if stripped[..host_end(stripped)].contains('.') {
            return format!("{scheme}{stripped}");
        }
    }
    url.to_string()
}

/// Short form for link text: no scheme, no leading `www.`, no trailing `/`.
pub fn display(raw: &str) -> &str {
    let (_, rest) = split_scheme(raw);
    let rest = match rest.get(..4) {
        Some(www) if www.eq_ignore_ascii_case("www.") => &rest[4..],
        _ => rest,
    };
    rest.strip_suffix('/').unwrap_or(rest)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raws(text: &str) -> Vec<&str> {
        find_urls(text).into_iter().map(|m| m.raw).collect()
    }

    // =========================================================================
    // find_urls
    // =========================================================================

    #[test]
    fn finds_all_prefixes() {
        assert_eq!(
            raws("a http://a.com b https://b.com c www.c.com d HTTPS://D.COM"),
            vec!["http://a.com", "https://b.com", "www.c.com", "HTTPS://D.COM"]
        );
    }

    #[test]
    fn trailing_punctuation_is_not_part_of_url() {
        assert_eq!(raws("Go to www.example.com/a."), vec!["www.example.com/a"]);
        assert_eq!(raws("really?! https://x.io!?"), vec!["https://x.io"]);
        assert_eq!(raws("https://x.io, then"), vec!["https://x.io"]);
    }

    #[test]
    fn unbalanced_brackets_are_trimmed() {
        assert_eq!(raws("(see https://example.com)"), vec!["https://example.com"]);
        assert_eq!(
            raws("https://en.wikipedia.org/wiki/Rust_(language)"),
            vec!["https://en.wikipedia.org/wiki/Rust_(language)"]
        );
        assert_eq!(raws("[www.a.com]."), vec!["www.a.com"]);
    }

    #[test]
    fn ranges_point_at_raw_text() {
        let text = "x (https://a.com) y";
        let m = find_urls(text)[0];
        assert_eq!(&text[m.start..m.end], "https://a.com");
    }

    #[test]
    fn stops_at_markup_and_quotes() {
        assert_eq!(raws("<p>www.a.com</p>"), vec!["www.a.com"]);
        assert_eq!(raws("href='http://a.com'"), vec!["http://a.com"]);
    }

    #[test]
    fn ignores_embedded_and_empty_prefixes() {
        assert!(raws("awww.example.com").is_empty());
        assert!(raws("just http:// here").is_empty());
        assert!(raws("www.").is_empty());
    }

    // =========================================================================
    // Forms
    // =========================================================================

    #[test]
    fn normalize_adds_scheme_and_lowercases_host() {
        assert_eq!(normalize("www.Example.com/Path"), "http://www.example.com/Path");
        assert_eq!(normalize("HTTPS://Example.COM"), "https://example.com");
        assert_eq!(normalize("http://a.com?Q=1"), "http://a.com?Q=1");
    }

    #[test]
    fn demobilize_strips_mobile_hosts() {
        assert_eq!(demobilize("http://m.example.com/a"), "http://example.com/a");
        assert_eq!(
            demobilize("https://mobile.twitter.com/x"),
            "https://twitter.com/x"
        );
        assert_eq!(demobilize("http://m.com"), "http://m.com");
        assert_eq!(demobilize("http://mail.example.com"), "http://mail.example.com");
    }

    #[test]
    fn display_is_short() {
        assert_eq!(display("https://www.example.com/"), "example.com");
        assert_eq!(display("http://example.com/a/"), "example.com/a");
        assert_eq!(display("WWW.example.com"), "example.com");
    }
}
