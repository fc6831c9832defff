//! Themes and the renderer seam.
//!
//! The pipeline only knows the [`Renderer`] trait: give it an index context,
//! get HTML back; give it a post, get HTML back if the theme has a post page.
//! [`Theme`] is the production implementation, compiling Tera templates from
//! a theme directory once at activation:
//!
//! ```text
//! themes/
//! └── default/
//!     ├── index.html        # required: one index page of the feed
//!     ├── post.html         # optional: one page per post
//!     └── assets/           # optional: mirrored to assets/ in the bucket
//!         └── style.css
//! ```
//!
//! Templates are registered with an `.html` name, so Tera auto-escapes
//! interpolations. Post content that processing plugins already turned into
//! markup must be emitted with `{{ post.content | safe }}`.

use crate::post::Post;
use crate::types::IndexContext;
use std::fs;
use std::path::{Path, PathBuf};
use tera::{Context, Tera};
use thiserror::Error;

const INDEX: &str = "index.html";
const POST: &str = "post.html";

#[derive(Error, Debug)]
pub enum ThemeError {
    #[error("No theme was specified")]
    NoTheme,
    #[error("Could not find index template: {0}")]
    MissingIndex(PathBuf),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

/// Turns render contexts into HTML.
pub trait Renderer: Send + Sync {
    fn render_index(&self, ctx: &IndexContext<'_>) -> Result<String, ThemeError>;

    /// `Ok(None)` when the theme has no post page.
    fn render_post(&self, post: &Post) -> Result<Option<String>, ThemeError>;
}

/// A compiled theme.
pub struct Theme {
    name: String,
    dir: PathBuf,
    tera: Tera,
    has_post: bool,
}

impl Theme {
    /// Compile the theme `name` found under `themes_dir`.
    ///
    /// Fails when the name is empty, the index template is missing, or any
    /// template does not parse.
    pub fn load(themes_dir: &Path, name: &str) -> Result<Self, ThemeError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(ThemeError::NoTheme);
        }
        let dir = themes_dir.join(name);

        let index_path = dir.join(INDEX);
        if !index_path.is_file() {
            return Err(ThemeError::MissingIndex(index_path));
        }
        let mut tera = Tera::default();
        tera.add_raw_template(INDEX, &fs::read_to_string(&index_path)?)?;

        let post_path = dir.join(POST);
        let has_post = post_path.is_file();
        if has_post {
            tera.add_raw_template(POST, &fs::read_to_string(&post_path)?)?;
        }

        Ok(Self {
            name: name.to_string(),
            dir,
            tera,
            has_post,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn has_post_template(&self) -> bool {
        self.has_post
    }

    /// Directory whose contents are mirrored under `assets/`.
    pub fn assets_dir(&self) -> PathBuf {
        self.dir.join("assets")
    }
}

impl std::fmt::Debug for Theme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Theme")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("has_post", &self.has_post)
            .finish()
    }
}

impl Renderer for Theme {
    fn render_index(&self, ctx: &IndexContext<'_>) -> Result<String, ThemeError> {
        let context = Context::from_serialize(ctx)?;
        Ok(self.tera.render(INDEX, &context)?)
    }

    fn render_post(&self, post: &Post) -> Result<Option<String>, ThemeError> {
        if !self.has_post {
            return Ok(None);
        }
        let mut context = Context::new();
        context.insert("post", post);
        Ok(Some(self.tera.render(POST, &context)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::write_theme;
    use crate::types::PageInfo;
    use tempfile::TempDir;

    #[test]
    fn empty_name_is_rejected() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(
            Theme::load(tmp.path(), "  "),
            Err(ThemeError::NoTheme)
        ));
    }

    #[test]
    fn missing_index_is_fatal() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir_all(tmp.path().join("bare")).unwrap();
        fs::write(tmp.path().join("bare/post.html"), "{{ post.id }}").unwrap();
        assert!(matches!(
            Theme::load(tmp.path(), "bare"),
            Err(ThemeError::MissingIndex(p)) if p.ends_with("bare/index.html")
        ));
    }

    #[test]
    fn post_template_is_optional() {
        let tmp = TempDir::new().unwrap();
        write_theme(tmp.path(), "plain", "{{ page.num }}", None);
        let theme = Theme::load(tmp.path(), "plain").unwrap();
        assert!(!theme.has_post_template());
        assert_eq!(theme.render_post(&Post::new("x")).unwrap(), None);
    }

    #[test]
    fn renders_index_context() {
        let tmp = TempDir::new().unwrap();
        write_theme(
            tmp.path(),
            "t",
            "{% for p in posts %}[{{ p.content | safe }}]{% endfor %} {{ page.num }}/{{ page.max }} {{ page.is_last }}",
            None,
        );
        let theme = Theme::load(tmp.path(), "t").unwrap();
        let posts = vec![Post::new("<b>a</b>"), Post::new("b")];
        let html = theme
            .render_index(&IndexContext {
                posts: &posts,
                page: PageInfo::new(1, 1),
            })
            .unwrap();
        assert_eq!(html, "[<b>a</b>][b] 1/1 true");
    }

    #[test]
    fn renders_post_page_with_escaping() {
        let tmp = TempDir::new().unwrap();
        write_theme(
            tmp.path(),
            "t",
            "",
            Some("{{ post.id }}|{{ post.content }}|{{ post.images | length }}"),
        );
        let theme = Theme::load(tmp.path(), "t").unwrap();
        let mut post = Post::new("<i>hi</i>");
        post.attach("image", Some("https://x/1.jpg".into()), "");

        let html = theme.render_post(&post).unwrap().unwrap();
        assert!(html.starts_with(&post.id().to_string()));
        assert!(html.contains("&lt;i&gt;hi&lt;&#x2F;i&gt;"));
        assert!(html.ends_with("|1"));
    }

    #[test]
    fn broken_template_fails_at_load() {
        let tmp = TempDir::new().unwrap();
        write_theme(tmp.path(), "t", "{% for %}", None);
        assert!(matches!(
            Theme::load(tmp.path(), "t"),
            Err(ThemeError::Template(_))
        ));
    }

    #[test]
    fn assets_dir_is_inside_theme() {
        let tmp = TempDir::new().unwrap();
        write_theme(tmp.path(), "t", "x", None);
        let theme = Theme::load(tmp.path(), "t").unwrap();
        assert_eq!(theme.assets_dir(), tmp.path().join("t/assets"));
        assert_eq!(theme.name(), "t");
    }
}
