//! End-to-end publishing into a directory store with the stock theme.

use chrono::{Duration, Utc};
use feedpress::config::{Config, parse_config};
use feedpress::htmlize::Htmlize;
use feedpress::invalidate::Dispatch;
use feedpress::journal::{self, JsonJournal};
use feedpress::post::Post;
use feedpress::publish::SitePublisher;
use feedpress::registry::Registry;
use feedpress::store::DirStore;
use feedpress::types::PublishReport;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn config_for(work: &Path) -> Config {
    let themes = Path::new(env!("CARGO_MANIFEST_DIR")).join("themes");
    parse_config(&format!(
        r#"
[plugins.publisher]
dir = '{}'
themes_dir = '{}'
theme = "default"
posts_per_page = 2

[plugins.journal]
path = '{}'
"#,
        work.join("site").display(),
        themes.display(),
        work.join("posts.json").display(),
    ))
    .unwrap()
}

fn publishing_registry(config: &Config, work: &Path) -> Registry {
    let mut registry = Registry::new();
    registry.add_publishing(SitePublisher::new(
        Box::new(DirStore::new(work.join("site"))),
        None,
    ));
    registry.activate(config).into_result().unwrap();
    registry
}

/// Five posts, one minute apart, newest first.
fn feed() -> Vec<Post> {
    let now = Utc::now();
    (0..5)
        .map(|i| Post::with_created(format!("post number {i}"), now - Duration::minutes(i)))
        .collect()
}

fn publish_once(registry: &mut Registry, posts: &[Post]) -> PublishReport {
    let mut reports = registry.publish(posts).unwrap();
    assert_eq!(reports.len(), 1);
    reports.remove(0)
}

#[test]
fn publishes_pages_posts_and_assets() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    let mut registry = publishing_registry(&config, tmp.path());
    let posts = feed();

    let report = publish_once(&mut registry, &posts);

    let site = tmp.path().join("site");
    for page in ["index.html", "index1.html", "index2.html"] {
        assert!(site.join(page).is_file(), "missing {page}");
    }
    assert!(!site.join("index3.html").exists());
    for post in &posts {
        assert!(site.join(format!("posts/{}.html", post.id())).is_file());
    }
    assert!(site.join("assets/style.css").is_file());

    let first = fs::read_to_string(site.join("index.html")).unwrap();
    assert!(first.contains("post number 0"));
    assert!(first.contains("post number 1"));
    assert!(!first.contains("post number 2"));
    assert!(first.contains(r#"href="/index1.html""#));
    let last = fs::read_to_string(site.join("index2.html")).unwrap();
    assert!(last.contains("post number 4"));
    assert!(!last.contains("Older"));

    assert_eq!(report.index_pages, 3);
    assert_eq!(report.post_pages, 5);
    assert_eq!(report.assets, 1);
    assert_eq!(report.uploads.uploaded, 9);
    assert_eq!(report.invalidated.len(), 9);
    assert_eq!(report.invalidation, Dispatch::Disabled);
}

#[test]
fn second_run_uploads_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    let mut registry = publishing_registry(&config, tmp.path());
    let posts = feed();

    publish_once(&mut registry, &posts);
    let again = publish_once(&mut registry, &posts);

    assert_eq!(again.uploads.uploaded, 0);
    assert_eq!(again.uploads.unchanged, 9);
    assert!(again.invalidated.is_empty());
    assert_eq!(again.invalidation, Dispatch::Nothing);
}

#[test]
fn editing_one_post_touches_only_its_pages() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    let mut registry = publishing_registry(&config, tmp.path());
    let mut posts = feed();
    publish_once(&mut registry, &posts);

    posts[4].content = "post number 4, edited".to_string();
    let report = publish_once(&mut registry, &posts);

    assert_eq!(
        report.invalidated,
        vec![
            "/index2.html".to_string(),
            format!("/posts/{}.html", posts[4].id()),
        ]
    );
}

#[test]
fn empty_journal_publishes_nothing() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());
    let mut registry = publishing_registry(&config, tmp.path());

    let report = publish_once(&mut registry, &[]);

    assert_eq!(report, PublishReport::default());
    assert!(!tmp.path().join("site").exists());
}

#[test]
fn posts_flow_from_journal_to_site() {
    let tmp = TempDir::new().unwrap();
    let config = config_for(tmp.path());

    {
        let mut registry = Registry::new();
        registry.add_processing(Htmlize::new());
        registry.add_saving(JsonJournal::new());
        registry.activate(&config).into_result().unwrap();
        let post = registry
            .ingest(Post::new("Reading www.example.com today"))
            .unwrap();
        assert!(post.processed);
        registry.flush().unwrap();
    }

    let posts = journal::load(&tmp.path().join("posts.json")).unwrap();
    assert_eq!(posts.len(), 1);

    let mut registry = publishing_registry(&config, tmp.path());
    publish_once(&mut registry, &posts);

    let index = fs::read_to_string(tmp.path().join("site/index.html")).unwrap();
    assert!(index.contains(r#"Reading <a href="http://www.example.com">example.com</a> today"#));
}
