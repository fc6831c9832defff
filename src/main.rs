use clap::{Parser, Subcommand};
use feedpress::config::{self, Config};
use feedpress::htmlize::Htmlize;
use feedpress::journal::{self, JOURNAL, JsonJournal};
use feedpress::logging::{self, TracingLogger};
use feedpress::post::{IMAGE, Post};
use feedpress::publish::{PUBLISHER, SitePublisher};
use feedpress::registry::Registry;
use feedpress::{output, store};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "feedpress")]
#[command(about = "Publish a post feed as a static site, uploading only what changed")]
#[command(long_about = "\
Publish a post feed as a static site, uploading only what changed

Posts are saved to a JSON journal. Publishing renders the journal through a
theme into paginated index pages and one page per post, compares every page
and asset with what the store already holds, uploads the differences, and
invalidates exactly those paths on the CDN.

Remote layout:

  index.html          newest posts
  index1.html ...     older pages
  posts/<id>.html     one page per post (if the theme has post.html)
  assets/...          the theme's assets/ directory

Theme layout:

  themes/<name>/
  ├── index.html      Tera template: posts[], page.num, page.max, page.is_first, page.is_last
  ├── post.html       Tera template: post.id, post.created, post.content, post.images[]
  └── assets/         mirrored to assets/

Run 'feedpress gen-config' to generate a documented feedpress.toml.")]
#[command(version)]
struct Cli {
    /// Configuration file
    #[arg(long, default_value = "feedpress.toml", global = true)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a post, run it through processing, and save it to the journal
    Post {
        /// Post text
        text: String,
        /// Attach an image by URL (repeatable)
        #[arg(long = "image", value_name = "URL")]
        images: Vec<String>,
        /// Attach a link (repeatable)
        #[arg(long = "link", value_name = "URL")]
        links: Vec<String>,
    },
    /// Render the journal and upload what changed
    Publish,
    /// Activate every plugin and report which ones work
    Check,
    /// Print a stock feedpress.toml with all options documented
    GenConfig,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    if let Command::GenConfig = cli.command {
        print!("{}", config::stock_config_toml());
        return Ok(());
    }

    let config = config::load_config(&cli.config)?;
    logging::init_tracing(&config.logging.filter);

    match cli.command {
        Command::Post {
            text,
            images,
            links,
        } => {
            let mut registry = build_registry(&config, false)?;
            registry.activate(&config).into_result()?;

            let mut post = Post::new(text);
            for url in images {
                post.attach(IMAGE, Some(url.clone()), url);
            }
            for url in links {
                post.attach("link", Some(url.clone()), url);
            }
            let post = registry.ingest(post)?;
            registry.flush()?;
            output::print_post(&post);
        }
        Command::Publish => {
            let mut registry = build_registry(&config, true)?;
            registry.activate(&config).into_result()?;

            let journal_settings = config.settings_for(JOURNAL);
            let posts = journal::load(&PathBuf::from(journal_settings.require("path")?))?;
            for report in registry.publish(&posts)? {
                output::print_publish_report(&report);
            }
        }
        Command::Check => {
            let mut registry = build_registry(&config, true)?;
            let report = registry.activate(&config);
            output::print_activation(&report);
            if !report.is_ok() {
                let failed = report.failed.len();
                return Err(format!("{failed} plugin(s) failed to activate").into());
            }
        }
        Command::GenConfig => {}
    }

    Ok(())
}

/// The stock plugin set. The publisher needs remote clients, so it is only
/// registered for commands that publish.
fn build_registry(
    config: &Config,
    with_publisher: bool,
) -> Result<Registry, Box<dyn std::error::Error>> {
    let mut registry = Registry::new();
    registry.add_logging(TracingLogger::new());
    registry.add_processing(Htmlize::new());
    registry.add_saving(JsonJournal::new());
    if with_publisher {
        let clients = store::connect(&config.settings_for(PUBLISHER))?;
        registry.add_publishing(SitePublisher::new(clients.store, clients.cdn));
    }
    Ok(registry)
}
