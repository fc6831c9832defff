//! Application configuration.
//!
//! Handles loading, validating, and merging `feedpress.toml`. Stock defaults
//! are the base layer; the user file only needs the keys it wants to change.
//!
//! ## Configuration Options
//!
//! ```toml
//! [logging]
//! filter = "info"              # tracing filter; RUST_LOG takes precedence
//!
//! [plugins.journal]
//! path = "posts.json"          # where posts are saved
//!
//! [plugins.htmlize]
//! allow_newlines = false       # turn line breaks into <br>
//!
//! [plugins.publisher]
//! store = "dir"                # "dir" or "s3"
//! dir = "public"               # target directory for store = "dir"
//! theme = "default"
//! themes_dir = "themes"
//! posts_per_page = 10
//! # bucket, region, access_key, secret_key, endpoint,
//! # distribution_id, max_uploads: see `feedpress gen-config`
//! ```
//!
//! Each `[plugins.<name>]` table becomes that plugin's [`Settings`]. Values
//! must be scalars (strings, integers, floats, booleans) and are handed to
//! the plugin as strings; the plugin parses and checks them during `init`.
//!
//! Unknown top-level keys are rejected to catch typos early.

use crate::plugin::Settings;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    Serialize(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Configuration loaded from `feedpress.toml`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub logging: LoggingConfig,
    /// Per-plugin settings, keyed by plugin name.
    pub plugins: BTreeMap<String, toml::Table>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            logging: LoggingConfig::default(),
            plugins: default_plugins(),
        }
    }
}

/// Process-wide logging settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggingConfig {
    /// `tracing_subscriber::EnvFilter` directive, e.g. `"info"` or
    /// `"feedpress=debug"`.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "info".to_string(),
        }
    }
}

fn default_plugins() -> BTreeMap<String, toml::Table> {
    let mut plugins = BTreeMap::new();

    let mut journal = toml::Table::new();
    journal.insert("path".into(), "posts.json".into());
    plugins.insert("journal".to_string(), journal);

    let mut htmlize = toml::Table::new();
    htmlize.insert("allow_newlines".into(), false.into());
    plugins.insert("htmlize".to_string(), htmlize);

    let mut publisher = toml::Table::new();
    publisher.insert("store".into(), "dir".into());
    publisher.insert("dir".into(), "public".into());
    publisher.insert("theme".into(), "default".into());
    publisher.insert("themes_dir".into(), "themes".into());
    publisher.insert("posts_per_page".into(), toml::Value::Integer(10));
    plugins.insert("publisher".to_string(), publisher);

    plugins
}

impl Config {
    /// Validate values that can be checked without knowing the plugins.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::Validation(
                "logging.filter must not be empty".into(),
            ));
        }
        if let Err(e) = tracing_subscriber::EnvFilter::try_new(&self.logging.filter) {
            return Err(ConfigError::Validation(format!(
                "logging.filter is not a valid filter: {e}"
            )));
        }
        for (plugin, table) in &self.plugins {
            for (key, value) in table {
                if scalar_string(value).is_none() {
                    return Err(ConfigError::Validation(format!(
                        "plugins.{plugin}.{key} must be a string, number, or boolean"
                    )));
                }
            }
        }
        Ok(())
    }

    /// Settings for the plugin called `name`. Plugins without a table get
    /// empty settings.
    pub fn settings_for(&self, name: &str) -> Settings {
        let values = self
            .plugins
            .get(name)
            .map(|table| {
                table
                    .iter()
                    .filter_map(|(k, v)| scalar_string(v).map(|s| (k.clone(), s)))
                    .collect()
            })
            .unwrap_or_default();
        Settings::new(name, values)
    }
}

fn scalar_string(value: &toml::Value) -> Option<String> {
    match value {
        toml::Value::String(s) => Some(s.clone()),
        toml::Value::Integer(i) => Some(i.to_string()),
        toml::Value::Float(f) => Some(f.to_string()),
        toml::Value::Boolean(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Returns the stock default config as a `toml::Value::Table`.
///
/// This is the base layer user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(Config::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Merge config text over the stock defaults, then deserialize and validate.
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    let overlay: toml::Value = toml::from_str(content)?;
    let merged = merge_toml(stock_defaults_value()?, overlay);
    let config: Config = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load config from `path`.
///
/// A missing file is not an error: the stock defaults are used.
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        let config = Config::default();
        config.validate()?;
        return Ok(config);
    }
    parse_config(&fs::read_to_string(path)?)
}

/// Returns a fully-commented stock `feedpress.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# feedpress configuration
# =======================
# All settings are optional. Values shown below are the defaults.
# Unknown top-level keys will cause an error.

# ---------------------------------------------------------------------------
# Logging
# ---------------------------------------------------------------------------
[logging]
# tracing filter directive. The RUST_LOG environment variable wins over this.
filter = "info"

# ---------------------------------------------------------------------------
# Journal: where `feedpress post` saves posts and `feedpress publish` reads them
# ---------------------------------------------------------------------------
[plugins.journal]
path = "posts.json"

# ---------------------------------------------------------------------------
# Htmlize: turns URLs in post text into links
# ---------------------------------------------------------------------------
[plugins.htmlize]
# Also turn line breaks into <br>.
allow_newlines = false

# ---------------------------------------------------------------------------
# Publisher
# ---------------------------------------------------------------------------
[plugins.publisher]
# Where the site goes: "dir" (a local directory) or "s3" (needs the s3 feature).
store = "dir"

# Target directory when store = "dir".
dir = "public"

# Theme directory name under themes_dir. index.html is required,
# post.html is optional, assets/ is mirrored to assets/.
theme = "default"
themes_dir = "themes"

# Posts per index page. Must be a positive integer.
posts_per_page = 10

# Parallel asset uploads. Omit to use one per CPU core.
# max_uploads = 8

# S3 settings, used when store = "s3".
# bucket = "my-site"
# region = "us-east-1"
# access_key = "..."      # omit both keys to use the default credential chain
# secret_key = "..."
# endpoint = "http://localhost:9000"   # S3-compatible services

# CloudFront distribution to invalidate. Omit to skip invalidation.
# distribution_id = "E2EXAMPLE"
"##
}
