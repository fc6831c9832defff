//! Logging: process-wide `tracing` setup and the built-in logging plugin.
//!
//! Plugins never talk to `tracing` directly. They log through the [`Log`]
//! handle in their context, which fans out to every active logging plugin.
//! [`TracingLogger`] is the logging plugin that forwards those messages to
//! `tracing`, where the subscriber installed by [`init_tracing`] filters and
//! prints them.
//!
//! [`Log`]: crate::plugin::Log

use crate::plugin::{Logger, Plugin, PluginContext, PluginError};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::prelude::*;

pub const TRACING: &str = "tracing";

/// Install the global subscriber. `RUST_LOG` wins over `default_filter`.
///
/// Output goes to stderr so command output on stdout stays clean. Calling
/// this more than once is harmless.
pub fn init_tracing(default_filter: &str) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .try_init()
        .ok();
}

/// Logging plugin that turns plugin messages into `tracing` events.
#[derive(Debug, Default)]
pub struct TracingLogger;

impl TracingLogger {
    pub fn new() -> Self {
        Self
    }
}

impl Plugin for TracingLogger {
    fn name(&self) -> &str {
        TRACING
    }

    fn version(&self) -> &str {
        env!("CARGO_PKG_VERSION")
    }

    fn init(&mut self, _ctx: PluginContext) -> Result<(), PluginError> {
        Ok(())
    }
}

impl Logger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn error(&self, msg: &str, cause: Option<&dyn std::error::Error>) {
        match cause {
            Some(cause) => tracing::error!(error = %cause, "{msg}"),
            None => tracing::error!("{msg}"),
        }
    }

    fn debug(&self, msg: &str, detail: Option<&str>) {
        match detail {
            Some(detail) => tracing::debug!(detail = %detail, "{msg}"),
            None => tracing::debug!("{msg}"),
        }
    }
}
