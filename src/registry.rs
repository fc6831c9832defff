//! The application side of the plugin model.
//!
//! A [`Registry`] owns every plugin, one typed collection per role, and drives
//! them through their lifecycle:
//!
//! ```text
//! add_*  ──►  activate  ──►  ping / ingest / publish  ──►  dispose
//!             logging first                                logging last
//! ```
//!
//! Activation injects a [`PluginContext`] and calls `init` once per plugin.
//! Plugins whose `init` fails are marked failed and skipped by every later
//! operation. `dispose` reaches every registered plugin exactly once,
//! including failed ones, and runs automatically on drop.

use crate::config::Config;
use crate::plugin::{
    AppHandle, Log, Logging, Plugin, PluginContext, PluginError, PluginInfo, Posting, Processing,
    Publishing, Role, Saving,
};
use crate::post::Post;
use crate::types::PublishReport;
use std::sync::{Arc, Mutex};
use std::time::Instant;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Registered,
    Active,
    Failed,
    Disposed,
}

struct Slot<H> {
    handle: H,
    state: PluginState,
}

impl<H> Slot<H> {
    fn new(handle: H) -> Self {
        Self {
            handle,
            state: PluginState::Registered,
        }
    }

    fn is_active(&self) -> bool {
        self.state == PluginState::Active
    }
}

struct Poller {
    slot: Slot<Box<dyn Posting>>,
    next: Option<Instant>,
}

/// Outcome of [`Registry::activate`].
#[derive(Debug, Default)]
pub struct ActivationReport {
    pub activated: Vec<PluginInfo>,
    pub failed: Vec<(PluginInfo, PluginError)>,
}

impl ActivationReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }

    /// The activated plugins, or the first activation error.
    pub fn into_result(self) -> Result<Vec<PluginInfo>, PluginError> {
        match self.failed.into_iter().next() {
            Some((_, err)) => Err(err),
            None => Ok(self.activated),
        }
    }
}

/// Owns the plugins of one application run.
#[derive(Default)]
pub struct Registry {
    log: Log,
    logging: Vec<Slot<Arc<Mutex<dyn Logging>>>>,
    posting: Vec<Poller>,
    processing: Vec<Slot<Box<dyn Processing>>>,
    saving: Vec<Slot<Box<dyn Saving>>>,
    publishing: Vec<Slot<Box<dyn Publishing>>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fan-out handle to every active logging plugin.
    pub fn log(&self) -> &Log {
        &self.log
    }

    pub fn add_logging(&mut self, plugin: impl Logging + 'static) {
        let handle: Arc<Mutex<dyn Logging>> = Arc::new(Mutex::new(plugin));
        self.logging.push(Slot::new(handle));
    }

    pub fn add_posting(&mut self, plugin: impl Posting + 'static) {
        let handle: Box<dyn Posting> = Box::new(plugin);
        self.posting.push(Poller {
            slot: Slot::new(handle),
            next: None,
        });
    }

    /// Processing plugins run in the order they are added.
    pub fn add_processing(&mut self, plugin: impl Processing + 'static) {
        let handle: Box<dyn Processing> = Box::new(plugin);
        self.processing.push(Slot::new(handle));
    }

    pub fn add_saving(&mut self, plugin: impl Saving + 'static) {
        let handle: Box<dyn Saving> = Box::new(plugin);
        self.saving.push(Slot::new(handle));
    }

    pub fn add_publishing(&mut self, plugin: impl Publishing + 'static) {
        let handle: Box<dyn Publishing> = Box::new(plugin);
        self.publishing.push(Slot::new(handle));
    }

    /// Every registered plugin, logging plugins first.
    pub fn plugins(&self) -> Vec<(PluginInfo, PluginState)> {
        let mut out = Vec::new();
        for slot in &self.logging {
            let plugin = slot.handle.lock().unwrap_or_else(|e| e.into_inner());
            out.push((info(&*plugin, Role::Logging), slot.state));
        }
        for poller in &self.posting {
            out.push((info(&*poller.slot.handle, Role::Posting), poller.slot.state));
        }
        for slot in &self.processing {
            out.push((info(&*slot.handle, Role::Processing), slot.state));
        }
        for slot in &self.saving {
            out.push((info(&*slot.handle, Role::Saving), slot.state));
        }
        for slot in &self.publishing {
            out.push((info(&*slot.handle, Role::Publishing), slot.state));
        }
        out
    }

    /// Inject contexts and call `init` on every registered plugin.
    ///
    /// Logging plugins are activated first and attached to [`Registry::log`]
    /// as soon as they succeed, so the other activations are logged.
    pub fn activate(&mut self, config: &Config) -> ActivationReport {
        let app = AppHandle::new(self.plugins().into_iter().map(|(p, _)| p).collect());
        let mut report = ActivationReport::default();
        let env = Env {
            log: &self.log,
            app: &app,
            config,
        };

        for slot in &mut self.logging {
            if slot.state != PluginState::Registered {
                continue;
            }
            let ok = {
                let mut plugin = slot.handle.lock().unwrap_or_else(|e| e.into_inner());
                env.activate(&mut *plugin, Role::Logging, &mut report)
            };
            slot.state = state_after(ok);
            if ok {
                self.log.attach(slot.handle.clone());
            }
        }
        for poller in &mut self.posting {
            let slot = &mut poller.slot;
            if slot.state == PluginState::Registered {
                let ok = env.activate(&mut *slot.handle, Role::Posting, &mut report);
                slot.state = state_after(ok);
            }
        }
        for slot in &mut self.processing {
            if slot.state == PluginState::Registered {
                let ok = env.activate(&mut *slot.handle, Role::Processing, &mut report);
                slot.state = state_after(ok);
            }
        }
        for slot in &mut self.saving {
            if slot.state == PluginState::Registered {
                let ok = env.activate(&mut *slot.handle, Role::Saving, &mut report);
                slot.state = state_after(ok);
            }
        }
        for slot in &mut self.publishing {
            if slot.state == PluginState::Registered {
                let ok = env.activate(&mut *slot.handle, Role::Publishing, &mut report);
                slot.state = state_after(ok);
            }
        }
        report
    }

    /// Poll every active posting plugin whose interval has elapsed.
    ///
    /// Plugins with a zero interval are never polled. A failed ping is logged
    /// and the plugin is polled again at its next interval.
    pub fn poll(&mut self, now: Instant) -> Vec<Post> {
        let mut posts = Vec::new();
        for poller in &mut self.posting {
            if !poller.slot.is_active() {
                continue;
            }
            let interval = poller.slot.handle.ping_interval();
            if interval.is_zero() || poller.next.is_some_and(|next| now < next) {
                continue;
            }
            poller.next = Some(now + interval);
            match poller.slot.handle.ping() {
                Ok(new) => posts.extend(new),
                Err(e) => self.log.error(
                    &format!("Ping failed for plugin {}", poller.slot.handle.name()),
                    Some(&e),
                ),
            }
        }
        posts
    }

    /// Run every active processing plugin over `post`, in order, then mark it
    /// processed.
    pub fn process(&mut self, post: &mut Post) -> Result<(), PluginError> {
        for slot in self.processing.iter_mut().filter(|s| s.is_active()) {
            slot.handle.process(post)?;
        }
        post.processed = true;
        Ok(())
    }

    pub fn save(&mut self, post: &Post) -> Result<(), PluginError> {
        for slot in self.saving.iter_mut().filter(|s| s.is_active()) {
            slot.handle.save(post)?;
        }
        Ok(())
    }

    /// Flush every saving plugin. All of them are flushed even when one
    /// fails; the first error is returned.
    pub fn flush(&mut self) -> Result<(), PluginError> {
        let mut first = None;
        for slot in self.saving.iter_mut().filter(|s| s.is_active()) {
            if let Err(e) = slot.handle.flush() {
                self.log.error(
                    &format!("Flush failed for plugin {}", slot.handle.name()),
                    Some(&e),
                );
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }

    /// Process a new post, then save it.
    pub fn ingest(&mut self, mut post: Post) -> Result<Post, PluginError> {
        self.process(&mut post)?;
        self.save(&post)?;
        Ok(post)
    }

    /// Hand `posts` to every active publishing plugin.
    pub fn publish(&mut self, posts: &[Post]) -> Result<Vec<PublishReport>, PluginError> {
        let mut reports = Vec::new();
        for slot in self.publishing.iter_mut().filter(|s| s.is_active()) {
            let mut sequence = posts.iter().cloned();
            reports.push(slot.handle.publish(&mut sequence, posts.len())?);
        }
        Ok(reports)
    }

    /// Dispose every registered plugin once. Logging plugins go last and are
    /// detached from the log afterwards.
    pub fn dispose(&mut self) {
        for poller in &mut self.posting {
            dispose_slot(&mut poller.slot, |p| p.dispose());
        }
        for slot in &mut self.processing {
            dispose_slot(slot, |p| p.dispose());
        }
        for slot in &mut self.saving {
            dispose_slot(slot, |p| p.dispose());
        }
        for slot in &mut self.publishing {
            dispose_slot(slot, |p| p.dispose());
        }
        for slot in &mut self.logging {
            dispose_slot(slot, |p| {
                p.lock().unwrap_or_else(|e| e.into_inner()).dispose();
            });
        }
        self.log.clear();
    }
}

impl Drop for Registry {
    fn drop(&mut self) {
        self.dispose();
    }
}

struct Env<'a> {
    log: &'a Log,
    app: &'a AppHandle,
    config: &'a Config,
}

impl Env<'_> {
    fn activate<P: Plugin + ?Sized>(
        &self,
        plugin: &mut P,
        role: Role,
        report: &mut ActivationReport,
    ) -> bool {
        let info = info(plugin, role);
        self.log.info(&format!(
            "Initializing plugin {} v{}",
            info.name, info.version
        ));
        let ctx = PluginContext::new(
            self.log.clone(),
            self.config.settings_for(&info.name),
            self.app.clone(),
        );
        match plugin.init(ctx) {
            Ok(()) => {
                report.activated.push(info);
                true
            }
            Err(e) => {
                self.log.error(
                    &format!("Failed to initialize plugin {}", info.name),
                    Some(&e),
                );
                report.failed.push((info, e));
                false
            }
        }
    }
}

fn info<P: Plugin + ?Sized>(plugin: &P, role: Role) -> PluginInfo {
    PluginInfo {
        name: plugin.name().to_string(),
        version: plugin.version().to_string(),
        role,
    }
}

fn state_after(ok: bool) -> PluginState {
    if ok {
        PluginState::Active
    } else {
        PluginState::Failed
    }
}

fn dispose_slot<H>(slot: &mut Slot<H>, dispose: impl FnOnce(&mut H)) {
    if slot.state != PluginState::Disposed {
        dispose(&mut slot.handle);
        slot.state = PluginState::Disposed;
    }
}
