//! CDN invalidation for the paths a publish run changed.
//!
//! One request per run, covering every changed path. Uploads and
//! invalidation are independent: a rejected invalidation is logged, never
//! retried, and never rolls back what was already uploaded.

use crate::plugin::Log;
use crate::store::{self, Cdn, StoreError};
use chrono::Utc;
use std::collections::BTreeSet;

/// Outcome of a dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Nothing changed, so nothing was requested.
    Nothing,
    /// No distribution configured; publishing without a CDN.
    Disabled,
    /// The CDN accepted an invalidation covering `paths` paths.
    Created { paths: usize },
    /// The CDN answered with a non-success status.
    Rejected(u16),
}

pub struct Dispatcher<'a> {
    cdn: Option<&'a dyn Cdn>,
    distribution_id: Option<&'a str>,
    log: &'a Log,
}

impl<'a> Dispatcher<'a> {
    pub fn new(cdn: Option<&'a dyn Cdn>, distribution_id: Option<&'a str>, log: &'a Log) -> Self {
        Self {
            cdn,
            distribution_id,
            log,
        }
    }

    /// Request invalidation of `paths`, tagged with `caller_reference`.
    ///
    /// Transport failures propagate; non-success statuses are logged and
    /// reported as [`Dispatch::Rejected`].
    pub fn dispatch(
        &self,
        paths: &BTreeSet<String>,
        caller_reference: &str,
    ) -> Result<Dispatch, StoreError> {
        if paths.is_empty() {
            return Ok(Dispatch::Nothing);
        }
        let (Some(cdn), Some(dist_id)) = (self.cdn, self.distribution_id) else {
            self.log.debug(
                &format!(
                    "No CDN distribution configured, skipping invalidation of {} paths",
                    paths.len()
                ),
                None,
            );
            return Ok(Dispatch::Disabled);
        };

        let items: Vec<String> = paths.iter().cloned().collect();
        let status = cdn.create_invalidation(dist_id, &items, caller_reference)?;
        if store::is_success(status) {
            self.log.info(&format!(
                "Created invalidation for CDN distribution {dist_id}"
            ));
            self.log
                .debug("Invalidated paths", Some(&items.join(", ")));
            Ok(Dispatch::Created { paths: items.len() })
        } else {
            self.log.error(
                &format!(
                    "Got unexpected status {status} creating invalidation for CDN distribution {dist_id}"
                ),
                None,
            );
            Ok(Dispatch::Rejected(status))
        }
    }
}

/// A caller reference unique per request: the current time in microseconds.
pub fn caller_reference() -> String {
    Utc::now().timestamp_micros().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::{Level, RecordingCdn, memory_log};

    fn paths(items: &[&str]) -> BTreeSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn empty_set_issues_no_request() {
        let cdn = RecordingCdn::new(201);
        let (log, _) = memory_log();
        let dispatcher = Dispatcher::new(Some(&cdn), Some("E123"), &log);

        let result = dispatcher.dispatch(&BTreeSet::new(), "ref").unwrap();

        assert_eq!(result, Dispatch::Nothing);
        assert!(cdn.requests().is_empty());
    }

    #[test]
    fn no_distribution_is_a_no_op() {
        let cdn = RecordingCdn::new(201);
        let (log, _) = memory_log();
        let dispatcher = Dispatcher::new(Some(&cdn), None, &log);

        let result = dispatcher.dispatch(&paths(&["/index.html"]), "ref").unwrap();

        assert_eq!(result, Dispatch::Disabled);
        assert!(cdn.requests().is_empty());
    }

    #[test]
    fn no_cdn_client_is_a_no_op() {
        let (log, _) = memory_log();
        let dispatcher = Dispatcher::new(None, Some("E123"), &log);
        let result = dispatcher.dispatch(&paths(&["/index.html"]), "ref").unwrap();
        assert_eq!(result, Dispatch::Disabled);
    }

    #[test]
    fn one_request_covers_every_path() {
        let cdn = RecordingCdn::new(201);
        let (log, _) = memory_log();
        let dispatcher = Dispatcher::new(Some(&cdn), Some("E123"), &log);

        let result = dispatcher
            .dispatch(&paths(&["/index.html", "/assets/a.css", "/posts/x.html"]), "ref-1")
            .unwrap();

        assert_eq!(result, Dispatch::Created { paths: 3 });
        let requests = cdn.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].distribution_id, "E123");
        assert_eq!(requests[0].caller_reference, "ref-1");
        assert_eq!(
            requests[0].paths,
            vec!["/assets/a.css", "/index.html", "/posts/x.html"]
        );
    }

    #[test]
    fn rejected_invalidation_is_logged_not_fatal() {
        let cdn = RecordingCdn::new(400);
        let (log, entries) = memory_log();
        let dispatcher = Dispatcher::new(Some(&cdn), Some("E123"), &log);

        let result = dispatcher.dispatch(&paths(&["/index.html"]), "ref").unwrap();

        assert_eq!(result, Dispatch::Rejected(400));
        assert_eq!(cdn.requests().len(), 1);
        assert!(
            entries
                .lock()
                .unwrap()
                .iter()
                .any(|e| e.level == Level::Error && e.message.contains("400"))
        );
    }

    #[test]
    fn caller_references_are_numeric_tokens() {
        let r = caller_reference();
        assert!(!r.is_empty());
        assert!(r.chars().all(|c| c.is_ascii_digit()));
    }
}
