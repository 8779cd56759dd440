//! Diagnostic reporting.
//!
//! The propagation engine and the loaders never let a recoverable failure escape a tick.
//! Instead they describe it to an [`ErrorReporter`]. [`TracingReporter`] is the default and
//! forwards into `tracing`; [`VecReporter`] keeps the reports for inspection.
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{error, info, warn};

use crate::error::Error;

/// Receiver of human-readable diagnostics.
pub trait ErrorReporter {
    fn message_report(&mut self, text: &str);

    fn warning_report(&mut self, text: &str, cause: Option<&Error>);

    fn error_report(&mut self, text: &str, cause: Option<&Error>);

    /// Something that stopped one unit of work, e.g. a malformed file, from completing.
    fn fatal_error_report(&mut self, text: &str, cause: Option<&Error>);
}

/// Discards every report.
impl ErrorReporter for () {
    fn message_report(&mut self, _text: &str) {}
    fn warning_report(&mut self, _text: &str, _cause: Option<&Error>) {}
    fn error_report(&mut self, _text: &str, _cause: Option<&Error>) {}
    fn fatal_error_report(&mut self, _text: &str, _cause: Option<&Error>) {}
}

/// Forwards reports to `tracing` at info / warn / error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingReporter;

impl ErrorReporter for TracingReporter {
    fn message_report(&mut self, text: &str) {
        info!("{text}");
    }

    fn warning_report(&mut self, text: &str, cause: Option<&Error>) {
        match cause {
            Some(e) => warn!(cause = %e, "{text}"),
            None => warn!("{text}"),
        }
    }

    fn error_report(&mut self, text: &str, cause: Option<&Error>) {
        match cause {
            Some(e) => error!(cause = %e, "{text}"),
            None => error!("{text}"),
        }
    }

    fn fatal_error_report(&mut self, text: &str, cause: Option<&Error>) {
        match cause {
            Some(e) => error!(fatal = true, cause = %e, "{text}"),
            None => error!(fatal = true, "{text}"),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Severity {
    Message,
    Warning,
    Error,
    Fatal,
}

/// One collected diagnostic.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Report {
    pub severity: Severity,
    pub text: String,
    /// Rendered cause, if one was given.
    pub cause: Option<String>,
}

/// Collects reports in memory. Clones share one buffer, so a clone kept by the caller sees
/// everything reported through the clone handed to the scene.
#[derive(Clone, Debug, Default)]
pub struct VecReporter {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl VecReporter {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Report>> {
        self.reports.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn push(&self, severity: Severity, text: &str, cause: Option<&Error>) {
        self.lock().push(Report {
            severity,
            text: text.to_owned(),
            cause: cause.map(ToString::to_string),
        });
    }

    pub fn reports(&self) -> Vec<Report> {
        self.lock().clone()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.lock().iter().filter(|r| r.severity == severity).count()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl ErrorReporter for VecReporter {
    fn message_report(&mut self, text: &str) {
        self.push(Severity::Message, text, None);
    }

    fn warning_report(&mut self, text: &str, cause: Option<&Error>) {
        self.push(Severity::Warning, text, cause);
    }

    fn error_report(&mut self, text: &str, cause: Option<&Error>) {
        self.push(Severity::Error, text, cause);
    }

    fn fatal_error_report(&mut self, text: &str, cause: Option<&Error>) {
        self.push(Severity::Fatal, text, cause);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vec_reporter_clones_share_storage() {
        let handle = VecReporter::new();
        let mut reporter = handle.clone();
        reporter.message_report("loaded");
        reporter.error_report("route failed", Some(&Error::from("bad value")));
        assert_eq!(handle.len(), 2);
        assert_eq!(handle.count(Severity::Error), 1);

        let reports = handle.reports();
        assert_eq!(reports[1].cause.as_deref(), Some("bad value"));
        handle.clear();
        assert!(reporter.is_empty());
    }

    #[test]
    fn severities_are_kept_apart() {
        let mut reporter = VecReporter::new();
        reporter.warning_report("w", None);
        reporter.fatal_error_report("f", None);
        assert_eq!(reporter.count(Severity::Warning), 1);
        assert_eq!(reporter.count(Severity::Fatal), 1);
        assert_eq!(reporter.count(Severity::Message), 0);
    }

    #[test]
    fn tracing_reporter_accepts_all_levels() {
        let mut reporter = TracingReporter;
        reporter.message_report("m");
        reporter.warning_report("w", None);
        reporter.error_report("e", Some(&Error::UnknownNode));
        reporter.fatal_error_report("f", None);
    }
}
