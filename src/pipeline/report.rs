//! Per-pass outcome: which documents failed, where, and why.

use super::plugin::Stage;
use crate::content::Rejected;
use crate::core::slug::Slug;
use crate::log;
use crate::utils::plural_s;
use std::collections::BTreeSet;
use std::path::PathBuf;

/// One document-level failure.
#[derive(Debug, Clone)]
pub struct Failure {
    /// `None` for files rejected before they claimed a slug.
    pub slug: Option<Slug>,
    pub source: PathBuf,
    pub plugin: &'static str,
    pub stage: Stage,
    pub message: String,
}

/// Accumulated failures of one pass.
///
/// A pass with failures is *degraded*: healthy documents are still emitted,
/// failed ones are skipped by every later stage.
#[derive(Debug, Default)]
pub struct PassReport {
    failures: Vec<Failure>,
    failed: BTreeSet<Slug>,
}

impl PassReport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, failure: Failure) {
        if let Some(slug) = &failure.slug {
            self.failed.insert(slug.clone());
        }
        self.failures.push(failure);
    }

    pub fn record_rejected(&mut self, rejected: Vec<Rejected>) {
        for r in rejected {
            self.record(Failure {
                slug: r.slug,
                source: r.source,
                plugin: "discover",
                stage: Stage::Discover,
                message: r.reason,
            });
        }
    }

    #[inline]
    pub fn is_failed(&self, slug: &Slug) -> bool {
        self.failed.contains(slug)
    }

    pub fn failed(&self) -> &BTreeSet<Slug> {
        &self.failed
    }

    pub fn failures(&self) -> &[Failure] {
        &self.failures
    }

    pub fn is_degraded(&self) -> bool {
        !self.failures.is_empty()
    }

    /// Print every failure, one line each.
    pub fn log_failures(&self) {
        if !self.is_degraded() {
            return;
        }
        let n = self.failures.len();
        log!("error"; "{n} document{} failed:", plural_s(n));
        for f in &self.failures {
            log!("error"; "{} [{}/{}] {}", f.source.display(), f.plugin, f.stage, f.message);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_marks_slug_failed() {
        let mut report = PassReport::new();
        assert!(!report.is_degraded());

        report.record(Failure {
            slug: Some(Slug::new("a")),
            source: "a.md".into(),
            plugin: "toc",
            stage: Stage::Tree,
            message: "boom".into(),
        });
        assert!(report.is_degraded());
        assert!(report.is_failed(&Slug::new("a")));
        assert!(!report.is_failed(&Slug::new("b")));
    }

    #[test]
    fn test_rejected_files_degrade_without_slug() {
        let mut report = PassReport::new();
        report.record_rejected(vec![Rejected {
            slug: None,
            source: "a-b.md".into(),
            reason: "collision".into(),
        }]);
        assert!(report.is_degraded());
        assert!(report.failed().is_empty());
        assert_eq!(report.failures()[0].stage, Stage::Discover);
    }

    #[test]
    fn test_unreadable_file_marks_its_slug_failed() {
        let mut report = PassReport::new();
        report.record_rejected(vec![Rejected {
            slug: Some(Slug::new("notes/a")),
            source: "notes/a.md".into(),
            reason: "failed to read: stream did not contain valid UTF-8".into(),
        }]);
        assert!(report.is_failed(&Slug::new("notes/a")));
    }
}
