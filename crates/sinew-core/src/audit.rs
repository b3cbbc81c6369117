//! Scheduled full-schema audits.
//!
//! The audit runner is the entry point an external scheduler (cron, a host
//! job queue) triggers periodically — expected weekly. One run checks every
//! forward relationship, stamps and fingerprints the result, persists it
//! under the well-known state key for later display, and notifies registered
//! sinks when anything was found.
//!
//! Fingerprints make idempotence observable: unchanged data between runs
//! yields an identical issue set, so the fingerprint is the cheap way to
//! tell "still broken the same way" from "drifted again".

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::check::checker::{CheckOptions, CheckSummary, IntegrityChecker};
use crate::schema::Registry;
use crate::store::EntityStore;

/// Well-known state key the last full-schema report is persisted under.
pub const LAST_AUDIT_STATE_KEY: &str = "sinew.last_audit";

/// A completed full-schema audit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    /// When the run finished.
    pub generated_at: DateTime<Utc>,
    /// Content hash of the issue set (stable across identical runs).
    pub fingerprint: String,
    /// The full checker fold.
    pub summary: CheckSummary,
}

/// Collaborator notified after an audit that found issues.
///
/// Sinks receive the full report; what they do with it (logging, email,
/// push) is outside this crate.
pub trait AuditSink {
    /// Called once per audit run when `total_issues > 0`.
    fn issues_found(&self, report: &AuditReport);
}

/// Built-in sink that logs a one-line summary.
pub struct LogSink;

impl AuditSink for LogSink {
    fn issues_found(&self, report: &AuditReport) {
        warn!(
            total = report.summary.total_issues,
            errors = report.summary.errors,
            warnings = report.summary.warnings,
            fingerprint = %report.fingerprint,
            "integrity issues found"
        );
    }
}

/// Content hash of a summary's issue set.
///
/// Hashes the canonical JSON of the per-relationship reports, which
/// enumerate deterministically, so the same data always fingerprints the
/// same way. Timestamps are excluded.
#[must_use]
pub fn fingerprint(summary: &CheckSummary) -> String {
    let canonical =
        serde_json::to_vec(&summary.relationships).unwrap_or_default();
    blake3::hash(&canonical).to_hex().to_string()
}

/// Run a full-schema check, persist the report, and notify sinks.
///
/// # Errors
///
/// Returns an error only when persisting the report fails; check-phase store
/// failures are logged and isolated per source, as in any checker run.
pub fn run_audit(
    registry: &Registry,
    store: &dyn EntityStore,
    opts: &CheckOptions,
    sinks: &[&dyn AuditSink],
) -> Result<AuditReport> {
    let checker = IntegrityChecker::new(registry, store);
    let summary = checker.check_all(opts);

    let report = AuditReport {
        generated_at: Utc::now(),
        fingerprint: fingerprint(&summary),
        summary,
    };

    let json = serde_json::to_string(&report).context("serialize audit report")?;
    store
        .write_state(LAST_AUDIT_STATE_KEY, &json)
        .context("persist audit report")?;

    info!(
        total = report.summary.total_issues,
        relationships = report.summary.relationships.len(),
        fingerprint = %report.fingerprint,
        "audit complete"
    );

    if report.summary.total_issues > 0 {
        for sink in sinks {
            sink.issues_found(&report);
        }
    }

    Ok(report)
}

/// Load the last persisted full-schema report, if any.
///
/// # Errors
///
/// Returns an error on store failure or if the persisted payload no longer
/// parses (a schema drift between versions).
pub fn load_last_report(store: &dyn EntityStore) -> Result<Option<AuditReport>> {
    let Some(json) = store
        .read_state(LAST_AUDIT_STATE_KEY)
        .context("read persisted audit report")?
    else {
        return Ok(None);
    };
    let report = serde_json::from_str(&json).context("parse persisted audit report")?;
    Ok(Some(report))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::RawValue;
    use crate::model::{EntityId, EntityRef};
    use crate::schema::defaults;
    use crate::store::sqlite::SqliteStore;
    use std::cell::Cell;

    fn id(raw: u64) -> EntityId {
        EntityId::new(raw).expect("nonzero test id")
    }

    struct CountingSink {
        calls: Cell<usize>,
    }

    impl AuditSink for CountingSink {
        fn issues_found(&self, _report: &AuditReport) {
            self.calls.set(self.calls.get() + 1);
        }
    }

    #[test]
    fn clean_audit_persists_but_does_not_notify() {
        let registry = defaults::registry();
        let store = SqliteStore::open_in_memory().expect("open store");
        let sink = CountingSink { calls: Cell::new(0) };

        let report = run_audit(&registry, &store, &CheckOptions::default(), &[&sink])
            .expect("audit");
        assert!(report.summary.is_clean());
        assert_eq!(sink.calls.get(), 0);

        let loaded = load_last_report(&store).expect("load").expect("persisted");
        assert_eq!(loaded.fingerprint, report.fingerprint);
    }

    #[test]
    fn dirty_audit_notifies_every_sink_once() {
        let registry = defaults::registry();
        let store = SqliteStore::open_in_memory().expect("open store");
        store.insert_entity("classified", id(50)).expect("insert");
        let classified = EntityRef::content("classified", id(50));
        store
            .write_attribute(&classified, "linked_event", &RawValue::Text("7".into()))
            .expect("write"); // event 7 does not exist

        let a = CountingSink { calls: Cell::new(0) };
        let b = CountingSink { calls: Cell::new(0) };
        let report = run_audit(&registry, &store, &CheckOptions::default(), &[&a, &b])
            .expect("audit");

        assert!(report.summary.total_issues > 0);
        assert_eq!(a.calls.get(), 1);
        assert_eq!(b.calls.get(), 1);
    }

    #[test]
    fn fingerprint_is_stable_over_unchanged_data_and_moves_when_data_moves() {
        let registry = defaults::registry();
        let store = SqliteStore::open_in_memory().expect("open store");
        store.insert_entity("dj", id(3)).expect("insert");
        let dj = EntityRef::content("dj", id(3));
        store
            .write_attribute(&dj, "venue_refs", &RawValue::Text("77".into()))
            .expect("write"); // venue 77 does not exist

        let first = run_audit(&registry, &store, &CheckOptions::default(), &[]).expect("audit");
        let second = run_audit(&registry, &store, &CheckOptions::default(), &[]).expect("audit");
        assert_eq!(first.fingerprint, second.fingerprint);

        store
            .write_attribute(&dj, "venue_refs", &RawValue::Text("77,88".into()))
            .expect("write");
        let third = run_audit(&registry, &store, &CheckOptions::default(), &[]).expect("audit");
        assert_ne!(first.fingerprint, third.fingerprint);
    }

    #[test]
    fn last_report_is_overwritten_not_appended() {
        let registry = defaults::registry();
        let store = SqliteStore::open_in_memory().expect("open store");

        let first = run_audit(&registry, &store, &CheckOptions::default(), &[]).expect("audit");
        store.insert_entity("classified", id(50)).expect("insert");
        let classified = EntityRef::content("classified", id(50));
        store
            .write_attribute(&classified, "linked_event", &RawValue::Text("7".into()))
            .expect("write");
        let second = run_audit(&registry, &store, &CheckOptions::default(), &[]).expect("audit");

        let loaded = load_last_report(&store).expect("load").expect("persisted");
        assert_eq!(loaded.fingerprint, second.fingerprint);
        assert_ne!(loaded.fingerprint, first.fingerprint);
    }
}
