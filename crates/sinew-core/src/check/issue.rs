//! Integrity issues: the first-class data the checker produces.
//!
//! Detecting many issues per run is normal operation, so issues are values,
//! never errors. Each carries a stable machine-readable kind for agent and
//! report consumers plus a human message.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::{EntityId, EntityRef};

/// The six detectable inconsistency kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// A stored link points at a non-existent entity.
    OrphanedReference,
    /// A bidirectional pair where the inverse side lacks the back link.
    MissingInverse,
    /// The referenced entity exists but has a type outside the allowed set.
    InvalidType,
    /// The same id appears more than once in one link list.
    DuplicateReference,
    /// A source references itself in a non-self-referential relationship.
    SelfReference,
    /// The raw payload does not decode for the declared storage mode.
    InvalidStorage,
}

impl IssueKind {
    /// Stable identifier used in reports and JSON output.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::OrphanedReference => "orphaned_reference",
            Self::MissingInverse => "missing_inverse",
            Self::InvalidType => "invalid_type",
            Self::DuplicateReference => "duplicate_reference",
            Self::SelfReference => "self_reference",
            Self::InvalidStorage => "invalid_storage",
        }
    }

    /// The severity this kind always reports at.
    #[must_use]
    pub const fn severity(self) -> Severity {
        match self {
            Self::OrphanedReference
            | Self::InvalidType
            | Self::SelfReference
            | Self::InvalidStorage => Severity::Error,
            Self::MissingInverse | Self::DuplicateReference => Severity::Warning,
        }
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Issue severity. Ordered so `max` picks the worst: error > warning > info.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Severity {
    /// Stable identifier used in reports.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One detected inconsistency.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// What kind of inconsistency this is.
    pub kind: IssueKind,
    /// Rolled-up severity (derived from the kind).
    pub severity: Severity,
    /// The relationship the issue was found under.
    pub relationship: String,
    /// The source entity holding the link.
    pub source: EntityRef,
    /// The referenced id, when one id is at fault.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related: Option<EntityId>,
    /// Expected target type(s) for invalid-type issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expected: Option<String>,
    /// Actual concrete type for invalid-type issues.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    /// Human-readable description.
    pub message: String,
}

impl Issue {
    fn new(kind: IssueKind, relationship: &str, source: &EntityRef, message: String) -> Self {
        Self {
            kind,
            severity: kind.severity(),
            relationship: relationship.to_string(),
            source: source.clone(),
            related: None,
            expected: None,
            actual: None,
            message,
        }
    }

    /// A stored link points at nothing.
    #[must_use]
    pub fn orphaned(relationship: &str, source: &EntityRef, related: EntityId) -> Self {
        let mut issue = Self::new(
            IssueKind::OrphanedReference,
            relationship,
            source,
            format!("{source} references {related}, which does not exist"),
        );
        issue.related = Some(related);
        issue
    }

    /// The inverse side of a bidirectional pair lacks the back link.
    #[must_use]
    pub fn missing_inverse(
        relationship: &str,
        inverse: &str,
        source: &EntityRef,
        related: EntityId,
    ) -> Self {
        let mut issue = Self::new(
            IssueKind::MissingInverse,
            relationship,
            source,
            format!("{source} links {related}, but {inverse} on {related} has no back link"),
        );
        issue.related = Some(related);
        issue
    }

    /// The referenced entity exists under a disallowed type.
    #[must_use]
    pub fn invalid_type(
        relationship: &str,
        source: &EntityRef,
        related: EntityId,
        expected: &str,
        actual: &str,
    ) -> Self {
        let mut issue = Self::new(
            IssueKind::InvalidType,
            relationship,
            source,
            format!("{source} references {related} of type {actual}, expected {expected}"),
        );
        issue.related = Some(related);
        issue.expected = Some(expected.to_string());
        issue.actual = Some(actual.to_string());
        issue
    }

    /// At least one id repeats inside the link list.
    #[must_use]
    pub fn duplicate(relationship: &str, source: &EntityRef, duplicated: &[EntityId]) -> Self {
        let listed = duplicated
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ");
        let mut issue = Self::new(
            IssueKind::DuplicateReference,
            relationship,
            source,
            format!("{source} holds duplicate references: {listed}"),
        );
        issue.related = duplicated.first().copied();
        issue
    }

    /// A source links itself where the definition forbids it.
    #[must_use]
    pub fn self_reference(relationship: &str, source: &EntityRef) -> Self {
        let mut issue = Self::new(
            IssueKind::SelfReference,
            relationship,
            source,
            format!("{source} references itself"),
        );
        issue.related = Some(source.id);
        issue
    }

    /// The raw payload is undecodable for the declared storage mode.
    #[must_use]
    pub fn invalid_storage(relationship: &str, source: &EntityRef, detail: &str) -> Self {
        Self::new(
            IssueKind::InvalidStorage,
            relationship,
            source,
            format!("{source} holds an undecodable payload: {detail}"),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: u64) -> EntityId {
        EntityId::new(raw).expect("nonzero test id")
    }

    #[test]
    fn severities_are_fixed_per_kind() {
        assert_eq!(IssueKind::OrphanedReference.severity(), Severity::Error);
        assert_eq!(IssueKind::InvalidType.severity(), Severity::Error);
        assert_eq!(IssueKind::SelfReference.severity(), Severity::Error);
        assert_eq!(IssueKind::InvalidStorage.severity(), Severity::Error);
        assert_eq!(IssueKind::MissingInverse.severity(), Severity::Warning);
        assert_eq!(IssueKind::DuplicateReference.severity(), Severity::Warning);
    }

    #[test]
    fn severity_ordering_picks_worst() {
        assert!(Severity::Error > Severity::Warning);
        assert!(Severity::Warning > Severity::Info);
        let worst = [Severity::Info, Severity::Error, Severity::Warning]
            .into_iter()
            .max();
        assert_eq!(worst, Some(Severity::Error));
    }

    #[test]
    fn invalid_type_records_expected_and_actual() {
        let source = EntityRef::content("classified", id(50));
        let issue = Issue::invalid_type("classified_to_event", &source, id(7), "event", "dj");
        assert_eq!(issue.expected.as_deref(), Some("event"));
        assert_eq!(issue.actual.as_deref(), Some("dj"));
        assert_eq!(issue.related, Some(id(7)));
    }

    #[test]
    fn issue_serializes_with_stable_kind_names() {
        let source = EntityRef::content("event", id(10));
        let issue = Issue::orphaned("event_to_dj", &source, id(999));
        let json = serde_json::to_value(&issue).expect("serialize");
        assert_eq!(json["kind"], "orphaned_reference");
        assert_eq!(json["severity"], "error");
        assert_eq!(json["source"]["type"], "event");
    }
}
