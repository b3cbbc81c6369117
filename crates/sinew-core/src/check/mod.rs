//! Integrity checking: walk relationship populations and surface
//! inconsistencies as first-class [`Issue`] values.

pub mod checker;
pub mod issue;

pub use checker::{CheckOptions, CheckSummary, IntegrityChecker, RelationshipReport};
pub use issue::{Issue, IssueKind, Severity};
