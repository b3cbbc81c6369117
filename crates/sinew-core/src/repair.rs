//! Repair procedures for detected integrity issues.
//!
//! # Repair Philosophy
//!
//! - **Deterministic**: same issue + same data → same corrective action,
//!   every time. A dry run reaches the identical decision as the live path
//!   and only suppresses the final write.
//! - **Idempotent**: re-repairing an already-fixed issue is a no-op that
//!   still reports success.
//! - **Never aborts**: an unrepairable issue lands in `failed[]` and the run
//!   continues.
//!
//! The corrective actions are deliberately few: bad references (orphaned,
//! wrong type, self) are removed from the list; duplicates are collapsed in
//! first-occurrence order; missing inverse links are re-created through the
//! resolver so bidirectional mirroring applies.

use serde::Serialize;
use tracing::info;

use crate::check::checker::{CheckOptions, IntegrityChecker};
use crate::check::issue::{Issue, IssueKind};
use crate::model::EntityId;
use crate::resolve::Resolver;
use crate::schema::{Registry, RelationshipDef};
use crate::store::EntityStore;

/// Options for a repair run.
#[derive(Debug, Clone, Copy, Default)]
pub struct RepairOptions {
    /// Decide every fix but skip the writes.
    pub dry_run: bool,
    /// Source enumeration cap for the underlying checker pass.
    pub limit: usize,
}

impl RepairOptions {
    fn check_options(self) -> CheckOptions {
        if self.limit == 0 {
            CheckOptions::default()
        } else {
            CheckOptions { limit: self.limit }
        }
    }
}

/// The corrective action taken (or decided, under dry run) for one issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum RepairAction {
    /// Removed every occurrence of the offending id from the link list.
    RemovedReference {
        /// The id that was removed.
        removed: EntityId,
    },
    /// Collapsed duplicates, keeping first-occurrence order.
    Deduplicated {
        /// How many surplus entries were dropped.
        dropped: usize,
    },
    /// Re-created the missing back link on the inverse side.
    ConnectedInverse {
        /// The inverse relationship written to.
        inverse: String,
    },
    /// The issue was already fixed — nothing to do.
    NoActionNeeded,
}

/// One successfully handled issue.
#[derive(Debug, Clone, Serialize)]
pub struct RepairedIssue {
    /// The issue as the checker reported it.
    pub issue: Issue,
    /// What was done about it.
    pub action: RepairAction,
}

/// One issue the engine could not handle.
#[derive(Debug, Clone, Serialize)]
pub struct FailedRepair {
    /// The issue as the checker reported it.
    pub issue: Issue,
    /// Why the repair was not possible.
    pub reason: String,
}

/// Outcome of one repair pass over a relationship.
#[derive(Debug, Clone, Serialize)]
pub struct RepairReport {
    /// The relationship repaired.
    pub relationship: String,
    /// Whether writes were suppressed.
    pub dry_run: bool,
    /// Issues handled (including already-fixed no-ops).
    pub repaired: Vec<RepairedIssue>,
    /// Issues that could not be handled.
    pub failed: Vec<FailedRepair>,
}

/// Mutates storage to resolve detected issues.
pub struct RepairEngine<'a> {
    registry: &'a Registry,
    resolver: Resolver<'a>,
    checker: IntegrityChecker<'a>,
}

impl<'a> RepairEngine<'a> {
    /// Build a repair engine over a registry and store handle.
    #[must_use]
    pub const fn new(registry: &'a Registry, store: &'a dyn EntityStore) -> Self {
        Self {
            registry,
            resolver: Resolver::new(registry, store),
            checker: IntegrityChecker::new(registry, store),
        }
    }

    /// Re-check one relationship and attempt to repair every issue found.
    /// `None` for an unknown name.
    #[must_use]
    pub fn repair_relationship(&self, name: &str, opts: &RepairOptions) -> Option<RepairReport> {
        let def = self.registry.get(name)?;
        let report = self.checker.check_relationship(name, &opts.check_options())?;

        let mut repaired = Vec::new();
        let mut failed = Vec::new();
        for issue in report.issues {
            match self.repair_issue(def, &issue, opts.dry_run) {
                Ok(action) => {
                    info!(
                        relationship = name,
                        kind = %issue.kind,
                        source = %issue.source,
                        dry_run = opts.dry_run,
                        ?action,
                        "issue repaired"
                    );
                    repaired.push(RepairedIssue { issue, action });
                }
                Err(reason) => {
                    info!(
                        relationship = name,
                        kind = %issue.kind,
                        source = %issue.source,
                        reason = %reason,
                        "repair failed"
                    );
                    failed.push(FailedRepair { issue, reason });
                }
            }
        }

        Some(RepairReport {
            relationship: name.to_string(),
            dry_run: opts.dry_run,
            repaired,
            failed,
        })
    }

    /// Repair every relationship in the registry, in registration order.
    #[must_use]
    pub fn repair_all(&self, opts: &RepairOptions) -> Vec<RepairReport> {
        self.registry
            .all()
            .filter_map(|def| self.repair_relationship(&def.name, opts))
            .collect()
    }

    /// Dispatch one issue to its corrective action.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the issue cannot be repaired;
    /// the caller records it and the run continues.
    fn repair_issue(
        &self,
        def: &RelationshipDef,
        issue: &Issue,
        dry_run: bool,
    ) -> Result<RepairAction, String> {
        match issue.kind {
            IssueKind::OrphanedReference | IssueKind::InvalidType | IssueKind::SelfReference => {
                let related = issue
                    .related
                    .ok_or_else(|| "issue carries no related id".to_string())?;
                self.remove_reference(def, issue, related, dry_run)
            }
            IssueKind::DuplicateReference => self.deduplicate(def, issue, dry_run),
            IssueKind::MissingInverse => self.connect_inverse(def, issue, dry_run),
            IssueKind::InvalidStorage => {
                Err("undecodable payload requires manual repair".to_string())
            }
        }
    }

    /// Remove every occurrence of `related` from the source's list. The same
    /// corrective action covers orphaned, wrong-type, and self references.
    fn remove_reference(
        &self,
        def: &RelationshipDef,
        issue: &Issue,
        related: EntityId,
        dry_run: bool,
    ) -> Result<RepairAction, String> {
        if !def.storage.writable() {
            return Err(format!("storage mode {} is not writable", def.storage));
        }
        let current = self
            .resolver
            .links(def, &issue.source)
            .map_err(|e| e.to_string())?;
        let desired: Vec<EntityId> = current.iter().copied().filter(|id| *id != related).collect();

        if desired.len() == current.len() {
            return Ok(RepairAction::NoActionNeeded);
        }
        if !dry_run {
            self.resolver
                .write_links(def, &issue.source, &desired)
                .map_err(|e| e.to_string())?;
        }
        Ok(RepairAction::RemovedReference { removed: related })
    }

    /// Collapse duplicates preserving first-occurrence order.
    fn deduplicate(
        &self,
        def: &RelationshipDef,
        issue: &Issue,
        dry_run: bool,
    ) -> Result<RepairAction, String> {
        if !def.storage.writable() {
            return Err(format!("storage mode {} is not writable", def.storage));
        }
        let current = self
            .resolver
            .links(def, &issue.source)
            .map_err(|e| e.to_string())?;

        let mut seen = std::collections::HashSet::new();
        let desired: Vec<EntityId> = current
            .iter()
            .copied()
            .filter(|id| seen.insert(*id))
            .collect();

        if desired.len() == current.len() {
            return Ok(RepairAction::NoActionNeeded);
        }
        if !dry_run {
            self.resolver
                .write_links(def, &issue.source, &desired)
                .map_err(|e| e.to_string())?;
        }
        Ok(RepairAction::Deduplicated {
            dropped: current.len() - desired.len(),
        })
    }

    /// Re-create the missing back link through the resolver.
    fn connect_inverse(
        &self,
        def: &RelationshipDef,
        issue: &Issue,
        dry_run: bool,
    ) -> Result<RepairAction, String> {
        let inverse_name = def
            .inverse
            .as_deref()
            .ok_or_else(|| "definition has no inverse".to_string())?;
        let inverse_def = self
            .registry
            .get(inverse_name)
            .ok_or_else(|| format!("inverse {inverse_name:?} is not registered"))?;
        let related = issue
            .related
            .ok_or_else(|| "issue carries no related id".to_string())?;
        let related_ref = self
            .resolver
            .target_ref(def, related)
            .ok_or_else(|| format!("target {related} is not resolvable to a typed ref"))?;

        let back_links = self
            .resolver
            .links(inverse_def, &related_ref)
            .map_err(|e| e.to_string())?;
        if back_links.contains(&issue.source.id) {
            return Ok(RepairAction::NoActionNeeded);
        }

        if !dry_run && !self.resolver.connect(&related_ref, issue.source.id, inverse_name) {
            return Err(format!("connect({related_ref}, {}, {inverse_name}) failed", issue.source.id));
        }
        Ok(RepairAction::ConnectedInverse {
            inverse: inverse_name.to_string(),
        })
    }
}
