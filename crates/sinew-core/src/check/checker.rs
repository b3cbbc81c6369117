//! The integrity checker.
//!
//! # Overview
//!
//! A checker run walks a relationship's source population, validates every
//! stored link, and for bidirectional pairs verifies the inverse side. Each
//! source's check is fully isolated: a store failure or undecodable payload
//! on one record never aborts the pass over the rest of the population.
//!
//! Runs are idempotent over unchanged data — populations enumerate in
//! ascending id order and definitions in registration order, so the same
//! state always produces the same issue list.
//!
//! `limit` bounds per-run cost; full coverage of a large population takes
//! multiple paginated runs.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::issue::{Issue, Severity};
use crate::model::{EntityId, EntityRef, EntityType};
use crate::resolve::{LinkError, Resolver};
use crate::schema::{Registry, RelationshipDef, TargetKind};
use crate::store::{EntityStore, ref_exists};

/// Default cap on sources examined per relationship per run.
pub const DEFAULT_CHECK_LIMIT: usize = 200;

/// Options for a checker run.
#[derive(Debug, Clone, Copy)]
pub struct CheckOptions {
    /// Maximum sources enumerated per relationship.
    pub limit: usize,
}

impl Default for CheckOptions {
    fn default() -> Self {
        Self {
            limit: DEFAULT_CHECK_LIMIT,
        }
    }
}

/// Findings for one relationship.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelationshipReport {
    /// The relationship checked.
    pub relationship: String,
    /// How many sources were enumerated.
    pub sources_count: usize,
    /// Every issue found, in enumeration order.
    pub issues: Vec<Issue>,
    /// `issues.len()`, denormalized for serialized consumers.
    pub issues_count: usize,
}

impl RelationshipReport {
    /// The worst severity present, if any issue was found.
    #[must_use]
    pub fn worst_severity(&self) -> Option<Severity> {
        self.issues.iter().map(|i| i.severity).max()
    }
}

/// Fold of a full `check_all` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckSummary {
    /// Per-relationship findings, in registry order.
    pub relationships: Vec<RelationshipReport>,
    /// Total issues across all relationships.
    pub total_issues: usize,
    /// Issues at error severity.
    pub errors: usize,
    /// Issues at warning severity.
    pub warnings: usize,
    /// Issues at info severity.
    pub info: usize,
}

impl CheckSummary {
    /// Fold per-relationship reports into a summary with severity totals.
    #[must_use]
    pub fn fold(relationships: Vec<RelationshipReport>) -> Self {
        let mut errors = 0;
        let mut warnings = 0;
        let mut info = 0;
        for issue in relationships.iter().flat_map(|r| &r.issues) {
            match issue.severity {
                Severity::Error => errors += 1,
                Severity::Warning => warnings += 1,
                Severity::Info => info += 1,
            }
        }
        Self {
            total_issues: errors + warnings + info,
            relationships,
            errors,
            warnings,
            info,
        }
    }

    /// Returns `true` when no issues were found.
    #[must_use]
    pub const fn is_clean(&self) -> bool {
        self.total_issues == 0
    }

    /// Every issue across all relationships, in report order.
    pub fn issues(&self) -> impl Iterator<Item = &Issue> {
        self.relationships.iter().flat_map(|r| &r.issues)
    }
}

/// Walks relationships and produces [`Issue`]s.
pub struct IntegrityChecker<'a> {
    registry: &'a Registry,
    store: &'a dyn EntityStore,
    resolver: Resolver<'a>,
}

impl<'a> IntegrityChecker<'a> {
    /// Build a checker over a registry and store handle.
    #[must_use]
    pub const fn new(registry: &'a Registry, store: &'a dyn EntityStore) -> Self {
        Self {
            registry,
            store,
            resolver: Resolver::new(registry, store),
        }
    }

    /// Check every forward definition in the registry.
    ///
    /// Reverse views are derived data and are never the primary side of an
    /// integrity pass, so only owning definitions are walked.
    #[must_use]
    pub fn check_all(&self, opts: &CheckOptions) -> CheckSummary {
        let reports = self
            .registry
            .all()
            .map(|def| self.check_def(def, opts))
            .collect();
        CheckSummary::fold(reports)
    }

    /// Check one relationship by name. `None` for an unknown name.
    #[must_use]
    pub fn check_relationship(&self, name: &str, opts: &CheckOptions) -> Option<RelationshipReport> {
        self.registry.get(name).map(|def| self.check_def(def, opts))
    }

    fn check_def(&self, def: &RelationshipDef, opts: &CheckOptions) -> RelationshipReport {
        let sources = self.enumerate_sources(def, opts.limit);
        let mut issues = Vec::new();
        let mut pairs: Vec<(EntityRef, Vec<EntityId>)> = Vec::new();

        for source in &sources {
            let (mut found, unique) = self.check_source_inner(def, source);
            issues.append(&mut found);
            if def.bidirectional && !unique.is_empty() {
                pairs.push((source.clone(), unique));
            }
        }

        if def.bidirectional && def.inverse.is_some() {
            issues.extend(self.check_bidirectional(def, &pairs));
        }

        debug!(
            relationship = %def.name,
            sources = sources.len(),
            issues = issues.len(),
            "relationship checked"
        );

        RelationshipReport {
            relationship: def.name.clone(),
            sources_count: sources.len(),
            issues_count: issues.len(),
            issues,
        }
    }

    /// Enumerate up to `limit` sources across the definition's source kinds,
    /// in declaration order then ascending id order.
    fn enumerate_sources(&self, def: &RelationshipDef, limit: usize) -> Vec<EntityRef> {
        let mut sources = Vec::new();
        for tag in def.source.tags() {
            if sources.len() >= limit {
                break;
            }
            let remaining = limit - sources.len();
            match self.resolver.list_population(tag, remaining) {
                Ok(ids) => {
                    sources.extend(
                        ids.into_iter()
                            .map(|id| EntityRef::new(EntityType::from_tag(tag), id)),
                    );
                }
                Err(err) => {
                    warn!(
                        relationship = %def.name,
                        source_type = tag,
                        error = %err,
                        "source enumeration failed"
                    );
                }
            }
        }
        sources
    }

    /// Check one source's link list. Returns the issues found.
    #[must_use]
    pub fn check_source(&self, def: &RelationshipDef, source: &EntityRef) -> Vec<Issue> {
        self.check_source_inner(def, source).0
    }

    /// Check one source; also returns the unique related set for the
    /// bidirectional pass.
    fn check_source_inner(
        &self,
        def: &RelationshipDef,
        source: &EntityRef,
    ) -> (Vec<Issue>, Vec<EntityId>) {
        let ids = match self.resolver.links(def, source) {
            Ok(ids) => ids,
            Err(LinkError::Codec(err)) => {
                return (
                    vec![Issue::invalid_storage(&def.name, source, &err.to_string())],
                    Vec::new(),
                );
            }
            Err(err) => {
                // Store-layer failures go to logs only; the source is skipped
                // and the pass continues.
                warn!(
                    relationship = %def.name,
                    source = %source,
                    error = %err,
                    "link read failed; source skipped"
                );
                return (Vec::new(), Vec::new());
            }
        };
        if ids.is_empty() {
            return (Vec::new(), Vec::new());
        }

        let mut issues = Vec::new();

        // Duplicates first: one issue per source, then continue with the
        // unique set in first-occurrence order.
        let mut seen = HashSet::new();
        let mut unique = Vec::new();
        let mut duplicated = Vec::new();
        for id in &ids {
            if seen.insert(*id) {
                unique.push(*id);
            } else if !duplicated.contains(id) {
                duplicated.push(*id);
            }
        }
        if !duplicated.is_empty() {
            issues.push(Issue::duplicate(&def.name, source, &duplicated));
        }

        for related in &unique {
            // Self-reference only makes sense when source and target share an
            // id space, i.e. the source's own type is an allowed target.
            if *related == source.id
                && def.target.allows(source.ty.tag())
                && !def.self_referential
            {
                issues.push(Issue::self_reference(&def.name, source));
                continue;
            }

            if let Some(issue) = self.check_existence(def, source, *related) {
                issues.push(issue);
            }
        }

        (issues, unique)
    }

    /// Existence and type validation for one related id, by exhaustive match
    /// over the target kind. Emits at most one issue — never both
    /// `invalid_type` and `orphaned_reference` for the same id.
    fn check_existence(
        &self,
        def: &RelationshipDef,
        source: &EntityRef,
        related: EntityId,
    ) -> Option<Issue> {
        match &def.target {
            TargetKind::User => match self.store.user_exists(related) {
                Ok(true) => None,
                Ok(false) => Some(Issue::orphaned(&def.name, source, related)),
                Err(err) => {
                    warn!(relationship = %def.name, related = %related, error = %err, "user existence check failed");
                    None
                }
            },
            TargetKind::Single(tag) => match self.store.entity_concrete_type(related) {
                Ok(Some(actual)) if actual == *tag => None,
                Ok(Some(actual)) => Some(Issue::invalid_type(
                    &def.name, source, related, tag, &actual,
                )),
                Ok(None) => Some(Issue::orphaned(&def.name, source, related)),
                Err(err) => {
                    warn!(relationship = %def.name, related = %related, error = %err, "type lookup failed");
                    None
                }
            },
            TargetKind::AnyOf(tags) => match self.store.entity_concrete_type(related) {
                Ok(Some(actual)) if tags.iter().any(|t| *t == actual) => None,
                Ok(Some(actual)) => Some(Issue::invalid_type(
                    &def.name,
                    source,
                    related,
                    &def.target.describe(),
                    &actual,
                )),
                Ok(None) => Some(Issue::orphaned(&def.name, source, related)),
                Err(err) => {
                    warn!(relationship = %def.name, related = %related, error = %err, "type lookup failed");
                    None
                }
            },
        }
    }

    /// For each `(source, related)` pair, verify the inverse side links back.
    fn check_bidirectional(
        &self,
        def: &RelationshipDef,
        pairs: &[(EntityRef, Vec<EntityId>)],
    ) -> Vec<Issue> {
        let Some(inverse_name) = def.inverse.as_deref() else {
            return Vec::new();
        };
        let Some(inverse_def) = self.registry.get(inverse_name) else {
            warn!(
                relationship = %def.name,
                inverse = inverse_name,
                "inverse definition not registered; bidirectional pass skipped"
            );
            return Vec::new();
        };

        let mut issues = Vec::new();
        for (source, related_ids) in pairs {
            for related in related_ids {
                // Self links are handled by the self-reference rule.
                if *related == source.id && !def.self_referential {
                    continue;
                }
                let Some(related_ref) = self.resolver.target_ref(def, *related) else {
                    continue; // orphan, already flagged
                };
                match ref_exists(self.store, &related_ref) {
                    Ok(true) => {}
                    Ok(false) => continue, // orphan, already flagged
                    Err(err) => {
                        warn!(related = %related_ref, error = %err, "existence check failed");
                        continue;
                    }
                }
                match self.resolver.links(inverse_def, &related_ref) {
                    Ok(back_links) if back_links.contains(&source.id) => {}
                    Ok(_) => {
                        issues.push(Issue::missing_inverse(
                            &def.name,
                            inverse_name,
                            source,
                            *related,
                        ));
                    }
                    Err(err) => {
                        warn!(
                            relationship = %def.name,
                            inverse = inverse_name,
                            related = %related_ref,
                            error = %err,
                            "inverse read failed"
                        );
                    }
                }
            }
        }
        issues
    }
}
