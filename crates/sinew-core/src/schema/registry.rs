//! The relationship schema registry.
//!
//! # Overview
//!
//! The registry is the single declarative table of all relationship
//! definitions. It is built exactly once at startup from a
//! [`RegistryBuilder`] and then passed by reference to every dependent
//! component — there is no hidden global. Collaborators extend or override
//! the schema through the builder before [`RegistryBuilder::build`] is
//! called; after that the table is immutable.
//!
//! # Forward-only storage
//!
//! Only forward (owning) relationships are registered. Reverse lookups are
//! derived [`ReverseView`]s computed from the forward table, so the forward
//! and reverse sides can never drift apart. Bidirectional pairs are two
//! forward definitions that name each other via `inverse` — each side owns
//! its own attribute.

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;

use super::definition::{RelationshipDef, Validation};

/// Immutable registry of forward relationship definitions.
///
/// Registration order is preserved: [`Registry::all`] and the filtered
/// accessors iterate in the order definitions were registered, which keeps
/// checker runs and reports deterministic.
#[derive(Debug, Clone)]
pub struct Registry {
    defs: Vec<RelationshipDef>,
    by_name: HashMap<String, usize>,
}

impl Registry {
    /// Start collecting definitions.
    #[must_use]
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder { defs: Vec::new() }
    }

    /// Look up a definition by canonical name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&RelationshipDef> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    /// All definitions in registration order.
    pub fn all(&self) -> impl Iterator<Item = &RelationshipDef> {
        self.defs.iter()
    }

    /// Number of registered definitions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// Returns `true` when no definitions are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }

    /// Definitions whose source side allows the given content kind.
    #[must_use]
    pub fn for_source_type(&self, tag: &str) -> Vec<&RelationshipDef> {
        self.defs.iter().filter(|d| d.source.allows(tag)).collect()
    }

    /// Definitions whose target side allows the given kind (`"user"` matches
    /// user-targeted relationships).
    #[must_use]
    pub fn for_target_type(&self, tag: &str) -> Vec<&RelationshipDef> {
        self.defs.iter().filter(|d| d.target.allows(tag)).collect()
    }

    /// Definitions exposed to host-side queries.
    #[must_use]
    pub fn queryable(&self) -> Vec<&RelationshipDef> {
        self.defs.iter().filter(|d| d.queryable).collect()
    }

    /// Derived reverse views, one per queryable forward definition.
    ///
    /// A view carries no storage of its own — resolving it searches the
    /// forward definition's population. Views are never the primary side of
    /// an integrity pass.
    #[must_use]
    pub fn reverse_views(&self) -> Vec<ReverseView> {
        self.defs
            .iter()
            .filter(|d| d.queryable)
            .map(|d| ReverseView {
                forward: d.name.clone(),
                exposed_name: format!("{}_sources", d.exposed_name),
            })
            .collect()
    }

    /// Validate one definition in the context of this registry: local rules
    /// plus the inverse-pairing invariant (a set `inverse` must resolve to a
    /// definition whose own `inverse` points back).
    #[must_use]
    pub fn validate_def(&self, def: &RelationshipDef) -> Validation {
        let mut result = def.validate();

        if let Some(inverse_name) = &def.inverse {
            match self.get(inverse_name) {
                None => {
                    result.valid = false;
                    result
                        .errors
                        .push(format!("inverse {inverse_name:?} is not registered"));
                }
                Some(inverse) if inverse.inverse.as_deref() != Some(def.name.as_str()) => {
                    result.valid = false;
                    result.errors.push(format!(
                        "inverse {inverse_name:?} does not point back to {:?}",
                        def.name
                    ));
                }
                Some(_) => {}
            }
        }

        result
    }

    /// Validate every registered definition. Keys are sorted for stable
    /// reporting.
    #[must_use]
    pub fn validate_all(&self) -> BTreeMap<String, Validation> {
        self.defs
            .iter()
            .map(|d| (d.name.clone(), self.validate_def(d)))
            .collect()
    }
}

/// A derived, read-only view of a forward relationship from the opposite
/// direction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReverseView {
    /// Name of the forward definition this view is computed from.
    pub forward: String,
    /// Public name collaborators see.
    pub exposed_name: String,
}

/// Collects definitions before the registry is frozen.
///
/// Registering a name twice replaces the earlier definition — this is the
/// schema-extension point: collaborators may override built-in definitions
/// before first read.
#[derive(Debug, Clone, Default)]
pub struct RegistryBuilder {
    defs: Vec<RelationshipDef>,
}

impl RegistryBuilder {
    /// Register or override a definition.
    #[must_use]
    pub fn register(mut self, def: RelationshipDef) -> Self {
        if let Some(existing) = self.defs.iter_mut().find(|d| d.name == def.name) {
            *existing = def;
        } else {
            self.defs.push(def);
        }
        self
    }

    /// Register every definition from an iterator.
    #[must_use]
    pub fn register_all(mut self, defs: impl IntoIterator<Item = RelationshipDef>) -> Self {
        for def in defs {
            self = self.register(def);
        }
        self
    }

    /// Freeze the table.
    #[must_use]
    pub fn build(self) -> Registry {
        let by_name = self
            .defs
            .iter()
            .enumerate()
            .map(|(i, d)| (d.name.clone(), i))
            .collect();
        Registry {
            defs: self.defs,
            by_name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::definition::{Cardinality, RelationshipDef, StorageMode};

    fn event_to_dj() -> RelationshipDef {
        RelationshipDef::builder("event_to_dj", Cardinality::ManyToMany)
            .source("event")
            .target("dj")
            .stored(StorageMode::ArrayNative, "linked_djs")
            .build()
    }

    fn follower_pair() -> (RelationshipDef, RelationshipDef) {
        let followers = RelationshipDef::builder("user_to_followers", Cardinality::ManyToMany)
            .source("user")
            .target("user")
            .stored(StorageMode::ArrayJson, "followers")
            .bidirectional("user_to_following")
            .self_referential()
            .build();
        let following = RelationshipDef::builder("user_to_following", Cardinality::ManyToMany)
            .source("user")
            .target("user")
            .stored(StorageMode::ArrayJson, "following")
            .bidirectional("user_to_followers")
            .self_referential()
            .build();
        (followers, following)
    }

    #[test]
    fn get_and_order_preserved() {
        let (followers, following) = follower_pair();
        let registry = Registry::builder()
            .register(event_to_dj())
            .register(followers)
            .register(following)
            .build();

        assert_eq!(registry.len(), 3);
        assert!(registry.get("event_to_dj").is_some());
        assert!(registry.get("nope").is_none());

        let names: Vec<_> = registry.all().map(|d| d.name.as_str()).collect();
        assert_eq!(
            names,
            ["event_to_dj", "user_to_followers", "user_to_following"]
        );
    }

    #[test]
    fn re_registering_overrides_in_place() {
        let mut replacement = event_to_dj();
        replacement.queryable = false;

        let registry = Registry::builder()
            .register(event_to_dj())
            .register(replacement)
            .build();

        assert_eq!(registry.len(), 1);
        let def = registry.get("event_to_dj").expect("registered");
        assert!(!def.queryable);
    }

    #[test]
    fn source_and_target_filters() {
        let (followers, following) = follower_pair();
        let registry = Registry::builder()
            .register(event_to_dj())
            .register(followers)
            .register(following)
            .build();

        let from_event: Vec<_> = registry
            .for_source_type("event")
            .iter()
            .map(|d| d.name.as_str())
            .collect();
        assert_eq!(from_event, ["event_to_dj"]);

        let to_user = registry.for_target_type("user");
        assert_eq!(to_user.len(), 2);

        assert!(registry.for_source_type("unknown").is_empty());
    }

    #[test]
    fn reverse_views_cover_queryable_defs_only() {
        let mut hidden = event_to_dj();
        hidden.name = "event_to_dj_hidden".to_string();
        hidden.exposed_name = "event_to_dj_hidden".to_string();
        hidden.queryable = false;

        let registry = Registry::builder()
            .register(event_to_dj())
            .register(hidden)
            .build();

        let views = registry.reverse_views();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].forward, "event_to_dj");
        assert_eq!(views[0].exposed_name, "event_to_dj_sources");
    }

    #[test]
    fn inverse_pairing_checked_by_validation() {
        let (followers, mut following) = follower_pair();
        // Break the pair: following points elsewhere.
        following.inverse = Some("user_to_blocked".to_string());

        let registry = Registry::builder()
            .register(followers)
            .register(following)
            .build();

        let followers_def = registry.get("user_to_followers").expect("registered");
        let v = registry.validate_def(followers_def);
        assert!(!v.valid);
        assert!(v.errors.iter().any(|e| e.contains("point back")));

        let report = registry.validate_all();
        assert!(!report["user_to_followers"].valid);
        // user_to_following's inverse is unregistered entirely.
        assert!(!report["user_to_following"].valid);
    }

    #[test]
    fn well_formed_pair_validates() {
        let (followers, following) = follower_pair();
        let registry = Registry::builder()
            .register(followers)
            .register(following)
            .build();
        assert!(registry.validate_all().values().all(|v| v.valid));
    }
}
