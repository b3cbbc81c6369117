//! Relationship resolution: read related ids, create and remove links.
//!
//! # Overview
//!
//! The [`Resolver`] is the one component that knows how to turn a
//! [`RelationshipDef`] plus a source entity into concrete ids, and how to
//! write a mutated id list back through the correct storage path. The
//! checker and repair engine both route their storage access through it.
//!
//! # Error posture
//!
//! The public mutation surface ([`Resolver::connect`] /
//! [`Resolver::disconnect`]) never propagates errors: it returns `false` on
//! an unknown definition, a missing source, or a store failure, and logs the
//! cause. The lower-level [`Resolver::links`] / [`Resolver::write_links`]
//! pair returns typed errors for callers (the checker) that need to tell a
//! malformed payload apart from an empty one.

use tracing::{debug, warn};

use crate::codec::{CodecError, codec_for};
use crate::model::{EntityId, EntityRef, EntityType};
use crate::schema::{Registry, RelationshipDef, StorageMode, TargetKind};
use crate::store::{EntityStore, StoreError, ref_exists};

/// Default cap on reverse-lookup scans when the store has no native
/// "contains" query.
pub const DEFAULT_SCAN_CAP: usize = 5_000;

/// A link read or write that could not be completed.
#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    /// The raw payload did not decode for the definition's storage mode.
    #[error("undecodable payload: {0}")]
    Codec(#[from] CodecError),

    /// The host store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The storage mode carries no writable attribute.
    #[error("storage mode {0} is not writable")]
    NotWritable(StorageMode),
}

/// Resolves and mutates relationship links against one registry + store.
pub struct Resolver<'a> {
    registry: &'a Registry,
    store: &'a dyn EntityStore,
    scan_cap: usize,
}

impl<'a> Resolver<'a> {
    /// Build a resolver over a registry and store handle.
    #[must_use]
    pub const fn new(registry: &'a Registry, store: &'a dyn EntityStore) -> Self {
        Self {
            registry,
            store,
            scan_cap: DEFAULT_SCAN_CAP,
        }
    }

    /// Override the reverse-scan bound.
    #[must_use]
    pub const fn with_scan_cap(mut self, cap: usize) -> Self {
        self.scan_cap = cap;
        self
    }

    /// Related ids for a source under a named forward relationship.
    ///
    /// Lenient: an unknown definition, undecodable payload, or store failure
    /// resolves to an empty list (logged), matching the host-facing query
    /// contract.
    #[must_use]
    pub fn related(&self, source: &EntityRef, name: &str) -> Vec<EntityId> {
        let Some(def) = self.registry.get(name) else {
            warn!(relationship = name, "related: unknown relationship");
            return Vec::new();
        };
        match self.links(def, source) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(
                    relationship = name,
                    source = %source,
                    error = %err,
                    "related: resolution failed"
                );
                Vec::new()
            }
        }
    }

    /// Reverse view: ids of sources whose `forward_name` list contains the
    /// target. At most `limit` results.
    ///
    /// Uses the store's native contains query when available; otherwise
    /// scans up to the configured cap of candidate sources and filters by
    /// decoded membership.
    #[must_use]
    pub fn sources_of(&self, target: &EntityRef, forward_name: &str, limit: usize) -> Vec<EntityId> {
        let Some(def) = self.registry.get(forward_name) else {
            warn!(relationship = forward_name, "sources_of: unknown relationship");
            return Vec::new();
        };

        let mut found = Vec::new();
        for tag in def.source.tags() {
            if found.len() >= limit {
                break;
            }
            let remaining = limit - found.len();

            // Native path first, attribute-backed modes only.
            if def.storage.attribute_backed() {
                if let Some(key) = def.storage_key.as_deref() {
                    match self.store.find_attribute_contains(tag, key, target.id, remaining) {
                        Ok(Some(ids)) => {
                            found.extend(ids);
                            continue;
                        }
                        Ok(None) => {}
                        Err(err) => {
                            warn!(
                                relationship = forward_name,
                                source_type = tag,
                                error = %err,
                                "sources_of: native contains query failed"
                            );
                            continue;
                        }
                    }
                }
            }

            found.extend(self.scan_sources(def, tag, target.id, remaining));
        }
        found
    }

    /// Bounded full-scan fallback for one source kind.
    fn scan_sources(
        &self,
        def: &RelationshipDef,
        tag: &str,
        target: EntityId,
        limit: usize,
    ) -> Vec<EntityId> {
        let candidates = match self.list_population(tag, self.scan_cap) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(
                    relationship = %def.name,
                    source_type = tag,
                    error = %err,
                    "sources_of: population listing failed"
                );
                return Vec::new();
            }
        };
        if candidates.len() == self.scan_cap {
            warn!(
                relationship = %def.name,
                source_type = tag,
                cap = self.scan_cap,
                "sources_of: scan hit its cap; results may be incomplete"
            );
        }

        let mut found = Vec::new();
        for candidate in candidates {
            if found.len() >= limit {
                break;
            }
            let source = EntityRef::new(EntityType::from_tag(tag), candidate);
            match self.links(def, &source) {
                Ok(ids) if ids.contains(&target) => found.push(candidate),
                Ok(_) => {}
                Err(err) => {
                    debug!(
                        relationship = %def.name,
                        source = %source,
                        error = %err,
                        "sources_of: skipping unreadable source"
                    );
                }
            }
        }
        found
    }

    /// Enumerate up to `limit` candidate sources of a kind tag, routing the
    /// reserved user tag to the user table.
    ///
    /// # Errors
    ///
    /// Propagates the underlying store failure.
    pub fn list_population(&self, tag: &str, limit: usize) -> Result<Vec<EntityId>, StoreError> {
        if tag == crate::model::entity::USER_TAG {
            self.store.list_users(limit)
        } else {
            self.store.list_entities_of_type(tag, limit)
        }
    }

    /// Decode the current link list for a definition + source.
    ///
    /// # Errors
    ///
    /// [`LinkError::Codec`] when the stored payload is malformed for the
    /// definition's mode; [`LinkError::Store`] on backend failure.
    pub fn links(
        &self,
        def: &RelationshipDef,
        source: &EntityRef,
    ) -> Result<Vec<EntityId>, LinkError> {
        match def.storage {
            StorageMode::ClassificationLink => {
                let taxonomy = def.storage_key.as_deref().unwrap_or_default();
                Ok(self.store.read_classification(source, taxonomy)?)
            }
            StorageMode::ComputedOwner => {
                Ok(self.store.read_owner(source)?.into_iter().collect())
            }
            mode => {
                let key = def.storage_key.as_deref().unwrap_or_default();
                let raw = self.store.read_attribute(source, key)?;
                let codec = codec_for(mode).ok_or(LinkError::NotWritable(mode))?;
                Ok(codec.decode(raw.as_ref())?)
            }
        }
    }

    /// Encode and write a full link list for a definition + source.
    ///
    /// # Errors
    ///
    /// [`LinkError::NotWritable`] for ownership columns, [`LinkError::Store`]
    /// on backend failure.
    pub fn write_links(
        &self,
        def: &RelationshipDef,
        source: &EntityRef,
        ids: &[EntityId],
    ) -> Result<(), LinkError> {
        match def.storage {
            StorageMode::ClassificationLink => {
                let taxonomy = def.storage_key.as_deref().unwrap_or_default();
                Ok(self.store.write_classification(source, taxonomy, ids)?)
            }
            StorageMode::ComputedOwner => Err(LinkError::NotWritable(StorageMode::ComputedOwner)),
            mode => {
                let key = def.storage_key.as_deref().unwrap_or_default();
                let codec = codec_for(mode).ok_or(LinkError::NotWritable(mode))?;
                Ok(self.store.write_attribute(source, key, &codec.encode(ids))?)
            }
        }
    }

    /// Create a link from `source` to `target` under a named relationship.
    ///
    /// Appends for `*_TO_MANY` cardinalities (idempotent: an existing link is
    /// a no-op success) and replaces the slot for `*_TO_ONE`. When the
    /// definition is bidirectional, the inverse side is mirrored; a mirror
    /// failure is logged and left for the integrity cycle to repair.
    ///
    /// Returns `false` on unknown definition, missing source, or store
    /// failure. Never panics.
    #[must_use]
    pub fn connect(&self, source: &EntityRef, target: EntityId, name: &str) -> bool {
        self.connect_inner(source, target, name, true)
    }

    fn connect_inner(&self, source: &EntityRef, target: EntityId, name: &str, mirror: bool) -> bool {
        let Some(def) = self.registry.get(name) else {
            warn!(relationship = name, "connect: unknown relationship");
            return false;
        };
        if !self.source_present(def, source) {
            return false;
        }

        let mut ids = match self.links(def, source) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(relationship = name, source = %source, error = %err, "connect: read failed");
                return false;
            }
        };

        let changed = if def.cardinality.single_target() {
            if ids == [target] {
                false
            } else {
                ids = vec![target];
                true
            }
        } else if ids.contains(&target) {
            false
        } else {
            ids.push(target);
            true
        };

        if changed {
            if let Err(err) = self.write_links(def, source, &ids) {
                warn!(relationship = name, source = %source, error = %err, "connect: write failed");
                return false;
            }
        }

        if mirror && def.bidirectional {
            self.mirror(def, source, target, true);
        }
        true
    }

    /// Remove the link from `source` to `target`. Removing an absent link is
    /// a no-op success. Mirrored on the inverse when bidirectional.
    ///
    /// Returns `false` on unknown definition, missing source, or store
    /// failure. Never panics.
    #[must_use]
    pub fn disconnect(&self, source: &EntityRef, target: EntityId, name: &str) -> bool {
        self.disconnect_inner(source, target, name, true)
    }

    fn disconnect_inner(
        &self,
        source: &EntityRef,
        target: EntityId,
        name: &str,
        mirror: bool,
    ) -> bool {
        let Some(def) = self.registry.get(name) else {
            warn!(relationship = name, "disconnect: unknown relationship");
            return false;
        };
        if !self.source_present(def, source) {
            return false;
        }

        let ids = match self.links(def, source) {
            Ok(ids) => ids,
            Err(err) => {
                warn!(relationship = name, source = %source, error = %err, "disconnect: read failed");
                return false;
            }
        };

        let remaining: Vec<EntityId> = ids.iter().copied().filter(|id| *id != target).collect();
        if remaining.len() != ids.len() {
            if let Err(err) = self.write_links(def, source, &remaining) {
                warn!(relationship = name, source = %source, error = %err, "disconnect: write failed");
                return false;
            }
        }

        if mirror && def.bidirectional {
            self.mirror(def, source, target, false);
        }
        true
    }

    /// Mirror a connect/disconnect onto the inverse definition.
    fn mirror(&self, def: &RelationshipDef, source: &EntityRef, target: EntityId, add: bool) {
        let Some(inverse_name) = def.inverse.as_deref() else {
            warn!(relationship = %def.name, "bidirectional definition without inverse name");
            return;
        };
        let Some(inverse_source) = self.target_ref(def, target) else {
            debug!(
                relationship = %def.name,
                target = %target,
                "mirror skipped: target not resolvable to a typed ref"
            );
            return;
        };

        let ok = if add {
            self.connect_inner(&inverse_source, source.id, inverse_name, false)
        } else {
            self.disconnect_inner(&inverse_source, source.id, inverse_name, false)
        };
        if !ok {
            // The integrity checker will surface this as a missing_inverse.
            warn!(
                relationship = %def.name,
                inverse = inverse_name,
                source = %source,
                target = %target,
                "mirror write failed"
            );
        }
    }

    /// Resolve a target id to a typed reference for the definition's target
    /// kind. Polymorphic targets consult the store for the concrete kind.
    #[must_use]
    pub fn target_ref(&self, def: &RelationshipDef, id: EntityId) -> Option<EntityRef> {
        match &def.target {
            TargetKind::User => Some(EntityRef::user(id)),
            TargetKind::Single(tag) => Some(EntityRef::content(tag, id)),
            TargetKind::AnyOf(_) => match self.store.entity_concrete_type(id) {
                Ok(Some(tag)) => Some(EntityRef::content(&tag, id)),
                Ok(None) => None,
                Err(err) => {
                    warn!(target = %id, error = %err, "target_ref: concrete type lookup failed");
                    None
                }
            },
        }
    }

    fn source_present(&self, def: &RelationshipDef, source: &EntityRef) -> bool {
        if !def.source.allows(source.ty.tag()) {
            warn!(
                relationship = %def.name,
                source = %source,
                "source type not allowed by definition"
            );
            return false;
        }
        match ref_exists(self.store, source) {
            Ok(true) => true,
            Ok(false) => {
                debug!(relationship = %def.name, source = %source, "source does not exist");
                false
            }
            Err(err) => {
                warn!(relationship = %def.name, source = %source, error = %err, "existence check failed");
                false
            }
        }
    }
}
