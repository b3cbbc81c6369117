//! Host entity-store contract.
//!
//! The relationship engine never talks to the host's tables directly — it
//! goes through [`EntityStore`], a synchronous, blocking contract covering
//! entity existence, raw attribute access, the classification system,
//! ownership columns, and one key/value slot for persisted engine state.
//!
//! The reference implementation is [`sqlite::SqliteStore`]; tests run it
//! in-memory. All failures are [`StoreError`] — callers at the resolver and
//! checker layers convert them to boolean results or logged, isolated
//! per-source failures, so one bad read never aborts a pass.

pub mod schema;
pub mod sqlite;

use crate::codec::RawValue;
use crate::model::{EntityId, EntityRef};

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// A failure inside the host store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Backend I/O failure (connection, disk, lock).
    #[error("store backend failure: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// The store handed back a value shaped wrong for its column.
    #[error("unexpected value for {context}: {detail}")]
    UnexpectedValue {
        /// What was being read.
        context: String,
        /// What came back.
        detail: String,
    },
}

impl StoreError {
    /// Wrap a backend error.
    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        Self::backend(err)
    }
}

/// Synchronous contract onto the host's entity tables.
///
/// Listing methods return ids in ascending order so repeated runs over
/// unchanged data enumerate identical populations — the audit idempotence
/// guarantee depends on it.
pub trait EntityStore {
    /// Does a content entity of this kind and id exist?
    fn entity_exists(&self, tag: &str, id: EntityId) -> StoreResult<bool>;

    /// The concrete kind of a content entity, if it exists at all.
    fn entity_concrete_type(&self, id: EntityId) -> StoreResult<Option<String>>;

    /// Does a user with this id exist?
    fn user_exists(&self, id: EntityId) -> StoreResult<bool>;

    /// Up to `limit` content entity ids of the given kind, ascending.
    fn list_entities_of_type(&self, tag: &str, limit: usize) -> StoreResult<Vec<EntityId>>;

    /// Up to `limit` user ids, ascending.
    fn list_users(&self, limit: usize) -> StoreResult<Vec<EntityId>>;

    /// Read a raw link attribute. `None` means never written.
    fn read_attribute(&self, source: &EntityRef, key: &str) -> StoreResult<Option<RawValue>>;

    /// Write a raw link attribute, replacing any previous value.
    fn write_attribute(
        &self,
        source: &EntityRef,
        key: &str,
        value: &RawValue,
    ) -> StoreResult<()>;

    /// Term ids attached to a source through the classification system.
    fn read_classification(&self, source: &EntityRef, taxonomy: &str)
    -> StoreResult<Vec<EntityId>>;

    /// Replace a source's classification terms.
    fn write_classification(
        &self,
        source: &EntityRef,
        taxonomy: &str,
        terms: &[EntityId],
    ) -> StoreResult<()>;

    /// The intrinsic owner id of a content entity, if set.
    fn read_owner(&self, source: &EntityRef) -> StoreResult<Option<EntityId>>;

    /// Native "entities of `tag` whose attribute `key` contains `id`" query.
    ///
    /// `Ok(None)` means the backend has no native path; the resolver then
    /// falls back to a bounded scan over [`Self::list_entities_of_type`].
    fn find_attribute_contains(
        &self,
        _tag: &str,
        _key: &str,
        _id: EntityId,
        _limit: usize,
    ) -> StoreResult<Option<Vec<EntityId>>> {
        Ok(None)
    }

    /// Read persisted engine state under a well-known key.
    fn read_state(&self, key: &str) -> StoreResult<Option<String>>;

    /// Persist engine state under a well-known key.
    fn write_state(&self, key: &str, value: &str) -> StoreResult<()>;
}

/// Existence check dispatching on the reference's type.
///
/// # Errors
///
/// Propagates the underlying store failure.
pub fn ref_exists(store: &dyn EntityStore, entity: &EntityRef) -> StoreResult<bool> {
    if entity.ty.is_user() {
        store.user_exists(entity.id)
    } else {
        store.entity_exists(entity.ty.tag(), entity.id)
    }
}
