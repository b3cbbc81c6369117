//! SQLite reference implementation of the [`EntityStore`] contract.
//!
//! Runtime defaults are intentionally conservative:
//! - `journal_mode = WAL` to allow concurrent readers while a writer appends
//! - `busy_timeout = 5s` to reduce transient lock failures under contention
//! - `foreign_keys = ON` for any host tables layered on top

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use rusqlite::types::{Type, Value, ValueRef};
use rusqlite::{Connection, OptionalExtension, params};

use super::schema;
use super::{EntityStore, StoreError, StoreResult};
use crate::codec::RawValue;
use crate::model::{EntityId, EntityRef};

/// Busy timeout used for store connections.
pub const DEFAULT_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Latest schema version understood by this binary.
pub const LATEST_SCHEMA_VERSION: u32 = 1;

const MIGRATIONS: &[(u32, &str)] = &[(1, schema::MIGRATION_V1_SQL)];

/// Read `PRAGMA user_version` as `u32`.
///
/// # Errors
///
/// Returns an error if querying SQLite fails or the value does not fit.
pub fn current_schema_version(conn: &Connection) -> rusqlite::Result<u32> {
    let version: i64 = conn.pragma_query_value(None, "user_version", |row| row.get(0))?;
    u32::try_from(version).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(0, Type::Integer, Box::new(error))
    })
}

/// Apply all pending migrations in ascending order.
///
/// Idempotent: each migration only runs when its version exceeds
/// `user_version`, and the DDL itself uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if any migration fails.
pub fn migrate(conn: &mut Connection) -> rusqlite::Result<u32> {
    let mut current = current_schema_version(conn)?;

    for (version, sql) in MIGRATIONS {
        if *version <= current {
            continue;
        }
        let tx = conn.transaction()?;
        tx.execute_batch(sql)?;
        tx.pragma_update(None, "user_version", i64::from(*version))?;
        tx.commit()?;
        current = *version;
    }

    Ok(current)
}

fn configure_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.pragma_update(None, "foreign_keys", "ON")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    let _journal_mode: String =
        conn.query_row("PRAGMA journal_mode = WAL", [], |row| row.get(0))?;
    conn.busy_timeout(DEFAULT_BUSY_TIMEOUT)?;
    Ok(())
}

/// The SQLite-backed entity store.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the store at `path`, apply pragmas, and migrate to
    /// the latest schema version.
    ///
    /// # Errors
    ///
    /// Returns an error if opening/configuring/migrating the database fails.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("create store directory {}", parent.display()))?;
        }

        let mut conn = Connection::open(path)
            .with_context(|| format!("open store database {}", path.display()))?;
        configure_connection(&conn).context("configure sqlite pragmas")?;
        migrate(&mut conn).context("apply store migrations")?;

        Ok(Self { conn })
    }

    /// Open a fresh in-memory store (tests, dry experiments).
    ///
    /// # Errors
    ///
    /// Returns an error if migration fails.
    pub fn open_in_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory().context("open in-memory store")?;
        migrate(&mut conn).context("apply store migrations")?;
        Ok(Self { conn })
    }

    /// Borrow the underlying connection (host-side extensions, tests).
    #[must_use]
    pub const fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Insert a content entity. Replaces the kind if the id already exists.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub fn insert_entity(&self, tag: &str, id: EntityId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entities (id, kind) VALUES (?1, ?2)",
            params![to_i64(id), tag],
        )?;
        Ok(())
    }

    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub fn insert_user(&self, id: EntityId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR IGNORE INTO users (id) VALUES (?1)",
            params![to_i64(id)],
        )?;
        Ok(())
    }

    /// Delete a content entity (attributes are left behind on purpose — the
    /// integrity checker exists to find the dangling links).
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub fn delete_entity(&self, id: EntityId) -> StoreResult<()> {
        self.conn
            .execute("DELETE FROM entities WHERE id = ?1", params![to_i64(id)])?;
        Ok(())
    }

    /// Set the intrinsic owner column of a content entity.
    ///
    /// # Errors
    ///
    /// Returns a [`StoreError`] on backend failure.
    pub fn set_owner(&self, entity: EntityId, owner: EntityId) -> StoreResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO owners (entity_id, owner_id) VALUES (?1, ?2)",
            params![to_i64(entity), to_i64(owner)],
        )?;
        Ok(())
    }
}

fn to_i64(id: EntityId) -> i64 {
    // Ids come from the store's INTEGER columns; the round trip is lossless
    // for any id SQLite can hold.
    #[allow(clippy::cast_possible_wrap)]
    {
        id.get() as i64
    }
}

fn id_from_row(raw: i64, context: &str) -> StoreResult<EntityId> {
    u64::try_from(raw)
        .ok()
        .and_then(EntityId::new)
        .ok_or_else(|| StoreError::UnexpectedValue {
            context: context.to_string(),
            detail: format!("non-positive id {raw}"),
        })
}

fn scope_of(entity: &EntityRef) -> &'static str {
    if entity.ty.is_user() { "user" } else { "content" }
}

impl EntityStore for SqliteStore {
    fn entity_exists(&self, tag: &str, id: EntityId) -> StoreResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM entities WHERE id = ?1 AND kind = ?2)",
            params![to_i64(id), tag],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn entity_concrete_type(&self, id: EntityId) -> StoreResult<Option<String>> {
        let kind = self
            .conn
            .query_row(
                "SELECT kind FROM entities WHERE id = ?1",
                params![to_i64(id)],
                |row| row.get(0),
            )
            .optional()?;
        Ok(kind)
    }

    fn user_exists(&self, id: EntityId) -> StoreResult<bool> {
        let exists: bool = self.conn.query_row(
            "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1)",
            params![to_i64(id)],
            |row| row.get(0),
        )?;
        Ok(exists)
    }

    fn list_entities_of_type(&self, tag: &str, limit: usize) -> StoreResult<Vec<EntityId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM entities WHERE kind = ?1 ORDER BY id ASC LIMIT ?2")?;
        let rows = stmt.query_map(params![tag, limit_param(limit)], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(id_from_row(row?, "entities.id")?);
        }
        Ok(ids)
    }

    fn list_users(&self, limit: usize) -> StoreResult<Vec<EntityId>> {
        let mut stmt = self
            .conn
            .prepare("SELECT id FROM users ORDER BY id ASC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit_param(limit)], |row| row.get::<_, i64>(0))?;
        let mut ids = Vec::new();
        for row in rows {
            ids.push(id_from_row(row?, "users.id")?);
        }
        Ok(ids)
    }

    fn read_attribute(&self, source: &EntityRef, key: &str) -> StoreResult<Option<RawValue>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM attributes
                 WHERE scope = ?1 AND owner_id = ?2 AND key = ?3",
                params![scope_of(source), to_i64(source.id), key],
                |row| {
                    Ok(match row.get_ref(0)? {
                        ValueRef::Text(bytes) => {
                            Some(RawValue::Text(String::from_utf8_lossy(bytes).into_owned()))
                        }
                        ValueRef::Blob(bytes) => Some(RawValue::Blob(bytes.to_vec())),
                        // Legacy rows sometimes hold a bare integer.
                        ValueRef::Integer(n) => Some(RawValue::Text(n.to_string())),
                        ValueRef::Null | ValueRef::Real(_) => None,
                    })
                },
            )
            .optional()?;
        Ok(value.flatten())
    }

    fn write_attribute(
        &self,
        source: &EntityRef,
        key: &str,
        value: &RawValue,
    ) -> StoreResult<()> {
        let stored = match value {
            RawValue::Text(s) => Value::Text(s.clone()),
            RawValue::Blob(b) => Value::Blob(b.clone()),
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO attributes (scope, owner_id, key, value)
             VALUES (?1, ?2, ?3, ?4)",
            params![scope_of(source), to_i64(source.id), key, stored],
        )?;
        Ok(())
    }

    fn read_classification(
        &self,
        source: &EntityRef,
        taxonomy: &str,
    ) -> StoreResult<Vec<EntityId>> {
        let mut stmt = self.conn.prepare(
            "SELECT term_id FROM classifications
             WHERE scope = ?1 AND owner_id = ?2 AND taxonomy = ?3
             ORDER BY term_id ASC",
        )?;
        let rows = stmt.query_map(
            params![scope_of(source), to_i64(source.id), taxonomy],
            |row| row.get::<_, i64>(0),
        )?;
        let mut terms = Vec::new();
        for row in rows {
            terms.push(id_from_row(row?, "classifications.term_id")?);
        }
        Ok(terms)
    }

    fn write_classification(
        &self,
        source: &EntityRef,
        taxonomy: &str,
        terms: &[EntityId],
    ) -> StoreResult<()> {
        self.conn.execute(
            "DELETE FROM classifications
             WHERE scope = ?1 AND owner_id = ?2 AND taxonomy = ?3",
            params![scope_of(source), to_i64(source.id), taxonomy],
        )?;
        let mut stmt = self.conn.prepare(
            "INSERT OR IGNORE INTO classifications (scope, owner_id, taxonomy, term_id)
             VALUES (?1, ?2, ?3, ?4)",
        )?;
        for term in terms {
            stmt.execute(params![
                scope_of(source),
                to_i64(source.id),
                taxonomy,
                to_i64(*term)
            ])?;
        }
        Ok(())
    }

    fn read_owner(&self, source: &EntityRef) -> StoreResult<Option<EntityId>> {
        let raw = self
            .conn
            .query_row(
                "SELECT owner_id FROM owners WHERE entity_id = ?1",
                params![to_i64(source.id)],
                |row| row.get::<_, i64>(0),
            )
            .optional()?;
        raw.map(|r| id_from_row(r, "owners.owner_id")).transpose()
    }

    fn read_state(&self, key: &str) -> StoreResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM engine_state WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn write_state(&self, key: &str, value: &str) -> StoreResult<()> {
        let now_us = chrono::Utc::now().timestamp_micros();
        self.conn.execute(
            "INSERT OR REPLACE INTO engine_state (key, value, updated_at_us)
             VALUES (?1, ?2, ?3)",
            params![key, value, now_us],
        )?;
        Ok(())
    }
}

fn limit_param(limit: usize) -> i64 {
    i64::try_from(limit).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityType;

    fn id(raw: u64) -> EntityId {
        EntityId::new(raw).expect("nonzero test id")
    }

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().expect("open in-memory store")
    }

    #[test]
    fn open_on_disk_sets_pragmas_and_migrates() {
        let dir = tempfile::tempdir().expect("create temp dir");
        let path = dir.path().join("sinew-store.sqlite3");
        let s = SqliteStore::open(&path).expect("open store");

        let journal_mode: String = s
            .connection()
            .pragma_query_value(None, "journal_mode", |row| row.get(0))
            .expect("query journal_mode");
        assert_eq!(journal_mode.to_ascii_lowercase(), "wal");

        let version = current_schema_version(s.connection()).expect("schema version");
        assert_eq!(version, LATEST_SCHEMA_VERSION);
    }

    #[test]
    fn entity_and_user_id_spaces_are_separate() {
        let s = store();
        s.insert_entity("event", id(10)).expect("insert entity");
        s.insert_user(id(10)).expect("insert user");

        assert!(s.entity_exists("event", id(10)).expect("exists"));
        assert!(!s.entity_exists("dj", id(10)).expect("exists"));
        assert!(s.user_exists(id(10)).expect("exists"));
        assert!(!s.user_exists(id(11)).expect("exists"));
        assert_eq!(
            s.entity_concrete_type(id(10)).expect("kind"),
            Some("event".to_string())
        );
        assert_eq!(s.entity_concrete_type(id(99)).expect("kind"), None);
    }

    #[test]
    fn listing_is_ascending_and_limited() {
        let s = store();
        for raw in [30, 10, 20] {
            s.insert_entity("dj", id(raw)).expect("insert");
        }
        let ids = s.list_entities_of_type("dj", 2).expect("list");
        assert_eq!(ids, vec![id(10), id(20)]);
        assert!(s.list_entities_of_type("event", 10).expect("list").is_empty());
    }

    #[test]
    fn attribute_round_trips_text_and_blob() {
        let s = store();
        let event = EntityRef::content("event", id(1));

        assert_eq!(s.read_attribute(&event, "linked_djs").expect("read"), None);

        let text = RawValue::Text("5,6".to_string());
        s.write_attribute(&event, "venue_refs", &text).expect("write");
        assert_eq!(
            s.read_attribute(&event, "venue_refs").expect("read"),
            Some(text)
        );

        let blob = RawValue::Blob(vec![1, 0, 0, 0, 5, 0, 0, 0, 0, 0, 0, 0]);
        s.write_attribute(&event, "linked_djs", &blob).expect("write");
        assert_eq!(
            s.read_attribute(&event, "linked_djs").expect("read"),
            Some(blob)
        );
    }

    #[test]
    fn user_and_content_attributes_do_not_collide() {
        let s = store();
        let user = EntityRef::user(id(3));
        let content = EntityRef::new(EntityType::Content("dj".into()), id(3));

        s.write_attribute(&user, "following", &RawValue::Text("[1]".into()))
            .expect("write user");
        assert_eq!(s.read_attribute(&content, "following").expect("read"), None);
    }

    #[test]
    fn classification_replace_semantics() {
        let s = store();
        let event = EntityRef::content("event", id(1));

        s.write_classification(&event, "genre", &[id(7), id(8)])
            .expect("write");
        assert_eq!(
            s.read_classification(&event, "genre").expect("read"),
            vec![id(7), id(8)]
        );

        s.write_classification(&event, "genre", &[id(8)]).expect("write");
        assert_eq!(
            s.read_classification(&event, "genre").expect("read"),
            vec![id(8)]
        );
    }

    #[test]
    fn owner_column_round_trips() {
        let s = store();
        let classified = EntityRef::content("classified", id(50));
        assert_eq!(s.read_owner(&classified).expect("read"), None);
        s.set_owner(id(50), id(9)).expect("set");
        assert_eq!(s.read_owner(&classified).expect("read"), Some(id(9)));
    }

    #[test]
    fn engine_state_slot_round_trips() {
        let s = store();
        assert_eq!(s.read_state("sinew.last_audit").expect("read"), None);
        s.write_state("sinew.last_audit", "{\"x\":1}").expect("write");
        assert_eq!(
            s.read_state("sinew.last_audit").expect("read"),
            Some("{\"x\":1}".to_string())
        );
        s.write_state("sinew.last_audit", "{\"x\":2}").expect("write");
        assert_eq!(
            s.read_state("sinew.last_audit").expect("read"),
            Some("{\"x\":2}".to_string())
        );
    }

    #[test]
    fn legacy_integer_attribute_reads_as_text() {
        let s = store();
        let classified = EntityRef::content("classified", id(50));
        s.connection()
            .execute(
                "INSERT INTO attributes (scope, owner_id, key, value) VALUES ('content', 50, 'linked_event', 7)",
                [],
            )
            .expect("raw insert");
        assert_eq!(
            s.read_attribute(&classified, "linked_event").expect("read"),
            Some(RawValue::Text("7".to_string()))
        );
    }
}
