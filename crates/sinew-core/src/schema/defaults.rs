//! Built-in relationship schema for the community-site content kinds.
//!
//! This is static domain vocabulary as code: the definitions a stock install
//! ships with. Collaborators may override any of them (or add their own)
//! through the [`RegistryBuilder`] before the registry is frozen.
//!
//! The set deliberately spans every storage mode so each codec path has at
//! least one production user.
//!
//! [`RegistryBuilder`]: super::registry::RegistryBuilder

use super::definition::{Cardinality, RelationshipDef, StorageMode};
use super::registry::Registry;

/// The default definitions, in registration order.
#[must_use]
pub fn definitions() -> Vec<RelationshipDef> {
    vec![
        // Events book multiple djs; the event record owns the link list.
        RelationshipDef::builder("event_to_dj", Cardinality::ManyToMany)
            .source("event")
            .target("dj")
            .stored(StorageMode::ArrayNative, "linked_djs")
            .build(),
        // A classified ad promotes at most one event.
        RelationshipDef::builder("classified_to_event", Cardinality::ManyToOne)
            .source("classified")
            .target("event")
            .stored(StorageMode::SingleReference, "linked_event")
            .build(),
        // Follower graph: two owning sides that must mirror each other.
        RelationshipDef::builder("user_to_followers", Cardinality::ManyToMany)
            .source("user")
            .target("user")
            .stored(StorageMode::ArrayJson, "followers")
            .bidirectional("user_to_following")
            .build(),
        RelationshipDef::builder("user_to_following", Cardinality::ManyToMany)
            .source("user")
            .target("user")
            .stored(StorageMode::ArrayJson, "following")
            .bidirectional("user_to_followers")
            .build(),
        // Djs play venues; stored as legacy comma-joined text.
        RelationshipDef::builder("dj_to_venues", Cardinality::ManyToMany)
            .source("dj")
            .target("venue")
            .stored(StorageMode::DelimitedText, "venue_refs")
            .build(),
        // Genre links ride the host's classification system.
        RelationshipDef::builder("event_to_genres", Cardinality::ManyToMany)
            .source("event")
            .target("genre")
            .stored(StorageMode::ClassificationLink, "genre")
            .build(),
        // Every classified has exactly one owning user, held in the
        // ownership column rather than an attribute.
        RelationshipDef::builder("classified_owner", Cardinality::ManyToOne)
            .source("classified")
            .target("user")
            .computed_owner()
            .not_queryable()
            .build(),
        // Bookmarks reach across content kinds (polymorphic target).
        RelationshipDef::builder("user_to_bookmarks", Cardinality::OneToMany)
            .source("user")
            .target_any(&["event", "classified", "dj"])
            .stored(StorageMode::ArrayJson, "bookmarks")
            .build(),
    ]
}

/// Build a registry holding only the default schema.
#[must_use]
pub fn registry() -> Registry {
    Registry::builder().register_all(definitions()).build()
}
