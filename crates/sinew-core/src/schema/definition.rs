//! Declarative relationship definitions.
//!
//! A [`RelationshipDef`] describes how two entity types are linked and where
//! the link lives: cardinality, source/target kinds, and the low-level
//! storage encoding. Definitions are immutable configuration — they are
//! assembled through [`RelationshipDef::builder`] and handed to the registry
//! once at startup.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::model::entity::USER_TAG;

/// The four supported link cardinalities.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany,
}

impl Cardinality {
    const fn as_str(self) -> &'static str {
        match self {
            Self::OneToOne => "one_to_one",
            Self::OneToMany => "one_to_many",
            Self::ManyToOne => "many_to_one",
            Self::ManyToMany => "many_to_many",
        }
    }

    /// Returns `true` when the source side holds at most one target
    /// (`*_TO_ONE`). Connect replaces the slot instead of appending.
    #[must_use]
    pub const fn single_target(self) -> bool {
        matches!(self, Self::OneToOne | Self::ManyToOne)
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// On-disk encoding of a relationship's link attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageMode {
    /// One id stored as decimal text.
    SingleReference,
    /// Store-native blob: u32 LE count followed by u64 LE ids.
    ArrayNative,
    /// JSON integer array text.
    ArrayJson,
    /// Comma-joined decimal text.
    DelimitedText,
    /// Resolved through the host's classification system; no codec involved.
    ClassificationLink,
    /// No attribute at all — the id is an intrinsic ownership column.
    ComputedOwner,
}

impl StorageMode {
    const fn as_str(self) -> &'static str {
        match self {
            Self::SingleReference => "single_reference",
            Self::ArrayNative => "array_native",
            Self::ArrayJson => "array_json",
            Self::DelimitedText => "delimited_text",
            Self::ClassificationLink => "classification_link",
            Self::ComputedOwner => "computed_owner",
        }
    }

    /// Returns `true` for modes whose links live in a raw attribute that the
    /// codecs encode and decode.
    #[must_use]
    pub const fn attribute_backed(self) -> bool {
        matches!(
            self,
            Self::SingleReference | Self::ArrayNative | Self::ArrayJson | Self::DelimitedText
        )
    }

    /// Returns `true` for modes whose links can be rewritten by the repair
    /// engine. Ownership columns are intrinsic to the source record and are
    /// never mutated here.
    #[must_use]
    pub const fn writable(self) -> bool {
        self.attribute_backed() || matches!(self, Self::ClassificationLink)
    }
}

impl fmt::Display for StorageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Which entity kinds may appear on the source side of a relationship.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SourceKind {
    /// A single content kind.
    Single(String),
    /// Any of a fixed set of content kinds.
    AnyOf(Vec<String>),
}

impl SourceKind {
    /// All tags this source kind covers, in declaration order.
    #[must_use]
    pub fn tags(&self) -> Vec<&str> {
        match self {
            Self::Single(tag) => vec![tag.as_str()],
            Self::AnyOf(tags) => tags.iter().map(String::as_str).collect(),
        }
    }

    /// Returns `true` if `tag` is an allowed source kind.
    #[must_use]
    pub fn allows(&self, tag: &str) -> bool {
        match self {
            Self::Single(t) => t == tag,
            Self::AnyOf(tags) => tags.iter().any(|t| t == tag),
        }
    }
}

/// Which entities may appear on the target side of a relationship.
///
/// Resolved by exhaustive matching in the checker's existence branch: a
/// polymorphic target is valid iff the entity exists *and* its concrete type
/// is in the allowed set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "TargetRepr", into = "TargetRepr")]
pub enum TargetKind {
    /// A single content kind.
    Single(String),
    /// Any of a fixed set of content kinds (polymorphic target).
    AnyOf(Vec<String>),
    /// The reserved user table.
    User,
}

impl TargetKind {
    /// Build a target kind from a raw tag, mapping the reserved user tag.
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        if tag == USER_TAG {
            Self::User
        } else {
            Self::Single(tag.to_string())
        }
    }

    /// Returns `true` if a target of concrete type `tag` is allowed.
    #[must_use]
    pub fn allows(&self, tag: &str) -> bool {
        match self {
            Self::Single(t) => t == tag,
            Self::AnyOf(tags) => tags.iter().any(|t| t == tag),
            Self::User => tag == USER_TAG,
        }
    }

    /// Human-readable description used in issue messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Single(tag) => tag.clone(),
            Self::AnyOf(tags) => tags.join("|"),
            Self::User => USER_TAG.to_string(),
        }
    }
}

/// Serde surface for [`TargetKind`]: a plain tag or a tag list.
#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum TargetRepr {
    One(String),
    Many(Vec<String>),
}

impl From<TargetRepr> for TargetKind {
    fn from(repr: TargetRepr) -> Self {
        match repr {
            TargetRepr::One(tag) => Self::from_tag(&tag),
            TargetRepr::Many(tags) => Self::AnyOf(tags),
        }
    }
}

impl From<TargetKind> for TargetRepr {
    fn from(kind: TargetKind) -> Self {
        match kind {
            TargetKind::Single(tag) => Self::One(tag),
            TargetKind::AnyOf(tags) => Self::Many(tags),
            TargetKind::User => Self::One(USER_TAG.to_string()),
        }
    }
}

/// An immutable relationship definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelationshipDef {
    /// Canonical registry name, e.g. `event_to_dj`.
    pub name: String,
    /// Link cardinality.
    pub cardinality: Cardinality,
    /// Allowed source kinds.
    pub source: SourceKind,
    /// Allowed target kinds.
    pub target: TargetKind,
    /// Storage encoding for the link attribute.
    pub storage: StorageMode,
    /// Attribute key (or taxonomy name for classification links).
    /// `None` iff [`StorageMode::ComputedOwner`].
    pub storage_key: Option<String>,
    /// Name of the inverse definition for bidirectional pairs.
    pub inverse: Option<String>,
    /// Whether forward and inverse links must each imply the other.
    pub bidirectional: bool,
    /// Whether a source may legitimately reference itself.
    pub self_referential: bool,
    /// Whether the relationship is exposed to host-side queries.
    pub queryable: bool,
    /// Public name shown to collaborators; defaults to `name`.
    pub exposed_name: String,
}

impl RelationshipDef {
    /// Start building a definition. Defaults: not bidirectional, not
    /// self-referential, queryable, `exposed_name = name`.
    #[must_use]
    pub fn builder(name: &str, cardinality: Cardinality) -> DefBuilder {
        DefBuilder {
            def: Self {
                name: name.to_string(),
                cardinality,
                source: SourceKind::Single(String::new()),
                target: TargetKind::Single(String::new()),
                storage: StorageMode::ArrayNative,
                storage_key: None,
                inverse: None,
                bidirectional: false,
                self_referential: false,
                queryable: true,
                exposed_name: name.to_string(),
            },
        }
    }

    /// Check this definition's local rules.
    ///
    /// Configuration problems are surfaced as a [`Validation`] result, never
    /// a panic: malformed definitions are expected input from collaborators.
    /// Cross-definition rules (inverse pairing) live on the registry.
    #[must_use]
    pub fn validate(&self) -> Validation {
        let mut errors = Vec::new();

        if self.name.trim().is_empty() {
            errors.push("name must not be empty".to_string());
        }

        match (&self.storage_key, self.storage) {
            (None, StorageMode::ComputedOwner) => {}
            (None, mode) => {
                errors.push(format!("storage mode {mode} requires a storage_key"));
            }
            (Some(_), StorageMode::ComputedOwner) => {
                errors.push("computed_owner carries no storage_key".to_string());
            }
            (Some(key), _) if key.trim().is_empty() => {
                errors.push("storage_key must not be empty".to_string());
            }
            (Some(_), _) => {}
        }

        if self.source.tags().iter().any(|t| t.trim().is_empty()) || self.source.tags().is_empty()
        {
            errors.push("source types must be non-empty".to_string());
        }
        let empty_target = match &self.target {
            TargetKind::Single(tag) => tag.trim().is_empty(),
            TargetKind::AnyOf(tags) => {
                tags.is_empty() || tags.iter().any(|t| t.trim().is_empty())
            }
            TargetKind::User => false,
        };
        if empty_target {
            errors.push("target types must be non-empty".to_string());
        }

        if self.bidirectional && self.inverse.is_none() {
            errors.push("bidirectional relationships require an inverse name".to_string());
        }

        Validation {
            valid: errors.is_empty(),
            errors,
        }
    }
}

/// Chained builder for [`RelationshipDef`].
#[derive(Debug, Clone)]
pub struct DefBuilder {
    def: RelationshipDef,
}

impl DefBuilder {
    /// Single source kind.
    #[must_use]
    pub fn source(mut self, tag: &str) -> Self {
        self.def.source = SourceKind::Single(tag.to_string());
        self
    }

    /// Polymorphic source kinds.
    #[must_use]
    pub fn source_any(mut self, tags: &[&str]) -> Self {
        self.def.source = SourceKind::AnyOf(tags.iter().map(ToString::to_string).collect());
        self
    }

    /// Target kind by tag (`"user"` selects the user table).
    #[must_use]
    pub fn target(mut self, tag: &str) -> Self {
        self.def.target = TargetKind::from_tag(tag);
        self
    }

    /// Polymorphic target kinds.
    #[must_use]
    pub fn target_any(mut self, tags: &[&str]) -> Self {
        self.def.target = TargetKind::AnyOf(tags.iter().map(ToString::to_string).collect());
        self
    }

    /// Storage mode plus attribute key / taxonomy name.
    #[must_use]
    pub fn stored(mut self, mode: StorageMode, key: &str) -> Self {
        self.def.storage = mode;
        self.def.storage_key = Some(key.to_string());
        self
    }

    /// Intrinsic ownership column; no attribute key.
    #[must_use]
    pub fn computed_owner(mut self) -> Self {
        self.def.storage = StorageMode::ComputedOwner;
        self.def.storage_key = None;
        self
    }

    /// Mark bidirectional with the given inverse definition name.
    #[must_use]
    pub fn bidirectional(mut self, inverse: &str) -> Self {
        self.def.bidirectional = true;
        self.def.inverse = Some(inverse.to_string());
        self
    }

    /// Allow sources to reference themselves.
    #[must_use]
    pub const fn self_referential(mut self) -> Self {
        self.def.self_referential = true;
        self
    }

    /// Hide from host-side queries.
    #[must_use]
    pub const fn not_queryable(mut self) -> Self {
        self.def.queryable = false;
        self
    }

    /// Override the public name.
    #[must_use]
    pub fn exposed_as(mut self, exposed: &str) -> Self {
        self.def.exposed_name = exposed.to_string();
        self
    }

    /// Finish the definition.
    #[must_use]
    pub fn build(self) -> RelationshipDef {
        self.def
    }
}

/// Result of validating a definition: accumulated errors, never a panic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Validation {
    /// `true` when no errors were found.
    pub valid: bool,
    /// Human-readable rule violations.
    pub errors: Vec<String>,
}

impl Validation {
    /// A passing result.
    #[must_use]
    pub const fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    /// Merge another result into this one.
    pub fn merge(&mut self, other: Self) {
        self.valid &= other.valid;
        self.errors.extend(other.errors);
    }
}
