use serde::{Deserialize, Serialize};
use std::{fmt, num::NonZeroU64, str::FromStr};

/// Identifier of an entity within its type.
///
/// Ids are positive integers unique within a type. Zero is not a valid id —
/// the host store uses it as an "unset" sentinel in raw attributes, so the
/// codecs map it to an empty reference rather than an [`EntityId`].
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct EntityId(NonZeroU64);

impl EntityId {
    /// Construct an id, rejecting zero.
    #[must_use]
    pub const fn new(raw: u64) -> Option<Self> {
        match NonZeroU64::new(raw) {
            Some(n) => Some(Self(n)),
            None => None,
        }
    }

    /// The numeric value.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0.get()
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for EntityId {
    type Err = InvalidEntityId;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw: u64 = s.trim().parse().map_err(|_| InvalidEntityId {
            raw: s.to_string(),
        })?;
        Self::new(raw).ok_or_else(|| InvalidEntityId { raw: s.to_string() })
    }
}

/// A string did not parse as a positive entity id.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid entity id {raw:?}: expected a positive integer")]
pub struct InvalidEntityId {
    /// The offending input.
    pub raw: String,
}

/// Reserved type tag for user records.
pub const USER_TAG: &str = "user";

/// The type of an entity: a content kind tag, or the reserved user tag.
///
/// Content kinds are open-ended strings owned by the host store (`event`,
/// `dj`, `classified`, ...). Users live in a separate table with their own id
/// space, so they get their own variant instead of a magic tag check at every
/// call site.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum EntityType {
    /// A content kind identified by its tag.
    Content(String),
    /// The reserved `user` type.
    User,
}

impl EntityType {
    /// Build a type from a raw tag, mapping the reserved tag to [`Self::User`].
    #[must_use]
    pub fn from_tag(tag: &str) -> Self {
        if tag == USER_TAG {
            Self::User
        } else {
            Self::Content(tag.to_string())
        }
    }

    /// The string tag for this type.
    #[must_use]
    pub fn tag(&self) -> &str {
        match self {
            Self::Content(tag) => tag,
            Self::User => USER_TAG,
        }
    }

    /// Returns `true` for the reserved user type.
    #[must_use]
    pub const fn is_user(&self) -> bool {
        matches!(self, Self::User)
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl From<String> for EntityType {
    fn from(tag: String) -> Self {
        Self::from_tag(&tag)
    }
}

impl From<EntityType> for String {
    fn from(ty: EntityType) -> Self {
        ty.tag().to_string()
    }
}

/// A typed reference to one entity: `(type, id)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRef {
    /// The entity's type.
    #[serde(rename = "type")]
    pub ty: EntityType,
    /// The entity's id within that type.
    pub id: EntityId,
}

impl EntityRef {
    /// Build a reference from a type and id.
    #[must_use]
    pub const fn new(ty: EntityType, id: EntityId) -> Self {
        Self { ty, id }
    }

    /// Build a content reference from a kind tag and id.
    #[must_use]
    pub fn content(tag: &str, id: EntityId) -> Self {
        Self::new(EntityType::from_tag(tag), id)
    }

    /// Build a user reference.
    #[must_use]
    pub const fn user(id: EntityId) -> Self {
        Self::new(EntityType::User, id)
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ty, self.id)
    }
}
