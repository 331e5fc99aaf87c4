//! Identity and state types shared by the follow engine and its stores.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use followable_common::{AppError, AppResult};
use serde::{Deserialize, Serialize};

/// Normalised name of an entity type.
///
/// `"User"`, `"user"` and `" USER "` are the same tag; separators (`_`, `-`,
/// whitespace) are dropped, so `"user_group"` equals `"UserGroup"`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub struct TypeTag(String);

impl TypeTag {
    /// Build a tag from any spelling of a type name.
    pub fn new(raw: impl AsRef<str>) -> Self {
        Self(
            raw.as_ref()
                .chars()
                .filter(|c| !(c.is_whitespace() || *c == '_' || *c == '-'))
                .map(|c| c.to_ascii_lowercase())
                .collect(),
        )
    }

    /// Build a tag and reject names that normalise to nothing usable.
    pub fn parse(raw: &str) -> AppResult<Self> {
        let tag = Self::new(raw);
        if tag.0.is_empty() {
            return Err(AppError::Validation(format!("empty type name: {raw:?}")));
        }
        if !tag.0.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(AppError::Validation(format!("invalid type name: {raw:?}")));
        }
        Ok(tag)
    }

    /// The canonical form.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TypeTag {
    fn from(raw: String) -> Self {
        Self::new(raw)
    }
}

impl From<TypeTag> for String {
    fn from(tag: TypeTag) -> Self {
        tag.0
    }
}

/// Identity of a followable entity: its type tag plus its id.
///
/// Two keys are equal exactly when both parts are equal; nothing else about
/// the entity takes part in comparisons.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    /// Type of the entity.
    pub type_tag: TypeTag,
    /// Identifier, unique within the type.
    pub id: String,
}

impl EntityKey {
    /// Create a key.
    pub fn new(type_tag: TypeTag, id: impl Into<String>) -> Self {
        Self {
            type_tag,
            id: id.into(),
        }
    }
}

/// Text form `"<tag>_<id>"`, as stored in follow history.
impl fmt::Display for EntityKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}_{}", self.type_tag, self.id)
    }
}

impl FromStr for EntityKey {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (tag, id) = s
            .split_once('_')
            .ok_or_else(|| AppError::Validation(format!("expected <type>_<id>, got {s:?}")))?;
        if id.is_empty() {
            return Err(AppError::Validation(format!("missing id in {s:?}")));
        }
        Ok(Self::new(TypeTag::parse(tag)?, id))
    }
}

/// Anything that can take part in follow relationships.
pub trait Followable {
    /// The identity used for edges, history and authorization checks.
    fn followable_key(&self) -> EntityKey;
}

impl Followable for EntityKey {
    fn followable_key(&self) -> EntityKey {
        self.clone()
    }
}

impl<T: Followable + ?Sized> Followable for &T {
    fn followable_key(&self) -> EntityKey {
        (**self).followable_key()
    }
}

/// "`follower` follows `followee`".
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowEdge {
    /// The entity that follows.
    pub follower: EntityKey,
    /// The entity being followed.
    pub followee: EntityKey,
    /// When the edge was created.
    pub created_at: DateTime<Utc>,
}

impl FollowEdge {
    /// Create an edge stamped with the current time.
    #[must_use]
    pub fn new(follower: EntityKey, followee: EntityKey) -> Self {
        Self {
            follower,
            followee,
            created_at: Utc::now(),
        }
    }
}

/// Authorization lists owned by an entity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FollowState {
    /// Types that may not follow this entity.
    pub cannot_followed: BTreeSet<TypeTag>,
    /// Types this entity may not follow.
    pub cannot_follow: BTreeSet<TypeTag>,
}

/// One of the two authorization lists of a [`FollowState`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorizationList {
    /// Types refused as followers.
    CannotFollowed,
    /// Types refused as followees.
    CannotFollow,
}

impl FollowState {
    /// The list selected by `list`.
    #[must_use]
    pub const fn list(&self, list: AuthorizationList) -> &BTreeSet<TypeTag> {
        match list {
            AuthorizationList::CannotFollowed => &self.cannot_followed,
            AuthorizationList::CannotFollow => &self.cannot_follow,
        }
    }

    /// Mutable access to the list selected by `list`.
    pub fn list_mut(&mut self, list: AuthorizationList) -> &mut BTreeSet<TypeTag> {
        match list {
            AuthorizationList::CannotFollowed => &mut self.cannot_followed,
            AuthorizationList::CannotFollow => &mut self.cannot_follow,
        }
    }

    /// Add or remove `tags` in one list.
    pub fn edit(&mut self, list: AuthorizationList, tags: &[TypeTag], insert: bool) {
        let target = self.list_mut(list);
        for tag in tags {
            if insert {
                target.insert(tag.clone());
            } else {
                target.remove(tag);
            }
        }
    }
}
