//! Registry of the entity types that take part in follow relationships.

use std::collections::BTreeMap;

use followable_common::{AppError, AppResult};

use crate::types::{EntityKey, TypeTag};

/// The closed set of followable types.
///
/// Types are validated once, when they are registered; afterwards every
/// mutation checks its entities and authorization tags against this set.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: BTreeMap<TypeTag, String>,
}

impl TypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a registry from a list of type names.
    pub fn from_names<I, S>(names: I) -> AppResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut registry = Self::new();
        for name in names {
            registry.register(name.as_ref())?;
        }
        Ok(registry)
    }

    /// Register a type; registering the same type twice is harmless.
    pub fn register(&mut self, name: &str) -> AppResult<TypeTag> {
        let tag = TypeTag::parse(name)?;
        self.types
            .entry(tag.clone())
            .or_insert_with(|| name.trim().to_string());
        Ok(tag)
    }

    /// Whether the tag is registered.
    #[must_use]
    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.types.contains_key(tag)
    }

    /// Normalise a raw type name and require it to be registered.
    pub fn lookup(&self, name: &str) -> AppResult<TypeTag> {
        let tag = TypeTag::new(name);
        self.ensure(&tag)?;
        Ok(tag)
    }

    /// Fail with [`AppError::UnknownType`] unless the tag is registered.
    pub fn ensure(&self, tag: &TypeTag) -> AppResult<()> {
        if self.contains(tag) {
            Ok(())
        } else {
            Err(AppError::UnknownType(tag.to_string()))
        }
    }

    /// Fail unless the key's type is registered.
    pub fn ensure_key(&self, key: &EntityKey) -> AppResult<()> {
        self.ensure(&key.type_tag)
    }

    /// The name a type was first registered under.
    #[must_use]
    pub fn display_name(&self, tag: &TypeTag) -> Option<&str> {
        self.types.get(tag).map(String::as_str)
    }

    /// Registered tags in canonical order.
    pub fn tags(&self) -> impl Iterator<Item = &TypeTag> {
        self.types.keys()
    }

    /// Number of registered types.
    #[must_use]
    pub fn len(&self) -> usize {
        self.types.len()
    }

    /// Whether no type has been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }
}
