//! Core of followable: a polymorphic follow-relationship engine.
//!
//! Any entity that can name an [`EntityKey`] may follow any other, subject to
//! per-entity authorization lists. Edges, authorization state and follow
//! history live behind a [`RelationshipStore`]; host entities are loaded back
//! through an [`EntityResolver`].
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use followable_common::AppResult;
//! use followable_core::{
//!     EntityKey, FollowGraphService, MemoryStore, RegisteredEntityResolver, TypeRegistry, TypeTag,
//! };
//!
//! async fn example() -> AppResult<()> {
//!     let store = Arc::new(MemoryStore::new());
//!     let resolver = Arc::new(RegisteredEntityResolver::new(store.clone()));
//!     let registry = Arc::new(TypeRegistry::from_names(["User", "Group"])?);
//!     let graph = FollowGraphService::new(store, resolver, registry);
//!
//!     let alice = EntityKey::new(TypeTag::new("User"), "alice");
//!     let rustaceans = EntityKey::new(TypeTag::new("Group"), "rustaceans");
//!     graph.follow(&alice, &rustaceans).await?;
//!     assert!(graph.followee_of(&alice, &rustaceans).await?);
//!     Ok(())
//! }
//! ```

pub mod registry;
pub mod services;
pub mod store;
pub mod types;

pub use registry::TypeRegistry;
pub use services::*;
pub use store::{DatabaseStore, EntityResolver, MemoryStore, RegisteredEntityResolver, RelationshipStore};
pub use types::{AuthorizationList, EntityKey, FollowEdge, FollowState, Followable, TypeTag};
