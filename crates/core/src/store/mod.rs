//! Collaborator contracts of the follow engine.
//!
//! The engine never touches storage or host entities directly: follow edges,
//! authorization lists and history go through a [`RelationshipStore`], and
//! keys are turned back into host entities by an [`EntityResolver`].

mod database;
mod memory;

pub use database::DatabaseStore;
pub use memory::MemoryStore;

use async_trait::async_trait;
use followable_common::AppResult;
use std::sync::Arc;
use tracing::warn;

use crate::types::{AuthorizationList, EntityKey, FollowEdge, FollowState, TypeTag};

/// Storage of follow edges, per-entity follow state and follow history.
///
/// An edge is one logical record: it is visible from both the follower and
/// the followee side, and deleting it from either side removes it.
#[async_trait]
pub trait RelationshipStore: Send + Sync {
    /// Insert an edge unless the (follower, followee) pair already exists.
    ///
    /// Must be atomic with respect to concurrent inserts of the same pair.
    /// Returns `true` when the edge was created.
    async fn insert_edge(&self, edge: &FollowEdge) -> AppResult<bool>;

    /// Record a follow: insert the edge, register both ends and append the
    /// follower to the followee's history, all or nothing.
    ///
    /// Returns `false`, with nothing written, when the edge already existed.
    /// The default runs the steps one by one and deletes the edge again if a
    /// later step fails; stores that can write atomically should override it.
    async fn record_follow(&self, edge: &FollowEdge) -> AppResult<bool> {
        if !self.insert_edge(edge).await? {
            return Ok(false);
        }

        let rest: AppResult<()> = async {
            self.register(&edge.follower).await?;
            self.register(&edge.followee).await?;
            self.append_history(&edge.followee, &edge.follower).await
        }
        .await;
        if let Err(e) = rest {
            if let Err(undo) = self.delete_edge(&edge.follower, &edge.followee).await {
                warn!(
                    follower = %edge.follower,
                    followee = %edge.followee,
                    error = %undo,
                    "Failed to remove edge of an incomplete follow"
                );
            }
            return Err(e);
        }
        Ok(true)
    }

    /// Delete the edge if it exists.
    ///
    /// Idempotent; returns whether an edge was removed.
    async fn delete_edge(&self, follower: &EntityKey, followee: &EntityKey) -> AppResult<bool>;

    /// Whether `follower` currently follows `followee`.
    async fn exists(&self, follower: &EntityKey, followee: &EntityKey) -> AppResult<bool>;

    /// Edges whose followee is `followee`, in store order.
    async fn query_by_followee(&self, followee: &EntityKey) -> AppResult<Vec<FollowEdge>>;

    /// Edges whose follower is `follower`, in store order.
    async fn query_by_follower(&self, follower: &EntityKey) -> AppResult<Vec<FollowEdge>>;

    /// Edges whose followee is `followee` and whose follower has type `follower_type`.
    async fn query_by_followee_and_type(
        &self,
        followee: &EntityKey,
        follower_type: &TypeTag,
    ) -> AppResult<Vec<FollowEdge>>;

    /// Edges whose follower is `follower` and whose followee has type `followee_type`.
    async fn query_by_follower_and_type(
        &self,
        follower: &EntityKey,
        followee_type: &TypeTag,
    ) -> AppResult<Vec<FollowEdge>>;

    /// Number of followers of `followee`.
    async fn count_by_followee(&self, followee: &EntityKey) -> AppResult<u64>;

    /// Number of followers of `followee` having type `follower_type`.
    async fn count_by_followee_and_type(
        &self,
        followee: &EntityKey,
        follower_type: &TypeTag,
    ) -> AppResult<u64>;

    /// Number of entities `follower` follows.
    async fn count_by_follower(&self, follower: &EntityKey) -> AppResult<u64>;

    /// Every known entity of a type.
    async fn list_all_of_type(&self, type_tag: &TypeTag) -> AppResult<Vec<EntityKey>>;

    /// Make an entity known to the store, keeping any existing state.
    async fn register(&self, key: &EntityKey) -> AppResult<()>;

    /// Whether the entity is known to the store.
    async fn is_registered(&self, key: &EntityKey) -> AppResult<bool>;

    /// Authorization lists of an entity; empty lists for unknown entities.
    async fn load_state(&self, key: &EntityKey) -> AppResult<FollowState>;

    /// Add (`insert`) or remove `tags` in one authorization list of an
    /// entity, registering it if needed, and return the new state.
    ///
    /// Must be atomic: concurrent edits of the same entity never lose each
    /// other's tags.
    async fn edit_state(
        &self,
        key: &EntityKey,
        list: AuthorizationList,
        tags: &[TypeTag],
        insert: bool,
    ) -> AppResult<FollowState>;

    /// Drop an entity: its edges in both directions and its registration
    /// with its authorization lists. Follow history is kept.
    async fn forget(&self, key: &EntityKey) -> AppResult<()>;

    /// Append `follower` to the history of `followee`.
    async fn append_history(&self, followee: &EntityKey, follower: &EntityKey) -> AppResult<()>;

    /// Everyone who ever followed `followee`, oldest first, repeats included.
    async fn history(&self, followee: &EntityKey) -> AppResult<Vec<EntityKey>>;
}

/// Loads host entities by key.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// The host's entity representation.
    type Entity: Send;

    /// Load an entity; `Ok(None)` when it no longer exists.
    async fn resolve(&self, key: &EntityKey) -> AppResult<Option<Self::Entity>>;
}

/// Resolver for hosts without richer entities: a key resolves to itself
/// while the store still knows it.
#[derive(Clone)]
pub struct RegisteredEntityResolver<S> {
    store: Arc<S>,
}

impl<S: RelationshipStore> RegisteredEntityResolver<S> {
    /// Create a resolver backed by `store`.
    #[must_use]
    pub const fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: RelationshipStore> EntityResolver for RegisteredEntityResolver<S> {
    type Entity = EntityKey;

    async fn resolve(&self, key: &EntityKey) -> AppResult<Option<EntityKey>> {
        if self.store.is_registered(key).await? {
            Ok(Some(key.clone()))
        } else {
            Ok(None)
        }
    }
}
