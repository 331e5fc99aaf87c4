//! Aggregation service: counts, listings and cross-entity reports over the
//! follow graph.
//!
//! Reports are read-only snapshots of the store; nothing here mutates it.

use std::collections::HashSet;
use std::sync::Arc;

use followable_common::{AppResult, ResolutionPolicy};
use futures::stream::{self, StreamExt, TryStreamExt};
use serde::Serialize;

use crate::services::resolution::resolve_all;
use crate::store::{EntityResolver, RelationshipStore};
use crate::types::{EntityKey, FollowEdge, Followable, TypeTag};

/// Most follower counts a ranking keeps in flight at once.
///
/// Stays well below the default connection pool size.
pub const MAX_CONCURRENT_COUNTS: usize = 8;

/// Which end of the follower-count ranking to select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Extremum {
    /// Entities with the most followers.
    Max,
    /// Entities with the fewest followers.
    Min,
}

/// An entity with its follower count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FollowerTally {
    /// The counted entity.
    pub key: EntityKey,
    /// Its follower count.
    pub count: u64,
}

/// Aggregation service.
pub struct AggregationService<S, R> {
    store: Arc<S>,
    resolver: Arc<R>,
    policy: ResolutionPolicy,
}

impl<S, R> Clone for AggregationService<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            resolver: self.resolver.clone(),
            policy: self.policy,
        }
    }
}

impl<S, R> AggregationService<S, R>
where
    S: RelationshipStore,
    R: EntityResolver,
{
    /// Create a new aggregation service.
    #[must_use]
    pub fn new(store: Arc<S>, resolver: Arc<R>) -> Self {
        Self {
            store,
            resolver,
            policy: ResolutionPolicy::default(),
        }
    }

    /// Use `policy` for entities that no longer resolve.
    #[must_use]
    pub const fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    async fn resolve(&self, keys: Vec<EntityKey>) -> AppResult<Vec<R::Entity>> {
        resolve_all(self.resolver.as_ref(), keys, self.policy).await
    }

    /// Number of followers of `entity`.
    pub async fn followers_count(&self, entity: &impl Followable) -> AppResult<u64> {
        self.store.count_by_followee(&entity.followable_key()).await
    }

    /// Number of followers of `entity` that have type `follower_type`.
    pub async fn followers_count_by_type(
        &self,
        entity: &impl Followable,
        follower_type: &TypeTag,
    ) -> AppResult<u64> {
        self.store
            .count_by_followee_and_type(&entity.followable_key(), follower_type)
            .await
    }

    /// Number of entities `entity` follows.
    pub async fn followees_count(&self, entity: &impl Followable) -> AppResult<u64> {
        self.store.count_by_follower(&entity.followable_key()).await
    }

    /// Keys of the followers of `entity`, in store order.
    pub async fn follower_keys(&self, entity: &impl Followable) -> AppResult<Vec<EntityKey>> {
        let edges = self
            .store
            .query_by_followee(&entity.followable_key())
            .await?;
        Ok(followers_of(edges))
    }

    /// Followers of `entity`, resolved, in store order.
    pub async fn all_followers(&self, entity: &impl Followable) -> AppResult<Vec<R::Entity>> {
        let keys = self.follower_keys(entity).await?;
        self.resolve(keys).await
    }

    /// Followers of `entity` having type `follower_type`, resolved.
    pub async fn followers_by_type(
        &self,
        entity: &impl Followable,
        follower_type: &TypeTag,
    ) -> AppResult<Vec<R::Entity>> {
        let edges = self
            .store
            .query_by_followee_and_type(&entity.followable_key(), follower_type)
            .await?;
        self.resolve(followers_of(edges)).await
    }

    /// Entities `entity` follows, resolved, in store order.
    pub async fn all_followees(&self, entity: &impl Followable) -> AppResult<Vec<R::Entity>> {
        let edges = self
            .store
            .query_by_follower(&entity.followable_key())
            .await?;
        self.resolve(followees_of(edges)).await
    }

    /// Entities of type `followee_type` that `entity` follows, resolved.
    pub async fn followees_by_type(
        &self,
        entity: &impl Followable,
        followee_type: &TypeTag,
    ) -> AppResult<Vec<R::Entity>> {
        let edges = self
            .store
            .query_by_follower_and_type(&entity.followable_key(), followee_type)
            .await?;
        self.resolve(followees_of(edges)).await
    }

    /// Keys following both `a` and `b`, in the order of `a`'s followers.
    pub async fn common_follower_keys(
        &self,
        a: &impl Followable,
        b: &impl Followable,
    ) -> AppResult<Vec<EntityKey>> {
        let of_a = self.follower_keys(a).await?;
        let of_b: HashSet<EntityKey> = self.follower_keys(b).await?.into_iter().collect();

        Ok(of_a.into_iter().filter(|key| of_b.contains(key)).collect())
    }

    /// Whether `a` and `b` share at least one follower.
    pub async fn common_followers(
        &self,
        a: &impl Followable,
        b: &impl Followable,
    ) -> AppResult<bool> {
        Ok(!self.common_follower_keys(a, b).await?.is_empty())
    }

    /// Followers shared by `a` and `b`, resolved.
    pub async fn common_followers_with(
        &self,
        a: &impl Followable,
        b: &impl Followable,
    ) -> AppResult<Vec<R::Entity>> {
        let keys = self.common_follower_keys(a, b).await?;
        self.resolve(keys).await
    }

    /// Entities of `type_tag` at one end of the follower-count ranking.
    ///
    /// Counts all followers, or only those of `follower_type` when given.
    /// Every entity tied at the extreme is returned; an empty type yields an
    /// empty list.
    pub async fn follower_tallies(
        &self,
        type_tag: &TypeTag,
        follower_type: Option<&TypeTag>,
        extremum: Extremum,
    ) -> AppResult<Vec<FollowerTally>> {
        let keys = self.store.list_all_of_type(type_tag).await?;
        let counts: Vec<u64> = stream::iter(&keys)
            .map(|key| async move {
                match follower_type {
                    Some(tag) => self.store.count_by_followee_and_type(key, tag).await,
                    None => self.store.count_by_followee(key).await,
                }
            })
            .buffered(MAX_CONCURRENT_COUNTS)
            .try_collect()
            .await?;

        let mut tallies: Vec<FollowerTally> = keys
            .into_iter()
            .zip(counts)
            .map(|(key, count)| FollowerTally { key, count })
            .collect();
        tallies.sort_by_key(|tally| tally.count);

        let extreme = match extremum {
            Extremum::Max => tallies.last(),
            Extremum::Min => tallies.first(),
        }
        .map(|tally| tally.count);

        Ok(match extreme {
            Some(extreme) => tallies
                .into_iter()
                .filter(|tally| tally.count == extreme)
                .collect(),
            None => Vec::new(),
        })
    }

    async fn extremes(
        &self,
        type_tag: &TypeTag,
        follower_type: Option<&TypeTag>,
        extremum: Extremum,
    ) -> AppResult<Vec<R::Entity>> {
        let keys = self
            .follower_tallies(type_tag, follower_type, extremum)
            .await?
            .into_iter()
            .map(|tally| tally.key)
            .collect();
        self.resolve(keys).await
    }

    /// Entities of `type_tag` with the most followers.
    pub async fn with_max_followers(&self, type_tag: &TypeTag) -> AppResult<Vec<R::Entity>> {
        self.extremes(type_tag, None, Extremum::Max).await
    }

    /// Entities of `type_tag` with the fewest followers.
    pub async fn with_min_followers(&self, type_tag: &TypeTag) -> AppResult<Vec<R::Entity>> {
        self.extremes(type_tag, None, Extremum::Min).await
    }

    /// Entities of `type_tag` with the most followers of `follower_type`.
    pub async fn with_max_followers_by_type(
        &self,
        type_tag: &TypeTag,
        follower_type: &TypeTag,
    ) -> AppResult<Vec<R::Entity>> {
        self.extremes(type_tag, Some(follower_type), Extremum::Max)
            .await
    }

    /// Entities of `type_tag` with the fewest followers of `follower_type`.
    pub async fn with_min_followers_by_type(
        &self,
        type_tag: &TypeTag,
        follower_type: &TypeTag,
    ) -> AppResult<Vec<R::Entity>> {
        self.extremes(type_tag, Some(follower_type), Extremum::Min)
            .await
    }
}

fn followers_of(edges: Vec<FollowEdge>) -> Vec<EntityKey> {
    edges.into_iter().map(|edge| edge.follower).collect()
}

fn followees_of(edges: Vec<FollowEdge>) -> Vec<EntityKey> {
    edges.into_iter().map(|edge| edge.followee).collect()
}
