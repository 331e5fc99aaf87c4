//! In-process relationship store.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use followable_common::AppResult;
use tokio::sync::RwLock;

use super::RelationshipStore;
use crate::types::{AuthorizationList, EntityKey, FollowEdge, FollowState, TypeTag};

#[derive(Default)]
struct Inner {
    /// Edges in insertion order.
    edges: Vec<FollowEdge>,
    /// Registered entities and their authorization lists.
    states: BTreeMap<EntityKey, FollowState>,
    history: HashMap<EntityKey, Vec<EntityKey>>,
}

impl Inner {
    fn position(&self, follower: &EntityKey, followee: &EntityKey) -> Option<usize> {
        self.edges
            .iter()
            .position(|e| &e.follower == follower && &e.followee == followee)
    }

    fn collect<F>(&self, pred: F) -> Vec<FollowEdge>
    where
        F: Fn(&FollowEdge) -> bool,
    {
        self.edges.iter().filter(|e| pred(e)).cloned().collect()
    }

    fn count<F>(&self, pred: F) -> u64
    where
        F: Fn(&FollowEdge) -> bool,
    {
        self.edges.iter().filter(|e| pred(e)).count() as u64
    }
}

/// Relationship store kept in memory.
///
/// Every check-and-write runs under one write lock, so duplicate edges
/// cannot appear under concurrent follows.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RelationshipStore for MemoryStore {
    async fn insert_edge(&self, edge: &FollowEdge) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.position(&edge.follower, &edge.followee).is_some() {
            return Ok(false);
        }
        inner.edges.push(edge.clone());
        Ok(true)
    }

    async fn record_follow(&self, edge: &FollowEdge) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        if inner.position(&edge.follower, &edge.followee).is_some() {
            return Ok(false);
        }
        inner.edges.push(edge.clone());
        inner.states.entry(edge.follower.clone()).or_default();
        inner.states.entry(edge.followee.clone()).or_default();
        inner
            .history
            .entry(edge.followee.clone())
            .or_default()
            .push(edge.follower.clone());
        Ok(true)
    }

    async fn delete_edge(&self, follower: &EntityKey, followee: &EntityKey) -> AppResult<bool> {
        let mut inner = self.inner.write().await;
        match inner.position(follower, followee) {
            Some(index) => {
                inner.edges.remove(index);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    async fn exists(&self, follower: &EntityKey, followee: &EntityKey) -> AppResult<bool> {
        Ok(self.inner.read().await.position(follower, followee).is_some())
    }

    async fn query_by_followee(&self, followee: &EntityKey) -> AppResult<Vec<FollowEdge>> {
        Ok(self.inner.read().await.collect(|e| &e.followee == followee))
    }

    async fn query_by_follower(&self, follower: &EntityKey) -> AppResult<Vec<FollowEdge>> {
        Ok(self.inner.read().await.collect(|e| &e.follower == follower))
    }

    async fn query_by_followee_and_type(
        &self,
        followee: &EntityKey,
        follower_type: &TypeTag,
    ) -> AppResult<Vec<FollowEdge>> {
        Ok(self
            .inner
            .read()
            .await
            .collect(|e| &e.followee == followee && &e.follower.type_tag == follower_type))
    }

    async fn query_by_follower_and_type(
        &self,
        follower: &EntityKey,
        followee_type: &TypeTag,
    ) -> AppResult<Vec<FollowEdge>> {
        Ok(self
            .inner
            .read()
            .await
            .collect(|e| &e.follower == follower && &e.followee.type_tag == followee_type))
    }

    async fn count_by_followee(&self, followee: &EntityKey) -> AppResult<u64> {
        Ok(self.inner.read().await.count(|e| &e.followee == followee))
    }

    async fn count_by_followee_and_type(
        &self,
        followee: &EntityKey,
        follower_type: &TypeTag,
    ) -> AppResult<u64> {
        Ok(self
            .inner
            .read()
            .await
            .count(|e| &e.followee == followee && &e.follower.type_tag == follower_type))
    }

    async fn count_by_follower(&self, follower: &EntityKey) -> AppResult<u64> {
        Ok(self.inner.read().await.count(|e| &e.follower == follower))
    }

    async fn list_all_of_type(&self, type_tag: &TypeTag) -> AppResult<Vec<EntityKey>> {
        Ok(self
            .inner
            .read()
            .await
            .states
            .keys()
            .filter(|k| &k.type_tag == type_tag)
            .cloned()
            .collect())
    }

    async fn register(&self, key: &EntityKey) -> AppResult<()> {
        self.inner
            .write()
            .await
            .states
            .entry(key.clone())
            .or_default();
        Ok(())
    }

    async fn is_registered(&self, key: &EntityKey) -> AppResult<bool> {
        Ok(self.inner.read().await.states.contains_key(key))
    }

    async fn load_state(&self, key: &EntityKey) -> AppResult<FollowState> {
        Ok(self
            .inner
            .read()
            .await
            .states
            .get(key)
            .cloned()
            .unwrap_or_default())
    }

    async fn edit_state(
        &self,
        key: &EntityKey,
        list: AuthorizationList,
        tags: &[TypeTag],
        insert: bool,
    ) -> AppResult<FollowState> {
        let mut inner = self.inner.write().await;
        let state = inner.states.entry(key.clone()).or_default();
        state.edit(list, tags, insert);
        Ok(state.clone())
    }

    async fn forget(&self, key: &EntityKey) -> AppResult<()> {
        let mut inner = self.inner.write().await;
        inner
            .edges
            .retain(|e| &e.follower != key && &e.followee != key);
        inner.states.remove(key);
        Ok(())
    }

    async fn append_history(&self, followee: &EntityKey, follower: &EntityKey) -> AppResult<()> {
        self.inner
            .write()
            .await
            .history
            .entry(followee.clone())
            .or_default()
            .push(follower.clone());
        Ok(())
    }

    async fn history(&self, followee: &EntityKey) -> AppResult<Vec<EntityKey>> {
        Ok(self
            .inner
            .read()
            .await
            .history
            .get(followee)
            .cloned()
            .unwrap_or_default())
    }
}
