//! Follow graph service.

use std::sync::Arc;

use followable_common::{AppResult, ResolutionPolicy};
use serde::Serialize;
use tracing::debug;

use crate::registry::TypeRegistry;
use crate::services::resolution::resolve_all;
use crate::store::{EntityResolver, RelationshipStore};
use crate::types::{AuthorizationList, EntityKey, FollowEdge, FollowState, Followable, TypeTag};

/// Why an authorization check blocked a relation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "side", content = "type", rename_all = "snake_case")]
pub enum Refusal {
    /// The followee refuses followers of this type.
    FolloweeRefuses(TypeTag),
    /// The follower refuses to follow entities of this type.
    FollowerRefuses(TypeTag),
}

/// Result of a follow attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowOutcome {
    /// A new edge was created.
    Followed,
    /// Subject and object are the same entity.
    SelfFollow,
    /// The edge already existed.
    AlreadyFollowing,
    /// Authorization forbids the relation.
    Unauthorized(Refusal),
}

/// Result of an unfollow attempt for one object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum UnfollowOutcome {
    /// The edge was removed.
    Unfollowed,
    /// Subject and object are the same entity.
    SelfUnfollow,
    /// There was no edge to remove.
    NotFollowing,
    /// Authorization forbids the relation, so the edge was left alone.
    Unauthorized(Refusal),
}

/// One line of an unfollow report.
pub type UnfollowReport = Vec<(EntityKey, UnfollowOutcome)>;

/// Follow graph service: creates and removes edges, keeps authorization
/// lists and follow history.
pub struct FollowGraphService<S, R> {
    store: Arc<S>,
    resolver: Arc<R>,
    registry: Arc<TypeRegistry>,
    policy: ResolutionPolicy,
}

impl<S, R> Clone for FollowGraphService<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            resolver: self.resolver.clone(),
            registry: self.registry.clone(),
            policy: self.policy,
        }
    }
}

impl<S, R> FollowGraphService<S, R>
where
    S: RelationshipStore,
    R: EntityResolver,
{
    /// Create a new follow graph service.
    #[must_use]
    pub fn new(store: Arc<S>, resolver: Arc<R>, registry: Arc<TypeRegistry>) -> Self {
        Self {
            store,
            resolver,
            registry,
            policy: ResolutionPolicy::default(),
        }
    }

    /// Use `policy` for entities that no longer resolve.
    #[must_use]
    pub const fn with_policy(mut self, policy: ResolutionPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// The type registry mutations are checked against.
    #[must_use]
    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    /// Make `subject` follow `object`.
    ///
    /// Checks run in order and the first failing one is reported:
    /// self-follow, existing edge, the object's `cannot_followed`, then the
    /// subject's `cannot_follow`. The edge, the registration of both ends
    /// and the history entry are written together or not at all.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownType`](followable_common::AppError::UnknownType) if
    /// either type is not registered; store errors propagate.
    pub async fn follow(
        &self,
        subject: &impl Followable,
        object: &impl Followable,
    ) -> AppResult<FollowOutcome> {
        let follower = subject.followable_key();
        let followee = object.followable_key();
        self.registry.ensure_key(&follower)?;
        self.registry.ensure_key(&followee)?;

        if follower == followee {
            return Ok(FollowOutcome::SelfFollow);
        }

        if self.store.exists(&follower, &followee).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        if let Some(refusal) = self.refusal(&follower, &followee).await? {
            debug!(follower = %follower, followee = %followee, ?refusal, "Follow refused");
            return Ok(FollowOutcome::Unauthorized(refusal));
        }

        let edge = FollowEdge::new(follower.clone(), followee.clone());
        if !self.store.record_follow(&edge).await? {
            return Ok(FollowOutcome::AlreadyFollowing);
        }

        debug!(follower = %follower, followee = %followee, "Followed");
        Ok(FollowOutcome::Followed)
    }

    /// Make `subject` stop following each of `objects`.
    ///
    /// Each object is reported on its own. Checks run in order: self-unfollow,
    /// then authorization (the object's `cannot_followed`, then the subject's
    /// `cannot_follow`), then whether an edge exists. A refused pair is
    /// reported as `Unauthorized` even when there is no edge.
    ///
    /// # Errors
    ///
    /// [`AppError::UnknownType`](followable_common::AppError::UnknownType) if
    /// any type is not registered; nothing is removed in that case.
    pub async fn unfollow<T: Followable>(
        &self,
        subject: &impl Followable,
        objects: impl IntoIterator<Item = T>,
    ) -> AppResult<UnfollowReport> {
        self.unfollow_where(subject, objects, |_| true).await
    }

    /// Like [`unfollow`](Self::unfollow), but only for the objects accepted
    /// by `predicate`. Rejected objects are not part of the report.
    pub async fn unfollow_where<T, F>(
        &self,
        subject: &impl Followable,
        objects: impl IntoIterator<Item = T>,
        mut predicate: F,
    ) -> AppResult<UnfollowReport>
    where
        T: Followable,
        F: FnMut(&T) -> bool,
    {
        let follower = subject.followable_key();
        self.registry.ensure_key(&follower)?;

        let candidates: Vec<EntityKey> = objects
            .into_iter()
            .filter(|object| predicate(object))
            .map(|object| object.followable_key())
            .collect();
        for followee in &candidates {
            self.registry.ensure_key(followee)?;
        }

        let mut report = Vec::with_capacity(candidates.len());
        for followee in candidates {
            let outcome = self.unfollow_one(&follower, &followee).await?;
            report.push((followee, outcome));
        }
        Ok(report)
    }

    /// Make `subject` stop following every entity it currently follows.
    pub async fn unfollow_everyone(&self, subject: &impl Followable) -> AppResult<UnfollowReport> {
        let follower = subject.followable_key();
        let followees: Vec<EntityKey> = self
            .store
            .query_by_follower(&follower)
            .await?
            .into_iter()
            .map(|edge| edge.followee)
            .collect();

        self.unfollow(&follower, followees).await
    }

    async fn unfollow_one(
        &self,
        follower: &EntityKey,
        followee: &EntityKey,
    ) -> AppResult<UnfollowOutcome> {
        if follower == followee {
            return Ok(UnfollowOutcome::SelfUnfollow);
        }

        if let Some(refusal) = self.refusal(follower, followee).await? {
            return Ok(UnfollowOutcome::Unauthorized(refusal));
        }

        if self.store.delete_edge(follower, followee).await? {
            debug!(follower = %follower, followee = %followee, "Unfollowed");
            Ok(UnfollowOutcome::Unfollowed)
        } else {
            Ok(UnfollowOutcome::NotFollowing)
        }
    }

    async fn refusal(
        &self,
        follower: &EntityKey,
        followee: &EntityKey,
    ) -> AppResult<Option<Refusal>> {
        let followee_state = self.store.load_state(followee).await?;
        if followee_state.cannot_followed.contains(&follower.type_tag) {
            return Ok(Some(Refusal::FolloweeRefuses(follower.type_tag.clone())));
        }

        let follower_state = self.store.load_state(follower).await?;
        if follower_state.cannot_follow.contains(&followee.type_tag) {
            return Ok(Some(Refusal::FollowerRefuses(followee.type_tag.clone())));
        }

        Ok(None)
    }

    /// Refuse followers of the given types.
    pub async fn set_authorization<N: AsRef<str>>(
        &self,
        entity: &impl Followable,
        types: impl IntoIterator<Item = N>,
    ) -> AppResult<FollowState> {
        self.edit_state(entity, AuthorizationList::CannotFollowed, types, true)
            .await
    }

    /// Accept followers of the given types again.
    pub async fn unset_authorization<N: AsRef<str>>(
        &self,
        entity: &impl Followable,
        types: impl IntoIterator<Item = N>,
    ) -> AppResult<FollowState> {
        self.edit_state(entity, AuthorizationList::CannotFollowed, types, false)
            .await
    }

    /// Refuse to follow entities of the given types.
    pub async fn set_follow_restriction<N: AsRef<str>>(
        &self,
        entity: &impl Followable,
        types: impl IntoIterator<Item = N>,
    ) -> AppResult<FollowState> {
        self.edit_state(entity, AuthorizationList::CannotFollow, types, true)
            .await
    }

    /// Allow following entities of the given types again.
    pub async fn unset_follow_restriction<N: AsRef<str>>(
        &self,
        entity: &impl Followable,
        types: impl IntoIterator<Item = N>,
    ) -> AppResult<FollowState> {
        self.edit_state(entity, AuthorizationList::CannotFollow, types, false)
            .await
    }

    async fn edit_state<N: AsRef<str>>(
        &self,
        entity: &impl Followable,
        list: AuthorizationList,
        types: impl IntoIterator<Item = N>,
        insert: bool,
    ) -> AppResult<FollowState> {
        let key = entity.followable_key();
        self.registry.ensure_key(&key)?;

        // Validate every name before touching the stored state.
        let tags = types
            .into_iter()
            .map(|name| self.registry.lookup(name.as_ref()))
            .collect::<AppResult<Vec<_>>>()?;

        let state = self.store.edit_state(&key, list, &tags, insert).await?;

        debug!(entity = %key, ?state, "Authorization updated");
        Ok(state)
    }

    /// Current authorization lists of an entity.
    pub async fn authorization(&self, entity: &impl Followable) -> AppResult<FollowState> {
        self.store.load_state(&entity.followable_key()).await
    }

    /// Whether `subject` follows `object`.
    pub async fn followee_of(
        &self,
        subject: &impl Followable,
        object: &impl Followable,
    ) -> AppResult<bool> {
        self.store
            .exists(&subject.followable_key(), &object.followable_key())
            .await
    }

    /// Whether anyone follows `entity`.
    pub async fn followed(&self, entity: &impl Followable) -> AppResult<bool> {
        Ok(self.store.count_by_followee(&entity.followable_key()).await? > 0)
    }

    /// Keys of everyone who ever followed `entity`, oldest first.
    pub async fn followed_history(&self, entity: &impl Followable) -> AppResult<Vec<EntityKey>> {
        self.store.history(&entity.followable_key()).await
    }

    /// Everyone who ever followed `entity`, resolved, oldest first.
    pub async fn ever_followed(&self, entity: &impl Followable) -> AppResult<Vec<R::Entity>> {
        let history = self.followed_history(entity).await?;
        resolve_all(self.resolver.as_ref(), history, self.policy).await
    }

    /// Make an entity known so type-wide reports include it.
    pub async fn register(&self, entity: &impl Followable) -> AppResult<()> {
        let key = entity.followable_key();
        self.registry.ensure_key(&key)?;
        self.store.register(&key).await?;
        debug!(entity = %key, "Registered");
        Ok(())
    }

    /// Drop an entity the host deleted: every edge it takes part in and its
    /// authorization lists go, so type-wide reports stop listing it. Its
    /// follow history, and its entries in others' history, are kept.
    pub async fn forget(&self, entity: &impl Followable) -> AppResult<()> {
        let key = entity.followable_key();
        self.store.forget(&key).await?;
        debug!(entity = %key, "Forgotten");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, RegisteredEntityResolver};
    use followable_common::AppError;

    type Service = FollowGraphService<MemoryStore, RegisteredEntityResolver<MemoryStore>>;

    fn service() -> (Service, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let resolver = Arc::new(RegisteredEntityResolver::new(store.clone()));
        let registry = Arc::new(TypeRegistry::from_names(["User", "Group"]).unwrap());
        (FollowGraphService::new(store.clone(), resolver, registry), store)
    }

    fn user(id: &str) -> EntityKey {
        EntityKey::new(TypeTag::new("User"), id)
    }

    fn group(id: &str) -> EntityKey {
        EntityKey::new(TypeTag::new("Group"), id)
    }

    #[tokio::test]
    async fn test_follow_creates_edge_and_history() {
        let (service, store) = service();

        let outcome = service.follow(&user("u1"), &group("g1")).await.unwrap();

        assert_eq!(outcome, FollowOutcome::Followed);
        assert!(service.followee_of(&user("u1"), &group("g1")).await.unwrap());
        assert!(!service.followee_of(&group("g1"), &user("u1")).await.unwrap());
        assert!(service.followed(&group("g1")).await.unwrap());
        assert_eq!(
            service.followed_history(&group("g1")).await.unwrap(),
            vec![user("u1")]
        );
        assert!(store.is_registered(&user("u1")).await.unwrap());
        assert!(store.is_registered(&group("g1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_follow_twice_reports_already_following() {
        let (service, store) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();

        let outcome = service.follow(&user("u1"), &group("g1")).await.unwrap();

        assert_eq!(outcome, FollowOutcome::AlreadyFollowing);
        assert_eq!(store.count_by_followee(&group("g1")).await.unwrap(), 1);
        assert_eq!(service.followed_history(&group("g1")).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_self_follow_is_rejected() {
        let (service, store) = service();

        let outcome = service.follow(&user("u1"), &user("u1")).await.unwrap();

        assert_eq!(outcome, FollowOutcome::SelfFollow);
        assert_eq!(store.count_by_followee(&user("u1")).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_followee_refusal() {
        let (service, _) = service();
        service.set_authorization(&group("g1"), ["User"]).await.unwrap();

        let outcome = service.follow(&user("u1"), &group("g1")).await.unwrap();
        assert_eq!(
            outcome,
            FollowOutcome::Unauthorized(Refusal::FolloweeRefuses(TypeTag::new("user")))
        );
        assert!(!service.followee_of(&user("u1"), &group("g1")).await.unwrap());

        service.unset_authorization(&group("g1"), ["user"]).await.unwrap();
        let outcome = service.follow(&user("u1"), &group("g1")).await.unwrap();
        assert_eq!(outcome, FollowOutcome::Followed);
    }

    #[tokio::test]
    async fn test_follower_restriction() {
        let (service, _) = service();
        service
            .set_follow_restriction(&user("u1"), ["Group"])
            .await
            .unwrap();

        let outcome = service.follow(&user("u1"), &group("g1")).await.unwrap();
        assert_eq!(
            outcome,
            FollowOutcome::Unauthorized(Refusal::FollowerRefuses(TypeTag::new("group")))
        );

        // Other types are unaffected.
        let outcome = service.follow(&user("u1"), &user("u2")).await.unwrap();
        assert_eq!(outcome, FollowOutcome::Followed);

        service
            .unset_follow_restriction(&user("u1"), ["Group"])
            .await
            .unwrap();
        let outcome = service.follow(&user("u1"), &group("g1")).await.unwrap();
        assert_eq!(outcome, FollowOutcome::Followed);
    }

    #[tokio::test]
    async fn test_authorization_rejects_unknown_types() {
        let (service, _) = service();

        let result = service.set_authorization(&group("g1"), ["User", "Channel"]).await;

        assert!(matches!(result, Err(AppError::UnknownType(name)) if name == "channel"));
        assert_eq!(
            service.authorization(&group("g1")).await.unwrap(),
            FollowState::default()
        );
    }

    #[tokio::test]
    async fn test_follow_rejects_unregistered_types() {
        let (service, _) = service();
        let channel = EntityKey::new(TypeTag::new("Channel"), "c1");

        let result = service.follow(&user("u1"), &channel).await;

        assert!(matches!(result, Err(AppError::UnknownType(_))));
    }

    #[tokio::test]
    async fn test_unfollow_keeps_history() {
        let (service, _) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();

        let report = service.unfollow(&user("u1"), [group("g1")]).await.unwrap();

        assert_eq!(report, vec![(group("g1"), UnfollowOutcome::Unfollowed)]);
        assert!(!service.followee_of(&user("u1"), &group("g1")).await.unwrap());
        assert_eq!(
            service.followed_history(&group("g1")).await.unwrap(),
            vec![user("u1")]
        );
    }

    #[tokio::test]
    async fn test_unfollow_reports_each_object() {
        let (service, _) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();
        service.follow(&user("u1"), &group("g3")).await.unwrap();
        service.set_authorization(&group("g3"), ["User"]).await.unwrap();

        let report = service
            .unfollow(&user("u1"), [group("g1"), group("g2"), user("u1"), group("g3")])
            .await
            .unwrap();

        assert_eq!(
            report,
            vec![
                (group("g1"), UnfollowOutcome::Unfollowed),
                (group("g2"), UnfollowOutcome::NotFollowing),
                (user("u1"), UnfollowOutcome::SelfUnfollow),
                (
                    group("g3"),
                    UnfollowOutcome::Unauthorized(Refusal::FolloweeRefuses(TypeTag::new("user")))
                ),
            ]
        );
        assert!(service.followee_of(&user("u1"), &group("g3")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unfollow_follower_restriction_keeps_edge() {
        let (service, _) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();
        service
            .set_follow_restriction(&user("u1"), ["Group"])
            .await
            .unwrap();

        let report = service.unfollow(&user("u1"), [group("g1")]).await.unwrap();

        assert_eq!(
            report,
            vec![(
                group("g1"),
                UnfollowOutcome::Unauthorized(Refusal::FollowerRefuses(TypeTag::new("group")))
            )]
        );
        assert!(service.followee_of(&user("u1"), &group("g1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unfollow_refusal_wins_over_missing_edge() {
        let (service, _) = service();
        service.set_authorization(&group("g1"), ["User"]).await.unwrap();

        let report = service.unfollow(&user("u1"), [group("g1")]).await.unwrap();

        assert_eq!(
            report,
            vec![(
                group("g1"),
                UnfollowOutcome::Unauthorized(Refusal::FolloweeRefuses(TypeTag::new("user")))
            )]
        );
    }

    #[tokio::test]
    async fn test_unfollow_unknown_type_removes_nothing() {
        let (service, _) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();
        let channel = EntityKey::new(TypeTag::new("Channel"), "c1");

        let result = service.unfollow(&user("u1"), [group("g1"), channel]).await;

        assert!(matches!(result, Err(AppError::UnknownType(name)) if name == "channel"));
        assert!(service.followee_of(&user("u1"), &group("g1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_authorization_edits_keep_both() {
        let (service, _) = service();

        let (a, b) = tokio::join!(
            service.set_authorization(&group("g1"), ["User"]),
            service.set_authorization(&group("g1"), ["Group"]),
        );
        a.unwrap();
        b.unwrap();

        let state = service.authorization(&group("g1")).await.unwrap();
        assert!(state.cannot_followed.contains(&TypeTag::new("user")));
        assert!(state.cannot_followed.contains(&TypeTag::new("group")));
    }

    #[tokio::test]
    async fn test_forget_removes_edges_both_ways_and_keeps_history() {
        let (service, store) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();
        service.follow(&group("g1"), &user("u2")).await.unwrap();
        service.set_authorization(&group("g1"), ["Group"]).await.unwrap();

        service.forget(&group("g1")).await.unwrap();

        assert!(!service.followee_of(&user("u1"), &group("g1")).await.unwrap());
        assert!(!service.followed(&user("u2")).await.unwrap());
        assert!(!store.is_registered(&group("g1")).await.unwrap());
        assert_eq!(
            service.authorization(&group("g1")).await.unwrap(),
            FollowState::default()
        );
        assert_eq!(
            service.followed_history(&group("g1")).await.unwrap(),
            vec![user("u1")]
        );
        assert_eq!(
            service.followed_history(&user("u2")).await.unwrap(),
            vec![group("g1")]
        );
    }

    #[tokio::test]
    async fn test_unfollow_where_filters_objects() {
        let (service, _) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();
        service.follow(&user("u1"), &group("g2")).await.unwrap();

        let report = service
            .unfollow_where(&user("u1"), [group("g1"), group("g2")], |g| g.id == "g2")
            .await
            .unwrap();

        assert_eq!(report, vec![(group("g2"), UnfollowOutcome::Unfollowed)]);
        assert!(service.followee_of(&user("u1"), &group("g1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_unfollow_everyone() {
        let (service, store) = service();
        service.follow(&user("u1"), &group("g1")).await.unwrap();
        service.follow(&user("u1"), &user("u2")).await.unwrap();
        service.follow(&user("u2"), &user("u1")).await.unwrap();

        let report = service.unfollow_everyone(&user("u1")).await.unwrap();

        assert_eq!(report.len(), 2);
        assert!(report.iter().all(|(_, o)| *o == UnfollowOutcome::Unfollowed));
        assert_eq!(store.count_by_follower(&user("u1")).await.unwrap(), 0);
        // Followers of u1 are untouched.
        assert!(service.followee_of(&user("u2"), &user("u1")).await.unwrap());
    }

    #[tokio::test]
    async fn test_ever_followed_resolves_history() {
        let (service, _) = service();
        service.follow(&user("u2"), &group("g1")).await.unwrap();
        service.follow(&user("u1"), &group("g1")).await.unwrap();
        service.unfollow(&user("u2"), [group("g1")]).await.unwrap();
        service.follow(&user("u2"), &group("g1")).await.unwrap();

        let ever = service.ever_followed(&group("g1")).await.unwrap();

        assert_eq!(ever, vec![user("u2"), user("u1"), user("u2")]);
    }

    #[tokio::test]
    async fn test_register_without_followers() {
        let (service, store) = service();

        service.register(&group("g9")).await.unwrap();

        assert!(store.is_registered(&group("g9")).await.unwrap());
        assert!(!service.followed(&group("g9")).await.unwrap());
    }
}
