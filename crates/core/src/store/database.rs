//! Relationship store backed by the `PostgreSQL` follow tables.

use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use followable_common::{AppError, AppResult, IdGenerator};
use followable_db::entities::{follow, followable_state};
use followable_db::repositories::{
    FollowRepository, FollowableStateRepository, FollowedHistoryRepository,
};
use sea_orm::{DatabaseConnection, DatabaseTransaction, DbErr, Set, TransactionTrait};

use super::RelationshipStore;
use crate::types::{AuthorizationList, EntityKey, FollowEdge, FollowState, TypeTag};

/// Relationship store over the `follow`, `followable_state` and
/// `followed_history` tables.
///
/// Pair uniqueness is enforced by the `idx_follow_pair` unique index, so
/// `insert_edge` is an insert-if-absent even across processes. Follows,
/// authorization edits and `forget` each run in one transaction.
#[derive(Clone)]
pub struct DatabaseStore {
    db: Arc<DatabaseConnection>,
    follows: FollowRepository,
    states: FollowableStateRepository,
    history: FollowedHistoryRepository,
    id_gen: IdGenerator,
}

impl DatabaseStore {
    /// Create a store on top of an open connection.
    #[must_use]
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self {
            follows: FollowRepository::new(db.clone()),
            states: FollowableStateRepository::new(db.clone()),
            history: FollowedHistoryRepository::new(db.clone()),
            id_gen: IdGenerator::new(),
            db,
        }
    }

    async fn begin(&self) -> AppResult<DatabaseTransaction> {
        self.db.begin().await.map_err(db_error)
    }

    fn edge_model(&self, edge: &FollowEdge) -> follow::ActiveModel {
        follow::ActiveModel {
            id: Set(self.id_gen.generate()),
            follower_type: Set(edge.follower.type_tag.to_string()),
            follower_id: Set(edge.follower.id.clone()),
            followee_type: Set(edge.followee.type_tag.to_string()),
            followee_id: Set(edge.followee.id.clone()),
            created_at: Set(edge.created_at.into()),
        }
    }
}

fn db_error(e: DbErr) -> AppError {
    AppError::Database(e.to_string())
}

fn edge_from_model(model: follow::Model) -> FollowEdge {
    FollowEdge {
        follower: EntityKey::new(TypeTag::new(model.follower_type), model.follower_id),
        followee: EntityKey::new(TypeTag::new(model.followee_type), model.followee_id),
        created_at: model.created_at.into(),
    }
}

fn edges_from_models(models: Vec<follow::Model>) -> Vec<FollowEdge> {
    models.into_iter().map(edge_from_model).collect()
}

fn state_from_model(model: followable_state::Model) -> AppResult<FollowState> {
    Ok(FollowState {
        cannot_followed: serde_json::from_value::<BTreeSet<TypeTag>>(model.cannot_followed)?,
        cannot_follow: serde_json::from_value::<BTreeSet<TypeTag>>(model.cannot_follow)?,
    })
}

fn tag_strings(tags: &BTreeSet<TypeTag>) -> Vec<String> {
    tags.iter().map(ToString::to_string).collect()
}

#[async_trait]
impl RelationshipStore for DatabaseStore {
    async fn insert_edge(&self, edge: &FollowEdge) -> AppResult<bool> {
        self.follows.insert_if_absent(self.edge_model(edge)).await
    }

    async fn record_follow(&self, edge: &FollowEdge) -> AppResult<bool> {
        // Dropping the transaction on an early return rolls it back.
        let txn = self.begin().await?;
        if !FollowRepository::insert_if_absent_in(&txn, self.edge_model(edge)).await? {
            return Ok(false);
        }

        for key in [&edge.follower, &edge.followee] {
            FollowableStateRepository::ensure_in(
                &txn,
                self.id_gen.generate(),
                key.type_tag.as_str(),
                &key.id,
            )
            .await?;
        }
        FollowedHistoryRepository::append_in(
            &txn,
            edge.followee.type_tag.as_str(),
            &edge.followee.id,
            edge.follower.type_tag.as_str(),
            &edge.follower.id,
        )
        .await?;

        txn.commit().await.map_err(db_error)?;
        Ok(true)
    }

    async fn delete_edge(&self, follower: &EntityKey, followee: &EntityKey) -> AppResult<bool> {
        self.follows
            .delete_by_pair(
                follower.type_tag.as_str(),
                &follower.id,
                followee.type_tag.as_str(),
                &followee.id,
            )
            .await
    }

    async fn exists(&self, follower: &EntityKey, followee: &EntityKey) -> AppResult<bool> {
        self.follows
            .exists(
                follower.type_tag.as_str(),
                &follower.id,
                followee.type_tag.as_str(),
                &followee.id,
            )
            .await
    }

    async fn query_by_followee(&self, followee: &EntityKey) -> AppResult<Vec<FollowEdge>> {
        self.follows
            .find_by_followee(followee.type_tag.as_str(), &followee.id, None)
            .await
            .map(edges_from_models)
    }

    async fn query_by_follower(&self, follower: &EntityKey) -> AppResult<Vec<FollowEdge>> {
        self.follows
            .find_by_follower(follower.type_tag.as_str(), &follower.id, None)
            .await
            .map(edges_from_models)
    }

    async fn query_by_followee_and_type(
        &self,
        followee: &EntityKey,
        follower_type: &TypeTag,
    ) -> AppResult<Vec<FollowEdge>> {
        self.follows
            .find_by_followee(
                followee.type_tag.as_str(),
                &followee.id,
                Some(follower_type.as_str()),
            )
            .await
            .map(edges_from_models)
    }

    async fn query_by_follower_and_type(
        &self,
        follower: &EntityKey,
        followee_type: &TypeTag,
    ) -> AppResult<Vec<FollowEdge>> {
        self.follows
            .find_by_follower(
                follower.type_tag.as_str(),
                &follower.id,
                Some(followee_type.as_str()),
            )
            .await
            .map(edges_from_models)
    }

    async fn count_by_followee(&self, followee: &EntityKey) -> AppResult<u64> {
        self.follows
            .count_by_followee(followee.type_tag.as_str(), &followee.id, None)
            .await
    }

    async fn count_by_followee_and_type(
        &self,
        followee: &EntityKey,
        follower_type: &TypeTag,
    ) -> AppResult<u64> {
        self.follows
            .count_by_followee(
                followee.type_tag.as_str(),
                &followee.id,
                Some(follower_type.as_str()),
            )
            .await
    }

    async fn count_by_follower(&self, follower: &EntityKey) -> AppResult<u64> {
        self.follows
            .count_by_follower(follower.type_tag.as_str(), &follower.id)
            .await
    }

    async fn list_all_of_type(&self, type_tag: &TypeTag) -> AppResult<Vec<EntityKey>> {
        let rows = self.states.find_by_type(type_tag.as_str()).await?;
        Ok(rows
            .into_iter()
            .map(|row| EntityKey::new(type_tag.clone(), row.entity_id))
            .collect())
    }

    async fn register(&self, key: &EntityKey) -> AppResult<()> {
        self.states
            .ensure(self.id_gen.generate(), key.type_tag.as_str(), &key.id)
            .await?;
        Ok(())
    }

    async fn is_registered(&self, key: &EntityKey) -> AppResult<bool> {
        Ok(self
            .states
            .find(key.type_tag.as_str(), &key.id)
            .await?
            .is_some())
    }

    async fn load_state(&self, key: &EntityKey) -> AppResult<FollowState> {
        match self.states.find(key.type_tag.as_str(), &key.id).await? {
            Some(row) => state_from_model(row),
            None => Ok(FollowState::default()),
        }
    }

    async fn edit_state(
        &self,
        key: &EntityKey,
        list: AuthorizationList,
        tags: &[TypeTag],
        insert: bool,
    ) -> AppResult<FollowState> {
        let (entity_type, entity_id) = (key.type_tag.as_str(), key.id.as_str());

        let txn = self.begin().await?;
        FollowableStateRepository::ensure_in(&txn, self.id_gen.generate(), entity_type, entity_id)
            .await?;
        let row = FollowableStateRepository::find_for_update_in(&txn, entity_type, entity_id)
            .await?
            .ok_or_else(|| AppError::Internal(format!("state row of {key} missing after insert")))?;

        let mut state = state_from_model(row)?;
        state.edit(list, tags, insert);
        FollowableStateRepository::update_lists_in(
            &txn,
            entity_type,
            entity_id,
            &tag_strings(&state.cannot_followed),
            &tag_strings(&state.cannot_follow),
        )
        .await?;

        txn.commit().await.map_err(db_error)?;
        Ok(state)
    }

    async fn forget(&self, key: &EntityKey) -> AppResult<()> {
        let txn = self.begin().await?;
        FollowRepository::delete_involving_in(&txn, key.type_tag.as_str(), &key.id).await?;
        FollowableStateRepository::delete_in(&txn, key.type_tag.as_str(), &key.id).await?;
        txn.commit().await.map_err(db_error)
    }

    async fn append_history(&self, followee: &EntityKey, follower: &EntityKey) -> AppResult<()> {
        self.history
            .append(
                followee.type_tag.as_str(),
                &followee.id,
                follower.type_tag.as_str(),
                &follower.id,
            )
            .await
    }

    async fn history(&self, followee: &EntityKey) -> AppResult<Vec<EntityKey>> {
        let rows = self
            .history
            .find_by_followee(followee.type_tag.as_str(), &followee.id)
            .await?;
        Ok(rows
            .into_iter()
            .map(|row| EntityKey::new(TypeTag::new(row.follower_type), row.follower_id))
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use followable_common::AppError;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    fn exec(rows_affected: u64) -> MockExecResult {
        MockExecResult {
            last_insert_id: 0,
            rows_affected,
        }
    }
    use serde_json::json;

    fn key(tag: &str, id: &str) -> EntityKey {
        EntityKey::new(TypeTag::new(tag), id)
    }

    fn follow_row(id: &str, follower_id: &str) -> follow::Model {
        follow::Model {
            id: id.to_string(),
            follower_type: "user".to_string(),
            follower_id: follower_id.to_string(),
            followee_type: "group".to_string(),
            followee_id: "g1".to_string(),
            created_at: Utc::now().into(),
        }
    }

    fn state_row(entity_id: &str, cannot_followed: serde_json::Value) -> followable_state::Model {
        followable_state::Model {
            id: format!("s-{entity_id}"),
            entity_type: "group".to_string(),
            entity_id: entity_id.to_string(),
            cannot_followed,
            cannot_follow: json!([]),
            created_at: Utc::now().into(),
            updated_at: None,
        }
    }

    #[tokio::test]
    async fn test_insert_edge_reports_duplicates() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 1,
                    },
                    MockExecResult {
                        last_insert_id: 0,
                        rows_affected: 0,
                    },
                ])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);
        let edge = FollowEdge::new(key("user", "u1"), key("group", "g1"));

        assert!(store.insert_edge(&edge).await.unwrap());
        assert!(!store.insert_edge(&edge).await.unwrap());
    }

    #[tokio::test]
    async fn test_query_by_followee_maps_keys() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[follow_row("e1", "u1"), follow_row("e2", "u2")]])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);

        let edges = store.query_by_followee(&key("group", "g1")).await.unwrap();

        assert_eq!(edges.len(), 2);
        assert_eq!(edges[0].follower, key("user", "u1"));
        assert_eq!(edges[1].follower, key("user", "u2"));
        assert_eq!(edges[1].followee, key("group", "g1"));
    }

    #[tokio::test]
    async fn test_count_by_followee() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[maplit::btreemap! {
                    "num_items" => sea_orm::Value::BigInt(Some(3))
                }]])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);

        assert_eq!(store.count_by_followee(&key("group", "g1")).await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_load_state_decodes_lists() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("g1", json!(["user", "group"]))]])
                .append_query_results([Vec::<followable_state::Model>::new()])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);

        let state = store.load_state(&key("group", "g1")).await.unwrap();
        assert!(state.cannot_followed.contains(&TypeTag::new("user")));
        assert!(state.cannot_followed.contains(&TypeTag::new("group")));
        assert!(state.cannot_follow.is_empty());

        let missing = store.load_state(&key("group", "g2")).await.unwrap();
        assert_eq!(missing, FollowState::default());
    }

    #[tokio::test]
    async fn test_load_state_rejects_malformed_lists() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("g1", json!({"user": true}))]])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);

        let result = store.load_state(&key("group", "g1")).await;
        assert!(matches!(result, Err(AppError::Internal(_))));
    }

    #[tokio::test]
    async fn test_list_all_of_type() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_query_results([[state_row("g1", json!([])), state_row("g2", json!([]))]])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);

        let keys = store.list_all_of_type(&TypeTag::new("group")).await.unwrap();
        assert_eq!(keys, vec![key("group", "g1"), key("group", "g2")]);
    }

    #[tokio::test]
    async fn test_record_follow_rolls_back_when_history_fails() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(1), exec(1), exec(0)])
                .append_exec_errors([DbErr::Custom("connection reset".to_string())])
                .into_connection(),
        );
        let store = DatabaseStore::new(db.clone());
        let edge = FollowEdge::new(key("user", "u1"), key("group", "g1"));

        let result = store.record_follow(&edge).await;
        assert!(matches!(result, Err(AppError::Database(msg)) if msg.contains("connection reset")));

        drop(store);
        let log = format!("{:?}", Arc::try_unwrap(db).ok().unwrap().into_transaction_log());
        assert!(!log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_record_follow_existing_edge_writes_nothing_else() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(0)])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);
        let edge = FollowEdge::new(key("user", "u1"), key("group", "g1"));

        assert!(!store.record_follow(&edge).await.unwrap());
    }

    #[tokio::test]
    async fn test_edit_state_locks_and_merges() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(0)])
                .append_query_results([[state_row("g1", json!(["channel"]))]])
                .append_exec_results([exec(1)])
                .into_connection(),
        );
        let store = DatabaseStore::new(db.clone());

        let state = store
            .edit_state(
                &key("group", "g1"),
                AuthorizationList::CannotFollowed,
                &[TypeTag::new("user")],
                true,
            )
            .await
            .unwrap();

        assert_eq!(
            state.cannot_followed,
            BTreeSet::from([TypeTag::new("channel"), TypeTag::new("user")])
        );
        drop(store);
        let log = format!("{:?}", Arc::try_unwrap(db).ok().unwrap().into_transaction_log());
        assert!(log.contains("FOR UPDATE"));
        assert!(log.contains("COMMIT"));
    }

    #[tokio::test]
    async fn test_forget_deletes_edges_and_state() {
        let db = Arc::new(
            MockDatabase::new(DatabaseBackend::Postgres)
                .append_exec_results([exec(2), exec(1)])
                .into_connection(),
        );
        let store = DatabaseStore::new(db);

        assert!(store.forget(&key("group", "g1")).await.is_ok());
    }
}
