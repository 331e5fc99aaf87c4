//! Followable state repository.

use std::sync::Arc;

use crate::entities::{FollowableState, followable_state};
use chrono::Utc;
use followable_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder,
    QuerySelect, Set,
    sea_query::{Expr, OnConflict},
};
use serde_json::json;

/// Repository for the per-entity follow state rows.
///
/// A state row also marks an entity as known to the follow engine; type-wide
/// reports enumerate these rows.
#[derive(Clone)]
pub struct FollowableStateRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowableStateRepository {
    /// Create a new followable state repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find the state row of an entity.
    pub async fn find(
        &self,
        entity_type: &str,
        entity_id: &str,
    ) -> AppResult<Option<followable_state::Model>> {
        FollowableState::find()
            .filter(followable_state::Column::EntityType.eq(entity_type))
            .filter(followable_state::Column::EntityId.eq(entity_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// List the state rows of every entity of a type, ordered by entity id.
    pub async fn find_by_type(&self, entity_type: &str) -> AppResult<Vec<followable_state::Model>> {
        FollowableState::find()
            .filter(followable_state::Column::EntityType.eq(entity_type))
            .order_by_asc(followable_state::Column::EntityId)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create an empty state row unless one already exists.
    ///
    /// Returns `true` when a row was written.
    pub async fn ensure(&self, id: String, entity_type: &str, entity_id: &str) -> AppResult<bool> {
        Self::ensure_in(self.db.as_ref(), id, entity_type, entity_id).await
    }

    /// [`ensure`](Self::ensure) on an explicit connection or transaction.
    pub async fn ensure_in<C: ConnectionTrait>(
        conn: &C,
        id: String,
        entity_type: &str,
        entity_id: &str,
    ) -> AppResult<bool> {
        let model = followable_state::ActiveModel {
            id: Set(id),
            entity_type: Set(entity_type.to_string()),
            entity_id: Set(entity_id.to_string()),
            cannot_followed: Set(json!([])),
            cannot_follow: Set(json!([])),
            created_at: Set(Utc::now().into()),
            updated_at: Set(None),
        };

        let inserted = FollowableState::insert(model)
            .on_conflict(
                OnConflict::columns([
                    followable_state::Column::EntityType,
                    followable_state::Column::EntityId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    /// Find the state row of an entity and lock it until the surrounding
    /// transaction ends (`SELECT ... FOR UPDATE`).
    pub async fn find_for_update_in<C: ConnectionTrait>(
        conn: &C,
        entity_type: &str,
        entity_id: &str,
    ) -> AppResult<Option<followable_state::Model>> {
        FollowableState::find()
            .filter(followable_state::Column::EntityType.eq(entity_type))
            .filter(followable_state::Column::EntityId.eq(entity_id))
            .lock_exclusive()
            .one(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Overwrite both authorization lists of an existing row.
    ///
    /// Call it with the row locked by [`find_for_update_in`](Self::find_for_update_in).
    pub async fn update_lists_in<C: ConnectionTrait>(
        conn: &C,
        entity_type: &str,
        entity_id: &str,
        cannot_followed: &[String],
        cannot_follow: &[String],
    ) -> AppResult<()> {
        FollowableState::update_many()
            .col_expr(
                followable_state::Column::CannotFollowed,
                Expr::value(json!(cannot_followed)),
            )
            .col_expr(
                followable_state::Column::CannotFollow,
                Expr::value(json!(cannot_follow)),
            )
            .col_expr(
                followable_state::Column::UpdatedAt,
                Expr::value(sea_orm::prelude::DateTimeWithTimeZone::from(Utc::now())),
            )
            .filter(followable_state::Column::EntityType.eq(entity_type))
            .filter(followable_state::Column::EntityId.eq(entity_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Delete the state row of an entity.
    ///
    /// Returns `true` when a row existed and was removed.
    pub async fn delete_in<C: ConnectionTrait>(
        conn: &C,
        entity_type: &str,
        entity_id: &str,
    ) -> AppResult<bool> {
        let result = FollowableState::delete_many()
            .filter(followable_state::Column::EntityType.eq(entity_type))
            .filter(followable_state::Column::EntityId.eq(entity_id))
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }
}
