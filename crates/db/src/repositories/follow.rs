//! Follow repository.

use std::sync::Arc;

use crate::entities::{Follow, follow};
use followable_common::{AppError, AppResult};
use sea_orm::{
    ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, sea_query::OnConflict,
};

/// Follow repository for database operations.
///
/// Every edge is a single row; the unique index on the four key columns
/// makes [`FollowRepository::insert_if_absent`] the only way a duplicate
/// could be attempted, and it is rejected there.
#[derive(Clone)]
pub struct FollowRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowRepository {
    /// Create a new follow repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Find an edge by follower and followee.
    pub async fn find_by_pair(
        &self,
        follower_type: &str,
        follower_id: &str,
        followee_type: &str,
        followee_id: &str,
    ) -> AppResult<Option<follow::Model>> {
        Follow::find()
            .filter(follow::Column::FollowerType.eq(follower_type))
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeType.eq(followee_type))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .one(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Check if an edge exists.
    pub async fn exists(
        &self,
        follower_type: &str,
        follower_id: &str,
        followee_type: &str,
        followee_id: &str,
    ) -> AppResult<bool> {
        Ok(self
            .find_by_pair(follower_type, follower_id, followee_type, followee_id)
            .await?
            .is_some())
    }

    /// Insert an edge unless the pair already exists.
    ///
    /// Returns `true` when a row was written.
    pub async fn insert_if_absent(&self, model: follow::ActiveModel) -> AppResult<bool> {
        Self::insert_if_absent_in(self.db.as_ref(), model).await
    }

    /// [`insert_if_absent`](Self::insert_if_absent) on an explicit connection
    /// or transaction.
    pub async fn insert_if_absent_in<C: ConnectionTrait>(
        conn: &C,
        model: follow::ActiveModel,
    ) -> AppResult<bool> {
        let inserted = Follow::insert(model)
            .on_conflict(
                OnConflict::columns([
                    follow::Column::FollowerType,
                    follow::Column::FollowerId,
                    follow::Column::FolloweeType,
                    follow::Column::FolloweeId,
                ])
                .do_nothing()
                .to_owned(),
            )
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(inserted > 0)
    }

    /// Delete every edge an entity takes part in, on either side.
    ///
    /// Returns the number of removed rows.
    pub async fn delete_involving_in<C: ConnectionTrait>(
        conn: &C,
        entity_type: &str,
        entity_id: &str,
    ) -> AppResult<u64> {
        let result = Follow::delete_many()
            .filter(
                Condition::any()
                    .add(
                        Condition::all()
                            .add(follow::Column::FollowerType.eq(entity_type))
                            .add(follow::Column::FollowerId.eq(entity_id)),
                    )
                    .add(
                        Condition::all()
                            .add(follow::Column::FolloweeType.eq(entity_type))
                            .add(follow::Column::FolloweeId.eq(entity_id)),
                    ),
            )
            .exec(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected)
    }

    /// Delete an edge by pair.
    ///
    /// Returns `true` when a row existed and was removed.
    pub async fn delete_by_pair(
        &self,
        follower_type: &str,
        follower_id: &str,
        followee_type: &str,
        followee_id: &str,
    ) -> AppResult<bool> {
        let result = Follow::delete_many()
            .filter(follow::Column::FollowerType.eq(follower_type))
            .filter(follow::Column::FollowerId.eq(follower_id))
            .filter(follow::Column::FolloweeType.eq(followee_type))
            .filter(follow::Column::FolloweeId.eq(followee_id))
            .exec(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(result.rows_affected > 0)
    }

    /// Get the edges pointing at an entity, optionally only from one follower type.
    pub async fn find_by_followee(
        &self,
        followee_type: &str,
        followee_id: &str,
        follower_type: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FolloweeType.eq(followee_type))
            .filter(follow::Column::FolloweeId.eq(followee_id));

        if let Some(follower_type) = follower_type {
            query = query.filter(follow::Column::FollowerType.eq(follower_type));
        }

        query
            .order_by_asc(follow::Column::CreatedAt)
            .order_by_asc(follow::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Get the edges leaving an entity, optionally only towards one followee type.
    pub async fn find_by_follower(
        &self,
        follower_type: &str,
        follower_id: &str,
        followee_type: Option<&str>,
    ) -> AppResult<Vec<follow::Model>> {
        let mut query = Follow::find()
            .filter(follow::Column::FollowerType.eq(follower_type))
            .filter(follow::Column::FollowerId.eq(follower_id));

        if let Some(followee_type) = followee_type {
            query = query.filter(follow::Column::FolloweeType.eq(followee_type));
        }

        query
            .order_by_asc(follow::Column::CreatedAt)
            .order_by_asc(follow::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count followers of an entity, optionally only of one type.
    pub async fn count_by_followee(
        &self,
        followee_type: &str,
        followee_id: &str,
        follower_type: Option<&str>,
    ) -> AppResult<u64> {
        let mut query = Follow::find()
            .filter(follow::Column::FolloweeType.eq(followee_type))
            .filter(follow::Column::FolloweeId.eq(followee_id));

        if let Some(follower_type) = follower_type {
            query = query.filter(follow::Column::FollowerType.eq(follower_type));
        }

        query
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Count followees of an entity.
    pub async fn count_by_follower(&self, follower_type: &str, follower_id: &str) -> AppResult<u64> {
        Follow::find()
            .filter(follow::Column::FollowerType.eq(follower_type))
            .filter(follow::Column::FollowerId.eq(follower_id))
            .count(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
