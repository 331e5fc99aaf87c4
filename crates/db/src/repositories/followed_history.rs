//! Followed history repository.

use std::sync::Arc;

use crate::entities::{FollowedHistory, followed_history};
use chrono::Utc;
use followable_common::{AppError, AppResult};
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection, EntityTrait,
    QueryFilter, QueryOrder, Set,
};

/// Repository for the append-only followed history.
#[derive(Clone)]
pub struct FollowedHistoryRepository {
    db: Arc<DatabaseConnection>,
}

impl FollowedHistoryRepository {
    /// Create a new followed history repository.
    #[must_use]
    pub const fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    /// Append a follower to a followee's history.
    pub async fn append(
        &self,
        followee_type: &str,
        followee_id: &str,
        follower_type: &str,
        follower_id: &str,
    ) -> AppResult<()> {
        Self::append_in(
            self.db.as_ref(),
            followee_type,
            followee_id,
            follower_type,
            follower_id,
        )
        .await
    }

    /// [`append`](Self::append) on an explicit connection or transaction.
    pub async fn append_in<C: ConnectionTrait>(
        conn: &C,
        followee_type: &str,
        followee_id: &str,
        follower_type: &str,
        follower_id: &str,
    ) -> AppResult<()> {
        let model = followed_history::ActiveModel {
            id: NotSet,
            followee_type: Set(followee_type.to_string()),
            followee_id: Set(followee_id.to_string()),
            follower_type: Set(follower_type.to_string()),
            follower_id: Set(follower_id.to_string()),
            created_at: Set(Utc::now().into()),
        };

        FollowedHistory::insert(model)
            .exec_without_returning(conn)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        Ok(())
    }

    /// Get a followee's history, oldest first.
    pub async fn find_by_followee(
        &self,
        followee_type: &str,
        followee_id: &str,
    ) -> AppResult<Vec<followed_history::Model>> {
        FollowedHistory::find()
            .filter(followed_history::Column::FolloweeType.eq(followee_type))
            .filter(followed_history::Column::FolloweeId.eq(followee_id))
            .order_by_asc(followed_history::Column::Id)
            .all(self.db.as_ref())
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }
}
