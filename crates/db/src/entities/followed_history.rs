//! Followed history entity (append-only record of past followers).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "followed_history")]
pub struct Model {
    /// Insertion sequence; history is read back in this order
    #[sea_orm(primary_key)]
    pub id: i64,

    pub followee_type: String,

    pub followee_id: String,

    pub follower_type: String,

    pub follower_id: String,

    pub created_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
