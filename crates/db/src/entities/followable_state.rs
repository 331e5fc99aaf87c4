//! Followable state entity (per-entity authorization lists).

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "followable_state")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub entity_type: String,

    pub entity_id: String,

    /// Type tags refused as followers (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub cannot_followed: Json,

    /// Type tags this entity refuses to follow (JSON array of strings)
    #[sea_orm(column_type = "JsonBinary")]
    pub cannot_follow: Json,

    pub created_at: DateTimeWithTimeZone,

    #[sea_orm(nullable)]
    pub updated_at: Option<DateTimeWithTimeZone>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
