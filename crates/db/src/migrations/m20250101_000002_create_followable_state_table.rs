//! Create followable state table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FollowableState::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowableState::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FollowableState::EntityType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowableState::EntityId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowableState::CannotFollowed)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(FollowableState::CannotFollow)
                            .json_binary()
                            .not_null()
                            .default(Expr::cust("'[]'::jsonb")),
                    )
                    .col(
                        ColumnDef::new(FollowableState::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .col(ColumnDef::new(FollowableState::UpdatedAt).timestamp_with_time_zone())
                    .to_owned(),
            )
            .await?;

        // Unique index: one state row per entity; also serves type-wide listing
        manager
            .create_index(
                Index::create()
                    .name("idx_followable_state_entity")
                    .table(FollowableState::Table)
                    .col(FollowableState::EntityType)
                    .col(FollowableState::EntityId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowableState::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FollowableState {
    Table,
    Id,
    EntityType,
    EntityId,
    CannotFollowed,
    CannotFollow,
    CreatedAt,
    UpdatedAt,
}
