//! Create followed history table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(FollowedHistory::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(FollowedHistory::Id)
                            .big_integer()
                            .not_null()
                            .auto_increment()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(FollowedHistory::FolloweeType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowedHistory::FolloweeId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowedHistory::FollowerType)
                            .string_len(64)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowedHistory::FollowerId)
                            .string_len(128)
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(FollowedHistory::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Index: followee (history is always read per followee)
        manager
            .create_index(
                Index::create()
                    .name("idx_followed_history_followee")
                    .table(FollowedHistory::Table)
                    .col(FollowedHistory::FolloweeType)
                    .col(FollowedHistory::FolloweeId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(FollowedHistory::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum FollowedHistory {
    Table,
    Id,
    FolloweeType,
    FolloweeId,
    FollowerType,
    FollowerId,
    CreatedAt,
}
