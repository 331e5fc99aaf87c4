//! Create follow table migration.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_table(
                Table::create()
                    .table(Follow::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(Follow::Id)
                            .string_len(32)
                            .not_null()
                            .primary_key(),
                    )
                    .col(ColumnDef::new(Follow::FollowerType).string_len(64).not_null())
                    .col(ColumnDef::new(Follow::FollowerId).string_len(128).not_null())
                    .col(ColumnDef::new(Follow::FolloweeType).string_len(64).not_null())
                    .col(ColumnDef::new(Follow::FolloweeId).string_len(128).not_null())
                    .col(
                        ColumnDef::new(Follow::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::current_timestamp()),
                    )
                    .to_owned(),
            )
            .await?;

        // Unique index: one edge per (follower, followee) pair
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_pair")
                    .table(Follow::Table)
                    .col(Follow::FollowerType)
                    .col(Follow::FollowerId)
                    .col(Follow::FolloweeType)
                    .col(Follow::FolloweeId)
                    .unique()
                    .to_owned(),
            )
            .await?;

        // Index: followee (for listing and counting followers, optionally by type)
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_followee")
                    .table(Follow::Table)
                    .col(Follow::FolloweeType)
                    .col(Follow::FolloweeId)
                    .col(Follow::FollowerType)
                    .to_owned(),
            )
            .await?;

        // Index: follower (for listing followees)
        manager
            .create_index(
                Index::create()
                    .name("idx_follow_follower")
                    .table(Follow::Table)
                    .col(Follow::FollowerType)
                    .col(Follow::FollowerId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(Follow::Table).to_owned())
            .await
    }
}

#[derive(Iden)]
enum Follow {
    Table,
    Id,
    FollowerType,
    FollowerId,
    FolloweeType,
    FolloweeId,
    CreatedAt,
}
