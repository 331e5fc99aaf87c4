//! Database migrations.
//!
//! Schema migrations for the follow tables.

#![allow(missing_docs)]

use sea_orm_migration::prelude::*;

mod m20250101_000001_create_follow_table;
mod m20250101_000002_create_followable_state_table;
mod m20250101_000003_create_followed_history_table;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20250101_000001_create_follow_table::Migration),
            Box::new(m20250101_000002_create_followable_state_table::Migration),
            Box::new(m20250101_000003_create_followed_history_table::Migration),
        ]
    }
}
