//! `PostgreSQL` persistence for followable: the `follow`, `followable_state`
//! and `followed_history` tables, their migrations and repositories.

pub mod entities;
pub mod migrations;
pub mod repositories;
pub mod test_utils;

use std::time::Duration;

use followable_common::{AppError, AppResult, Config, DatabaseConfig};
use sea_orm::{ConnectOptions, Database, DatabaseConnection};
use sea_orm_migration::MigratorTrait;
use tracing::info;
use tracing::log::LevelFilter;

pub use migrations::Migrator;

/// Pool options for a database configuration.
#[must_use]
pub fn connect_options(config: &DatabaseConfig) -> ConnectOptions {
    let mut opt = ConnectOptions::new(&config.url);
    opt.max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .connect_timeout(Duration::from_secs(10))
        .acquire_timeout(Duration::from_secs(10))
        .idle_timeout(Duration::from_secs(600))
        .sqlx_logging(true)
        .sqlx_logging_level(LevelFilter::Debug);
    opt
}

/// Open the connection pool described by `config`.
pub async fn init(config: &Config) -> AppResult<DatabaseConnection> {
    Database::connect(connect_options(&config.database))
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}

/// Apply pending follow-table migrations.
pub async fn migrate(db: &DatabaseConnection) -> AppResult<()> {
    let pending = Migrator::get_pending_migrations(db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?;
    info!(pending = pending.len(), "Applying migrations");

    Migrator::up(db, None)
        .await
        .map_err(|e| AppError::Database(e.to_string()))
}
