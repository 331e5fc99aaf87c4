//! `PostgreSQL` fixtures for tests of the follow tables.
//!
//! Connection settings come from `TEST_DB_HOST`, `TEST_DB_PORT`,
//! `TEST_DB_USER`, `TEST_DB_PASSWORD` and `TEST_DB_NAME`.

use std::sync::Arc;

use followable_common::IdGenerator;
use sea_orm::{ConnectionTrait, Database, DatabaseBackend, DatabaseConnection, DbErr, Statement};
use sea_orm_migration::MigratorTrait;
use tracing::info;

use crate::migrations::Migrator;

/// Tables emptied by [`TestDatabase::cleanup`].
pub const FOLLOW_TABLES: [&str; 3] = ["follow", "followable_state", "followed_history"];

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

/// Where the test server lives.
#[derive(Debug, Clone)]
pub struct TestDbConfig {
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password.
    pub password: String,
    /// Database name.
    pub database: String,
}

impl Default for TestDbConfig {
    fn default() -> Self {
        Self {
            host: env_or("TEST_DB_HOST", "localhost"),
            port: std::env::var("TEST_DB_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5433),
            username: env_or("TEST_DB_USER", "followable_test"),
            password: env_or("TEST_DB_PASSWORD", "followable_test"),
            database: env_or("TEST_DB_NAME", "followable_test"),
        }
    }
}

impl TestDbConfig {
    fn url_for(&self, database: &str) -> String {
        format!(
            "postgres://{}:{}@{}:{}/{database}",
            self.username, self.password, self.host, self.port
        )
    }

    /// URL of the test database.
    #[must_use]
    pub fn database_url(&self) -> String {
        self.url_for(&self.database)
    }

    /// URL of the maintenance database, used to create and drop test databases.
    #[must_use]
    pub fn postgres_url(&self) -> String {
        self.url_for("postgres")
    }
}

/// A migrated test database.
pub struct TestDatabase {
    /// Open connection to the database.
    pub conn: DatabaseConnection,
    /// Settings the connection was made with.
    pub config: TestDbConfig,
}

impl TestDatabase {
    /// Connect to the shared test database.
    pub async fn new() -> Result<Self, DbErr> {
        Self::with_config(TestDbConfig::default()).await
    }

    /// Connect with explicit settings and bring the follow tables up to date.
    pub async fn with_config(config: TestDbConfig) -> Result<Self, DbErr> {
        let conn = Database::connect(&config.database_url()).await?;
        Migrator::up(&conn, None).await?;

        info!(database = %config.database, "Connected to test database");
        Ok(Self { conn, config })
    }

    /// Create a throwaway database so tests can run in parallel.
    ///
    /// Pair it with [`drop_database`](Self::drop_database).
    pub async fn create_unique() -> Result<Self, DbErr> {
        let mut config = TestDbConfig::default();
        let suffix = IdGenerator::new().generate();
        config.database = format!("followable_test_{}", &suffix[suffix.len() - 10..]);

        let maintenance = Database::connect(&config.postgres_url()).await?;
        maintenance
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("CREATE DATABASE \"{}\"", config.database),
            ))
            .await?;
        maintenance.close().await?;

        Self::with_config(config).await
    }

    /// A shared handle to the connection, as repositories and stores take it.
    #[must_use]
    pub fn shared(&self) -> Arc<DatabaseConnection> {
        Arc::new(self.conn.clone())
    }

    /// Empty every follow table.
    pub async fn cleanup(&self) -> Result<(), DbErr> {
        let tables = FOLLOW_TABLES.map(|t| format!("\"{t}\"")).join(", ");
        self.conn
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("TRUNCATE TABLE {tables} RESTART IDENTITY"),
            ))
            .await?;

        info!("Cleaned up test database");
        Ok(())
    }

    /// Drop a database made by [`create_unique`](Self::create_unique).
    pub async fn drop_database(self) -> Result<(), DbErr> {
        let Self { conn, config } = self;
        conn.close().await?;

        let maintenance = Database::connect(&config.postgres_url()).await?;
        // Stray pool connections would block the drop.
        maintenance
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!(
                    "SELECT pg_terminate_backend(pid) FROM pg_stat_activity WHERE datname = '{}'",
                    config.database
                ),
            ))
            .await
            .ok();
        maintenance
            .execute(Statement::from_string(
                DatabaseBackend::Postgres,
                format!("DROP DATABASE IF EXISTS \"{}\"", config.database),
            ))
            .await?;
        maintenance.close().await?;

        info!(database = %config.database, "Dropped test database");
        Ok(())
    }
}
