//! Application configuration.

use serde::Deserialize;
use std::path::Path;

/// Application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Follow engine configuration.
    #[serde(default)]
    pub follow: FollowConfig,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// Follow engine configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FollowConfig {
    /// Type names of the entities that take part in follow relationships.
    #[serde(default)]
    pub types: Vec<String>,
    /// What to do when a follower or history entry no longer resolves.
    #[serde(default)]
    pub resolution_policy: ResolutionPolicy,
}

/// Policy applied when a stored key cannot be resolved to a live entity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolutionPolicy {
    /// Fail the whole operation on the first missing entity.
    #[default]
    Abort,
    /// Log the missing entity and continue with the rest.
    Skip,
}

const fn default_max_connections() -> u32 {
    20
}

const fn default_min_connections() -> u32 {
    2
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `config/default.toml`
    /// 2. `config/{environment}.toml` (based on `FOLLOWABLE_ENV`)
    /// 3. Environment variables with `FOLLOWABLE__` prefix
    pub fn load() -> Result<Self, config::ConfigError> {
        let env = std::env::var("FOLLOWABLE_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FOLLOWABLE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("follow.types")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, config::ConfigError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FOLLOWABLE")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("follow.types")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn from_toml(source: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(source, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_defaults_applied() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://localhost/followable"
            "#,
        );

        assert_eq!(config.database.max_connections, 20);
        assert_eq!(config.database.min_connections, 2);
        assert!(config.follow.types.is_empty());
        assert_eq!(config.follow.resolution_policy, ResolutionPolicy::Abort);
    }

    #[test]
    fn test_follow_section() {
        let config = from_toml(
            r#"
            [database]
            url = "postgres://localhost/followable"

            [follow]
            types = ["User", "Group"]
            resolution_policy = "skip"
            "#,
        );

        assert_eq!(config.follow.types, vec!["User", "Group"]);
        assert_eq!(config.follow.resolution_policy, ResolutionPolicy::Skip);
    }
}
