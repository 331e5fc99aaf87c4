//! Database integration tests.
//!
//! These tests require a running `PostgreSQL` instance.
//! Run with: `cargo test --test db_integration -- --ignored`
//!
//! Environment variables:
//!   `TEST_DB_HOST` (default: localhost)
//!   `TEST_DB_PORT` (default: 5433)
//!   `TEST_DB_USER` (default: `followable_test`)
//!   `TEST_DB_PASSWORD` (default: `followable_test`)
//!   `TEST_DB_NAME` (default: `followable_test`)

#![allow(clippy::unwrap_used, clippy::expect_used)]

use chrono::Utc;
use followable_db::entities::follow;
use followable_db::repositories::{
    FollowRepository, FollowableStateRepository, FollowedHistoryRepository,
};
use followable_db::test_utils::{TestDatabase, TestDbConfig};
use sea_orm::Set;

fn edge(id: &str, follower_id: &str, followee_id: &str) -> follow::ActiveModel {
    follow::ActiveModel {
        id: Set(id.to_string()),
        follower_type: Set("user".to_string()),
        follower_id: Set(follower_id.to_string()),
        followee_type: Set("group".to_string()),
        followee_id: Set(followee_id.to_string()),
        created_at: Set(Utc::now().into()),
    }
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_connection() {
    let config = TestDbConfig::default();
    let result = TestDatabase::with_config(config).await;
    assert!(result.is_ok(), "Failed to connect: {:?}", result.err());
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_follow_pair_is_unique() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let repo = FollowRepository::new(db.shared());

    assert!(repo.insert_if_absent(edge("e1", "u1", "g1")).await.unwrap());
    assert!(!repo.insert_if_absent(edge("e2", "u1", "g1")).await.unwrap());
    assert_eq!(repo.count_by_followee("group", "g1", None).await.unwrap(), 1);

    assert!(repo.delete_by_pair("user", "u1", "group", "g1").await.unwrap());
    assert!(!repo.delete_by_pair("user", "u1", "group", "g1").await.unwrap());

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_state_and_history_round_trip() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let conn = db.shared();
    let states = FollowableStateRepository::new(conn.clone());
    let history = FollowedHistoryRepository::new(conn);

    assert!(states.ensure("s1".to_string(), "group", "g1").await.unwrap());
    assert!(!states.ensure("s2".to_string(), "group", "g1").await.unwrap());
    FollowableStateRepository::update_lists_in(&db.conn, "group", "g1", &["user".to_string()], &[])
        .await
        .unwrap();
    let row = states.find("group", "g1").await.unwrap().unwrap();
    assert_eq!(row.id, "s1");
    assert_eq!(row.cannot_followed, serde_json::json!(["user"]));
    assert!(row.updated_at.is_some());

    history.append("group", "g1", "user", "u2").await.unwrap();
    history.append("group", "g1", "user", "u1").await.unwrap();
    let entries = history.find_by_followee("group", "g1").await.unwrap();
    let followers: Vec<_> = entries.iter().map(|e| e.follower_id.as_str()).collect();
    assert_eq!(followers, vec!["u2", "u1"]);

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_delete_involving_removes_both_directions() {
    let db = TestDatabase::create_unique().await.expect("Failed to create database");
    let repo = FollowRepository::new(db.shared());

    repo.insert_if_absent(edge("e1", "u1", "g1")).await.unwrap();
    repo.insert_if_absent(edge("e2", "u2", "g1")).await.unwrap();
    repo.insert_if_absent(edge("e3", "u1", "g2")).await.unwrap();

    let removed = FollowRepository::delete_involving_in(&db.conn, "group", "g1")
        .await
        .unwrap();
    assert_eq!(removed, 2);
    assert_eq!(repo.count_by_follower("user", "u1").await.unwrap(), 1);

    db.drop_database().await.expect("Failed to drop database");
}

#[tokio::test]
#[ignore = "requires running PostgreSQL instance"]
async fn test_database_cleanup() {
    let db = TestDatabase::new().await.expect("Failed to connect");
    let result = db.cleanup().await;
    assert!(result.is_ok(), "Cleanup failed: {:?}", result.err());
}

#[test]
fn test_config_from_env() {
    let config = TestDbConfig::default();
    assert!(!config.host.is_empty());
    assert!(config.port > 0);
    assert!(!config.username.is_empty());
    assert!(!config.database.is_empty());
}

#[test]
fn test_postgres_url_format() {
    let config = TestDbConfig::default();
    let url = config.postgres_url();
    assert!(url.ends_with("/postgres"));
}
