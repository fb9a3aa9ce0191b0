//! Connection integration tests.
//!
//! Tests startup, address resolution and reconnection against a real server.

use std::sync::Arc;
use std::time::Duration;

use db_gateway::config::{GatewayConfig, GatewayOptions};
use db_gateway::db::{PgConnector, PostgresConnection};
use db_gateway::{Gateway, GatewayError};
use sqlx::Connection;

/// Helper to get test database URL from environment.
fn get_test_database_url() -> Option<String> {
    std::env::var("DATABASE_URL").ok()
}

fn config_for(url: &str) -> GatewayConfig {
    let mut config = GatewayConfig::default();
    config.database.url = Some(url.to_string());
    config
}

#[tokio::test]
async fn test_connect_resolves_address() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let gateway = Gateway::connect(&config_for(&url)).await.unwrap();

    assert!(!gateway.database_host().is_empty());
    assert!(gateway.database_port() > 0);

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_connect_accepts_jdbc_prefix() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let gateway = Gateway::connect(&config_for(&format!("jdbc:{url}")))
        .await
        .unwrap();
    let row = gateway.execute_select("SELECT 1 AS x").await.unwrap().unwrap();
    assert_eq!(row.get("x"), Some("1"));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_closed_connection_is_restored() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let gateway = Gateway::connect(&config_for(&url)).await.unwrap();
    let host = gateway.database_host().to_string();
    let port = gateway.database_port();

    gateway.close().await.unwrap();

    let row = gateway.execute_select("SELECT 2 AS y").await.unwrap().unwrap();
    assert_eq!(row.get("y"), Some("2"));
    assert_eq!(gateway.guardian().reconnect_count(), 1);
    assert_eq!(gateway.database_host(), host);
    assert_eq!(gateway.database_port(), port);

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_terminated_backend_is_replaced() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let gateway = Gateway::connect(&config_for(&url)).await.unwrap();

    // Leaves the handle broken; the next probe has to notice.
    let _ = gateway
        .execute_select("SELECT pg_terminate_backend(pg_backend_pid())")
        .await;

    let row = gateway.execute_select("SELECT 1 AS x").await.unwrap().unwrap();
    assert_eq!(row.get("x"), Some("1"));
    assert!(gateway.guardian().reconnect_count() >= 1);

    gateway.close().await.unwrap();
}

#[tokio::test(flavor = "current_thread")]
async fn test_connect_with_invalid_port() {
    let result =
        Gateway::connect(&config_for("postgres://testuser@localhost:59999/testdb")).await;
    assert!(matches!(result, Err(GatewayError::Connection(_))));
}

#[tokio::test]
async fn test_connect_without_url_is_config_error() {
    let result = Gateway::connect(&GatewayConfig::default()).await;
    assert!(matches!(result, Err(GatewayError::Config(_))));
}

#[tokio::test]
async fn test_from_injected_connection() {
    let Some(url) = get_test_database_url() else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let pg = sqlx::PgConnection::connect(&url).await.unwrap();
    let connection = PostgresConnection::from_connection(pg, url.clone());
    let connector = Arc::new(PgConnector::new(Duration::from_secs(10)));
    let gateway =
        Gateway::from_connection(Box::new(connection), connector, GatewayOptions::default())
            .unwrap();

    let row = gateway.execute_select("SELECT 1 AS x").await.unwrap().unwrap();
    assert_eq!(row.get("x"), Some("1"));

    assert!(gateway.guardian().is_connected().await);
    gateway.close().await.unwrap();
}
