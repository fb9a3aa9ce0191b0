//! Query execution integration tests.
//!
//! Tests the four execution primitives and result materialization.

use db_gateway::config::GatewayConfig;
use db_gateway::db::Statement;
use db_gateway::{Gateway, Outcome, ParameterMap};

/// Helper to create a test gateway.
async fn get_test_gateway() -> Option<Gateway> {
    let url = std::env::var("DATABASE_URL").ok()?;
    let mut config = GatewayConfig::default();
    config.database.url = Some(url);
    Gateway::connect(&config).await.ok()
}

#[tokio::test]
async fn test_select_one() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let row = gateway.execute_select("SELECT 1 AS x").await.unwrap().unwrap();

    assert_eq!(row.len(), 1);
    assert_eq!(row.get("x"), Some("1"));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_select_no_rows_is_empty() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let row = gateway
        .execute_select("SELECT 1 AS x WHERE false")
        .await
        .unwrap();

    assert_eq!(row.map(|r| r.is_empty()), Some(true));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_select_many_rows_keeps_first() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let row = gateway
        .execute_select("SELECT n FROM generate_series(1, 5) AS n ORDER BY n")
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.get("n"), Some("1"));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_bad_update_is_swallowed() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    gateway
        .execute_update("INSERT INTO t VALUES (bad syntax")
        .await
        .unwrap();

    // The connection is still usable afterwards.
    let row = gateway.execute_select("SELECT 1 AS x").await.unwrap().unwrap();
    assert_eq!(row.get("x"), Some("1"));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_bad_select_is_absent() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let row = gateway
        .execute_select("SELECT * FROM nonexistent_table_xyz_123")
        .await
        .unwrap();
    assert!(row.is_none());

    let outcome = gateway
        .run(&Statement::select("SELECT * FROM nonexistent_table_xyz_123"))
        .await
        .unwrap();
    assert!(matches!(outcome, Outcome::Failed(msg) if msg.contains("does not exist")));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_update_then_prepared_select() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    gateway
        .execute_update(
            "CREATE TEMP TABLE gateway_bindings (id text PRIMARY KEY, owner text, created date)",
        )
        .await
        .unwrap();

    let insert = ParameterMap::new().with(1, "binding-1").with(2, "broker");
    gateway
        .execute_prepared_update(
            "INSERT INTO gateway_bindings (id, owner, created) VALUES ($1, $2, DATE '2024-03-01')",
            Some(&insert),
        )
        .await
        .unwrap();

    let lookup = ParameterMap::new().with(1, "binding-1");
    let row = gateway
        .execute_prepared_select(
            "SELECT owner, created FROM gateway_bindings WHERE id = $1",
            Some(&lookup),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.get("owner"), Some("broker"));
    assert_eq!(row.get("created"), Some("2024-03-01"));

    let missing = ParameterMap::new().with(1, "binding-2");
    let row = gateway
        .execute_prepared_select(
            "SELECT owner FROM gateway_bindings WHERE id = $1",
            Some(&missing),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(row.is_empty());

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_run_reports_rows_affected() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    gateway
        .execute_update("CREATE TEMP TABLE gateway_counts (n int)")
        .await
        .unwrap();

    let outcome = gateway
        .run(&Statement::update(
            "INSERT INTO gateway_counts SELECT generate_series(1, 3)",
        ))
        .await
        .unwrap();

    assert_eq!(outcome, Outcome::Applied { rows_affected: 3 });

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_values_are_stringified() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    let row = gateway
        .execute_select(
            "SELECT 2.5::float8 AS ratio, true AS flag, NULL::int AS nothing, \
             TIMESTAMP '2024-03-01 12:30:00' AS at, '\\x0a0b'::bytea AS blob",
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(row.get("ratio"), Some("2.5"));
    assert_eq!(row.get("flag"), Some("t"));
    assert!(row.is_null("nothing"));
    assert_eq!(row.get("at"), Some("2024-03-01 12:30:00"));
    assert_eq!(row.get("blob"), Some("\\x0a0b"));

    gateway.close().await.unwrap();
}

#[tokio::test]
async fn test_prepared_and_plain_selects_render_alike() {
    let Some(gateway) = get_test_gateway().await else {
        eprintln!("Skipping test: DATABASE_URL not set");
        return;
    };

    // Binary results are rendered with these settings in mind
    gateway
        .execute_update(
            "SET TimeZone = 'UTC'; SET DateStyle = 'ISO, MDY'; \
             SET IntervalStyle = 'postgres'; SET lc_monetary = 'C'; \
             SET extra_float_digits = 1",
        )
        .await
        .unwrap();

    let expressions = [
        "ARRAY[1, 2]",
        "ARRAY['a b', NULL, 'c']::text[]",
        "ARRAY[true, false]",
        "ARRAY[1.5, 2]::float8[]",
        "ARRAY[DATE '2024-03-01']",
        "interval '1 day'",
        "interval '1 year 2 months 3 days 04:05:06.5'",
        "interval '-1 day +01:00:00'",
        "'10.0.0.1'::inet",
        "'192.168.1.5/24'::inet",
        "'10.0.0.0/8'::cidr",
        "'::1'::inet",
        "'08:00:2b:01:02:03'::macaddr",
        "'12:00:00+02'::timetz",
        "12.50::money",
        "TIMESTAMPTZ '2024-03-01 12:34:56.5+00'",
        "TIMESTAMP '2024-03-01 12:34:56.789'",
        "TIME '04:05:06.5'",
        "DATE '2024-03-01'",
        "1e20::float8",
        "1.5e-5::float8",
        "0.1::float4",
        "'NaN'::float8",
        "1.50::numeric",
        "42::int2",
        "7::oid",
        "'{\"a\": [1, 2]}'::jsonb",
        "'{\"a\":1}'::json",
        "'4a1f2c3e-0000-4000-8000-000000000001'::uuid",
        "'\\xdead'::bytea",
    ];

    for expression in expressions {
        let query = format!("SELECT {expression} AS v");

        let plain = gateway.execute_select(&query).await.unwrap().unwrap();
        let prepared = gateway
            .execute_prepared_select(&query, Some(&ParameterMap::new()))
            .await
            .unwrap()
            .unwrap();

        assert!(plain.get("v").is_some(), "{expression} rendered as NULL");
        assert_eq!(prepared.get("v"), plain.get("v"), "{expression}");
    }

    gateway.close().await.unwrap();
}
