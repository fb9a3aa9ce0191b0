//! PostgreSQL connection implementation.
//!
//! Provides `PostgresConnection`, a `DatabaseConnection` backed by a single
//! sqlx `PgConnection`, and `PgConnector`, which opens them.

use super::text;
use crate::connection::address::{bare_connection_string, redact, DatabaseAddress};
use crate::db::{ColumnInfo, Connector, DatabaseConnection, RawRow, Statement, Value};
use crate::error::{GatewayError, Result};
use async_trait::async_trait;
use sqlx::error::BoxDynError;
use sqlx::postgres::types::{Oid, PgInterval, PgMoney, PgTimeTz};
use sqlx::postgres::{PgConnection, PgRow, PgTypeKind, PgValueFormat, PgValueRef};
use sqlx::types::chrono::{FixedOffset, NaiveDate, NaiveTime};
use sqlx::types::{Decimal, Uuid};
use sqlx::{
    Column as SqlxColumn, Connection, Decode, Executor, Postgres, Row as SqlxRow, Type, TypeInfo,
    ValueRef,
};
use std::time::Duration;
use tracing::{debug, warn};

/// Opens `PostgresConnection`s.
#[derive(Debug, Clone)]
pub struct PgConnector {
    connect_timeout: Duration,
}

impl PgConnector {
    /// Creates a connector that gives up after `connect_timeout`.
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout }
    }
}

#[async_trait]
impl Connector for PgConnector {
    async fn connect(&self, connection_string: &str) -> Result<Box<dyn DatabaseConnection>> {
        let connection =
            PostgresConnection::connect(connection_string, self.connect_timeout).await?;
        Ok(Box::new(connection))
    }
}

/// A single PostgreSQL connection.
#[derive(Debug)]
pub struct PostgresConnection {
    conn: PgConnection,
    connection_string: String,
}

impl PostgresConnection {
    /// Opens a connection. A leading `jdbc:` prefix is accepted and stripped.
    pub async fn connect(connection_string: &str, timeout: Duration) -> Result<Self> {
        let url = bare_connection_string(connection_string);
        debug!("Opening database connection to {}", redact(url));

        let conn = tokio::time::timeout(timeout, PgConnection::connect(url))
            .await
            .map_err(|_| {
                GatewayError::connection(format!(
                    "Connection to {} timed out after {:?}",
                    describe_target(url),
                    timeout
                ))
            })?
            .map_err(|e| map_connection_error(e, url))?;

        Ok(Self {
            conn,
            connection_string: connection_string.to_string(),
        })
    }

    /// Wraps an already open connection.
    pub fn from_connection(conn: PgConnection, connection_string: impl Into<String>) -> Self {
        Self {
            conn,
            connection_string: connection_string.into(),
        }
    }
}

#[async_trait]
impl DatabaseConnection for PostgresConnection {
    fn connection_string(&self) -> Result<String> {
        Ok(self.connection_string.clone())
    }

    async fn ping(&mut self) -> Result<()> {
        self.conn
            .ping()
            .await
            .map_err(|e| GatewayError::connection(e.to_string()))
    }

    async fn execute(&mut self, statement: &Statement<'_>) -> Result<u64> {
        let result = match &statement.binds {
            None => (&mut self.conn).execute(sqlx::raw_sql(statement.sql)).await,
            Some(binds) => {
                let mut query = sqlx::query(statement.sql);
                for value in binds {
                    query = query.bind(*value);
                }
                query.execute(&mut self.conn).await
            }
        };

        result
            .map(|r| r.rows_affected())
            .map_err(|e| GatewayError::query(format_query_error(e)))
    }

    async fn fetch_first(&mut self, statement: &Statement<'_>) -> Result<Option<RawRow>> {
        let row = match &statement.binds {
            None => {
                (&mut self.conn)
                    .fetch_optional(sqlx::raw_sql(statement.sql))
                    .await
            }
            Some(binds) => {
                let mut query = sqlx::query(statement.sql);
                for value in binds {
                    query = query.bind(*value);
                }
                query.fetch_optional(&mut self.conn).await
            }
        }
        .map_err(|e| GatewayError::query(format_query_error(e)))?;

        Ok(row.as_ref().map(convert_row))
    }

    async fn close(self: Box<Self>) -> Result<()> {
        self.conn
            .close()
            .await
            .map_err(|e| GatewayError::connection(e.to_string()))
    }
}

/// Converts a sqlx PgRow to a RawRow.
fn convert_row(row: &PgRow) -> RawRow {
    let columns = row
        .columns()
        .iter()
        .map(|col| ColumnInfo::new(col.name(), col.type_info().name()))
        .collect();

    let values = (0..row.len()).map(|i| convert_value(row, i)).collect();

    RawRow { columns, values }
}

/// Converts a single column value from a PgRow to our Value type.
///
/// Text-format values (simple query protocol) already carry the server's
/// rendering and are taken verbatim. Binary-format values are decoded by type
/// and rendered the way the server would print them; a type with no known
/// rendering is logged and kept as its raw bytes.
fn convert_value(row: &PgRow, index: usize) -> Value {
    let raw = match row.try_get_raw(index) {
        Ok(raw) => raw,
        Err(e) => {
            warn!("Could not read column {}: {}", index, e);
            return Value::Null;
        }
    };
    if raw.is_null() {
        return Value::Null;
    }

    if matches!(raw.format(), PgValueFormat::Text) {
        return raw
            .as_str()
            .map(|text| Value::String(text.to_string()))
            .unwrap_or(Value::Null);
    }

    let type_name = raw.type_info().name().to_uppercase();
    let decoded = match type_name.strip_suffix("[]") {
        Some(element) => decode_array(row, index, element),
        None => decode_scalar(row, &raw, index, &type_name),
    };

    decoded.unwrap_or_else(|e| {
        warn!(
            "Could not render column {} of type {} as text, returning its binary form: {}",
            index, type_name, e
        );
        Value::Bytes(raw.as_bytes().map(<[u8]>::to_vec).unwrap_or_default())
    })
}

type Decoded = std::result::Result<Value, BoxDynError>;

fn decode_scalar(row: &PgRow, raw: &PgValueRef<'_>, index: usize, type_name: &str) -> Decoded {
    let value = match type_name {
        "BOOL" => Value::Bool(row.try_get(index)?),
        "INT2" => Value::Int(row.try_get::<i16, _>(index)?.into()),
        "INT4" => Value::Int(row.try_get::<i32, _>(index)?.into()),
        "INT8" => Value::Int(row.try_get(index)?),
        "OID" => Value::Int(row.try_get::<Oid, _>(index)?.0.into()),
        "FLOAT4" => Value::String(text::float4(row.try_get(index)?)),
        "FLOAT8" => Value::Float(row.try_get(index)?),
        "NUMERIC" => Value::String(row.try_get::<Decimal, _>(index)?.to_string()),
        "MONEY" => Value::String(text::money(row.try_get::<PgMoney, _>(index)?.0)),
        "BYTEA" => Value::Bytes(row.try_get(index)?),
        "UUID" => Value::String(row.try_get::<Uuid, _>(index)?.to_string()),
        "DATE" => Value::String(row.try_get::<NaiveDate, _>(index)?.to_string()),
        "TIME" => Value::String(text::time(row.try_get(index)?)),
        "TIMETZ" => {
            let value: PgTimeTz<NaiveTime, FixedOffset> = row.try_get(index)?;
            Value::String(text::time_tz(value.time, value.offset))
        }
        "TIMESTAMP" => Value::String(text::timestamp(row.try_get(index)?)),
        "TIMESTAMPTZ" => Value::String(text::timestamp_utc(row.try_get(index)?)),
        "INTERVAL" => {
            let value: PgInterval = row.try_get(index)?;
            Value::String(text::interval(value.months, value.days, value.microseconds))
        }
        "INET" | "CIDR" => Value::String(
            text::inet(raw.as_bytes()?, type_name == "CIDR").ok_or("malformed network address")?,
        ),
        "MACADDR" => Value::String(text::macaddr(raw.as_bytes()?).ok_or("malformed macaddr")?),
        // jsonb is sent as a version byte followed by its text form
        "JSONB" => match raw.as_bytes()?.split_first() {
            Some((&1, body)) => Value::String(std::str::from_utf8(body)?.to_string()),
            _ => return Err("unsupported jsonb format version".into()),
        },
        // Sent as their text form
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" | "CITEXT" | "JSON" | "XML" | "UNKNOWN" => {
            Value::String(raw.as_str()?.to_string())
        }
        _ if matches!(raw.type_info().kind(), PgTypeKind::Enum(_)) => {
            Value::String(raw.as_str()?.to_string())
        }
        _ => return Err(format!("no text rendering for binary {type_name}").into()),
    };
    Ok(value)
}

fn decode_array(row: &PgRow, index: usize, element: &str) -> Decoded {
    match element {
        "BOOL" => array_of(row, index, Value::Bool),
        "INT2" => array_of(row, index, |v: i16| Value::Int(v.into())),
        "INT4" => array_of(row, index, |v: i32| Value::Int(v.into())),
        "INT8" => array_of(row, index, Value::Int),
        "FLOAT4" => array_of(row, index, |v: f32| Value::String(text::float4(v))),
        "FLOAT8" => array_of(row, index, Value::Float),
        "NUMERIC" => array_of(row, index, |v: Decimal| Value::String(v.to_string())),
        "BYTEA" => array_of(row, index, Value::Bytes),
        "TEXT" | "VARCHAR" | "CHAR" | "BPCHAR" | "NAME" => array_of(row, index, Value::String),
        "UUID" => array_of(row, index, |v: Uuid| Value::String(v.to_string())),
        "DATE" => array_of(row, index, |v: NaiveDate| Value::String(v.to_string())),
        "TIMESTAMP" => array_of(row, index, |v| Value::String(text::timestamp(v))),
        "TIMESTAMPTZ" => array_of(row, index, |v| Value::String(text::timestamp_utc(v))),
        _ => Err(format!("no text rendering for binary {element}[]").into()),
    }
}

fn array_of<T>(row: &PgRow, index: usize, to_value: impl Fn(T) -> Value) -> Decoded
where
    Vec<Option<T>>: for<'r> Decode<'r, Postgres> + Type<Postgres>,
{
    let items: Vec<Option<T>> = row.try_get(index)?;
    let rendered = items
        .into_iter()
        .map(|item| item.map(&to_value).and_then(|value| value.to_text()));
    Ok(Value::String(text::array(rendered)))
}

fn describe_target(url: &str) -> String {
    match DatabaseAddress::parse(url) {
        Ok(address) => format!("{}:{}", address.host(), address.port()),
        Err(_) => "database".to_string(),
    }
}

/// Maps sqlx connection errors to readable messages.
fn map_connection_error(error: sqlx::Error, url: &str) -> GatewayError {
    let target = describe_target(url);
    let error_str = error.to_string().to_lowercase();

    if error_str.contains("connection refused") || error_str.contains("could not connect") {
        GatewayError::connection(format!(
            "Cannot connect to {target}. Check that the server is running."
        ))
    } else if error_str.contains("password authentication failed")
        || error_str.contains("authentication failed")
    {
        GatewayError::connection(format!(
            "Authentication failed for {target}. Check your credentials."
        ))
    } else if error_str.contains("does not exist") && error_str.contains("database") {
        GatewayError::connection(format!("Database on {target} does not exist: {error}"))
    } else if error_str.contains("timed out") || error_str.contains("timeout") {
        GatewayError::connection(format!(
            "Connection to {target} timed out. The server may be overloaded or unreachable."
        ))
    } else {
        GatewayError::connection(error.to_string())
    }
}

/// Formats a query error with PostgreSQL detail and hint fields if available.
fn format_query_error(error: sqlx::Error) -> String {
    let Some(db_error) = error.as_database_error() else {
        return error.to_string();
    };

    let mut result = String::from("ERROR: ");
    result.push_str(db_error.message());

    if let Some(pg_error) = db_error.try_downcast_ref::<sqlx::postgres::PgDatabaseError>() {
        if let Some(detail) = pg_error.detail() {
            result.push_str("\n  DETAIL: ");
            result.push_str(detail);
        }

        if let Some(hint) = pg_error.hint() {
            result.push_str("\n  HINT: ");
            result.push_str(hint);
        }

        if let Some(table) = pg_error.table() {
            result.push_str("\n  TABLE: ");
            result.push_str(table);
        }

        if let Some(constraint) = pg_error.constraint() {
            result.push_str("\n  CONSTRAINT: ");
            result.push_str(constraint);
        }
    }

    result
}
