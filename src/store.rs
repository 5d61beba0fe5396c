//! ==============================================================================
//! store.rs - telemetry table access
//! ==============================================================================
//!
//! purpose:
//!     the one query behind `/api/get-newest-temp`:
//!
//! ```text
//!         SELECT * FROM "<table>" ORDER BY "time" DESC LIMIT 1
//!
//!     the row is handed back as a json object, one key per column, so any
//!     schema-defined columns (ids, extra sensors) pass through untouched.
//! ```
//!
//! column mapping:
//!     bool/int/float  -> json bool/number
//!     text/varchar    -> string
//!     timestamp(tz)   -> rfc 3339 string (naive timestamps are taken as utc)
//!     bytea           -> base64 string
//!     json/jsonb      -> embedded json
//!     anything else   -> null (logged at debug)
//!
//! ==============================================================================

use crate::error::StoreError;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls, Row};

pub type TelemetryRow = Map<String, Value>;

#[async_trait]
pub trait TelemetryStore: Send + Sync {
    /// most recent row by `time`, `None` for an empty table
    async fn newest_row(&self) -> Result<Option<TelemetryRow>, StoreError>;
}

/// `[A-Za-z_][A-Za-z0-9_]*`, the only table names we splice into sql
pub fn is_sql_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// postgres-backed store; connects lazily and reconnects after a failure
pub struct PgStore {
    url: String,
    query: String,
    client: Mutex<Option<Arc<Client>>>,
}

impl PgStore {
    pub fn new(url: impl Into<String>, table: &str) -> Result<Self, StoreError> {
        if !is_sql_identifier(table) {
            return Err(StoreError::InvalidTable(table.to_string()));
        }
        Ok(Self {
            url: url.into(),
            query: format!(r#"SELECT * FROM "{}" ORDER BY "time" DESC LIMIT 1"#, table),
            client: Mutex::new(None),
        })
    }

    async fn client(&self) -> Result<Arc<Client>, StoreError> {
        let mut guard = self.client.lock().await;
        if let Some(client) = guard.as_ref().filter(|c| !c.is_closed()) {
            return Ok(client.clone());
        }

        let (client, connection) = tokio_postgres::connect(&self.url, NoTls)
            .await
            .map_err(|e| StoreError::Connect(e.to_string()))?;
        tokio::spawn(async move {
            if let Err(e) = connection.await {
                tracing::warn!("[DB] ⚠ connection closed: {}", e);
            }
        });
        tracing::info!("[DB] ✓ connected");

        let client = Arc::new(client);
        *guard = Some(client.clone());
        Ok(client)
    }
}

#[async_trait]
impl TelemetryStore for PgStore {
    async fn newest_row(&self) -> Result<Option<TelemetryRow>, StoreError> {
        let client = self.client().await?;
        let row = client.query_opt(self.query.as_str(), &[]).await?;
        row.map(|r| row_to_json(&r)).transpose().map_err(StoreError::from)
    }
}

fn row_to_json(row: &Row) -> Result<TelemetryRow, tokio_postgres::Error> {
    let mut object = Map::new();
    for (idx, column) in row.columns().iter().enumerate() {
        object.insert(column.name().to_string(), column_value(row, idx, column.type_())?);
    }
    Ok(object)
}

fn column_value(row: &Row, idx: usize, ty: &Type) -> Result<Value, tokio_postgres::Error> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx)?.map(Value::from),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx)?.map(Value::from),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx)?.map(Value::from),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx)?.map(Value::from),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx)?.map(|v| Value::from(v as f64)),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx)?.map(Value::from),
        Type::TEXT | Type::VARCHAR | Type::BPCHAR | Type::NAME => {
            row.try_get::<_, Option<String>>(idx)?.map(Value::from)
        }
        Type::TIMESTAMPTZ => row
            .try_get::<_, Option<DateTime<Utc>>>(idx)?
            .map(|t| Value::from(format_time(t))),
        Type::TIMESTAMP => row
            .try_get::<_, Option<NaiveDateTime>>(idx)?
            .map(|t| Value::from(format_time(t.and_utc()))),
        Type::BYTEA => row
            .try_get::<_, Option<Vec<u8>>>(idx)?
            .map(|bytes| Value::from(STANDARD.encode(bytes))),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx)?,
        _ => {
            tracing::debug!("[DB] column {} has unsupported type {}, sent as null", idx, ty);
            None
        }
    };
    Ok(value.unwrap_or(Value::Null))
}

fn format_time(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Millis, true)
}
