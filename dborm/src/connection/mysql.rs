//! MySQL connections via sqlx

use chrono::NaiveDateTime;
use once_cell::sync::OnceCell;
use sqlx::{
    mysql::{MySqlArguments, MySqlRow},
    query::Query,
    Column, MySql, MySqlPool, Row, Transaction, TypeInfo, ValueRef,
};
use tokio::sync::Mutex;

use super::{Connection, Record};
use crate::error::{Error, Result};
use crate::query::Statement;
use crate::value::Value;

/// A transaction usable as a per-call connection override
///
/// The mutex serialises statements onto the single transaction connection.
/// Commit or roll back with `tx.into_inner().commit().await`.
///
/// ```rust,ignore
/// let tx = TxConnection::new(pool.begin().await?);
/// Repo::with_conn("accounts", &tx).update(&wheres, data).await?;
/// Repo::with_conn("ledger", &tx).insert(&entry).await?;
/// tx.into_inner().commit().await?;
/// ```
pub type TxConnection = Mutex<Transaction<'static, MySql>>;

static DEFAULT_DB: OnceCell<MySqlPool> = OnceCell::new();

/// Install the process-wide default connection
///
/// Called once at startup. Every [`Repo::new`](crate::Repo::new) afterwards
/// binds to this pool.
pub fn set_db(pool: MySqlPool) -> Result<()> {
    DEFAULT_DB
        .set(pool)
        .map_err(|_| Error::AlreadyInitialized)?;
    tracing::info!("Default database connection installed");
    Ok(())
}

/// The process-wide default connection
pub fn db() -> Result<&'static MySqlPool> {
    DEFAULT_DB.get().ok_or(Error::NotInitialized)
}

impl Connection for MySqlPool {
    async fn fetch_all(&self, stmt: &Statement) -> Result<Vec<Record>> {
        let rows = build(stmt).fetch_all(self).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&self, stmt: &Statement) -> Result<u64> {
        let result = build(stmt).execute(self).await?;
        Ok(result.rows_affected())
    }
}

impl Connection for TxConnection {
    async fn fetch_all(&self, stmt: &Statement) -> Result<Vec<Record>> {
        let mut tx = self.lock().await;
        let rows = build(stmt).fetch_all(&mut **tx).await?;
        rows.iter().map(row_to_record).collect()
    }

    async fn execute(&self, stmt: &Statement) -> Result<u64> {
        let mut tx = self.lock().await;
        let result = build(stmt).execute(&mut **tx).await?;
        Ok(result.rows_affected())
    }
}

fn build(stmt: &Statement) -> Query<'_, MySql, MySqlArguments> {
    stmt.binds
        .iter()
        .fold(sqlx::query(&stmt.sql), |query, value| bind(query, value))
}

fn bind<'q>(
    query: Query<'q, MySql, MySqlArguments>,
    value: &Value,
) -> Query<'q, MySql, MySqlArguments> {
    match value {
        Value::Null => query.bind(None::<String>),
        Value::Bool(b) => query.bind(*b),
        Value::Int(n) => query.bind(*n),
        Value::UInt(n) => query.bind(*n),
        Value::Float(n) => query.bind(*n),
        Value::String(s) => query.bind(s.clone()),
        Value::Bytes(b) => query.bind(b.clone()),
        Value::DateTime(dt) => query.bind(*dt),
        Value::List(_) | Value::Json(_) => query.bind(sqlx::types::Json(value.to_json())),
    }
}

fn row_to_record(row: &MySqlRow) -> Result<Record> {
    let mut record = Record::new();

    for column in row.columns() {
        let idx = column.ordinal();
        let value = if row.try_get_raw(idx)?.is_null() {
            serde_json::Value::Null
        } else {
            decode_column(row, idx, column.type_info().name())?
        };
        record.insert(column.name().to_string(), value);
    }

    Ok(record)
}

fn decode_column(row: &MySqlRow, idx: usize, type_name: &str) -> Result<serde_json::Value> {
    use serde_json::Value as Json;

    let value = match type_name {
        "BOOLEAN" => Json::from(row.try_get_unchecked::<bool, _>(idx)?),
        t if t.ends_with("UNSIGNED") => Json::from(row.try_get_unchecked::<u64, _>(idx)?),
        "TINYINT" | "SMALLINT" | "MEDIUMINT" | "INT" | "BIGINT" | "YEAR" => {
            Json::from(row.try_get_unchecked::<i64, _>(idx)?)
        }
        "FLOAT" => Json::from(f64::from(row.try_get_unchecked::<f32, _>(idx)?)),
        "DOUBLE" => Json::from(row.try_get_unchecked::<f64, _>(idx)?),
        "DATETIME" | "TIMESTAMP" => {
            serde_json::to_value(row.try_get_unchecked::<NaiveDateTime, _>(idx)?)?
        }
        "DATE" => serde_json::to_value(row.try_get_unchecked::<chrono::NaiveDate, _>(idx)?)?,
        "TIME" => serde_json::to_value(row.try_get_unchecked::<chrono::NaiveTime, _>(idx)?)?,
        "JSON" => row.try_get_unchecked::<Json, _>(idx)?,
        "BINARY" | "VARBINARY" | "TINYBLOB" | "BLOB" | "MEDIUMBLOB" | "LONGBLOB" | "BIT"
        | "GEOMETRY" => Value::Bytes(row.try_get_unchecked::<Vec<u8>, _>(idx)?).to_json(),
        // DECIMAL, CHAR, VARCHAR, TEXT, ENUM, SET
        _ => Json::String(row.try_get_unchecked::<String, _>(idx)?),
    };

    Ok(value)
}
