//! SQLite backend

use std::time::Duration;

use serde_json::Value as JsonValue;
use sqlx::query::Query;
use sqlx::sqlite::{
   Sqlite, SqliteArguments, SqliteConnectOptions, SqliteConnection, SqliteJournalMode, SqliteRow,
};
use sqlx::{ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use tracing::debug;

use crate::decode::{blob_to_json, decode_row, float_to_json, try_decode};
use crate::params::{param_bool, param_str, param_u64, unsupported_param};
use crate::{Backend, ConnectionParams, Error, JsonRow, PoolLimits, Result, WriteQueryResult};

/// SQLite connector backed by `sqlx::SqliteConnection`.
///
/// Recognized connection parameters: `database` / `filename` (path or
/// `:memory:`), `create_if_missing`, `read_only`, `foreign_keys`,
/// `busy_timeout_ms`, `journal_mode`, `statement_cache_capacity`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SqliteBackend;

impl Backend for SqliteBackend {
   type Connection = SqliteConnection;

   const LIMITS: PoolLimits = PoolLimits::SQLITE;

   fn default_params(&self) -> ConnectionParams {
      ConnectionParams::new()
         .with("database", ":memory:")
         .with("create_if_missing", true)
   }

   async fn connect(&self, params: &ConnectionParams) -> Result<SqliteConnection> {
      let options = connect_options(params)?;
      debug!(
         "Opening SQLite database: {}",
         params.get_str("database").unwrap_or(":memory:")
      );
      Ok(options.connect().await?)
   }

   async fn close(&self, conn: SqliteConnection) -> Result<()> {
      conn.close().await?;
      Ok(())
   }

   async fn execute(
      &self,
      conn: &mut SqliteConnection,
      sql: &str,
      values: Vec<JsonValue>,
   ) -> Result<WriteQueryResult> {
      // Dropping the transaction guard on an error path rolls it back
      let mut tx = conn.begin().await?;

      let mut q = sqlx::query(sql);
      for value in values {
         q = bind_value(q, value);
      }

      let result = q.execute(&mut *tx).await?;
      tx.commit().await?;

      Ok(WriteQueryResult {
         rows_affected: result.rows_affected(),
         last_insert_id: result.last_insert_rowid(),
      })
   }

   async fn fetch_optional(
      &self,
      conn: &mut SqliteConnection,
      sql: &str,
      values: Vec<JsonValue>,
   ) -> Result<Option<JsonRow>> {
      let mut q = sqlx::query(sql);
      for value in values {
         q = bind_value(q, value);
      }

      let row = q.fetch_optional(&mut *conn).await?;
      row.map(|row| decode_row(&row, to_json)).transpose()
   }

   async fn fetch_all(
      &self,
      conn: &mut SqliteConnection,
      sql: &str,
      values: Vec<JsonValue>,
   ) -> Result<Vec<JsonRow>> {
      let mut q = sqlx::query(sql);
      for value in values {
         q = bind_value(q, value);
      }

      let rows = q.fetch_all(&mut *conn).await?;
      rows.iter().map(|row| decode_row(row, to_json)).collect()
   }

   async fn server_info(&self, conn: &mut SqliteConnection) -> Result<String> {
      let version = sqlx::query_scalar::<_, String>("SELECT sqlite_version()")
         .fetch_one(&mut *conn)
         .await?;
      Ok(format!("SQLite {version}"))
   }
}

fn connect_options(
   params: &ConnectionParams,
) -> std::result::Result<SqliteConnectOptions, sqlx::Error> {
   let mut options = SqliteConnectOptions::new();

   for (key, value) in params.iter() {
      if value.is_null() {
         continue;
      }

      options = match key.as_str() {
         // SQLite itself treats the name ":memory:" as a private in-memory database
         "database" | "filename" => options.filename(param_str(key, value)?),
         "create_if_missing" => options.create_if_missing(param_bool(key, value)?),
         "read_only" => options.read_only(param_bool(key, value)?),
         "foreign_keys" => options.foreign_keys(param_bool(key, value)?),
         "busy_timeout_ms" => options.busy_timeout(Duration::from_millis(param_u64(key, value)?)),
         "journal_mode" => {
            options.journal_mode(param_str(key, value)?.parse::<SqliteJournalMode>()?)
         }
         "statement_cache_capacity" => {
            let capacity = usize::try_from(param_u64(key, value)?).unwrap_or(usize::MAX);
            options.statement_cache_capacity(capacity)
         }
         _ => return Err(unsupported_param("SQLite", key)),
      };
   }

   Ok(options)
}

/// Helper function to bind a JSON value to a SQLite query
fn bind_value<'a>(
   query: Query<'a, Sqlite, SqliteArguments<'a>>,
   value: JsonValue,
) -> Query<'a, Sqlite, SqliteArguments<'a>> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding as i64 when possible
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            // Too large for SQLite's INTEGER, falls back to REAL
            query.bind(uint_val as f64)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      JsonValue::String(s) => query.bind(s),
      other => query.bind(other.to_string()),
   }
}

fn to_json(row: &SqliteRow, index: usize) -> Result<JsonValue> {
   let raw = row.try_get_raw(index)?;
   if raw.is_null() {
      return Ok(JsonValue::Null);
   }
   let type_name = raw.type_info().name().to_string();

   if let Some(v) = try_decode::<_, i64>(row, index) {
      return Ok(v.into());
   }
   if let Some(v) = try_decode::<_, f64>(row, index) {
      return Ok(float_to_json(v));
   }
   if let Some(v) = try_decode::<_, String>(row, index) {
      return Ok(JsonValue::String(v));
   }
   if let Some(v) = try_decode::<_, Vec<u8>>(row, index) {
      return Ok(blob_to_json(&v));
   }

   // Declared types like DATETIME or NUMERIC still hold text
   row.try_get_unchecked::<String, _>(index)
      .map(JsonValue::String)
      .map_err(|_| Error::UnsupportedDatatype(type_name))
}
