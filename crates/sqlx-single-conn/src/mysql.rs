//! MySQL backend

use serde_json::Value as JsonValue;
use sqlx::mysql::{
   MySql, MySqlArguments, MySqlConnectOptions, MySqlConnection, MySqlRow, MySqlSslMode,
};
use sqlx::query::Query;
use sqlx::{ConnectOptions, Connection, Row, TypeInfo, ValueRef};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use tracing::debug;

use crate::decode::{blob_to_json, decode_row, float_to_json, try_decode};
use crate::params::{param_bool, param_str, param_u16, param_u64, unsupported_param};
use crate::{Backend, ConnectionParams, Error, JsonRow, PoolLimits, Result, WriteQueryResult};

/// MySQL connector backed by `sqlx::MySqlConnection`.
///
/// Recognized connection parameters:
///
/// | key | value |
/// |-----|-------|
/// | `host` | string |
/// | `port` | integer or numeric string |
/// | `user` / `username` | string |
/// | `password` / `passwd` | string |
/// | `database` / `db` | string |
/// | `unix_socket` | path |
/// | `charset`, `collation` | string |
/// | `ssl_mode` | `disabled`, `preferred`, `required`, `verify_ca`, `verify_identity` |
/// | `ssl_disabled` | bool |
/// | `ssl_ca`, `ssl_cert`, `ssl_key` | path |
/// | `time_zone` | string |
/// | `statement_cache_capacity` | integer |
///
/// Any other key fails the connect with `sqlx::Error::Configuration`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlBackend;

impl Backend for MySqlBackend {
   type Connection = MySqlConnection;

   const LIMITS: PoolLimits = PoolLimits::MYSQL;

   fn default_params(&self) -> ConnectionParams {
      ConnectionParams::new()
         .with("host", "127.0.0.1")
         .with("port", 3306)
   }

   async fn connect(&self, params: &ConnectionParams) -> Result<MySqlConnection> {
      let options = connect_options(params)?;
      debug!(
         "Connecting to MySQL at {}:{}",
         params.get_str("host").unwrap_or("localhost"),
         params
            .get("port")
            .map(ToString::to_string)
            .unwrap_or_default()
      );
      Ok(options.connect().await?)
   }

   async fn close(&self, conn: MySqlConnection) -> Result<()> {
      conn.close().await?;
      Ok(())
   }

   async fn execute(
      &self,
      conn: &mut MySqlConnection,
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
         last_insert_id: insert_id_to_i64(result.last_insert_id()),
      })
   }

   async fn fetch_optional(
      &self,
      conn: &mut MySqlConnection,
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
      conn: &mut MySqlConnection,
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

   async fn server_info(&self, conn: &mut MySqlConnection) -> Result<String> {
      let version = sqlx::query_scalar::<_, String>("SELECT VERSION()")
         .fetch_one(&mut *conn)
         .await?;
      Ok(format!("MySQL {version}"))
   }
}

/// `LAST_INSERT_ID()` is unsigned; ids past `i64::MAX` saturate
fn insert_id_to_i64(id: u64) -> i64 {
   i64::try_from(id).unwrap_or(i64::MAX)
}

/// Map connection parameters onto sqlx connect options
fn connect_options(
   params: &ConnectionParams,
) -> std::result::Result<MySqlConnectOptions, sqlx::Error> {
   let mut options = MySqlConnectOptions::new();

   for (key, value) in params.iter() {
      if value.is_null() {
         continue;
      }

      options = match key.as_str() {
         "host" => options.host(param_str(key, value)?),
         "port" => options.port(param_u16(key, value)?),
         "user" | "username" => options.username(param_str(key, value)?),
         "password" | "passwd" => options.password(param_str(key, value)?),
         "database" | "db" => options.database(param_str(key, value)?),
         "unix_socket" => options.socket(param_str(key, value)?),
         "charset" => options.charset(param_str(key, value)?),
         "collation" => options.collation(param_str(key, value)?),
         "ssl_mode" => options.ssl_mode(param_str(key, value)?.parse::<MySqlSslMode>()?),
         "ssl_disabled" => {
            if param_bool(key, value)? {
               options.ssl_mode(MySqlSslMode::Disabled)
            } else {
               options
            }
         }
         "ssl_ca" => options.ssl_ca(param_str(key, value)?),
         "ssl_cert" => options.ssl_client_cert(param_str(key, value)?),
         "ssl_key" => options.ssl_client_key(param_str(key, value)?),
         "time_zone" => options.timezone(Some(param_str(key, value)?.to_owned())),
         "statement_cache_capacity" => {
            let capacity = usize::try_from(param_u64(key, value)?).unwrap_or(usize::MAX);
            options.statement_cache_capacity(capacity)
         }
         _ => return Err(unsupported_param("MySQL", key)),
      };
   }

   Ok(options)
}

/// Helper function to bind a JSON value to a MySQL query
fn bind_value<'q>(
   query: Query<'q, MySql, MySqlArguments>,
   value: JsonValue,
) -> Query<'q, MySql, MySqlArguments> {
   match value {
      JsonValue::Null => query.bind(None::<String>),
      JsonValue::Bool(b) => query.bind(b),
      JsonValue::Number(number) => {
         // Preserve integer precision by binding integers as integers
         if let Some(int_val) = number.as_i64() {
            query.bind(int_val)
         } else if let Some(uint_val) = number.as_u64() {
            query.bind(uint_val)
         } else {
            query.bind(number.as_f64().unwrap_or_default())
         }
      }
      JsonValue::String(s) => query.bind(s),
      // Arrays and objects are sent as JSON text
      other => query.bind(other.to_string()),
   }
}

/// Decode one MySQL column value to JSON
fn to_json(row: &MySqlRow, index: usize) -> Result<JsonValue> {
   let raw = row.try_get_raw(index)?;
   if raw.is_null() {
      return Ok(JsonValue::Null);
   }
   let type_name = raw.type_info().name().to_string();

   if let Some(v) = try_decode::<_, i64>(row, index) {
      return Ok(v.into());
   }
   if let Some(v) = try_decode::<_, u64>(row, index) {
      return Ok(v.into());
   }
   if let Some(v) = try_decode::<_, f64>(row, index) {
      return Ok(float_to_json(v));
   }
   if let Some(v) = try_decode::<_, f32>(row, index) {
      return Ok(float_to_json(f64::from(v)));
   }
   if let Some(v) = try_decode::<_, String>(row, index) {
      return Ok(JsonValue::String(v));
   }
   if let Some(v) = try_decode::<_, Vec<u8>>(row, index) {
      return Ok(blob_to_json(&v));
   }
   if let Some(v) = try_decode::<_, time::PrimitiveDateTime>(row, index) {
      let format = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
      if let Ok(s) = v.format(format) {
         return Ok(JsonValue::String(s));
      }
   }
   if let Some(v) = try_decode::<_, time::OffsetDateTime>(row, index)
      && let Ok(s) = v.format(&Rfc3339)
   {
      return Ok(JsonValue::String(s));
   }
   if let Some(v) = try_decode::<_, time::Date>(row, index) {
      let format = format_description!("[year]-[month]-[day]");
      if let Ok(s) = v.format(format) {
         return Ok(JsonValue::String(s));
      }
   }
   if let Some(v) = try_decode::<_, time::Time>(row, index) {
      let format = format_description!("[hour]:[minute]:[second]");
      if let Ok(s) = v.format(format) {
         return Ok(JsonValue::String(s));
      }
   }

   // DECIMAL and friends arrive as text on the wire
   row.try_get_unchecked::<String, _>(index)
      .map(JsonValue::String)
      .map_err(|_| Error::UnsupportedDatatype(type_name))
}
