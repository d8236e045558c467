//! Backend capability used by [`SingleConnection`](crate::SingleConnection)

use std::future::Future;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{ConnectionParams, PoolLimits, Result};

/// A decoded result row, keyed by column name in select order
pub type JsonRow = IndexMap<String, JsonValue>;

/// Result returned from write operations (e.g. INSERT, UPDATE, DELETE).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteQueryResult {
   /// The number of rows affected by the write operation.
   pub rows_affected: u64,
   /// The last generated id (MySQL `LAST_INSERT_ID()`, SQLite ROWID).
   ///
   /// Zero when the statement did not generate one. MySQL reports an
   /// unsigned id; values above `i64::MAX` (only reachable with
   /// `BIGINT UNSIGNED` keys) are clamped to `i64::MAX`.
   pub last_insert_id: i64,
}

/// A database connector the single-connection wrapper can drive.
///
/// Implementations own the wire protocol (through sqlx); the wrapper only
/// sequences calls and tracks the connection lifecycle. Errors from the
/// connector are returned as [`Error::Sqlx`](crate::Error::Sqlx) without
/// translation.
pub trait Backend: Send + Sync {
   /// Live connection handle
   type Connection: Send;

   /// Pool limits of this backend
   const LIMITS: PoolLimits;

   /// Human-readable backend name
   fn name(&self) -> &'static str {
      Self::LIMITS.backend
   }

   /// Parameters merged beneath every caller-supplied parameter map
   fn default_params(&self) -> ConnectionParams {
      ConnectionParams::new()
   }

   /// Open a new connection from `params`.
   fn connect(
      &self,
      params: &ConnectionParams,
   ) -> impl Future<Output = Result<Self::Connection>> + Send;

   /// Gracefully close a connection.
   fn close(&self, conn: Self::Connection) -> impl Future<Output = Result<()>> + Send;

   /// Release a connection that is being dropped without an explicit close.
   ///
   /// Must not panic. The default drops the handle, which closes the socket.
   fn close_on_drop(&self, conn: Self::Connection) {
      drop(conn);
   }

   /// Execute `sql` inside a transaction and commit it.
   ///
   /// The transaction is rolled back and released if execution fails.
   fn execute(
      &self,
      conn: &mut Self::Connection,
      sql: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<WriteQueryResult>> + Send;

   /// Execute `sql` and return its first row, if any.
   fn fetch_optional(
      &self,
      conn: &mut Self::Connection,
      sql: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<Option<JsonRow>>> + Send;

   /// Execute `sql` and return all rows.
   fn fetch_all(
      &self,
      conn: &mut Self::Connection,
      sql: &str,
      values: Vec<JsonValue>,
   ) -> impl Future<Output = Result<Vec<JsonRow>>> + Send;

   /// Server (or library) version string.
   fn server_info(
      &self,
      conn: &mut Self::Connection,
   ) -> impl Future<Output = Result<String>> + Send;
}
