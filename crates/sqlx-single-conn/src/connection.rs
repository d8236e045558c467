//! Single owned database connection

use std::fmt;

use tracing::{debug, warn};

use crate::{
   Backend, ConnectionParams, Error, JsonRow, QueryParams, Result, WriteQueryResult,
};

/// Lifecycle state of a [`SingleConnection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
   /// Only observable while the constructor is running
   Uninitialized,
   /// A live handle is held
   Connected,
   /// The handle was closed; `create_connection` may open a new one
   Closed,
}

impl fmt::Display for ConnectionState {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let s = match self {
         ConnectionState::Uninitialized => "uninitialized",
         ConnectionState::Connected => "connected",
         ConnectionState::Closed => "closed",
      };
      f.write_str(s)
   }
}

/// Exclusive owner of one live backend connection.
///
/// ## Lifecycle
///
/// ```text
/// connect() ──► Connected ──close_connection()──► Closed
///                   ▲                               │
///                   └──────create_connection()──────┘
/// ```
///
/// The connection is opened by the constructor; a failed connect fails
/// construction. `close_connection` is idempotent. If the wrapper is dropped
/// while still connected, the handle is passed to
/// [`Backend::close_on_drop`].
///
/// All operations take `&mut self`: a wrapper is used by one caller at a
/// time and does no internal locking.
pub struct SingleConnection<B: Backend> {
   backend: B,

   /// Merged parameters of the current (or last) connection
   params: ConnectionParams,

   conn: Option<B::Connection>,

   state: ConnectionState,
}

impl<B: Backend> SingleConnection<B> {
   /// Connect to the database using `params` merged over the backend
   /// defaults.
   ///
   /// Connect errors from the backend are returned unchanged.
   pub async fn connect(backend: B, params: ConnectionParams) -> Result<Self> {
      let mut this = Self {
         backend,
         params: ConnectionParams::new(),
         conn: None,
         state: ConnectionState::Uninitialized,
      };

      this.create_connection(params).await?;
      Ok(this)
   }

   /// Open a new connection and make it the active handle.
   ///
   /// A handle that is still active is replaced without a graceful close;
   /// callers that care should call [`close_connection`](Self::close_connection)
   /// first.
   pub async fn create_connection(&mut self, params: ConnectionParams) -> Result<&B::Connection> {
      let merged = self.backend.default_params().merged(&params);
      let conn = self.backend.connect(&merged).await?;

      if self.conn.is_some() {
         warn!(
            "Replacing an active {} connection without closing it",
            self.backend.name()
         );
      }

      debug!("{} connection established", self.backend.name());
      self.params = merged;
      self.state = ConnectionState::Connected;
      Ok(self.conn.insert(conn))
   }

   /// Open a new connection with the stored parameters.
   pub async fn reconnect(&mut self) -> Result<&B::Connection> {
      let params = self.params.clone();
      self.create_connection(params).await
   }

   /// The active handle, or `None` if no connection is open.
   ///
   /// Never connects implicitly.
   pub fn get_connection(&self) -> Option<&B::Connection> {
      self.conn.as_ref()
   }

   pub fn get_connection_mut(&mut self) -> Option<&mut B::Connection> {
      self.conn.as_mut()
   }

   /// Close the active handle. Does nothing if there is none.
   pub async fn close_connection(&mut self) -> Result<()> {
      let Some(conn) = self.conn.take() else {
         return Ok(());
      };

      self.state = ConnectionState::Closed;
      debug!("Closing {} connection", self.backend.name());
      self.backend.close(conn).await
   }

   pub fn is_connected(&self) -> bool {
      self.conn.is_some()
   }

   pub fn state(&self) -> ConnectionState {
      self.state
   }

   pub fn backend(&self) -> &B {
      &self.backend
   }

   /// Parameters of the current (or last) connection, merged over the
   /// backend defaults.
   pub fn connection_params(&self) -> &ConnectionParams {
      &self.params
   }

   /// Replace the stored parameters used by [`reconnect`](Self::reconnect).
   ///
   /// Fails with [`Error::ConnectionActive`] while a connection is open.
   pub fn set_connection_params(&mut self, params: ConnectionParams) -> Result<()> {
      if self.conn.is_some() {
         return Err(Error::ConnectionActive);
      }

      debug!("Updating {} connection parameters", self.backend.name());
      self.params = self.backend.default_params().merged(&params);
      Ok(())
   }

   /// Execute a statement that returns no rows and commit it.
   pub async fn execute_no_result(
      &mut self,
      sql: &str,
      params: impl Into<QueryParams>,
   ) -> Result<WriteQueryResult> {
      let (sql, values) = params.into().resolve(sql)?;
      let conn = self.conn.as_mut().ok_or(Error::NoActiveConnection)?;
      self.backend.execute(conn, &sql, values).await
   }

   /// Execute a query and return its first row, or `None` if it returned
   /// no rows.
   pub async fn execute_one_result(
      &mut self,
      sql: &str,
      params: impl Into<QueryParams>,
   ) -> Result<Option<JsonRow>> {
      let (sql, values) = params.into().resolve(sql)?;
      let conn = self.conn.as_mut().ok_or(Error::NoActiveConnection)?;
      self.backend.fetch_optional(conn, &sql, values).await
   }

   /// Execute a query and return all rows (empty when nothing matched).
   pub async fn execute_all_results(
      &mut self,
      sql: &str,
      params: impl Into<QueryParams>,
   ) -> Result<Vec<JsonRow>> {
      let (sql, values) = params.into().resolve(sql)?;
      let conn = self.conn.as_mut().ok_or(Error::NoActiveConnection)?;
      self.backend.fetch_all(conn, &sql, values).await
   }

   /// Server version reported by the backend.
   pub async fn server_info(&mut self) -> Result<String> {
      let conn = self.conn.as_mut().ok_or(Error::NoActiveConnection)?;
      self.backend.server_info(conn).await
   }

   /// Human-readable description of the connection. Never includes the
   /// password.
   pub fn connection_info(&self) -> String {
      let mut info = format!("{} connection ({})", self.backend.name(), self.state);

      for key in ["host", "port", "database", "user"] {
         if let Some(value) = self.params.get(key).filter(|v| !v.is_null()) {
            match value.as_str() {
               Some(s) => info.push_str(&format!(", {key}={s}")),
               None => info.push_str(&format!(", {key}={value}")),
            }
         }
      }

      info
   }
}

impl<B: Backend> fmt::Debug for SingleConnection<B> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.debug_struct("SingleConnection")
         .field("backend", &self.backend.name())
         .field("params", &self.params)
         .field("state", &self.state)
         .finish()
   }
}

impl<B: Backend> fmt::Display for SingleConnection<B> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      f.write_str(&self.connection_info())
   }
}

impl<B: Backend> Drop for SingleConnection<B> {
   fn drop(&mut self) {
      if let Some(conn) = self.conn.take() {
         debug!(
            "Dropping open {} connection without explicit close",
            self.backend.name()
         );
         self.backend.close_on_drop(conn);
      }
   }
}

#[cfg(test)]
mod tests {
   use super::*;
   use crate::PoolLimits;
   use serde_json::{Value as JsonValue, json};
   use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
   use std::sync::{Arc, Mutex};

   #[derive(Default)]
   struct MockState {
      next_id: AtomicU64,
      closes: AtomicUsize,
      drop_closes: AtomicUsize,
      refuse_connect: AtomicBool,
      executed: Mutex<Vec<(String, Vec<JsonValue>)>>,
   }

   /// Backend that records calls instead of talking to a database
   #[derive(Clone, Default)]
   struct MockBackend(Arc<MockState>);

   #[derive(Debug)]
   struct MockConnection {
      id: u64,
      params: ConnectionParams,
   }

   impl MockBackend {
      fn closes(&self) -> usize {
         self.0.closes.load(Ordering::SeqCst)
      }

      fn drop_closes(&self) -> usize {
         self.0.drop_closes.load(Ordering::SeqCst)
      }

      fn executed(&self) -> Vec<(String, Vec<JsonValue>)> {
         self.0.executed.lock().unwrap().clone()
      }
   }

   impl Backend for MockBackend {
      type Connection = MockConnection;

      const LIMITS: PoolLimits = PoolLimits {
         backend: "Mock",
         max_size: 4,
         max_name_len: 8,
      };

      fn default_params(&self) -> ConnectionParams {
         ConnectionParams::new().with("host", "mockhost")
      }

      async fn connect(&self, params: &ConnectionParams) -> Result<MockConnection> {
         if self.0.refuse_connect.load(Ordering::SeqCst) {
            return Err(Error::Sqlx(sqlx::Error::Configuration(
               "connection refused".into(),
            )));
         }

         Ok(MockConnection {
            id: self.0.next_id.fetch_add(1, Ordering::SeqCst) + 1,
            params: params.clone(),
         })
      }

      async fn close(&self, _conn: MockConnection) -> Result<()> {
         self.0.closes.fetch_add(1, Ordering::SeqCst);
         Ok(())
      }

      fn close_on_drop(&self, _conn: MockConnection) {
         self.0.drop_closes.fetch_add(1, Ordering::SeqCst);
      }

      async fn execute(
         &self,
         _conn: &mut MockConnection,
         sql: &str,
         values: Vec<JsonValue>,
      ) -> Result<WriteQueryResult> {
         self.0.executed.lock().unwrap().push((sql.to_string(), values));
         Ok(WriteQueryResult {
            rows_affected: 1,
            last_insert_id: 0,
         })
      }

      async fn fetch_optional(
         &self,
         conn: &mut MockConnection,
         sql: &str,
         values: Vec<JsonValue>,
      ) -> Result<Option<JsonRow>> {
         Ok(self.fetch_all(conn, sql, values).await?.into_iter().next())
      }

      async fn fetch_all(
         &self,
         _conn: &mut MockConnection,
         sql: &str,
         values: Vec<JsonValue>,
      ) -> Result<Vec<JsonRow>> {
         if sql.contains("nothing") {
            return Ok(Vec::new());
         }
         let mut row = JsonRow::default();
         row.insert("id".into(), values.first().cloned().unwrap_or(json!(1)));
         Ok(vec![row.clone(), row])
      }

      async fn server_info(&self, _conn: &mut MockConnection) -> Result<String> {
         Ok("Mock 1.0".into())
      }
   }

   fn scenario_params() -> ConnectionParams {
      ConnectionParams::new()
         .with("user", "4proxy")
         .with("database", "banana_db")
         .with("password", "passwordISme")
         .with("port", 1234)
   }

   #[tokio::test]
   async fn test_get_connection_returns_handle_from_construction() {
      let backend = MockBackend::default();
      let db = SingleConnection::connect(backend.clone(), scenario_params())
         .await
         .unwrap();

      let conn = db.get_connection().expect("connected on construction");
      assert_eq!(conn.id, 1);
      assert_eq!(conn.params.get_str("database"), Some("banana_db"));
      assert_eq!(db.get_connection().unwrap().id, conn.id);
      assert_eq!(db.state(), ConnectionState::Connected);
   }

   #[tokio::test]
   async fn test_params_merged_over_defaults() {
      let db = SingleConnection::connect(MockBackend::default(), scenario_params())
         .await
         .unwrap();

      let params = db.connection_params();
      assert_eq!(params.get_str("host"), Some("mockhost"));
      assert_eq!(params.get_str("user"), Some("4proxy"));
   }

   #[tokio::test]
   async fn test_connect_failure_propagates_unchanged() {
      let backend = MockBackend::default();
      backend.0.refuse_connect.store(true, Ordering::SeqCst);

      let err = SingleConnection::connect(backend, scenario_params())
         .await
         .unwrap_err();
      assert!(matches!(err, Error::Sqlx(sqlx::Error::Configuration(_))));
   }

   #[tokio::test]
   async fn test_close_is_idempotent() {
      let backend = MockBackend::default();
      let mut db = SingleConnection::connect(backend.clone(), scenario_params())
         .await
         .unwrap();

      db.close_connection().await.unwrap();
      db.close_connection().await.unwrap();

      assert_eq!(backend.closes(), 1);
      assert!(db.get_connection().is_none());
      assert_eq!(db.state(), ConnectionState::Closed);

      drop(db);
      assert_eq!(backend.drop_closes(), 0);
   }

   #[tokio::test]
   async fn test_drop_closes_open_connection_once() {
      let backend = MockBackend::default();
      let db = SingleConnection::connect(backend.clone(), scenario_params())
         .await
         .unwrap();

      drop(db);
      assert_eq!(backend.drop_closes(), 1);
      assert_eq!(backend.closes(), 0);
   }

   #[tokio::test]
   async fn test_create_connection_replaces_handle() {
      let backend = MockBackend::default();
      let mut db = SingleConnection::connect(backend.clone(), scenario_params())
         .await
         .unwrap();

      let id = db
         .create_connection(ConnectionParams::new().with("database", "apple_db"))
         .await
         .unwrap()
         .id;

      assert_eq!(id, 2);
      assert_eq!(db.connection_params().get_str("database"), Some("apple_db"));
      // The replaced handle is not gracefully closed
      assert_eq!(backend.closes(), 0);
   }

   #[tokio::test]
   async fn test_reopen_after_close() {
      let backend = MockBackend::default();
      let mut db = SingleConnection::connect(backend.clone(), scenario_params())
         .await
         .unwrap();

      db.close_connection().await.unwrap();
      db.reconnect().await.unwrap();

      assert!(db.is_connected());
      assert_eq!(db.get_connection().unwrap().id, 2);
      assert_eq!(
         db.get_connection().unwrap().params.get_str("user"),
         Some("4proxy")
      );
   }

   #[tokio::test]
   async fn test_set_connection_params_requires_closed_connection() {
      let mut db = SingleConnection::connect(MockBackend::default(), scenario_params())
         .await
         .unwrap();

      let new_params = ConnectionParams::new().with("database", "cherry_db");
      assert!(matches!(
         db.set_connection_params(new_params.clone()),
         Err(Error::ConnectionActive)
      ));

      db.close_connection().await.unwrap();
      db.set_connection_params(new_params).unwrap();
      db.reconnect().await.unwrap();

      assert_eq!(
         db.get_connection().unwrap().params.get_str("database"),
         Some("cherry_db")
      );
   }

   #[tokio::test]
   async fn test_queries_require_active_connection() {
      let mut db = SingleConnection::connect(MockBackend::default(), scenario_params())
         .await
         .unwrap();
      db.close_connection().await.unwrap();

      assert!(matches!(
         db.execute_no_result("DELETE FROM t", QueryParams::None).await,
         Err(Error::NoActiveConnection)
      ));
      assert!(matches!(
         db.execute_one_result("SELECT 1", QueryParams::None).await,
         Err(Error::NoActiveConnection)
      ));
      assert!(matches!(
         db.execute_all_results("SELECT 1", QueryParams::None).await,
         Err(Error::NoActiveConnection)
      ));
      assert!(matches!(db.server_info().await, Err(Error::NoActiveConnection)));
   }

   #[tokio::test]
   async fn test_execute_passes_bound_values() {
      let backend = MockBackend::default();
      let mut db = SingleConnection::connect(backend.clone(), scenario_params())
         .await
         .unwrap();

      db.execute_no_result("INSERT INTO t VALUES (?, ?)", vec![json!(1), json!(100)])
         .await
         .unwrap();

      let named: indexmap::IndexMap<String, JsonValue> =
         [("id".to_string(), json!(1))].into_iter().collect();
      db.execute_no_result("DELETE FROM t WHERE id = :id", named)
         .await
         .unwrap();

      assert_eq!(
         backend.executed(),
         vec![
            (
               "INSERT INTO t VALUES (?, ?)".to_string(),
               vec![json!(1), json!(100)]
            ),
            ("DELETE FROM t WHERE id = ?".to_string(), vec![json!(1)]),
         ]
      );
   }

   #[tokio::test]
   async fn test_fetch_results() {
      let mut db = SingleConnection::connect(MockBackend::default(), scenario_params())
         .await
         .unwrap();

      let one = db
         .execute_one_result("SELECT id FROM t WHERE id = ?", vec![json!(7)])
         .await
         .unwrap()
         .unwrap();
      assert_eq!(one.get("id"), Some(&json!(7)));

      let all = db
         .execute_all_results("SELECT id FROM t", QueryParams::None)
         .await
         .unwrap();
      assert_eq!(all.len(), 2);

      assert!(
         db.execute_one_result("SELECT nothing", QueryParams::None)
            .await
            .unwrap()
            .is_none()
      );
      assert!(
         db.execute_all_results("SELECT nothing", QueryParams::None)
            .await
            .unwrap()
            .is_empty()
      );
   }

   #[tokio::test]
   async fn test_connection_info_hides_password() {
      let mut db = SingleConnection::connect(MockBackend::default(), scenario_params())
         .await
         .unwrap();

      let info = db.to_string();
      assert!(info.starts_with("Mock connection (connected)"));
      assert!(info.contains("host=mockhost"));
      assert!(info.contains("port=1234"));
      assert!(info.contains("database=banana_db"));
      assert!(info.contains("user=4proxy"));
      assert!(!info.contains("passwordISme"));
      assert!(!format!("{db:?}").contains("passwordISme"));

      db.close_connection().await.unwrap();
      assert!(db.connection_info().contains("(closed)"));
      assert_eq!(db.server_info().await.ok(), None);
   }
}
