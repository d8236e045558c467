//! Capability interfaces implemented by concrete database types

use std::future::Future;

use sqlx_single_conn::{ConnectionParams, JsonRow, QueryParams, Result, WriteQueryResult};

/// Descriptive and configuration surface shared by every database type.
pub trait SqlDatabase {
   /// Connection parameters in effect, merged over backend defaults.
   fn connection_params(&self) -> &ConnectionParams;

   /// Replace the connection parameters. Only allowed while disconnected.
   fn set_connection_params(&mut self, params: ConnectionParams) -> Result<()>;

   /// Version information about the database server.
   fn server_info(&mut self) -> impl Future<Output = Result<String>>;

   /// Description of the current connection (never includes secrets).
   fn connection_info(&self) -> String;
}

/// Lifecycle of a single exclusively-owned connection.
pub trait SingleConnectionInterface {
   type Connection;

   /// Open a connection from `params` and make it the active one.
   fn create_connection(
      &mut self,
      params: ConnectionParams,
   ) -> impl Future<Output = Result<&Self::Connection>>;

   /// The active connection, or `None`. Never connects implicitly.
   fn get_connection(&self) -> Option<&Self::Connection>;

   /// Close the active connection; a no-op when there is none.
   fn close_connection(&mut self) -> impl Future<Output = Result<()>>;
}

/// Statement execution.
pub trait SqlApi {
   /// Execute a statement that returns no rows and commit it.
   fn execute_no_result(
      &mut self,
      sql: &str,
      params: QueryParams,
   ) -> impl Future<Output = Result<WriteQueryResult>>;

   /// First row of the result, or `None`.
   fn execute_one_result(
      &mut self,
      sql: &str,
      params: QueryParams,
   ) -> impl Future<Output = Result<Option<JsonRow>>>;

   /// Every row of the result.
   fn execute_all_results(
      &mut self,
      sql: &str,
      params: QueryParams,
   ) -> impl Future<Output = Result<Vec<JsonRow>>>;
}
