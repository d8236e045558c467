use std::fmt;

use sqlx_single_conn::{
   Backend, ConnectionParams, Error, JsonRow, MySqlBackend, PoolConfig, QueryParams, Result,
   SingleConnection, SqliteBackend, WriteQueryResult,
};
use tracing::debug;

use crate::interfaces::{SingleConnectionInterface, SqlApi, SqlDatabase};

/// Single-connection database for MySQL
pub type MySqlDatabaseSingle = DatabaseSingle<MySqlBackend>;

/// Single-connection database for SQLite
pub type SqliteDatabaseSingle = DatabaseSingle<SqliteBackend>;

/// Database backed by one owned connection, optionally carrying the pool
/// configuration it was set up with.
///
/// Implements [`SqlDatabase`], [`SingleConnectionInterface`] and [`SqlApi`].
#[derive(Debug)]
pub struct DatabaseSingle<B: Backend> {
   inner: SingleConnection<B>,
   pool_config: Option<PoolConfig>,
}

impl<B: Backend> DatabaseSingle<B> {
   /// Connect immediately using `params` merged over the backend defaults.
   ///
   /// `pool_config`, when given, must have been validated for this backend;
   /// otherwise construction fails with [`Error::NotPoolConfig`] before any
   /// connection is attempted.
   pub async fn connect(
      backend: B,
      params: ConnectionParams,
      pool_config: Option<PoolConfig>,
   ) -> Result<Self> {
      if let Some(config) = &pool_config
         && !config.is_for(&B::LIMITS)
      {
         return Err(Error::NotPoolConfig {
            expected: B::LIMITS.backend,
         });
      }

      let inner = SingleConnection::connect(backend, params).await?;
      debug!("Opened {}", inner);

      Ok(Self { inner, pool_config })
   }

   pub fn pool_config(&self) -> Option<&PoolConfig> {
      self.pool_config.as_ref()
   }

   /// Underlying connection wrapper
   pub fn inner(&self) -> &SingleConnection<B> {
      &self.inner
   }

   pub fn inner_mut(&mut self) -> &mut SingleConnection<B> {
      &mut self.inner
   }

   /// Close the connection and consume the database
   pub async fn close(mut self) -> Result<()> {
      self.inner.close_connection().await
   }
}

impl<B: Backend + Default> DatabaseSingle<B> {
   /// Connect with a default-constructed backend
   pub async fn open(params: ConnectionParams, pool_config: Option<PoolConfig>) -> Result<Self> {
      Self::connect(B::default(), params, pool_config).await
   }
}

impl<B: Backend> fmt::Display for DatabaseSingle<B> {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      write!(f, "{}", self.inner)?;
      if let Some(config) = &self.pool_config {
         write!(f, ", pool={} (size {})", config.name(), config.size())?;
      }
      Ok(())
   }
}

impl<B: Backend> SqlDatabase for DatabaseSingle<B> {
   fn connection_params(&self) -> &ConnectionParams {
      self.inner.connection_params()
   }

   fn set_connection_params(&mut self, params: ConnectionParams) -> Result<()> {
      self.inner.set_connection_params(params)
   }

   async fn server_info(&mut self) -> Result<String> {
      self.inner.server_info().await
   }

   fn connection_info(&self) -> String {
      self.to_string()
   }
}

impl<B: Backend> SingleConnectionInterface for DatabaseSingle<B> {
   type Connection = B::Connection;

   async fn create_connection(&mut self, params: ConnectionParams) -> Result<&B::Connection> {
      self.inner.create_connection(params).await
   }

   fn get_connection(&self) -> Option<&B::Connection> {
      self.inner.get_connection()
   }

   async fn close_connection(&mut self) -> Result<()> {
      self.inner.close_connection().await
   }
}

impl<B: Backend> SqlApi for DatabaseSingle<B> {
   async fn execute_no_result(&mut self, sql: &str, params: QueryParams) -> Result<WriteQueryResult> {
      self.inner.execute_no_result(sql, params).await
   }

   async fn execute_one_result(
      &mut self,
      sql: &str,
      params: QueryParams,
   ) -> Result<Option<JsonRow>> {
      self.inner.execute_one_result(sql, params).await
   }

   async fn execute_all_results(&mut self, sql: &str, params: QueryParams) -> Result<Vec<JsonRow>> {
      self.inner.execute_all_results(sql, params).await
   }
}
