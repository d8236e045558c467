//! Single-connection database types for MySQL and SQLite.
//!
//! Each database owns exactly one live connection and exposes three
//! capabilities as traits:
//!
//! - [`SqlDatabase`]: connection parameters and server/connection information
//! - [`SingleConnectionInterface`]: create, get and close the owned connection
//! - [`SqlApi`]: execute statements with or without results
//!
//! # Example
//!
//! ```ignore
//! use sqlx_db_wrapper::{ConnectionParams, MySqlDatabaseSingle, PoolConfig, PoolLimits, SqlApi};
//!
//! let config = PoolConfig::new(PoolLimits::MYSQL, "reports", 5, true)?;
//! let params = ConnectionParams::new()
//!    .with("user", "app")
//!    .with("password", "secret")
//!    .with("database", "reports");
//!
//! let mut db = MySqlDatabaseSingle::open(params, Some(config)).await?;
//! let rows = db.execute_all_results("SELECT id FROM jobs", Default::default()).await?;
//! db.close().await?;
//! ```

mod database;
mod interfaces;

pub use database::{DatabaseSingle, MySqlDatabaseSingle, SqliteDatabaseSingle};
pub use interfaces::{SingleConnectionInterface, SqlApi, SqlDatabase};
pub use serde_json::Value as JsonValue;

pub use sqlx_single_conn::{
   Backend, ConnectionParams, ConnectionState, Error, JsonRow, MySqlBackend, PoolConfig,
   PoolLimits, QueryParams, Result, SingleConnection, SqliteBackend, WriteQueryResult,
};
