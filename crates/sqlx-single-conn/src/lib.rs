//! # sqlx-single-conn
//!
//! A small wrapper around SQLx that owns exactly one database connection and
//! validates pool configuration against backend limits.
//!
//! ## Core Types
//!
//! - **[`PoolConfig`]**: Immutable pool configuration, validated on construction
//! - **[`SingleConnection`]**: Owner of one live connection with scoped query execution
//! - **[`Backend`]**: Connector capability, implemented by [`MySqlBackend`] and [`SqliteBackend`]
//! - **[`ConnectionParams`]** / **[`QueryParams`]**: Connection and statement parameters
//! - **[`Error`]**: Error type for configuration, lifecycle and backend failures
//!
//! ## Usage Pattern
//!
//! ```text
//! 1. Validate a PoolConfig (optional)
//! 2. Connect: SingleConnection::connect(backend, params)
//! 3. execute_no_result / execute_one_result / execute_all_results
//! 4. close_connection(), or drop the wrapper
//! ```

mod backend;
mod config;
mod connection;
mod decode;
mod error;
mod mysql;
mod params;
mod sqlite;

// Re-export public types
pub use backend::{Backend, JsonRow, WriteQueryResult};
pub use config::{PoolConfig, PoolLimits};
pub use connection::{ConnectionState, SingleConnection};
pub use error::{Error, Result};
pub use mysql::MySqlBackend;
pub use params::{ConnectionParams, QueryParams};
pub use sqlite::SqliteBackend;
