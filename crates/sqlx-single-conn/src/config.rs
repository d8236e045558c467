//! Validated pool configuration

use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Fixed limits a backend imposes on pool configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolLimits {
   /// Human-readable backend name, used in error messages and as the
   /// identity of configurations validated against these limits
   pub backend: &'static str,

   /// Largest allowed pool size
   pub max_size: u32,

   /// Longest allowed pool name, in characters
   pub max_name_len: usize,
}

impl PoolLimits {
   /// Limits of the MySQL connector pool (`CNX_POOL_MAXSIZE`, `CNX_POOL_MAXNAMESIZE`).
   pub const MYSQL: PoolLimits = PoolLimits {
      backend: "MySQL",
      max_size: 32,
      max_name_len: 64,
   };

   /// SQLite has no connector-imposed limits; the MySQL values are reused.
   pub const SQLITE: PoolLimits = PoolLimits {
      backend: "SQLite",
      max_size: 32,
      max_name_len: 64,
   };
}

/// Immutable configuration of a connection pool.
///
/// Every constructor validates its input before returning, so a `PoolConfig`
/// value is always well formed for the [`PoolLimits`] it was built with.
///
/// # Examples
///
/// ```
/// use sqlx_single_conn::{PoolConfig, PoolLimits};
///
/// let config = PoolConfig::new(PoolLimits::MYSQL, "reports", 5, true).unwrap();
/// assert_eq!(config.name(), "reports");
/// assert_eq!(config.size(), 5);
///
/// // Digits are not allowed in pool names
/// assert!(PoolConfig::new(PoolLimits::MYSQL, "reports2", 5, true).is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolConfig {
   name: String,
   size: u32,
   reset_session: bool,
   limits: PoolLimits,
}

impl PoolConfig {
   /// Build and validate a pool configuration.
   ///
   /// `size` is signed so that zero and negative inputs reach validation
   /// instead of failing at the call site.
   pub fn new(
      limits: PoolLimits,
      name: impl Into<String>,
      size: i64,
      reset_session: bool,
   ) -> Result<Self> {
      let name = name.into();
      let size = validate(&limits, &name, size)?;

      Ok(Self {
         name,
         size,
         reset_session,
         limits,
      })
   }

   /// Build a pool configuration from an untyped JSON object with the keys
   /// `name`, `size` and `reset_session`.
   ///
   /// Field types are checked before any value rule runs.
   pub fn from_value(limits: PoolLimits, value: &JsonValue) -> Result<Self> {
      let object = value.as_object().ok_or(Error::NotPoolConfig {
         expected: limits.backend,
      })?;

      let name = object
         .get("name")
         .and_then(JsonValue::as_str)
         .ok_or(Error::ConfigType {
            field: "name",
            expected: "a string",
         })?;

      // Integers beyond i64 are still integers; they fail the range check
      let size = match object.get("size") {
         Some(JsonValue::Number(n)) if n.is_i64() || n.is_u64() => {
            n.as_i64().unwrap_or(i64::MAX)
         }
         _ => {
            return Err(Error::ConfigType {
               field: "size",
               expected: "an integer",
            });
         }
      };

      let reset_session = object
         .get("reset_session")
         .and_then(JsonValue::as_bool)
         .ok_or(Error::ConfigType {
            field: "reset_session",
            expected: "a bool",
         })?;

      Self::new(limits, name, size, reset_session)
   }

   pub fn name(&self) -> &str {
      &self.name
   }

   pub fn size(&self) -> u32 {
      self.size
   }

   pub fn reset_session(&self) -> bool {
      self.reset_session
   }

   /// Limits this configuration was validated against
   pub fn limits(&self) -> PoolLimits {
      self.limits
   }

   /// Whether this configuration was validated for the backend with `limits`
   pub fn is_for(&self, limits: &PoolLimits) -> bool {
      self.limits.backend == limits.backend
   }
}

fn validate(limits: &PoolLimits, name: &str, size: i64) -> Result<u32> {
   if name.trim().is_empty() {
      return Err(value_error("name", "the *name* field value cannot be blank"));
   }

   // Letter-numbers such as roman numerals are numeric, not letters
   if !name.chars().all(|c| c.is_alphabetic() && !c.is_numeric()) {
      return Err(value_error(
         "name",
         "the *name* field value must contain only alphabetic characters",
      ));
   }

   if size <= 0 {
      return Err(value_error("size", "the *size* field value cannot be <= 0"));
   }

   if size > i64::from(limits.max_size) {
      return Err(value_error(
         "size",
         format!(
            "{} limits! the *size* field value cannot be > {}",
            limits.backend, limits.max_size
         ),
      ));
   }

   if name.chars().count() > limits.max_name_len {
      return Err(value_error(
         "name",
         format!(
            "{} limits! the length of *name* field value cannot be > {}",
            limits.backend, limits.max_name_len
         ),
      ));
   }

   // In range of u32 after the max_size check
   Ok(size as u32)
}

fn value_error(field: &'static str, message: impl Into<String>) -> Error {
   Error::ConfigValue {
      field,
      message: message.into(),
   }
}
