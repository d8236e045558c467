//! Error types for sqlx-single-conn

use thiserror::Error;

/// Errors that may occur when configuring or using a single connection
#[derive(Error, Debug)]
pub enum Error {
   /// Error from the sqlx library. Connection and query failures from the
   /// backend are passed through unchanged in this variant.
   #[error(transparent)]
   Sqlx(#[from] sqlx::Error),

   /// A pool configuration field has the wrong type.
   #[error("the *{field}* field of pool config must be {expected}")]
   ConfigType {
      field: &'static str,
      expected: &'static str,
   },

   /// A pool configuration field has the right type but an invalid value.
   #[error("{message}")]
   ConfigValue { field: &'static str, message: String },

   /// The supplied value is not a pool configuration for this backend.
   #[error("the pool config argument is not a {expected} pool configuration")]
   NotPoolConfig { expected: &'static str },

   /// The wrapper holds no live connection (never opened or already closed).
   #[error("no active connection")]
   NoActiveConnection,

   /// Connection parameters cannot be replaced while a connection is open.
   #[error("connection parameters cannot be changed while a connection is active")]
   ConnectionActive,

   /// A `:name` placeholder has no value in the named parameter map.
   #[error("missing value for named parameter ':{0}'")]
   MissingNamedParameter(String),

   /// Column type that cannot be mapped to JSON.
   #[error("unsupported datatype: {0}")]
   UnsupportedDatatype(String),
}

impl Error {
   /// Extract a structured error code from the error type.
   pub fn error_code(&self) -> String {
      match self {
         Error::Sqlx(e) => {
            if let Some(code) = e.as_database_error().and_then(|db_err| db_err.code()) {
               return format!("DATABASE_{}", code);
            }
            "SQLX_ERROR".to_string()
         }
         Error::ConfigType { .. } => "CONFIG_TYPE".to_string(),
         Error::ConfigValue { .. } => "CONFIG_VALUE".to_string(),
         Error::NotPoolConfig { .. } => "NOT_POOL_CONFIG".to_string(),
         Error::NoActiveConnection => "NO_ACTIVE_CONNECTION".to_string(),
         Error::ConnectionActive => "CONNECTION_ACTIVE".to_string(),
         Error::MissingNamedParameter(_) => "MISSING_NAMED_PARAMETER".to_string(),
         Error::UnsupportedDatatype(_) => "UNSUPPORTED_DATATYPE".to_string(),
      }
   }

   /// Whether this error was raised while validating a pool configuration.
   pub fn is_config_error(&self) -> bool {
      matches!(self, Error::ConfigType { .. } | Error::ConfigValue { .. })
   }
}

/// A type alias for Results with our Error type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
   use super::*;

   #[test]
   fn test_error_code_config_type() {
      let err = Error::ConfigType {
         field: "size",
         expected: "an integer",
      };
      assert_eq!(err.error_code(), "CONFIG_TYPE");
      assert_eq!(
         err.to_string(),
         "the *size* field of pool config must be an integer"
      );
      assert!(err.is_config_error());
   }

   #[test]
   fn test_error_code_config_value() {
      let err = Error::ConfigValue {
         field: "name",
         message: "bad name".into(),
      };
      assert_eq!(err.error_code(), "CONFIG_VALUE");
      assert_eq!(err.to_string(), "bad name");
      assert!(err.is_config_error());
   }

   #[test]
   fn test_error_code_not_pool_config() {
      let err = Error::NotPoolConfig { expected: "MySQL" };
      assert_eq!(err.error_code(), "NOT_POOL_CONFIG");
      assert!(err.to_string().contains("MySQL"));
      assert!(!err.is_config_error());
   }

   #[test]
   fn test_error_code_lifecycle() {
      assert_eq!(
         Error::NoActiveConnection.error_code(),
         "NO_ACTIVE_CONNECTION"
      );
      assert_eq!(Error::ConnectionActive.error_code(), "CONNECTION_ACTIVE");
   }

   #[test]
   fn test_error_code_missing_named_parameter() {
      let err = Error::MissingNamedParameter("id".into());
      assert_eq!(err.error_code(), "MISSING_NAMED_PARAMETER");
      assert!(err.to_string().contains(":id"));
   }

   #[test]
   fn test_error_code_sqlx_non_database() {
      // RowNotFound is not a database error, so no backend code
      let err = Error::Sqlx(sqlx::Error::RowNotFound);
      assert_eq!(err.error_code(), "SQLX_ERROR");
   }
}
