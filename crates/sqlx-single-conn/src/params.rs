//! Connection parameters and query parameter binding

use std::borrow::Cow;
use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{Error, Result};

/// Keys whose values never appear in `Debug` output
const REDACTED_KEYS: [&str; 2] = ["password", "passwd"];

/// Open-ended backend connection parameters (`host`, `user`, `password`,
/// `port`, `database`, and any backend-specific extras).
///
/// Keys keep their insertion order. Each backend maps the keys it
/// understands onto its connect options and rejects the rest.
#[derive(Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectionParams(IndexMap<String, JsonValue>);

impl ConnectionParams {
   pub fn new() -> Self {
      Self::default()
   }

   /// Builder-style insert
   pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
      self.insert(key, value);
      self
   }

   pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) {
      self.0.insert(key.into(), value.into());
   }

   pub fn get(&self, key: &str) -> Option<&JsonValue> {
      self.0.get(key)
   }

   /// String value of `key`, if present and a string
   pub fn get_str(&self, key: &str) -> Option<&str> {
      self.0.get(key).and_then(JsonValue::as_str)
   }

   pub fn iter(&self) -> impl Iterator<Item = (&String, &JsonValue)> {
      self.0.iter()
   }

   pub fn len(&self) -> usize {
      self.0.len()
   }

   pub fn is_empty(&self) -> bool {
      self.0.is_empty()
   }

   /// Return a copy of `self` overlaid with `overrides`; keys in
   /// `overrides` win.
   pub fn merged(&self, overrides: &ConnectionParams) -> ConnectionParams {
      let mut merged = self.clone();
      for (key, value) in overrides.iter() {
         merged.0.insert(key.clone(), value.clone());
      }
      merged
   }
}

impl fmt::Debug for ConnectionParams {
   fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
      let mut map = f.debug_map();
      for (key, value) in self.iter() {
         if REDACTED_KEYS.contains(&key.as_str()) {
            map.entry(key, &"<redacted>");
         } else {
            map.entry(key, value);
         }
      }
      map.finish()
   }
}

impl<K: Into<String>, V: Into<JsonValue>> FromIterator<(K, V)> for ConnectionParams {
   fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
      Self(
         iter
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .collect(),
      )
   }
}

impl From<IndexMap<String, JsonValue>> for ConnectionParams {
   fn from(map: IndexMap<String, JsonValue>) -> Self {
      Self(map)
   }
}

/// Backend configuration error for a parameter value of the wrong type
pub(crate) fn invalid_param(key: &str, expected: &str) -> sqlx::Error {
   sqlx::Error::Configuration(
      format!("connection parameter '{key}' must be {expected}").into(),
   )
}

/// Backend configuration error for a key the connector does not accept
pub(crate) fn unsupported_param(backend: &str, key: &str) -> sqlx::Error {
   sqlx::Error::Configuration(
      format!("unsupported {backend} connection parameter '{key}'").into(),
   )
}

pub(crate) fn param_str<'a>(
   key: &str,
   value: &'a JsonValue,
) -> std::result::Result<&'a str, sqlx::Error> {
   value.as_str().ok_or_else(|| invalid_param(key, "a string"))
}

pub(crate) fn param_bool(key: &str, value: &JsonValue) -> std::result::Result<bool, sqlx::Error> {
   value.as_bool().ok_or_else(|| invalid_param(key, "a bool"))
}

pub(crate) fn param_u64(key: &str, value: &JsonValue) -> std::result::Result<u64, sqlx::Error> {
   // Ports and sizes often arrive as strings from env-derived configs
   let parsed = match value {
      JsonValue::String(s) => s.parse().ok(),
      other => other.as_u64(),
   };
   parsed.ok_or_else(|| invalid_param(key, "a non-negative integer"))
}

pub(crate) fn param_u16(key: &str, value: &JsonValue) -> std::result::Result<u16, sqlx::Error> {
   u16::try_from(param_u64(key, value)?).map_err(|_| invalid_param(key, "a port number"))
}

/// Values bound to a statement's placeholders.
///
/// Values are always sent to the backend as bind arguments, never spliced
/// into the SQL text.
#[derive(Debug, Clone, Default, PartialEq)]
pub enum QueryParams {
   /// Statement has no placeholders
   #[default]
   None,

   /// Values for `?` placeholders, in order
   Positional(Vec<JsonValue>),

   /// Values for `:name` placeholders
   Named(IndexMap<String, JsonValue>),
}

impl QueryParams {
   /// Rewrite `sql` for the backend and return the ordered bind values.
   ///
   /// Positional parameters leave `sql` untouched. Named parameters replace
   /// each `:name` outside of quoted text with `?`; a name may appear more
   /// than once.
   pub(crate) fn resolve(self, sql: &str) -> Result<(Cow<'_, str>, Vec<JsonValue>)> {
      match self {
         QueryParams::None => Ok((Cow::Borrowed(sql), Vec::new())),
         QueryParams::Positional(values) => Ok((Cow::Borrowed(sql), values)),
         QueryParams::Named(map) => {
            let (rewritten, values) = rewrite_named(sql, &map)?;
            Ok((Cow::Owned(rewritten), values))
         }
      }
   }
}

impl From<Vec<JsonValue>> for QueryParams {
   fn from(values: Vec<JsonValue>) -> Self {
      QueryParams::Positional(values)
   }
}

impl From<IndexMap<String, JsonValue>> for QueryParams {
   fn from(map: IndexMap<String, JsonValue>) -> Self {
      QueryParams::Named(map)
   }
}

impl From<Option<Vec<JsonValue>>> for QueryParams {
   fn from(values: Option<Vec<JsonValue>>) -> Self {
      values.map_or(QueryParams::None, QueryParams::Positional)
   }
}

/// Where the scanner is within the statement text
#[derive(Clone, Copy)]
enum Scan {
   Code,
   Quoted(char),
   LineComment,
   BlockComment,
}

fn rewrite_named(
   sql: &str,
   map: &IndexMap<String, JsonValue>,
) -> Result<(String, Vec<JsonValue>)> {
   let mut out = String::with_capacity(sql.len());
   let mut values = Vec::new();
   let mut scan = Scan::Code;
   let mut chars = sql.chars().peekable();

   while let Some(c) = chars.next() {
      match scan {
         Scan::Quoted(q) => {
            out.push(c);
            if c == '\\' && q != '`' {
               // MySQL string escape; the next character never closes the quote
               if let Some(escaped) = chars.next() {
                  out.push(escaped);
               }
            } else if c == q {
               scan = Scan::Code;
            }
            continue;
         }
         Scan::LineComment => {
            out.push(c);
            if c == '\n' {
               scan = Scan::Code;
            }
            continue;
         }
         Scan::BlockComment => {
            out.push(c);
            if c == '*' && chars.peek() == Some(&'/') {
               out.push('/');
               chars.next();
               scan = Scan::Code;
            }
            continue;
         }
         Scan::Code => {}
      }

      match c {
         '\'' | '"' | '`' => {
            scan = Scan::Quoted(c);
            out.push(c);
         }
         '-' if chars.peek() == Some(&'-') => {
            scan = Scan::LineComment;
            out.push_str("--");
            chars.next();
         }
         '/' if chars.peek() == Some(&'*') => {
            scan = Scan::BlockComment;
            out.push_str("/*");
            chars.next();
         }
         ':' if chars.peek() == Some(&':') => {
            // `::` cast, not a placeholder
            out.push_str("::");
            chars.next();
         }
         ':' if chars
            .peek()
            .is_some_and(|next| next.is_ascii_alphabetic() || *next == '_') =>
         {
            let mut name = String::new();
            while let Some(&next) = chars.peek() {
               if next.is_ascii_alphanumeric() || next == '_' {
                  name.push(next);
                  chars.next();
               } else {
                  break;
               }
            }

            let value = map
               .get(&name)
               .ok_or_else(|| Error::MissingNamedParameter(name.clone()))?;
            values.push(value.clone());
            out.push('?');
         }
         _ => out.push(c),
      }
   }

   Ok((out, values))
}
