//! Row decoding shared by the backends

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value as JsonValue;
use sqlx::{Column, ColumnIndex, Decode, Row, Type};

use crate::{JsonRow, Result};

/// Decode column `index` as `T`, or `None` if the column type is not
/// compatible with `T`.
pub(crate) fn try_decode<'r, R, T>(row: &'r R, index: usize) -> Option<T>
where
   R: Row,
   usize: ColumnIndex<R>,
   T: Decode<'r, R::Database> + Type<R::Database>,
{
   row.try_get::<T, usize>(index).ok()
}

/// Decode every column of `row` with `to_json`, keeping select order.
pub(crate) fn decode_row<R, F>(row: &R, to_json: F) -> Result<JsonRow>
where
   R: Row,
   F: Fn(&R, usize) -> Result<JsonValue>,
{
   let mut value = JsonRow::default();
   for (i, column) in row.columns().iter().enumerate() {
      value.insert(column.name().to_string(), to_json(row, i)?);
   }
   Ok(value)
}

/// Floats without a JSON representation (NaN, infinities) become null
pub(crate) fn float_to_json(value: f64) -> JsonValue {
   serde_json::Number::from_f64(value).map_or(JsonValue::Null, JsonValue::Number)
}

/// Binary values are returned base64-encoded
pub(crate) fn blob_to_json(bytes: &[u8]) -> JsonValue {
   JsonValue::String(STANDARD.encode(bytes))
}
