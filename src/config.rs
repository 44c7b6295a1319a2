//! Layer configuration bundles.
//!
//! Each layer kind has a typed config struct; they can also be read from JSON so
//! a model description stored as data builds the same layers.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};

use crate::{Error, Result};

/// Accepts a JSON object or `null` (treated as an empty mapping).
pub fn argument_dict_checkup(layer: &str, args: &Value) -> Result<Map<String, Value>> {
    match args {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(Error::ArgumentShape {
            layer: layer.to_string(),
            found: json_kind(other).to_string(),
        }),
    }
}

pub fn parse<T: DeserializeOwned>(layer: &str, args: &Value) -> Result<T> {
    let map = argument_dict_checkup(layer, args)?;
    Ok(serde_json::from_value(Value::Object(map))?)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
