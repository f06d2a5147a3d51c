//!
//! Query Parameters
//!
//! A named, typed parameter set attached to a query. Names are stored with a
//! leading `$` (added when the caller omits it) and the last write for a
//! name wins. Execute calls clone the set, so the caller may keep mutating
//! its builder for later calls.
//!

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::types::TypeId;

#[derive(Clone, Debug, PartialEq)]
pub enum ParamValue {
    Bool(bool),
    Int32(i32),
    Uint32(u32),
    Int64(i64),
    Uint64(u64),
    Float(f32),
    Double(f64),
    Utf8(String),
    Json(String),
    Bytes(Vec<u8>),
}

impl ParamValue {
    pub fn type_id(&self) -> TypeId {
        match self {
            ParamValue::Bool(_) => TypeId::Bool,
            ParamValue::Int32(_) => TypeId::Int32,
            ParamValue::Uint32(_) => TypeId::Uint32,
            ParamValue::Int64(_) => TypeId::Int64,
            ParamValue::Uint64(_) => TypeId::Uint64,
            ParamValue::Float(_) => TypeId::Float,
            ParamValue::Double(_) => TypeId::Double,
            ParamValue::Utf8(_) => TypeId::Utf8,
            ParamValue::Json(_) => TypeId::Json,
            ParamValue::Bytes(_) => TypeId::Bytes,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct QueryParams {
    values: IndexMap<String, ParamValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: &str, value: ParamValue) -> Result<()> {
        let name = normalize_name(name)?;
        self.values.insert(name, value);
        Ok(())
    }

    /// Store a JSON document after checking that it parses.
    pub fn set_json(&mut self, name: &str, json: &str) -> Result<()> {
        serde_json::from_str::<serde_json::Value>(json)
            .map_err(|e| Error::bad_request(format!("invalid JSON for parameter '{}': {}", name, e)))?;
        self.set(name, ParamValue::Json(json.to_string()))
    }

    /// Look up by name, with or without the leading `$`.
    pub fn get(&self, name: &str) -> Option<&ParamValue> {
        if name.starts_with('$') {
            self.values.get(name)
        } else {
            self.values.get(format!("${}", name).as_str())
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let bare = name.strip_prefix('$').unwrap_or(name);
    if bare.is_empty() {
        return Err(Error::bad_request("parameter name is empty"));
    }
    if !bare.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(Error::bad_request(format!("invalid parameter name '{}'", name)));
    }
    Ok(format!("${}", bare))
}
