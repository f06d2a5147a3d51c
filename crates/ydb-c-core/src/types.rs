//!
//! Type Ids and Owned Values
//!
//! Type ids are shared between column metadata (`ydb_result_set_column_type`)
//! and caller-side dispatch. Values are the owned cells of a materialized
//! result set; text is stored NUL-terminated so it can be handed to C as-is.
//!

use std::ffi::c_char;

pub const YDB_TYPE_BOOL: i32 = 1;
pub const YDB_TYPE_INT32: i32 = 2;
pub const YDB_TYPE_UINT32: i32 = 3;
pub const YDB_TYPE_INT64: i32 = 4;
pub const YDB_TYPE_UINT64: i32 = 5;
pub const YDB_TYPE_FLOAT: i32 = 6;
pub const YDB_TYPE_DOUBLE: i32 = 7;
pub const YDB_TYPE_UTF8: i32 = 8;
pub const YDB_TYPE_BYTES: i32 = 9;
pub const YDB_TYPE_JSON: i32 = 10;
pub const YDB_TYPE_DATE: i32 = 11;
pub const YDB_TYPE_DATETIME: i32 = 12;
pub const YDB_TYPE_TIMESTAMP: i32 = 13;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeId {
    Bool,
    Int32,
    Uint32,
    Int64,
    Uint64,
    Float,
    Double,
    Utf8,
    Bytes,
    Json,
    Date,
    Datetime,
    Timestamp,
}

impl TypeId {
    pub fn code(self) -> i32 {
        match self {
            TypeId::Bool => YDB_TYPE_BOOL,
            TypeId::Int32 => YDB_TYPE_INT32,
            TypeId::Uint32 => YDB_TYPE_UINT32,
            TypeId::Int64 => YDB_TYPE_INT64,
            TypeId::Uint64 => YDB_TYPE_UINT64,
            TypeId::Float => YDB_TYPE_FLOAT,
            TypeId::Double => YDB_TYPE_DOUBLE,
            TypeId::Utf8 => YDB_TYPE_UTF8,
            TypeId::Bytes => YDB_TYPE_BYTES,
            TypeId::Json => YDB_TYPE_JSON,
            TypeId::Date => YDB_TYPE_DATE,
            TypeId::Datetime => YDB_TYPE_DATETIME,
            TypeId::Timestamp => YDB_TYPE_TIMESTAMP,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        Some(match code {
            YDB_TYPE_BOOL => TypeId::Bool,
            YDB_TYPE_INT32 => TypeId::Int32,
            YDB_TYPE_UINT32 => TypeId::Uint32,
            YDB_TYPE_INT64 => TypeId::Int64,
            YDB_TYPE_UINT64 => TypeId::Uint64,
            YDB_TYPE_FLOAT => TypeId::Float,
            YDB_TYPE_DOUBLE => TypeId::Double,
            YDB_TYPE_UTF8 => TypeId::Utf8,
            YDB_TYPE_BYTES => TypeId::Bytes,
            YDB_TYPE_JSON => TypeId::Json,
            YDB_TYPE_DATE => TypeId::Date,
            YDB_TYPE_DATETIME => TypeId::Datetime,
            YDB_TYPE_TIMESTAMP => TypeId::Timestamp,
            _ => return None,
        })
    }

    /// Parse a declared column type name, ignoring case and any trailing
    /// modifiers (`Utf8 NOT NULL`, `Uint64?`).
    pub fn from_decl(decl: &str) -> Option<Self> {
        let name = decl
            .split(|c: char| c.is_whitespace() || c == '(' || c == '?')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        Some(match name.as_str() {
            "bool" | "boolean" => TypeId::Bool,
            "int8" | "int16" | "int32" => TypeId::Int32,
            "uint8" | "uint16" | "uint32" => TypeId::Uint32,
            "int" | "integer" | "int64" | "bigint" => TypeId::Int64,
            "uint64" => TypeId::Uint64,
            "float" => TypeId::Float,
            "double" | "real" => TypeId::Double,
            "utf8" | "text" | "varchar" => TypeId::Utf8,
            "string" | "bytes" | "blob" => TypeId::Bytes,
            "json" | "jsondocument" => TypeId::Json,
            "date" => TypeId::Date,
            "datetime" => TypeId::Datetime,
            "timestamp" => TypeId::Timestamp,
            _ => return None,
        })
    }

    /// Integer-backed types readable through the integer and bool accessors.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            TypeId::Bool
                | TypeId::Int32
                | TypeId::Uint32
                | TypeId::Int64
                | TypeId::Uint64
                | TypeId::Date
                | TypeId::Datetime
                | TypeId::Timestamp
        )
    }

    pub fn is_unsigned(self) -> bool {
        matches!(
            self,
            TypeId::Uint32 | TypeId::Uint64 | TypeId::Date | TypeId::Datetime | TypeId::Timestamp
        )
    }

    pub fn is_floating(self) -> bool {
        matches!(self, TypeId::Float | TypeId::Double)
    }

    pub fn is_text(self) -> bool {
        matches!(self, TypeId::Utf8 | TypeId::Json)
    }
}

/// UTF-8 text with a trailing NUL kept in the buffer.
#[derive(Clone, Debug, PartialEq)]
pub struct TextBuf {
    buf: Box<[u8]>,
}

impl TextBuf {
    pub fn new(text: &str) -> Self {
        let mut buf = Vec::with_capacity(text.len() + 1);
        buf.extend_from_slice(text.as_bytes());
        buf.push(0);
        Self {
            buf: buf.into_boxed_slice(),
        }
    }

    pub fn as_str(&self) -> &str {
        // Only ever built from &str, so the prefix is valid UTF-8.
        std::str::from_utf8(self.as_bytes()).unwrap_or_default()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buf[..self.buf.len() - 1]
    }

    pub fn as_c_ptr(&self) -> *const c_char {
        self.buf.as_ptr() as *const c_char
    }

    pub fn len(&self) -> usize {
        self.buf.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// An owned result cell.
#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int64(i64),
    Uint64(u64),
    Double(f64),
    Text(TextBuf),
    Bytes(Vec<u8>),
}

impl Value {
    pub fn text(s: &str) -> Self {
        Value::Text(TextBuf::new(s))
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}
