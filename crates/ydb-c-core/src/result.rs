//!
//! Materialized Result Sets
//!
//! A `ResultSets` owns every column name, type and cell returned by one
//! query, in statement order. It keeps no reference to the driver, session
//! or transaction that produced it.
//!
//! Each `ResultSet` has a single forward-only cursor. Typed getters read the
//! row under the cursor and check, in order: column index, cursor position,
//! column type compatibility, nullability.
//!
//! Accessor compatibility:
//! - int64 / uint64 / bool: Bool, Int32, Uint32, Int64, Uint64, Date,
//!   Datetime, Timestamp (range-checked)
//! - double: Float, Double
//! - utf8: Utf8, Json
//! - bytes: Bytes, Utf8, Json
//!

use std::ffi::{CStr, CString};

use crate::error::{Error, Result};
use crate::types::{TextBuf, TypeId, Value};

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    name: CString,
    type_id: TypeId,
}

impl Column {
    pub fn new(name: &str, type_id: TypeId) -> Self {
        let name = CString::new(name.replace('\0', "")).unwrap_or_default();
        Self { name, type_id }
    }

    pub fn name(&self) -> &str {
        self.name.to_str().unwrap_or("")
    }

    pub fn name_cstr(&self) -> &CStr {
        &self.name
    }

    pub fn type_id(&self) -> TypeId {
        self.type_id
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Cursor {
    BeforeFirst,
    At(usize),
    Done,
}

#[derive(Clone, Debug)]
pub struct ResultSet {
    columns: Vec<Column>,
    rows: Vec<Vec<Value>>,
    cursor: Cursor,
}

impl ResultSet {
    pub fn new(columns: Vec<Column>, rows: Vec<Vec<Value>>) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == columns.len()));
        Self {
            columns,
            rows,
            cursor: Cursor::BeforeFirst,
        }
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Advance the cursor. Returns false once the rows are exhausted and
    /// keeps returning false afterwards.
    pub fn next_row(&mut self) -> bool {
        self.cursor = match self.cursor {
            Cursor::BeforeFirst if !self.rows.is_empty() => Cursor::At(0),
            Cursor::At(i) if i + 1 < self.rows.len() => Cursor::At(i + 1),
            _ => Cursor::Done,
        };
        matches!(self.cursor, Cursor::At(_))
    }

    pub fn is_null(&self, col: usize) -> Result<bool> {
        self.check_column(col)?;
        Ok(self.current_row()?[col].is_null())
    }

    pub fn get_int64(&self, col: usize) -> Result<i64> {
        match self.cell(col, "int64", TypeId::is_integral)? {
            Value::Bool(b) => Ok(*b as i64),
            Value::Int64(v) => Ok(*v),
            Value::Uint64(v) => i64::try_from(*v)
                .map_err(|_| Error::bad_request(format!("value {} in column {} does not fit int64", v, col))),
            other => Err(stored_mismatch(col, "int64", other)),
        }
    }

    pub fn get_uint64(&self, col: usize) -> Result<u64> {
        match self.cell(col, "uint64", TypeId::is_integral)? {
            Value::Bool(b) => Ok(*b as u64),
            Value::Uint64(v) => Ok(*v),
            Value::Int64(v) => u64::try_from(*v)
                .map_err(|_| Error::bad_request(format!("value {} in column {} does not fit uint64", v, col))),
            other => Err(stored_mismatch(col, "uint64", other)),
        }
    }

    pub fn get_bool(&self, col: usize) -> Result<bool> {
        match self.cell(col, "bool", TypeId::is_integral)? {
            Value::Bool(b) => Ok(*b),
            Value::Int64(v) => Ok(*v != 0),
            Value::Uint64(v) => Ok(*v != 0),
            other => Err(stored_mismatch(col, "bool", other)),
        }
    }

    pub fn get_double(&self, col: usize) -> Result<f64> {
        match self.cell(col, "double", TypeId::is_floating)? {
            Value::Double(v) => Ok(*v),
            other => Err(stored_mismatch(col, "double", other)),
        }
    }

    pub fn get_utf8(&self, col: usize) -> Result<&TextBuf> {
        match self.cell(col, "utf8", TypeId::is_text)? {
            Value::Text(t) => Ok(t),
            other => Err(stored_mismatch(col, "utf8", other)),
        }
    }

    pub fn get_bytes(&self, col: usize) -> Result<&[u8]> {
        match self.cell(col, "bytes", |t| t == TypeId::Bytes || t.is_text())? {
            Value::Bytes(b) => Ok(b),
            Value::Text(t) => Ok(t.as_bytes()),
            other => Err(stored_mismatch(col, "bytes", other)),
        }
    }

    fn check_column(&self, col: usize) -> Result<&Column> {
        self.columns.get(col).ok_or_else(|| {
            Error::bad_request(format!(
                "column index {} out of range (result set has {} columns)",
                col,
                self.columns.len()
            ))
        })
    }

    fn current_row(&self) -> Result<&[Value]> {
        match self.cursor {
            Cursor::At(i) => Ok(&self.rows[i]),
            Cursor::BeforeFirst => Err(Error::not_found("no current row: call next_row first")),
            Cursor::Done => Err(Error::not_found("no current row: result set is exhausted")),
        }
    }

    fn cell(&self, col: usize, accessor: &str, accepts: impl Fn(TypeId) -> bool) -> Result<&Value> {
        let column = self.check_column(col)?;
        let row = self.current_row()?;
        if !accepts(column.type_id) {
            return Err(Error::bad_request(format!(
                "column {} ('{}') has type {:?}, not readable as {}",
                col,
                column.name(),
                column.type_id,
                accessor
            )));
        }
        match &row[col] {
            Value::Null => Err(Error::not_found(format!("column {} ('{}') is null", col, column.name()))),
            value => Ok(value),
        }
    }
}

fn stored_mismatch(col: usize, accessor: &str, value: &Value) -> Error {
    Error::bad_request(format!("column {} holds {:?}, not readable as {}", col, value, accessor))
}

/// All result sets returned by one query, in statement order.
#[derive(Clone, Debug, Default)]
pub struct ResultSets {
    sets: Vec<ResultSet>,
}

impl ResultSets {
    pub fn new(sets: Vec<ResultSet>) -> Self {
        Self { sets }
    }

    pub fn len(&self) -> usize {
        self.sets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sets.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&ResultSet> {
        self.sets.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ResultSet> {
        self.sets.get_mut(index)
    }

    pub fn into_inner(self) -> Vec<ResultSet> {
        self.sets
    }
}
