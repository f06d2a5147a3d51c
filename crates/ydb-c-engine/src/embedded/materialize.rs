//! Copies statement output out of SQLite into owned `ResultSet`s.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Batch, Connection, Statement};

use ydb_c_core::{Column, ParamValue, QueryParams, ResultSet, TypeId, Value};

use super::classify;
use crate::status::{OperationError, OperationResult, StatusCode};

/// Run every statement in `sql` in order. Statements that produce columns
/// contribute one result set each when `collect` is set; otherwise their
/// rows are drained and dropped.
pub(crate) fn run_statements(
    conn: &Connection,
    sql: &str,
    params: &QueryParams,
    collect: bool,
) -> OperationResult<Vec<ResultSet>> {
    let mut sets = Vec::new();
    let mut batch = Batch::new(conn, sql);
    while let Some(mut stmt) = batch.next().map_err(classify)? {
        let unsigned = bind_params(&mut stmt, params)?;
        if stmt.column_count() == 0 {
            stmt.raw_execute().map_err(classify)?;
            continue;
        }
        let set = materialize(&mut stmt, &unsigned)?;
        if collect {
            sets.push(set);
        }
    }
    Ok(sets)
}

/// Bind every `$name` in the statement. Returns the names bound to
/// unsigned values so echoed parameters keep their type.
fn bind_params(stmt: &mut Statement<'_>, params: &QueryParams) -> OperationResult<Vec<String>> {
    let mut unsigned = Vec::new();
    for index in 1..=stmt.parameter_count() {
        let name = match stmt.parameter_name(index) {
            Some(name) if !name.starts_with('?') => name[1..].to_string(),
            _ => {
                return Err(OperationError::new(
                    StatusCode::BadRequest,
                    "positional parameters are not supported, use $name",
                ));
            }
        };
        let value = params.get(&name).ok_or_else(|| {
            OperationError::new(StatusCode::BadRequest, format!("parameter ${} is not set", name))
        })?;
        stmt.raw_bind_parameter(index, to_sql(value)).map_err(classify)?;
        if matches!(value, ParamValue::Uint32(_) | ParamValue::Uint64(_)) {
            unsigned.push(name);
        }
    }
    Ok(unsigned)
}

fn to_sql(value: &ParamValue) -> SqlValue {
    match value {
        ParamValue::Bool(b) => SqlValue::Integer(*b as i64),
        ParamValue::Int32(v) => SqlValue::Integer(*v as i64),
        ParamValue::Uint32(v) => SqlValue::Integer(*v as i64),
        ParamValue::Int64(v) => SqlValue::Integer(*v),
        // Stored as the same 64 bits; unsigned columns read it back as u64.
        ParamValue::Uint64(v) => SqlValue::Integer(*v as i64),
        ParamValue::Float(v) => SqlValue::Real(*v as f64),
        ParamValue::Double(v) => SqlValue::Real(*v),
        ParamValue::Utf8(s) | ParamValue::Json(s) => SqlValue::Text(s.clone()),
        ParamValue::Bytes(b) => SqlValue::Blob(b.clone()),
    }
}

fn materialize(stmt: &mut Statement<'_>, unsigned: &[String]) -> OperationResult<ResultSet> {
    let described: Vec<(String, Option<TypeId>)> = stmt
        .columns()
        .iter()
        .map(|c| (c.name().to_string(), c.decl_type().and_then(TypeId::from_decl)))
        .collect();
    let width = described.len();

    let mut raw_rows: Vec<Vec<SqlValue>> = Vec::new();
    let mut rows = stmt.raw_query();
    while let Some(row) = rows.next().map_err(classify)? {
        let mut values = Vec::with_capacity(width);
        for i in 0..width {
            values.push(row.get::<_, SqlValue>(i).map_err(classify)?);
        }
        raw_rows.push(values);
    }

    let mut columns = Vec::with_capacity(width);
    for (i, (name, declared)) in described.iter().enumerate() {
        let type_id = declared.unwrap_or_else(|| {
            let inferred = infer_type(raw_rows.iter().map(|r| &r[i]));
            // `SELECT $u` and `SELECT $u AS u` echo an unsigned parameter.
            let echoed = unsigned.iter().any(|p| name == p || name.strip_prefix('$') == Some(p.as_str()));
            if echoed && inferred == TypeId::Int64 { TypeId::Uint64 } else { inferred }
        });
        columns.push(Column::new(name, type_id));
    }

    let mut out = Vec::with_capacity(raw_rows.len());
    for raw in raw_rows {
        let mut values = Vec::with_capacity(width);
        for (column, cell) in columns.iter().zip(raw) {
            values.push(convert(column, cell)?);
        }
        out.push(values);
    }
    Ok(ResultSet::new(columns, out))
}

/// Type of an expression column, taken from its first non-null value.
fn infer_type<'a>(mut cells: impl Iterator<Item = &'a SqlValue>) -> TypeId {
    match cells.find(|v| !matches!(v, SqlValue::Null)) {
        Some(SqlValue::Integer(_)) => TypeId::Int64,
        Some(SqlValue::Real(_)) => TypeId::Double,
        Some(SqlValue::Blob(_)) => TypeId::Bytes,
        _ => TypeId::Utf8,
    }
}

// 2^63 and 2^64, exact as f64.
const I64_LIMIT: f64 = 9_223_372_036_854_775_808.0;
const U64_LIMIT: f64 = 18_446_744_073_709_551_616.0;

fn convert(column: &Column, cell: SqlValue) -> OperationResult<Value> {
    let mismatch = |cell: &SqlValue| {
        OperationError::new(
            StatusCode::GenericError,
            format!("column '{}': cannot read {:?} as {:?}", column.name(), cell, column.type_id()),
        )
    };
    if let SqlValue::Null = cell {
        return Ok(Value::Null);
    }

    let value = match column.type_id() {
        TypeId::Bool => match &cell {
            SqlValue::Integer(i) => Value::Bool(*i != 0),
            SqlValue::Real(f) => Value::Bool(*f != 0.0),
            SqlValue::Text(s) => match s.to_ascii_lowercase().as_str() {
                "true" | "1" => Value::Bool(true),
                "false" | "0" => Value::Bool(false),
                _ => return Err(mismatch(&cell)),
            },
            _ => return Err(mismatch(&cell)),
        },
        TypeId::Int32 | TypeId::Int64 => match &cell {
            SqlValue::Integer(i) => Value::Int64(*i),
            SqlValue::Real(f) if f.fract() == 0.0 && (-I64_LIMIT..I64_LIMIT).contains(f) => Value::Int64(*f as i64),
            SqlValue::Text(s) => Value::Int64(s.trim().parse().map_err(|_| mismatch(&cell))?),
            _ => return Err(mismatch(&cell)),
        },
        TypeId::Uint32 | TypeId::Uint64 => match &cell {
            SqlValue::Integer(i) => Value::Uint64(*i as u64),
            SqlValue::Real(f) if f.fract() == 0.0 && (0.0..U64_LIMIT).contains(f) => Value::Uint64(*f as u64),
            SqlValue::Text(s) => Value::Uint64(s.trim().parse().map_err(|_| mismatch(&cell))?),
            _ => return Err(mismatch(&cell)),
        },
        TypeId::Float | TypeId::Double => match &cell {
            SqlValue::Real(f) => Value::Double(*f),
            SqlValue::Integer(i) => Value::Double(*i as f64),
            SqlValue::Text(s) => Value::Double(s.trim().parse().map_err(|_| mismatch(&cell))?),
            _ => return Err(mismatch(&cell)),
        },
        TypeId::Utf8 | TypeId::Json => match cell {
            SqlValue::Text(s) => Value::text(&s),
            SqlValue::Integer(i) => Value::text(&i.to_string()),
            SqlValue::Real(f) => Value::text(&f.to_string()),
            SqlValue::Blob(b) => match String::from_utf8(b) {
                Ok(s) => Value::text(&s),
                Err(e) => return Err(mismatch(&SqlValue::Blob(e.into_bytes()))),
            },
            SqlValue::Null => Value::Null,
        },
        TypeId::Bytes => match cell {
            SqlValue::Blob(b) => Value::Bytes(b),
            SqlValue::Text(s) => Value::Bytes(s.into_bytes()),
            SqlValue::Integer(i) => Value::Bytes(i.to_string().into_bytes()),
            SqlValue::Real(f) => Value::Bytes(f.to_string().into_bytes()),
            SqlValue::Null => Value::Null,
        },
        TypeId::Date | TypeId::Datetime | TypeId::Timestamp => match &cell {
            SqlValue::Integer(i) if *i >= 0 => Value::Uint64(*i as u64),
            SqlValue::Real(f) if f.fract() == 0.0 && (0.0..U64_LIMIT).contains(f) => Value::Uint64(*f as u64),
            SqlValue::Text(s) => {
                let ticks = parse_time(s.trim(), column.type_id()).ok_or_else(|| mismatch(&cell))?;
                Value::Uint64(u64::try_from(ticks).map_err(|_| mismatch(&cell))?)
            }
            _ => return Err(mismatch(&cell)),
        },
    };
    Ok(value)
}

/// Parse ISO-8601 text into days (Date), seconds (Datetime) or
/// microseconds (Timestamp) since the Unix epoch.
fn parse_time(text: &str, type_id: TypeId) -> Option<i64> {
    let instant = if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        dt.naive_utc()
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f") {
        dt
    } else if let Ok(dt) = NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S%.f") {
        dt
    } else {
        NaiveDate::parse_from_str(text, "%Y-%m-%d").ok()?.and_time(NaiveTime::MIN)
    };
    let utc = instant.and_utc();
    match type_id {
        TypeId::Date => Some(utc.timestamp().div_euclid(86_400)),
        TypeId::Datetime => Some(utc.timestamp()),
        TypeId::Timestamp => Some(utc.timestamp_micros()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conn() -> Connection {
        Connection::open_in_memory().unwrap()
    }

    fn query(conn: &Connection, sql: &str, params: &QueryParams) -> Vec<ResultSet> {
        run_statements(conn, sql, params, true).unwrap()
    }

    #[test]
    fn test_one_result_set_per_select() {
        let c = conn();
        let sets = query(
            &c,
            "CREATE TABLE t (x Int64); INSERT INTO t VALUES (1), (2); SELECT x FROM t; SELECT 'a' AS s",
            &QueryParams::new(),
        );
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].row_count(), 2);
        assert_eq!(sets[0].column(0).unwrap().type_id(), TypeId::Int64);
        assert_eq!(sets[1].column(0).unwrap().name(), "s");
        assert_eq!(sets[1].column(0).unwrap().type_id(), TypeId::Utf8);
    }

    #[test]
    fn test_declared_types_win() {
        let c = conn();
        let sets = query(
            &c,
            "CREATE TABLE t (b Bool, u Uint64, f Float, d Date, ts Timestamp, j Json);
             INSERT INTO t VALUES (1, -1, 2, '2024-01-02', '1970-01-01T00:00:01Z', '{}');
             SELECT b, u, f, d, ts, j FROM t",
            &QueryParams::new(),
        );
        let mut rs = sets.into_iter().next().unwrap();
        let types: Vec<TypeId> = rs.columns().iter().map(Column::type_id).collect();
        assert_eq!(
            types,
            [TypeId::Bool, TypeId::Uint64, TypeId::Float, TypeId::Date, TypeId::Timestamp, TypeId::Json]
        );
        assert!(rs.next_row());
        assert!(rs.get_bool(0).unwrap());
        assert_eq!(rs.get_uint64(1).unwrap(), u64::MAX);
        assert_eq!(rs.get_double(2).unwrap(), 2.0);
        assert_eq!(rs.get_uint64(3).unwrap(), 19_724);
        assert_eq!(rs.get_uint64(4).unwrap(), 1_000_000);
        assert_eq!(rs.get_utf8(5).unwrap().as_str(), "{}");
    }

    #[test]
    fn test_params_bind_by_name() {
        let c = conn();
        let mut p = QueryParams::new();
        p.set("n", ParamValue::Int32(-3)).unwrap();
        p.set("blob", ParamValue::Bytes(vec![0, 1, 2])).unwrap();
        p.set("f", ParamValue::Float(0.1)).unwrap();
        let mut rs = query(&c, "SELECT $n AS n, $blob AS blob, $f AS f", &p).remove(0);
        assert!(rs.next_row());
        assert_eq!(rs.get_int64(0).unwrap(), -3);
        assert_eq!(rs.get_bytes(1).unwrap(), &[0, 1, 2]);
        assert_eq!(rs.get_double(2).unwrap() as f32, 0.1_f32);
    }

    #[test]
    fn test_missing_and_positional_params() {
        let c = conn();
        let err = run_statements(&c, "SELECT $absent", &QueryParams::new(), true).unwrap_err();
        assert_eq!(err.status, StatusCode::BadRequest);
        assert!(err.to_string().contains("$absent"));

        let err = run_statements(&c, "SELECT ?", &QueryParams::new(), true).unwrap_err();
        assert_eq!(err.status, StatusCode::BadRequest);
    }

    #[test]
    fn test_null_only_column_is_utf8() {
        let c = conn();
        let mut rs = query(&c, "SELECT NULL AS empty", &QueryParams::new()).remove(0);
        assert_eq!(rs.column(0).unwrap().type_id(), TypeId::Utf8);
        assert!(rs.next_row());
        assert!(rs.is_null(0).unwrap());
    }

    #[test]
    fn test_echoed_unsigned_params_keep_type() {
        let c = conn();
        let mut p = QueryParams::new();
        p.set("big", ParamValue::Uint64(u64::MAX)).unwrap();
        p.set("small", ParamValue::Uint32(7)).unwrap();
        p.set("signed", ParamValue::Int64(-1)).unwrap();
        let mut rs = query(&c, "SELECT $big AS big, $small, $signed AS s, $big + 0 AS plus", &p).remove(0);
        let types: Vec<TypeId> = rs.columns().iter().map(Column::type_id).collect();
        assert_eq!(types, [TypeId::Uint64, TypeId::Uint64, TypeId::Int64, TypeId::Int64]);
        assert!(rs.next_row());
        assert_eq!(rs.get_uint64(0).unwrap(), u64::MAX);
        assert_eq!(rs.get_uint64(1).unwrap(), 7);
        assert_eq!(rs.get_int64(2).unwrap(), -1);
    }

    #[test]
    fn test_whole_reals_read_as_integers() {
        let c = conn();
        let mut rs = query(
            &c,
            "CREATE TABLE n (i Int64, u Uint64, d Date);
             INSERT INTO n VALUES (3.0, 1e19, 19724.0);
             SELECT i, u, d FROM n",
            &QueryParams::new(),
        )
        .remove(0);
        assert!(rs.next_row());
        assert_eq!(rs.get_int64(0).unwrap(), 3);
        assert_eq!(rs.get_uint64(1).unwrap(), 10_000_000_000_000_000_000);
        assert_eq!(rs.get_uint64(2).unwrap(), 19_724);

        let err = run_statements(
            &c,
            "INSERT INTO n VALUES (1, 2.5, 0); SELECT u FROM n",
            &QueryParams::new(),
            true,
        )
        .unwrap_err();
        assert_eq!(err.status, StatusCode::GenericError);
        assert!(err.to_string().contains("column 'u'"));
    }

    #[test]
    fn test_uncollected_rows_are_dropped() {
        let c = conn();
        let sets = run_statements(&c, "CREATE TABLE t (x Int64); SELECT x FROM t", &QueryParams::new(), false)
            .unwrap();
        assert!(sets.is_empty());
    }

    #[test]
    fn test_parse_time_units() {
        assert_eq!(parse_time("1970-01-02", TypeId::Date), Some(1));
        assert_eq!(parse_time("1970-01-01 00:01:00", TypeId::Datetime), Some(60));
        assert_eq!(parse_time("1970-01-01T00:00:00.5+00:00", TypeId::Timestamp), Some(500_000));
        assert_eq!(parse_time("yesterday", TypeId::Date), None);
    }
}
