//!
//! Result Iteration Entry Points
//!
//! `YdbResultSets` owns every result set of one execute call, fully copied
//! out of the backend. `YdbResultSet` pointers borrow from it, as do the
//! strings and byte buffers handed out by the getters; all of them are
//! invalidated by `ydb_result_sets_free`.
//!
//! Getters validate in this order: null handle or out pointer, column
//! index, cursor position, column type, null value.
//!

use std::ffi::{c_char, c_int, c_void};
use std::ptr;

use ydb_c_core::{
    Error, Result, ResultSet, ResultSets, YDB_ERR_BAD_REQUEST, YDB_OK, ffi_status, ffi_value, free_handle, handle_mut,
    handle_ref, write_out, ydb_status_t,
};

pub struct YdbResultSets {
    sets: ResultSets,
}

impl YdbResultSets {
    pub(crate) fn new(sets: ResultSets) -> Self {
        Self { sets }
    }
}

#[repr(transparent)]
pub struct YdbResultSet(ResultSet);

fn column_index(col: c_int) -> Result<usize> {
    usize::try_from(col).map_err(|_| Error::bad_request(format!("column index {} is negative", col)))
}

/// # Safety
/// `rs` must be null or a live result set borrowed from a live
/// `YdbResultSets`.
unsafe fn result_set<'a>(rs: *const YdbResultSet) -> Result<&'a ResultSet> {
    unsafe { handle_ref(rs, "result set") }.map(|rs| &rs.0)
}

/// # Safety
/// `rs` must be null or a live result sets handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_sets_count(rs: *const YdbResultSets) -> c_int {
    ffi_value(YDB_ERR_BAD_REQUEST, || {
        Ok(unsafe { handle_ref(rs, "result sets") }?.sets.len() as c_int)
    })
}

/// Borrow result set `index`; null when out of range.
///
/// # Safety
/// `rs` must be null or a live result sets handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_sets_get(rs: *mut YdbResultSets, index: c_int) -> *mut YdbResultSet {
    ffi_value(ptr::null_mut(), || {
        let rs = unsafe { handle_mut(rs, "result sets") }?;
        let count = rs.sets.len();
        let set = usize::try_from(index)
            .ok()
            .and_then(|i| rs.sets.get_mut(i))
            .ok_or_else(|| Error::bad_request(format!("result set index {} out of range (count {})", index, count)))?;
        Ok(set as *mut ResultSet as *mut YdbResultSet)
    })
}

/// # Safety
/// `rs` must be null or a live result sets handle; it and every pointer
/// derived from it are invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_sets_free(rs: *mut YdbResultSets) {
    unsafe { free_handle(rs) }
}

/// # Safety
/// `rs` must be null or a live result set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_column_count(rs: *const YdbResultSet) -> c_int {
    ffi_value(YDB_ERR_BAD_REQUEST, || Ok(unsafe { result_set(rs) }?.column_count() as c_int))
}

/// # Safety
/// `rs` must be null or a live result set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_row_count(rs: *const YdbResultSet) -> c_int {
    ffi_value(YDB_ERR_BAD_REQUEST, || Ok(unsafe { result_set(rs) }?.row_count() as c_int))
}

/// Column name as a NUL-terminated string; null when out of range.
///
/// # Safety
/// `rs` must be null or a live result set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_column_name(rs: *const YdbResultSet, col: c_int) -> *const c_char {
    ffi_value(ptr::null(), || {
        let rs = unsafe { result_set(rs) }?;
        let column = rs
            .column(column_index(col)?)
            .ok_or_else(|| Error::bad_request(format!("column index {} out of range", col)))?;
        Ok(column.name_cstr().as_ptr())
    })
}

/// `YDB_TYPE_*` id of the column; 0 when out of range.
///
/// # Safety
/// `rs` must be null or a live result set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_column_type(rs: *const YdbResultSet, col: c_int) -> c_int {
    ffi_value(0, || {
        let rs = unsafe { result_set(rs) }?;
        let column = rs
            .column(column_index(col)?)
            .ok_or_else(|| Error::bad_request(format!("column index {} out of range", col)))?;
        Ok(column.type_id().code())
    })
}

/// Advance to the next row: 1 if positioned on a row, 0 once exhausted.
///
/// # Safety
/// `rs` must be null or a live result set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_next_row(rs: *mut YdbResultSet) -> c_int {
    ffi_value(YDB_ERR_BAD_REQUEST, || {
        let rs = unsafe { handle_mut(rs, "result set") }?;
        Ok(rs.0.next_row() as c_int)
    })
}

/// # Safety
/// `rs` must be null or a live result set; `out` and `out_len` null or
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_get_utf8(
    rs: *mut YdbResultSet,
    col: c_int,
    out: *mut *const c_char,
    out_len: *mut usize,
) -> ydb_status_t {
    ffi_status(|| {
        let rs = unsafe { result_set(rs) }?;
        if out.is_null() || out_len.is_null() {
            return Err(Error::bad_request("output pointer is null"));
        }
        let text = rs.get_utf8(column_index(col)?)?;
        unsafe {
            write_out(out, text.as_c_ptr(), "output")?;
            write_out(out_len, text.len(), "length output")
        }
    })
}

/// # Safety
/// `rs` must be null or a live result set; `out` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_get_int64(rs: *mut YdbResultSet, col: c_int, out: *mut i64) -> ydb_status_t {
    ffi_status(|| {
        let rs = unsafe { result_set(rs) }?;
        if out.is_null() {
            return Err(Error::bad_request("output pointer is null"));
        }
        let value = rs.get_int64(column_index(col)?)?;
        unsafe { write_out(out, value, "output") }
    })
}

/// # Safety
/// `rs` must be null or a live result set; `out` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_get_uint64(rs: *mut YdbResultSet, col: c_int, out: *mut u64) -> ydb_status_t {
    ffi_status(|| {
        let rs = unsafe { result_set(rs) }?;
        if out.is_null() {
            return Err(Error::bad_request("output pointer is null"));
        }
        let value = rs.get_uint64(column_index(col)?)?;
        unsafe { write_out(out, value, "output") }
    })
}

/// # Safety
/// `rs` must be null or a live result set; `out` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_get_double(rs: *mut YdbResultSet, col: c_int, out: *mut f64) -> ydb_status_t {
    ffi_status(|| {
        let rs = unsafe { result_set(rs) }?;
        if out.is_null() {
            return Err(Error::bad_request("output pointer is null"));
        }
        let value = rs.get_double(column_index(col)?)?;
        unsafe { write_out(out, value, "output") }
    })
}

/// Writes 1 or 0.
///
/// # Safety
/// `rs` must be null or a live result set; `out` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_get_bool(rs: *mut YdbResultSet, col: c_int, out: *mut c_int) -> ydb_status_t {
    ffi_status(|| {
        let rs = unsafe { result_set(rs) }?;
        if out.is_null() {
            return Err(Error::bad_request("output pointer is null"));
        }
        let value = rs.get_bool(column_index(col)?)?;
        unsafe { write_out(out, value as c_int, "output") }
    })
}

/// # Safety
/// `rs` must be null or a live result set; `out` and `out_len` null or
/// writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_get_bytes(
    rs: *mut YdbResultSet,
    col: c_int,
    out: *mut *const c_void,
    out_len: *mut usize,
) -> ydb_status_t {
    ffi_status(|| {
        let rs = unsafe { result_set(rs) }?;
        if out.is_null() || out_len.is_null() {
            return Err(Error::bad_request("output pointer is null"));
        }
        let bytes = rs.get_bytes(column_index(col)?)?;
        unsafe {
            write_out(out, bytes.as_ptr().cast::<c_void>(), "output")?;
            write_out(out_len, bytes.len(), "length output")
        }
    })
}

/// 1 if the current row's value is null, 0 if not, a negative status on
/// misuse.
///
/// # Safety
/// `rs` must be null or a live result set.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_result_set_is_null(rs: *mut YdbResultSet, col: c_int) -> c_int {
    let mut null = 0;
    let status = ffi_status(|| {
        let rs = unsafe { result_set(rs) }?;
        null = rs.is_null(column_index(col)?)? as c_int;
        Ok(())
    });
    if status == YDB_OK { null } else { status }
}
