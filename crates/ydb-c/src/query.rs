//!
//! Single-Shot Query Entry Points
//!
//! `ydb_table_execute_query` runs one query in its own serializable
//! transaction, retrying transient failures. On success `*out` receives a
//! new `YdbResultSets`; on failure `*out` is left untouched.
//!

use std::ffi::c_char;

use ydb_c_core::{Error, ffi_status, handle_ref, into_handle, str_arg, write_out, ydb_status_t};

use crate::driver::YdbTableClient;
use crate::params::YdbQueryParams;
use crate::results::YdbResultSets;

/// # Safety
/// `tc` must be null or a live table client; `query` null or a C string;
/// `params` null or a live params handle; `out` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_table_execute_query(
    tc: *mut YdbTableClient,
    query: *const c_char,
    params: *const YdbQueryParams,
    out: *mut *mut YdbResultSets,
) -> ydb_status_t {
    ffi_status(|| {
        let tc = unsafe { handle_ref(tc, "table client") }?;
        let query = unsafe { str_arg(query, "query") }?;
        if out.is_null() {
            return Err(Error::bad_request("result output is null"));
        }
        let params = unsafe { params.as_ref() }.map(|p| &p.params);
        let sets = tc.client.execute_data_query(query, params)?;
        unsafe { write_out(out, into_handle(YdbResultSets::new(sets)), "result output") }
    })
}

/// # Safety
/// `tc` must be null or a live table client; `ddl` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_table_execute_scheme(tc: *mut YdbTableClient, ddl: *const c_char) -> ydb_status_t {
    ffi_status(|| {
        let tc = unsafe { handle_ref(tc, "table client") }?;
        let ddl = unsafe { str_arg(ddl, "query") }?;
        tc.client.execute_scheme_query(ddl)
    })
}
