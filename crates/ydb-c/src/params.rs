//! Query parameter builder entry points. Names may be given with or
//! without the leading `$`; setting a name again replaces its value.

use std::ffi::{c_char, c_int, c_void};
use std::slice;

use ydb_c_core::{
    Error, ParamValue, QueryParams, Result, ffi_status, free_handle, handle_mut, into_handle, str_arg, ydb_status_t,
};

pub struct YdbQueryParams {
    pub(crate) params: QueryParams,
}

unsafe fn set_param(
    p: *mut YdbQueryParams,
    name: *const c_char,
    value: impl FnOnce() -> Result<ParamValue>,
) -> ydb_status_t {
    ffi_status(|| {
        let p = unsafe { handle_mut(p, "params") }?;
        let name = unsafe { str_arg(name, "parameter name") }?;
        p.params.set(name, value()?)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn ydb_query_params_create() -> *mut YdbQueryParams {
    into_handle(YdbQueryParams {
        params: QueryParams::new(),
    })
}

/// # Safety
/// `p` must be null or a live params handle; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_free(p: *mut YdbQueryParams) {
    unsafe { free_handle(p) }
}

/// # Safety
/// `p` must be null or a live params handle; strings null or C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_utf8(
    p: *mut YdbQueryParams,
    name: *const c_char,
    value: *const c_char,
) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Utf8(str_arg(value, "value")?.to_string()))) }
}

/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_int32(p: *mut YdbQueryParams, name: *const c_char, value: i32) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Int32(value))) }
}

/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_uint32(p: *mut YdbQueryParams, name: *const c_char, value: u32) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Uint32(value))) }
}

/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_int64(p: *mut YdbQueryParams, name: *const c_char, value: i64) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Int64(value))) }
}

/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_uint64(p: *mut YdbQueryParams, name: *const c_char, value: u64) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Uint64(value))) }
}

/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_float(p: *mut YdbQueryParams, name: *const c_char, value: f32) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Float(value))) }
}

/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_double(p: *mut YdbQueryParams, name: *const c_char, value: f64) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Double(value))) }
}

/// Any non-zero `value` is true.
///
/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_bool(p: *mut YdbQueryParams, name: *const c_char, value: c_int) -> ydb_status_t {
    unsafe { set_param(p, name, || Ok(ParamValue::Bool(value != 0))) }
}

/// Copies `len` bytes from `data`. `data` may be null only when `len` is 0.
///
/// # Safety
/// `p` must be null or a live params handle; `name` null or a C string;
/// `data` valid for `len` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_bytes(
    p: *mut YdbQueryParams,
    name: *const c_char,
    data: *const c_void,
    len: usize,
) -> ydb_status_t {
    unsafe {
        set_param(p, name, || {
            if data.is_null() {
                if len != 0 {
                    return Err(Error::bad_request(format!("data is null but length is {}", len)));
                }
                return Ok(ParamValue::Bytes(Vec::new()));
            }
            Ok(ParamValue::Bytes(slice::from_raw_parts(data.cast::<u8>(), len).to_vec()))
        })
    }
}

/// Binds JSON text after checking that it parses.
///
/// # Safety
/// `p` must be null or a live params handle; strings null or C strings.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_query_params_set_json(
    p: *mut YdbQueryParams,
    name: *const c_char,
    json: *const c_char,
) -> ydb_status_t {
    ffi_status(|| {
        let p = unsafe { handle_mut(p, "params") }?;
        let name = unsafe { str_arg(name, "parameter name") }?;
        let json = unsafe { str_arg(json, "json") }?;
        p.params.set_json(name, json)
    })
}
