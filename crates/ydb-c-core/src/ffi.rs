//!
//! FFI Helpers
//!
//! Shared plumbing for the `extern "C"` entry points:
//!
//! - boxing values into opaque handles and releasing them
//! - borrowing handles and C strings with null checks
//! - running an entry point body so that errors land in the thread-local
//!   error state and panics never unwind into the caller
//!

use std::any::Any;
use std::ffi::{c_char, CStr};
use std::panic::{catch_unwind, AssertUnwindSafe};

use crate::error::{ydb_status_t, Error, Result, YDB_OK};
use crate::last_error::set_last_error;

/// Move `value` to the heap and hand ownership to the caller.
pub fn into_handle<T>(value: T) -> *mut T {
    Box::into_raw(Box::new(value))
}

/// Reclaim and drop a handle created by `into_handle`. Null is ignored.
///
/// # Safety
/// `ptr` must be null or come from `into_handle::<T>` and not have been
/// freed already.
pub unsafe fn free_handle<T>(ptr: *mut T) {
    if !ptr.is_null() {
        drop(unsafe { Box::from_raw(ptr) });
    }
}

/// Take ownership back from a handle without dropping it.
///
/// # Safety
/// Same contract as `free_handle`; `ptr` must not be null.
pub unsafe fn take_handle<T>(ptr: *mut T) -> T {
    *unsafe { Box::from_raw(ptr) }
}

/// # Safety
/// `ptr` must be null or point to a live `T`.
pub unsafe fn handle_ref<'a, T>(ptr: *const T, what: &str) -> Result<&'a T> {
    unsafe { ptr.as_ref() }.ok_or_else(|| Error::bad_request(format!("{} is null", what)))
}

/// # Safety
/// `ptr` must be null or point to a live `T` not aliased elsewhere.
pub unsafe fn handle_mut<'a, T>(ptr: *mut T, what: &str) -> Result<&'a mut T> {
    unsafe { ptr.as_mut() }.ok_or_else(|| Error::bad_request(format!("{} is null", what)))
}

/// Borrow a NUL-terminated UTF-8 argument.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string that outlives `'a`.
pub unsafe fn str_arg<'a>(ptr: *const c_char, what: &str) -> Result<&'a str> {
    if ptr.is_null() {
        return Err(Error::bad_request(format!("{} is null", what)));
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map_err(|e| Error::bad_request(format!("{} is not valid UTF-8: {}", what, e)))
}

/// Write through an out-pointer, rejecting null.
///
/// # Safety
/// `out` must be null or valid for writes.
pub unsafe fn write_out<T>(out: *mut T, value: T, what: &str) -> Result<()> {
    if out.is_null() {
        return Err(Error::bad_request(format!("{} is null", what)));
    }
    unsafe { out.write(value) };
    Ok(())
}

/// Run an entry point body returning a status code.
pub fn ffi_status(body: impl FnOnce() -> Result<()>) -> ydb_status_t {
    match ffi_call(body) {
        Ok(()) => YDB_OK,
        Err(status) => status,
    }
}

/// Run an entry point body returning a value, or `on_error` after the
/// failure has been recorded.
pub fn ffi_value<T>(on_error: T, body: impl FnOnce() -> Result<T>) -> T {
    ffi_call(body).unwrap_or(on_error)
}

fn ffi_call<T>(body: impl FnOnce() -> Result<T>) -> std::result::Result<T, ydb_status_t> {
    let outcome = catch_unwind(AssertUnwindSafe(body))
        .unwrap_or_else(|payload| Err(Error::internal(panic_message(payload.as_ref()))));
    outcome.map_err(|err| set_last_error(&err))
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("panic: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("panic: {}", s)
    } else {
        "panic: unknown payload".to_string()
    }
}
