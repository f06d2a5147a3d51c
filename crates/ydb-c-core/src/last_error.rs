//!
//! Thread-Local Error State
//!
//! Each calling thread owns one slot holding the last failure's message and
//! status. A failing entry point overwrites it before returning; successful
//! calls leave it alone, so the message stays readable until the next
//! failure on the same thread.
//!

use std::cell::RefCell;
use std::ffi::{c_char, CString};

use crate::error::{ydb_status_t, Error, YDB_OK};

struct ErrorState {
    message: CString,
    status: ydb_status_t,
}

thread_local! {
    static LAST_ERROR: RefCell<ErrorState> = RefCell::new(ErrorState {
        message: CString::default(),
        status: YDB_OK,
    });
}

/// Record `err` as this thread's last failure and return its status code.
pub fn set_last_error(err: &Error) -> ydb_status_t {
    let status = err.status();
    let message = to_cstring(err.to_string());
    LAST_ERROR.with(|slot| {
        let mut slot = slot.borrow_mut();
        slot.message = message;
        slot.status = status;
    });
    status
}

/// Message of the last failure on this thread (empty if none yet).
pub fn last_error_message() -> String {
    LAST_ERROR.with(|slot| slot.borrow().message.to_string_lossy().into_owned())
}

pub fn last_error_status() -> ydb_status_t {
    LAST_ERROR.with(|slot| slot.borrow().status)
}

fn to_cstring(message: String) -> CString {
    CString::new(message).unwrap_or_else(|e| {
        let mut bytes = e.into_vec();
        bytes.retain(|b| *b != 0);
        CString::new(bytes).unwrap_or_default()
    })
}

/// Returns the last error message recorded on the calling thread.
///
/// Never null. The pointer stays valid until the next failing call made by
/// the same thread.
#[unsafe(no_mangle)]
pub extern "C" fn ydb_last_error_message() -> *const c_char {
    // The CString lives in thread-local storage, so its buffer outlives the
    // borrow; it is only replaced by the next set_last_error on this thread.
    LAST_ERROR.with(|slot| slot.borrow().message.as_ptr())
}

/// Returns the status code of the last failure on the calling thread.
#[unsafe(no_mangle)]
pub extern "C" fn ydb_last_error_status() -> ydb_status_t {
    last_error_status()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{YDB_ERR_BAD_REQUEST, YDB_ERR_GENERIC};
    use std::ffi::CStr;
    use std::thread;

    #[test]
    fn test_empty_before_first_failure() {
        thread::spawn(|| {
            let ptr = ydb_last_error_message();
            assert!(!ptr.is_null());
            let msg = unsafe { CStr::from_ptr(ptr) };
            assert_eq!(msg.to_bytes(), b"");
            assert_eq!(ydb_last_error_status(), YDB_OK);
        })
        .join()
        .unwrap();
    }

    #[test]
    fn test_overwritten_by_each_failure() {
        let status = set_last_error(&Error::bad_request("config is null"));
        assert_eq!(status, YDB_ERR_BAD_REQUEST);
        assert!(last_error_message().contains("config is null"));

        set_last_error(&Error::Generic("table not found".into()));
        assert_eq!(last_error_message(), "table not found");
        assert_eq!(ydb_last_error_status(), YDB_ERR_GENERIC);
    }

    #[test]
    fn test_errors_stay_on_their_thread() {
        set_last_error(&Error::Generic("main thread failure".into()));

        thread::spawn(|| {
            set_last_error(&Error::Generic("worker failure".into()));
            assert_eq!(last_error_message(), "worker failure");
        })
        .join()
        .unwrap();

        assert_eq!(last_error_message(), "main thread failure");
    }

    #[test]
    fn test_interior_nul_is_stripped() {
        set_last_error(&Error::Generic("bad\0text".into()));
        assert_eq!(last_error_message(), "badtext");
    }
}
