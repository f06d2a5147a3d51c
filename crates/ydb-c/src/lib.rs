///
/// ydb-c - C Client Library
///
/// Exposes transactional query execution through a plain C ABI. Callers
/// hold opaque handles and check an integer status on every call; the
/// diagnostic text of the last failure is kept per thread.
///
/// Handle graph:
/// - YdbDriverConfig -> YdbDriver (copied at creation)
/// - YdbDriver -> YdbTableClient (shares ownership of the driver)
/// - YdbTableClient -> YdbTransaction (holds a pooled session)
/// - execute calls -> YdbResultSets -> YdbResultSet (fully owned copies)
///
/// Functions:
/// - Errors: last_error_message, last_error_status
/// - Config: create, free, set_endpoint, set_database, set_auth_token,
///   set_max_retries, set_operation_timeout, set_session_pool_size,
///   load_file
/// - Driver: create, start, wait_ready, free
/// - Table: client_create, client_free, execute_query, execute_scheme,
///   begin_tx
/// - Transactions: execute, commit, rollback, free
/// - Params: create, free, set_* per value type
/// - Results: sets count/get/free, column count/name/type, row_count,
///   next_row, get_* per value type, is_null
/// - Library: version_major/minor/patch, logging_init
///
/// Every entry point catches panics and reports them as YDB_ERR_INTERNAL.
///

pub mod config;
pub mod driver;
pub mod params;
pub mod query;
pub mod results;
pub mod tx;

use std::ffi::c_int;

use tracing::Level;

use ydb_c_core::{Error, ffi_status};

pub use config::*;
pub use driver::*;
pub use params::*;
pub use query::*;
pub use results::*;
pub use tx::*;
pub use ydb_c_core::{ydb_last_error_message, ydb_last_error_status};

pub const YDB_C_API_VERSION_MAJOR: c_int = 1;
pub const YDB_C_API_VERSION_MINOR: c_int = 0;
pub const YDB_C_API_VERSION_PATCH: c_int = 0;

#[unsafe(no_mangle)]
pub extern "C" fn ydb_version_major() -> c_int {
    YDB_C_API_VERSION_MAJOR
}

#[unsafe(no_mangle)]
pub extern "C" fn ydb_version_minor() -> c_int {
    YDB_C_API_VERSION_MINOR
}

#[unsafe(no_mangle)]
pub extern "C" fn ydb_version_patch() -> c_int {
    YDB_C_API_VERSION_PATCH
}

/// Install a stderr log subscriber. Levels: 0 error, 1 warn, 2 info,
/// 3 debug, 4 trace.
#[unsafe(no_mangle)]
pub extern "C" fn ydb_logging_init(level: c_int) -> c_int {
    ffi_status(|| {
        let level = match level {
            0 => Level::ERROR,
            1 => Level::WARN,
            2 => Level::INFO,
            3 => Level::DEBUG,
            4 => Level::TRACE,
            other => return Err(Error::bad_request(format!("log level {} is not in 0..=4", other))),
        };
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_max_level(level)
            .try_init()
            .map_err(|e| Error::AlreadyDone(format!("logging already initialized: {}", e)))
    })
}
