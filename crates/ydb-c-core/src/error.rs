//!
//! Status Codes and Errors
//!
//! Every C entry point returns a `ydb_status_t`: `YDB_OK` on success or one
//! of the negative error classes below. Inside Rust the same information
//! travels as `Error`, which pairs the class with a diagnostic message.
//!

use thiserror::Error;

#[allow(non_camel_case_types)]
pub type ydb_status_t = i32;

pub const YDB_OK: ydb_status_t = 0;
pub const YDB_ERR_GENERIC: ydb_status_t = -1;
pub const YDB_ERR_CONNECTION: ydb_status_t = -2;
pub const YDB_ERR_TIMEOUT: ydb_status_t = -3;
pub const YDB_ERR_BAD_REQUEST: ydb_status_t = -4;
pub const YDB_ERR_NOT_FOUND: ydb_status_t = -5;
pub const YDB_ERR_INTERNAL: ydb_status_t = -6;
pub const YDB_ERR_BUFFER_TOO_SMALL: ydb_status_t = -7;
pub const YDB_ERR_NO_MORE_RESULTS: ydb_status_t = -8;
pub const YDB_ERR_ALREADY_DONE: ydb_status_t = -9;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    #[error("{0}")]
    Generic(String),

    #[error("connection error: {0}")]
    Connection(String),

    #[error("timeout: {0}")]
    Timeout(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("buffer too small: {0}")]
    BufferTooSmall(String),

    #[error("no more results")]
    NoMoreResults,

    #[error("already done: {0}")]
    AlreadyDone(String),
}

impl Error {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Error::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Error::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Error::Internal(msg.into())
    }

    /// The C status code for this error class.
    pub fn status(&self) -> ydb_status_t {
        match self {
            Error::Generic(_) => YDB_ERR_GENERIC,
            Error::Connection(_) => YDB_ERR_CONNECTION,
            Error::Timeout(_) => YDB_ERR_TIMEOUT,
            Error::BadRequest(_) => YDB_ERR_BAD_REQUEST,
            Error::NotFound(_) => YDB_ERR_NOT_FOUND,
            Error::Internal(_) => YDB_ERR_INTERNAL,
            Error::BufferTooSmall(_) => YDB_ERR_BUFFER_TOO_SMALL,
            Error::NoMoreResults => YDB_ERR_NO_MORE_RESULTS,
            Error::AlreadyDone(_) => YDB_ERR_ALREADY_DONE,
        }
    }
}
