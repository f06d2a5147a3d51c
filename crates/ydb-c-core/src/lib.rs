//!
//! ydb-c-core - Core Types
//!
//! This crate provides the fundamental types shared across the ydb-c crates:
//!
//! - `Error` and the `YDB_*` status codes returned across the C ABI
//! - Thread-local last-error storage backing `ydb_last_error_message`
//! - `TypeId` and `Value` for column metadata and owned cell data
//! - `QueryParams` for typed, named query parameters
//! - `ResultSets` / `ResultSet` holding fully materialized query output
//! - `DriverConfig` for connection parameters
//! - FFI helpers for C strings and panic containment
//!
//! Nothing in here performs I/O; the engine crate talks to the cluster and
//! hands back values built from these types.
//!

pub mod config;
pub mod error;
pub mod ffi;
pub mod last_error;
pub mod params;
pub mod result;
pub mod types;

pub use config::*;
pub use error::*;
pub use ffi::*;
pub use last_error::*;
pub use params::*;
pub use result::*;
pub use types::*;
