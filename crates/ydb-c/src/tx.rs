//!
//! Explicit Transaction Entry Points
//!
//! `ydb_table_begin_tx` pins a session for the transaction's lifetime.
//! After a commit or rollback every further call on the handle fails with
//! `YDB_ERR_ALREADY_DONE`; after a failed statement only rollback and free
//! are accepted. Freeing an unfinished transaction rolls it back.
//!

use std::ffi::{c_char, c_int};

use ydb_c_core::{
    Error, ffi_status, free_handle, handle_mut, handle_ref, into_handle, str_arg, write_out, ydb_status_t,
};
use ydb_c_engine::{Transaction, TxMode};

use crate::driver::YdbTableClient;
use crate::params::YdbQueryParams;
use crate::results::YdbResultSets;

pub use ydb_c_engine::{YDB_TX_ONLINE_RO, YDB_TX_SERIALIZABLE_RW, YDB_TX_SNAPSHOT_RO, YDB_TX_STALE_RO};

pub struct YdbTransaction {
    tx: Transaction,
}

/// # Safety
/// `tc` must be null or a live table client; `out_tx` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_table_begin_tx(
    tc: *mut YdbTableClient,
    mode: c_int,
    out_tx: *mut *mut YdbTransaction,
) -> ydb_status_t {
    ffi_status(|| {
        let tc = unsafe { handle_ref(tc, "table client") }?;
        if out_tx.is_null() {
            return Err(Error::bad_request("transaction output is null"));
        }
        let mode = TxMode::from_code(mode)
            .ok_or_else(|| Error::bad_request(format!("unknown transaction mode {}", mode)))?;
        let tx = tc.client.begin_transaction(mode)?;
        unsafe { write_out(out_tx, into_handle(YdbTransaction { tx }), "transaction output") }
    })
}

/// # Safety
/// `tx` must be null or a live transaction; `query` null or a C string;
/// `params` null or a live params handle; `out` null or writable.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_tx_execute(
    tx: *mut YdbTransaction,
    query: *const c_char,
    params: *const YdbQueryParams,
    out: *mut *mut YdbResultSets,
) -> ydb_status_t {
    ffi_status(|| {
        let tx = unsafe { handle_mut(tx, "transaction") }?;
        let query = unsafe { str_arg(query, "query") }?;
        if out.is_null() {
            return Err(Error::bad_request("result output is null"));
        }
        let params = unsafe { params.as_ref() }.map(|p| &p.params);
        let sets = tx.tx.execute(query, params)?;
        unsafe { write_out(out, into_handle(YdbResultSets::new(sets)), "result output") }
    })
}

/// # Safety
/// `tx` must be null or a live transaction.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_tx_commit(tx: *mut YdbTransaction) -> ydb_status_t {
    ffi_status(|| unsafe { handle_mut(tx, "transaction") }?.tx.commit())
}

/// # Safety
/// `tx` must be null or a live transaction.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_tx_rollback(tx: *mut YdbTransaction) -> ydb_status_t {
    ffi_status(|| unsafe { handle_mut(tx, "transaction") }?.tx.rollback())
}

/// # Safety
/// `tx` must be null or a live transaction; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_tx_free(tx: *mut YdbTransaction) {
    // Dropping rolls back on the driver runtime; keep panics on this side.
    ffi_status(|| {
        unsafe { free_handle(tx) };
        Ok(())
    });
}
