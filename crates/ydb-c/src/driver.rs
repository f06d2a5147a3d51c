//!
//! Driver and Table Client Entry Points
//!
//! A `YdbTableClient` holds its own clone of the driver, so the driver's
//! runtime and sessions stay up until the driver handle and every table
//! client created from it have been freed, in any order.
//!

use std::ffi::c_int;
use std::ptr;
use std::time::Duration;

use tracing::{info, warn};

use ydb_c_core::{
    Error, ffi_status, ffi_value, free_handle, handle_ref, into_handle, take_handle, ydb_status_t,
};
use ydb_c_engine::{Driver, TableClient};

use crate::config::YdbDriverConfig;

pub struct YdbDriver {
    pub(crate) driver: Driver,
}

pub struct YdbTableClient {
    pub(crate) client: TableClient,
}

/// Create a driver from a copy of `cfg`. Returns null on failure.
///
/// # Safety
/// `cfg` must be null or a live config handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_create(cfg: *const YdbDriverConfig) -> *mut YdbDriver {
    ffi_value(ptr::null_mut(), || {
        let cfg = unsafe { cfg.as_ref() }.ok_or_else(|| Error::bad_request("config is null"))?;
        let driver = Driver::new(cfg.config.clone())?;
        Ok(into_handle(YdbDriver { driver }))
    })
}

/// Start attaching to the cluster in the background.
///
/// # Safety
/// `drv` must be null or a live driver handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_start(drv: *mut YdbDriver) -> ydb_status_t {
    ffi_status(|| {
        unsafe { handle_ref(drv, "driver") }?.driver.start();
        Ok(())
    })
}

/// Wait until the driver is attached. A negative `timeout_ms` waits without
/// a limit; `0` only checks.
///
/// # Safety
/// `drv` must be null or a live driver handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_wait_ready(drv: *mut YdbDriver, timeout_ms: c_int) -> ydb_status_t {
    ffi_status(|| {
        let drv = unsafe { handle_ref(drv, "driver") }?;
        let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
        drv.driver.wait_ready(timeout)
    })
}

/// Release the driver handle. Blocks while the driver shuts down unless
/// table clients still share it, in which case the last of them finishes
/// the shutdown.
///
/// # Safety
/// `drv` must be null or a live driver handle; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_free(drv: *mut YdbDriver) {
    if drv.is_null() {
        return;
    }
    ffi_status(|| {
        let YdbDriver { driver } = unsafe { take_handle(drv) };
        let sharing = driver.owner_count() - 1;
        if sharing > 0 {
            warn!(table_clients = sharing, "driver freed while table clients are alive, deferring shutdown");
        } else {
            info!(endpoint = %driver.endpoint(), "shutting down driver");
        }
        drop(driver);
        Ok(())
    });
}

/// # Safety
/// `drv` must be null or a live driver handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_table_client_create(drv: *mut YdbDriver) -> *mut YdbTableClient {
    ffi_value(ptr::null_mut(), || {
        let drv = unsafe { drv.as_ref() }.ok_or_else(|| Error::bad_request("driver is null or not initialized"))?;
        Ok(into_handle(YdbTableClient {
            client: TableClient::new(&drv.driver),
        }))
    })
}

/// # Safety
/// `tc` must be null or a live table client handle; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_table_client_free(tc: *mut YdbTableClient) {
    ffi_status(|| {
        unsafe { free_handle(tc) };
        Ok(())
    });
}
