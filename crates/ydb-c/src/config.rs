//!
//! Driver Configuration Entry Points
//!
//! `YdbDriverConfig` is a plain builder. Setters validate their arguments
//! and never touch drivers already created from the config.
//!

use std::ffi::{c_char, c_int};

use ydb_c_core::{
    DriverConfig, Error, Result, ffi_status, free_handle, handle_mut, into_handle, str_arg, ydb_status_t,
};

pub struct YdbDriverConfig {
    pub(crate) config: DriverConfig,
}

fn with_config(cfg: *mut YdbDriverConfig, update: impl FnOnce(&mut DriverConfig) -> Result<()>) -> ydb_status_t {
    ffi_status(|| {
        let cfg = unsafe { handle_mut(cfg, "config") }?;
        update(&mut cfg.config)
    })
}

#[unsafe(no_mangle)]
pub extern "C" fn ydb_driver_config_create() -> *mut YdbDriverConfig {
    into_handle(YdbDriverConfig {
        config: DriverConfig::new(),
    })
}

/// # Safety
/// `cfg` must be null or a live config handle; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_free(cfg: *mut YdbDriverConfig) {
    unsafe { free_handle(cfg) }
}

/// # Safety
/// `cfg` must be null or a live config handle; `endpoint` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_set_endpoint(
    cfg: *mut YdbDriverConfig,
    endpoint: *const c_char,
) -> ydb_status_t {
    with_config(cfg, |config| config.set_endpoint(unsafe { str_arg(endpoint, "endpoint") }?))
}

/// # Safety
/// `cfg` must be null or a live config handle; `database` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_set_database(
    cfg: *mut YdbDriverConfig,
    database: *const c_char,
) -> ydb_status_t {
    with_config(cfg, |config| config.set_database(unsafe { str_arg(database, "database") }?))
}

/// An empty token is accepted and means anonymous access.
///
/// # Safety
/// `cfg` must be null or a live config handle; `token` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_set_auth_token(
    cfg: *mut YdbDriverConfig,
    token: *const c_char,
) -> ydb_status_t {
    with_config(cfg, |config| {
        config.set_auth_token(unsafe { str_arg(token, "auth token") }?);
        Ok(())
    })
}

/// # Safety
/// `cfg` must be null or a live config handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_set_max_retries(cfg: *mut YdbDriverConfig, retries: c_int) -> ydb_status_t {
    with_config(cfg, |config| {
        config.max_retries =
            u32::try_from(retries).map_err(|_| Error::bad_request(format!("max retries {} is negative", retries)))?;
        Ok(())
    })
}

/// `0` disables the per-operation deadline.
///
/// # Safety
/// `cfg` must be null or a live config handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_set_operation_timeout(
    cfg: *mut YdbDriverConfig,
    timeout_ms: i64,
) -> ydb_status_t {
    with_config(cfg, |config| {
        config.operation_timeout_ms = u64::try_from(timeout_ms)
            .map_err(|_| Error::bad_request(format!("operation timeout {} ms is negative", timeout_ms)))?;
        Ok(())
    })
}

/// # Safety
/// `cfg` must be null or a live config handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_set_session_pool_size(
    cfg: *mut YdbDriverConfig,
    size: c_int,
) -> ydb_status_t {
    with_config(cfg, |config| {
        config.session_pool_size =
            usize::try_from(size).map_err(|_| Error::bad_request(format!("session pool size {} is negative", size)))?;
        Ok(())
    })
}

/// Overlay the keys of a TOML file onto the config.
///
/// # Safety
/// `cfg` must be null or a live config handle; `path` null or a C string.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ydb_driver_config_load_file(cfg: *mut YdbDriverConfig, path: *const c_char) -> ydb_status_t {
    with_config(cfg, |config| config.merge_file(unsafe { str_arg(path, "path") }?))
}
