///
/// # Driver Configuration
///
/// `DriverConfig` is the mutable builder behind `YdbDriverConfig`. It can be
/// filled field by field through the C setters or loaded from a TOML file.
/// Driver creation takes a copy, so later edits never reach a live driver.
///
/// ## Example ydb.toml
///
/// ```toml
/// endpoint = "grpc://localhost:2136"
/// database = "/local"
/// auth_token = ""
/// max_retries = 5
/// operation_timeout_ms = 10000
/// ```
///
/// Keys missing from the file keep their current value; unknown keys are
/// rejected.
///

use std::path::Path;

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 10;
pub const DEFAULT_FAST_BACKOFF_MS: u64 = 5;
pub const DEFAULT_SLOW_BACKOFF_MS: u64 = 50;
pub const DEFAULT_SESSION_POOL_SIZE: usize = 16;
pub const DEFAULT_WORKER_THREADS: usize = 2;

#[derive(Clone, Debug, PartialEq)]
pub struct DriverConfig {
    pub endpoint: String,
    pub database: String,
    pub auth_token: String,
    pub max_retries: u32,
    pub fast_backoff_ms: u64,
    pub slow_backoff_ms: u64,
    /// 0 disables the per-operation deadline.
    pub operation_timeout_ms: u64,
    pub session_pool_size: usize,
    pub worker_threads: usize,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            endpoint: String::new(),
            database: String::new(),
            auth_token: String::new(),
            max_retries: DEFAULT_MAX_RETRIES,
            fast_backoff_ms: DEFAULT_FAST_BACKOFF_MS,
            slow_backoff_ms: DEFAULT_SLOW_BACKOFF_MS,
            operation_timeout_ms: 0,
            session_pool_size: DEFAULT_SESSION_POOL_SIZE,
            worker_threads: DEFAULT_WORKER_THREADS,
        }
    }
}

/// On-disk shape: every key optional so a file can overlay a builder.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    endpoint: Option<String>,
    database: Option<String>,
    auth_token: Option<String>,
    max_retries: Option<u32>,
    fast_backoff_ms: Option<u64>,
    slow_backoff_ms: Option<u64>,
    operation_timeout_ms: Option<u64>,
    session_pool_size: Option<usize>,
    worker_threads: Option<usize>,
}

impl DriverConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_endpoint(&mut self, endpoint: &str) -> Result<()> {
        if endpoint.is_empty() {
            return Err(Error::bad_request("endpoint is empty"));
        }
        self.endpoint = endpoint.to_string();
        Ok(())
    }

    pub fn set_database(&mut self, database: &str) -> Result<()> {
        if database.is_empty() {
            return Err(Error::bad_request("database is empty"));
        }
        self.database = database.to_string();
        Ok(())
    }

    /// An empty token is valid (anonymous access).
    pub fn set_auth_token(&mut self, token: &str) {
        self.auth_token = token.to_string();
    }

    pub fn from_toml_str(text: &str) -> Result<Self> {
        let mut config = Self::default();
        config.merge_toml_str(text)?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let mut config = Self::default();
        config.merge_file(path)?;
        Ok(config)
    }

    pub fn merge_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            Error::bad_request(format!("cannot read config file {}: {}", path.display(), e))
        })?;
        self.merge_toml_str(&text)
    }

    pub fn merge_toml_str(&mut self, text: &str) -> Result<()> {
        let file: ConfigFile = toml::from_str(text)
            .map_err(|e| Error::bad_request(format!("invalid driver config: {}", e)))?;
        if let Some(v) = file.endpoint {
            self.set_endpoint(&v)?;
        }
        if let Some(v) = file.database {
            self.set_database(&v)?;
        }
        if let Some(v) = file.auth_token {
            self.set_auth_token(&v);
        }
        if let Some(v) = file.max_retries {
            self.max_retries = v;
        }
        if let Some(v) = file.fast_backoff_ms {
            self.fast_backoff_ms = v;
        }
        if let Some(v) = file.slow_backoff_ms {
            self.slow_backoff_ms = v;
        }
        if let Some(v) = file.operation_timeout_ms {
            self.operation_timeout_ms = v;
        }
        if let Some(v) = file.session_pool_size {
            self.session_pool_size = v;
        }
        if let Some(v) = file.worker_threads {
            if v == 0 {
                return Err(Error::bad_request("worker_threads must be at least 1"));
            }
            self.worker_threads = v;
        }
        Ok(())
    }
}
