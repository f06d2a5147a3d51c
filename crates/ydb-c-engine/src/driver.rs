//!
//! Driver
//!
//! A `Driver` owns the transport, the session pool and a private tokio
//! runtime. Every blocking session call runs on the runtime's blocking pool
//! while the calling thread waits in `block_on`, so the optional operation
//! deadline can interrupt a statement that is taking too long.
//!
//! `Driver` is a cheap clone over shared state; the runtime and transport
//! are torn down when the last clone is dropped.
//!

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use tokio::runtime::Runtime;
use tokio::task::{JoinError, JoinHandle};
use tracing::{debug, info};

use ydb_c_core::{DriverConfig, Error, QueryParams, Result, ResultSet};

use crate::embedded::EmbeddedTransport;
use crate::endpoint::Endpoint;
use crate::pool::SessionPool;
use crate::status::{OperationError, OperationResult, StatusCode};
use crate::transport::{Session, Transport, TxMode};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(10);

/// One unit of session work shipped to the blocking pool.
#[derive(Debug, Clone)]
pub enum SessionRequest {
    Begin(TxMode),
    Execute { query: String, params: QueryParams },
    ExecuteScheme(String),
    Commit,
    Rollback,
}

impl SessionRequest {
    fn apply(self, session: &mut dyn Session) -> OperationResult<Vec<ResultSet>> {
        match self {
            SessionRequest::Begin(mode) => session.begin(mode).map(|_| Vec::new()),
            SessionRequest::Execute { query, params } => session.execute(&query, &params),
            SessionRequest::ExecuteScheme(ddl) => session.execute_scheme(&ddl).map(|_| Vec::new()),
            SessionRequest::Commit => session.commit().map(|_| Vec::new()),
            SessionRequest::Rollback => session.rollback().map(|_| Vec::new()),
        }
    }
}

enum Attach {
    Idle,
    Pending(JoinHandle<OperationResult<()>>),
    Ready,
    Failed(OperationError),
}

struct DriverInner {
    config: DriverConfig,
    endpoint: Endpoint,
    transport: Arc<dyn Transport>,
    pool: Arc<SessionPool>,
    attach: Mutex<Attach>,
    operation_timeout: Option<Duration>,
    runtime: Option<Runtime>,
}

#[derive(Clone)]
pub struct Driver {
    inner: Arc<DriverInner>,
}

impl Driver {
    /// Validate `config` and build a driver over the embedded cluster.
    pub fn new(config: DriverConfig) -> Result<Self> {
        let endpoint = Endpoint::parse(&config.endpoint).map_err(creation_failed)?;
        let transport = Arc::new(EmbeddedTransport::new(&endpoint, &config.database, &config.auth_token));
        Self::with_transport(config, transport)
    }

    /// Build a driver over a caller-supplied transport.
    pub fn with_transport(config: DriverConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        let endpoint = Endpoint::parse(&config.endpoint).map_err(creation_failed)?;
        if !config.database.starts_with('/') {
            return Err(creation_failed(format!(
                "database '{}' must be an absolute path starting with '/'",
                config.database
            )));
        }
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(config.worker_threads.max(1))
            .thread_name("ydb-c-worker")
            .enable_all()
            .build()
            .map_err(creation_failed)?;

        let operation_timeout = match config.operation_timeout_ms {
            0 => None,
            ms => Some(Duration::from_millis(ms)),
        };
        info!(endpoint = %endpoint, database = %config.database, "driver created");

        Ok(Self {
            inner: Arc::new(DriverInner {
                pool: Arc::new(SessionPool::new(config.session_pool_size)),
                endpoint,
                transport,
                attach: Mutex::new(Attach::Idle),
                operation_timeout,
                runtime: Some(runtime),
                config,
            }),
        })
    }

    pub fn config(&self) -> &DriverConfig {
        &self.inner.config
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.inner.endpoint
    }

    /// Number of handles (driver and table clients) sharing this driver.
    pub fn owner_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }

    pub fn idle_sessions(&self) -> usize {
        self.inner.pool.idle_count()
    }

    fn runtime(&self) -> &Runtime {
        match &self.inner.runtime {
            Some(runtime) => runtime,
            None => unreachable!("runtime is only taken during drop"),
        }
    }

    /// Begin attaching to the cluster without waiting for it.
    pub fn start(&self) {
        let mut attach = self.inner.attach.lock().unwrap_or_else(PoisonError::into_inner);
        if matches!(*attach, Attach::Idle | Attach::Failed(_)) {
            let transport = self.inner.transport.clone();
            *attach = Attach::Pending(self.runtime().spawn_blocking(move || transport.attach()));
        }
    }

    /// Block until attached. `None` waits indefinitely.
    pub fn wait_ready(&self, timeout: Option<Duration>) -> Result<()> {
        self.attach_blocking(timeout).map_err(|e| match e.status {
            StatusCode::Timeout => Error::Timeout(e.to_string()),
            _ => Error::Connection(e.to_string()),
        })
    }

    fn attach_blocking(&self, timeout: Option<Duration>) -> OperationResult<()> {
        self.start();
        let mut attach = self.inner.attach.lock().unwrap_or_else(PoisonError::into_inner);
        let joined = match &mut *attach {
            Attach::Ready => return Ok(()),
            Attach::Failed(e) => return Err(e.clone()),
            Attach::Idle => unreachable!("start() leaves the driver attaching"),
            Attach::Pending(handle) => match timeout {
                Some(limit) => self
                    .runtime()
                    .block_on(async { tokio::time::timeout(limit, handle).await })
                    .map_err(|_| {
                        OperationError::new(
                            StatusCode::Timeout,
                            format!("driver not ready after {} ms", limit.as_millis()),
                        )
                    })?,
                None => self.runtime().block_on(handle),
            },
        };
        match joined.map_err(join_failure).and_then(|attached| attached) {
            Ok(()) => {
                info!(endpoint = %self.inner.endpoint, "driver ready");
                *attach = Attach::Ready;
                Ok(())
            }
            Err(e) => {
                *attach = Attach::Failed(e.clone());
                Err(e)
            }
        }
    }

    pub(crate) fn acquire_session(&self) -> OperationResult<Box<dyn Session>> {
        self.attach_blocking(self.inner.operation_timeout)?;
        let transport = self.inner.transport.clone();
        let pool = self.inner.pool.clone();
        let session = self
            .runtime()
            .block_on(self.runtime().spawn_blocking(move || pool.acquire(transport.as_ref())))
            .map_err(join_failure)??;
        debug!(session = session.id(), "acquired session");
        Ok(session)
    }

    pub(crate) fn release_session(&self, session: Box<dyn Session>, last_status: Option<StatusCode>) {
        debug!(session = session.id(), "released session");
        self.inner.pool.release(session, last_status);
    }

    /// Run `request` on the session in `slot` under the operation deadline.
    ///
    /// The session is put back into `slot` unless the worker panicked. A
    /// statement interrupted by the deadline fails with `Timeout`.
    pub(crate) fn run(
        &self,
        slot: &mut Option<Box<dyn Session>>,
        request: SessionRequest,
    ) -> OperationResult<Vec<ResultSet>> {
        let Some(mut session) = slot.take() else {
            return Err(OperationError::new(
                StatusCode::InternalError,
                "session is no longer available",
            ));
        };
        let canceller = session.canceller();
        let mut handle = self.runtime().spawn_blocking(move || {
            let result = request.apply(session.as_mut());
            (session, result)
        });
        let deadline = self.inner.operation_timeout;

        let (joined, timed_out) = self.runtime().block_on(async {
            match deadline {
                Some(limit) => match tokio::time::timeout(limit, &mut handle).await {
                    Ok(joined) => (joined, false),
                    Err(_) => {
                        canceller.cancel();
                        ((&mut handle).await, true)
                    }
                },
                None => (handle.await, false),
            }
        });

        let (session, result) = joined.map_err(join_failure)?;
        *slot = Some(session);
        match result {
            Err(e) if timed_out && e.status == StatusCode::Cancelled => {
                let limit = deadline.map(|d| d.as_millis()).unwrap_or_default();
                Err(OperationError::new(
                    StatusCode::Timeout,
                    format!("operation timed out after {} ms", limit),
                ))
            }
            other => other,
        }
    }

    /// Roll back whatever the session still has open and return it to the
    /// pool. A session that cannot be rolled back is dropped.
    pub(crate) fn finish_session(&self, mut slot: Option<Box<dyn Session>>, last_status: Option<StatusCode>) {
        if slot.is_none() {
            return;
        }
        if let Err(e) = self.run(&mut slot, SessionRequest::Rollback) {
            debug!(error = %e, "dropping session after failed rollback");
            return;
        }
        if let Some(session) = slot {
            self.release_session(session, last_status);
        }
    }

    pub(crate) fn sleep(&self, delay: Duration) {
        // The timer is looked up when `Sleep` is built, so build it on the runtime.
        self.runtime().block_on(async move { tokio::time::sleep(delay).await });
    }
}

impl Drop for DriverInner {
    fn drop(&mut self) {
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_timeout(SHUTDOWN_GRACE);
        }
        self.pool.clear();
        self.transport.shutdown();
        info!(endpoint = %self.endpoint, database = %self.config.database, "driver stopped");
    }
}

fn creation_failed(err: impl std::fmt::Display) -> Error {
    Error::Internal(format!("driver creation failed: {}", err))
}

fn join_failure(err: JoinError) -> OperationError {
    OperationError::new(StatusCode::InternalError, format!("session worker failed: {}", err))
}
