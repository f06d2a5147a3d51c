//!
//! Driver Collaborator Contract
//!
//! The engine never talks to the cluster directly. It goes through a
//! `Transport`, which attaches to the cluster and opens sessions, and the
//! `Session`s it hands out, which run statements inside transactions and
//! return already-materialized result sets.
//!
//! Sessions are used from the driver's blocking pool, one operation at a
//! time; `Canceller` is the only piece touched from another thread.
//!

use std::fmt;
use std::sync::Arc;

use ydb_c_core::{QueryParams, ResultSet};

use crate::status::OperationResult;

pub const YDB_TX_SERIALIZABLE_RW: i32 = 1;
pub const YDB_TX_ONLINE_RO: i32 = 2;
pub const YDB_TX_STALE_RO: i32 = 3;
pub const YDB_TX_SNAPSHOT_RO: i32 = 4;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxMode {
    SerializableRw,
    OnlineRo,
    StaleRo,
    SnapshotRo,
}

impl TxMode {
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            YDB_TX_SERIALIZABLE_RW => Some(TxMode::SerializableRw),
            YDB_TX_ONLINE_RO => Some(TxMode::OnlineRo),
            YDB_TX_STALE_RO => Some(TxMode::StaleRo),
            YDB_TX_SNAPSHOT_RO => Some(TxMode::SnapshotRo),
            _ => None,
        }
    }

    pub fn is_read_only(self) -> bool {
        !matches!(self, TxMode::SerializableRw)
    }
}

/// Interrupts whatever statement the owning session is running.
#[derive(Clone)]
pub struct Canceller(Arc<dyn Fn() + Send + Sync>);

impl Canceller {
    pub fn new(cancel: impl Fn() + Send + Sync + 'static) -> Self {
        Self(Arc::new(cancel))
    }

    pub fn cancel(&self) {
        (self.0)()
    }
}

impl fmt::Debug for Canceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Canceller")
    }
}

pub trait Session: Send {
    fn id(&self) -> u64;

    fn begin(&mut self, mode: TxMode) -> OperationResult<()>;

    /// Run `query` and copy every returned result set out of the native
    /// representation.
    fn execute(&mut self, query: &str, params: &QueryParams) -> OperationResult<Vec<ResultSet>>;

    /// Run schema statements outside any transaction, discarding rows.
    fn execute_scheme(&mut self, ddl: &str) -> OperationResult<()>;

    fn commit(&mut self) -> OperationResult<()>;

    /// Roll back the open transaction; a no-op when none is open.
    fn rollback(&mut self) -> OperationResult<()>;

    fn canceller(&self) -> Canceller;

    /// False when the session must not be handed out again.
    fn is_healthy(&self) -> bool;
}

pub trait Transport: Send + Sync {
    /// Connect to the cluster; blocking, run from the driver's pool.
    fn attach(&self) -> OperationResult<()>;

    fn open_session(&self) -> OperationResult<Box<dyn Session>>;

    fn shutdown(&self);
}
