//!
//! ydb-c-engine - Query Execution
//!
//! Everything between the C surface and the cluster:
//!
//! - `Driver`: validated configuration, attach lifecycle, session pool and
//!   the private tokio runtime that runs blocking session work
//! - `TableClient`: retry-aware single-shot execution and schema changes
//! - `Transaction`: explicit transactions pinned to one session
//! - `Transport` / `Session`: the collaborator contract, implemented here by
//!   the embedded SQLite-backed cluster
//!
//! All public operations return `ydb_c_core::Result`; backend failures are
//! carried as `OperationError` internally so the retry policy can inspect
//! their status class.
//!

pub mod driver;
pub mod embedded;
pub mod endpoint;
pub mod pool;
pub mod retry;
pub mod status;
pub mod table;
pub mod transaction;
pub mod transport;

pub use driver::{Driver, SessionRequest};
pub use embedded::EmbeddedTransport;
pub use endpoint::{Endpoint, EndpointError};
pub use retry::RetrySettings;
pub use status::{Backoff, OperationError, OperationResult, StatusCode};
pub use table::TableClient;
pub use transaction::{Transaction, TxState};
pub use transport::{
    Canceller, Session, Transport, TxMode, YDB_TX_ONLINE_RO, YDB_TX_SERIALIZABLE_RW, YDB_TX_SNAPSHOT_RO,
    YDB_TX_STALE_RO,
};
