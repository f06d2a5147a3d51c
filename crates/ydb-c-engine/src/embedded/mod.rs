//!
//! Embedded cluster transport.
//!
//! Stands in for a remote cluster with a shared in-memory SQLite database
//! (bundled, via rusqlite) per (endpoint, database) pair:
//! - CLUSTERS: process-wide registry of live clusters, held weakly so the
//!   data disappears once no driver or session references it
//! - each session is its own connection to the shared-cache database, so
//!   sessions see each other's committed writes and conflict through
//!   SQLite's table locks
//!
//! Queries use SQLite syntax with `$name` parameters. Transaction modes:
//! - serializable read-write: BEGIN IMMEDIATE
//! - online / stale / snapshot read-only: BEGIN DEFERRED with query_only set
//!

mod materialize;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock, Mutex, PoisonError, Weak};

use rusqlite::{Connection, ErrorCode, OpenFlags};
use tracing::{debug, info};

use ydb_c_core::{QueryParams, ResultSet};

use crate::endpoint::Endpoint;
use crate::status::{OperationError, OperationResult, StatusCode};
use crate::transport::{Canceller, Session, Transport, TxMode};

pub(crate) use materialize::run_statements;

struct ClusterDb {
    uri: String,
    // Keeps the shared in-memory database alive between sessions.
    _anchor: Mutex<Connection>,
    next_session_id: AtomicU64,
}

static CLUSTERS: LazyLock<Mutex<HashMap<String, Weak<ClusterDb>>>> =
    LazyLock::new(|| Mutex::new(HashMap::new()));

static NEXT_CLUSTER_ID: AtomicU64 = AtomicU64::new(1);

fn open_flags() -> OpenFlags {
    OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_URI
        | OpenFlags::SQLITE_OPEN_NO_MUTEX
}

impl ClusterDb {
    fn attach(key: &str) -> OperationResult<Arc<ClusterDb>> {
        let mut clusters = CLUSTERS.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(db) = clusters.get(key).and_then(Weak::upgrade) {
            return Ok(db);
        }

        let id = NEXT_CLUSTER_ID.fetch_add(1, Ordering::Relaxed);
        let uri = format!("file:ydb-cluster-{}?mode=memory&cache=shared", id);
        let anchor = Connection::open_with_flags(&uri, open_flags()).map_err(classify)?;
        let db = Arc::new(ClusterDb {
            uri,
            _anchor: Mutex::new(anchor),
            next_session_id: AtomicU64::new(1),
        });
        clusters.retain(|_, weak| weak.strong_count() > 0);
        clusters.insert(key.to_string(), Arc::downgrade(&db));
        Ok(db)
    }
}

pub struct EmbeddedTransport {
    key: String,
    auth_token: String,
    cluster: Mutex<Option<Arc<ClusterDb>>>,
}

impl EmbeddedTransport {
    pub fn new(endpoint: &Endpoint, database: &str, auth_token: &str) -> Self {
        Self {
            key: format!("{}{}", endpoint, database),
            auth_token: auth_token.to_string(),
            cluster: Mutex::new(None),
        }
    }

    fn cluster(&self) -> OperationResult<Arc<ClusterDb>> {
        let mut slot = self.cluster.lock().unwrap_or_else(PoisonError::into_inner);
        match slot.as_ref() {
            Some(db) => Ok(db.clone()),
            None => {
                let db = ClusterDb::attach(&self.key)?;
                info!(
                    cluster = %self.key,
                    authenticated = !self.auth_token.is_empty(),
                    "attached to embedded cluster"
                );
                *slot = Some(db.clone());
                Ok(db)
            }
        }
    }
}

impl Transport for EmbeddedTransport {
    fn attach(&self) -> OperationResult<()> {
        self.cluster().map(|_| ())
    }

    fn open_session(&self) -> OperationResult<Box<dyn Session>> {
        let cluster = self.cluster()?;
        let conn = Connection::open_with_flags(&cluster.uri, open_flags()).map_err(classify)?;
        let id = cluster.next_session_id.fetch_add(1, Ordering::Relaxed);
        debug!(cluster = %self.key, session = id, "opened session");
        Ok(Box::new(SqliteSession {
            id,
            conn,
            read_only: false,
            broken: false,
            _cluster: cluster,
        }))
    }

    fn shutdown(&self) {
        let released = self
            .cluster
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if released.is_some() {
            info!(cluster = %self.key, "detached from embedded cluster");
        }
    }
}

const STATEMENT_SAVEPOINT: &str = "SAVEPOINT ydb_statement";
const STATEMENT_RELEASE: &str = "RELEASE ydb_statement";
const STATEMENT_UNDO: &str = "ROLLBACK TO ydb_statement; RELEASE ydb_statement";

struct SqliteSession {
    id: u64,
    conn: Connection,
    read_only: bool,
    broken: bool,
    _cluster: Arc<ClusterDb>,
}

impl SqliteSession {
    fn set_query_only(&mut self, on: bool) -> OperationResult<()> {
        self.conn.pragma_update(None, "query_only", on).map_err(classify)?;
        self.read_only = on;
        Ok(())
    }

    fn finish(&mut self, sql: &str) -> OperationResult<()> {
        let result = self.conn.execute_batch(sql).map_err(classify);
        if self.conn.is_autocommit() && self.read_only {
            if let Err(e) = self.set_query_only(false) {
                self.broken = true;
                return Err(e);
            }
        }
        result
    }

    /// Undo a failed query back to its savepoint. When SQLite already
    /// dropped the whole transaction a retry would run outside it, so the
    /// session is retired and a transient status becomes final.
    fn undo_statement(&mut self, err: OperationError) -> OperationError {
        let restored = !self.conn.is_autocommit() && self.conn.execute_batch(STATEMENT_UNDO).is_ok();
        if restored {
            return err;
        }
        self.broken = true;
        if !err.is_retriable() {
            return err;
        }
        OperationError::new(
            StatusCode::SessionExpired,
            format!("transaction was rolled back: {}", err.issues.join("; ")),
        )
    }
}

impl Session for SqliteSession {
    fn id(&self) -> u64 {
        self.id
    }

    fn begin(&mut self, mode: TxMode) -> OperationResult<()> {
        if !self.conn.is_autocommit() {
            return Err(OperationError::new(
                StatusCode::BadRequest,
                "session already has an open transaction",
            ));
        }
        if mode.is_read_only() {
            self.set_query_only(true)?;
        }
        let sql = if mode.is_read_only() { "BEGIN DEFERRED" } else { "BEGIN IMMEDIATE" };
        let result = self.conn.execute_batch(sql).map_err(classify);
        if result.is_err() && self.read_only {
            self.set_query_only(false)?;
        }
        result
    }

    fn execute(&mut self, query: &str, params: &QueryParams) -> OperationResult<Vec<ResultSet>> {
        debug!(session = self.id, query, "executing data query");
        if self.read_only || self.conn.is_autocommit() {
            return run_statements(&self.conn, query, params, true);
        }

        // Inside a write transaction a query applies entirely or not at all.
        self.conn.execute_batch(STATEMENT_SAVEPOINT).map_err(classify)?;
        match run_statements(&self.conn, query, params, true) {
            Ok(sets) => {
                self.conn.execute_batch(STATEMENT_RELEASE).map_err(classify)?;
                Ok(sets)
            }
            Err(e) => Err(self.undo_statement(e)),
        }
    }

    fn execute_scheme(&mut self, ddl: &str) -> OperationResult<()> {
        debug!(session = self.id, ddl, "executing scheme query");
        run_statements(&self.conn, ddl, &QueryParams::new(), false).map(|_| ())
    }

    fn commit(&mut self) -> OperationResult<()> {
        self.finish("COMMIT")
    }

    fn rollback(&mut self) -> OperationResult<()> {
        if self.conn.is_autocommit() {
            return Ok(());
        }
        let result = self.finish("ROLLBACK");
        if !self.conn.is_autocommit() {
            self.broken = true;
        }
        result
    }

    fn canceller(&self) -> Canceller {
        let handle = self.conn.get_interrupt_handle();
        Canceller::new(move || handle.interrupt())
    }

    fn is_healthy(&self) -> bool {
        !self.broken && !self.read_only && self.conn.is_autocommit()
    }
}

/// Map a SQLite failure onto the backend status classes.
pub(crate) fn classify(err: rusqlite::Error) -> OperationError {
    match &err {
        rusqlite::Error::SqliteFailure(failure, message) => {
            let text = message.clone().unwrap_or_else(|| failure.to_string());
            OperationError::new(status_of(failure.code, &text), text)
        }
        // Syntax errors carry the offending SQL and offset.
        rusqlite::Error::SqlInputError { error, msg, .. } => {
            OperationError::new(status_of(error.code, msg), msg.clone())
        }
        rusqlite::Error::InvalidParameterName(_)
        | rusqlite::Error::InvalidParameterCount(..)
        | rusqlite::Error::ToSqlConversionFailure(_)
        | rusqlite::Error::IntegralValueOutOfRange(..)
        | rusqlite::Error::Utf8Error(_)
        | rusqlite::Error::MultipleStatement => OperationError::new(StatusCode::BadRequest, err.to_string()),
        _ => OperationError::new(StatusCode::InternalError, err.to_string()),
    }
}

fn status_of(code: ErrorCode, text: &str) -> StatusCode {
    match code {
        ErrorCode::DatabaseBusy => StatusCode::SessionBusy,
        ErrorCode::DatabaseLocked | ErrorCode::SchemaChanged | ErrorCode::OperationAborted => StatusCode::Aborted,
        ErrorCode::ConstraintViolation => StatusCode::PreconditionFailed,
        ErrorCode::ReadOnly => StatusCode::BadRequest,
        ErrorCode::OperationInterrupted => StatusCode::Cancelled,
        ErrorCode::SystemIoFailure | ErrorCode::CannotOpen | ErrorCode::NotADatabase | ErrorCode::DatabaseCorrupt => {
            StatusCode::Unavailable
        }
        ErrorCode::TypeMismatch | ErrorCode::TooBig | ErrorCode::ParameterOutOfRange => StatusCode::BadRequest,
        ErrorCode::Unknown if text.contains("no such table") || text.contains("no such column") => {
            StatusCode::SchemeError
        }
        ErrorCode::Unknown => StatusCode::GenericError,
        _ => StatusCode::InternalError,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ydb_c_core::{ParamValue, TypeId};

    fn transport(name: &str) -> EmbeddedTransport {
        let endpoint = Endpoint::parse("localhost:2136").unwrap();
        EmbeddedTransport::new(&endpoint, &format!("/embedded_tests/{}", name), "")
    }

    #[test]
    fn test_sessions_share_cluster_data() {
        let t = transport("share");
        let mut a = t.open_session().unwrap();
        let mut b = t.open_session().unwrap();
        assert_ne!(a.id(), b.id());

        a.execute_scheme("CREATE TABLE kv (k Utf8 PRIMARY KEY, v Int64)").unwrap();
        a.begin(TxMode::SerializableRw).unwrap();
        a.execute("INSERT INTO kv VALUES ('a', 1)", &QueryParams::new()).unwrap();
        a.commit().unwrap();

        let sets = b.execute("SELECT k, v FROM kv", &QueryParams::new()).unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].row_count(), 1);
        assert_eq!(sets[0].column(0).unwrap().type_id(), TypeId::Utf8);
    }

    #[test]
    fn test_separate_databases_are_isolated() {
        let t1 = transport("iso_a");
        let t2 = transport("iso_b");
        t1.open_session().unwrap().execute_scheme("CREATE TABLE only_here (x Int64)").unwrap();
        let err = t2
            .open_session()
            .unwrap()
            .execute("SELECT x FROM only_here", &QueryParams::new())
            .unwrap_err();
        assert_eq!(err.status, StatusCode::SchemeError);
    }

    #[test]
    fn test_write_conflict_is_transient() {
        let t = transport("conflict");
        let mut a = t.open_session().unwrap();
        let mut b = t.open_session().unwrap();
        a.execute_scheme("CREATE TABLE c (x Int64)").unwrap();

        a.begin(TxMode::SerializableRw).unwrap();
        a.execute("INSERT INTO c VALUES (1)", &QueryParams::new()).unwrap();

        let err = b
            .begin(TxMode::SerializableRw)
            .and_then(|_| b.execute("SELECT x FROM c", &QueryParams::new()).map(|_| ()))
            .unwrap_err();
        assert!(err.is_retriable(), "{:?}", err);
        b.rollback().unwrap();
        a.commit().unwrap();
    }

    #[test]
    fn test_read_only_transaction_rejects_writes() {
        let t = transport("read_only");
        let mut s = t.open_session().unwrap();
        s.execute_scheme("CREATE TABLE r (x Int64)").unwrap();

        s.begin(TxMode::OnlineRo).unwrap();
        assert!(!s.is_healthy());
        let err = s.execute("INSERT INTO r VALUES (1)", &QueryParams::new()).unwrap_err();
        assert_eq!(err.status, StatusCode::BadRequest);
        s.rollback().unwrap();
        assert!(s.is_healthy());
    }

    #[test]
    fn test_constraint_violation_is_final() {
        let t = transport("constraint");
        let mut s = t.open_session().unwrap();
        s.execute_scheme("CREATE TABLE u (id Uint64 PRIMARY KEY)").unwrap();
        let mut p = QueryParams::new();
        p.set("id", ParamValue::Uint64(7)).unwrap();
        s.execute("INSERT INTO u VALUES ($id)", &p).unwrap();
        let err = s.execute("INSERT INTO u VALUES ($id)", &p).unwrap_err();
        assert_eq!(err.status, StatusCode::PreconditionFailed);
        assert!(!err.is_retriable());
    }

    #[test]
    fn test_begin_twice_is_rejected() {
        let t = transport("begin_twice");
        let mut s = t.open_session().unwrap();
        s.begin(TxMode::SerializableRw).unwrap();
        let err = s.begin(TxMode::SerializableRw).unwrap_err();
        assert_eq!(err.status, StatusCode::BadRequest);
        s.rollback().unwrap();
        s.rollback().unwrap();
    }

    #[test]
    fn test_syntax_error_is_generic() {
        let t = transport("syntax");
        let mut s = t.open_session().unwrap();
        let err = s.execute("SELEC 1", &QueryParams::new()).unwrap_err();
        assert_eq!(err.status, StatusCode::GenericError);
        assert!(!err.is_retriable());
        assert!(s.is_healthy());
    }

    #[test]
    fn test_failed_query_in_transaction_is_undone_whole() {
        let t = transport("statement_undo");
        let mut s = t.open_session().unwrap();
        s.execute_scheme("CREATE TABLE k (id Int64 PRIMARY KEY); CREATE TABLE m (x Int64)").unwrap();

        s.begin(TxMode::SerializableRw).unwrap();
        s.execute("INSERT INTO k VALUES (1)", &QueryParams::new()).unwrap();
        let err = s
            .execute("INSERT INTO m VALUES (1); INSERT INTO k VALUES (1)", &QueryParams::new())
            .unwrap_err();
        assert_eq!(err.status, StatusCode::PreconditionFailed);

        // The earlier query survives and the transaction stays open.
        let mut sets = s
            .execute("SELECT (SELECT count(*) FROM k) AS k, (SELECT count(*) FROM m) AS m", &QueryParams::new())
            .unwrap();
        assert!(sets[0].next_row());
        assert_eq!(sets[0].get_int64(0).unwrap(), 1);
        assert_eq!(sets[0].get_int64(1).unwrap(), 0);
        s.commit().unwrap();
    }
}
