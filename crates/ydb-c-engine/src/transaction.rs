//!
//! Explicit Transactions
//!
//! A `Transaction` pins one pooled session from `begin` until it commits,
//! rolls back or is dropped. Statements run in call order; a transient
//! failure retries only the statement that hit it.
//!
//! State machine:
//!
//! ```text
//! Created --begin--> Active --commit--> Committed
//!                      |  \--rollback--> RolledBack
//!                      |                    ^
//!                      \--error--> Failed --/ (rollback)
//! ```
//!
//! Dropping an Active or Failed transaction rolls it back implicitly.
//!

use tracing::debug;

use ydb_c_core::{Error, QueryParams, Result, ResultSets};

use crate::driver::SessionRequest;
use crate::retry::retry_operation;
use crate::table::TableClient;
use crate::transport::{Session, TxMode};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TxState {
    Created,
    Active,
    Committed,
    RolledBack,
    Failed,
}

pub struct Transaction {
    client: TableClient,
    session: Option<Box<dyn Session>>,
    mode: TxMode,
    state: TxState,
}

impl Transaction {
    pub(crate) fn begin(client: TableClient, mode: TxMode) -> Result<Self> {
        let mut tx = Transaction {
            client,
            session: None,
            mode,
            state: TxState::Created,
        };
        let driver = tx.client.driver().clone();
        let session = retry_operation(&driver, tx.client.retry_settings(), "begin_transaction", |_| {
            let mut session = Some(driver.acquire_session()?);
            match driver.run(&mut session, SessionRequest::Begin(mode)) {
                Ok(_) => Ok(session),
                Err(e) => {
                    driver.finish_session(session, Some(e.status));
                    Err(e)
                }
            }
        })?;
        tx.session = session;
        tx.state = TxState::Active;
        debug!(mode = ?mode, "transaction started");
        Ok(tx)
    }

    pub fn state(&self) -> TxState {
        self.state
    }

    pub fn mode(&self) -> TxMode {
        self.mode
    }

    /// Run `query` inside the transaction and return its result sets.
    pub fn execute(&mut self, query: &str, params: Option<&QueryParams>) -> Result<ResultSets> {
        self.ensure_active("execute")?;
        let params = params.cloned().unwrap_or_default();
        let driver = self.client.driver();
        let session = &mut self.session;
        let result = retry_operation(driver, self.client.retry_settings(), "tx_execute", |_| {
            driver.run(
                session,
                SessionRequest::Execute {
                    query: query.to_string(),
                    params: params.clone(),
                },
            )
        });
        match result {
            Ok(sets) => Ok(ResultSets::new(sets)),
            Err(e) => {
                self.state = TxState::Failed;
                Err(e.into())
            }
        }
    }

    pub fn commit(&mut self) -> Result<()> {
        self.ensure_active("commit")?;
        let driver = self.client.driver();
        let session = &mut self.session;
        let result = retry_operation(driver, self.client.retry_settings(), "tx_commit", |_| {
            driver.run(session, SessionRequest::Commit)
        });
        match result {
            Ok(_) => {
                self.state = TxState::Committed;
                if let Some(session) = self.session.take() {
                    self.client.driver().release_session(session, None);
                }
                Ok(())
            }
            Err(e) => {
                self.state = TxState::Failed;
                Err(e.into())
            }
        }
    }

    /// Undo everything since `begin`. The transaction ends even when the
    /// rollback itself fails; the session is then discarded.
    pub fn rollback(&mut self) -> Result<()> {
        if let Some(done) = self.terminal_error("rollback") {
            return Err(done);
        }
        self.state = TxState::RolledBack;
        let driver = self.client.driver();
        match driver.run(&mut self.session, SessionRequest::Rollback) {
            Ok(_) => {
                if let Some(session) = self.session.take() {
                    driver.release_session(session, None);
                }
                Ok(())
            }
            Err(e) => {
                self.session = None;
                Err(e.into())
            }
        }
    }

    fn ensure_active(&self, op: &str) -> Result<()> {
        if let Some(done) = self.terminal_error(op) {
            return Err(done);
        }
        match self.state {
            TxState::Active => Ok(()),
            TxState::Failed => Err(Error::bad_request(format!(
                "cannot {}: transaction has failed and must be rolled back",
                op
            ))),
            _ => Err(Error::bad_request(format!("cannot {}: transaction is not active", op))),
        }
    }

    fn terminal_error(&self, op: &str) -> Option<Error> {
        match self.state {
            TxState::Committed => Some(Error::AlreadyDone(format!("cannot {}: transaction already committed", op))),
            TxState::RolledBack => Some(Error::AlreadyDone(format!("cannot {}: transaction already rolled back", op))),
            _ => None,
        }
    }
}

impl Drop for Transaction {
    fn drop(&mut self) {
        if let Some(session) = self.session.take() {
            debug!(state = ?self.state, "rolling back abandoned transaction");
            self.client.driver().finish_session(Some(session), None);
        }
    }
}
