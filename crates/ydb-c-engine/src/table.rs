//!
//! Table Client
//!
//! Single-shot query execution: every call takes a session from the pool,
//! runs the query inside its own serializable read-write transaction and
//! commits. Transient failures replay the whole sequence under the retry
//! policy, so a caller only ever sees a committed snapshot or an error.
//!

use ydb_c_core::{QueryParams, Result, ResultSet, ResultSets};

use crate::driver::{Driver, SessionRequest};
use crate::retry::{retry_operation, RetrySettings};
use crate::status::OperationResult;
use crate::transaction::Transaction;
use crate::transport::{Session, TxMode};

/// Query entry point sharing ownership of its driver.
#[derive(Clone)]
pub struct TableClient {
    driver: Driver,
    retry: RetrySettings,
}

impl TableClient {
    pub fn new(driver: &Driver) -> Self {
        Self {
            retry: RetrySettings::from_config(driver.config()),
            driver: driver.clone(),
        }
    }

    pub fn driver(&self) -> &Driver {
        &self.driver
    }

    pub fn retry_settings(&self) -> &RetrySettings {
        &self.retry
    }

    /// Run `query` in a fresh read-write transaction and commit it.
    ///
    /// `params` is copied before the first attempt, so the caller may keep
    /// editing it afterwards.
    pub fn execute_data_query(&self, query: &str, params: Option<&QueryParams>) -> Result<ResultSets> {
        let params = params.cloned().unwrap_or_default();
        let sets = retry_operation(&self.driver, &self.retry, "execute_data_query", |_| {
            self.single_shot(query, &params)
        })?;
        Ok(ResultSets::new(sets))
    }

    /// Run schema statements outside any transaction.
    pub fn execute_scheme_query(&self, ddl: &str) -> Result<()> {
        retry_operation(&self.driver, &self.retry, "execute_scheme_query", |_| {
            let mut session = Some(self.driver.acquire_session()?);
            let result = self
                .driver
                .run(&mut session, SessionRequest::ExecuteScheme(ddl.to_string()))
                .map(|_| ());
            self.settle(session, &result);
            result
        })?;
        Ok(())
    }

    pub fn begin_transaction(&self, mode: TxMode) -> Result<Transaction> {
        Transaction::begin(self.clone(), mode)
    }

    fn single_shot(&self, query: &str, params: &QueryParams) -> OperationResult<Vec<ResultSet>> {
        let mut session = Some(self.driver.acquire_session()?);
        let result = self.commit_in_tx(&mut session, query, params);
        self.settle(session, &result);
        result
    }

    fn commit_in_tx(
        &self,
        session: &mut Option<Box<dyn Session>>,
        query: &str,
        params: &QueryParams,
    ) -> OperationResult<Vec<ResultSet>> {
        self.driver.run(session, SessionRequest::Begin(TxMode::SerializableRw))?;
        let sets = self.driver.run(
            session,
            SessionRequest::Execute {
                query: query.to_string(),
                params: params.clone(),
            },
        )?;
        self.driver.run(session, SessionRequest::Commit)?;
        Ok(sets)
    }

    /// Return the session to the pool, rolling back first on failure.
    fn settle<T>(&self, session: Option<Box<dyn Session>>, result: &OperationResult<T>) {
        match (session, result) {
            (Some(session), Ok(_)) => self.driver.release_session(session, None),
            (session, Err(e)) => self.driver.finish_session(session, Some(e.status)),
            (None, Ok(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ydb_c_core::{DriverConfig, Error, ParamValue, TypeId};

    fn client(database: &str) -> TableClient {
        let mut config = DriverConfig::new();
        config.set_endpoint("localhost:2136").unwrap();
        config.set_database(database).unwrap();
        TableClient::new(&Driver::new(config).unwrap())
    }

    #[test]
    fn test_select_one() {
        let tc = client("/table_tests/select_one");
        let mut sets = tc.execute_data_query("SELECT 1 AS one", None).unwrap();
        assert_eq!(sets.len(), 1);
        let rs = sets.get_mut(0).unwrap();
        assert_eq!(rs.column_count(), 1);
        assert_eq!(rs.column(0).unwrap().name(), "one");
        assert_eq!(rs.column(0).unwrap().type_id(), TypeId::Int64);
        assert!(rs.next_row());
        assert_eq!(rs.get_int64(0).unwrap(), 1);
        assert!(!rs.next_row());
    }

    #[test]
    fn test_write_then_read() {
        let tc = client("/table_tests/write_read");
        tc.execute_scheme_query("CREATE TABLE users (id Uint64 PRIMARY KEY, name Utf8)").unwrap();

        let mut params = QueryParams::new();
        params.set("id", ParamValue::Uint64(42)).unwrap();
        params.set("name", ParamValue::Utf8("alice".into())).unwrap();
        tc.execute_data_query("INSERT INTO users (id, name) VALUES ($id, $name)", Some(&params))
            .unwrap();

        params.set("name", ParamValue::Utf8("ignored".into())).unwrap();
        let mut sets = tc
            .execute_data_query("SELECT id, name FROM users WHERE id = $id", Some(&params))
            .unwrap();
        let rs = sets.get_mut(0).unwrap();
        assert!(rs.next_row());
        assert_eq!(rs.get_uint64(0).unwrap(), 42);
        assert_eq!(rs.get_utf8(1).unwrap().as_str(), "alice");
    }

    #[test]
    fn test_failed_query_leaves_nothing_behind() {
        let tc = client("/table_tests/atomic");
        tc.execute_scheme_query("CREATE TABLE t (id Int64 PRIMARY KEY)").unwrap();
        let err = tc
            .execute_data_query("INSERT INTO t VALUES (1); INSERT INTO t VALUES (1)", None)
            .unwrap_err();
        assert!(matches!(err, Error::Generic(ref m) if m.contains("UNIQUE")));

        let mut sets = tc.execute_data_query("SELECT count(*) AS n FROM t", None).unwrap();
        let rs = sets.get_mut(0).unwrap();
        assert!(rs.next_row());
        assert_eq!(rs.get_int64(0).unwrap(), 0);
        assert_eq!(tc.driver().idle_sessions(), 1);
    }

    #[test]
    fn test_scheme_errors_surface() {
        let tc = client("/table_tests/scheme_error");
        let err = tc.execute_data_query("SELECT * FROM missing", None).unwrap_err();
        assert!(err.to_string().contains("no such table"));
        assert!(tc.execute_scheme_query("CREATE TABLE (").is_err());
    }

    #[test]
    fn test_clients_share_driver() {
        let tc = client("/table_tests/shared");
        let other = TableClient::new(tc.driver());
        assert_eq!(tc.driver().owner_count(), 2);
        drop(other);
        assert_eq!(tc.driver().owner_count(), 1);
        assert_eq!(tc.retry_settings().max_retries, 10);
    }
}
