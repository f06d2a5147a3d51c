//! Idle session pool.
//!
//! Sessions are checked out for one operation (or one explicit transaction)
//! and handed back afterwards. Sessions that are unhealthy or whose last
//! failure invalidated them are dropped instead of kept.

use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::status::{OperationResult, StatusCode};
use crate::transport::{Session, Transport};

pub struct SessionPool {
    idle: Mutex<Vec<Box<dyn Session>>>,
    max_idle: usize,
}

impl SessionPool {
    pub fn new(max_idle: usize) -> Self {
        Self {
            idle: Mutex::new(Vec::new()),
            max_idle,
        }
    }

    /// Reuse an idle session or open a new one. May block on the transport.
    pub fn acquire(&self, transport: &dyn Transport) -> OperationResult<Box<dyn Session>> {
        let reused = self.idle.lock().unwrap_or_else(PoisonError::into_inner).pop();
        match reused {
            Some(session) => {
                debug!(session = session.id(), "reusing pooled session");
                Ok(session)
            }
            None => transport.open_session(),
        }
    }

    pub fn release(&self, session: Box<dyn Session>, last_status: Option<StatusCode>) {
        if last_status.is_some_and(StatusCode::invalidates_session) || !session.is_healthy() {
            debug!(session = session.id(), status = ?last_status, "discarding session");
            return;
        }
        let mut idle = self.idle.lock().unwrap_or_else(PoisonError::into_inner);
        if idle.len() < self.max_idle {
            idle.push(session);
        }
    }

    pub fn clear(&self) {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).clear();
    }

    pub fn idle_count(&self) -> usize {
        self.idle.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
