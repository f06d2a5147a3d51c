//!
//! Backend Status Classes
//!
//! `StatusCode` is what the transport reports for a failed operation. The
//! retry policy keys off it (which classes are transient and which backoff
//! they use) and the pool uses it to decide whether a session is still
//! worth keeping. At the API edge an `OperationError` collapses into a
//! `ydb_c_core::Error`.
//!

use thiserror::Error;

use ydb_c_core::Error as ApiError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum StatusCode {
    Success,
    BadRequest,
    Unauthorized,
    InternalError,
    Aborted,
    Unavailable,
    Overloaded,
    SchemeError,
    GenericError,
    Timeout,
    BadSession,
    PreconditionFailed,
    AlreadyExists,
    NotFound,
    SessionExpired,
    Cancelled,
    Undetermined,
    Unsupported,
    SessionBusy,
    ClientTransportError,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Backoff {
    Fast,
    Slow,
}

impl StatusCode {
    /// Backoff class for transient statuses, `None` for final ones.
    ///
    /// `Undetermined` is final: the operation may already have been applied.
    pub fn retry_backoff(self) -> Option<Backoff> {
        match self {
            StatusCode::Aborted
            | StatusCode::Unavailable
            | StatusCode::BadSession
            | StatusCode::SessionExpired
            | StatusCode::SessionBusy
            | StatusCode::ClientTransportError => Some(Backoff::Fast),
            StatusCode::Overloaded => Some(Backoff::Slow),
            _ => None,
        }
    }

    pub fn is_retriable(self) -> bool {
        self.retry_backoff().is_some()
    }

    /// Sessions that failed with these statuses are dropped, not pooled.
    pub fn invalidates_session(self) -> bool {
        matches!(
            self,
            StatusCode::BadSession
                | StatusCode::SessionExpired
                | StatusCode::InternalError
                | StatusCode::ClientTransportError
        )
    }
}

#[derive(Clone, Debug, PartialEq, Error)]
#[error("{status:?}: {}", .issues.join("; "))]
pub struct OperationError {
    pub status: StatusCode,
    pub issues: Vec<String>,
}

impl OperationError {
    pub fn new(status: StatusCode, issue: impl Into<String>) -> Self {
        Self {
            status,
            issues: vec![issue.into()],
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.status.is_retriable()
    }
}

pub type OperationResult<T> = std::result::Result<T, OperationError>;

impl From<OperationError> for ApiError {
    fn from(err: OperationError) -> Self {
        let message = err.to_string();
        match err.status {
            StatusCode::Unavailable | StatusCode::ClientTransportError => ApiError::Connection(message),
            StatusCode::Timeout => ApiError::Timeout(message),
            StatusCode::BadRequest => ApiError::BadRequest(message),
            StatusCode::InternalError => ApiError::Internal(message),
            _ => ApiError::Generic(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classes() {
        assert_eq!(StatusCode::Aborted.retry_backoff(), Some(Backoff::Fast));
        assert_eq!(StatusCode::SessionBusy.retry_backoff(), Some(Backoff::Fast));
        assert_eq!(StatusCode::Overloaded.retry_backoff(), Some(Backoff::Slow));
        assert!(!StatusCode::Undetermined.is_retriable());
        assert!(!StatusCode::PreconditionFailed.is_retriable());
        assert!(!StatusCode::GenericError.is_retriable());
        assert!(!StatusCode::Timeout.is_retriable());
    }

    #[test]
    fn test_session_invalidation() {
        assert!(StatusCode::BadSession.invalidates_session());
        assert!(!StatusCode::Aborted.invalidates_session());
        assert!(!StatusCode::SchemeError.invalidates_session());
    }

    #[test]
    fn test_conversion_to_api_error() {
        let err: ApiError = OperationError::new(StatusCode::Unavailable, "endpoint down").into();
        assert!(matches!(err, ApiError::Connection(ref m) if m.contains("endpoint down")));

        let err: ApiError = OperationError::new(StatusCode::Timeout, "deadline").into();
        assert!(matches!(err, ApiError::Timeout(_)));

        let err: ApiError = OperationError::new(StatusCode::SchemeError, "no such table: t").into();
        assert_eq!(err, ApiError::Generic("SchemeError: no such table: t".into()));
    }
}
