use serde::Serialize;

use vecbench_domain::{IdentifierError, SessionKey, SessionNameError, VectorError};

use crate::connection_error::{ConnectionErrorInfo, ConnectionErrorKind};
use crate::ports::{SessionStoreError, TargetError};

/// Error kinds surfaced to callers of the workbench operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ConnectionUnavailable,
    ConnectionTimeout,
    ValidationFailure,
    QueryFailure,
    SessionNotFound,
    Storage,
}

impl ErrorKind {
    /// Only timeouts are worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ErrorKind::ConnectionTimeout)
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum WorkbenchError {
    #[error("No active connection for this session: {0}")]
    ConnectionUnavailable(String),

    #[error("Connection timed out: {0}")]
    ConnectionTimeout(String),

    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Session not found: {0}")]
    SessionNotFound(SessionKey),

    #[error("Could not connect session: {0}")]
    ConnectFailed(#[from] ConnectionErrorInfo),

    #[error("Session store error: {0}")]
    Store(#[from] SessionStoreError),
}

impl WorkbenchError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            WorkbenchError::ConnectFailed(info) if info.kind == ConnectionErrorKind::Timeout => {
                ErrorKind::ConnectionTimeout
            }
            WorkbenchError::ConnectionUnavailable(_) | WorkbenchError::ConnectFailed(_) => {
                ErrorKind::ConnectionUnavailable
            }
            WorkbenchError::ConnectionTimeout(_) => ErrorKind::ConnectionTimeout,
            WorkbenchError::Validation(_) => ErrorKind::ValidationFailure,
            WorkbenchError::Query(_) => ErrorKind::QueryFailure,
            WorkbenchError::SessionNotFound(_) => ErrorKind::SessionNotFound,
            WorkbenchError::Store(_) => ErrorKind::Storage,
        }
    }

    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<IdentifierError> for WorkbenchError {
    fn from(err: IdentifierError) -> Self {
        WorkbenchError::Validation(err.to_string())
    }
}

impl From<VectorError> for WorkbenchError {
    fn from(err: VectorError) -> Self {
        WorkbenchError::Validation(err.to_string())
    }
}

impl From<SessionNameError> for WorkbenchError {
    fn from(err: SessionNameError) -> Self {
        WorkbenchError::Validation(err.to_string())
    }
}

impl From<TargetError> for WorkbenchError {
    fn from(err: TargetError) -> Self {
        match err {
            TargetError::NotConnected => WorkbenchError::ConnectionUnavailable(err.to_string()),
            TargetError::PoolExhausted { .. } | TargetError::Timeout(_) => {
                WorkbenchError::ConnectionTimeout(err.to_string())
            }
            TargetError::Query(msg) | TargetError::NotFound(msg) => WorkbenchError::Query(msg),
        }
    }
}

/// Structured error payload for the outer surface: kind plus message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReport {
    pub kind: ErrorKind,
    pub message: String,
    pub retryable: bool,
}

impl From<&WorkbenchError> for ErrorReport {
    fn from(err: &WorkbenchError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use std::time::Duration;

    #[rstest]
    #[case(TargetError::NotConnected, ErrorKind::ConnectionUnavailable)]
    #[case(
        TargetError::PoolExhausted { size: 8, idle: 0, max: 8, waited: Duration::from_secs(10) },
        ErrorKind::ConnectionTimeout
    )]
    #[case(TargetError::Timeout(Duration::from_secs(5)), ErrorKind::ConnectionTimeout)]
    #[case(TargetError::Query("column \"x\" does not exist".into()), ErrorKind::QueryFailure)]
    #[case(TargetError::NotFound("no vectors".into()), ErrorKind::QueryFailure)]
    fn target_errors_map_to_kinds(#[case] err: TargetError, #[case] expected: ErrorKind) {
        assert_eq!(WorkbenchError::from(err).kind(), expected);
    }

    #[test]
    fn only_timeouts_are_retryable() {
        let timeout = WorkbenchError::ConnectionTimeout("pool".into());
        let validation: WorkbenchError = IdentifierError::Empty.into();
        let not_found = WorkbenchError::SessionNotFound(SessionKey::parse("u", "s"));

        assert!(timeout.is_retryable());
        assert!(!validation.is_retryable());
        assert!(!not_found.is_retryable());
    }

    #[rstest]
    #[case(ConnectionErrorKind::AuthFailed, ErrorKind::ConnectionUnavailable)]
    #[case(ConnectionErrorKind::HostUnreachable, ErrorKind::ConnectionUnavailable)]
    #[case(ConnectionErrorKind::Timeout, ErrorKind::ConnectionTimeout)]
    fn connect_failures_report_by_cause(
        #[case] cause: ConnectionErrorKind,
        #[case] expected: ErrorKind,
    ) {
        let err = WorkbenchError::from(ConnectionErrorInfo::with_kind(cause, "failed"));
        assert_eq!(err.kind(), expected);
    }

    #[test]
    fn report_carries_kind_and_message() {
        let err: WorkbenchError = VectorError::Empty.into();
        let report = ErrorReport::from(&err);
        assert_eq!(report.kind, ErrorKind::ValidationFailure);
        assert!(report.message.contains("empty"));
        assert!(!report.retryable);
    }
}
