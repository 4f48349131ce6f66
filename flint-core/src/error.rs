//! Error types for the Flint client
//!
//! Defines the error taxonomy shared by every Flint crate.

/// Standard error type for Flint operations
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    /// Caller supplied an invalid argument (empty target set, malformed config)
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Transport unavailable: connect failure, reset, unreachable node
    #[error("{}", connection_message(.node, .message))]
    Connection {
        /// Id of the node the operation was addressed to, when known
        node: Option<String>,
        message: String,
    },

    /// The client or connection has been shut down
    #[error("Connection closed")]
    ConnectionClosed,

    /// Deadline exceeded while awaiting a response
    #[error("Timeout")]
    Timeout,

    /// The remote job raised an error; carries the server diagnostic text
    #[error("Job execution failed: {0}")]
    JobExecution(String),

    /// Typed extraction requested a type that does not match the value tag
    #[error("Type mismatch: expected {expected}, found {actual}")]
    TypeMismatch { expected: String, actual: String },

    /// Typed extraction on a result that carries no value
    #[error("Job result has no value")]
    EmptyResult,

    /// Peer violated the wire protocol
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(String),

    /// Internal client error
    #[error("Internal error: {0}")]
    Internal(String),
}

fn connection_message(node: &Option<String>, message: &str) -> String {
    match node {
        Some(node) => format!("Connection error (node {}): {}", node, message),
        None => format!("Connection error: {}", message),
    }
}

impl Error {
    /// Connection error not yet attributed to a node
    pub fn connection(message: impl Into<String>) -> Self {
        Error::Connection {
            node: None,
            message: message.into(),
        }
    }

    /// Attach the attempted node id to a connection error.
    ///
    /// Other variants are returned unchanged.
    pub fn with_node(self, node_id: impl Into<String>) -> Self {
        match self {
            Error::Connection { message, .. } => Error::Connection {
                node: Some(node_id.into()),
                message,
            },
            other => other,
        }
    }

    /// Get the error code for this error
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Error::InvalidArgument(_) => ErrorCode::InvalidArgument,
            Error::Connection { .. } => ErrorCode::Connection,
            Error::ConnectionClosed => ErrorCode::ConnectionClosed,
            Error::Timeout => ErrorCode::Timeout,
            Error::JobExecution(_) => ErrorCode::JobExecution,
            Error::TypeMismatch { .. } => ErrorCode::TypeMismatch,
            Error::EmptyResult => ErrorCode::EmptyResult,
            Error::Protocol(_) => ErrorCode::Protocol,
            Error::Serialization(_) => ErrorCode::Serialization,
            Error::Io(_) => ErrorCode::Io,
            Error::Internal(_) => ErrorCode::Internal,
        }
    }

    /// Check if a caller could reasonably retry the operation.
    ///
    /// The client itself never retries.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Timeout | Error::Connection { .. })
    }

    /// Check if this error was caused by misuse of the API rather than the cluster
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidArgument(_) | Error::TypeMismatch { .. } | Error::EmptyResult
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::ConnectionRefused
            | ErrorKind::ConnectionReset
            | ErrorKind::ConnectionAborted
            | ErrorKind::NotConnected
            | ErrorKind::BrokenPipe
            | ErrorKind::UnexpectedEof
            | ErrorKind::AddrNotAvailable => Error::connection(error.to_string()),
            ErrorKind::TimedOut => Error::Timeout,
            ErrorKind::InvalidInput => Error::InvalidArgument(error.to_string()),
            _ => Error::Io(error.to_string()),
        }
    }
}

/// Result type for Flint operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error codes that can be used for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidArgument = 1,
    Connection = 2,
    ConnectionClosed = 3,
    Timeout = 4,
    JobExecution = 5,
    TypeMismatch = 6,
    EmptyResult = 7,
    Protocol = 8,
    Serialization = 9,
    Io = 10,
    Internal = 11,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_node_attributes_connection_errors() {
        let err = Error::connection("reset by peer").with_node("node-a");
        assert_eq!(
            err,
            Error::Connection {
                node: Some("node-a".to_string()),
                message: "reset by peer".to_string(),
            }
        );
        assert_eq!(err.to_string(), "Connection error (node node-a): reset by peer");

        // non-connection errors pass through untouched
        assert_eq!(Error::Timeout.with_node("node-a"), Error::Timeout);
    }

    #[test]
    fn test_io_error_mapping() {
        let refused = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        assert_eq!(Error::from(refused).error_code(), ErrorCode::Connection);

        let timed_out = std::io::Error::new(std::io::ErrorKind::TimedOut, "slow");
        assert_eq!(Error::from(timed_out), Error::Timeout);

        let other = std::io::Error::new(std::io::ErrorKind::Other, "disk");
        assert_eq!(Error::from(other).error_code(), ErrorCode::Io);
    }

    #[test]
    fn test_error_classification() {
        assert!(Error::Timeout.is_retryable());
        assert!(Error::connection("x").is_retryable());
        assert!(!Error::JobExecution("boom".into()).is_retryable());
        assert!(!Error::ConnectionClosed.is_retryable());

        assert!(Error::EmptyResult.is_caller_error());
        assert!(Error::InvalidArgument("empty".into()).is_caller_error());
        assert!(!Error::Timeout.is_caller_error());
    }
}
