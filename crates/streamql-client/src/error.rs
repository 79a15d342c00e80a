//! Error types for the client library.

use std::io;

use thiserror::Error;

use streamql_common::{ConfigError, ErrorCode};
use streamql_query::{BuildError, SchemaError};

/// Client error type.
#[derive(Debug, Error)]
pub enum ClientError {
    /// The connection could not be established, or the deadline passed.
    #[error("cannot dial: {0}")]
    CannotDial(#[source] io::Error),

    /// The request could not be written.
    #[error("cannot write: {0}")]
    CannotWrite(#[source] io::Error),

    /// The response could not be read.
    #[error("cannot read: {0}")]
    CannotRead(#[source] io::Error),

    /// The engine answered with a non-success status.
    #[error("bad status {status}: {message}")]
    BadStatus {
        /// HTTP status code.
        status: u16,
        /// Engine error message, or the raw body.
        message: String,
    },

    /// A streaming request arrived while the in-flight budget was full.
    #[error("too many requests for long-lived consumption")]
    TooManyRequests,

    /// The in-flight budget filled up while a stream was being read.
    ///
    /// Handled by the engine, which re-dispatches the stream.
    #[error("rebalance")]
    Rebalance,

    /// A stream kept hitting the budget ceiling.
    #[error("stream rebalanced {attempts} times without completing")]
    RebalanceExhausted {
        /// Dispatch attempts made.
        attempts: u32,
    },

    /// The caller cancelled the request.
    #[error("operation cancelled")]
    Cancelled,

    /// The response did not follow the expected framing or format.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// A row could not be converted to the target type.
    #[error("cannot decode field {field} (header: {header}; row: {row}): {reason}")]
    Decode {
        /// Target field.
        field: String,
        /// Schema header of the query.
        header: String,
        /// Raw row payload.
        row: String,
        /// What went wrong.
        reason: String,
    },

    /// A statement could not be built.
    #[error(transparent)]
    Build(#[from] BuildError),

    /// A schema could not be extracted or did not match.
    #[error(transparent)]
    Schema(#[from] SchemaError),

    /// The configuration is invalid.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// JSON encoding or decoding failed.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClientError {
    /// Returns the stable error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::CannotDial(_) => ErrorCode::CannotDial,
            Self::CannotWrite(_) => ErrorCode::CannotWrite,
            Self::CannotRead(_) => ErrorCode::CannotRead,
            Self::BadStatus { .. } => ErrorCode::BadStatus,
            Self::TooManyRequests => ErrorCode::TooManyRequests,
            Self::Rebalance => ErrorCode::Rebalance,
            Self::RebalanceExhausted { .. } => ErrorCode::RebalanceExhausted,
            Self::Cancelled => ErrorCode::Cancelled,
            Self::Protocol(_) | Self::Json(_) => ErrorCode::Protocol,
            Self::Decode { .. } => ErrorCode::DecodeFailed,
            Self::Build(e) => e.code(),
            Self::Schema(e) => e.code(),
            Self::Config(e) => e.code(),
        }
    }

    /// True for failures of the connection itself.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Self::CannotDial(_) | Self::CannotWrite(_) | Self::CannotRead(_)
        )
    }

    pub(crate) fn deadline_exceeded() -> Self {
        Self::CannotDial(io::Error::new(io::ErrorKind::TimedOut, "deadline exceeded"))
    }
}

/// Result type for client operations.
pub type ClientResult<T> = Result<T, ClientError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codes() {
        assert_eq!(ClientError::TooManyRequests.code(), ErrorCode::TooManyRequests);
        assert_eq!(
            ClientError::Build(BuildError::EmptyColumn).code(),
            ErrorCode::MalformedExpression
        );
        assert_eq!(ClientError::deadline_exceeded().code(), ErrorCode::CannotDial);
    }

    #[test]
    fn test_transport_errors_keep_their_cause() {
        use std::error::Error as _;

        let err = ClientError::CannotRead(io::Error::new(io::ErrorKind::UnexpectedEof, "eof"));
        assert!(err.is_transport());
        assert_eq!(err.to_string(), "cannot read: eof");
        assert_eq!(err.source().map(ToString::to_string), Some("eof".to_string()));
    }
}
