//! Error types for attrlink
//!
//! One unified error enum covers the whole worker process. The protocol
//! splits errors into two families: fatal ones (the connection can no
//! longer be trusted; the process must shut down) and non-fatal ones that
//! are reported to the host through the protocol's own error fields.
//! [`AttrlinkError::is_fatal`] encodes that split.

use std::path::PathBuf;

use attrlink_protocol::codec::CodecError;
use attrlink_protocol::types::DuplicateName;

/// Main error type for attrlink operations
#[derive(Debug, thiserror::Error)]
pub enum AttrlinkError {
    // === IO Errors ===

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to write file {path}: {source}")]
    FileWrite {
        path: PathBuf,
        source: std::io::Error,
    },

    // === Connection Errors ===

    #[error("Connection failed: {0}")]
    Connection(String),

    #[error("Connection closed unexpectedly")]
    ConnectionClosed,

    // === Protocol Errors ===

    #[error("Protocol error: {0}")]
    Protocol(String),

    // === Registration Errors ===

    #[error("Duplicate attribute: {0}")]
    DuplicateAttribute(String),

    #[error("Attribute table is frozen once the session has started")]
    TableFrozen,

    #[error("Session not started")]
    NotStarted,

    // === Configuration Errors ===

    #[error("Configuration error: {0}")]
    Config(String),
}

impl AttrlinkError {
    /// Create a connection error
    pub fn connection(msg: impl Into<String>) -> Self {
        Self::Connection(msg.into())
    }

    /// Create a protocol error
    pub fn protocol(msg: impl Into<String>) -> Self {
        Self::Protocol(msg.into())
    }

    /// Create a config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Whether this error means the connection can no longer be trusted
    ///
    /// Fatal errors terminate the session: once framing is violated or the
    /// stream breaks there is no channel left to resynchronize over.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Self::Io(_) | Self::FileWrite { .. } | Self::Connection(_)
                | Self::ConnectionClosed
                | Self::Protocol(_)
        )
    }
}

impl From<CodecError> for AttrlinkError {
    fn from(err: CodecError) -> Self {
        match err {
            CodecError::Io(e) => Self::Io(e),
            other => Self::Protocol(other.to_string()),
        }
    }
}

impl From<DuplicateName> for AttrlinkError {
    fn from(err: DuplicateName) -> Self {
        Self::DuplicateAttribute(err.0)
    }
}

/// Result type alias using AttrlinkError
pub type Result<T> = std::result::Result<T, AttrlinkError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = AttrlinkError::DuplicateAttribute("query".into());
        assert_eq!(err.to_string(), "Duplicate attribute: query");
    }

    #[test]
    fn test_fatal_split() {
        assert!(AttrlinkError::ConnectionClosed.is_fatal());
        assert!(AttrlinkError::protocol("bad count").is_fatal());
        assert!(!AttrlinkError::DuplicateAttribute("x".into()).is_fatal());
        assert!(!AttrlinkError::TableFrozen.is_fatal());
        assert!(!AttrlinkError::config("bad filter").is_fatal());
    }

    #[test]
    fn test_from_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: AttrlinkError = io_err.into();
        assert!(matches!(err, AttrlinkError::Io(_)));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_codec_error_taxonomy() {
        let io: AttrlinkError =
            CodecError::Io(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe")).into();
        assert!(matches!(io, AttrlinkError::Io(_)));

        let bad_number: AttrlinkError = CodecError::InvalidNumber {
            text: "abc".into(),
        }
        .into();
        assert!(matches!(bad_number, AttrlinkError::Protocol(_)));
        assert!(bad_number.is_fatal());
    }
}
