use std::fmt;
use std::io;

/// Kinds of transient infrastructure failure.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransientKind {
    /// Connection reset, refused, or dropped mid-request.
    ConnectionReset,
    /// The service asked the caller to slow down.
    Throttled,
    /// 5xx-class provider error.
    ServerError(u16),
    /// The request timed out.
    Timeout,
}

impl fmt::Display for TransientKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionReset => f.write_str("connection reset"),
            Self::Throttled => f.write_str("throttled"),
            Self::ServerError(code) => write!(f, "server error {code}"),
            Self::Timeout => f.write_str("timeout"),
        }
    }
}

/// Errors from object store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The requested object was not found.
    #[error("object not found: {bucket}/{key}")]
    NotFound { bucket: String, key: String },

    /// Transient infrastructure failure; the operation may succeed if repeated.
    #[error("transient store failure ({kind}): {message}")]
    Transient { kind: TransientKind, message: String },

    /// The store refused the request for a non-transient reason.
    #[error("request rejected: {0}")]
    Rejected(String),

    /// The store reported a digest that could not be decoded.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),

    /// The key cannot be addressed by this store.
    #[error("invalid key: {0}")]
    InvalidKey(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl StoreError {
    pub fn not_found(bucket: impl Into<String>, key: impl Into<String>) -> Self {
        Self::NotFound {
            bucket: bucket.into(),
            key: key.into(),
        }
    }

    pub fn transient(kind: TransientKind, message: impl Into<String>) -> Self {
        Self::Transient {
            kind,
            message: message.into(),
        }
    }

    /// Whether repeating the failed operation could succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transient { .. } => true,
            Self::Io(e) => is_transient_io(e.kind()),
            Self::NotFound { .. }
            | Self::Rejected(_)
            | Self::InvalidDigest(_)
            | Self::InvalidKey(_) => false,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}

fn is_transient_io(kind: io::ErrorKind) -> bool {
    matches!(
        kind,
        io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::ConnectionRefused
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::TimedOut
            | io::ErrorKind::Interrupted
            | io::ErrorKind::WouldBlock
    )
}

impl From<ferry_digest::DigestError> for StoreError {
    fn from(e: ferry_digest::DigestError) -> Self {
        Self::InvalidDigest(e.to_string())
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_classification() {
        assert!(StoreError::transient(TransientKind::Throttled, "slow down").is_transient());
        let unavailable = StoreError::transient(TransientKind::ServerError(503), "unavailable");
        assert!(unavailable.is_transient());
        assert!(!StoreError::not_found("b", "k").is_transient());
        assert!(!StoreError::Rejected("access denied".into()).is_transient());
        assert!(!StoreError::InvalidKey("..".into()).is_transient());
    }

    #[test]
    fn io_classification_by_kind() {
        let reset = StoreError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        let denied = StoreError::Io(io::Error::new(io::ErrorKind::PermissionDenied, "denied"));
        assert!(reset.is_transient());
        assert!(!denied.is_transient());
    }

    #[test]
    fn display_messages() {
        assert_eq!(StoreError::not_found("b", "k").to_string(), "object not found: b/k");
        assert_eq!(
            StoreError::transient(TransientKind::ServerError(500), "boom").to_string(),
            "transient store failure (server error 500): boom"
        );
    }
}
