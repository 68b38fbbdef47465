//! Error types for the LocalSend node core.
//!
//! Errors are categorized so callers at the transport boundary can map them
//! onto HTTP status codes without inspecting error text, and so the upload
//! client can tell a cooperative cancellation apart from every other
//! failure.

use std::borrow::Cow;
use thiserror::Error;

/// Errors that can occur in core node operations (registry, sessions, TLS
/// identity).
#[derive(Debug, Error)]
pub enum LocalSendError {
    // ============ Malformed wire data ============
    /// The request body or query parameters did not match the expected
    /// shape.
    #[error("malformed request: {0}")]
    MalformedRequest(Cow<'static, str>),

    // ============ Authorization ============
    /// No session exists with the given id.
    #[error("unknown session: {0}")]
    UnknownSession(String),

    /// The session exists but has no file with the given id.
    #[error("unknown file {file_id} in session {session_id}")]
    UnknownFile {
        /// Session the caller asked about.
        session_id: String,
        /// File id that was not found in it.
        file_id: String,
    },

    /// The token presented for a file does not match the one issued.
    #[error("token mismatch for file {0}")]
    TokenMismatch(String),

    /// The remote peer rejected an offered transfer.
    #[error("rejected by peer")]
    Rejected,

    // ============ Capacity / conflict ============
    /// Another session is already occupying the slot being requested.
    #[error("blocked by another session")]
    Blocked,

    // ============ Transient I/O ============
    /// A file or network read/write failed mid-transfer.
    #[error("I/O error: {0}")]
    Io(String),

    /// An HTTP request failed at the transport level.
    #[error("HTTP error: {0}")]
    Http(String),

    // ============ Fatal initialization ============
    /// No network interface satisfying the discovery criteria was found.
    #[error("no usable network interface: {0}")]
    NoInterface(Cow<'static, str>),

    /// TLS credential generation or loading failed.
    #[error("TLS setup failed: {0}")]
    Tls(Cow<'static, str>),

    /// Invalid configuration supplied to a node component.
    #[error("invalid configuration: {0}")]
    InvalidConfig(Cow<'static, str>),

    // ============ Operational ============
    /// An operation that required a reply within a bound did not receive
    /// one in time.
    #[error("operation timed out: {0}")]
    Timeout(Cow<'static, str>),

    /// A cooperative cancellation was observed; not itself a failure.
    #[error("cancelled")]
    Cancelled,

    /// A `oneshot`/`mpsc` channel was dropped before it delivered a value.
    #[error("channel error: {0}")]
    Channel(Cow<'static, str>),

    /// JSON (de)serialization of a wire payload failed.
    #[error("serialization error: {0}")]
    Serialization(Cow<'static, str>),

    /// Catch-all for edge cases that don't warrant their own variant.
    #[error("{0}")]
    Other(Cow<'static, str>),
}

impl LocalSendError {
    /// Returns true if retrying the same operation might succeed.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            LocalSendError::Io(_) | LocalSendError::Http(_) | LocalSendError::Channel(_)
        )
    }

    /// Returns true if retrying will not help without external
    /// intervention.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        matches!(
            self,
            LocalSendError::InvalidConfig(_)
                | LocalSendError::NoInterface(_)
                | LocalSendError::Tls(_)
                | LocalSendError::UnknownSession(_)
                | LocalSendError::UnknownFile { .. }
                | LocalSendError::TokenMismatch(_)
                | LocalSendError::Rejected
        )
    }

    /// True iff this variant represents a cooperative cancellation rather
    /// than a genuine failure. The upload client uses this to decide
    /// whether to additionally call `SessionManager::cancel`.
    #[must_use]
    pub fn is_cancellation(&self) -> bool {
        matches!(self, LocalSendError::Cancelled)
    }

    /// Build a malformed-request error with static context.
    #[must_use]
    pub const fn malformed(context: &'static str) -> Self {
        LocalSendError::MalformedRequest(Cow::Borrowed(context))
    }

    /// Build a no-interface error with static context.
    #[must_use]
    pub const fn no_interface(context: &'static str) -> Self {
        LocalSendError::NoInterface(Cow::Borrowed(context))
    }

    /// Build a TLS error with static context.
    #[must_use]
    pub const fn tls(context: &'static str) -> Self {
        LocalSendError::Tls(Cow::Borrowed(context))
    }

    /// Build a TLS error from a runtime-computed message (e.g. an
    /// underlying TLS library's error string).
    #[must_use]
    pub fn tls_owned(context: String) -> Self {
        LocalSendError::Tls(Cow::Owned(context))
    }

    /// Build an invalid-config error with static context.
    #[must_use]
    pub const fn invalid_config(context: &'static str) -> Self {
        LocalSendError::InvalidConfig(Cow::Borrowed(context))
    }

    /// Build a timeout error with static context.
    #[must_use]
    pub const fn timeout(context: &'static str) -> Self {
        LocalSendError::Timeout(Cow::Borrowed(context))
    }
}

impl From<std::io::Error> for LocalSendError {
    fn from(err: std::io::Error) -> Self {
        LocalSendError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for LocalSendError {
    fn from(err: serde_json::Error) -> Self {
        LocalSendError::Serialization(Cow::Owned(err.to_string()))
    }
}

/// Result type for core node operations.
pub type Result<T> = std::result::Result<T, LocalSendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transient_errors() {
        assert!(LocalSendError::Io("x".into()).is_transient());
        assert!(LocalSendError::Http("x".into()).is_transient());
        assert!(!LocalSendError::Rejected.is_transient());
    }

    #[test]
    fn permanent_errors() {
        assert!(LocalSendError::Rejected.is_permanent());
        assert!(LocalSendError::TokenMismatch("f".into()).is_permanent());
        assert!(!LocalSendError::Io("x".into()).is_permanent());
    }

    #[test]
    fn cancellation_is_not_transient_or_permanent() {
        let err = LocalSendError::Cancelled;
        assert!(err.is_cancellation());
        assert!(!err.is_transient());
        assert!(!err.is_permanent());
    }

    #[test]
    fn convenience_constructors() {
        assert!(matches!(
            LocalSendError::malformed("bad body"),
            LocalSendError::MalformedRequest(_)
        ));
        assert!(matches!(
            LocalSendError::no_interface("none up"),
            LocalSendError::NoInterface(_)
        ));
    }

    #[test]
    fn io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: LocalSendError = io_err.into();
        assert!(matches!(err, LocalSendError::Io(_)));
    }
}
