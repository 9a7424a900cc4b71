//! Remote project/session service seam.
//!
//! The wire format is owned by the implementation; this crate only sees
//! endpoints, optional JSON bodies and raw JSON responses.

use std::fmt;

/// Failure codes reported by a [`RemoteService`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    ConnectionFailure,
    AuthFailure,
    /// Client and server clocks disagree.
    OutOfSync,
    SecurityFailure,
    ServerFailure,
    ParseError,
    ProxyError,
    ProxyAuthRequired,
    SessionExpired,
    NotAllowed,
    Other(String),
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::ConnectionFailure => write!(f, "connection failure"),
            ServiceError::AuthFailure => write!(f, "authentication failure"),
            ServiceError::OutOfSync => write!(f, "clock out of sync"),
            ServiceError::SecurityFailure => write!(f, "security failure"),
            ServiceError::ServerFailure => write!(f, "server failure"),
            ServiceError::ParseError => write!(f, "unparseable server response"),
            ServiceError::ProxyError => write!(f, "proxy error"),
            ServiceError::ProxyAuthRequired => write!(f, "proxy authentication required"),
            ServiceError::SessionExpired => write!(f, "session expired"),
            ServiceError::NotAllowed => write!(f, "not allowed"),
            ServiceError::Other(msg) => write!(f, "service error: {msg}"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Connection-oriented remote service.
///
/// Implementations are shared with worker threads (project list, package
/// check, keep-alive), hence `Send + Sync`.
pub trait RemoteService: Send + Sync + 'static {
    type Connection: Send + Sync + 'static;

    fn connect(
        &self,
        url: &str,
        client_id: &str,
        username: &str,
        password: &str,
    ) -> Result<Self::Connection, ServiceError>;

    fn disconnect(&self, connection: &Self::Connection);

    fn keep_alive(&self, connection: &Self::Connection) -> Result<(), ServiceError>;

    /// Issues `endpoint`, as a POST with `body` when one is given. The raw
    /// response is owned by the caller.
    fn query(
        &self,
        connection: &Self::Connection,
        endpoint: &str,
        body: Option<&str>,
    ) -> Result<String, ServiceError>;
}
