use crate::service::ServiceError;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    LoggedOut,
    Connecting,
    LoggedIn,
}

/// User-facing outcome of the last login attempt. Every connect failure kind
/// has its own status so the login screen can offer the matching remedy.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default)]
pub enum LoginStatus {
    #[default]
    NoStatus,
    Pending,
    ConnectionError,
    AuthError,
    TimeSync,
    SecurityError,
    NegotiationError,
    ProxyError,
    ProxyAuthRequired,
    OtherError,
}

impl LoginStatus {
    pub const FAILURES: [LoginStatus; 8] = [
        LoginStatus::ConnectionError,
        LoginStatus::AuthError,
        LoginStatus::TimeSync,
        LoginStatus::SecurityError,
        LoginStatus::NegotiationError,
        LoginStatus::ProxyError,
        LoginStatus::ProxyAuthRequired,
        LoginStatus::OtherError,
    ];

    pub fn from_connect_error(err: &ServiceError) -> Self {
        match err {
            ServiceError::ConnectionFailure => LoginStatus::ConnectionError,
            ServiceError::AuthFailure => LoginStatus::AuthError,
            ServiceError::OutOfSync => LoginStatus::TimeSync,
            ServiceError::SecurityFailure => LoginStatus::SecurityError,
            ServiceError::ServerFailure | ServiceError::ParseError => LoginStatus::NegotiationError,
            ServiceError::ProxyError => LoginStatus::ProxyError,
            ServiceError::ProxyAuthRequired => LoginStatus::ProxyAuthRequired,
            ServiceError::SessionExpired | ServiceError::NotAllowed | ServiceError::Other(_) => {
                LoginStatus::OtherError
            }
        }
    }

    pub fn is_failure(self) -> bool {
        !matches!(self, LoginStatus::NoStatus | LoginStatus::Pending)
    }

    pub fn message(self) -> &'static str {
        match self {
            LoginStatus::NoStatus => "",
            LoginStatus::Pending => "Checking credentials...",
            LoginStatus::ConnectionError => {
                "Could not connect to server. Check the server address and your network."
            }
            LoginStatus::AuthError => "Username or password is incorrect.",
            LoginStatus::TimeSync => {
                "Your system clock is out of sync with the server. Correct the date and time."
            }
            LoginStatus::SecurityError => "Could not establish a secure connection to the server.",
            LoginStatus::NegotiationError => {
                "The server could not be negotiated with. It may be running an incompatible version."
            }
            LoginStatus::ProxyError => "The proxy rejected the connection. Check proxy settings.",
            LoginStatus::ProxyAuthRequired => "The proxy requires authentication.",
            LoginStatus::OtherError => "Unknown error occurred while logging in.",
        }
    }
}
