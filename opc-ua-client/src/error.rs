use std::fmt;

use thiserror::Error;

/// Result type alias for OPC UA client operations.
pub type OpcResult<T> = Result<T, OpcError>;

/// OPC UA status code as returned by a server for a service call or a
/// single operation within it.
///
/// The top two bits carry the severity: `00` Good, `01` Uncertain, `10` Bad.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct StatusCode(pub u32);

impl StatusCode {
    pub const GOOD: Self = Self(0);
    pub const BAD_UNEXPECTED_ERROR: Self = Self(0x8001_0000);
    pub const BAD_INTERNAL_ERROR: Self = Self(0x8002_0000);
    pub const BAD_COMMUNICATION_ERROR: Self = Self(0x8005_0000);
    pub const BAD_TIMEOUT: Self = Self(0x800A_0000);
    pub const BAD_SERVER_NOT_CONNECTED: Self = Self(0x800D_0000);
    pub const BAD_SECURITY_CHECKS_FAILED: Self = Self(0x8013_0000);
    pub const BAD_USER_ACCESS_DENIED: Self = Self(0x801F_0000);
    pub const BAD_SESSION_ID_INVALID: Self = Self(0x8025_0000);
    pub const BAD_NODE_ID_INVALID: Self = Self(0x8033_0000);
    pub const BAD_NODE_ID_UNKNOWN: Self = Self(0x8034_0000);
    pub const BAD_ATTRIBUTE_ID_INVALID: Self = Self(0x8035_0000);
    pub const BAD_NOT_READABLE: Self = Self(0x803A_0000);
    pub const BAD_TCP_ENDPOINT_URL_INVALID: Self = Self(0x8083_0000);
    pub const BAD_NOT_CONNECTED: Self = Self(0x808A_0000);
    pub const BAD_CONNECTION_REJECTED: Self = Self(0x80AC_0000);
    pub const BAD_DISCONNECT: Self = Self(0x80AD_0000);

    /// Returns `true` when the severity bits are Good.
    #[inline]
    pub const fn is_good(self) -> bool {
        self.0 & 0xC000_0000 == 0
    }

    /// Returns `true` when the severity bits are Uncertain.
    #[inline]
    pub const fn is_uncertain(self) -> bool {
        self.0 & 0xC000_0000 == 0x4000_0000
    }

    /// Returns `true` when the severity bits are Bad.
    #[inline]
    pub const fn is_bad(self) -> bool {
        self.0 & 0x8000_0000 != 0
    }

    /// Symbolic name for well-known codes.
    pub const fn name(self) -> Option<&'static str> {
        match self.0 {
            0 => Some("Good"),
            0x8001_0000 => Some("BadUnexpectedError"),
            0x8002_0000 => Some("BadInternalError"),
            0x8005_0000 => Some("BadCommunicationError"),
            0x800A_0000 => Some("BadTimeout"),
            0x800D_0000 => Some("BadServerNotConnected"),
            0x8013_0000 => Some("BadSecurityChecksFailed"),
            0x801F_0000 => Some("BadUserAccessDenied"),
            0x8025_0000 => Some("BadSessionIdInvalid"),
            0x8033_0000 => Some("BadNodeIdInvalid"),
            0x8034_0000 => Some("BadNodeIdUnknown"),
            0x8035_0000 => Some("BadAttributeIdInvalid"),
            0x803A_0000 => Some("BadNotReadable"),
            0x8083_0000 => Some("BadTcpEndpointUrlInvalid"),
            0x808A_0000 => Some("BadNotConnected"),
            0x80AC_0000 => Some("BadConnectionRejected"),
            0x80AD_0000 => Some("BadDisconnect"),
            _ => None,
        }
    }
}

impl fmt::Display for StatusCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} (0x{:08X})", self.0),
            None => write!(f, "0x{:08X}", self.0),
        }
    }
}

impl std::error::Error for StatusCode {}

impl From<u32> for StatusCode {
    fn from(bits: u32) -> Self {
        Self(bits)
    }
}

/// Malformed node address text.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("node address is empty")]
    Empty,

    #[error("invalid namespace index '{0}' (expected an integer in 0..=65535)")]
    InvalidNamespace(String),

    #[error("missing identifier after namespace in '{0}'")]
    MissingIdentifier(String),

    #[error("invalid numeric identifier '{0}' (expected an integer in 0..=4294967295)")]
    InvalidNumeric(String),

    #[error("invalid GUID identifier '{0}'")]
    InvalidGuid(String),

    #[error("unsupported identifier kind in '{0}' (expected i=, s= or g=)")]
    UnsupportedKind(String),
}

/// Failure to bring a session up.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// The transport could not be constructed for the endpoint.
    #[error("failed to create client for '{endpoint}': {reason}")]
    CreateFailed { endpoint: String, reason: String },

    /// The transport was built but the channel/session handshake failed.
    #[error("failed to connect to '{endpoint}': {reason}")]
    HandshakeFailed {
        endpoint: String,
        reason: String,
        status: Option<StatusCode>,
    },
}

impl ConnectError {
    /// Server status carried by a handshake failure, if any.
    pub const fn status(&self) -> Option<StatusCode> {
        match self {
            Self::CreateFailed { .. } => None,
            Self::HandshakeFailed { status, .. } => *status,
        }
    }
}

/// Failure of a single-node read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReadError {
    #[error("not connected to server")]
    NotConnected,

    #[error("read failed: {0}")]
    TransportFailure(String),

    #[error("no results")]
    EmptyResult,

    #[error("bad status: {0}")]
    BadStatus(StatusCode),
}

/// Centralized error enum for the OPC UA client.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OpcError {
    #[error("invalid node ID: {0}")]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error(transparent)]
    Read(#[from] ReadError),

    /// Catch-all for unexpected internal failures (worker gone, task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for OpcError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<tokio::task::JoinError> for OpcError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Internal(format!("Async task join failed: {err}"))
    }
}

/// Recovers a [`StatusCode`] that a transport attached to an [`anyhow::Error`].
pub fn status_of(err: &anyhow::Error) -> Option<StatusCode> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<StatusCode>())
        .copied()
}

/// Maps well-known OPC UA status codes to actionable user hints.
pub fn friendly_status_hint(status: StatusCode) -> Option<&'static str> {
    match status {
        StatusCode::BAD_TIMEOUT => Some("The server did not answer in time"),
        StatusCode::BAD_COMMUNICATION_ERROR | StatusCode::BAD_NOT_CONNECTED => {
            Some("Network path to the server failed; check host, port and firewall")
        }
        StatusCode::BAD_SERVER_NOT_CONNECTED | StatusCode::BAD_SESSION_ID_INVALID => {
            Some("Session is no longer valid; reconnect to the server")
        }
        StatusCode::BAD_TCP_ENDPOINT_URL_INVALID => {
            Some("Endpoint URL is malformed; expected opc.tcp://host:port")
        }
        StatusCode::BAD_CONNECTION_REJECTED => Some("Server refused the connection"),
        StatusCode::BAD_SECURITY_CHECKS_FAILED => {
            Some("Server requires a security policy other than None")
        }
        StatusCode::BAD_USER_ACCESS_DENIED => {
            Some("Anonymous access is not permitted by this server")
        }
        StatusCode::BAD_NODE_ID_UNKNOWN => Some("Node does not exist in the server address space"),
        StatusCode::BAD_NODE_ID_INVALID => Some("Node ID syntax is not valid for this server"),
        StatusCode::BAD_NOT_READABLE => Some("Node value is not readable"),
        _ => None,
    }
}

/// Maps an [`OpcError`] to a friendly hint if it carries a known status code.
pub fn friendly_error_hint(error: &OpcError) -> Option<&'static str> {
    match error {
        OpcError::Connect(e) => e.status().and_then(friendly_status_hint),
        OpcError::Read(ReadError::BadStatus(status)) => friendly_status_hint(*status),
        _ => None,
    }
}
