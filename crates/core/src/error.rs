use thiserror::Error;

use crate::Version;

#[derive(Error, Debug)]
pub enum EtError {
    #[error("Malformed handshake: {0}")]
    MalformedHandshake(String),

    #[error("Handshake rejected: {0}")]
    HandshakeRejected(String),

    #[error("Authentication rejected: {0}")]
    AuthRejected(String),

    #[error("Invalid version: {0}")]
    Version(#[from] VersionError),

    #[error("Incompatible protocol version {got}, need at least {floor}")]
    IncompatibleVersion { got: Version, floor: Version },

    #[error("Invalid identity: {0}")]
    Identity(#[from] IdentityError),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Request truncated: message fills the {0} byte buffer")]
    TruncatedRequest(usize),

    #[error("Connection closed by peer")]
    ConnectionClosed,

    #[error("Missing {0} leg")]
    MissingLeg(&'static str),

    #[error("No relayer configured")]
    NoRelayer,

    #[error("Connect timeout to {0}")]
    ConnectTimeout(String),

    #[error("Timeout")]
    Timeout,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, EtError>;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VersionError {
    #[error("empty version")]
    Empty,

    #[error("invalid version format: {0}")]
    InvalidFormat(String),

    #[error("invalid version number: {0}")]
    InvalidNumber(String),
}

/// Identity failures. The `Display` text is written verbatim to the peer.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IdentityError {
    #[error("invalid user format, expected id:password")]
    Malformed,

    /// Shared by "no such user" and "wrong password" so a peer cannot tell them apart.
    #[error("incorrect username or password")]
    IncorrectCredentials,

    #[error("username must not be 'root'")]
    ReservedRoot,

    #[error("source address is not allowed for this user")]
    AddressNotAllowed,
}
