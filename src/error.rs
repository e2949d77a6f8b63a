use crate::protocol::ReplyCode;
use std::{io, net::SocketAddr};
use thiserror::Error;

/// SocksError covers every way a single SOCKS5 session can fail
#[derive(Error, Debug)]
pub enum SocksError {
    #[error("invalid SOCKS version: expected {expected}, got {got}")]
    InvalidVersion { expected: u8, got: u8 },

    #[error("invalid number of authentication methods: 0")]
    InvalidMethodCount,

    #[error("invalid domain name: {0}")]
    InvalidDomain(#[from] std::string::FromUtf8Error),

    #[error("command not supported: 0x{0:02x}")]
    UnsupportedCommand(u8),

    #[error("address type not supported: 0x{0:02x}")]
    UnsupportedAddressType(u8),

    #[error("failed to resolve host '{host}': {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("no IP address found for '{host}'")]
    NoAddresses { host: String },

    #[error("failed to connect to {target}: {source}")]
    Dial {
        target: SocketAddr,
        #[source]
        source: io::Error,
    },

    #[error("connection error: {0}")]
    Io(#[from] io::Error),
}

pub type Result<T> = std::result::Result<T, SocksError>;

impl SocksError {
    /// reply_code maps an error to the REP byte sent back to the client.
    /// Returns None when the client socket itself is unusable
    pub fn reply_code(&self) -> Option<ReplyCode> {
        match self {
            SocksError::InvalidVersion { .. }
            | SocksError::InvalidMethodCount
            | SocksError::InvalidDomain(_)
            | SocksError::Resolve { .. }
            | SocksError::NoAddresses { .. } => Some(ReplyCode::ServerFailure),
            SocksError::UnsupportedCommand(_) => Some(ReplyCode::CommandNotSupported),
            SocksError::UnsupportedAddressType(_) => Some(ReplyCode::AddrTypeUnsupported),
            SocksError::Dial { source, .. } => Some(classify_dial_error(source)),
            SocksError::Io(_) => None,
        }
    }
}

/// classify_dial_error turns an outbound connect failure into a reply code.
/// Unreachable networks and refusals get their own codes, anything else is
/// reported as an unreachable host
pub fn classify_dial_error(err: &io::Error) -> ReplyCode {
    let msg = err.to_string().to_lowercase();

    if err.kind() == io::ErrorKind::NetworkUnreachable || msg.contains("network is unreachable") {
        ReplyCode::NetworkUnreachable
    } else if err.kind() == io::ErrorKind::ConnectionRefused || msg.contains("refused") {
        ReplyCode::ConnectionRefused
    } else {
        ReplyCode::HostUnreachable
    }
}
