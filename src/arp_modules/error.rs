//! Error types shared by the resolution and poisoning modules.

use std::io;
use thiserror::Error;

/// Result type alias for resolver and injector operations
pub type Result<T> = std::result::Result<T, Error>;

/// Why a target address string was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetInputError {
    Empty,
    IncorrectNumberOfOctets,
    InvalidFormat,
    OutOfRange,
}

impl std::fmt::Display for TargetInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TargetInputError::Empty => write!(f, "no target address supplied"),
            TargetInputError::IncorrectNumberOfOctets => write!(f, "incorrect number of octets"),
            TargetInputError::InvalidFormat => write!(f, "invalid IPv4 address format"),
            TargetInputError::OutOfRange => write!(f, "octet values out of range"),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Target address rejected before any network activity
    #[error("malformed target '{input}': {reason}")]
    MalformedTargetInput {
        input: String,
        reason: TargetInputError,
    },

    #[error("invalid MAC address '{0}'")]
    InvalidMacAddress(String),

    /// Raw frame I/O was denied by the operating system
    #[error("insufficient privileges for raw frame I/O: {0}")]
    InsufficientPrivilege(String),

    #[error("interface '{0}' not found")]
    InterfaceNotFound(String),

    #[error("no usable network interface found")]
    NoUsableInterface,

    #[error("interface '{0}' does not provide an Ethernet channel")]
    UnsupportedChannel(String),

    #[error("no MAC address available to send from {0}")]
    MissingMacAddress(std::net::Ipv4Addr),

    #[error("could not install stop handler: {0}")]
    Signal(#[from] ctrlc::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("timestamp formatting error: {0}")]
    TimeFormat(#[from] time::error::Format),

    #[error("cannot open log file {path}: {source}")]
    LogFile {
        path: std::path::PathBuf,
        source: io::Error,
    },
}

impl Error {
    /// Classify an I/O error coming from the raw link layer.
    /// `PermissionDenied` maps to `InsufficientPrivilege`; everything else stays `Io`.
    pub fn from_io(context: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::PermissionDenied {
            Error::InsufficientPrivilege(format!("{context}: {err}"))
        } else {
            Error::Io(err)
        }
    }

    pub fn malformed_target<S: Into<String>>(input: S, reason: TargetInputError) -> Self {
        Error::MalformedTargetInput {
            input: input.into(),
            reason,
        }
    }

    pub fn is_insufficient_privilege(&self) -> bool {
        matches!(self, Error::InsufficientPrivilege(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_denied_becomes_insufficient_privilege() {
        let err = Error::from_io(
            "opening channel on eth0",
            io::Error::new(io::ErrorKind::PermissionDenied, "operation not permitted"),
        );
        assert!(err.is_insufficient_privilege());
        assert!(err.to_string().contains("eth0"));
    }

    #[test]
    fn other_io_errors_stay_io() {
        let err = Error::from_io("send", io::Error::new(io::ErrorKind::BrokenPipe, "gone"));
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn malformed_target_message_names_input() {
        let err = Error::malformed_target("10.0.0", TargetInputError::IncorrectNumberOfOctets);
        assert_eq!(
            err.to_string(),
            "malformed target '10.0.0': incorrect number of octets"
        );
    }
}
