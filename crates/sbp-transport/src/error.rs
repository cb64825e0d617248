use std::net::SocketAddr;

use crate::registry::ListenerId;

/// Errors that can occur while establishing, accepting or closing connections.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The `"host service"` (or service) string could not be interpreted.
    #[error("invalid address {input:?}: {reason}")]
    AddressFormat { input: String, reason: &'static str },

    /// Resolution failed or every resolved candidate refused the connection.
    #[error("failed to connect to {target}: {source}")]
    ConnectFailed {
        target: String,
        source: std::io::Error,
    },

    /// No resolved local address could be bound and put into listening state.
    #[error("failed to bind service {service}: {source}")]
    BindFailed {
        service: String,
        source: std::io::Error,
    },

    /// The OS `accept` call failed on a ready member socket.
    #[error("failed to accept connection on {local}: {source}")]
    AcceptFailed {
        local: SocketAddr,
        source: std::io::Error,
    },

    /// Readiness was reported but no member socket matched on re-scan.
    #[error("readiness reported but no listening socket was ready")]
    NoReadyDescriptor,

    /// The listener was closed while (or before) waiting for a connection.
    #[error("listener {0} is closed")]
    ListenerClosed(ListenerId),

    /// No listener is registered under the given identifier.
    #[error("no listener registered as {0}")]
    UnknownListener(ListenerId),

    /// Shutting down or releasing a socket failed.
    #[error("failed to close socket: {0}")]
    CloseFailed(std::io::Error),

    /// Any other I/O error on a transport socket.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TransportError {
    pub(crate) fn address_format(input: &str, reason: &'static str) -> Self {
        Self::AddressFormat {
            input: input.to_string(),
            reason,
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;
