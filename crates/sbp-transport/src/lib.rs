//! Stream-socket transport for sbp.
//!
//! Covers the connection-establishment half of the protocol:
//! - dialing a `"host service"` target, trying each resolved address
//! - logical listeners spanning every local address of a service
//! - fair accept across the member sockets of a listener
//! - a registry mapping listener identifiers to live listeners
//!
//! The frame layer builds on the [`Connection`] type provided here.

#[cfg(not(unix))]
compile_error!("sbp-transport currently supports Unix-like targets only");

pub mod address;
pub mod config;
pub mod connector;
pub mod error;
pub mod listener;
pub mod registry;
pub mod resolve;
pub mod stream;

pub use address::{parse_service, parse_target, Target, MAX_ADDRESS_LEN};
pub use config::{TransportConfig, DEFAULT_BACKLOG, MAX_LISTENING_SOCKETS};
pub use connector::dial;
pub use error::{Result, TransportError};
pub use listener::{Accepted, LogicalListener, PeerText};
pub use registry::{ListenerId, ListenerRegistry};
pub use resolve::hostname;
pub use stream::{CloseMode, Connection};
