use std::time::Duration;

/// Default pending-connection queue length.
pub const DEFAULT_BACKLOG: i32 = 5;

/// Upper bound on member sockets in one logical listener.
pub const MAX_LISTENING_SOCKETS: usize = 10;

/// Socket-level options for dialing, listening and accepting.
#[derive(Debug, Clone)]
pub struct TransportConfig {
    /// Pending-connection queue length passed to `listen(2)`. Default: 5.
    pub backlog: i32,
    /// Set `SO_REUSEADDR` on listening sockets. Default: true.
    pub reuse_address: bool,
    /// Disable Nagle's algorithm on every connection. Default: true.
    pub nodelay: bool,
    /// Per-candidate connect timeout; `None` blocks until the OS gives up.
    pub connect_timeout: Option<Duration>,
    /// Report accepted peers numerically instead of doing reverse DNS.
    pub numeric_peer_names: bool,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            backlog: DEFAULT_BACKLOG,
            reuse_address: true,
            nodelay: true,
            connect_timeout: None,
            numeric_peer_names: false,
        }
    }
}
