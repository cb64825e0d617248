//! Logical listeners: several listening sockets served as one.
//!
//! A service usually resolves to one wildcard address per family (`0.0.0.0`
//! and `::`). Each gets its own socket; [`LogicalListener::accept`] waits on
//! all of them with `poll(2)` and rotates its starting point so a busy family
//! cannot starve the others.

use std::io::ErrorKind;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use socket2::{Domain, Protocol, SockRef, Socket, Type};
use tracing::{debug, info, warn};

use crate::address::parse_service;
use crate::config::{TransportConfig, MAX_LISTENING_SOCKETS};
use crate::error::{Result, TransportError};
use crate::registry::ListenerId;
use crate::resolve::{name_info, resolve};
use crate::stream::Connection;

/// Upper bound on one `poll(2)` wait, so a close is noticed even on platforms
/// where shutting down a listening socket does not wake the waiter.
const POLL_INTERVAL_MS: libc::c_int = 200;

struct Member {
    listener: TcpListener,
    local: SocketAddr,
}

/// One or more listening sockets presented as a single acceptable entity.
pub struct LogicalListener {
    id: ListenerId,
    members: Vec<Member>,
    /// Index of the member served last.
    cursor: AtomicUsize,
    closed: AtomicBool,
    numeric_peer_names: bool,
    nodelay: bool,
}

/// An accepted connection and what is known about its peer.
#[derive(Debug)]
pub struct Accepted {
    pub connection: Connection,
    pub peer_addr: SocketAddr,
    /// `"address service"`, or empty when the reverse lookup failed.
    pub peer_text: String,
    /// Index of the member socket the connection arrived on.
    pub member: usize,
}

/// Result of copying the peer text into a caller-provided buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PeerText {
    /// Bytes written to the buffer.
    pub len: usize,
    /// False if the lookup failed or the buffer was too small.
    pub complete: bool,
}

impl Accepted {
    /// Copy `"address service"` into `buf`, truncating if it does not fit.
    pub fn copy_peer_text(&self, buf: &mut [u8]) -> PeerText {
        let text = self.peer_text.as_bytes();
        let len = text.len().min(buf.len());
        buf[..len].copy_from_slice(&text[..len]);
        PeerText {
            len,
            complete: !text.is_empty() && len == text.len(),
        }
    }
}

impl LogicalListener {
    /// Resolve `service` passively and listen on every local address found.
    ///
    /// Candidates that fail to bind are skipped; the call fails with
    /// [`TransportError::BindFailed`] only when none succeed. For port `0`
    /// every member reuses the port the kernel picked for the first one.
    pub fn bind(service: &str, config: &TransportConfig) -> Result<Self> {
        let service = parse_service(service)?;
        let candidates =
            resolve(None, service, true).map_err(|source| TransportError::BindFailed {
                service: service.to_string(),
                source,
            })?;
        Self::bind_candidates(service, candidates, config, true)
    }

    /// Listen on exactly the given addresses, skipping those that fail.
    pub fn bind_addrs(addrs: &[SocketAddr], config: &TransportConfig) -> Result<Self> {
        let label = addrs
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");
        Self::bind_candidates(&label, addrs.to_vec(), config, false)
    }

    fn bind_candidates(
        service: &str,
        candidates: Vec<SocketAddr>,
        config: &TransportConfig,
        share_ephemeral_port: bool,
    ) -> Result<Self> {
        let mut members: Vec<Member> = Vec::new();
        let mut shared_port = None;
        let mut last_err =
            std::io::Error::new(ErrorKind::AddrNotAvailable, "no candidate addresses");

        for mut addr in candidates {
            if members.len() >= MAX_LISTENING_SOCKETS {
                warn!(
                    service,
                    max = MAX_LISTENING_SOCKETS,
                    "listening socket limit reached; ignoring remaining addresses"
                );
                break;
            }
            if share_ephemeral_port && addr.port() == 0 {
                if let Some(port) = shared_port {
                    addr.set_port(port);
                }
            }
            match bind_one(&addr, config) {
                Ok(member) => {
                    debug!(local = %member.local, "listening socket bound");
                    shared_port.get_or_insert(member.local.port());
                    members.push(member);
                }
                Err(err) => {
                    debug!(%addr, error = %err, "skipping listen candidate");
                    last_err = err;
                }
            }
        }

        let Some(first) = members.first() else {
            return Err(TransportError::BindFailed {
                service: service.to_string(),
                source: last_err,
            });
        };

        let id = ListenerId::from_raw(first.listener.as_raw_fd());
        info!(
            %id,
            service,
            sockets = members.len(),
            "listening"
        );

        let last = members.len() - 1;
        Ok(Self {
            id,
            members,
            cursor: AtomicUsize::new(last),
            closed: AtomicBool::new(false),
            numeric_peer_names: config.numeric_peer_names,
            nodelay: config.nodelay,
        })
    }

    /// Externally visible identifier (the first member's descriptor).
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Local addresses of all member sockets, in member order.
    pub fn local_addrs(&self) -> Vec<SocketAddr> {
        self.members.iter().map(|m| m.local).collect()
    }

    /// Whether [`LogicalListener::close`] has been called.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Block until a connection arrives on any member socket and accept it.
    ///
    /// The scan for a ready member starts after the member served last, with
    /// wrap-around. A failed reverse lookup of the peer still returns the
    /// connection, with an empty [`Accepted::peer_text`].
    pub fn accept(&self) -> Result<Accepted> {
        let count = self.members.len();
        loop {
            if self.is_closed() {
                return Err(TransportError::ListenerClosed(self.id));
            }
            let Some(ready) = self.wait_ready()? else {
                continue;
            };
            if self.is_closed() {
                return Err(TransportError::ListenerClosed(self.id));
            }

            let start = (self.cursor.load(Ordering::Relaxed) + 1) % count;
            let index = (0..count)
                .map(|offset| (start + offset) % count)
                .find(|&i| ready[i])
                .ok_or(TransportError::NoReadyDescriptor)?;
            self.cursor.store(index, Ordering::Relaxed);

            let member = &self.members[index];
            match member.listener.accept() {
                Ok((stream, peer)) => return self.finish_accept(index, stream, peer),
                // Another acceptor took the pending connection first.
                Err(err) if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::Interrupted) => {
                    continue
                }
                Err(_) if self.is_closed() => {
                    return Err(TransportError::ListenerClosed(self.id));
                }
                Err(source) => {
                    return Err(TransportError::AcceptFailed {
                        local: member.local,
                        source,
                    })
                }
            }
        }
    }

    /// Wait for readiness; `None` when the wait timed out or was interrupted.
    fn wait_ready(&self) -> Result<Option<Vec<bool>>> {
        let mut fds: Vec<libc::pollfd> = self
            .members
            .iter()
            .map(|m| libc::pollfd {
                fd: m.listener.as_raw_fd(),
                events: libc::POLLIN,
                revents: 0,
            })
            .collect();

        // SAFETY: `fds` is a valid array of `fds.len()` pollfd entries whose
        // descriptors stay open for the lifetime of `self`.
        let rc = unsafe { libc::poll(fds.as_mut_ptr(), fds.len() as libc::nfds_t, POLL_INTERVAL_MS) };
        if rc < 0 {
            let err = std::io::Error::last_os_error();
            if err.kind() == ErrorKind::Interrupted {
                return Ok(None);
            }
            return Err(TransportError::Io(err));
        }
        if rc == 0 {
            return Ok(None);
        }
        Ok(Some(fds.iter().map(|p| p.revents != 0).collect()))
    }

    fn finish_accept(&self, member: usize, stream: TcpStream, peer: SocketAddr) -> Result<Accepted> {
        // BSD-derived systems hand out accepted sockets with the listener's
        // O_NONBLOCK flag; connections are always blocking.
        stream.set_nonblocking(false)?;
        stream.set_nodelay(self.nodelay)?;

        let peer_text = match name_info(&peer, self.numeric_peer_names) {
            Ok((host, service)) => format!("{host} {service}"),
            Err(err) => {
                debug!(%peer, error = %err, "peer name lookup failed");
                String::new()
            }
        };
        debug!(id = %self.id, member, %peer, "accepted connection");

        Ok(Accepted {
            connection: Connection::from_tcp(stream),
            peer_addr: peer,
            peer_text,
            member,
        })
    }

    /// Shut down every member socket and refuse further accepts.
    ///
    /// Descriptors are released when the last handle to the listener drops,
    /// so an acceptor still waiting on them never sees a reused descriptor.
    pub fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::AcqRel) {
            return Ok(());
        }
        let mut first_err = None;
        for member in &self.members {
            if let Err(err) = SockRef::from(&member.listener).shutdown(Shutdown::Both) {
                // Listening sockets are never "connected" on some platforms.
                if err.kind() != ErrorKind::NotConnected {
                    first_err.get_or_insert(err);
                }
            }
        }
        debug!(id = %self.id, "listener closed");
        match first_err {
            Some(err) => Err(TransportError::CloseFailed(err)),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for LogicalListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LogicalListener")
            .field("id", &self.id)
            .field("members", &self.local_addrs())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn bind_one(addr: &SocketAddr, config: &TransportConfig) -> std::io::Result<Member> {
    let socket = Socket::new(Domain::for_address(*addr), Type::STREAM, Some(Protocol::TCP))?;
    if addr.is_ipv6() {
        // Let the IPv4 wildcard get its own member socket.
        socket.set_only_v6(true)?;
    }
    if config.reuse_address {
        socket.set_reuse_address(true)?;
    }
    socket.bind(&(*addr).into())?;
    socket.listen(config.backlog)?;
    socket.set_nonblocking(true)?;

    let listener: TcpListener = socket.into();
    let local = listener.local_addr()?;
    Ok(Member { listener, local })
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use super::*;

    fn loopback_config() -> TransportConfig {
        TransportConfig {
            numeric_peer_names: true,
            ..TransportConfig::default()
        }
    }

    fn loopback_pair() -> LogicalListener {
        let addrs: Vec<SocketAddr> = vec![
            "127.0.0.1:0".parse().unwrap(),
            "127.0.0.1:0".parse().unwrap(),
        ];
        LogicalListener::bind_addrs(&addrs, &loopback_config()).unwrap()
    }

    #[test]
    fn bind_service_port_zero_shares_port() {
        let listener = LogicalListener::bind("0", &loopback_config()).unwrap();
        let addrs = listener.local_addrs();
        assert!(!addrs.is_empty());
        let port = addrs[0].port();
        assert_ne!(port, 0);
        assert!(addrs.iter().all(|a| a.port() == port));
        assert_eq!(listener.id().as_raw(), listener.members[0].listener.as_raw_fd());
    }

    #[test]
    fn bind_fails_only_when_no_candidate_binds() {
        let taken = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = taken.local_addr().unwrap();
        let config = TransportConfig {
            reuse_address: false,
            ..loopback_config()
        };
        let err = LogicalListener::bind_addrs(&[addr], &config).unwrap_err();
        assert!(matches!(err, TransportError::BindFailed { .. }));

        // One failing candidate among good ones is skipped.
        let ok: SocketAddr = "127.0.0.1:0".parse().unwrap();
        let listener = LogicalListener::bind_addrs(&[addr, ok], &config).unwrap();
        assert_eq!(listener.local_addrs().len(), 1);
    }

    #[test]
    fn bind_rejects_multiple_service_tokens() {
        let err = LogicalListener::bind("9000 9001", &loopback_config()).unwrap_err();
        assert!(matches!(err, TransportError::AddressFormat { .. }));
    }

    #[test]
    fn accept_returns_connection_and_numeric_peer_text() {
        let listener = LogicalListener::bind_addrs(&["127.0.0.1:0".parse().unwrap()], &loopback_config())
            .unwrap();
        let addr = listener.local_addrs()[0];

        let mut client = std::net::TcpStream::connect(addr).unwrap();
        let client_port = client.local_addr().unwrap().port();

        let mut accepted = listener.accept().unwrap();
        assert_eq!(accepted.peer_text, format!("127.0.0.1 {client_port}"));
        assert_eq!(accepted.member, 0);

        client.write_all(b"hi").unwrap();
        let mut buf = [0u8; 2];
        accepted.connection.read_exact(&mut buf).unwrap();
        assert_eq!(&buf, b"hi");
    }

    #[test]
    fn accept_rotates_between_ready_members() {
        let listener = loopback_pair();
        let addrs = listener.local_addrs();

        let _c0 = std::net::TcpStream::connect(addrs[0]).unwrap();
        let _c1 = std::net::TcpStream::connect(addrs[1]).unwrap();
        // Let both handshakes land in the accept queues.
        thread::sleep(Duration::from_millis(50));

        let first = listener.accept().unwrap();
        let second = listener.accept().unwrap();
        assert_ne!(first.member, second.member);

        let mut locals = vec![
            first.connection.local_addr().unwrap(),
            second.connection.local_addr().unwrap(),
        ];
        locals.sort();
        let mut expected = addrs.clone();
        expected.sort();
        assert_eq!(locals, expected);
    }

    #[test]
    fn sustained_load_on_one_member_does_not_starve_the_other() {
        let listener = loopback_pair();
        let addrs = listener.local_addrs();

        let _busy: Vec<_> = (0..3)
            .map(|_| std::net::TcpStream::connect(addrs[0]).unwrap())
            .collect();
        let _quiet = std::net::TcpStream::connect(addrs[1]).unwrap();
        thread::sleep(Duration::from_millis(50));

        let members: Vec<usize> = (0..2).map(|_| listener.accept().unwrap().member).collect();
        assert!(members.contains(&1), "quiet member served within two accepts");
    }

    #[test]
    fn copy_peer_text_reports_truncation() {
        let listener = LogicalListener::bind_addrs(&["127.0.0.1:0".parse().unwrap()], &loopback_config())
            .unwrap();
        let _client = std::net::TcpStream::connect(listener.local_addrs()[0]).unwrap();
        let accepted = listener.accept().unwrap();

        let mut small = [0u8; 4];
        let text = accepted.copy_peer_text(&mut small);
        assert_eq!(text, PeerText { len: 4, complete: false });
        assert_eq!(&small, b"127.");

        let mut large = [0u8; 64];
        let text = accepted.copy_peer_text(&mut large);
        assert!(text.complete);
        assert_eq!(&large[..text.len], accepted.peer_text.as_bytes());
    }

    #[test]
    fn close_wakes_blocked_accept() {
        let listener = Arc::new(loopback_pair());
        let waiter = {
            let listener = Arc::clone(&listener);
            thread::spawn(move || listener.accept())
        };
        thread::sleep(Duration::from_millis(50));
        listener.close().unwrap();

        let result = waiter.join().unwrap();
        assert!(matches!(result, Err(TransportError::ListenerClosed(_))));
        assert!(matches!(listener.accept(), Err(TransportError::ListenerClosed(_))));
    }
}
