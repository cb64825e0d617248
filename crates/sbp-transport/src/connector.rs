use std::net::{SocketAddr, TcpStream};

use tracing::{debug, info};

use crate::address::parse_target;
use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::resolve::resolve;
use crate::stream::Connection;

/// Connect to `"host service"`, trying every resolved address in order.
///
/// Returns the first candidate that accepts the connection. Fails with
/// [`TransportError::AddressFormat`] for a malformed target and
/// [`TransportError::ConnectFailed`] if resolution fails or every candidate
/// refuses.
pub fn dial(target: &str, config: &TransportConfig) -> Result<Connection> {
    let parsed = parse_target(target)?;
    debug!(host = parsed.host, service = parsed.service, "dialing");

    let candidates =
        resolve(Some(parsed.host), parsed.service, false).map_err(|source| {
            TransportError::ConnectFailed {
                target: parsed.to_string(),
                source,
            }
        })?;

    let mut last_err = std::io::Error::new(
        std::io::ErrorKind::NotFound,
        "resolver returned no addresses",
    );
    for addr in candidates {
        match connect_one(&addr, config) {
            Ok(stream) => {
                info!(%addr, "connected");
                let connection = Connection::from_tcp(stream);
                connection.set_nodelay(config.nodelay)?;
                return Ok(connection);
            }
            Err(err) => {
                debug!(%addr, error = %err, "candidate refused");
                last_err = err;
            }
        }
    }

    Err(TransportError::ConnectFailed {
        target: parsed.to_string(),
        source: last_err,
    })
}

fn connect_one(addr: &SocketAddr, config: &TransportConfig) -> std::io::Result<TcpStream> {
    match config.connect_timeout {
        Some(timeout) => TcpStream::connect_timeout(addr, timeout),
        None => TcpStream::connect(addr),
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread;
    use std::time::Duration;

    use super::*;

    #[test]
    fn dial_numeric_loopback() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let server = thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).unwrap();
            buf
        });

        let mut conn = dial(&format!("127.0.0.1 {port}"), &TransportConfig::default()).unwrap();
        conn.write_all(b"ping").unwrap();
        assert_eq!(&server.join().unwrap(), b"ping");
    }

    #[test]
    fn dial_localhost_falls_back_across_families() {
        // Only IPv4 is listening; "localhost" may resolve to ::1 first.
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();

        let conn = dial(&format!("localhost {port}"), &TransportConfig::default()).unwrap();
        assert_eq!(conn.peer_addr().unwrap().port(), port);
    }

    #[test]
    fn dial_refused_reports_connect_failed() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = TransportConfig {
            connect_timeout: Some(Duration::from_secs(2)),
            ..TransportConfig::default()
        };
        let err = dial(&format!("127.0.0.1 {port}"), &config).unwrap_err();
        assert!(matches!(err, TransportError::ConnectFailed { .. }));
    }

    #[test]
    fn dial_malformed_target() {
        let err = dial("127.0.0.1 9000 extra", &TransportConfig::default()).unwrap_err();
        assert!(matches!(err, TransportError::AddressFormat { .. }));
    }
}
