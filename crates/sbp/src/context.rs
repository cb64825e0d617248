use std::net::SocketAddr;

use sbp_frame::{ByteOrder, MessageReader, MessageWriter, TransferConfig};
use sbp_transport::{
    dial, Accepted, Connection, ListenerId, ListenerRegistry, LogicalListener, TransportConfig,
};
use tracing::debug;

use crate::error::Result;

/// Settings for every connection and listener a [`Context`] creates.
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub transport: TransportConfig,
    pub transfer: TransferConfig,
}

/// Protocol state for one process (or one test).
///
/// Holds the byte-order decision made at initialization and the registry of
/// open listeners. `Context` is `Sync`: one thread can block in
/// [`accept`](Context::accept) while another closes the listener.
///
/// Dropping the context closes every listener still registered.
#[derive(Debug)]
pub struct Context {
    byte_order: ByteOrder,
    registry: ListenerRegistry,
    config: Config,
}

impl Context {
    /// Detect the host byte order and start with default settings.
    pub fn initialize() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self::with_byte_order(config, ByteOrder::detect())
    }

    /// Use an explicit byte-order decision instead of detecting it.
    pub fn with_byte_order(config: Config, byte_order: ByteOrder) -> Self {
        debug!(swap = byte_order.swap_needed(), "protocol context initialized");
        Self {
            byte_order,
            registry: ListenerRegistry::new(),
            config,
        }
    }

    pub fn byte_order(&self) -> ByteOrder {
        self.byte_order
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn registry(&self) -> &ListenerRegistry {
        &self.registry
    }

    /// Connect to a `"host service"` target.
    pub fn dial(&self, target: &str) -> Result<Connection> {
        Ok(dial(target, &self.config.transport)?)
    }

    /// Listen on every local address of `service` and register the listener.
    pub fn listen(&self, service: &str) -> Result<ListenerId> {
        let listener = LogicalListener::bind(service, &self.config.transport)?;
        Ok(self.registry.insert(listener))
    }

    /// Listen on exactly the given addresses and register the listener.
    pub fn listen_addrs(&self, addrs: &[SocketAddr]) -> Result<ListenerId> {
        let listener = LogicalListener::bind_addrs(addrs, &self.config.transport)?;
        Ok(self.registry.insert(listener))
    }

    /// Wait for the next connection on a registered listener.
    pub fn accept(&self, id: ListenerId) -> Result<Accepted> {
        let listener = self.registry.get(id)?;
        Ok(listener.accept()?)
    }

    pub fn local_addrs(&self, id: ListenerId) -> Result<Vec<SocketAddr>> {
        Ok(self.registry.get(id)?.local_addrs())
    }

    /// Unregister a listener and shut down all of its sockets.
    pub fn close_listener(&self, id: ListenerId) -> Result<()> {
        Ok(self.registry.close(id)?)
    }

    /// Wrap a connection for reading, applying the configured poll interval.
    pub fn reader(&self, connection: Connection) -> Result<MessageReader<Connection>> {
        Ok(MessageReader::with_config_connection(
            connection,
            self.byte_order,
            self.config.transfer.clone(),
        )?)
    }

    /// Wrap a connection for writing, applying the configured write timeout.
    pub fn writer(&self, connection: Connection) -> Result<MessageWriter<Connection>> {
        Ok(MessageWriter::with_config_connection(
            connection,
            self.byte_order,
            self.config.transfer.clone(),
        )?)
    }

    /// Split a connection into a reader and a writer over the same socket.
    pub fn split(
        &self,
        connection: Connection,
    ) -> Result<(MessageReader<Connection>, MessageWriter<Connection>)> {
        let write_half = connection.try_clone()?;
        Ok((self.reader(connection)?, self.writer(write_half)?))
    }

    /// Close every registered listener.
    pub fn shutdown(self) -> Result<()> {
        Ok(self.registry.close_all()?)
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        if let Err(err) = self.registry.close_all() {
            debug!(error = %err, "closing listeners on drop failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use sbp_frame::{FrameError, Kind, Message};
    use sbp_transport::{CloseMode, TransportError};

    use super::*;
    use crate::error::Error;

    fn loopback_listener(ctx: &Context) -> (ListenerId, u16) {
        let id = ctx
            .listen_addrs(&["127.0.0.1:0".parse().unwrap()])
            .unwrap();
        let port = ctx.local_addrs(id).unwrap()[0].port();
        (id, port)
    }

    #[test]
    fn dial_accept_exchange() {
        let ctx = Context::initialize();
        let (id, port) = loopback_listener(&ctx);

        let client = ctx.dial(&format!("127.0.0.1 {port}")).unwrap();
        let accepted = ctx.accept(id).unwrap();
        assert!(!accepted.peer_text.is_empty());
        assert_eq!(accepted.peer_addr, client.local_addr().unwrap());

        let (_, mut client_writer) = ctx.split(client).unwrap();
        let (mut server_reader, _) = ctx.split(accepted.connection).unwrap();

        client_writer.send_chars("hello").unwrap();
        client_writer.send_i32s(&[1, -2, 3]).unwrap();

        let mut text = [0u8; 5];
        server_reader.read_typed(Kind::Char, &mut text).unwrap();
        assert_eq!(&text, b"hello");
        assert_eq!(
            server_reader.read_message().unwrap(),
            Message::Int32Array(vec![1, -2, 3])
        );
    }

    #[test]
    fn listen_service_registers_under_first_member() {
        let ctx = Context::initialize();
        let id = ctx.listen("0").unwrap();
        assert_eq!(ctx.registry().ids(), vec![id]);
        assert!(!ctx.local_addrs(id).unwrap().is_empty());

        ctx.close_listener(id).unwrap();
        assert!(ctx.registry().is_empty());
        assert!(matches!(
            ctx.close_listener(id),
            Err(Error::Transport(TransportError::UnknownListener(_)))
        ));
    }

    #[test]
    fn close_from_another_thread_interrupts_accept() {
        let ctx = Arc::new(Context::initialize());
        let (id, _) = loopback_listener(&ctx);

        let acceptor = {
            let ctx = Arc::clone(&ctx);
            thread::spawn(move || ctx.accept(id))
        };
        thread::sleep(Duration::from_millis(50));
        ctx.close_listener(id).unwrap();

        // A slow acceptor thread may only look the listener up after removal.
        let result = acceptor.join().unwrap();
        assert!(matches!(
            result,
            Err(Error::Transport(
                TransportError::ListenerClosed(_) | TransportError::UnknownListener(_)
            ))
        ));
    }

    #[test]
    fn half_close_ends_the_peer_stream() {
        let ctx = Context::initialize();
        let (id, port) = loopback_listener(&ctx);

        let client = ctx.dial(&format!("localhost {port}")).unwrap();
        let accepted = ctx.accept(id).unwrap();

        let (_, mut writer) = ctx.split(client).unwrap();
        writer.send_f64s(&[2.5]).unwrap();
        writer.get_ref().shutdown(CloseMode::Write).unwrap();

        let mut reader = ctx.reader(accepted.connection).unwrap();
        assert_eq!(reader.read_message().unwrap(), Message::Float64Array(vec![2.5]));
        match reader.read_message() {
            Err(FrameError::ConnectionClosed { received: 0, .. }) => {}
            other => panic!("expected clean close, got {other:?}"),
        }
    }

    #[test]
    fn shutdown_closes_all_listeners() {
        let ctx = Context::initialize();
        let (a, _) = loopback_listener(&ctx);
        let (b, _) = loopback_listener(&ctx);
        let held = ctx.registry().get(a).unwrap();
        assert_eq!(ctx.registry().len(), 2);
        assert_ne!(a, b);

        ctx.shutdown().unwrap();
        assert!(held.is_closed());
    }
}
