use crate::error::{BlockchainError, Result};
use crate::network::{ConnectionTracker, GossipMessage};
use log::{debug, error, info, warn};
use serde_json::{Deserializer, Value};
use std::io::BufReader;
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Idle time after which an inbound connection is dropped
const TCP_READ_TIMEOUT: Duration = Duration::from_secs(60);

/// Receiver of decoded inbound messages
pub trait MessageHandler: Send + Sync {
    fn handle(&self, message: GossipMessage, from: SocketAddr);
}

impl<F> MessageHandler for F
where
    F: Fn(GossipMessage, SocketAddr) + Send + Sync,
{
    fn handle(&self, message: GossipMessage, from: SocketAddr) {
        self(message, from)
    }
}

/// Inbound side of the network: accepts connections and hands every decoded
/// message to a [`MessageHandler`]
pub struct GossipServer {
    listener: TcpListener,
    connections: Arc<ConnectionTracker>,
}

impl GossipServer {
    pub fn bind(addr: SocketAddr, max_connections: usize) -> Result<GossipServer> {
        let listener = TcpListener::bind(addr)
            .map_err(|e| BlockchainError::Network(format!("Failed to bind to {addr}: {e}")))?;

        Ok(GossipServer {
            listener,
            connections: Arc::new(ConnectionTracker::new(max_connections)),
        })
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Serve on a background thread
    pub fn spawn<H>(self, handler: Arc<H>) -> JoinHandle<Result<()>>
    where
        H: MessageHandler + ?Sized + 'static,
    {
        thread::spawn(move || self.serve(handler))
    }

    /// Accept connections forever, one handler thread per connection
    pub fn serve<H>(self, handler: Arc<H>) -> Result<()>
    where
        H: MessageHandler + ?Sized + 'static,
    {
        info!("Server listening on {}", self.local_addr()?);

        for stream in self.listener.incoming() {
            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    error!("Error accepting connection: {e}");
                    continue;
                }
            };
            let peer_addr = match stream.peer_addr() {
                Ok(addr) => addr,
                Err(e) => {
                    error!("Failed to get peer address: {e}");
                    continue;
                }
            };

            if !self
                .connections
                .should_accept_connection()
                .unwrap_or(false)
            {
                warn!("Rejecting connection from {peer_addr}: connection limit reached");
                let _ = stream.shutdown(Shutdown::Both);
                continue;
            }
            if let Err(e) = self.connections.record_connection(peer_addr) {
                warn!("Failed to record connection: {e}");
            }

            let handler = Arc::clone(&handler);
            let connections = Arc::clone(&self.connections);
            thread::spawn(move || {
                let result = handle_connection(stream, peer_addr, handler.as_ref());

                if let Err(e) = connections.record_disconnection(peer_addr) {
                    warn!("Failed to record disconnection: {e}");
                }
                if let Err(e) = result {
                    error!("Error handling connection from {peer_addr}: {e}");
                }
            });
        }

        Ok(())
    }
}

/// Read a stream of JSON values until the peer closes. Values that are not
/// gossip messages are dropped; broken JSON ends the connection.
fn handle_connection<H>(stream: TcpStream, peer_addr: SocketAddr, handler: &H) -> Result<()>
where
    H: MessageHandler + ?Sized,
{
    stream
        .set_read_timeout(Some(TCP_READ_TIMEOUT))
        .map_err(|e| BlockchainError::Network(format!("Failed to set read timeout: {e}")))?;

    let reader = BufReader::new(&stream);
    let values = Deserializer::from_reader(reader).into_iter::<Value>();

    for value in values {
        let value = value.map_err(|e| {
            BlockchainError::MalformedMessage(format!("Unreadable stream from {peer_addr}: {e}"))
        })?;

        match GossipMessage::from_value(value) {
            Ok(message) => {
                debug!("Received {message} from {peer_addr}");
                handler.handle(message, peer_addr);
            }
            Err(e) => warn!("Dropping message from {peer_addr}: {e}"),
        }
    }

    let _ = stream.shutdown(Shutdown::Both);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::network::{send_data, Peer};
    use std::io::Write;
    use std::sync::mpsc;

    fn start() -> (SocketAddr, mpsc::Receiver<GossipMessage>) {
        let server = GossipServer::bind("127.0.0.1:0".parse().unwrap(), 4).unwrap();
        let addr = server.local_addr().unwrap();
        let (sender, receiver) = mpsc::channel();
        let sender = std::sync::Mutex::new(sender);
        let handler = move |message: GossipMessage, _from: SocketAddr| {
            let _ = sender.lock().unwrap().send(message);
        };
        server.spawn(Arc::new(handler));
        (addr, receiver)
    }

    #[test]
    fn test_message_reaches_handler() {
        let (addr, receiver) = start();
        let message = GossipMessage::Peers(vec![Peer::new("::1", 10000)]);

        send_data(addr, &message.to_bytes().unwrap(), Duration::from_secs(1)).unwrap();
        let received = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, message);
    }

    #[test]
    fn test_undecodable_value_is_skipped_not_fatal() {
        let (addr, receiver) = start();
        let message = GossipMessage::Peers(vec![]);

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(br#"{"bogus": true}"#).unwrap();
        stream.write_all(&message.to_bytes().unwrap()).unwrap();
        drop(stream);

        let received = receiver.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received, message);
    }

    #[test]
    fn test_broken_json_closes_connection() {
        let (addr, receiver) = start();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream.write_all(b"{not json at all").unwrap();
        drop(stream);
        assert!(receiver.recv_timeout(Duration::from_millis(300)).is_err());

        // the server keeps accepting
        let message = GossipMessage::Peers(vec![]);
        send_data(addr, &message.to_bytes().unwrap(), Duration::from_secs(1)).unwrap();
        assert_eq!(
            receiver.recv_timeout(Duration::from_secs(5)).unwrap(),
            message
        );
    }
}
