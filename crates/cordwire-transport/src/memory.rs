//! In-process transport built on Tokio channels.
//!
//! [`channel`] returns a connected pair: a [`MemoryConnector`] handed to the
//! client, and a [`MemoryListener`] that the test drives as the "gateway".
//! Every successful `connect()` yields one [`MemoryPeer`] on the listener.
//! Dropping the peer looks like the server closing the socket.

use std::sync::atomic::{AtomicUsize, Ordering};

use tokio::sync::{Mutex, mpsc};

use crate::{Connection, ConnectionId, Connector, TransportError};

/// Creates a connector and the listener that receives its connections.
pub fn channel() -> (MemoryConnector, MemoryListener) {
    let (accept_tx, accept_rx) = mpsc::unbounded_channel();
    (
        MemoryConnector {
            accept_tx,
            refuse: AtomicUsize::new(0),
        },
        MemoryListener { accept_rx },
    )
}

/// Client side factory for in-memory connections.
pub struct MemoryConnector {
    accept_tx: mpsc::UnboundedSender<MemoryPeer>,
    refuse: AtomicUsize,
}

impl MemoryConnector {
    /// Makes the next `count` connect attempts fail.
    pub fn refuse_next(&self, count: usize) {
        self.refuse.store(count, Ordering::SeqCst);
    }
}

impl Connector for MemoryConnector {
    type Connection = MemoryConnection;

    async fn connect(&self) -> Result<Self::Connection, TransportError> {
        let refused = self
            .refuse
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                n.checked_sub(1)
            })
            .is_ok();
        if refused {
            return Err(TransportError::ConnectFailed(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                "connection refused by memory listener",
            )));
        }

        let (to_client, inbound) = mpsc::unbounded_channel();
        let (outbound, from_client) = mpsc::unbounded_channel();
        let id = ConnectionId::next();

        self.accept_tx
            .send(MemoryPeer {
                id,
                to_client,
                from_client,
            })
            .map_err(|_| {
                TransportError::ConnectFailed(std::io::Error::new(
                    std::io::ErrorKind::NotConnected,
                    "memory listener dropped",
                ))
            })?;

        Ok(MemoryConnection {
            id,
            inbound: Mutex::new(inbound),
            outbound: std::sync::Mutex::new(Some(outbound)),
        })
    }
}

/// Server side: yields one [`MemoryPeer`] per client connection.
pub struct MemoryListener {
    accept_rx: mpsc::UnboundedReceiver<MemoryPeer>,
}

impl MemoryListener {
    /// Waits for the client's next connection.
    ///
    /// Returns `None` once the connector has been dropped.
    pub async fn accept(&mut self) -> Option<MemoryPeer> {
        self.accept_rx.recv().await
    }
}

/// The server end of one in-memory connection.
pub struct MemoryPeer {
    id: ConnectionId,
    to_client: mpsc::UnboundedSender<Vec<u8>>,
    from_client: mpsc::UnboundedReceiver<String>,
}

impl MemoryPeer {
    /// The id shared with the client side of this connection.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Pushes one frame to the client. Returns `false` if the client is gone.
    pub fn send(&self, text: &str) -> bool {
        self.to_client.send(text.as_bytes().to_vec()).is_ok()
    }

    /// Waits for the next frame the client wrote.
    ///
    /// Returns `None` after the client closes its end.
    pub async fn recv(&mut self) -> Option<String> {
        self.from_client.recv().await
    }
}

/// The client end of one in-memory connection.
pub struct MemoryConnection {
    id: ConnectionId,
    inbound: Mutex<mpsc::UnboundedReceiver<Vec<u8>>>,
    outbound: std::sync::Mutex<Option<mpsc::UnboundedSender<String>>>,
}

impl Connection for MemoryConnection {
    async fn send(&self, text: &str) -> Result<(), TransportError> {
        let sender = self
            .outbound
            .lock()
            .map_err(|_| TransportError::ConnectionClosed("poisoned".into()))?
            .clone();
        match sender {
            Some(tx) => tx.send(text.to_owned()).map_err(|_| {
                TransportError::SendFailed(std::io::Error::new(
                    std::io::ErrorKind::BrokenPipe,
                    "memory peer dropped",
                ))
            }),
            None => Err(TransportError::ConnectionClosed(
                "connection closed locally".into(),
            )),
        }
    }

    async fn recv(&self) -> Result<Option<Vec<u8>>, TransportError> {
        Ok(self.inbound.lock().await.recv().await)
    }

    async fn close(&self) -> Result<(), TransportError> {
        if let Ok(mut outbound) = self.outbound.lock() {
            outbound.take();
        }
        Ok(())
    }

    fn id(&self) -> ConnectionId {
        self.id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_frames_flow_both_ways() {
        let (connector, mut listener) = channel();
        let conn = connector.connect().await.expect("should connect");
        let mut peer = listener.accept().await.expect("should accept");
        assert_eq!(peer.id(), conn.id());

        assert!(peer.send("from server"));
        let frame = conn.recv().await.unwrap().unwrap();
        assert_eq!(frame, b"from server");

        conn.send("from client").await.unwrap();
        assert_eq!(peer.recv().await.as_deref(), Some("from client"));
    }

    #[tokio::test]
    async fn test_dropping_peer_closes_client_recv() {
        let (connector, mut listener) = channel();
        let conn = connector.connect().await.unwrap();
        let peer = listener.accept().await.unwrap();
        drop(peer);
        assert!(conn.recv().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_close_ends_peer_stream_and_rejects_sends() {
        let (connector, mut listener) = channel();
        let conn = connector.connect().await.unwrap();
        let mut peer = listener.accept().await.unwrap();

        conn.close().await.unwrap();
        assert!(peer.recv().await.is_none());
        assert!(matches!(
            conn.send("late").await,
            Err(TransportError::ConnectionClosed(_))
        ));
    }

    #[tokio::test]
    async fn test_refuse_next_fails_exactly_that_many_attempts() {
        let (connector, _listener) = channel();
        connector.refuse_next(2);
        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_err());
        assert!(connector.connect().await.is_ok());
    }
}
