//! Integration tests for the WebSocket client transport.
//!
//! These tests spin up a real WebSocket server on loopback and dial it
//! with [`WebSocketConnector`] to verify that frames actually cross the
//! network in both directions.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use cordwire_transport::{Connection, Connector, WebSocketConnector};
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpListener;
    use tokio_tungstenite::tungstenite::Message;

    type ServerWs = tokio_tungstenite::WebSocketStream<tokio::net::TcpStream>;

    /// Helper: binds a loopback listener on an OS-assigned port.
    async fn bind() -> (TcpListener, String) {
        let listener = TcpListener::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = listener.local_addr().expect("should have addr");
        (listener, format!("ws://{addr}"))
    }

    /// Helper: accepts one WebSocket upgrade on the listener.
    async fn accept(listener: &TcpListener) -> ServerWs {
        let (stream, _) = listener.accept().await.expect("should accept");
        tokio_tungstenite::accept_async(stream)
            .await
            .expect("upgrade should succeed")
    }

    #[tokio::test]
    async fn test_websocket_connect_send_and_receive() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move { accept(&listener).await });

        let connector = WebSocketConnector::new(url.clone());
        assert_eq!(connector.url(), url);
        let conn = connector.connect().await.expect("client should connect");
        let mut server_ws = server.await.expect("task should complete");

        assert!(conn.id().into_inner() > 0);

        // --- Server sends, client receives ---
        server_ws
            .send(Message::Text(r#"{"op":10}"#.into()))
            .await
            .unwrap();
        let frame = conn
            .recv()
            .await
            .expect("recv should succeed")
            .expect("should have data");
        assert_eq!(frame, br#"{"op":10}"#);

        // --- Client sends, server receives a text frame ---
        conn.send(r#"{"op":1,"d":null}"#).await.unwrap();
        let msg = server_ws.next().await.unwrap().unwrap();
        assert!(msg.is_text(), "gateway frames must be text");
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"op":1,"d":null}"#);

        conn.close().await.expect("close should succeed");
    }

    #[tokio::test]
    async fn test_send_is_not_blocked_by_pending_recv() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move { accept(&listener).await });

        let conn = std::sync::Arc::new(
            WebSocketConnector::new(url).connect().await.unwrap(),
        );
        let mut server_ws = server.await.unwrap();

        // Park a reader on the connection; nothing will arrive for it yet.
        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        // The write half must still be usable.
        tokio::time::timeout(Duration::from_secs(2), conn.send("beat"))
            .await
            .expect("send must not wait on the reader")
            .unwrap();
        let msg = server_ws.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "beat");

        server_ws.send(Message::Text("wake".into())).await.unwrap();
        let frame = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(frame, b"wake");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_server_close() {
        let (listener, url) = bind().await;
        let server = tokio::spawn(async move { accept(&listener).await });

        let conn = WebSocketConnector::new(url).connect().await.unwrap();
        let mut server_ws = server.await.unwrap();

        server_ws.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on server close");
    }

    #[tokio::test]
    async fn test_connect_to_closed_port_fails() {
        let (listener, url) = bind().await;
        drop(listener);

        let result = WebSocketConnector::new(url).connect().await;
        assert!(result.is_err());
    }
}
