//! Integration tests for the WebSocket transport.
//!
//! A real listener on an OS-assigned port and a real tokio-tungstenite
//! client on the other end.

#[cfg(feature = "websocket")]
mod websocket {
    use std::sync::Arc;
    use std::time::Duration;

    use dicebet_transport::{Connection, Transport, TransportError, WebSocketTransport};
    use futures_util::{SinkExt, StreamExt};
    use tokio::net::TcpStream;
    use tokio_tungstenite::tungstenite::Message;
    use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

    type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

    async fn listen() -> (WebSocketTransport, String) {
        let transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("bound address").to_string();
        (transport, addr)
    }

    async fn connect_pair() -> (
        dicebet_transport::WebSocketConnection,
        Client,
        WebSocketTransport,
    ) {
        let (mut transport, addr) = listen().await;
        let accept = tokio::spawn(async move {
            let conn = transport.accept().await.expect("should accept");
            (conn, transport)
        });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let (conn, transport) = accept.await.expect("accept task");
        (conn, client, transport)
    }

    #[tokio::test]
    async fn test_local_addr_reports_assigned_port() {
        let (transport, addr) = listen().await;
        assert!(!addr.ends_with(":0"));
        assert_eq!(transport.local_addr().unwrap().ip().to_string(), "127.0.0.1");
    }

    #[tokio::test]
    async fn test_text_and_binary_frames_flow_both_ways() {
        let (server, mut client, _transport) = connect_pair().await;
        assert!(server.id().into_inner() > 0);
        assert!(server.peer_addr().ip().is_loopback());

        server.send_text(r#"{"reply":"ack"}"#).await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"reply":"ack"}"#);

        server.send(b"raw").await.unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), b"raw");

        client.send(Message::text(r#"{"op":"payouts"}"#.to_string())).await.unwrap();
        let received = server.recv().await.unwrap().expect("payload");
        assert_eq!(received, br#"{"op":"payouts"}"#);

        client
            .send(Message::Binary(b"bytes".to_vec().into()))
            .await
            .unwrap();
        assert_eq!(server.recv().await.unwrap().unwrap(), b"bytes");

        server.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_send_is_not_blocked_by_pending_recv() {
        let (server, mut client, _transport) = connect_pair().await;
        let server = Arc::new(server);

        let reader = {
            let server = Arc::clone(&server);
            tokio::spawn(async move { server.recv().await })
        };
        // Give the reader time to park inside recv.
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(2), server.send_text("event"))
            .await
            .expect("send must not wait for the reader")
            .unwrap();
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_text().unwrap().as_str(), "event");

        client.send(Message::text("request".to_string())).await.unwrap();
        let got = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(got, b"request");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (server, mut client, _transport) = connect_pair().await;
        client.send(Message::Close(None)).await.unwrap();
        let result = server.recv().await.expect("recv should not error");
        assert!(result.is_none(), "should return None on client close");
    }

    #[tokio::test]
    async fn test_accept_after_shutdown_fails() {
        let (mut transport, _addr) = listen().await;
        transport.shutdown().await.unwrap();
        let err = transport.accept().await.err().expect("accept must fail");
        assert!(matches!(err, TransportError::Shutdown));
        assert!(err.is_fatal());
    }
}
