//! Integration tests for the WebSocket transport: a real listener on an
//! ephemeral port and a `tokio-tungstenite` client.

#[cfg(feature = "websocket")]
mod websocket {
    use std::time::Duration;

    use futures_util::{SinkExt, StreamExt};
    use tokio_tungstenite::tungstenite::Message;
    use trivia_transport::{Connection, Transport, WebSocketTransport};

    type ClientWs = tokio_tungstenite::WebSocketStream<
        tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>,
    >;

    async fn pair() -> (trivia_transport::WebSocketConnection, ClientWs) {
        let mut transport = WebSocketTransport::bind("127.0.0.1:0")
            .await
            .expect("should bind");
        let addr = transport.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            transport.accept().await.expect("should accept")
        });
        let (client, _) = tokio_tungstenite::connect_async(format!("ws://{addr}"))
            .await
            .expect("client should connect");
        let conn = server.await.expect("accept task");
        (conn, client)
    }

    #[tokio::test]
    async fn test_json_goes_out_as_text_frame() {
        let (conn, mut client) = pair().await;
        assert!(conn.id().into_inner() > 0);

        conn.send(br#"{"event":"ack"}"#).await.expect("send");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_text());
        assert_eq!(msg.into_text().unwrap().as_str(), r#"{"event":"ack"}"#);
    }

    #[tokio::test]
    async fn test_non_utf8_goes_out_as_binary_frame() {
        let (conn, mut client) = pair().await;

        conn.send(&[0xff, 0x00, 0xfe]).await.expect("send");

        let msg = client.next().await.unwrap().unwrap();
        assert!(msg.is_binary());
        assert_eq!(msg.into_data().as_ref(), &[0xff, 0x00, 0xfe]);
    }

    #[tokio::test]
    async fn test_recv_accepts_text_and_binary() {
        let (conn, mut client) = pair().await;

        client.send(Message::text("hello")).await.unwrap();
        client
            .send(Message::binary(b"world".to_vec()))
            .await
            .unwrap();

        assert_eq!(conn.recv().await.unwrap().unwrap(), b"hello");
        assert_eq!(conn.recv().await.unwrap().unwrap(), b"world");
    }

    #[tokio::test]
    async fn test_send_is_not_blocked_by_pending_recv() {
        let (conn, mut client) = pair().await;
        let conn = std::sync::Arc::new(conn);

        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        tokio::time::timeout(Duration::from_secs(1), conn.send(b"push"))
            .await
            .expect("send must not wait for recv")
            .expect("send");
        let msg = client.next().await.unwrap().unwrap();
        assert_eq!(msg.into_data().as_ref(), b"push");

        client.send(Message::Close(None)).await.unwrap();
        let received = reader.await.unwrap().expect("recv");
        assert!(received.is_none());
    }

    #[tokio::test]
    async fn test_ping_counts_as_activity() {
        let (conn, mut client) = pair().await;
        let conn = std::sync::Arc::new(conn);
        let reader = {
            let conn = std::sync::Arc::clone(&conn);
            tokio::spawn(async move { conn.recv().await })
        };

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(conn.idle_for() >= Duration::from_millis(200));

        client.send(Message::Ping(Default::default())).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(conn.idle_for() < Duration::from_millis(150));
        assert!(!reader.is_finished(), "pings are not data");

        client.send(Message::text("data")).await.unwrap();
        let received = reader.await.unwrap().expect("recv");
        assert_eq!(received.unwrap(), b"data");
    }

    #[tokio::test]
    async fn test_recv_returns_none_on_client_close() {
        let (conn, mut client) = pair().await;

        client.send(Message::Close(None)).await.unwrap();

        let result = conn.recv().await.expect("recv should not error");
        assert!(result.is_none());
    }
}
