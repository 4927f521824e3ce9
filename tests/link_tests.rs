use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;

use helmcoder::link::{GatewayLink, LinkEvent};

const TEST_RETRY_DELAY: Duration = Duration::from_millis(50);

async fn recv_event(rx: &mut mpsc::UnboundedReceiver<LinkEvent>, what: &str) -> LinkEvent {
    tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .unwrap_or_else(|_| panic!("timed out waiting for {what}"))
        .expect("link event channel closed")
}

#[tokio::test]
async fn test_frames_flow_both_ways() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(r#"{"type":"turn_start"}"#.to_string()))
            .await
            .unwrap();
        match ws.next().await {
            Some(Ok(Message::Text(text))) => text,
            other => panic!("expected a text frame, got {other:?}"),
        }
    });

    let (link, mut events) =
        GatewayLink::connect_with_delay(&format!("ws://{addr}"), TEST_RETRY_DELAY);
    assert_eq!(recv_event(&mut events, "connect").await, LinkEvent::Connected);
    assert_eq!(
        recv_event(&mut events, "inbound frame").await,
        LinkEvent::Frame(r#"{"type":"turn_start"}"#.to_string())
    );

    link.send(r#"{"type":"abort"}"#.to_string());
    let received = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server timed out")
        .unwrap();
    assert_eq!(received, r#"{"type":"abort"}"#);

    link.disconnect().await;
}

#[tokio::test]
async fn test_reconnects_after_server_close() {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.close(None).await.unwrap();

        // A second accepted session proves the client retried on its own.
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        ws.send(Message::Text(r#"{"type":"agent_end"}"#.to_string()))
            .await
            .unwrap();
        let _ = ws.next().await;
    });

    let (link, mut events) =
        GatewayLink::connect_with_delay(&format!("ws://{addr}"), TEST_RETRY_DELAY);
    assert_eq!(recv_event(&mut events, "first connect").await, LinkEvent::Connected);
    assert_eq!(
        recv_event(&mut events, "server close").await,
        LinkEvent::Disconnected
    );
    assert_eq!(
        recv_event(&mut events, "reconnect").await,
        LinkEvent::Connected
    );
    assert_eq!(
        recv_event(&mut events, "frame after reconnect").await,
        LinkEvent::Frame(r#"{"type":"agent_end"}"#.to_string())
    );

    link.disconnect().await;
    server.abort();
}

#[tokio::test]
async fn test_keeps_retrying_and_disconnect_cancels_pending_retry() {
    // Reserve an address nothing is listening on.
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let (link, mut events) =
        GatewayLink::connect_with_delay(&format!("ws://{addr}"), TEST_RETRY_DELAY);

    // Consecutive failures keep producing attempts; the link never gives up.
    for round in 0..3 {
        assert_eq!(
            recv_event(&mut events, "failed attempt").await,
            LinkEvent::Disconnected,
            "attempt {round} should fail and schedule a retry"
        );
    }
    assert!(!link.is_connected());

    // Returns only after the link task has stopped.
    link.disconnect().await;

    // If a retry survived disconnect(), it would land on this listener.
    let listener = TcpListener::bind(addr).await.unwrap();
    let accepted = tokio::time::timeout(TEST_RETRY_DELAY * 6, listener.accept()).await;
    assert!(
        accepted.is_err(),
        "no connect attempt may happen after disconnect()"
    );
}

#[tokio::test]
async fn test_send_while_disconnected_is_dropped_not_queued() {
    let reserved = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = reserved.local_addr().unwrap();
    drop(reserved);

    let (link, mut events) =
        GatewayLink::connect_with_delay(&format!("ws://{addr}"), TEST_RETRY_DELAY);

    // Sent while down: must be dropped, not delivered later.
    link.send(r#"{"type":"prompt","message":"stale"}"#.to_string());
    assert_eq!(
        recv_event(&mut events, "failed attempt").await,
        LinkEvent::Disconnected
    );

    let listener = TcpListener::bind(addr).await.unwrap();
    let server = tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = accept_async(stream).await.unwrap();
        match ws.next().await {
            Some(Ok(Message::Text(text))) => text,
            other => panic!("expected a text frame, got {other:?}"),
        }
    });

    loop {
        if recv_event(&mut events, "eventual connect").await == LinkEvent::Connected {
            break;
        }
    }
    link.send(r#"{"type":"prompt","message":"fresh"}"#.to_string());

    let first_received = tokio::time::timeout(Duration::from_secs(5), server)
        .await
        .expect("server timed out")
        .unwrap();
    assert!(
        first_received.contains("fresh"),
        "stale frame must not precede the fresh one: {first_received}"
    );

    link.disconnect().await;
}
