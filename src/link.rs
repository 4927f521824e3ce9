use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tokio_util::sync::CancellationToken;

pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    Connected,
    Disconnected,
    Frame(String),
}

/// The transport link: one task owning one WebSocket to the gateway.
/// Connection attempts repeat indefinitely with a fixed delay until
/// `disconnect` is called; each attempt is independent. `send` is
/// best-effort and drops frames while the link is down.
pub struct GatewayLink {
    outbound_tx: mpsc::UnboundedSender<String>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl GatewayLink {
    pub fn connect(url: &str) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        Self::connect_with_delay(url, RECONNECT_DELAY)
    }

    /// Same as `connect` with a custom retry delay. Tests shorten it.
    pub fn connect_with_delay(
        url: &str,
        retry_delay: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<LinkEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));
        let cancel = CancellationToken::new();

        let task = tokio::spawn(run_link(
            url.to_string(),
            retry_delay,
            event_tx,
            outbound_rx,
            Arc::clone(&connected),
            cancel.clone(),
        ));

        (
            Self {
                outbound_tx,
                connected,
                cancel,
                task: Some(task),
            },
            event_rx,
        )
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Best-effort delivery: a no-op, not a failure, when disconnected.
    pub fn send(&self, frame: String) {
        if !self.is_connected() {
            tracing::debug!("dropping outbound frame while disconnected");
            return;
        }
        let _ = self.outbound_tx.send(frame);
    }

    /// Terminal: cancels any pending retry, closes the socket, and waits for
    /// the link task to finish. No reconnection happens afterwards.
    pub async fn disconnect(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

async fn run_link(
    url: String,
    retry_delay: Duration,
    event_tx: mpsc::UnboundedSender<LinkEvent>,
    mut outbound_rx: mpsc::UnboundedReceiver<String>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
) {
    loop {
        let attempt = tokio::select! {
            _ = cancel.cancelled() => return,
            attempt = connect_async(url.as_str()) => attempt,
        };

        match attempt {
            Ok((stream, _response)) => {
                connected.store(true, Ordering::SeqCst);
                let _ = event_tx.send(LinkEvent::Connected);
                drive_socket(stream, &mut outbound_rx, &event_tx, &cancel).await;
                connected.store(false, Ordering::SeqCst);
                let _ = event_tx.send(LinkEvent::Disconnected);
                // Frames enqueued against the dead socket are stale.
                while outbound_rx.try_recv().is_ok() {}
            }
            Err(error) => {
                tracing::debug!(%error, "connect attempt failed");
                let _ = event_tx.send(LinkEvent::Disconnected);
            }
        }

        if cancel.is_cancelled() {
            return;
        }
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = tokio::time::sleep(retry_delay) => {}
        }
    }
}

async fn drive_socket(
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
    outbound_rx: &mut mpsc::UnboundedReceiver<String>,
    event_tx: &mpsc::UnboundedSender<LinkEvent>,
    cancel: &CancellationToken,
) {
    let (mut sink, mut source) = stream.split();
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                let _ = sink.send(Message::Close(None)).await;
                return;
            }
            frame = outbound_rx.recv() => match frame {
                Some(frame) => {
                    if sink.send(Message::Text(frame)).await.is_err() {
                        return;
                    }
                }
                None => return,
            },
            message = source.next() => match message {
                Some(Ok(Message::Text(text))) => {
                    let _ = event_tx.send(LinkEvent::Frame(text));
                }
                Some(Ok(Message::Binary(_) | Message::Ping(_) | Message::Pong(_) | Message::Frame(_))) => {}
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            },
        }
    }
}
