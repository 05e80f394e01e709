use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::debug;
use url::Url;
use voice_transport::{ClosedFlag, OpenedSession, TransportEvent, TransportSession, VoiceTransport};

/// Text-frame WebSocket transport to the voice agent.
///
/// Binary frames (audio) are not this client's concern and are skipped.
#[derive(Debug, Default, Clone, Copy)]
pub struct WebSocketTransport;

struct WebSocketHandle {
    closed: Arc<ClosedFlag>,
}

impl TransportSession for WebSocketHandle {
    fn close(&self) {
        if self.closed.set() {
            debug!("websocket: close requested");
        }
    }

    fn is_closed(&self) -> bool {
        self.closed.get()
    }
}

impl Drop for WebSocketHandle {
    fn drop(&mut self) {
        self.closed.set();
    }
}

#[async_trait]
impl VoiceTransport for WebSocketTransport {
    async fn open(&self, endpoint: &Url) -> anyhow::Result<OpenedSession> {
        let (ws_stream, _) = connect_async(endpoint.as_str())
            .await
            .with_context(|| format!("failed to connect websocket: {endpoint}"))?;
        let (mut ws_writer, mut ws_reader) = ws_stream.split();

        let (tx, rx) = mpsc::unbounded_channel();
        let _ = tx.send(TransportEvent::Connected);

        let closed = Arc::new(ClosedFlag::new());
        let reader_closed = Arc::clone(&closed);
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    () = reader_closed.wait() => {
                        let _ = ws_writer.send(Message::Close(None)).await;
                        break;
                    }
                    msg = ws_reader.next() => match msg {
                        Some(Ok(Message::Text(text))) => {
                            if tx.send(TransportEvent::Message(text)).is_err() {
                                break;
                            }
                        }
                        Some(Ok(Message::Close(frame))) => {
                            let reason = frame
                                .map(|frame| frame.reason.to_string())
                                .filter(|reason| !reason.is_empty());
                            let _ = tx.send(TransportEvent::Disconnected { reason });
                            break;
                        }
                        Some(Ok(_)) => {}
                        Some(Err(err)) => {
                            let _ = tx.send(TransportEvent::Error(format!(
                                "websocket receive failed: {err}"
                            )));
                            break;
                        }
                        None => {
                            let _ = tx.send(TransportEvent::Disconnected { reason: None });
                            break;
                        }
                    },
                }
            }
            reader_closed.set();
        });

        Ok(OpenedSession {
            handle: Box::new(WebSocketHandle { closed }),
            events: rx,
        })
    }
}

#[cfg(test)]
#[path = "tests/transport_tests.rs"]
mod tests;
