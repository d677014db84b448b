use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::Result;
use crate::session::SessionEvent;

use super::messages::{ClientMessage, ServerMessage};

/// Bidirectional signaling channel to the room relay.
///
/// Outbound messages are queued and written by a dedicated task; inbound
/// frames are parsed and forwarded into the session event queue. Connection
/// loss surfaces exactly one `TransportClosed` event and is terminal; no
/// retry or backoff lives here.
pub struct SignalingTransport {
    outbound: mpsc::UnboundedSender<ClientMessage>,
    closed: Arc<AtomicBool>,
    writer_task: JoinHandle<()>,
    reader_task: JoinHandle<()>,
}

impl SignalingTransport {
    pub async fn connect(
        url: &str,
        events: mpsc::UnboundedSender<SessionEvent>,
    ) -> Result<Self> {
        let (ws_stream, _) = connect_async(url).await?;
        tracing::info!(url = %url, "Signaling connection established");

        let (mut ws_sender, mut ws_receiver) = ws_stream.split();
        let (tx, mut rx) = mpsc::unbounded_channel::<ClientMessage>();
        let closed = Arc::new(AtomicBool::new(false));

        let writer_task = tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                let text = match serde_json::to_string(&message) {
                    Ok(text) => text,
                    Err(e) => {
                        tracing::error!(error = %e, "Failed to serialize signaling message");
                        continue;
                    }
                };
                if let Err(e) = ws_sender.send(Message::Text(text)).await {
                    tracing::error!(error = %e, "Failed to send signaling message");
                    break;
                }
            }
        });

        let reader_closed = closed.clone();
        let reader_task = tokio::spawn(async move {
            while let Some(result) = ws_receiver.next().await {
                match result {
                    Ok(Message::Text(text)) => match serde_json::from_str::<ServerMessage>(&text) {
                        Ok(message) => {
                            if events.send(SessionEvent::Signal(message)).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                error = %e,
                                raw_message = %text,
                                "Ignoring unparseable signaling message"
                            );
                        }
                    },
                    Ok(Message::Close(_)) => {
                        tracing::info!("Signaling connection closed by relay");
                        break;
                    }
                    Ok(_) => {
                        // Binary, Ping, Pong, Frame
                        continue;
                    }
                    Err(e) => {
                        tracing::error!(error = %e, "Signaling connection error");
                        break;
                    }
                }
            }

            // Surface the loss once, unless this was a local disconnect
            if !reader_closed.swap(true, Ordering::SeqCst) {
                let _ = events.send(SessionEvent::TransportClosed);
            }
        });

        Ok(Self {
            outbound: tx,
            closed,
            writer_task,
            reader_task,
        })
    }

    /// Queue a message for the relay. Failures are logged, never propagated.
    pub fn send(&self, message: ClientMessage) {
        if self.closed.load(Ordering::SeqCst) {
            tracing::debug!("Dropping signaling message after disconnect");
            return;
        }
        if self.outbound.send(message).is_err() {
            tracing::warn!("Signaling writer gone, message dropped");
        }
    }

    /// Tear the connection down. Safe to call any number of times.
    pub fn disconnect(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        tracing::info!("Disconnecting signaling transport");
        self.writer_task.abort();
        self.reader_task.abort();
    }
}

impl Drop for SignalingTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}
