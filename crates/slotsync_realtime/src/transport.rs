// --- File: crates/slotsync_realtime/src/transport.rs ---
//! The socket seam of the connection manager.
//!
//! A `Transport` opens one link and hands back a pair of channels; the
//! connection actor never touches the socket itself.

use futures_util::{SinkExt, StreamExt};
use slotsync_common::{BoxFuture, SlotSyncError};
use tokio::sync::mpsc;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, warn};

/// Close code for an intentional shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;
/// Close frame carried no status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;
/// The link dropped without a close handshake.
pub const ABNORMAL_CLOSURE: u16 = 1006;

/// Frames written to the link.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    Text(String),
    Close { code: u16, reason: String },
}

/// What the link reports back. `Closed` is always the last event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    Text(String),
    Closed { code: u16 },
}

/// One open link.
pub struct TransportLink {
    pub outbound: mpsc::UnboundedSender<Outgoing>,
    pub inbound: mpsc::UnboundedReceiver<TransportEvent>,
}

pub trait Transport: Send + Sync {
    /// Performs the handshake; resolves once the link is usable.
    fn open(&self, url: &str) -> BoxFuture<'_, TransportLink, SlotSyncError>;
}

/// WebSocket transport over tokio-tungstenite.
#[derive(Debug, Default, Clone)]
pub struct WsTransport;

impl Transport for WsTransport {
    fn open(&self, url: &str) -> BoxFuture<'_, TransportLink, SlotSyncError> {
        let url = url.to_string();
        Box::pin(async move {
            let (ws_stream, _response) = connect_async(url.as_str())
                .await
                .map_err(|e| SlotSyncError::ConnectionError(format!("{}: {}", url, e)))?;
            debug!("WebSocket handshake completed with {}", url);

            let (mut write, mut read) = ws_stream.split();
            let (out_tx, mut out_rx) = mpsc::unbounded_channel::<Outgoing>();
            let (in_tx, in_rx) = mpsc::unbounded_channel::<TransportEvent>();

            // Writer task: forwards queued frames until a close is requested
            tokio::spawn(async move {
                while let Some(outgoing) = out_rx.recv().await {
                    match outgoing {
                        Outgoing::Text(text) => {
                            if let Err(e) = write.send(Message::Text(text)).await {
                                warn!("WebSocket send failed: {}", e);
                                break;
                            }
                        }
                        Outgoing::Close { code, reason } => {
                            let frame = CloseFrame {
                                code: CloseCode::from(code),
                                reason: reason.into(),
                            };
                            if let Err(e) = write.send(Message::Close(Some(frame))).await {
                                debug!("WebSocket close frame not delivered: {}", e);
                            }
                            break;
                        }
                    }
                }
            });

            // Reader task: text frames in, exactly one Closed at the end
            tokio::spawn(async move {
                let mut close_code = ABNORMAL_CLOSURE;
                while let Some(message) = read.next().await {
                    match message {
                        Ok(Message::Text(text)) => {
                            if in_tx.send(TransportEvent::Text(text)).is_err() {
                                return;
                            }
                        }
                        Ok(Message::Close(frame)) => {
                            close_code = frame
                                .map(|f| u16::from(f.code))
                                .unwrap_or(NO_STATUS_RECEIVED);
                            break;
                        }
                        Ok(_) => {}
                        Err(e) => {
                            warn!("WebSocket read error: {}", e);
                            break;
                        }
                    }
                }
                let _ = in_tx.send(TransportEvent::Closed { code: close_code });
            });

            Ok(TransportLink {
                outbound: out_tx,
                inbound: in_rx,
            })
        })
    }
}
