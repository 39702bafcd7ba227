//! Per-connection handler: translate WebSocket frames to hub commands and
//! hub notifications back to frames.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use talkpair_common::ConnectionId;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

use crate::hub::HubHandle;
use crate::protocol::{ClientCommand, ServerNotice};

type WsSink = futures_util::stream::SplitSink<WebSocketStream<TcpStream>, Message>;

/// Handle a single WebSocket connection until it closes.
pub async fn handle_connection(
    ws: WebSocketStream<TcpStream>,
    addr: SocketAddr,
    hub: HubHandle,
    outbound_buffer: usize,
) {
    let (mut sink, mut stream) = ws.split();
    let id = ConnectionId::new();

    let (tx, mut rx) = mpsc::channel::<String>(outbound_buffer);
    if hub.connect(id, tx).await.is_err() {
        tracing::warn!(peer = %addr, "Hub unavailable, dropping connection");
        return;
    }

    tracing::info!(peer = %addr, conn = %id, "Client connected");

    loop {
        tokio::select! {
            // Notifications from the hub → this client's socket
            msg = rx.recv() => {
                let Some(msg) = msg else {
                    tracing::warn!(conn = %id, "Evicted by hub, closing");
                    break;
                };
                if sink.send(Message::Text(msg.into())).await.is_err() {
                    break;
                }
            }

            // Frames from this client → hub
            frame = stream.next() => {
                match frame {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ClientCommand>(&text) {
                            Ok(command) => {
                                if hub.command(id, command).await.is_err() {
                                    break;
                                }
                            }
                            Err(e) => {
                                tracing::debug!(conn = %id, error = %e, "Unparseable command");
                                let notice = ServerNotice::status(format!("Unrecognized command: {e}"));
                                if send_notice(&mut sink, &notice).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Binary(_))) => {
                        let notice = ServerNotice::status("Binary frames are not supported");
                        if send_notice(&mut sink, &notice).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Ping(data))) => {
                        if sink.send(Message::Pong(data)).await.is_err() {
                            break;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        tracing::debug!(conn = %id, error = %e, "WS error");
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    tracing::info!(peer = %addr, conn = %id, "Client disconnected");

    if hub.disconnect(id).await.is_err() {
        tracing::warn!(conn = %id, "Hub gone before disconnect");
    }
}

/// Write a notice straight to this client, bypassing the hub.
async fn send_notice(
    sink: &mut WsSink,
    notice: &ServerNotice,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    match notice.to_json() {
        Ok(json) => sink.send(Message::Text(json.into())).await,
        Err(e) => {
            tracing::warn!(error = %e, "Failed to encode notice");
            Ok(())
        }
    }
}
