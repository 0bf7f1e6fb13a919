// WebSocket server connecting the rendering client to the draft event loop.

use std::fmt::Display;

use futures_util::stream::Stream;
use futures_util::{Sink, SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::{broadcast, mpsc};
use tokio_tungstenite::tungstenite::{Error as WsError, Message};
use tracing::{debug, info, warn};

/// Events emitted by the WebSocket server to the application layer.
#[derive(Debug, PartialEq)]
pub enum WsEvent {
    /// A new WebSocket client has connected.
    Connected { addr: String },
    /// The current WebSocket client has disconnected.
    Disconnected,
    /// A text message was received from the client (raw JSON string).
    Message(String),
}

/// Run the WebSocket server on the given port.
///
/// Binds `127.0.0.1:{port}` and serves one client at a time. Inbound text
/// frames go to `tx` as [`WsEvent::Message`]; every string published on
/// `outbound` is written to the connected client. Runs until `tx` closes.
pub async fn run(
    port: u16,
    tx: mpsc::Sender<WsEvent>,
    outbound: broadcast::Sender<String>,
) -> anyhow::Result<()> {
    let listener = TcpListener::bind(format!("127.0.0.1:{port}")).await?;
    let local_addr = listener.local_addr()?;
    info!("WebSocket server listening on {local_addr}");

    loop {
        let (stream, addr) = listener.accept().await?;
        let addr_str = addr.to_string();
        info!("Accepted TCP connection from {addr_str}");

        let ws_stream = match tokio_tungstenite::accept_async(stream).await {
            Ok(ws) => ws,
            Err(e) => {
                warn!("WebSocket handshake failed for {addr_str}: {e}");
                continue;
            }
        };

        // Subscribe before announcing the connection so the snapshot the app
        // sends in response is not missed.
        let out_rx = outbound.subscribe();
        if tx
            .send(WsEvent::Connected {
                addr: addr_str.clone(),
            })
            .await
            .is_err()
        {
            break;
        }

        let (write, read) = ws_stream.split();
        if serve_connection(read, write, out_rx, &tx, &addr_str)
            .await
            .is_err()
        {
            break;
        }

        if tx.send(WsEvent::Disconnected).await.is_err() {
            break;
        }
    }

    Ok(())
}

/// Pump one connection until the client goes away: forward inbound text
/// frames through `tx` and write every outbound string to `write`.
///
/// Returns `Err(())` if either channel to the app is closed, signalling the
/// caller to stop serving. Generic over the stream and sink so it can be
/// tested without opening TCP ports.
pub async fn serve_connection<R, W>(
    mut read: R,
    mut write: W,
    mut outbound: broadcast::Receiver<String>,
    tx: &mpsc::Sender<WsEvent>,
    addr: &str,
) -> Result<(), ()>
where
    R: Stream<Item = Result<Message, WsError>> + Unpin,
    W: Sink<Message> + Unpin,
    W::Error: Display,
{
    loop {
        tokio::select! {
            inbound = read.next() => match inbound {
                Some(Ok(Message::Text(text))) => {
                    if tx.send(WsEvent::Message(text.to_string())).await.is_err() {
                        return Err(());
                    }
                }
                Some(Ok(Message::Close(_))) => {
                    info!("Client {addr} sent close frame");
                    break;
                }
                Some(Err(e)) => {
                    warn!("WebSocket error from {addr}: {e}");
                    break;
                }
                None => break,
                Some(Ok(_)) => {
                    // Ignore Binary, Ping, Pong, Frame variants.
                }
            },
            out = outbound.recv() => match out {
                Ok(text) => {
                    if let Err(e) = write.send(Message::Text(text.into())).await {
                        warn!("Failed to write to {addr}: {e}");
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    debug!("Client {addr} lagged, {skipped} outbound messages dropped");
                }
                Err(broadcast::error::RecvError::Closed) => return Err(()),
            },
        }
    }
    Ok(())
}
