//! WebSocket upgrade handler
//!
//! Each inbound text message is one or more input lines; each engine frame
//! goes out as one text message. Sessions behave exactly like line clients.

use std::net::SocketAddr;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        ConnectInfo, State,
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::app::AppState;
use crate::net::protocol::{next_session_id, ConnectionHandle, NetEvent, Outbound, OUTBOUND_CAPACITY};
use crate::net::ConnectionPermit;
use crate::session::SessionId;
use crate::util::rate_limit::InputRateLimiter;

/// WebSocket upgrade handler
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    ConnectInfo(peer): ConnectInfo<SocketAddr>,
    State(state): State<AppState>,
) -> Response {
    match state.limits.try_acquire(peer.ip()) {
        Some(permit) => ws.on_upgrade(move |socket| handle_socket(socket, peer, state, permit)),
        None => {
            warn!(peer = %peer, "Connection cap reached for address");
            (StatusCode::TOO_MANY_REQUESTS, "Too many connections from your address.").into_response()
        }
    }
}

/// Handle the upgraded WebSocket connection
async fn handle_socket(socket: WebSocket, peer: SocketAddr, state: AppState, _permit: ConnectionPermit) {
    let session_id = next_session_id();
    info!(session_id = %session_id, peer = %peer, "WebSocket connection accepted");

    let (ws_sink, ws_stream) = socket.split();
    let (handle, outbound) = ConnectionHandle::channel(OUTBOUND_CAPACITY);

    if state
        .events
        .send(NetEvent::Connected {
            session_id,
            peer,
            handle,
        })
        .is_err()
    {
        debug!(session_id = %session_id, "Engine gone, dropping connection");
        return;
    }

    run_session(session_id, ws_sink, ws_stream, outbound, &state).await;

    let _ = state.events.send(NetEvent::Disconnected { session_id });
    info!(session_id = %session_id, peer = %peer, "WebSocket connection closed");
}

/// Pump frames out and lines in until either side goes away
async fn run_session(
    session_id: SessionId,
    mut ws_sink: SplitSink<WebSocket, Message>,
    mut ws_stream: SplitStream<WebSocket>,
    mut outbound: mpsc::Receiver<Outbound>,
    state: &AppState,
) {
    // Writer task: engine frames -> WebSocket
    let mut writer_handle = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            match message {
                Outbound::Frame(text) => {
                    if let Err(e) = ws_sink.send(Message::Text(text)).await {
                        debug!(session_id = %session_id, error = %e, "WebSocket send failed");
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = ws_sink.send(Message::Close(None)).await;
                    break;
                }
            }
        }
    });

    let limiter = InputRateLimiter::new(state.config.input_rate_limit);

    // Reader loop: WebSocket -> engine
    'conn: loop {
        tokio::select! {
            next = ws_stream.next() => {
                let Some(result) = next else {
                    break;
                };
                match result {
                    Ok(Message::Text(text)) => {
                        for line in text.lines() {
                            let event = if limiter.check_input() {
                                NetEvent::Line {
                                    session_id,
                                    line: line.to_string(),
                                }
                            } else {
                                warn!(session_id = %session_id, "Rate limited input line");
                                NetEvent::Throttled { session_id }
                            };
                            if state.events.send(event).is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Ok(Message::Binary(_)) => {
                        warn!(session_id = %session_id, "Received binary message, ignoring");
                    }
                    Ok(Message::Ping(_)) | Ok(Message::Pong(_)) => {}
                    Ok(Message::Close(_)) => {
                        debug!(session_id = %session_id, "Client initiated close");
                        break;
                    }
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "WebSocket error");
                        break;
                    }
                }
            }
            _ = &mut writer_handle => {
                // Closed by the engine (quit/kick) or the send side failed
                break;
            }
        }
    }

    writer_handle.abort();
}
