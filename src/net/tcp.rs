//! Raw TCP line server

use std::net::SocketAddr;

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info, warn};

use super::limits::ConnectionPermit;
use super::protocol::{next_session_id, ConnectionHandle, NetEvent, Outbound, OUTBOUND_CAPACITY};
use crate::app::AppState;
use crate::util::rate_limit::InputRateLimiter;
use crate::util::sanitize::MAX_LINE_LEN;
use crate::util::shutdown::ShutdownRx;

/// Bytes buffered without a newline before the partial line is forced out
const MAX_PENDING: usize = MAX_LINE_LEN * 4;

/// Splits an inbound byte stream into text lines
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: BytesMut,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self {
            buf: BytesMut::with_capacity(1024),
        }
    }

    pub fn buffer_mut(&mut self) -> &mut BytesMut {
        &mut self.buf
    }

    pub fn push(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Next complete line without its terminator (`\n` or `\r\n`)
    pub fn next_line(&mut self) -> Option<String> {
        match self.buf.iter().position(|b| *b == b'\n') {
            Some(pos) => {
                let raw = self.buf.split_to(pos + 1);
                let mut end = pos;
                if end > 0 && raw[end - 1] == b'\r' {
                    end -= 1;
                }
                Some(String::from_utf8_lossy(&raw[..end]).into_owned())
            }
            None if self.buf.len() >= MAX_PENDING => {
                let cut = char_boundary(&self.buf[..MAX_PENDING]);
                let raw = self.buf.split_to(cut);
                Some(String::from_utf8_lossy(&raw).into_owned())
            }
            None => None,
        }
    }

    pub fn pending(&self) -> usize {
        self.buf.remaining()
    }
}

/// Longest prefix of `bytes` that does not end inside a multi-byte character
fn char_boundary(bytes: &[u8]) -> usize {
    match std::str::from_utf8(bytes) {
        Err(err) if err.error_len().is_none() && err.valid_up_to() > 0 => err.valid_up_to(),
        _ => bytes.len(),
    }
}

/// Convert engine frames to telnet-style line endings
pub fn to_wire(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        if ch == '\n' {
            out.push('\r');
        }
        out.push(ch);
    }
    out
}

/// Accept loop for the line protocol
pub async fn run_line_server(listener: TcpListener, state: AppState, mut shutdown: ShutdownRx) {
    info!(addr = ?listener.local_addr().ok(), "Line server accepting connections");

    loop {
        tokio::select! {
            _ = shutdown.wait() => {
                info!("Line server stopping");
                break;
            }
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(pair) => pair,
                    Err(e) => {
                        warn!(error = %e, "Accept failed");
                        continue;
                    }
                };

                match state.limits.try_acquire(peer.ip()) {
                    Some(permit) => {
                        tokio::spawn(handle_connection(stream, peer, state.clone(), permit));
                    }
                    None => {
                        warn!(peer = %peer, "Connection cap reached for address");
                        tokio::spawn(refuse(stream));
                    }
                }
            }
        }
    }
}

async fn refuse(mut stream: TcpStream) {
    let _ = stream
        .write_all(b"Too many connections from your address.\r\n")
        .await;
    let _ = stream.shutdown().await;
}

async fn handle_connection(
    stream: TcpStream,
    peer: SocketAddr,
    state: AppState,
    _permit: ConnectionPermit,
) {
    let session_id = next_session_id();
    info!(session_id = %session_id, peer = %peer, "Connection accepted");

    let _ = stream.set_nodelay(true);
    let (mut reader, mut writer) = stream.into_split();
    let (handle, mut outbound) = ConnectionHandle::channel(OUTBOUND_CAPACITY);

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

    // Writer task: engine frames -> socket
    let mut writer_handle = tokio::spawn(async move {
        while let Some(message) = outbound.recv().await {
            match message {
                Outbound::Frame(text) => {
                    if let Err(e) = writer.write_all(to_wire(&text).as_bytes()).await {
                        debug!(session_id = %session_id, error = %e, "Socket write failed");
                        break;
                    }
                }
                Outbound::Close => {
                    let _ = writer.shutdown().await;
                    break;
                }
            }
        }
    });

    let limiter = InputRateLimiter::new(state.config.input_rate_limit);
    let mut lines = LineBuffer::new();

    // Reader loop: socket -> engine
    'conn: loop {
        tokio::select! {
            read = reader.read_buf(lines.buffer_mut()) => {
                match read {
                    Ok(0) => {
                        debug!(session_id = %session_id, "Peer closed connection");
                        break;
                    }
                    Ok(_) => {
                        while let Some(line) = lines.next_line() {
                            let event = if limiter.check_input() {
                                NetEvent::Line { session_id, line }
                            } else {
                                warn!(session_id = %session_id, "Rate limited input line");
                                NetEvent::Throttled { session_id }
                            };
                            if state.events.send(event).is_err() {
                                break 'conn;
                            }
                        }
                    }
                    Err(e) => {
                        debug!(session_id = %session_id, error = %e, "Socket read failed");
                        break;
                    }
                }
            }
            _ = &mut writer_handle => {
                // Closed by the engine (quit/kick) or the write side failed
                break;
            }
        }
    }

    writer_handle.abort();
    let _ = state.events.send(NetEvent::Disconnected { session_id });
    info!(session_id = %session_id, peer = %peer, "Connection closed");
}
