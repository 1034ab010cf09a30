//! Events and handles shared by the line and websocket transports

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::mpsc;

use crate::session::SessionId;

/// Frames queued per connection before the engine treats it as stalled
pub const OUTBOUND_CAPACITY: usize = 256;

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

pub fn next_session_id() -> SessionId {
    SessionId(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
}

/// Transport -> engine
#[derive(Debug)]
pub enum NetEvent {
    Connected {
        session_id: SessionId,
        peer: SocketAddr,
        handle: ConnectionHandle,
    },
    Line {
        session_id: SessionId,
        line: String,
    },
    /// Input dropped by the per-connection rate limiter
    Throttled { session_id: SessionId },
    Disconnected { session_id: SessionId },
}

/// Engine -> transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Frame(String),
    Close,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,
    #[error("outbound queue full")]
    Backpressure,
}

/// Non-blocking write side of one connection
#[derive(Debug, Clone)]
pub struct ConnectionHandle {
    tx: mpsc::Sender<Outbound>,
}

impl ConnectionHandle {
    pub fn channel(capacity: usize) -> (Self, mpsc::Receiver<Outbound>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { tx }, rx)
    }

    pub fn send_frame(&self, text: String) -> Result<(), TransportError> {
        self.push(Outbound::Frame(text))
    }

    pub fn close(&self) -> Result<(), TransportError> {
        self.push(Outbound::Close)
    }

    fn push(&self, message: Outbound) -> Result<(), TransportError> {
        self.tx.try_send(message).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => TransportError::Backpressure,
            mpsc::error::TrySendError::Closed(_) => TransportError::Closed,
        })
    }
}
