//! Connection transports feeding the engine

pub mod limits;
pub mod protocol;
pub mod tcp;

pub use limits::{ConnectionLimits, ConnectionPermit};
pub use protocol::{ConnectionHandle, NetEvent, Outbound, TransportError};
