//! WebSocket bridge onto the line protocol

pub mod handler;

pub use handler::ws_handler;
