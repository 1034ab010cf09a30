//! State shared by the transports and HTTP handlers

pub mod state;

pub use state::AppState;
