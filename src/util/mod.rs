//! Shared utilities

pub mod rate_limit;
pub mod sanitize;
pub mod shutdown;
pub mod time;
