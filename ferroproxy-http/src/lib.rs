//! Proxy connection engine: request intake, admission, forwarding, CONNECT
//! tunnels and WebSocket pass-through.

pub mod connection;
pub mod listener;
mod metrics;
pub mod pump;

pub use connection::{serve_connection, ConnectionContext};
pub use listener::ProxyListener;
pub use pump::{pump, PumpStats};
