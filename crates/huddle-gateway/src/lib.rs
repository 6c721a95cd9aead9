//! Realtime event bus and the WebSocket connection loop.

pub mod connection;
pub mod dispatcher;

pub use connection::handle_connection_authenticated;
pub use dispatcher::{Dispatcher, Envelope, Route};
