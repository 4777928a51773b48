// --- File: crates/slotsync_realtime/src/lib.rs ---

pub mod backoff;     // Reconnect backoff schedule
pub mod connection;  // Connection actor and its handle
pub mod protocol;    // Inbound events and outbound control frames
pub mod transport;   // Socket seam and the WebSocket transport

#[cfg(any(test, feature = "mock"))]
pub mod mock;

#[cfg(test)]
mod backoff_test;
#[cfg(test)]
mod connection_test;

pub use backoff::{BackoffPolicy, BackoffState};
pub use connection::{
    ConnectionManager, ConnectionSettings, ConnectionState, ConnectionStatus, EventHandler,
};
pub use protocol::{parse_frame, ControlFrame, LiveEvent};
pub use transport::{Outgoing, Transport, TransportEvent, TransportLink, WsTransport};
