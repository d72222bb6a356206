//! Live log streaming
//!
//! - `hub`: connection registry and fan-out
//! - `socket`: one WebSocket session per client with JSON ping keep-alive
//! - `layer`: tracing layer pushing formatted events onto the bounded queue
//!   drained by the hub's broadcaster task

pub mod hub;
pub mod layer;
pub mod socket;

pub use hub::{BroadcastReport, ConnectionId, LogHub, LogSink};
pub use layer::BroadcastLayer;
pub use socket::ws_logs;
