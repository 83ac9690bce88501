// ── Live connection management ──
//
// Owns the live update channel: the connection state machine, resync on
// every successful open, reconnect with backoff, and auth-loss teardown.
// The connection manager is the only writer into the store.

mod backoff;
mod connector;
mod manager;

pub use backoff::{ReconnectConfig, backoff_ceiling, backoff_delay};
pub use connector::{Connector, HttpConnector, LiveSource};
pub use manager::{AuthEvent, ConnectionManager, ConnectionState, ConnectionStatus};
