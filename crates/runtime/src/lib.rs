//! Debug-agent connection layer for the devtools bridge.
//!
//! * [`transport`]: the seam behind which agent messages are framed
//! * [`connection`]: `seq`/`request_seq` correlation and event routing
//! * [`target`]: the per-session [`DebugTarget`] handle and its connector
//! * `fake_transport`: in-memory transport for tests, behind the `testing`
//!   feature

pub mod connection;
pub mod error;
#[cfg(any(test, feature = "testing"))]
pub mod fake_transport;
pub mod target;
pub mod transport;

pub use connection::AgentConnection;
pub use error::{Error, Result};
#[cfg(any(test, feature = "testing"))]
pub use fake_transport::{FakeReply, FakeTransportBuilder, FakeTransportController};
pub use target::{ConnectedTarget, DebugTarget, TargetAddress, TargetConnector, TargetEvent};
pub use transport::{Transport, TransportParts, TransportReceiver};
