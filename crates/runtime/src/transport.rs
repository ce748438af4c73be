//! Transport seam between the agent connection and the agent's byte stream.
//!
//! A transport moves already-decoded JSON messages. How those messages are
//! framed on the wire is the concern of the concrete implementation that a
//! [`TargetConnector`](crate::target::TargetConnector) hands out, never of the
//! connection layer.

use std::future::Future;
use std::pin::Pin;

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Result;

/// Outbound half: writes one message to the agent.
pub trait Transport: Send {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;

	/// Shuts the outbound half down. The default does nothing.
	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async { Ok(()) })
	}
}

/// Inbound half: pumps decoded agent messages into the connection's channel
/// until the stream ends.
///
/// Returning `Ok(())` means the agent closed the stream cleanly; an `Err`
/// is reported to the session as a target error before it closes.
pub trait TransportReceiver: Send {
	fn run(self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>>;
}

/// Both halves of a transport plus the channel the receiver feeds.
pub struct TransportParts {
	pub sender: Box<dyn Transport>,
	pub receiver: Box<dyn TransportReceiver>,
	pub message_rx: mpsc::UnboundedReceiver<Value>,
}
