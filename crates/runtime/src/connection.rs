//! Request/response correlation layer for the debug agent.
//!
//! This module sits on top of a [`TransportParts`] and handles:
//! - Generating sequential request numbers (`seq`)
//! - Correlating responses (`request_seq`) with pending requests
//! - Distinguishing events from responses
//! - Forwarding events and stream termination as [`TargetEvent`]s
//!
//! # Message Flow
//!
//! 1. Caller invokes `send_command()` with a command name and arguments
//! 2. Connection takes the next `seq` and parks a oneshot sender under it
//! 3. Request is serialized and written through the transport
//! 4. Caller awaits the oneshot receiver
//! 5. Message loop receives the response and looks up `request_seq`
//! 6. The parked sender completes with the body or an agent rejection
//!
//! Nothing here times out: a request the agent never answers stays pending
//! until the stream ends.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use dtb_protocol::{AgentMessage, AgentRequest, AgentResponse};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{Mutex as AsyncMutex, mpsc, oneshot};

use crate::error::{Error, Result};
use crate::target::TargetEvent;
use crate::transport::{Transport, TransportParts, TransportReceiver};

type Incoming = (Box<dyn TransportReceiver>, mpsc::UnboundedReceiver<Value>);

/// Correlating connection to one debug agent.
///
/// Thread-safe; share it with `Arc` and issue concurrent commands from any
/// task.
pub struct AgentConnection {
	/// Sequential request counter
	last_seq: AtomicU64,
	/// Pending requests keyed by `seq`
	callbacks: Arc<Mutex<HashMap<u64, oneshot::Sender<Result<Value>>>>>,
	sender: AsyncMutex<Box<dyn Transport>>,
	/// Receiver half, taken by the first `run()`
	incoming: Mutex<Option<Incoming>>,
	events_tx: mpsc::UnboundedSender<TargetEvent>,
	closed: AtomicBool,
}

impl AgentConnection {
	/// Create a connection over `parts`, returning it together with the
	/// receiver of target events.
	pub fn new(parts: TransportParts) -> (Self, mpsc::UnboundedReceiver<TargetEvent>) {
		let (events_tx, events_rx) = mpsc::unbounded_channel();
		let connection = Self {
			last_seq: AtomicU64::new(0),
			callbacks: Arc::new(Mutex::new(HashMap::new())),
			sender: AsyncMutex::new(parts.sender),
			incoming: Mutex::new(Some((parts.receiver, parts.message_rx))),
			events_tx,
			closed: AtomicBool::new(false),
		};
		(connection, events_rx)
	}

	/// Send a command and await the agent's response body.
	///
	/// Fails with [`Error::AgentRejected`] when the agent answers
	/// `success: false`, and with [`Error::TargetClosed`] when the stream ends
	/// first.
	pub async fn send_command(&self, command: &str, arguments: Option<Value>) -> Result<Value> {
		if self.is_closed() {
			return Err(Error::TargetClosed(format!("cannot send {command}: connection closed")));
		}

		let seq = self.last_seq.fetch_add(1, Ordering::SeqCst);
		let (tx, rx) = oneshot::channel();
		self.callbacks.lock().insert(seq, tx);

		if let Err(err) = self.write(seq, command, arguments).await {
			self.callbacks.lock().remove(&seq);
			return Err(err);
		}

		rx.await.map_err(|_| Error::ChannelClosed).and_then(|result| result)
	}

	/// Send a command without waiting for (or correlating) its response.
	pub async fn notify(&self, command: &str, arguments: Option<Value>) -> Result<()> {
		let seq = self.last_seq.fetch_add(1, Ordering::SeqCst);
		self.write(seq, command, arguments).await
	}

	async fn write(&self, seq: u64, command: &str, arguments: Option<Value>) -> Result<()> {
		let request = AgentMessage::Request(AgentRequest {
			seq,
			command: command.to_string(),
			arguments,
		});
		let value = serde_json::to_value(&request)?;
		self.sender.lock().await.send(value).await
	}

	/// Run the message loop until the agent stream ends.
	///
	/// Spawn this once per connection. The loop ends after emitting
	/// [`TargetEvent::Closed`]; pending requests then fail with
	/// [`Error::TargetClosed`].
	pub async fn run(&self) {
		let Some((receiver, mut message_rx)) = self.incoming.lock().take() else {
			tracing::warn!(target = "dtb.agent", "message loop already started");
			return;
		};

		let transport_handle = tokio::spawn(receiver.run());

		while let Some(message) = message_rx.recv().await {
			self.dispatch(message);
		}

		let outcome = match transport_handle.await {
			Ok(Ok(())) => None,
			Ok(Err(err)) => Some(err.to_string()),
			Err(err) => Some(format!("transport task failed: {err}")),
		};

		if let Some(reason) = &outcome {
			tracing::error!(target = "dtb.agent", error = %reason, "agent transport error");
			let _ = self.events_tx.send(TargetEvent::Error(reason.clone()));
		}

		self.closed.store(true, Ordering::SeqCst);
		self.fail_pending(outcome.as_deref().unwrap_or("agent stream ended"));
		tracing::debug!(target = "dtb.agent", "message loop ended (transport closed)");
		let _ = self.events_tx.send(TargetEvent::Closed);
	}

	/// Dispatch one decoded agent message.
	fn dispatch(&self, message: Value) {
		match serde_json::from_value::<AgentMessage>(message) {
			Ok(AgentMessage::Response(response)) => self.complete(response),
			Ok(AgentMessage::Event(event)) => {
				let _ = self.events_tx.send(TargetEvent::Event {
					name: event.event,
					body: event.body.unwrap_or(Value::Null),
				});
			}
			Ok(AgentMessage::Request(request)) => {
				tracing::warn!(target = "dtb.agent", command = %request.command, "ignoring request sent by agent");
			}
			Err(err) => {
				tracing::error!(target = "dtb.agent", error = %err, "failed to parse agent message");
			}
		}
	}

	fn complete(&self, response: AgentResponse) {
		let Some(callback) = self.callbacks.lock().remove(&response.request_seq) else {
			tracing::debug!(
				target = "dtb.agent",
				request_seq = response.request_seq,
				command = %response.command,
				"response for unknown request dropped"
			);
			return;
		};

		let result = if response.success {
			Ok(response.body.unwrap_or(Value::Null))
		} else {
			let message = response.message.unwrap_or_else(|| format!("{} failed", response.command));
			Err(Error::AgentRejected {
				command: response.command,
				message,
			})
		};

		// Receiver may already be gone if the caller was cancelled
		let _ = callback.send(result);
	}

	fn fail_pending(&self, reason: &str) {
		let pending: Vec<_> = self.callbacks.lock().drain().collect();
		for (_, callback) in pending {
			let _ = callback.send(Err(Error::TargetClosed(reason.to_string())));
		}
	}

	/// Mark the connection closed, fail outstanding requests and close the
	/// outbound half.
	pub async fn shutdown(&self) -> Result<()> {
		self.closed.store(true, Ordering::SeqCst);
		self.fail_pending("connection shut down");
		self.sender.lock().await.close().await
	}

	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Number of requests still waiting for a response.
	pub fn pending_count(&self) -> usize {
		self.callbacks.lock().len()
	}
}
