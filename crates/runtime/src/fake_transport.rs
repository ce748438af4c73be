//! Fake transport for unit testing agent correlation and relay translation.
//!
//! Provides an in-memory transport so the connection and relay layers can be
//! exercised without a debuggable process.
//!
//! # Example
//!
//! ```ignore
//! let (parts, controller) = FakeTransportBuilder::new().build();
//! let (connection, events) = AgentConnection::new(parts);
//! let connection = Arc::new(connection);
//!
//! tokio::spawn({
//!     let conn = Arc::clone(&connection);
//!     async move { conn.run().await }
//! });
//!
//! let fut = tokio::spawn(async move { connection.send_command("backtrace", None).await });
//! controller.next_sent().await;
//! controller.inject_response(0, "backtrace", json!({"frames": []}));
//! let body = fut.await??;
//! ```

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::sync::{Mutex as AsyncMutex, mpsc};
use tokio::task::JoinHandle;

use crate::error::{Error, Result};
use crate::transport::{Transport, TransportParts, TransportReceiver};

/// What the scripted agent does with one request.
#[derive(Debug, Clone)]
pub enum FakeReply {
	/// Answer with `success: true` and this body.
	Body(Value),
	/// Answer with `success: false` and this message.
	Reject(String),
	/// Never answer.
	NoReply,
}

enum Inbound {
	Message(Value),
	Fail(String),
	End,
}

/// Builder for creating fake transport instances.
pub struct FakeTransportBuilder {}

impl FakeTransportBuilder {
	pub fn new() -> Self {
		Self {}
	}

	/// Build the fake transport and return both parts and a controller.
	///
	/// Returns [`TransportParts`] for creating an
	/// [`AgentConnection`](crate::connection::AgentConnection) and a
	/// [`FakeTransportController`] for injecting agent messages and inspecting
	/// sent requests.
	pub fn build(self) -> (TransportParts, FakeTransportController) {
		let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
		let (message_tx, message_rx) = mpsc::unbounded_channel();
		let (sent_tx, sent_rx) = mpsc::unbounded_channel();
		let sent = Arc::new(Mutex::new(Vec::new()));
		let closed = Arc::new(AtomicBool::new(false));

		let sender = FakeTransportSender {
			sent: Arc::clone(&sent),
			sent_tx,
			closed: Arc::clone(&closed),
		};

		let receiver = FakeTransportReceiver { inbound_rx, message_tx };

		let controller = FakeTransportController {
			inbound_tx,
			sent,
			sent_rx: Arc::new(AsyncMutex::new(sent_rx)),
			closed,
		};

		let parts = TransportParts {
			sender: Box::new(sender),
			receiver: Box::new(receiver),
			message_rx,
		};

		(parts, controller)
	}
}

impl Default for FakeTransportBuilder {
	fn default() -> Self {
		Self::new()
	}
}

/// Controller for injecting agent traffic and inspecting sent requests.
#[derive(Clone)]
pub struct FakeTransportController {
	inbound_tx: mpsc::UnboundedSender<Inbound>,
	sent: Arc<Mutex<Vec<Value>>>,
	sent_rx: Arc<AsyncMutex<mpsc::UnboundedReceiver<Value>>>,
	closed: Arc<AtomicBool>,
}

impl FakeTransportController {
	/// Inject a raw JSON message as if the agent had sent it.
	pub fn inject(&self, message: Value) {
		let _ = self.inbound_tx.send(Inbound::Message(message));
	}

	/// Inject a successful response to the request with `request_seq`.
	pub fn inject_response(&self, request_seq: u64, command: &str, body: Value) {
		self.inject(json!({
			"seq": 0,
			"type": "response",
			"request_seq": request_seq,
			"command": command,
			"success": true,
			"body": body,
			"running": false
		}));
	}

	/// Inject a rejected response to the request with `request_seq`.
	pub fn inject_rejection(&self, request_seq: u64, command: &str, message: &str) {
		self.inject(json!({
			"seq": 0,
			"type": "response",
			"request_seq": request_seq,
			"command": command,
			"success": false,
			"message": message,
			"running": false
		}));
	}

	/// Inject an agent event.
	pub fn inject_event(&self, event: &str, body: Value) {
		self.inject(json!({
			"seq": 0,
			"type": "event",
			"event": event,
			"body": body
		}));
	}

	/// Make the receiving half fail with `reason`.
	pub fn fail(&self, reason: &str) {
		let _ = self.inbound_tx.send(Inbound::Fail(reason.to_string()));
	}

	/// End the agent stream cleanly.
	pub fn end(&self) {
		let _ = self.inbound_tx.send(Inbound::End);
	}

	/// Snapshot of every request sent so far.
	pub fn sent(&self) -> Vec<Value> {
		self.sent.lock().clone()
	}

	/// Take all sent requests, clearing the buffer.
	pub fn take_sent(&self) -> Vec<Value> {
		std::mem::take(&mut *self.sent.lock())
	}

	/// Names of the sent commands, in send order.
	pub fn sent_commands(&self) -> Vec<String> {
		self.sent
			.lock()
			.iter()
			.filter_map(|request| request["command"].as_str().map(str::to_string))
			.collect()
	}

	/// Number of sent requests for `command`.
	pub fn sent_count(&self, command: &str) -> usize {
		self.sent.lock().iter().filter(|request| request["command"] == command).count()
	}

	/// Wait for the next sent request.
	pub async fn next_sent(&self) -> Option<Value> {
		self.sent_rx.lock().await.recv().await
	}

	/// Whether the connection closed its outbound half.
	pub fn is_closed(&self) -> bool {
		self.closed.load(Ordering::SeqCst)
	}

	/// Answer every sent request with `responder`, until the transport is
	/// dropped.
	pub fn respond_with<F>(&self, responder: F) -> JoinHandle<()>
	where
		F: Fn(&str, &Value) -> FakeReply + Send + 'static,
	{
		let controller = self.clone();
		tokio::spawn(async move {
			while let Some(request) = controller.next_sent().await {
				let Some(seq) = request["seq"].as_u64() else {
					continue;
				};
				let command = request["command"].as_str().unwrap_or_default().to_string();
				let arguments = request.get("arguments").cloned().unwrap_or(Value::Null);
				match responder(&command, &arguments) {
					FakeReply::Body(body) => controller.inject_response(seq, &command, body),
					FakeReply::Reject(message) => controller.inject_rejection(seq, &command, &message),
					FakeReply::NoReply => {}
				}
			}
		})
	}
}

struct FakeTransportSender {
	sent: Arc<Mutex<Vec<Value>>>,
	sent_tx: mpsc::UnboundedSender<Value>,
	closed: Arc<AtomicBool>,
}

impl Transport for FakeTransportSender {
	fn send(&mut self, message: Value) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			if self.closed.load(Ordering::SeqCst) {
				return Err(Error::Transport("fake transport closed".to_string()));
			}
			self.sent.lock().push(message.clone());
			let _ = self.sent_tx.send(message);
			Ok(())
		})
	}

	fn close(&mut self) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
		Box::pin(async move {
			self.closed.store(true, Ordering::SeqCst);
			Ok(())
		})
	}
}

struct FakeTransportReceiver {
	inbound_rx: mpsc::UnboundedReceiver<Inbound>,
	message_tx: mpsc::UnboundedSender<Value>,
}

impl TransportReceiver for FakeTransportReceiver {
	fn run(mut self: Box<Self>) -> Pin<Box<dyn Future<Output = Result<()>> + Send>> {
		Box::pin(async move {
			while let Some(inbound) = self.inbound_rx.recv().await {
				match inbound {
					Inbound::Message(message) => {
						if self.message_tx.send(message).is_err() {
							break;
						}
					}
					Inbound::Fail(reason) => return Err(Error::Transport(reason)),
					Inbound::End => break,
				}
			}
			Ok(())
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[tokio::test]
	async fn test_sent_messages_are_recorded_and_streamed() {
		let (mut parts, controller) = FakeTransportBuilder::new().build();

		parts.sender.send(json!({"seq": 0, "command": "scripts"})).await.unwrap();
		parts.sender.send(json!({"seq": 1, "command": "backtrace"})).await.unwrap();

		assert_eq!(controller.sent_commands(), vec!["scripts", "backtrace"]);
		assert_eq!(controller.sent_count("scripts"), 1);
		assert_eq!(controller.next_sent().await.unwrap()["seq"], 0);
		assert_eq!(controller.take_sent().len(), 2);
		assert!(controller.sent().is_empty());
	}

	#[tokio::test]
	async fn test_closed_sender_rejects_writes() {
		let (mut parts, controller) = FakeTransportBuilder::new().build();

		parts.sender.close().await.unwrap();
		assert!(controller.is_closed());
		assert!(parts.sender.send(json!({})).await.is_err());
	}

	#[tokio::test]
	async fn test_receiver_forwards_until_end() {
		let (parts, controller) = FakeTransportBuilder::new().build();
		let TransportParts { receiver, mut message_rx, .. } = parts;

		let task = tokio::spawn(receiver.run());
		controller.inject_event("break", json!({"sourceLine": 3}));
		controller.end();

		let message = message_rx.recv().await.unwrap();
		assert_eq!(message["event"], "break");
		assert!(task.await.unwrap().is_ok());
		assert!(message_rx.recv().await.is_none());
	}

	#[tokio::test]
	async fn test_receiver_failure_is_reported() {
		let (parts, controller) = FakeTransportBuilder::new().build();
		let task = tokio::spawn(parts.receiver.run());

		controller.fail("connection reset");

		let err = task.await.unwrap().unwrap_err();
		assert!(err.to_string().contains("connection reset"));
	}
}
