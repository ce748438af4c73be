//! Per-session state shared by command handlers.

use std::future::Future;
use std::sync::Arc;

use dtb_protocol::{Event, Outgoing, Response};
use dtb_runtime::DebugTarget;
use futures_util::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::debug;

use super::FrontendOutbound;
use super::breakpoints::BreakpointMap;
use crate::registry::SessionId;

/// Writes serialized messages to the session's front end.
///
/// Responses and events share one queue, so an event pushed before a
/// handler returns reaches the front end before that handler's response.
#[derive(Clone)]
pub struct FrontendSink {
	outbound: mpsc::UnboundedSender<FrontendOutbound>,
	session: SessionId,
	log_wire_traffic: bool,
}

impl FrontendSink {
	pub fn new(outbound: mpsc::UnboundedSender<FrontendOutbound>, session: SessionId, log_wire_traffic: bool) -> Self {
		Self {
			outbound,
			session,
			log_wire_traffic,
		}
	}

	pub fn push(&self, event: Event) {
		self.write(event.into());
	}

	pub fn respond(&self, response: Response) {
		self.write(response.into());
	}

	/// Asks the front-end writer to close the socket.
	pub fn close(&self) {
		let _ = self.outbound.send(FrontendOutbound::Close);
	}

	fn write(&self, outgoing: Outgoing) {
		let text = match serde_json::to_string(&outgoing) {
			Ok(text) => text,
			Err(err) => {
				tracing::error!(target = "dtb.relay", session = self.session, error = %err, "failed to encode front-end message");
				return;
			}
		};
		if self.log_wire_traffic {
			debug!(target = "dtb.wire", session = self.session, direction = "to_frontend", message = %text);
		}
		// A closed writer means the session is already shutting down
		let _ = self.outbound.send(FrontendOutbound::Message(text));
	}
}

/// Work a handler hands back to the relay's task set.
pub type SessionTask = BoxFuture<'static, ()>;

/// Handle bundle every command handler runs against.
#[derive(Clone)]
pub struct SessionContext {
	pub session: SessionId,
	pub target: DebugTarget,
	pub sink: FrontendSink,
	pub breakpoints: Arc<Mutex<BreakpointMap>>,
	tasks: mpsc::UnboundedSender<SessionTask>,
	log_wire_traffic: bool,
}

impl SessionContext {
	pub fn new(
		session: SessionId,
		target: DebugTarget,
		sink: FrontendSink,
		tasks: mpsc::UnboundedSender<SessionTask>,
		log_wire_traffic: bool,
	) -> Self {
		Self {
			session,
			target,
			sink,
			breakpoints: Arc::new(Mutex::new(BreakpointMap::new())),
			tasks,
			log_wire_traffic,
		}
	}

	/// Runs `task` on the relay's task set, so closing the session aborts it.
	pub fn spawn(&self, task: impl Future<Output = ()> + Send + 'static) {
		// Dropped unstarted if the relay is already gone
		let _ = self.tasks.send(Box::pin(task));
	}

	/// Sends one agent command and waits for its response body.
	pub async fn agent(&self, command: &str, arguments: Option<Value>) -> dtb_runtime::Result<Value> {
		if self.log_wire_traffic {
			let shown = arguments.as_ref().map(Value::to_string).unwrap_or_else(|| "null".to_string());
			debug!(target = "dtb.wire", session = self.session, direction = "to_agent", command, arguments = %shown);
		}
		let body = self.target.send_command(command, arguments).await;
		if self.log_wire_traffic {
			match &body {
				Ok(body) => debug!(target = "dtb.wire", session = self.session, direction = "from_agent", command, body = %body),
				Err(err) => debug!(target = "dtb.wire", session = self.session, direction = "from_agent", command, error = %err),
			}
		}
		body
	}
}
