//! Per-session relay between one front end and one debug target.
//!
//! A [`Relay`] owns both ends of a session. It runs as a single task that
//! waits on front-end messages, target events, close requests from the
//! registry, and its own in-flight command handlers. Each front-end command
//! is handled on its own task so a slow agent round trip never blocks
//! event delivery or later commands.
//!
//! ```text
//! front end ── FrontendInbound ──▶ Relay ── send_command ──▶ DebugTarget
//!           ◀─ FrontendOutbound ──       ◀── TargetEvent ───
//! ```

mod breakpoints;
mod command;
mod context;
mod events;
mod handlers;
mod translate;
pub mod value_transfer;

use std::fmt;
use std::sync::Arc;

use dtb_protocol::{Command, INVALID_REQUEST, METHOD_NOT_FOUND, NOT_IMPLEMENTED, Response};
use dtb_runtime::{DebugTarget, TargetEvent};
use serde_json::{Map, Value, json};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

pub use breakpoints::{BreakpointKey, BreakpointMap};
pub use command::{CommandError, FrontendMethod, InjectedCall, StepAction};
pub use events::AgentEventKind;

use context::{FrontendSink, SessionContext, SessionTask};

use crate::registry::{SessionId, SessionRegistry};

/// Read-only per-session flags, fixed at startup.
#[derive(Debug, Clone, Default)]
pub struct RelayOptions {
	/// Log every front-end and agent message at debug level under `dtb.wire`.
	pub log_wire_traffic: bool,
	/// Helper script evaluated in the target before any front-end traffic.
	pub injected_script: Option<Arc<str>>,
}

/// What the front-end reader hands the relay.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendInbound {
	Message(String),
	Error(String),
	Closed,
}

/// What the relay hands the front-end writer.
#[derive(Debug, Clone, PartialEq)]
pub enum FrontendOutbound {
	Message(String),
	Close,
}

/// Both directions of a front-end connection.
pub struct FrontendChannels {
	pub inbound: mpsc::UnboundedReceiver<FrontendInbound>,
	pub outbound: mpsc::UnboundedSender<FrontendOutbound>,
}

impl FrontendChannels {
	/// Creates a connected pair: the relay half and the socket half.
	pub fn pair() -> (Self, mpsc::UnboundedSender<FrontendInbound>, mpsc::UnboundedReceiver<FrontendOutbound>) {
		let (inbound_tx, inbound) = mpsc::unbounded_channel();
		let (outbound, outbound_rx) = mpsc::unbounded_channel();
		(Self { inbound, outbound }, inbound_tx, outbound_rx)
	}
}

/// Why a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloseReason {
	FrontendClosed,
	FrontendError(String),
	TargetClosed,
	TargetError(String),
	/// Closed through [`SessionRegistry::request_close`].
	Requested,
}

impl fmt::Display for CloseReason {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			CloseReason::FrontendClosed => write!(f, "front end disconnected"),
			CloseReason::FrontendError(err) => write!(f, "front end error: {err}"),
			CloseReason::TargetClosed => write!(f, "target disconnected"),
			CloseReason::TargetError(err) => write!(f, "target error: {err}"),
			CloseReason::Requested => write!(f, "close requested"),
		}
	}
}

/// Result of reading one raw front-end message.
#[derive(Debug)]
enum Inbound {
	Command(Command),
	/// Has an id but no usable method.
	Invalid { id: u64, reason: String },
	/// Not answerable at all.
	Unreadable(String),
}

fn read_inbound(text: &str) -> Inbound {
	let value: Value = match serde_json::from_str(text) {
		Ok(value) => value,
		Err(err) => return Inbound::Unreadable(err.to_string()),
	};
	let Value::Object(mut envelope) = value else {
		return Inbound::Unreadable("message is not an object".into());
	};
	let Some(id) = envelope.get("id").and_then(Value::as_u64) else {
		return Inbound::Unreadable("message has no numeric id".into());
	};
	let method = match envelope.remove("method") {
		Some(Value::String(method)) if !method.is_empty() => method,
		_ => {
			return Inbound::Invalid {
				id,
				reason: "missing method".into(),
			};
		}
	};
	let params = match envelope.remove("params") {
		Some(Value::Null) | None => Value::Object(Map::new()),
		Some(params) => params,
	};
	Inbound::Command(Command { id, method, params })
}

/// One live debugging session.
pub struct Relay {
	id: SessionId,
	ctx: SessionContext,
	options: RelayOptions,
	inbound: mpsc::UnboundedReceiver<FrontendInbound>,
	target_events: mpsc::UnboundedReceiver<TargetEvent>,
	close_requests: mpsc::UnboundedReceiver<()>,
	background: mpsc::UnboundedReceiver<SessionTask>,
	registry: SessionRegistry,
	tasks: JoinSet<()>,
	closed: bool,
}

impl Relay {
	/// Registers a new session for an already-started target.
	pub fn new(
		target: DebugTarget,
		target_events: mpsc::UnboundedReceiver<TargetEvent>,
		frontend: FrontendChannels,
		registry: &SessionRegistry,
		address: impl Into<String>,
		options: RelayOptions,
	) -> Self {
		let registration = registry.register(address.into(), target.info().v8_version.clone());
		let sink = FrontendSink::new(frontend.outbound, registration.id, options.log_wire_traffic);
		let (spawner, background) = mpsc::unbounded_channel();
		let ctx = SessionContext::new(registration.id, target, sink, spawner, options.log_wire_traffic);

		Self {
			id: registration.id,
			ctx,
			options,
			inbound: frontend.inbound,
			target_events,
			close_requests: registration.close_requests,
			background,
			registry: registry.clone(),
			tasks: JoinSet::new(),
			closed: false,
		}
	}

	pub fn id(&self) -> SessionId {
		self.id
	}

	/// Runs the session on its own task.
	pub fn spawn(self) -> JoinHandle<CloseReason> {
		tokio::spawn(self.run())
	}

	/// Runs until either side goes away or a close is requested, then
	/// releases both ends.
	pub async fn run(mut self) -> CloseReason {
		info!(target = "dtb.relay", session = self.id, v8_version = %self.ctx.target.info().v8_version, "session opened");
		let reason = match self.initialize().await {
			Ok(()) => self.serve().await,
			Err(reason) => reason,
		};
		self.close(&reason).await;
		reason
	}

	/// Evaluates the injected script. Front-end messages are held until it
	/// finishes and then dispatched in arrival order. A close request or a
	/// front-end disconnect still ends the session while it is pending.
	async fn initialize(&mut self) -> Result<(), CloseReason> {
		let Some(script) = self.options.injected_script.clone() else {
			warn!(target = "dtb.relay", session = self.id, "no injected script configured; object inspection will fail");
			return Ok(());
		};

		let arguments = json!({ "expression": &*script, "global": true, "disable_break": true });
		let ctx = self.ctx.clone();
		let evaluate = async move { ctx.agent("evaluate", Some(arguments)).await };
		tokio::pin!(evaluate);

		let mut held = Vec::new();
		let outcome = loop {
			tokio::select! {
				outcome = &mut evaluate => break outcome,
				Some(()) = self.close_requests.recv() => return Err(CloseReason::Requested),
				inbound = self.inbound.recv() => match inbound {
					Some(FrontendInbound::Message(text)) => held.push(text),
					Some(FrontendInbound::Error(err)) => return Err(CloseReason::FrontendError(err)),
					Some(FrontendInbound::Closed) | None => return Err(CloseReason::FrontendClosed),
				},
			}
		};

		match outcome {
			Ok(_) => debug!(target = "dtb.relay", session = self.id, "injected script evaluated"),
			Err(err) if err.is_rejection() => {
				warn!(target = "dtb.relay", session = self.id, error = %err, "injected script was rejected");
			}
			Err(err) => return Err(CloseReason::TargetError(err.to_string())),
		}

		for text in held {
			self.dispatch(&text);
		}
		Ok(())
	}

	async fn serve(&mut self) -> CloseReason {
		loop {
			tokio::select! {
				Some(()) = self.close_requests.recv() => return CloseReason::Requested,
				inbound = self.inbound.recv() => match inbound {
					Some(FrontendInbound::Message(text)) => self.dispatch(&text),
					Some(FrontendInbound::Error(err)) => return CloseReason::FrontendError(err),
					Some(FrontendInbound::Closed) | None => return CloseReason::FrontendClosed,
				},
				event = self.target_events.recv() => match event {
					Some(TargetEvent::Event { name, body }) => {
						if self.options.log_wire_traffic {
							debug!(target = "dtb.wire", session = self.id, direction = "from_agent", event = %name, body = %body);
						}
						events::translate_event(&self.ctx, &name, body, &mut self.tasks);
					}
					Some(TargetEvent::Error(err)) => return CloseReason::TargetError(err),
					Some(TargetEvent::Closed) | None => return CloseReason::TargetClosed,
				},
				Some(task) = self.background.recv() => {
					self.tasks.spawn(task);
				}
				Some(joined) = self.tasks.join_next() => {
					if let Err(err) = joined {
						if err.is_panic() {
							error!(target = "dtb.relay", session = self.id, error = %err, "command handler panicked");
						}
					}
				}
			}
		}
	}

	/// Routes one front-end message. Every message with a usable id gets
	/// exactly one response.
	fn dispatch(&mut self, text: &str) {
		if self.options.log_wire_traffic {
			debug!(target = "dtb.wire", session = self.id, direction = "from_frontend", message = %text);
		}

		let command = match read_inbound(text) {
			Inbound::Command(command) => command,
			Inbound::Invalid { id, reason } => {
				warn!(target = "dtb.relay", session = self.id, id, %reason, "invalid front-end command");
				self.ctx.sink.respond(Response::failure(id, reason, INVALID_REQUEST));
				return;
			}
			Inbound::Unreadable(reason) => {
				warn!(target = "dtb.relay", session = self.id, %reason, "dropping unreadable front-end message");
				return;
			}
		};

		let Some(method) = FrontendMethod::from_name(&command.method) else {
			warn!(target = "dtb.relay", session = self.id, method = %command.method, "unsupported front-end method");
			self.ctx.sink.respond(Response::failure(command.id, NOT_IMPLEMENTED, METHOD_NOT_FOUND));
			return;
		};

		let ctx = self.ctx.clone();
		self.tasks.spawn(async move {
			let Command { id, method: name, params } = command;
			let response = match method.handle(&ctx, params).await {
				Ok(result) => Response::success(id, result),
				Err(err) => {
					debug!(target = "dtb.relay", session = ctx.session, id, method = %name, error = %err, "command failed");
					Response::failure(id, err.to_string(), err.code())
				}
			};
			ctx.sink.respond(response);
		});
	}

	/// Releases the target, closes the front end, then deregisters. Runs at
	/// most once.
	async fn close(&mut self, reason: &CloseReason) {
		if self.closed {
			return;
		}
		self.closed = true;

		info!(target = "dtb.relay", session = self.id, %reason, "closing session");
		self.tasks.abort_all();
		self.ctx.target.release().await;
		self.ctx.sink.close();
		self.registry.remove(self.id, reason.clone());
	}
}
