//! Agent event → front-end event translation.

use serde_json::{Value, json};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use super::context::SessionContext;
use super::translate;

/// Agent events with a front-end translation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentEventKind {
	Break,
	Exception,
	AfterCompile,
}

impl AgentEventKind {
	pub fn from_name(name: &str) -> Option<Self> {
		match name {
			"break" => Some(AgentEventKind::Break),
			"exception" => Some(AgentEventKind::Exception),
			"afterCompile" => Some(AgentEventKind::AfterCompile),
			_ => None,
		}
	}
}

/// Translates one agent event. Work that needs another agent round trip is
/// spawned onto `tasks`.
pub fn translate_event(ctx: &SessionContext, name: &str, body: Value, tasks: &mut JoinSet<()>) {
	let Some(kind) = AgentEventKind::from_name(name) else {
		debug!(target = "dtb.relay", session = ctx.session, event = name, "dropping unhandled agent event");
		return;
	};

	match kind {
		AgentEventKind::Break => {
			ctx.sink.push(translate::paused(Vec::new(), "other"));
			let ctx = ctx.clone();
			tasks.spawn(async move {
				match ctx.agent("backtrace", Some(json!({ "inlineRefs": true }))).await {
					Ok(backtrace) => ctx.sink.push(translate::paused(translate::call_frames(&backtrace), "other")),
					Err(err) => warn!(target = "dtb.relay", session = ctx.session, error = %err, "backtrace after break failed"),
				}
			});
		}
		// Exception details are not translated
		AgentEventKind::Exception => ctx.sink.push(translate::paused(Vec::new(), "exception")),
		AgentEventKind::AfterCompile => match body.get("script").and_then(translate::script_parsed) {
			Some(event) => ctx.sink.push(event),
			None => debug!(target = "dtb.relay", session = ctx.session, "afterCompile without script record"),
		},
	}
}
