//! Debug-agent protocol messages.
//!
//! Every message carries a `type` discriminator:
//!
//! ```json
//! {"seq": 4, "type": "request", "command": "setbreakpoint", "arguments": {"type": "script", "target": "a.js", "line": 10}}
//! {"seq": 11, "type": "response", "request_seq": 4, "command": "setbreakpoint", "success": true, "body": {"breakpoint": 1}}
//! {"seq": 12, "type": "event", "event": "break", "body": {"sourceLine": 10}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Request sent to the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentRequest {
	pub seq: u64,
	pub command: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub arguments: Option<Value>,
}

/// Response to an [`AgentRequest`], correlated through `request_seq`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentResponse {
	#[serde(default)]
	pub seq: u64,
	pub request_seq: u64,
	#[serde(default)]
	pub command: String,
	pub success: bool,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
	/// Failure text when `success` is false.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub message: Option<String>,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub running: Option<bool>,
}

/// Event pushed by the agent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentEvent {
	#[serde(default)]
	pub seq: u64,
	pub event: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub body: Option<Value>,
}

/// Discriminated union of agent messages keyed by `type`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AgentMessage {
	Request(AgentRequest),
	Response(AgentResponse),
	Event(AgentEvent),
}

/// Handshake data reported once the agent stream is connected.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectInfo {
	pub host: String,
	#[serde(default)]
	pub v8_version: String,
}
