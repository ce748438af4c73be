//! Front-end protocol envelopes.
//!
//! ```json
//! {"id": 7, "method": "Debugger.setBreakpointByUrl", "params": {"url": "a.js", "lineNumber": 10}}
//! {"id": 7, "result": {"breakpointId": "a.js:10:0", "locations": []}}
//! {"id": 8, "error": {"message": "Not implemented", "code": -32601}}
//! {"method": "Debugger.resumed", "params": {}}
//! ```

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Error code attached to every handler failure.
pub const COMMAND_FAILED: i64 = -32001;
/// Error code for a method that has no translation.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// Error code for an envelope that carries an id but no usable method.
pub const INVALID_REQUEST: i64 = -32600;

/// Placeholder message returned for unsupported methods.
pub const NOT_IMPLEMENTED: &str = "Not implemented";

/// Command sent by the front end.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Command {
	/// Caller-assigned id, unique while the command is outstanding.
	pub id: u64,
	pub method: String,
	/// Absent params are treated as an empty object.
	#[serde(default = "empty_params")]
	pub params: Value,
}

fn empty_params() -> Value {
	Value::Object(Map::new())
}

/// Response written back for exactly one [`Command`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
	pub id: u64,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub result: Option<Value>,
	#[serde(skip_serializing_if = "Option::is_none")]
	pub error: Option<ResponseError>,
}

impl Response {
	pub fn success(id: u64, result: Value) -> Self {
		Self {
			id,
			result: Some(result),
			error: None,
		}
	}

	pub fn failure(id: u64, message: impl Into<String>, code: i64) -> Self {
		Self {
			id,
			result: None,
			error: Some(ResponseError {
				message: message.into(),
				code,
			}),
		}
	}
}

/// Error payload of a failed [`Response`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseError {
	pub message: String,
	pub code: i64,
}

/// Unsolicited event pushed to the front end.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
	pub method: String,
	pub params: Value,
}

impl Event {
	pub fn new(method: impl Into<String>, params: Value) -> Self {
		Self {
			method: method.into(),
			params,
		}
	}
}

/// Anything the bridge writes to the front end.
///
/// Responses carry an `id`, events never do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Outgoing {
	Response(Response),
	Event(Event),
}

impl From<Response> for Outgoing {
	fn from(response: Response) -> Self {
		Outgoing::Response(response)
	}
}

impl From<Event> for Outgoing {
	fn from(event: Event) -> Self {
		Outgoing::Event(event)
	}
}
