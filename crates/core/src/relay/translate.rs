//! Shape translations shared by command handlers and the event translator.

use dtb_protocol::Event;
use serde_json::{Value, json};

pub const SCRIPT_PARSED: &str = "Debugger.scriptParsed";
pub const PAUSED: &str = "Debugger.paused";
pub const RESUMED: &str = "Debugger.resumed";

/// Renders an agent identifier (number or string) as the front end's string
/// id.
pub fn id_string(value: &Value) -> Option<String> {
	match value {
		Value::Number(number) => Some(number.to_string()),
		Value::String(text) => Some(text.clone()),
		_ => None,
	}
}

/// `Debugger.scriptParsed` for one agent script record.
///
/// The agent reports no start position or end column, so those are zero.
/// Records without an id are skipped.
pub fn script_parsed(script: &Value) -> Option<Event> {
	let script_id = script.get("id").and_then(id_string)?;
	let url = script.get("name").and_then(Value::as_str).unwrap_or_default();
	let end_line = script.get("lineCount").and_then(Value::as_u64).unwrap_or(0);

	Some(Event::new(
		SCRIPT_PARSED,
		json!({
			"scriptId": script_id,
			"url": url,
			"startLine": 0,
			"startColumn": 0,
			"endLine": end_line,
			"endColumn": 0,
		}),
	))
}

pub fn location(script_id: &Value, line: u64, column: u64) -> Value {
	json!({
		"scriptId": id_string(script_id).unwrap_or_default(),
		"lineNumber": line,
		"columnNumber": column,
	})
}

/// Front-end call frames for an agent `backtrace` body.
pub fn call_frames(backtrace: &Value) -> Vec<Value> {
	backtrace
		.get("frames")
		.and_then(Value::as_array)
		.map(|frames| frames.iter().map(call_frame).collect())
		.unwrap_or_default()
}

fn call_frame(frame: &Value) -> Value {
	let func = frame.get("func").unwrap_or(&Value::Null);
	let function_name = [func.get("name"), func.get("inferredName")]
		.into_iter()
		.flatten()
		.filter_map(Value::as_str)
		.find(|name| !name.is_empty())
		.unwrap_or_default();
	let script_id = func
		.get("scriptId")
		.or_else(|| frame.get("script").and_then(|script| script.get("id")))
		.unwrap_or(&Value::Null);
	let index = frame.get("index").and_then(Value::as_u64).unwrap_or(0);
	let line = frame.get("line").and_then(Value::as_u64).unwrap_or(0);
	let column = frame.get("column").and_then(Value::as_u64).unwrap_or(0);

	json!({
		"callFrameId": index.to_string(),
		"functionName": function_name,
		"location": location(script_id, line, column),
		"scopeChain": [],
	})
}

pub fn paused(call_frames: Vec<Value>, reason: &str) -> Event {
	Event::new(PAUSED, json!({ "callFrames": call_frames, "reason": reason }))
}

pub fn resumed() -> Event {
	Event::new(RESUMED, json!({}))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn script_parsed_maps_id_name_and_line_count() {
		let event = script_parsed(&json!({"id": 5, "name": "app.js", "lineCount": 20})).unwrap();
		assert_eq!(event.method, SCRIPT_PARSED);
		assert_eq!(
			event.params,
			json!({"scriptId": "5", "url": "app.js", "startLine": 0, "startColumn": 0, "endLine": 20, "endColumn": 0})
		);
	}

	#[test]
	fn script_parsed_defaults_missing_name_to_empty() {
		let event = script_parsed(&json!({"id": 7, "lineCount": 3})).unwrap();
		assert_eq!(event.params["url"], "");
	}

	#[test]
	fn script_parsed_skips_records_without_id() {
		assert!(script_parsed(&json!({"name": "x.js"})).is_none());
	}

	#[test]
	fn call_frames_translate_backtrace() {
		let backtrace = json!({
			"fromFrame": 0,
			"toFrame": 2,
			"totalFrames": 2,
			"frames": [
				{"index": 0, "func": {"ref": 1, "name": "", "inferredName": "Server.handle", "scriptId": 5}, "line": 9, "column": 4},
				{"index": 1, "func": {"ref": 2, "name": "main"}, "script": {"id": 6}, "line": 30, "column": 0}
			]
		});

		let frames = call_frames(&backtrace);
		assert_eq!(frames.len(), 2);
		assert_eq!(frames[0]["callFrameId"], "0");
		assert_eq!(frames[0]["functionName"], "Server.handle");
		assert_eq!(frames[0]["location"], json!({"scriptId": "5", "lineNumber": 9, "columnNumber": 4}));
		assert_eq!(frames[1]["functionName"], "main");
		assert_eq!(frames[1]["location"]["scriptId"], "6");
	}

	#[test]
	fn call_frames_of_empty_backtrace() {
		assert!(call_frames(&json!({"totalFrames": 0})).is_empty());
	}

	#[test]
	fn paused_event_shape() {
		let event = paused(Vec::new(), "exception");
		assert_eq!(event.params, json!({"callFrames": [], "reason": "exception"}));
	}
}
