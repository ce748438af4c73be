//! Structured value transfer via synthetic property key.
//!
//! The agent truncates long string *values* in its responses but reports
//! property *names* in full. To move an arbitrary JSON value out of the
//! debugged process, the value is serialized inside the process and used as
//! the single key of a throwaway object:
//!
//! ```text
//! (function(){var __dtbCarrier = {};__dtbCarrier[JSON.stringify(<expr>)] = true;return __dtbCarrier;})()
//! ```
//!
//! The agent describes that object as `{"properties": [{"name": "<json>", ...}]}`
//! and [`read_carrier`] parses the name back into a value.
//!
//! Every handler that talks to the injected helper goes through this module.

use serde_json::Value;
use thiserror::Error;

/// Global the injected script installs its helper object under.
pub const INJECTED_SCRIPT: &str = "__dtbInjectedScript";

/// Name under which a raw agent handle is bound for the presentation call.
pub const VALUE_BINDING: &str = "__dtbValue";

const CARRIER: &str = "__dtbCarrier";

#[derive(Debug, Error)]
pub enum ValueTransferError {
	#[error("carrier object has no properties")]
	MissingProperty,

	#[error("carrier property name is not JSON: {0}")]
	Malformed(#[from] serde_json::Error),
}

/// Wraps `inner` so that its JSON serialization becomes the only property
/// name of the evaluated object.
pub fn carrier_expression(inner: &str) -> String {
	format!("(function(){{var {CARRIER} = {{}};{CARRIER}[JSON.stringify({inner})] = true;return {CARRIER};}})()")
}

/// Renders `value` as a JavaScript literal.
///
/// JSON is valid JavaScript except for raw U+2028/U+2029 inside strings.
pub fn js_literal(value: &Value) -> String {
	value.to_string().replace('\u{2028}', "\\u2028").replace('\u{2029}', "\\u2029")
}

/// Expression invoking `function` on the injected helper with `args`.
pub fn helper_call(function: &str, args: &[Value]) -> String {
	let args = js_literal(&Value::Array(args.to_vec()));
	format!("{INJECTED_SCRIPT}.{function}.apply({INJECTED_SCRIPT}, {args})")
}

/// Expression presenting the value bound to [`VALUE_BINDING`] as a front-end
/// remote object in `object_group`.
pub fn presentation_call(object_group: &str) -> String {
	let group = js_literal(&Value::String(object_group.to_string()));
	format!("{INJECTED_SCRIPT}.wrapObject({VALUE_BINDING}, {group})")
}

/// Extracts the transferred value from the agent's description of a carrier
/// object.
pub fn read_carrier(body: &Value) -> Result<Value, ValueTransferError> {
	let name = body
		.get("properties")
		.and_then(Value::as_array)
		.and_then(|properties| properties.first())
		.and_then(|property| property.get("name"))
		.ok_or(ValueTransferError::MissingProperty)?;

	match name {
		// JSON.stringify(undefined) becomes the key "undefined"
		Value::String(text) if text == "undefined" => Ok(Value::Null),
		Value::String(text) => Ok(serde_json::from_str(text)?),
		// Integer-like keys may come back as numbers
		Value::Number(_) => Ok(name.clone()),
		_ => Err(ValueTransferError::MissingProperty),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use serde_json::json;

	fn carrier_body(name: Value) -> Value {
		json!({
			"handle": 12,
			"type": "object",
			"className": "Object",
			"properties": [{"name": name, "propertyType": 1, "ref": 13}]
		})
	}

	#[test]
	fn carrier_expression_stringifies_inner_into_key() {
		let expression = carrier_expression("1 + 1");
		assert_eq!(
			expression,
			"(function(){var __dtbCarrier = {};__dtbCarrier[JSON.stringify(1 + 1)] = true;return __dtbCarrier;})()"
		);
	}

	#[test]
	fn helper_call_passes_json_argument_list() {
		let expression = helper_call("getProperties", &[json!("{\"id\":1}"), json!(true)]);
		assert_eq!(
			expression,
			r#"__dtbInjectedScript.getProperties.apply(__dtbInjectedScript, ["{\"id\":1}",true])"#
		);
	}

	#[test]
	fn presentation_call_binds_value_and_group() {
		assert_eq!(presentation_call("console"), r#"__dtbInjectedScript.wrapObject(__dtbValue, "console")"#);
	}

	#[test]
	fn js_literal_escapes_line_separators() {
		let literal = js_literal(&json!("a\u{2028}b\u{2029}c"));
		assert_eq!(literal, r#""a\u2028b\u2029c""#);
	}

	#[test]
	fn read_carrier_parses_remote_object() {
		let body = carrier_body(json!("{\"type\":\"number\",\"value\":42}"));
		assert_eq!(read_carrier(&body).unwrap(), json!({"type": "number", "value": 42}));
	}

	#[test]
	fn read_carrier_keeps_quotes_and_long_strings_intact() {
		let long = "x".repeat(10_000);
		let value = json!({"type": "string", "value": format!("say \"hi\" {long}")});
		let body = carrier_body(Value::String(value.to_string()));
		assert_eq!(read_carrier(&body).unwrap(), value);
	}

	#[test]
	fn read_carrier_accepts_numeric_names() {
		assert_eq!(read_carrier(&carrier_body(json!(42))).unwrap(), json!(42));
	}

	#[test]
	fn read_carrier_maps_undefined_to_null() {
		assert_eq!(read_carrier(&carrier_body(json!("undefined"))).unwrap(), Value::Null);
	}

	#[test]
	fn read_carrier_without_properties_fails() {
		let err = read_carrier(&json!({"type": "object", "properties": []})).unwrap_err();
		assert!(matches!(err, ValueTransferError::MissingProperty));
		assert!(read_carrier(&json!({"type": "undefined"})).is_err());
	}

	#[test]
	fn read_carrier_rejects_non_json_names() {
		let err = read_carrier(&carrier_body(json!("{not json"))).unwrap_err();
		assert!(matches!(err, ValueTransferError::Malformed(_)));
	}
}
