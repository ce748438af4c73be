//! One translation per supported front-end method.

use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, warn};

use super::breakpoints::BreakpointKey;
use super::command::{CommandError, CommandResult, InjectedCall, StepAction, parse_params};
use super::context::SessionContext;
use super::translate;
use super::value_transfer::{VALUE_BINDING, carrier_expression, helper_call, presentation_call, read_carrier};

/// Agent `scripts` filter selecting user scripts (natives and extensions excluded).
const NORMAL_SCRIPTS: u64 = 4;

const DEFAULT_OBJECT_GROUP: &str = "console";

pub fn acknowledge() -> Value {
	json!({})
}

pub fn no_capability() -> Value {
	json!({ "result": false })
}

pub async fn list_scripts(ctx: &SessionContext) -> CommandResult {
	let body = ctx
		.agent("scripts", Some(json!({ "types": NORMAL_SCRIPTS, "includeSource": false })))
		.await?;

	let scripts = body.as_array().map(Vec::as_slice).unwrap_or_default();
	for event in scripts.iter().filter_map(translate::script_parsed) {
		ctx.sink.push(event);
	}
	debug!(target = "dtb.relay", session = ctx.session, count = scripts.len(), "announced loaded scripts");
	Ok(acknowledge())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetScriptSourceParams {
	pub script_id: String,
}

pub async fn get_script_source(ctx: &SessionContext, params: GetScriptSourceParams) -> CommandResult {
	let id: u64 = params
		.script_id
		.parse()
		.map_err(|_| CommandError::InvalidParams(format!("script id {:?} is not numeric", params.script_id)))?;

	let body = ctx
		.agent(
			"scripts",
			Some(json!({ "types": NORMAL_SCRIPTS, "includeSource": true, "ids": [id] })),
		)
		.await?;

	let source = body
		.as_array()
		.and_then(|scripts| scripts.first())
		.and_then(|script| script.get("source"))
		.and_then(Value::as_str)
		.unwrap_or_default();
	Ok(json!({ "scriptSource": source }))
}

#[derive(Debug, Deserialize)]
pub struct SetPauseOnExceptionsParams {
	pub state: String,
}

/// Front-end pause state → agent `(type, enabled)`.
fn exception_break_mode(state: &str) -> Option<(&'static str, bool)> {
	match state {
		"all" => Some(("all", true)),
		"none" => Some(("all", false)),
		"uncaught" => Some(("uncaught", true)),
		_ => None,
	}
}

pub async fn set_pause_on_exceptions(ctx: &SessionContext, params: SetPauseOnExceptionsParams) -> CommandResult {
	let (kind, enabled) = exception_break_mode(&params.state)
		.ok_or_else(|| CommandError::InvalidParams(format!("unsupported pause on exceptions state: {:?}", params.state)))?;

	ctx.agent("setexceptionbreak", Some(json!({ "type": kind, "enabled": enabled })))
		.await?;
	Ok(acknowledge())
}

/// Reports the pause right away and asks the agent to break.
///
/// The agent has no synchronous pause, so the break is provoked with a
/// `debugger` statement whose evaluation is not awaited. It runs on the
/// relay's task set and is aborted with the session.
pub fn pause(ctx: &SessionContext) -> Value {
	ctx.sink.push(translate::paused(Vec::new(), "other"));

	let session = ctx.clone();
	ctx.spawn(async move {
		let ctx = session;
		let arguments = json!({ "expression": "debugger", "global": true, "disable_break": false });
		if let Err(err) = ctx.agent("evaluate", Some(arguments)).await {
			warn!(target = "dtb.relay", session = ctx.session, error = %err, "break request failed");
		}
	});

	acknowledge()
}

/// `resumed` goes out before the agent acknowledges the continue.
pub async fn resume(ctx: &SessionContext, step: Option<StepAction>) -> CommandResult {
	ctx.sink.push(translate::resumed());

	let arguments = step.map(|action| json!({ "stepaction": action.agent_name(), "stepcount": 1 }));
	ctx.agent("continue", arguments).await?;
	Ok(acknowledge())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetBreakpointByUrlParams {
	pub url: String,
	pub line_number: u64,
	#[serde(default)]
	pub column_number: Option<u64>,
	#[serde(default)]
	pub condition: Option<String>,
}

pub async fn set_breakpoint_by_url(ctx: &SessionContext, params: SetBreakpointByUrlParams) -> CommandResult {
	let column = params.column_number.unwrap_or(0);
	let key = BreakpointKey::new(&params.url, params.line_number, column);
	if ctx.breakpoints.lock().contains(&key) {
		return Err(CommandError::DuplicateBreakpoint(key.as_str().to_string()));
	}

	let mut arguments = json!({
		"type": "script",
		"target": params.url,
		"line": params.line_number,
		"column": column,
	});
	if let Some(condition) = params.condition.filter(|condition| !condition.is_empty()) {
		arguments["condition"] = Value::String(condition);
	}

	let body = ctx.agent("setbreakpoint", Some(arguments)).await?;
	let handle = body
		.get("breakpoint")
		.cloned()
		.ok_or_else(|| CommandError::UnexpectedResponse("setbreakpoint returned no breakpoint number".into()))?;

	let locations: Vec<Value> = body
		.get("actual_locations")
		.and_then(Value::as_array)
		.map(|locations| {
			locations
				.iter()
				.map(|location| {
					translate::location(
						location.get("script_id").unwrap_or(&Value::Null),
						location.get("line").and_then(Value::as_u64).unwrap_or(0),
						location.get("column").and_then(Value::as_u64).unwrap_or(0),
					)
				})
				.collect()
		})
		.unwrap_or_default();

	let inserted = ctx.breakpoints.lock().insert(key.clone(), handle.clone());
	if !inserted {
		// Lost a race with a concurrent request for the same location
		if let Err(err) = ctx.agent("clearbreakpoint", Some(json!({ "breakpoint": handle }))).await {
			warn!(target = "dtb.relay", session = ctx.session, error = %err, "failed to clear duplicate breakpoint");
		}
		return Err(CommandError::DuplicateBreakpoint(key.as_str().to_string()));
	}

	Ok(json!({ "breakpointId": key.as_str(), "locations": locations }))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoveBreakpointParams {
	pub breakpoint_id: String,
}

pub async fn remove_breakpoint(ctx: &SessionContext, params: RemoveBreakpointParams) -> CommandResult {
	let key = BreakpointKey::from_id(params.breakpoint_id);
	// Taken out before the round trip so a concurrent remove of the same id
	// sees it as unknown instead of clearing it twice.
	let handle = ctx
		.breakpoints
		.lock()
		.remove(&key)
		.ok_or_else(|| CommandError::UnknownBreakpoint(key.as_str().to_string()))?;

	if let Err(err) = ctx.agent("clearbreakpoint", Some(json!({ "breakpoint": &handle }))).await {
		if !ctx.breakpoints.lock().insert(key.clone(), handle) {
			warn!(target = "dtb.relay", session = ctx.session, breakpoint = key.as_str(), "breakpoint re-added while its clear was pending");
		}
		return Err(err.into());
	}
	Ok(acknowledge())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateOnCallFrameParams {
	pub call_frame_id: String,
	pub expression: String,
	#[serde(default)]
	pub object_group: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvaluateParams {
	pub expression: String,
	#[serde(default)]
	pub object_group: Option<String>,
}

/// Where an expression is evaluated.
#[derive(Debug, Clone, Copy)]
enum Scope {
	Frame(u64),
	Global,
}

impl Scope {
	fn arguments(self, expression: &str) -> Value {
		let mut arguments = json!({ "expression": expression, "disable_break": true });
		match self {
			Scope::Frame(index) => arguments["frame"] = json!(index),
			Scope::Global => arguments["global"] = json!(true),
		}
		arguments
	}
}

pub async fn evaluate_on_call_frame(ctx: &SessionContext, params: EvaluateOnCallFrameParams) -> CommandResult {
	let frame = params
		.call_frame_id
		.parse::<u64>()
		.map_err(|_| CommandError::InvalidParams(format!("invalid call frame id {:?}", params.call_frame_id)))?;
	evaluate(ctx, &params.expression, Scope::Frame(frame), params.object_group.as_deref()).await
}

pub async fn evaluate_global(ctx: &SessionContext, params: EvaluateParams) -> CommandResult {
	evaluate(ctx, &params.expression, Scope::Global, params.object_group.as_deref()).await
}

/// Evaluates `expression`, then presents the resulting handle through the
/// injected helper.
///
/// A rejected evaluation is a successful command whose result is the thrown
/// message.
async fn evaluate(ctx: &SessionContext, expression: &str, scope: Scope, object_group: Option<&str>) -> CommandResult {
	let raw = match ctx.agent("evaluate", Some(scope.arguments(expression))).await {
		Ok(raw) => raw,
		Err(err) if err.is_rejection() => return Ok(threw(&err.to_string())),
		Err(err) => return Err(err.into()),
	};
	let handle = raw
		.get("handle")
		.cloned()
		.ok_or_else(|| CommandError::UnexpectedResponse("evaluate returned no value handle".into()))?;

	let presentation = carrier_expression(&presentation_call(object_group.unwrap_or(DEFAULT_OBJECT_GROUP)));
	let mut arguments = scope.arguments(&presentation);
	arguments["additional_context"] = json!([{ "name": VALUE_BINDING, "handle": handle }]);

	let carrier = ctx.agent("evaluate", Some(arguments)).await?;
	let result = read_carrier(&carrier)?;
	Ok(json!({ "result": result, "wasThrows": false }))
}

fn threw(message: &str) -> Value {
	json!({
		"result": { "type": "string", "value": message },
		"wasThrows": true,
	})
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetPropertiesParams {
	object_id: String,
	#[serde(default)]
	own_properties: bool,
	#[serde(default)]
	accessor_properties_only: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CallFunctionOnParams {
	object_id: String,
	function_declaration: String,
	#[serde(default)]
	arguments: Option<Value>,
	#[serde(default)]
	return_by_value: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseObjectParams {
	object_id: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReleaseObjectGroupParams {
	object_group: String,
}

fn injected_arguments(call: InjectedCall, params: Value) -> Result<Vec<Value>, CommandError> {
	let arguments = match call {
		InjectedCall::GetProperties => {
			let params: GetPropertiesParams = parse_params(params)?;
			vec![
				json!(params.object_id),
				json!(params.own_properties),
				json!(params.accessor_properties_only),
			]
		}
		InjectedCall::CallFunctionOn => {
			let params: CallFunctionOnParams = parse_params(params)?;
			// The helper takes call arguments as a JSON string
			let call_arguments = params.arguments.unwrap_or_else(|| json!([])).to_string();
			vec![
				json!(params.object_id),
				json!(params.function_declaration),
				json!(call_arguments),
				json!(params.return_by_value),
			]
		}
		InjectedCall::ReleaseObject => {
			let params: ReleaseObjectParams = parse_params(params)?;
			vec![json!(params.object_id)]
		}
		InjectedCall::ReleaseObjectGroup => {
			let params: ReleaseObjectGroupParams = parse_params(params)?;
			vec![json!(params.object_group)]
		}
	};
	Ok(arguments)
}

/// Invokes one injected-helper function and returns its answer.
pub async fn injected_dispatch(ctx: &SessionContext, call: InjectedCall, params: Value) -> CommandResult {
	let arguments = injected_arguments(call, params)?;
	let expression = carrier_expression(&helper_call(call.function_name(), &arguments));

	let carrier = ctx.agent("evaluate", Some(Scope::Global.arguments(&expression))).await?;
	let result = read_carrier(&carrier)?;
	Ok(json!({ "result": result }))
}
