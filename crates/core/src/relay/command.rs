//! The supported front-end command set and its dispatch.
//!
//! Each front-end method name resolves to one [`FrontendMethod`]; every
//! variant completes through the same `handle(params) -> Result<Value, CommandError>`
//! contract, so a command produces exactly one outcome.

use dtb_protocol::COMMAND_FAILED;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use super::context::SessionContext;
use super::handlers;
use super::value_transfer::ValueTransferError;

/// Why a supported command failed.
#[derive(Debug, Error)]
pub enum CommandError {
	#[error("Invalid params: {0}")]
	InvalidParams(String),

	#[error("Unknown breakpoint id: {0}")]
	UnknownBreakpoint(String),

	#[error("Breakpoint at {0} already exists")]
	DuplicateBreakpoint(String),

	#[error("Unexpected agent response: {0}")]
	UnexpectedResponse(String),

	#[error(transparent)]
	Agent(#[from] dtb_runtime::Error),

	#[error(transparent)]
	ValueTransfer(#[from] ValueTransferError),
}

impl CommandError {
	/// Error code reported to the front end.
	pub fn code(&self) -> i64 {
		COMMAND_FAILED
	}
}

pub type CommandResult = std::result::Result<Value, CommandError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepAction {
	Into,
	Out,
	Over,
}

impl StepAction {
	/// The agent's `stepaction` argument.
	pub fn agent_name(self) -> &'static str {
		match self {
			StepAction::Into => "in",
			StepAction::Out => "out",
			StepAction::Over => "next",
		}
	}
}

/// Functions of the injected helper reachable through generic dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectedCall {
	GetProperties,
	CallFunctionOn,
	ReleaseObject,
	ReleaseObjectGroup,
}

impl InjectedCall {
	pub fn function_name(self) -> &'static str {
		match self {
			InjectedCall::GetProperties => "getProperties",
			InjectedCall::CallFunctionOn => "callFunctionOn",
			InjectedCall::ReleaseObject => "releaseObject",
			InjectedCall::ReleaseObjectGroup => "releaseObjectGroup",
		}
	}
}

/// A front-end method the bridge knows how to translate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrontendMethod {
	/// Enable/disable style commands with no agent-side counterpart.
	Acknowledge,
	/// Capability queries the bridge answers negatively.
	NoCapability,
	ListScripts,
	GetScriptSource,
	SetPauseOnExceptions,
	Pause,
	Resume,
	Step(StepAction),
	SetBreakpointByUrl,
	RemoveBreakpoint,
	EvaluateOnCallFrame,
	Evaluate,
	Injected(InjectedCall),
}

impl FrontendMethod {
	/// Looks up the handler for a front-end method name.
	pub fn from_name(method: &str) -> Option<Self> {
		let resolved = match method {
			"Debugger.enable" => FrontendMethod::ListScripts,
			"Debugger.getScriptSource" => FrontendMethod::GetScriptSource,
			"Debugger.setPauseOnExceptions" => FrontendMethod::SetPauseOnExceptions,
			"Debugger.pause" => FrontendMethod::Pause,
			"Debugger.resume" => FrontendMethod::Resume,
			"Debugger.stepInto" => FrontendMethod::Step(StepAction::Into),
			"Debugger.stepOut" => FrontendMethod::Step(StepAction::Out),
			"Debugger.stepOver" => FrontendMethod::Step(StepAction::Over),
			"Debugger.setBreakpointByUrl" => FrontendMethod::SetBreakpointByUrl,
			"Debugger.removeBreakpoint" => FrontendMethod::RemoveBreakpoint,
			"Debugger.evaluateOnCallFrame" => FrontendMethod::EvaluateOnCallFrame,
			"Runtime.evaluate" => FrontendMethod::Evaluate,
			"Runtime.getProperties" => FrontendMethod::Injected(InjectedCall::GetProperties),
			"Runtime.callFunctionOn" => FrontendMethod::Injected(InjectedCall::CallFunctionOn),
			"Runtime.releaseObject" => FrontendMethod::Injected(InjectedCall::ReleaseObject),
			"Runtime.releaseObjectGroup" => FrontendMethod::Injected(InjectedCall::ReleaseObjectGroup),
			"Debugger.disable"
			| "Debugger.setBreakpointsActive"
			| "Runtime.enable"
			| "Console.enable"
			| "Page.enable"
			| "Network.enable"
			| "CSS.enable"
			| "Inspector.enable"
			| "Profiler.enable"
			| "Database.enable"
			| "DOMStorage.enable"
			| "Worker.enable" => FrontendMethod::Acknowledge,
			"Debugger.canSetScriptSource"
			| "Debugger.causesRecompilation"
			| "Debugger.supportsSeparateScriptCompilationAndExecution"
			| "Page.canOverrideDeviceMetrics"
			| "Page.canShowDebugBorders"
			| "Page.canShowFPSCounter"
			| "Network.canClearBrowserCache"
			| "Network.canClearBrowserCookies"
			| "Worker.canInspectWorkers"
			| "Profiler.causesRecompilation"
			| "Profiler.isSampling"
			| "Profiler.hasHeapProfiler"
			| "CSS.supportsCSS" => FrontendMethod::NoCapability,
			_ => return None,
		};
		Some(resolved)
	}

	/// Runs the translation for this method.
	pub async fn handle(self, ctx: &SessionContext, params: Value) -> CommandResult {
		match self {
			FrontendMethod::Acknowledge => Ok(handlers::acknowledge()),
			FrontendMethod::NoCapability => Ok(handlers::no_capability()),
			FrontendMethod::ListScripts => handlers::list_scripts(ctx).await,
			FrontendMethod::GetScriptSource => handlers::get_script_source(ctx, parse_params(params)?).await,
			FrontendMethod::SetPauseOnExceptions => handlers::set_pause_on_exceptions(ctx, parse_params(params)?).await,
			FrontendMethod::Pause => Ok(handlers::pause(ctx)),
			FrontendMethod::Resume => handlers::resume(ctx, None).await,
			FrontendMethod::Step(action) => handlers::resume(ctx, Some(action)).await,
			FrontendMethod::SetBreakpointByUrl => handlers::set_breakpoint_by_url(ctx, parse_params(params)?).await,
			FrontendMethod::RemoveBreakpoint => handlers::remove_breakpoint(ctx, parse_params(params)?).await,
			FrontendMethod::EvaluateOnCallFrame => handlers::evaluate_on_call_frame(ctx, parse_params(params)?).await,
			FrontendMethod::Evaluate => handlers::evaluate_global(ctx, parse_params(params)?).await,
			FrontendMethod::Injected(call) => handlers::injected_dispatch(ctx, call, params).await,
		}
	}
}

pub(super) fn parse_params<T: DeserializeOwned>(params: Value) -> Result<T, CommandError> {
	serde_json::from_value(params).map_err(|err| CommandError::InvalidParams(err.to_string()))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn resolves_debugger_methods() {
		assert_eq!(FrontendMethod::from_name("Debugger.enable"), Some(FrontendMethod::ListScripts));
		assert_eq!(FrontendMethod::from_name("Debugger.stepOver"), Some(FrontendMethod::Step(StepAction::Over)));
		assert_eq!(
			FrontendMethod::from_name("Runtime.releaseObjectGroup"),
			Some(FrontendMethod::Injected(InjectedCall::ReleaseObjectGroup))
		);
	}

	#[test]
	fn enable_and_capability_commands_need_no_agent() {
		assert_eq!(FrontendMethod::from_name("CSS.enable"), Some(FrontendMethod::Acknowledge));
		assert_eq!(FrontendMethod::from_name("CSS.supportsCSS"), Some(FrontendMethod::NoCapability));
		assert_eq!(FrontendMethod::from_name("Page.canShowFPSCounter"), Some(FrontendMethod::NoCapability));
	}

	#[test]
	fn unknown_methods_do_not_resolve() {
		assert_eq!(FrontendMethod::from_name("Foo.bar"), None);
		assert_eq!(FrontendMethod::from_name(""), None);
		assert_eq!(FrontendMethod::from_name("debugger.enable"), None);
	}

	#[test]
	fn step_actions_map_to_agent_names() {
		assert_eq!(StepAction::Into.agent_name(), "in");
		assert_eq!(StepAction::Out.agent_name(), "out");
		assert_eq!(StepAction::Over.agent_name(), "next");
	}

	#[test]
	fn every_failure_uses_command_failed_code() {
		assert_eq!(CommandError::InvalidParams("x".into()).code(), -32001);
		assert_eq!(CommandError::UnknownBreakpoint("a.js:1:0".into()).code(), -32001);
	}

	#[test]
	fn parse_params_reports_missing_fields() {
		#[derive(serde::Deserialize)]
		#[allow(dead_code)]
		struct Needs {
			url: String,
		}
		let err = parse_params::<Needs>(serde_json::json!({})).err().unwrap();
		assert!(err.to_string().starts_with("Invalid params:"));
	}
}
