//! Error types for the agent connection layer.

use thiserror::Error;

/// Result alias used throughout `dtb-runtime`.
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	/// The agent answered a request with `success: false`.
	#[error("{message}")]
	AgentRejected { command: String, message: String },

	/// The connection ended before a response arrived.
	#[error("Target closed: {0}")]
	TargetClosed(String),

	/// The transport failed to deliver or receive a message.
	#[error("Transport error: {0}")]
	Transport(String),

	#[error("Response channel closed")]
	ChannelClosed,

	#[error("Failed to connect to {address}: {reason}")]
	Connect { address: String, reason: String },

	#[error(transparent)]
	Json(#[from] serde_json::Error),

	#[error(transparent)]
	Io(#[from] std::io::Error),
}

impl Error {
	/// Returns `true` when the agent itself refused the command.
	pub fn is_rejection(&self) -> bool {
		matches!(self, Error::AgentRejected { .. })
	}

	/// Returns `true` when the error means the target is gone.
	pub fn is_closed(&self) -> bool {
		matches!(self, Error::TargetClosed(_) | Error::ChannelClosed)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn rejection_displays_agent_message_verbatim() {
		let err = Error::AgentRejected {
			command: "evaluate".to_string(),
			message: "ReferenceError: x is not defined".to_string(),
		};
		assert_eq!(err.to_string(), "ReferenceError: x is not defined");
		assert!(err.is_rejection());
		assert!(!err.is_closed());
	}

	#[test]
	fn closed_variants_are_classified() {
		assert!(Error::ChannelClosed.is_closed());
		assert!(Error::TargetClosed("eof".into()).is_closed());
		assert!(!Error::Transport("reset".into()).is_closed());
	}
}
