//! Debug targets: one connected agent per session.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use dtb_protocol::ConnectInfo;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::connection::AgentConnection;
use crate::error::{Error, Result};
use crate::transport::TransportParts;

/// Everything a target reports after it has connected.
#[derive(Debug, Clone, PartialEq)]
pub enum TargetEvent {
	/// An agent-pushed event, body as sent (null when absent).
	Event { name: String, body: Value },
	/// The agent stream failed; `Closed` follows.
	Error(String),
	Closed,
}

/// `host:port` address of a debug agent.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TargetAddress {
	pub host: String,
	pub port: u16,
}

impl TargetAddress {
	/// Parses `host:port`, `[v6]:port` included.
	pub fn parse(input: &str) -> Result<Self> {
		let invalid = |reason: &str| Error::Connect {
			address: input.to_string(),
			reason: reason.to_string(),
		};

		let (host, port) = input.rsplit_once(':').ok_or_else(|| invalid("expected host:port"))?;
		let host = host.strip_prefix('[').and_then(|h| h.strip_suffix(']')).unwrap_or(host);
		if host.is_empty() {
			return Err(invalid("missing host"));
		}
		let port = port.parse::<u16>().map_err(|_| invalid("invalid port"))?;
		if port == 0 {
			return Err(invalid("invalid port"));
		}

		Ok(Self {
			host: host.to_string(),
			port,
		})
	}
}

impl fmt::Display for TargetAddress {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		if self.host.contains(':') {
			write!(f, "[{}]:{}", self.host, self.port)
		} else {
			write!(f, "{}:{}", self.host, self.port)
		}
	}
}

/// A freshly connected agent stream and its handshake data.
pub struct ConnectedTarget {
	pub parts: TransportParts,
	pub info: ConnectInfo,
}

/// Opens agent streams for session addresses.
///
/// Implementations own the agent's wire framing; the bridge only sees the
/// resulting [`TransportParts`].
pub trait TargetConnector: Send + Sync {
	fn connect<'a>(&'a self, address: &'a TargetAddress) -> Pin<Box<dyn Future<Output = Result<ConnectedTarget>> + Send + 'a>>;
}

/// Cloneable handle to one connected debug agent.
#[derive(Clone)]
pub struct DebugTarget {
	connection: Arc<AgentConnection>,
	info: Arc<ConnectInfo>,
	run_handle: Arc<JoinHandle<()>>,
}

impl DebugTarget {
	/// Starts the agent message loop and returns the handle with its event
	/// stream.
	pub fn start(target: ConnectedTarget) -> (Self, mpsc::UnboundedReceiver<TargetEvent>) {
		let (connection, events) = AgentConnection::new(target.parts);
		let connection = Arc::new(connection);
		let run_handle = tokio::spawn({
			let connection = Arc::clone(&connection);
			async move { connection.run().await }
		});

		tracing::debug!(
			target = "dtb.agent",
			host = %target.info.host,
			v8_version = %target.info.v8_version,
			"debug target connected"
		);

		let handle = Self {
			connection,
			info: Arc::new(target.info),
			run_handle: Arc::new(run_handle),
		};
		(handle, events)
	}

	pub fn info(&self) -> &ConnectInfo {
		&self.info
	}

	/// Sends `command` and resolves with the agent's response body.
	pub async fn send_command(&self, command: &str, arguments: Option<Value>) -> Result<Value> {
		self.connection.send_command(command, arguments).await
	}

	/// Lets the debugged process run freely and closes the stream.
	///
	/// The `disconnect` request is not awaited: the agent may already be
	/// gone.
	pub async fn release(&self) {
		if !self.connection.is_closed() {
			if let Err(err) = self.connection.notify("disconnect", None).await {
				tracing::debug!(target = "dtb.agent", error = %err, "disconnect not delivered");
			}
		}
		if let Err(err) = self.connection.shutdown().await {
			tracing::debug!(target = "dtb.agent", error = %err, "transport close failed");
		}
		self.run_handle.abort();
	}

	pub fn is_closed(&self) -> bool {
		self.connection.is_closed()
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::fake_transport::{FakeReply, FakeTransportBuilder};
	use serde_json::json;

	#[test]
	fn parse_host_and_port() {
		let address = TargetAddress::parse("127.0.0.1:5858").unwrap();
		assert_eq!(address.host, "127.0.0.1");
		assert_eq!(address.port, 5858);
		assert_eq!(address.to_string(), "127.0.0.1:5858");
	}

	#[test]
	fn parse_bracketed_ipv6() {
		let address = TargetAddress::parse("[::1]:9229").unwrap();
		assert_eq!(address.host, "::1");
		assert_eq!(address.to_string(), "[::1]:9229");
	}

	#[test]
	fn parse_rejects_malformed_addresses() {
		for input in ["localhost", ":5858", "localhost:", "localhost:http", "localhost:0", "localhost:70000"] {
			assert!(TargetAddress::parse(input).is_err(), "{input} should be rejected");
		}
	}

	#[tokio::test]
	async fn release_sends_disconnect_and_closes() {
		let (parts, controller) = FakeTransportBuilder::new().build();
		let info = ConnectInfo {
			host: "node".to_string(),
			v8_version: "3.14".to_string(),
		};
		let (target, _events) = DebugTarget::start(ConnectedTarget { parts, info });
		controller.respond_with(|_, _| FakeReply::Body(json!({})));

		assert_eq!(target.info().v8_version, "3.14");
		target.send_command("version", None).await.unwrap();

		target.release().await;

		assert_eq!(controller.sent_commands(), vec!["version", "disconnect"]);
		assert!(controller.is_closed());
		assert!(target.is_closed());
		assert!(target.send_command("version", None).await.is_err());
	}
}
