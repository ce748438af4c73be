//! WebSocket endpoint front ends connect to.
//!
//! `GET /{host:port}` upgrades to a session debugging the agent at that
//! address. `GET /sessions` lists live sessions.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket};
use axum::extract::{Path, State, WebSocketUpgrade};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use dtb_runtime::{ConnectedTarget, DebugTarget, TargetAddress, TargetConnector};
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tracing::{error, info, warn};

use crate::config::BridgeConfig;
use crate::error::{Error, Result};
use crate::registry::{SessionRegistry, SessionSummary};
use crate::relay::{FrontendChannels, FrontendInbound, FrontendOutbound, Relay, RelayOptions};

#[derive(Clone)]
struct ServerState {
	connector: Arc<dyn TargetConnector>,
	registry: SessionRegistry,
	options: RelayOptions,
}

/// Accepts front-end connections and starts one relay per connection.
pub struct BridgeServer {
	state: ServerState,
}

impl BridgeServer {
	pub fn new(connector: Arc<dyn TargetConnector>, registry: SessionRegistry, options: RelayOptions) -> Self {
		Self {
			state: ServerState {
				connector,
				registry,
				options,
			},
		}
	}

	pub fn registry(&self) -> &SessionRegistry {
		&self.state.registry
	}

	pub fn router(&self) -> Router {
		Router::new()
			.route("/sessions", get(list_sessions))
			.route("/{target}", get(open_session))
			.with_state(self.state.clone())
	}

	/// Serves on an already-bound listener until the server fails.
	pub async fn serve(self, listener: TcpListener) -> Result<()> {
		if let Ok(addr) = listener.local_addr() {
			info!(target = "dtb.server", %addr, "listening for front ends");
		}
		axum::serve(listener, self.router()).await?;
		Ok(())
	}

	/// Binds the configured address and serves.
	pub async fn run(config: &BridgeConfig, connector: Arc<dyn TargetConnector>) -> Result<()> {
		let options = config.relay_options()?;
		let addr = config.listen_addr();
		let listener = TcpListener::bind(&addr)
			.await
			.map_err(|source| Error::Bind { addr: addr.clone(), source })?;

		Self::new(connector, SessionRegistry::new(), options).serve(listener).await
	}
}

async fn list_sessions(State(state): State<ServerState>) -> Json<Vec<SessionSummary>> {
	Json(state.registry.list())
}

/// The target is connected before the upgrade so a bad address or an
/// unreachable agent is reported as a plain HTTP error.
async fn open_session(Path(target): Path<String>, State(state): State<ServerState>, ws: WebSocketUpgrade) -> Response {
	let address = match TargetAddress::parse(&target) {
		Ok(address) => address,
		Err(err) => return (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
	};

	let connected = match state.connector.connect(&address).await {
		Ok(connected) => connected,
		Err(err) => {
			warn!(target = "dtb.server", %address, error = %err, "target connection failed");
			return (StatusCode::BAD_GATEWAY, err.to_string()).into_response();
		}
	};

	ws.on_upgrade(move |socket| run_session(socket, address, connected, state))
}

async fn run_session(socket: WebSocket, address: TargetAddress, connected: ConnectedTarget, state: ServerState) {
	let (sender, receiver) = socket.split();
	let (channels, inbound_tx, outbound_rx) = FrontendChannels::pair();

	let (target, target_events) = DebugTarget::start(connected);
	let relay = Relay::new(target, target_events, channels, &state.registry, address.to_string(), state.options.clone());
	let session = relay.id();
	let relay_task = relay.spawn();

	let writer = tokio::spawn(write_frontend(sender, outbound_rx));
	let reader = tokio::spawn(read_frontend(receiver, inbound_tx));

	match relay_task.await {
		Ok(reason) => info!(target = "dtb.server", session, %reason, "session ended"),
		Err(err) => error!(target = "dtb.server", session, error = %err, "relay task failed"),
	}

	reader.abort();
	let _ = writer.await;
}

async fn read_frontend(mut receiver: SplitStream<WebSocket>, inbound: mpsc::UnboundedSender<FrontendInbound>) {
	while let Some(message) = receiver.next().await {
		let forwarded = match message {
			Ok(Message::Text(text)) => FrontendInbound::Message(text.as_str().to_owned()),
			Ok(Message::Close(_)) => break,
			Err(err) => {
				let _ = inbound.send(FrontendInbound::Error(err.to_string()));
				return;
			}
			_ => continue,
		};
		if inbound.send(forwarded).is_err() {
			return;
		}
	}
	let _ = inbound.send(FrontendInbound::Closed);
}

async fn write_frontend(mut sender: SplitSink<WebSocket, Message>, mut outbound: mpsc::UnboundedReceiver<FrontendOutbound>) {
	while let Some(message) = outbound.recv().await {
		match message {
			FrontendOutbound::Message(text) => {
				if sender.send(Message::Text(text.into())).await.is_err() {
					break;
				}
			}
			FrontendOutbound::Close => {
				let _ = sender.send(Message::Close(None)).await;
				break;
			}
		}
	}
}
