//! WebSocket server against an in-memory connector.

use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use dtb::protocol::ConnectInfo;
use dtb::{BridgeServer, ConnectedTarget, RelayOptions, SessionRegistry, TargetAddress, TargetConnector};
use dtb_runtime::{FakeReply, FakeTransportBuilder, FakeTransportController};
use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::{Error as WsError, Message};

const WAIT: Duration = Duration::from_secs(5);

/// Hands out fake agents; port 1 is unreachable.
#[derive(Default)]
struct FakeConnector {
	controllers: Mutex<Vec<FakeTransportController>>,
}

impl TargetConnector for FakeConnector {
	fn connect<'a>(
		&'a self,
		address: &'a TargetAddress,
	) -> Pin<Box<dyn Future<Output = dtb_runtime::Result<ConnectedTarget>> + Send + 'a>> {
		Box::pin(async move {
			if address.port == 1 {
				return Err(dtb_runtime::Error::Connect {
					address: address.to_string(),
					reason: "connection refused".to_string(),
				});
			}

			let (parts, controller) = FakeTransportBuilder::new().build();
			controller.respond_with(|command, _| match command {
				"scripts" => FakeReply::Body(json!([{"id": 1, "name": "main.js", "lineCount": 3}])),
				_ => FakeReply::Body(json!({})),
			});
			self.controllers.lock().push(controller);

			Ok(ConnectedTarget {
				parts,
				info: ConnectInfo {
					host: address.host.clone(),
					v8_version: "3.14.5".to_string(),
				},
			})
		})
	}
}

async fn start_server() -> (SocketAddr, Arc<FakeConnector>, SessionRegistry) {
	let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
	let addr = listener.local_addr().unwrap();
	let connector = Arc::new(FakeConnector::default());
	let registry = SessionRegistry::new();

	let server = BridgeServer::new(connector.clone(), registry.clone(), RelayOptions::default());
	tokio::spawn(server.serve(listener));
	(addr, connector, registry)
}

async fn http_get(addr: SocketAddr, path: &str) -> String {
	let mut stream = TcpStream::connect(addr).await.unwrap();
	let request = format!("GET {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
	stream.write_all(request.as_bytes()).await.unwrap();
	let mut response = String::new();
	stream.read_to_string(&mut response).await.unwrap();
	response
}

async fn wait_for(condition: impl Fn() -> bool) {
	timeout(WAIT, async {
		while !condition() {
			tokio::time::sleep(Duration::from_millis(10)).await;
		}
	})
	.await
	.expect("condition not reached");
}

#[tokio::test]
async fn websocket_session_round_trip() -> anyhow::Result<()> {
	let (addr, connector, registry) = start_server().await;

	let (mut ws, _) = connect_async(format!("ws://{addr}/127.0.0.1:5858")).await?;
	ws.send(Message::Text(json!({"id": 1, "method": "Debugger.enable"}).to_string().into()))
		.await?;

	let mut received = Vec::new();
	while received.len() < 2 {
		let message = timeout(WAIT, ws.next()).await?.expect("socket closed early")?;
		if message.is_text() {
			received.push(serde_json::from_str::<Value>(message.to_text()?)?);
		}
	}
	assert_eq!(received[0]["method"], "Debugger.scriptParsed");
	assert_eq!(received[0]["params"]["url"], "main.js");
	assert_eq!(received[1], json!({"id": 1, "result": {}}));

	assert_eq!(registry.len(), 1);
	let listing = http_get(addr, "/sessions").await;
	assert!(listing.starts_with("HTTP/1.1 200"));
	assert!(listing.contains("\"target\":\"127.0.0.1:5858\""));

	ws.close(None).await?;
	wait_for(|| registry.is_empty()).await;

	let controller = connector.controllers.lock()[0].clone();
	assert!(controller.sent_commands().contains(&"disconnect".to_string()));
	assert!(controller.is_closed());
	Ok(())
}

#[tokio::test]
async fn target_disconnect_closes_websocket() {
	let (addr, connector, registry) = start_server().await;

	let (mut ws, _) = connect_async(format!("ws://{addr}/localhost:9229")).await.unwrap();
	wait_for(|| registry.len() == 1).await;

	let controller = connector.controllers.lock()[0].clone();
	controller.end();

	let closed = timeout(WAIT, async {
		while let Some(message) = ws.next().await {
			match message {
				Ok(Message::Close(_)) | Err(_) => return,
				Ok(_) => continue,
			}
		}
	})
	.await;
	assert!(closed.is_ok());
	wait_for(|| registry.is_empty()).await;
}

#[tokio::test]
async fn invalid_target_address_is_bad_request() {
	let (addr, _connector, registry) = start_server().await;

	match connect_async(format!("ws://{addr}/no-port-here")).await {
		Err(WsError::Http(response)) => assert_eq!(response.status(), 400),
		Err(err) => panic!("expected HTTP 400, got {err}"),
		Ok(_) => panic!("expected HTTP 400, upgrade succeeded"),
	}
	assert!(registry.is_empty());
}

#[tokio::test]
async fn unreachable_target_is_bad_gateway() {
	let (addr, _connector, registry) = start_server().await;

	match connect_async(format!("ws://{addr}/127.0.0.1:1")).await {
		Err(WsError::Http(response)) => assert_eq!(response.status(), 502),
		Err(err) => panic!("expected HTTP 502, got {err}"),
		Ok(_) => panic!("expected HTTP 502, upgrade succeeded"),
	}
	assert!(registry.is_empty());
}
