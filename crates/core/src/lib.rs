//! Debugging bridge between a browser-style debugging front end and a V8
//! debug agent.
//!
//! Each front-end WebSocket connection becomes one session: a [`Relay`]
//! that translates front-end commands into agent commands and agent events
//! into front-end events, against one [`DebugTarget`].
//!
//! The agent's wire framing is not part of this crate. Callers provide a
//! [`TargetConnector`] that yields a JSON message transport for an address.
//!
//! ```ignore
//! use std::sync::Arc;
//! use dtb::{BridgeConfig, BridgeServer};
//!
//! let config = BridgeConfig::load("dtb.json".as_ref())?;
//! BridgeServer::run(&config, Arc::new(MyConnector)).await?;
//! ```

pub mod config;
pub mod error;
pub mod registry;
pub mod relay;
pub mod server;

pub use config::BridgeConfig;
pub use dtb_protocol as protocol;
pub use dtb_runtime::{
	ConnectedTarget, DebugTarget, TargetAddress, TargetConnector, TargetEvent, Transport, TransportParts, TransportReceiver,
};
pub use error::{Error, Result};
pub use registry::{SessionEvent, SessionId, SessionRegistry, SessionSummary};
pub use relay::{CloseReason, FrontendChannels, FrontendInbound, FrontendOutbound, Relay, RelayOptions};
pub use server::BridgeServer;
