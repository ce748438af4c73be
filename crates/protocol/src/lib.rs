//! Wire types for the devtools bridge.
//!
//! This crate contains the serde-serializable shapes spoken on both sides of
//! the bridge:
//!
//! * [`frontend`]: the command/response/event envelopes of the browser
//!   debugging front end.
//! * [`agent`]: the request/response/event messages of the runtime's remote
//!   debugging agent.
//!
//! # Design Philosophy
//!
//! Types in this crate are:
//! * Pure data: No behavior beyond serialization/deserialization
//! * 1:1 with the wire: field names match what each peer sends
//! * Loosely typed where the peer is: agent bodies stay `serde_json::Value`
//!
//! Translation between the two dialects lives in `dtb-rs`.

pub mod agent;
pub mod frontend;

pub use agent::*;
pub use frontend::*;
