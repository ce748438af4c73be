//! Process-wide list of live sessions.
//!
//! Sessions register when their relay is created and remove themselves when
//! the relay closes. Nothing here routes traffic: the registry only answers
//! "what is open" and lets an operator ask a session to close.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info};

use crate::relay::CloseReason;

pub type SessionId = u64;

const EVENT_CAPACITY: usize = 64;

/// Public view of one live session.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
	pub id: SessionId,
	/// Agent address the session was opened for.
	pub target: String,
	pub v8_version: String,
	pub opened_at: SystemTime,
}

/// Lifecycle notifications.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
	Opened(SessionSummary),
	Closed { id: SessionId, reason: CloseReason },
}

/// Handed to a newly registered relay.
pub struct Registration {
	pub id: SessionId,
	/// Receives a unit for every [`SessionRegistry::request_close`].
	pub close_requests: mpsc::UnboundedReceiver<()>,
}

struct SessionEntry {
	summary: SessionSummary,
	close_tx: mpsc::UnboundedSender<()>,
}

struct RegistryInner {
	next_id: AtomicU64,
	sessions: Mutex<Vec<SessionEntry>>,
	events: broadcast::Sender<SessionEvent>,
}

/// Cloneable handle to the shared session list.
#[derive(Clone)]
pub struct SessionRegistry {
	inner: Arc<RegistryInner>,
}

impl Default for SessionRegistry {
	fn default() -> Self {
		Self::new()
	}
}

impl SessionRegistry {
	pub fn new() -> Self {
		let (events, _) = broadcast::channel(EVENT_CAPACITY);
		Self {
			inner: Arc::new(RegistryInner {
				next_id: AtomicU64::new(1),
				sessions: Mutex::new(Vec::new()),
				events,
			}),
		}
	}

	/// Adds a session and announces it.
	pub fn register(&self, target: String, v8_version: String) -> Registration {
		let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
		let (close_tx, close_requests) = mpsc::unbounded_channel();
		let summary = SessionSummary {
			id,
			target,
			v8_version,
			opened_at: SystemTime::now(),
		};

		self.inner.sessions.lock().push(SessionEntry {
			summary: summary.clone(),
			close_tx,
		});
		info!(target = "dtb.registry", session = id, target_address = %summary.target, "session registered");
		let _ = self.inner.events.send(SessionEvent::Opened(summary));

		Registration { id, close_requests }
	}

	/// Drops a session and announces why. Returns `false` if it was not
	/// registered.
	pub fn remove(&self, id: SessionId, reason: CloseReason) -> bool {
		let removed = {
			let mut sessions = self.inner.sessions.lock();
			let position = sessions.iter().position(|entry| entry.summary.id == id);
			position.map(|index| sessions.remove(index))
		};
		if removed.is_none() {
			return false;
		}

		info!(target = "dtb.registry", session = id, %reason, "session removed");
		let _ = self.inner.events.send(SessionEvent::Closed { id, reason });
		true
	}

	/// Asks a live session to close. Returns `false` if no such session.
	pub fn request_close(&self, id: SessionId) -> bool {
		let sessions = self.inner.sessions.lock();
		let Some(entry) = sessions.iter().find(|entry| entry.summary.id == id) else {
			return false;
		};
		debug!(target = "dtb.registry", session = id, "close requested");
		entry.close_tx.send(()).is_ok()
	}

	/// Snapshot of live sessions, oldest first.
	pub fn list(&self) -> Vec<SessionSummary> {
		self.inner.sessions.lock().iter().map(|entry| entry.summary.clone()).collect()
	}

	pub fn contains(&self, id: SessionId) -> bool {
		self.inner.sessions.lock().iter().any(|entry| entry.summary.id == id)
	}

	pub fn len(&self) -> usize {
		self.inner.sessions.lock().len()
	}

	pub fn is_empty(&self) -> bool {
		self.len() == 0
	}

	pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
		self.inner.events.subscribe()
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn register_assigns_distinct_ids() {
		let registry = SessionRegistry::new();
		let first = registry.register("127.0.0.1:5858".into(), "3.14".into());
		let second = registry.register("127.0.0.1:5859".into(), "3.14".into());

		assert_ne!(first.id, second.id);
		assert_eq!(registry.len(), 2);
		let targets: Vec<_> = registry.list().into_iter().map(|summary| summary.target).collect();
		assert_eq!(targets, vec!["127.0.0.1:5858", "127.0.0.1:5859"]);
	}

	#[test]
	fn remove_only_affects_named_session() {
		let registry = SessionRegistry::new();
		let first = registry.register("a:1".into(), String::new());
		let second = registry.register("b:2".into(), String::new());

		assert!(registry.remove(first.id, CloseReason::FrontendClosed));
		assert!(!registry.remove(first.id, CloseReason::FrontendClosed));
		assert!(!registry.contains(first.id));
		assert!(registry.contains(second.id));
	}

	#[tokio::test]
	async fn lifecycle_events_are_broadcast() {
		let registry = SessionRegistry::new();
		let mut events = registry.subscribe();

		let registration = registry.register("a:1".into(), "3.14".into());
		registry.remove(registration.id, CloseReason::TargetClosed);

		match events.recv().await.unwrap() {
			SessionEvent::Opened(summary) => assert_eq!(summary.id, registration.id),
			other => panic!("unexpected event: {other:?}"),
		}
		assert_eq!(
			events.recv().await.unwrap(),
			SessionEvent::Closed {
				id: registration.id,
				reason: CloseReason::TargetClosed
			}
		);
	}

	#[tokio::test]
	async fn request_close_signals_live_session_only() {
		let registry = SessionRegistry::new();
		let mut registration = registry.register("a:1".into(), String::new());

		assert!(registry.request_close(registration.id));
		assert_eq!(registration.close_requests.recv().await, Some(()));

		registry.remove(registration.id, CloseReason::Requested);
		assert!(!registry.request_close(registration.id));
		assert!(registry.is_empty());
	}
}
