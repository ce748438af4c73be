//! Session-local mapping from front-end breakpoint ids to agent handles.
//!
//! The front end names a breakpoint by where it was requested; the agent
//! names it by a number it picks. The key doubles as the `breakpointId`
//! handed to the front end.

use std::collections::HashMap;

use serde_json::Value;

/// Composite key for a requested breakpoint location.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BreakpointKey(String);

impl BreakpointKey {
	pub fn new(url: &str, line: u64, column: u64) -> Self {
		Self(format!("{url}:{line}:{column}"))
	}

	/// Wraps an id the front end sent back.
	pub fn from_id(id: impl Into<String>) -> Self {
		Self(id.into())
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

/// Key → agent handle. A key maps to at most one handle.
#[derive(Debug, Default)]
pub struct BreakpointMap {
	entries: HashMap<BreakpointKey, Value>,
}

impl BreakpointMap {
	pub fn new() -> Self {
		Self::default()
	}

	/// Records `handle` under `key`. Returns `false`, leaving the map
	/// untouched, if the key is already mapped.
	pub fn insert(&mut self, key: BreakpointKey, handle: Value) -> bool {
		if self.entries.contains_key(&key) {
			return false;
		}
		self.entries.insert(key, handle);
		true
	}

	pub fn get(&self, key: &BreakpointKey) -> Option<&Value> {
		self.entries.get(key)
	}

	pub fn contains(&self, key: &BreakpointKey) -> bool {
		self.entries.contains_key(key)
	}

	pub fn remove(&mut self, key: &BreakpointKey) -> Option<Value> {
		self.entries.remove(key)
	}

	pub fn len(&self) -> usize {
		self.entries.len()
	}

	pub fn is_empty(&self) -> bool {
		self.entries.is_empty()
	}
}
