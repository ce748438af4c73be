//! Bridge configuration, read once at startup.
//!
//! ```json
//! {
//!   "host": "127.0.0.1",
//!   "port": 8080,
//!   "logWireTraffic": false,
//!   "injectedScript": "injected.js"
//! }
//! ```
//!
//! Every field is optional. A relative `injectedScript` path resolves against
//! the config file's directory.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::relay::RelayOptions;

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BridgeConfig {
	pub host: String,
	pub port: u16,
	pub log_wire_traffic: bool,
	pub injected_script: Option<PathBuf>,
}

impl Default for BridgeConfig {
	fn default() -> Self {
		Self {
			host: DEFAULT_HOST.to_string(),
			port: DEFAULT_PORT,
			log_wire_traffic: false,
			injected_script: None,
		}
	}
}

impl BridgeConfig {
	pub fn load(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)?;
		let mut config: Self = serde_json::from_str(&content).map_err(|err| Error::Config {
			path: path.to_path_buf(),
			reason: err.to_string(),
		})?;

		if let (Some(script), Some(dir)) = (config.injected_script.as_mut(), path.parent()) {
			if script.is_relative() {
				*script = dir.join(&*script);
			}
		}
		Ok(config)
	}

	/// `host:port` to listen on.
	pub fn listen_addr(&self) -> String {
		if self.host.contains(':') {
			format!("[{}]:{}", self.host, self.port)
		} else {
			format!("{}:{}", self.host, self.port)
		}
	}

	/// Per-session flags, with the injected script read from disk.
	pub fn relay_options(&self) -> Result<RelayOptions> {
		let injected_script = match &self.injected_script {
			Some(path) => {
				let source = fs::read_to_string(path).map_err(|source| Error::InjectedScript {
					path: path.clone(),
					source,
				})?;
				Some(Arc::<str>::from(source))
			}
			None => None,
		};

		Ok(RelayOptions {
			log_wire_traffic: self.log_wire_traffic,
			injected_script,
		})
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn defaults_apply_to_missing_fields() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("dtb.json");
		fs::write(&path, r#"{"port": 9000}"#).unwrap();

		let config = BridgeConfig::load(&path).unwrap();
		assert_eq!(config.host, DEFAULT_HOST);
		assert_eq!(config.port, 9000);
		assert!(!config.log_wire_traffic);
		assert_eq!(config.listen_addr(), "127.0.0.1:9000");
	}

	#[test]
	fn injected_script_resolves_next_to_config() {
		let dir = tempfile::tempdir().unwrap();
		fs::write(dir.path().join("injected.js"), "var __dtbInjectedScript = {};").unwrap();
		let path = dir.path().join("dtb.json");
		fs::write(&path, r#"{"logWireTraffic": true, "injectedScript": "injected.js"}"#).unwrap();

		let config = BridgeConfig::load(&path).unwrap();
		assert_eq!(config.injected_script.as_deref(), Some(dir.path().join("injected.js").as_path()));

		let options = config.relay_options().unwrap();
		assert!(options.log_wire_traffic);
		assert_eq!(options.injected_script.as_deref(), Some("var __dtbInjectedScript = {};"));
	}

	#[test]
	fn malformed_file_is_a_config_error() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("dtb.json");
		fs::write(&path, r#"{"port": "eighty"}"#).unwrap();

		assert!(matches!(BridgeConfig::load(&path), Err(Error::Config { .. })));
	}

	#[test]
	fn missing_injected_script_is_reported() {
		let config = BridgeConfig {
			injected_script: Some(PathBuf::from("/nonexistent/injected.js")),
			..Default::default()
		};
		assert!(matches!(config.relay_options(), Err(Error::InjectedScript { .. })));
	}

	#[test]
	fn ipv6_host_is_bracketed() {
		let config = BridgeConfig {
			host: "::1".into(),
			..Default::default()
		};
		assert_eq!(config.listen_addr(), "[::1]:8080");
	}
}
