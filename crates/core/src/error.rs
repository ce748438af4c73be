use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
	#[error("Invalid configuration in {path}: {reason}")]
	Config { path: PathBuf, reason: String },

	#[error("Failed to read injected script {path}: {source}")]
	InjectedScript {
		path: PathBuf,
		#[source]
		source: io::Error,
	},

	#[error("Failed to bind {addr}: {source}")]
	Bind {
		addr: String,
		#[source]
		source: io::Error,
	},

	#[error(transparent)]
	Io(#[from] io::Error),
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn config_error_names_the_file() {
		let err = Error::Config {
			path: PathBuf::from("/etc/dtb.json"),
			reason: "expected value".into(),
		};
		assert_eq!(err.to_string(), "Invalid configuration in /etc/dtb.json: expected value");
	}
}
